//! The override/fallback/global decision matrix, end to end through a
//! context.

use core_types::Value;
use integration_tests::{capture, defer_lib, nested_lib, then};
use normalizer::{conforming_constructor, Context, NormalizationOptions, Scheduler};

#[test]
fn test_defaults_with_native_prefer_the_native() {
    let scheduler = Scheduler::new();
    let native = conforming_constructor(&scheduler);
    let context = Context::with_parts(scheduler.clone(), Some(native.clone()));

    let returned = context.normalize(Some(defer_lib(&scheduler)), &NormalizationOptions::new());
    assert_eq!(returned, native);
    assert_eq!(context.ambient().unwrap(), native);
}

#[test]
fn test_fallback_false_synthesizes_but_spares_the_slot() {
    let scheduler = Scheduler::new();
    let native = conforming_constructor(&scheduler);
    let context = Context::with_parts(scheduler.clone(), Some(native.clone()));

    let returned = context.normalize(
        Some(defer_lib(&scheduler)),
        &NormalizationOptions::new().fallback(false),
    );
    assert_ne!(returned, native);
    assert!(returned.is_normalized());
    assert_eq!(context.ambient().unwrap(), native);
}

#[test]
fn test_override_installs_over_native() {
    let scheduler = Scheduler::new();
    let native = conforming_constructor(&scheduler);
    let context = Context::with_parts(scheduler.clone(), Some(native.clone()));

    let returned = context.normalize(
        Some(defer_lib(&scheduler)),
        &NormalizationOptions::new().override_native(true),
    );
    assert_eq!(context.ambient().unwrap(), returned);

    // The installed constructor is actually usable from the slot.
    let installed = context.ambient().unwrap();
    let resolved = installed
        .get("resolve")
        .unwrap()
        .invoke(installed.clone(), vec![Value::number(8.0)])
        .unwrap();
    let (on_fulfilled, seen) = capture();
    then(&resolved, on_fulfilled, Value::Undefined);
    context.run_microtasks();
    assert_eq!(*seen.borrow(), Some(Value::number(8.0)));
}

#[test]
fn test_global_false_never_touches_the_slot() {
    let scheduler = Scheduler::new();
    let context = Context::with_parts(scheduler.clone(), None);

    let returned = context.normalize(
        Some(defer_lib(&scheduler)),
        &NormalizationOptions::new().global(false),
    );
    assert!(returned.is_normalized());
    assert!(context.ambient().is_none());
}

#[test]
fn test_synthesized_install_yields_to_a_later_explicit_native() {
    let scheduler = Scheduler::new();
    let context = Context::with_parts(scheduler.clone(), None);

    // First call installs its synthesized result.
    let first = context.normalize(Some(defer_lib(&scheduler)), &NormalizationOptions::new());
    assert_eq!(context.ambient().unwrap(), first);

    // Second call over a different library may replace it, since the
    // slot only holds a previous synthesized result.
    let second = context.normalize(Some(nested_lib(&scheduler)), &NormalizationOptions::new());
    assert_ne!(first, second);
    assert_eq!(context.ambient().unwrap(), second);
}

#[test]
fn test_absent_library_short_circuits_to_the_ambient() {
    let scheduler = Scheduler::new();
    let native = conforming_constructor(&scheduler);
    let context = Context::with_parts(scheduler, Some(native.clone()));

    for library in [None, Some(Value::Undefined), Some(Value::Null), Some(Value::number(0.0))] {
        let returned = context.normalize(library, &NormalizationOptions::new());
        assert_eq!(returned, native);
    }
}

#[test]
fn test_per_call_debug_does_not_stick() {
    let scheduler = Scheduler::new();
    let context = Context::with_parts(scheduler.clone(), None);
    context.normalize(
        Some(defer_lib(&scheduler)),
        &NormalizationOptions::new().debug(true),
    );
    assert!(!context.defaults().debug);
}
