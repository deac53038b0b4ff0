//! Normalization policy over an explicit context.
//!
//! The [`Context`] owns what the surrounding environment would otherwise
//! provide as process-wide state: the ambient constructor slot, the
//! cached native-support verdict, per-context defaults, and the
//! extension registry. Tests get full isolation by constructing their
//! own contexts.

use core_types::Value;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::extensions::Extension;
use crate::probe::probe;
use crate::promise::conforming_constructor;
use crate::scheduler::Scheduler;
use crate::synthesize::{gap, synthesize};

/// Per-call normalization options. Every field is optional; unset
/// fields fall back to the context's defaults.
#[derive(Debug, Default, Clone)]
pub struct NormalizationOptions {
    override_native: Option<bool>,
    fallback: Option<bool>,
    global: Option<bool>,
    debug: Option<bool>,
    extensions: HashMap<String, bool>,
}

impl NormalizationOptions {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the synthesized constructor even over a conformant
    /// ambient one.
    pub fn override_native(mut self, value: bool) -> Self {
        self.override_native = Some(value);
        self
    }

    /// Prefer the ambient constructor over synthesizing when native
    /// support exists.
    pub fn fallback(mut self, value: bool) -> Self {
        self.fallback = Some(value);
        self
    }

    /// Allow installing the result into the ambient slot.
    pub fn global(mut self, value: bool) -> Self {
        self.global = Some(value);
        self
    }

    /// Raise adaptation-gap diagnostics to debug level.
    pub fn debug(mut self, value: bool) -> Self {
        self.debug = Some(value);
        self
    }

    /// Enable or disable a named extension for this call.
    pub fn extension(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.extensions.insert(name.into(), enabled);
        self
    }
}

/// Effective settings of one normalization call, after merging options
/// over a context's defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Install the result even over a conformant ambient constructor.
    pub override_native: bool,
    /// Prefer a conformant ambient constructor over synthesizing.
    pub fallback: bool,
    /// Allow installing the result into the ambient slot.
    pub global: bool,
    /// Raise adaptation-gap diagnostics to debug level.
    pub debug: bool,
    extensions: HashMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            override_native: false,
            fallback: true,
            global: true,
            debug: false,
            extensions: HashMap::new(),
        }
    }
}

impl Settings {
    /// Whether the named extension is enabled.
    pub fn extension_enabled(&self, name: &str) -> bool {
        self.extensions.get(name).copied().unwrap_or(false)
    }

    /// Enable a named extension.
    pub fn enable_extension(&mut self, name: impl Into<String>) {
        self.extensions.insert(name.into(), true);
    }

    fn merge(&self, options: &NormalizationOptions) -> Settings {
        let mut extensions = self.extensions.clone();
        for (name, enabled) in &options.extensions {
            extensions.insert(name.clone(), *enabled);
        }
        Settings {
            override_native: options.override_native.unwrap_or(self.override_native),
            fallback: options.fallback.unwrap_or(self.fallback),
            global: options.global.unwrap_or(self.global),
            debug: options.debug.unwrap_or(self.debug),
            extensions,
        }
    }
}

/// The environment a normalization call runs against.
pub struct Context {
    scheduler: Scheduler,
    ambient: RefCell<Option<Value>>,
    has_native_support: bool,
    defaults: RefCell<Settings>,
    extensions: RefCell<Vec<Extension>>,
}

impl Context {
    /// A context with no ambient constructor at all.
    pub fn new() -> Self {
        Context::with_parts(Scheduler::new(), None)
    }

    /// A context whose ambient slot holds the built-in conforming
    /// constructor, standing in for native support.
    pub fn with_native() -> Self {
        let scheduler = Scheduler::new();
        let native = conforming_constructor(&scheduler);
        Context::with_parts(scheduler, Some(native))
    }

    /// A context over an explicit scheduler and ambient constructor.
    ///
    /// Native support is probed once, here; later ambient mutations do
    /// not re-run the probe. The built-in `done` and `settle` extensions
    /// start out registered; each no-ops unless the effective options
    /// of a call enable it by name.
    pub fn with_parts(scheduler: Scheduler, ambient: Option<Value>) -> Self {
        let has_native_support = ambient
            .as_ref()
            .map_or(false, |a| probe(a).is_fully_conformant);
        Context {
            scheduler,
            ambient: RefCell::new(ambient),
            has_native_support,
            defaults: RefCell::new(Settings::default()),
            extensions: RefCell::new(vec![
                crate::extensions::done_extension(),
                crate::extensions::settle_extension(),
            ]),
        }
    }

    /// Normalizes a library into a conforming constructor under this
    /// context's policy.
    pub fn normalize(&self, library: Option<Value>, options: &NormalizationOptions) -> Value {
        let settings = self.defaults.borrow().merge(options);

        let mut effective = library.filter(Value::is_truthy);

        // A global that installed itself on load can hand itself back
        // through its own escape hatch; the released value wins.
        if let Some(ambient) = self.ambient.borrow().clone() {
            if let Some(hatch) = ambient.get("noConflict").filter(|f| f.is_callable()) {
                match hatch.invoke(ambient, Vec::new()) {
                    Ok(released) if released.is_truthy() => effective = Some(released),
                    Ok(_) => {}
                    Err(err) => gap(settings.debug, &format!("noConflict() failed: {err}")),
                }
            }
        }

        // Nothing to normalize: hand back the ambient as-is.
        let Some(effective) = effective else {
            return self.ambient.borrow().clone().unwrap_or(Value::Undefined);
        };

        if settings.fallback && !settings.override_native && self.has_native_support {
            if let Some(ambient) = self.ambient.borrow().clone() {
                return ambient;
            }
        }

        let ctor = synthesize(&effective, settings.debug);

        // Never displace an explicitly user-installed native
        // implementation unless overriding; a previous call's own
        // synthesized result is fair to replace.
        let ambient_is_normalized = self
            .ambient
            .borrow()
            .as_ref()
            .map_or(false, Value::is_normalized);
        if settings.override_native
            || (settings.global && (!self.has_native_support || ambient_is_normalized))
        {
            tracing::debug!(target: "normalizer", "installing normalized constructor as ambient");
            *self.ambient.borrow_mut() = Some(ctor.clone());
        }

        let extensions: Vec<Extension> = self.extensions.borrow().clone();
        for extension in &extensions {
            extension(&ctor, Some(&effective), &settings);
        }

        ctor
    }

    /// Appends an extension to the registry. Affects subsequent
    /// `normalize` calls only.
    pub fn register_extension(&self, extension: Extension) {
        self.extensions.borrow_mut().push(extension);
    }

    /// Drains the scheduler, dispatching every pending continuation.
    pub fn run_microtasks(&self) {
        self.scheduler.run_until_idle();
    }

    /// The scheduler driving this context's continuations.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The current ambient constructor, if any.
    pub fn ambient(&self) -> Option<Value> {
        self.ambient.borrow().clone()
    }

    /// Whether the ambient constructor probed as fully conformant at
    /// construction time.
    pub fn has_native_support(&self) -> bool {
        self.has_native_support
    }

    /// The context's default settings.
    pub fn defaults(&self) -> Settings {
        self.defaults.borrow().clone()
    }

    /// Replaces the context's default settings.
    pub fn set_defaults(&self, defaults: Settings) {
        *self.defaults.borrow_mut() = defaults;
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}
