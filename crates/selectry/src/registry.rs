#![forbid(unsafe_code)]

//! Named, lazily constructed selector bindings.
//!
//! # Design
//!
//! Outer wiring layers (a derived-state registry, a per-type query
//! surface) register selector definitions by name and pull built
//! selectors out on demand. Binding validates the dependency list
//! eagerly, so configuration failures surface at registration; the
//! selector itself is constructed on first access, check-then-set, and
//! shared thereafter.
//!
//! Engine configuration is supplied once, explicitly, at registry
//! construction. There is no process-wide configuration holder, so a
//! binding can never be evaluated before its configuration exists.
//!
//! # Invariants
//!
//! 1. Each bound name builds at most one selector; every `get` returns a
//!    handle to the same cache slot.
//! 2. A name can be bound exactly once.
//! 3. Provenance is captured iff [`EngineConfig::capture_provenance`] was
//!    set when the registry was created; it never affects evaluation.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{ConfigResult, ConfigurationError, EvalResult};
use crate::provenance::Provenance;
use crate::resolve::{InputDecl, InputFn, resolve};
use crate::selector::{CombinerFn, Selector};
use crate::slice::Slice;

/// Engine-wide options, supplied once at registry construction.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Capture owning-container identity and declared name on built
    /// selectors. Diagnostic only.
    pub capture_provenance: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_provenance: true,
        }
    }
}

/// A validated definition waiting for its first access.
struct Definition<S> {
    inputs: Vec<InputFn<S>>,
    combiner: CombinerFn,
    provenance: Option<Provenance>,
}

struct Binding<S> {
    /// Taken when the selector is built.
    definition: Option<Definition<S>>,
    built: Option<Selector<S>>,
}

/// Registry of named selector definitions over one state type.
pub struct SelectorRegistry<S> {
    config: EngineConfig,
    bindings: RefCell<HashMap<String, Binding<S>>>,
}

impl<S: 'static> SelectorRegistry<S> {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            bindings: RefCell::new(HashMap::new()),
        }
    }

    /// Bind a named selector definition declared on container `C`.
    ///
    /// The dependency list is resolved now, so a non-callable input
    /// fails here, before any selector is usable. Construction itself is
    /// deferred to the first [`get`](Self::get).
    pub fn bind<C, F>(
        &self,
        name: &str,
        inputs: Vec<InputDecl<S>>,
        combiner: F,
    ) -> ConfigResult<()>
    where
        C: 'static,
        F: Fn(&[Slice]) -> EvalResult + 'static,
    {
        let inputs = resolve(inputs)?;

        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(ConfigurationError::DuplicateBinding {
                name: name.to_owned(),
            });
        }

        let provenance = self
            .config
            .capture_provenance
            .then(|| Provenance::of::<C>(name));
        bindings.insert(
            name.to_owned(),
            Binding {
                definition: Some(Definition {
                    inputs,
                    combiner: Box::new(combiner),
                    provenance,
                }),
                built: None,
            },
        );
        Ok(())
    }

    /// Fetch the selector bound under `name`, building it on first access.
    pub fn get(&self, name: &str) -> ConfigResult<Selector<S>> {
        let mut bindings = self.bindings.borrow_mut();
        let binding = bindings
            .get_mut(name)
            .ok_or_else(|| ConfigurationError::UnknownBinding {
                name: name.to_string(),
            })?;

        if let Some(built) = &binding.built {
            return Ok(built.clone());
        }

        let definition = binding
            .definition
            .take()
            .expect("unbuilt binding holds its definition");
        tracing::debug!(name, "building selector binding");
        let selector =
            Selector::from_parts(definition.inputs, definition.combiner, definition.provenance);
        binding.built = Some(selector.clone());
        Ok(selector)
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}

impl<S: 'static> Default for SelectorRegistry<S> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
