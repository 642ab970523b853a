#![forbid(unsafe_code)]

//! Dependency resolution: declared inputs into an ordered callable list.
//!
//! # Design
//!
//! A selector declares its inputs as [`InputDecl`] values: plain accessor
//! closures, previously built [`Selector`]s, or opaque dynamic handles
//! handed over by a wiring layer. Resolution normalizes all three into
//! one callable form ([`InputFn`]) and preserves declared order.
//!
//! Composite inputs are not flattened: a built selector becomes an
//! ordinary callable that consults its own cache slot when invoked, so a
//! selector depending on other selectors forms a call graph, not a
//! shared cache.
//!
//! # Invariants
//!
//! 1. Output order equals declared order.
//! 2. No deduplication: the same function declared twice is invoked twice
//!    per evaluation.
//! 3. A non-callable dynamic handle fails resolution with
//!    [`ConfigurationError::NotCallable`] before any selector exists.

use std::any::Any;
use std::rc::Rc;

use crate::error::{ConfigResult, ConfigurationError, EvalResult};
use crate::selector::Selector;
use crate::slice::Slice;

/// Callable form every declared input is normalized into.
///
/// Invoked with the shared state handle and the extra argument slices of
/// the current call.
pub type InputFn<S> = Rc<dyn Fn(&Rc<S>, &[Slice]) -> EvalResult>;

/// One declared input, before normalization.
pub enum InputDecl<S> {
    /// A plain accessor reading a slice of state.
    Accessor(InputFn<S>),
    /// A previously built selector, consulted through its own cache.
    Selector(Selector<S>),
    /// An opaque handle from a wiring layer; must resolve to a selector.
    Dynamic(Rc<dyn Any>),
}

impl<S: 'static> InputDecl<S> {
    /// Declare an infallible accessor over the state alone.
    pub fn accessor(f: impl Fn(&S) -> Slice + 'static) -> Self {
        Self::Accessor(Rc::new(move |state: &Rc<S>, _extra: &[Slice]| {
            Ok(f(state.as_ref()))
        }))
    }

    /// Declare a fallible accessor receiving the state handle and the
    /// extra argument slices.
    pub fn try_accessor(f: impl Fn(&Rc<S>, &[Slice]) -> EvalResult + 'static) -> Self {
        Self::Accessor(Rc::new(f))
    }

    /// Declare an opaque handle from a wiring layer.
    pub fn dynamic(handle: Rc<dyn Any>) -> Self {
        Self::Dynamic(handle)
    }
}

impl<S> From<Selector<S>> for InputDecl<S> {
    fn from(selector: Selector<S>) -> Self {
        Self::Selector(selector)
    }
}

/// Normalize declared inputs into callables, in declared order.
///
/// An empty declaration list resolves to an empty callable list; the
/// evaluator then keys its cache on the raw call arguments instead.
pub fn resolve<S: 'static>(declared: Vec<InputDecl<S>>) -> ConfigResult<Vec<InputFn<S>>> {
    let mut inputs = Vec::with_capacity(declared.len());
    for (position, decl) in declared.into_iter().enumerate() {
        let input = match decl {
            InputDecl::Accessor(f) => f,
            InputDecl::Selector(selector) => selector.as_input(),
            InputDecl::Dynamic(handle) => handle
                .downcast_ref::<Selector<S>>()
                .cloned()
                .ok_or(ConfigurationError::NotCallable { position })?
                .as_input(),
        };
        inputs.push(input);
    }
    Ok(inputs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
