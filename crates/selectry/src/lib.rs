#![forbid(unsafe_code)]

//! Single-slot memoization engine for derived-state selectors.
//!
//! A selector is built from input accessors that each read a slice of a
//! larger immutable state object and a combiner that computes a derived
//! value from those slices. Evaluation recomputes the derived value only
//! when at least one input slice has changed (shallow comparison) since
//! the previous call; otherwise the cached value is returned without
//! running the combiner.
//!
//! # Architecture
//!
//! - [`Slice`]: type-erased slice values carrying their own shallow
//!   comparison (value semantics for scalars, allocation identity for
//!   shared aggregates).
//! - [`resolve`]: normalizes declared inputs ([`InputDecl`]) into an
//!   ordered callable list; non-callable dynamic handles fail here.
//! - [`build`] / [`Selector`]: the memoized evaluator with its
//!   one-generation cache slot.
//! - [`SelectorRegistry`]: named, lazily constructed bindings for outer
//!   wiring layers, configured explicitly via [`EngineConfig`].
//!
//! Selectors use `Rc`/`RefCell` interior state and are deliberately
//! `!Send`/`!Sync`: the engine performs no locking, and serialized access
//! to one selector instance is enforced by the compiler.
//!
//! # Invariants
//!
//! 1. A cache hit never invokes the combiner and costs one shallow
//!    comparison per input.
//! 2. The cache holds exactly one generation per selector.
//! 3. Evaluation errors propagate unchanged and never corrupt the slot.
//! 4. Composite selectors form a call graph of independently cached
//!    nodes; nothing is flattened into a shared cache.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use selectry::{InputDecl, Slice, build};
//!
//! struct App {
//!     x: i64,
//!     y: i64,
//! }
//!
//! let sum = build(
//!     vec![
//!         InputDecl::accessor(|s: &App| Slice::of(s.x)),
//!         InputDecl::accessor(|s: &App| Slice::of(s.y)),
//!     ],
//!     |argv| {
//!         let x = argv[0].downcast_ref::<i64>().copied().unwrap_or_default();
//!         let y = argv[1].downcast_ref::<i64>().copied().unwrap_or_default();
//!         Ok(Slice::of(x + y))
//!     },
//!     None,
//! )
//! .unwrap();
//!
//! let state = Rc::new(App { x: 1, y: 2 });
//! assert_eq!(sum.eval(&state).unwrap().downcast_ref::<i64>(), Some(&3));
//! // Unchanged slices: cached, the combiner does not run again.
//! assert_eq!(sum.eval(&state).unwrap().downcast_ref::<i64>(), Some(&3));
//! assert_eq!(sum.version(), 1);
//! ```

pub mod error;
pub mod provenance;
pub mod registry;
pub mod resolve;
pub mod selector;
pub mod slice;

pub use error::{ConfigResult, ConfigurationError, EvalError, EvalResult};
pub use provenance::Provenance;
pub use registry::{EngineConfig, SelectorRegistry};
pub use resolve::{InputDecl, InputFn, resolve};
pub use selector::{CombinerFn, Selector, build};
pub use slice::Slice;
