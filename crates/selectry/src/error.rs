#![forbid(unsafe_code)]

//! Error taxonomy for the selector engine.
//!
//! Construction-time failures are [`ConfigurationError`]: they occur
//! before any selector is usable and are never retried. Evaluation-time
//! failures are whatever a user-supplied input or combiner returns; the
//! engine propagates them unchanged as [`EvalError`] and never wraps,
//! catches, or retries them.

use thiserror::Error;

use crate::slice::Slice;

/// Result alias for construction-time operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// Pass-through error raised by a user-supplied input or combiner.
///
/// The engine never constructs one of these itself; it only forwards
/// them to the caller with the cache slot left untouched.
pub type EvalError = Box<dyn std::error::Error + 'static>;

/// Result of one selector evaluation.
pub type EvalResult = std::result::Result<Slice, EvalError>;

/// Fatal construction-time failure. Raised before any selector exists.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A dynamic input handle did not resolve to a callable selector.
    #[error("declared input at position {position} is not callable")]
    NotCallable { position: usize },

    /// A registry name was bound twice.
    #[error("selector name already bound: {name}")]
    DuplicateBinding { name: String },

    /// A registry lookup named a selector that was never bound.
    #[error("no selector bound under name: {name}")]
    UnknownBinding { name: String },
}
