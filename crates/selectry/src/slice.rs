#![forbid(unsafe_code)]

//! Type-erased slice values with shallow equality.
//!
//! # Design
//!
//! A [`Slice`] is the value an input accessor hands to the memoization
//! engine: one piece of a larger immutable state object. Slices are
//! type-erased (`Rc<dyn Any>`) so selectors with heterogeneous input types
//! share a single evaluation path, and each slice carries the comparison
//! function chosen at construction:
//!
//! - [`Slice::of`] wraps a value compared by `==`. Use it for cheap scalar
//!   slices (numbers, flags, small copies) where value identity is the
//!   meaningful notion of "unchanged".
//! - [`Slice::shared`] wraps a shared allocation compared by
//!   [`Rc::ptr_eq`]. Use it for aggregate slices where only the same
//!   allocation counts as unchanged; two distinct allocations with equal
//!   contents are different.
//!
//! # Invariants
//!
//! 1. Two clones of one `Slice` always compare shallow-equal (identical
//!    allocation is a fast path taken before the per-type comparison).
//! 2. Slices wrapping different concrete types never compare equal.
//! 3. Comparison is O(1) for `shared` slices and as cheap as the wrapped
//!    type's `==` for `of` slices; the engine never looks deeper.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A type-erased value flowing between selectors, compared shallowly.
///
/// Cloning a `Slice` is cheap (one `Rc` clone) and preserves identity:
/// the clone compares shallow-equal to the original.
#[derive(Clone)]
pub struct Slice {
    value: Rc<dyn Any>,
    same: fn(&Slice, &Slice) -> bool,
}

impl Slice {
    /// Wrap a value compared by `==`.
    #[must_use]
    pub fn of<T: PartialEq + 'static>(value: T) -> Self {
        Self {
            value: Rc::new(value),
            same: value_same::<T>,
        }
    }

    /// Wrap a shared allocation compared by pointer identity.
    #[must_use]
    pub fn shared<T: 'static>(value: Rc<T>) -> Self {
        Self {
            value,
            same: identity_same,
        }
    }

    /// Borrow the wrapped value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take shared ownership of the wrapped value if it is a `T`.
    #[must_use]
    pub fn downcast_rc<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.value).downcast::<T>().ok()
    }

    /// Shallow comparison: allocation identity first, then the comparison
    /// this slice was constructed with.
    #[must_use]
    pub fn shallow_eq(&self, other: &Slice) -> bool {
        Rc::ptr_eq(&self.value, &other.value) || (self.same)(self, other)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("type_id", &self.value.type_id())
            .finish_non_exhaustive()
    }
}

fn value_same<T: PartialEq + 'static>(a: &Slice, b: &Slice) -> bool {
    match (a.value.downcast_ref::<T>(), b.value.downcast_ref::<T>()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn identity_same(a: &Slice, b: &Slice) -> bool {
    Rc::ptr_eq(&a.value, &b.value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
