#![forbid(unsafe_code)]

//! Memoized evaluation of derived-state selectors.
//!
//! # Design
//!
//! A [`Selector`] wraps a combiner function and its resolved input list
//! together with a single-generation cache slot in shared, reference-
//! counted storage. Each evaluation computes the input tuple for the
//! current call, compares it slot-by-slot against the tuple captured on
//! the previous successful call, and either returns the cached derived
//! value or re-runs the combiner and refreshes the slot.
//!
//! # Invariants
//!
//! 1. A cache hit returns the stored result without invoking the
//!    combiner; hit cost is one shallow comparison per input.
//! 2. The slot holds exactly one generation: the last input tuple and the
//!    last result. There is no history.
//! 3. The cached result is returned only when every stored slot compares
//!    shallow-equal to the freshly computed input.
//! 4. `version` increments by exactly 1 per recomputation, never on a hit.
//! 5. Inputs are evaluated fully, in declared order, before the combiner
//!    runs.
//!
//! # Failure Modes
//!
//! - **Input or combiner error**: propagated to the caller unchanged; the
//!   slot is not written, so a previously valid generation stays valid
//!   for the next call.
//! - **Combiner panic**: same containment; the slot is only written after
//!   the combiner returns successfully.
//! - **Concurrent use**: not possible. The selector is `!Send`/`!Sync`
//!   (`Rc`/`RefCell` interior), so serialized access is enforced by the
//!   compiler rather than by convention.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{ConfigResult, EvalResult};
use crate::provenance::Provenance;
use crate::resolve::{InputDecl, InputFn, resolve};
use crate::slice::Slice;

/// User-supplied combiner: receives the computed input slices followed by
/// any unconsumed extra argument slices.
pub type CombinerFn = Box<dyn Fn(&[Slice]) -> EvalResult>;

/// Single-generation cache owned by one selector.
enum CacheSlot {
    Empty,
    Populated { key: Vec<Slice>, result: Slice },
}

/// Shared interior for [`Selector`].
struct SelectorInner<S> {
    inputs: Vec<InputFn<S>>,
    combiner: CombinerFn,
    provenance: Option<Provenance>,
    slot: RefCell<CacheSlot>,
    /// Monotonically increasing recomputation count.
    version: Cell<u64>,
}

/// A memoized derived-state computation over a shared state handle.
///
/// Cloning a `Selector` creates a new handle to the **same** cache slot;
/// composition and registries share one generation per built selector.
pub struct Selector<S> {
    inner: Rc<SelectorInner<S>>,
}

impl<S> Clone for Selector<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for Selector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let populated = matches!(&*self.inner.slot.borrow(), CacheSlot::Populated { .. });
        f.debug_struct("Selector")
            .field("inputs", &self.inner.inputs.len())
            .field("provenance", &self.inner.provenance)
            .field("populated", &populated)
            .field("version", &self.inner.version.get())
            .finish()
    }
}

/// Build a selector from declared inputs and a combiner.
///
/// This is the sole construction entry point. Resolution failures
/// surface here, before any selector exists; an empty input list means
/// the raw call arguments act as the cache key.
pub fn build<S, C>(
    inputs: Vec<InputDecl<S>>,
    combiner: C,
    provenance: Option<Provenance>,
) -> ConfigResult<Selector<S>>
where
    S: 'static,
    C: Fn(&[Slice]) -> EvalResult + 'static,
{
    let inputs = resolve(inputs)?;
    Ok(Selector::from_parts(inputs, Box::new(combiner), provenance))
}

impl<S: 'static> Selector<S> {
    pub(crate) fn from_parts(
        inputs: Vec<InputFn<S>>,
        combiner: CombinerFn,
        provenance: Option<Provenance>,
    ) -> Self {
        Self {
            inner: Rc::new(SelectorInner {
                inputs,
                combiner,
                provenance,
                slot: RefCell::new(CacheSlot::Empty),
                version: Cell::new(0),
            }),
        }
    }

    /// Evaluate against a state handle with no extra arguments.
    pub fn eval(&self, state: &Rc<S>) -> EvalResult {
        self.eval_with(state, &[])
    }

    /// Evaluate against a state handle plus extra argument slices.
    ///
    /// Extra slices are forwarded to the inputs and (on a miss) to the
    /// combiner after the computed inputs. They enter the cache key only
    /// through inputs that read them, or directly when the input list is
    /// empty and the raw arguments are the key.
    pub fn eval_with(&self, state: &Rc<S>, extra: &[Slice]) -> EvalResult {
        let inner = &self.inner;

        // Compute the full input tuple before touching the slot. Raw call
        // arguments act as the tuple when no inputs are declared.
        let key: Vec<Slice> = if inner.inputs.is_empty() {
            let mut key = Vec::with_capacity(1 + extra.len());
            key.push(Slice::shared(Rc::clone(state)));
            key.extend_from_slice(extra);
            key
        } else {
            let mut key = Vec::with_capacity(inner.inputs.len());
            for input in &inner.inputs {
                key.push(input(state, extra)?);
            }
            key
        };

        if let CacheSlot::Populated { key: cached, result } = &*inner.slot.borrow() {
            if cached.len() == key.len()
                && key.iter().zip(cached).all(|(new, old)| new.shallow_eq(old))
            {
                return Ok(result.clone());
            }
        }

        // Miss: combiner sees the computed inputs, then the unconsumed
        // extra arguments. Any error leaves the previous generation
        // intact.
        let result = if inner.inputs.is_empty() {
            (inner.combiner)(&key)?
        } else {
            let argv: Vec<Slice> = key.iter().chain(extra).cloned().collect();
            (inner.combiner)(&argv)?
        };

        *inner.slot.borrow_mut() = CacheSlot::Populated {
            key,
            result: result.clone(),
        };
        inner.version.set(inner.version.get() + 1);
        tracing::trace!(
            version = inner.version.get(),
            provenance = ?inner.provenance,
            "selector recomputed"
        );
        Ok(result)
    }

    /// Diagnostic metadata attached at construction, if any.
    #[must_use]
    pub fn provenance(&self) -> Option<&Provenance> {
        self.inner.provenance.as_ref()
    }

    /// Number of declared inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inner.inputs.len()
    }

    /// Whether the cache slot holds a previous generation.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        matches!(&*self.inner.slot.borrow(), CacheSlot::Populated { .. })
    }

    /// Recomputation count. Increments by 1 on each cache miss.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Adapt this selector into the callable input form, so a composite
    /// selector consults this one's cache like any other function.
    pub(crate) fn as_input(&self) -> InputFn<S> {
        let selector = self.clone();
        Rc::new(move |state: &Rc<S>, extra: &[Slice]| selector.eval_with(state, extra))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct App {
        x: i64,
        y: i64,
    }

    fn sum_selector(calls: &Rc<Cell<u32>>) -> Selector<App> {
        let calls = Rc::clone(calls);
        build(
            vec![
                InputDecl::accessor(|s: &App| Slice::of(s.x)),
                InputDecl::accessor(|s: &App| Slice::of(s.y)),
            ],
            move |argv| {
                calls.set(calls.get() + 1);
                let x = argv[0].downcast_ref::<i64>().copied().unwrap_or_default();
                let y = argv[1].downcast_ref::<i64>().copied().unwrap_or_default();
                Ok(Slice::of(x + y))
            },
            None,
        )
        .unwrap()
    }

    fn get_i64(result: EvalResult) -> i64 {
        *result.unwrap().downcast_ref::<i64>().unwrap()
    }

    #[test]
    fn combiner_runs_once_per_distinct_input_tuple() {
        let calls = Rc::new(Cell::new(0));
        let sum = sum_selector(&calls);

        let state = Rc::new(App { x: 1, y: 2 });
        assert_eq!(get_i64(sum.eval(&state)), 3);
        assert_eq!(calls.get(), 1);

        // Same object: hit.
        assert_eq!(get_i64(sum.eval(&state)), 3);
        assert_eq!(calls.get(), 1);

        // New object, equal slices: still a hit (value slices).
        let same = Rc::new(App { x: 1, y: 2 });
        assert_eq!(get_i64(sum.eval(&same)), 3);
        assert_eq!(calls.get(), 1);

        // One slice differs: miss.
        let changed = Rc::new(App { x: 1, y: 3 });
        assert_eq!(get_i64(sum.eval(&changed)), 4);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn version_tracks_misses_only() {
        let calls = Rc::new(Cell::new(0));
        let sum = sum_selector(&calls);
        assert_eq!(sum.version(), 0);
        assert!(!sum.is_populated());

        let state = Rc::new(App { x: 1, y: 2 });
        let _ = sum.eval(&state);
        assert_eq!(sum.version(), 1);
        assert!(sum.is_populated());

        let _ = sum.eval(&state);
        assert_eq!(sum.version(), 1);

        let _ = sum.eval(&Rc::new(App { x: 9, y: 2 }));
        assert_eq!(sum.version(), 2);
    }

    #[test]
    fn empty_inputs_key_on_raw_arguments() {
        let calls = Rc::new(Cell::new(0));
        let calls_in = Rc::clone(&calls);
        let snapshot = build::<App, _>(
            vec![],
            move |argv| {
                calls_in.set(calls_in.get() + 1);
                let state = argv[0].downcast_ref::<App>().unwrap();
                Ok(Slice::of(state.x * 100 + state.y))
            },
            None,
        )
        .unwrap();

        let state = Rc::new(App { x: 1, y: 2 });
        assert_eq!(get_i64(snapshot.eval(&state)), 102);
        assert_eq!(get_i64(snapshot.eval(&state)), 102);
        assert_eq!(calls.get(), 1);

        // Distinct allocation with equal contents: the state handle is an
        // identity slice, so this is a miss.
        let other = Rc::new(App { x: 1, y: 2 });
        assert_eq!(get_i64(snapshot.eval(&other)), 102);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn empty_inputs_key_includes_extras() {
        let calls = Rc::new(Cell::new(0));
        let calls_in = Rc::clone(&calls);
        let sel = build::<App, _>(
            vec![],
            move |argv| {
                calls_in.set(calls_in.get() + 1);
                let state = argv[0].downcast_ref::<App>().unwrap();
                let offset = argv[1].downcast_ref::<i64>().copied().unwrap_or_default();
                Ok(Slice::of(state.x + offset))
            },
            None,
        )
        .unwrap();

        let state = Rc::new(App { x: 10, y: 0 });
        assert_eq!(get_i64(sel.eval_with(&state, &[Slice::of(5i64)])), 15);
        assert_eq!(get_i64(sel.eval_with(&state, &[Slice::of(5i64)])), 15);
        assert_eq!(calls.get(), 1);

        assert_eq!(get_i64(sel.eval_with(&state, &[Slice::of(7i64)])), 17);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn extras_flow_through_inputs_into_the_key() {
        let calls = Rc::new(Cell::new(0));
        let calls_in = Rc::clone(&calls);
        let sel = build::<App, _>(
            vec![InputDecl::try_accessor(|state: &Rc<App>, extra: &[Slice]| {
                let offset = extra
                    .first()
                    .and_then(|s| s.downcast_ref::<i64>())
                    .copied()
                    .unwrap_or_default();
                Ok(Slice::of(state.x + offset))
            })],
            move |argv| {
                calls_in.set(calls_in.get() + 1);
                Ok(argv[0].clone())
            },
            None,
        )
        .unwrap();

        let state = Rc::new(App { x: 1, y: 0 });
        assert_eq!(get_i64(sel.eval_with(&state, &[Slice::of(1i64)])), 2);
        assert_eq!(get_i64(sel.eval_with(&state, &[Slice::of(1i64)])), 2);
        assert_eq!(calls.get(), 1);

        assert_eq!(get_i64(sel.eval_with(&state, &[Slice::of(2i64)])), 3);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn combiner_error_leaves_previous_generation_valid() {
        let calls = Rc::new(Cell::new(0));
        let fail = Rc::new(Cell::new(false));
        let calls_in = Rc::clone(&calls);
        let fail_in = Rc::clone(&fail);

        let sel = build(
            vec![InputDecl::accessor(|s: &App| Slice::of(s.x))],
            move |argv| {
                if fail_in.get() {
                    return Err("combiner failed".into());
                }
                calls_in.set(calls_in.get() + 1);
                Ok(argv[0].clone())
            },
            None,
        )
        .unwrap();

        let first = Rc::new(App { x: 1, y: 0 });
        assert_eq!(get_i64(sel.eval(&first)), 1);
        assert_eq!(sel.version(), 1);

        // Failing call: error surfaces, slot untouched.
        fail.set(true);
        let err = sel.eval(&Rc::new(App { x: 2, y: 0 })).unwrap_err();
        assert_eq!(err.to_string(), "combiner failed");
        assert_eq!(sel.version(), 1);

        // Pre-failure inputs still hit the cache without re-running the
        // combiner, even though the combiner would fail if invoked.
        assert_eq!(get_i64(sel.eval(&first)), 1);
        assert_eq!(calls.get(), 1);

        fail.set(false);
        assert_eq!(get_i64(sel.eval(&Rc::new(App { x: 2, y: 0 }))), 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn input_error_propagates_unchanged() {
        let sel = build::<App, _>(
            vec![InputDecl::try_accessor(|_: &Rc<App>, _: &[Slice]| {
                Err("input failed".into())
            })],
            |argv| Ok(argv[0].clone()),
            None,
        )
        .unwrap();

        let err = sel.eval(&Rc::new(App { x: 0, y: 0 })).unwrap_err();
        assert_eq!(err.to_string(), "input failed");
        assert!(!sel.is_populated());
    }

    #[test]
    fn inputs_evaluate_in_declared_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = Rc::clone(&order);
        let o2 = Rc::clone(&order);

        let sel = build::<App, _>(
            vec![
                InputDecl::try_accessor(move |state: &Rc<App>, _: &[Slice]| {
                    o1.borrow_mut().push("x");
                    Ok(Slice::of(state.x))
                }),
                InputDecl::try_accessor(move |state: &Rc<App>, _: &[Slice]| {
                    o2.borrow_mut().push("y");
                    Ok(Slice::of(state.y))
                }),
            ],
            |_| Ok(Slice::of(0i64)),
            None,
        )
        .unwrap();

        let _ = sel.eval(&Rc::new(App { x: 1, y: 2 }));
        assert_eq!(*order.borrow(), vec!["x", "y"]);
    }

    #[test]
    fn clone_shares_the_cache_slot() {
        let calls = Rc::new(Cell::new(0));
        let sum = sum_selector(&calls);
        let alias = sum.clone();

        let state = Rc::new(App { x: 2, y: 3 });
        assert_eq!(get_i64(sum.eval(&state)), 5);
        assert_eq!(get_i64(alias.eval(&state)), 5);
        assert_eq!(calls.get(), 1);
        assert_eq!(alias.version(), 1);
    }

    #[test]
    fn provenance_is_introspectable_and_inert() {
        let calls = Rc::new(Cell::new(0));
        let calls_in = Rc::clone(&calls);
        struct CounterQueries;

        let sel = build(
            vec![InputDecl::accessor(|s: &App| Slice::of(s.x))],
            move |argv| {
                calls_in.set(calls_in.get() + 1);
                Ok(argv[0].clone())
            },
            Some(Provenance::of::<CounterQueries>("x")),
        )
        .unwrap();

        assert_eq!(sel.provenance().unwrap().name(), "x");

        // Metadata never affects caching.
        let state = Rc::new(App { x: 1, y: 0 });
        let _ = sel.eval(&state);
        let _ = sel.eval(&state);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn debug_format_reports_shape() {
        let calls = Rc::new(Cell::new(0));
        let sum = sum_selector(&calls);
        let dbg = format!("{sum:?}");
        assert!(dbg.contains("Selector"));
        assert!(dbg.contains("inputs: 2"));
    }
}
