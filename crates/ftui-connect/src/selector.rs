#![forbid(unsafe_code)]

//! Stateful selector: a derivation function plus its last result.
//!
//! # Design
//!
//! [`StatefulSelector`] wraps a pure derivation `(state, own_props) -> props`
//! and remembers the last props value and the last failure. Each
//! [`run`](StatefulSelector::run) reads the current store snapshot, derives,
//! and decides whether the result is new enough to deliver. "New" means a
//! different `Rc` (pointer identity, never a deep comparison). Fine-grained
//! memoization, e.g. returning the previous `Rc` when the relevant state
//! slice did not move, belongs to the derivation function.
//!
//! # Invariants
//!
//! 1. After a run, `should_update()` is true iff that run produced props with
//!    a different identity than the memoized ones, or the run failed, or the
//!    previous run had failed.
//! 2. A failed run keeps the memoized props.
//! 3. [`mark_delivered`](StatefulSelector::mark_delivered) clears the flag.
//! 4. A disabled selector never calls its derivation again and never reports
//!    an update.
//!
//! # Failure Modes
//!
//! - **Derivation fails**: captured and returned as
//!   [`RunOutcome::Failure`]; `run` itself never fails. The caller decides
//!   when to surface it.

use std::rc::Rc;

use crate::error::DerivationError;
use crate::store::Store;

/// A derivation function: computes props from a state snapshot and the
/// node's own props.
pub type DeriveFn<S, O, P> = Box<dyn FnMut(&Rc<S>, &O) -> Result<Rc<P>, DerivationError>>;

type StateSource<S> = Rc<dyn Fn() -> Rc<S>>;

/// Result of one [`StatefulSelector::run`].
#[derive(Debug)]
pub enum RunOutcome<P> {
    /// The derivation succeeded; carries the memoized props after the run.
    Success(Rc<P>),
    /// The derivation failed; the memoized props were left untouched.
    Failure(DerivationError),
    /// The selector was disabled at teardown; nothing ran.
    Disabled,
}

impl<P> RunOutcome<P> {
    /// The failure, if the run failed.
    #[must_use]
    pub fn failure(&self) -> Option<&DerivationError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }
}

/// A derivation function that tracks its results between runs.
pub struct StatefulSelector<S, O, P> {
    derive: Option<DeriveFn<S, O, P>>,
    state: StateSource<S>,
    props: Option<Rc<P>>,
    error: Option<DerivationError>,
    should_update: bool,
    runs: u64,
}

impl<S, O, P: std::fmt::Debug> std::fmt::Debug for StatefulSelector<S, O, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatefulSelector")
            .field("props", &self.props)
            .field("error", &self.error)
            .field("should_update", &self.should_update)
            .field("disabled", &self.derive.is_none())
            .field("runs", &self.runs)
            .finish()
    }
}

impl<S: 'static, O, P> StatefulSelector<S, O, P> {
    /// Wrap `derive`, reading snapshots from `state`.
    pub fn new(derive: DeriveFn<S, O, P>, state: impl Fn() -> Rc<S> + 'static) -> Self {
        Self {
            derive: Some(derive),
            state: Rc::new(state),
            props: None,
            error: None,
            should_update: false,
            runs: 0,
        }
    }

    /// Wrap `derive`, reading snapshots from `store`.
    pub fn for_store<St: Store<State = S>>(derive: DeriveFn<S, O, P>, store: &Rc<St>) -> Self {
        let store = Rc::clone(store);
        Self::new(derive, move || store.get_state())
    }

    /// Derive against the current snapshot and `own_props`.
    pub fn run(&mut self, own_props: &O) -> RunOutcome<P> {
        let Some(derive) = self.derive.as_mut() else {
            return RunOutcome::Disabled;
        };
        let state = (self.state)();
        self.runs += 1;

        match derive(&state, own_props) {
            Ok(next) => {
                let changed = self.error.is_some()
                    || self
                        .props
                        .as_ref()
                        .is_none_or(|prev| !Rc::ptr_eq(prev, &next));
                self.should_update = changed;
                self.error = None;
                if changed {
                    self.props = Some(Rc::clone(&next));
                    RunOutcome::Success(next)
                } else {
                    // Hand back the memoized Rc, identical to `next`.
                    RunOutcome::Success(self.props.clone().unwrap_or(next))
                }
            }
            Err(err) => {
                self.should_update = true;
                self.error = Some(err.clone());
                RunOutcome::Failure(err)
            }
        }
    }

    /// Whether the last run produced something the host must see.
    #[must_use]
    pub fn should_update(&self) -> bool {
        self.should_update
    }

    /// Clear the update flag once the host has received the props.
    pub fn mark_delivered(&mut self) {
        self.should_update = false;
    }

    /// Memoized props from the last successful run.
    #[must_use]
    pub fn props(&self) -> Option<&Rc<P>> {
        self.props.as_ref()
    }

    /// Failure captured by the last run, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<&DerivationError> {
        self.error.as_ref()
    }

    /// Turn [`run`](Self::run) into a no-op and clear the update flag.
    ///
    /// Dropping the derivation releases whatever it captured.
    pub fn disable(&mut self) {
        self.derive = None;
        self.should_update = false;
    }

    /// Whether [`disable`](Self::disable) was called.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.derive.is_none()
    }

    /// Number of derivation calls so far.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, PartialEq)]
    struct Doubled {
        value: i32,
    }

    /// State source the test can swap.
    fn source(initial: i32) -> (Rc<RefCell<Rc<i32>>>, impl Fn() -> Rc<i32>) {
        let cell = Rc::new(RefCell::new(Rc::new(initial)));
        let read = Rc::clone(&cell);
        (cell, move || Rc::clone(&*read.borrow()))
    }

    /// Derivation memoized on state identity.
    fn memo_double() -> DeriveFn<i32, (), Doubled> {
        let mut last: Option<(Rc<i32>, Rc<Doubled>)> = None;
        Box::new(move |state: &Rc<i32>, _: &()| {
            if let Some((prev_state, prev_props)) = &last {
                if Rc::ptr_eq(prev_state, state) {
                    return Ok(Rc::clone(prev_props));
                }
            }
            let props = Rc::new(Doubled { value: **state * 2 });
            last = Some((Rc::clone(state), Rc::clone(&props)));
            Ok(props)
        })
    }

    #[test]
    fn first_run_is_an_update() {
        let (_cell, read) = source(1);
        let mut selector = StatefulSelector::new(memo_double(), read);
        assert!(!selector.should_update());

        let outcome = selector.run(&());
        assert!(matches!(outcome, RunOutcome::Success(ref p) if p.value == 2));
        assert!(selector.should_update());
        assert_eq!(selector.runs(), 1);
    }

    #[test]
    fn same_identity_is_not_an_update() {
        let (_cell, read) = source(1);
        let mut selector = StatefulSelector::new(memo_double(), read);
        selector.run(&());
        selector.mark_delivered();

        selector.run(&());
        assert!(!selector.should_update());
        assert_eq!(selector.props().map(|p| p.value), Some(2));
    }

    #[test]
    fn new_identity_is_an_update() {
        let (cell, read) = source(1);
        let mut selector = StatefulSelector::new(memo_double(), read);
        selector.run(&());
        selector.mark_delivered();

        *cell.borrow_mut() = Rc::new(2);
        let outcome = selector.run(&());
        assert!(selector.should_update());
        assert!(matches!(outcome, RunOutcome::Success(ref p) if p.value == 4));
    }

    #[test]
    fn flag_reflects_latest_run_only() {
        let (_cell, read) = source(1);
        let mut selector = StatefulSelector::new(memo_double(), read);
        selector.run(&());
        assert!(selector.should_update());

        // Not delivered, but the next run produced nothing new.
        selector.run(&());
        assert!(!selector.should_update());
    }

    #[test]
    fn failure_is_captured_and_keeps_props() {
        let (_cell, read) = source(1);
        let fail = Rc::new(Cell::new(false));
        let f = Rc::clone(&fail);
        let shared = Rc::new(Doubled { value: 7 });
        let props = Rc::clone(&shared);
        let derive: DeriveFn<i32, (), Doubled> = Box::new(move |_, _| {
            if f.get() {
                Err(DerivationError::msg("bad slice"))
            } else {
                Ok(Rc::clone(&props))
            }
        });
        let mut selector = StatefulSelector::new(derive, read);
        selector.run(&());
        selector.mark_delivered();

        fail.set(true);
        let outcome = selector.run(&());
        assert!(outcome.failure().is_some());
        assert!(selector.should_update());
        assert!(selector.error().is_some());
        assert!(Rc::ptr_eq(selector.props().unwrap(), &shared));

        // Recovering with the very same props still counts as a change.
        fail.set(false);
        selector.mark_delivered();
        selector.run(&());
        assert!(selector.should_update());
        assert!(selector.error().is_none());
    }

    #[test]
    fn disabled_selector_is_inert() {
        let (_cell, read) = source(1);
        let mut selector = StatefulSelector::new(memo_double(), read);
        selector.run(&());
        selector.disable();

        assert!(selector.is_disabled());
        assert!(!selector.should_update());
        assert!(matches!(selector.run(&()), RunOutcome::Disabled));
        assert_eq!(selector.runs(), 1);
        assert!(!selector.should_update());
    }

    #[test]
    fn own_props_reach_derivation() {
        let (_cell, read) = source(10);
        let derive: DeriveFn<i32, i32, i32> =
            Box::new(|state, offset| Ok(Rc::new(**state + offset)));
        let mut selector = StatefulSelector::new(derive, read);
        assert!(matches!(selector.run(&5), RunOutcome::Success(ref p) if **p == 15));
    }

    #[test]
    fn debug_format() {
        let (_cell, read) = source(1);
        let mut selector = StatefulSelector::new(memo_double(), read);
        selector.run(&());
        let dbg = format!("{selector:?}");
        assert!(dbg.contains("StatefulSelector"));
        assert!(dbg.contains("should_update: true"));
    }
}
