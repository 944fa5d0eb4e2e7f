#![forbid(unsafe_code)]

//! The final-props selector behind `connect`.
//!
//! # Pure mode
//!
//! The first call computes state props, dispatch props and the merge.
//! After that, each call classifies what moved and recomputes only the
//! affected parts:
//!
//! | Own props | State | Recompute |
//! |-----------|-------|-----------|
//! | changed | changed | state props; dispatch props if they depend on own props; merge |
//! | changed | same | each part that depends on own props; merge |
//! | same | changed | state props; merge only if they are not equal to the previous ones |
//! | same | same | nothing |
//!
//! The merged `Rc` is returned unchanged whenever nothing was recomputed,
//! which is what lets the stateful selector skip the render.
//!
//! # Impure mode
//!
//! Every call recomputes all three parts and merges.

use std::rc::Rc;

use crate::error::DerivationError;
use crate::options::FactoryOptions;
use crate::selector::DeriveFn;
use crate::store::Dispatch;

use super::map_to_props::Subselector;
use super::merge_props::MergeFn;

pub(crate) type Equality<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Equality checks used by a pure selector.
pub(crate) struct Comparators<S, O, SP> {
    pub(crate) are_states_equal: Equality<Rc<S>>,
    pub(crate) are_own_props_equal: Equality<O>,
    pub(crate) are_state_props_equal: Equality<SP>,
}

impl<S, O, SP> Clone for Comparators<S, O, SP> {
    fn clone(&self) -> Self {
        Self {
            are_states_equal: Rc::clone(&self.are_states_equal),
            are_own_props_equal: Rc::clone(&self.are_own_props_equal),
            are_state_props_equal: Rc::clone(&self.are_state_props_equal),
        }
    }
}

/// The per-binding pieces a final-props selector is assembled from.
pub(crate) struct Parts<S, A, O, SP, DP, MP> {
    pub(crate) map_state: Subselector<Rc<S>, O, SP>,
    pub(crate) map_dispatch: Subselector<Dispatch<A>, O, DP>,
    pub(crate) merge: MergeFn<O, SP, DP, MP>,
    pub(crate) dispatch: Dispatch<A>,
}

struct Memo<S, O, SP, DP, MP> {
    state: Rc<S>,
    own_props: O,
    state_props: Rc<SP>,
    dispatch_props: Rc<DP>,
    merged: Rc<MP>,
}

struct PureSelector<S, A, O, SP, DP, MP> {
    parts: Parts<S, A, O, SP, DP, MP>,
    eq: Comparators<S, O, SP>,
    memo: Option<Memo<S, O, SP, DP, MP>>,
}

impl<S, A, O: Clone, SP, DP, MP> PureSelector<S, A, O, SP, DP, MP> {
    fn first_call(&mut self, state: &Rc<S>, own_props: &O) -> Result<Rc<MP>, DerivationError> {
        let parts = &mut self.parts;
        let state_props = parts.map_state.call(state, own_props)?;
        let dispatch_props = parts.map_dispatch.call(&parts.dispatch, own_props)?;
        let merged = (parts.merge)(&state_props, &dispatch_props, own_props);
        self.memo = Some(Memo {
            state: Rc::clone(state),
            own_props: own_props.clone(),
            state_props,
            dispatch_props,
            merged: Rc::clone(&merged),
        });
        Ok(merged)
    }

    fn run(&mut self, state: &Rc<S>, own_props: &O) -> Result<Rc<MP>, DerivationError> {
        let Some(memo) = self.memo.as_mut() else {
            return self.first_call(state, own_props);
        };
        let parts = &mut self.parts;
        let props_changed = !(self.eq.are_own_props_equal)(own_props, &memo.own_props);
        let state_changed = !(self.eq.are_states_equal)(state, &memo.state);

        match (props_changed, state_changed) {
            (true, true) => {
                memo.state_props = parts.map_state.call(state, own_props)?;
                if parts.map_dispatch.depends_on_own_props() {
                    memo.dispatch_props = parts.map_dispatch.call(&parts.dispatch, own_props)?;
                }
                memo.merged = (parts.merge)(&memo.state_props, &memo.dispatch_props, own_props);
            }
            (true, false) => {
                if parts.map_state.depends_on_own_props() {
                    memo.state_props = parts.map_state.call(state, own_props)?;
                }
                if parts.map_dispatch.depends_on_own_props() {
                    memo.dispatch_props = parts.map_dispatch.call(&parts.dispatch, own_props)?;
                }
                memo.merged = (parts.merge)(&memo.state_props, &memo.dispatch_props, own_props);
            }
            (false, true) => {
                let next = parts.map_state.call(state, own_props)?;
                let changed = !(self.eq.are_state_props_equal)(&next, &memo.state_props);
                memo.state_props = next;
                if changed {
                    memo.merged = (parts.merge)(&memo.state_props, &memo.dispatch_props, own_props);
                }
            }
            (false, false) => {}
        }
        // Inputs are committed only once every recompute succeeded.
        memo.state = Rc::clone(state);
        if props_changed {
            memo.own_props = own_props.clone();
        }
        Ok(Rc::clone(&memo.merged))
    }
}

/// Assemble the derivation function for one binding.
pub(crate) fn final_props_selector<S, A, O, SP, DP, MP>(
    parts: Parts<S, A, O, SP, DP, MP>,
    eq: Comparators<S, O, SP>,
    pure: bool,
    options: &FactoryOptions,
) -> DeriveFn<S, O, MP>
where
    S: 'static,
    A: 'static,
    O: Clone + 'static,
    SP: 'static,
    DP: 'static,
    MP: 'static,
{
    tracing::trace!(display_name = %options.display_name, pure, "final props selector built");
    if pure {
        let mut selector = PureSelector {
            parts,
            eq,
            memo: None,
        };
        Box::new(move |state: &Rc<S>, own_props: &O| selector.run(state, own_props))
    } else {
        let mut parts = parts;
        Box::new(move |state: &Rc<S>, own_props: &O| {
            let state_props = parts.map_state.call(state, own_props)?;
            let dispatch_props = parts.map_dispatch.call(&parts.dispatch, own_props)?;
            Ok((parts.merge)(&state_props, &dispatch_props, own_props))
        })
    }
}
