#![forbid(unsafe_code)]

//! `connect`: the conventional binding built on [`connect_advanced`].
//!
//! A [`Connect`] assembles a selector factory from three parts:
//!
//! - a state mapper ([`MapStateToProps`]),
//! - a dispatch mapper ([`MapDispatchToProps`]),
//! - a merge ([`MergeProps`]), by default [`MergedProps`].
//!
//! In pure mode (the default) the resulting derivation memoizes on own
//! props, state identity and state-props equality, so unrelated store
//! changes never reach the host.
//!
//! # Example
//!
//! ```ignore
//! let todo_list = Connect::new(
//!     MapStateToProps::from_state(|s: &AppState| VisibleTodos::from(s)),
//!     MapDispatchToProps::dispatch_only(),
//! )
//! .connect_to(Some(store))
//! .wrap("TodoList");
//! ```
//!
//! [`connect_advanced`]: crate::binding::connect_advanced

pub mod map_to_props;
pub mod merge_props;
mod selector_factory;
pub mod verify;

use std::rc::Rc;

use crate::binding::{ConnectAdvanced, connect_advanced};
use crate::options::{ConnectOptions, FactoryOptions};
use crate::selector::DeriveFn;
use crate::store::{Dispatch, Store};

pub use map_to_props::{DispatchProps, MapDispatchToProps, MapStateToProps, MapToProps, Subselector};
pub use merge_props::{MergeProps, MergedProps};
pub use verify::{ConnectWarning, PlainObject, verify_plain_object, verify_subselectors};

use selector_factory::{Comparators, Parts, final_props_selector};

/// A `connect` definition, not yet bound to a store.
pub struct Connect<S, A, O, SP, DP, MP> {
    map_state: MapStateToProps<S, O, SP>,
    map_dispatch: MapDispatchToProps<A, O, DP>,
    merge: MergeProps<O, SP, DP, MP>,
    pure: bool,
    eq: Comparators<S, O, SP>,
}

impl<S, A, O, SP, DP, MP> Clone for Connect<S, A, O, SP, DP, MP> {
    fn clone(&self) -> Self {
        Self {
            map_state: self.map_state.clone(),
            map_dispatch: self.map_dispatch.clone(),
            merge: self.merge.clone(),
            pure: self.pure,
            eq: self.eq.clone(),
        }
    }
}

impl<S, A, O, SP, DP, MP> std::fmt::Debug for Connect<S, A, O, SP, DP, MP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connect")
            .field("map_state", &self.map_state)
            .field("map_dispatch", &self.map_dispatch)
            .field("merge", &self.merge)
            .field("pure", &self.pure)
            .finish()
    }
}

impl<S, A, O, SP, DP> Connect<S, A, O, SP, DP, MergedProps<O, SP, DP>>
where
    S: 'static,
    A: 'static,
    O: Clone + PartialEq + 'static,
    SP: PartialEq + 'static,
    DP: 'static,
{
    /// Pure `connect` with the default merge and default comparators:
    /// states by `Rc` identity, own props and state props by `PartialEq`.
    pub fn new(
        map_state: MapStateToProps<S, O, SP>,
        map_dispatch: MapDispatchToProps<A, O, DP>,
    ) -> Self {
        Self {
            map_state,
            map_dispatch,
            merge: MergeProps::side_by_side(),
            pure: true,
            eq: Comparators {
                are_states_equal: Rc::new(|a: &Rc<S>, b: &Rc<S>| Rc::ptr_eq(a, b)),
                are_own_props_equal: Rc::new(|a: &O, b: &O| a == b),
                are_state_props_equal: Rc::new(|a: &SP, b: &SP| a == b),
            },
        }
    }
}

impl<S, A, O, SP, DP, MP> Connect<S, A, O, SP, DP, MP>
where
    S: 'static,
    A: 'static,
    O: Clone + 'static,
    SP: 'static,
    DP: 'static,
    MP: 'static,
{
    /// Replace the merge; equal results (by `PartialEq`) keep the previous
    /// props when pure.
    pub fn with_merge_props<MP2>(
        self,
        merge: impl Fn(&SP, &DP, &O) -> MP2 + 'static,
    ) -> Connect<S, A, O, SP, DP, MP2>
    where
        MP2: PlainObject + PartialEq + 'static,
    {
        self.with_merge(MergeProps::custom(merge, |a: &MP2, b: &MP2| a == b))
    }

    /// Replace the merge recipe.
    pub fn with_merge<MP2>(
        self,
        merge: MergeProps<O, SP, DP, MP2>,
    ) -> Connect<S, A, O, SP, DP, MP2> {
        Connect {
            map_state: self.map_state,
            map_dispatch: self.map_dispatch,
            merge,
            pure: self.pure,
            eq: self.eq,
        }
    }

    /// Toggle memoization of the final props.
    #[must_use]
    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Decide when two state snapshots count as the same.
    #[must_use]
    pub fn with_are_states_equal(mut self, f: impl Fn(&Rc<S>, &Rc<S>) -> bool + 'static) -> Self {
        self.eq.are_states_equal = Rc::new(f);
        self
    }

    /// Decide when two own props values count as the same.
    #[must_use]
    pub fn with_are_own_props_equal(mut self, f: impl Fn(&O, &O) -> bool + 'static) -> Self {
        self.eq.are_own_props_equal = Rc::new(f);
        self
    }

    /// Decide when two state props values count as the same.
    #[must_use]
    pub fn with_are_state_props_equal(mut self, f: impl Fn(&SP, &SP) -> bool + 'static) -> Self {
        self.eq.are_state_props_equal = Rc::new(f);
        self
    }

    /// Whether this definition follows store changes at all. A binding with
    /// no state mapper never subscribes.
    #[must_use]
    pub fn handles_state_changes(&self) -> bool {
        self.map_state.is_provided()
    }

    /// The selector factory to hand to [`connect_advanced`].
    pub fn selector_factory(
        &self,
    ) -> impl Fn(Dispatch<A>, &FactoryOptions) -> DeriveFn<S, O, MP> + 'static {
        let this = self.clone();
        move |dispatch: Dispatch<A>, options: &FactoryOptions| {
            if cfg!(debug_assertions) {
                verify_subselectors(
                    this.map_state.declared_depends_on_own_props(),
                    this.map_dispatch.declared_depends_on_own_props(),
                    &options.display_name,
                );
            }
            let parts = Parts {
                map_state: this.map_state.init(options),
                map_dispatch: this.map_dispatch.init(options),
                merge: this.merge.init(options, this.pure),
                dispatch,
            };
            final_props_selector(parts, this.eq.clone(), this.pure, options)
        }
    }

    /// Options `connect` passes to [`connect_advanced`] by default.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::default()
            .with_method_name("connect")
            .with_display_name(|name| format!("Connect({name})"))
            .with_state_changes(self.handles_state_changes())
    }

    /// Bind to `store` (or the ambient store) with the default options.
    pub fn connect_to<St>(&self, store: Option<Rc<St>>) -> ConnectAdvanced<St, O, MP>
    where
        St: Store<State = S, Action = A>,
    {
        self.connect_to_with(store, self.connect_options())
    }

    /// Bind to `store` (or the ambient store) with explicit options.
    pub fn connect_to_with<St>(
        &self,
        store: Option<Rc<St>>,
        options: ConnectOptions,
    ) -> ConnectAdvanced<St, O, MP>
    where
        St: Store<State = S, Action = A>,
    {
        connect_advanced(store, self.selector_factory(), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingTable, NodeId, NodeInit, PropsUpdate};
    use crate::store::ReducerStore;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Greeting {
        text: String,
    }

    impl PlainObject for Greeting {}

    #[derive(Debug)]
    struct Names {
        first: &'static str,
        visits: u32,
    }

    enum Action {
        Visit,
        Rename(&'static str),
    }

    fn store() -> Rc<ReducerStore<Names, Action>> {
        Rc::new(ReducerStore::new(
            Names {
                first: "Ada",
                visits: 0,
            },
            |s: &Rc<Names>, a: &Action| match a {
                Action::Visit => Rc::new(Names {
                    first: s.first,
                    visits: s.visits + 1,
                }),
                Action::Rename(name) => Rc::new(Names {
                    first: name,
                    visits: s.visits,
                }),
            },
        ))
    }

    type GreeterProps = MergedProps<(), Greeting, DispatchProps<Action>>;

    fn greeting() -> MapStateToProps<Names, (), Greeting> {
        MapToProps::from_state(|s: &Names| Greeting {
            text: format!("Hello, {}", s.first),
        })
    }

    #[test]
    fn connect_defaults() {
        let def = Connect::new(greeting(), MapToProps::dispatch_only());
        let options = def.connect_options();
        assert_eq!(options.method_name, "connect");
        assert!(options.should_handle_state_changes);
        let connected = def.connect_to(Some(store())).wrap("Greeter");
        assert_eq!(connected.display_name(), "Connect(Greeter)");

        let stateless: Connect<Names, Action, (), Greeting, _, _> =
            Connect::new(MapToProps::none(), MapToProps::dispatch_only());
        assert!(!stateless.connect_options().should_handle_state_changes);
    }

    #[test]
    fn unrelated_state_changes_do_not_render() {
        let store = store();
        let connected = Connect::new(greeting(), MapToProps::dispatch_only())
            .connect_to(Some(Rc::clone(&store)))
            .wrap("Greeter");
        let table = BindingTable::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = table
            .initialize(
                &connected,
                NodeInit::new(NodeId(1), (), move |u: PropsUpdate<GreeterProps>| {
                    sink.borrow_mut().push(u.props.state.text.clone());
                }),
            )
            .unwrap();
        table.activate(id).unwrap();

        store.dispatch(Action::Visit).unwrap();
        store.dispatch(Action::Visit).unwrap();
        assert!(seen.borrow().is_empty());

        store.dispatch(Action::Rename("Grace")).unwrap();
        assert_eq!(*seen.borrow(), vec!["Hello, Grace".to_string()]);
        assert_eq!(store.get_state().visits, 2);
    }

    #[test]
    fn dispatch_props_reach_store() {
        let store = store();
        let connected = Connect::new(greeting(), MapToProps::dispatch_only())
            .connect_to(Some(Rc::clone(&store)))
            .wrap("Greeter");
        let table = BindingTable::new();
        let id = table
            .initialize(&connected, NodeInit::new(NodeId(1), (), |_: PropsUpdate<_>| {}))
            .unwrap();
        let props = table.props(id).unwrap();
        props.dispatch.dispatch.call(Action::Rename("Linus")).unwrap();
        assert_eq!(store.get_state().first, "Linus");
    }

    #[test]
    fn custom_merge_and_impure_mode() {
        let store = store();
        let def = Connect::new(greeting(), MapToProps::dispatch_only())
            .with_merge_props(|sp: &Greeting, _: &DispatchProps<Action>, _: &()| sp.clone())
            .pure(false);
        let connected = def.connect_to(Some(Rc::clone(&store))).wrap("Greeter");
        let table = BindingTable::new();
        let renders = Rc::new(RefCell::new(0));
        let r = Rc::clone(&renders);
        let id = table
            .initialize(
                &connected,
                NodeInit::new(NodeId(1), (), move |_: PropsUpdate<Greeting>| *r.borrow_mut() += 1),
            )
            .unwrap();
        table.activate(id).unwrap();
        assert_eq!(*renders.borrow(), 1, "impure selectors always look dirty");

        store.dispatch(Action::Visit).unwrap();
        assert_eq!(*renders.borrow(), 2);
        assert_eq!(table.props(id).unwrap().text, "Hello, Ada");
    }

    fn describe<S, A, O, SP, DP, MP>(def: &Connect<S, A, O, SP, DP, MP>) -> String {
        format!("{def:?}")
    }

    #[test]
    fn debug_output_names_each_part() {
        let def: Connect<Names, Action, (), Greeting, DispatchProps<Action>, _> = Connect::new(greeting(), MapToProps::dispatch_only());
        let text = describe(&def);
        assert!(text.contains("mapStateToProps"), "{text}");
        assert!(text.contains("mapDispatchToProps"), "{text}");
        assert!(text.contains("pure: true"), "{text}");
    }

    #[test]
    fn own_props_comparator_is_respected() {
        let store = store();
        let def: Connect<Names, Action, u32, Greeting, DispatchProps<Action>, _> = Connect::new(
            MapToProps::from_state_and_props(|s: &Names, own: &u32| Greeting {
                text: format!("{}#{own}", s.first),
            }),
            MapToProps::dispatch_only(),
        )
        .with_are_own_props_equal(|a: &u32, b: &u32| a / 10 == b / 10);
        let connected = def.connect_to(Some(store)).wrap("Greeter");
        let table = BindingTable::new();
        let id = table
            .initialize(&connected, NodeInit::new(NodeId(1), 1, |_: PropsUpdate<_>| {}))
            .unwrap();
        table.own_props_changed(id, 5).unwrap();
        assert_eq!(table.props(id).unwrap().state.text, "Ada#1");
        table.own_props_changed(id, 15).unwrap();
        assert_eq!(table.props(id).unwrap().state.text, "Ada#15");
    }
}
