#![forbid(unsafe_code)]

//! Binding factory: attaches a stateful selector and a subscription to a
//! host UI node.
//!
//! # Usage
//!
//! ```ignore
//! use ftui_connect::binding::{connect_advanced, BindingTable, NodeId, NodeInit};
//!
//! let connector = connect_advanced(Some(store), make_derive_fn, ConnectOptions::default());
//! let connected = connector.wrap("Counter");
//!
//! let table = BindingTable::new();
//! let id = table.initialize(&connected, NodeInit::new(NodeId(1), (), |update| render(update)))?;
//! let initial = table.props(id);   // first visible props
//! table.activate(id)?;             // mount: subscribe and catch up
//! // ... store dispatches reach the binding and push props to the host ...
//! table.destroy(id);               // unmount
//! ```
//!
//! # Lifecycle
//!
//! | Hook | Effect |
//! |------|--------|
//! | [`initialize`](BindingTable::initialize) | build the derivation once, run it, create an inert subscription |
//! | [`activate`](BindingTable::activate) | subscribe, re-run, push synchronously if dirty |
//! | store notification | re-run; raise failure, or push if dirty; then relay to nested subscriptions |
//! | [`own_props_changed`](BindingTable::own_props_changed) | re-run with new own props; same handling |
//! | [`destroy`](BindingTable::destroy) | tear down the subscription, disable the selector |
//! | [`reload`](BindingTable::reload) | rebuild the selector when the definition version changed |
//!
//! # Invariants
//!
//! 1. The selector factory runs exactly once per binding instance (plus once
//!    per hot reload).
//! 2. A node's handler finishes, including the host's update, before any of
//!    its nested subscriptions is notified.
//! 3. No binding borrow is held while the host updates, so a host may
//!    destroy bindings (its own included) from inside `update`.
//! 4. After `destroy`, late notifications are inert.
//!
//! # Failure Modes
//!
//! - **Derivation fails**: the failure is returned from the hook or the
//!   notification that observed it (and from there out of `dispatch`). It is
//!   never retried.
//! - **Dispatch from inside a derivation**: re-enters the binding while its
//!   state is borrowed and panics (`RefCell` rules). Derivations must be pure.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ConnectError;
use crate::options::{ConnectOptions, FactoryOptions};
use crate::selector::{DeriveFn, RunOutcome, StatefulSelector};
use crate::store::{Dispatch, Listener, Store, StoreContext};
use crate::subscription::Subscription;

/// Opaque handle to a binding in a [`BindingTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

/// Host-side identity of a UI node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// The wrapped UI component, as far as diagnostics are concerned.
pub trait Component {
    /// Explicit display name, preferred over [`name`](Self::name).
    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Type or instance name.
    fn name(&self) -> Option<&str> {
        None
    }
}

impl Component for str {
    fn name(&self) -> Option<&str> {
        Some(self)
    }
}

impl Component for String {
    fn name(&self) -> Option<&str> {
        Some(self)
    }
}

/// Render counter attached to deliveries when `render_count_prop` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCount {
    pub prop: Rc<str>,
    pub count: u64,
}

/// Props pushed to a host node.
#[derive(Debug)]
pub struct PropsUpdate<P> {
    pub props: Rc<P>,
    pub render_count: Option<RenderCount>,
}

impl<P> Clone for PropsUpdate<P> {
    fn clone(&self) -> Self {
        Self {
            props: Rc::clone(&self.props),
            render_count: self.render_count.clone(),
        }
    }
}

/// The host side of a binding: receives new props and re-renders.
pub trait Host<P> {
    fn update(&self, update: PropsUpdate<P>);
}

impl<P, F: Fn(PropsUpdate<P>)> Host<P> for F {
    fn update(&self, update: PropsUpdate<P>) {
        self(update);
    }
}

/// Builds one derivation function per binding instance.
pub type SelectorFactory<St, O, P> = Rc<
    dyn Fn(
        Dispatch<<St as Store>::Action>,
        &FactoryOptions,
    ) -> DeriveFn<<St as Store>::State, O, P>,
>;

/// A binding definition: store source, selector factory and options.
pub struct ConnectAdvanced<St: Store, O, P> {
    store: Option<Rc<St>>,
    factory: SelectorFactory<St, O, P>,
    options: ConnectOptions,
}

impl<St: Store, O, P> Clone for ConnectAdvanced<St, O, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            factory: Rc::clone(&self.factory),
            options: self.options.clone(),
        }
    }
}

impl<St: Store, O, P> std::fmt::Debug for ConnectAdvanced<St, O, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectAdvanced")
            .field("explicit_store", &self.store.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Define a binding.
///
/// `store` may be `None`, in which case each binding looks the store up in
/// its table's [`StoreContext`] under `options.store_key`.
///
/// `selector_factory` receives the store's dispatch and the resolved
/// [`FactoryOptions`] and returns the derivation function. It should
/// memoize: every result with a new identity becomes a host update.
pub fn connect_advanced<St, O, P, F>(
    store: Option<Rc<St>>,
    selector_factory: F,
    options: ConnectOptions,
) -> ConnectAdvanced<St, O, P>
where
    St: Store,
    F: Fn(Dispatch<St::Action>, &FactoryOptions) -> DeriveFn<St::State, O, P> + 'static,
{
    ConnectAdvanced {
        store,
        factory: Rc::new(selector_factory),
        options,
    }
}

impl<St: Store, O, P> ConnectAdvanced<St, O, P> {
    /// Options this definition was created with.
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Bind the definition to a component, resolving its display name.
    pub fn wrap<C: Component + ?Sized>(&self, component: &C) -> Connected<St, O, P> {
        let wrapped_name = component
            .display_name()
            .or_else(|| component.name())
            .unwrap_or("Component");
        Connected {
            store: self.store.clone(),
            factory: Rc::clone(&self.factory),
            factory_options: self.options.factory_options(wrapped_name),
            options: self.options.clone(),
        }
    }
}

/// A binding definition wrapped around one component.
pub struct Connected<St: Store, O, P> {
    store: Option<Rc<St>>,
    factory: SelectorFactory<St, O, P>,
    factory_options: FactoryOptions,
    options: ConnectOptions,
}

impl<St: Store, O, P> Clone for Connected<St, O, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            factory: Rc::clone(&self.factory),
            factory_options: self.factory_options.clone(),
            options: self.options.clone(),
        }
    }
}

impl<St: Store, O, P> std::fmt::Debug for Connected<St, O, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connected")
            .field("display_name", &self.factory_options.display_name)
            .field("version", &self.options.version)
            .finish_non_exhaustive()
    }
}

impl<St: Store, O, P> Connected<St, O, P> {
    /// Diagnostic name, e.g. `ConnectAdvanced(Counter)`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.factory_options.display_name
    }

    /// Name of the wrapped component.
    #[must_use]
    pub fn wrapped_component_name(&self) -> &str {
        &self.factory_options.wrapped_component_name
    }

    /// Options handed to the selector factory.
    #[must_use]
    pub fn factory_options(&self) -> &FactoryOptions {
        &self.factory_options
    }

    /// Options of the underlying definition.
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    fn build_selector(&self, store: &Rc<St>) -> StatefulSelector<St::State, O, P> {
        let derive = (self.factory)(Dispatch::from_store(store), &self.factory_options);
        StatefulSelector::for_store(derive, store)
    }
}

/// Everything the host supplies when a node initializes its binding.
pub struct NodeInit<O, P> {
    pub node: NodeId,
    pub own_props: O,
    pub host: Rc<dyn Host<P>>,
    /// Subscription of the nearest connected ancestor, if any.
    pub parent: Option<Subscription>,
}

impl<O, P: 'static> NodeInit<O, P> {
    pub fn new(node: NodeId, own_props: O, host: impl Host<P> + 'static) -> Self {
        Self {
            node,
            own_props,
            host: Rc::new(host),
            parent: None,
        }
    }

    /// Attach under an ancestor's subscription.
    #[must_use]
    pub fn with_parent(mut self, parent: Subscription) -> Self {
        self.parent = Some(parent);
        self
    }
}

type Delivery<P> = (Rc<dyn Host<P>>, PropsUpdate<P>);

struct BindingState<St: Store, O, P> {
    node: NodeId,
    version: u64,
    display_name: String,
    method_name: String,
    store: Option<Rc<St>>,
    own_props: O,
    selector: StatefulSelector<St::State, O, P>,
    subscription: Option<Subscription>,
    host: Rc<dyn Host<P>>,
    render_count: u64,
    render_count_prop: Option<Rc<str>>,
    with_ref: bool,
    wrapped_instance: Option<Rc<dyn Any>>,
}

impl<St: Store, O, P> BindingState<St, O, P> {
    /// Re-run the selector and decide what, if anything, the host must see.
    fn refresh(&mut self) -> Result<Option<Delivery<P>>, ConnectError> {
        match self.selector.run(&self.own_props) {
            RunOutcome::Failure(error) => Err(ConnectError::Derivation {
                display_name: self.display_name.clone(),
                error,
            }),
            RunOutcome::Success(props) if self.selector.should_update() => {
                self.selector.mark_delivered();
                self.render_count += 1;
                let update = PropsUpdate {
                    props,
                    render_count: self.render_count_prop.as_ref().map(|prop| RenderCount {
                        prop: Rc::clone(prop),
                        count: self.render_count,
                    }),
                };
                Ok(Some((Rc::clone(&self.host), update)))
            }
            RunOutcome::Success(_) => {
                tracing::trace!(
                    node = ?self.node,
                    display_name = %self.display_name,
                    "render skipped"
                );
                Ok(None)
            }
            RunOutcome::Disabled => Ok(None),
        }
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.teardown();
        }
        self.selector.disable();
        self.store = None;
        self.wrapped_instance = None;
    }
}

type BindingCell<St, O, P> = Rc<RefCell<BindingState<St, O, P>>>;

fn deliver<P>(delivery: Option<Delivery<P>>) {
    if let Some((host, update)) = delivery {
        host.update(update);
    }
}

/// Store-notification handler of one binding.
fn on_state_change<St: Store, O, P>(cell: &BindingCell<St, O, P>) -> Result<(), ConnectError> {
    let delivery = cell.borrow_mut().refresh()?;
    deliver(delivery);
    let nested = cell.borrow().subscription.clone();
    match nested {
        Some(subscription) => subscription.notify_nested_subs(),
        None => Ok(()),
    }
}

/// Arena of bindings for one connected component type.
///
/// Hosts keep the [`BindingId`] returned by
/// [`initialize`](Self::initialize) and drive the lifecycle through it.
/// All methods take `&self`; the table can be shared behind an `Rc` with
/// the hosts it serves.
pub struct BindingTable<St: Store, O, P> {
    bindings: RefCell<HashMap<BindingId, BindingCell<St, O, P>>>,
    nodes: RefCell<HashMap<NodeId, BindingId>>,
    next_id: Cell<u64>,
    context: StoreContext<St>,
}

impl<St: Store, O: 'static, P: 'static> Default for BindingTable<St, O, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<St: Store, O, P> std::fmt::Debug for BindingTable<St, O, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("bindings", &self.bindings.borrow().len())
            .field("context", &self.context)
            .finish()
    }
}

impl<St: Store, O: 'static, P: 'static> BindingTable<St, O, P> {
    /// Create an empty table with no ambient stores.
    #[must_use]
    pub fn new() -> Self {
        Self::with_context(StoreContext::new())
    }

    /// Create an empty table whose bindings may find their store in `context`.
    #[must_use]
    pub fn with_context(context: StoreContext<St>) -> Self {
        Self {
            bindings: RefCell::new(HashMap::new()),
            nodes: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            context,
        }
    }

    fn cell(&self, id: BindingId) -> Result<BindingCell<St, O, P>, ConnectError> {
        self.bindings
            .borrow()
            .get(&id)
            .cloned()
            .ok_or(ConnectError::UnknownBinding(id))
    }

    /// Create the binding for a host node.
    ///
    /// Runs the selector once; the node's first props are available through
    /// [`props`](Self::props) as soon as this returns.
    ///
    /// # Errors
    ///
    /// - [`ConnectError::InvalidTarget`] if `init.node` already has a binding.
    /// - [`ConnectError::MissingStore`] if no store can be resolved.
    /// - [`ConnectError::Derivation`] if the first run fails.
    pub fn initialize(
        &self,
        connected: &Connected<St, O, P>,
        init: NodeInit<O, P>,
    ) -> Result<BindingId, ConnectError> {
        let options = connected.options();
        if let Some(existing) = self.nodes.borrow().get(&init.node) {
            return Err(ConnectError::InvalidTarget {
                method_name: options.method_name.clone(),
                received: format!("{:?} (already bound as {existing:?})", init.node),
            });
        }

        let store = connected
            .store
            .clone()
            .or_else(|| self.context.get(&options.store_key))
            .ok_or_else(|| ConnectError::MissingStore {
                store_key: options.store_key.clone(),
                display_name: connected.display_name().to_string(),
            })?;

        let mut selector = connected.build_selector(&store);
        if let RunOutcome::Failure(error) = selector.run(&init.own_props) {
            return Err(ConnectError::Derivation {
                display_name: connected.display_name().to_string(),
                error,
            });
        }
        // The host renders these first props itself.
        selector.mark_delivered();

        let id = BindingId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let cell: BindingCell<St, O, P> = Rc::new(RefCell::new(BindingState {
            node: init.node,
            version: options.version,
            display_name: connected.display_name().to_string(),
            method_name: options.method_name.clone(),
            store: Some(Rc::clone(&store)),
            own_props: init.own_props,
            selector,
            subscription: None,
            host: init.host,
            render_count: 0,
            render_count_prop: options.render_count_prop.as_deref().map(Rc::from),
            with_ref: options.with_ref,
            wrapped_instance: None,
        }));

        if options.should_handle_state_changes {
            let weak = Rc::downgrade(&cell);
            let listener: Listener = Rc::new(move || match weak.upgrade() {
                Some(cell) => on_state_change(&cell),
                None => Ok(()),
            });
            let subscription = Subscription::new(&store, init.parent.as_ref(), listener);
            cell.borrow_mut().subscription = Some(subscription);
        }

        self.bindings.borrow_mut().insert(id, cell);
        self.nodes.borrow_mut().insert(init.node, id);
        tracing::debug!(
            binding = ?id,
            node = ?init.node,
            display_name = %connected.display_name(),
            nested = init.parent.is_some(),
            key = %options.subscription_key(),
            "binding initialized"
        );
        Ok(id)
    }

    /// Mount: subscribe, then catch up with any state change since
    /// initialize, pushing synchronously if the props moved.
    ///
    /// Does nothing for bindings that do not handle state changes.
    ///
    /// # Errors
    ///
    /// [`ConnectError::UnknownBinding`] or a derivation failure.
    pub fn activate(&self, id: BindingId) -> Result<(), ConnectError> {
        let cell = self.cell(id)?;
        let Some(subscription) = cell.borrow().subscription.clone() else {
            return Ok(());
        };
        subscription.try_subscribe();
        tracing::debug!(
            binding = ?id,
            subscribed = subscription.is_subscribed(),
            "binding activated"
        );

        let delivery = cell.borrow_mut().refresh()?;
        deliver(delivery);
        Ok(())
    }

    /// The host passed new own props (e.g. after an ancestor re-rendered).
    ///
    /// # Errors
    ///
    /// [`ConnectError::UnknownBinding`] or a derivation failure.
    pub fn own_props_changed(&self, id: BindingId, own_props: O) -> Result<(), ConnectError> {
        let cell = self.cell(id)?;
        let delivery = {
            let mut state = cell.borrow_mut();
            state.own_props = own_props;
            state.refresh()?
        };
        deliver(delivery);
        Ok(())
    }

    /// Unmount. Idempotent: returns `false` if `id` was not live.
    ///
    /// Safe to call from inside a notification pass, including from the
    /// host's own `update`.
    pub fn destroy(&self, id: BindingId) -> bool {
        let Some(cell) = self.bindings.borrow_mut().remove(&id) else {
            return false;
        };
        let mut state = cell.borrow_mut();
        self.nodes.borrow_mut().remove(&state.node);
        state.teardown();
        tracing::debug!(binding = ?id, node = ?state.node, "binding destroyed");
        true
    }

    /// Rebuild the selector if `connected` carries a different version than
    /// the one the binding was built from. The subscription is kept, so
    /// nested bindings stay attached; every other option is taken from
    /// `connected`. The render counter keeps counting.
    ///
    /// Returns whether the binding was rebuilt.
    ///
    /// # Errors
    ///
    /// [`ConnectError::UnknownBinding`] or a derivation failure on the
    /// first run of the new selector.
    pub fn reload(
        &self,
        id: BindingId,
        connected: &Connected<St, O, P>,
    ) -> Result<bool, ConnectError> {
        let cell = self.cell(id)?;
        let delivery = {
            let mut state = cell.borrow_mut();
            let options = connected.options();
            let version = options.version;
            if state.version == version {
                return Ok(false);
            }
            let Some(store) = state.store.clone() else {
                return Ok(false);
            };
            tracing::debug!(binding = ?id, from = state.version, to = version, "hot reload");
            state.selector = connected.build_selector(&store);
            state.version = version;
            state.display_name = connected.display_name().to_string();
            state.method_name.clone_from(&options.method_name);
            state.render_count_prop = options.render_count_prop.as_deref().map(Rc::from);
            state.with_ref = options.with_ref;
            if !state.with_ref {
                state.wrapped_instance = None;
            }
            state.refresh()?
        };
        deliver(delivery);
        Ok(true)
    }

    /// Current derived props.
    #[must_use]
    pub fn props(&self, id: BindingId) -> Option<Rc<P>> {
        let cell = self.cell(id).ok()?;
        let state = cell.borrow();
        state.selector.props().cloned()
    }

    /// Number of pushes delivered to the host so far (initial props are 0).
    #[must_use]
    pub fn render_count(&self, id: BindingId) -> Option<u64> {
        let cell = self.cell(id).ok()?;
        let count = cell.borrow().render_count;
        Some(count)
    }

    /// Whether the binding listens to state changes right now.
    #[must_use]
    pub fn is_subscribed(&self, id: BindingId) -> bool {
        self.cell(id).is_ok_and(|cell| {
            cell.borrow()
                .subscription
                .as_ref()
                .is_some_and(Subscription::is_subscribed)
        })
    }

    /// The binding's subscription, to parent descendant bindings under it.
    #[must_use]
    pub fn subscription(&self, id: BindingId) -> Option<Subscription> {
        let cell = self.cell(id).ok()?;
        let subscription = cell.borrow().subscription.clone();
        subscription
    }

    /// Definition version the binding was built from.
    #[must_use]
    pub fn version(&self, id: BindingId) -> Option<u64> {
        let cell = self.cell(id).ok()?;
        let version = cell.borrow().version;
        Some(version)
    }

    /// Binding attached to `node`, if any.
    #[must_use]
    pub fn binding_for(&self, node: NodeId) -> Option<BindingId> {
        self.nodes.borrow().get(&node).copied()
    }

    /// Record the wrapped component instance.
    ///
    /// # Errors
    ///
    /// [`ConnectError::UnknownBinding`].
    pub fn set_wrapped_instance(
        &self,
        id: BindingId,
        instance: Rc<dyn Any>,
    ) -> Result<(), ConnectError> {
        let cell = self.cell(id)?;
        cell.borrow_mut().wrapped_instance = Some(instance);
        Ok(())
    }

    /// The wrapped component instance recorded by the host.
    ///
    /// # Errors
    ///
    /// [`ConnectError::WithRefRequired`] unless the binding was defined
    /// with `with_ref`; [`ConnectError::UnknownBinding`].
    pub fn wrapped_instance(&self, id: BindingId) -> Result<Option<Rc<dyn Any>>, ConnectError> {
        let cell = self.cell(id)?;
        let state = cell.borrow();
        if !state.with_ref {
            return Err(ConnectError::WithRefRequired {
                method_name: state.method_name.clone(),
            });
        }
        Ok(state.wrapped_instance.clone())
    }

    /// Number of live bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Whether the table holds no live binding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
