#![forbid(unsafe_code)]

//! The store interface consumed by bindings.
//!
//! Bindings never own application state. They read immutable snapshots
//! through [`Store::get_state`], request changes through
//! [`Store::dispatch`], and learn about changes through
//! [`Store::subscribe`]. Snapshots are `Rc<State>`: a binding decides
//! whether state moved by comparing pointers, never by deep comparison.
//!
//! [`ReducerStore`] is a minimal single-threaded implementation (state plus
//! reducer) suitable for tests and small programs. [`StoreContext`] is the
//! ambient lookup a binding falls back to when it was not handed a store
//! explicitly.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ConnectError;
use crate::registry::ListenerRegistry;

/// A change callback. Failures unwind to whoever triggered the notification.
pub type Listener = Rc<dyn Fn() -> Result<(), ConnectError>>;

/// Call-once handle that removes a previously registered listener.
///
/// Dropping the handle without calling it leaves the listener registered.
#[must_use = "dropping an Unsubscribe leaves the listener registered"]
pub struct Unsubscribe {
    f: Option<Box<dyn FnOnce()>>,
}

impl Unsubscribe {
    /// Wrap the removal action.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self {
            f: Some(Box::new(f)),
        }
    }

    /// A handle that removes nothing.
    pub fn noop() -> Self {
        Self { f: None }
    }

    /// Run the removal action.
    pub fn call(mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("armed", &self.f.is_some())
            .finish()
    }
}

/// A state container with read, dispatch and change subscription.
pub trait Store: 'static {
    /// The immutable state snapshot type.
    type State: 'static;
    /// The action type accepted by [`dispatch`](Self::dispatch).
    type Action: 'static;

    /// Current snapshot. Pure read.
    fn get_state(&self) -> Rc<Self::State>;

    /// Apply an action and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns the first failure raised by a subscriber during the
    /// notification that follows the state change.
    fn dispatch(&self, action: Self::Action) -> Result<Self::Action, ConnectError>;

    /// Register a change listener.
    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

/// A cloneable dispatch function bound to one store.
pub struct Dispatch<A> {
    f: Rc<dyn Fn(A) -> Result<A, ConnectError>>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<A> std::fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch").finish_non_exhaustive()
    }
}

impl<A> PartialEq for Dispatch<A> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl<A: 'static> Dispatch<A> {
    /// Wrap an arbitrary dispatch function.
    pub fn new(f: impl Fn(A) -> Result<A, ConnectError> + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// Bind to `store`'s [`Store::dispatch`].
    pub fn from_store<St: Store<Action = A>>(store: &Rc<St>) -> Self {
        let store = Rc::clone(store);
        Self::new(move |action| store.dispatch(action))
    }

    /// Dispatch an action.
    ///
    /// # Errors
    ///
    /// Propagates the store's dispatch failure.
    pub fn call(&self, action: A) -> Result<A, ConnectError> {
        (self.f)(action)
    }
}

/// Stores made available to bindings by key, the way a provider at the root
/// of a UI tree exposes its store to every descendant.
pub struct StoreContext<St> {
    stores: HashMap<String, Rc<St>>,
}

impl<St> Default for StoreContext<St> {
    fn default() -> Self {
        Self::new()
    }
}

impl<St> Clone for StoreContext<St> {
    fn clone(&self) -> Self {
        Self {
            stores: self.stores.clone(),
        }
    }
}

impl<St> std::fmt::Debug for StoreContext<St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("StoreContext").field("keys", &keys).finish()
    }
}

impl<St> StoreContext<St> {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stores: HashMap::new(),
        }
    }

    /// Provide `store` under `key`, replacing any previous entry.
    pub fn provide(&mut self, key: impl Into<String>, store: Rc<St>) {
        self.stores.insert(key.into(), store);
    }

    /// Builder form of [`provide`](Self::provide).
    #[must_use]
    pub fn with_store(mut self, key: impl Into<String>, store: Rc<St>) -> Self {
        self.provide(key, store);
        self
    }

    /// Look up the store provided under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Rc<St>> {
        self.stores.get(key).cloned()
    }
}

type Reducer<S, A> = Box<dyn Fn(&Rc<S>, &A) -> Rc<S>>;

/// A minimal reducer-driven store.
///
/// The reducer returns the next snapshot; returning the same `Rc` signals
/// "nothing changed". Subscribers are notified after every dispatch either
/// way, in registration order.
///
/// Reducers may read the store but not dispatch: a nested `dispatch` from
/// inside the reducer returns [`ConnectError::DispatchInReducer`] and leaves
/// the state untouched.
pub struct ReducerStore<S, A> {
    state: RefCell<Rc<S>>,
    reducer: Reducer<S, A>,
    reducing: Cell<bool>,
    listeners: ListenerRegistry,
}

impl<S, A> std::fmt::Debug for ReducerStore<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReducerStore")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<S: 'static, A: 'static> ReducerStore<S, A> {
    /// Create a store from an initial state and a reducer.
    pub fn new(initial: S, reducer: impl Fn(&Rc<S>, &A) -> Rc<S> + 'static) -> Self {
        Self {
            state: RefCell::new(Rc::new(initial)),
            reducer: Box::new(reducer),
            reducing: Cell::new(false),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Number of direct subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<S: 'static, A: 'static> Store for ReducerStore<S, A> {
    type State = S;
    type Action = A;

    fn get_state(&self) -> Rc<S> {
        Rc::clone(&*self.state.borrow())
    }

    fn dispatch(&self, action: A) -> Result<A, ConnectError> {
        if self.reducing.replace(true) {
            return Err(ConnectError::DispatchInReducer);
        }
        let current = Rc::clone(&self.state.borrow());
        let next = (self.reducer)(&current, &action);
        self.reducing.set(false);
        *self.state.borrow_mut() = next;
        tracing::trace!(listeners = self.listeners.len(), "store dispatch");
        self.listeners.notify()?;
        Ok(action)
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        let token = self.listeners.subscribe(listener);
        self.listeners.unsubscribe_handle(token)
    }
}
