#![forbid(unsafe_code)]

//! Hierarchical subscriptions mirroring the UI tree.
//!
//! A store offers one flat list of subscribers. Attaching every connected
//! node directly to it would wake descendants in arbitrary order, including
//! ones whose parent is about to hand them new props. A [`Subscription`]
//! instead attaches to its nearest connected ancestor's subscription (or to
//! the store when it has none), so a state change walks the tree top-down:
//! each node's handler runs, and the node relays to its children through
//! [`notify_nested_subs`](Subscription::notify_nested_subs) once it has
//! settled.
//!
//! # State machine
//!
//! ```text
//!   Inert ──try_subscribe──▶ Subscribed
//!     ▲                          │
//!     └────try_unsubscribe───────┘
//!   (any) ──teardown──▶ TornDown   (terminal)
//! ```
//!
//! # Invariants
//!
//! 1. A node is attached to at most one upstream source (store or parent).
//! 2. A node with a parent only becomes `Subscribed` once the parent is.
//! 3. The parent link is weak: a subscription never keeps its parent alive.
//! 4. `try_subscribe`, `try_unsubscribe` and `teardown` are idempotent.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::ConnectError;
use crate::registry::ListenerRegistry;
use crate::store::{Listener, Store, Unsubscribe};

/// Lifecycle state of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Constructed but not listening.
    Inert,
    /// Attached to exactly one upstream source.
    Subscribed,
    /// Terminal; never listens again.
    TornDown,
}

enum Upstream {
    Store(Box<dyn Fn(Listener) -> Unsubscribe>),
    Parent(Weak<SubscriptionInner>),
}

struct SubscriptionInner {
    upstream: Upstream,
    on_state_change: Listener,
    listeners: ListenerRegistry,
    unsubscribe: RefCell<Option<Unsubscribe>>,
    torn_down: Cell<bool>,
}

/// One node of the notification tree.
///
/// Cloning a `Subscription` creates a new handle to the **same** node.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let upstream = match self.inner.upstream {
            Upstream::Store(_) => "store",
            Upstream::Parent(_) => "parent",
        };
        f.debug_struct("Subscription")
            .field("state", &self.state())
            .field("upstream", &upstream)
            .field("nested", &self.inner.listeners.len())
            .finish()
    }
}

impl Subscription {
    /// Create an inert subscription.
    ///
    /// With a `parent`, activation attaches `on_state_change` to the parent's
    /// nested listeners; without one, to `store` directly.
    pub fn new<St: Store>(
        store: &Rc<St>,
        parent: Option<&Subscription>,
        on_state_change: Listener,
    ) -> Self {
        let upstream = match parent {
            Some(parent) => Upstream::Parent(Rc::downgrade(&parent.inner)),
            None => {
                let store = Rc::clone(store);
                Upstream::Store(Box::new(move |listener| store.subscribe(listener)))
            }
        };
        Self {
            inner: Rc::new(SubscriptionInner {
                upstream,
                on_state_change,
                listeners: ListenerRegistry::disabled(),
                unsubscribe: RefCell::new(None),
                torn_down: Cell::new(false),
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        if self.inner.torn_down.get() {
            SubscriptionState::TornDown
        } else if self.inner.unsubscribe.borrow().is_some() {
            SubscriptionState::Subscribed
        } else {
            SubscriptionState::Inert
        }
    }

    /// Whether this node is attached upstream.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state() == SubscriptionState::Subscribed
    }

    /// Whether `other` is a handle to this same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach upstream. No-op when already subscribed or torn down.
    ///
    /// A parent is activated first (recursively up to the store). If the
    /// parent is gone or cannot subscribe, this node stays inert.
    pub fn try_subscribe(&self) {
        if self.state() != SubscriptionState::Inert {
            return;
        }

        let listener = Rc::clone(&self.inner.on_state_change);
        let handle = match &self.inner.upstream {
            Upstream::Store(subscribe) => subscribe(listener),
            Upstream::Parent(weak) => {
                let Some(inner) = weak.upgrade() else {
                    tracing::debug!("parent subscription dropped; staying inert");
                    return;
                };
                let parent = Subscription { inner };
                parent.try_subscribe();
                if !parent.is_subscribed() {
                    tracing::debug!(
                        parent = ?parent.state(),
                        "parent not subscribed; staying inert"
                    );
                    return;
                }
                parent.add_nested_sub(listener)
            }
        };

        *self.inner.unsubscribe.borrow_mut() = Some(handle);
        // Entries recorded while inert become live now.
        self.inner.listeners.enable();
    }

    /// Detach from upstream and drop every nested listener. The node may be
    /// subscribed again afterwards. No-op when not subscribed.
    pub fn try_unsubscribe(&self) {
        let handle = self.inner.unsubscribe.borrow_mut().take();
        if let Some(handle) = handle {
            handle.call();
            self.inner.listeners.clear();
            self.inner.listeners.disable();
        }
    }

    /// Detach for good. Safe to call from inside a notification pass.
    pub fn teardown(&self) {
        self.try_unsubscribe();
        self.inner.listeners.clear();
        self.inner.torn_down.set(true);
    }

    /// Activate this node and register `listener` as a nested subscriber.
    ///
    /// Returns a no-op handle when this node cannot subscribe (torn down, or
    /// its own parent is unavailable).
    pub fn add_nested_sub(&self, listener: Listener) -> Unsubscribe {
        self.try_subscribe();
        if !self.is_subscribed() {
            return Unsubscribe::noop();
        }
        let token = self.inner.listeners.subscribe(listener);
        self.inner.listeners.unsubscribe_handle(token)
    }

    /// Relay a change to nested subscribers, in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first failure raised by a nested handler.
    pub fn notify_nested_subs(&self) -> Result<(), ConnectError> {
        self.inner.listeners.notify()
    }

    /// Number of nested subscribers currently registered.
    #[must_use]
    pub fn nested_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
