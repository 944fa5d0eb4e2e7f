#![forbid(unsafe_code)]

//! Ordered listener registry with snapshot notification.
//!
//! # Design
//!
//! [`ListenerRegistry`] keeps its callbacks in a `Vec` inside shared,
//! reference-counted storage (`Rc<RefCell<..>>`). Each entry carries a
//! `live` flag shared with the notification snapshot, so removal during a
//! pass is observed by the pass without mutating the snapshot itself.
//!
//! # Invariants
//!
//! 1. Listeners are notified in registration order.
//! 2. A pass only visits listeners registered before it started.
//! 3. A listener removed during a pass is skipped if it has not run yet.
//! 4. No `RefCell` borrow is held while a listener runs, so listeners may
//!    subscribe, unsubscribe, clear or disable re-entrantly.
//! 5. A disabled registry records subscriptions but notifies nobody; enabling
//!    it makes the recorded entries live.
//!
//! # Failure Modes
//!
//! - **Listener failure**: the pass stops and the error is returned to the
//!   caller of [`notify`](ListenerRegistry::notify). The registry itself is
//!   left untouched, so the next pass starts from the full set again.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::ConnectError;
use crate::store::{Listener, Unsubscribe};

/// Identifies one registration in a [`ListenerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

struct Entry {
    token: ListenerToken,
    listener: Listener,
    live: Rc<Cell<bool>>,
}

struct RegistryInner {
    entries: Vec<Entry>,
    next_token: u64,
    enabled: bool,
}

/// An ordered collection of notification callbacks.
///
/// Cloning a `ListenerRegistry` creates a new handle to the **same** set of
/// listeners.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &inner.entries.len())
            .field("enabled", &inner.enabled)
            .finish()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    /// Create an empty, enabled registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// Create an empty registry that records listeners but does not notify
    /// them until [`enable`](Self::enable) is called.
    #[must_use]
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                entries: Vec::new(),
                next_token: 0,
                enabled,
            })),
        }
    }

    /// Append a listener. It takes part in every pass that starts after this
    /// call.
    pub fn subscribe(&self, listener: Listener) -> ListenerToken {
        let mut inner = self.inner.borrow_mut();
        let token = ListenerToken(inner.next_token);
        inner.next_token += 1;
        inner.entries.push(Entry {
            token,
            listener,
            live: Rc::new(Cell::new(true)),
        });
        token
    }

    /// Remove a listener. Returns `false` if the token was not registered
    /// (already removed, or cleared).
    pub fn unsubscribe(&self, token: ListenerToken) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.entries.iter().position(|e| e.token == token) {
            Some(idx) => {
                let entry = inner.entries.remove(idx);
                entry.live.set(false);
                true
            }
            None => false,
        }
    }

    /// Build a handle that removes `token` when called.
    ///
    /// The handle only holds a weak reference: it does not keep the registry
    /// alive and is inert once the registry is gone.
    pub fn unsubscribe_handle(&self, token: ListenerToken) -> Unsubscribe {
        let weak: Weak<RefCell<RegistryInner>> = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                ListenerRegistry { inner }.unsubscribe(token);
            }
        })
    }

    /// Invoke every listener registered when the pass starts, in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns the first listener failure; remaining listeners of this pass
    /// are not invoked.
    pub fn notify(&self) -> Result<(), ConnectError> {
        let snapshot: Vec<(Rc<Cell<bool>>, Listener)> = {
            let inner = self.inner.borrow();
            if !inner.enabled {
                return Ok(());
            }
            inner
                .entries
                .iter()
                .map(|e| (Rc::clone(&e.live), Rc::clone(&e.listener)))
                .collect()
        };

        for (live, listener) in &snapshot {
            if !live.get() || !self.is_enabled() {
                continue;
            }
            listener()?;
        }
        Ok(())
    }

    /// Drop every listener. Listeners still pending in a running pass are
    /// skipped.
    pub fn clear(&self) {
        let drained: Vec<Entry> = self.inner.borrow_mut().entries.drain(..).collect();
        for entry in &drained {
            entry.live.set(false);
        }
    }

    /// Resume notification.
    pub fn enable(&self) {
        self.inner.borrow_mut().enabled = true;
    }

    /// Suspend notification; subscriptions are still recorded.
    pub fn disable(&self) {
        self.inner.borrow_mut().enabled = false;
    }

    /// Whether [`notify`](Self::notify) currently reaches listeners.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
