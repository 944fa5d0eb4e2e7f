#![forbid(unsafe_code)]

//! Store-to-component bindings for FrankenTUI.
//!
//! This crate connects a centralized, immutable state store to UI nodes:
//!
//! - [`ListenerRegistry`]: ordered change callbacks, safe to mutate during a
//!   notification pass.
//! - [`Subscription`]: a notification tree mirroring the UI tree, so parents
//!   settle before their children are asked.
//! - [`StatefulSelector`]: a derivation function plus its last result and a
//!   dirty flag.
//! - [`BindingTable`]: per-node bindings driven by the host's lifecycle hooks.
//! - [`Connect`]: the state/dispatch/merge mapping layer on top.
//!
//! # Architecture
//!
//! Everything is single-threaded. Shared interiors are `Rc<RefCell<..>>`;
//! reference identity (`Rc::ptr_eq`) is how state and props changes are
//! detected. Failures raised by derivations travel back to whoever
//! triggered the notification, usually [`Store::dispatch`].
//!
//! Logging goes through `tracing`; the crate never installs a subscriber.

pub mod binding;
pub mod connect;
pub mod error;
pub mod options;
pub mod registry;
pub mod selector;
pub mod store;
pub mod subscription;

pub use binding::{
    BindingId, BindingTable, Component, ConnectAdvanced, Connected, Host, NodeId, NodeInit,
    PropsUpdate, RenderCount, SelectorFactory, connect_advanced,
};
pub use connect::{
    Connect, ConnectWarning, DispatchProps, MapDispatchToProps, MapStateToProps, MapToProps,
    MergeProps, MergedProps, PlainObject,
};
pub use error::{ConnectError, DerivationError};
pub use options::{ConnectOptions, FactoryOptions};
pub use registry::{ListenerRegistry, ListenerToken};
pub use selector::{DeriveFn, RunOutcome, StatefulSelector};
pub use store::{Dispatch, Listener, ReducerStore, Store, StoreContext, Unsubscribe};
pub use subscription::{Subscription, SubscriptionState};
