#![forbid(unsafe_code)]

//! Error taxonomy for store bindings.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `InvalidTarget` | Host node already carries a binding | Fatal at initialize |
//! | `MissingStore` | No explicit store and none provided under `store_key` | Fatal at initialize |
//! | `WithRefRequired` | Wrapped instance requested without `with_ref` | Fatal at call site |
//! | `UnknownBinding` | Lifecycle hook called with a destroyed or foreign id | Returned to caller |
//! | `Derivation` | Derivation function failed during a selector run | Raised once to the host |
//! | `DispatchInReducer` | A reducer dispatched while computing the next state | Returned from the nested `dispatch` |
//!
//! Registry and subscription operations never produce errors of their own;
//! they only forward failures returned by listeners.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::binding::BindingId;

/// A failure raised by a derivation function.
///
/// Cheap to clone: the selector keeps the last failure and hands a copy to
/// the host when it re-raises it.
#[derive(Clone)]
pub struct DerivationError {
    inner: Rc<dyn Error + 'static>,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}

impl DerivationError {
    /// Wrap an arbitrary error value.
    pub fn new<E: Error + 'static>(error: E) -> Self {
        Self {
            inner: Rc::new(error),
        }
    }

    /// Build a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Whether both handles refer to the same captured failure.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Borrow the wrapped error.
    #[must_use]
    pub fn get_ref(&self) -> &(dyn Error + 'static) {
        &*self.inner
    }
}

impl fmt::Debug for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DerivationError").field(&self.inner).finish()
    }
}

impl fmt::Display for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl Error for DerivationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }
}

/// Errors surfaced by bindings to their host.
#[derive(Debug, Clone)]
pub enum ConnectError {
    /// The wrapped node cannot carry a binding.
    InvalidTarget {
        method_name: String,
        received: String,
    },
    /// No store was passed explicitly and none was provided under `store_key`.
    MissingStore {
        store_key: String,
        display_name: String,
    },
    /// The wrapped instance was requested but `with_ref` is off.
    WithRefRequired { method_name: String },
    /// The id does not name a live binding.
    UnknownBinding(BindingId),
    /// The derivation function failed.
    Derivation {
        display_name: String,
        error: DerivationError,
    },
    /// `dispatch` was called while the store's reducer was running.
    DispatchInReducer,
}

impl ConnectError {
    /// Configuration errors are raised at initialize time and never recovered.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidTarget { .. } | Self::MissingStore { .. } | Self::WithRefRequired { .. }
        )
    }

    /// The captured derivation failure, if this is one.
    #[must_use]
    pub fn derivation(&self) -> Option<&DerivationError> {
        match self {
            Self::Derivation { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget {
                method_name,
                received,
            } => write!(
                f,
                "you must pass a component to the function returned by {method_name}; \
                 instead received {received}"
            ),
            Self::MissingStore {
                store_key,
                display_name,
            } => write!(
                f,
                "could not find \"{store_key}\" for \"{display_name}\"; either provide it \
                 through the store context or pass \"{store_key}\" explicitly"
            ),
            Self::WithRefRequired { method_name } => write!(
                f,
                "to access the wrapped instance, enable with_ref in the options of the \
                 {method_name}() call"
            ),
            Self::UnknownBinding(id) => write!(f, "no live binding for {id:?}"),
            Self::Derivation {
                display_name,
                error,
            } => write!(f, "derivation failed in {display_name}: {error}"),
            Self::DispatchInReducer => f.write_str("reducers may not dispatch actions"),
        }
    }
}

impl Error for ConnectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Derivation { error, .. } => Some(error.get_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_error_clone_shares_failure() {
        let err = DerivationError::msg("boom");
        let copy = err.clone();
        assert!(err.ptr_eq(&copy));
        assert!(!err.ptr_eq(&DerivationError::msg("boom")));
        assert_eq!(copy.to_string(), "boom");
    }

    #[test]
    fn configuration_classification() {
        let missing = ConnectError::MissingStore {
            store_key: "store".into(),
            display_name: "Connect(Counter)".into(),
        };
        assert!(missing.is_configuration());
        assert!(missing.to_string().contains("\"store\""));
        assert!(missing.to_string().contains("Connect(Counter)"));

        let failed = ConnectError::Derivation {
            display_name: "Connect(Counter)".into(),
            error: DerivationError::msg("bad state"),
        };
        assert!(!failed.is_configuration());
        assert!(failed.derivation().is_some());
        assert!(failed.source().is_some());
        assert!(failed.to_string().contains("bad state"));
    }

    #[test]
    fn invalid_target_names_value() {
        let err = ConnectError::InvalidTarget {
            method_name: "connect".into(),
            received: "NodeId(7)".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("connect"));
        assert!(msg.contains("NodeId(7)"));
    }
}
