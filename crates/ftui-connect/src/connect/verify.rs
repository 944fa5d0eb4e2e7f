#![forbid(unsafe_code)]

//! Development diagnostics for `connect` bindings.
//!
//! Props handed to a host are expected to be record-like: a set of named
//! fields. [`PlainObject`] lets a props type state whether a value has that
//! shape. The checks here never alter control flow; they emit a
//! [`ConnectWarning`] through `tracing` (debug builds only) and hand it back
//! to the caller for inspection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::map_to_props::DispatchProps;
use super::merge_props::MergedProps;

/// A non-fatal diagnostic about a binding's configuration or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectWarning {
    /// A map or merge function returned something that is not a plain object.
    NotPlainObject {
        method_name: &'static str,
        display_name: String,
        received: String,
    },
    /// A custom map function left `depends_on_own_props` unspecified.
    MissingDependsOnOwnProps {
        method_name: &'static str,
        display_name: String,
    },
}

impl fmt::Display for ConnectWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPlainObject {
                method_name,
                display_name,
                received,
            } => write!(
                f,
                "{method_name}() in {display_name} must return a plain object. \
                 Instead received {received}."
            ),
            Self::MissingDependsOnOwnProps {
                method_name,
                display_name,
            } => write!(
                f,
                "The selector for {method_name} of {display_name} did not specify a value \
                 for depends_on_own_props."
            ),
        }
    }
}

impl ConnectWarning {
    /// Log the warning. Compiled out of release builds.
    pub fn emit(&self) {
        if cfg!(debug_assertions) {
            tracing::warn!(target: "ftui_connect", warning = %self, "connect diagnostic");
        }
    }
}

/// Props types that can report whether a value is a plain object.
///
/// Record-like structs opt in with an empty impl:
///
/// ```ignore
/// impl PlainObject for TodoProps {}
/// ```
pub trait PlainObject {
    /// Whether this value is a set of named fields.
    fn is_plain_object(&self) -> bool {
        true
    }

    /// How the value is described in a warning.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl PlainObject for () {}

impl<V> PlainObject for HashMap<String, V> {}

impl<V> PlainObject for BTreeMap<String, V> {}

impl<O, SP, DP> PlainObject for MergedProps<O, SP, DP> {}

impl<A> PlainObject for DispatchProps<A> {}

impl<T> PlainObject for Vec<T> {
    fn is_plain_object(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("a list of {} items", self.len())
    }
}

impl PlainObject for String {
    fn is_plain_object(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

#[cfg(feature = "json")]
impl PlainObject for serde_json::Value {
    fn is_plain_object(&self) -> bool {
        self.is_object()
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Check the shape of `value`, emitting a warning when it is not a plain
/// object.
pub fn verify_plain_object<T: PlainObject + ?Sized>(
    value: &T,
    display_name: &str,
    method_name: &'static str,
) -> Option<ConnectWarning> {
    if value.is_plain_object() {
        return None;
    }
    let warning = ConnectWarning::NotPlainObject {
        method_name,
        display_name: display_name.to_string(),
        received: value.describe(),
    };
    warning.emit();
    Some(warning)
}

/// Check that both map functions declared whether they read own props.
///
/// `None` means "not specified"; the binding then assumes they do.
pub fn verify_subselectors(
    state_depends_on_own_props: Option<bool>,
    dispatch_depends_on_own_props: Option<bool>,
    display_name: &str,
) -> Vec<ConnectWarning> {
    [
        ("mapStateToProps", state_depends_on_own_props),
        ("mapDispatchToProps", dispatch_depends_on_own_props),
    ]
    .into_iter()
    .filter(|(_, depends)| depends.is_none())
    .map(|(method_name, _)| {
        let warning = ConnectWarning::MissingDependsOnOwnProps {
            method_name,
            display_name: display_name.to_string(),
        };
        warning.emit();
        warning
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_types_pass() {
        let map: HashMap<String, i32> = HashMap::new();
        assert!(verify_plain_object(&map, "Connect(List)", "mapStateToProps").is_none());
        assert!(verify_plain_object(&(), "Connect(List)", "mergeProps").is_none());
    }

    #[test]
    fn lists_are_not_plain_objects() {
        let warning = verify_plain_object(&vec![1, 2, 3], "Connect(List)", "mapStateToProps")
            .expect("a list must warn");
        assert_eq!(
            warning.to_string(),
            "mapStateToProps() in Connect(List) must return a plain object. \
             Instead received a list of 3 items."
        );
    }

    #[test]
    fn unspecified_dependency_warns_per_map() {
        let warnings = verify_subselectors(None, Some(false), "Connect(Row)");
        assert_eq!(
            warnings,
            vec![ConnectWarning::MissingDependsOnOwnProps {
                method_name: "mapStateToProps",
                display_name: "Connect(Row)".to_string(),
            }]
        );
        assert!(warnings[0].to_string().contains("did not specify a value"));
        assert!(verify_subselectors(Some(true), Some(false), "Connect(Row)").is_empty());
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_objects_only() {
        let object = serde_json::json!({ "value": 1 });
        let number = serde_json::json!(4);
        assert!(verify_plain_object(&object, "Connect(J)", "mergeProps").is_none());
        let warning = verify_plain_object(&number, "Connect(J)", "mergeProps").unwrap();
        assert!(warning.to_string().ends_with("Instead received 4."));
    }
}
