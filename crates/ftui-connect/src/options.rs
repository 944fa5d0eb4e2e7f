#![forbid(unsafe_code)]

//! Binding configuration.

use std::rc::Rc;

/// Formats the diagnostic display name from the wrapped component's name.
pub type DisplayNameFn = Rc<dyn Fn(&str) -> String>;

/// Options recognized by [`connect_advanced`](crate::binding::connect_advanced).
#[derive(Clone)]
pub struct ConnectOptions {
    /// Computes the binding's display name from the wrapped component name.
    pub get_display_name: DisplayNameFn,
    /// Label used in error messages.
    pub method_name: String,
    /// When set, every props delivery carries a render counter under this name.
    pub render_count_prop: Option<String>,
    /// When false the binding never subscribes (statically bound nodes).
    pub should_handle_state_changes: bool,
    /// Key used to find the store in a [`StoreContext`](crate::store::StoreContext).
    pub store_key: String,
    /// Expose the wrapped instance through the binding table.
    pub with_ref: bool,
    /// Definition version; a binding built from an older version is rebuilt
    /// on [`reload`](crate::binding::BindingTable::reload).
    pub version: u64,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            get_display_name: Rc::new(|name: &str| format!("ConnectAdvanced({name})")),
            method_name: "connectAdvanced".to_string(),
            render_count_prop: None,
            should_handle_state_changes: true,
            store_key: "store".to_string(),
            with_ref: false,
            version: 0,
        }
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("method_name", &self.method_name)
            .field("render_count_prop", &self.render_count_prop)
            .field("should_handle_state_changes", &self.should_handle_state_changes)
            .field("store_key", &self.store_key)
            .field("with_ref", &self.with_ref)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl ConnectOptions {
    /// Set the display-name formatter.
    pub fn with_display_name(mut self, f: impl Fn(&str) -> String + 'static) -> Self {
        self.get_display_name = Rc::new(f);
        self
    }

    /// Set the label used in error messages.
    pub fn with_method_name(mut self, name: impl Into<String>) -> Self {
        self.method_name = name.into();
        self
    }

    /// Attach a render counter to every delivery.
    pub fn with_render_count_prop(mut self, prop: impl Into<String>) -> Self {
        self.render_count_prop = Some(prop.into());
        self
    }

    /// Enable or disable store subscription.
    pub fn with_state_changes(mut self, enabled: bool) -> Self {
        self.should_handle_state_changes = enabled;
        self
    }

    /// Set the key used for ambient store lookup.
    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }

    /// Expose the wrapped instance.
    pub fn with_ref(mut self) -> Self {
        self.with_ref = true;
        self
    }

    /// Set the definition version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Name under which a node's subscription is handed to its descendants.
    #[must_use]
    pub fn subscription_key(&self) -> String {
        format!("{}Subscription", self.store_key)
    }

    /// Resolve the options handed to a selector factory for one wrapped
    /// component.
    #[must_use]
    pub fn factory_options(&self, wrapped_component_name: &str) -> FactoryOptions {
        FactoryOptions {
            display_name: (self.get_display_name)(wrapped_component_name),
            wrapped_component_name: wrapped_component_name.to_string(),
            method_name: self.method_name.clone(),
            render_count_prop: self.render_count_prop.clone(),
            should_handle_state_changes: self.should_handle_state_changes,
            store_key: self.store_key.clone(),
            with_ref: self.with_ref,
        }
    }
}

/// What a selector factory learns about the binding it builds for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryOptions {
    pub display_name: String,
    pub wrapped_component_name: String,
    pub method_name: String,
    pub render_count_prop: Option<String>,
    pub should_handle_state_changes: bool,
    pub store_key: String,
    pub with_ref: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ConnectOptions::default();
        assert_eq!(opts.method_name, "connectAdvanced");
        assert_eq!(opts.store_key, "store");
        assert!(opts.should_handle_state_changes);
        assert!(!opts.with_ref);
        assert!(opts.render_count_prop.is_none());
        assert_eq!((opts.get_display_name)("Counter"), "ConnectAdvanced(Counter)");
        assert_eq!(opts.subscription_key(), "storeSubscription");
    }

    #[test]
    fn builder_chain() {
        let opts = ConnectOptions::default()
            .with_method_name("connect")
            .with_display_name(|n| format!("Connect({n})"))
            .with_render_count_prop("renders")
            .with_state_changes(false)
            .with_store_key("appStore")
            .with_ref()
            .with_version(3);
        let factory = opts.factory_options("Counter");
        assert_eq!(factory.display_name, "Connect(Counter)");
        assert_eq!(factory.wrapped_component_name, "Counter");
        assert_eq!(factory.method_name, "connect");
        assert_eq!(factory.render_count_prop.as_deref(), Some("renders"));
        assert!(!factory.should_handle_state_changes);
        assert_eq!(factory.store_key, "appStore");
        assert!(factory.with_ref);
        assert_eq!(opts.version, 3);
    }

    #[test]
    fn debug_skips_formatter() {
        let dbg = format!("{:?}", ConnectOptions::default());
        assert!(dbg.contains("connectAdvanced"));
        assert!(!dbg.contains("get_display_name"));
    }
}
