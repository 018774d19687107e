//! Poller registry
//!
//! Listener configuration names a poller by its `poller` key. The registry
//! maps those names to factories so a fresh poller is built per listener.

use soapjms_messaging::{MessagePoller, PollerFactory, SimpleMessagePoller, SIMPLE_POLLER};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Named poller factories
#[derive(Clone, Default)]
pub struct PollerRegistry {
    factories: BTreeMap<String, PollerFactory>,
}

impl PollerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in pollers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SIMPLE_POLLER, SimpleMessagePoller::default);
        registry
    }

    /// Register a poller constructor, replacing any under the same name
    pub fn register<F, P>(&mut self, name: impl Into<String>, build: F) -> &mut Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: MessagePoller + 'static,
    {
        let factory: PollerFactory = Arc::new(move || Box::new(build()) as Box<dyn MessagePoller>);
        self.factories.insert(name.into(), factory);
        self
    }

    /// Factory registered under `name`
    ///
    /// `listener` names the listener asking, for the error report.
    pub fn resolve(&self, name: &str, listener: &str) -> Result<PollerFactory> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidPollerClass {
                name: name.to_string(),
                listener: listener.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|k| k.as_str())
    }
}

impl std::fmt::Debug for PollerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
