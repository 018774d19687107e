//! In-process directory service

use async_trait::async_trait;
use dashmap::DashMap;
use soapjms_core::DirectoryEnvironment;
use std::sync::Arc;

use crate::error::{MessagingError, Result};
use crate::message::Destination;
use crate::traits::{ConnectionFactory, Directory, DirectoryEntry, DirectoryProvider};

/// Context factory name accepted by [`MemoryDirectoryProvider`]
pub const MEMORY_CONTEXT_FACTORY: &str = "memory";

/// A flat name → entry directory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: DashMap<String, DirectoryEntry>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: impl Into<String>, entry: DirectoryEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn bind_factory(&self, name: impl Into<String>, factory: Arc<dyn ConnectionFactory>) {
        self.bind(name, DirectoryEntry::ConnectionFactory(factory));
    }

    pub fn bind_destination(&self, name: impl Into<String>, destination: Destination) {
        self.bind(name, DirectoryEntry::Destination(destination));
    }

    pub fn unbind(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn lookup(&self, name: &str) -> Result<DirectoryEntry> {
        self.entries
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| MessagingError::NameNotFound(name.to_string()))
    }
}

/// Hands out in-process directories keyed by provider URL
///
/// Locators without a `jndiURL` get the default directory.
#[derive(Debug, Default)]
pub struct MemoryDirectoryProvider {
    default: Arc<MemoryDirectory>,
    by_url: DashMap<String, Arc<MemoryDirectory>>,
}

impl MemoryDirectoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory used when a locator names no provider URL
    pub fn default_directory(&self) -> Arc<MemoryDirectory> {
        self.default.clone()
    }

    /// Directory served at `url`, created on first use
    pub fn directory(&self, url: &str) -> Arc<MemoryDirectory> {
        self.by_url
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(MemoryDirectory::new()))
            .clone()
    }
}

impl DirectoryProvider for MemoryDirectoryProvider {
    fn open(&self, environment: &DirectoryEnvironment) -> Result<Arc<dyn Directory>> {
        if let Some(factory) = &environment.initial_context_factory {
            if factory != MEMORY_CONTEXT_FACTORY {
                return Err(MessagingError::DirectoryUnavailable(format!(
                    "unsupported context factory {}",
                    factory
                )));
            }
        }
        match &environment.url {
            None => Ok(self.default.clone() as Arc<dyn Directory>),
            Some(url) => self
                .by_url
                .get(url)
                .map(|dir| dir.clone() as Arc<dyn Directory>)
                .ok_or_else(|| MessagingError::DirectoryUnavailable(url.clone())),
        }
    }
}
