//! Backend trait: the abstract interface for persisted slot text.
//!
//! A backend is a plain string key-value store. It knows nothing about the
//! codec; it just keeps whatever text the persistence layer hands it.
//! Implementations include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use crate::error::Result;

/// The Backend trait: synchronous get/set of text by key.
///
/// Calls may block (SQLite does disk I/O). Callers that must not block run
/// them off the hot path; the registry only ever writes from its background
/// save worker.
pub trait Backend: Send + Sync {
    /// Read the text stored under `key`, if any.
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store `text` under `key`, replacing any previous text.
    fn set_string(&self, key: &str, text: &str) -> Result<()>;

    /// All stored keys, in no particular order.
    fn keys(&self) -> Result<Vec<String>>;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        (**self).get_string(key)
    }

    fn set_string(&self, key: &str, text: &str) -> Result<()> {
        (**self).set_string(key, text)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        (**self).get_string(key)
    }

    fn set_string(&self, key: &str, text: &str) -> Result<()> {
        (**self).set_string(key, text)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// A backend view that prefixes every key, so several registries can share
/// one database without colliding.
pub struct Namespaced<B> {
    inner: B,
    prefix: String,
}

impl<B: Backend> Namespaced<B> {
    pub fn new(inner: B, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl<B: Backend> Backend for Namespaced<B> {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_string(&self.full_key(key))
    }

    fn set_string(&self, key: &str, text: &str) -> Result<()> {
        self.inner.set_string(&self.full_key(key), text)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .inner
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(String::from))
            .collect())
    }
}
