//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use keyslot::{
    Durability, Listener, PersistenceAdapter, PersistenceConfig, Registry, RegistryConfig,
    SaveDispatch, Value,
};
use keyslot_core::deserialize;
use keyslot_store::{Backend, MemoryBackend};

/// A registry wired to an in-memory backend.
pub struct TestFixture {
    pub backend: Arc<MemoryBackend>,
    pub registry: Registry,
}

impl TestFixture {
    /// Create a fixture with an empty backend.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    /// Create a fixture over an existing backend, e.g. to simulate a restart.
    ///
    /// Saves run on a dedicated thread so the fixture works with or without
    /// a tokio runtime.
    pub fn with_backend(backend: Arc<MemoryBackend>) -> Self {
        let config = PersistenceConfig {
            key_prefix: None,
            dispatch: SaveDispatch::Thread,
        };
        let registry = match PersistenceAdapter::with_config(backend.clone(), config) {
            Ok(adapter) => Registry::with_persistence(RegistryConfig::default(), adapter),
            Err(_) => Registry::default(),
        };
        Self { backend, registry }
    }

    /// A fresh fixture over the same backend.
    pub fn restart(&self) -> Self {
        Self::with_backend(self.backend.clone())
    }

    /// Create a persistent slot.
    pub fn persistent(&self, key: &str, value: Value) -> bool {
        self.registry.create(key, value, Durability::Persistent)
    }

    /// Wait until the backend holds `expected` under `key`.
    pub fn wait_for_saved(&self, key: &str, expected: &Value, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let stored = self
                .backend
                .get_string(key)
                .ok()
                .flatten()
                .and_then(|text| deserialize(&text).ok());
            if stored.as_ref() == Some(expected) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener that counts its notifications.
#[derive(Clone, Default)]
pub struct RecordingListener {
    hits: Arc<AtomicUsize>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far.
    pub fn count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Listener for RecordingListener {
    fn notify(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

/// A `{theme, volume}` preferences record.
pub fn prefs(theme: &str, volume: i32) -> Value {
    Value::record([("theme", Value::from(theme)), ("volume", Value::from(volume))])
}
