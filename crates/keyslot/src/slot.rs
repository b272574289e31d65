//! A handle bound to one registry key.

use std::sync::Arc;

use keyslot_core::Value;

use crate::listener::Listener;
use crate::registry::{Registry, Subscription, Update, WriteOutcome};

/// Read, change and watch a single key.
///
/// Obtained from [`Registry::slot`], which creates the key if needed.
#[derive(Clone, Debug)]
pub struct Slot {
    registry: Registry,
    key: String,
}

impl Slot {
    pub(crate) fn new(registry: Registry, key: &str) -> Self {
        Self {
            registry,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The current value. [`Value::Absent`] if the key was never created.
    pub fn get(&self) -> Arc<Value> {
        self.registry
            .snapshot(&self.key)
            .unwrap_or_else(|| Arc::new(Value::Absent))
    }

    /// Change-aware write, see [`Registry::update`].
    pub fn set(&self, update: impl Into<Update>) -> WriteOutcome {
        self.registry.update(&self.key, update)
    }

    pub fn subscribe<L: Listener + 'static>(&self, listener: L) -> Subscription {
        self.registry.subscribe(&self.key, listener)
    }

    /// The registry this slot belongs to.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
