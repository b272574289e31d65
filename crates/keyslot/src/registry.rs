//! The Registry: keyed shared state with subscriptions.
//!
//! Each key maps to one [`StateEntry`] holding the current value, the set of
//! listeners and the entry's durability. Values are stored behind an `Arc`
//! and replaced, never mutated, so a snapshot handed out earlier keeps
//! showing the value it was taken from.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use keyslot_core::{compare, deep_merge, is_valid_change, CallablePolicy, Comparison, Value};

use crate::config::{Durability, RegistryConfig};
use crate::listener::{Listener, ListenerId};
use crate::persist::PersistenceAdapter;
use crate::slot::Slot;

/// State kept for one key.
pub(crate) struct StateEntry {
    pub(crate) value: Arc<Value>,
    pub(crate) listeners: HashMap<ListenerId, Arc<dyn Listener>>,
    pub(crate) durability: Durability,
}

pub(crate) struct Inner {
    entries: RwLock<HashMap<String, StateEntry>>,
    persistence: Option<PersistenceAdapter>,
    config: RegistryConfig,
    next_listener: AtomicU64,
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StateEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StateEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A change request for [`Registry::update`].
pub enum Update {
    /// Use this value as the next value.
    Replace(Value),
    /// Derive the next value from the current one.
    With(Box<dyn FnOnce(&Value) -> Value + Send>),
}

impl Update {
    /// Build an update from a `prev -> next` function.
    pub fn with<F>(func: F) -> Self
    where
        F: FnOnce(&Value) -> Value + Send + 'static,
    {
        Update::With(Box::new(func))
    }

    fn resolve(self, current: &Value) -> Value {
        match self {
            Update::Replace(value) => value,
            Update::With(func) => func(current),
        }
    }
}

impl From<Value> for Update {
    fn from(value: Value) -> Self {
        Update::Replace(value)
    }
}

impl std::fmt::Debug for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Update::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Update::With(_) => f.write_str("With(<fn>)"),
        }
    }
}

/// What [`Registry::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was replaced and listeners were notified.
    Committed,
    /// The next value equals the current one; nothing happened.
    Unchanged,
    /// The next value is unsupported or has an incompatible shape; nothing
    /// happened.
    Rejected,
    /// No entry exists under the key.
    UnknownKey,
}

impl WriteOutcome {
    pub fn is_committed(self) -> bool {
        self == WriteOutcome::Committed
    }
}

/// Keyed shared-state registry.
///
/// Cheap to clone; all clones share the same entries.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    /// Create a registry without persistence.
    pub fn new(config: RegistryConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a registry whose persistent entries go through `adapter`.
    pub fn with_persistence(config: RegistryConfig, adapter: PersistenceAdapter) -> Self {
        Self::build(config, Some(adapter))
    }

    fn build(config: RegistryConfig, persistence: Option<PersistenceAdapter>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                persistence,
                config,
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// The registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// The persistence adapter, if one was configured.
    pub fn persistence(&self) -> Option<&PersistenceAdapter> {
        self.inner.persistence.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an entry with the configured default durability.
    pub fn create_default(&self, key: &str, value: Value) -> bool {
        self.create(key, value, self.inner.config.default_durability)
    }

    /// Create an entry under `key`.
    ///
    /// Returns `false` and leaves everything untouched when the key already
    /// exists, the key is empty or the value is not fully supported. A
    /// persistent entry starts from whatever the backend holds, if that
    /// reconciles with `value`.
    pub fn create(&self, key: &str, value: Value, durability: Durability) -> bool {
        if key.is_empty() {
            tracing::warn!("refusing to create a slot with an empty key");
            return false;
        }
        if !value.is_fully_supported() {
            tracing::warn!(key, "refusing to create a slot with an unsupported value");
            return false;
        }
        if self.exists(key) {
            tracing::debug!(key, "slot already exists");
            return false;
        }

        let value = if durability.is_persistent() {
            self.load_initial(key, value)
        } else {
            value
        };

        let mut entries = self.inner.write();
        if entries.contains_key(key) {
            tracing::debug!(key, "slot created concurrently");
            return false;
        }
        entries.insert(
            key.to_string(),
            StateEntry {
                value: Arc::new(value),
                listeners: HashMap::new(),
                durability,
            },
        );
        tracing::debug!(key, ?durability, "created slot");
        true
    }

    fn load_initial(&self, key: &str, default: Value) -> Value {
        let Some(adapter) = &self.inner.persistence else {
            tracing::warn!(key, "persistent slot without a persistence adapter");
            return default;
        };
        match adapter.load(key, &default) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to load persisted value, keeping default");
                default
            }
        }
    }

    /// Whether an entry exists under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current value under `key`.
    pub fn snapshot(&self, key: &str) -> Option<Arc<Value>> {
        self.inner.read().get(key).map(|entry| entry.value.clone())
    }

    /// Durability of the entry under `key`.
    pub fn durability(&self, key: &str) -> Option<Durability> {
        self.inner.read().get(key).map(|entry| entry.durability)
    }

    /// Number of listeners subscribed to `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner
            .read()
            .get(key)
            .map_or(0, |entry| entry.listeners.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the value under `key` and notify its listeners.
    ///
    /// Commits without consulting the change oracle: an equal value still
    /// notifies and a reshaped value still replaces. Use
    /// [`update`](Self::update) for gated writes.
    ///
    /// The write is saved when the entry is persistent. Returns `false`
    /// without side effects for an unknown key or an unsupported value.
    pub fn write(&self, key: &str, value: Value) -> bool {
        self.commit(key, value, None)
    }

    /// [`write`](Self::write) with an explicit durability for this write.
    pub fn write_with(&self, key: &str, value: Value, durability: Durability) -> bool {
        self.commit(key, value, Some(durability))
    }

    /// Change-aware write.
    ///
    /// Resolves `update` against the current value and commits only when the
    /// oracle calls it a valid change. Records are merged onto a clone of the
    /// current value, so keys missing from the update keep their values;
    /// any other shape is replaced.
    pub fn update(&self, key: &str, update: impl Into<Update>) -> WriteOutcome {
        let Some(current) = self.snapshot(key) else {
            return WriteOutcome::UnknownKey;
        };
        let next = update.into().resolve(&current);

        if !is_valid_change(&current, &next) {
            let outcome = refusal(&current, &next);
            if outcome == WriteOutcome::Rejected {
                tracing::warn!(key, tag = ?next.tag(), "rejected incompatible write");
            }
            return outcome;
        }

        let committed = if current.is_record() && next.is_record() {
            let mut merged = (*current).clone();
            deep_merge(&mut merged, &next, CallablePolicy::Overwrite);
            merged
        } else {
            next
        };

        if self.commit(key, committed, None) {
            WriteOutcome::Committed
        } else if self.exists(key) {
            WriteOutcome::Rejected
        } else {
            WriteOutcome::UnknownKey
        }
    }

    fn commit(&self, key: &str, value: Value, durability: Option<Durability>) -> bool {
        if !value.is_fully_supported() {
            tracing::warn!(key, "rejected write of an unsupported value");
            return false;
        }
        let value = Arc::new(value);

        let (listeners, durability) = {
            let mut entries = self.inner.write();
            let Some(entry) = entries.get_mut(key) else {
                tracing::debug!(key, "write to unknown slot ignored");
                return false;
            };
            entry.value = value.clone();
            let listeners: Vec<Arc<dyn Listener>> = entry.listeners.values().cloned().collect();
            (listeners, durability.unwrap_or(entry.durability))
        };

        // Queue the save before notifying, so a listener that writes the same
        // key again queues its save after this one.
        if durability.is_persistent() {
            match &self.inner.persistence {
                Some(adapter) => adapter.save(key, &value),
                None => tracing::warn!(key, "persistent write without a persistence adapter"),
            }
        }

        tracing::debug!(key, listeners = listeners.len(), "committed slot write");
        for listener in &listeners {
            listener.notify();
        }
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `listener` for writes to `key`.
    ///
    /// Subscribing to an unknown key returns an inert subscription.
    pub fn subscribe<L: Listener + 'static>(&self, key: &str, listener: L) -> Subscription {
        let mut entries = self.inner.write();
        let Some(entry) = entries.get_mut(key) else {
            tracing::debug!(key, "subscription to unknown slot is inert");
            return Subscription::inert(key);
        };

        let id = ListenerId::next(&self.inner.next_listener);
        entry.listeners.insert(id, Arc::new(listener));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            key: key.to_string(),
            id: Some(id),
        }
    }

    /// Create `key` if missing and return a handle to it.
    pub fn slot(&self, key: &str, initial: Value, durability: Durability) -> Slot {
        self.create(key, initial, durability);
        Slot::new(self.clone(), key)
    }

    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&HashMap<String, StateEntry>) -> R) -> R {
        f(&self.inner.read())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys())
            .field("config", &self.inner.config)
            .field("persistence", &self.inner.persistence)
            .finish()
    }
}

/// Why a write the oracle refused was refused.
fn refusal(current: &Value, next: &Value) -> WriteOutcome {
    match (current.tag(), next.tag()) {
        (_, None) => WriteOutcome::Rejected,
        (Some(a), Some(b)) if a == b && compare(current, next) == Comparison::Equal => {
            WriteOutcome::Unchanged
        }
        _ => WriteOutcome::Rejected,
    }
}

/// Handle returned by [`Registry::subscribe`].
///
/// Dropping it does not unsubscribe; call [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Inner>,
    key: String,
    id: Option<ListenerId>,
}

impl Subscription {
    fn inert(key: &str) -> Self {
        Self {
            registry: Weak::new(),
            key: key.to_string(),
            id: None,
        }
    }

    /// The subscribed key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        let (Some(id), Some(inner)) = (self.id, self.registry.upgrade()) else {
            return false;
        };
        let entries = inner.read();
        entries
            .get(&self.key)
            .is_some_and(|entry| entry.listeners.contains_key(&id))
    }

    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        let (Some(id), Some(inner)) = (self.id, self.registry.upgrade()) else {
            return;
        };
        let mut entries = inner.write();
        if let Some(entry) = entries.get_mut(&self.key) {
            if entry.listeners.remove(&id).is_some() {
                tracing::trace!(key = %self.key, ?id, "unsubscribed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = hits.clone();
        (hits, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn prefs(theme: &str, volume: i32) -> Value {
        Value::record([("theme", Value::from(theme)), ("volume", Value::from(volume))])
    }

    #[test]
    fn test_create_and_snapshot() {
        let registry = Registry::default();
        assert!(registry.create("count", Value::from(0), Durability::Volatile));
        assert!(registry.exists("count"));
        assert_eq!(*registry.snapshot("count").unwrap(), Value::from(0));
        assert_eq!(registry.snapshot("missing"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_create_existing_is_noop() {
        let registry = Registry::default();
        assert!(registry.create("count", Value::from(1), Durability::Volatile));
        assert!(!registry.create("count", Value::from(2), Durability::Volatile));
        assert_eq!(*registry.snapshot("count").unwrap(), Value::from(1));
    }

    #[test]
    fn test_create_refuses_bad_input() {
        let registry = Registry::default();
        assert!(!registry.create("", Value::from(1), Durability::Volatile));
        assert!(!registry.create("sym", Value::foreign("symbol"), Durability::Volatile));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_write_notifies_every_listener() {
        let registry = Registry::default();
        registry.create("count", Value::from(0), Durability::Volatile);
        let (a, listener_a) = counter();
        let (b, listener_b) = counter();
        registry.subscribe("count", listener_a);
        registry.subscribe("count", listener_b);

        assert!(registry.write("count", Value::from(1)));
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_unknown_key_is_noop() {
        let registry = Registry::default();
        assert!(!registry.write("missing", Value::from(1)));
        assert!(!registry.exists("missing"));
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let registry = Registry::default();
        registry.create("count", Value::from(0), Durability::Volatile);
        let before = registry.snapshot("count").unwrap();
        registry.write("count", Value::from(1));
        assert_eq!(*before, Value::from(0));
        assert_eq!(*registry.snapshot("count").unwrap(), Value::from(1));
    }

    #[test]
    fn test_unsubscribe() {
        let registry = Registry::default();
        registry.create("count", Value::from(0), Durability::Volatile);
        let (hits, listener) = counter();
        let subscription = registry.subscribe("count", listener);
        assert!(subscription.is_active());

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());

        registry.write("count", Value::from(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(registry.listener_count("count"), 0);
    }

    #[test]
    fn test_subscribe_unknown_key_is_inert() {
        let registry = Registry::default();
        let (hits, listener) = counter();
        let subscription = registry.subscribe("missing", listener);
        assert!(!subscription.is_active());
        subscription.unsubscribe();

        registry.create("missing", Value::from(0), Durability::Volatile);
        registry.write("missing", Value::from(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_update_merges_records() {
        let registry = Registry::default();
        registry.create("prefs", prefs("dark", 10), Durability::Volatile);
        let (hits, listener) = counter();
        registry.subscribe("prefs", listener);

        let outcome = registry.update("prefs", Value::record([("volume", Value::from(20))]));
        assert_eq!(outcome, WriteOutcome::Committed);
        assert_eq!(*registry.snapshot("prefs").unwrap(), prefs("dark", 20));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let outcome = registry.update("prefs", Value::record([("volume", Value::from(20))]));
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_with_function() {
        let registry = Registry::default();
        registry.create("count", Value::from(1), Durability::Volatile);

        let outcome = registry.update(
            "count",
            Update::with(|prev| Value::from(prev.as_number().unwrap_or(0.0) + 1.0)),
        );
        assert!(outcome.is_committed());
        assert_eq!(*registry.snapshot("count").unwrap(), Value::from(2));
    }

    #[test]
    fn test_update_rejects_shape_change() {
        let registry = Registry::default();
        registry.create("count", Value::from(1), Durability::Volatile);
        let (hits, listener) = counter();
        registry.subscribe("count", listener);

        assert_eq!(registry.update("count", Value::from("one")), WriteOutcome::Rejected);
        assert_eq!(
            registry.update("count", Value::foreign("symbol")),
            WriteOutcome::Rejected
        );
        assert_eq!(registry.update("missing", Value::from(1)), WriteOutcome::UnknownKey);
        assert_eq!(*registry.snapshot("count").unwrap(), Value::from(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_update_clears_to_null() {
        let registry = Registry::default();
        registry.create("count", Value::from(1), Durability::Volatile);
        assert!(registry.update("count", Value::Null).is_committed());
        assert!(registry.snapshot("count").unwrap().is_null());
        assert!(registry.update("count", Value::from(3)).is_committed());
    }

    #[test]
    fn test_listener_can_write_reentrantly() {
        let registry = Registry::default();
        registry.create("source", Value::from(0), Durability::Volatile);
        registry.create("mirror", Value::from(0), Durability::Volatile);

        let handle = registry.clone();
        registry.subscribe("source", move || {
            if let Some(value) = handle.snapshot("source") {
                handle.write("mirror", (*value).clone());
            }
        });

        registry.write("source", Value::from(7));
        assert_eq!(*registry.snapshot("mirror").unwrap(), Value::from(7));
    }

    #[test]
    fn test_write_skips_change_check() {
        let registry = Registry::default();
        registry.create("count", Value::from(1), Durability::Volatile);
        let (hits, listener) = counter();
        registry.subscribe("count", listener);

        // Unlike `update`, `write` commits equal and reshaped values.
        assert!(registry.write("count", Value::from(1)));
        assert!(registry.write("count", Value::from("one")));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(*registry.snapshot("count").unwrap(), Value::from("one"));

        assert_eq!(registry.update("count", Value::from("one")), WriteOutcome::Unchanged);
        assert_eq!(registry.update("count", Value::from(2)), WriteOutcome::Rejected);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = Registry::default();
        registry.create("count", Value::from(0), Durability::Volatile);
        let (_, listener) = counter();
        let subscription = registry.subscribe("count", listener);
        drop(registry);

        assert!(!subscription.is_active());
        subscription.unsubscribe();
    }

    #[test]
    fn test_keys_sorted() {
        let registry = Registry::default();
        registry.create("b", Value::from(1), Durability::Volatile);
        registry.create("a", Value::from(1), Durability::Volatile);
        assert_eq!(registry.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_create_default_uses_config() {
        let registry = Registry::new(RegistryConfig {
            default_durability: Durability::Persistent,
        });
        assert!(registry.create_default("prefs", prefs("dark", 10)));
        assert_eq!(registry.durability("prefs"), Some(Durability::Persistent));
        // No adapter: the write still commits, the save is skipped.
        assert!(registry.write("prefs", prefs("light", 10)));
    }
}
