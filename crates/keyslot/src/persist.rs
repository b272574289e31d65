//! Persistence adapter: seeds persistent slots from a backend and saves their
//! writes in the background.
//!
//! ## Loading
//!
//! A persisted value is only adopted when it is a reconcilable change of the
//! caller's default (same shape, fully supported). When both are records the
//! persisted members are merged onto a clone of the default with
//! [`CallablePolicy::Preserve`], so live callables in the default survive the
//! placeholders that decoding produces.
//!
//! ## Saving
//!
//! Saves are encoded on the caller's thread, so they capture exactly the value
//! that was committed, and then queued for a single worker that writes them in
//! submission order. There is no handle and no flush: a save that is still
//! queued when the process dies is lost.

use std::sync::Arc;
use std::thread;

use keyslot_core::{deep_merge, deserialize, is_valid_change_with, serialize};
use keyslot_core::{CallablePolicy, ChangeMode, Value};
use keyslot_store::{Backend, Namespaced};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::{PersistenceConfig, SaveDispatch};
use crate::error::Result;

/// One queued save.
struct SaveJob {
    key: String,
    text: String,
}

/// Loads and saves slot values through a [`Backend`].
pub struct PersistenceAdapter {
    backend: Arc<dyn Backend>,
    queue: UnboundedSender<SaveJob>,
}

impl PersistenceAdapter {
    /// Create an adapter with the default configuration.
    pub fn new<B: Backend + 'static>(backend: B) -> Result<Self> {
        Self::with_config(backend, PersistenceConfig::default())
    }

    /// Create an adapter and start its save worker.
    ///
    /// Fails only when a dedicated worker thread cannot be spawned.
    pub fn with_config<B: Backend + 'static>(backend: B, config: PersistenceConfig) -> Result<Self> {
        let backend: Arc<dyn Backend> = match config.key_prefix {
            Some(prefix) if !prefix.is_empty() => Arc::new(Namespaced::new(backend, prefix)),
            _ => Arc::new(backend),
        };

        let (queue, rx) = mpsc::unbounded_channel();
        start_worker(backend.clone(), rx, config.dispatch)?;

        Ok(Self { backend, queue })
    }

    /// The (possibly namespaced) backend this adapter talks to.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Resolve the starting value of a persistent slot.
    ///
    /// Returns a clone of `default` when nothing is stored or the stored value
    /// does not reconcile with it. Returns an error for malformed text or a
    /// failing backend; the registry logs those and keeps the default.
    pub fn load(&self, key: &str, default: &Value) -> Result<Value> {
        let Some(text) = self.backend.get_string(key)? else {
            return Ok(default.clone());
        };

        let resolved = deserialize(&text)?;
        if !is_valid_change_with(default, &resolved, ChangeMode::Reconcile) {
            tracing::debug!(key, "persisted value does not reconcile, using default");
            return Ok(default.clone());
        }

        if default.is_record() && resolved.is_record() {
            let mut merged = default.clone();
            deep_merge(&mut merged, &resolved, CallablePolicy::Preserve);
            return Ok(merged);
        }

        Ok(resolved)
    }

    /// Queue `value` to be written under `key`.
    ///
    /// Never blocks on the backend. Encoding and backend failures are logged
    /// and dropped.
    pub fn save(&self, key: &str, value: &Value) {
        let text = match serialize(value) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(key, error = %e, "dropping save: value cannot be encoded");
                return;
            }
        };

        let job = SaveJob {
            key: key.to_string(),
            text,
        };
        if self.queue.send(job).is_err() {
            tracing::warn!(key, "dropping save: save worker has stopped");
        }
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("queue_closed", &self.queue.is_closed())
            .finish_non_exhaustive()
    }
}

fn start_worker(
    backend: Arc<dyn Backend>,
    rx: UnboundedReceiver<SaveJob>,
    dispatch: SaveDispatch,
) -> Result<()> {
    match dispatch {
        SaveDispatch::Runtime(handle) => {
            handle.spawn(drain_async(backend, rx));
        }
        SaveDispatch::Thread => spawn_thread(backend, rx)?,
        SaveDispatch::Auto => match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(drain_async(backend, rx));
            }
            Err(_) => spawn_thread(backend, rx)?,
        },
    }
    Ok(())
}

fn spawn_thread(backend: Arc<dyn Backend>, rx: UnboundedReceiver<SaveJob>) -> Result<()> {
    thread::Builder::new()
        .name("keyslot-save".to_string())
        .spawn(move || drain(backend, rx))?;
    Ok(())
}

/// Write queued saves until every adapter handle is gone.
fn drain(backend: Arc<dyn Backend>, mut rx: UnboundedReceiver<SaveJob>) {
    while let Some(job) = rx.blocking_recv() {
        store(backend.as_ref(), &job);
    }
    tracing::trace!("save worker stopped");
}

/// Runtime flavour of [`drain`].
///
/// Waits for jobs as an ordinary task, so shutting the runtime down cancels
/// it even while adapter handles are still alive. Each backend write runs on
/// the blocking pool and is awaited before the next job, keeping saves in
/// submission order.
async fn drain_async(backend: Arc<dyn Backend>, mut rx: UnboundedReceiver<SaveJob>) {
    while let Some(job) = rx.recv().await {
        let backend = backend.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || store(backend.as_ref(), &job)).await {
            tracing::warn!(error = %e, "save task failed");
        }
    }
    tracing::trace!("save worker stopped");
}

fn store(backend: &dyn Backend, job: &SaveJob) {
    match backend.set_string(&job.key, &job.text) {
        Ok(()) => tracing::debug!(key = %job.key, bytes = job.text.len(), "saved slot"),
        Err(e) => tracing::warn!(key = %job.key, error = %e, "dropping save: backend write failed"),
    }
}
