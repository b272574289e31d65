//! Change listeners.
//!
//! A listener is anything that can be told "this slot changed". The registry
//! never passes the new value along; listeners pull it with
//! [`Registry::snapshot`](crate::Registry::snapshot) when they need it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Something that wants to hear about committed writes.
pub trait Listener: Send + Sync {
    fn notify(&self);
}

impl<F> Listener for F
where
    F: Fn() + Send + Sync,
{
    fn notify(&self) {
        self()
    }
}

/// Registry-issued identity of a subscribed listener.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next(counter: &AtomicU64) -> Self {
        Self(counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Forwards the changed key into a channel.
///
/// Useful when the consumer lives in an async task rather than in a callback.
pub struct ChannelListener {
    key: String,
    tx: UnboundedSender<String>,
}

impl ChannelListener {
    /// Create a listener for `key` and the receiving end of its channel.
    pub fn new(key: impl Into<String>) -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                key: key.into(),
                tx,
            },
            rx,
        )
    }
}

impl Listener for ChannelListener {
    fn notify(&self) {
        if self.tx.send(self.key.clone()).is_err() {
            tracing::trace!(key = %self.key, "channel listener has no receiver");
        }
    }
}
