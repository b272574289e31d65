//! Registry and persistence configuration.

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

/// Whether a slot's writes are saved to the persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Lives only as long as the registry.
    #[default]
    Volatile,
    /// Seeded from the backend on creation and saved after every write.
    Persistent,
}

impl Durability {
    pub fn is_persistent(self) -> bool {
        self == Durability::Persistent
    }
}

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Durability used by `create` and `slot` when none is given.
    pub default_durability: Durability,
}

/// Where the background save worker runs.
#[derive(Debug, Clone, Default)]
pub enum SaveDispatch {
    /// The current tokio runtime's blocking pool if there is one,
    /// a dedicated thread otherwise.
    #[default]
    Auto,
    /// The blocking pool of the given runtime.
    Runtime(Handle),
    /// A dedicated OS thread.
    Thread,
}

/// Configuration for a [`PersistenceAdapter`](crate::PersistenceAdapter).
#[derive(Debug, Clone, Default)]
pub struct PersistenceConfig {
    /// Prefix applied to every backend key.
    pub key_prefix: Option<String>,
    /// Where saves are executed.
    pub dispatch: SaveDispatch,
}
