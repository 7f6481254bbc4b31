use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    Unavailable,
    /// The operation did not finish in time.
    Timeout,
    /// A conditional write kept losing to other writers.
    Conflict,
    /// A value could not be encoded for the store.
    Serialize(String),
    /// The path is empty or malformed.
    InvalidPath(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "shared store unavailable"),
            Self::Timeout => write!(f, "shared store timed out"),
            Self::Conflict => write!(f, "shared store write conflict"),
            Self::Serialize(e) => write!(f, "store serialize error: {e}"),
            Self::InvalidPath(p) => write!(f, "invalid store path: {p:?}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Stream of whole-subtree snapshots for a subscribed path.
///
/// Yields the current value once on subscribe, then again after every
/// change under the path. Delivery is at-least-once: the same snapshot may
/// arrive more than once.
pub struct Subscription {
    stream: BoxStream<'static, Option<Value>>,
}

impl Subscription {
    pub fn new(stream: BoxStream<'static, Option<Value>>) -> Self {
        Self { stream }
    }

    /// Next snapshot. `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.stream.next().await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Eventually-consistent key-value tree with subscribe-on-change semantics.
///
/// Paths are `/`-separated keys (`lobby/room/players/p1`). Writes replace
/// the value at exactly that path; reads and subscriptions return the
/// whole subtree below it.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Atomically write `value` only when nothing exists at `path`.
    /// Returns whether this call performed the write.
    async fn set_if_absent(&self, path: &str, value: Value) -> Result<bool, StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;
}

/// Split a path into its non-empty segments, rejecting empty paths.
pub fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Whether a change at `changed` can affect a subscription on `watched`.
pub fn overlaps(changed: &str, watched: &str) -> bool {
    let changed: Vec<&str> = changed.split('/').filter(|s| !s.is_empty()).collect();
    let watched: Vec<&str> = watched.split('/').filter(|s| !s.is_empty()).collect();
    changed.iter().zip(watched.iter()).all(|(a, b)| a == b)
}
