use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::store::{SharedStore, StoreError, Subscription, overlaps, segments};

/// Default broadcast channel capacity for change fan-out.
const DEFAULT_CHANGE_CAPACITY: usize = 1024;

/// In-process shared store. Clones share the same tree, so several
/// simulated clients can talk through one instance.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    tree: Mutex<Value>,
    changes: broadcast::Sender<String>,
    available: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(DEFAULT_CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(Value::Object(Map::new())),
                changes,
                available: AtomicBool::new(true),
                latency_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Simulate the store going offline (or coming back).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Delay applied before every operation, to model round trips.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Synchronous read, bypassing availability and latency. For inspection.
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        let tree = self.tree();
        read_at(&tree, path)
    }

    fn tree(&self) -> MutexGuard<'_, Value> {
        self.inner.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn round_trip(&self) -> Result<(), StoreError> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    fn notify(&self, path: &str) {
        let _ = self.inner.changes.send(path.to_string());
    }
}

fn read_at(tree: &Value, path: &str) -> Option<Value> {
    let parts = segments(path).ok()?;
    let mut node = tree;
    for part in parts {
        node = node.as_object()?.get(part)?;
    }
    Some(node.clone())
}

fn write_at(tree: &mut Value, parts: &[&str], value: Value) {
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let mut node = tree;
    for part in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
}

/// Remove the value at `parts`, pruning parents left empty.
fn remove_at(node: &mut Value, parts: &[&str]) {
    let Some((first, rest)) = parts.split_first() else {
        return;
    };
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        map.remove(*first);
        return;
    }
    if let Some(child) = map.get_mut(*first) {
        remove_at(child, rest);
        if child.as_object().is_some_and(|m| m.is_empty()) {
            map.remove(*first);
        }
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.round_trip().await?;
        segments(path)?;
        Ok(self.snapshot(path))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.round_trip().await?;
        let parts = segments(path)?;
        if value.is_null() {
            remove_at(&mut self.tree(), &parts);
        } else {
            write_at(&mut self.tree(), &parts, value);
        }
        self.notify(path);
        Ok(())
    }

    async fn set_if_absent(&self, path: &str, value: Value) -> Result<bool, StoreError> {
        self.round_trip().await?;
        let parts = segments(path)?;
        {
            let mut tree = self.tree();
            if read_at(&tree, path).is_some() {
                return Ok(false);
            }
            write_at(&mut tree, &parts, value);
        }
        self.notify(path);
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.round_trip().await?;
        let parts = segments(path)?;
        remove_at(&mut self.tree(), &parts);
        self.notify(path);
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.round_trip().await?;
        segments(path)?;

        // Subscribe before reading so no change between the two is lost.
        let rx = self.inner.changes.subscribe();
        let initial = self.snapshot(path);
        let store = self.clone();
        let watched = path.to_string();

        let updates = BroadcastStream::new(rx).filter_map(move |msg| {
            let relevant = match msg {
                Ok(changed) => overlaps(&changed, &watched),
                // Lagged: we missed changes, so re-read to catch up.
                Err(_) => true,
            };
            let snapshot = relevant.then(|| store.snapshot(&watched));
            async move { snapshot }
        });

        let stream = futures::stream::once(async move { initial })
            .chain(updates)
            .boxed();
        Ok(Subscription::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn set_get_nested() {
        let store = MemoryStore::new();
        store.set("a/b/c", json!(1)).await.unwrap();
        store.set("a/b/d", json!({"x": 2})).await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), Some(json!({"c": 1, "d": {"x": 2}})));
        assert_eq!(store.get("a/b/d/x").await.unwrap(), Some(json!(2)));
        assert_eq!(store.get("a/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn field_write_keeps_siblings() {
        let store = MemoryStore::new();
        store
            .set("p/1", json!({"position": {"x": 0, "z": 45}, "status": "alive"}))
            .await
            .unwrap();
        store.set("p/1/status", json!("eliminated")).await.unwrap();
        assert_eq!(
            store.get("p/1").await.unwrap(),
            Some(json!({"position": {"x": 0, "z": 45}, "status": "eliminated"}))
        );
    }

    #[tokio::test]
    async fn remove_prunes_empty_parents() {
        let store = MemoryStore::new();
        store.set("room/players/p1/status", json!("alive")).await.unwrap();
        store.set("room/status", json!("active")).await.unwrap();
        store.remove("room/players/p1").await.unwrap();
        assert_eq!(store.get("room/players").await.unwrap(), None);
        assert_eq!(store.get("room/status").await.unwrap(), Some(json!("active")));
    }

    #[tokio::test]
    async fn set_null_removes() {
        let store = MemoryStore::new();
        store.set("a/b", json!(true)).await.unwrap();
        store.set("a/b", Value::Null).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_if_absent_only_writes_once() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("slots/1", json!("p1")).await.unwrap());
        assert!(!store.set_if_absent("slots/1", json!("p2")).await.unwrap());
        assert_eq!(store.get("slots/1").await.unwrap(), Some(json!("p1")));
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert_eq!(store.get("a").await, Err(StoreError::Unavailable));
        assert_eq!(store.set("a", json!(1)).await, Err(StoreError::Unavailable));
        assert!(store.subscribe("a").await.is_err());
        store.set_available(true);
        assert_eq!(store.get("a").await, Ok(None));
    }

    #[tokio::test]
    async fn empty_path_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.set("/", json!(1)).await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn subscription_sees_initial_and_relevant_changes() {
        let store = MemoryStore::new();
        store.set("room/players/p1/status", json!("alive")).await.unwrap();
        let mut sub = store.subscribe("room/players").await.unwrap();

        assert_eq!(
            sub.next().await,
            Some(Some(json!({"p1": {"status": "alive"}})))
        );

        // Unrelated write is filtered out; the next delivery is the player write.
        store.set("room/status", json!("active")).await.unwrap();
        store.set("room/players/p2/status", json!("alive")).await.unwrap();
        assert_eq!(
            sub.next().await,
            Some(Some(json!({"p1": {"status": "alive"}, "p2": {"status": "alive"}})))
        );

        store.remove("room/players/p1").await.unwrap();
        assert_eq!(
            sub.next().await,
            Some(Some(json!({"p2": {"status": "alive"}})))
        );
    }
}
