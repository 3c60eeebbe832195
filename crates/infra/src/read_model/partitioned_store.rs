use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use std::sync::Arc;

/// Partitioned key/value store abstraction for disposable read models.
///
/// A partition is the unit of querying (e.g. "all groups of one member").
pub trait PartitionedStore<P, K, V>: Send + Sync {
    fn get(&self, partition: &P, key: &K) -> Option<V>;
    fn upsert(&self, partition: P, key: K, value: V);
    fn list(&self, partition: &P) -> Vec<V>;
    /// Drop every record (rebuild support).
    fn clear(&self);
}

impl<P, K, V, S> PartitionedStore<P, K, V> for Arc<S>
where
    S: PartitionedStore<P, K, V> + ?Sized,
{
    fn get(&self, partition: &P, key: &K) -> Option<V> {
        (**self).get(partition, key)
    }

    fn upsert(&self, partition: P, key: K, value: V) {
        (**self).upsert(partition, key, value)
    }

    fn list(&self, partition: &P) -> Vec<V> {
        (**self).list(partition)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-memory partitioned store for tests/dev.
#[derive(Debug)]
pub struct InMemoryPartitionedStore<P, K, V> {
    inner: RwLock<HashMap<P, HashMap<K, V>>>,
}

impl<P, K, V> InMemoryPartitionedStore<P, K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<P, K, V> Default for InMemoryPartitionedStore<P, K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, K, V> PartitionedStore<P, K, V> for InMemoryPartitionedStore<P, K, V>
where
    P: Clone + Eq + Hash + Send + Sync + 'static,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, partition: &P, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(partition)?.get(key).cloned()
    }

    fn upsert(&self, partition: P, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(partition).or_default().insert(key, value);
        }
    }

    fn list(&self, partition: &P) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.get(partition)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}
