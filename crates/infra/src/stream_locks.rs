//! Per-stream write serialization.
//!
//! One mutex per aggregate stream: writers to the same group run one at a
//! time, writers to different groups proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use splitledger_core::AggregateId;

#[derive(Debug, Default)]
pub struct StreamLocks {
    locks: Mutex<HashMap<AggregateId, Arc<Mutex<()>>>>,
}

impl StreamLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, aggregate_id: AggregateId) -> Arc<Mutex<()>> {
        // The guarded data is `()`, so a poisoned map or stream lock carries no
        // broken state and can be reused.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(aggregate_id).or_default().clone()
    }

    /// Run `f` while holding the write lock for `aggregate_id`.
    pub fn with_lock<T>(&self, aggregate_id: AggregateId, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(aggregate_id);
        let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_stream_writers_never_overlap() {
        let locks = Arc::new(StreamLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let id = AggregateId::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (locks, inside, max_seen) = (locks.clone(), inside.clone(), max_seen.clone());
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_lock(id, || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn returns_closure_result() {
        let locks = StreamLocks::new();
        assert_eq!(locks.with_lock(AggregateId::new(), || 7), 7);
    }
}
