//! crates/warehouse_core/src/locks.rs
//!
//! Single-writer locks keyed by table name. Every read-compute-write sequence on a
//! sheet (code generation, reconciliation, slug upsert, `max + 1` versioning) runs
//! under the lock of that sheet, so concurrent requests in this process cannot
//! interleave. Locks are taken one at a time and never nested.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive_other_keys_are_not() {
        let locks = Arc::new(KeyedLocks::new());
        let held = locks.lock("NhapKho").await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock("XuatKho")).await;
        assert!(other.is_ok());

        let contended = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock("NhapKho").await; })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contended.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contended)
            .await
            .expect("lock released")
            .expect("task completed");
    }
}
