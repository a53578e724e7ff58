//! Process-wide cancellation registry (spec §4.8, §4.10, §5).
//!
//! Maps the `(backend_id, secret)` pair a client receives in
//! `BackendKeyData` back to the pool lease currently executing on its
//! behalf, so an unauthenticated `CancelRequest` connection can signal it.
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::BackendPool;

struct Entry {
    secret: i32,
    pool: BackendPool,
    lease_id: u64,
}

/// Shared across all connections on a server (spec §4.11: "a single global
/// BackendRegistry").
#[derive(Clone, Default)]
pub struct CancelRegistry {
    entries: Arc<Mutex<HashMap<i32, Entry>>>,
    next_id: Arc<AtomicI32>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), next_id: Arc::new(AtomicI32::new(1)) }
    }

    /// Allocate a fresh `(backend_id, secret)` pair for a newly authenticated
    /// connection, sent to the client as `BackendKeyData`.
    pub async fn register(&self, secret: i32, pool: BackendPool, lease_id: u64) -> i32 {
        let backend_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().await.insert(backend_id, Entry { secret, pool, lease_id });
        backend_id
    }

    /// Update the lease a registered backend_id currently maps to, e.g. when
    /// a connection checks out a fresh pooled connection for a new portal.
    pub async fn update_lease(&self, backend_id: i32, lease_id: u64) {
        if let Some(entry) = self.entries.lock().await.get_mut(&backend_id) {
            entry.lease_id = lease_id;
        }
    }

    pub async fn unregister(&self, backend_id: i32) {
        self.entries.lock().await.remove(&backend_id);
    }

    /// Validate and act on a `CancelRequest(backend_id, secret)` (spec
    /// §4.10). No reply is ever sent to the cancel socket; the caller closes
    /// it either way.
    pub async fn cancel(&self, backend_id: i32, secret: i32) {
        let found = {
            let entries = self.entries.lock().await;
            entries.get(&backend_id).filter(|e| e.secret == secret).map(|e| (e.pool.clone(), e.lease_id))
        };
        if let Some((pool, lease_id)) = found {
            pool.cancel_lease(lease_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendConfig;

    fn test_config() -> BackendConfig {
        BackendConfig {
            host: "127.0.0.1".into(),
            port: 1,
            user: "_SYSTEM".into(),
            password: String::new(),
            namespace: "USER".into(),
            pool_size: 1,
            query_timeout: std::time::Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn cancel_with_wrong_secret_is_ignored() {
        let registry = CancelRegistry::new();
        let pool = BackendPool::spawn(test_config());
        let backend_id = registry.register(42, pool, 1).await;
        // Wrong secret: must not panic, must be a silent no-op.
        registry.cancel(backend_id, 99).await;
    }

    #[tokio::test]
    async fn unregister_removes_entry() {
        let registry = CancelRegistry::new();
        let pool = BackendPool::spawn(test_config());
        let backend_id = registry.register(7, pool, 1).await;
        registry.unregister(backend_id).await;
        assert!(registry.entries.lock().await.get(&backend_id).is_none());
    }
}
