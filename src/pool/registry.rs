use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::object_pool::{ErasedPool, ObjectPool};
use crate::errors::PoolError;
use crate::memory::Reclaimable;

/// Registry of reusable-object pools keyed by type name.
///
/// Owned by whoever composes the pipeline and shared with producers through
/// an `Arc`. Pools are created lazily on first request and never evicted.
#[derive(Default)]
pub struct PoolRegistry {
    pools: RwLock<HashMap<String, Arc<dyn ErasedPool>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the pool for `key`, creating it from `factory` on first use.
    ///
    /// Once a pool exists the factory argument is ignored. Concurrent callers
    /// racing on a new key all receive the pool built by the first one to
    /// take the write lock.
    pub fn get_pool<T, F>(&self, key: &str, factory: F) -> Result<Arc<ObjectPool<T>>, PoolError>
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        if let Some(existing) = self.pools.read().get(key) {
            return downcast(key, Arc::clone(existing));
        }

        let mut pools = self.pools.write();
        if let Some(existing) = pools.get(key) {
            return downcast(key, Arc::clone(existing));
        }

        let pool = Arc::new(ObjectPool::new(factory));
        pools.insert(key.to_string(), Arc::clone(&pool) as Arc<dyn ErasedPool>);
        debug!("Created object pool '{}'", key);
        Ok(pool)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pools.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pools.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn downcast<T: Send + 'static>(
    key: &str,
    pool: Arc<dyn ErasedPool>,
) -> Result<Arc<ObjectPool<T>>, PoolError> {
    pool.into_any()
        .downcast::<ObjectPool<T>>()
        .map_err(|_| PoolError::TypeMismatch { key: key.to_string() })
}

impl Reclaimable for PoolRegistry {
    /// Drops idle instances from every pool; the pools themselves stay registered.
    fn reclaim(&self) -> usize {
        let pools: Vec<Arc<dyn ErasedPool>> = self.pools.read().values().cloned().collect();
        pools.iter().map(|pool| pool.drain_idle()).sum()
    }
}
