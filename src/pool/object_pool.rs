use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Reuse container that hands out idle instances before building new ones.
///
/// Instances are stored exactly as they were returned; resetting them to a
/// neutral state is the caller's job.
pub struct ObjectPool<T> {
    idle: Mutex<VecDeque<T>>,
    factory: Factory<T>,
    created_count: AtomicU64,
    reused_count: AtomicU64,
}

/// Pool statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub created: u64,
    pub reused: u64,
}

impl PoolStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.created + self.reused;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}

impl<T> ObjectPool<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            idle: Mutex::new(VecDeque::new()),
            factory: Box::new(factory),
            created_count: AtomicU64::new(0),
            reused_count: AtomicU64::new(0),
        }
    }

    /// Get an idle object, or build one with the factory
    pub fn get(&self) -> T {
        // The lock is released before the factory runs.
        let reused = self.idle.lock().pop_front();
        match reused {
            Some(obj) => {
                self.reused_count.fetch_add(1, Ordering::Relaxed);
                obj
            }
            None => {
                self.created_count.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        }
    }

    /// Return an object to the pool for reuse
    pub fn put(&self, obj: T) {
        self.idle.lock().push_back(obj);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle_count(),
            created: self.created_count.load(Ordering::Relaxed),
            reused: self.reused_count.load(Ordering::Relaxed),
        }
    }

    /// Drop every idle instance, returning how many were released
    pub fn drain_idle(&self) -> usize {
        let drained = std::mem::take(&mut *self.idle.lock());
        drained.len()
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("idle", &self.idle_count())
            .field("created", &self.created_count.load(Ordering::Relaxed))
            .field("reused", &self.reused_count.load(Ordering::Relaxed))
            .finish()
    }
}

/// Type-erased view the registry keeps for each pool
pub(crate) trait ErasedPool: Send + Sync {
    fn drain_idle(&self) -> usize;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + 'static> ErasedPool for ObjectPool<T> {
    fn drain_idle(&self) -> usize {
        ObjectPool::drain_idle(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
