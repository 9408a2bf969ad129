use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::reclaim::{release_to_os, GcResult, ReclaimTracker, Reclaimable};
use super::stats::{to_mb, MemoryStats, ProcessStatsSource, StatsSource, BYTES_PER_MB};
use crate::config::defaults::{DEFAULT_BATCH_SIZE, DEFAULT_GC_INTERVAL, DEFAULT_MEMORY_LIMIT_MB};
use crate::config::MemoryConfig;

#[derive(Debug, Clone)]
struct ManagerSettings {
    gc_interval: Duration,
    batch_size: usize,
    compression_enabled: bool,
}

/// Tracks memory limits and decides when to force a reclamation pass.
///
/// Shared by reference (`Arc<MemoryManager>`) between batch/stream processors
/// and the monitor. Every method is safe to call concurrently.
pub struct MemoryManager {
    settings: RwLock<ManagerSettings>,
    // Kept outside `settings` so pressure checks never take a lock.
    memory_limit_bytes: AtomicU64,
    last_gc: Mutex<Instant>,
    reclaimables: RwLock<Vec<Arc<dyn Reclaimable>>>,
    stats_source: Arc<dyn StatsSource>,
    tracker: ReclaimTracker,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::with_stats_source(Arc::new(ProcessStatsSource::new()))
    }

    pub fn with_stats_source(stats_source: Arc<dyn StatsSource>) -> Self {
        Self {
            settings: RwLock::new(ManagerSettings {
                gc_interval: DEFAULT_GC_INTERVAL,
                batch_size: DEFAULT_BATCH_SIZE,
                compression_enabled: false,
            }),
            memory_limit_bytes: AtomicU64::new(DEFAULT_MEMORY_LIMIT_MB * BYTES_PER_MB),
            last_gc: Mutex::new(Instant::now()),
            reclaimables: RwLock::new(Vec::new()),
            stats_source,
            tracker: ReclaimTracker::new(),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        let manager = Self::new();
        manager.apply_config(config);
        manager
    }

    pub fn apply_config(&self, config: &MemoryConfig) {
        self.set_memory_limit(config.memory_limit_mb);
        self.set_gc_interval(config.gc_interval());
        self.set_batch_size(config.batch_size);
        self.set_compression_enabled(config.compression_enabled);
    }

    pub fn set_memory_limit(&self, limit_mb: u64) {
        self.memory_limit_bytes
            .store(limit_mb.saturating_mul(BYTES_PER_MB), Ordering::Release);
    }

    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_bytes.load(Ordering::Acquire)
    }

    pub fn set_gc_interval(&self, interval: Duration) {
        self.settings.write().gc_interval = interval;
    }

    pub fn gc_interval(&self) -> Duration {
        self.settings.read().gc_interval
    }

    pub fn set_batch_size(&self, size: usize) {
        self.settings.write().batch_size = size;
    }

    pub fn batch_size(&self) -> usize {
        self.settings.read().batch_size
    }

    /// Advisory only; nothing compresses yet.
    pub fn set_compression_enabled(&self, enabled: bool) {
        self.settings.write().compression_enabled = enabled;
    }

    pub fn compression_enabled(&self) -> bool {
        self.settings.read().compression_enabled
    }

    /// Add a target for the collect phase of future reclamation passes
    pub fn register_reclaimable(&self, target: Arc<dyn Reclaimable>) {
        self.reclaimables.write().push(target);
    }

    /// True when live allocated bytes exceed the configured limit
    pub fn check_memory_pressure(&self) -> bool {
        self.stats_source.allocated_bytes() > self.memory_limit_bytes()
    }

    /// Run a reclamation pass if the check interval has elapsed or memory is
    /// under pressure. Returns `None` when no pass was due.
    pub fn force_gc(&self) -> Option<GcResult> {
        let interval = self.gc_interval();
        {
            let mut last_gc = self.last_gc.lock();
            let interval_elapsed = last_gc.elapsed() >= interval;
            if !interval_elapsed && !self.check_memory_pressure() {
                return None;
            }
            // Claim the pass before running it so concurrent callers skip.
            *last_gc = Instant::now();
        }
        Some(self.reclaim())
    }

    fn reclaim(&self) -> GcResult {
        let start = Instant::now();
        let started_at = chrono::Utc::now();
        let before = self.stats_source.allocated_bytes();

        let targets: Vec<Arc<dyn Reclaimable>> = self.reclaimables.read().clone();
        let objects_collected = targets.iter().map(|t| t.reclaim()).sum();
        let released_to_os = release_to_os();

        let after = self.stats_source.allocated_bytes();
        let collection_time = start.elapsed();
        self.tracker.record(started_at, collection_time);

        let memory_freed = before.saturating_sub(after);
        if after > self.memory_limit_bytes() {
            warn!(
                "Still above memory limit after reclamation: {} MB allocated, limit {} MB",
                to_mb(after),
                to_mb(self.memory_limit_bytes())
            );
        }
        debug!(
            "🗑️  Reclamation pass: {} objects dropped, {} MB freed in {:?}",
            objects_collected,
            to_mb(memory_freed),
            collection_time
        );

        GcResult {
            objects_collected,
            memory_freed,
            released_to_os,
            collection_time,
        }
    }

    /// Fresh statistics snapshot
    pub fn get_memory_stats(&self) -> MemoryStats {
        let raw = self.stats_source.sample();
        MemoryStats {
            alloc_mb: to_mb(raw.allocated_bytes),
            total_alloc_mb: to_mb(raw.total_allocated_bytes),
            sys_mb: to_mb(raw.resident_bytes),
            heap_alloc_mb: to_mb(raw.allocated_bytes),
            heap_sys_mb: to_mb(raw.virtual_bytes),
            stack_in_use_mb: to_mb(raw.stack_bytes),
            num_gc: self.tracker.passes(),
            last_gc: self.tracker.last_pass(),
            gc_cpu_fraction: self.tracker.cpu_fraction(),
        }
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}
