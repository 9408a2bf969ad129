use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Something holding memory it can drop on request, such as idle pooled objects
pub trait Reclaimable: Send + Sync {
    /// Release what can be released, returning the number of objects dropped
    fn reclaim(&self) -> usize;
}

/// Outcome of one reclamation pass
#[derive(Debug, Clone, PartialEq)]
pub struct GcResult {
    pub objects_collected: usize,
    pub memory_freed: u64,
    pub released_to_os: bool,
    pub collection_time: Duration,
}

/// Hand freed heap pages back to the operating system.
///
/// Returns whether the allocator reported releasing anything.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub fn release_to_os() -> bool {
    // SAFETY: malloc_trim only touches allocator-internal state and is thread safe in glibc
    unsafe { libc::malloc_trim(0) != 0 }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub fn release_to_os() -> bool {
    false
}

/// Bookkeeping across reclamation passes
pub(crate) struct ReclaimTracker {
    started: Instant,
    passes: AtomicU64,
    pause_nanos: AtomicU64,
    last_pass: Mutex<Option<DateTime<Utc>>>,
}

impl ReclaimTracker {
    pub(crate) fn new() -> Self {
        Self {
            started: Instant::now(),
            passes: AtomicU64::new(0),
            pause_nanos: AtomicU64::new(0),
            last_pass: Mutex::new(None),
        }
    }

    pub(crate) fn record(&self, at: DateTime<Utc>, took: Duration) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.pause_nanos
            .fetch_add(took.as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
        *self.last_pass.lock() = Some(at);
    }

    pub(crate) fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub(crate) fn last_pass(&self) -> Option<DateTime<Utc>> {
        *self.last_pass.lock()
    }

    /// Share of wall time since creation spent inside reclamation passes
    pub(crate) fn cpu_fraction(&self) -> f64 {
        let elapsed = self.started.elapsed().as_nanos() as f64;
        if elapsed == 0.0 {
            return 0.0;
        }
        (self.pause_nanos.load(Ordering::Relaxed) as f64 / elapsed).min(1.0)
    }
}
