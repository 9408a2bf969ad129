//! Memory statistics sources and the immutable snapshot handed to callers.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use sysinfo::{Pid, ProcessesToUpdate};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Point-in-time capture of process memory statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub alloc_mb: u64,
    pub total_alloc_mb: u64,
    pub sys_mb: u64,
    pub heap_alloc_mb: u64,
    pub heap_sys_mb: u64,
    pub stack_in_use_mb: u64,
    pub num_gc: u64,
    pub last_gc: Option<DateTime<Utc>>,
    pub gc_cpu_fraction: f64,
}

/// Raw byte counters read from a statistics source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMemoryStats {
    /// Bytes currently allocated and not yet freed
    pub allocated_bytes: u64,
    /// Cumulative bytes allocated over the process lifetime
    pub total_allocated_bytes: u64,
    /// Resident set size
    pub resident_bytes: u64,
    /// Virtual memory reserved by the process
    pub virtual_bytes: u64,
    pub stack_bytes: u64,
}

/// Where the memory manager reads live allocation figures from.
///
/// The default is [`ProcessStatsSource`]; tests and embedders can supply
/// their own to drive pressure decisions deterministically.
pub trait StatsSource: Send + Sync {
    fn sample(&self) -> RawMemoryStats;

    /// Live allocated bytes. Called on every pressure check, so sources
    /// with a cheaper path than a full sample should override it.
    fn allocated_bytes(&self) -> u64 {
        self.sample().allocated_bytes
    }
}

static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static TOTAL_BYTES: AtomicU64 = AtomicU64::new(0);
static TRACKING_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Counting wrapper around the system allocator.
///
/// Install it in a binary to get exact live/cumulative allocation figures:
///
/// ```ignore
/// #[global_allocator]
/// static GLOBAL: bulk_mem::TrackingAllocator = bulk_mem::TrackingAllocator;
/// ```
pub struct TrackingAllocator;

impl TrackingAllocator {
    /// Whether this allocator has served at least one allocation
    pub fn is_active() -> bool {
        TRACKING_ACTIVE.load(Ordering::Relaxed)
    }

    pub fn live_bytes() -> u64 {
        LIVE_BYTES.load(Ordering::Relaxed) as u64
    }

    pub fn total_allocated_bytes() -> u64 {
        TOTAL_BYTES.load(Ordering::Relaxed)
    }

    fn record_alloc(size: usize) {
        LIVE_BYTES.fetch_add(size, Ordering::Relaxed);
        TOTAL_BYTES.fetch_add(size as u64, Ordering::Relaxed);
        if !TRACKING_ACTIVE.load(Ordering::Relaxed) {
            TRACKING_ACTIVE.store(true, Ordering::Relaxed);
        }
    }

    fn record_dealloc(size: usize) {
        LIVE_BYTES.fetch_sub(size, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        Self::record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            Self::record_dealloc(layout.size());
            Self::record_alloc(new_size);
        }
        new_ptr
    }
}

/// Reads statistics from the running process.
///
/// Allocation counters come from [`TrackingAllocator`] when it is installed;
/// otherwise resident size stands in for live allocation.
pub struct ProcessStatsSource {
    system: Mutex<sysinfo::System>,
    pid: Option<Pid>,
}

impl ProcessStatsSource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// (resident, virtual) bytes of this process
    fn process_memory(&self) -> (u64, u64) {
        let Some(pid) = self.pid else {
            return (0, 0);
        };
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|p| (p.memory(), p.virtual_memory()))
            .unwrap_or((0, 0))
    }
}

impl Default for ProcessStatsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSource for ProcessStatsSource {
    fn sample(&self) -> RawMemoryStats {
        let (resident_bytes, virtual_bytes) = self.process_memory();
        let (allocated_bytes, total_allocated_bytes) = if TrackingAllocator::is_active() {
            (
                TrackingAllocator::live_bytes(),
                TrackingAllocator::total_allocated_bytes(),
            )
        } else {
            (resident_bytes, resident_bytes)
        };

        RawMemoryStats {
            allocated_bytes,
            total_allocated_bytes,
            resident_bytes,
            virtual_bytes,
            stack_bytes: stack_bytes(),
        }
    }

    fn allocated_bytes(&self) -> u64 {
        if TrackingAllocator::is_active() {
            TrackingAllocator::live_bytes()
        } else {
            self.process_memory().0
        }
    }
}

#[cfg(target_os = "linux")]
fn stack_bytes() -> u64 {
    // VmStk is the main thread stack, reported in kB
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find_map(|line| line.strip_prefix("VmStk:"))
                .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
        })
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn stack_bytes() -> u64 {
    0
}

pub(crate) fn to_mb(bytes: u64) -> u64 {
    bytes / BYTES_PER_MB
}
