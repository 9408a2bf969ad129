//! Default configuration constants for bulk-mem

use std::time::Duration;

// Memory manager defaults
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 500;
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(DEFAULT_GC_INTERVAL_SECS);
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// Stream processing
pub const DEFAULT_STREAM_GC_THRESHOLD: u64 = 10_000;

// Monitor sampling
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(DEFAULT_MONITOR_INTERVAL_SECS);

// Bounded buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024; // 1MB

pub const CONFIG_FILENAME: &str = "bulk-mem.toml";
