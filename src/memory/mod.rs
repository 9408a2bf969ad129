pub mod manager;
pub mod reclaim;
pub mod stats;

// Re-export the main memory management components
pub use manager::MemoryManager;
pub use reclaim::{release_to_os, GcResult, Reclaimable};
pub use stats::{MemoryStats, ProcessStatsSource, RawMemoryStats, StatsSource, TrackingAllocator};
