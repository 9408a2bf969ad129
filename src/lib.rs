pub mod buffer;
pub mod config;
pub mod errors;
pub mod memory;
pub mod monitor;
pub mod pool;
pub mod processing;

// Re-export commonly used types
pub use buffer::BoundedBuffer;
pub use config::MemoryConfig;
pub use errors::{BufferError, PoolError};
pub use memory::{
    GcResult, MemoryManager, MemoryStats, ProcessStatsSource, RawMemoryStats, Reclaimable,
    StatsSource, TrackingAllocator,
};
pub use monitor::{MemoryMonitor, StatsCallback};
pub use pool::{ObjectPool, PoolRegistry, PoolStats};
pub use processing::{BatchProcessor, StreamProcessor};
