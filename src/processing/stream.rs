use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::config::defaults::DEFAULT_STREAM_GC_THRESHOLD;
use crate::memory::MemoryManager;

/// Processes items one at a time, requesting reclamation every
/// `gc_threshold` successful items.
pub struct StreamProcessor {
    memory_manager: Arc<MemoryManager>,
    processed: AtomicU64,
    gc_threshold: u64,
}

impl StreamProcessor {
    pub fn new(memory_manager: Arc<MemoryManager>) -> Self {
        Self::with_gc_threshold(memory_manager, DEFAULT_STREAM_GC_THRESHOLD)
    }

    pub fn with_gc_threshold(memory_manager: Arc<MemoryManager>, gc_threshold: u64) -> Self {
        Self {
            memory_manager,
            processed: AtomicU64::new(0),
            gc_threshold,
        }
    }

    /// Run `handler` on one item. Failed items are not counted.
    pub fn process_item<T, E, F>(&self, item: T, handler: F) -> Result<(), E>
    where
        F: FnOnce(T) -> Result<(), E>,
    {
        handler(item)?;

        let count = self.processed.fetch_add(1, Ordering::AcqRel) + 1;
        if self.gc_threshold > 0 && count % self.gc_threshold == 0 {
            debug!("Stream checkpoint at {} items", count);
            self.memory_manager.force_gc();
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.processed.store(0, Ordering::Release);
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn gc_threshold(&self) -> u64 {
        self.gc_threshold
    }
}
