use std::sync::Arc;
use tracing::debug;

use crate::memory::MemoryManager;

/// Splits large collections into fixed-size chunks with a reclamation
/// checkpoint after each one.
#[derive(Clone)]
pub struct BatchProcessor {
    memory_manager: Arc<MemoryManager>,
}

impl BatchProcessor {
    pub fn new(memory_manager: Arc<MemoryManager>) -> Self {
        Self { memory_manager }
    }

    pub fn memory_manager(&self) -> &Arc<MemoryManager> {
        &self.memory_manager
    }

    /// Call `handler` once per chunk of the manager's batch size, in order.
    ///
    /// Stops at the first handler error and returns it unchanged; chunks
    /// already handled are not rolled back.
    pub fn process_in_batches<T, E, F>(&self, items: &[T], mut handler: F) -> Result<(), E>
    where
        F: FnMut(&[T]) -> Result<(), E>,
    {
        if items.is_empty() {
            return Ok(());
        }

        // A zero batch size would never advance; treat it as one item per chunk.
        let batch_size = self.memory_manager.batch_size().max(1);
        let total_batches = items.len().div_ceil(batch_size);
        debug!(
            "🔄 Processing {} items in {} batches of {}",
            items.len(),
            total_batches,
            batch_size
        );

        for (index, chunk) in items.chunks(batch_size).enumerate() {
            handler(chunk)?;
            if let Some(result) = self.memory_manager.force_gc() {
                debug!(
                    "Reclaimed after batch {}/{}: {} objects",
                    index + 1,
                    total_batches,
                    result.objects_collected
                );
            }
        }

        debug!("✅ Batch processing completed: {} items", items.len());
        Ok(())
    }
}
