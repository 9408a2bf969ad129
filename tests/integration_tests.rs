use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bulk_mem::{
    BatchProcessor, BoundedBuffer, BufferError, MemoryManager, PoolRegistry, RawMemoryStats,
    StatsSource, StreamProcessor,
};

const MB: u64 = 1024 * 1024;

/// Stats source driven by the test instead of the process
struct ScriptedStats {
    allocated: AtomicU64,
}

impl ScriptedStats {
    fn new(allocated: u64) -> Arc<Self> {
        Arc::new(Self {
            allocated: AtomicU64::new(allocated),
        })
    }
}

impl StatsSource for ScriptedStats {
    fn sample(&self) -> RawMemoryStats {
        let allocated = self.allocated.load(Ordering::SeqCst);
        RawMemoryStats {
            allocated_bytes: allocated,
            total_allocated_bytes: allocated,
            resident_bytes: allocated,
            virtual_bytes: allocated,
            stack_bytes: 0,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct StopTime {
    trip_id: String,
    stop_sequence: u32,
}

/// Pool registry shared by concurrent producers
#[cfg(test)]
mod pool_tests {
    use super::*;

    #[test]
    fn test_concurrent_producers_share_one_pool() -> Result<()> {
        let registry = Arc::new(PoolRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || -> Result<u32> {
                    let pool = registry.get_pool("stop_time", StopTime::default)?;
                    let mut produced = 0;
                    for seq in 0..100 {
                        let mut stop = pool.get();
                        stop.trip_id = format!("trip-{}", worker);
                        stop.stop_sequence = seq;
                        produced += 1;
                        // Callers reset before returning
                        stop.trip_id.clear();
                        stop.stop_sequence = 0;
                        pool.put(stop);
                    }
                    Ok(produced)
                })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            total += handle.join().expect("producer panicked")?;
        }

        assert_eq!(total, 800);
        assert_eq!(registry.len(), 1);

        let pool = registry.get_pool("stop_time", || StopTime {
            trip_id: "ignored".to_string(),
            stop_sequence: 99,
        })?;
        let stats = pool.stats();
        assert_eq!(stats.created + stats.reused, 800);
        assert!(stats.created <= 8);
        assert_eq!(pool.get(), StopTime::default());
        Ok(())
    }

    #[test]
    fn test_reclamation_drains_registered_pools() -> Result<()> {
        let registry = Arc::new(PoolRegistry::new());
        let manager = MemoryManager::with_stats_source(ScriptedStats::new(0));
        manager.register_reclaimable(registry.clone());
        manager.set_gc_interval(Duration::ZERO);

        let pool = registry.get_pool("record", || vec![0u8; 1024])?;
        let held: Vec<_> = (0..5).map(|_| pool.get()).collect();
        held.into_iter().for_each(|record| pool.put(record));
        assert_eq!(pool.idle_count(), 5);

        let result = manager.force_gc().expect("zero interval is always due");
        assert_eq!(result.objects_collected, 5);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(registry.len(), 1);
        Ok(())
    }
}

/// Batch and stream processing through a shared manager
#[cfg(test)]
mod processing_tests {
    use super::*;

    #[test]
    fn test_batches_write_into_bounded_buffer() -> Result<()> {
        let manager = Arc::new(MemoryManager::with_stats_source(ScriptedStats::new(0)));
        manager.set_batch_size(4);
        let processor = BatchProcessor::new(Arc::clone(&manager));

        let records: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i; 3]).collect();
        let buffer = BoundedBuffer::new(12);
        let mut flushed = Vec::new();

        processor.process_in_batches(&records, |batch| {
            for record in batch {
                if let Err(BufferError::Full { .. }) = buffer.write(record) {
                    flushed.push(buffer.read());
                    buffer.reset();
                    buffer.write(record)?;
                }
            }
            Ok::<_, BufferError>(())
        })?;
        flushed.push(buffer.read());

        let joined: Vec<u8> = flushed.concat();
        let expected: Vec<u8> = records.concat();
        assert_eq!(joined, expected);
        assert!(flushed.iter().all(|chunk| chunk.len() <= 12));
        Ok(())
    }

    #[test]
    fn test_handler_error_surfaces_unchanged() {
        #[derive(Debug, PartialEq)]
        enum FeedError {
            Malformed(usize),
        }

        let manager = Arc::new(MemoryManager::with_stats_source(ScriptedStats::new(0)));
        manager.set_batch_size(2);
        let processor = BatchProcessor::new(manager);
        let items: Vec<usize> = (0..9).collect();
        let mut handled = Vec::new();

        let result = processor.process_in_batches(&items, |batch| {
            if batch.contains(&5) {
                return Err(FeedError::Malformed(5));
            }
            handled.extend_from_slice(batch);
            Ok(())
        });

        assert_eq!(result, Err(FeedError::Malformed(5)));
        assert_eq!(handled, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_batches_reclaim_under_pressure() -> Result<()> {
        let stats = ScriptedStats::new(900 * MB);
        let manager = Arc::new(MemoryManager::with_stats_source(stats));
        manager.set_gc_interval(Duration::from_secs(3600));
        manager.set_memory_limit(500);
        manager.set_batch_size(10);

        let items: Vec<u32> = (0..35).collect();
        BatchProcessor::new(Arc::clone(&manager)).process_in_batches(&items, |_| Ok::<_, ()>(()))
            .map_err(|_| anyhow::anyhow!("handler failed"))?;

        // One pass per chunk while allocation stays above the limit
        assert_eq!(manager.get_memory_stats().num_gc, 4);
        Ok(())
    }

    #[test]
    fn test_parallel_streams_share_manager() {
        let manager = Arc::new(MemoryManager::with_stats_source(ScriptedStats::new(0)));
        manager.set_gc_interval(Duration::ZERO);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    let stream = StreamProcessor::with_gc_threshold(manager, 100);
                    for i in 0..1000u32 {
                        stream.process_item(i, |_| Ok::<_, ()>(())).unwrap();
                    }
                    stream.processed_count()
                })
            })
            .collect();

        let counts: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(counts, vec![1000; 4]);
        // Each stream requested 10 passes; concurrent requests may collapse
        let passes = manager.get_memory_stats().num_gc;
        assert!(passes >= 1 && passes <= 40, "unexpected pass count {}", passes);
    }
}
