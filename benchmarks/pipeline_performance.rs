use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use bulk_mem::{BatchProcessor, BoundedBuffer, MemoryManager, PoolRegistry, StreamProcessor};

fn quiet_manager(batch_size: usize) -> Arc<MemoryManager> {
    let manager = Arc::new(MemoryManager::new());
    manager.set_memory_limit(1024 * 1024);
    manager.set_gc_interval(Duration::from_secs(3600));
    manager.set_batch_size(batch_size);
    manager
}

/// Benchmark chunked processing across batch sizes
fn bench_batch_processing(c: &mut Criterion) {
    let items: Vec<u64> = (0..100_000).collect();

    let mut group = c.benchmark_group("batch_processing");
    group.significance_level(0.1).sample_size(10);

    for batch_size in [100, 1_000, 10_000].iter() {
        let processor = BatchProcessor::new(quiet_manager(*batch_size));
        group.bench_with_input(BenchmarkId::new("batch_size", batch_size), batch_size, |b, _| {
            b.iter(|| {
                let mut sum = 0u64;
                processor
                    .process_in_batches(&items, |chunk| {
                        sum += chunk.iter().sum::<u64>();
                        Ok::<_, ()>(())
                    })
                    .unwrap();
                black_box(sum)
            });
        });
    }

    group.finish();
}

/// Benchmark per-item stream processing
fn bench_stream_processing(c: &mut Criterion) {
    let stream = StreamProcessor::new(quiet_manager(1000));

    c.bench_function("stream_process_item", |b| {
        b.iter(|| {
            stream
                .process_item(black_box(42u64), |item| {
                    black_box(item);
                    Ok::<_, ()>(())
                })
                .unwrap();
        });
    });
}

/// Benchmark pooled versus fresh record buffers
fn bench_pool_reuse(c: &mut Criterion) {
    let registry = PoolRegistry::new();
    let pool = registry
        .get_pool("record", || Vec::<u8>::with_capacity(4096))
        .unwrap();

    let mut group = c.benchmark_group("record_allocation");
    group.bench_function("pooled", |b| {
        b.iter(|| {
            let mut record = pool.get();
            record.extend_from_slice(black_box(&[1u8; 512]));
            record.clear();
            pool.put(record);
        });
    });
    group.bench_function("fresh", |b| {
        b.iter(|| {
            let mut record = Vec::<u8>::with_capacity(4096);
            record.extend_from_slice(black_box(&[1u8; 512]));
            black_box(record);
        });
    });
    group.finish();
}

/// Benchmark bounded buffer fill and reset cycles
fn bench_bounded_buffer(c: &mut Criterion) {
    let buffer = BoundedBuffer::new(64 * 1024);
    let payload = [7u8; 256];

    c.bench_function("bounded_buffer_fill", |b| {
        b.iter(|| {
            while buffer.write(black_box(&payload)).is_ok() {}
            buffer.reset();
        });
    });
}

criterion_group!(
    benches,
    bench_batch_processing,
    bench_stream_processing,
    bench_pool_reuse,
    bench_bounded_buffer
);
criterion_main!(benches);
