use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bulk_mem::{
    BatchProcessor, BoundedBuffer, MemoryConfig, MemoryManager, MemoryMonitor, MemoryStats,
    PoolRegistry, StreamProcessor, TrackingAllocator,
};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

/// Drive a synthetic record workload through the memory-pressure pipeline
#[derive(Debug, Parser)]
#[command(name = "bulk-mem", version, about)]
struct Cli {
    /// Path to a TOML config file (defaults to the user config dir if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of records to generate
    #[arg(short, long, default_value_t = 100_000)]
    records: usize,

    /// Payload size of each record in bytes
    #[arg(long, default_value_t = 256)]
    record_size: usize,

    /// Override the monitor sampling interval, in milliseconds
    #[arg(long)]
    monitor_interval_ms: Option<u64>,

    /// Print the final statistics as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(|| {
        let default_path = MemoryConfig::default_config_path();
        default_path.exists().then_some(default_path)
    });
    let config = MemoryConfig::load(config_path.as_deref())?;
    info!("✅ Configuration loaded");

    let manager = Arc::new(MemoryManager::from_config(&config));
    let registry = Arc::new(PoolRegistry::new());
    manager.register_reclaimable(registry.clone());

    let monitor_interval = cli
        .monitor_interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.monitor_interval());
    let monitor = MemoryMonitor::with_interval(Arc::clone(&manager), monitor_interval);
    monitor.add_callback(|stats: &MemoryStats| {
        info!(
            "📈 alloc={} MB total={} MB sys={} MB passes={}",
            stats.alloc_mb, stats.total_alloc_mb, stats.sys_mb, stats.num_gc
        );
    });
    monitor.start()?;

    let started = Instant::now();
    let records = tokio::task::spawn_blocking({
        let manager = Arc::clone(&manager);
        let registry = Arc::clone(&registry);
        let config = config.clone();
        move || run_workload(&manager, &registry, &config, cli.records, cli.record_size)
    })
    .await
    .context("Workload task panicked")??;

    monitor.stop();
    info!("🎯 Processed {} records in {:?}", records, started.elapsed());

    let stats = manager.get_memory_stats();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Allocated:        {} MB", stats.alloc_mb);
        println!("Total allocated:  {} MB", stats.total_alloc_mb);
        println!("System:           {} MB", stats.sys_mb);
        println!("Heap reserved:    {} MB", stats.heap_sys_mb);
        println!("Stack:            {} MB", stats.stack_in_use_mb);
        println!("Reclaim passes:   {}", stats.num_gc);
        println!("Reclaim fraction: {:.6}", stats.gc_cpu_fraction);
    }

    Ok(())
}

fn run_workload(
    manager: &Arc<MemoryManager>,
    registry: &PoolRegistry,
    config: &MemoryConfig,
    record_count: usize,
    record_size: usize,
) -> Result<usize> {
    let record_pool = registry.get_pool("record", move || Vec::<u8>::with_capacity(record_size))?;

    let records: Vec<Vec<u8>> = (0..record_count)
        .map(|i| {
            let mut record = record_pool.get();
            record.clear();
            record.resize(record_size, (i % 251) as u8);
            record
        })
        .collect();
    info!("🔄 Produced {} records of {} bytes", records.len(), record_size);

    let buffer = BoundedBuffer::new(config.buffer_capacity);
    let mut flushes = 0usize;
    BatchProcessor::new(Arc::clone(manager)).process_in_batches(&records, |batch| {
        for record in batch {
            if buffer.write(record).is_err() {
                flushes += 1;
                buffer.reset();
                buffer
                    .write(record)
                    .context("Record larger than the output buffer")?;
            }
        }
        Ok::<_, anyhow::Error>(())
    })?;
    info!("Batch stage done: {} buffer flushes", flushes);

    let stream = StreamProcessor::with_gc_threshold(Arc::clone(manager), config.stream_gc_threshold);
    for record in records {
        stream.process_item(record, |mut record| {
            if record.len() != record_size {
                return Err(anyhow::anyhow!("Unexpected record length {}", record.len()));
            }
            record.clear();
            record_pool.put(record);
            Ok(())
        })?;
    }

    if manager.check_memory_pressure() {
        warn!("Memory limit exceeded at end of workload");
    }
    Ok(stream.processed_count() as usize)
}
