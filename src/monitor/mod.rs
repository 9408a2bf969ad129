//! Background memory sampling.
//!
//! A [`MemoryMonitor`] owns one dedicated thread while running. Each tick it
//! takes a statistics snapshot, forces reclamation when memory is under
//! pressure, and hands the snapshot to every registered callback in
//! registration order.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::defaults::DEFAULT_MONITOR_INTERVAL;
use crate::memory::stats::to_mb;
use crate::memory::{MemoryManager, MemoryStats};

/// Observer invoked with every sampled snapshot
pub type StatsCallback = Arc<dyn Fn(&MemoryStats) + Send + Sync>;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct MonitorSession {
    cancelled: Arc<AtomicBool>,
    stop_tx: oneshot::Sender<()>,
}

pub struct MemoryMonitor {
    memory_manager: Arc<MemoryManager>,
    interval: Duration,
    callbacks: Arc<Mutex<Vec<StatsCallback>>>,
    session: Mutex<Option<MonitorSession>>,
}

impl MemoryMonitor {
    pub fn new(memory_manager: Arc<MemoryManager>) -> Self {
        Self::with_interval(memory_manager, DEFAULT_MONITOR_INTERVAL)
    }

    pub fn with_interval(memory_manager: Arc<MemoryManager>, interval: Duration) -> Self {
        Self {
            memory_manager,
            interval: interval.max(MIN_INTERVAL),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            session: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Register an observer; it sees every tick that starts after this call
    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(&MemoryStats) + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Arc::new(callback));
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Launch the sampling thread. Does nothing if already running.
    pub fn start(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to build memory monitor runtime")?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let sampler = Sampler {
            memory_manager: Arc::clone(&self.memory_manager),
            callbacks: Arc::clone(&self.callbacks),
            cancelled: Arc::clone(&cancelled),
        };
        let interval = self.interval;

        thread::Builder::new()
            .name("memory-monitor".to_string())
            .spawn(move || runtime.block_on(sampler.run(interval, stop_rx)))
            .context("Failed to spawn memory monitor thread")?;

        *session = Some(MonitorSession { cancelled, stop_tx });
        info!("📊 Memory monitor started (interval {:?})", interval);
        Ok(())
    }

    /// Signal the sampling thread to exit. Does nothing if not running.
    ///
    /// Does not wait for the thread, so it is safe to call from a callback.
    /// No callback starts after this returns.
    pub fn stop(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        session.cancelled.store(true, Ordering::SeqCst);
        // The loop may already be gone; nothing to report then.
        let _ = session.stop_tx.send(());
        info!("Memory monitor stopped");
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Sampler {
    memory_manager: Arc<MemoryManager>,
    callbacks: Arc<Mutex<Vec<StatsCallback>>>,
    cancelled: Arc<AtomicBool>,
}

impl Sampler {
    async fn run(self, period: Duration, mut stop_rx: oneshot::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    self.sample();
                }
            }
        }
        debug!("Memory monitor loop exited");
    }

    fn sample(&self) {
        let stats = self.memory_manager.get_memory_stats();

        if self.memory_manager.check_memory_pressure() {
            warn!(
                "⚠️  Memory pressure: {} MB allocated, limit {} MB",
                stats.alloc_mb,
                to_mb(self.memory_manager.memory_limit_bytes())
            );
            self.memory_manager.force_gc();
        }

        // Dispatch from a copy so callbacks may register more callbacks.
        let callbacks: Vec<StatsCallback> = self.callbacks.lock().clone();
        for callback in callbacks {
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
            callback(&stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::manager::test_support::FixedStats;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant as StdInstant;

    const TICK: Duration = Duration::from_millis(40);

    fn monitor() -> MemoryMonitor {
        let manager = Arc::new(MemoryManager::with_stats_source(FixedStats::new(0)));
        MemoryMonitor::with_interval(manager, TICK)
    }

    #[test]
    fn test_defaults() {
        let manager = Arc::new(MemoryManager::with_stats_source(FixedStats::new(0)));
        let monitor = MemoryMonitor::new(manager);
        assert_eq!(monitor.interval(), Duration::from_secs(30));
        assert!(!monitor.is_running());
        assert_eq!(monitor.callback_count(), 0);
    }

    #[test]
    fn test_callbacks_run_in_registration_order() -> Result<()> {
        let monitor = monitor();
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            monitor.add_callback(move |_| order.lock().push(id));
        }

        monitor.start()?;
        thread::sleep(TICK * 3);
        monitor.stop();

        let order = order.lock().clone();
        assert!(order.len() >= 3, "expected at least one tick, got {:?}", order);
        for tick in order.chunks(3) {
            if tick.len() == 3 {
                assert_eq!(tick, [0, 1, 2]);
            }
        }
        Ok(())
    }

    #[test]
    fn test_double_start_runs_one_loop() -> Result<()> {
        let monitor = monitor();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        monitor.add_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let started = StdInstant::now();
        monitor.start()?;
        monitor.start()?;
        assert!(monitor.is_running());
        thread::sleep(TICK * 6);
        monitor.stop();
        let elapsed = started.elapsed();

        // A single loop ticks at most once per interval
        let max_ticks = (elapsed.as_millis() / TICK.as_millis()) as usize;
        let calls = calls.load(Ordering::SeqCst);
        assert!(calls >= 1);
        assert!(calls <= max_ticks, "{} callbacks in {:?}", calls, elapsed);
        Ok(())
    }

    #[test]
    fn test_no_callbacks_after_stop() -> Result<()> {
        let monitor = monitor();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        monitor.add_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.start()?;
        thread::sleep(TICK * 3);
        monitor.stop();
        assert!(!monitor.is_running());

        thread::sleep(TICK / 4);
        let after_stop = calls.load(Ordering::SeqCst);
        thread::sleep(TICK * 4);
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
        Ok(())
    }

    #[test]
    fn test_stop_when_not_running_is_noop() {
        let monitor = monitor();
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_restart_after_stop() -> Result<()> {
        let monitor = monitor();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        monitor.add_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.start()?;
        monitor.stop();
        monitor.start()?;
        thread::sleep(TICK * 3);
        monitor.stop();

        assert!(calls.load(Ordering::SeqCst) >= 1);
        Ok(())
    }

    #[test]
    fn test_pressure_triggers_reclamation() -> Result<()> {
        let stats = FixedStats::new(64 * 1024 * 1024);
        let manager = Arc::new(MemoryManager::with_stats_source(stats));
        manager.set_memory_limit(1);
        manager.set_gc_interval(Duration::from_secs(3600));

        let monitor = MemoryMonitor::with_interval(Arc::clone(&manager), TICK);
        monitor.start()?;
        thread::sleep(TICK * 3);
        monitor.stop();

        assert!(manager.get_memory_stats().num_gc >= 1);
        Ok(())
    }

    #[test]
    fn test_callback_may_register_another() -> Result<()> {
        let monitor = Arc::new(monitor());
        let registered = Arc::new(AtomicBool::new(false));
        let weak = Arc::downgrade(&monitor);
        let flag = Arc::clone(&registered);
        monitor.add_callback(move |_| {
            if !flag.swap(true, Ordering::SeqCst) {
                if let Some(monitor) = weak.upgrade() {
                    monitor.add_callback(|_| {});
                }
            }
        });

        monitor.start()?;
        thread::sleep(TICK * 3);
        monitor.stop();

        assert_eq!(monitor.callback_count(), 2);
        Ok(())
    }
}
