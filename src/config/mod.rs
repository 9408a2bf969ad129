pub mod defaults;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use defaults::*;

/// File-level settings for the memory subsystem.
///
/// The runtime setters on `MemoryManager` accept anything; `validate` only
/// guards values read from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub memory_limit_mb: u64,
    pub gc_interval_secs: u64,
    pub batch_size: usize,
    pub monitor_interval_secs: u64,
    pub stream_gc_threshold: u64,
    pub compression_enabled: bool,
    pub buffer_capacity: usize,
}

impl MemoryConfig {
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILENAME)
    }

    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = if let Some(path) = config_path {
            let config_str = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.memory_limit_mb == 0 {
            return Err(anyhow::anyhow!("Memory limit must be greater than 0"));
        }

        if self.gc_interval_secs == 0 {
            return Err(anyhow::anyhow!("GC interval must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("Batch size must be greater than 0"));
        }

        if self.monitor_interval_secs == 0 {
            return Err(anyhow::anyhow!("Monitor interval must be greater than 0"));
        }

        if self.stream_gc_threshold == 0 {
            return Err(anyhow::anyhow!("Stream GC threshold must be greater than 0"));
        }

        if self.buffer_capacity == 0 {
            return Err(anyhow::anyhow!("Buffer capacity must be greater than 0"));
        }

        Ok(())
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            gc_interval_secs: DEFAULT_GC_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            monitor_interval_secs: DEFAULT_MONITOR_INTERVAL_SECS,
            stream_gc_threshold: DEFAULT_STREAM_GC_THRESHOLD,
            compression_enabled: false,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}
