//! Usage gate.
//!
//! The gate answers one question right before a worker does destructive work:
//! is the cache already at or below the target? The read happens under a
//! mutex so two workers never interleave their reads, but the lock is never
//! held across file I/O. There is no reservation: concurrent workers can
//! overshoot the target by up to `workers - 1` files.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::errors::EvictError;
use crate::fs_ops::io_error_with_help;
use crate::platform;
use crate::shutdown::{StopFlag, StopReason};

/// Capacity snapshot for one filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    /// Used space as a percentage of total (0.0 for a zero-sized filesystem).
    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }
}

/// Where usage figures come from. Production uses statvfs; tests substitute
/// a deterministic source.
pub trait UsageSource: Send + Sync {
    fn usage(&self, path: &Path) -> io::Result<DiskUsage>;
}

/// statvfs-backed usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsUsage;

impl UsageSource for StatvfsUsage {
    fn usage(&self, path: &Path) -> io::Result<DiskUsage> {
        platform::disk_usage(path)
    }
}

/// True when a run should start: usage above threshold, or drain mode
/// (threshold and target both 0).
pub fn needs_eviction(usage_percent: f64, threshold: f64, target: f64) -> bool {
    usage_percent > threshold || (threshold == 0.0 && target == 0.0)
}

/// Shared, mutex-guarded usage check plus the run's stop flag.
pub struct UsageGate {
    source: Arc<dyn UsageSource>,
    cache_root: PathBuf,
    target_percentage: f64,
    lock: Mutex<()>,
    stop: StopFlag,
}

impl fmt::Debug for UsageGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageGate")
            .field("cache_root", &self.cache_root)
            .field("target_percentage", &self.target_percentage)
            .field("stop", &self.stop)
            .finish()
    }
}

impl UsageGate {
    pub fn new(
        source: Arc<dyn UsageSource>,
        cache_root: impl Into<PathBuf>,
        target_percentage: f64,
        stop: StopFlag,
    ) -> Self {
        Self {
            source,
            cache_root: cache_root.into(),
            target_percentage,
            lock: Mutex::new(()),
            stop,
        }
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn target_percentage(&self) -> f64 {
        self.target_percentage
    }

    /// Current cache usage in percent.
    pub fn cache_usage_percent(&self) -> Result<f64, EvictError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_percent()
    }

    /// Re-read cache usage; when at or below target, set the stop flag and
    /// return true. Once this returns true for anyone, no new task mutates.
    pub fn target_reached(&self) -> Result<bool, EvictError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let pct = self.read_percent()?;
        if pct <= self.target_percentage {
            if !self.stop.is_requested() {
                info!(
                    usage = format!("{pct:.1}"),
                    target = self.target_percentage,
                    "Target usage reached; stopping"
                );
            }
            self.stop.request(StopReason::TargetReached);
            return Ok(true);
        }
        debug!(usage = format!("{pct:.1}"), target = self.target_percentage, "Above target");
        Ok(false)
    }

    /// Bytes available on the filesystem holding `path`.
    pub fn free_bytes(&self, path: &Path) -> Result<u64, EvictError> {
        self.source
            .usage(path)
            .map(|u| u.free)
            .map_err(io_error_with_help("query free space", path))
    }

    fn read_percent(&self) -> Result<f64, EvictError> {
        self.source
            .usage(&self.cache_root)
            .map(|u| u.percent_used())
            .map_err(io_error_with_help("query cache usage", &self.cache_root))
    }
}
