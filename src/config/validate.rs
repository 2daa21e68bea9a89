//! Config validation logic.
//! Verifies directory existence, readability/writability, disjoint tiers and
//! the percentage/worker bounds the eviction core relies on.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use super::types::Config;

impl Config {
    /// Validate paths and numeric settings.
    pub fn validate(&self) -> Result<()> {
        let cache = &self.cache_path;
        let backing = &self.backing_path;

        if cache.as_os_str().is_empty() {
            bail!("cache_path is not set (config file, CACHE_PATH or --cache-path)");
        }
        if backing.as_os_str().is_empty() {
            bail!("backing_path is not set (config file, BACKING_PATH or --backing-path)");
        }

        // 1) Cache: must exist, be a directory, and be readable.
        ensure_dir_exists_and_is_dir(cache, "cache_path")?;
        ensure_readable(cache, "cache_path")?;

        // 2) Backing: must exist, be a directory, and be writable.
        ensure_dir_exists_and_is_dir(backing, "backing_path")?;
        ensure_writable(backing, "backing_path")?;

        // 3) Resolve symlinks and ensure the tiers are disjoint (neither contains the other).
        let cache_real = dunce::canonicalize(cache).unwrap_or_else(|_| cache.clone());
        let backing_real = dunce::canonicalize(backing).unwrap_or_else(|_| backing.clone());
        if cache_real == backing_real {
            bail!(
                "cache_path and backing_path resolve to the same path: '{}'",
                cache_real.display()
            );
        }
        if cache_real.starts_with(&backing_real) {
            bail!(
                "cache_path '{}' must not be inside backing_path '{}'",
                cache_real.display(),
                backing_real.display()
            );
        }
        if backing_real.starts_with(&cache_real) {
            bail!(
                "backing_path '{}' must not be inside cache_path '{}'",
                backing_real.display(),
                cache_real.display()
            );
        }

        // 4) Usage bounds.
        ensure_percentage(self.threshold_percentage, "threshold_percentage")?;
        ensure_percentage(self.target_percentage, "target_percentage")?;
        if !(self.threshold_percentage > self.target_percentage || self.is_drain_mode()) {
            bail!(
                "threshold_percentage ({}) must be greater than target_percentage ({}), or both 0 to drain the cache",
                self.threshold_percentage,
                self.target_percentage
            );
        }
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }

        info!(
            "Config validated: cache='{}' backing='{}' threshold={} target={} workers={}",
            cache.display(),
            backing.display(),
            self.threshold_percentage,
            self.target_percentage,
            self.max_workers
        );
        Ok(())
    }
}

/// Ensure path exists and is a directory; emit clear errors with path context.
fn ensure_dir_exists_and_is_dir(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        error!("{name} does not exist: {}", path.display());
        bail!("{name} does not exist: {}", path.display());
    }
    if !path.is_dir() {
        error!("{name} is not a directory: {}", path.display());
        bail!("{name} is not a directory: {}", path.display());
    }
    Ok(())
}

/// Ensure directory is readable by attempting to open its entries.
fn ensure_readable(path: &Path, name: &str) -> Result<()> {
    fs::read_dir(path)
        .with_context(|| format!("Cannot read {name} directory '{}'; check permissions", path.display()))?;
    debug!("{name} readable: {}", path.display());
    Ok(())
}

/// Ensure directory is writable using a non-destructive scratch file.
fn ensure_writable(path: &Path, name: &str) -> Result<()> {
    let scratch = path.join(format!(".cache_mover_write_check_{}.tmp", std::process::id()));
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&scratch)
        .with_context(|| format!("Cannot write to {name} '{}'; check permissions", path.display()))?;
    let _ = fs::remove_file(&scratch);
    debug!("{name} writable: {}", path.display());
    Ok(())
}

fn ensure_percentage(value: f64, name: &str) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        bail!("{name} must be between 0 and 100, got {value}");
    }
    Ok(())
}
