#![allow(dead_code)]

use filetime::{set_file_mtime, FileTime};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

use cache_mover::fs_ops::is_staging_name;
use cache_mover::{DiskUsage, MoveContext, StopFlag, UsageGate, UsageSource};

/// Deterministic usage: the cache filesystem's `used` is a fixed baseline plus
/// the bytes of every distinct inode currently under the cache tree. Any other
/// path reports `backing_free` bytes available.
pub struct TreeUsage {
    pub cache_root: PathBuf,
    pub capacity: u64,
    pub baseline: u64,
    pub backing_free: AtomicU64,
}

impl TreeUsage {
    pub fn new(cache_root: &Path, capacity: u64, baseline: u64) -> Arc<Self> {
        Arc::new(Self {
            cache_root: cache_root.to_path_buf(),
            capacity,
            baseline,
            backing_free: AtomicU64::new(u64::MAX / 2),
        })
    }

    pub fn with_backing_free(self: Arc<Self>, free: u64) -> Arc<Self> {
        self.backing_free.store(free, Ordering::SeqCst);
        self
    }

    pub fn percent(&self) -> f64 {
        self.usage(&self.cache_root).unwrap().percent_used()
    }
}

impl UsageSource for TreeUsage {
    fn usage(&self, path: &Path) -> io::Result<DiskUsage> {
        if path.starts_with(&self.cache_root) {
            let used = self.baseline + bytes_under(&self.cache_root);
            Ok(DiskUsage {
                total: self.capacity,
                used,
                free: self.capacity.saturating_sub(used),
            })
        } else {
            let free = self.backing_free.load(Ordering::SeqCst);
            Ok(DiskUsage {
                total: free,
                used: 0,
                free,
            })
        }
    }
}

fn bytes_under(root: &Path) -> u64 {
    let mut seen = HashSet::new();
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| seen.insert(m.ino()))
        .map(|m| m.len())
        .sum()
}

/// Canonical temp cache/backing pair.
pub fn tiers() -> (TempDir, PathBuf, PathBuf) {
    let td = tempfile::tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let cache = base.join("cache");
    let backing = base.join("backing");
    fs::create_dir_all(&cache).unwrap();
    fs::create_dir_all(&backing).unwrap();
    (td, cache, backing)
}

/// Write `size` bytes at `path` with an mtime `age` seconds after a fixed epoch
/// (smaller age = older file).
pub fn write_aged(path: &Path, size: usize, age: i64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![b'x'; size]).unwrap();
    set_file_mtime(path, FileTime::from_unix_time(1_600_000_000 + age, 0)).unwrap();
}

pub fn context(
    cache: &Path,
    backing: &Path,
    usage: Arc<TreeUsage>,
    target: f64,
    dry_run: bool,
) -> MoveContext {
    let gate = UsageGate::new(usage, cache, target, StopFlag::new());
    MoveContext::new(cache, backing, Arc::new(gate), dry_run)
}

/// Every staging artifact under `root`.
pub fn staging_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_str().is_some_and(is_staging_name))
        .map(|e| e.into_path())
        .collect()
}
