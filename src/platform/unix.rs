//! Unix implementations of platform helpers.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::gate::DiskUsage;

/// Capacity figures for the filesystem holding `path`.
///
/// `used` counts every allocated block (total minus free-to-root) while `free`
/// is what an unprivileged writer can still use, matching `df`.
pub fn disk_usage(path: &Path) -> io::Result<DiskUsage> {
    let stats = fs2::statvfs(path)?;
    let total = stats.total_space();
    Ok(DiskUsage {
        total,
        used: total.saturating_sub(stats.free_space()),
        free: stats.available_space(),
    })
}

/// chown(2) on `path` (follows symlinks).
pub fn set_owner(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    std::os::unix::fs::chown(path, Some(uid), Some(gid))
}

/// Open log file for appending; set 0600 only when creating a new file.
/// Existing files keep their mode so administrators can loosen it for log shipping.
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let existed = path.exists();
    let f = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)?;
    if !existed {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(f)
}

/// Write a config file atomically: hidden 0600 sibling, fsync, rename, fsync dir.
pub fn write_config_secure_new_0600(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "config path has no parent"))?;
    fs::create_dir_all(parent).with_context(|| format!("create parent '{}'", parent.display()))?;

    let tmp = config_tmp_sibling(path);
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .custom_flags(libc::O_NOFOLLOW)
        .open(&tmp)
        .with_context(|| format!("create temp '{}'", tmp.display()))?;
    f.write_all(contents).context("write temp")?;
    f.sync_all().context("fsync temp")?;
    drop(f);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("rename '{}' -> '{}'", tmp.display(), path.display()));
    }

    File::open(parent)
        .and_then(|d| d.sync_all())
        .with_context(|| format!("fsync dir '{}'", parent.display()))?;
    Ok(())
}

fn config_tmp_sibling(target: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let name = format!(".cache_mover.config.tmp.{}.{}", std::process::id(), nanos);
    target.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

pub fn set_dir_mode_0700(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

pub fn set_file_mode_0600(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}
