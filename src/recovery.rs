//! Startup recovery.
//!
//! A staging artifact at rest can only be the leftover of a move that died
//! before its rename: sources are never deleted until the destination is
//! committed. Every such artifact under the backing tree is therefore removed
//! outright, with no need to look at the cache side.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::EvictError;
use crate::exclude::{is_excluded, ExclusionRules};
use crate::fs_ops::{format_bytes, io_error_with_help, is_staging_name};

/// Remove orphaned staging artifacts under `backing_root`.
/// Returns how many were found and their total size; with `dry_run` they are
/// only reported.
pub fn sweep_orphans(backing_root: &Path, rules: &ExclusionRules, dry_run: bool) -> Result<(usize, u64), EvictError> {
    fs::metadata(backing_root).map_err(io_error_with_help("access backing directory", backing_root))?;

    let mut count = 0usize;
    let mut bytes = 0u64;

    let walker = WalkDir::new(backing_root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            let rel = e.path().strip_prefix(backing_root).unwrap_or(e.path());
            !is_excluded(rel, rules)
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during recovery");
                continue;
            }
        };
        let ft = entry.file_type();
        if ft.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !is_staging_name(name) {
            continue;
        }

        let size = if ft.is_file() {
            entry.metadata().map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        if dry_run {
            info!(path = %entry.path().display(), bytes = size, "dry-run: would remove orphaned staging file");
        } else if let Err(e) = fs::remove_file(entry.path()) {
            warn!(path = %entry.path().display(), error = %e, "Failed to remove orphaned staging file");
            continue;
        } else {
            debug!(path = %entry.path().display(), bytes = size, "Removed orphaned staging file");
        }
        count += 1;
        bytes += size;
    }

    if count > 0 {
        info!(count, bytes, size = %format_bytes(bytes), dry_run, "Orphaned staging files swept");
    } else {
        debug!("No orphaned staging files");
    }
    Ok((count, bytes))
}
