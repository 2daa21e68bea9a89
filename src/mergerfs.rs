//! Physical path resolution on a mergerfs pool.
//!
//! mergerfs exposes two pieces of metadata through extended attributes:
//! - `user.mergerfs.relpath` on every file: its path relative to the branch it lives on.
//! - `user.mergerfs.srcmounts` on the `.mergerfs` control file at the mount
//!   root: the colon-separated branch list, entries optionally globbed and
//!   optionally carrying a `=RW`/`=RO`/`=NC` mode suffix.
//!
//! Joining each expanded branch with the relative path gives the candidate
//! on-disk locations. Missing metadata means "not a pool" and yields an empty
//! result rather than an error for callers that only want a best effort.

use globset::{Glob, GlobMatcher};
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::EvictError;
use crate::platform::get_xattr;

pub const RELPATH_XATTR: &str = "user.mergerfs.relpath";
pub const SRCMOUNTS_XATTR: &str = "user.mergerfs.srcmounts";
pub const CONTROL_FILE: &str = ".mergerfs";

/// One on-disk location of a pooled path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPath {
    /// Branch root (physical mountpoint).
    pub branch: PathBuf,
    /// `branch` joined with the pooled relative path; known to exist.
    pub path: PathBuf,
}

/// Existing physical locations of `path`, or an empty list when the pool
/// metadata is unavailable.
pub fn resolve_physical_paths(path: &Path) -> Vec<PathBuf> {
    match branch_locations(path) {
        Ok(found) => found.into_iter().map(|b| b.path).collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Physical path resolution failed");
            Vec::new()
        }
    }
}

/// Like `resolve_physical_paths` but keeps the branch root of each hit and
/// reports why resolution failed.
pub fn branch_locations(path: &Path) -> Result<Vec<BranchPath>, EvictError> {
    let rel = relpath(path)?;
    let control = find_control_file(path).ok_or_else(|| EvictError::Resolution {
        path: path.to_path_buf(),
        reason: format!("no {CONTROL_FILE} control file in any ancestor"),
    })?;
    let raw = get_xattr(&control, SRCMOUNTS_XATTR).ok_or_else(|| EvictError::Resolution {
        path: control.clone(),
        reason: format!("{SRCMOUNTS_XATTR} not readable"),
    })?;
    let raw = String::from_utf8_lossy(&raw);

    let mut found = Vec::new();
    for entry in parse_srcmounts(&raw) {
        for branch in expand_branch(&entry) {
            let candidate = branch.join(&rel);
            if fs::symlink_metadata(&candidate).is_ok() {
                found.push(BranchPath {
                    branch,
                    path: candidate,
                });
            }
        }
    }
    debug!(path = %path.display(), hits = found.len(), "Resolved physical locations");
    Ok(found)
}

/// Branch-relative path of `path` from its relpath attribute, without the leading '/'.
fn relpath(path: &Path) -> Result<PathBuf, EvictError> {
    let raw = get_xattr(path, RELPATH_XATTR).ok_or_else(|| EvictError::Resolution {
        path: path.to_path_buf(),
        reason: format!("{RELPATH_XATTR} not present"),
    })?;
    let trimmed: &[u8] = match raw.iter().rposition(|&b| b != 0) {
        Some(end) => &raw[..=end],
        None => &[],
    };
    let rel: PathBuf = Path::new(OsStr::from_bytes(trimmed))
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    Ok(rel)
}

/// Nearest `.mergerfs` control file in an ancestor directory of `path`.
pub fn find_control_file(path: &Path) -> Option<PathBuf> {
    path.ancestors().skip(1).find_map(|dir| {
        let control = dir.join(CONTROL_FILE);
        fs::symlink_metadata(&control).is_ok().then_some(control)
    })
}

/// Split a srcmounts value into branch patterns, dropping mode suffixes and blanks.
pub fn parse_srcmounts(raw: &str) -> Vec<String> {
    raw.trim_end_matches('\0')
        .split(':')
        .map(|entry| match entry.rsplit_once('=') {
            Some((path, mode)) if !mode.contains('/') => path,
            _ => entry,
        })
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Expand one branch pattern against the live filesystem, component by component.
/// Literal entries are returned as-is.
pub fn expand_branch(pattern: &str) -> Vec<PathBuf> {
    if !has_glob_meta(pattern) {
        return vec![PathBuf::from(pattern)];
    }

    let mut prefixes = vec![PathBuf::new()];
    for comp in Path::new(pattern).components() {
        let text = comp.as_os_str().to_string_lossy();
        if !matches!(comp, Component::Normal(_)) || !has_glob_meta(&text) {
            for p in prefixes.iter_mut() {
                p.push(comp);
            }
            continue;
        }
        let matcher: GlobMatcher = match Glob::new(&text) {
            Ok(g) => g.compile_matcher(),
            Err(e) => {
                warn!(pattern, error = %e, "Invalid branch glob");
                return Vec::new();
            }
        };
        let mut next = Vec::new();
        for prefix in &prefixes {
            let dir = if prefix.as_os_str().is_empty() { Path::new(".") } else { prefix.as_path() };
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if matcher.is_match(entry.file_name()) {
                    next.push(prefix.join(entry.file_name()));
                }
            }
        }
        next.sort();
        prefixes = next;
    }
    prefixes.retain(|p| p.is_dir());
    prefixes
}
