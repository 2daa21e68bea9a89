//! Symlink eviction.
//! The link itself is recreated under the backing root; its target is
//! re-pointed when it refers into the cache tree. The new link is created
//! under a staging name and renamed over the destination, so whatever was
//! there is replaced in one step.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::EvictError;
use crate::select::SymlinkCandidate;

use super::atomic::commit_rename;
use super::context::{MoveContext, MoveOutcome};
use super::dirs::prepare_dest_dir;
use super::helpers::io_error_with_help;
use super::util::staging_path_for;

const NAME_ATTEMPTS: usize = 8;

pub fn move_symlink(candidate: &SymlinkCandidate, ctx: &MoveContext) -> Result<MoveOutcome, EvictError> {
    let started = Instant::now();
    if let Some(outcome) = ctx.admit()? {
        return Ok(outcome);
    }

    let src = candidate.path.as_path();
    let (dest, rel) = ctx.destination_for(src)?;
    let raw = fs::read_link(src).map_err(io_error_with_help("read symlink", src))?;
    let target = rewrite_target(&raw, src, &ctx.cache_root, &ctx.backing_root);

    if ctx.dry_run {
        info!(kind = "symlink", src = %src.display(), dest = %dest.display(), target = %target.display(), "dry-run: would move");
        return Ok(MoveOutcome::moved(0, started.elapsed()));
    }

    if let Some(parent) = rel.parent() {
        prepare_dest_dir(&ctx.cache_root, &ctx.backing_root, parent)?;
    }
    place_link(&target, &dest)?;

    if let Err(e) = fs::remove_file(src) {
        if let Err(rm) = fs::remove_file(&dest) {
            error!(dest = %dest.display(), error = %rm, "Failed to roll back destination symlink");
        }
        return Err(io_error_with_help("remove source symlink", src)(e));
    }

    info!(
        kind = "symlink",
        src = %src.display(),
        dest = %dest.display(),
        bytes = 0u64,
        target = %target.display(),
        "Moved"
    );
    Ok(MoveOutcome::moved(0, started.elapsed()))
}

/// Target for the relocated link.
///
/// A relative target is resolved against the link's own directory. Anything
/// inside `cache_root` is re-rooted under `backing_root`. Other absolute
/// targets are kept verbatim; other relative targets become absolute, since
/// the link no longer sits next to what they pointed at.
pub fn rewrite_target(raw: &Path, link: &Path, cache_root: &Path, backing_root: &Path) -> PathBuf {
    let absolute = if raw.is_absolute() {
        normalize(raw)
    } else {
        let dir = link.parent().unwrap_or_else(|| Path::new("/"));
        normalize(&dir.join(raw))
    };

    match absolute.strip_prefix(cache_root) {
        Ok(inside) => backing_root.join(inside),
        Err(_) if raw.is_absolute() => raw.to_path_buf(),
        Err(_) => absolute,
    }
}

/// Lexical `.`/`..` folding; the target may not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn place_link(target: &Path, dest: &Path) -> Result<(), EvictError> {
    for _ in 0..NAME_ATTEMPTS {
        let staging = staging_path_for(dest);
        match symlink(target, &staging) {
            Ok(()) => {
                if let Err(e) = commit_rename(&staging, dest) {
                    if let Err(rm) = fs::remove_file(&staging) {
                        warn!(path = %staging.display(), error = %rm, "Failed to remove staging symlink");
                    }
                    return Err(io_error_with_help("replace destination symlink", dest)(e));
                }
                debug!(dest = %dest.display(), target = %target.display(), "Placed symlink");
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(io_error_with_help("create symlink", &staging)(e)),
        }
    }
    Err(io_error_with_help("allocate staging name for", dest)(io::Error::from(
        io::ErrorKind::AlreadyExists,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absolute_target_inside_cache_is_rerooted() {
        let t = rewrite_target(
            Path::new("/cache/data/file.bin"),
            Path::new("/cache/links/l"),
            Path::new("/cache"),
            Path::new("/backing"),
        );
        assert_eq!(t, PathBuf::from("/backing/data/file.bin"));
    }

    #[test]
    fn relative_target_inside_cache_is_rerooted() {
        let t = rewrite_target(
            Path::new("../data/./file.bin"),
            Path::new("/cache/links/l"),
            Path::new("/cache"),
            Path::new("/backing"),
        );
        assert_eq!(t, PathBuf::from("/backing/data/file.bin"));
    }

    #[test]
    fn outside_targets() {
        let abs = rewrite_target(
            Path::new("/etc/hosts"),
            Path::new("/cache/l"),
            Path::new("/cache"),
            Path::new("/backing"),
        );
        assert_eq!(abs, PathBuf::from("/etc/hosts"));

        let rel = rewrite_target(
            Path::new("../../srv/x"),
            Path::new("/cache/a/l"),
            Path::new("/cache"),
            Path::new("/backing"),
        );
        assert_eq!(rel, PathBuf::from("/srv/x"));
    }

    #[test]
    fn cache_prefix_matches_whole_components_only() {
        let t = rewrite_target(
            Path::new("/cache2/f"),
            Path::new("/cache/l"),
            Path::new("/cache"),
            Path::new("/backing"),
        );
        assert_eq!(t, PathBuf::from("/cache2/f"));
    }

    #[test]
    fn place_link_replaces_existing_entry() {
        let td = tempdir().unwrap();
        let dest = td.path().join("link");
        fs::write(&dest, b"occupied").unwrap();
        place_link(Path::new("/some/target"), &dest).unwrap();
        assert_eq!(fs::read_link(&dest).unwrap(), PathBuf::from("/some/target"));
        assert_eq!(fs::read_dir(td.path()).unwrap().count(), 1);
    }
}
