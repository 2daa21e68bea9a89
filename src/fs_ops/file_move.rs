//! Single regular file eviction.
//! Stage next to the destination, verify, rename into place, and only then
//! delete the source. The source is never removed before the destination
//! has been committed under its final name.

use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

use crate::errors::EvictError;
use crate::select::FileCandidate;

use super::context::{MoveContext, MoveOutcome};
use super::dirs::prepare_dest_dir;
use super::helpers::io_error_with_help;
use super::stage::StagedFile;
use super::util::format_bytes;

/// Move one regular file from the cache tier to the same relative path under
/// the backing root.
pub fn move_one(candidate: &FileCandidate, ctx: &MoveContext) -> Result<MoveOutcome, EvictError> {
    let started = Instant::now();
    if let Some(outcome) = ctx.admit()? {
        return Ok(outcome);
    }

    let src = candidate.path.as_path();
    let (dest, rel) = ctx.destination_for(src)?;

    if ctx.dry_run {
        info!(kind = "file", src = %src.display(), dest = %dest.display(), bytes = candidate.size_bytes, "dry-run: would move");
        return Ok(MoveOutcome::moved(candidate.size_bytes, started.elapsed()));
    }

    let src_meta = fs::symlink_metadata(src).map_err(io_error_with_help("stat source", src))?;
    if let Some(parent) = rel.parent() {
        prepare_dest_dir(&ctx.cache_root, &ctx.backing_root, parent)?;
    }
    ensure_capacity(ctx, &dest, src_meta.len())?;

    let bytes = stage_and_commit(src, &dest, &src_meta, candidate.size_bytes)?;
    remove_source_or_rollback(src, &dest)?;

    info!(
        kind = "file",
        src = %src.display(),
        dest = %dest.display(),
        bytes,
        size = %format_bytes(bytes),
        "Moved"
    );
    Ok(MoveOutcome::moved(bytes, started.elapsed()))
}

/// Fail with InsufficientSpace when the filesystem holding `dest` cannot take `required` bytes.
pub(super) fn ensure_capacity(ctx: &MoveContext, dest: &Path, required: u64) -> Result<(), EvictError> {
    let statfs_path = dest.parent().unwrap_or(&ctx.backing_root);
    let available = ctx.gate.free_bytes(statfs_path)?;
    if available < required {
        return Err(EvictError::InsufficientSpace {
            path: dest.to_path_buf(),
            required,
            available,
        });
    }
    Ok(())
}

/// Stage, verify, commit. Leaves the source alone.
///
/// `expected` is the size recorded at selection. The live source and the
/// staged copy must both match it; a file that changed since selection is
/// still being written and stays in the cache.
pub(super) fn stage_and_commit(src: &Path, dest: &Path, src_meta: &fs::Metadata, expected: u64) -> Result<u64, EvictError> {
    let staged = StagedFile::stage(src, dest, src_meta)?;
    let live = fs::metadata(src).map_err(io_error_with_help("re-stat source", src))?.len();
    if live != expected {
        return Err(EvictError::VerificationMismatch {
            path: dest.to_path_buf(),
            expected,
            actual: live,
        });
    }
    staged.verify(expected)?;
    let bytes = staged.bytes();
    staged.commit()?;
    Ok(bytes)
}

/// Delete the source of a committed move. If that fails the cache copy stays
/// authoritative and the committed destination is removed again.
pub(super) fn remove_source_or_rollback(src: &Path, dest: &Path) -> Result<(), EvictError> {
    let Err(e) = fs::remove_file(src) else {
        return Ok(());
    };
    if let Err(rm) = fs::remove_file(dest) {
        error!(dest = %dest.display(), error = %rm, "Failed to roll back destination after source removal failure");
    }
    Err(io_error_with_help("remove source after commit", src)(e))
}
