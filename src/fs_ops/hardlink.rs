//! Hardlink group eviction.
//!
//! The first member is copied with the regular stage/verify/commit sequence
//! (its source is kept for now). Every other member is hard-linked to that
//! committed copy. On a pool, two logical paths can live on different
//! physical branches, so a cross-device link failure falls back to linking
//! the physical paths on a branch where both exist.
//!
//! Sources are deleted only after every member has landed. A failure before
//! that rolls back the destinations created for the group. A failure while
//! deleting re-links the sources already removed and rolls back only if that
//! succeeded, so at least one full copy always survives.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::EvictError;
use crate::mergerfs::branch_locations;
use crate::select::HardlinkGroup;

use super::context::{MoveContext, MoveOutcome};
use super::dirs::prepare_dest_dir;
use super::file_move::{ensure_capacity, stage_and_commit};
use super::helpers::io_error_with_help;
use super::util::{format_bytes, is_cross_device};

/// Result of a direct hardlink attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAttempt {
    Linked,
    /// EXDEV: the two paths are not on one physical filesystem.
    CrossDevice,
}

/// `link(original, link)`, reporting a cross-device refusal as a value.
pub fn try_hardlink(original: &Path, link: &Path) -> io::Result<LinkAttempt> {
    match fs::hard_link(original, link) {
        Ok(()) => Ok(LinkAttempt::Linked),
        Err(e) if is_cross_device(&e) => Ok(LinkAttempt::CrossDevice),
        Err(e) => Err(e),
    }
}

/// Move every member of `group` under the backing root, preserving the link.
pub fn move_group(group: &HardlinkGroup, ctx: &MoveContext) -> Result<MoveOutcome, EvictError> {
    let started = Instant::now();
    if let Some(outcome) = ctx.admit()? {
        return Ok(outcome);
    }

    let Some(first) = group.members.first() else {
        return Ok(MoveOutcome::default());
    };

    let mut planned: Vec<(&Path, PathBuf, PathBuf)> = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let (dest, rel) = ctx.destination_for(member)?;
        planned.push((member.as_path(), dest, rel));
    }

    if ctx.dry_run {
        for (src, dest, _) in &planned {
            info!(kind = "hardlink", src = %src.display(), dest = %dest.display(), inode = group.inode, "dry-run: would move");
        }
        return Ok(MoveOutcome::moved(group.size_bytes, started.elapsed()));
    }

    let partial = |path: &Path, reason: String| EvictError::PartialGroup {
        inode: group.inode,
        path: path.to_path_buf(),
        reason,
    };

    // First member: full copy, source kept.
    let (_, first_dest, first_rel) = &planned[0];
    let src_meta = fs::symlink_metadata(first).map_err(io_error_with_help("stat source", first))?;
    if let Some(parent) = first_rel.parent() {
        prepare_dest_dir(&ctx.cache_root, &ctx.backing_root, parent)?;
    }
    ensure_capacity(ctx, first_dest, src_meta.len())?;
    let bytes = stage_and_commit(first, first_dest, &src_meta, group.size_bytes)?;
    let mut created: Vec<PathBuf> = vec![first_dest.clone()];

    for (member, dest, rel) in planned.iter().skip(1) {
        let linked = rel
            .parent()
            .map_or(Ok(()), |parent| prepare_dest_dir(&ctx.cache_root, &ctx.backing_root, parent))
            .and_then(|()| link_member(first_dest, dest, rel, ctx));
        if let Err(e) = linked {
            rollback(&created);
            return Err(partial(*member, e.to_string()));
        }
        debug!(src = %member.display(), dest = %dest.display(), "Linked group member");
        created.push(dest.clone());
    }

    let mut removed: Vec<&Path> = Vec::with_capacity(group.members.len());
    for member in &group.members {
        match fs::remove_file(member) {
            Ok(()) => removed.push(member.as_path()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(src = %member.display(), "Group member already gone");
            }
            Err(e) => {
                abandon_after_partial_removal(&removed, &group.members, first_dest, &created);
                return Err(partial(member.as_path(), format!("remove source: {e}")));
            }
        }
    }

    for (src, dest, _) in &planned {
        info!(kind = "hardlink", src = %src.display(), dest = %dest.display(), bytes, inode = group.inode, "Moved");
    }
    info!(
        inode = group.inode,
        members = group.members.len(),
        size = %format_bytes(bytes),
        "Moved hardlink group"
    );
    Ok(MoveOutcome::moved(bytes, started.elapsed()))
}

/// Link `dest` to the committed `first_dest`, falling back to the physical
/// branch layout on EXDEV.
fn link_member(first_dest: &Path, dest: &Path, rel: &Path, ctx: &MoveContext) -> Result<(), EvictError> {
    clear_destination(dest)?;
    match try_hardlink(first_dest, dest).map_err(io_error_with_help("hard link", dest))? {
        LinkAttempt::Linked => Ok(()),
        LinkAttempt::CrossDevice => {
            debug!(src = %first_dest.display(), dest = %dest.display(), "Cross-device link; trying physical branches");
            link_on_branch(first_dest, dest, rel, &ctx.backing_root)
        }
    }
}

/// Find a branch holding both the committed first copy and the backing root,
/// and create the link there between physical paths.
fn link_on_branch(first_dest: &Path, dest: &Path, rel: &Path, backing_root: &Path) -> Result<(), EvictError> {
    let sources = branch_locations(first_dest)?;
    let roots = branch_locations(backing_root)?;
    if sources.is_empty() || roots.is_empty() {
        return Err(EvictError::Resolution {
            path: first_dest.to_path_buf(),
            reason: "no physical branch locations".to_string(),
        });
    }

    for src in &sources {
        for root in roots.iter().filter(|r| r.branch == src.branch) {
            let target = root.path.join(rel);
            if let Some(parent) = target.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    debug!(branch = %root.branch.display(), error = %e, "Cannot create parent on branch");
                    continue;
                }
            }
            match try_hardlink(&src.path, &target) {
                Ok(LinkAttempt::Linked) => {
                    info!(branch = %root.branch.display(), src = %src.path.display(), dest = %target.display(), "Linked on physical branch");
                    return Ok(());
                }
                Ok(LinkAttempt::CrossDevice) => {
                    debug!(branch = %root.branch.display(), "Still cross-device on branch")
                }
                Err(e) => debug!(branch = %root.branch.display(), error = %e, "Branch link failed"),
            }
        }
    }

    Err(EvictError::CrossDeviceLink {
        src: first_dest.to_path_buf(),
        dest: dest.to_path_buf(),
    })
}

/// Remove whatever non-directory entry occupies `dest`.
fn clear_destination(dest: &Path) -> Result<(), EvictError> {
    match fs::symlink_metadata(dest) {
        Ok(m) if !m.is_dir() => fs::remove_file(dest).map_err(io_error_with_help("replace existing destination", dest)),
        Ok(_) => Err(io_error_with_help("replace existing destination", dest)(io::Error::from(
            io::ErrorKind::AlreadyExists,
        ))),
        Err(_) => Ok(()),
    }
}

fn rollback(created: &[PathBuf]) {
    for dest in created.iter().rev() {
        match fs::remove_file(dest) {
            Ok(()) => debug!(dest = %dest.display(), "Rolled back group destination"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(dest = %dest.display(), error = %e, "Failed to roll back group destination"),
        }
    }
}

/// Undo a deletion pass that stopped partway. Destinations are rolled back
/// only once every removed source is back; otherwise they stay as the only
/// remaining copy. Returns true when the destinations were rolled back.
fn abandon_after_partial_removal(removed: &[&Path], members: &[PathBuf], first_dest: &Path, created: &[PathBuf]) -> bool {
    if restore_sources(removed, members, first_dest) {
        rollback(created);
        return true;
    }
    error!(
        first_dest = %first_dest.display(),
        kept = created.len(),
        "Group sources could not be restored; keeping backing copies"
    );
    false
}

/// Re-link sources unlinked during a failed deletion pass. Any member that is
/// still a regular file can serve as the link source, then the committed
/// first copy (which only works when both tiers share a filesystem).
/// Returns true when every removed source exists again.
fn restore_sources(removed: &[&Path], members: &[PathBuf], first_dest: &Path) -> bool {
    let survivors: Vec<&Path> = members
        .iter()
        .map(PathBuf::as_path)
        .filter(|m| !removed.contains(m))
        .filter(|m| fs::symlink_metadata(m).is_ok_and(|meta| meta.is_file()))
        .chain(std::iter::once(first_dest))
        .collect();

    let mut all_restored = true;
    for path in removed {
        let restored = survivors.iter().any(|survivor| match fs::hard_link(survivor, path) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %path.display(), survivor = %survivor.display(), error = %e, "Restore attempt failed");
                false
            }
        });
        if !restored {
            warn!(path = %path.display(), "Failed to restore group source");
            all_restored = false;
        }
    }
    all_restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn direct_link_on_same_filesystem() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"x").unwrap();
        assert_eq!(try_hardlink(&a, &b).unwrap(), LinkAttempt::Linked);
        assert!(b.exists());
    }

    #[test]
    fn link_onto_existing_path_is_an_error() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"x").unwrap();
        fs::write(&b, b"y").unwrap();
        assert_eq!(try_hardlink(&a, &b).unwrap_err().kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn clear_destination_removes_files_but_not_dirs() {
        let td = tempdir().unwrap();
        let f = td.path().join("f");
        fs::write(&f, b"x").unwrap();
        clear_destination(&f).unwrap();
        assert!(!f.exists());
        clear_destination(&f).unwrap();

        let d = td.path().join("d");
        fs::create_dir(&d).unwrap();
        assert!(clear_destination(&d).is_err());
    }

    #[test]
    fn restore_relinks_removed_sources() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"data").unwrap();
        fs::hard_link(&a, &b).unwrap();
        fs::remove_file(&a).unwrap();
        let members = vec![a.clone(), b.clone()];
        assert!(restore_sources(&[a.as_path()], &members, &td.path().join("missing")));
        assert_eq!(fs::read(&a).unwrap(), b"data");
    }

    #[test]
    fn restore_falls_back_to_committed_copy() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        let committed = td.path().join("dest_a");
        fs::write(&committed, b"data").unwrap();
        let members = vec![a.clone(), b.clone()];
        assert!(restore_sources(&[a.as_path(), b.as_path()], &members, &committed));
        assert_eq!(fs::read(&a).unwrap(), b"data");
        assert_eq!(fs::read(&b).unwrap(), b"data");
    }

    #[test]
    fn destinations_are_kept_when_sources_cannot_be_restored() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let dest = td.path().join("dest_a");
        let members = vec![a.clone(), td.path().join("b")];
        let created = vec![dest.clone()];

        // Nothing left to link from: neither member nor the committed copy.
        assert!(!abandon_after_partial_removal(&[a.as_path()], &members, &dest, &created));

        fs::write(&dest, b"data").unwrap();
        let other = td.path().join("other_dest");
        assert!(!abandon_after_partial_removal(
            &[a.as_path()],
            &members,
            &td.path().join("gone"),
            &[dest.clone(), other]
        ));
        assert_eq!(fs::read(&dest).unwrap(), b"data");
        assert!(!a.exists());
    }

    #[test]
    fn branch_fallback_without_pool_metadata_is_a_resolution_error() {
        let td = tempdir().unwrap();
        let first = td.path().join("first");
        fs::write(&first, b"x").unwrap();
        let err = link_on_branch(&first, &td.path().join("second"), Path::new("second"), td.path()).unwrap_err();
        assert_eq!(err.code(), "resolution");
    }
}
