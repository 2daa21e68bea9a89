//! Ownership, permission and timestamp mirroring.
//!
//! Copying bytes does not carry owner/group across users, so both staged
//! files and freshly created directories get the source's uid/gid and mode
//! re-applied explicitly. chown usually needs privileges; failures are
//! logged and ignored.

use filetime::{set_file_times, FileTime};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use tracing::{trace, warn};

use crate::platform::set_owner;

/// Apply uid/gid and permission bits (incl. setuid/setgid/sticky) from `src_meta` to `dest`.
pub(crate) fn mirror_owner_and_mode(dest: &Path, src_meta: &fs::Metadata) {
    if let Err(e) = set_owner(dest, src_meta.uid(), src_meta.gid()) {
        warn!(path = %dest.display(), uid = src_meta.uid(), gid = src_meta.gid(), error = %e, "failed to set owner on destination");
    } else {
        trace!(path = %dest.display(), uid = src_meta.uid(), gid = src_meta.gid(), "set owner");
    }

    // After chown, since chown may clear setuid/setgid.
    let mode = src_meta.permissions().mode() & 0o7777;
    if let Err(e) = fs::set_permissions(dest, fs::Permissions::from_mode(mode)) {
        warn!(path = %dest.display(), mode = format!("{:o}", mode), error = %e, "failed to set permissions on destination");
    } else {
        trace!(path = %dest.display(), mode = format!("{:o}", mode), "set permissions");
    }
}

/// Carry atime/mtime over so the backing tier keeps the original recency.
pub(crate) fn mirror_times(dest: &Path, src_meta: &fs::Metadata) {
    let mt = FileTime::from_unix_time(src_meta.mtime(), src_meta.mtime_nsec() as u32);
    let at = FileTime::from_unix_time(src_meta.atime(), src_meta.atime_nsec() as u32);
    if let Err(e) = set_file_times(dest, at, mt) {
        warn!(path = %dest.display(), error = %e, "failed to set atime/mtime on destination");
    }
}
