//! Commit step.
//! - Renames a staged entry onto its final name in the same directory.
//! - Best-effort fsync of the destination directory afterwards so the rename
//!   survives a crash.

use std::fs;
use std::io;
use std::path::Path;

pub(super) fn commit_rename(staged: &Path, dest: &Path) -> io::Result<()> {
    fs::rename(staged, dest)?;

    if let Some(parent) = dest.parent() {
        // A failed directory fsync must not turn a completed rename into a failure.
        let _ = super::util::fsync_dir(parent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replaces_existing_destination() {
        let td = tempdir().unwrap();
        let staged = td.path().join(".f.abcdef");
        let dest = td.path().join("f");
        fs::write(&staged, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();
        commit_rename(&staged, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!staged.exists());
    }
}
