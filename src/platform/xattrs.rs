//! Extended attribute access.
//! Reads do not follow symlinks. Without the `xattrs` feature every lookup
//! reports "absent", which callers already treat as a recoverable condition.

use std::path::Path;

/// Value of attribute `name` on `path`, or None when absent/unsupported/unreadable.
#[cfg(feature = "xattrs")]
pub fn get_xattr(path: &Path, name: &str) -> Option<Vec<u8>> {
    match xattr::get(path, name) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(path = %path.display(), xattr = name, error = %e, "xattr read failed");
            None
        }
    }
}

#[cfg(not(feature = "xattrs"))]
pub fn get_xattr(path: &Path, name: &str) -> Option<Vec<u8>> {
    let _ = (path, name);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_attribute_is_none() {
        let td = tempdir().unwrap();
        let p = td.path().join("f");
        std::fs::write(&p, b"x").unwrap();
        assert!(get_xattr(&p, "user.mergerfs.relpath").is_none());
    }

    #[test]
    fn missing_file_is_none() {
        let td = tempdir().unwrap();
        assert!(get_xattr(&td.path().join("nope"), "user.mergerfs.relpath").is_none());
    }
}
