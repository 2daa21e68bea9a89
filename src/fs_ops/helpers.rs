//! I/O error enrichment.
//!
//! Adapters that turn a bare io::Error into an `EvictError::Io` whose message
//! carries the operation, the path, a platform hint and the raw OS code.
//!
//! Usage:
//!   fs::create_dir_all(dir).map_err(io_error_with_help("create dir", dir))?;

use std::io;
use std::path::Path;

use crate::errors::EvictError;

/// Format a human-friendly message with op/path plus platform-aware hints.
fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);

    if let Some(code) = e.raw_os_error() {
        let hint = match code {
            libc::EACCES | libc::EPERM => Some("permission denied; check ownership and write permissions"),
            libc::EXDEV => Some("cross-device; source and destination are on different filesystems"),
            libc::EBUSY => Some("resource busy; ensure no other process is writing"),
            libc::ENOENT => Some("path not found; it may have been removed during the run"),
            libc::EEXIST => Some("already exists"),
            libc::ENOSPC => Some("insufficient space on device"),
            libc::EROFS => Some("read-only filesystem; cannot write here"),
            libc::ELOOP => Some("too many symbolic link levels; possible symlink cycle"),
            libc::ENAMETOOLONG => Some("filename or path too long"),
            libc::EMFILE => Some("process file descriptor limit reached"),
            libc::ENFILE => Some("system-wide file table overflow"),
            libc::ENOTSUP => Some("operation not supported by this filesystem"),
            _ => None,
        };
        if let Some(h) = hint {
            msg.push_str(" (");
            msg.push_str(h);
            msg.push(')');
        }
        msg.push_str(&format!(" [os code: {}]", code));
    } else {
        let hint = match e.kind() {
            io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
            io::ErrorKind::NotFound => Some("path not found; it may have been removed during the run"),
            io::ErrorKind::AlreadyExists => Some("already exists"),
            _ => None,
        };
        if let Some(h) = hint {
            msg.push_str(" (");
            msg.push_str(h);
            msg.push(')');
        }
    }

    msg
}

/// Closure for `.map_err(...)` converting io::Error -> EvictError::Io.
pub fn io_error_with_help<'a>(op: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> EvictError + 'a {
    move |e: io::Error| EvictError::Io {
        context: build_message(op, path, &e),
        source: e,
    }
}

/// Closure for `.map_err(...)` in io::Result code: keeps the ErrorKind, enriches the message.
pub fn io_error_with_help_io<'a>(op: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn notfound_hint_includes_path() {
        let p = Path::new("/nonexistent/path");
        let err = io_error_with_help("open", p)(io::Error::from(io::ErrorKind::NotFound));
        let msg = err.to_string();
        assert!(msg.contains("open"));
        assert!(msg.contains("/nonexistent/path"));
        assert!(msg.contains("path not found"));
        assert_eq!(err.code(), "io");
        assert!(err.source().is_some());
    }

    #[test]
    fn enospc_hint_and_os_code() {
        let err = io_error_with_help("write", Path::new("/tmp"))(io::Error::from_raw_os_error(libc::ENOSPC));
        let msg = err.to_string();
        assert!(msg.contains("insufficient space"), "msg was: {msg}");
        assert!(msg.contains("os code"));
    }

    #[test]
    fn exdev_hint() {
        let err = io_error_with_help("link", Path::new("/a"))(io::Error::from_raw_os_error(libc::EXDEV));
        assert!(err.to_string().contains("cross-device"));
    }

    #[test]
    fn io_adapter_preserves_kind() {
        let wrapped = io_error_with_help_io("create", Path::new("/tmp/x"))(io::Error::from(io::ErrorKind::AlreadyExists));
        assert_eq!(wrapped.kind(), io::ErrorKind::AlreadyExists);
        assert!(wrapped.to_string().contains("already exists"));
    }
}
