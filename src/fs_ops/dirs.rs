//! Destination directory preparation.
//! Creates whatever part of the mirrored directory chain is missing under the
//! backing root, copying owner/group/mode from the matching cache directory.
//! Racing siblings are fine: "already exists" counts as success.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

use crate::errors::EvictError;

use super::helpers::io_error_with_help;
use super::metadata::mirror_owner_and_mode;

/// Ensure `backing_root/rel_dir` exists. `rel_dir` is relative to both roots.
pub(crate) fn prepare_dest_dir(cache_root: &Path, backing_root: &Path, rel_dir: &Path) -> Result<(), EvictError> {
    let mut dest = backing_root.to_path_buf();
    let mut src = cache_root.to_path_buf();
    for comp in rel_dir.components() {
        dest.push(comp);
        src.push(comp);
        if dest.is_dir() {
            continue;
        }
        match fs::create_dir(&dest) {
            Ok(()) => {
                debug!(path = %dest.display(), "Created destination directory");
                if let Ok(src_meta) = fs::metadata(&src) {
                    mirror_owner_and_mode(&dest, &src_meta);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dest.is_dir() => {}
            Err(e) => return Err(io_error_with_help("create destination directory", &dest)(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn creates_chain_with_source_modes() {
        let td = tempdir().unwrap();
        let cache = td.path().join("cache");
        let backing = td.path().join("backing");
        fs::create_dir_all(cache.join("a/b")).unwrap();
        fs::create_dir_all(&backing).unwrap();
        fs::set_permissions(cache.join("a"), fs::Permissions::from_mode(0o750)).unwrap();
        fs::set_permissions(cache.join("a/b"), fs::Permissions::from_mode(0o711)).unwrap();

        prepare_dest_dir(&cache, &backing, Path::new("a/b")).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&backing.join("a")), 0o750);
        assert_eq!(mode(&backing.join("a/b")), 0o711);
    }

    #[test]
    fn existing_directories_are_left_alone() {
        let td = tempdir().unwrap();
        let cache = td.path().join("cache");
        let backing = td.path().join("backing");
        fs::create_dir_all(cache.join("a")).unwrap();
        fs::create_dir_all(backing.join("a")).unwrap();
        fs::set_permissions(backing.join("a"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(cache.join("a"), fs::Permissions::from_mode(0o700)).unwrap();

        prepare_dest_dir(&cache, &backing, Path::new("a")).unwrap();
        assert_eq!(fs::metadata(backing.join("a")).unwrap().permissions().mode() & 0o777, 0o755);
    }

    #[test]
    fn empty_relative_dir_is_noop() {
        let td = tempdir().unwrap();
        prepare_dest_dir(td.path(), td.path(), Path::new("")).unwrap();
    }

    #[test]
    fn file_in_the_way_is_an_error() {
        let td = tempdir().unwrap();
        let cache = td.path().join("cache");
        let backing = td.path().join("backing");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&backing).unwrap();
        fs::write(backing.join("a"), b"file").unwrap();
        let err = prepare_dest_dir(&cache, &backing, Path::new("a/b")).unwrap_err();
        assert_eq!(err.code(), "io");
    }
}
