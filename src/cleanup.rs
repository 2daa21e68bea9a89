//! Post-run pruning of directories left empty in the cache.

use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::exclude::{is_excluded, ExclusionRules};

/// Remove empty directories below `root` bottom-up; `root` itself stays.
/// Excluded subtrees are not entered. Returns the number removed (or, with
/// `dry_run`, the number currently empty).
pub fn remove_empty_dirs(root: &Path, rules: &ExclusionRules, dry_run: bool) -> usize {
    let mut removed = 0usize;
    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| {
            let rel = e.path().strip_prefix(root).unwrap_or(e.path());
            !is_excluded(rel, rules)
        });

    for entry in walker.flatten() {
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if dry_run {
            let empty = fs::read_dir(path).map(|mut rd| rd.next().is_none()).unwrap_or(false);
            if empty {
                info!(path = %path.display(), "dry-run: would remove empty directory");
                removed += 1;
            }
            continue;
        }
        // Non-empty directories simply refuse.
        if fs::remove_dir(path).is_ok() {
            debug!(path = %path.display(), "Removed empty directory");
            removed += 1;
        }
    }

    if removed > 0 {
        info!(count = removed, dry_run, "Pruned empty directories");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn nested_empty_chains_are_removed() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::write(root.join("keep/file"), b"x").unwrap();

        assert_eq!(remove_empty_dirs(root, &ExclusionRules::default(), false), 3);
        assert!(!root.join("a").exists());
        assert!(root.join("keep/file").exists());
        assert!(root.exists());
    }

    #[test]
    fn excluded_and_dry_run() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join(".snapraid/empty")).unwrap();
        fs::create_dir_all(root.join("x")).unwrap();
        let rules = ExclusionRules::new([".snapraid"]);

        assert_eq!(remove_empty_dirs(root, &rules, true), 1);
        assert!(root.join("x").exists());

        assert_eq!(remove_empty_dirs(root, &rules, false), 1);
        assert!(!root.join("x").exists());
        assert!(root.join(".snapraid/empty").exists());
    }
}
