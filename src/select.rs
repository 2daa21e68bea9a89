//! Candidate selection.
//!
//! Walks the cache tree once with an explicit stack, pruning excluded
//! directories before descending. Symlinks are recorded without being
//! followed, zero-length files are skipped (likely still being written), and
//! regular files sharing an inode inside the tree are grouped.
//!
//! Selection never consults usage: it returns every eligible entry and the
//! movers stop on live usage instead.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::errors::EvictError;
use crate::exclude::{is_excluded, ExclusionRules};
use crate::fs_ops::io_error_with_help;

/// Stat snapshot of one regular file, taken at discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub mtime: SystemTime,
    pub inode: u64,
    pub link_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkCandidate {
    pub path: PathBuf,
    /// Unresolved link text; resolved at move time.
    pub raw_target: PathBuf,
}

/// Two or more paths under the walked root that share one inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardlinkGroup {
    pub inode: u64,
    /// Sorted; the first member is the one whose bytes get copied.
    pub members: Vec<PathBuf>,
    pub size_bytes: u64,
    /// Oldest mtime among members (they normally agree).
    pub mtime: SystemTime,
}

/// Everything eligible for eviction in one run. Built once, never mutated.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Sorted by mtime ascending (oldest first).
    pub regular_files: Vec<FileCandidate>,
    pub hardlink_groups: BTreeMap<u64, HardlinkGroup>,
    pub symlinks: Vec<SymlinkCandidate>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.regular_files.is_empty() && self.hardlink_groups.is_empty() && self.symlinks.is_empty()
    }

    /// Number of filesystem entries covered (group members counted individually).
    pub fn entry_count(&self) -> usize {
        self.regular_files.len()
            + self.hardlink_groups.values().map(|g| g.members.len()).sum::<usize>()
            + self.symlinks.len()
    }

    /// Total payload bytes (each hardlink group counted once).
    pub fn total_bytes(&self) -> u64 {
        self.regular_files.iter().map(|f| f.size_bytes).sum::<u64>()
            + self.hardlink_groups.values().map(|g| g.size_bytes).sum::<u64>()
    }
}

/// Walk `cache_root` and classify every entry not excluded by `rules`.
///
/// Unreadable directories and entries are logged and skipped; only a failure
/// to read the root itself is an error.
pub fn select(cache_root: &Path, rules: &ExclusionRules) -> Result<CandidateSet, EvictError> {
    let mut files: Vec<FileCandidate> = Vec::new();
    let mut symlinks: Vec<SymlinkCandidate> = Vec::new();

    let root_entries = fs::read_dir(cache_root).map_err(io_error_with_help("read cache directory", cache_root))?;

    let mut pending: Vec<PathBuf> = Vec::new();
    let mut current = Some((cache_root.to_path_buf(), root_entries));
    while let Some((dir, entries)) = current.take() {
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Error reading directory entry");
                    continue;
                }
            };
            let path = entry.path();
            let rel = path.strip_prefix(cache_root).unwrap_or(&path);
            if is_excluded(rel, rules) {
                debug!(path = %path.display(), "Excluded");
                continue;
            }

            let meta = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Error accessing entry");
                    continue;
                }
            };
            let ft = meta.file_type();

            if ft.is_symlink() {
                match fs::read_link(&path) {
                    Ok(raw_target) => symlinks.push(SymlinkCandidate { path, raw_target }),
                    Err(e) => warn!(path = %path.display(), error = %e, "Error reading symlink"),
                }
            } else if ft.is_dir() {
                pending.push(path);
            } else if ft.is_file() {
                if meta.len() == 0 {
                    debug!(path = %path.display(), "Skipping empty file (possibly being written)");
                    continue;
                }
                files.push(FileCandidate {
                    size_bytes: meta.len(),
                    mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    inode: meta.ino(),
                    link_count: meta.nlink(),
                    path,
                });
            } else {
                debug!(path = %path.display(), "Skipping special file");
            }
        }
        current = next_readable(&mut pending);
    }

    let set = partition(files, symlinks);
    info!(
        regular = set.regular_files.len(),
        groups = set.hardlink_groups.len(),
        grouped_files = set.hardlink_groups.values().map(|g| g.members.len()).sum::<usize>(),
        symlinks = set.symlinks.len(),
        "Candidate selection complete"
    );
    Ok(set)
}

/// Pop queued directories until one can be listed.
fn next_readable(pending: &mut Vec<PathBuf>) -> Option<(PathBuf, fs::ReadDir)> {
    while let Some(dir) = pending.pop() {
        match fs::read_dir(&dir) {
            Ok(rd) => return Some((dir, rd)),
            Err(e) => warn!(path = %dir.display(), error = %e, "Skipping unreadable directory"),
        }
    }
    None
}

/// Split discovered files into singleton regular files and hardlink groups.
fn partition(files: Vec<FileCandidate>, mut symlinks: Vec<SymlinkCandidate>) -> CandidateSet {
    let mut by_inode: HashMap<u64, Vec<FileCandidate>> = HashMap::new();
    let mut regular_files = Vec::with_capacity(files.len());
    for f in files {
        if f.link_count > 1 {
            by_inode.entry(f.inode).or_default().push(f);
        } else {
            regular_files.push(f);
        }
    }

    let mut hardlink_groups = BTreeMap::new();
    for (inode, mut linked) in by_inode {
        if linked.len() < 2 {
            // Sibling links live outside the walked tree.
            regular_files.append(&mut linked);
            continue;
        }
        linked.sort_by(|a, b| a.path.cmp(&b.path));
        let size_bytes = linked[0].size_bytes;
        let mtime = linked.iter().map(|f| f.mtime).min().unwrap_or(SystemTime::UNIX_EPOCH);
        hardlink_groups.insert(
            inode,
            HardlinkGroup {
                inode,
                members: linked.into_iter().map(|f| f.path).collect(),
                size_bytes,
                mtime,
            },
        );
    }

    regular_files.sort_by(|a, b| a.mtime.cmp(&b.mtime).then_with(|| a.path.cmp(&b.path)));
    symlinks.sort_by(|a, b| a.path.cmp(&b.path));

    CandidateSet {
        regular_files,
        hardlink_groups,
        symlinks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::collections::HashSet;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn all_paths(set: &CandidateSet) -> Vec<PathBuf> {
        let mut v: Vec<PathBuf> = set.regular_files.iter().map(|f| f.path.clone()).collect();
        for g in set.hardlink_groups.values() {
            v.extend(g.members.iter().cloned());
        }
        v.extend(set.symlinks.iter().map(|s| s.path.clone()));
        v
    }

    #[test]
    fn sorts_oldest_first_and_skips_empty() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("new.bin"), b"new").unwrap();
        fs::write(root.join("a/b/old.bin"), b"old").unwrap();
        fs::write(root.join("a/empty"), b"").unwrap();
        set_file_mtime(root.join("new.bin"), FileTime::from_unix_time(2_000_000_000, 0)).unwrap();
        set_file_mtime(root.join("a/b/old.bin"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

        let set = select(root, &ExclusionRules::default()).unwrap();
        let names: Vec<_> = set.regular_files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(names, vec![root.join("a/b/old.bin"), root.join("new.bin")]);
        assert_eq!(set.total_bytes(), 6);
    }

    #[test]
    fn excluded_subtree_is_pruned() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::create_dir_all(root.join("snapraid/deep")).unwrap();
        fs::write(root.join("keep/x"), b"x").unwrap();
        fs::write(root.join("snapraid/deep/y"), b"y").unwrap();

        let set = select(root, &ExclusionRules::new(["snapraid"])).unwrap();
        assert_eq!(all_paths(&set), vec![root.join("keep/x")]);
    }

    #[test]
    fn hardlinks_inside_tree_form_one_group() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join("d")).unwrap();
        fs::write(root.join("a"), b"payload").unwrap();
        fs::hard_link(root.join("a"), root.join("d/b")).unwrap();
        fs::hard_link(root.join("a"), root.join("d/c")).unwrap();
        fs::write(root.join("solo"), b"s").unwrap();

        let set = select(root, &ExclusionRules::default()).unwrap();
        assert_eq!(set.hardlink_groups.len(), 1);
        let g = set.hardlink_groups.values().next().unwrap();
        assert_eq!(g.members, vec![root.join("a"), root.join("d/b"), root.join("d/c")]);
        assert_eq!(g.size_bytes, 7);
        assert_eq!(set.regular_files.len(), 1);
        assert_eq!(set.entry_count(), 4);
    }

    #[test]
    fn link_outside_tree_stays_singleton() {
        let td = tempdir().unwrap();
        let root = td.path().join("cache");
        let outside = td.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(root.join("f"), b"data").unwrap();
        fs::hard_link(root.join("f"), outside.join("f")).unwrap();

        let set = select(&root, &ExclusionRules::default()).unwrap();
        assert!(set.hardlink_groups.is_empty());
        assert_eq!(set.regular_files.len(), 1);
        assert_eq!(set.regular_files[0].link_count, 2);
    }

    #[test]
    fn symlinks_are_recorded_not_followed() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/f"), b"f").unwrap();
        symlink("real", root.join("dirlink")).unwrap();
        symlink("/nonexistent/target", root.join("dangling")).unwrap();

        let set = select(root, &ExclusionRules::default()).unwrap();
        assert_eq!(set.regular_files.len(), 1);
        let links: Vec<_> = set.symlinks.iter().map(|s| (s.path.clone(), s.raw_target.clone())).collect();
        assert_eq!(
            links,
            vec![
                (root.join("dangling"), PathBuf::from("/nonexistent/target")),
                (root.join("dirlink"), PathBuf::from("real")),
            ]
        );
    }

    #[test]
    fn every_path_lands_in_exactly_one_category() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join("x/y")).unwrap();
        fs::write(root.join("x/one"), b"1").unwrap();
        fs::write(root.join("x/y/two"), b"22").unwrap();
        fs::hard_link(root.join("x/y/two"), root.join("x/two-link")).unwrap();
        symlink("one", root.join("x/one-link")).unwrap();

        let set = select(root, &ExclusionRules::default()).unwrap();
        let paths = all_paths(&set);
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(paths.len(), unique.len());
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn missing_root_is_an_error() {
        let td = tempdir().unwrap();
        let err = select(&td.path().join("nope"), &ExclusionRules::default()).unwrap_err();
        assert_eq!(err.code(), "io");
    }
}
