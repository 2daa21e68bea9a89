mod common;

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::PathBuf;

use cache_mover::{select, ExclusionRules};
use common::{tiers, write_aged};

#[test]
fn every_entry_lands_in_exactly_one_bucket() {
    let (td, cache, _backing) = tiers();
    write_aged(&cache.join("a/old.bin"), 10, 1);
    write_aged(&cache.join("b/new.bin"), 10, 9);
    write_aged(&cache.join("g/one"), 20, 5);
    fs::hard_link(cache.join("g/one"), cache.join("g/two")).unwrap();
    // Sibling link outside the walked tree: treated as a plain file.
    write_aged(&cache.join("h/inside"), 30, 3);
    fs::hard_link(cache.join("h/inside"), td.path().join("outside")).unwrap();
    symlink("../a/old.bin", cache.join("b/link")).unwrap();
    fs::write(cache.join("a/empty"), b"").unwrap();
    write_aged(&cache.join("snapraid/parity"), 10, 0);
    write_aged(&cache.join("deep/tmp/partial/x"), 10, 0);

    let rules = ExclusionRules::new(["snapraid", "tmp/partial"]);
    let set = select(&cache, &rules).unwrap();

    let files: Vec<PathBuf> = set.regular_files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(
        files,
        vec![cache.join("a/old.bin"), cache.join("h/inside"), cache.join("b/new.bin")]
    );
    assert_eq!(set.hardlink_groups.len(), 1);
    let group = set.hardlink_groups.values().next().unwrap();
    assert_eq!(group.members, vec![cache.join("g/one"), cache.join("g/two")]);
    assert_eq!(group.size_bytes, 20);
    assert_eq!(set.symlinks.len(), 1);
    assert_eq!(set.symlinks[0].raw_target, PathBuf::from("../a/old.bin"));

    let mut seen = HashSet::new();
    let all = files
        .iter()
        .chain(group.members.iter())
        .chain(set.symlinks.iter().map(|s| &s.path));
    for p in all {
        assert!(seen.insert(p.clone()), "{} listed twice", p.display());
    }
    assert_eq!(set.entry_count(), 6);
    assert_eq!(set.total_bytes(), 10 + 10 + 30 + 20);
}

#[test]
fn missing_root_is_an_error() {
    let (_td, cache, _backing) = tiers();
    assert!(select(&cache.join("absent"), &ExclusionRules::default()).is_err());
}

#[test]
fn unreadable_subdirectory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    unsafe {
        if libc::geteuid() == 0 {
            eprintln!("skipping: running as root");
            return;
        }
    }

    let (_td, cache, _backing) = tiers();
    write_aged(&cache.join("open/a.bin"), 10, 1);
    write_aged(&cache.join("sealed/b.bin"), 10, 2);
    fs::set_permissions(cache.join("sealed"), fs::Permissions::from_mode(0o000)).unwrap();

    let result = select(&cache, &ExclusionRules::default());
    fs::set_permissions(cache.join("sealed"), fs::Permissions::from_mode(0o755)).unwrap();

    let set = result.unwrap();
    let files: Vec<PathBuf> = set.regular_files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(files, vec![cache.join("open/a.bin")]);
}
