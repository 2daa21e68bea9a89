use rand::Rng;
use rand::distributions::Alphanumeric;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Length of the random suffix on staging artifacts.
pub const STAGING_SUFFIX_LEN: usize = 6;

/// Staging path for `dest`: `.<basename>.<6 random alphanumerics>` in the same directory.
pub(crate) fn staging_path_for(dest: &Path) -> PathBuf {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STAGING_SUFFIX_LEN)
        .map(char::from)
        .collect();
    let mut name = OsString::from(".");
    name.push(dest.file_name().unwrap_or_else(|| OsStr::new("file")));
    name.push(".");
    name.push(suffix);
    dest.with_file_name(name)
}

/// True if `name` looks like a staging artifact (`^\..+\.[A-Za-z0-9]{6}$`).
pub fn is_staging_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('.') else {
        return false;
    };
    let Some((stem, suffix)) = rest.rsplit_once('.') else {
        return false;
    };
    !stem.is_empty()
        && suffix.len() == STAGING_SUFFIX_LEN
        && suffix.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub(crate) fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

pub(crate) fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

pub(crate) fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;
    let f = n as f64;
    if f >= TB {
        format!("{:.2} TiB", f / TB)
    } else if f >= GB {
        format!("{:.2} GiB", f / GB)
    } else if f >= MB {
        format!("{:.2} MiB", f / MB)
    } else if f >= KB {
        format!("{:.2} KiB", f / KB)
    } else {
        format!("{} B", n)
    }
}
