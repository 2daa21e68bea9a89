//! Streaming copy into a freshly created file.
//!
//! - The destination is opened with `create_new`, so an existing path is never clobbered.
//! - Linux fast path: `copy_file_range` (in-kernel, works across filesystems on
//!   modern kernels); falls back to 1 MiB buffered I/O when unsupported.
//! - The destination is fsynced before returning.
//!
//! The source is read once to EOF. Bytes appended concurrently may or may not
//! be included; callers compare the result against the size they expect.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024;
const RANGE_CHUNK: usize = 16 * 1024 * 1024;

/// Copy `src` into new file `dst`; returns bytes written.
pub(super) fn copy_to_new(src: &Path, dst: &Path) -> io::Result<u64> {
    let src_f = File::open(src)?;
    let dst_f = OpenOptions::new().write(true).create_new(true).open(dst)?;

    if let Some(bytes) = copy_range(&src_f, &dst_f)? {
        dst_f.sync_all()?;
        return Ok(bytes);
    }

    let mut reader = BufReader::with_capacity(BUF_SIZE, src_f);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, dst_f);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(bytes)
}

/// Some(bytes) when copy_file_range handled the whole file, None when the
/// kernel/filesystem does not support it and nothing was copied yet.
#[cfg(target_os = "linux")]
fn copy_range(src: &File, dst: &File) -> io::Result<Option<u64>> {
    let mut total: u64 = 0;
    loop {
        let rc = unsafe {
            libc::copy_file_range(
                src.as_raw_fd(),
                std::ptr::null_mut(),
                dst.as_raw_fd(),
                std::ptr::null_mut(),
                RANGE_CHUNK,
                0,
            )
        };
        if rc > 0 {
            total += rc as u64;
            continue;
        }
        if rc == 0 {
            return Ok(Some(total));
        }
        let err = io::Error::last_os_error();
        let unsupported = matches!(
            err.raw_os_error(),
            Some(libc::EXDEV) | Some(libc::ENOSYS) | Some(libc::EINVAL) | Some(libc::EPERM) | Some(libc::EOPNOTSUPP)
        );
        if total == 0 && unsupported {
            return Ok(None);
        }
        return Err(err);
    }
}

#[cfg(not(target_os = "linux"))]
fn copy_range(_src: &File, _dst: &File) -> io::Result<Option<u64>> {
    Ok(None)
}
