//! Platform-specific helpers.
//! Everything that needs raw syscalls (statvfs, chown, extended attributes,
//! secure file creation) lives here behind small typed functions so the rest
//! of the crate stays free of libc.

mod unix;
mod xattrs;

pub use unix::{
    disk_usage, open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600, set_owner,
    write_config_secure_new_0600,
};
pub use xattrs::get_xattr;
