//! Filesystem operations: the three movers and their shared building blocks.

mod atomic;
mod context;
mod dirs;
mod file_move;
mod hardlink;
mod helpers;
mod io_copy;
mod metadata;
mod stage;
mod symlink;
mod util;

pub use context::{MoveContext, MoveOutcome};
pub use file_move::move_one;
pub use hardlink::{move_group, try_hardlink, LinkAttempt};
pub use helpers::{io_error_with_help, io_error_with_help_io};
pub use stage::StagedFile;
pub use symlink::{move_symlink, rewrite_target};
pub use util::{is_staging_name, STAGING_SUFFIX_LEN};

pub(crate) use util::format_bytes;
