//! Core library for `cache_mover`.
//!
//! Evicts the least-recently-modified files from a mergerfs cache tier to
//! backing storage until cache usage drops to a target. The library holds the
//! eviction core (selection, the three movers, orchestration, recovery) plus
//! the config layer; the binary adds logging setup and the run flow.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exclude;
pub mod fs_ops;
pub mod gate;
pub mod mergerfs;
pub mod orchestrator;
pub mod output;
pub mod platform;
pub mod recovery;
pub mod select;
pub mod shutdown;

pub use config::{default_config_path, default_log_path, path_has_symlink_ancestor, Config, LogLevel};
pub use errors::EvictError;
pub use exclude::{is_excluded, ExclusionRules};
pub use fs_ops::{move_group, move_one, move_symlink, MoveContext, MoveOutcome};
pub use gate::{needs_eviction, DiskUsage, StatvfsUsage, UsageGate, UsageSource};
pub use mergerfs::resolve_physical_paths;
pub use orchestrator::{RunSummary, Task};
pub use recovery::sweep_orphans;
pub use select::{select, CandidateSet, FileCandidate, HardlinkGroup, SymlinkCandidate};
pub use shutdown::{StopFlag, StopReason};
