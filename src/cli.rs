//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug.
//! - Every flag is optional; unset flags leave config values alone.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel};

/// Evict least-recently-modified files from a mergerfs cache tier to backing storage.
/// CLI flags override environment and config file values.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Move cold files from a mergerfs cache tier to backing storage"
)]
pub struct Args {
    /// Config file to read instead of $CACHE_MOVER_CONFIG or the platform default.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Override the cache (fast tier) directory.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_path: Option<PathBuf>,

    /// Override the backing (slow tier) directory.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub backing_path: Option<PathBuf>,

    /// Start moving when cache usage is above this percentage.
    #[arg(long, value_name = "PERCENT")]
    pub threshold: Option<f64>,

    /// Stop once cache usage is at or below this percentage.
    #[arg(long, value_name = "PERCENT")]
    pub target: Option<f64>,

    /// Number of concurrent move workers.
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Additional directory name or sub-path to exclude (repeatable).
    #[arg(long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Dry-run: log actions but do not modify the filesystem.
    #[arg(
        long,
        help = "Show what would be done, but do not modify files/directories"
    )]
    pub dry_run: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Append logs to this file as well as stderr.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print the run summary as a JSON object on stdout when done.
    #[arg(long)]
    pub summary_json: bool,

    /// Do not sweep orphaned staging files from the backing tier at startup.
    #[arg(long)]
    pub skip_recovery: bool,

    /// Print where cache_mover will look for the config file, then exit.
    #[arg(
        long,
        help = "Print the config file location used by cache_mover and exit"
    )]
    pub print_config: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Result<Option<LogLevel>> {
        if self.debug {
            return Ok(Some(LogLevel::Debug));
        }
        self.log_level
            .as_deref()
            .map(|s| s.parse::<LogLevel>().map_err(|e| anyhow!(e)))
            .transpose()
    }

    /// Both tiers named on the command line.
    pub fn names_tiers(&self) -> bool {
        self.cache_path.is_some() && self.backing_path.is_some()
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) -> Result<()> {
        if let Some(p) = &self.cache_path {
            cfg.cache_path = p.clone();
        }
        if let Some(p) = &self.backing_path {
            cfg.backing_path = p.clone();
        }
        if let Some(v) = self.threshold {
            cfg.threshold_percentage = v;
        }
        if let Some(v) = self.target {
            cfg.target_percentage = v;
        }
        if let Some(n) = self.max_workers {
            cfg.max_workers = n;
        }
        cfg.merge_exclusions(&self.exclude);
        if self.dry_run {
            cfg.dry_run = true;
        }
        if let Some(level) = self.effective_log_level()? {
            cfg.log_level = level;
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
        Ok(())
    }
}

pub fn parse() -> Args {
    Args::parse()
}
