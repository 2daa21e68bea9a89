//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{
    HARDCODED_EXCLUSIONS, MAX_WORKERS_DEFAULT, TARGET_PERCENTAGE_DEFAULT, THRESHOLD_PERCENTAGE_DEFAULT,
};
use crate::exclude::ExclusionRules;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration for one eviction run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Fast tier that gets drained
    pub cache_path: PathBuf,
    /// Slow tier that receives evicted files
    pub backing_path: PathBuf,
    /// Start evicting when cache usage is above this percentage
    pub threshold_percentage: f64,
    /// Stop evicting once cache usage is at or below this percentage
    pub target_percentage: f64,
    /// Concurrent move workers
    pub max_workers: usize,
    /// Directory names / sub-paths never touched (built-ins always included)
    pub excluded_dirs: Vec<String>,
    /// If true, log what would move but do not modify the filesystem
    pub dry_run: bool,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::new(),
            backing_path: PathBuf::new(),
            threshold_percentage: THRESHOLD_PERCENTAGE_DEFAULT,
            target_percentage: TARGET_PERCENTAGE_DEFAULT,
            max_workers: MAX_WORKERS_DEFAULT,
            excluded_dirs: HARDCODED_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            dry_run: false,
            log_level: LogLevel::Normal,
            log_file: None,
        }
    }
}

impl Config {
    /// Construct a Config with explicit tiers; other fields use defaults.
    pub fn new(cache_path: impl Into<PathBuf>, backing_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            backing_path: backing_path.into(),
            ..Default::default()
        }
    }

    /// Append exclusions, skipping blanks and duplicates; order is kept.
    pub fn merge_exclusions<I, S>(&mut self, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in extra {
            let item = item.as_ref().trim();
            if item.is_empty() || self.excluded_dirs.iter().any(|e| e == item) {
                continue;
            }
            self.excluded_dirs.push(item.to_string());
        }
    }

    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::new(&self.excluded_dirs)
    }

    /// Threshold and target both zero: move everything.
    pub fn is_drain_mode(&self) -> bool {
        self.threshold_percentage == 0.0 && self.target_percentage == 0.0
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_builtin_exclusions() {
        let cfg = Config::default();
        assert_eq!(cfg.excluded_dirs, vec!["snapraid", ".snapraid", ".content"]);
        assert_eq!(cfg.threshold_percentage, 70.0);
        assert_eq!(cfg.target_percentage, 25.0);
        assert_eq!(cfg.max_workers, 8);
        assert!(!cfg.is_drain_mode());
    }

    #[test]
    fn merge_deduplicates_and_keeps_order() {
        let mut cfg = Config::default();
        cfg.merge_exclusions(["downloads", " snapraid ", "", "media/tmp", "downloads"]);
        assert_eq!(
            cfg.excluded_dirs,
            vec!["snapraid", ".snapraid", ".content", "downloads", "media/tmp"]
        );
        assert_eq!(cfg.exclusion_rules().len(), 5);
    }

    #[test]
    fn list_splitting() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::parse("verbose"), Some(LogLevel::Info));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Quiet.to_string(), "quiet");
    }
}
