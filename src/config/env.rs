//! Environment overrides.
//! Applied after the XML file and before CLI flags.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

use super::types::{split_list, Config};

pub const ENV_CACHE_PATH: &str = "CACHE_PATH";
pub const ENV_BACKING_PATH: &str = "BACKING_PATH";
pub const ENV_THRESHOLD: &str = "THRESHOLD_PERCENTAGE";
pub const ENV_TARGET: &str = "TARGET_PERCENTAGE";
pub const ENV_MAX_WORKERS: &str = "MAX_WORKERS";
pub const ENV_EXCLUDED_DIRS: &str = "EXCLUDED_DIRS";
pub const ENV_LOG_PATH: &str = "LOG_PATH";

/// Apply overrides from the process environment.
pub fn apply_env(cfg: &mut Config) -> Result<()> {
    apply_env_from(cfg, |key| env::var(key).ok())
}

/// Apply overrides using `lookup` as the variable source. Blank values are ignored.
pub fn apply_env_from<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = get(ENV_CACHE_PATH) {
        cfg.cache_path = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_BACKING_PATH) {
        cfg.backing_path = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_THRESHOLD) {
        cfg.threshold_percentage = v
            .parse()
            .with_context(|| format!("{ENV_THRESHOLD} is not a number: '{v}'"))?;
    }
    if let Some(v) = get(ENV_TARGET) {
        cfg.target_percentage = v
            .parse()
            .with_context(|| format!("{ENV_TARGET} is not a number: '{v}'"))?;
    }
    if let Some(v) = get(ENV_MAX_WORKERS) {
        cfg.max_workers = v
            .parse()
            .map_err(|_| anyhow!("{ENV_MAX_WORKERS} is not a whole number: '{v}'"))?;
    }
    if let Some(v) = get(ENV_EXCLUDED_DIRS) {
        cfg.merge_exclusions(split_list(&v));
    }
    if let Some(v) = get(ENV_LOG_PATH) {
        cfg.log_file = Some(PathBuf::from(v));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn overrides_are_applied() {
        let env = vars(&[
            (ENV_CACHE_PATH, "/c"),
            (ENV_BACKING_PATH, "/b"),
            (ENV_THRESHOLD, "90"),
            (ENV_TARGET, "60"),
            (ENV_MAX_WORKERS, "2"),
            (ENV_EXCLUDED_DIRS, "tmp,incoming/partial"),
            (ENV_LOG_PATH, "/var/log/cm.log"),
        ]);
        let mut cfg = Config::default();
        apply_env_from(&mut cfg, |k| env.get(k).cloned()).unwrap();
        assert_eq!(cfg.cache_path, PathBuf::from("/c"));
        assert_eq!(cfg.backing_path, PathBuf::from("/b"));
        assert_eq!((cfg.threshold_percentage, cfg.target_percentage), (90.0, 60.0));
        assert_eq!(cfg.max_workers, 2);
        assert_eq!(cfg.excluded_dirs.last().map(String::as_str), Some("incoming/partial"));
        assert!(cfg.excluded_dirs.iter().any(|e| e == ".content"));
        assert_eq!(cfg.log_file, Some(PathBuf::from("/var/log/cm.log")));
    }

    #[test]
    fn blank_values_are_ignored() {
        let env = vars(&[(ENV_CACHE_PATH, "  "), (ENV_THRESHOLD, "")]);
        let mut cfg = Config::new("/keep", "/b");
        apply_env_from(&mut cfg, |k| env.get(k).cloned()).unwrap();
        assert_eq!(cfg.cache_path, PathBuf::from("/keep"));
        assert_eq!(cfg.threshold_percentage, 70.0);
    }

    #[test]
    fn unparseable_numbers_fail() {
        let env = vars(&[(ENV_MAX_WORKERS, "-1")]);
        let mut cfg = Config::default();
        let err = apply_env_from(&mut cfg, |k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_WORKERS));
    }
}
