//! XML configuration support.
//! - Loads settings from config.xml (quick_xml).
//! - Creates a secure template at the default location if missing.
//!
//! Notes:
//! - This module only reads/writes the config file; directory validation happens elsewhere.
//! - Unknown XML fields are rejected so typos surface instead of being ignored.
//! - Empty elements mean "not set".

use anyhow::{anyhow, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::paths::{default_config_path, path_has_symlink_ancestor};
use super::types::{split_list, Config, LogLevel};
use super::{MAX_WORKERS_DEFAULT, TARGET_PERCENTAGE_DEFAULT, THRESHOLD_PERCENTAGE_DEFAULT};

use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    cache_path: Option<String>,
    backing_path: Option<String>,
    threshold_percentage: Option<String>,
    target_percentage: Option<String>,
    max_workers: Option<String>,
    /// Comma separated
    excluded_dirs: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Apply every setting present in the XML document `content` onto `cfg`.
pub fn apply_xml_str(cfg: &mut Config, content: &str) -> Result<()> {
    let parsed: XmlConfig = from_xml_str(content).context("parse config xml")?;

    if let Some(p) = non_empty(&parsed.cache_path) {
        cfg.cache_path = PathBuf::from(p);
    }
    if let Some(p) = non_empty(&parsed.backing_path) {
        cfg.backing_path = PathBuf::from(p);
    }
    if let Some(v) = non_empty(&parsed.threshold_percentage) {
        cfg.threshold_percentage = v
            .parse()
            .with_context(|| format!("threshold_percentage is not a number: '{v}'"))?;
    }
    if let Some(v) = non_empty(&parsed.target_percentage) {
        cfg.target_percentage = v
            .parse()
            .with_context(|| format!("target_percentage is not a number: '{v}'"))?;
    }
    if let Some(v) = non_empty(&parsed.max_workers) {
        cfg.max_workers = v
            .parse()
            .with_context(|| format!("max_workers is not a whole number: '{v}'"))?;
    }
    if let Some(v) = non_empty(&parsed.excluded_dirs) {
        cfg.merge_exclusions(split_list(v));
    }
    if let Some(v) = non_empty(&parsed.log_level) {
        cfg.log_level = v.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    if let Some(v) = non_empty(&parsed.log_file) {
        cfg.log_file = Some(PathBuf::from(v));
    }
    Ok(())
}

/// Read `path` and apply it onto `cfg`.
pub fn apply_xml_file(cfg: &mut Config, path: &Path) -> Result<()> {
    let contents = fs::read_to_string(path).with_context(|| format!("read config xml '{}'", path.display()))?;
    apply_xml_str(cfg, &contents).with_context(|| format!("in config file '{}'", path.display()))
}

/// Create default template config file and parent directory (best-effort permissions).
/// Uses secure creation to avoid following attacker-controlled symlinks.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        return Err(anyhow!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let content = format!(
        "<!--\n  cache_mover configuration (XML)\n\n  cache_path            -> fast tier to drain (mergerfs cache branch)\n  backing_path          -> slow tier receiving evicted files\n  threshold_percentage  -> start moving when cache usage is above this\n  target_percentage     -> stop once cache usage is at or below this\n                           (threshold 0 and target 0 = move everything)\n  max_workers           -> concurrent move workers\n  excluded_dirs         -> comma separated names or sub-paths never moved\n                           (snapraid, .snapraid, .content are always excluded)\n  log_level             -> quiet | normal | info | debug\n  log_file              -> path to log file (optional)\n\n  Environment variables and CLI flags override values here.\n-->\n<config>\n  <cache_path>/mnt/cache</cache_path>\n  <backing_path>/mnt/media-cold</backing_path>\n  <threshold_percentage>{}</threshold_percentage>\n  <target_percentage>{}</target_percentage>\n  <max_workers>{}</max_workers>\n  <excluded_dirs></excluded_dirs>\n  <log_level>normal</log_level>\n  <log_file></log_file>\n</config>\n",
        THRESHOLD_PERCENTAGE_DEFAULT, TARGET_PERCENTAGE_DEFAULT, MAX_WORKERS_DEFAULT
    );

    // Atomic, secure write (O_NOFOLLOW + create_new), then tighten perms.
    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}

/// Create the default config when missing; returns the created path so the
/// CLI can tell the user.
pub fn ensure_default_config_exists() -> Option<PathBuf> {
    let cfg_path = default_config_path()?;
    if cfg_path.exists() {
        return None;
    }
    match create_template_config(&cfg_path) {
        Ok(()) => Some(cfg_path),
        Err(e) => {
            eprintln!("Failed to create template config at {}: {}", cfg_path.display(), e);
            None
        }
    }
}
