//! Configuration layer.
//! Precedence, lowest to highest: built-in defaults, XML file, environment, CLI flags.

pub mod env;
pub mod paths;
pub mod types;
mod validate;
pub mod xml;

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

pub use paths::{config_path_in_use, default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use xml::{apply_xml_file, apply_xml_str, create_template_config, ensure_default_config_exists};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CACHE_MOVER_CONFIG";

pub const THRESHOLD_PERCENTAGE_DEFAULT: f64 = 70.0;
pub const TARGET_PERCENTAGE_DEFAULT: f64 = 25.0;
pub const MAX_WORKERS_DEFAULT: usize = 8;

/// Always excluded, on top of user exclusions (snapraid parity/content files).
pub const HARDCODED_EXCLUSIONS: [&str; 3] = ["snapraid", ".snapraid", ".content"];

/// Outcome of `load_or_init`.
#[derive(Debug)]
pub enum LoadResult {
    /// Defaults, plus the file (when one was read) and the environment.
    Loaded(Config, Option<PathBuf>),
    /// No config existed at the default location; a template was written there.
    CreatedTemplate(PathBuf),
}

/// Build a Config from defaults, the config file and the environment.
///
/// An explicit path (CLI or $CACHE_MOVER_CONFIG) must exist. A missing
/// default file gets a template written, unless both tiers are already named
/// (`tiers_given` from the CLI, or the environment), in which case the run
/// proceeds without a file.
pub fn load_or_init(explicit: Option<&Path>, tiers_given: bool) -> Result<LoadResult> {
    let explicit_or_env = explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CONFIG_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    });

    let mut cfg = Config::default();
    let mut used = None;
    match explicit_or_env {
        Some(path) => {
            if !path.is_file() {
                bail!("config file '{}' does not exist or is not a file", path.display());
            }
            apply_xml_file(&mut cfg, &path)?;
            used = Some(path);
        }
        None => match default_config_path() {
            Some(path) if path.is_file() => {
                apply_xml_file(&mut cfg, &path)?;
                used = Some(path);
            }
            Some(_) if tiers_given || env_names_tiers() => {}
            Some(_) => {
                if let Some(created) = ensure_default_config_exists() {
                    return Ok(LoadResult::CreatedTemplate(created));
                }
            }
            None => {}
        },
    }

    env::apply_env(&mut cfg)?;
    Ok(LoadResult::Loaded(cfg, used))
}

fn env_names_tiers() -> bool {
    let set = |k: &str| std::env::var_os(k).is_some_and(|v| !v.is_empty());
    set(env::ENV_CACHE_PATH) && set(env::ENV_BACKING_PATH)
}
