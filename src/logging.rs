//! Tracing initialization.
//! Builds a subscriber with EnvFilter, supports compact or JSON formats, and optional file logging.
//!
//! Behavior:
//! - Log level is driven by LogLevel (no RUST_LOG override here).
//! - Console logs go to stderr so stdout stays free for the run summary.
//! - If `log_file` is provided and passes safety checks, a non-blocking file layer is added.
//! - File logging is refused if any ancestor of the file path is a symlink.

use anyhow::{anyhow, Result};
use cache_mover::output as out;
use cache_mover::platform::open_log_file_secure_append;
use cache_mover::{default_log_path, path_has_symlink_ancestor, LogLevel};
use chrono::Local;
use std::fmt as stdfmt;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Human-friendly timestamp formatter (DD/MM/YY HH:MM:SS)
struct LocalHumanTime;
impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut tsfmt::format::Writer<'_>) -> stdfmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%d/%m/%y %H:%M:%S"))
    }
}

#[inline]
fn to_level_filter(lvl: &LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::INFO,
        LogLevel::Info => LevelFilter::DEBUG,
        LogLevel::Debug => LevelFilter::TRACE,
    }
}

/// Filter for our own crate at `level`; dependencies stay at warn.
fn env_filter_for(level: LevelFilter) -> EnvFilter {
    EnvFilter::new(format!("warn,cache_mover={}", level.to_string().to_ascii_lowercase()))
}

/// One formatting layer, compact or JSON, onto `writer`.
fn fmt_layer<S, W>(json: bool, ansi: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        tsfmt::layer()
            .event_format(tsfmt::format().json())
            .with_timer(LocalHumanTime)
            .with_level(true)
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    } else {
        tsfmt::layer()
            .with_timer(LocalHumanTime)
            .with_level(true)
            .with_target(false)
            .with_thread_names(true)
            .compact()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed()
    }
}

/// Try to open a non-blocking file writer for logging:
/// - Refuse if any ancestor is a symlink (prints a warning and returns None)
/// - Open file for append (0600 when created) and wrap with non_blocking
fn maybe_open_non_blocking_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    match path_has_symlink_ancestor(path) {
        Ok(true) => {
            eprintln!(
                "Refusing to enable file logging: ancestor of {} is a symlink; proceeding without file logging.",
                path.display()
            );
            return None;
        }
        Err(e) => {
            eprintln!(
                "Error checking log path {} for symlinks: {}; proceeding without file logging.",
                path.display(),
                e
            );
            return None;
        }
        Ok(false) => {}
    }

    match open_log_file_secure_append(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", path.display(), e);
            None
        }
    }
}

/// Initialize tracing based on LogLevel and format. Returns an optional WorkerGuard
/// if a file appender is created (must be held until shutdown to flush logs).
pub fn init_tracing(lvl: &LogLevel, log_file: Option<&Path>, json: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = env_filter_for(to_level_filter(lvl));

    let mut guard = None;
    let mut file_layer = None;
    if let Some(path) = log_file {
        match maybe_open_non_blocking_writer(path) {
            Some((writer, g)) => {
                guard = Some(g);
                file_layer = Some(fmt_layer(json, false, writer));
            }
            None => {
                out::print_warn(&format!(
                    "Requested file logging to '{}' was not enabled. Check that the parent directory is writable by this process and that no ancestor is a symlink. Logs will continue to stderr.",
                    path.display()
                ));
                if let Some(def) = default_log_path() {
                    out::print_info(&format!("You can try using the default log path instead: {}", def.display()));
                }
            }
        }
    }

    let ansi = atty::is(atty::Stream::Stderr);
    registry()
        .with(env_filter)
        .with(fmt_layer(json, ansi, std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}
