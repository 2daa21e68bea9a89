//! Application flow.
//! Loads/merges config, initializes logging, installs the signal handler,
//! sweeps leftovers from a previous run, then runs one eviction pass.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use cache_mover::cli::Args;
use cache_mover::config::{config_path_in_use, load_or_init, LoadResult, CONFIG_ENV_VAR};
use cache_mover::fs_ops::MoveContext;
use cache_mover::gate::{needs_eviction, StatvfsUsage, UsageGate};
use cache_mover::output as out;
use cache_mover::shutdown::{StopFlag, StopReason};
use cache_mover::{cleanup, orchestrator, recovery, select};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        match config_path_in_use(args.config.as_deref()) {
            Some(p) => {
                out::print_info(&format!("cache_mover config path:\n  {}\n", p.display()));
                if p.exists() {
                    out::print_info("A config file exists at that location.");
                } else {
                    out::print_info("No config file exists there yet. Run without --print-config to create a template.");
                }
                out::print_info(&format!("Set {CONFIG_ENV_VAR} or pass --config to use another file."));
            }
            None => out::print_error("Could not determine a default config path"),
        }
        return Ok(());
    }

    // Create template config if none exists (before logging init)
    let mut cfg = match load_or_init(args.config.as_deref(), args.names_tiers())? {
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!("A template cache_mover config was written to: {}", path.display()));
            out::print_info("Edit `cache_path` and `backing_path` (and optionally the thresholds), then re-run.");
            return Ok(());
        }
        LoadResult::Loaded(cfg, used) => {
            if let Some(p) = used {
                debug!(path = %p.display(), "Loaded config file");
            }
            cfg
        }
    };
    args.apply_overrides(&mut cfg)?;

    let _guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {}", e));
        e
    })?;

    cfg.validate()?;
    let cache_root = dunce::canonicalize(&cfg.cache_path)
        .with_context(|| format!("canonicalize cache_path '{}'", cfg.cache_path.display()))?;
    let backing_root = dunce::canonicalize(&cfg.backing_path)
        .with_context(|| format!("canonicalize backing_path '{}'", cfg.backing_path.display()))?;

    let stop = StopFlag::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.request(StopReason::Shutdown);
            out::print_warn("Received interrupt; finishing in-flight moves...");
        })
        .context("install signal handler")?;
    }

    debug!("Starting cache_mover: {:?}", args);
    let rules = cfg.exclusion_rules();

    if args.skip_recovery {
        debug!("Startup recovery skipped");
    } else if let Err(e) = recovery::sweep_orphans(&backing_root, &rules, cfg.dry_run) {
        warn!(code = e.code(), error = %e, "Startup recovery failed; continuing");
    }

    let gate = Arc::new(UsageGate::new(
        Arc::new(StatvfsUsage),
        &cache_root,
        cfg.target_percentage,
        stop.clone(),
    ));
    let usage = gate.cache_usage_percent()?;
    info!(
        usage = format!("{usage:.1}"),
        threshold = cfg.threshold_percentage,
        target = cfg.target_percentage,
        drain = cfg.is_drain_mode(),
        "Cache usage"
    );
    if !needs_eviction(usage, cfg.threshold_percentage, cfg.target_percentage) && !cfg.dry_run {
        info!("Cache usage is below threshold; nothing to do");
        return Ok(());
    }

    let candidates = select::select(&cache_root, &rules)?;
    if candidates.is_empty() {
        info!("Nothing to move");
        return Ok(());
    }
    info!(
        entries = candidates.entry_count(),
        bytes = candidates.total_bytes(),
        "Eligible candidates"
    );

    let ctx = MoveContext::new(&cache_root, &backing_root, Arc::clone(&gate), cfg.dry_run);
    let summary = orchestrator::run(&candidates, &ctx, cfg.max_workers)?;

    if !cfg.dry_run && summary.moved_count > 0 {
        cleanup::remove_empty_dirs(&cache_root, &rules, false);
    }

    match gate.cache_usage_percent() {
        Ok(after) => info!(usage = format!("{after:.1}"), "Final cache usage"),
        Err(e) => warn!(error = %e, "Could not read final cache usage"),
    }

    out::print_summary(&summary, cfg.dry_run);
    if args.summary_json {
        out::print_json(&summary).context("serialize run summary")?;
    }
    if stop.reason() == Some(StopReason::Shutdown) {
        out::print_warn("Run was interrupted; remaining files stay in the cache until the next run.");
    }
    Ok(())
}
