//! Concurrent orchestration of one eviction run.
//!
//! Every candidate becomes one task, all dispatched up front to a fixed-size
//! rayon pool in priority order (oldest regular files, then hardlink groups
//! oldest first, then symlinks). Results come back over a channel; after each
//! completion the live usage is re-read and the first observation at or
//! below target sets the stop flag. Tasks that have not started by then
//! return without touching the filesystem.

use serde::Serialize;
use std::io;
use std::path::Path;
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::EvictError;
use crate::fs_ops::{format_bytes, move_group, move_one, move_symlink, MoveContext, MoveOutcome};
use crate::select::{CandidateSet, FileCandidate, HardlinkGroup, SymlinkCandidate};

/// One unit of work.
#[derive(Debug, Clone, Copy)]
pub enum Task<'a> {
    RegularFile(&'a FileCandidate),
    HardlinkGroup(&'a HardlinkGroup),
    Symlink(&'a SymlinkCandidate),
}

impl Task<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::RegularFile(_) => "file",
            Task::HardlinkGroup(_) => "hardlink",
            Task::Symlink(_) => "symlink",
        }
    }

    /// Representative path for logging.
    pub fn path(&self) -> &Path {
        match self {
            Task::RegularFile(f) => &f.path,
            Task::HardlinkGroup(g) => g.members.first().map_or(Path::new(""), |p| p.as_path()),
            Task::Symlink(s) => &s.path,
        }
    }

    /// Filesystem entries relocated when this task succeeds.
    pub fn entry_count(&self) -> usize {
        match self {
            Task::HardlinkGroup(g) => g.members.len(),
            Task::RegularFile(_) | Task::Symlink(_) => 1,
        }
    }

    fn execute(&self, ctx: &MoveContext) -> Result<MoveOutcome, EvictError> {
        match self {
            Task::RegularFile(f) => move_one(f, ctx),
            Task::HardlinkGroup(g) => move_group(g, ctx),
            Task::Symlink(s) => move_symlink(s, ctx),
        }
    }
}

/// Tasks for `set` in dispatch order.
pub fn tasks(set: &CandidateSet) -> Vec<Task<'_>> {
    let mut groups: Vec<&HardlinkGroup> = set.hardlink_groups.values().collect();
    groups.sort_by(|a, b| a.mtime.cmp(&b.mtime).then_with(|| a.inode.cmp(&b.inode)));

    set.regular_files
        .iter()
        .map(Task::RegularFile)
        .chain(groups.into_iter().map(Task::HardlinkGroup))
        .chain(set.symlinks.iter().map(Task::Symlink))
        .collect()
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub moved_count: usize,
    pub failed_count: usize,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    /// Bytes per second over the whole batch's wall-clock time.
    pub avg_throughput: f64,
}

impl RunSummary {
    fn finish(&mut self, elapsed_secs: f64) {
        self.elapsed_secs = elapsed_secs;
        self.avg_throughput = if elapsed_secs > 0.0 {
            self.total_bytes as f64 / elapsed_secs
        } else {
            0.0
        };
    }
}

/// Run every task in `set` on `workers` threads.
pub fn run(set: &CandidateSet, ctx: &MoveContext, workers: usize) -> Result<RunSummary, EvictError> {
    let started = Instant::now();
    let tasks = tasks(set);
    let mut summary = RunSummary::default();
    if tasks.is_empty() {
        return Ok(summary);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("mover-{i}"))
        .build()
        .map_err(|e| EvictError::io("build worker pool", io::Error::other(e.to_string())))?;

    info!(tasks = tasks.len(), workers = workers.max(1), dry_run = ctx.dry_run, "Dispatching move tasks");

    let (tx, rx) = mpsc::channel::<(usize, Option<Result<MoveOutcome, EvictError>>)>();
    let task_list = &tasks;
    pool.in_place_scope_fifo(|scope| {
        for (idx, task) in task_list.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn_fifo(move |_| {
                // Queued behind the stop: abandon without side effects.
                let result = if ctx.stop_flag().is_requested() {
                    None
                } else {
                    Some(task.execute(ctx))
                };
                let _ = tx.send((idx, result));
            });
        }
        drop(tx);

        for (idx, result) in rx {
            let task = &task_list[idx];
            record(&mut summary, task, result);
            if !ctx.dry_run && !ctx.stop_flag().is_requested() {
                if let Err(e) = ctx.gate.target_reached() {
                    warn!(error = %e, "Usage re-check failed");
                }
            }
        }
    });

    summary.finish(started.elapsed().as_secs_f64());
    info!(
        moved = summary.moved_count,
        failed = summary.failed_count,
        bytes = summary.total_bytes,
        size = %format_bytes(summary.total_bytes),
        elapsed_secs = format!("{:.2}", summary.elapsed_secs),
        throughput = %format!("{}/s", format_bytes(summary.avg_throughput as u64)),
        "Run complete"
    );
    Ok(summary)
}

fn record(summary: &mut RunSummary, task: &Task<'_>, result: Option<Result<MoveOutcome, EvictError>>) {
    match result {
        None => debug!(kind = task.kind(), path = %task.path().display(), "Skipped after stop"),
        Some(Ok(outcome)) if outcome.moved => {
            summary.moved_count += task.entry_count();
            summary.total_bytes += outcome.bytes;
        }
        Some(Ok(outcome)) => {
            debug!(kind = task.kind(), path = %task.path().display(), target_reached = outcome.target_already_reached, "Not moved")
        }
        Some(Err(EvictError::Interrupted)) => {
            debug!(kind = task.kind(), path = %task.path().display(), "Skipped on shutdown")
        }
        Some(Err(e)) => {
            summary.failed_count += 1;
            error!(kind = task.kind(), path = %task.path().display(), code = e.code(), error = %e, "Move failed");
        }
    }
}
