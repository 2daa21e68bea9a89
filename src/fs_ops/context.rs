//! Per-run move context and the outcome type shared by all movers.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::EvictError;
use crate::gate::UsageGate;
use crate::shutdown::{StopFlag, StopReason};

/// What every mover needs: both roots, the shared gate (which carries the
/// stop flag) and the dry-run switch.
#[derive(Debug, Clone)]
pub struct MoveContext {
    pub cache_root: PathBuf,
    pub backing_root: PathBuf,
    pub gate: Arc<UsageGate>,
    pub dry_run: bool,
}

impl MoveContext {
    pub fn new(
        cache_root: impl Into<PathBuf>,
        backing_root: impl Into<PathBuf>,
        gate: Arc<UsageGate>,
        dry_run: bool,
    ) -> Self {
        Self {
            cache_root: cache_root.into(),
            backing_root: backing_root.into(),
            gate,
            dry_run,
        }
    }

    pub fn stop_flag(&self) -> &StopFlag {
        self.gate.stop_flag()
    }

    /// Mirror of `src` under the backing root, plus the shared relative path.
    pub(crate) fn destination_for(&self, src: &Path) -> Result<(PathBuf, PathBuf), EvictError> {
        let rel = src.strip_prefix(&self.cache_root).map_err(|_| {
            EvictError::io(
                format!(
                    "'{}' is not under cache root '{}'",
                    src.display(),
                    self.cache_root.display()
                ),
                io::Error::from(io::ErrorKind::InvalidInput),
            )
        })?;
        Ok((self.backing_root.join(rel), rel.to_path_buf()))
    }

    /// Cancellation then gate. `Some(outcome)` means the task must not touch
    /// the filesystem.
    pub(crate) fn admit(&self) -> Result<Option<MoveOutcome>, EvictError> {
        match self.stop_flag().reason() {
            Some(StopReason::TargetReached) => return Ok(Some(MoveOutcome::target_reached())),
            Some(StopReason::Shutdown) => return Err(EvictError::Interrupted),
            None => {}
        }
        if self.gate.target_reached()? {
            return Ok(Some(MoveOutcome::target_reached()));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    pub moved: bool,
    pub bytes: u64,
    pub duration: Duration,
    pub target_already_reached: bool,
}

impl MoveOutcome {
    pub fn moved(bytes: u64, duration: Duration) -> Self {
        Self {
            moved: true,
            bytes,
            duration,
            target_already_reached: false,
        }
    }

    pub fn target_reached() -> Self {
        Self {
            target_already_reached: true,
            ..Self::default()
        }
    }
}
