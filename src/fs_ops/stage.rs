//! Staging artifacts.
//!
//! A `StagedFile` is the copy of a source that sits next to its destination
//! under a hidden, randomised name until it is verified and renamed into
//! place. Dropping it without `commit()` deletes the artifact, so every early
//! return between staging and commit cleans up after itself. Only a hard
//! crash leaves one behind, and startup recovery sweeps those.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::EvictError;

use super::atomic::commit_rename;
use super::helpers::io_error_with_help;
use super::io_copy::copy_to_new;
use super::metadata::{mirror_owner_and_mode, mirror_times};
use super::util::staging_path_for;

/// Attempts at picking a free staging name before giving up.
const NAME_ATTEMPTS: usize = 8;

#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    dest: PathBuf,
    bytes: u64,
    armed: bool,
}

impl StagedFile {
    /// Copy `src` next to `dest` and re-apply the source's owner, mode and
    /// times (`src_meta`) to the copy.
    pub fn stage(src: &Path, dest: &Path, src_meta: &fs::Metadata) -> Result<Self, EvictError> {
        let mut last_err: Option<io::Error> = None;
        for _ in 0..NAME_ATTEMPTS {
            let path = staging_path_for(dest);
            match copy_to_new(src, &path) {
                Ok(bytes) => {
                    let staged = StagedFile {
                        path,
                        dest: dest.to_path_buf(),
                        bytes,
                        armed: true,
                    };
                    mirror_owner_and_mode(&staged.path, src_meta);
                    mirror_times(&staged.path, src_meta);
                    debug!(src = %src.display(), staged = %staged.path.display(), bytes, "Staged copy");
                    return Ok(staged);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    last_err = Some(e);
                }
                Err(e) => {
                    // Partial copy under our own fresh name.
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(rm) if rm.kind() == io::ErrorKind::NotFound => {}
                        Err(rm) => {
                            warn!(path = %path.display(), error = %rm, "Failed to remove partial staging file")
                        }
                    }
                    return Err(io_error_with_help("stage copy of", src)(e));
                }
            }
        }
        let e = last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists));
        Err(io_error_with_help("allocate staging name for", dest)(e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written while staging.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Check the staged size on disk against `expected`.
    pub fn verify(&self, expected: u64) -> Result<(), EvictError> {
        let actual = fs::metadata(&self.path)
            .map_err(io_error_with_help("stat staged file", &self.path))?
            .len();
        if actual != expected || self.bytes != expected {
            return Err(EvictError::VerificationMismatch {
                path: self.dest.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Rename onto the destination. After this the artifact no longer exists
    /// and the destination holds the complete copy.
    pub fn commit(mut self) -> Result<PathBuf, EvictError> {
        commit_rename(&self.path, &self.dest).map_err(io_error_with_help("commit staged file to", &self.dest))?;
        self.armed = false;
        Ok(std::mem::take(&mut self.dest))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed aborted staging file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove aborted staging file"),
        }
    }
}
