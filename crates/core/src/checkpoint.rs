// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Applied-offset checkpoint sidecar
//!
//! Four little-endian bytes holding `applied`, rewritten periodically via
//! temp-file-plus-rename so a crash never leaves a half-written checkpoint.
//! On restart the value bounds the recovery replay; a missing file simply
//! means replay from zero.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persists and restores the `applied` offset
#[derive(Debug, Clone)]
pub struct AppliedCheckpoint {
    path: PathBuf,
}

impl AppliedCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the checkpointed offset.
    ///
    /// Absence is not an error. A short file is treated as absent: the
    /// rename protocol never produces one, so it predates this node's
    /// format and replaying from zero is the safe answer.
    pub fn load(&self) -> Result<Option<u32>, std::io::Error> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut buf = [0u8; 4];
        match file.read_exact(&mut buf) {
            Ok(()) => Ok(Some(u32::from_le_bytes(buf))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                warn!(path = %self.path.display(), "short applied checkpoint, ignoring");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Persist an offset atomically: write a temp file, then rename it over
    /// the canonical name.
    pub fn store(&self, applied: u32) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&applied.to_le_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
