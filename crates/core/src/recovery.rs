// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery replay
//!
//! At init, entries in `[applied, sync)` are fed back into the state
//! machine before any write path or replication starts. The log is the
//! source of truth; the checkpoint only bounds how far back the replay
//! begins. Any read failure here is fatal: the window is known to have
//! been fully written, so a short read means corruption.

use crate::error::SyncError;
use crate::log::LogReader;
use tracing::{debug, info};

/// Replay entries in `[from, until)` into `apply`.
///
/// Returns the offset reached, which always equals `until` on success; the
/// reader is left positioned there. Entry boundaries must line up with
/// both ends of the window.
pub fn replay(
    reader: &mut LogReader,
    from: u32,
    until: u32,
    apply: &dyn Fn(&[u8]),
) -> Result<u32, SyncError> {
    if from > until {
        return Err(SyncError::CheckpointBeyondLog {
            applied: from,
            end: until,
        });
    }

    reader.seek(from)?;
    let mut entries = 0u64;
    while reader.offset() < until {
        let payload = reader.read_entry()?;
        debug!(offset = reader.offset(), len = payload.len(), "replaying entry");
        apply(&payload);
        entries += 1;
    }

    let reached = reader.offset();
    if reached != until {
        return Err(SyncError::ReplayMisaligned {
            reached,
            expected: until,
        });
    }

    info!(from, until, entries, "recovery replay complete");
    Ok(reached)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
