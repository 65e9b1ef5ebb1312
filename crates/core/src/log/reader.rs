// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seekable log reader used by recovery and the replicator
//!
//! Reads one entry at a time: four prefix bytes, then the payload. A short
//! read at either step means the log ends mid-entry and fails the read; the
//! callers only read offsets they know to be fully written.

use super::{entry, LogError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access reader over the log file
pub struct LogReader {
    file: File,
    offset: u32,
}

impl LogReader {
    pub fn open(path: &Path) -> Result<Self, LogError> {
        Ok(Self {
            file: File::open(path)?,
            offset: 0,
        })
    }

    /// Reposition to an entry boundary
    pub fn seek(&mut self, offset: u32) -> Result<(), LogError> {
        self.file.seek(SeekFrom::Start(u64::from(offset)))?;
        self.offset = offset;
        Ok(())
    }

    /// Offset of the next entry to be read
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Read the entry at the current offset and advance past it
    pub fn read_entry(&mut self) -> Result<Vec<u8>, LogError> {
        let start = self.offset;

        let mut prefix = [0u8; 4];
        self.file
            .read_exact(&mut prefix)
            .map_err(|e| Self::map_short_read(e, start))?;
        let len = entry::decode_len(prefix)?;

        let mut payload = vec![0u8; len as usize];
        self.file
            .read_exact(&mut payload)
            .map_err(|e| Self::map_short_read(e, start))?;

        self.offset = start + entry::PREFIX_LEN + len;
        Ok(payload)
    }

    fn map_short_read(e: std::io::Error, offset: u32) -> LogError {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            LogError::Truncated { offset }
        } else {
            LogError::Io(e)
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
