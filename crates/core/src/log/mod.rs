// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The on-disk log: length-prefixed entries, append-only writer, seekable
//! reader.
//!
//! The file is a concatenation of `{ u32-LE length, payload }` frames with
//! no header, trailer or padding. The byte offset of a frame's length
//! prefix is the entry's offset; the file length is always the next offset
//! to be written. The writer is the only mutator and never truncates.

pub mod entry;
pub mod reader;
pub mod writer;

pub use reader::LogReader;
pub use writer::LogWriter;

use thiserror::Error;

/// Errors from reading or writing the log file
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated entry at offset {offset}")]
    Truncated { offset: u32 },

    #[error("entry length {len} exceeds the maximum of {max} bytes")]
    EntryTooLarge { len: u64, max: u32 },

    #[error("log length {len} exceeds the 32-bit offset space")]
    FileTooLarge { len: u64 },
}
