// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry framing: a four-byte little-endian length followed by the payload

use super::LogError;

/// Size of the length prefix in bytes
pub const PREFIX_LEN: u32 = 4;

/// Largest accepted payload. Keeps every frame length representable in the
/// length prefix and every entry boundary inside the 32-bit offset space.
pub const MAX_PAYLOAD_LEN: u32 = i32::MAX as u32;

/// Total on-disk length of an entry with the given payload size
pub fn framed_len(payload_len: usize) -> Result<u32, LogError> {
    let len = u64::try_from(payload_len).unwrap_or(u64::MAX);
    if len > u64::from(MAX_PAYLOAD_LEN) {
        return Err(LogError::EntryTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(PREFIX_LEN + payload_len as u32)
}

/// Frame a payload into its on-disk form
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, LogError> {
    let framed = framed_len(payload.len())?;
    let mut buf = Vec::with_capacity(framed as usize);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decode a length prefix, rejecting lengths the codec never produces
pub fn decode_len(prefix: [u8; 4]) -> Result<u32, LogError> {
    let len = u32::from_le_bytes(prefix);
    if len > MAX_PAYLOAD_LEN {
        return Err(LogError::EntryTooLarge {
            len: u64::from(len),
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(len)
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
