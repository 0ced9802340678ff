//! Fixed-size wire chunks
//!
//! A chunk is exactly `chunk_size` bytes: whole `"<privateId>,<userId>\n"`
//! records followed by zero padding. A chunk of only zeros is the end-of-stream
//! sentinel.

use crate::error::{Result, SwapError};

use super::LineSource;

/// Default chunk size on the wire
pub const DEFAULT_MSG_SIZE: usize = 4096;

/// Smallest usable chunk: one tiny record plus one padding byte
pub const MIN_MSG_SIZE: usize = 8;

/// Pull whole lines from `source` into one zero-padded chunk.
///
/// A line is appended only while `len + line_len < chunk_size`, so records are
/// never split and a data chunk always ends in padding.
pub fn fill_chunk<S: LineSource + ?Sized>(source: &mut S, chunk_size: usize) -> Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(chunk_size);
    while let Some(line_len) = source.peek_len() {
        if chunk.len() + line_len >= chunk_size {
            if chunk.is_empty() {
                return Err(SwapError::RecordTooLarge {
                    len: line_len,
                    chunk_size,
                });
            }
            break;
        }
        match source.next_line()? {
            Some(line) => chunk.extend_from_slice(line.as_bytes()),
            None => break,
        }
    }
    chunk.resize(chunk_size, 0);
    Ok(chunk)
}

/// The all-zero end-of-stream buffer
pub fn sentinel(chunk_size: usize) -> Vec<u8> {
    vec![0u8; chunk_size]
}

/// Byte-for-byte sentinel check
pub fn is_sentinel(chunk: &[u8]) -> bool {
    chunk.iter().all(|&b| b == 0)
}

/// Payload of a chunk with the zero padding removed
pub fn payload(chunk: &[u8]) -> &[u8] {
    match memchr::memchr(0, chunk) {
        Some(end) => &chunk[..end],
        None => chunk,
    }
}

/// Split a received chunk into candidate lines.
///
/// The piece after the last `\n` is kept (normally empty); the swapper skips
/// empty lines.
pub fn split_chunk(chunk: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(payload(chunk))
        .map_err(|e| SwapError::InvalidChunk(format!("payload is not UTF-8: {e}")))?;
    Ok(text.split('\n').map(str::to_string).collect())
}
