//! Sharded Sort-Merge Join
//!
//! External k-way merge of pre-sorted shards plus an incremental merge-join
//! against counterparty rows that arrive in fixed-size chunks.
//! All operations are memory-bounded via streaming I/O.
//!
//! ## Strategy
//!
//! 1. **Read Shards**: each shard is a `privateId,userId` CSV sorted by privateId
//! 2. **Merge**: min-heap holding one pending row per shard gives one sorted stream
//! 3. **Chunk**: the sending side packs whole rows into zero-padded chunks
//! 4. **Merge Join**: each received chunk is joined against the merged stream,
//!    with the publisher cursor carried across chunks
//!
//! ## Memory Usage
//!
//! One pending row per shard, one chunk, and the I/O buffers.

pub mod chunk;
pub mod id_swapper;
pub mod kway_merge;
pub mod row;
pub mod shard_reader;

pub use chunk::{fill_chunk, is_sentinel, sentinel, split_chunk};
pub use id_swapper::{SortedIdSwapper, SwapStats};
pub use kway_merge::KWayShardsMerger;
pub use row::{MalformedRowPolicy, ShardEntry};
pub use shard_reader::ShardReader;

use crate::error::Result;

/// A forward-only, sorted source of `"<privateId>,<userId>\n"` lines
pub trait LineSource {
    /// Byte length of the next line, without consuming it
    fn peek_len(&self) -> Option<usize>;

    /// Consume the next line; `None` once the source is exhausted
    fn next_line(&mut self) -> Result<Option<String>>;

    /// No line buffered and nothing left to read
    fn is_finished(&self) -> bool;

    /// Next zero-padded chunk of exactly `chunk_size` bytes
    fn next_chunk(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        fill_chunk(self, chunk_size)
    }
}
