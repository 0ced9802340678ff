//! K-way merge of sorted shards into one globally sorted stream
//!
//! The heap holds at most one pending row per live shard (plus, transiently,
//! a row pulled from the next shard when one runs dry). Header rows are
//! skipped here, placeholder rows are not.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::line_io::LineReader;

use super::row::{is_header_row, MalformedRowPolicy, ShardEntry};
use super::LineSource;

// Wrapper for heap ordering (min-heap by private_id, then shard, then push order)
#[derive(Debug, PartialEq, Eq)]
struct HeapItem {
    entry: ShardEntry,
    seq: u64,
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap
        other
            .entry
            .private_id
            .cmp(&self.entry.private_id)
            .then_with(|| other.entry.shard_index.cmp(&self.entry.shard_index))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending shard entries, owned by one merger.
///
/// Equal rows of one shard leave in file order.
#[derive(Debug, Default)]
struct ShardHeap {
    heap: BinaryHeap<HeapItem>,
    pushed: u64,
}

impl ShardHeap {
    fn push(&mut self, entry: ShardEntry) {
        self.heap.push(HeapItem {
            entry,
            seq: self.pushed,
        });
        self.pushed += 1;
    }

    fn pop(&mut self) -> Option<ShardEntry> {
        self.heap.pop().map(|item| item.entry)
    }

    fn peek(&self) -> Option<&ShardEntry> {
        self.heap.peek().map(|item| &item.entry)
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

pub struct KWayShardsMerger {
    shards: Vec<LineReader>,
    exhausted: Vec<bool>,
    exhausted_count: usize,
    heap: ShardHeap,
    policy: MalformedRowPolicy,
    lines_emitted: u64,
}

impl KWayShardsMerger {
    /// Open every path as one shard, in order
    pub fn open(paths: &[PathBuf], policy: MalformedRowPolicy) -> Result<Self> {
        let readers = paths
            .iter()
            .map(|path| LineReader::open(path))
            .collect::<Result<Vec<_>>>()?;
        Self::new(readers, policy)
    }

    pub fn new(shards: Vec<LineReader>, policy: MalformedRowPolicy) -> Result<Self> {
        let count = shards.len();
        let mut merger = Self {
            shards,
            exhausted: vec![false; count],
            exhausted_count: 0,
            heap: ShardHeap::default(),
            policy,
            lines_emitted: 0,
        };
        merger.fill_queue()?;
        debug!(shards = count, "k-way merger primed");
        Ok(merger)
    }

    fn fill_queue(&mut self) -> Result<()> {
        for shard_index in 0..self.shards.len() {
            self.store_next_shard_entry(shard_index)?;
        }
        Ok(())
    }

    /// Read the next non-header row of `shard_index` (EOF → `None`)
    fn read_entry(&mut self, shard_index: usize) -> Result<Option<ShardEntry>> {
        let policy = self.policy;
        let reader = &mut self.shards[shard_index];
        while let Some(row) = reader.read_line()? {
            if is_header_row(&row) {
                continue;
            }
            let line_number = reader.line_number();
            let Some((private_id, user_id)) = policy.parse(&row, reader.name(), line_number)? else {
                continue;
            };
            return Ok(Some(ShardEntry {
                shard_index,
                private_id: private_id.to_string(),
                user_id: user_id.to_string(),
            }));
        }
        Ok(None)
    }

    /// Push the next row of `shard_index`; when that shard is dry, fall through
    /// to the following shards (wrapping), at most one attempt per shard.
    fn store_next_shard_entry(&mut self, shard_index: usize) -> Result<()> {
        let count = self.shards.len();
        let mut index = shard_index;
        for _ in 0..count {
            if !self.exhausted[index] {
                match self.read_entry(index)? {
                    Some(entry) => {
                        self.heap.push(entry);
                        return Ok(());
                    }
                    None => {
                        self.exhausted[index] = true;
                        self.exhausted_count += 1;
                        debug!(shard = index, exhausted = self.exhausted_count, "shard exhausted");
                    }
                }
            }
            index = (index + 1) % count;
        }
        Ok(())
    }

    /// Smallest pending entry, not consumed
    pub fn peek_entry(&self) -> Option<&ShardEntry> {
        self.heap.peek()
    }

    /// Pop the smallest row and replenish its shard
    pub fn get_next_line(&mut self) -> Result<Option<String>> {
        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        self.store_next_shard_entry(entry.shard_index)?;
        self.lines_emitted += 1;
        Ok(Some(entry.to_line()))
    }

    pub fn get_next_chunk(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        self.next_chunk(chunk_size)
    }

    /// Every shard hit EOF and no row is pending
    pub fn is_finished(&self) -> bool {
        self.exhausted_count >= self.shards.len() && self.heap.is_empty()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn lines_emitted(&self) -> u64 {
        self.lines_emitted
    }
}

impl LineSource for KWayShardsMerger {
    fn peek_len(&self) -> Option<usize> {
        self.heap.peek().map(ShardEntry::line_len)
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.get_next_line()
    }

    fn is_finished(&self) -> bool {
        KWayShardsMerger::is_finished(self)
    }
}
