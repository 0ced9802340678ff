//! One sorted shard file as a clean line source
//!
//! Header rows (`id_,...`) and placeholder rows (userId `0`) never leave this
//! reader. A one-line lookahead is kept so `is_finished` is exact.

use std::path::Path;

use crate::error::Result;
use crate::line_io::LineReader;

use super::row::{format_line, is_header_row, MalformedRowPolicy, PLACEHOLDER_USER_ID};
use super::LineSource;

pub struct ShardReader {
    reader: LineReader,
    policy: MalformedRowPolicy,
    next: Option<String>,
    rows_skipped: u64,
}

impl ShardReader {
    pub fn open(path: &Path, policy: MalformedRowPolicy) -> Result<Self> {
        Self::new(LineReader::open(path)?, policy)
    }

    pub fn new(reader: LineReader, policy: MalformedRowPolicy) -> Result<Self> {
        let mut shard = Self {
            reader,
            policy,
            next: None,
            rows_skipped: 0,
        };
        shard.advance()?;
        Ok(shard)
    }

    /// Load the next valid row into the lookahead slot
    fn advance(&mut self) -> Result<()> {
        self.next = None;
        while let Some(row) = self.reader.read_line()? {
            if is_header_row(&row) {
                self.rows_skipped += 1;
                continue;
            }
            let line_number = self.reader.line_number();
            let parsed = self.policy.parse(&row, self.reader.name(), line_number)?;
            let Some((private_id, user_id)) = parsed else {
                self.rows_skipped += 1;
                continue;
            };
            if user_id == PLACEHOLDER_USER_ID {
                self.rows_skipped += 1;
                continue;
            }
            self.next = Some(format_line(private_id, user_id));
            return Ok(());
        }
        Ok(())
    }

    /// Next valid line without consuming it; repeated calls agree
    pub fn peek_next_line(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Consume the next valid line
    pub fn read_next_line(&mut self) -> Result<Option<String>> {
        let line = self.next.take();
        if line.is_some() {
            self.advance()?;
        }
        Ok(line)
    }

    pub fn get_next_chunk(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        self.next_chunk(chunk_size)
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    /// Header, placeholder, blank and skipped malformed rows seen so far
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    pub fn name(&self) -> &str {
        self.reader.name()
    }
}

impl LineSource for ShardReader {
    fn peek_len(&self) -> Option<usize> {
        self.next.as_ref().map(String::len)
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.read_next_line()
    }

    fn is_finished(&self) -> bool {
        ShardReader::is_finished(self)
    }
}
