//! Incremental merge-join between the merged publisher stream and batches of
//! counterparty rows
//!
//! Both sides are sorted by privateId. The publisher cursor survives across
//! `run` calls, so batches may cut the counterparty stream anywhere.
//!
//! Output: one `publisher_user_id,partner_user_id` row per counterparty row
//! whose privateId is present on the publisher side.

use std::cmp::Ordering;
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, SwapError};
use crate::line_io::LineWriter;

use super::row::{split_row, MalformedRowPolicy, OUTPUT_HEADER};
use super::LineSource;

/// Counters for one swapper lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SwapStats {
    /// Output rows written (excluding the header)
    pub matched: u64,
    /// Non-empty counterparty rows examined
    pub counterparty_rows: u64,
    /// Counterparty rows with no publisher match
    pub unmatched_counterparty_rows: u64,
    /// Rows pulled from the publisher stream
    pub publisher_rows: u64,
    /// `run` invocations
    pub batches: u64,
}

/// Publisher row held between comparisons
#[derive(Debug)]
struct Cursor {
    private_id: String,
    user_id: String,
}

pub struct SortedIdSwapper {
    writer: LineWriter,
    policy: MalformedRowPolicy,
    current: Option<Cursor>,
    stats: SwapStats,
}

impl SortedIdSwapper {
    /// Create the output file and write its header
    pub fn create(output: &Path, policy: MalformedRowPolicy) -> Result<Self> {
        Self::new(LineWriter::create(output)?, policy)
    }

    pub fn new(mut writer: LineWriter, policy: MalformedRowPolicy) -> Result<Self> {
        writer.write_line(OUTPUT_HEADER)?;
        Ok(Self {
            writer,
            policy,
            current: None,
            stats: SwapStats::default(),
        })
    }

    fn pull_publisher_row<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<bool> {
        let Some(line) = source.next_line()? else {
            return Ok(false);
        };
        let trimmed = line.strip_suffix('\n').unwrap_or(&line);
        // sources only ever emit `id,user\n`
        let (private_id, user_id) = split_row(trimmed).ok_or_else(|| SwapError::MalformedRow {
            origin: "merged publisher stream".to_string(),
            line: self.stats.publisher_rows + 1,
            row: trimmed.to_string(),
        })?;
        self.current = Some(Cursor {
            private_id: private_id.to_string(),
            user_id: user_id.to_string(),
        });
        self.stats.publisher_rows += 1;
        Ok(true)
    }

    /// Join one batch of counterparty lines against the publisher stream.
    ///
    /// Returns the number of rows written for this batch.
    pub fn run<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
        counterparty_lines: &[String],
    ) -> Result<u64> {
        self.stats.batches += 1;
        let matched_before = self.stats.matched;
        let mut index = 0;

        while index < counterparty_lines.len()
            && (self.current.is_some() || !source.is_finished())
        {
            if self.current.is_none() {
                if !self.pull_publisher_row(source)? {
                    break;
                }
                continue;
            }

            let line = counterparty_lines[index].as_str();
            if line.is_empty() {
                index += 1;
                continue;
            }
            let parsed = self.policy.parse(line, "counterparty batch", index as u64 + 1)?;
            let Some((partner_id, partner_user)) = parsed else {
                index += 1;
                continue;
            };

            let Some(cursor) = self.current.as_ref() else {
                continue;
            };
            match cursor.private_id.as_str().cmp(partner_id) {
                Ordering::Equal => {
                    // keep the publisher row, later counterparty rows may share the key
                    let row = format!("{},{}", cursor.user_id.trim(), partner_user.trim());
                    self.writer.write_line(&row)?;
                    self.stats.matched += 1;
                    self.stats.counterparty_rows += 1;
                    index += 1;
                }
                Ordering::Less => {
                    self.current = None;
                }
                Ordering::Greater => {
                    self.stats.counterparty_rows += 1;
                    self.stats.unmatched_counterparty_rows += 1;
                    index += 1;
                }
            }
        }

        // rows left in the batch once the publisher side ran dry
        for line in &counterparty_lines[index..] {
            if !line.is_empty() {
                self.stats.counterparty_rows += 1;
                self.stats.unmatched_counterparty_rows += 1;
            }
        }

        Ok(self.stats.matched - matched_before)
    }

    /// A publisher row is held and may still match later batches
    pub fn has_pending(&self) -> bool {
        self.current.is_some()
    }

    pub fn stats(&self) -> SwapStats {
        self.stats
    }

    /// Flush and release the output
    pub fn close(self) -> Result<SwapStats> {
        self.writer.close()?;
        Ok(self.stats)
    }
}
