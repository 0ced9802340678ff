//! Shard row grammar: `privateId,userId`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SwapError};

/// First field of every shard header row
pub const HEADER_TOKEN: &str = "id_";

/// userId marking an unmatched/placeholder row
pub const PLACEHOLDER_USER_ID: &str = "0";

/// First line of every output file
pub const OUTPUT_HEADER: &str = "publisher_user_id,partner_user_id";

/// One pending row while merging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardEntry {
    pub shard_index: usize,
    pub private_id: String,
    pub user_id: String,
}

impl ShardEntry {
    /// `"<privateId>,<userId>\n"`
    pub fn to_line(&self) -> String {
        format_line(&self.private_id, &self.user_id)
    }

    /// Byte length of [`Self::to_line`] without building it
    pub fn line_len(&self) -> usize {
        self.private_id.len() + self.user_id.len() + 2
    }
}

pub(crate) fn format_line(private_id: &str, user_id: &str) -> String {
    let mut line = String::with_capacity(private_id.len() + user_id.len() + 2);
    line.push_str(private_id);
    line.push(',');
    line.push_str(user_id);
    line.push('\n');
    line
}

/// Split a row into `(privateId, userId)`; `None` unless it has exactly one comma
pub fn split_row(row: &str) -> Option<(&str, &str)> {
    let (private_id, user_id) = row.split_once(',')?;
    if user_id.contains(',') {
        return None;
    }
    Some((private_id, user_id))
}

/// Header rows are recognised by their first field alone; any field count is allowed
pub fn is_header_row(row: &str) -> bool {
    row.split(',').next() == Some(HEADER_TOKEN)
}

/// What to do with a row that does not have exactly one separator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRowPolicy {
    /// Abort the run with a protocol violation
    #[default]
    Fail,
    /// Log a warning and drop the row
    Skip,
}

impl FromStr for MalformedRowPolicy {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(MalformedRowPolicy::Fail),
            "skip" => Ok(MalformedRowPolicy::Skip),
            other => Err(SwapError::Configuration(format!(
                "unknown malformed-row policy {other:?} (expected \"fail\" or \"skip\")"
            ))),
        }
    }
}

impl fmt::Display for MalformedRowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedRowPolicy::Fail => f.write_str("fail"),
            MalformedRowPolicy::Skip => f.write_str("skip"),
        }
    }
}

impl MalformedRowPolicy {
    /// Apply the policy to `row`.
    ///
    /// Blank rows are `Ok(None)` under either policy. `origin` and `line` only
    /// feed the error/warning text.
    pub fn parse<'a>(
        self,
        row: &'a str,
        origin: &str,
        line: u64,
    ) -> Result<Option<(&'a str, &'a str)>> {
        if row.trim().is_empty() {
            return Ok(None);
        }
        match split_row(row) {
            Some(fields) => Ok(Some(fields)),
            None => match self {
                MalformedRowPolicy::Fail => Err(SwapError::MalformedRow {
                    origin: origin.to_string(),
                    line,
                    row: row.to_string(),
                }),
                MalformedRowPolicy::Skip => {
                    warn!(origin, line, row, "skipping malformed row");
                    Ok(None)
                }
            },
        }
    }
}
