//! Role controller: who sends chunks, who merges and joins
//!
//! The Partner streams its sorted rows as fixed-size chunks and finishes with
//! one all-zero sentinel. The Publisher merges its own shards and joins every
//! received chunk until it sees the sentinel or runs out of rows itself.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::{Result, SwapError};
use crate::sort_merge::{
    is_sentinel, sentinel, split_chunk, KWayShardsMerger, LineSource, ShardReader, SortedIdSwapper,
    SwapStats,
};
use crate::transport::{self, Agent};

/// How often the loops report progress
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// One of the two computation participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Publisher,
    Partner,
}

impl Party {
    pub fn peer(self) -> Party {
        match self {
            Party::Publisher => Party::Partner,
            Party::Partner => Party::Publisher,
        }
    }

    /// Wire role id: publisher 0, partner 1
    pub fn id(self) -> i32 {
        match self {
            Party::Publisher => 0,
            Party::Partner => 1,
        }
    }
}

impl TryFrom<i32> for Party {
    type Error = SwapError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Party::Publisher),
            1 => Ok(Party::Partner),
            other => Err(SwapError::Configuration(format!(
                "unknown party id {other} (expected 0 = publisher, 1 = partner)"
            ))),
        }
    }
}

impl FromStr for Party {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "publisher" | "0" => Ok(Party::Publisher),
            "partner" | "1" => Ok(Party::Partner),
            other => Err(SwapError::Configuration(format!(
                "unknown party {other:?} (expected \"publisher\" or \"partner\")"
            ))),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Publisher => f.write_str("publisher"),
            Party::Partner => f.write_str("partner"),
        }
    }
}

/// Why the publisher stopped receiving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The all-zero chunk arrived
    Sentinel,
    /// Local rows ran out first; the rest of the stream is left unread
    PublisherExhausted,
    /// Partner side: sentinel sent after the last chunk
    SentinelSent,
}

/// Outcome of one run, printed by the binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub party: Party,
    /// Data chunks sent or received (sentinel excluded)
    pub chunks: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub termination: Termination,
    /// Publisher only
    pub swap: Option<SwapStats>,
    pub elapsed_ms: u128,
}

/// Publisher loop: receive chunks and join them against the merged shards.
pub async fn run_publisher<S>(
    merger: &mut KWayShardsMerger,
    swapper: SortedIdSwapper,
    agent: &mut Agent<S>,
    msg_size: usize,
) -> Result<RunSummary>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let start_time = Instant::now();
    let mut swapper = swapper;
    let mut chunks = 0u64;
    let mut last_report = Instant::now();

    let mut chunk = agent.receive(msg_size).await?;
    while !is_sentinel(&chunk) && (!merger.is_finished() || swapper.has_pending()) {
        let lines = split_chunk(&chunk)?;
        swapper.run(merger, &lines)?;
        chunks += 1;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            let stats = swapper.stats();
            info!(
                chunks,
                matched = stats.matched,
                publisher_rows = stats.publisher_rows,
                "publisher progress"
            );
            last_report = Instant::now();
        }

        chunk = agent.receive(msg_size).await?;
    }

    let termination = if is_sentinel(&chunk) {
        Termination::Sentinel
    } else {
        Termination::PublisherExhausted
    };
    let stats = swapper.close()?;
    info!(
        chunks,
        matched = stats.matched,
        unmatched = stats.unmatched_counterparty_rows,
        ?termination,
        "publisher done"
    );

    Ok(RunSummary {
        party: Party::Publisher,
        chunks,
        bytes_sent: agent.bytes_sent(),
        bytes_received: agent.bytes_received(),
        termination,
        swap: Some(stats),
        elapsed_ms: start_time.elapsed().as_millis(),
    })
}

/// Partner loop: stream local rows as chunks, then one sentinel.
pub async fn run_partner<L, S>(
    source: &mut L,
    agent: &mut Agent<S>,
    msg_size: usize,
) -> Result<RunSummary>
where
    L: LineSource + ?Sized,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let start_time = Instant::now();
    let mut chunks = 0u64;
    let mut last_report = Instant::now();

    while !source.is_finished() {
        let chunk = source.next_chunk(msg_size)?;
        // only filtered rows were left; an all-zero chunk would read as the sentinel
        if is_sentinel(&chunk) {
            continue;
        }
        agent.send(&chunk).await?;
        chunks += 1;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            info!(chunks, bytes_sent = agent.bytes_sent(), "partner progress");
            last_report = Instant::now();
        }
    }
    agent.send(&sentinel(msg_size)).await?;
    info!(chunks, bytes_sent = agent.bytes_sent(), "partner done, sentinel sent");

    Ok(RunSummary {
        party: Party::Partner,
        chunks,
        bytes_sent: agent.bytes_sent(),
        bytes_received: agent.bytes_received(),
        termination: Termination::SentinelSent,
        swap: None,
        elapsed_ms: start_time.elapsed().as_millis(),
    })
}

/// Partner rows: a single shard reads directly, several are merged first.
///
/// The two paths filter differently. `Single` drops placeholder rows
/// (userId `0`) and `Merged` forwards them, so a multi-shard partner can
/// produce `publisherUserId,0` output rows.
pub enum PartnerSource {
    Single(ShardReader),
    Merged(KWayShardsMerger),
}

impl LineSource for PartnerSource {
    fn peek_len(&self) -> Option<usize> {
        match self {
            PartnerSource::Single(reader) => reader.peek_len(),
            PartnerSource::Merged(merger) => merger.peek_len(),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        match self {
            PartnerSource::Single(reader) => reader.next_line(),
            PartnerSource::Merged(merger) => merger.next_line(),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            PartnerSource::Single(reader) => LineSource::is_finished(reader),
            PartnerSource::Merged(merger) => LineSource::is_finished(merger),
        }
    }
}

/// Full run for one party over TCP
pub async fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    let paths = config.inputs.paths()?;
    let label = format!("{}-to-{}", Party::Partner, Party::Publisher);
    info!(party = %config.party, shards = paths.len(), msg_size = config.msg_size, "starting run");

    match config.party {
        Party::Publisher => {
            let output = config.output.as_deref().ok_or_else(|| {
                SwapError::Configuration("publisher requires an output path".to_string())
            })?;
            let mut merger = KWayShardsMerger::open(&paths, config.malformed_rows)?;
            let swapper = SortedIdSwapper::create(output, config.malformed_rows)?;
            let mut agent = transport::create(Party::Publisher, &label, &config.network).await?;
            run_publisher(&mut merger, swapper, &mut agent, config.msg_size).await
        }
        Party::Partner => {
            if config.output.is_some() {
                warn!("output path is ignored for the partner");
            }
            let mut source = match paths.as_slice() {
                [single] => {
                    PartnerSource::Single(ShardReader::open(single, config.malformed_rows)?)
                }
                _ => PartnerSource::Merged(KWayShardsMerger::open(&paths, config.malformed_rows)?),
            };
            let mut agent = transport::create(Party::Partner, &label, &config.network).await?;
            let summary = run_partner(&mut source, &mut agent, config.msg_size).await?;
            agent.shutdown().await?;
            Ok(summary)
        }
    }
}
