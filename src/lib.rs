//! pid-shard-swap - sharded sort-merge join for two-party private-id linkage
//!
//! The Partner streams its sorted `(privateId, userId)` shards as fixed-size
//! chunks; the Publisher k-way merges its own shards and joins each chunk as it
//! arrives, writing `(publisherUserId, partnerUserId)` for every shared id.

pub mod config;
pub mod error;
pub mod line_io;
pub mod role;
pub mod sort_merge;
pub mod transport;

pub use config::{RunConfig, ShardInputs};
pub use error::{Result, SwapError};
pub use role::{run, run_partner, run_publisher, Party, RunSummary, Termination};
pub use sort_merge::{
    KWayShardsMerger, LineSource, MalformedRowPolicy, ShardReader, SortedIdSwapper,
};
pub use transport::{Agent, NetworkConfig, TlsConfig};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber (`RUST_LOG`, falling back to `default_level`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
