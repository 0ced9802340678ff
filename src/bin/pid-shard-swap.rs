//! pid-shard-swap CLI
//!
//! Runs one side of the sharded merge-join:
//!   pid-shard-swap --party publisher --input-prefix /data/pub --num-shards 4 --output matches.csv
//!   pid-shard-swap --party partner --input-prefix /data/partner --num-shards 4 --host pub.example
//!
//! Every flag also reads a `PID_SWAP_*` environment variable; a `.env` file in the
//! working directory is loaded first.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use pid_shard_swap::config::{RunConfig, ShardInputs};
use pid_shard_swap::sort_merge::chunk::DEFAULT_MSG_SIZE;
use pid_shard_swap::{MalformedRowPolicy, NetworkConfig, Party, TlsConfig};

#[derive(Parser)]
#[command(name = "pid-shard-swap")]
#[command(about = "Sharded k-way merge and chunked merge-join between a publisher and a partner")]
struct Cli {
    /// Which side to run: publisher or partner (numeric ids are rejected)
    #[arg(long, env = "PID_SWAP_PARTY", value_parser = parse_party_name)]
    party: Party,

    /// Explicit shard files, merged in the given order
    #[arg(
        long = "input",
        env = "PID_SWAP_INPUTS",
        value_delimiter = ',',
        conflicts_with = "input_prefix"
    )]
    inputs: Vec<PathBuf>,

    /// Shard files are `<prefix>_<index>`
    #[arg(long, env = "PID_SWAP_INPUT_PREFIX")]
    input_prefix: Option<String>,

    /// First shard index used with --input-prefix
    #[arg(long, env = "PID_SWAP_SHARD_START_INDEX", default_value_t = 0)]
    shard_start_index: usize,

    /// Number of shards used with --input-prefix
    #[arg(long, env = "PID_SWAP_NUM_SHARDS", default_value_t = 1)]
    num_shards: usize,

    /// Match output (publisher only)
    #[arg(long, env = "PID_SWAP_OUTPUT")]
    output: Option<PathBuf>,

    /// Publisher host: bind address for the publisher, dial address for the partner
    #[arg(long, env = "PID_SWAP_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "PID_SWAP_PORT", default_value_t = 10501)]
    port: u16,

    /// Wire chunk size in bytes (must match on both sides)
    #[arg(long, env = "PID_SWAP_MSG_SIZE", default_value_t = DEFAULT_MSG_SIZE)]
    msg_size: usize,

    /// Rows without exactly one ',': fail or skip
    #[arg(long, env = "PID_SWAP_MALFORMED_ROWS", default_value = "fail")]
    malformed_rows: MalformedRowPolicy,

    /// Partner connect attempts before giving up
    #[arg(long, env = "PID_SWAP_CONNECT_RETRIES", default_value_t = 30)]
    connect_retries: u32,

    /// Seconds between connect attempts
    #[arg(long, env = "PID_SWAP_RETRY_BACKOFF_SECS", default_value_t = 1)]
    retry_backoff_secs: u64,

    #[arg(long, env = "PID_SWAP_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "PID_SWAP_TLS_KEY")]
    tls_key: Option<PathBuf>,

    #[arg(long, env = "PID_SWAP_TLS_PASSPHRASE")]
    tls_passphrase: Option<PathBuf>,

    #[arg(long, env = "PID_SWAP_TLS_CA")]
    tls_ca: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "PID_SWAP_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Role names only; a bare number is ambiguous between 0- and 1-based numbering
fn parse_party_name(value: &str) -> Result<Party, String> {
    if value.trim().parse::<i64>().is_ok() {
        return Err(format!(
            "numeric party {value:?} is ambiguous, use \"publisher\" or \"partner\""
        ));
    }
    value.parse::<Party>().map_err(|e| e.to_string())
}

impl Cli {
    fn into_config(self) -> Result<(RunConfig, bool)> {
        let inputs = match self.input_prefix {
            Some(prefix) => ShardInputs::Sharded {
                prefix,
                start_index: self.shard_start_index,
                count: self.num_shards,
            },
            None => ShardInputs::Files(self.inputs),
        };
        let network = NetworkConfig {
            host: self.host,
            port: self.port,
            connect_retries: self.connect_retries,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            tls: TlsConfig {
                cert_path: self.tls_cert,
                key_path: self.tls_key,
                passphrase_path: self.tls_passphrase,
                ca_path: self.tls_ca,
            },
            ..NetworkConfig::default()
        };
        let config = RunConfig {
            party: self.party,
            inputs,
            output: self.output,
            msg_size: self.msg_size,
            malformed_rows: self.malformed_rows,
            network,
        };
        config.validate().context("invalid configuration")?;
        Ok((config, self.json))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional .env (ports, shard prefixes) before clap reads the environment
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    pid_shard_swap::init(&cli.log_level);

    let (config, json) = cli.into_config()?;
    let summary = pid_shard_swap::run(&config)
        .await
        .with_context(|| format!("{} run failed", config.party))?;

    info!(
        party = %summary.party,
        chunks = summary.chunks,
        elapsed_ms = summary.elapsed_ms as u64,
        "run complete"
    );
    if json {
        let text =
            serde_json::to_string_pretty(&summary).context("Failed to encode run summary")?;
        println!("{text}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_accepts_names() {
        let args = ["pid-shard-swap", "--party", "Partner", "--input", "a.csv"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.party, Party::Partner);
        assert_eq!(cli.inputs, vec![PathBuf::from("a.csv")]);
    }

    #[test]
    fn test_party_rejects_numeric_ids() {
        for id in ["0", "1", "2"] {
            let parsed = Cli::try_parse_from(["pid-shard-swap", "--party", id, "--input", "x"]);
            assert!(parsed.is_err(), "--party {id} should be rejected");
        }
        assert!(parse_party_name(" 1 ").unwrap_err().contains("ambiguous"));
    }

    #[test]
    fn test_prefix_inputs_build_config() {
        let cli = Cli::try_parse_from([
            "pid-shard-swap",
            "--party",
            "publisher",
            "--input-prefix",
            "/data/pub",
            "--num-shards",
            "3",
            "--output",
            "out.csv",
        ])
        .unwrap();
        let (config, json) = cli.into_config().unwrap();
        assert!(!json);
        assert_eq!(config.inputs.paths().unwrap().len(), 3);
    }
}
