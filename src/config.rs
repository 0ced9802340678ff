//! Run configuration
//!
//! Built by the CLI from flags / `PID_SWAP_*` environment variables; validated
//! before any file or socket is opened.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::role::Party;
use crate::sort_merge::chunk::{DEFAULT_MSG_SIZE, MIN_MSG_SIZE};
use crate::sort_merge::MalformedRowPolicy;
use crate::transport::NetworkConfig;

/// Which files make up "the local shards"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardInputs {
    /// Explicit list, merged in the given order
    Files(Vec<PathBuf>),
    /// `{prefix}_{i}` for `i` in `start_index..start_index + count`
    Sharded {
        prefix: String,
        start_index: usize,
        count: usize,
    },
}

impl ShardInputs {
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        match self {
            ShardInputs::Files(paths) => {
                if paths.is_empty() {
                    return Err(SwapError::Configuration("no input files given".to_string()));
                }
                Ok(paths.clone())
            }
            ShardInputs::Sharded {
                prefix,
                start_index,
                count,
            } => {
                if *count == 0 {
                    return Err(SwapError::Configuration(
                        "shard count must be at least 1".to_string(),
                    ));
                }
                if prefix.is_empty() {
                    return Err(SwapError::Configuration("shard prefix is empty".to_string()));
                }
                Ok((*start_index..start_index + count)
                    .map(|i| PathBuf::from(format!("{prefix}_{i}")))
                    .collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub party: Party,
    pub inputs: ShardInputs,
    /// Match output; required for the publisher
    pub output: Option<PathBuf>,
    /// Wire chunk size in bytes
    pub msg_size: usize,
    pub malformed_rows: MalformedRowPolicy,
    pub network: NetworkConfig,
}

impl RunConfig {
    pub fn new(party: Party, inputs: ShardInputs) -> Self {
        Self {
            party,
            inputs,
            output: None,
            msg_size: DEFAULT_MSG_SIZE,
            malformed_rows: MalformedRowPolicy::default(),
            network: NetworkConfig::default(),
        }
    }

    /// Reject configurations that cannot run, without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        self.inputs.paths()?;
        if self.msg_size < MIN_MSG_SIZE {
            return Err(SwapError::Configuration(format!(
                "msg size {} is below the minimum of {MIN_MSG_SIZE} bytes",
                self.msg_size
            )));
        }
        if self.party == Party::Publisher && self.output.is_none() {
            return Err(SwapError::Configuration(
                "publisher requires an output path".to_string(),
            ));
        }
        if self.network.host.is_empty() {
            return Err(SwapError::Configuration("network host is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharded_paths() {
        let inputs = ShardInputs::Sharded {
            prefix: "/data/pub".to_string(),
            start_index: 3,
            count: 2,
        };
        assert_eq!(
            inputs.paths().unwrap(),
            vec![PathBuf::from("/data/pub_3"), PathBuf::from("/data/pub_4")]
        );
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(ShardInputs::Files(vec![]).paths().unwrap_err().is_configuration());
        let zero = ShardInputs::Sharded {
            prefix: "p".to_string(),
            start_index: 0,
            count: 0,
        };
        assert!(zero.paths().unwrap_err().is_configuration());
    }

    #[test]
    fn test_validate() {
        let inputs = ShardInputs::Files(vec![PathBuf::from("a.csv")]);
        let mut config = RunConfig::new(Party::Publisher, inputs.clone());
        assert!(config.validate().unwrap_err().is_configuration());
        config.output = Some(PathBuf::from("out.csv"));
        assert!(config.validate().is_ok());
        config.msg_size = 4;
        assert!(config.validate().is_err());

        let partner = RunConfig::new(Party::Partner, inputs);
        assert!(partner.validate().is_ok());
    }

    #[test]
    fn test_config_serializes() {
        let inputs = ShardInputs::Files(vec![PathBuf::from("a.csv")]);
        let config = RunConfig::new(Party::Partner, inputs);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"party\":\"partner\""));
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
