//! Configuration for the exporter CLI

use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use nft_export::{BlockHash, CollectionId, JsonFormat, DEFAULT_CONCURRENCY};
use nft_export_rpc::ChainRpcConfig;

/// Export NFT collections as point-in-time JSON snapshots.
///
/// Every collection is read at a single block: the one given with
/// `--block-number` or `--block-hash`, or the chain head at startup.
#[derive(Parser, Debug)]
#[command(name = "nft-export")]
#[command(about = "Export NFT collections and their tokens to JSON", long_about = None)]
#[command(group(ArgGroup::new("block").args(["block_number", "block_hash", "latest"])))]
pub struct Config {
    /// Node RPC URL
    #[arg(long, env = "NFT_EXPORT_RPC_URL", default_value = "http://localhost:9933")]
    pub rpc_url: String,

    /// Collections to export (comma-separated ids)
    ///
    /// Example: --collections 1,5,23
    #[arg(long, value_delimiter = ',', required = true)]
    pub collections: Vec<CollectionId>,

    /// Directory the export files are written to
    #[arg(long, env = "NFT_EXPORT_OUTPUT_DIR", default_value = "./export")]
    pub output_dir: PathBuf,

    /// Export the state at this block number
    #[arg(long)]
    pub block_number: Option<u64>,

    /// Export the state at this block hash
    #[arg(long)]
    pub block_hash: Option<BlockHash>,

    /// Read the best state of every request instead of pinning a block
    ///
    /// Exports of a chain that advances during the run may then be
    /// inconsistent.
    #[arg(long)]
    pub latest: bool,

    /// Token reads in flight at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Write compact instead of pretty-printed JSON
    #[arg(long)]
    pub compact: bool,

    /// Read and decode everything but write no files
    #[arg(long)]
    pub dry_run: bool,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Retries per request on transport failure
    #[arg(long, default_value = "3")]
    pub request_retry: u32,

    /// Initial retry backoff in milliseconds
    #[arg(long, default_value = "250")]
    pub request_backoff_ms: u64,
}

impl Config {
    pub fn rpc_config(&self) -> ChainRpcConfig {
        ChainRpcConfig {
            request_timeout_ms: Some(self.request_timeout_ms),
            request_retry: Some(self.request_retry),
            request_backoff_ms: Some(self.request_backoff_ms),
            ..ChainRpcConfig::new(self.rpc_url.clone())
        }
    }

    pub fn json_format(&self) -> JsonFormat {
        if self.compact {
            JsonFormat::Compact
        } else {
            JsonFormat::Pretty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collections_and_block() {
        let config = Config::parse_from([
            "nft-export",
            "--collections",
            "1,5,23",
            "--block-number",
            "100",
            "--compact",
        ]);
        assert_eq!(config.collections, vec![1, 5, 23]);
        assert_eq!(config.block_number, Some(100));
        assert_eq!(config.json_format(), JsonFormat::Compact);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_block_selectors_are_exclusive() {
        let result = Config::try_parse_from([
            "nft-export",
            "--collections",
            "1",
            "--block-number",
            "100",
            "--latest",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_block_hash_is_validated() {
        assert!(Config::try_parse_from([
            "nft-export",
            "--collections",
            "1",
            "--block-hash",
            "0x1234",
        ])
        .is_err());
    }
}
