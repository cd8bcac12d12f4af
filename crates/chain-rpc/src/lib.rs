//! JSON-RPC implementation of [`nft_export::ChainClient`] for Unique-style
//! Substrate nodes.
//!
//! Reads map onto the node's `unique_*` and `chain_*` methods. When a read is
//! pinned, the block hash is passed as the trailing positional parameter.
//! Transport failures are retried with exponential backoff; errors reported by
//! the node itself are returned as they are.

mod client;
mod config;
mod retry;

pub use client::{RpcChainClient, RpcError};
pub use config::ChainRpcConfig;
pub use retry::RetryPolicy;
