//! Test utilities for nft-export.
//!
//! [`MockChain`] is an in-memory [`nft_export::ChainClient`] that keeps the
//! full history of its state: every mutation produces a new block, and reads
//! pinned to an older block hash see the state as it was then.

pub mod accounts;
pub mod fixtures;
mod mock_chain;

pub use mock_chain::{CollectionSpec, MockChain, UNIQUE_SS58_PREFIX};
