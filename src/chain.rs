//! Chain access seam.
//!
//! Everything the exporter knows about the chain goes through [`ChainClient`].
//! Every read takes an optional block hash: `None` reads the current best
//! state, `Some` reads immutable historical state at that block.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::address::CrossAccountId;

pub type CollectionId = u32;
pub type TokenId = u32;

const BLOCK_HASH_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("Invalid block hash '{0}': expected 0x-prefixed 32-byte hex")]
pub struct InvalidBlockHash(String);

/// Hash of a block, stored as lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockHash(String);

impl BlockHash {
    pub fn from_bytes(bytes: [u8; BLOCK_HASH_LEN]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BlockHash {
    type Err = InvalidBlockHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidBlockHash(s.to_string());
        let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
        let bytes: [u8; BLOCK_HASH_LEN] = hex::decode(digits)
            .map_err(|_| invalid())?
            .try_into()
            .map_err(|_| invalid())?;
        Ok(Self::from_bytes(bytes))
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-collection limits. Every limit is optional; unset limits are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionLimits {
    pub account_token_ownership_limit: Option<u32>,
    pub sponsored_data_size: Option<u32>,
    pub sponsored_data_rate_limit: Option<Value>,
    pub token_limit: Option<u32>,
    pub sponsor_transfer_timeout: Option<u32>,
    pub sponsor_approve_timeout: Option<u32>,
    pub owner_can_transfer: Option<bool>,
    pub owner_can_destroy: Option<bool>,
    pub transfers_enabled: Option<bool>,
}

/// Collection record exactly as the chain reports it.
///
/// `name` and `description` are UTF-16 code units; they are kept as decimal
/// strings, one per unit, whether the chain sent numbers or strings. Fields
/// this type does not know about are preserved in `extra` and written back
/// out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCollection {
    pub owner: String,
    pub mode: Value,
    pub access: Value,
    #[serde(deserialize_with = "code_units")]
    pub name: Vec<String>,
    #[serde(deserialize_with = "code_units")]
    pub description: Vec<String>,
    pub token_prefix: String,
    pub mint_mode: bool,
    pub offchain_schema: String,
    pub schema_version: String,
    pub sponsorship: Value,
    pub limits: CollectionLimits,
    pub variable_on_chain_schema: String,
    pub const_on_chain_schema: String,
    pub meta_update_permission: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawCollection {
    /// Encode a string the way the chain stores collection names.
    pub fn encode_code_units(text: &str) -> Vec<String> {
        text.encode_utf16().map(|unit| unit.to_string()).collect()
    }
}

fn code_units<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|unit| match unit {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s),
            other => Err(D::Error::custom(format!("unexpected code unit {other}"))),
        })
        .collect()
}

/// Immutable and mutable payload of a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPayload {
    pub const_data: Vec<u8>,
    pub variable_data: Vec<u8>,
}

/// Read-only access to chain state.
///
/// Implementations own transport concerns (connections, timeouts, retries);
/// callers only see the final outcome of each read.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// SS58 network prefix the chain renders its addresses with.
    async fn ss58_prefix(&self) -> Result<u16>;

    async fn latest_block_number(&self) -> Result<u64>;

    /// Hash of block `number`, or `None` if the chain has no such block yet.
    async fn block_hash(&self, number: u64) -> Result<Option<BlockHash>>;

    /// Raw collection record, or `None` when the collection does not exist at
    /// the given block.
    async fn collection_by_id(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<Option<RawCollection>>;

    /// Highest token id minted in the collection so far.
    async fn last_token_id(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<TokenId>;

    async fn collection_admins(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<Vec<CrossAccountId>>;

    /// Owner of a token, or `None` when the token does not exist (burned).
    async fn token_owner(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        at: Option<&BlockHash>,
    ) -> Result<Option<CrossAccountId>>;

    async fn token_data(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        at: Option<&BlockHash>,
    ) -> Result<TokenPayload>;
}
