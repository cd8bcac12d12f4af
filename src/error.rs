use std::path::PathBuf;

use nft_export_schema::SchemaError;

use crate::address::AddressError;
use crate::chain::{BlockHash, CollectionId, TokenId};

pub type Result<T, E = ExportError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(
        "Collection {id} not found at {}",
        .block.as_ref().map_or("latest block", BlockHash::as_str)
    )]
    CollectionNotFound {
        id: CollectionId,
        block: Option<BlockHash>,
    },
    #[error("Block {0} not found")]
    BlockNotFound(u64),
    #[error("Invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("Unsupported schema version '{version}'")]
    UnsupportedSchema { version: String },
    #[error("Failed to decode constant data of token {token_id} in collection {collection_id}: {source}")]
    PayloadDecode {
        collection_id: CollectionId,
        token_id: TokenId,
        #[source]
        source: SchemaError,
    },
    #[error("Failed to decode constant data: {0}")]
    ConstDataDecode(#[source] SchemaError),
    #[error("Malformed collection {id}: {reason}")]
    MalformedCollection { id: CollectionId, reason: String },
    #[error("Chain request failed: {0:#}")]
    Chain(#[from] anyhow::Error),
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub(crate) fn invalid_address(address: &str, source: AddressError) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            source,
        }
    }
}
