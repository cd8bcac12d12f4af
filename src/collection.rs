//! Collection metadata snapshots.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::{AddressNormalizer, CrossAccountId};
use crate::chain::{BlockHash, ChainClient, CollectionId, RawCollection, TokenId};
use crate::error::{ExportError, Result};

/// Exported view of a collection at one block.
///
/// Every field other than `id` and `raw` is derived from `raw` (plus the token
/// counter and admin list read at the same block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionData {
    pub id: CollectionId,
    pub name: String,
    pub description: String,
    pub normalized_owner: String,
    pub tokens_count: TokenId,
    pub admins: Vec<CrossAccountId>,
    pub raw: RawCollection,
}

impl CollectionData {
    /// Derive the exported view from a raw chain record.
    pub fn from_raw(
        id: CollectionId,
        raw: RawCollection,
        tokens_count: TokenId,
        admins: &[CrossAccountId],
        normalizer: &AddressNormalizer,
    ) -> Result<Self> {
        let name = decode_code_units(id, "name", &raw.name)?;
        let description = decode_code_units(id, "description", &raw.description)?;
        let normalized_owner = normalizer
            .normalize(&raw.owner)
            .map_err(|e| ExportError::invalid_address(&raw.owner, e))?;
        let admins = admins
            .iter()
            .map(|admin| {
                normalizer
                    .normalize_account(admin)
                    .map_err(|e| ExportError::invalid_address(admin.address(), e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            name,
            description,
            normalized_owner,
            tokens_count,
            admins,
            raw,
        })
    }
}

fn decode_code_units(id: CollectionId, field: &str, units: &[String]) -> Result<String> {
    let units = units
        .iter()
        .map(|unit| {
            unit.trim()
                .parse::<u16>()
                .map_err(|_| ExportError::MalformedCollection {
                    id,
                    reason: format!("{field} contains non-numeric code unit '{unit}'"),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(String::from_utf16_lossy(&units))
}

/// Reads collection records and reshapes them into [`CollectionData`].
#[derive(Clone)]
pub struct CollectionSnapshotter {
    chain: Arc<dyn ChainClient>,
    normalizer: AddressNormalizer,
}

impl CollectionSnapshotter {
    pub fn new(chain: Arc<dyn ChainClient>, normalizer: AddressNormalizer) -> Self {
        Self { chain, normalizer }
    }

    /// Snapshot collection `id` at `at` (the current best block when `None`).
    pub async fn fetch(&self, id: CollectionId, at: Option<&BlockHash>) -> Result<CollectionData> {
        let raw = self
            .chain
            .collection_by_id(id, at)
            .await?
            .ok_or_else(|| ExportError::CollectionNotFound {
                id,
                block: at.cloned(),
            })?;

        let (tokens_count, admins) = tokio::try_join!(
            self.chain.last_token_id(id, at),
            self.chain.collection_admins(id, at),
        )?;

        tracing::debug!(
            target: "nft_export::collection",
            collection_id = id,
            tokens_count,
            admins = admins.len(),
            block = at.map(BlockHash::as_str),
            "Fetched collection"
        );

        CollectionData::from_raw(id, raw, tokens_count, &admins, &self.normalizer)
    }
}
