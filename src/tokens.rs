//! Token enumeration at a pinned block.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::{AddressNormalizer, ChainAccountId, CrossAccountId};
use crate::chain::{BlockHash, ChainClient, CollectionId, TokenId};
use crate::collection::CollectionData;
use crate::error::{ExportError, Result};
use crate::schema::{ResolvedSchema, SchemaDecoder};

/// Upper bound on token reads in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Exported view of one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub token_id: TokenId,
    pub owner: CrossAccountId,
    pub chain_owner: ChainAccountId,
    /// `0x`-hex of the immutable payload, `""` when empty.
    pub const_data: String,
    pub variable_data: String,
    pub decoded_const_data: Option<Value>,
}

pub fn encode_const_data(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        String::new()
    } else {
        format!("0x{}", hex::encode(bytes))
    }
}

/// Walks `1..=tokens_count` of a collection, fetching every token at the same
/// block.
#[derive(Clone)]
pub struct TokenEnumerator {
    chain: Arc<dyn ChainClient>,
    normalizer: AddressNormalizer,
    decoder: SchemaDecoder,
    concurrency: usize,
}

impl TokenEnumerator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        normalizer: AddressNormalizer,
        decoder: SchemaDecoder,
    ) -> Self {
        Self {
            chain,
            normalizer,
            decoder,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch every existing token of `collection`, ascending by id.
    ///
    /// Burned tokens are left out. The first failing token aborts the whole
    /// enumeration.
    pub async fn enumerate(
        &self,
        collection: &CollectionData,
        at: Option<&BlockHash>,
    ) -> Result<Vec<TokenData>> {
        let schema = self.decoder.resolve(
            &collection.raw.schema_version,
            &collection.raw.const_on_chain_schema,
        )?;
        let schema = &schema;

        let tokens: Vec<Option<TokenData>> = futures::stream::iter(1..=collection.tokens_count)
            .map(|token_id| self.fetch_token(collection.id, token_id, schema, at))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let tokens: Vec<TokenData> = tokens.into_iter().flatten().collect();
        tracing::debug!(
            target: "nft_export::tokens",
            collection_id = collection.id,
            tokens_count = collection.tokens_count,
            present = tokens.len(),
            "Enumerated tokens"
        );
        Ok(tokens)
    }

    async fn fetch_token(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        schema: &ResolvedSchema,
        at: Option<&BlockHash>,
    ) -> Result<Option<TokenData>> {
        let Some(owner) = self.chain.token_owner(collection_id, token_id, at).await? else {
            tracing::trace!(
                target: "nft_export::tokens",
                collection_id,
                token_id,
                "Token burned, skipping"
            );
            return Ok(None);
        };
        let payload = self.chain.token_data(collection_id, token_id, at).await?;

        let decoded_const_data = schema
            .decode(&payload.const_data)
            .map_err(|source| ExportError::PayloadDecode {
                collection_id,
                token_id,
                source,
            })?;
        let chain_owner = self
            .normalizer
            .to_chain_account(&owner)
            .map_err(|e| ExportError::invalid_address(owner.address(), e))?;
        let owner = self
            .normalizer
            .normalize_account(&owner)
            .map_err(|e| ExportError::invalid_address(owner.address(), e))?;

        Ok(Some(TokenData {
            token_id,
            owner,
            chain_owner,
            const_data: encode_const_data(&payload.const_data),
            variable_data: String::from_utf8_lossy(&payload.variable_data).into_owned(),
            decoded_const_data,
        }))
    }
}
