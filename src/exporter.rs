//! Export orchestration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::AddressNormalizer;
use crate::chain::{BlockHash, ChainClient, CollectionId};
use crate::collection::{CollectionData, CollectionSnapshotter};
use crate::error::{ExportError, Result};
use crate::output::{commit_all, stage_json, JsonFormat};
use crate::schema::SchemaDecoder;
use crate::tokens::{TokenData, TokenEnumerator, DEFAULT_CONCURRENCY};

/// Collection metadata together with its tokens, read at the same block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub collection: CollectionData,
    pub tokens: Vec<TokenData>,
}

/// Exports collections as JSON snapshots.
///
/// An `Exporter` is immutable: pinning to a block or changing a setting
/// returns a new value and leaves the original usable as before.
#[derive(Clone)]
pub struct Exporter {
    chain: Arc<dyn ChainClient>,
    decoder: SchemaDecoder,
    normalizer: AddressNormalizer,
    output_dir: PathBuf,
    block_hash: Option<BlockHash>,
    concurrency: usize,
    format: JsonFormat,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("output_dir", &self.output_dir)
            .field("block_hash", &self.block_hash)
            .field("concurrency", &self.concurrency)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        decoder: SchemaDecoder,
        normalizer: AddressNormalizer,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chain,
            decoder,
            normalizer,
            output_dir: output_dir.into(),
            block_hash: None,
            concurrency: DEFAULT_CONCURRENCY,
            format: JsonFormat::default(),
        }
    }

    /// Build an exporter using the chain's own SS58 prefix and the default
    /// schema decoder.
    pub async fn connect(
        chain: Arc<dyn ChainClient>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let prefix = chain.ss58_prefix().await?;
        let normalizer = AddressNormalizer::new(prefix)
            .map_err(|e| anyhow::anyhow!("Chain reported an unusable SS58 prefix: {e}"))?;
        Ok(Self::new(chain, SchemaDecoder::new(), normalizer, output_dir))
    }

    #[must_use]
    pub fn pinned_at(&self, block_hash: BlockHash) -> Self {
        Self {
            block_hash: Some(block_hash),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_concurrency(&self, concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_format(&self, format: JsonFormat) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }

    /// Pin to block `number`.
    pub async fn pin_to_block_number(&self, number: u64) -> Result<Self> {
        let hash = self
            .chain
            .block_hash(number)
            .await?
            .ok_or(ExportError::BlockNotFound(number))?;
        tracing::info!(
            target: "nft_export::exporter",
            block_number = number,
            block_hash = %hash,
            "Pinned export"
        );
        Ok(self.pinned_at(hash))
    }

    /// Pin to the current head so that every read of a run sees one state.
    pub async fn pin_to_latest(&self) -> Result<Self> {
        let number = self.chain.latest_block_number().await?;
        self.pin_to_block_number(number).await
    }

    pub fn block_hash(&self) -> Option<&BlockHash> {
        self.block_hash.as_ref()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn collection_filename(&self, collection_id: CollectionId) -> PathBuf {
        self.output_dir.join(format!("export_collection_{collection_id}.json"))
    }

    pub fn tokens_filename(&self, collection_id: CollectionId) -> PathBuf {
        self.output_dir.join(format!("export_tokens_{collection_id}.json"))
    }

    pub async fn gen_collection_data(&self, collection_id: CollectionId) -> Result<CollectionData> {
        CollectionSnapshotter::new(self.chain.clone(), self.normalizer)
            .fetch(collection_id, self.block_hash.as_ref())
            .await
    }

    pub async fn get_all_tokens(&self, collection: &CollectionData) -> Result<Vec<TokenData>> {
        TokenEnumerator::new(self.chain.clone(), self.normalizer, self.decoder.clone())
            .with_concurrency(self.concurrency)
            .enumerate(collection, self.block_hash.as_ref())
            .await
    }

    /// Snapshot a collection and all of its tokens, writing both files when
    /// `persist` is set.
    ///
    /// Both files are written in full before either replaces a previous
    /// export, and they replace it together: on error the previous pair (or
    /// no file at all) is left in place.
    pub async fn export(&self, collection_id: CollectionId, persist: bool) -> Result<Export> {
        let collection = self.gen_collection_data(collection_id).await?;
        let tokens = self.get_all_tokens(&collection).await?;

        if persist {
            let collection_file = stage_json(
                &self.collection_filename(collection_id),
                &collection,
                self.format,
            )?;
            let tokens_file =
                stage_json(&self.tokens_filename(collection_id), &tokens, self.format)?;
            commit_all(vec![collection_file, tokens_file])?;
        }

        tracing::info!(
            target: "nft_export::exporter",
            collection_id,
            tokens = tokens.len(),
            block_hash = self.block_hash.as_ref().map(BlockHash::as_str),
            persisted = persist,
            "Exported collection"
        );

        Ok(Export { collection, tokens })
    }

    /// Export several collections one after another against the same block.
    pub async fn export_many(
        &self,
        collection_ids: &[CollectionId],
        persist: bool,
    ) -> Result<Vec<Export>> {
        let mut exports = Vec::with_capacity(collection_ids.len());
        for &collection_id in collection_ids {
            exports.push(self.export(collection_id, persist).await?);
        }
        Ok(exports)
    }
}
