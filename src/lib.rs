//! Point-in-time JSON exports of NFT collections.
//!
//! An [`Exporter`] reads a collection record and every token of that
//! collection through a [`ChainClient`], all against one block, decodes each
//! token's constant payload with the collection's declared schema and
//! optionally writes the result as two JSON files:
//!
//! - `export_collection_<id>.json`: a [`CollectionData`] object,
//! - `export_tokens_<id>.json`: an array of [`TokenData`] ordered by token id.
//!
//! ```rust,ignore
//! let exporter = Exporter::connect(chain, "./out").await?.pin_to_latest().await?;
//! let export = exporter.export(1, true).await?;
//! ```

pub mod address;
pub mod chain;
pub mod collection;
pub mod error;
pub mod exporter;
pub mod output;
pub mod schema;
pub mod tokens;

pub use address::{
    AccountId, AddressError, AddressNormalizer, ChainAccountId, CrossAccountId,
    GENERIC_SS58_PREFIX,
};
pub use chain::{
    BlockHash, ChainClient, CollectionId, CollectionLimits, RawCollection, TokenId, TokenPayload,
};
pub use collection::{CollectionData, CollectionSnapshotter};
pub use error::{ExportError, Result};
pub use exporter::{Export, Exporter};
pub use output::JsonFormat;
pub use schema::{ResolvedSchema, SchemaDecoder, SCHEMA_VERSION_IMAGE_URL, SCHEMA_VERSION_UNIQUE};
pub use tokens::{TokenData, TokenEnumerator, DEFAULT_CONCURRENCY};

// Re-exported for `ChainClient` implementors.
pub use async_trait::async_trait;
