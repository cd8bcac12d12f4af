//! NFT collection exporter
//!
//! Connects to a node, pins a block and writes
//! `export_collection_<id>.json` / `export_tokens_<id>.json` for every
//! requested collection.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use nft_export::{BlockHash, Exporter};
use nft_export_rpc::RpcChainClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!(
        target: "nft_export::cli",
        rpc_url = %config.rpc_url,
        collections = ?config.collections,
        output_dir = %config.output_dir.display(),
        dry_run = config.dry_run,
        "Starting NFT export"
    );

    let chain = Arc::new(RpcChainClient::new(&config.rpc_config())?);
    let exporter = Exporter::connect(chain, &config.output_dir)
        .await
        .context("Failed to read chain properties")?
        .with_concurrency(config.concurrency)
        .with_format(config.json_format());

    let exporter = if let Some(hash) = &config.block_hash {
        exporter.pinned_at(hash.clone())
    } else if let Some(number) = config.block_number {
        exporter.pin_to_block_number(number).await?
    } else if config.latest {
        tracing::warn!(
            target: "nft_export::cli",
            "Reading latest state, collections are not exported from a single block"
        );
        exporter
    } else {
        exporter
            .pin_to_latest()
            .await
            .context("Failed to pin the chain head")?
    };

    let exports = exporter
        .export_many(&config.collections, !config.dry_run)
        .await?;

    for export in &exports {
        let id = export.collection.id;
        tracing::info!(
            target: "nft_export::cli",
            collection_id = id,
            name = %export.collection.name,
            tokens_count = export.collection.tokens_count,
            exported = export.tokens.len(),
            collection_file = %exporter.collection_filename(id).display(),
            tokens_file = %exporter.tokens_filename(id).display(),
            "Collection exported"
        );
    }

    tracing::info!(
        target: "nft_export::cli",
        collections = exports.len(),
        tokens = exports.iter().map(|export| export.tokens.len()).sum::<usize>(),
        block_hash = exporter.block_hash().map(BlockHash::as_str),
        "Export finished"
    );

    Ok(())
}
