use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use nft_export::{
    BlockHash, ChainClient, CollectionId, CrossAccountId, RawCollection, TokenId, TokenPayload,
    GENERIC_SS58_PREFIX,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::config::ChainRpcConfig;
use crate::retry::RetryPolicy;

/// Error object returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

/// [`ChainClient`] over JSON-RPC 2.0 on HTTP.
pub struct RpcChainClient {
    http: reqwest::Client,
    url: Url,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl RpcChainClient {
    pub fn new(config: &ChainRpcConfig) -> Result<Self> {
        let url = Url::parse(&config.rpc_url)
            .with_context(|| format!("Invalid RPC URL '{}'", config.rpc_url))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url,
            retry: config.retry_policy(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Replace the retry policy derived from the config.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &'static str, params: Vec<Value>) -> Result<T> {
        let result = self
            .retry
            .execute(method, || self.send(method, &params))
            .await?;
        serde_json::from_value(result)
            .with_context(|| format!("Unexpected result shape for {method}"))
    }

    async fn send(&self, method: &str, params: &[Value]) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(target: "nft_export_rpc", id, method, "Sending request");

        let response: RpcResponse = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .error_for_status()
            .with_context(|| format!("{method} returned an HTTP error"))?
            .json()
            .await
            .with_context(|| format!("{method} returned a malformed response"))?;

        match response.error {
            Some(error) => Err(anyhow!(error).context(format!("{method} failed"))),
            None => Ok(response.result),
        }
    }
}

/// Positional parameters, with the block hash appended when pinned.
fn params<const N: usize>(args: [Value; N], at: Option<&BlockHash>) -> Vec<Value> {
    let mut params = args.to_vec();
    if let Some(hash) = at {
        params.push(Value::String(hash.as_str().to_string()));
    }
    params
}

/// Byte payloads arrive as `0x`-hex strings or as arrays of numbers,
/// depending on the node version.
fn parse_bytes(value: Value) -> Result<Vec<u8>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => {
            let digits = text.strip_prefix("0x").unwrap_or(&text);
            hex::decode(digits).with_context(|| format!("Invalid hex payload '{text}'"))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| anyhow!("Invalid byte {item} in payload"))
            })
            .collect(),
        other => bail!("Unexpected payload {other}"),
    }
}

fn parse_block_number(header: &Value) -> Result<u64> {
    match header.get("number") {
        Some(Value::String(text)) => {
            let digits = text.strip_prefix("0x").unwrap_or(text);
            u64::from_str_radix(digits, 16)
                .with_context(|| format!("Invalid block number '{text}'"))
        }
        Some(Value::Number(number)) => number
            .as_u64()
            .ok_or_else(|| anyhow!("Invalid block number {number}")),
        _ => bail!("Block header has no number"),
    }
}

fn parse_ss58_prefix(properties: &Value) -> Result<u16> {
    match properties.get("ss58Format") {
        None | Some(Value::Null) => Ok(GENERIC_SS58_PREFIX),
        Some(value) => value
            .as_u64()
            .and_then(|prefix| u16::try_from(prefix).ok())
            .ok_or_else(|| anyhow!("Invalid ss58Format {value}")),
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn ss58_prefix(&self) -> Result<u16> {
        let properties: Value = self.call("system_properties", Vec::new()).await?;
        parse_ss58_prefix(&properties)
    }

    async fn latest_block_number(&self) -> Result<u64> {
        let header: Value = self.call("chain_getHeader", Vec::new()).await?;
        parse_block_number(&header)
    }

    async fn block_hash(&self, number: u64) -> Result<Option<BlockHash>> {
        self.call("chain_getBlockHash", vec![json!(number)]).await
    }

    async fn collection_by_id(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<Option<RawCollection>> {
        self.call("unique_collectionById", params([json!(collection_id)], at))
            .await
    }

    async fn last_token_id(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<TokenId> {
        self.call("unique_lastTokenId", params([json!(collection_id)], at))
            .await
    }

    async fn collection_admins(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<Vec<CrossAccountId>> {
        let admins: Option<Vec<CrossAccountId>> = self
            .call("unique_adminlist", params([json!(collection_id)], at))
            .await?;
        Ok(admins.unwrap_or_default())
    }

    async fn token_owner(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        at: Option<&BlockHash>,
    ) -> Result<Option<CrossAccountId>> {
        self.call(
            "unique_tokenOwner",
            params([json!(collection_id), json!(token_id)], at),
        )
        .await
    }

    async fn token_data(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        at: Option<&BlockHash>,
    ) -> Result<TokenPayload> {
        let args = params([json!(collection_id), json!(token_id)], at);
        let (const_data, variable_data) = tokio::try_join!(
            self.call::<Value>("unique_constMetadata", args.clone()),
            self.call::<Value>("unique_variableMetadata", args),
        )?;

        Ok(TokenPayload {
            const_data: parse_bytes(const_data)?,
            variable_data: parse_bytes(variable_data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_append_block_hash() {
        assert_eq!(params([json!(1)], None), vec![json!(1)]);

        let hash: BlockHash = format!("0x{}", "11".repeat(32)).parse().unwrap();
        assert_eq!(
            params([json!(1), json!(2)], Some(&hash)),
            vec![json!(1), json!(2), json!(hash.as_str())]
        );
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes(json!("0x0a01")).unwrap(), vec![0x0a, 0x01]);
        assert_eq!(parse_bytes(json!("0x")).unwrap(), Vec::<u8>::new());
        assert_eq!(parse_bytes(json!([10, 1])).unwrap(), vec![0x0a, 0x01]);
        assert_eq!(parse_bytes(Value::Null).unwrap(), Vec::<u8>::new());
        assert!(parse_bytes(json!([256])).is_err());
        assert!(parse_bytes(json!("0xzz")).is_err());
        assert!(parse_bytes(json!({})).is_err());
    }

    #[test]
    fn test_parse_block_number() {
        assert_eq!(parse_block_number(&json!({ "number": "0x1f" })).unwrap(), 31);
        assert_eq!(parse_block_number(&json!({ "number": 5 })).unwrap(), 5);
        assert!(parse_block_number(&json!({})).is_err());
    }

    #[test]
    fn test_parse_ss58_prefix() {
        assert_eq!(parse_ss58_prefix(&json!({ "ss58Format": 7391 })).unwrap(), 7391);
        assert_eq!(parse_ss58_prefix(&json!({})).unwrap(), GENERIC_SS58_PREFIX);
        assert!(parse_ss58_prefix(&json!({ "ss58Format": 70000 })).is_err());
    }

    #[test]
    fn test_response_with_error_object() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid params" }
        }))
        .unwrap();
        assert_eq!(response.result, Value::Null);
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(RpcChainClient::new(&ChainRpcConfig::new("not a url")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_node_fails_without_retry_budget() {
        let config = ChainRpcConfig {
            request_timeout_ms: Some(500),
            ..ChainRpcConfig::new("http://127.0.0.1:1")
        };
        let client = RpcChainClient::new(&config)
            .unwrap()
            .with_retry_policy(RetryPolicy::no_retry());
        assert_eq!(client.retry.max_retries, 0);
        assert!(client.latest_block_number().await.is_err());
    }
}
