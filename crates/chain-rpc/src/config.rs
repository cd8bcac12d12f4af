use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainRpcConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub request_retry: Option<u32>,
    #[serde(default)]
    pub request_backoff_ms: Option<u64>,
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

impl ChainRpcConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            request_timeout_ms: None,
            request_retry: None,
            request_backoff_ms: None,
            max_backoff_ms: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.request_retry.unwrap_or(defaults.max_retries),
            initial_backoff: self
                .request_backoff_ms
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: self
                .max_backoff_ms
                .map_or(defaults.max_backoff, Duration::from_millis),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let config: ChainRpcConfig =
            serde_json::from_str(r#"{ "rpc_url": "http://localhost:9933", "request_retry": 1 }"#)
                .unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.initial_backoff, RetryPolicy::default().initial_backoff);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
