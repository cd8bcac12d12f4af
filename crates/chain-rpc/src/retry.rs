//! Retry policy for chain requests.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;

use crate::client::RpcError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = try once).
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Run `operation` until it succeeds, the retry budget is spent, or it
    /// fails with an error the node reported itself ([`RpcError`]), which a
    /// retry cannot fix.
    pub async fn execute<F, Fut, T>(&self, method: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempts > 0 {
                        tracing::info!(
                            target: "nft_export_rpc::retry",
                            method,
                            attempts = attempts + 1,
                            "Request succeeded after retrying"
                        );
                    }
                    return Ok(result);
                }
                Err(err) => {
                    attempts += 1;

                    if err.downcast_ref::<RpcError>().is_some() || attempts > self.max_retries {
                        tracing::debug!(
                            target: "nft_export_rpc::retry",
                            method,
                            attempts,
                            error = %format!("{err:#}"),
                            "Request failed"
                        );
                        return Err(err);
                    }

                    tracing::warn!(
                        target: "nft_export_rpc::retry",
                        method,
                        attempt = attempts,
                        max_attempts = self.max_retries + 1,
                        error = %format!("{err:#}"),
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed, backing off"
                    );

                    sleep(backoff).await;
                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.backoff_multiplier)
                            .min(self.max_backoff.as_secs_f64()),
                    );
                }
            }
        }
    }
}
