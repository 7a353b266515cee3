// DexScreener API gateway: request shaping and response parsing only.
// All numeric fields on the wire are optional or string-typed; the
// coercion into well-typed records happens in `model`, not here.
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ScannerConfig;
use crate::error::{Error, Result};

/// One entry from the boosted/promoted token list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBoost {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "tokenAddress")]
    pub token_address: String,
    #[serde(rename = "totalAmount")]
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLiquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVolume {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPriceChange {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSocial {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInfo {
    pub socials: Option<Vec<RawSocial>>,
    pub header: Option<String>,
    pub description: Option<String>,
}

/// One trading pair as DexScreener reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPair {
    #[serde(rename = "chainId", default)]
    pub chain_id: String,
    #[serde(rename = "pairAddress")]
    pub pair_address: String,
    #[serde(rename = "baseToken")]
    pub base_token: RawBaseToken,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    #[serde(rename = "priceChange")]
    pub price_change: Option<RawPriceChange>,
    pub volume: Option<RawVolume>,
    pub liquidity: Option<RawLiquidity>,
    pub fdv: Option<f64>,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    pub info: Option<RawInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairsResponse {
    pub pairs: Option<Vec<RawPair>>,
}

/// Upstream market-data source consumed by the pipeline.
///
/// The scanner is written against this trait so tests can drive it with a
/// scripted source instead of the live API.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest boosted/promoted token list (all chains)
    async fn boosted_tokens(&self) -> Result<Vec<TokenBoost>>;

    /// All pairs for one or more token addresses (comma-joined upstream)
    async fn pairs_for_tokens(&self, addresses: &[String]) -> Result<Vec<RawPair>>;
}

/// Live DexScreener HTTP client
pub struct DexScreenerClient {
    client: reqwest::Client,
    base: String,
    retry_budget: Duration,
}

impl DexScreenerClient {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .unwrap_or_default(),
            base: config.api_base.trim_end_matches('/').to_string(),
            retry_budget: config.request_timeout(),
        }
    }

    /// GET with bounded exponential-backoff retry for transient failures.
    /// The total retry budget stays within one request-timeout window so a
    /// flapping endpoint cannot starve the refresh interval.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };

        retry(backoff, || async {
            match self.get_json_once(url).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!("Retryable gateway error on {}: {}", url, e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    /// Single GET attempt
    async fn get_json_once<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::GatewayUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::GatewayUnavailable(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::MalformedResponse {
                endpoint: url.to_string(),
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl MarketDataSource for DexScreenerClient {
    async fn boosted_tokens(&self) -> Result<Vec<TokenBoost>> {
        let url = format!("{}/token-boosts/latest/v1", self.base);
        debug!("Fetching boosted token list");
        self.get_json(&url).await
    }

    async fn pairs_for_tokens(&self, addresses: &[String]) -> Result<Vec<RawPair>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/latest/dex/tokens/{}", self.base, addresses.join(","));
        debug!("Fetching pairs for {} token(s)", addresses.len());
        let resp: TokenPairsResponse = self.get_json(&url).await?;
        Ok(resp.pairs.unwrap_or_default())
    }
}
