//! Swap and fee-claim providers
//!
//! Providers build unsigned transactions; signing and broadcast stay with the
//! [`LedgerGateway`](crate::gateway::LedgerGateway).

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::amount::SOL_MINT;
use crate::error::{AgentError, Result};
use crate::signal::TradeAction;

pub const PUMPPORTAL_API: &str = "https://pumpportal.fun/api";
pub const SOLANATRACKER_API: &str = "https://swap-api.solanatracker.io";

const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// One swap intent. `amount` is SOL for buys and token UI units for sells.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub action: TradeAction,
    pub mint: String,
    pub amount: Decimal,
    pub payer: String,
    pub slippage_pct: u32,
    pub priority_fee: Decimal,
    pub pool: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeClaimRequest {
    pub mint: String,
    pub payer: String,
    pub pool: String,
    pub priority_fee: Decimal,
}

#[async_trait]
pub trait TradeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Unsigned transaction bytes for the trade
    async fn request_trade(&self, request: &TradeRequest) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait FeeClaimProvider: Send + Sync {
    /// Unsigned transaction bytes for a creator-fee claim on `pool`
    async fn request_fee_claim(&self, request: &FeeClaimRequest) -> Result<Vec<u8>>;
}

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()
        .map_err(AgentError::from)
}

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// PumpPortal local-transaction API
pub struct PumpPortalClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalTradeBody<'a> {
    public_key: &'a str,
    action: &'a str,
    mint: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    denominated_in_sol: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slippage: Option<u32>,
    priority_fee: f64,
    pool: &'a str,
}

impl PumpPortalClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(PUMPPORTAL_API)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_local(&self, body: &LocalTradeBody<'_>) -> Result<Vec<u8>> {
        let url = format!("{}/trade-local", self.base_url);
        debug!(tag = "SWAP", "{} via pool {}", body.action, body.pool);

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::VenueRejected {
                pool: body.pool.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AgentError::MalformedResponse(format!(
                "empty transaction from pool {}",
                body.pool
            )));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TradeProvider for PumpPortalClient {
    fn name(&self) -> &'static str {
        "pumpportal"
    }

    async fn request_trade(&self, request: &TradeRequest) -> Result<Vec<u8>> {
        let denominated_in_sol = match request.action {
            TradeAction::Buy => "true",
            TradeAction::Sell => "false",
        };
        let body = LocalTradeBody {
            public_key: &request.payer,
            action: request.action.as_str(),
            mint: &request.mint,
            amount: Some(as_f64(request.amount)),
            denominated_in_sol: Some(denominated_in_sol),
            slippage: Some(request.slippage_pct),
            priority_fee: as_f64(request.priority_fee),
            pool: &request.pool,
        };
        self.post_local(&body).await
    }
}

#[async_trait]
impl FeeClaimProvider for PumpPortalClient {
    async fn request_fee_claim(&self, request: &FeeClaimRequest) -> Result<Vec<u8>> {
        let body = LocalTradeBody {
            public_key: &request.payer,
            action: "collectCreatorFee",
            mint: &request.mint,
            amount: None,
            denominated_in_sol: None,
            slippage: None,
            priority_fee: as_f64(request.priority_fee),
            pool: &request.pool,
        };
        self.post_local(&body).await
    }
}

/// Solana Tracker swap API (aggregated routing, base64 transactions)
pub struct SolanaTrackerClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    txn: Option<String>,
}

impl SolanaTrackerClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(SOLANATRACKER_API, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl TradeProvider for SolanaTrackerClient {
    fn name(&self) -> &'static str {
        "solana-tracker"
    }

    async fn request_trade(&self, request: &TradeRequest) -> Result<Vec<u8>> {
        let (from, to) = match request.action {
            TradeAction::Buy => (SOL_MINT, request.mint.as_str()),
            TradeAction::Sell => (request.mint.as_str(), SOL_MINT),
        };
        let url = format!("{}/swap", self.base_url);
        let amount = request.amount.to_string();
        let slippage = request.slippage_pct.to_string();
        let priority_fee = request.priority_fee.to_string();

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[
                ("from", from),
                ("to", to),
                ("amount", amount.as_str()),
                ("slippage", slippage.as_str()),
                ("payer", request.payer.as_str()),
                ("priorityFee", priority_fee.as_str()),
                ("txVersion", "v0"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::VenueRejected {
                pool: request.pool.clone(),
                status: status.as_u16(),
                body: text,
            });
        }

        let swap: SwapResponse = response.json().await?;
        let txn = swap
            .txn
            .ok_or_else(|| AgentError::MalformedResponse("swap response without txn".into()))?;

        base64::engine::general_purpose::STANDARD
            .decode(txn.as_bytes())
            .map_err(|e| AgentError::MalformedResponse(format!("txn is not base64: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn buy_request(pool: &str) -> TradeRequest {
        TradeRequest {
            action: TradeAction::Buy,
            mint: "TokenMint".to_string(),
            amount: Decimal::new(98, 2),
            payer: "Payer".to_string(),
            slippage_pct: 15,
            priority_fee: Decimal::new(5, 3),
            pool: pool.to_string(),
        }
    }

    #[tokio::test]
    async fn test_pumpportal_trade_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trade-local"))
            .and(body_partial_json(json!({
                "publicKey": "Payer",
                "action": "buy",
                "mint": "TokenMint",
                "denominatedInSol": "true",
                "slippage": 15,
                "pool": "pump"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = PumpPortalClient::with_base_url(&server.uri()).unwrap();
        assert_eq!(client.request_trade(&buy_request("pump")).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pumpportal_rejection_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bonding curve complete"))
            .mount(&server)
            .await;

        let client = PumpPortalClient::with_base_url(&server.uri()).unwrap();
        match client.request_trade(&buy_request("pump")).await.unwrap_err() {
            AgentError::VenueRejected { pool, status, body } => {
                assert_eq!(pool, "pump");
                assert_eq!(status, 400);
                assert_eq!(body, "bonding curve complete");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pumpportal_fee_claim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "action": "collectCreatorFee",
                "pool": "meteora-dbc",
                "mint": "TokenMint"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8]))
            .mount(&server)
            .await;

        let client = PumpPortalClient::with_base_url(&server.uri()).unwrap();
        let request = FeeClaimRequest {
            mint: "TokenMint".to_string(),
            payer: "Creator".to_string(),
            pool: "meteora-dbc".to_string(),
            priority_fee: Decimal::new(1, 6),
        };
        assert_eq!(client.request_fee_claim(&request).await.unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn test_pumpportal_empty_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = PumpPortalClient::with_base_url(&server.uri()).unwrap();
        let err = client.request_trade(&buy_request("pump")).await.unwrap_err();
        assert_eq!(err.tag(), "PARSE");
    }

    #[tokio::test]
    async fn test_solana_tracker_decodes_txn() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8, 8, 9]);
        Mock::given(method("GET"))
            .and(path("/swap"))
            .and(header("x-api-key", "secret"))
            .and(query_param("from", SOL_MINT))
            .and(query_param("to", "TokenMint"))
            .and(query_param("txVersion", "v0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "txn": encoded })))
            .mount(&server)
            .await;

        let client = SolanaTrackerClient::with_base_url(&server.uri(), "secret").unwrap();
        assert_eq!(client.request_trade(&buy_request("pump")).await.unwrap(), vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_solana_tracker_missing_txn() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "no route" })))
            .mount(&server)
            .await;

        let client = SolanaTrackerClient::with_base_url(&server.uri(), "secret").unwrap();
        let err = client.request_trade(&buy_request("pump")).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }
}
