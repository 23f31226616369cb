//! Ledger JSON-RPC client

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{AgentError, Result};

/// Read and submit operations against the ledger
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Native balance in lamports
    async fn balance(&self, address: &str) -> Result<u64>;

    /// Raw token units held by `owner` for `mint`, summed across accounts
    async fn token_balance(&self, owner: &str, mint: &str) -> Result<u64>;

    /// Broadcast a signed transaction, returning its signature
    async fn send_transaction(&self, signed: &[u8]) -> Result<String>;

    async fn latest_blockhash(&self) -> Result<String>;

    /// Account keys of a confirmed transaction, `None` if not found.
    /// The first key is the fee payer / originating signer.
    async fn transaction_accounts(&self, signature: &str) -> Result<Option<Vec<String>>>;
}

/// Solana JSON-RPC over HTTP
pub struct RpcLedger {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcLedger {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(15))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AgentError::from)?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Network(format!(
                "{} returned HTTP {}: {}",
                method,
                status.as_u16(),
                text
            )));
        }

        let parsed: RpcResponse = response.json().await?;
        if let Some(err) = parsed.error {
            return Err(AgentError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        debug!(tag = "RPC", "{} ok", method);
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl LedgerRpc for RpcLedger {
    async fn balance(&self, address: &str) -> Result<u64> {
        let result = self
            .call("getBalance", json!([address, { "commitment": "confirmed" }]))
            .await?;

        result["value"]
            .as_u64()
            .ok_or_else(|| AgentError::MalformedResponse(format!("getBalance: {}", result)))
    }

    async fn token_balance(&self, owner: &str, mint: &str) -> Result<u64> {
        let result = self
            .call(
                "getTokenAccountsByOwner",
                json!([owner, { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;

        let accounts = result["value"].as_array().ok_or_else(|| {
            AgentError::MalformedResponse(format!("getTokenAccountsByOwner: {}", result))
        })?;

        let mut total: u64 = 0;
        for account in accounts {
            let amount = &account["account"]["data"]["parsed"]["info"]["tokenAmount"]["amount"];
            let raw = amount
                .as_str()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| {
                    AgentError::MalformedResponse(format!("token amount: {}", amount))
                })?;
            total = total.saturating_add(raw);
        }
        Ok(total)
    }

    async fn send_transaction(&self, signed: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(signed);
        let result = self
            .call(
                "sendTransaction",
                json!([encoded, { "encoding": "base64", "skipPreflight": true }]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::MalformedResponse(format!("sendTransaction: {}", result)))
    }

    async fn latest_blockhash(&self) -> Result<String> {
        let result = self
            .call("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
            .await?;

        result["value"]["blockhash"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::MalformedResponse(format!("getLatestBlockhash: {}", result)))
    }

    async fn transaction_accounts(&self, signature: &str) -> Result<Option<Vec<String>>> {
        let result = self
            .call(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "json",
                        "commitment": "confirmed",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let keys = result["transaction"]["message"]["accountKeys"]
            .as_array()
            .ok_or_else(|| AgentError::MalformedResponse("getTransaction: no accountKeys".into()))?;

        Ok(Some(
            keys.iter()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, rpc_method: &str, body: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_balance() {
        let server = MockServer::start().await;
        mount(
            &server,
            "getBalance",
            json!({ "jsonrpc": "2.0", "id": 1, "result": { "context": { "slot": 1 }, "value": 1_500_000_000u64 } }),
        )
        .await;

        let ledger = RpcLedger::new(&server.uri()).unwrap();
        assert_eq!(ledger.balance("wallet").await.unwrap(), 1_500_000_000);
    }

    #[tokio::test]
    async fn test_token_balance_sums_accounts() {
        let server = MockServer::start().await;
        let account = |amount: &str| {
            json!({ "pubkey": "acct", "account": { "data": { "parsed": { "info": { "tokenAmount": { "amount": amount, "decimals": 6 } } } } } })
        };
        mount(
            &server,
            "getTokenAccountsByOwner",
            json!({ "jsonrpc": "2.0", "id": 1, "result": { "value": [account("1000"), account("250")] } }),
        )
        .await;

        let ledger = RpcLedger::new(&server.uri()).unwrap();
        assert_eq!(ledger.token_balance("owner", "mint").await.unwrap(), 1250);
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let server = MockServer::start().await;
        mount(
            &server,
            "sendTransaction",
            json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32002, "message": "blockhash not found" } }),
        )
        .await;

        let ledger = RpcLedger::new(&server.uri()).unwrap();
        let err = ledger.send_transaction(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, AgentError::Rpc { code: -32002, .. }));
    }

    #[tokio::test]
    async fn test_missing_transaction_is_none() {
        let server = MockServer::start().await;
        mount(&server, "getTransaction", json!({ "jsonrpc": "2.0", "id": 1, "result": null })).await;

        let ledger = RpcLedger::new(&server.uri()).unwrap();
        assert_eq!(ledger.transaction_accounts("sig").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_transaction_accounts() {
        let server = MockServer::start().await;
        mount(
            &server,
            "getTransaction",
            json!({ "jsonrpc": "2.0", "id": 1, "result": { "slot": 9, "transaction": { "message": { "accountKeys": ["signer", "program"] } } } }),
        )
        .await;

        let ledger = RpcLedger::new(&server.uri()).unwrap();
        assert_eq!(
            ledger.transaction_accounts("sig").await.unwrap(),
            Some(vec!["signer".to_string(), "program".to_string()])
        );
    }

    #[tokio::test]
    async fn test_http_failure_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let ledger = RpcLedger::new(&server.uri()).unwrap();
        let err = ledger.latest_blockhash().await.unwrap_err();
        assert_eq!(err.tag(), "NET");
    }
}
