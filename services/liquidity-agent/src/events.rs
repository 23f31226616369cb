//! Market event stream messages

use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SensorMode;
use crate::error::Result;
use crate::signal::TradeAction;

/// One observed event on the tracked asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketEvent {
    /// `None` for events that are not trades (create, migration)
    pub side: Option<TradeAction>,
    /// Initiating party, when the stream reports it
    pub trader: Option<String>,
    /// Confirmable transaction reference
    pub signature: Option<String>,
}

/// Subscription request sent right after the stream opens
pub fn subscribe_request(mode: SensorMode, mint: &str) -> String {
    match mode {
        SensorMode::LogHeuristic => json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [mint] },
                { "commitment": "confirmed" }
            ]
        }),
        SensorMode::ExplicitSide => json!({
            "method": "subscribeTokenTrade",
            "keys": [mint]
        }),
    }
    .to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeMessage {
    tx_type: String,
    trader_public_key: Option<String>,
    signature: Option<String>,
}

/// Parse one text frame. Subscription acks and other control frames yield `None`.
pub fn parse_message<R: Rng + ?Sized>(
    mode: SensorMode,
    text: &str,
    heuristic_buy_probability: f64,
    rng: &mut R,
) -> Result<Option<MarketEvent>> {
    let value: Value = serde_json::from_str(text)?;
    match mode {
        SensorMode::LogHeuristic => Ok(parse_logs_notification(&value, heuristic_buy_probability, rng)),
        SensorMode::ExplicitSide => parse_trade(value),
    }
}

fn parse_logs_notification<R: Rng + ?Sized>(
    value: &Value,
    buy_probability: f64,
    rng: &mut R,
) -> Option<MarketEvent> {
    let notification = value.get("params")?.get("result")?.get("value")?;

    let logs: Vec<&str> = notification
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| logs.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let signature = notification
        .get("signature")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(MarketEvent {
        side: Some(classify_logs(&logs, buy_probability, rng)),
        trader: None,
        signature,
    })
}

/// Log streams carry no side; a transfer-bearing log reads as a buy with
/// probability `buy_probability`, anything else as a sell.
pub fn classify_logs<R: Rng + ?Sized>(logs: &[&str], buy_probability: f64, rng: &mut R) -> TradeAction {
    let has_transfer = logs.iter().any(|l| l.contains("Transfer"));
    if has_transfer && rng.gen_bool(buy_probability.clamp(0.0, 1.0)) {
        TradeAction::Buy
    } else {
        TradeAction::Sell
    }
}

fn parse_trade(value: Value) -> Result<Option<MarketEvent>> {
    if value.get("txType").is_none() {
        return Ok(None);
    }
    let trade: TradeMessage = serde_json::from_value(value)?;
    let side = match trade.tx_type.as_str() {
        "buy" => Some(TradeAction::Buy),
        "sell" => Some(TradeAction::Sell),
        _ => None,
    };
    Ok(Some(MarketEvent {
        side,
        trader: trade.trader_public_key.filter(|t| !t.is_empty()),
        signature: trade.signature.filter(|s| !s.is_empty()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_subscribe_requests() {
        let logs: Value = serde_json::from_str(&subscribe_request(SensorMode::LogHeuristic, "Mint")).unwrap();
        assert_eq!(logs["method"], "logsSubscribe");
        assert_eq!(logs["params"][0]["mentions"][0], "Mint");

        let trades: Value = serde_json::from_str(&subscribe_request(SensorMode::ExplicitSide, "Mint")).unwrap();
        assert_eq!(trades["method"], "subscribeTokenTrade");
        assert_eq!(trades["keys"][0], "Mint");
    }

    #[test]
    fn test_logs_notification() {
        let text = r#"{"jsonrpc":"2.0","method":"logsNotification","params":{"result":{"context":{"slot":5},"value":{"signature":"5sig","err":null,"logs":["Program log: Instruction: TransferChecked"]}},"subscription":3}}"#;

        let event = parse_message(SensorMode::LogHeuristic, text, 1.0, &mut rng()).unwrap().unwrap();
        assert_eq!(event.side, Some(TradeAction::Buy));
        assert_eq!(event.signature.as_deref(), Some("5sig"));
        assert!(event.trader.is_none());

        let event = parse_message(SensorMode::LogHeuristic, text, 0.0, &mut rng()).unwrap().unwrap();
        assert_eq!(event.side, Some(TradeAction::Sell));
    }

    #[test]
    fn test_logs_without_transfer_read_as_sell() {
        assert_eq!(classify_logs(&["Program log: Instruction: Swap"], 1.0, &mut rng()), TradeAction::Sell);
    }

    #[test]
    fn test_subscription_ack_is_ignored() {
        let ack = r#"{"jsonrpc":"2.0","result":42,"id":1}"#;
        assert!(parse_message(SensorMode::LogHeuristic, ack, 0.5, &mut rng()).unwrap().is_none());

        let ack = r#"{"message":"Successfully subscribed to keys."}"#;
        assert!(parse_message(SensorMode::ExplicitSide, ack, 0.5, &mut rng()).unwrap().is_none());
    }

    #[test]
    fn test_explicit_trade() {
        let text = r#"{"signature":"4sig","mint":"Mint","traderPublicKey":"Trader1","txType":"sell","tokenAmount":1000,"solAmount":0.2}"#;
        let event = parse_message(SensorMode::ExplicitSide, text, 0.5, &mut rng()).unwrap().unwrap();
        assert_eq!(event.side, Some(TradeAction::Sell));
        assert_eq!(event.trader.as_deref(), Some("Trader1"));
        assert_eq!(event.signature.as_deref(), Some("4sig"));

        // still an event so the activity clock moves, but with no side
        let create = r#"{"signature":"s","traderPublicKey":"T","txType":"create"}"#;
        let event = parse_message(SensorMode::ExplicitSide, create, 0.5, &mut rng()).unwrap().unwrap();
        assert!(event.side.is_none());
        assert_eq!(event.trader.as_deref(), Some("T"));
    }

    #[test]
    fn test_malformed_frame() {
        let err = parse_message(SensorMode::ExplicitSide, "{not json", 0.5, &mut rng()).unwrap_err();
        assert_eq!(err.tag(), "PARSE");
    }
}
