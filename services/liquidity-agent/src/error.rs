//! Error taxonomy for the agent core

use rust_decimal::Decimal;
use thiserror::Error;

/// Failures a worker can observe while running one cycle or one signal.
///
/// None of these terminate a worker loop. Expected outcomes (insufficient
/// funds, cooldown) are modelled here so callers can log them with their own
/// tag, but the executor reports them as skips rather than errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("insufficient funds: {available} SOL available, need {required} SOL")]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("cooldown active: {remaining_ms}ms remaining")]
    Cooldown { remaining_ms: u64 },

    #[error("venue {pool} rejected request: {status} - {body}")]
    VenueRejected {
        pool: String,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Short tag used in log records for this failure class.
    pub fn tag(&self) -> &'static str {
        match self {
            AgentError::InsufficientFunds { .. } => "SKIP",
            AgentError::Cooldown { .. } => "COOLDOWN",
            AgentError::VenueRejected { .. } => "VENUE",
            AgentError::Network(_) | AgentError::Timeout(_) => "NET",
            AgentError::MalformedResponse(_) => "PARSE",
            AgentError::Rpc { .. } => "RPC",
            AgentError::InvalidAmount(_) => "AMOUNT",
            AgentError::Signing(_) => "SIGN",
            AgentError::Config(_) => "CONFIG",
        }
    }

    /// Whether a fallback venue may accept what this error rejected.
    pub fn is_venue_rejection(&self) -> bool {
        matches!(self, AgentError::VenueRejected { .. })
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AgentError::Timeout(e.to_string())
        } else if e.is_decode() {
            AgentError::MalformedResponse(e.to_string())
        } else {
            AgentError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::MalformedResponse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
