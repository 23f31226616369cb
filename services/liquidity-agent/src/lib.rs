//! Liquidity Agent Library
//!
//! Autonomous single-asset liquidity agent: a cooldown-gated trade executor
//! fed by market and heartbeat signals, plus fee consolidation and a reward
//! lottery over recent counterparties.

pub mod amount;
pub mod backoff;
pub mod config;
pub mod consolidator;
pub mod counterparties;
pub mod error;
pub mod events;
pub mod executor;
pub mod gateway;
pub mod heartbeat;
pub mod journal;
pub mod ledger;
pub mod lottery;
pub mod position;
pub mod runner;
pub mod sensor;
pub mod signal;
pub mod swap;
pub mod telemetry;
pub mod wallet;


// Re-export main types for convenience
pub use config::{AgentConfig, FeePolicy, SensorMode, Settings, WalletSecrets};
pub use error::{AgentError, Result};
pub use executor::{PoolSelector, TradeExecutor, TradeOutcome};
pub use gateway::LedgerGateway;
pub use ledger::{LedgerRpc, RpcLedger};
pub use runner::AgentRunner;
pub use signal::{signal_queue, TradeAction, TradeSignal};
pub use swap::{FeeClaimProvider, PumpPortalClient, SolanaTrackerClient, TradeProvider};
pub use wallet::{KeypairSigner, TxSigner};
