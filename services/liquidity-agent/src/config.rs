//! Agent Configuration
//!
//! Raw [`Settings`] are read from the environment (optionally seeded from a
//! `.env` file) and validated into an [`AgentConfig`]. Validation failures are
//! fatal: the process does not start.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::amount::MAX_DECIMALS;
use crate::error::AgentError;

/// Trade stream with explicit sides, used when `WS_URL` is unset in explicit-side mode
pub const PUMPPORTAL_DATA_WS: &str = "wss://pumpportal.fun/api/data";

/// Upper bound for every interval, delay and timeout setting (one day)
pub const MAX_SETTING_SECS: u64 = 86_400;

/// Upper bound for SOL-denominated settings
const MAX_SOL_SETTING: f64 = 1_000_000_000.0;

/// Flat environment surface, one field per variable (lowercased)
#[derive(Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub worker_private_key: String,
    #[serde(default)]
    pub token_mint: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,

    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f64,
    #[serde(default = "default_gas_reserve")]
    pub gas_reserve: f64,
    #[serde(default = "default_priority_fee")]
    pub priority_fee: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_slippage")]
    pub slippage: u32,
    #[serde(default = "default_pct")]
    pub buy_pct: u32,
    #[serde(default = "default_pct")]
    pub sell_pct: u32,
    #[serde(default = "default_hold_time_min")]
    pub hold_time_min: u64,
    #[serde(default = "default_hold_time_max")]
    pub hold_time_max: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: u64,
    #[serde(default = "default_heartbeat_retry")]
    pub heartbeat_retry: u64,
    #[serde(default = "default_reaction_cooldown")]
    pub reaction_cooldown: f64,
    #[serde(default = "default_claim_interval")]
    pub claim_interval_seconds: u64,
    #[serde(default = "default_lottery_interval")]
    pub lottery_interval_seconds: u64,
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_trade_provider")]
    pub trade_provider: TradeProviderKind,
    #[serde(default)]
    pub solanatracker_api_key: String,
    #[serde(default = "default_pool")]
    pub pool: String,
    #[serde(default)]
    pub fallback_pool: Option<String>,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,

    #[serde(default = "default_sensor_mode")]
    pub sensor_mode: SensorMode,
    #[serde(default = "default_reaction_probability")]
    pub reaction_probability: f64,
    #[serde(default = "default_heuristic_buy_probability")]
    pub heuristic_buy_probability: f64,
    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    #[serde(default = "default_signer_lookup_min_delay")]
    pub signer_lookup_min_delay: u64,
    #[serde(default = "default_signer_lookup_max_delay")]
    pub signer_lookup_max_delay: u64,
    #[serde(default = "default_signer_lookup_concurrency")]
    pub signer_lookup_concurrency: usize,
    #[serde(default = "default_stream_connect_timeout_secs")]
    pub stream_connect_timeout_secs: u64,
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,

    #[serde(default = "default_fee_policy")]
    pub fee_policy: FeePolicyKind,
    #[serde(default)]
    pub dev_wallet: String,
    #[serde(default = "default_operator_share_pct")]
    pub operator_share_pct: u32,
    #[serde(default = "default_tax_pct")]
    pub tax_pct: u32,
    #[serde(default = "default_min_profit")]
    pub min_profit: f64,
    #[serde(default = "default_claim_pools")]
    pub claim_pools: String,
    #[serde(default = "default_claim_spacing_secs")]
    pub claim_spacing_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    #[serde(default)]
    pub log_journal_path: Option<String>,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_source(None)
    }

    /// Read settings from an explicit variable map (uppercase keys, as in the environment)
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, AgentError> {
        Self::from_source(Some(vars))
    }

    fn from_source(vars: Option<HashMap<String, String>>) -> Result<Self, AgentError> {
        let env = config::Environment::default()
            .try_parsing(true)
            .source(vars);

        config::Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| AgentError::Config(e.to_string()))
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("private_key", &"<redacted>")
            .field("worker_private_key", &"<redacted>")
            .field("token_mint", &self.token_mint)
            .field("rpc_url", &self.rpc_url)
            .field("trade_provider", &self.trade_provider)
            .field("sensor_mode", &self.sensor_mode)
            .field("fee_policy", &self.fee_policy)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TradeProviderKind {
    Pumpportal,
    SolanaTracker,
}

/// How the market sensor learns the side of an observed trade
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SensorMode {
    /// Ledger log stream; side is guessed from log contents
    LogHeuristic,
    /// Trade stream whose events carry an explicit side and trader
    ExplicitSide,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FeePolicyKind {
    ClaimThenSplit,
    ClaimThenConsolidate,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Validated agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub token_mint: String,
    pub rpc_url: String,
    pub ws_url: String,
    pub dry_run: bool,
    pub execution: ExecutionConfig,
    pub heartbeat: HeartbeatConfig,
    pub sensor: SensorConfig,
    pub fees: FeeConfig,
    pub lottery: LotteryConfig,
    pub provider: ProviderConfig,
    pub logging: LoggingConfig,
}

/// Trade executor parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub trigger_threshold: Decimal,
    pub gas_reserve: Decimal,
    pub priority_fee: Decimal,
    /// Slippage in percent
    pub slippage_pct: u32,
    pub buy_pct: u32,
    pub sell_pct: u32,
    pub hold_min: Duration,
    pub hold_max: Duration,
    pub reaction_cooldown: Duration,
    pub pool: String,
    pub fallback_pool: Option<String>,
    pub token_decimals: u8,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: decimal(default_trigger_threshold()),
            gas_reserve: decimal(default_gas_reserve()),
            priority_fee: decimal(default_priority_fee()),
            slippage_pct: default_slippage(),
            buy_pct: default_pct(),
            sell_pct: default_pct(),
            hold_min: Duration::from_secs(default_hold_time_min()),
            hold_max: Duration::from_secs(default_hold_time_max()),
            reaction_cooldown: Duration::from_secs_f64(default_reaction_cooldown()),
            pool: default_pool(),
            fallback_pool: None,
            token_decimals: default_token_decimals(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatConfig {
    pub poll_interval: Duration,
    pub silence_timeout: Duration,
    pub retry_after: Duration,
    pub monitor_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(default_poll_interval()),
            silence_timeout: Duration::from_secs(default_heartbeat_timeout()),
            retry_after: Duration::from_secs(default_heartbeat_retry()),
            monitor_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    pub mode: SensorMode,
    pub reaction_probability: f64,
    pub heuristic_buy_probability: f64,
    pub backoff: BackoffConfig,
    pub lookup_delay_min: Duration,
    pub lookup_delay_max: Duration,
    pub lookup_concurrency: usize,
    pub connect_timeout: Duration,
    /// Silence on an open stream before it is probed with a ping
    pub idle_timeout: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            mode: default_sensor_mode(),
            reaction_probability: default_reaction_probability(),
            heuristic_buy_probability: default_heuristic_buy_probability(),
            backoff: BackoffConfig::default(),
            lookup_delay_min: Duration::from_secs(default_signer_lookup_min_delay()),
            lookup_delay_max: Duration::from_secs(default_signer_lookup_max_delay()),
            lookup_concurrency: default_signer_lookup_concurrency(),
            connect_timeout: Duration::from_secs(default_stream_connect_timeout_secs()),
            idle_timeout: Duration::from_secs(default_stream_idle_timeout_secs()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub kind: BackoffKind,
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: default_backoff(),
            base: Duration::from_secs(default_backoff_base_secs()),
            max: Duration::from_secs(default_backoff_max_secs()),
        }
    }
}

/// Fee consolidation policy with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum FeePolicy {
    /// Claim once, then forward a share of realized profit to `recipient`
    ClaimThenSplit {
        recipient: String,
        tax_pct: u32,
        min_profit: Decimal,
    },
    /// Claim from every venue, then split the transferable balance
    ClaimThenConsolidate {
        operator: String,
        operator_share_pct: u32,
        min_transfer: Decimal,
        dust: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeConfig {
    pub policy: FeePolicy,
    pub interval: Duration,
    pub claim_pools: Vec<String>,
    pub claim_spacing: Duration,
    pub gas_reserve: Decimal,
    pub claim_priority_fee: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LotteryConfig {
    pub interval: Duration,
    pub min_balance: Decimal,
    pub gas_reserve: Decimal,
    /// Fraction of available balance paid out, in percent
    pub prize_pct: u32,
    pub min_prize: Decimal,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(default_lottery_interval()),
            min_balance: Decimal::new(2, 2),
            gas_reserve: decimal(default_gas_reserve()),
            prize_pct: 10,
            min_prize: Decimal::new(1, 4),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: TradeProviderKind,
    pub solanatracker_api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub journal_path: Option<String>,
}

/// Wallet secrets kept apart from the rest of the config so they never reach a log line
#[derive(Clone)]
pub struct WalletSecrets {
    pub creator: String,
    pub worker: String,
}

impl fmt::Debug for WalletSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletSecrets(<redacted>)")
    }
}

impl AgentConfig {
    /// Validate raw settings. Any error here is fatal at startup.
    pub fn from_settings(s: Settings) -> Result<(Self, WalletSecrets), AgentError> {
        require("PRIVATE_KEY", &s.private_key)?;
        require("WORKER_PRIVATE_KEY", &s.worker_private_key)?;
        require("TOKEN_MINT", &s.token_mint)?;
        require("RPC_URL", &s.rpc_url)?;
        require("DEV_WALLET", &s.dev_wallet)?;

        check_pct("BUY_PCT", s.buy_pct)?;
        check_pct("SELL_PCT", s.sell_pct)?;
        check_pct("SLIPPAGE", s.slippage)?;
        check_pct("OPERATOR_SHARE_PCT", s.operator_share_pct)?;
        check_pct("TAX_PCT", s.tax_pct)?;
        check_probability("REACTION_PROBABILITY", s.reaction_probability)?;
        check_probability("HEURISTIC_BUY_PROBABILITY", s.heuristic_buy_probability)?;

        for (name, value) in [
            ("TRIGGER_THRESHOLD", s.trigger_threshold),
            ("GAS_RESERVE", s.gas_reserve),
            ("PRIORITY_FEE", s.priority_fee),
            ("REACTION_COOLDOWN", s.reaction_cooldown),
            ("MIN_PROFIT", s.min_profit),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AgentError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("TRIGGER_THRESHOLD", s.trigger_threshold),
            ("GAS_RESERVE", s.gas_reserve),
            ("PRIORITY_FEE", s.priority_fee),
            ("MIN_PROFIT", s.min_profit),
        ] {
            if value > MAX_SOL_SETTING {
                return Err(AgentError::Config(format!(
                    "{} must be at most {} SOL, got {}",
                    name, MAX_SOL_SETTING, value
                )));
            }
        }
        if s.reaction_cooldown > MAX_SETTING_SECS as f64 {
            return Err(AgentError::Config(format!(
                "REACTION_COOLDOWN must be at most {}s, got {}",
                MAX_SETTING_SECS, s.reaction_cooldown
            )));
        }

        for (name, value) in [
            ("POLL_INTERVAL", s.poll_interval),
            ("HEARTBEAT_TIMEOUT", s.heartbeat_timeout),
            ("CLAIM_INTERVAL_SECONDS", s.claim_interval_seconds),
            ("LOTTERY_INTERVAL_SECONDS", s.lottery_interval_seconds),
            ("BACKOFF_BASE_SECS", s.backoff_base_secs),
            ("STREAM_CONNECT_TIMEOUT_SECS", s.stream_connect_timeout_secs),
            ("STREAM_IDLE_TIMEOUT_SECS", s.stream_idle_timeout_secs),
        ] {
            if value == 0 {
                return Err(AgentError::Config(format!("{} must be positive", name)));
            }
        }

        for (name, value) in [
            ("POLL_INTERVAL", s.poll_interval),
            ("HEARTBEAT_TIMEOUT", s.heartbeat_timeout),
            ("HEARTBEAT_RETRY", s.heartbeat_retry),
            ("HOLD_TIME_MAX", s.hold_time_max),
            ("CLAIM_INTERVAL_SECONDS", s.claim_interval_seconds),
            ("CLAIM_SPACING_SECS", s.claim_spacing_secs),
            ("LOTTERY_INTERVAL_SECONDS", s.lottery_interval_seconds),
            ("BACKOFF_MAX_SECS", s.backoff_max_secs),
            ("SIGNER_LOOKUP_MAX_DELAY", s.signer_lookup_max_delay),
            ("STREAM_CONNECT_TIMEOUT_SECS", s.stream_connect_timeout_secs),
            ("STREAM_IDLE_TIMEOUT_SECS", s.stream_idle_timeout_secs),
        ] {
            if value > MAX_SETTING_SECS {
                return Err(AgentError::Config(format!(
                    "{} must be at most {}s, got {}",
                    name, MAX_SETTING_SECS, value
                )));
            }
        }

        if s.token_decimals > MAX_DECIMALS {
            return Err(AgentError::Config(format!(
                "TOKEN_DECIMALS must be at most {}, got {}",
                MAX_DECIMALS, s.token_decimals
            )));
        }

        if s.hold_time_min > s.hold_time_max {
            return Err(AgentError::Config(format!(
                "HOLD_TIME_MIN ({}) exceeds HOLD_TIME_MAX ({})",
                s.hold_time_min, s.hold_time_max
            )));
        }
        if s.backoff_base_secs > s.backoff_max_secs {
            return Err(AgentError::Config(format!(
                "BACKOFF_BASE_SECS ({}) exceeds BACKOFF_MAX_SECS ({})",
                s.backoff_base_secs, s.backoff_max_secs
            )));
        }
        if s.signer_lookup_min_delay > s.signer_lookup_max_delay {
            return Err(AgentError::Config(
                "SIGNER_LOOKUP_MIN_DELAY exceeds SIGNER_LOOKUP_MAX_DELAY".to_string(),
            ));
        }
        if s.signer_lookup_concurrency == 0 {
            return Err(AgentError::Config(
                "SIGNER_LOOKUP_CONCURRENCY must be positive".to_string(),
            ));
        }
        if s.trade_provider == TradeProviderKind::SolanaTracker
            && s.solanatracker_api_key.trim().is_empty()
        {
            return Err(AgentError::Config(
                "SOLANATRACKER_API_KEY is required when TRADE_PROVIDER=solana-tracker".to_string(),
            ));
        }

        let claim_pools: Vec<String> = s
            .claim_pools
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if claim_pools.is_empty() {
            return Err(AgentError::Config("CLAIM_POOLS must name at least one pool".to_string()));
        }

        let ws_url = s
            .ws_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| match s.sensor_mode {
                SensorMode::LogHeuristic => derive_ws_url(&s.rpc_url),
                SensorMode::ExplicitSide => PUMPPORTAL_DATA_WS.to_string(),
            });

        let gas_reserve = decimal(s.gas_reserve);

        let policy = match s.fee_policy {
            FeePolicyKind::ClaimThenSplit => FeePolicy::ClaimThenSplit {
                recipient: s.dev_wallet.trim().to_string(),
                tax_pct: s.tax_pct,
                min_profit: decimal(s.min_profit),
            },
            FeePolicyKind::ClaimThenConsolidate => FeePolicy::ClaimThenConsolidate {
                operator: s.dev_wallet.trim().to_string(),
                operator_share_pct: s.operator_share_pct,
                min_transfer: Decimal::new(5, 3),
                dust: Decimal::new(1, 3),
            },
        };

        let config = AgentConfig {
            token_mint: s.token_mint.trim().to_string(),
            rpc_url: s.rpc_url.trim().to_string(),
            ws_url,
            dry_run: s.dry_run,
            execution: ExecutionConfig {
                trigger_threshold: decimal(s.trigger_threshold),
                gas_reserve,
                priority_fee: decimal(s.priority_fee),
                slippage_pct: s.slippage,
                buy_pct: s.buy_pct,
                sell_pct: s.sell_pct,
                hold_min: Duration::from_secs(s.hold_time_min),
                hold_max: Duration::from_secs(s.hold_time_max),
                reaction_cooldown: Duration::from_secs_f64(s.reaction_cooldown),
                pool: s.pool.clone(),
                fallback_pool: s.fallback_pool.clone().filter(|p| !p.trim().is_empty()),
                token_decimals: s.token_decimals,
            },
            heartbeat: HeartbeatConfig {
                poll_interval: Duration::from_secs(s.poll_interval),
                silence_timeout: Duration::from_secs(s.heartbeat_timeout),
                retry_after: Duration::from_secs(s.heartbeat_retry),
                monitor_interval: Duration::from_secs(10),
            },
            sensor: SensorConfig {
                mode: s.sensor_mode,
                reaction_probability: s.reaction_probability,
                heuristic_buy_probability: s.heuristic_buy_probability,
                backoff: BackoffConfig {
                    kind: s.backoff,
                    base: Duration::from_secs(s.backoff_base_secs),
                    max: Duration::from_secs(s.backoff_max_secs),
                },
                lookup_delay_min: Duration::from_secs(s.signer_lookup_min_delay),
                lookup_delay_max: Duration::from_secs(s.signer_lookup_max_delay),
                lookup_concurrency: s.signer_lookup_concurrency,
                connect_timeout: Duration::from_secs(s.stream_connect_timeout_secs),
                idle_timeout: Duration::from_secs(s.stream_idle_timeout_secs),
            },
            fees: FeeConfig {
                policy,
                interval: Duration::from_secs(s.claim_interval_seconds),
                claim_pools,
                claim_spacing: Duration::from_secs(s.claim_spacing_secs),
                gas_reserve,
                claim_priority_fee: Decimal::new(1, 6),
            },
            lottery: LotteryConfig {
                interval: Duration::from_secs(s.lottery_interval_seconds),
                gas_reserve,
                ..LotteryConfig::default()
            },
            provider: ProviderConfig {
                kind: s.trade_provider,
                solanatracker_api_key: s.solanatracker_api_key.trim().to_string(),
            },
            logging: LoggingConfig {
                level: s.log_level.clone(),
                format: s.log_format,
                journal_path: s.log_journal_path.clone().filter(|p| !p.trim().is_empty()),
            },
        };

        let secrets = WalletSecrets {
            creator: s.private_key.trim().to_string(),
            worker: s.worker_private_key.trim().to_string(),
        };

        Ok((config, secrets))
    }
}

/// `https://host` -> `wss://host`, `http://host` -> `ws://host`
pub fn derive_ws_url(rpc_url: &str) -> String {
    let trimmed = rpc_url.trim();
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        trimmed.to_string()
    }
}

fn require(name: &str, value: &str) -> Result<(), AgentError> {
    if value.trim().is_empty() {
        Err(AgentError::Config(format!("missing required setting {}", name)))
    } else {
        Ok(())
    }
}

fn check_pct(name: &str, value: u32) -> Result<(), AgentError> {
    if value == 0 || value > 100 {
        Err(AgentError::Config(format!(
            "{} must be within 1..=100, got {}",
            name, value
        )))
    } else {
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), AgentError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AgentError::Config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

/// f64 settings are converted once validated as finite and bounded
fn decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(9).normalize())
        .unwrap_or_default()
}

fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_trigger_threshold() -> f64 { 0.5 }
fn default_gas_reserve() -> f64 { 0.02 }
fn default_priority_fee() -> f64 { 0.005 }
fn default_poll_interval() -> u64 { 1 }
fn default_slippage() -> u32 { 15 }
fn default_pct() -> u32 { 100 }
fn default_hold_time_min() -> u64 { 45 }
fn default_hold_time_max() -> u64 { 90 }
fn default_heartbeat_timeout() -> u64 { 120 }
fn default_heartbeat_retry() -> u64 { 30 }
fn default_reaction_cooldown() -> f64 { 2.0 }
fn default_claim_interval() -> u64 { 30 }
fn default_lottery_interval() -> u64 { 60 }
fn default_trade_provider() -> TradeProviderKind { TradeProviderKind::Pumpportal }
fn default_pool() -> String { "pump".to_string() }
fn default_token_decimals() -> u8 { 6 }
fn default_sensor_mode() -> SensorMode { SensorMode::LogHeuristic }
fn default_reaction_probability() -> f64 { 0.8 }
fn default_heuristic_buy_probability() -> f64 { 0.5 }
fn default_backoff() -> BackoffKind { BackoffKind::Exponential }
fn default_backoff_base_secs() -> u64 { 5 }
fn default_backoff_max_secs() -> u64 { 60 }
fn default_signer_lookup_min_delay() -> u64 { 2 }
fn default_signer_lookup_max_delay() -> u64 { 10 }
fn default_signer_lookup_concurrency() -> usize { 8 }
fn default_stream_connect_timeout_secs() -> u64 { 10 }
fn default_stream_idle_timeout_secs() -> u64 { 60 }
fn default_fee_policy() -> FeePolicyKind { FeePolicyKind::ClaimThenConsolidate }
fn default_operator_share_pct() -> u32 { 75 }
fn default_tax_pct() -> u32 { 10 }
fn default_min_profit() -> f64 { 0.001 }
fn default_claim_pools() -> String { "meteora-dbc,pump".to_string() }
fn default_claim_spacing_secs() -> u64 { 2 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> LogFormat { LogFormat::Compact }

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("PRIVATE_KEY".to_string(), "creator-secret".to_string());
        vars.insert("WORKER_PRIVATE_KEY".to_string(), "worker-secret".to_string());
        vars.insert("TOKEN_MINT".to_string(), "Mint111111111111111111111111111111111111pump".to_string());
        vars.insert("DEV_WALLET".to_string(), "3CNH1A7NDRCJZ28y1Zm7cPhRuhgEMeKsBSs97Ez1gYwx".to_string());
        vars
    }

    #[test]
    fn test_defaults_from_minimal_env() {
        let settings = Settings::from_map(base_vars()).unwrap();
        let (config, secrets) = AgentConfig::from_settings(settings).unwrap();

        assert_eq!(config.execution.trigger_threshold, Decimal::new(5, 1));
        assert_eq!(config.execution.gas_reserve, Decimal::new(2, 2));
        assert_eq!(config.execution.buy_pct, 100);
        assert_eq!(config.execution.hold_min, Duration::from_secs(45));
        assert_eq!(config.execution.hold_max, Duration::from_secs(90));
        assert_eq!(config.execution.reaction_cooldown, Duration::from_secs(2));
        assert_eq!(config.heartbeat.silence_timeout, Duration::from_secs(120));
        assert_eq!(config.fees.interval, Duration::from_secs(30));
        assert_eq!(config.fees.claim_pools, vec!["meteora-dbc", "pump"]);
        assert_eq!(config.ws_url, "wss://api.mainnet-beta.solana.com");
        assert!(!config.dry_run);
        assert_eq!(secrets.worker, "worker-secret");
        assert!(matches!(
            config.fees.policy,
            FeePolicy::ClaimThenConsolidate { operator_share_pct: 75, .. }
        ));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let mut vars = base_vars();
        vars.insert("DRY_RUN".to_string(), "true".to_string());
        vars.insert("BUY_PCT".to_string(), "50".to_string());
        vars.insert("REACTION_COOLDOWN".to_string(), "3.5".to_string());
        vars.insert("SENSOR_MODE".to_string(), "explicit-side".to_string());
        vars.insert("BACKOFF".to_string(), "fixed".to_string());
        vars.insert("FEE_POLICY".to_string(), "claim-then-split".to_string());
        vars.insert("FALLBACK_POOL".to_string(), "raydium".to_string());

        let (config, _) = AgentConfig::from_settings(Settings::from_map(vars).unwrap()).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.execution.buy_pct, 50);
        assert_eq!(config.execution.reaction_cooldown, Duration::from_millis(3500));
        assert_eq!(config.sensor.mode, SensorMode::ExplicitSide);
        assert_eq!(config.ws_url, PUMPPORTAL_DATA_WS);
        assert_eq!(config.sensor.backoff.kind, BackoffKind::Fixed);
        assert_eq!(config.execution.fallback_pool.as_deref(), Some("raydium"));
        assert!(matches!(
            config.fees.policy,
            FeePolicy::ClaimThenSplit { tax_pct: 10, .. }
        ));
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let mut vars = base_vars();
        vars.remove("TOKEN_MINT");
        let err = AgentConfig::from_settings(Settings::from_map(vars).unwrap()).unwrap_err();
        assert!(err.to_string().contains("TOKEN_MINT"));
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        let mut vars = base_vars();
        vars.insert("HOLD_TIME_MIN".to_string(), "100".to_string());
        vars.insert("HOLD_TIME_MAX".to_string(), "50".to_string());
        assert!(AgentConfig::from_settings(Settings::from_map(vars).unwrap()).is_err());

        let mut vars = base_vars();
        vars.insert("BUY_PCT".to_string(), "0".to_string());
        assert!(AgentConfig::from_settings(Settings::from_map(vars).unwrap()).is_err());

        let mut vars = base_vars();
        vars.insert("REACTION_PROBABILITY".to_string(), "1.5".to_string());
        assert!(AgentConfig::from_settings(Settings::from_map(vars).unwrap()).is_err());

        let mut vars = base_vars();
        vars.insert("TRADE_PROVIDER".to_string(), "solana-tracker".to_string());
        assert!(AgentConfig::from_settings(Settings::from_map(vars).unwrap()).is_err());
    }

    fn rejects(key: &str, value: &str) -> bool {
        let mut vars = base_vars();
        vars.insert(key.to_string(), value.to_string());
        match Settings::from_map(vars) {
            Ok(settings) => AgentConfig::from_settings(settings).is_err(),
            Err(_) => true,
        }
    }

    #[test]
    fn test_token_decimals_bounded() {
        assert!(rejects("TOKEN_DECIMALS", "25"));
        assert!(rejects("TOKEN_DECIMALS", "20"));
        assert!(!rejects("TOKEN_DECIMALS", "19"));
        assert!(!rejects("TOKEN_DECIMALS", "9"));
    }

    #[test]
    fn test_durations_bounded() {
        assert!(rejects("BACKOFF_MAX_SECS", "18446744073709551615"));
        assert!(rejects("CLAIM_INTERVAL_SECONDS", "18446744073709551615"));
        assert!(rejects("HOLD_TIME_MAX", "86401"));
        assert!(rejects("STREAM_IDLE_TIMEOUT_SECS", "0"));
        assert!(!rejects("BACKOFF_MAX_SECS", "86400"));
    }

    #[test]
    fn test_reaction_cooldown_bounded() {
        assert!(rejects("REACTION_COOLDOWN", "1e300"));
        assert!(rejects("REACTION_COOLDOWN", "86400.5"));
        assert!(!rejects("REACTION_COOLDOWN", "0.25"));
    }

    #[test]
    fn test_sol_settings_bounded() {
        assert!(rejects("GAS_RESERVE", "1e30"));
        assert!(rejects("TRIGGER_THRESHOLD", "5000000000"));
        assert!(!rejects("TRIGGER_THRESHOLD", "2.5"));
    }

    #[test]
    fn test_unknown_enum_value_is_fatal() {
        let mut vars = base_vars();
        vars.insert("FEE_POLICY".to_string(), "keep-everything".to_string());
        assert!(Settings::from_map(vars).is_err());
    }

    #[test]
    fn test_derive_ws_url() {
        assert_eq!(derive_ws_url("https://rpc.example.com/key"), "wss://rpc.example.com/key");
        assert_eq!(derive_ws_url("http://127.0.0.1:8899"), "ws://127.0.0.1:8899");
        assert_eq!(derive_ws_url("wss://already"), "wss://already");
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let settings = Settings::from_map(base_vars()).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("creator-secret"));
        let (_, secrets) = AgentConfig::from_settings(settings).unwrap();
        assert_eq!(format!("{:?}", secrets), "WalletSecrets(<redacted>)");
    }
}
