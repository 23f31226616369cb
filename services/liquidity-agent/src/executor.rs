//! Trade Executor - sole consumer of the signal queue
//!
//! Signals are handled one at a time, so at most one trade submission is in
//! flight. The executor owns the cooldown stamp and the pool selector, and is
//! the only writer of the shared position.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::amount::{from_raw_amount, percent_of, percent_of_raw};
use crate::config::ExecutionConfig;
use crate::error::{AgentError, Result};
use crate::gateway::LedgerGateway;
use crate::position::{random_hold_target, SharedPosition};
use crate::signal::{SignalReceiver, TradeAction, TradeSignal};
use crate::swap::{TradeProvider, TradeRequest};

/// Preferred venue plus an optional graduation fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSelector {
    current: String,
    fallback: Option<String>,
}

impl PoolSelector {
    pub fn new(primary: impl Into<String>, fallback: Option<String>) -> Self {
        Self {
            current: primary.into(),
            fallback,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Fallback venue, if one is configured and not already preferred
    pub fn fallback(&self) -> Option<&str> {
        self.fallback
            .as_deref()
            .filter(|pool| *pool != self.current.as_str())
    }

    /// The fallback accepted an order the current pool rejected
    fn graduate(&mut self) {
        if let Some(fallback) = self.fallback.clone() {
            self.current = fallback;
        }
    }
}

#[derive(Debug)]
pub enum TradeOutcome {
    Executed {
        action: TradeAction,
        signature: String,
        pool: String,
    },
    /// Expected skip: cooldown or insufficient funds
    Skipped(AgentError),
    NothingToSell,
}

impl TradeOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, TradeOutcome::Executed { .. })
    }
}

pub struct TradeExecutor {
    config: ExecutionConfig,
    token_mint: String,
    gateway: Arc<LedgerGateway>,
    provider: Arc<dyn TradeProvider>,
    position: SharedPosition,
    pools: PoolSelector,
    last_action: Option<Instant>,
}

impl TradeExecutor {
    pub fn new(
        config: ExecutionConfig,
        token_mint: &str,
        gateway: Arc<LedgerGateway>,
        provider: Arc<dyn TradeProvider>,
        position: SharedPosition,
    ) -> Self {
        let pools = PoolSelector::new(config.pool.clone(), config.fallback_pool.clone());
        Self {
            config,
            token_mint: token_mint.to_string(),
            gateway,
            provider,
            position,
            pools,
            last_action: None,
        }
    }

    pub fn pools(&self) -> &PoolSelector {
        &self.pools
    }

    pub fn last_action(&self) -> Option<Instant> {
        self.last_action
    }

    /// Drain the queue until every producer is gone
    pub async fn run(mut self, mut rx: SignalReceiver) {
        info!(tag = "SYSTEM", "Executor engine active (pool {})", self.pools.current());

        while let Some(signal) = rx.recv().await {
            match self.handle(&signal).await {
                Ok(TradeOutcome::Executed { action, signature, pool }) => {
                    info!(tag = "TX", "{} confirmed via {}: {}", action, pool, signature);
                }
                Ok(TradeOutcome::Skipped(reason)) => match reason {
                    AgentError::Cooldown { remaining_ms } => {
                        debug!(tag = "COOLDOWN", "Dropped {} ({}): {}ms left", signal.action, signal.reason, remaining_ms);
                    }
                    other => {
                        warn!(tag = "SKIP", "{} ({}) skipped: {}", signal.action, signal.reason, other);
                    }
                },
                Ok(TradeOutcome::NothingToSell) => {
                    warn!(tag = "WARN", "No tokens to sell ({})", signal.reason);
                }
                Err(e) => {
                    error!(tag = e.tag(), "{} ({}) failed: {}", signal.action, signal.reason, e);
                }
            }
        }

        warn!(tag = "SYSTEM", "Signal queue closed, executor stopping");
    }

    /// Attempt one signal. Expected skips are `Ok`; failures are dropped by the caller.
    pub async fn handle(&mut self, signal: &TradeSignal) -> Result<TradeOutcome> {
        let now = Instant::now();
        if let Some(remaining) = self.cooldown_remaining(now) {
            return Ok(TradeOutcome::Skipped(AgentError::Cooldown {
                remaining_ms: remaining.as_millis() as u64,
            }));
        }

        match signal.action {
            TradeAction::Buy => self.buy(&signal.reason, now).await,
            TradeAction::Sell => self.sell(&signal.reason, now).await,
        }
    }

    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_action?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.config.reaction_cooldown {
            Some(self.config.reaction_cooldown - elapsed)
        } else {
            None
        }
    }

    async fn buy(&mut self, reason: &str, now: Instant) -> Result<TradeOutcome> {
        let balance = self.gateway.balance().await?;
        let spendable = balance - self.config.gas_reserve;
        let amount = percent_of(spendable, self.config.buy_pct).round_dp(9);

        if amount < self.config.trigger_threshold {
            return Ok(TradeOutcome::Skipped(AgentError::InsufficientFunds {
                available: balance,
                required: self.config.trigger_threshold + self.config.gas_reserve,
            }));
        }

        info!(tag = "BUY", "{} | Amount: {:.3} SOL ({}%)", reason, amount, self.config.buy_pct);

        self.last_action = Some(now);
        let (signature, pool) = self.route(TradeAction::Buy, amount).await?;

        let hold = random_hold_target(self.config.hold_min, self.config.hold_max);
        self.position.open(Instant::now(), hold).await;
        info!(tag = "SUCCESS", "Accumulation entry. Holding for {}s", hold.as_secs());

        Ok(TradeOutcome::Executed {
            action: TradeAction::Buy,
            signature,
            pool,
        })
    }

    async fn sell(&mut self, reason: &str, now: Instant) -> Result<TradeOutcome> {
        let inventory = !self.position.snapshot().await.is_active();
        let kind = if inventory { "fee inventory" } else { "position" };
        info!(tag = "SELL", "{} | Dumping {}...", reason, kind);

        // dry-run has no real inventory to size against
        let amount = if self.gateway.is_dry_run() {
            Decimal::ZERO
        } else {
            let raw = self.gateway.token_balance(&self.token_mint).await?;
            let sell_raw = percent_of_raw(raw, self.config.sell_pct);
            if sell_raw == 0 {
                return Ok(TradeOutcome::NothingToSell);
            }
            from_raw_amount(sell_raw, self.config.token_decimals)?
        };

        self.last_action = Some(now);
        let (signature, pool) = self.route(TradeAction::Sell, amount).await?;

        if self.position.close().await {
            debug!(tag = "SELL", "Position closed");
        }
        info!(tag = "SUCCESS", "Dump complete");

        Ok(TradeOutcome::Executed {
            action: TradeAction::Sell,
            signature,
            pool,
        })
    }

    /// Request, sign and submit on the current pool, retrying once on the
    /// fallback if the current pool rejects the order.
    async fn route(&mut self, action: TradeAction, amount: Decimal) -> Result<(String, String)> {
        let mut request = TradeRequest {
            action,
            mint: self.token_mint.clone(),
            amount,
            payer: self.gateway.address(),
            slippage_pct: self.config.slippage_pct,
            priority_fee: self.config.priority_fee,
            pool: self.pools.current().to_string(),
        };

        if self.gateway.is_dry_run() {
            return Ok((self.gateway.simulated_signature(), request.pool));
        }

        match self.submit(&request).await {
            Ok(signature) => Ok((signature, request.pool)),
            Err(e) if e.is_venue_rejection() => {
                let Some(fallback) = self.pools.fallback().map(str::to_string) else {
                    return Err(e);
                };
                warn!(tag = "VENUE", "{} rejected ({}), retrying on {}", request.pool, e, fallback);

                request.pool = fallback.clone();
                let signature = self.submit(&request).await?;

                self.pools.graduate();
                info!(tag = "VENUE", "Graduation detected, preferred pool is now {}", fallback);
                Ok((signature, fallback))
            }
            Err(e) => Err(e),
        }
    }

    async fn submit(&self, request: &TradeRequest) -> Result<String> {
        let unsigned = self.provider.request_trade(request).await?;
        self.gateway.submit(&unsigned).await
    }
}
