//! Lottery Engine - periodic payout to a random recent counterparty

use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::amount::{percent_of, short_address};
use crate::config::LotteryConfig;
use crate::counterparties::CounterpartyBook;
use crate::error::{AgentError, Result};
use crate::gateway::LedgerGateway;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    LowBalance(Decimal),
    NoAvailableFunds(Decimal),
    PrizeTooSmall(Decimal),
    NoCounterparties,
    WinnerWasSelf,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LowBalance(b) => write!(f, "low balance ({:.3} SOL)", b),
            SkipReason::NoAvailableFunds(b) => write!(f, "no available funds after gas ({:.4} SOL)", b),
            SkipReason::PrizeTooSmall(p) => write!(f, "prize too small ({:.6} SOL)", p),
            SkipReason::NoCounterparties => f.write_str("no recent traders yet"),
            SkipReason::WinnerWasSelf => f.write_str("winner was self, retrying next round"),
        }
    }
}

#[derive(Debug)]
pub enum DrawOutcome {
    Skipped(SkipReason),
    Paid {
        winner: String,
        prize: Decimal,
        signature: String,
    },
    Failed {
        winner: String,
        prize: Decimal,
        error: AgentError,
    },
}

pub struct LotteryEngine {
    config: LotteryConfig,
    gateway: Arc<LedgerGateway>,
    counterparties: CounterpartyBook,
}

impl LotteryEngine {
    pub fn new(config: LotteryConfig, gateway: Arc<LedgerGateway>, counterparties: CounterpartyBook) -> Self {
        Self {
            config,
            gateway,
            counterparties,
        }
    }

    /// First draw runs immediately, then one per interval
    pub async fn run(self) {
        info!(tag = "SYSTEM", "Lottery engine active (interval {}s)", self.config.interval.as_secs());

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.draw().await {
                Ok(DrawOutcome::Skipped(reason)) => info!(tag = "LOTTERY", "Skipping: {}", reason),
                Ok(DrawOutcome::Paid { winner, prize, signature }) => {
                    let short_sig: String = signature.chars().take(8).collect();
                    info!(tag = "WINNER", "Sent {:.4} SOL -> {} | Tx: {}", prize, short_address(&winner), short_sig);
                }
                Ok(DrawOutcome::Failed { winner, prize, error }) => {
                    warn!(tag = error.tag(), "Prize of {:.4} SOL to {} failed: {}", prize, short_address(&winner), error);
                }
                Err(e) => error!(tag = e.tag(), "Lottery: {}", e),
            }
        }
    }

    /// One draw. Never retried within the cycle.
    pub async fn draw(&self) -> Result<DrawOutcome> {
        let balance = self.gateway.balance().await?;
        if balance < self.config.min_balance {
            return Ok(DrawOutcome::Skipped(SkipReason::LowBalance(balance)));
        }

        let available = balance - self.config.gas_reserve;
        if available <= Decimal::ZERO {
            return Ok(DrawOutcome::Skipped(SkipReason::NoAvailableFunds(balance)));
        }

        let prize = percent_of(available, self.config.prize_pct).round_dp(9);
        if prize < self.config.min_prize {
            return Ok(DrawOutcome::Skipped(SkipReason::PrizeTooSmall(prize)));
        }

        let candidates = self.counterparties.len();
        let Some(winner) = self.counterparties.choose_random() else {
            return Ok(DrawOutcome::Skipped(SkipReason::NoCounterparties));
        };
        info!(tag = "LOTTERY", "Running draw... Prize: {:.4} SOL | Traders: {}", prize, candidates);

        if winner == self.gateway.address() {
            return Ok(DrawOutcome::Skipped(SkipReason::WinnerWasSelf));
        }
        info!(tag = "LOTTERY", "Winner selected: {}", short_address(&winner));

        Ok(match self.gateway.transfer(&winner, prize).await {
            Ok(signature) => DrawOutcome::Paid {
                winner,
                prize,
                signature,
            },
            Err(error) => DrawOutcome::Failed { winner, prize, error },
        })
    }
}
