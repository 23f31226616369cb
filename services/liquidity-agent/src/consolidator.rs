//! Fee Consolidator
//!
//! Claims accrued creator fees on a fixed interval and redistributes the
//! creator wallet's balance according to the configured [`FeePolicy`].
//! Every claim and every transfer is independent and best-effort.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::amount::{percent_of, short_address};
use crate::config::{FeeConfig, FeePolicy};
use crate::error::Result;
use crate::gateway::LedgerGateway;
use crate::swap::{FeeClaimProvider, FeeClaimRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub to: String,
    pub amount: Decimal,
    /// `None` if the transfer failed
    pub signature: Option<String>,
}

/// What one cycle did
#[derive(Debug, Default)]
pub struct CycleReport {
    pub claimed: Vec<String>,
    pub failed_claims: Vec<String>,
    pub profit: Option<Decimal>,
    pub transfers: Vec<TransferRecord>,
}

pub struct FeeConsolidator {
    config: FeeConfig,
    token_mint: String,
    creator: Arc<LedgerGateway>,
    claims: Arc<dyn FeeClaimProvider>,
    worker_address: String,
}

impl FeeConsolidator {
    pub fn new(
        config: FeeConfig,
        token_mint: &str,
        creator: Arc<LedgerGateway>,
        claims: Arc<dyn FeeClaimProvider>,
        worker_address: &str,
    ) -> Self {
        Self {
            config,
            token_mint: token_mint.to_string(),
            creator,
            claims,
            worker_address: worker_address.to_string(),
        }
    }

    pub async fn run(self) {
        info!(
            tag = "SYSTEM",
            "Consolidator active ({}) every {}s, worker {}",
            self.policy_name(),
            self.config.interval.as_secs(),
            short_address(&self.worker_address)
        );

        // first cycle one interval after startup
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.creator.is_dry_run() {
                debug!(tag = "CLAIM", "Dry run, consolidation cycle skipped");
                continue;
            }
            if let Err(e) = self.run_cycle().await {
                error!(tag = e.tag(), "Consolidator: {}", e);
            }
        }
    }

    pub fn policy_name(&self) -> &'static str {
        match self.config.policy {
            FeePolicy::ClaimThenSplit { .. } => "claim-then-split",
            FeePolicy::ClaimThenConsolidate { .. } => "claim-then-consolidate",
        }
    }

    /// One full cycle under the configured policy
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        match &self.config.policy {
            FeePolicy::ClaimThenSplit {
                recipient,
                tax_pct,
                min_profit,
            } => self.claim_then_split(recipient, *tax_pct, *min_profit).await,
            FeePolicy::ClaimThenConsolidate {
                operator,
                operator_share_pct,
                min_transfer,
                dust,
            } => {
                self.claim_then_consolidate(operator, *operator_share_pct, *min_transfer, *dust)
                    .await
            }
        }
    }

    async fn claim_then_split(
        &self,
        recipient: &str,
        tax_pct: u32,
        min_profit: Decimal,
    ) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let pool = match self.config.claim_pools.first() {
            Some(pool) => pool.clone(),
            None => return Ok(report),
        };

        let before = self.creator.balance().await?;
        if !self.try_claim(&pool, &mut report).await {
            return Ok(report);
        }
        self.pause().await;
        let after = self.creator.balance().await?;

        let profit = after - before;
        report.profit = Some(profit);
        info!(tag = "CLAIM", "Claim settled, realized {:.6} SOL", profit);

        if profit > min_profit {
            let share = percent_of(profit, tax_pct).round_dp(9);
            // recorded on-ledger only
            let signature = self.creator.transfer(recipient, share).await.ok();
            report.transfers.push(TransferRecord {
                to: recipient.to_string(),
                amount: share,
                signature,
            });
        }

        Ok(report)
    }

    async fn claim_then_consolidate(
        &self,
        operator: &str,
        operator_share_pct: u32,
        min_transfer: Decimal,
        dust: Decimal,
    ) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        for (i, pool) in self.config.claim_pools.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            self.try_claim(pool, &mut report).await;
        }
        self.pause().await;

        let balance = self.creator.balance().await?;
        let transferable = balance - self.config.gas_reserve;
        info!(tag = "SYSTEM", "Consolidator: {:.4} SOL (transferable: {:.4})", balance, transferable);

        if transferable <= min_transfer {
            return Ok(report);
        }

        let operator_share = percent_of(transferable, operator_share_pct).round_dp(9);
        let worker_share = transferable - operator_share;

        if operator_share > dust {
            info!(tag = "TRANSFER", "Moving {:.4} SOL to operator {}", operator_share, short_address(operator));
            let record = self.send(operator, operator_share).await;
            report.transfers.push(record);
            self.pause().await;
        }

        if worker_share > dust {
            info!(tag = "TRANSFER", "Moving {:.4} SOL to worker...", worker_share);
            let record = self.send(&self.worker_address, worker_share).await;
            report.transfers.push(record);
        }

        Ok(report)
    }

    /// Best-effort claim on one pool; returns whether it was submitted
    async fn try_claim(&self, pool: &str, report: &mut CycleReport) -> bool {
        debug!(tag = "CLAIM", "Checking creator fees ({})", pool);
        let request = FeeClaimRequest {
            mint: self.token_mint.clone(),
            payer: self.creator.address(),
            pool: pool.to_string(),
            priority_fee: self.config.claim_priority_fee,
        };

        let result = match self.claims.request_fee_claim(&request).await {
            Ok(unsigned) => self.creator.submit(&unsigned).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(signature) => {
                info!(tag = "SUCCESS", "Claimed {} fees: {}", pool, signature);
                report.claimed.push(pool.to_string());
                true
            }
            Err(e) => {
                warn!(tag = e.tag(), "Fee claim ({}) failed: {}", pool, e);
                report.failed_claims.push(pool.to_string());
                false
            }
        }
    }

    async fn send(&self, to: &str, amount: Decimal) -> TransferRecord {
        let signature = match self.creator.transfer(to, amount).await {
            Ok(signature) => {
                info!(tag = "SUCCESS", "Funds moved: {}", signature);
                Some(signature)
            }
            Err(e) => {
                warn!(tag = e.tag(), "Transfer to {} failed: {}", short_address(to), e);
                None
            }
        };
        TransferRecord {
            to: to.to_string(),
            amount,
            signature,
        }
    }

    async fn pause(&self) {
        if self.config.claim_spacing > Duration::ZERO {
            sleep(self.config.claim_spacing).await;
        }
    }
}
