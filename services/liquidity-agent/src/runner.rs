//! Agent Runner - wires the workers together and runs them until shutdown

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::amount::short_address;
use crate::config::{AgentConfig, FeePolicy};
use crate::consolidator::FeeConsolidator;
use crate::counterparties::CounterpartyBook;
use crate::executor::TradeExecutor;
use crate::gateway::LedgerGateway;
use crate::heartbeat::HeartbeatController;
use crate::journal::{run_journal_writer, LogJournal};
use crate::lottery::LotteryEngine;
use crate::position::{MarketActivity, SharedPosition};
use crate::sensor::MarketSensor;
use crate::signal::signal_queue;
use crate::swap::{FeeClaimProvider, TradeProvider};

const JOURNAL_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Shared records handed to the workers, exposed for inspection
#[derive(Debug, Clone)]
pub struct AgentHandles {
    pub position: SharedPosition,
    pub activity: MarketActivity,
    pub counterparties: CounterpartyBook,
}

pub struct AgentRunner {
    config: AgentConfig,
    /// Claims fees and funds the consolidation split
    creator: Arc<LedgerGateway>,
    /// Trades and pays lottery prizes
    worker: Arc<LedgerGateway>,
    trade_provider: Arc<dyn TradeProvider>,
    fee_claims: Arc<dyn FeeClaimProvider>,
    journal: Option<LogJournal>,
    handles: AgentHandles,
}

impl AgentRunner {
    pub fn new(
        config: AgentConfig,
        creator: Arc<LedgerGateway>,
        worker: Arc<LedgerGateway>,
        trade_provider: Arc<dyn TradeProvider>,
        fee_claims: Arc<dyn FeeClaimProvider>,
    ) -> Self {
        let handles = AgentHandles {
            position: SharedPosition::new(),
            activity: MarketActivity::new(),
            counterparties: CounterpartyBook::new(worker.address()),
        };
        Self {
            config,
            creator,
            worker,
            trade_provider,
            fee_claims,
            journal: None,
            handles,
        }
    }

    pub fn with_journal(mut self, journal: LogJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn handles(&self) -> AgentHandles {
        self.handles.clone()
    }

    pub fn log_startup_summary(&self) {
        let config = &self.config;
        info!(tag = "INIT", "Creator: {}", short_address(&self.creator.address()));
        info!(tag = "INIT", "Worker: {}", short_address(&self.worker.address()));
        info!(tag = "INIT", "Token: {}", short_address(&config.token_mint));
        info!(
            tag = "INIT",
            "Provider: {} (pool {}{})",
            self.trade_provider.name(),
            config.execution.pool,
            config
                .execution
                .fallback_pool
                .as_deref()
                .map(|p| format!(", fallback {}", p))
                .unwrap_or_default()
        );
        info!(tag = "INIT", "Sensor: {:?} via {}", config.sensor.mode, config.ws_url);
        match &config.fees.policy {
            FeePolicy::ClaimThenSplit { recipient, tax_pct, .. } => info!(
                tag = "INIT",
                "Fee policy: claim-then-split, {}% of profit to {}",
                tax_pct,
                short_address(recipient)
            ),
            FeePolicy::ClaimThenConsolidate { operator, operator_share_pct, .. } => info!(
                tag = "INIT",
                "Fee policy: claim-then-consolidate, {}% to {}, rest to worker",
                operator_share_pct,
                short_address(operator)
            ),
        }
        if config.dry_run {
            warn!(tag = "INIT", "DRY RUN: submissions are simulated");
        }
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(tag = "ERROR", "Ctrl-C handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Spawn one task per worker and wait for `shutdown`
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        self.log_startup_summary();

        let config = self.config;
        let handles = self.handles;
        let (signals, queue) = signal_queue();
        let mut tasks = JoinSet::new();

        let executor = TradeExecutor::new(
            config.execution.clone(),
            &config.token_mint,
            self.worker.clone(),
            self.trade_provider.clone(),
            handles.position.clone(),
        );
        tasks.spawn(executor.run(queue));

        let sensor = MarketSensor::new(
            config.sensor.clone(),
            &config.ws_url,
            &config.token_mint,
            signals.clone(),
            handles.activity.clone(),
            handles.counterparties.clone(),
            self.worker.rpc().clone(),
        );
        tasks.spawn(sensor.run());

        let heartbeat = HeartbeatController::new(
            config.heartbeat.clone(),
            handles.position.clone(),
            handles.activity.clone(),
            signals,
        );
        tasks.spawn(heartbeat.run(self.worker.clone()));

        let consolidator = FeeConsolidator::new(
            config.fees.clone(),
            &config.token_mint,
            self.creator.clone(),
            self.fee_claims.clone(),
            &self.worker.address(),
        );
        tasks.spawn(consolidator.run());

        let lottery = LotteryEngine::new(
            config.lottery.clone(),
            self.worker.clone(),
            handles.counterparties.clone(),
        );
        tasks.spawn(lottery.run());

        if let (Some(journal), Some(path)) = (self.journal, config.logging.journal_path.as_ref()) {
            tasks.spawn(run_journal_writer(journal, PathBuf::from(path), JOURNAL_FLUSH_INTERVAL));
        }

        info!(tag = "SYSTEM", "All workers running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(tag = "SYSTEM", "Shutdown requested, stopping workers");
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(())) => warn!(tag = "SYSTEM", "A worker finished unexpectedly"),
                    Some(Err(e)) => error!(tag = "ERROR", "Worker aborted: {}", e),
                    None => break,
                },
            }
        }

        tasks.abort_all();
        Ok(())
    }
}
