//! Liquidity Agent - single-asset market maker for a pump.fun token
//!
//! 1. Loads and validates configuration from the environment
//! 2. Reacts to live trades on the token's event stream
//! 3. Holds positions for a randomized period, breaks market silence
//! 4. Claims creator fees and consolidates the creator wallet
//! 5. Pays a small prize to a random recent trader every minute

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use liquidity_agent::config::TradeProviderKind;
use liquidity_agent::telemetry::init_telemetry;
use liquidity_agent::{
    AgentConfig, AgentRunner, FeeClaimProvider, KeypairSigner, LedgerGateway, LedgerRpc,
    PumpPortalClient, RpcLedger, Settings, SolanaTrackerClient, TradeProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env()?;
    let (config, secrets) = AgentConfig::from_settings(settings)?;

    let journal = init_telemetry(&config.logging)?;
    info!(tag = "SYSTEM", "Starting liquidity agent...");

    let creator_signer =
        Arc::new(KeypairSigner::from_secret(&secrets.creator).context("PRIVATE_KEY")?);
    let worker_signer =
        Arc::new(KeypairSigner::from_secret(&secrets.worker).context("WORKER_PRIVATE_KEY")?);

    let rpc: Arc<dyn LedgerRpc> = Arc::new(RpcLedger::new(&config.rpc_url)?);
    let creator = Arc::new(LedgerGateway::new(rpc.clone(), creator_signer, config.dry_run));
    let worker = Arc::new(LedgerGateway::new(rpc, worker_signer, config.dry_run));

    let pumpportal = Arc::new(PumpPortalClient::new()?);
    let trade_provider: Arc<dyn TradeProvider> = match config.provider.kind {
        TradeProviderKind::Pumpportal => pumpportal.clone(),
        TradeProviderKind::SolanaTracker => {
            Arc::new(SolanaTrackerClient::new(&config.provider.solanatracker_api_key)?)
        }
    };
    let fee_claims: Arc<dyn FeeClaimProvider> = pumpportal;

    AgentRunner::new(config, creator, worker, trade_provider, fee_claims)
        .with_journal(journal)
        .run()
        .await
}
