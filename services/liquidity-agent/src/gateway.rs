//! Ledger Gateway
//!
//! Binds one wallet to the ledger client. Every outbound submission goes
//! through here so dry-run can short-circuit them in one place.

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::amount::{lamports_to_sol, sol_to_lamports};
use crate::error::Result;
use crate::ledger::LedgerRpc;
use crate::wallet::TxSigner;

/// Prefix of simulated signatures returned in dry-run
pub const DRY_RUN_SIGNATURE_PREFIX: &str = "DRYRUN";

pub struct LedgerGateway {
    rpc: Arc<dyn LedgerRpc>,
    signer: Arc<dyn TxSigner>,
    dry_run: bool,
    simulated: AtomicU64,
}

impl LedgerGateway {
    pub fn new(rpc: Arc<dyn LedgerRpc>, signer: Arc<dyn TxSigner>, dry_run: bool) -> Self {
        Self {
            rpc,
            signer,
            dry_run,
            simulated: AtomicU64::new(0),
        }
    }

    pub fn address(&self) -> String {
        self.signer.address()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        &self.rpc
    }

    /// Wallet balance in SOL
    pub async fn balance(&self) -> Result<Decimal> {
        let lamports = self.rpc.balance(&self.signer.address()).await?;
        Ok(lamports_to_sol(lamports))
    }

    /// Raw token units held by this wallet
    pub async fn token_balance(&self, mint: &str) -> Result<u64> {
        self.rpc.token_balance(&self.signer.address(), mint).await
    }

    /// Sign a provider-built transaction and broadcast it
    pub async fn submit(&self, unsigned: &[u8]) -> Result<String> {
        if self.dry_run {
            return Ok(self.simulated_signature());
        }
        let signed = self.signer.sign_transaction(unsigned)?;
        self.rpc.send_transaction(&signed).await
    }

    /// Native transfer of `amount` SOL (truncated to whole lamports)
    pub async fn transfer(&self, to: &str, amount: Decimal) -> Result<String> {
        let lamports = sol_to_lamports(amount)?;
        if self.dry_run {
            return Ok(self.simulated_signature());
        }
        let blockhash = self.rpc.latest_blockhash().await?;
        let tx = self.signer.transfer_transaction(to, lamports, &blockhash)?;
        self.rpc.send_transaction(&tx).await
    }

    /// Signature for a submission that dry-run skipped
    pub fn simulated_signature(&self) -> String {
        let n = self.simulated.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(tag = "TX", "simulated submission #{}", n);
        format!("{}-{}", DRY_RUN_SIGNATURE_PREFIX, n)
    }
}

pub fn is_simulated(signature: &str) -> bool {
    signature.starts_with(DRY_RUN_SIGNATURE_PREFIX)
}
