//! Wallet signing primitives
//!
//! The core only sees [`TxSigner`]. [`KeypairSigner`] is the thin solana-sdk
//! backed implementation used by the binary.

use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::{Transaction, VersionedTransaction},
};
use std::fmt;
use std::str::FromStr;

use crate::error::{AgentError, Result};

pub trait TxSigner: Send + Sync {
    /// Base58 public address
    fn address(&self) -> String;

    /// Sign a provider-built (unsigned) serialized transaction
    fn sign_transaction(&self, unsigned: &[u8]) -> Result<Vec<u8>>;

    /// Build and sign a single system transfer
    fn transfer_transaction(&self, to: &str, lamports: u64, recent_blockhash: &str)
        -> Result<Vec<u8>>;
}

pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    /// Accepts a base58 secret or a JSON byte array (`[12,34,...]`)
    pub fn from_secret(secret: &str) -> Result<Self> {
        let secret = secret.trim();
        let bytes: Vec<u8> = if secret.starts_with('[') && secret.ends_with(']') {
            serde_json::from_str(secret)
                .map_err(|e| AgentError::Config(format!("invalid key byte array: {}", e)))?
        } else {
            bs58::decode(secret)
                .into_vec()
                .map_err(|e| AgentError::Config(format!("invalid base58 key: {}", e)))?
        };

        let keypair = Keypair::try_from(&bytes[..])
            .map_err(|e| AgentError::Config(format!("failed to create keypair: {}", e)))?;
        Ok(Self { keypair })
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

impl fmt::Debug for KeypairSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeypairSigner")
            .field("address", &self.keypair.pubkey().to_string())
            .finish()
    }
}

impl TxSigner for KeypairSigner {
    fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    fn sign_transaction(&self, unsigned: &[u8]) -> Result<Vec<u8>> {
        let tx: VersionedTransaction = bincode::deserialize(unsigned)
            .map_err(|e| AgentError::MalformedResponse(format!("undecodable transaction: {}", e)))?;

        let signed = VersionedTransaction::try_new(tx.message, &[&self.keypair])
            .map_err(|e| AgentError::Signing(e.to_string()))?;

        bincode::serialize(&signed).map_err(|e| AgentError::Signing(e.to_string()))
    }

    #[allow(deprecated)]
    fn transfer_transaction(
        &self,
        to: &str,
        lamports: u64,
        recent_blockhash: &str,
    ) -> Result<Vec<u8>> {
        let recipient = Pubkey::from_str(to)
            .map_err(|e| AgentError::Signing(format!("invalid recipient {}: {}", to, e)))?;
        let blockhash = Hash::from_str(recent_blockhash)
            .map_err(|e| AgentError::MalformedResponse(format!("invalid blockhash: {}", e)))?;

        let payer = self.keypair.pubkey();
        let ix = solana_sdk::system_instruction::transfer(&payer, &recipient, lamports);
        let tx = Transaction::new_signed_with_payer(&[ix], Some(&payer), &[&self.keypair], blockhash);

        bincode::serialize(&tx).map_err(|e| AgentError::Signing(e.to_string()))
    }
}
