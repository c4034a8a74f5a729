//! Chain - network collaborator for scan and broadcast
//!
//! ```text
//! WalletSession ──scan(addresses)──▶ ChainBackend ──▶ ElectrumChain (electrum_client)
//!               ──broadcast(raw)───▶              └─▶ MemoryChain   (tests, offline)
//! ```
//!
//! Backends report the chain's view only. Applying that view to a wallet is
//! the session's job, so a backend failure can never leave a record half updated.

mod electrum;
mod memory;

pub use electrum::ElectrumChain;
pub use memory::MemoryChain;

use crate::core::WalletError;
use crate::wallet::Network;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unspent output as reported by the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainUtxo {
    pub txid: String,
    pub vout: u32,
    pub address: String,
    pub amount: u64,
    pub height: Option<u32>,
}

/// Everything the chain knows about one address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressActivity {
    pub address: String,
    pub has_history: bool,
    pub utxos: Vec<ChainUtxo>,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl From<ChainError> for WalletError {
    fn from(e: ChainError) -> Self {
        WalletError::Network(e.to_string())
    }
}

#[async_trait]
pub trait ChainBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Activity for each address, in input order
    async fn scan(&self, network: Network, addresses: &[String]) -> Result<Vec<AddressActivity>, ChainError>;

    /// Submit a serialized transaction, returns the txid the backend accepted
    async fn broadcast(&self, network: Network, raw: &[u8]) -> Result<String, ChainError>;
}
