//! Transactions - request parsing, coin selection, signing
//!
//! A [`Transaction`] starts out `Constructed`. Only a successful broadcast moves
//! it to `Broadcast`; a failed one leaves it untouched so the raw hex can be
//! retried or exported.

mod builder;
mod request;

pub use builder::{build, select_utxos, DUST_LIMIT};
pub use request::TransactionRequest;

use crate::core::{WalletError, WalletResult};
use crate::wallet::AddressRecord;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
    pub change: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TxState {
    Constructed,
    Broadcast { txid: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub txid: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Effective fee, including any change folded in as dust
    pub fee: u64,
    pub raw_hex: String,
    #[serde(flatten)]
    pub state: TxState,
    /// Change address derived for this transaction, recorded on broadcast
    #[serde(skip)]
    pub change_address: Option<AddressRecord>,
}

impl Transaction {
    pub fn is_broadcast(&self) -> bool {
        matches!(self.state, TxState::Broadcast { .. })
    }

    pub fn input_total(&self) -> u64 {
        self.inputs.iter().map(|i| i.amount).sum()
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    pub fn change(&self) -> Option<&TxOutput> {
        self.outputs.iter().find(|o| o.change)
    }

    pub fn raw_bytes(&self) -> WalletResult<Vec<u8>> {
        hex::decode(&self.raw_hex).map_err(|e| WalletError::MalformedRequest(format!("raw transaction: {}", e)))
    }
}
