//! Wallet records - what the store persists and what sessions mutate.

use crate::identity::Keychain;
use crate::wallet::Network;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet reference from user input: all digits is an id, anything else a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOrId {
    Id(u64),
    Name(String),
}

impl NameOrId {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = value.parse() {
                return NameOrId::Id(id);
            }
        }
        NameOrId::Name(value.to_string())
    }

    pub fn matches(&self, record: &WalletRecord) -> bool {
        match self {
            NameOrId::Id(id) => record.id == *id,
            NameOrId::Name(name) => record.name == *name,
        }
    }
}

impl From<&str> for NameOrId {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for NameOrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrId::Id(id) => write!(f, "{}", id),
            NameOrId::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub address: String,
    pub keychain: Keychain,
    pub index: u32,
    #[serde(default)]
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub address: String,
    pub amount: u64,
    /// Confirmation height, `None` while unconfirmed
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub spent: bool,
}

impl Utxo {
    pub fn outpoint(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }

    pub fn same_outpoint(&self, txid: &str, vout: u32) -> bool {
        self.txid == txid && self.vout == vout
    }
}

/// Persisted wallet. The root key is stored in its encoded xprv form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: u64,
    pub name: String,
    pub network: Network,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
    pub root_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub addresses: Vec<AddressRecord>,
    #[serde(default)]
    pub utxos: Vec<Utxo>,
}

impl WalletRecord {
    /// Sum of unspent outputs
    pub fn balance(&self) -> u64 {
        self.unspent().map(|u| u.amount).sum()
    }

    pub fn unspent(&self) -> impl Iterator<Item = &Utxo> {
        self.utxos.iter().filter(|u| !u.spent)
    }

    pub fn address_balance(&self, address: &str) -> u64 {
        self.unspent().filter(|u| u.address == address).map(|u| u.amount).sum()
    }

    pub fn find_address(&self, address: &str) -> Option<&AddressRecord> {
        self.addresses.iter().find(|a| a.address == address)
    }

    pub fn keychain_addresses(&self, keychain: Keychain) -> impl Iterator<Item = &AddressRecord> {
        self.addresses.iter().filter(move |a| a.keychain == keychain)
    }

    /// Next index not yet derived on `keychain`
    pub fn next_index(&self, keychain: Keychain) -> u32 {
        self.keychain_addresses(keychain).map(|a| a.index + 1).max().unwrap_or(0)
    }

    /// Lowest-index unused address on `keychain`
    pub fn first_unused(&self, keychain: Keychain) -> Option<&AddressRecord> {
        self.keychain_addresses(keychain).filter(|a| !a.used).min_by_key(|a| a.index)
    }

    /// Consecutive unused addresses at the end of `keychain`
    pub fn trailing_unused(&self, keychain: Keychain) -> u32 {
        let mut addrs: Vec<&AddressRecord> = self.keychain_addresses(keychain).collect();
        addrs.sort_by_key(|a| std::cmp::Reverse(a.index));
        addrs.iter().take_while(|a| !a.used).count() as u32
    }

    pub fn summary(&self) -> WalletSummary {
        WalletSummary { id: self.id, name: self.name.clone(), network: self.network, owner: self.owner.clone() }
    }

    pub fn info(&self) -> WalletInfo {
        WalletInfo {
            id: self.id,
            name: self.name.clone(),
            network: self.network,
            owner: self.owner.clone(),
            balance: self.balance(),
            addresses: self
                .addresses
                .iter()
                .map(|a| AddressInfo {
                    address: a.address.clone(),
                    keychain: a.keychain,
                    index: a.index,
                    used: a.used,
                    balance: self.address_balance(&a.address),
                })
                .collect(),
            utxos: self.unspent().cloned().collect(),
        }
    }
}

/// Row of `list-wallets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub id: u64,
    pub name: String,
    pub network: Network,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressInfo {
    pub address: String,
    pub keychain: Keychain,
    pub index: u32,
    pub used: bool,
    pub balance: u64,
}

/// Read-only snapshot of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub id: u64,
    pub name: String,
    pub network: Network,
    pub owner: String,
    pub balance: u64,
    pub addresses: Vec<AddressInfo>,
    pub utxos: Vec<Utxo>,
}
