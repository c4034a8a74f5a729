//! WalletSession - an open wallet bound to a store and a chain backend
//!
//! Each mutating call works on a copy of the record. The copy replaces the live
//! record only after the store accepted it, so a failed or timed out network
//! call never leaves the session half updated. A broadcast the chain accepted
//! is the one exception: it is kept in the session even when saving fails.

use crate::chain::{AddressActivity, ChainBackend, ChainError};
use crate::core::{WalletError, WalletResult};
use crate::identity::{Keychain, RootKey};
use crate::store::WalletStore;
use crate::tx::{self, Transaction, TransactionRequest, TxState};
use crate::wallet::{AddressRecord, NameOrId, Utxo, WalletInfo, WalletRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_GAP_LIMIT: u32 = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Consecutive unused receive addresses that end a scan
    pub gap_limit: u32,
    /// Upper bound for a single chain call
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { gap_limit: DEFAULT_GAP_LIMIT, timeout: DEFAULT_TIMEOUT }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub addresses: usize,
    pub used: usize,
    pub utxos: usize,
    pub balance: u64,
    pub changed: bool,
}

pub struct WalletSession<'a> {
    store: &'a WalletStore,
    chain: &'a dyn ChainBackend,
    record: WalletRecord,
    root: RootKey,
    options: SessionOptions,
}

impl<'a> WalletSession<'a> {
    pub fn open(
        store: &'a WalletStore,
        chain: &'a dyn ChainBackend,
        wallet: &NameOrId,
        options: SessionOptions,
    ) -> WalletResult<Self> {
        let record = store.open(wallet)?;
        Self::from_record(store, chain, record, options)
    }

    pub fn from_record(
        store: &'a WalletStore,
        chain: &'a dyn ChainBackend,
        record: WalletRecord,
        options: SessionOptions,
    ) -> WalletResult<Self> {
        let root = RootKey::decode(&record.root_key, record.network)?;
        debug!(id = record.id, name = %record.name, backend = chain.name(), "wallet opened");
        Ok(Self { store, chain, record, root, options })
    }

    pub fn record(&self) -> &WalletRecord {
        &self.record
    }

    pub fn balance(&self) -> u64 {
        self.record.balance()
    }

    /// Lowest unused receive address, deriving and persisting a new one when all are used.
    pub fn get_receive_address(&mut self) -> WalletResult<String> {
        if let Some(existing) = self.record.first_unused(Keychain::External) {
            return Ok(existing.address.clone());
        }
        let mut next = self.record.clone();
        let address = derive_next(&mut next, &self.root, Keychain::External)?;
        self.replace(next)?;
        info!(wallet = %self.record.name, %address, "receive address derived");
        Ok(address)
    }

    /// Discover receive and change addresses up to the gap limit on each chain and
    /// replace the utxo set with the chain's view.
    pub async fn scan(&mut self) -> WalletResult<ScanReport> {
        let gap = self.options.gap_limit.max(1);
        let mut next = self.record.clone();
        let mut seen: HashSet<String> = HashSet::new();
        let mut activity = Vec::new();

        loop {
            for keychain in [Keychain::External, Keychain::Internal] {
                while next.trailing_unused(keychain) < gap {
                    derive_next(&mut next, &self.root, keychain)?;
                }
            }
            let pending: Vec<String> = next
                .addresses
                .iter()
                .map(|a| a.address.clone())
                .filter(|a| !seen.contains(a))
                .collect();
            if pending.is_empty() {
                break;
            }
            let found = self.query(self.chain.scan(next.network, &pending)).await?;
            mark_used(&mut next, &found);
            seen.extend(pending);
            activity.extend(found);
        }

        apply_utxos(&mut next, &activity);
        let changed = next.addresses != self.record.addresses || next.utxos != self.record.utxos;
        if changed {
            self.replace(next)?;
        }
        let report = ScanReport {
            addresses: self.record.addresses.len(),
            used: self.record.addresses.iter().filter(|a| a.used).count(),
            utxos: self.record.unspent().count(),
            balance: self.record.balance(),
            changed,
        };
        info!(
            wallet = %self.record.name,
            addresses = report.addresses,
            utxos = report.utxos,
            balance = report.balance,
            changed,
            "scan applied"
        );
        Ok(report)
    }

    /// Refresh utxos of already known addresses. No new addresses are derived.
    pub async fn refresh_utxos(&mut self) -> WalletResult<()> {
        if self.record.addresses.is_empty() {
            return Ok(());
        }
        let addresses: Vec<String> = self.record.addresses.iter().map(|a| a.address.clone()).collect();
        let found = self.query(self.chain.scan(self.record.network, &addresses)).await?;

        let mut next = self.record.clone();
        mark_used(&mut next, &found);
        apply_utxos(&mut next, &found);
        if next.addresses != self.record.addresses || next.utxos != self.record.utxos {
            self.replace(next)?;
        }
        Ok(())
    }

    /// Snapshot after a utxo refresh. When the chain is unreachable the last
    /// successfully scanned state is returned.
    pub async fn info(&mut self) -> WalletResult<WalletInfo> {
        if let Err(e) = self.refresh_utxos().await {
            warn!(wallet = %self.record.name, error = %e, "utxo refresh failed, showing stored state");
        }
        Ok(self.record.info())
    }

    pub fn build_transaction(&self, request: &TransactionRequest) -> WalletResult<Transaction> {
        tx::build(&self.record, &self.root, request)
    }

    /// Submit `transaction`. On success its inputs are marked spent and its change
    /// address recorded; on failure it stays `Constructed` and the wallet is untouched.
    /// Once the chain accepted the transaction the txid is returned even if saving fails.
    pub async fn broadcast(&mut self, transaction: &mut Transaction) -> WalletResult<String> {
        if let TxState::Broadcast { txid } = &transaction.state {
            return Ok(txid.clone());
        }
        let raw = transaction.raw_bytes()?;
        let txid = match self.query(self.chain.broadcast(self.record.network, &raw)).await {
            Ok(txid) => txid,
            Err(e) => {
                warn!(wallet = %self.record.name, txid = %transaction.txid, error = %e, "broadcast failed");
                return Err(WalletError::BroadcastFailure(e.to_string()));
            }
        };
        transaction.state = TxState::Broadcast { txid: txid.clone() };

        let mut next = self.record.clone();
        for input in &transaction.inputs {
            if let Some(utxo) = next.utxos.iter_mut().find(|u| u.same_outpoint(&input.txid, input.vout)) {
                utxo.spent = true;
            }
        }
        if let Some(change) = &transaction.change_address {
            match next.addresses.iter().position(|a| a.address == change.address) {
                Some(i) => next.addresses[i].used = true,
                None => next.addresses.push(AddressRecord { used: true, ..change.clone() }),
            }
        }
        info!(wallet = %self.record.name, %txid, fee = transaction.fee, "transaction sent");
        // accepted by the chain; a failed write is resynced by the next scan
        if let Err(e) = self.store.save(&next) {
            warn!(wallet = %self.record.name, %txid, error = %e, "sent transaction not saved, run scan to resync");
        }
        self.record = next;
        Ok(txid)
    }

    async fn query<T>(&self, call: impl Future<Output = Result<T, ChainError>>) -> WalletResult<T> {
        match tokio::time::timeout(self.options.timeout, call).await {
            Ok(result) => result.map_err(WalletError::from),
            Err(_) => Err(ChainError::Timeout(self.options.timeout.as_secs()).into()),
        }
    }

    fn replace(&mut self, next: WalletRecord) -> WalletResult<()> {
        self.store.save(&next)?;
        self.record = next;
        Ok(())
    }
}

fn derive_next(record: &mut WalletRecord, root: &RootKey, keychain: Keychain) -> WalletResult<String> {
    let index = record.next_index(keychain);
    let address = root.address(keychain, index)?;
    debug!(wallet = %record.name, path = %root.path(keychain, index), "address derived");
    record.addresses.push(AddressRecord { address: address.clone(), keychain, index, used: false });
    Ok(address)
}

fn mark_used(record: &mut WalletRecord, activity: &[AddressActivity]) {
    for found in activity.iter().filter(|a| a.has_history || !a.utxos.is_empty()) {
        if let Some(addr) = record.addresses.iter_mut().find(|a| a.address == found.address) {
            addr.used = true;
        }
    }
}

/// Replace utxos of the scanned addresses with what the chain reports.
/// Outputs already marked spent locally stay spent while the chain still lists them.
fn apply_utxos(record: &mut WalletRecord, activity: &[AddressActivity]) {
    let scanned: HashSet<&str> = activity.iter().map(|a| a.address.as_str()).collect();
    let previous = std::mem::take(&mut record.utxos);
    let locally_spent: HashSet<(String, u32)> =
        previous.iter().filter(|u| u.spent).map(|u| (u.txid.clone(), u.vout)).collect();

    let mut utxos: Vec<Utxo> = previous.into_iter().filter(|u| !scanned.contains(u.address.as_str())).collect();
    for found in activity {
        for u in &found.utxos {
            if utxos.iter().any(|existing| existing.same_outpoint(&u.txid, u.vout)) {
                continue;
            }
            utxos.push(Utxo {
                txid: u.txid.clone(),
                vout: u.vout,
                address: u.address.clone(),
                amount: u.amount,
                height: u.height,
                spent: locally_spent.contains(&(u.txid.clone(), u.vout)),
            });
        }
    }
    record.utxos = utxos;
}
