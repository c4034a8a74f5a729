//! MemoryChain - in-process chain for tests and offline use
//!
//! Broadcast transactions are decoded and applied: spent outpoints disappear and
//! outputs paying any address become new unconfirmed utxos.

use super::{AddressActivity, ChainBackend, ChainError, ChainUtxo};
use crate::wallet::Network;
use async_trait::async_trait;
use bitcoin::consensus::deserialize;
use bitcoin::{Address, Transaction};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct MemoryState {
    utxos: Vec<ChainUtxo>,
    history: HashSet<String>,
    broadcasts: Vec<Vec<u8>>,
    reject: Option<String>,
    offline: bool,
    latency: Option<Duration>,
    scans: usize,
    next_txid: u64,
}

#[derive(Default)]
pub struct MemoryChain {
    state: Mutex<MemoryState>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `address` in a new confirmed output. Returns the txid.
    pub fn fund(&self, address: &str, amount: u64) -> String {
        let mut s = self.lock();
        s.next_txid += 1;
        let txid = format!("{:064x}", s.next_txid);
        s.utxos.push(ChainUtxo { txid: txid.clone(), vout: 0, address: address.to_string(), amount, height: Some(100) });
        s.history.insert(address.to_string());
        txid
    }

    /// Remove an output as if it were spent elsewhere
    pub fn spend(&self, txid: &str, vout: u32) {
        self.lock().utxos.retain(|u| !(u.txid == txid && u.vout == vout));
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Reject every broadcast with `reason` until cleared with `None`
    pub fn reject_broadcasts(&self, reason: Option<&str>) {
        self.lock().reject = reason.map(str::to_string);
    }

    /// Delay every call, used to exercise timeouts
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.lock().broadcasts.clone()
    }

    pub fn scan_count(&self) -> usize {
        self.lock().scans
    }

    pub fn utxos_for(&self, address: &str) -> Vec<ChainUtxo> {
        self.lock().utxos.iter().filter(|u| u.address == address).cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) -> Result<(), ChainError> {
        let (latency, offline) = {
            let s = self.lock();
            (s.latency, s.offline)
        };
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
        if offline {
            return Err(ChainError::Unavailable("memory chain offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainBackend for MemoryChain {
    fn name(&self) -> &str {
        "memory"
    }

    async fn scan(&self, _network: Network, addresses: &[String]) -> Result<Vec<AddressActivity>, ChainError> {
        self.pause().await?;
        let mut s = self.lock();
        s.scans += 1;
        Ok(addresses
            .iter()
            .map(|address| AddressActivity {
                address: address.clone(),
                has_history: s.history.contains(address),
                utxos: s.utxos.iter().filter(|u| &u.address == address).cloned().collect(),
            })
            .collect())
    }

    async fn broadcast(&self, network: Network, raw: &[u8]) -> Result<String, ChainError> {
        self.pause().await?;
        let tx: Transaction = deserialize(raw).map_err(|e| ChainError::Rejected(format!("decode: {}", e)))?;
        let mut s = self.lock();
        if let Some(reason) = &s.reject {
            return Err(ChainError::Rejected(reason.clone()));
        }

        for input in &tx.input {
            let (txid, vout) = (input.previous_output.txid.to_string(), input.previous_output.vout);
            if !s.utxos.iter().any(|u| u.txid == txid && u.vout == vout) {
                return Err(ChainError::Rejected(format!("missing input {}:{}", txid, vout)));
            }
        }
        for input in &tx.input {
            let (txid, vout) = (input.previous_output.txid.to_string(), input.previous_output.vout);
            s.utxos.retain(|u| !(u.txid == txid && u.vout == vout));
        }

        let txid = tx.compute_txid().to_string();
        for (vout, out) in tx.output.iter().enumerate() {
            let Ok(address) = Address::from_script(&out.script_pubkey, network.to_bitcoin()) else { continue };
            let address = address.to_string();
            s.history.insert(address.clone());
            s.utxos.push(ChainUtxo { txid: txid.clone(), vout: vout as u32, address, amount: out.value.to_sat(), height: None });
        }
        s.broadcasts.push(raw.to_vec());
        Ok(txid)
    }
}
