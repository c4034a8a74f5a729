//! WalletStore - durable wallet records in a single JSON document.
//!
//! Every mutation is applied to a copy of the document, written to a temp file
//! and renamed over the old one. Only then does the in-memory state change, so a
//! failed write leaves both disk and memory untouched.

use crate::core::{WalletError, WalletResult};
use crate::identity::RootKey;
use crate::wallet::{NameOrId, Network, WalletRecord, WalletSummary};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    wallets: Vec<WalletRecord>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self { next_id: 1, wallets: Vec::new() }
    }
}

/// Parameters for a new wallet record
#[derive(Debug, Clone)]
pub struct NewWallet<'a> {
    pub name: &'a str,
    pub network: Network,
    pub root_key: &'a RootKey,
    pub owner: &'a str,
    pub parent_id: Option<u64>,
}

pub struct WalletStore {
    path: Option<PathBuf>,
    state: Mutex<StoreFile>,
}

impl WalletStore {
    /// Open (or start) the store at `path`
    pub fn load(path: &Path) -> WalletResult<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| WalletError::Store(format!("read {}: {}", path.display(), e)))?;
            serde_json::from_str(&raw)?
        } else {
            StoreFile::default()
        };
        debug!(path = %path.display(), "wallet store opened");
        Ok(Self { path: Some(path.to_path_buf()), state: Mutex::new(state) })
    }

    /// Store without a backing file
    pub fn in_memory() -> Self {
        Self { path: None, state: Mutex::new(StoreFile::default()) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn exists(&self, wallet: &NameOrId) -> bool {
        self.read(|s| s.wallets.iter().any(|w| wallet.matches(w))).unwrap_or(false)
    }

    /// Top-level wallets. Sub-wallets (records with a parent) are left out.
    pub fn list(&self) -> WalletResult<impl Iterator<Item = WalletSummary>> {
        let rows: Vec<WalletSummary> = self.read(|s| {
            s.wallets.iter().filter(|w| w.parent_id.is_none()).map(|w| w.summary()).collect()
        })?;
        Ok(rows.into_iter())
    }

    pub fn create(&self, name: &str, network: Network, root_key: &RootKey) -> WalletResult<WalletRecord> {
        self.create_with(NewWallet { name, network, root_key, owner: "", parent_id: None })
    }

    pub fn create_with(&self, new: NewWallet<'_>) -> WalletResult<WalletRecord> {
        if new.name.trim().is_empty() {
            return Err(WalletError::MalformedRequest("wallet name is empty".into()));
        }
        if matches!(NameOrId::parse(new.name), NameOrId::Id(_)) {
            return Err(WalletError::MalformedRequest(format!("wallet name '{}' must not be numeric", new.name)));
        }
        if new.root_key.network() != new.network {
            return Err(WalletError::UnsupportedNetwork(format!(
                "root key is for {}, wallet is {}",
                new.root_key.network(),
                new.network
            )));
        }
        let record = self.commit(|s| {
            if s.wallets.iter().any(|w| w.name == new.name) {
                return Err(WalletError::DuplicateName(new.name.to_string()));
            }
            if let Some(parent) = new.parent_id {
                if !s.wallets.iter().any(|w| w.id == parent) {
                    return Err(WalletError::NotFound(parent.to_string()));
                }
            }
            let record = WalletRecord {
                id: s.next_id,
                name: new.name.to_string(),
                network: new.network,
                owner: new.owner.to_string(),
                parent_id: new.parent_id,
                root_key: new.root_key.encode(),
                created_at: Utc::now(),
                addresses: Vec::new(),
                utxos: Vec::new(),
            };
            s.next_id += 1;
            s.wallets.push(record.clone());
            Ok(record)
        })?;
        info!(id = record.id, name = %record.name, network = %record.network, "wallet created");
        Ok(record)
    }

    pub fn open(&self, wallet: &NameOrId) -> WalletResult<WalletRecord> {
        self.read(|s| s.wallets.iter().find(|w| wallet.matches(w)).cloned())?
            .ok_or_else(|| WalletError::NotFound(wallet.to_string()))
    }

    /// Replace the stored record with the same id
    pub fn save(&self, record: &WalletRecord) -> WalletResult<()> {
        self.commit(|s| {
            let slot = s
                .wallets
                .iter_mut()
                .find(|w| w.id == record.id)
                .ok_or_else(|| WalletError::NotFound(record.name.clone()))?;
            *slot = record.clone();
            Ok(())
        })
    }

    /// Irreversible. Without `force`, wallets still holding unspent outputs are kept.
    /// Sub-wallets of the deleted wallet go with it. Returns false on any failure.
    pub fn delete(&self, wallet: &NameOrId, force: bool) -> bool {
        let result = self.commit(|s| {
            let target = s
                .wallets
                .iter()
                .find(|w| wallet.matches(w))
                .ok_or_else(|| WalletError::NotFound(wallet.to_string()))?;
            if !force && target.balance() > 0 {
                return Err(WalletError::Aborted(format!("wallet '{}' still holds funds", target.name)));
            }
            let id = target.id;
            let before = s.wallets.len();
            s.wallets.retain(|w| w.id != id && w.parent_id != Some(id));
            Ok(before - s.wallets.len())
        });
        match result {
            Ok(removed) => {
                info!(wallet = %wallet, removed, "wallet deleted");
                true
            }
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "wallet deletion failed");
                false
            }
        }
    }

    fn read<R>(&self, f: impl FnOnce(&StoreFile) -> R) -> WalletResult<R> {
        let guard = self.state.lock().map_err(|_| WalletError::Store("lock".into()))?;
        Ok(f(&guard))
    }

    fn commit<R>(&self, f: impl FnOnce(&mut StoreFile) -> WalletResult<R>) -> WalletResult<R> {
        let mut guard = self.state.lock().map_err(|_| WalletError::Store("lock".into()))?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, state: &StoreFile) -> WalletResult<()> {
        let Some(path) = &self.path else { return Ok(()) };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
