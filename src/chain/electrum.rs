//! ElectrumChain - scan and broadcast through an Electrum server
//!
//! electrum_client is blocking, so every call runs on the blocking pool.
//! One client per network is connected lazily and reused.

use super::{AddressActivity, ChainBackend, ChainError, ChainUtxo};
use crate::wallet::Network;
use async_trait::async_trait;
use bdk_electrum::electrum_client::{Client, ConfigBuilder, ElectrumApi};
use bitcoin::Address;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct ElectrumChain {
    url: Option<String>,
    timeout_secs: u8,
    clients: Mutex<HashMap<Network, Arc<Client>>>,
}

impl ElectrumChain {
    /// `url` overrides the per-network default server
    pub fn new(url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            url,
            timeout_secs: timeout_secs.clamp(1, u8::MAX as u64) as u8,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn url_for(&self, network: Network) -> String {
        self.url.clone().unwrap_or_else(|| network.default_electrum_url().to_string())
    }

    async fn client(&self, network: Network) -> Result<Arc<Client>, ChainError> {
        let cached = self.clients.lock().map_err(|_| ChainError::Unavailable("lock".into()))?.get(&network).cloned();
        if let Some(client) = cached {
            return Ok(client);
        }

        let url = self.url_for(network);
        let config = ConfigBuilder::new().timeout(Some(self.timeout_secs)).build();
        debug!(%url, %network, "connecting to electrum");
        let client = tokio::task::spawn_blocking(move || Client::from_config(&url, config))
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?
            .map_err(|e| ChainError::Unavailable(format!("Electrum: {}", e)))?;
        let client = Arc::new(client);

        self.clients
            .lock()
            .map_err(|_| ChainError::Unavailable("lock".into()))?
            .insert(network, client.clone());
        Ok(client)
    }
}

fn scan_blocking(client: &Client, network: Network, addresses: &[String]) -> Result<Vec<AddressActivity>, ChainError> {
    let mut out = Vec::with_capacity(addresses.len());
    for address in addresses {
        let script = Address::from_str(address)
            .and_then(|a| a.require_network(network.to_bitcoin()))
            .map_err(|e| ChainError::Rejected(format!("Address {}: {}", address, e)))?
            .script_pubkey();

        let history = client
            .script_get_history(&script)
            .map_err(|e| ChainError::Unavailable(format!("History: {}", e)))?;
        let unspent = client
            .script_list_unspent(&script)
            .map_err(|e| ChainError::Unavailable(format!("Unspent: {}", e)))?;

        out.push(AddressActivity {
            address: address.clone(),
            has_history: !history.is_empty(),
            utxos: unspent
                .into_iter()
                .map(|u| ChainUtxo {
                    txid: u.tx_hash.to_string(),
                    vout: u.tx_pos as u32,
                    address: address.clone(),
                    amount: u.value,
                    // height 0 means mempool
                    height: (u.height > 0).then_some(u.height as u32),
                })
                .collect(),
        });
    }
    Ok(out)
}

#[async_trait]
impl ChainBackend for ElectrumChain {
    fn name(&self) -> &str {
        "electrum"
    }

    async fn scan(&self, network: Network, addresses: &[String]) -> Result<Vec<AddressActivity>, ChainError> {
        let client = self.client(network).await?;
        let addresses = addresses.to_vec();
        tokio::task::spawn_blocking(move || scan_blocking(&client, network, &addresses))
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?
    }

    async fn broadcast(&self, network: Network, raw: &[u8]) -> Result<String, ChainError> {
        let client = self.client(network).await?;
        let raw = raw.to_vec();
        let txid = tokio::task::spawn_blocking(move || client.transaction_broadcast_raw(&raw))
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        info!(%txid, %network, "transaction broadcast");
        Ok(txid.to_string())
    }
}
