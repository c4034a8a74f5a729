//! HD keys - root extended key and BIP84 derivation
//!
//! Receives the 64-byte seed from the passphrase layer. Addresses are P2WPKH
//! under `m/84'/coin'/0'/chain/index`.

use crate::core::paths::derivation::{ACCOUNT, EXTERNAL_CHAIN, INTERNAL_CHAIN, PURPOSE};
use crate::core::{WalletError, WalletResult};
use crate::identity::Seed;
use crate::wallet::Network;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use bitcoin::{Address, CompressedPublicKey, NetworkKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Derivation chain for an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keychain {
    /// Receive addresses
    External,
    /// Change addresses
    Internal,
}

impl Keychain {
    fn chain(&self) -> u32 {
        match self {
            Keychain::External => EXTERNAL_CHAIN,
            Keychain::Internal => INTERNAL_CHAIN,
        }
    }
}

/// Derive the root extended private key for `network`.
pub fn derive_root(seed: &Seed, network: Network) -> WalletResult<RootKey> {
    let xprv = Xpriv::new_master(network.to_bitcoin(), seed.as_bytes())
        .map_err(|e| WalletError::Derivation(e.to_string()))?;
    Ok(RootKey { xprv, network })
}

/// Extended private key bound to one network.
#[derive(Clone)]
pub struct RootKey {
    xprv: Xpriv,
    network: Network,
}

impl RootKey {
    /// Load a serialized key (xprv/tprv). The key kind must match `network`.
    pub fn decode(encoded: &str, network: Network) -> WalletResult<Self> {
        let xprv = Xpriv::from_str(encoded).map_err(|e| WalletError::Derivation(format!("Root key: {}", e)))?;
        let expected: NetworkKind = network.to_bitcoin().into();
        if xprv.network != expected {
            return Err(WalletError::UnsupportedNetwork(format!(
                "root key does not belong to {}",
                network
            )));
        }
        Ok(Self { xprv, network })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Serialized form persisted by the wallet store
    pub fn encode(&self) -> String {
        self.xprv.to_string()
    }

    pub fn fingerprint(&self) -> String {
        let secp = Secp256k1::new();
        self.xprv.fingerprint(&secp).to_string()
    }

    pub fn path(&self, keychain: Keychain, index: u32) -> String {
        format!("m/{}'/{}'/{}'/{}/{}", PURPOSE, self.network.coin_type(), ACCOUNT, keychain.chain(), index)
    }

    /// Key pair at `keychain/index`
    pub fn key_pair(&self, keychain: Keychain, index: u32) -> WalletResult<(SecretKey, PublicKey)> {
        let secp = Secp256k1::new();
        self.derive(&secp, keychain, index)
    }

    /// P2WPKH address at `keychain/index`
    pub fn address(&self, keychain: Keychain, index: u32) -> WalletResult<String> {
        let (_, pk) = self.key_pair(keychain, index)?;
        Ok(Address::p2wpkh(&CompressedPublicKey(pk), self.network.to_bitcoin()).to_string())
    }

    fn derive(&self, secp: &Secp256k1<All>, keychain: Keychain, index: u32) -> WalletResult<(SecretKey, PublicKey)> {
        let path = DerivationPath::from_str(&self.path(keychain, index))
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        let child = self.xprv
            .derive_priv(secp, &path)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        let sk = child.private_key;
        Ok((sk, sk.public_key(secp)))
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootKey").field("network", &self.network).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Passphrase;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    // BIP84 test vectors for TEST_MNEMONIC
    const BIP84_ROOT: &str = "xprv9s21ZrQH143K3GJpoapnV8SFfukcVBSfeCficPSGfubmSFDxo1kuHnLisriDvSnRRuL2Qrg5ggqHKNVpxR86QEC8w35uxmGoggxtQTPvfUu";
    const BIP84_RECEIVE_0: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
    const BIP84_RECEIVE_1: &str = "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g";
    const BIP84_CHANGE_0: &str = "bc1q8c6fshw2dlwun7ekn9qwf37cu2rn755upcp6el";
    const SIGNET_RECEIVE_0: &str = "tb1q6rz28mcfaxtmd6v789l9rrlrusdprr9pqcpvkl";

    fn root(network: Network) -> RootKey {
        let seed = Passphrase::parse(TEST_MNEMONIC).unwrap().to_seed("").unwrap();
        derive_root(&seed, network).unwrap()
    }

    #[test]
    fn test_root_matches_bip84_vector() {
        assert_eq!(root(Network::Bitcoin).encode(), BIP84_ROOT);
    }

    #[test]
    fn test_mainnet_addresses() {
        let key = root(Network::Bitcoin);
        assert_eq!(key.address(Keychain::External, 0).unwrap(), BIP84_RECEIVE_0);
        assert_eq!(key.address(Keychain::External, 1).unwrap(), BIP84_RECEIVE_1);
        assert_eq!(key.address(Keychain::Internal, 0).unwrap(), BIP84_CHANGE_0);
    }

    #[test]
    fn test_signet_uses_test_coin_type() {
        let key = root(Network::Signet);
        assert_eq!(key.path(Keychain::External, 0), "m/84'/1'/0'/0/0");
        assert_eq!(key.address(Keychain::External, 0).unwrap(), SIGNET_RECEIVE_0);
    }

    #[test]
    fn test_encode_roundtrip_keeps_derivation() {
        let key = root(Network::Bitcoin);
        let loaded = RootKey::decode(&key.encode(), Network::Bitcoin).unwrap();
        assert_eq!(loaded.address(Keychain::External, 0).unwrap(), BIP84_RECEIVE_0);
    }

    #[test]
    fn test_root_key_network_mismatch() {
        let key = root(Network::Bitcoin);
        assert!(matches!(
            RootKey::decode(&key.encode(), Network::Testnet),
            Err(WalletError::UnsupportedNetwork(_))
        ));
    }
}
