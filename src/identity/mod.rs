//! Identity - Passphrase → Seed → RootKey. Secrets never leave this layer in cleartext.
//!
//! The passphrase is a BIP39 mnemonic in the English word list. Seeds are
//! zeroized on drop and only live long enough to produce a root key.

mod hd;

pub use hd::{derive_root, Keychain, RootKey};

use crate::core::{WalletError, WalletResult};
use bip39::{Language, Mnemonic};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Fewer words than this never reach seed derivation.
pub const MIN_WORDS: usize = 12;

/// Entropy sizes accepted by the English word list
pub const SUPPORTED_STRENGTHS: [u32; 5] = [128, 160, 192, 224, 256];

pub const DEFAULT_STRENGTH: u32 = 128;

/// Ordered mnemonic words. Word count is always >= [`MIN_WORDS`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase {
    words: Vec<String>,
}

impl Passphrase {
    /// Generate a fresh passphrase with `strength_bits` of entropy
    pub fn generate(strength_bits: u32) -> WalletResult<Self> {
        if !SUPPORTED_STRENGTHS.contains(&strength_bits) {
            return Err(WalletError::InvalidStrength(strength_bits));
        }
        let mut entropy = Zeroizing::new(vec![0u8; (strength_bits / 8) as usize]);
        OsRng.fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        Self::from_words(mnemonic.words())
    }

    /// Build from user input. Each item may itself hold several space separated words.
    pub fn from_words<I, S>(input: I) -> WalletResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = input
            .into_iter()
            .flat_map(|item| item.as_ref().split_whitespace().map(|w| w.to_lowercase()).collect::<Vec<_>>())
            .collect();
        if words.len() < MIN_WORDS {
            return Err(WalletError::InvalidPassphrase(format!(
                "{} words given, at least {} required",
                words.len(),
                MIN_WORDS
            )));
        }
        Ok(Self { words })
    }

    pub fn parse(phrase: &str) -> WalletResult<Self> {
        Self::from_words([phrase])
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Space separated phrase, for showing to the user once.
    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.words.join(" "))
    }

    /// Deterministic BIP39 seed. `salt` is the optional BIP39 passphrase ("" for none).
    pub fn to_seed(&self, salt: &str) -> WalletResult<Seed> {
        let phrase = self.phrase();
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &phrase)
            .map_err(|e| WalletError::InvalidPassphrase(e.to_string()))?;
        Ok(Seed(mnemonic.to_seed(salt)))
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passphrase").field("words", &self.words.len()).finish_non_exhaustive()
    }
}

/// 64-byte BIP39 seed
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 64]);

impl Seed {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    // BIP39 reference seed for TEST_MNEMONIC with an empty passphrase
    const TEST_SEED_HEX: &str = "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc19a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4";

    #[test]
    fn test_generate_default_strength() {
        let p = Passphrase::generate(DEFAULT_STRENGTH).unwrap();
        assert_eq!(p.word_count(), 12);
        assert!(p.to_seed("").is_ok());
    }

    #[test]
    fn test_generate_256_bits() {
        let p = Passphrase::generate(256).unwrap();
        assert_eq!(p.word_count(), 24);
    }

    #[test]
    fn test_generate_unsupported_strength() {
        match Passphrase::generate(100) {
            Err(WalletError::InvalidStrength(100)) => {}
            other => panic!("Expected InvalidStrength, got {:?}", other),
        }
    }

    #[test]
    fn test_short_passphrase_rejected() {
        let result = Passphrase::parse("abandon abandon abandon abandon abandon about");
        assert!(matches!(result, Err(WalletError::InvalidPassphrase(_))));

        let eleven: Vec<&str> = TEST_MNEMONIC.split(' ').skip(1).collect();
        assert!(matches!(Passphrase::from_words(eleven), Err(WalletError::InvalidPassphrase(_))));
    }

    #[test]
    fn test_single_argument_is_split() {
        let p = Passphrase::from_words(vec![TEST_MNEMONIC.to_string()]).unwrap();
        assert_eq!(p.word_count(), 12);
        assert_eq!(p.phrase().as_str(), TEST_MNEMONIC);
    }

    #[test]
    fn test_seed_matches_reference_vector() {
        let seed = Passphrase::parse(TEST_MNEMONIC).unwrap().to_seed("").unwrap();
        assert_eq!(hex::encode(seed.as_bytes()), TEST_SEED_HEX);
    }

    #[test]
    fn test_seed_deterministic() {
        let p = Passphrase::parse(TEST_MNEMONIC).unwrap();
        let s1 = p.to_seed("").unwrap();
        let s2 = p.to_seed("").unwrap();
        assert_eq!(s1.as_bytes(), s2.as_bytes());
    }

    #[test]
    fn test_salt_changes_seed() {
        let p = Passphrase::parse(TEST_MNEMONIC).unwrap();
        assert_ne!(p.to_seed("").unwrap().as_bytes(), p.to_seed("TREZOR").unwrap().as_bytes());
    }

    #[test]
    fn test_unknown_word_rejected() {
        let p = Passphrase::parse("invalid word word word word word word word word word word word").unwrap();
        assert!(matches!(p.to_seed(""), Err(WalletError::InvalidPassphrase(_))));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let p = Passphrase::parse(&TEST_MNEMONIC.replace("about", "abandon")).unwrap();
        assert!(matches!(p.to_seed(""), Err(WalletError::InvalidPassphrase(_))));
    }

    #[test]
    fn test_debug_hides_words() {
        let p = Passphrase::parse(TEST_MNEMONIC).unwrap();
        assert!(!format!("{:?}", p).contains("abandon"));
    }
}
