//! Wallet error taxonomy.
//!
//! Validation errors are raised before any state mutation or network call.
//! `NotFound`, `DuplicateName` and `BroadcastFailure` are recoverable; derivation
//! errors end the current invocation without creating a wallet.

use thiserror::Error;

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Unsupported passphrase strength: {0} bits (use 128, 160, 192, 224 or 256)")]
    InvalidStrength(u32),

    #[error("Invalid passphrase: {0}")]
    InvalidPassphrase(String),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Wallet '{0}' already exists")]
    DuplicateName(String),

    #[error("Wallet '{0}' not found")]
    NotFound(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Amount must be a non-negative integer: {0}")]
    InvalidAmount(String),

    #[error("Fee must be a non-negative integer: {0}")]
    InvalidFee(String),

    #[error("Invalid address for {network}: {address}")]
    InvalidAddress { address: String, network: String },

    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("Broadcast failed: {0}")]
    BroadcastFailure(String),

    #[error("Error when deleting wallet '{0}'")]
    DeletionFailed(String),

    #[error("Key derivation: {0}")]
    Derivation(String),

    #[error("Network: {0}")]
    Network(String),

    #[error("Store: {0}")]
    Store(String),

    #[error("Aborted: {0}")]
    Aborted(String),
}

impl WalletError {
    /// Hint shown next to the error for cases the user can fix directly.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            WalletError::NotFound(name) => Some(format!("create it with: clw create-wallet {}", name)),
            WalletError::DuplicateName(name) => Some(format!("open the existing wallet with: clw wallet-info {}", name)),
            WalletError::BroadcastFailure(_) => Some("the transaction was kept; retry or broadcast the raw hex manually".into()),
            WalletError::InvalidPassphrase(_) => Some("specify a passphrase with 12 words or more".into()),
            _ => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WalletError::NotFound(_)
                | WalletError::DuplicateName(_)
                | WalletError::BroadcastFailure(_)
                | WalletError::Network(_)
        )
    }

    /// Stable identifier used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            WalletError::InvalidStrength(_) => "invalid_strength",
            WalletError::InvalidPassphrase(_) => "invalid_passphrase",
            WalletError::UnsupportedNetwork(_) => "unsupported_network",
            WalletError::DuplicateName(_) => "duplicate_name",
            WalletError::NotFound(_) => "not_found",
            WalletError::MalformedRequest(_) => "malformed_request",
            WalletError::InvalidAmount(_) => "invalid_amount",
            WalletError::InvalidFee(_) => "invalid_fee",
            WalletError::InvalidAddress { .. } => "invalid_address",
            WalletError::InsufficientFunds { .. } => "insufficient_funds",
            WalletError::BroadcastFailure(_) => "broadcast_failure",
            WalletError::DeletionFailed(_) => "deletion_failed",
            WalletError::Derivation(_) => "derivation",
            WalletError::Network(_) => "network",
            WalletError::Store(_) => "store",
            WalletError::Aborted(_) => "aborted",
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Store(format!("json: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(WalletError::NotFound("alice".into()).is_recoverable());
        assert!(WalletError::DuplicateName("alice".into()).is_recoverable());
        assert!(WalletError::BroadcastFailure("rejected".into()).is_recoverable());
        assert!(!WalletError::InvalidPassphrase("short".into()).is_recoverable());
        assert!(!WalletError::UnsupportedNetwork("dogecoin".into()).is_recoverable());
    }

    #[test]
    fn test_suggestions() {
        let hint = WalletError::NotFound("alice".into()).suggestion().unwrap();
        assert!(hint.contains("create-wallet alice"));
        let hint = WalletError::DuplicateName("alice".into()).suggestion().unwrap();
        assert!(hint.contains("wallet-info alice"));
        assert!(WalletError::InvalidFee("x".into()).suggestion().is_none());
    }

    #[test]
    fn test_amount_error_reports_literal() {
        let err = WalletError::InvalidAmount("12abc".into());
        assert!(err.to_string().contains("12abc"));
        assert_eq!(err.kind(), "invalid_amount");
    }
}
