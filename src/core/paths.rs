//! File names and environment variables
//!
//! Centralized registry for everything the wallet reads from disk or env.

/// Files under the data directory
pub mod files {
    pub const STORE: &str = "wallets.json";
    pub const CONFIG: &str = "config.json";
    pub const DOTENV: &str = ".env";
    pub const APP_DIR: &str = "clwallet";
}

/// Environment variables (lower priority than command line flags)
pub mod env {
    pub const DATA_DIR: &str = "CLWALLET_DATA_DIR";
    pub const NETWORK: &str = "CLWALLET_NETWORK";
    pub const ELECTRUM: &str = "CLWALLET_ELECTRUM";
    pub const TIMEOUT: &str = "CLWALLET_TIMEOUT";
    pub const GAP_LIMIT: &str = "CLWALLET_GAP_LIMIT";
    pub const STRENGTH: &str = "CLWALLET_PASSPHRASE_STRENGTH";
    pub const LOG_JSON: &str = "CLWALLET_LOG_JSON";
}

/// BIP84 derivation (native segwit, single account)
pub mod derivation {
    pub const PURPOSE: u32 = 84;
    pub const ACCOUNT: u32 = 0;
    pub const EXTERNAL_CHAIN: u32 = 0;
    pub const INTERNAL_CHAIN: u32 = 1;
}
