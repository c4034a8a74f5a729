//! Wallet module - records, networks and the open-wallet session
//!
//! # Architecture
//!
//! ```text
//! WalletStore ──open(name|id)──▶ WalletRecord
//!                                    │
//!                                    ▼
//!                             WalletSession ──────▶ ChainBackend
//!                                    │   scan / refresh / broadcast
//!                                    ▼
//!                             tx::build (selection + signing)
//! ```
//!
//! | Operation | Touches chain | Persists |
//! |-----------|---------------|----------|
//! | `get_receive_address` | no | when a new address is derived |
//! | `scan` | yes | when anything changed |
//! | `info` | yes (refresh) | when utxos changed |
//! | `build_transaction` | no | never |
//! | `broadcast` | yes | on success only |

mod model;
mod network;
mod session;

pub use model::{AddressInfo, AddressRecord, NameOrId, Utxo, WalletInfo, WalletRecord, WalletSummary};
pub use network::Network;
pub use session::{ScanReport, SessionOptions, WalletSession, DEFAULT_GAP_LIMIT, DEFAULT_TIMEOUT};
