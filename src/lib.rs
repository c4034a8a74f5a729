//! clwallet: command line HD wallet. Mnemonic in, signed transactions out.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator (one Command per invocation, ConfirmationPort for prompts)
//!   │
//!   ├── identity: Passphrase → Seed → RootKey (BIP39, BIP32, BIP84 addresses)
//!   │
//!   ├── store: WalletStore (wallets.json, atomic replace)
//!   │
//!   └── wallet: WalletSession (one open wallet)
//!         ├── receive address / scan / info
//!         ├── tx: TransactionRequest → build (largest-first, P2WPKH signing)
//!         └── chain: ChainBackend (ElectrumChain, MemoryChain)
//! ```
//!
//! # Commands
//!
//! | Command | Touches chain | Confirmation |
//! |---------|---------------|--------------|
//! | `ListWallets` | no | no |
//! | `CreateWallet` | no | typed `yes` when the passphrase is generated |
//! | `DeleteWallet` | no | exact wallet name |
//! | `WalletInfo` | refresh | no |
//! | `Receive` | no | no |
//! | `Scan` | yes | no |
//! | `Send` | only with `broadcast` | no |
//!
//! # Usage
//!
//! ```ignore
//! use clwallet::{Command, MemoryChain, Orchestrator, ScriptedPort, SessionOptions, WalletStore};
//!
//! let store = WalletStore::in_memory();
//! let chain = MemoryChain::new();
//! let mut orch = Orchestrator::new(&store, &chain, ScriptedPort::default(), SessionOptions::default());
//! let outcome = orch.run(Command::ListWallets).await?;
//! ```

pub mod chain;
pub mod config;
pub mod core;
pub mod identity;
pub mod logging;
pub mod orchestrator;
pub mod runtime;
pub mod store;
pub mod tx;
pub mod wallet;

pub use chain::{ChainBackend, ElectrumChain, MemoryChain};
pub use config::Config;
pub use core::{WalletError, WalletResult};
pub use identity::{derive_root, Keychain, Passphrase, RootKey, Seed};
pub use orchestrator::{Command, ConfirmationPort, Orchestrator, Outcome, PassphraseSource, ScriptedPort, StdioPort};
pub use store::WalletStore;
pub use tx::{Transaction, TransactionRequest, TxState};
pub use wallet::{NameOrId, Network, SessionOptions, WalletInfo, WalletSession};
