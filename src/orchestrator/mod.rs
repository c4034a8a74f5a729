//! Orchestrator - one user intent per invocation
//!
//! ```text
//! Command ──▶ ListWallets
//!         ──▶ DeleteWallet ── typed name confirmation ──▶ WalletStore::delete
//!         ──▶ CreateWallet ── passphrase ──▶ Seed ──▶ RootKey ──▶ WalletStore::create
//!         ──▶ WalletInfo | Receive | Scan | Send ──▶ WalletSession
//! ```
//!
//! Raw strings from the front end are parsed into typed values here, before
//! any store mutation or network call.

mod confirm;

pub use confirm::{ConfirmationPort, ScriptedPort, StdioPort};

use crate::chain::ChainBackend;
use crate::core::{WalletError, WalletResult};
use crate::identity::{derive_root, Passphrase};
use crate::store::{NewWallet, WalletStore};
use crate::tx::{Transaction, TransactionRequest};
use crate::wallet::{NameOrId, Network, ScanReport, SessionOptions, WalletInfo, WalletSession, WalletSummary};
use serde::Serialize;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Answers accepted as acknowledgment that a generated passphrase was written down
const ACKNOWLEDGE: [&str; 3] = ["yes", "Yes", "YES"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassphraseSource {
    /// Generate a new passphrase and ask the user to confirm it was recorded
    Generate { strength: u32 },
    /// Ask for the passphrase through the port
    Prompt,
    /// Recover from words given on the command line
    Words(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListWallets,
    WalletInfo { wallet: NameOrId },
    CreateWallet { name: String, network: Network, passphrase: PassphraseSource, owner: String },
    DeleteWallet { wallet: NameOrId },
    Receive { wallet: NameOrId },
    Scan { wallet: NameOrId },
    Send { wallet: NameOrId, outputs: Vec<String>, fee: String, broadcast: bool },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Wallets { wallets: Vec<WalletSummary> },
    Created { wallet: WalletSummary, receive_address: String },
    Deleted { wallet: String },
    Info { info: WalletInfo },
    ReceiveAddress { wallet: String, address: String },
    Scanned { wallet: String, report: ScanReport },
    /// `broadcast_error` is set when sending was requested and failed;
    /// the transaction is still `Constructed` and can be exported.
    Transaction { transaction: Transaction, broadcast_error: Option<String> },
    /// The user declined a confirmation. Nothing was changed.
    Aborted { reason: String },
}

impl Outcome {
    /// True when the invocation did what was asked
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Aborted { .. } => false,
            Outcome::Transaction { broadcast_error, .. } => broadcast_error.is_none(),
            _ => true,
        }
    }
}

pub struct Orchestrator<'a, P: ConfirmationPort> {
    store: &'a WalletStore,
    chain: &'a dyn ChainBackend,
    port: P,
    options: SessionOptions,
}

impl<'a, P: ConfirmationPort> Orchestrator<'a, P> {
    pub fn new(store: &'a WalletStore, chain: &'a dyn ChainBackend, port: P, options: SessionOptions) -> Self {
        Self { store, chain, port, options }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    pub async fn run(&mut self, command: Command) -> WalletResult<Outcome> {
        match command {
            Command::ListWallets => Ok(Outcome::Wallets { wallets: self.store.list()?.collect() }),
            Command::CreateWallet { name, network, passphrase, owner } => {
                self.create(&name, network, passphrase, &owner)
            }
            Command::DeleteWallet { wallet } => self.delete(&wallet),
            Command::WalletInfo { wallet } => {
                let mut session = self.session(&wallet)?;
                Ok(Outcome::Info { info: session.info().await? })
            }
            Command::Receive { wallet } => {
                let mut session = self.session(&wallet)?;
                let address = session.get_receive_address()?;
                Ok(Outcome::ReceiveAddress { wallet: session.record().name.clone(), address })
            }
            Command::Scan { wallet } => {
                let mut session = self.session(&wallet)?;
                let report = session.scan().await?;
                Ok(Outcome::Scanned { wallet: session.record().name.clone(), report })
            }
            Command::Send { wallet, outputs, fee, broadcast } => {
                let request = TransactionRequest::parse(&outputs, &fee)?;
                let mut session = self.session(&wallet)?;
                let mut transaction = session.build_transaction(&request)?;
                let mut broadcast_error = None;
                if broadcast {
                    match session.broadcast(&mut transaction).await {
                        Ok(_) => {}
                        Err(WalletError::BroadcastFailure(reason)) => broadcast_error = Some(reason),
                        Err(e) => return Err(e),
                    }
                }
                Ok(Outcome::Transaction { transaction, broadcast_error })
            }
        }
    }

    fn session(&self, wallet: &NameOrId) -> WalletResult<WalletSession<'a>> {
        WalletSession::open(self.store, self.chain, wallet, self.options)
    }

    fn create(&mut self, name: &str, network: Network, source: PassphraseSource, owner: &str) -> WalletResult<Outcome> {
        if let NameOrId::Id(_) = NameOrId::parse(name) {
            return Err(WalletError::MalformedRequest(format!("wallet name '{}' must not be numeric", name)));
        }
        if self.store.exists(&NameOrId::Name(name.to_string())) {
            return Err(WalletError::DuplicateName(name.to_string()));
        }

        let passphrase = match source {
            PassphraseSource::Generate { strength } => {
                let generated = Passphrase::generate(strength)?;
                self.port.notify(&format!(
                    "Your mnemonic private key sentence is: {}\n\n\
                     Please write down on paper and backup. With this key you can restore your wallet and all keys",
                    generated.phrase().as_str()
                ));
                let answer = self.port.prompt("Type 'yes' if you understood and wrote down your key: ")?;
                if !ACKNOWLEDGE.contains(&answer.trim()) {
                    info!(wallet = %name, "wallet creation aborted");
                    return Ok(Outcome::Aborted { reason: "passphrase not acknowledged".into() });
                }
                generated
            }
            PassphraseSource::Prompt => {
                let typed = Zeroizing::new(self.port.prompt("Enter passphrase: ")?);
                Passphrase::parse(&typed)?
            }
            PassphraseSource::Words(words) => Passphrase::from_words(words)?,
        };

        let seed = passphrase.to_seed("")?;
        let root = derive_root(&seed, network)?;
        let record = self.store.create_with(NewWallet { name, network, root_key: &root, owner, parent_id: None })?;

        let mut session = WalletSession::from_record(self.store, self.chain, record, self.options)?;
        let receive_address = session.get_receive_address()?;
        Ok(Outcome::Created { wallet: session.record().summary(), receive_address })
    }

    fn delete(&mut self, wallet: &NameOrId) -> WalletResult<Outcome> {
        if !self.store.exists(wallet) {
            return Err(WalletError::NotFound(wallet.to_string()));
        }
        let typed = wallet.to_string();
        let answer = self.port.prompt(&format!(
            "Wallet '{}' with all keys will be removed, without private key it cannot be restored.\n\
             Please retype exact name of wallet to proceed: ",
            typed
        ))?;
        if answer != typed {
            info!(wallet = %typed, "deletion not confirmed");
            return Ok(Outcome::Aborted { reason: "wallet name not confirmed".into() });
        }
        if !self.store.delete(wallet, true) {
            warn!(wallet = %typed, "store refused deletion");
            return Err(WalletError::DeletionFailed(typed));
        }
        Ok(Outcome::Deleted { wallet: typed })
    }
}
