//! clw - command line wallet
//!
//!   clw list-wallets                         → [id] name (network) owner
//!   clw create-wallet <name> [--passphrase <words>...]
//!   clw wallet-info <name|id>                → refresh utxos, show wallet
//!   clw receive <name|id>                    → unused receive address
//!   clw scan <name|id>                       → discover addresses and utxos
//!   clw send <name|id> <addr> <amount>... --fee <sats> [--broadcast]
//!   clw delete-wallet <name|id>              → asks for the exact name
//!
//! Running without a command lists wallets. `--json` prints outcomes as JSON.
//! Errors are always a JSON object on stderr with a non-zero exit status.

use anyhow::Context;
use clap::{Parser, Subcommand};
use clwallet::config::load_dotenv;
use clwallet::core::paths::files;
use clwallet::logging::init_logging;
use clwallet::runtime::until_interrupted;
use clwallet::wallet::WalletSummary;
use clwallet::{
    Command, Config, ElectrumChain, NameOrId, Network, Orchestrator, Outcome, PassphraseSource, StdioPort,
    Transaction, TxState, WalletError, WalletInfo, WalletStore,
};
use serde_json::json;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "clw")]
#[command(version)]
#[command(about = "Command line HD wallet: create, scan, receive and send")]
struct Cli {
    /// Data directory (wallets.json, config.json)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Network: bitcoin, testnet, signet or regtest
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Electrum server URL (overrides the network default)
    #[arg(long, global = true)]
    electrum: Option<String>,

    /// Network timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List all top-level wallets
    ListWallets,
    /// Refresh utxos and show wallet information
    WalletInfo { wallet: String },
    /// Create a wallet, from a new or a given passphrase
    CreateWallet {
        name: String,
        /// Passphrase to recover a wallet. Without words you are prompted for it.
        #[arg(long, num_args = 0..)]
        passphrase: Option<Vec<String>>,
        /// Bits of entropy for a generated passphrase
        #[arg(long)]
        passphrase_strength: Option<u32>,
        /// Owner shown in the wallet list
        #[arg(long, default_value = "")]
        owner: String,
    },
    /// Remove a wallet and all its keys
    DeleteWallet { wallet: String },
    /// Show an unused address to receive funds
    Receive { wallet: String },
    /// Update the wallet with all addresses, transactions and balances
    Scan { wallet: String },
    /// Create a transaction: <address> <amount> [<address> <amount> ...]
    Send {
        wallet: String,
        #[arg(num_args = 1.., allow_negative_numbers = true)]
        outputs: Vec<String>,
        /// Transaction fee in satoshis
        #[arg(short, long, allow_hyphen_values = true)]
        fee: Option<String>,
        /// Push the transaction to the network
        #[arg(short = 'p', long)]
        broadcast: bool,
    },
}

fn main() {
    load_dotenv(Path::new(files::DOTENV));
    init_logging();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let json_output = cli.json;

    match run(cli) {
        Ok(outcome) => {
            if json_output {
                match serde_json::to_string_pretty(&outcome) {
                    Ok(text) => println!("{}", text),
                    Err(e) => fail(&anyhow::Error::from(e)),
                }
            } else {
                print_outcome(&outcome);
            }
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Err(e) => fail(&e),
    }
}

fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let mut config = Config::load(cli.data_dir)?;
    if let Some(network) = &cli.network {
        config = config.with_network(network.parse::<Network>()?);
    }
    if let Some(url) = cli.electrum {
        config = config.with_electrum(url);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(secs);
    }
    config.validate()?;

    let command = to_command(cli.command, &config);
    debug!(data_dir = %config.data_dir.display(), network = %config.network, "config loaded");

    let store = WalletStore::load(&config.store_path())?;
    let chain = ElectrumChain::new(config.electrum_url.clone(), config.timeout_secs);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let mut orchestrator = Orchestrator::new(&store, &chain, StdioPort, config.session_options());
    let outcome = runtime.block_on(until_interrupted(orchestrator.run(command)))?;
    Ok(outcome)
}

fn to_command(cmd: Option<Cmd>, config: &Config) -> Command {
    match cmd {
        None | Some(Cmd::ListWallets) => Command::ListWallets,
        Some(Cmd::WalletInfo { wallet }) => Command::WalletInfo { wallet: NameOrId::parse(&wallet) },
        Some(Cmd::CreateWallet { name, passphrase, passphrase_strength, owner }) => Command::CreateWallet {
            name,
            network: config.network,
            passphrase: match passphrase {
                None => PassphraseSource::Generate {
                    strength: passphrase_strength.unwrap_or(config.passphrase_strength),
                },
                Some(words) if words.is_empty() => PassphraseSource::Prompt,
                Some(words) => PassphraseSource::Words(words),
            },
            owner,
        },
        Some(Cmd::DeleteWallet { wallet }) => Command::DeleteWallet { wallet: NameOrId::parse(&wallet) },
        Some(Cmd::Receive { wallet }) => Command::Receive { wallet: NameOrId::parse(&wallet) },
        Some(Cmd::Scan { wallet }) => Command::Scan { wallet: NameOrId::parse(&wallet) },
        Some(Cmd::Send { wallet, outputs, fee, broadcast }) => Command::Send {
            wallet: NameOrId::parse(&wallet),
            outputs,
            fee: fee.unwrap_or_default(),
            broadcast,
        },
    }
}

fn fail(e: &anyhow::Error) -> ! {
    let wallet_error = e.downcast_ref::<WalletError>();
    let err = json!({
        "error": e.to_string(),
        "kind": wallet_error.map(|w| w.kind()),
        "suggestion": wallet_error.and_then(|w| w.suggestion()),
    });
    let text = if std::io::stderr().is_terminal() {
        serde_json::to_string_pretty(&err)
    } else {
        serde_json::to_string(&err)
    };
    eprintln!("{}", text.unwrap_or_else(|_| e.to_string()));
    std::process::exit(1);
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Wallets { wallets } => print_wallets(wallets),
        Outcome::Created { wallet, receive_address } => {
            println!("Wallet '{}' created ({} network)", wallet.name, wallet.network);
            println!("Receive address is {}", receive_address);
        }
        Outcome::Deleted { wallet } => println!("Wallet {} has been removed", wallet),
        Outcome::Info { info } => print_info(info),
        Outcome::ReceiveAddress { address, .. } => println!("Receive address is {}", address),
        Outcome::Scanned { wallet, report } => {
            println!(
                "Scanned wallet {}: {} addresses ({} used), {} utxos, balance {}",
                wallet, report.addresses, report.used, report.utxos, report.balance
            );
        }
        Outcome::Transaction { transaction, broadcast_error } => {
            print_transaction(transaction, broadcast_error.as_deref())
        }
        Outcome::Aborted { reason } => eprintln!("Aborted: {}", reason),
    }
}

fn print_wallets(wallets: &[WalletSummary]) {
    println!("clwallet wallets:");
    for w in wallets {
        println!("[{}] {} ({}) {}", w.id, w.name, w.network, w.owner);
    }
}

fn print_info(info: &WalletInfo) {
    println!("Wallet info for {}", info.name);
    println!("  id       {}", info.id);
    println!("  network  {}", info.network);
    if !info.owner.is_empty() {
        println!("  owner    {}", info.owner);
    }
    println!("  balance  {}", info.balance);
    println!("Addresses");
    for a in &info.addresses {
        let keychain = match a.keychain {
            clwallet::Keychain::External => "receive",
            clwallet::Keychain::Internal => "change",
        };
        let used = if a.used { "used" } else { "unused" };
        println!("- {} {}/{} {} {}", a.address, keychain, a.index, used, a.balance);
    }
    if !info.utxos.is_empty() {
        println!("Unspent outputs");
        for u in &info.utxos {
            let height = u.height.map(|h| h.to_string()).unwrap_or_else(|| "unconfirmed".into());
            println!("- {} {} {} ({})", u.outpoint(), u.address, u.amount, height);
        }
    }
}

fn print_transaction(tx: &Transaction, broadcast_error: Option<&str>) {
    println!("Transaction created");
    println!("Inputs");
    for i in &tx.inputs {
        println!("- {} {}:{}", i.address, i.txid, i.vout);
    }
    println!("Outputs");
    for o in &tx.outputs {
        let change = if o.change { " (change)" } else { "" };
        println!("- {} {}{}", o.address, o.amount, change);
    }
    println!("Fee {}", tx.fee);
    match (&tx.state, broadcast_error) {
        (TxState::Broadcast { txid }, _) => println!("Transaction sent: {}", txid),
        (TxState::Constructed, Some(reason)) => {
            eprintln!("Broadcast failed: {}", reason);
            println!("Raw transaction to analyse or send online: {}", tx.raw_hex);
        }
        (TxState::Constructed, None) => {
            println!("Transaction not sent yet. Raw transaction to analyse or send online: {}", tx.raw_hex)
        }
    }
}
