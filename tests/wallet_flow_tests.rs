//! Wallet flow tests - full command sequences against a file store and an in-memory chain
//!
//! These tests verify:
//! 1. Create / info / list / delete through the orchestrator
//! 2. Passphrase rules (word count, recovery determinism)
//! 3. Send validation order and coin selection outcomes
//! 4. Broadcast success and failure bookkeeping
//! 5. Scan idempotence and persistence across store reloads

use clwallet::wallet::{WalletRecord, WalletSummary};
use clwallet::{
    Command, MemoryChain, NameOrId, Network, Orchestrator, Outcome, PassphraseSource, ScriptedPort, SessionOptions,
    TxState, WalletError, WalletResult, WalletSession, WalletStore,
};
use once_cell::sync::Lazy;
use tempfile::TempDir;

const ALICE_WORDS: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";

// BIP84 receive addresses 0 and 1 of "abandon ... about", used as payment destinations
const DEST_1: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
const DEST_2: &str = "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g";

/// First receive address of alice
static ALICE_RECEIVE_0: Lazy<String> = Lazy::new(|| {
    let seed = clwallet::Passphrase::parse(ALICE_WORDS).unwrap().to_seed("").unwrap();
    let root = clwallet::derive_root(&seed, Network::Bitcoin).unwrap();
    root.address(clwallet::Keychain::External, 0).unwrap()
});

struct Harness {
    dir: TempDir,
    store: WalletStore,
    chain: MemoryChain,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = WalletStore::load(&dir.path().join("wallets.json")).expect("store");
        Self { dir, store, chain: MemoryChain::new() }
    }

    async fn run(&self, answers: &[&str], command: Command) -> WalletResult<Outcome> {
        let port = ScriptedPort::new(answers.iter().copied());
        let mut orch = Orchestrator::new(&self.store, &self.chain, port, SessionOptions::default());
        orch.run(command).await
    }

    async fn create_alice(&self) -> String {
        match self.run(&[], recover_alice()).await.expect("create alice") {
            Outcome::Created { receive_address, .. } => receive_address,
            other => panic!("Expected Created, got {:?}", other),
        }
    }

    async fn funded_alice(&self, amounts: &[u64]) {
        let address = self.create_alice().await;
        for amount in amounts {
            self.chain.fund(&address, *amount);
        }
        self.run(&[], Command::Scan { wallet: "alice".into() }).await.expect("scan");
    }

    fn alice(&self) -> WalletRecord {
        self.store.open(&"alice".into()).expect("alice")
    }

    async fn listed(&self) -> Vec<WalletSummary> {
        match self.run(&[], Command::ListWallets).await.unwrap() {
            Outcome::Wallets { wallets } => wallets,
            other => panic!("Expected Wallets, got {:?}", other),
        }
    }
}

fn recover_alice() -> Command {
    Command::CreateWallet {
        name: "alice".into(),
        network: Network::Bitcoin,
        passphrase: PassphraseSource::Words(vec![ALICE_WORDS.into()]),
        owner: String::new(),
    }
}

fn send(outputs: &[&str], fee: &str, broadcast: bool) -> Command {
    Command::Send {
        wallet: "alice".into(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        fee: fee.into(),
        broadcast,
    }
}

#[tokio::test]
async fn create_then_info() {
    let h = Harness::new();
    let receive = h.create_alice().await;
    assert_eq!(receive, *ALICE_RECEIVE_0);

    match h.run(&[], Command::WalletInfo { wallet: "alice".into() }).await.unwrap() {
        Outcome::Info { info } => {
            assert_eq!(info.id, 1);
            assert_eq!(info.name, "alice");
            assert_eq!(info.network, Network::Bitcoin);
            assert_eq!(info.balance, 0);
        }
        other => panic!("Expected Info, got {:?}", other),
    }

    // root key is derivable again from the stored record
    let record = h.alice();
    let root = clwallet::RootKey::decode(&record.root_key, Network::Bitcoin).unwrap();
    assert_eq!(root.address(clwallet::Keychain::External, 0).unwrap(), *ALICE_RECEIVE_0);
}

#[tokio::test]
async fn info_by_id() {
    let h = Harness::new();
    h.create_alice().await;
    let outcome = h.run(&[], Command::WalletInfo { wallet: NameOrId::parse("1") }).await.unwrap();
    assert!(matches!(outcome, Outcome::Info { info } if info.name == "alice"));
}

#[tokio::test]
async fn missing_wallet_suggests_create() {
    let h = Harness::new();
    let err = h.run(&[], Command::Receive { wallet: "bob".into() }).await.unwrap_err();
    assert!(matches!(err, WalletError::NotFound(_)));
    assert!(err.is_recoverable());
    assert!(err.suggestion().unwrap().contains("create-wallet bob"));
}

#[tokio::test]
async fn short_passphrase_creates_nothing() {
    let h = Harness::new();
    let eleven: Vec<String> = ALICE_WORDS.split(' ').skip(1).map(String::from).collect();
    let cmd = Command::CreateWallet {
        name: "alice".into(),
        network: Network::Bitcoin,
        passphrase: PassphraseSource::Words(eleven),
        owner: String::new(),
    };
    assert!(matches!(h.run(&[], cmd).await, Err(WalletError::InvalidPassphrase(_))));
    assert!(h.listed().await.is_empty());
}

#[tokio::test]
async fn recovery_is_deterministic() {
    let first = Harness::new();
    let second = Harness::new();
    assert_eq!(first.create_alice().await, second.create_alice().await);
    assert_eq!(first.alice().root_key, second.alice().root_key);
}

#[tokio::test]
async fn send_two_outputs_with_change() {
    let h = Harness::new();
    h.funded_alice(&[10_000]).await;

    match h.run(&[], send(&[DEST_1, "1000", DEST_2, "2000"], "500", false)).await.unwrap() {
        Outcome::Transaction { transaction, broadcast_error } => {
            assert!(broadcast_error.is_none());
            assert_eq!(transaction.state, TxState::Constructed);
            let requested: Vec<(&str, u64)> = transaction
                .outputs
                .iter()
                .filter(|o| !o.change)
                .map(|o| (o.address.as_str(), o.amount))
                .collect();
            assert_eq!(requested, vec![(DEST_1, 1000), (DEST_2, 2000)]);
            assert_eq!(transaction.change().unwrap().amount, 6_500);
            assert_eq!(transaction.fee, 500);
            assert!(!transaction.raw_hex.is_empty());
        }
        other => panic!("Expected Transaction, got {:?}", other),
    }

    // nothing was broadcast, nothing was spent
    assert!(h.chain.broadcasts().is_empty());
    assert!(h.alice().utxos.iter().all(|u| !u.spent));
}

#[tokio::test]
async fn send_insufficient_funds() {
    let h = Harness::new();
    h.funded_alice(&[1_000, 2_000]).await;

    match h.run(&[], send(&[DEST_1, "1000", DEST_2, "2000"], "500", false)).await {
        Err(WalletError::InsufficientFunds { available, required }) => {
            assert_eq!(available, 3_000);
            assert_eq!(required, 3_500);
        }
        other => panic!("Expected InsufficientFunds, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn send_validation_leaves_utxos_unchanged() {
    let h = Harness::new();
    h.funded_alice(&[10_000]).await;
    let before = h.alice().utxos;

    let odd = h.run(&[], send(&[DEST_1, "1000", DEST_2], "500", false)).await;
    assert!(matches!(odd, Err(WalletError::MalformedRequest(_))));

    match h.run(&[], send(&[DEST_1, "1o00"], "500", false)).await {
        Err(WalletError::InvalidAmount(literal)) => assert_eq!(literal, "1o00"),
        other => panic!("Expected InvalidAmount, got {:?}", other.map(|_| ())),
    }

    let bad_fee = h.run(&[], send(&[DEST_1, "1000"], "five", true)).await;
    assert!(matches!(bad_fee, Err(WalletError::InvalidFee(_))));

    assert_eq!(h.alice().utxos, before);
    assert!(h.chain.broadcasts().is_empty());
}

#[tokio::test]
async fn broadcast_marks_inputs_spent() {
    let h = Harness::new();
    h.funded_alice(&[10_000]).await;

    let txid = match h.run(&[], send(&[DEST_1, "1000", DEST_2, "2000"], "500", true)).await.unwrap() {
        Outcome::Transaction { transaction, broadcast_error: None } => match transaction.state {
            TxState::Broadcast { txid } => txid,
            other => panic!("Expected Broadcast, got {:?}", other),
        },
        other => panic!("Expected sent Transaction, got {:?}", other),
    };
    assert_eq!(h.chain.broadcasts().len(), 1);

    let alice = h.alice();
    assert!(alice.utxos.iter().all(|u| u.spent));
    assert_eq!(alice.balance(), 0);
    let change = alice.addresses.iter().find(|a| a.keychain == clwallet::Keychain::Internal).unwrap();
    assert!(change.used);

    // the next scan picks up the change output and drops the spent one
    h.run(&[], Command::Scan { wallet: "alice".into() }).await.unwrap();
    let alice = h.alice();
    assert_eq!(alice.balance(), 6_500);
    assert!(alice.utxos.iter().all(|u| u.txid == txid && !u.spent));
}

#[tokio::test]
async fn failed_broadcast_keeps_transaction() {
    let h = Harness::new();
    h.funded_alice(&[10_000]).await;
    h.chain.reject_broadcasts(Some("min relay fee not met"));

    let outcome = h.run(&[], send(&[DEST_1, "1000"], "0", true)).await.unwrap();
    assert!(!outcome.is_success());
    let mut transaction = match outcome {
        Outcome::Transaction { transaction, broadcast_error: Some(reason) } => {
            assert!(reason.contains("min relay fee"));
            transaction
        }
        other => panic!("Expected failed Transaction, got {:?}", other),
    };
    assert_eq!(transaction.state, TxState::Constructed);
    assert!(h.alice().utxos.iter().all(|u| !u.spent));

    // the kept transaction can be retried as is
    h.chain.reject_broadcasts(None);
    let mut session = WalletSession::open(&h.store, &h.chain, &"alice".into(), SessionOptions::default()).unwrap();
    let txid = session.broadcast(&mut transaction).await.unwrap();
    assert_eq!(txid, transaction.txid);
    assert!(transaction.is_broadcast());
    assert!(h.alice().utxos.iter().all(|u| u.spent));
}

#[tokio::test]
async fn recovered_wallet_finds_change_funds() {
    let h = Harness::new();
    h.funded_alice(&[10_000]).await;
    h.run(&[], send(&[DEST_1, "1000"], "500", true)).await.unwrap();
    h.run(&[], Command::Scan { wallet: "alice".into() }).await.unwrap();
    let original = h.alice();
    assert_eq!(original.balance(), 8_500);

    // same words, fresh store, same chain
    let dir = TempDir::new().unwrap();
    let store = WalletStore::load(&dir.path().join("wallets.json")).unwrap();
    let mut orch = Orchestrator::new(&store, &h.chain, ScriptedPort::default(), SessionOptions::default());
    orch.run(recover_alice()).await.unwrap();
    match orch.run(Command::Scan { wallet: "alice".into() }).await.unwrap() {
        Outcome::Scanned { report, .. } => assert_eq!(report.balance, original.balance()),
        other => panic!("Expected Scanned, got {:?}", other),
    }

    let recovered = store.open(&"alice".into()).unwrap();
    assert_eq!(recovered.utxos, original.utxos);
    let funded_change = &recovered.utxos[0].address;
    assert_eq!(recovered.find_address(funded_change).unwrap().keychain, clwallet::Keychain::Internal);

    // the next change output goes to a fresh change address
    match orch.run(send(&[DEST_2, "1000"], "500", false)).await.unwrap() {
        Outcome::Transaction { transaction, .. } => {
            assert_ne!(&transaction.change().unwrap().address, funded_change);
        }
        other => panic!("Expected Transaction, got {:?}", other),
    }
}

#[tokio::test]
async fn sent_transaction_reported_when_store_write_fails() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let store = WalletStore::load(&data.join("wallets.json")).unwrap();
    let chain = MemoryChain::new();
    let mut orch = Orchestrator::new(&store, &chain, ScriptedPort::default(), SessionOptions::default());
    let receive = match orch.run(recover_alice()).await.unwrap() {
        Outcome::Created { receive_address, .. } => receive_address,
        other => panic!("Expected Created, got {:?}", other),
    };
    chain.fund(&receive, 10_000);
    orch.run(Command::Scan { wallet: "alice".into() }).await.unwrap();

    // a plain file where the data directory was makes every later write fail
    std::fs::remove_dir_all(&data).unwrap();
    std::fs::write(&data, b"").unwrap();

    match orch.run(send(&[DEST_1, "1000"], "500", true)).await.unwrap() {
        Outcome::Transaction { transaction, broadcast_error: None } => {
            assert_eq!(transaction.state, TxState::Broadcast { txid: transaction.txid.clone() });
        }
        other => panic!("Expected sent Transaction, got {:?}", other),
    }
    assert_eq!(chain.broadcasts().len(), 1);
    assert!(chain.utxos_for(&receive).is_empty());
}

#[tokio::test]
async fn scan_twice_is_idempotent() {
    let h = Harness::new();
    h.funded_alice(&[4_000, 6_000]).await;
    let first = h.alice();

    match h.run(&[], Command::Scan { wallet: "alice".into() }).await.unwrap() {
        Outcome::Scanned { report, .. } => {
            assert!(!report.changed);
            assert_eq!(report.balance, 10_000);
        }
        other => panic!("Expected Scanned, got {:?}", other),
    }
    let second = h.alice();
    assert_eq!(first.utxos, second.utxos);
    assert_eq!(first.addresses, second.addresses);
}

#[tokio::test]
async fn receive_moves_on_after_funds_arrive() {
    let h = Harness::new();
    let first = h.create_alice().await;

    let again = h.run(&[], Command::Receive { wallet: "alice".into() }).await.unwrap();
    assert!(matches!(again, Outcome::ReceiveAddress { ref address, .. } if *address == first));

    h.chain.fund(&first, 1_000);
    h.run(&[], Command::Scan { wallet: "alice".into() }).await.unwrap();
    match h.run(&[], Command::Receive { wallet: "alice".into() }).await.unwrap() {
        Outcome::ReceiveAddress { address, .. } => assert_ne!(address, first),
        other => panic!("Expected ReceiveAddress, got {:?}", other),
    }
}

#[tokio::test]
async fn delete_needs_exact_name() {
    let h = Harness::new();
    h.create_alice().await;

    let outcome = h.run(&["alice "], Command::DeleteWallet { wallet: "alice".into() }).await.unwrap();
    assert!(matches!(outcome, Outcome::Aborted { .. }));
    assert_eq!(h.listed().await.len(), 1);

    let outcome = h.run(&["1"], Command::DeleteWallet { wallet: NameOrId::parse("1") }).await.unwrap();
    assert!(matches!(outcome, Outcome::Deleted { .. }));
    assert!(h.listed().await.is_empty());
}

#[tokio::test]
async fn store_survives_reload() {
    let h = Harness::new();
    h.funded_alice(&[2_500]).await;

    let reloaded = WalletStore::load(&h.dir.path().join("wallets.json")).unwrap();
    let summaries: Vec<WalletSummary> = reloaded.list().unwrap().collect();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "alice");
    assert_eq!(reloaded.open(&"alice".into()).unwrap().balance(), 2_500);
}
