//! Transaction builder - largest-first selection and P2WPKH signing
//!
//! Selection is deterministic: unspent outputs sorted by amount (descending),
//! ties broken by `(txid, vout)` ascending, taken until `amounts + fee` is covered.

use super::{Transaction, TransactionRequest, TxInput, TxOutput, TxState};
use crate::core::{WalletError, WalletResult};
use crate::identity::{Keychain, RootKey};
use crate::wallet::{AddressRecord, Utxo, WalletRecord};
use bitcoin::absolute::LockTime;
use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    consensus, Address, Amount, CompressedPublicKey, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness,
};
use std::str::FromStr;
use tracing::debug;

/// Change below this many sats is added to the fee instead of creating an output
pub const DUST_LIMIT: u64 = 546;

/// Pick unspent outputs covering `required`. Returns the selection and its total.
pub fn select_utxos(record: &WalletRecord, required: u64) -> WalletResult<(Vec<Utxo>, u64)> {
    let mut candidates: Vec<&Utxo> = record.unspent().collect();
    candidates.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| (&a.txid, a.vout).cmp(&(&b.txid, b.vout))));

    let mut selected = Vec::new();
    let mut total = 0u64;
    for utxo in candidates {
        if total >= required && !selected.is_empty() {
            break;
        }
        total += utxo.amount;
        selected.push(utxo.clone());
    }
    if total < required || selected.is_empty() {
        return Err(WalletError::InsufficientFunds { available: record.balance(), required });
    }
    Ok((selected, total))
}

/// Build and sign a transaction for `request`. The wallet record is not modified.
pub fn build(record: &WalletRecord, root: &RootKey, request: &TransactionRequest) -> WalletResult<Transaction> {
    let network = record.network.to_bitcoin();
    let mut recipients = Vec::with_capacity(request.outputs.len());
    for (address, amount) in &request.outputs {
        let checked = Address::from_str(address)
            .and_then(|a| a.require_network(network))
            .map_err(|_| WalletError::InvalidAddress { address: address.clone(), network: record.network.to_string() })?;
        recipients.push((checked, *amount));
    }

    let required = request.total()?;
    let (selected, selected_total) = select_utxos(record, required)?;

    let mut outputs: Vec<TxOutput> = request
        .outputs
        .iter()
        .map(|(address, amount)| TxOutput { address: address.clone(), amount: *amount, change: false })
        .collect();
    let mut fee = request.fee;
    let mut change_address = None;
    let change = selected_total - required;
    if change >= DUST_LIMIT {
        let (index, address) = match record.first_unused(Keychain::Internal) {
            Some(known) => (known.index, known.address.clone()),
            None => {
                let index = record.next_index(Keychain::Internal);
                (index, root.address(Keychain::Internal, index)?)
            }
        };
        let checked = Address::from_str(&address)
            .and_then(|a| a.require_network(network))
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        recipients.push((checked, change));
        outputs.push(TxOutput { address: address.clone(), amount: change, change: true });
        change_address = Some(AddressRecord { address, keychain: Keychain::Internal, index, used: false });
    } else {
        fee += change;
    }

    let mut input = Vec::with_capacity(selected.len());
    for utxo in &selected {
        let txid = Txid::from_str(&utxo.txid).map_err(|e| WalletError::Store(format!("utxo {}: {}", utxo.outpoint(), e)))?;
        input.push(TxIn {
            previous_output: OutPoint { txid, vout: utxo.vout },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        });
    }
    let unsigned = bitcoin::Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output: recipients
            .iter()
            .map(|(address, amount)| TxOut { value: Amount::from_sat(*amount), script_pubkey: address.script_pubkey() })
            .collect(),
    };

    let signed = sign(record, root, unsigned, &selected)?;
    let txid = signed.compute_txid().to_string();
    debug!(
        wallet = %record.name,
        %txid,
        inputs = selected.len(),
        outputs = outputs.len(),
        fee,
        change = change_address.is_some(),
        "transaction built"
    );

    Ok(Transaction {
        txid,
        inputs: selected
            .iter()
            .map(|u| TxInput { txid: u.txid.clone(), vout: u.vout, address: u.address.clone(), amount: u.amount })
            .collect(),
        outputs,
        fee,
        raw_hex: hex::encode(consensus::encode::serialize(&signed)),
        state: TxState::Constructed,
        change_address,
    })
}

fn sign(
    record: &WalletRecord,
    root: &RootKey,
    tx: bitcoin::Transaction,
    spent: &[Utxo],
) -> WalletResult<bitcoin::Transaction> {
    let secp = Secp256k1::new();
    let mut cache = SighashCache::new(tx);
    for (i, utxo) in spent.iter().enumerate() {
        let owner = record
            .find_address(&utxo.address)
            .ok_or_else(|| WalletError::Derivation(format!("no key for address {}", utxo.address)))?;
        let (sk, pk) = root.key_pair(owner.keychain, owner.index)?;
        let script = ScriptBuf::new_p2wpkh(&CompressedPublicKey(pk).wpubkey_hash());
        let sighash = cache
            .p2wpkh_signature_hash(i, &script, Amount::from_sat(utxo.amount), EcdsaSighashType::All)
            .map_err(|e| WalletError::Derivation(format!("sighash: {}", e)))?;
        let signature = secp.sign_ecdsa(&Message::from_digest(sighash.to_byte_array()), &sk);
        let signature = ecdsa::Signature { signature, sighash_type: EcdsaSighashType::All };
        let witness = cache
            .witness_mut(i)
            .ok_or_else(|| WalletError::Derivation(format!("input {} out of range", i)))?;
        witness.clear();
        witness.push(signature.serialize());
        witness.push(pk.serialize());
    }
    Ok(cache.into_transaction())
}
