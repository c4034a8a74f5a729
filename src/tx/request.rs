//! TransactionRequest - raw command-line strings turned into typed outputs

use crate::core::{WalletError, WalletResult};

/// Destination/amount pairs plus the fee, all in satoshis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub outputs: Vec<(String, u64)>,
    pub fee: u64,
}

impl TransactionRequest {
    /// Parse a flat `address amount [address amount ...]` list and a fee.
    ///
    /// Checks run in a fixed order and stop at the first failure: pairing,
    /// then every amount, then the fee.
    pub fn parse<S: AsRef<str>>(args: &[S], fee: &str) -> WalletResult<Self> {
        if args.is_empty() {
            return Err(WalletError::MalformedRequest("no outputs given, use <address> <amount> ...".into()));
        }
        if args.len() % 2 != 0 {
            return Err(WalletError::MalformedRequest(format!(
                "{} arguments given, use <address1> <amount1> ... <address_n> <amount_n>",
                args.len()
            )));
        }

        let mut outputs = Vec::with_capacity(args.len() / 2);
        for pair in args.chunks(2) {
            let (address, literal) = (pair[0].as_ref(), pair[1].as_ref());
            let amount = parse_sats(literal).ok_or_else(|| WalletError::InvalidAmount(literal.to_string()))?;
            outputs.push((address.to_string(), amount));
        }
        let fee = parse_sats(fee).ok_or_else(|| WalletError::InvalidFee(fee.to_string()))?;

        let request = Self { outputs, fee };
        request.total()?;
        Ok(request)
    }

    /// Sum of amounts plus fee
    pub fn total(&self) -> WalletResult<u64> {
        self.outputs
            .iter()
            .try_fold(self.fee, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or_else(|| WalletError::MalformedRequest("total amount overflows".into()))
    }
}

/// Decimal digits only, must fit in u64
fn parse_sats(literal: &str) -> Option<u64> {
    if literal.is_empty() || !literal.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    literal.parse().ok()
}
