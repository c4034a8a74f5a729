//! Runtime - Ctrl+C cancellation for a single invocation
//!
//! Dropping a wallet future is safe: sessions persist only after every chain
//! call of an operation has returned.

use crate::core::{WalletError, WalletResult};
use std::future::Future;

/// Run `fut` to completion unless the process is interrupted first.
pub async fn until_interrupted<F, T>(fut: F) -> WalletResult<T>
where
    F: Future<Output = WalletResult<T>>,
{
    tokio::select! {
        result = fut => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C");
            Err(WalletError::Aborted("interrupted".into()))
        }
    }
}
