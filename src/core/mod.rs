pub mod errors;
pub mod paths;

pub use errors::{WalletError, WalletResult};
