//! Error types for Credit Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CreditError {
    /// An `amount` field was present but not numeric. Aborts the whole run.
    #[error("Malformed amount for wallet {wallet}: {value}")]
    MalformedAmount { wallet: String, value: String },
}

pub type CreditResult<T> = Result<T, CreditError>;
