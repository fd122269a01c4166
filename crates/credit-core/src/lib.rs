//! # Credit Core
//!
//! Behavioral credit scoring for lending-protocol wallets.
//!
//! This crate turns an unordered stream of raw lending transactions
//! (deposits, borrows, repayments, withdrawals, liquidations) into one
//! feature record per wallet, and maps each record to a score in 0-1000.

pub mod error;
pub mod features;
pub mod models;
pub mod scoring;

pub use error::*;
pub use features::*;
pub use models::*;
pub use scoring::*;
