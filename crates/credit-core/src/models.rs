//! Data models for wallet credit scoring
//!
//! Raw transactions arrive as loosely-typed field bags so that the same
//! logical field can be read from any of its aliases. Everything derived
//! from them (feature records, scored rows) is strongly typed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Field Alias Table
// =============================================================================

/// Candidate keys for the wallet identity, in priority order.
pub const WALLET_KEYS: &[&str] = &["user", "wallet", "address"];

/// Candidate keys for the action/type string, in priority order.
pub const ACTION_KEYS: &[&str] = &["action", "type"];

/// Candidate keys for the timestamp, in priority order.
pub const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time"];

pub const AMOUNT_KEY: &str = "amount";

pub const ASSET_KEY: &str = "asset";

// =============================================================================
// Raw Transaction
// =============================================================================

/// A single raw lending-protocol transaction.
///
/// Only the aliased fields above are interpreted; any other key is carried
/// along untouched and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction {
    fields: Map<String, Value>,
}

impl Transaction {
    /// Build a transaction from an arbitrary JSON value.
    ///
    /// Anything other than an object becomes an empty field bag, which has
    /// no wallet identity and is therefore dropped from aggregation.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Wallet identity: the first alias holding a non-empty string.
    pub fn wallet(&self) -> Option<&str> {
        self.first_non_empty_str(WALLET_KEYS)
    }

    /// Action/type string, taken verbatim (no trimming or case folding).
    pub fn action(&self) -> Option<&str> {
        self.first_non_empty_str(ACTION_KEYS)
    }

    pub fn asset(&self) -> Option<&str> {
        self.first_non_empty_str(&[ASSET_KEY])
    }

    /// Unparsed timestamp value: the first alias that is neither null nor an
    /// empty string. Parsing happens in the feature extractor.
    pub fn raw_timestamp(&self) -> Option<&Value> {
        TIMESTAMP_KEYS
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .find(|value| is_present(value))
    }

    /// Unparsed amount value. Absent or null means "no amount".
    pub fn raw_amount(&self) -> Option<&Value> {
        self.fields.get(AMOUNT_KEY).filter(|value| !value.is_null())
    }

    fn first_non_empty_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .filter_map(Value::as_str)
            .find(|s| !s.is_empty())
    }
}

impl From<Map<String, Value>> for Transaction {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Value> for Transaction {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

// =============================================================================
// Recognized Actions
// =============================================================================

/// Action literals that feed action-specific sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Deposit,
    Borrow,
    Repay,
    /// Withdrawal of supplied collateral (`redeemunderlying`)
    Withdraw,
    Liquidation,
}

impl ActionKind {
    /// Exact, case-sensitive match: `Deposit` is not `deposit`.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "deposit" => Some(ActionKind::Deposit),
            "borrow" => Some(ActionKind::Borrow),
            "repay" => Some(ActionKind::Repay),
            "redeemunderlying" => Some(ActionKind::Withdraw),
            "liquidationcall" => Some(ActionKind::Liquidation),
            _ => None,
        }
    }
}

// =============================================================================
// Feature Record
// =============================================================================

/// Fixed-shape behavioral summary of one wallet.
///
/// This is the contract between the feature extractor and the scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletFeatures {
    /// Total transactions attributed to the wallet
    pub tx_count: usize,

    /// Distinct action/type strings observed
    pub unique_actions: usize,

    /// Distinct non-empty asset identifiers observed
    pub unique_assets: usize,

    /// Latest minus earliest valid timestamp, in days
    pub activity_span_days: f64,

    /// Mean of all present amounts
    pub avg_tx_size: f64,

    /// `tx_count / activity_span_days`, or `tx_count` when the span is zero
    pub freq_per_day: f64,

    pub deposit_amt: f64,
    pub borrow_amt: f64,
    pub repay_amt: f64,
    pub withdraw_amt: f64,

    /// Number of `liquidationcall` events
    pub liquidation_count: usize,

    /// `repay_amt / borrow_amt`, 0 when nothing was borrowed
    pub repay_borrow_ratio: f64,

    /// `deposit_amt / withdraw_amt`, 0 when nothing was withdrawn
    pub deposit_withdraw_ratio: f64,
}

// =============================================================================
// Output Row
// =============================================================================

/// Column order of the output table.
pub const OUTPUT_COLUMNS: &[&str] = &[
    "wallet",
    "score",
    "tx_count",
    "unique_actions",
    "unique_assets",
    "activity_span_days",
    "avg_tx_size",
    "freq_per_day",
    "deposit_amt",
    "borrow_amt",
    "repay_amt",
    "withdraw_amt",
    "liquidation_count",
    "repay_borrow_ratio",
    "deposit_withdraw_ratio",
];

/// One flat output row: identity, score, then every feature column.
///
/// Kept flat (no nested struct) so it serializes directly as a table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredWallet {
    pub wallet: String,
    pub score: u16,
    pub tx_count: usize,
    pub unique_actions: usize,
    pub unique_assets: usize,
    pub activity_span_days: f64,
    pub avg_tx_size: f64,
    pub freq_per_day: f64,
    pub deposit_amt: f64,
    pub borrow_amt: f64,
    pub repay_amt: f64,
    pub withdraw_amt: f64,
    pub liquidation_count: usize,
    pub repay_borrow_ratio: f64,
    pub deposit_withdraw_ratio: f64,
}

impl ScoredWallet {
    pub fn new(wallet: impl Into<String>, score: u16, features: &WalletFeatures) -> Self {
        Self {
            wallet: wallet.into(),
            score,
            tx_count: features.tx_count,
            unique_actions: features.unique_actions,
            unique_assets: features.unique_assets,
            activity_span_days: features.activity_span_days,
            avg_tx_size: features.avg_tx_size,
            freq_per_day: features.freq_per_day,
            deposit_amt: features.deposit_amt,
            borrow_amt: features.borrow_amt,
            repay_amt: features.repay_amt,
            withdraw_amt: features.withdraw_amt,
            liquidation_count: features.liquidation_count,
            repay_borrow_ratio: features.repay_borrow_ratio,
            deposit_withdraw_ratio: features.deposit_withdraw_ratio,
        }
    }

    /// Recover the feature record carried by this row.
    pub fn features(&self) -> WalletFeatures {
        WalletFeatures {
            tx_count: self.tx_count,
            unique_actions: self.unique_actions,
            unique_assets: self.unique_assets,
            activity_span_days: self.activity_span_days,
            avg_tx_size: self.avg_tx_size,
            freq_per_day: self.freq_per_day,
            deposit_amt: self.deposit_amt,
            borrow_amt: self.borrow_amt,
            repay_amt: self.repay_amt,
            withdraw_amt: self.withdraw_amt,
            liquidation_count: self.liquidation_count,
            repay_borrow_ratio: self.repay_borrow_ratio,
            deposit_withdraw_ratio: self.deposit_withdraw_ratio,
        }
    }
}
