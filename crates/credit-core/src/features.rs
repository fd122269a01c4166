//! Wallet feature extraction
//!
//! Groups raw transactions by wallet identity and reduces each group to a
//! fixed-shape [`WalletFeatures`] record.
//!
//! Field parsing follows two deliberately different failure policies:
//! a timestamp that cannot be parsed is simply absent, while an amount that
//! is present but not numeric aborts the whole extraction.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{CreditError, CreditResult};
use crate::models::{ActionKind, Transaction, WalletFeatures};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Offset-less ISO-8601 layouts, read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// =============================================================================
// Feature Set
// =============================================================================

/// Feature records keyed by wallet identity.
///
/// Iterates in the order wallets were first seen in the input. The order
/// carries no meaning; it only keeps output deterministic.
#[derive(Debug, Clone, Default)]
pub struct WalletFeatureSet {
    order: Vec<String>,
    features: HashMap<String, WalletFeatures>,
}

impl WalletFeatureSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: Vec::with_capacity(capacity),
            features: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or replace the record for `wallet`. Replacing keeps the
    /// wallet's original position.
    pub fn insert(&mut self, wallet: impl Into<String>, features: WalletFeatures) {
        let wallet = wallet.into();
        if !self.features.contains_key(&wallet) {
            self.order.push(wallet.clone());
        }
        self.features.insert(wallet, features);
    }

    pub fn get(&self, wallet: &str) -> Option<&WalletFeatures> {
        self.features.get(wallet)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WalletFeatures)> + '_ {
        self.order
            .iter()
            .filter_map(|wallet| self.features.get(wallet).map(|f| (wallet.as_str(), f)))
    }

    /// Order-free view, for comparing two extractions.
    pub fn as_map(&self) -> &HashMap<String, WalletFeatures> {
        &self.features
    }
}

impl FromIterator<(String, WalletFeatures)> for WalletFeatureSet {
    fn from_iter<I: IntoIterator<Item = (String, WalletFeatures)>>(iter: I) -> Self {
        let mut set = WalletFeatureSet::default();
        for (wallet, features) in iter {
            set.insert(wallet, features);
        }
        set
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Extract one feature record per wallet identity.
///
/// Records without any wallet identity are dropped silently. A non-numeric
/// amount anywhere fails the whole run and no partial result is returned.
pub fn extract_features(transactions: &[Transaction]) -> CreditResult<WalletFeatureSet> {
    let groups = group_by_wallet(transactions);
    let mut set = WalletFeatureSet::with_capacity(groups.len());

    for (wallet, txs) in groups {
        let features = compute_wallet_features(wallet, &txs)?;
        set.insert(wallet, features);
    }

    tracing::debug!(
        transactions = transactions.len(),
        wallets = set.len(),
        "Feature extraction complete"
    );

    Ok(set)
}

/// Group transactions by wallet identity in a single pass.
///
/// Groups are returned in first-seen order.
pub fn group_by_wallet(transactions: &[Transaction]) -> Vec<(&str, Vec<&Transaction>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&Transaction>)> = Vec::new();
    let mut dropped = 0usize;

    for tx in transactions {
        let Some(wallet) = tx.wallet() else {
            dropped += 1;
            continue;
        };

        let slot = *index.entry(wallet).or_insert_with(|| {
            groups.push((wallet, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(tx);
    }

    if dropped > 0 {
        tracing::debug!(dropped, "Dropped transactions without a wallet identity");
    }

    groups
}

/// Reduce one wallet's transactions to its feature record.
pub fn compute_wallet_features(
    wallet: &str,
    transactions: &[&Transaction],
) -> CreditResult<WalletFeatures> {
    let mut actions: HashSet<&str> = HashSet::new();
    let mut assets: HashSet<&str> = HashSet::new();
    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();

    let mut amounts: Vec<f64> = Vec::new();
    let mut deposits: Vec<f64> = Vec::new();
    let mut borrows: Vec<f64> = Vec::new();
    let mut repays: Vec<f64> = Vec::new();
    let mut withdrawals: Vec<f64> = Vec::new();
    let mut liquidation_count = 0usize;

    for tx in transactions {
        let action = tx.action();
        if let Some(action) = action {
            actions.insert(action);
        }

        if let Some(asset) = tx.asset() {
            assets.insert(asset);
        }

        if let Some(raw) = tx.raw_timestamp() {
            match parse_timestamp(raw) {
                Some(ts) => timestamps.push(ts),
                None => {
                    tracing::trace!(wallet = %wallet, timestamp = %raw, "Unparseable timestamp treated as absent");
                }
            }
        }

        let amount = match tx.raw_amount() {
            Some(raw) => {
                let amount = parse_amount(wallet, raw)?;
                amounts.push(amount);
                amount
            }
            None => 0.0,
        };

        match action.and_then(ActionKind::from_action) {
            Some(ActionKind::Deposit) => deposits.push(amount),
            Some(ActionKind::Borrow) => borrows.push(amount),
            Some(ActionKind::Repay) => repays.push(amount),
            Some(ActionKind::Withdraw) => withdrawals.push(amount),
            Some(ActionKind::Liquidation) => liquidation_count += 1,
            None => {}
        }
    }

    let tx_count = transactions.len();

    let activity_span_days = match (timestamps.iter().min(), timestamps.iter().max()) {
        (Some(first), Some(last)) => span_days(*last - *first),
        _ => 0.0,
    };

    let avg_tx_size = if amounts.is_empty() {
        0.0
    } else {
        let count = amounts.len() as f64;
        order_independent_sum(amounts) / count
    };

    let freq_per_day = if activity_span_days > 0.0 {
        tx_count as f64 / activity_span_days
    } else {
        tx_count as f64
    };

    let deposit_amt = order_independent_sum(deposits);
    let borrow_amt = order_independent_sum(borrows);
    let repay_amt = order_independent_sum(repays);
    let withdraw_amt = order_independent_sum(withdrawals);

    let repay_borrow_ratio = if borrow_amt > 0.0 {
        repay_amt / borrow_amt
    } else {
        0.0
    };
    let deposit_withdraw_ratio = if withdraw_amt > 0.0 {
        deposit_amt / withdraw_amt
    } else {
        0.0
    };

    Ok(WalletFeatures {
        tx_count,
        unique_actions: actions.len(),
        unique_assets: assets.len(),
        activity_span_days,
        avg_tx_size,
        freq_per_day,
        deposit_amt,
        borrow_amt,
        repay_amt,
        withdraw_amt,
        liquidation_count,
        repay_borrow_ratio,
        deposit_withdraw_ratio,
    })
}

// Summation order is fixed by sorting so the result does not depend on the
// order transactions arrived in. Folds from +0.0: `Sum` for floats starts at
// -0.0, which would leak into the table for empty sums.
fn order_independent_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().fold(0.0, |acc, v| acc + v)
}

fn span_days(span: Duration) -> f64 {
    let seconds = span
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| span.num_milliseconds() as f64 / 1_000.0);
    seconds / SECONDS_PER_DAY
}

// =============================================================================
// Field Parsing
// =============================================================================

/// Parse a timestamp: ISO-8601 first, then numeric Unix epoch (UTC).
///
/// Both attempts are always made before giving up; failure of both yields
/// `None`, which callers treat exactly like a missing timestamp.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    parse_iso8601(value).or_else(|| parse_epoch(value))
}

fn parse_iso8601(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_epoch(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Coerce an amount to a finite real number.
///
/// JSON numbers and numeric strings are accepted. Anything else, including
/// `"NaN"` and `"inf"`, is a hard error: there is no default for an amount
/// that is present but malformed.
pub fn parse_amount(wallet: &str, value: &Value) -> CreditResult<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|amount| amount.is_finite());

    parsed.ok_or_else(|| CreditError::MalformedAmount {
        wallet: wallet.to_string(),
        value: value.to_string(),
    })
}
