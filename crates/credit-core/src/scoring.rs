//! Credit scoring engine
//!
//! Maps one wallet's feature record to an integer score in 0-1000 using a
//! fixed base plus weighted, capped terms. Scores depend only on the wallet's
//! own features; there is no cross-wallet normalization.

use crate::features::WalletFeatureSet;
use crate::models::{ScoredWallet, WalletFeatures};

pub const MIN_SCORE: u16 = 0;
pub const MAX_SCORE: u16 = 1000;

const BASE_SCORE: f64 = 500.0;

// Positive signals: weight * min(signal, cap)
const REPAY_RATIO_CAP: f64 = 1.0;
const REPAY_RATIO_WEIGHT: f64 = 200.0;

const DEPOSIT_RATIO_CAP: f64 = 2.0;
const DEPOSIT_RATIO_WEIGHT: f64 = 100.0;

const LONGEVITY_FULL_DAYS: f64 = 180.0;
const LONGEVITY_WEIGHT: f64 = 50.0;

const ASSET_DIVERSITY_FULL: f64 = 5.0;
const ASSET_DIVERSITY_WEIGHT: f64 = 50.0;

const ACTION_DIVERSITY_FULL: f64 = 5.0;
const ACTION_DIVERSITY_WEIGHT: f64 = 50.0;

// Negative signals
const LIQUIDATION_CAP: usize = 3;
const LIQUIDATION_PENALTY: f64 = 100.0;

const UNREPAID_BORROW_PENALTY: f64 = 100.0;

/// Above this many transactions the wallet is treated as likely automated.
const BOT_TX_THRESHOLD: usize = 1000;
const BOT_PENALTY: f64 = 100.0;

/// Score a single wallet.
///
/// Terms are accumulated as floats and truncated toward zero once, at the
/// end, before clamping into `[MIN_SCORE, MAX_SCORE]`.
pub fn score_wallet(features: &WalletFeatures) -> u16 {
    let mut score = BASE_SCORE;

    score += features.repay_borrow_ratio.min(REPAY_RATIO_CAP) * REPAY_RATIO_WEIGHT;
    score += features.deposit_withdraw_ratio.min(DEPOSIT_RATIO_CAP) * DEPOSIT_RATIO_WEIGHT;
    score += (features.activity_span_days / LONGEVITY_FULL_DAYS).min(1.0) * LONGEVITY_WEIGHT;
    score += (features.unique_assets as f64 / ASSET_DIVERSITY_FULL).min(1.0) * ASSET_DIVERSITY_WEIGHT;
    score +=
        (features.unique_actions as f64 / ACTION_DIVERSITY_FULL).min(1.0) * ACTION_DIVERSITY_WEIGHT;

    score -= features.liquidation_count.min(LIQUIDATION_CAP) as f64 * LIQUIDATION_PENALTY;

    // Exact comparison: any nonzero repayment escapes the penalty.
    if features.borrow_amt > 0.0 && features.repay_amt == 0.0 {
        score -= UNREPAID_BORROW_PENALTY;
    }

    if features.tx_count > BOT_TX_THRESHOLD {
        score -= BOT_PENALTY;
    }

    // `as` saturates and maps NaN to 0, so the clamp below always holds.
    (score.trunc() as i64).clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u16
}

/// Score every wallet in the set, preserving the set's order.
pub fn score_all(features: &WalletFeatureSet) -> Vec<ScoredWallet> {
    features
        .iter()
        .map(|(wallet, f)| ScoredWallet::new(wallet, score_wallet(f), f))
        .collect()
}

/// Sort rows by score, highest first. Ties are broken by wallet identity.
pub fn rank(rows: &mut [ScoredWallet]) {
    rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.wallet.cmp(&b.wallet)));
}

// =============================================================================
// Run Summary
// =============================================================================

/// Upper bounds (inclusive) of the score bands reported in a summary.
pub const SCORE_BANDS: [u16; 5] = [199, 399, 599, 799, 1000];

/// Aggregate view of one scoring run, for reporting only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSummary {
    pub wallets: usize,
    pub min_score: u16,
    pub max_score: u16,
    pub mean_score: f64,
    /// Wallet counts per band of [`SCORE_BANDS`]
    pub band_counts: [usize; 5],
}

impl ScoreSummary {
    pub fn from_rows(rows: &[ScoredWallet]) -> Self {
        if rows.is_empty() {
            return ScoreSummary::default();
        }

        let mut summary = ScoreSummary {
            wallets: rows.len(),
            min_score: MAX_SCORE,
            max_score: MIN_SCORE,
            ..Default::default()
        };
        let mut total: u64 = 0;

        for row in rows {
            summary.min_score = summary.min_score.min(row.score);
            summary.max_score = summary.max_score.max(row.score);
            total += u64::from(row.score);

            let band = SCORE_BANDS
                .iter()
                .position(|upper| row.score <= *upper)
                .unwrap_or(SCORE_BANDS.len() - 1);
            summary.band_counts[band] += 1;
        }

        summary.mean_score = total as f64 / rows.len() as f64;
        summary
    }

    /// Human-readable band labels, matching `band_counts`.
    pub fn band_labels() -> [String; 5] {
        let mut lower = MIN_SCORE;
        SCORE_BANDS.map(|upper| {
            let label = format!("{}-{}", lower, upper);
            lower = upper + 1;
            label
        })
    }
}
