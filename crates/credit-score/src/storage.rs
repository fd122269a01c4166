//! Reading the transaction export and writing the score table

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use credit_core::{score_wallet, ScoredWallet, Transaction, OUTPUT_COLUMNS};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Load every transaction record from a JSON array file.
pub fn load_transactions(path: &Path) -> AppResult<Vec<Transaction>> {
    let contents = fs::read_to_string(path).map_err(AppError::io(path))?;
    parse_transactions(&contents)
}

pub fn parse_transactions(json: &str) -> AppResult<Vec<Transaction>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(records) => Ok(records.into_iter().map(Transaction::from_value).collect()),
        other => Err(AppError::InvalidInput(format!(
            "expected a JSON array of transaction records, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Write the score table as CSV: a fixed header, then one row per wallet.
pub fn write_scores<W: Write>(writer: W, rows: &[ScoredWallet]) -> AppResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(OUTPUT_COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(csv::Error::from)?;

    Ok(())
}

/// Write the score table to `path`.
///
/// Rows go to a sibling `.partial` file that is renamed over `path` only
/// once everything has been written, so a failed run never leaves a
/// truncated table behind.
pub fn save_scores(path: &Path, rows: &[ScoredWallet]) -> AppResult<()> {
    let partial = partial_path(path);
    let file = File::create(&partial).map_err(AppError::io(&partial))?;

    if let Err(e) = write_scores(BufWriter::new(file), rows) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::rename(&partial, path).map_err(AppError::io(path))?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "Score table written");
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// Read a score table back, checking the header against the fixed column set.
pub fn read_scores(path: &Path) -> AppResult<Vec<ScoredWallet>> {
    let file = File::open(path).map_err(AppError::io(path))?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr.headers()?.clone();
    if headers.iter().ne(OUTPUT_COLUMNS.iter().copied()) {
        return Err(AppError::InvalidInput(format!(
            "unexpected score table columns: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    rdr.deserialize::<ScoredWallet>()
        .map(|row| row.map_err(AppError::from))
        .collect()
}

/// Re-score every row of a written table from its own feature columns.
///
/// Returns the number of rows checked, or the first row whose stored score
/// disagrees with the scorer.
pub fn verify_scores(path: &Path) -> AppResult<usize> {
    let rows = read_scores(path)?;

    for row in &rows {
        let recomputed = score_wallet(&row.features());
        if recomputed != row.score {
            return Err(AppError::ScoreMismatch {
                wallet: row.wallet.clone(),
                written: row.score,
                recomputed,
            });
        }
    }

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_core::{extract_features, score_all, WalletFeatures};

    #[test]
    fn test_parse_transactions_accepts_any_records() {
        let txs = parse_transactions(
            r#"[{"user": "0xa", "action": "deposit", "amount": "10"}, 5, {"extra": true}]"#,
        )
        .unwrap();

        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].wallet(), Some("0xa"));
        assert_eq!(txs[1], Transaction::default());
        assert_eq!(txs[2].wallet(), None);
    }

    #[test]
    fn test_parse_transactions_rejects_non_array() {
        let err = parse_transactions(r#"{"user": "0xa"}"#).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = parse_transactions("[{").unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_transactions(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }

    #[test]
    fn test_header_matches_output_columns() {
        let mut buf = Vec::new();
        write_scores(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.trim_end(), OUTPUT_COLUMNS.join(","));

        let mut buf = Vec::new();
        let row = ScoredWallet::new("0xa", 510, &WalletFeatures::default());
        write_scores(&mut buf, &[row]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], OUTPUT_COLUMNS.join(","));
        assert!(lines[1].starts_with("0xa,510,0,"));
    }

    #[test]
    fn test_single_deposit_row_text() {
        let txs = parse_transactions(r#"[{"user": "0xa", "action": "deposit", "amount": 100}]"#).unwrap();
        let rows = score_all(&extract_features(&txs).unwrap());

        let mut buf = Vec::new();
        write_scores(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(!text.contains("-0"));
        assert_eq!(
            text.lines().nth(1),
            Some("0xa,510,1,1,0,0.0,100.0,1.0,100.0,0.0,0.0,0.0,0,0.0,0.0")
        );
    }

    #[test]
    fn test_saved_scores_round_trip_through_scorer() {
        let txs = parse_transactions(
            r#"[
                {"user": "0xa", "action": "deposit", "amount": 1234.5678, "asset": "USDC", "timestamp": 1629178166},
                {"user": "0xa", "action": "redeemunderlying", "amount": 333.3333, "asset": "WETH", "timestamp": "2021-11-02T10:00:00Z"},
                {"user": "0xa", "action": "borrow", "amount": 700.1, "timestamp": 1630000000.25},
                {"user": "0xa", "action": "repay", "amount": 233.7},
                {"wallet": "0xb", "type": "borrow", "amount": "99.99"},
                {"address": "0xc", "action": "liquidationcall", "time": 1620000000}
            ]"#,
        )
        .unwrap();
        let rows = score_all(&extract_features(&txs).unwrap());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        save_scores(&path, &rows).unwrap();
        assert!(!partial_path(&path).exists());

        let read_back = read_scores(&path).unwrap();
        assert_eq!(read_back, rows);
        for row in &read_back {
            assert_eq!(score_wallet(&row.features()), row.score);
        }
        assert_eq!(verify_scores(&path).unwrap(), 3);
    }

    #[test]
    fn test_verify_detects_tampered_score() {
        let row = ScoredWallet::new("0xa", 999, &WalletFeatures::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        save_scores(&path, &[row]).unwrap();

        match verify_scores(&path).unwrap_err() {
            AppError::ScoreMismatch {
                wallet,
                written,
                recomputed,
            } => {
                assert_eq!(wallet, "0xa");
                assert_eq!(written, 999);
                assert_eq!(recomputed, 500);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_rejects_foreign_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "wallet,score\n0xa,500\n").unwrap();

        assert!(matches!(
            read_scores(&path).unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_save_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("scores.csv");
        let err = save_scores(&path, &[]).unwrap_err();

        assert!(matches!(err, AppError::Io { .. }));
        assert!(!path.exists());
    }
}
