//! CSV transaction ingestion
//!
//! Reads exported transaction ledgers with loosely named columns into
//! [`Transaction`] records. Only structural problems fail the load; bad
//! values inside a row are absorbed and reported as warnings.

use crate::graph::parse_timestamp;
use crate::{parse_amount, DetectionError, Transaction};
use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

const REQUIRED_COLUMNS: [&str; 4] = ["sender_id", "receiver_id", "amount", "timestamp"];

/// Runs of whitespace or dashes inside a header name
fn header_separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s\-]+").expect("literal header pattern"))
}

/// Lowercase a header and map it to its canonical column name
fn normalize_header(header: &str) -> String {
    let normalized = header_separators()
        .replace_all(header.trim().to_lowercase().as_str(), "_")
        .into_owned();
    canonical_column(&normalized).to_string()
}

/// Map a normalized header to its canonical column name
fn canonical_column(name: &str) -> &str {
    match name {
        "sender" | "sender_account" | "from_account" | "from" | "source" => "sender_id",
        "receiver" | "receiver_account" | "to_account" | "to" | "destination" => "receiver_id",
        "date" | "time" | "transaction_date" => "timestamp",
        "txn_id" | "tx_id" | "id" => "transaction_id",
        other => other,
    }
}

/// A data-quality issue absorbed while reading a row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestWarning {
    /// 1-based data row, not counting the header
    pub row: usize,
    pub message: String,
}

/// Transactions read from a CSV source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub transactions: Vec<Transaction>,
    pub warnings: Vec<IngestWarning>,
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    transaction_id: Option<usize>,
    sender_id: usize,
    receiver_id: usize,
    amount: usize,
    timestamp: usize,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self, DetectionError> {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let position = |column: &str| names.iter().position(|n| n == column);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| position(c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(DetectionError::MissingColumns(missing.join(", ")));
        }

        // Required columns are present past this point.
        let required = |column: &str| position(column).unwrap_or_default();
        Ok(Self {
            transaction_id: position("transaction_id"),
            sender_id: required("sender_id"),
            receiver_id: required("receiver_id"),
            amount: required("amount"),
            timestamp: required("timestamp"),
        })
    }
}

/// Load transactions from a CSV file
pub fn load_csv_path<P: AsRef<Path>>(path: P) -> Result<IngestOutcome, DetectionError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading transactions");
    let file = File::open(path)?;
    load_csv_reader(file)
}

/// Load transactions from any CSV reader with a header row
pub fn load_csv_reader<R: Read>(reader: R) -> Result<IngestOutcome, DetectionError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = ColumnMap::resolve(rdr.headers()?)?;
    let mut outcome = IngestOutcome::default();

    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let row = i + 1;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let transaction_id = match columns.transaction_id.map(field) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("TXN_{:06}", row),
        };

        let endpoint = |idx: usize| {
            let value = field(idx);
            (!value.is_empty()).then(|| value.to_string())
        };
        let sender_id = endpoint(columns.sender_id);
        let receiver_id = endpoint(columns.receiver_id);
        if sender_id.is_none() || receiver_id.is_none() {
            outcome.warnings.push(IngestWarning {
                row,
                message: format!("{}: missing sender or receiver", transaction_id),
            });
        }

        let raw_amount = field(columns.amount);
        let amount = parse_amount(raw_amount).unwrap_or_else(|| {
            outcome.warnings.push(IngestWarning {
                row,
                message: format!("{}: unparseable amount {:?}", transaction_id, raw_amount),
            });
            0.0
        });

        let timestamp = field(columns.timestamp).to_string();
        if parse_timestamp(&timestamp).is_none() {
            outcome.warnings.push(IngestWarning {
                row,
                message: format!("{}: unparseable timestamp {:?}", transaction_id, timestamp),
            });
        }

        outcome.transactions.push(Transaction {
            transaction_id,
            sender_id,
            receiver_id,
            amount,
            timestamp,
        });
    }

    if !outcome.warnings.is_empty() {
        warn!(
            rows = outcome.transactions.len(),
            warnings = outcome.warnings.len(),
            "transactions loaded with data-quality warnings"
        );
    }

    Ok(outcome)
}
