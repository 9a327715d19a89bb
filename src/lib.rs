//! # Rust Mule Detector
//!
//! A memory-safe money-muling detection engine for fraud review tooling.
//!
//! ## Features
//!
//! - **Circular Routing**: Simple directed cycles of 3-5 accounts reported as fraud rings
//! - **Hub Detection**: Fan-in and fan-out accounts with unusually many transfers
//! - **Shell Layering**: Low-activity intermediaries in 3-hop transfer chains
//! - **Smurfing**: High-velocity bursts inside a 72-hour window
//! - **Deterministic Reports**: Identical input order yields byte-identical JSON
//! - **CSV Ingestion**: Flexible column mapping for exported transaction ledgers
//!
//! Each analysis run is a pure function of its transaction input. Nothing is
//! retained between runs, so one [`MuleDetector`] can serve concurrent callers.

pub mod cycles;
pub mod graph;
#[cfg(feature = "csv-ingest")]
pub mod ingest;
pub mod rings;
pub mod scoring;

pub use cycles::{CycleDetector, DetectedCycle, PatternType};
pub use graph::{parse_timestamp, AccountStats, GraphStats, TransactionGraph};
pub use rings::{
    AnalysisReport, FraudRing, RingAggregator, RiskLevel, Summary, SuspiciousAccount,
};
pub use scoring::{PatternScorer, PatternTag, ScoreBoard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Detection errors
///
/// Data-quality problems inside the transaction list are absorbed by the
/// pipeline and never surface here.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[cfg(feature = "csv-ingest")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Accepts a JSON number, a numeric string or null; unparseable strings and
/// null read as zero.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<RawAmount>::deserialize(deserializer)? {
        Some(RawAmount::Number(n)) => n,
        Some(RawAmount::Text(text)) => parse_amount(&text).unwrap_or(0.0),
        None => 0.0,
    })
}

/// Parse an amount string, ignoring surrounding whitespace and thousands
/// separators. Non-finite values are rejected.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Transaction structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub receiver_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: f64,
    /// Raw `YYYY-MM-DD HH:MM:SS` timestamp, parsed during analysis
    #[serde(default)]
    pub timestamp: String,
}

impl Transaction {
    pub fn new(
        transaction_id: &str,
        sender_id: &str,
        receiver_id: &str,
        amount: f64,
        timestamp: &str,
    ) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            sender_id: Some(sender_id.to_string()),
            receiver_id: Some(receiver_id.to_string()),
            amount,
            timestamp: timestamp.to_string(),
        }
    }

    /// Sender and receiver ids exactly as given, or `None` when either is
    /// missing or blank. Ids are compared by plain string equality.
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        fn present(id: &Option<String>) -> Option<&str> {
            id.as_deref().filter(|s| !s.trim().is_empty())
        }
        Some((present(&self.sender_id)?, present(&self.receiver_id)?))
    }
}

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Smallest ring reported (accounts)
    pub min_cycle_length: usize,
    /// Largest ring reported (accounts)
    pub max_cycle_length: usize,
    pub cycle_weight: f64,
    /// In- or out-degree at which an account counts as a hub
    pub fan_threshold: usize,
    pub fan_weight: f64,
    /// Occurrence range marking a low-activity (shell) account
    pub shell_min_activity: usize,
    pub shell_max_activity: usize,
    pub shell_weight: f64,
    pub velocity_window_hours: i64,
    /// Events inside one window that trigger the velocity flag
    pub velocity_min_events: usize,
    pub velocity_weight: f64,
    pub max_score: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_cycle_length: 3,
            max_cycle_length: 5,
            cycle_weight: 45.0,
            fan_threshold: 10,
            fan_weight: 20.0,
            shell_min_activity: 2,
            shell_max_activity: 3,
            shell_weight: 15.0,
            velocity_window_hours: 72,
            velocity_min_events: 6,
            velocity_weight: 10.0,
            max_score: 100.0,
        }
    }
}

impl DetectorConfig {
    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, DetectionError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the detectors cannot run with
    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.min_cycle_length < 3 {
            return Err(DetectionError::InvalidConfig(format!(
                "min_cycle_length {} below 3",
                self.min_cycle_length
            )));
        }

        if self.min_cycle_length > self.max_cycle_length {
            return Err(DetectionError::InvalidConfig(format!(
                "min_cycle_length {} exceeds max_cycle_length {}",
                self.min_cycle_length, self.max_cycle_length
            )));
        }

        if self.shell_min_activity > self.shell_max_activity {
            return Err(DetectionError::InvalidConfig(format!(
                "shell_min_activity {} exceeds shell_max_activity {}",
                self.shell_min_activity, self.shell_max_activity
            )));
        }

        // Bounded so the window converts to a chrono Duration without overflow
        if !(1..=87_600).contains(&self.velocity_window_hours) {
            return Err(DetectionError::InvalidConfig(format!(
                "velocity_window_hours {} outside 1..=87600",
                self.velocity_window_hours
            )));
        }

        if self.velocity_min_events == 0 {
            return Err(DetectionError::InvalidConfig(
                "velocity_min_events must be at least 1".to_string(),
            ));
        }

        let weights = [
            ("cycle_weight", self.cycle_weight),
            ("fan_weight", self.fan_weight),
            ("shell_weight", self.shell_weight),
            ("velocity_weight", self.velocity_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(DetectionError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(DetectionError::InvalidConfig(format!(
                "max_score must be positive, got {}",
                self.max_score
            )));
        }

        Ok(())
    }
}

/// Report plus metadata about the run that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub started_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub transactions_processed: usize,
    pub transactions_skipped: usize,
    pub graph_stats: GraphStats,
    pub report: AnalysisReport,
}

/// Money-muling detection pipeline
pub struct MuleDetector {
    config: DetectorConfig,
}

impl MuleDetector {
    /// Create a new detector with default configuration
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
        }
    }

    /// Create a new detector with custom configuration
    pub fn with_config(config: DetectorConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Analyze a transaction list.
    ///
    /// Never fails: malformed rows are skipped, unparseable timestamps are
    /// left out of velocity windows, and an empty list yields an empty report.
    pub fn analyze(&self, transactions: &[Transaction]) -> AnalysisReport {
        let graph = TransactionGraph::build(transactions);
        self.analyze_graph(&graph)
    }

    /// Analyze and record run metadata alongside the report
    pub fn run(&self, transactions: &[Transaction]) -> AnalysisRun {
        let started_at = Utc::now();
        let timer = Instant::now();

        let graph = TransactionGraph::build(transactions);
        let report = self.analyze_graph(&graph);
        let graph_stats = graph.stats();

        let elapsed = timer.elapsed().as_secs_f64();
        let processing_time_seconds = (elapsed * 100.0).round() / 100.0;

        info!(
            accounts = report.summary.total_accounts_analyzed,
            flagged = report.summary.suspicious_accounts_flagged,
            rings = report.summary.fraud_rings_detected,
            seconds = processing_time_seconds,
            "analysis complete"
        );

        AnalysisRun {
            started_at,
            processing_time_seconds,
            transactions_processed: graph_stats.total_transactions,
            transactions_skipped: graph_stats.skipped_transactions,
            graph_stats,
            report,
        }
    }

    fn analyze_graph(&self, graph: &TransactionGraph) -> AnalysisReport {
        let cycles = CycleDetector::from_config(&self.config).detect(graph);
        let board = PatternScorer::new(&self.config).score(graph, &cycles);
        RingAggregator::aggregate(graph, &cycles, &board)
    }
}

impl Default for MuleDetector {
    fn default() -> Self {
        Self::new()
    }
}
