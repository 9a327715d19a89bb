//! Fraud ring aggregation and the analysis report
//!
//! Merges detected cycles with the finalized score board into the report
//! consumed by review tooling. Field names and the `ring_id: null`
//! convention are part of the output contract.

use crate::cycles::{DetectedCycle, PatternType};
use crate::graph::TransactionGraph;
use crate::scoring::{round_one_decimal, ScoreBoard};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Review priority band for a score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,      // 0-30
    Medium,   // 31-50
    High,     // 51-70
    Critical, // 71-100
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 30.0 {
            RiskLevel::Low
        } else if score <= 50.0 {
            RiskLevel::Medium
        } else if score <= 70.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Flagged account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuspiciousAccount {
    pub account_id: String,
    pub suspicion_score: f64,
    pub detected_patterns: Vec<String>,
    pub ring_id: Option<String>,
}

impl SuspiciousAccount {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.suspicion_score)
    }
}

/// Reported fraud ring
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudRing {
    pub ring_id: String,
    pub member_accounts: Vec<String>,
    pub pattern_type: PatternType,
    pub risk_score: f64,
}

impl FraudRing {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub total_accounts_analyzed: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
}

/// Final output of one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    pub fraud_rings: Vec<FraudRing>,
    pub summary: Summary,
}

impl AnalysisReport {
    /// Check if any suspicious patterns were found
    pub fn has_suspicious_activity(&self) -> bool {
        !self.suspicious_accounts.is_empty() || !self.fraud_rings.is_empty()
    }

    /// Look up a flagged account
    pub fn account(&self, account_id: &str) -> Option<&SuspiciousAccount> {
        self.suspicious_accounts
            .iter()
            .find(|a| a.account_id == account_id)
    }

    /// Look up a ring by id
    pub fn ring(&self, ring_id: &str) -> Option<&FraudRing> {
        self.fraud_rings.iter().find(|r| r.ring_id == ring_id)
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Builds the final report from cycles and scores
pub struct RingAggregator;

impl RingAggregator {
    pub fn aggregate(
        graph: &TransactionGraph,
        cycles: &[DetectedCycle],
        board: &ScoreBoard,
    ) -> AnalysisReport {
        let mut ring_links: Vec<Option<&str>> = vec![None; graph.account_count()];
        let mut fraud_rings = Vec::with_capacity(cycles.len());

        for cycle in cycles {
            let total: f64 = cycle.members.iter().map(|&m| board.score(m)).sum();
            let risk_score = if cycle.is_empty() {
                0.0
            } else {
                round_one_decimal(total / cycle.len() as f64)
            };

            // Later rings overwrite earlier links for a shared member.
            for &member in &cycle.members {
                ring_links[member] = Some(cycle.ring_id.as_str());
            }

            fraud_rings.push(FraudRing {
                ring_id: cycle.ring_id.clone(),
                member_accounts: cycle.member_accounts.clone(),
                pattern_type: cycle.pattern_type,
                risk_score,
            });
        }

        let mut suspicious_accounts: Vec<SuspiciousAccount> = board
            .iter()
            .filter(|(_, entry)| entry.score > 0.0)
            .map(|(idx, entry)| SuspiciousAccount {
                account_id: graph.account_id(idx).to_string(),
                suspicion_score: entry.score,
                detected_patterns: entry.patterns().iter().map(|t| t.to_string()).collect(),
                ring_id: ring_links[idx].map(str::to_string),
            })
            .collect();

        // Stable: ties keep first-seen account order.
        suspicious_accounts.sort_by(|a, b| b.suspicion_score.total_cmp(&a.suspicion_score));

        let summary = Summary {
            total_accounts_analyzed: graph.account_count(),
            suspicious_accounts_flagged: suspicious_accounts.len(),
            fraud_rings_detected: fraud_rings.len(),
        };

        debug!(
            flagged = summary.suspicious_accounts_flagged,
            rings = summary.fraud_rings_detected,
            "rings aggregated"
        );

        AnalysisReport {
            suspicious_accounts,
            fraud_rings,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::CycleDetector;
    use crate::scoring::PatternScorer;
    use crate::{DetectorConfig, Transaction};

    fn report_for(edges: &[(&str, &str)]) -> AnalysisReport {
        let transactions: Vec<Transaction> = edges
            .iter()
            .enumerate()
            .map(|(i, (from, to))| {
                let ts = format!("2024-{:02}-01 10:00:00", i % 12 + 1);
                Transaction::new(&format!("T{}", i), from, to, 500.0, &ts)
            })
            .collect();
        let config = DetectorConfig::default();
        let graph = TransactionGraph::build(&transactions);
        let cycles = CycleDetector::from_config(&config).detect(&graph);
        let board = PatternScorer::new(&config).score(&graph, &cycles);
        RingAggregator::aggregate(&graph, &cycles, &board)
    }

    #[test]
    fn test_ring_risk_is_member_mean() {
        // D feeds A ten times, so A also carries fan_in.
        let mut edges = vec![("A", "B"), ("B", "C"), ("C", "A")];
        edges.extend(std::iter::repeat(("D", "A")).take(10));
        let report = report_for(&edges);

        assert_eq!(report.fraud_rings.len(), 1);
        let ring = &report.fraud_rings[0];
        // A = 45 + 20, B = C = 45
        assert_eq!(ring.risk_score, 51.7);
        assert_eq!(ring.risk_level(), RiskLevel::High);

        assert_eq!(report.suspicious_accounts[0].account_id, "A");
        assert_eq!(report.suspicious_accounts[0].suspicion_score, 65.0);
    }

    #[test]
    fn test_ring_ids_linked_to_members() {
        let report = report_for(&[("A", "B"), ("B", "C"), ("C", "A"), ("C", "Z")]);
        let ring_id = report.fraud_rings[0].ring_id.clone();

        for account in &report.suspicious_accounts {
            if ["A", "B", "C"].contains(&account.account_id.as_str()) {
                assert_eq!(account.ring_id.as_deref(), Some(ring_id.as_str()));
            }
        }
    }

    #[test]
    fn test_shared_member_takes_last_ring() {
        let report = report_for(&[("P", "Q"), ("Q", "R"), ("Q", "T"), ("R", "P"), ("T", "P")]);

        assert_eq!(report.fraud_rings.len(), 2);
        assert_eq!(report.account("P").unwrap().ring_id.as_deref(), Some("RING-002"));
        assert_eq!(report.account("Q").unwrap().ring_id.as_deref(), Some("RING-002"));
        assert_eq!(report.account("R").unwrap().ring_id.as_deref(), Some("RING-001"));
        // Two rings plus the T->P->Q->R and R->P->Q->T shell paths, clamped.
        assert_eq!(report.account("P").unwrap().suspicion_score, 100.0);
        assert_eq!(report.account("R").unwrap().suspicion_score, 45.0);
    }

    #[test]
    fn test_zero_score_accounts_excluded() {
        let report = report_for(&[("A", "B"), ("B", "C"), ("C", "A"), ("X", "Y")]);

        assert_eq!(report.summary.total_accounts_analyzed, 5);
        assert_eq!(report.summary.suspicious_accounts_flagged, 3);
        assert!(report.account("X").is_none());
        assert!(report.account("Y").is_none());
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let report = report_for(&[("C", "A"), ("A", "B"), ("B", "C")]);
        let ids: Vec<&str> = report
            .suspicious_accounts
            .iter()
            .map(|a| a.account_id.as_str())
            .collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_null_ring_id_serialized() {
        let account = SuspiciousAccount {
            account_id: "HUB".to_string(),
            suspicion_score: 20.0,
            detected_patterns: vec!["fan_out".to_string()],
            ring_id: None,
        };
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(
            json,
            r#"{"account_id":"HUB","suspicion_score":20.0,"detected_patterns":["fan_out"],"ring_id":null}"#
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = report_for(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["fraud_rings"][0]["pattern_type"], "cycle");
        assert_eq!(value["fraud_rings"][0]["ring_id"], "RING-001");
        assert_eq!(value["summary"]["fraud_rings_detected"], 1);
        assert_eq!(value["summary"]["total_accounts_analyzed"], 3);
        assert_eq!(value["suspicious_accounts"][0]["detected_patterns"][0], "cycle_length_3");
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(45.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.to_string(), "Critical");
    }
}
