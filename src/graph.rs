//! Account graph construction for money-muling analysis
//!
//! Turns an ordered transaction list into the directed multigraph every
//! detection pass reads from. Accounts live in an index arena in first-seen
//! order so that every later pass is deterministic for a given input order.

use crate::Transaction;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Parse a transaction timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, the same with a `T` separator (optionally
/// with fractional seconds), RFC 3339, and a bare `YYYY-MM-DD`. Naive forms
/// are read as UTC. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = raw.replacen(' ', "T", 1);
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Per-account state accumulated while building the graph
#[derive(Debug, Clone)]
struct AccountNode {
    account_id: String,
    in_degree: usize,
    out_degree: usize,
    occurrences: usize,
    timestamps: Vec<Option<DateTime<Utc>>>,
    total_sent: f64,
    total_received: f64,
    senders: HashSet<usize>,
    receivers: HashSet<usize>,
}

impl AccountNode {
    fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            in_degree: 0,
            out_degree: 0,
            occurrences: 0,
            timestamps: Vec::new(),
            total_sent: 0.0,
            total_received: 0.0,
            senders: HashSet::new(),
            receivers: HashSet::new(),
        }
    }
}

/// Directed transaction multigraph.
///
/// Read-only once built. Repeated sender→receiver pairs stay as separate
/// adjacency entries and self-loops are kept.
#[derive(Debug, Clone)]
pub struct TransactionGraph {
    nodes: Vec<AccountNode>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    /// Accounts in the order they first appeared as a sender
    sources: Vec<usize>,
    edge_pairs: HashSet<(usize, usize)>,
    transaction_count: usize,
    skipped_transactions: usize,
    total_amount: f64,
}

impl TransactionGraph {
    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
            predecessors: Vec::new(),
            sources: Vec::new(),
            edge_pairs: HashSet::new(),
            transaction_count: 0,
            skipped_transactions: 0,
            total_amount: 0.0,
        }
    }

    /// Build the graph from transactions in input order.
    ///
    /// Transactions without both a sender and a receiver are skipped.
    pub fn build(transactions: &[Transaction]) -> Self {
        let mut graph = Self::empty();

        for transaction in transactions {
            match transaction.endpoints() {
                Some((sender, receiver)) => graph.add_edge(
                    sender,
                    receiver,
                    transaction.amount,
                    &transaction.timestamp,
                ),
                None => {
                    debug!(
                        transaction_id = %transaction.transaction_id,
                        "skipping transaction without both endpoints"
                    );
                    graph.skipped_transactions += 1;
                }
            }
        }

        debug!(
            accounts = graph.nodes.len(),
            transactions = graph.transaction_count,
            skipped = graph.skipped_transactions,
            "transaction graph built"
        );

        graph
    }

    fn intern(&mut self, account_id: &str) -> usize {
        if let Some(&idx) = self.index.get(account_id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(AccountNode::new(account_id));
        self.adjacency.push(Vec::new());
        self.predecessors.push(Vec::new());
        self.index.insert(account_id.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, sender: &str, receiver: &str, amount: f64, timestamp: &str) {
        let from = self.intern(sender);
        let to = self.intern(receiver);
        let parsed = parse_timestamp(timestamp);
        if parsed.is_none() {
            debug!(account = sender, timestamp, "unparseable timestamp");
        }

        if self.adjacency[from].is_empty() {
            self.sources.push(from);
        }
        self.adjacency[from].push(to);
        self.predecessors[to].push(from);
        self.edge_pairs.insert((from, to));

        let from_node = &mut self.nodes[from];
        from_node.out_degree += 1;
        from_node.occurrences += 1;
        from_node.timestamps.push(parsed);
        from_node.total_sent += amount;
        from_node.receivers.insert(to);

        let to_node = &mut self.nodes[to];
        to_node.in_degree += 1;
        to_node.occurrences += 1;
        to_node.timestamps.push(parsed);
        to_node.total_received += amount;
        to_node.senders.insert(from);

        self.transaction_count += 1;
        self.total_amount += amount;
    }

    /// Number of distinct accounts seen as sender or receiver
    pub fn account_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Account id for an arena index
    pub fn account_id(&self, idx: usize) -> &str {
        &self.nodes[idx].account_id
    }

    /// Arena index for an account id
    pub fn index_of(&self, account_id: &str) -> Option<usize> {
        self.index.get(account_id).copied()
    }

    /// Account ids in first-seen order
    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.account_id.as_str())
    }

    /// Successors of an account, with multiplicity, in input order
    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.adjacency[idx]
    }

    /// Senders into an account, with multiplicity, in input order
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.predecessors[idx]
    }

    /// Accounts in the order they first sent funds
    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    pub fn in_degree(&self, idx: usize) -> usize {
        self.nodes[idx].in_degree
    }

    pub fn out_degree(&self, idx: usize) -> usize {
        self.nodes[idx].out_degree
    }

    /// Transactions the account took part in, as sender or receiver
    pub fn occurrences(&self, idx: usize) -> usize {
        self.nodes[idx].occurrences
    }

    /// Transaction timestamps touching the account; `None` marks an
    /// unparseable timestamp.
    pub fn timestamps(&self, idx: usize) -> &[Option<DateTime<Utc>>] {
        &self.nodes[idx].timestamps
    }

    /// Transactions dropped for lacking an endpoint
    pub fn skipped_transactions(&self) -> usize {
        self.skipped_transactions
    }

    /// Get account statistics
    pub fn account_stats(&self, account_id: &str) -> Option<AccountStats> {
        let node = &self.nodes[self.index_of(account_id)?];
        Some(AccountStats {
            account_id: node.account_id.clone(),
            in_degree: node.in_degree,
            out_degree: node.out_degree,
            unique_senders: node.senders.len(),
            unique_receivers: node.receivers.len(),
            total_received: node.total_received,
            total_sent: node.total_sent,
            net_flow: node.total_sent - node.total_received,
            transaction_count: node.occurrences,
        })
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edge_pairs.len(),
            total_transactions: self.transaction_count,
            skipped_transactions: self.skipped_transactions,
            total_amount: self.total_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountStats {
    pub account_id: String,
    pub in_degree: usize,
    pub out_degree: usize,
    pub unique_senders: usize,
    pub unique_receivers: usize,
    pub total_received: f64,
    pub total_sent: f64,
    pub net_flow: f64,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    /// Distinct sender→receiver pairs
    pub edge_count: usize,
    pub total_transactions: usize,
    pub skipped_transactions: usize,
    pub total_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn tx(id: &str, from: &str, to: &str, amount: f64, ts: &str) -> Transaction {
        Transaction::new(id, from, to, amount, ts)
    }

    #[test]
    fn test_build_basic_graph() {
        let graph = TransactionGraph::build(&[
            tx("T1", "A", "B", 100.0, "2024-01-01 10:00:00"),
            tx("T2", "A", "C", 200.0, "2024-01-01 11:00:00"),
        ]);

        assert_eq!(graph.account_count(), 3);
        let a = graph.index_of("A").unwrap();
        let b = graph.index_of("B").unwrap();
        let c = graph.index_of("C").unwrap();
        assert_eq!(graph.successors(a), &[b, c]);
        assert_eq!(graph.out_degree(a), 2);
        assert_eq!(graph.in_degree(b), 1);
        assert_eq!(graph.occurrences(a), 2);
        assert_eq!(graph.timestamps(a).len(), 2);
        assert_eq!(graph.accounts().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_multi_edges_are_retained() {
        let graph = TransactionGraph::build(&[
            tx("T1", "A", "B", 100.0, "2024-01-01 10:00:00"),
            tx("T2", "A", "B", 50.0, "2024-01-01 10:05:00"),
        ]);

        let a = graph.index_of("A").unwrap();
        let b = graph.index_of("B").unwrap();
        assert_eq!(graph.successors(a), &[b, b]);
        assert_eq!(graph.predecessors(b), &[a, a]);
        assert_eq!(graph.in_degree(b), 2);

        let stats = graph.stats();
        assert_eq!(stats.edge_count, 1);
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.total_amount, 150.0);
    }

    #[test]
    fn test_self_loop_counts_both_endpoints() {
        let graph = TransactionGraph::build(&[tx("T1", "A", "A", 10.0, "2024-01-01 10:00:00")]);

        let a = graph.index_of("A").unwrap();
        assert_eq!(graph.account_count(), 1);
        assert_eq!(graph.in_degree(a), 1);
        assert_eq!(graph.out_degree(a), 1);
        assert_eq!(graph.occurrences(a), 2);
        assert_eq!(graph.timestamps(a).len(), 2);
    }

    #[test]
    fn test_missing_endpoints_are_skipped() {
        let mut missing_sender = tx("T1", "A", "B", 10.0, "2024-01-01 10:00:00");
        missing_sender.sender_id = None;
        let mut blank_receiver = tx("T2", "C", "D", 10.0, "2024-01-01 10:00:00");
        blank_receiver.receiver_id = Some("   ".to_string());

        let graph = TransactionGraph::build(&[
            missing_sender,
            blank_receiver,
            tx("T3", "E", "F", 10.0, "2024-01-01 10:00:00"),
        ]);

        assert_eq!(graph.account_count(), 2);
        assert_eq!(graph.skipped_transactions(), 2);
        assert!(graph.index_of("A").is_none());
        assert!(graph.index_of("C").is_none());
    }

    #[test]
    fn test_sources_follow_first_send_order() {
        let graph = TransactionGraph::build(&[
            tx("T1", "X", "A", 1.0, "2024-01-01 10:00:00"),
            tx("T2", "B", "C", 1.0, "2024-01-01 10:00:00"),
            tx("T3", "A", "B", 1.0, "2024-01-01 10:00:00"),
        ]);

        let ids: Vec<&str> = graph
            .sources()
            .iter()
            .map(|&idx| graph.account_id(idx))
            .collect();
        assert_eq!(ids, vec!["X", "B", "A"]);
        assert_eq!(graph.accounts().collect::<Vec<_>>(), vec!["X", "A", "B", "C"]);
    }

    #[test]
    fn test_unparseable_timestamp_recorded_as_none() {
        let graph = TransactionGraph::build(&[tx("T1", "A", "B", 1.0, "not a date")]);
        let a = graph.index_of("A").unwrap();
        assert_eq!(graph.timestamps(a), &[None]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let spaced = parse_timestamp("2024-03-05 14:30:15").unwrap();
        assert_eq!(spaced.year(), 2024);
        assert_eq!(spaced.month(), 3);
        assert_eq!(spaced.hour(), 14);
        assert_eq!(spaced.second(), 15);

        assert_eq!(parse_timestamp("2024-03-05T14:30:15"), Some(spaced));
        assert_eq!(parse_timestamp("2024-03-05T14:30:15Z"), Some(spaced));
        assert!(parse_timestamp("2024-03-05T14:30:15.250").is_some());
        assert_eq!(parse_timestamp("2024-03-05").unwrap().hour(), 0);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-45 99:00:00").is_none());
    }

    #[test]
    fn test_account_stats() {
        let graph = TransactionGraph::build(&[
            tx("T1", "A", "B", 1000.0, "2024-01-01 10:00:00"),
            tx("T2", "A", "C", 2000.0, "2024-01-01 10:00:00"),
            tx("T3", "C", "A", 500.0, "2024-01-01 10:00:00"),
        ]);

        let stats = graph.account_stats("A").unwrap();
        assert_eq!(stats.total_sent, 3000.0);
        assert_eq!(stats.total_received, 500.0);
        assert_eq!(stats.net_flow, 2500.0);
        assert_eq!(stats.unique_receivers, 2);
        assert_eq!(stats.unique_senders, 1);
        assert_eq!(stats.transaction_count, 3);

        assert!(graph.account_stats("Z").is_none());
    }
}
