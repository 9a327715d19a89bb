//! Circular fund routing detection
//!
//! A single depth-first pass over the account graph. Every account is
//! entered at most once across the whole pass, so when two cycles share an
//! account only the one closed first by a back edge is reported.

use crate::graph::TransactionGraph;
use crate::DetectorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Ring pattern type as reported to consumers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Funds routed around a closed loop of accounts
    Cycle,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternType::Cycle => write!(f, "cycle"),
        }
    }
}

/// A deduplicated cycle with its ring identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCycle {
    pub ring_id: String,
    /// Member accounts in traversal order
    pub member_accounts: Vec<String>,
    /// Graph indices of the members, same order as `member_accounts`
    pub members: Vec<usize>,
    pub pattern_type: PatternType,
}

impl DetectedCycle {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// DFS frame: the account being explored and the next successor to try
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    next: usize,
}

/// Bounded-length cycle detector
#[derive(Debug, Clone)]
pub struct CycleDetector {
    min_length: usize,
    max_length: usize,
}

impl CycleDetector {
    /// Create a detector accepting cycles of `min_length..=max_length` accounts.
    /// Bounds are unchecked; public callers go through [`Self::from_config`]
    /// with a validated [`DetectorConfig`].
    pub(crate) fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
        }
    }

    /// Detector for the cycle bounds of a configuration that has passed
    /// [`DetectorConfig::validate`], so the shortest ring has three accounts.
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.min_cycle_length, config.max_cycle_length)
    }

    /// Find cycles and number them `RING-001`, `RING-002`, ... in discovery order.
    pub fn detect(&self, graph: &TransactionGraph) -> Vec<DetectedCycle> {
        let n = graph.account_count();
        let mut visited = vec![false; n];
        let mut stack_pos: Vec<Option<usize>> = vec![None; n];
        let mut path: Vec<usize> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut cycles = Vec::new();

        for &root in graph.sources() {
            if visited[root] {
                continue;
            }

            visited[root] = true;
            stack_pos[root] = Some(path.len());
            path.push(root);
            frames.push(Frame { node: root, next: 0 });

            while let Some(frame) = frames.last_mut() {
                let u = frame.node;
                let v = match graph.successors(u).get(frame.next) {
                    Some(&v) => v,
                    None => {
                        frames.pop();
                        path.pop();
                        stack_pos[u] = None;
                        continue;
                    }
                };
                frame.next += 1;

                if !visited[v] {
                    visited[v] = true;
                    stack_pos[v] = Some(path.len());
                    path.push(v);
                    frames.push(Frame { node: v, next: 0 });
                } else if let Some(pos) = stack_pos[v] {
                    self.record(graph, &path[pos..], &mut seen, &mut cycles);
                }
            }
        }

        debug!(cycles = cycles.len(), "cycle detection complete");
        cycles
    }

    fn record(
        &self,
        graph: &TransactionGraph,
        candidate: &[usize],
        seen: &mut HashSet<Vec<usize>>,
        cycles: &mut Vec<DetectedCycle>,
    ) {
        if !(self.min_length..=self.max_length).contains(&candidate.len()) {
            return;
        }

        let mut key = candidate.to_vec();
        key.sort_unstable();
        if !seen.insert(key) {
            return;
        }

        cycles.push(DetectedCycle {
            ring_id: format!("RING-{:03}", cycles.len() + 1),
            member_accounts: candidate
                .iter()
                .map(|&idx| graph.account_id(idx).to_string())
                .collect(),
            members: candidate.to_vec(),
            pattern_type: PatternType::Cycle,
        });
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}
