//! Per-account suspicion scoring
//!
//! Four independent heuristics add points to an owned per-run score board:
//! cycle membership, fan-in/fan-out hubs, shell intermediaries in 3-hop
//! layering chains, and high-velocity bursts. Scores only ever grow during a
//! run and are clamped and rounded once at the end.

use crate::cycles::DetectedCycle;
use crate::graph::TransactionGraph;
use crate::DetectorConfig;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tracing::debug;

/// Round to one decimal place.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Detected pattern tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternTag {
    /// Member of a ring with this many accounts
    CycleLength(usize),
    FanIn,
    FanOut,
    ShellIntermediate,
    HighVelocity,
}

impl fmt::Display for PatternTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTag::CycleLength(n) => write!(f, "cycle_length_{}", n),
            PatternTag::FanIn => write!(f, "fan_in"),
            PatternTag::FanOut => write!(f, "fan_out"),
            PatternTag::ShellIntermediate => write!(f, "shell_intermediate"),
            PatternTag::HighVelocity => write!(f, "high_velocity"),
        }
    }
}

/// Accumulated score and tags for one account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountScore {
    pub score: f64,
    patterns: Vec<PatternTag>,
}

impl AccountScore {
    fn add(&mut self, points: f64, tag: PatternTag) {
        self.score += points;
        if !self.patterns.contains(&tag) {
            self.patterns.push(tag);
        }
    }

    /// Tags in the order first detected, without duplicates
    pub fn patterns(&self) -> &[PatternTag] {
        &self.patterns
    }
}

/// Scores for every account of one analysis run, indexed like the graph
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBoard {
    scores: Vec<AccountScore>,
}

impl ScoreBoard {
    pub fn new(account_count: usize) -> Self {
        Self {
            scores: vec![AccountScore::default(); account_count],
        }
    }

    fn add(&mut self, idx: usize, points: f64, tag: PatternTag) {
        self.scores[idx].add(points, tag);
    }

    pub fn get(&self, idx: usize) -> Option<&AccountScore> {
        self.scores.get(idx)
    }

    /// Score for an account, zero when out of range
    pub fn score(&self, idx: usize) -> f64 {
        self.scores.get(idx).map(|s| s.score).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &AccountScore)> {
        self.scores.iter().enumerate()
    }

    /// Clamp every score to `max_score` and round to one decimal.
    fn finalize(mut self, max_score: f64) -> Self {
        for entry in &mut self.scores {
            entry.score = round_one_decimal(entry.score.min(max_score));
        }
        self
    }
}

/// Heuristic scorer driven by a [`DetectorConfig`]
pub struct PatternScorer<'a> {
    config: &'a DetectorConfig,
}

impl<'a> PatternScorer<'a> {
    pub fn new(config: &'a DetectorConfig) -> Self {
        Self { config }
    }

    /// Run all heuristics and return the finalized board.
    pub fn score(&self, graph: &TransactionGraph, cycles: &[DetectedCycle]) -> ScoreBoard {
        let mut board = ScoreBoard::new(graph.account_count());

        self.score_cycles(&mut board, cycles);
        self.score_fan(&mut board, graph);
        self.score_shells(&mut board, graph);
        self.score_velocity(&mut board, graph);

        board.finalize(self.config.max_score)
    }

    fn score_cycles(&self, board: &mut ScoreBoard, cycles: &[DetectedCycle]) {
        for cycle in cycles {
            let tag = PatternTag::CycleLength(cycle.len());
            for &member in &cycle.members {
                board.add(member, self.config.cycle_weight, tag);
            }
        }
    }

    fn score_fan(&self, board: &mut ScoreBoard, graph: &TransactionGraph) {
        let threshold = self.config.fan_threshold;
        for idx in 0..graph.account_count() {
            if graph.in_degree(idx) >= threshold {
                board.add(idx, self.config.fan_weight, PatternTag::FanIn);
            }
            if graph.out_degree(idx) >= threshold {
                board.add(idx, self.config.fan_weight, PatternTag::FanOut);
            }
        }
    }

    fn is_low_activity(&self, graph: &TransactionGraph, idx: usize) -> bool {
        (self.config.shell_min_activity..=self.config.shell_max_activity)
            .contains(&graph.occurrences(idx))
    }

    /// Every simple path A->B->C->D (four distinct accounts) whose middle
    /// hops B and C are both low-activity adds the shell weight to B and C.
    /// Each qualifying path counts on its own, so parallel transfers score
    /// repeatedly. Low-activity accounts have at most `shell_max_activity`
    /// edges, which keeps the walk around each B->C edge small.
    fn score_shells(&self, board: &mut ScoreBoard, graph: &TransactionGraph) {
        let mut flagged_paths = 0usize;

        for b in 0..graph.account_count() {
            if !self.is_low_activity(graph, b) {
                continue;
            }
            for &c in graph.successors(b) {
                if c == b || !self.is_low_activity(graph, c) {
                    continue;
                }

                let mut paths = 0usize;
                for &a in graph.predecessors(b) {
                    if a == b || a == c {
                        continue;
                    }
                    paths += graph
                        .successors(c)
                        .iter()
                        .filter(|&&d| d != a && d != b && d != c)
                        .count();
                }
                if paths == 0 {
                    continue;
                }

                let points = self.config.shell_weight * paths as f64;
                board.add(b, points, PatternTag::ShellIntermediate);
                board.add(c, points, PatternTag::ShellIntermediate);
                flagged_paths += paths;
            }
        }

        debug!(paths = flagged_paths, "shell layering paths scored");
    }

    fn score_velocity(&self, board: &mut ScoreBoard, graph: &TransactionGraph) {
        let window = Duration::hours(self.config.velocity_window_hours);

        for idx in 0..graph.account_count() {
            let mut times: Vec<DateTime<Utc>> =
                graph.timestamps(idx).iter().flatten().copied().collect();
            times.sort_unstable();

            if first_burst(&times, window, self.config.velocity_min_events).is_some() {
                board.add(idx, self.config.velocity_weight, PatternTag::HighVelocity);
            }
        }
    }
}

/// Two-pointer scan over sorted timestamps. Returns the bounds of the first
/// window holding at least `min_events` events no further apart than `window`.
pub fn first_burst(
    times: &[DateTime<Utc>],
    window: Duration,
    min_events: usize,
) -> Option<(usize, usize)> {
    let mut left = 0;
    for right in 0..times.len() {
        while times[right] - times[left] > window {
            left += 1;
        }
        if right - left + 1 >= min_events {
            return Some((left, right));
        }
    }
    None
}
