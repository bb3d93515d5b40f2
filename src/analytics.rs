//! # Session Analytics Module
//!
//! Classifies inferred sessions and aggregates multi-model usage statistics
//!
//! ## Key Components
//! - [`SessionKind`] - Single-model or multi-model session
//! - [`CombinationKey`] - Canonical, order-independent model set
//! - [`UsageAggregator`] - Accumulates counts over a session stream
//! - [`UsageStatistics`] - Final single/multi counts and combination ranking

use log::debug;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::session::Session;

pub const COMBINATION_SEPARATOR: &str = "+";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CombinationKey(String);

impl CombinationKey {
    /// Sorted distinct ids joined by `+`
    pub fn from_models<'a>(models: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = models.into_iter().collect();
        Self(distinct.into_iter().collect::<Vec<_>>().join(COMBINATION_SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    Single(String),
    Multi(CombinationKey),
}

impl SessionKind {
    pub fn classify(session: &Session<'_>) -> Self {
        debug_assert!(session.event_count() > 0, "sessions always hold at least one event");

        let distinct: BTreeSet<&str> = session.members().collect();
        if distinct.len() > 1 {
            SessionKind::Multi(CombinationKey::from_models(distinct))
        } else {
            let model = distinct.into_iter().next().unwrap_or_default();
            SessionKind::Single(model.to_string())
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, SessionKind::Multi(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinationCount {
    pub combination: CombinationKey,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageStatistics {
    pub single_count: u64,
    pub multi_count: u64,
    pub session_count: u64,
    pub event_count: u64,
    /// Frequency descending; equal counts keep first-seen order
    pub combination_frequencies: Vec<CombinationCount>,
}

#[derive(Debug, Default)]
pub struct UsageAggregator {
    single_count: u64,
    multi_count: u64,
    session_count: u64,
    event_count: u64,
    // Insertion order of first observation, plus a lookup into it
    combinations: Vec<CombinationCount>,
    positions: HashMap<CombinationKey, usize>,
}

impl UsageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&mut self, session: &Session<'_>) -> SessionKind {
        self.session_count += 1;
        self.event_count += session.event_count() as u64;

        let kind = SessionKind::classify(session);
        match &kind {
            SessionKind::Single(_) => self.single_count += 1,
            SessionKind::Multi(key) => {
                self.multi_count += 1;
                self.record_combination(key);
            }
        }
        kind
    }

    fn record_combination(&mut self, key: &CombinationKey) {
        match self.positions.get(key) {
            Some(&index) => self.combinations[index].count += 1,
            None => {
                self.positions.insert(key.clone(), self.combinations.len());
                self.combinations.push(CombinationCount {
                    combination: key.clone(),
                    count: 1,
                });
            }
        }
    }

    pub fn finalize(self) -> UsageStatistics {
        let mut combination_frequencies = self.combinations;
        // sort_by is stable, so ties stay in first-seen order
        combination_frequencies.sort_by(|a, b| b.count.cmp(&a.count));

        debug!(
            "Aggregated {} sessions ({} single, {} multi, {} combinations)",
            self.session_count,
            self.single_count,
            self.multi_count,
            combination_frequencies.len()
        );

        UsageStatistics {
            single_count: self.single_count,
            multi_count: self.multi_count,
            session_count: self.session_count,
            event_count: self.event_count,
            combination_frequencies,
        }
    }
}

pub fn aggregate_sessions(sessions: &[Session<'_>]) -> UsageStatistics {
    let mut aggregator = UsageAggregator::new();
    for session in sessions {
        aggregator.add_session(session);
    }
    aggregator.finalize()
}
