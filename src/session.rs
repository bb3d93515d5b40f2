//! # Session Grouping Module
//!
//! Infers interaction sessions from a time-ordered stream of model calls
//!
//! ## Key Components
//! - [`Event`] - One model invocation (timestamp + model id)
//! - [`Session`] - A contiguous run of events sharing an anchor window
//! - [`SessionGrouper`] - Fixed-anchor window partitioning
//! - [`GroupingError`] - Rejected input for the checked grouping path

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

/// Default proximity window, measured from the session anchor
pub const SESSION_WINDOW_MS: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, model_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            model_id: model_id.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GroupingError {
    #[error("events are not in ascending time order: event {index} at {current} precedes {previous}")]
    InvalidInputOrder {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

/// A session borrows the slice of input events it covers, so members are
/// always contiguous in the original order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Session<'a> {
    pub anchor_timestamp: DateTime<Utc>,
    pub events: &'a [Event],
}

impl<'a> Session<'a> {
    pub fn members(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        let events: &'a [Event] = self.events;
        events.iter().map(|event| event.model_id.as_str())
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.events
            .last()
            .map(|event| event.timestamp)
            .unwrap_or(self.anchor_timestamp)
    }
}

#[derive(Debug, Clone)]
pub struct SessionGrouper {
    window: Duration,
}

impl SessionGrouper {
    pub fn new() -> Self {
        Self::with_window(Duration::milliseconds(SESSION_WINDOW_MS))
    }

    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn within_window(&self, anchor: DateTime<Utc>, timestamp: DateTime<Utc>) -> bool {
        let delta = timestamp - anchor;
        delta <= self.window && delta >= -self.window
    }

    /// Partition `events` into sessions in a single forward pass.
    ///
    /// Every candidate is compared against the first event of its session,
    /// not against its predecessor: calls spaced 0.6s apart still start a new
    /// session once they drift more than the window away from the anchor.
    ///
    /// `events` must be sorted ascending by timestamp. Unsorted input is not
    /// rejected here; session boundaries are then unspecified. Use
    /// [`SessionGrouper::group_checked`] to validate first.
    ///
    /// The anchor always belongs to its own session, so a negative window
    /// yields one session per event.
    pub fn group<'a>(&self, events: &'a [Event]) -> Vec<Session<'a>> {
        let mut sessions = Vec::new();
        let mut start = 0;

        while start < events.len() {
            let anchor = events[start].timestamp;
            let mut end = start + 1;
            while end < events.len() && self.within_window(anchor, events[end].timestamp) {
                end += 1;
            }

            sessions.push(Session {
                anchor_timestamp: anchor,
                events: &events[start..end],
            });
            start = end;
        }

        sessions
    }

    pub fn group_checked<'a>(&self, events: &'a [Event]) -> Result<Vec<Session<'a>>, GroupingError> {
        validate_order(events)?;
        Ok(self.group(events))
    }
}

impl Default for SessionGrouper {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_order(events: &[Event]) -> Result<(), GroupingError> {
    for (offset, pair) in events.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(GroupingError::InvalidInputOrder {
                index: offset + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}
