//! # Data Processing Module
//!
//! Date range handling and per-day / per-family event aggregation
//!
//! ## Key Components
//! - [`parse_date_filter`] - Parse `YYYY-MM-DD` or `YYYYMMDD` date strings
//! - [`DateRange`] - Inclusive range of UTC calendar days
//! - [`aggregate_daily_families`] - Gap-free per-day family counts
//! - [`FamilyBreakdown`] - Event totals per family label

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{FamilyClassifier, FamilyLabel};
use crate::session::Event;

/// Number of days covered when no explicit range is requested
pub const DEFAULT_RANGE_DAYS: i64 = 7;

/// Parse date in YYYY-MM-DD (or compact YYYYMMDD) format
pub fn parse_date_filter(date_str: &str) -> Result<NaiveDate> {
    let date_str = date_str.trim();
    let normalized = if date_str.len() == 8 && date_str.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &date_str[0..4], &date_str[4..6], &date_str[6..8])
    } else {
        date_str.to_string()
    };

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .with_context(|| format!("Date must be in YYYY-MM-DD format, got: {}", date_str))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            anyhow::bail!("Start date {} is after end date {}", start, end);
        }
        Ok(Self { start, end })
    }

    /// The last seven days ending on `today`, both ends included
    pub fn last_week(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(DEFAULT_RANGE_DAYS - 1),
            end: today,
        }
    }

    /// Explicit bounds are only honoured when both are given
    pub fn resolve(start: Option<&str>, end: Option<&str>, today: NaiveDate) -> Result<Self> {
        match (start, end) {
            (Some(start), Some(end)) => {
                let start = parse_date_filter(start).context("Invalid start date")?;
                let end = parse_date_filter(end).context("Invalid end date")?;
                Self::new(start, end)
            }
            _ => Ok(Self::last_week(today)),
        }
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Midnight after the last day; the range is half-open on instants
    pub fn end_instant_exclusive(&self) -> DateTime<Utc> {
        (self.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc()
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start_instant() && timestamp < self.end_instant_exclusive()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyFamilyCounts {
    pub day: NaiveDate,
    #[serde(rename = "Claude")]
    pub claude: u64,
    #[serde(rename = "ChatGPT")]
    pub chatgpt: u64,
    #[serde(rename = "Gemini")]
    pub gemini: u64,
    /// All events of the day, `Other` included
    #[serde(rename = "Total")]
    pub total: u64,
}

impl DailyFamilyCounts {
    fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            claude: 0,
            chatgpt: 0,
            gemini: 0,
            total: 0,
        }
    }

    fn add(&mut self, label: FamilyLabel) {
        match label {
            FamilyLabel::Claude => self.claude += 1,
            FamilyLabel::ChatGPT => self.chatgpt += 1,
            FamilyLabel::Gemini => self.gemini += 1,
            FamilyLabel::Other => {}
        }
        self.total += 1;
    }
}

/// Count events per UTC day and family, one record for every day in `range`
pub fn aggregate_daily_families(
    events: &[Event],
    range: &DateRange,
    classifier: &FamilyClassifier,
) -> Vec<DailyFamilyCounts> {
    let mut daily_map: BTreeMap<NaiveDate, DailyFamilyCounts> = range
        .days()
        .map(|day| (day, DailyFamilyCounts::empty(day)))
        .collect();

    let mut outside_range = 0usize;
    for event in events {
        match daily_map.get_mut(&event.timestamp.date_naive()) {
            Some(daily) => daily.add(classifier.classify(&event.model_id)),
            None => outside_range += 1,
        }
    }

    if outside_range > 0 {
        debug!("Ignored {} events outside {} .. {}", outside_range, range.start, range.end);
    }

    daily_map.into_values().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyBreakdown {
    counts: BTreeMap<FamilyLabel, u64>,
}

impl FamilyBreakdown {
    pub fn from_events(events: &[Event], classifier: &FamilyClassifier) -> Self {
        let mut counts: BTreeMap<FamilyLabel, u64> =
            FamilyLabel::ALL.iter().map(|label| (*label, 0)).collect();

        for event in events {
            *counts.entry(classifier.classify(&event.model_id)).or_insert(0) += 1;
        }

        Self { counts }
    }

    pub fn count(&self, label: FamilyLabel) -> u64 {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Labels in fixed display order, zero counts included
    pub fn iter(&self) -> impl Iterator<Item = (FamilyLabel, u64)> + '_ {
        FamilyLabel::ALL.iter().map(|label| (*label, self.count(*label)))
    }
}

impl Serialize for FamilyBreakdown {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(FamilyLabel::ALL.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label.name(), &count)?;
        }
        map.end()
    }
}
