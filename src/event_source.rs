//! # Event Source Module
//!
//! Reads exported spend-log rows and turns them into time-ordered [`Event`]s
//!
//! ## Key Components
//! - [`SpendLogRow`] - One exported row (`startTime`, `model`, `end_user`)
//! - [`EventQuery`] - User and date range filter
//! - [`parse_timestamp`] - RFC 3339 and PostgreSQL text timestamps
//! - [`load_events`] - Parse all inputs in parallel, filter, sort

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::data_processing::DateRange;
use crate::session::Event;

/// Path that selects standard input
pub const STDIN_PATH: &str = "-";

#[derive(Debug, Deserialize)]
pub struct SpendLogRow {
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub end_user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventQuery {
    pub user: Option<String>,
    pub range: DateRange,
}

impl EventQuery {
    fn matches(&self, end_user: Option<&str>, timestamp: DateTime<Utc>) -> bool {
        let user_matches = match &self.user {
            Some(user) => end_user == Some(user.as_str()),
            None => true,
        };
        user_matches && self.range.contains(timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One JSON object per line
    JsonLines,
    /// A single JSON array of objects
    JsonArray,
}

impl InputFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::JsonArray,
            _ => InputFormat::JsonLines,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub kept: usize,
    pub invalid_rows: usize,
    pub missing_model: usize,
    pub bad_timestamp: usize,
    pub filtered_out: usize,
}

impl LoadStats {
    pub fn skipped(&self) -> usize {
        self.invalid_rows + self.missing_model + self.bad_timestamp
    }

    pub fn merge(&mut self, other: &LoadStats) {
        self.rows += other.rows;
        self.kept += other.kept;
        self.invalid_rows += other.invalid_rows;
        self.missing_model += other.missing_model;
        self.bad_timestamp += other.bad_timestamp;
        self.filtered_out += other.filtered_out;
    }
}

/// Parse RFC 3339 or PostgreSQL-style timestamps; naive values are UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(timestamp) = DateTime::parse_from_str(raw, format) {
            return Some(timestamp.with_timezone(&Utc));
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp.and_utc());
        }
    }

    None
}

fn accept_row(row: SpendLogRow, query: &EventQuery, stats: &mut LoadStats) -> Option<Event> {
    let Some(model) = row.model else {
        stats.missing_model += 1;
        return None;
    };

    let Some(timestamp) = parse_timestamp(&row.start_time) else {
        stats.bad_timestamp += 1;
        return None;
    };

    if !query.matches(row.end_user.as_deref(), timestamp) {
        stats.filtered_out += 1;
        return None;
    }

    stats.kept += 1;
    Some(Event::new(timestamp, model))
}

/// Parse rows from `reader`, skipping (and counting) rows that do not fit.
/// The returned events are in input order, not sorted.
pub fn parse_rows<R: BufRead>(
    reader: R,
    format: InputFormat,
    query: &EventQuery,
    stats: &mut LoadStats,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();

    match format {
        InputFormat::JsonLines => {
            for line in reader.lines() {
                let line = line.context("Failed to read line")?;
                if line.trim().is_empty() {
                    continue;
                }
                stats.rows += 1;

                match serde_json::from_str::<SpendLogRow>(&line) {
                    Ok(row) => events.extend(accept_row(row, query, stats)),
                    Err(_) => stats.invalid_rows += 1,
                }
            }
        }
        InputFormat::JsonArray => {
            let values: Vec<serde_json::Value> =
                serde_json::from_reader(reader).context("Expected a JSON array of spend-log rows")?;

            for value in values {
                stats.rows += 1;
                match serde_json::from_value::<SpendLogRow>(value) {
                    Ok(row) => events.extend(accept_row(row, query, stats)),
                    Err(_) => stats.invalid_rows += 1,
                }
            }
        }
    }

    Ok(events)
}

fn load_source(path: &Path, query: &EventQuery) -> Result<(Vec<Event>, LoadStats)> {
    let mut stats = LoadStats::default();

    let events = if path == Path::new(STDIN_PATH) {
        let stdin = io::stdin();
        parse_rows(stdin.lock(), InputFormat::JsonLines, query, &mut stats)
            .context("Failed to parse spend log rows from stdin")?
    } else {
        let file = File::open(path)
            .with_context(|| format!("Failed to open spend log {}", path.display()))?;
        parse_rows(BufReader::new(file), InputFormat::for_path(path), query, &mut stats)
            .with_context(|| format!("Failed to parse spend log {}", path.display()))?
    };

    if stats.skipped() > 0 {
        warn!(
            "{}: skipped {} rows ({} invalid, {} without model, {} bad timestamp)",
            path.display(),
            stats.skipped(),
            stats.invalid_rows,
            stats.missing_model,
            stats.bad_timestamp
        );
    }
    debug!(
        "{}: {} rows, {} kept, {} outside user/date filter",
        path.display(),
        stats.rows,
        stats.kept,
        stats.filtered_out
    );

    Ok((events, stats))
}

/// Stdin for an empty list; repeated paths are read once
fn unique_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    if paths.is_empty() {
        return vec![PathBuf::from(STDIN_PATH)];
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(paths.len());
    for path in paths {
        if seen.insert(path.as_path()) {
            unique.push(path.clone());
        } else {
            warn!("Ignoring repeated input {}", path.display());
        }
    }
    unique
}

/// Load every input (stdin when `paths` is empty), keep rows matching
/// `query`, and return them sorted ascending by timestamp.
pub fn load_events(paths: &[PathBuf], query: &EventQuery) -> Result<(Vec<Event>, LoadStats)> {
    let paths = unique_sources(paths);

    let per_source: Vec<(Vec<Event>, LoadStats)> = paths
        .par_iter()
        .map(|path| load_source(path, query))
        .collect::<Result<_>>()?;

    let mut totals = LoadStats::default();
    let mut events = Vec::new();
    for (source_events, stats) in per_source {
        totals.merge(&stats);
        events.extend(source_events);
    }

    // Stable: rows sharing a timestamp keep their input order
    events.sort_by_key(|event| event.timestamp);

    debug!("Loaded {} events from {} inputs", events.len(), paths.len());
    Ok((events, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn april_query(user: Option<&str>) -> EventQuery {
        EventQuery {
            user: user.map(str::to_string),
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 4, 2, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(250);

        assert_eq!(parse_timestamp("2025-04-02T12:00:00.250Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-02T14:00:00.250+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-02 12:00:00.250"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-02 12:00:00.250+00"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-02 12:00:00.250+00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-04-02 12:00:00"),
            Some(Utc.with_ymd_and_hms(2025, 4, 2, 12, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_jsonl_rows_skipped_and_counted() {
        let input = r#"
{"startTime": "2025-04-02T10:00:00Z", "model": "gpt-4", "end_user": "u1", "total_tokens": 120}
not json at all
{"startTime": "2025-04-02T10:00:01Z", "end_user": "u1"}
{"startTime": "sometime", "model": "gpt-4", "end_user": "u1"}
{"startTime": "2025-04-02T10:00:02Z", "model": null, "end_user": "u1"}
{"startTime": "2025-04-02T10:00:03Z", "model": "claude-3-haiku", "end_user": "u1"}
"#;
        let mut stats = LoadStats::default();
        let events = parse_rows(Cursor::new(input), InputFormat::JsonLines, &april_query(None), &mut stats)
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].model_id, "claude-3-haiku");
        assert_eq!(stats.rows, 6);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.invalid_rows, 1);
        assert_eq!(stats.missing_model, 2);
        assert_eq!(stats.bad_timestamp, 1);
        assert_eq!(stats.skipped(), 4);
    }

    #[test]
    fn test_user_and_range_filter() {
        let input = r#"[
            {"startTime": "2025-04-02T10:00:00Z", "model": "gpt-4", "end_user": "alice"},
            {"startTime": "2025-04-02T10:00:00Z", "model": "gpt-4", "end_user": "bob"},
            {"startTime": "2025-04-02T10:00:00Z", "model": "gpt-4"},
            {"startTime": "2025-03-31T23:59:59Z", "model": "gpt-4", "end_user": "alice"},
            {"startTime": "2025-04-07T23:59:59Z", "model": "gemini-pro", "end_user": "alice"},
            {"startTime": "2025-04-08T00:00:00Z", "model": "gpt-4", "end_user": "alice"}
        ]"#;
        let mut stats = LoadStats::default();
        let events = parse_rows(
            Cursor::new(input),
            InputFormat::JsonArray,
            &april_query(Some("alice")),
            &mut stats,
        )
        .unwrap();

        let models: Vec<&str> = events.iter().map(|e| e.model_id.as_str()).collect();
        assert_eq!(models, vec!["gpt-4", "gemini-pro"]);
        assert_eq!(stats.filtered_out, 4);

        let mut stats = LoadStats::default();
        let everyone =
            parse_rows(Cursor::new(input), InputFormat::JsonArray, &april_query(None), &mut stats).unwrap();
        assert_eq!(everyone.len(), 4);
    }

    #[test]
    fn test_malformed_json_array_is_error() {
        let mut stats = LoadStats::default();
        let result = parse_rows(
            Cursor::new("{\"startTime\": 1}"),
            InputFormat::JsonArray,
            &april_query(None),
            &mut stats,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_input_format_detection() {
        assert_eq!(InputFormat::for_path(Path::new("logs.json")), InputFormat::JsonArray);
        assert_eq!(InputFormat::for_path(Path::new("logs.JSON")), InputFormat::JsonArray);
        assert_eq!(InputFormat::for_path(Path::new("logs.jsonl")), InputFormat::JsonLines);
        assert_eq!(InputFormat::for_path(Path::new("logs")), InputFormat::JsonLines);
    }

    #[test]
    fn test_load_events_merges_and_sorts() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.jsonl");
        let second = dir.path().join("b.json");
        std::fs::write(
            &first,
            "{\"startTime\": \"2025-04-03T08:00:05Z\", \"model\": \"gpt-4\"}\n\
             {\"startTime\": \"2025-04-03T08:00:00Z\", \"model\": \"claude-3-opus\"}\n",
        )
        .unwrap();
        std::fs::write(
            &second,
            r#"[{"startTime": "2025-04-03 08:00:00.500", "model": "gemini-pro"}]"#,
        )
        .unwrap();

        let (events, stats) = load_events(&[first, second], &april_query(None)).unwrap();

        let models: Vec<&str> = events.iter().map(|e| e.model_id.as_str()).collect();
        assert_eq!(models, vec!["claude-3-opus", "gemini-pro", "gpt-4"]);
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.kept, 3);
    }

    #[test]
    fn test_repeated_inputs_read_once() {
        let paths = vec![
            PathBuf::from(STDIN_PATH),
            PathBuf::from("a.jsonl"),
            PathBuf::from(STDIN_PATH),
            PathBuf::from("a.jsonl"),
        ];
        assert_eq!(
            unique_sources(&paths),
            vec![PathBuf::from(STDIN_PATH), PathBuf::from("a.jsonl")]
        );
        assert_eq!(unique_sources(&[]), vec![PathBuf::from(STDIN_PATH)]);

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("calls.jsonl");
        std::fs::write(&file, "{\"startTime\": \"2025-04-03T08:00:00Z\", \"model\": \"gpt-4\"}\n").unwrap();
        let (events, stats) = load_events(&[file.clone(), file], &april_query(None)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(stats.rows, 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = load_events(&[dir.path().join("absent.jsonl")], &april_query(None));
        assert!(result.is_err());
    }
}
