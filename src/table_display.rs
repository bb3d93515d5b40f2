//! # Table Display Module
//!
//! Terminal tables and JSON documents for the usage reports
//!
//! ## Key Components
//! - [`JsonReport`] - Full report in the dashboard's field naming
//! - [`format_distribution_table`] - Single vs multi model sessions
//! - [`format_combination_table`] - Ranked model combinations
//! - [`format_daily_table`] - Gap-free per-day family counts
//! - [`format_session_table`] - Every inferred session

use serde::Serialize;

use crate::analytics::{CombinationCount, SessionKind, UsageStatistics};
use crate::data_processing::{DailyFamilyCounts, DateRange, FamilyBreakdown};
use crate::session::Session;

const GRAY: &str = "\x1b[90m";
const RESET: &str = "\x1b[39m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct JsonDistribution {
    pub single_llm: u64,
    pub multi_llm: u64,
}

impl From<&UsageStatistics> for JsonDistribution {
    fn from(stats: &UsageStatistics) -> Self {
        Self {
            single_llm: stats.single_count,
            multi_llm: stats.multi_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub range: DateRange,
    pub single_multi_summary: JsonDistribution,
    pub combination_breakdown: &'a [CombinationCount],
    pub daily_family_breakdown: &'a [DailyFamilyCounts],
    pub family_breakdown: &'a FamilyBreakdown,
}

#[derive(Debug, Serialize)]
pub struct JsonSession {
    pub anchor_timestamp: String,
    pub last_timestamp: String,
    pub event_count: usize,
    pub models: Vec<String>,
    pub multi_model: bool,
    pub combination: Option<String>,
}

impl JsonSession {
    pub fn from_session(session: &Session<'_>) -> Self {
        let kind = SessionKind::classify(session);
        Self {
            anchor_timestamp: session.anchor_timestamp.to_rfc3339(),
            last_timestamp: session.last_timestamp().to_rfc3339(),
            event_count: session.event_count(),
            models: session.members().map(str::to_string).collect(),
            multi_model: kind.is_multi(),
            combination: match kind {
                SessionKind::Multi(key) => Some(key.to_string()),
                SessionKind::Single(_) => None,
            },
        }
    }
}

pub fn format_number_compact(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn format_percentage(part: u64, total: u64) -> String {
    if total == 0 {
        "-".to_string()
    } else {
        format!("{:.1}%", part as f64 / total as f64 * 100.0)
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn banner(title: &str) -> String {
    let inner = title.chars().count() + 4;
    let mut output = String::new();
    output.push('\n');
    output.push_str(&format!(" ╭{}╮\n", "─".repeat(inner)));
    output.push_str(&format!(" │  {}  │\n", title));
    output.push_str(&format!(" ╰{}╯\n", "─".repeat(inner)));
    output.push('\n');
    output
}

fn rule(left: &str, mid: &str, right: &str, widths: &[usize]) -> String {
    let cells: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{GRAY}{}{}{}{RESET}\n", left, cells.join(mid), right)
}

fn row(cells: &[String], widths: &[usize], right_align_from: usize) -> String {
    let mut line = format!("{GRAY}│{RESET}");
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let padded = if i >= right_align_from {
            format!(" {:>width$} ", cell, width = *width)
        } else {
            format!(" {:<width$} ", cell, width = *width)
        };
        line.push_str(&padded);
        line.push_str(&format!("{GRAY}│{RESET}"));
    }
    line.push('\n');
    line
}

fn header_row(cells: &[&str], widths: &[usize], right_align_from: usize) -> String {
    let cells: Vec<String> = cells.iter().map(|c| format!("{CYAN}{}{RESET}", c)).collect();
    // Color codes are zero width on screen, so widen the pad by their length
    let color_len = CYAN.len() + RESET.len();
    let widths: Vec<usize> = widths.iter().map(|w| w + color_len).collect();
    row(&cells, &widths, right_align_from)
}

pub fn format_distribution_table(stats: &UsageStatistics, range: &DateRange) -> String {
    let mut output = banner(&format!("LLM Sessions {} .. {}", range.start, range.end));
    let widths = [14, 10, 8];
    let sessions = stats.single_count + stats.multi_count;

    output.push_str(&rule("┌", "┬", "┐", &widths));
    output.push_str(&header_row(&["Sessions", "Count", "Share"], &widths, 1));
    output.push_str(&rule("├", "┼", "┤", &widths));
    output.push_str(&row(
        &[
            "Single model".to_string(),
            stats.single_count.to_string(),
            format_percentage(stats.single_count, sessions),
        ],
        &widths,
        1,
    ));
    output.push_str(&row(
        &[
            "Multi model".to_string(),
            stats.multi_count.to_string(),
            format_percentage(stats.multi_count, sessions),
        ],
        &widths,
        1,
    ));
    output.push_str(&rule("├", "┼", "┤", &widths));
    output.push_str(&row(
        &["Total".to_string(), sessions.to_string(), String::new()],
        &widths,
        1,
    ));
    output.push_str(&rule("└", "┴", "┘", &widths));
    output.push_str(&format!(
        "\n{GREEN}{} events grouped into {} sessions{RESET}\n",
        stats.event_count, stats.session_count
    ));

    output
}

pub fn format_combination_table(combinations: &[CombinationCount]) -> String {
    let mut output = banner("Multi-Model Combinations");

    if combinations.is_empty() {
        output.push_str("   No multi-model sessions in this range\n");
        return output;
    }

    let widths = [4, 48, 8];
    output.push_str(&rule("┌", "┬", "┐", &widths));
    output.push_str(&header_row(&["#", "Combination", "Sessions"], &widths, 2));
    output.push_str(&rule("├", "┼", "┤", &widths));

    for (rank, entry) in combinations.iter().enumerate() {
        output.push_str(&row(
            &[
                (rank + 1).to_string(),
                truncate(entry.combination.as_str(), widths[1]),
                entry.count.to_string(),
            ],
            &widths,
            2,
        ));
    }

    output.push_str(&rule("└", "┴", "┘", &widths));
    output
}

pub fn format_daily_table(daily: &[DailyFamilyCounts]) -> String {
    let mut output = banner("LLM Queries Over Time - Daily");
    let widths = [10, 8, 8, 8, 8];

    output.push_str(&rule("┌", "┬", "┐", &widths));
    output.push_str(&header_row(&["Day", "Claude", "ChatGPT", "Gemini", "Total"], &widths, 1));
    output.push_str(&rule("├", "┼", "┤", &widths));

    let mut totals = [0u64; 4];
    for day in daily {
        output.push_str(&row(
            &[
                day.day.format("%Y-%m-%d").to_string(),
                format_number_compact(day.claude),
                format_number_compact(day.chatgpt),
                format_number_compact(day.gemini),
                format_number_compact(day.total),
            ],
            &widths,
            1,
        ));
        totals[0] += day.claude;
        totals[1] += day.chatgpt;
        totals[2] += day.gemini;
        totals[3] += day.total;
    }

    output.push_str(&rule("├", "┼", "┤", &widths));
    output.push_str(&row(
        &[
            "Total".to_string(),
            format_number_compact(totals[0]),
            format_number_compact(totals[1]),
            format_number_compact(totals[2]),
            format_number_compact(totals[3]),
        ],
        &widths,
        1,
    ));
    output.push_str(&rule("└", "┴", "┘", &widths));
    output
}

pub fn format_breakdown_table(breakdown: &FamilyBreakdown) -> String {
    let mut output = banner("LLM Breakdown");
    let widths = [10, 10, 8];
    let total = breakdown.total();

    output.push_str(&rule("┌", "┬", "┐", &widths));
    output.push_str(&header_row(&["Family", "Queries", "Share"], &widths, 1));
    output.push_str(&rule("├", "┼", "┤", &widths));
    for (label, count) in breakdown.iter() {
        output.push_str(&row(
            &[
                label.to_string(),
                format_number_compact(count),
                format_percentage(count, total),
            ],
            &widths,
            1,
        ));
    }
    output.push_str(&rule("└", "┴", "┘", &widths));
    output
}

pub fn format_session_table(sessions: &[Session<'_>]) -> String {
    let mut output = banner("Inferred Sessions");

    if sessions.is_empty() {
        output.push_str("   No sessions in this range\n");
        return output;
    }

    let widths = [23, 6, 5, 44];
    output.push_str(&rule("┌", "┬", "┐", &widths));
    output.push_str(&header_row(&["Anchor (UTC)", "Calls", "Kind", "Models"], &widths, 4));
    output.push_str(&rule("├", "┼", "┤", &widths));

    for session in sessions {
        let (kind, models) = match SessionKind::classify(session) {
            SessionKind::Single(model) => ("single", model),
            SessionKind::Multi(key) => ("multi", key.to_string()),
        };
        output.push_str(&row(
            &[
                session.anchor_timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                session.event_count().to_string(),
                kind.to_string(),
                truncate(&models, widths[3]),
            ],
            &widths,
            4,
        ));
    }

    output.push_str(&rule("└", "┴", "┘", &widths));
    output
}
