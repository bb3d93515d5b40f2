//! # Commands Module
//!
//! Command handlers for report, distribution, combinations, daily, breakdown and sessions
//!
//! ## Key Components
//! - [`ReportContext`] - Loaded events plus the configured grouper and classifier
//! - [`run_command`] - Dispatch a subcommand and print its output
//! - [`render_command`] - Build the text or JSON output of a subcommand

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info};

use crate::analytics::{SessionKind, UsageStatistics, aggregate_sessions};
use crate::cli::{Args, Commands};
use crate::config::load_classifier;
use crate::data_processing::{DateRange, FamilyBreakdown, aggregate_daily_families};
use crate::event_source::{EventQuery, load_events};
use crate::models::FamilyClassifier;
use crate::session::{Event, Session, SessionGrouper};
use crate::table_display::{
    JsonDistribution, JsonReport, JsonSession, format_breakdown_table, format_combination_table,
    format_daily_table, format_distribution_table, format_session_table,
};

pub struct ReportContext {
    pub events: Vec<Event>,
    pub range: DateRange,
    pub classifier: FamilyClassifier,
    pub grouper: SessionGrouper,
}

impl ReportContext {
    pub fn sessions(&self) -> Result<Vec<Session<'_>>> {
        let sessions = self
            .grouper
            .group_checked(&self.events)
            .context("Failed to group events into sessions")?;
        debug!(
            "Grouped {} events into {} sessions ({}ms window)",
            self.events.len(),
            sessions.len(),
            self.grouper.window().num_milliseconds()
        );
        Ok(sessions)
    }

    pub fn statistics(&self) -> Result<UsageStatistics> {
        Ok(aggregate_sessions(&self.sessions()?))
    }
}

fn validate_window(window_ms: i64) -> Result<Duration> {
    if window_ms < 0 {
        anyhow::bail!("Invalid session window '{}'. Must be 0 or more milliseconds", window_ms);
    }
    Ok(Duration::milliseconds(window_ms))
}

/// Resolve configuration and load the events the command will work on
pub fn prepare_context(args: &Args, today: NaiveDate) -> Result<ReportContext> {
    let window = validate_window(args.window_ms)?;
    let range = DateRange::resolve(args.start.as_deref(), args.end.as_deref(), today)
        .context("Failed to resolve date range")?;
    let classifier =
        load_classifier(args.rules.as_deref()).context("Failed to load model family rules")?;

    let query = EventQuery {
        user: args.user.clone(),
        range,
    };
    let (events, stats) = load_events(&args.inputs, &query).context("Failed to load spend logs")?;

    info!(
        "Loaded {} calls between {} and {} ({} rows read, {} skipped)",
        events.len(),
        range.start,
        range.end,
        stats.rows,
        stats.skipped()
    );

    Ok(ReportContext {
        events,
        range,
        classifier,
        grouper: SessionGrouper::with_window(window),
    })
}

pub fn render_command(command: &Commands, context: &ReportContext, json: bool) -> Result<String> {
    match command {
        Commands::Report => render_report(context, json),
        Commands::Distribution => {
            let stats = context.statistics()?;
            if json {
                to_json(&JsonDistribution::from(&stats))
            } else {
                Ok(format_distribution_table(&stats, &context.range))
            }
        }
        Commands::Combinations { top } => {
            let stats = context.statistics()?;
            let limit = top.unwrap_or(stats.combination_frequencies.len());
            let combinations = &stats.combination_frequencies[..limit.min(stats.combination_frequencies.len())];
            if json {
                to_json(&combinations)
            } else {
                Ok(format_combination_table(combinations))
            }
        }
        Commands::Daily => {
            let daily = aggregate_daily_families(&context.events, &context.range, &context.classifier);
            if json {
                to_json(&daily)
            } else {
                Ok(format_daily_table(&daily))
            }
        }
        Commands::Breakdown => {
            let breakdown = FamilyBreakdown::from_events(&context.events, &context.classifier);
            if json {
                to_json(&breakdown)
            } else {
                Ok(format_breakdown_table(&breakdown))
            }
        }
        Commands::Sessions { multi_only } => {
            let sessions: Vec<Session<'_>> = context
                .sessions()?
                .into_iter()
                .filter(|session| !*multi_only || SessionKind::classify(session).is_multi())
                .collect();
            if json {
                let listing: Vec<JsonSession> = sessions.iter().map(JsonSession::from_session).collect();
                to_json(&listing)
            } else {
                Ok(format_session_table(&sessions))
            }
        }
    }
}

fn render_report(context: &ReportContext, json: bool) -> Result<String> {
    let stats = context.statistics()?;
    let daily = aggregate_daily_families(&context.events, &context.range, &context.classifier);
    let breakdown = FamilyBreakdown::from_events(&context.events, &context.classifier);

    if json {
        return to_json(&JsonReport {
            range: context.range,
            single_multi_summary: JsonDistribution::from(&stats),
            combination_breakdown: &stats.combination_frequencies,
            daily_family_breakdown: &daily,
            family_breakdown: &breakdown,
        });
    }

    let mut output = String::new();
    output.push_str(&format_distribution_table(&stats, &context.range));
    output.push_str(&format_combination_table(&stats.combination_frequencies));
    output.push_str(&format_daily_table(&daily));
    output.push_str(&format_breakdown_table(&breakdown));
    Ok(output)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to generate JSON output")
}

pub fn run_command(args: &Args) -> Result<()> {
    let context = prepare_context(args, Utc::now().date_naive())?;
    let command = args.command.clone().unwrap_or(Commands::Report);

    if context.events.is_empty() && !args.json {
        println!(
            "No LLM calls found between {} and {}.",
            context.range.start, context.range.end
        );
    }

    let output = render_command(&command, &context, args.json)?;
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context_for(events: Vec<Event>) -> ReportContext {
        ReportContext {
            events,
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 7).unwrap(),
            )
            .unwrap(),
            classifier: FamilyClassifier::default(),
            grouper: SessionGrouper::new(),
        }
    }

    fn scenario_events() -> Vec<Event> {
        let t0 = Utc.with_ymd_and_hms(2025, 5, 3, 9, 0, 0).unwrap();
        vec![
            Event::new(t0, "gpt-4"),
            Event::new(t0 + Duration::milliseconds(200), "claude-3-haiku"),
            Event::new(t0 + Duration::seconds(5), "gpt-4"),
            Event::new(t0 + Duration::seconds(60), "gemini-pro"),
            Event::new(t0 + Duration::milliseconds(60_500), "gpt-4"),
        ]
    }

    fn render_json(command: Commands, context: &ReportContext) -> serde_json::Value {
        let output = render_command(&command, context, true).unwrap();
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn test_window_validation() {
        assert!(validate_window(-1).is_err());
        assert_eq!(validate_window(1_000).unwrap(), Duration::seconds(1));
    }

    #[test]
    fn test_distribution_json() {
        let context = context_for(scenario_events());
        assert_eq!(
            render_json(Commands::Distribution, &context),
            serde_json::json!({"single_llm": 1, "multi_llm": 2})
        );
    }

    #[test]
    fn test_combinations_top_limit() {
        let context = context_for(scenario_events());

        assert_eq!(
            render_json(Commands::Combinations { top: None }, &context),
            serde_json::json!([
                {"combination": "claude-3-haiku+gpt-4", "count": 1},
                {"combination": "gemini-pro+gpt-4", "count": 1}
            ])
        );
        assert_eq!(
            render_json(Commands::Combinations { top: Some(1) }, &context),
            serde_json::json!([{"combination": "claude-3-haiku+gpt-4", "count": 1}])
        );
        assert_eq!(
            render_json(Commands::Combinations { top: Some(10) }, &context)
                .as_array()
                .map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn test_report_json_shape() {
        let context = context_for(scenario_events());
        let report = render_json(Commands::Report, &context);

        assert_eq!(report["single_multi_summary"]["multi_llm"], 2);
        assert_eq!(report["daily_family_breakdown"].as_array().map(Vec::len), Some(7));
        assert_eq!(report["daily_family_breakdown"][2]["day"], "2025-05-03");
        assert_eq!(report["daily_family_breakdown"][2]["ChatGPT"], 3);
        assert_eq!(report["daily_family_breakdown"][2]["Total"], 5);
        assert_eq!(report["family_breakdown"]["Other"], 0);
        assert_eq!(report["range"]["start"], "2025-05-01");
    }

    #[test]
    fn test_empty_context_reports_zeroes() {
        let context = context_for(Vec::new());
        let report = render_json(Commands::Report, &context);

        assert_eq!(report["single_multi_summary"], serde_json::json!({"single_llm": 0, "multi_llm": 0}));
        assert_eq!(report["combination_breakdown"], serde_json::json!([]));
        assert_eq!(report["daily_family_breakdown"].as_array().map(Vec::len), Some(7));
    }

    #[test]
    fn test_sessions_multi_only() {
        let context = context_for(scenario_events());
        let listing = render_json(Commands::Sessions { multi_only: true }, &context);

        let listing = listing.as_array().unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|s| s["multi_model"] == true));
    }

    #[test]
    fn test_text_report_contains_sections() {
        let context = context_for(scenario_events());
        let output = render_command(&Commands::Report, &context, false).unwrap();

        assert!(output.contains("Multi-Model Combinations"));
        assert!(output.contains("LLM Queries Over Time"));
        assert!(output.contains("LLM Breakdown"));
    }

    #[test]
    fn test_unsorted_context_is_rejected() {
        let mut events = scenario_events();
        events.reverse();
        let context = context_for(events);

        assert!(render_command(&Commands::Distribution, &context, true).is_err());
    }
}
