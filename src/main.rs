//! # LLM Usage Sessions
//!
//! Infers multi-model interaction sessions from per-call LLM spend logs
//!
//! ## Key Components
//! - [`session::SessionGrouper`] - Fixed-anchor time window grouping
//! - [`analytics::UsageAggregator`] - Single/multi counts and combination ranking
//! - [`data_processing::aggregate_daily_families`] - Per-day family counts
//! - [`commands::run_command`] - CLI entry point for every report

mod analytics;
mod cli;
mod commands;
mod config;
mod data_processing;
mod event_source;
mod models;
mod session;
mod table_display;

use anyhow::Result;
use clap::Parser;
use log::debug;

use crate::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG still wins over the default filter
    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    debug!("Parsed arguments: {:?}", args);

    commands::run_command(&args)
}
