//! # CLI Module
//!
//! Command-line interface definitions and argument parsing for llm-usage-sessions
//!
//! ## Key Components
//! - [`Args`] - Global options (inputs, filters, rules, output)
//! - [`Commands`] - Report subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::session::SESSION_WINDOW_MS;

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Show every report at once (default)
    Report,
    /// Count single-model vs multi-model sessions
    Distribution,
    /// Rank the model combinations used within multi-model sessions
    Combinations {
        /// Show only the N most frequent combinations
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show queries per day and model family, one row per day
    Daily,
    /// Show query totals per model family
    Breakdown,
    /// List every inferred session
    Sessions {
        /// Show only multi-model sessions
        #[arg(long)]
        multi_only: bool,
    },
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LLM Usage Sessions - infer multi-model interactions from per-call spend logs"
)]
pub struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Spend log exports (.json arrays or JSON Lines); "-" or nothing reads stdin
    #[arg(short, long = "input", global = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Only count calls made by this end user
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// First day of the range (YYYY-MM-DD); needs --end, defaults to the last 7 days
    #[arg(long, global = true)]
    pub start: Option<String>,

    /// Last day of the range, inclusive (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub end: Option<String>,

    /// Model family rules file (can also use LLM_USAGE_RULES env var)
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    /// Session window in milliseconds, measured from the first call of a session
    #[arg(long, global = true, default_value_t = SESSION_WINDOW_MS)]
    pub window_ms: i64,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
