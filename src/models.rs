//! # Model Family Module
//!
//! Maps free-text model identifiers to coarse provider families
//!
//! ## Key Components
//! - [`FamilyLabel`] - Closed set of family labels
//! - [`FamilyRule`] - A single `pattern -> label` rule
//! - [`FamilyClassifier`] - Ordered rule list, evaluated by priority
//! - [`default_classifier`] - Shared classifier built from the default rules

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FamilyLabel {
    Claude,
    ChatGPT,
    Gemini,
    Other,
}

impl FamilyLabel {
    pub const ALL: [FamilyLabel; 4] = [
        FamilyLabel::Claude,
        FamilyLabel::ChatGPT,
        FamilyLabel::Gemini,
        FamilyLabel::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FamilyLabel::Claude => "Claude",
            FamilyLabel::ChatGPT => "ChatGPT",
            FamilyLabel::Gemini => "Gemini",
            FamilyLabel::Other => "Other",
        }
    }
}

impl fmt::Display for FamilyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FamilyRule {
    pub pattern: String,
    pub label: FamilyLabel,
}

impl FamilyRule {
    pub fn new(pattern: &str, label: FamilyLabel) -> Self {
        Self {
            pattern: pattern.to_string(),
            label,
        }
    }
}

/// Built-in rules, in priority order
pub const DEFAULT_RULES: &[(&str, FamilyLabel)] = &[
    ("claude", FamilyLabel::Claude),
    ("gpt", FamilyLabel::ChatGPT),
    ("gemini", FamilyLabel::Gemini),
];

#[derive(Debug, Clone)]
pub struct FamilyClassifier {
    // Patterns are lowercased once here so classify() only lowercases the input
    rules: Vec<FamilyRule>,
}

impl FamilyClassifier {
    pub fn new(rules: Vec<FamilyRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| FamilyRule {
                pattern: rule.pattern.to_lowercase(),
                label: rule.label,
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[FamilyRule] {
        &self.rules
    }

    /// First rule whose pattern is contained in the id wins; `Other` otherwise.
    pub fn classify(&self, model_id: &str) -> FamilyLabel {
        let model_id = model_id.to_lowercase();
        self.rules
            .iter()
            .find(|rule| model_id.contains(rule.pattern.as_str()))
            .map(|rule| rule.label)
            .unwrap_or(FamilyLabel::Other)
    }
}

impl Default for FamilyClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_RULES
                .iter()
                .map(|(pattern, label)| FamilyRule::new(pattern, *label))
                .collect(),
        )
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_CLASSIFIER: FamilyClassifier = FamilyClassifier::default();
}

pub fn default_classifier() -> &'static FamilyClassifier {
    &DEFAULT_CLASSIFIER
}
