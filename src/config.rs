//! # Configuration Module
//!
//! Locates and loads the model family rules file
//!
//! ## Key Components
//! - [`RulesFile`] - On-disk JSON shape of the rules
//! - [`resolve_rules_path`] - Flag, environment, then config directory lookup
//! - [`load_classifier`] - Build a [`FamilyClassifier`] from the resolved rules

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{FamilyClassifier, FamilyRule, default_classifier};

pub const RULES_ENV_VAR: &str = "LLM_USAGE_RULES";
pub const APP_DIR_NAME: &str = "llm-usage-sessions";
pub const RULES_FILE_NAME: &str = "families.json";

#[derive(Debug, Clone, Deserialize)]
pub struct RulesFile {
    pub rules: Vec<FamilyRule>,
}

impl RulesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {}", path.display()))?;
        let rules_file: RulesFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rules file {}", path.display()))?;

        if let Some(index) = rules_file.rules.iter().position(|rule| rule.pattern.trim().is_empty()) {
            anyhow::bail!(
                "Rule {} in {} has an empty pattern, which would match every model",
                index + 1,
                path.display()
            );
        }

        Ok(rules_file)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RulesSource {
    /// Must exist: passed with --rules or the environment variable
    Explicit(PathBuf),
    /// Used only when the file is present
    ConfigDir(PathBuf),
    Builtin,
}

pub fn default_rules_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(RULES_FILE_NAME))
}

pub fn resolve_rules_path(
    flag: Option<&Path>,
    env_value: Option<&str>,
    config_path: Option<PathBuf>,
) -> RulesSource {
    if let Some(path) = flag {
        return RulesSource::Explicit(path.to_path_buf());
    }

    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return RulesSource::Explicit(PathBuf::from(value));
    }

    match config_path {
        Some(path) if path.exists() => RulesSource::ConfigDir(path),
        _ => RulesSource::Builtin,
    }
}

pub fn load_classifier(flag: Option<&Path>) -> Result<FamilyClassifier> {
    let env_value = std::env::var(RULES_ENV_VAR).ok();
    let source = resolve_rules_path(flag, env_value.as_deref(), default_rules_path());
    classifier_from_source(&source)
}

pub fn classifier_from_source(source: &RulesSource) -> Result<FamilyClassifier> {
    match source {
        RulesSource::Explicit(path) | RulesSource::ConfigDir(path) => {
            if !path.exists() {
                anyhow::bail!("Rules file not found: {}", path.display());
            }
            let classifier = FamilyClassifier::new(RulesFile::load(path)?.rules);
            debug!("Loaded {} family rules from {}", classifier.rules().len(), path.display());
            Ok(classifier)
        }
        RulesSource::Builtin => {
            debug!("Using built-in family rules");
            Ok(default_classifier().clone())
        }
    }
}
