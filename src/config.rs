//! Project review configuration with a mandatory-category floor.
//!
//! The config record is an optional project-local JSON file. Absence or a
//! parse failure is never fatal: the loader logs a warning and falls back
//! to the built-in defaults. Mandatory categories are force-included even
//! when the project omits or disables them, and each forced inclusion is
//! recorded so the rendered summary can say why the category ran.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ConfigError;

/// Controlled vocabulary of finding/rule categories.
///
/// Unknown strings from the model are repaired to `Unknown` at the parse
/// boundary instead of failing the whole response.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Category {
    Secrets,
    Authorization,
    Security,
    ErrorLeakage,
    Requirement,
    Scope,
    Bug,
    Performance,
    Quality,
    Unknown,
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "secrets" => Category::Secrets,
            "authorization" => Category::Authorization,
            "security" => Category::Security,
            "error_leakage" => Category::ErrorLeakage,
            "requirement" => Category::Requirement,
            "scope" => Category::Scope,
            "bug" => Category::Bug,
            "performance" => Category::Performance,
            "quality" => Category::Quality,
            _ => Category::Unknown,
        }
    }
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Secrets => "secrets",
            Category::Authorization => "authorization",
            Category::Security => "security",
            Category::ErrorLeakage => "error_leakage",
            Category::Requirement => "requirement",
            Category::Scope => "scope",
            Category::Bug => "bug",
            Category::Performance => "performance",
            Category::Quality => "quality",
            Category::Unknown => "unknown",
        }
    }
}

/// Categories that run regardless of project configuration.
pub const MANDATORY_CATEGORIES: [Category; 4] = [
    Category::Secrets,
    Category::Authorization,
    Category::Security,
    Category::ErrorLeakage,
];

/// How aggressively the reviewer persona is asked to flag issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Lenient,
    #[default]
    Standard,
    Strict,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// Character budgets and large-PR thresholds used by the prompt builder.
#[derive(Debug, Clone)]
pub struct PromptLimits {
    /// Hard cap on file content embedded in one prompt (chars).
    pub file_content_budget: usize,
    /// Hard cap on the aggregated requirements passage (chars).
    pub requirements_budget: usize,
    /// File count above which the size warning is appended.
    pub large_pr_files: usize,
    /// Total changed-line count above which the size warning is appended.
    pub large_pr_lines: u32,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            file_content_budget: 8_000,
            requirements_budget: 10_000,
            large_pr_files: 20,
            large_pr_lines: 1_000,
        }
    }
}

/// On-disk shape of the project config record; every field optional.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    enabled_categories: Option<Vec<Category>>,
    strictness: Option<Strictness>,
    security_level: Option<SecurityLevel>,
    custom_rules: Option<Vec<String>>,
    model_timeout_secs: Option<u64>,
}

/// Resolved per-run review configuration.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub enabled_categories: BTreeSet<Category>,
    pub strictness: Strictness,
    pub security_level: SecurityLevel,
    pub custom_rules: Vec<String>,
    /// Mandatory categories that were absent from the project record and
    /// had to be force-included. Surfaced in the rendered summary.
    pub forced_categories: Vec<Category>,
    pub limits: PromptLimits,
    /// Bound on a single model call (seconds).
    pub model_timeout_secs: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

impl ReviewConfig {
    /// Loads the project config record, falling back to defaults on any
    /// failure. Never returns an error; the failure reason is logged.
    pub fn load(path: &Path) -> ReviewConfig {
        match Self::try_load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("config: falling back to defaults ({e})");
                ReviewConfig::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<ReviewConfig, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let raw: RawConfig = serde_json::from_str(&data)?;
        debug!("config: loaded project record from {}", path.display());
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawConfig) -> ReviewConfig {
        let user_provided = raw.enabled_categories.is_some();
        let mut enabled: BTreeSet<Category> = raw
            .enabled_categories
            .unwrap_or_else(default_categories)
            .into_iter()
            .filter(|c| *c != Category::Unknown)
            .collect();

        // Mandatory floor: force-include, and make the forcing observable.
        let mut forced = Vec::new();
        for cat in MANDATORY_CATEGORIES {
            if enabled.insert(cat) && user_provided {
                warn!(
                    "config: mandatory category '{}' missing from project record, force-included",
                    cat.as_str()
                );
                forced.push(cat);
            }
        }

        ReviewConfig {
            enabled_categories: enabled,
            strictness: raw.strictness.unwrap_or_default(),
            security_level: raw.security_level.unwrap_or_default(),
            custom_rules: raw.custom_rules.unwrap_or_default(),
            forced_categories: forced,
            limits: PromptLimits::default(),
            model_timeout_secs: raw.model_timeout_secs.unwrap_or(90),
        }
    }
}

fn default_categories() -> Vec<Category> {
    vec![
        Category::Secrets,
        Category::Authorization,
        Category::Security,
        Category::ErrorLeakage,
        Category::Requirement,
        Category::Scope,
        Category::Bug,
        Category::Performance,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_mandatory_floor() {
        let cfg = ReviewConfig::default();
        for cat in MANDATORY_CATEGORIES {
            assert!(cfg.enabled_categories.contains(&cat));
        }
        // Defaults already include the floor, nothing was forced.
        assert!(cfg.forced_categories.is_empty());
        assert_eq!(cfg.model_timeout_secs, 90);
    }

    #[test]
    fn malformed_record_falls_back_to_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{ not json").unwrap();
        let cfg = ReviewConfig::load(f.path());
        assert_eq!(cfg.strictness, Strictness::Standard);
        assert!(cfg.enabled_categories.contains(&Category::Security));
    }

    #[test]
    fn missing_record_falls_back_to_defaults() {
        let cfg = ReviewConfig::load(Path::new("/nonexistent/.review-bot.json"));
        assert!(cfg.enabled_categories.contains(&Category::Secrets));
    }

    #[test]
    fn mandatory_categories_forced_and_recorded() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"enabled_categories": ["performance", "bug", "bug"], "strictness": "strict"}}"#
        )
        .unwrap();
        let cfg = ReviewConfig::load(f.path());
        assert_eq!(cfg.strictness, Strictness::Strict);
        for cat in MANDATORY_CATEGORIES {
            assert!(cfg.enabled_categories.contains(&cat));
            assert!(cfg.forced_categories.contains(&cat));
        }
        // Duplicate "bug" entries collapse in the set.
        assert_eq!(
            cfg.enabled_categories
                .iter()
                .filter(|c| **c == Category::Bug)
                .count(),
            1
        );
    }

    #[test]
    fn unknown_category_strings_are_dropped_not_fatal() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"enabled_categories": ["bug", "made_up_category"]}}"#
        )
        .unwrap();
        let cfg = ReviewConfig::load(f.path());
        assert!(cfg.enabled_categories.contains(&Category::Bug));
        assert!(!cfg.enabled_categories.contains(&Category::Unknown));
    }
}
