//! Configuration for an analysis run
//!
//! The analysis itself is described by a TOML file (`analysis-config.toml`).
//! Upstream endpoint settings come from the environment so keys never land
//! in a config file that might be committed.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LlmError;

/// Technology and process constraints for the analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub must_keep: Vec<String>,
    pub must_avoid: Vec<String>,
    pub budget: String,
}

/// Top-level analysis configuration.
///
/// At least one of `target_path` or `target_url` must be set, and at least
/// one priority is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub target_path: String,
    #[serde(default)]
    pub target_url: String,

    pub priorities: Vec<String>,

    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub site_description: String,

    #[serde(default)]
    pub competitor_urls: Vec<String>,
    #[serde(default)]
    pub known_issues: Vec<String>,
    #[serde(default)]
    pub user_feedback: String,
    #[serde(default)]
    pub design_assets: Vec<String>,

    /// Features to evaluate with the tech stack advisor, in addition to the
    /// titles surfaced by the first ranking pass.
    #[serde(default)]
    pub features: Vec<String>,

    /// 0 = homepage only, 1 = top-level pages, 2 = two clicks deep
    #[serde(default = "default_site_depth")]
    pub site_depth: u32,

    #[serde(default = "default_output_directory")]
    pub output_directory: String,

    #[serde(default)]
    pub constraints: Constraints,
}

fn default_site_depth() -> u32 {
    1
}

fn default_output_directory() -> String {
    "./output".to_string()
}

impl AnalysisConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: AnalysisConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target_path.is_empty() && self.target_url.is_empty() {
            bail!("At least one of 'target_path' or 'target_url' must be provided");
        }
        if self.priorities.is_empty() {
            bail!("At least one priority is required");
        }
        if !self.target_path.is_empty() && !Path::new(&self.target_path).exists() {
            bail!("target_path does not exist: {}", self.target_path);
        }
        Ok(())
    }

    pub fn has_url(&self) -> bool {
        !self.target_url.is_empty()
    }

    pub fn has_path(&self) -> bool {
        !self.target_path.is_empty()
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_directory)
    }

    /// Human-readable name for log lines
    pub fn display_name(&self) -> &str {
        if !self.site_name.is_empty() {
            &self.site_name
        } else if !self.target_path.is_empty() {
            &self.target_path
        } else {
            &self.target_url
        }
    }
}

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 16_384;

/// Upstream completion endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
}

impl LlmSettings {
    /// Read settings from the environment.
    ///
    /// `SEA_API_KEY` takes precedence over `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LlmError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("SEA_API_KEY")
            .or_else(|| non_empty("OPENAI_API_KEY"))
            .ok_or_else(|| {
                LlmError::Configuration(
                    "No API key configured. Set SEA_API_KEY or OPENAI_API_KEY, or use --dry-run."
                        .to_string(),
                )
            })?;

        let max_tokens = match non_empty("SEA_MAX_TOKENS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                LlmError::Configuration(format!("SEA_MAX_TOKENS is not a number: {}", raw))
            })?,
            None => DEFAULT_MAX_TOKENS,
        };

        Ok(Self {
            api_key,
            api_base: non_empty("SEA_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: non_empty("SEA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens,
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}
