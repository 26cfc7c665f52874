//! Per-feature tech stack recommendations with architecture diagrams.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::util::cached_regex;

static GRAPH_HEADER_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Rewrite model-written Mermaid into multi-line `flowchart` form.
///
/// `graph TD` style headers become `flowchart TD`. A single-line diagram
/// is split on top-level semicolons; semicolons inside `[..]` or `(..)`
/// labels are kept.
pub fn normalize_mermaid(source: &str) -> String {
    let trimmed = source.trim();
    let s = match cached_regex(&GRAPH_HEADER_RE, r"(?i)^graph\s+(TD|LR|BT|RL)") {
        Some(re) => re.replace(trimmed, "flowchart $1").into_owned(),
        None => trimmed.to_string(),
    };
    if s.contains('\n') {
        return s;
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            ';' if depth == 0 => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    lines.push(stmt.to_string());
                }
                current.clear();
                while chars.peek() == Some(&' ') {
                    chars.next();
                }
            }
            _ => current.push(ch),
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        lines.push(tail.to_string());
    }
    lines.join("\n    ")
}

fn mermaid_source<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_mermaid(&raw))
}

/// Architecture diagram for one implementation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDiagram {
    pub title: String,
    /// "current", "simple" or "comprehensive"
    pub phase: String,
    #[serde(deserialize_with = "mermaid_source")]
    pub mermaid: String,
    /// Plain-English description for non-technical readers
    pub summary: String,
    #[serde(default)]
    pub components_to_keep: Vec<String>,
    #[serde(default)]
    pub components_with_issues: Vec<String>,
    #[serde(default)]
    pub components_to_modify: Vec<String>,
    #[serde(default)]
    pub new_components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechApproach {
    /// "simple" or "comprehensive"
    pub approach_name: String,
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub new_dependencies: Vec<String>,
    /// "fits_as_is", "minor_changes", "major_changes" or "requires_migration"
    #[serde(default)]
    pub architecture_fit: String,
    #[serde(default)]
    pub architecture_changes: Vec<String>,
    #[serde(default)]
    pub effort_estimate: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStackRecommendation {
    pub feature_name: String,
    /// Competitors already shipping this feature
    #[serde(default)]
    pub parity_source: Vec<String>,
    pub simple_approach: TechApproach,
    #[serde(default)]
    pub comprehensive_approach: Option<TechApproach>,
    #[serde(default)]
    pub recommended_approach: String,
    #[serde(default)]
    pub recommendation_rationale: String,
    #[serde(default)]
    pub current_stack_compatibility: String,
    #[serde(default)]
    pub diagrams: Vec<ArchitectureDiagram>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechStackAdvisorOutput {
    pub features: Vec<TechStackRecommendation>,
    #[serde(default)]
    pub summary: String,
}
