//! Comparative research output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub name: String,
    pub url: String,
    /// Why this site is a useful comparison
    #[serde(default)]
    pub relevance: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

/// One row of the competitive feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrixEntry {
    pub feature: String,
    /// "yes", "no" or "partial"
    #[serde(default)]
    pub current_site: String,
    /// Competitor name to "yes"/"no"/"partial"
    #[serde(default)]
    pub competitors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UxPattern {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub seen_in: Vec<String>,
    #[serde(default)]
    pub relevance: String,
}

/// Something the current site is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapItem {
    pub description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub user_value: String,
    /// How many competitors have it
    #[serde(default)]
    pub competitor_prevalence: u32,
    #[serde(default)]
    pub competitors_with_feature: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSystemReference {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparativeResearchOutput {
    pub competitors: Vec<CompetitorProfile>,
    #[serde(default)]
    pub feature_matrix: Vec<FeatureMatrixEntry>,
    #[serde(default)]
    pub ux_patterns: Vec<UxPattern>,
    #[serde(default)]
    pub gaps: Vec<GapItem>,
    #[serde(default)]
    pub trends: Vec<String>,
    #[serde(default)]
    pub design_systems: Vec<DesignSystemReference>,
    #[serde(default)]
    pub summary: String,
}

impl ComparativeResearchOutput {
    /// Competitor URLs in report order, skipping blanks.
    pub fn competitor_urls(&self) -> impl Iterator<Item = &str> {
        self.competitors
            .iter()
            .map(|c| c.url.trim())
            .filter(|url| !url.is_empty())
    }
}
