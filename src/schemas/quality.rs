//! Quality audit data (accessibility and performance).

use serde::{Deserialize, Serialize};

use super::string_or_number;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityIssue {
    pub description: String,
    #[serde(default)]
    pub severity: String,
    /// e.g. "1.1.1"
    #[serde(default)]
    pub wcag_criterion: String,
    #[serde(default)]
    pub element: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// e.g. "LCP", "CLS"
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityReport {
    pub wcag_level: String,
    pub issues: Vec<AccessibilityIssue>,
    pub keyboard_navigation: String,
    pub screen_reader_notes: String,
    pub aria_usage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceReport {
    pub metrics: Vec<PerformanceMetric>,
    pub bundle_analysis: String,
    pub image_optimization: String,
    pub caching_strategy: String,
    pub critical_rendering_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub description: String,
    /// "accessibility" or "performance"
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub effort_to_fix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityAuditOutput {
    pub accessibility: AccessibilityReport,
    pub performance: PerformanceReport,
    pub priority_issues: Vec<QualityIssue>,
    pub summary: String,
}
