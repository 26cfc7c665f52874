//! Code analysis output.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStackItem {
    pub name: String,
    /// e.g. "framework", "styling", "state-management"
    pub category: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub ux_pros: Vec<String>,
    #[serde(default)]
    pub ux_cons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub name: String,
    pub file_path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub has_tests: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechDebtItem {
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureOverview {
    pub routing_pattern: String,
    pub data_flow: String,
    pub component_tree_summary: String,
    pub mermaid_diagram: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensibilityReport {
    pub overall_score: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSystemAnalysis {
    pub has_design_system: bool,
    pub semantic_tokens: Vec<String>,
    pub theming_support: String,
    pub animation_patterns: Vec<String>,
    pub component_library: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeAnalysisOutput {
    pub tech_stack: Vec<TechStackItem>,
    pub architecture: ArchitectureOverview,
    #[serde(default)]
    pub components: Vec<ComponentInfo>,
    #[serde(default)]
    pub tech_debt: Vec<TechDebtItem>,
    #[serde(default)]
    pub extensibility: ExtensibilityReport,
    #[serde(default)]
    pub design_system: DesignSystemAnalysis,
    #[serde(default)]
    pub bundle_notes: String,
    #[serde(default)]
    pub summary: String,
}
