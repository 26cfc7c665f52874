//! Pipeline state and the final report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::code_analysis::CodeAnalysisOutput;
use super::feasibility::FeasibilityOutput;
use super::quality::QualityAuditOutput;
use super::recommendations::{Pass1Output, Pass2Output};
use super::research::ComparativeResearchOutput;
use super::tech_stack::TechStackAdvisorOutput;
use super::ux_design::UxDesignOutput;
use crate::config::AnalysisConfig;
use crate::progress::TokenUsage;

/// Viewport-height JPEG tiles for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotEntry {
    pub url: String,
    /// Base64 JPEG tiles, top to bottom
    pub tiles: Vec<String>,
    /// Single full-page base64 JPEG, if one was captured
    #[serde(default)]
    pub full_page: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPhase {
    pub phase: String,
    pub error: String,
}

/// Everything the orchestrator has produced so far.
///
/// Each phase fills at most one field. Phases that run concurrently
/// produce their values separately and are merged afterwards.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub config: AnalysisConfig,
    pub research: Option<ComparativeResearchOutput>,
    pub code_analysis: Option<CodeAnalysisOutput>,
    pub pass1: Option<Pass1Output>,
    pub feasibility: Option<FeasibilityOutput>,
    pub quality_audit: Option<QualityAuditOutput>,
    pub pass2: Option<Pass2Output>,
    pub tech_stack_advisor: Option<TechStackAdvisorOutput>,
    pub ux_design: Option<UxDesignOutput>,
    pub screenshots: Vec<ScreenshotEntry>,
    pub executive_summary: String,
    pub failed_phases: Vec<FailedPhase>,
}

impl PipelineState {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            research: None,
            code_analysis: None,
            pass1: None,
            feasibility: None,
            quality_audit: None,
            pass2: None,
            tech_stack_advisor: None,
            ux_design: None,
            screenshots: Vec::new(),
            executive_summary: String::new(),
            failed_phases: Vec::new(),
        }
    }

    pub fn mark_failed(&mut self, phase: &str, error: impl ToString) {
        self.failed_phases.push(FailedPhase {
            phase: phase.to_string(),
            error: error.to_string(),
        });
    }

    /// Final ranking: pass 2 when it ran, pass 1 otherwise.
    pub fn final_recommendations(&self) -> Option<Pass2Output> {
        self.pass2
            .clone()
            .or_else(|| self.pass1.clone().map(Pass2Output::from))
    }
}

/// Snapshot written at the end of a run. Enough to re-render every view
/// without calling any agent again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub generated_at: String,
    pub config: AnalysisConfig,
    #[serde(default)]
    pub research: Option<ComparativeResearchOutput>,
    #[serde(default)]
    pub code_analysis: Option<CodeAnalysisOutput>,
    #[serde(default)]
    pub recommendations: Option<Pass2Output>,
    #[serde(default)]
    pub feasibility: Option<FeasibilityOutput>,
    #[serde(default)]
    pub quality_audit: Option<QualityAuditOutput>,
    #[serde(default)]
    pub tech_stack_advisor: Option<TechStackAdvisorOutput>,
    #[serde(default)]
    pub ux_design: Option<UxDesignOutput>,
    #[serde(default)]
    pub executive_summary: String,
    /// Written to separate image files instead
    #[serde(skip)]
    pub screenshots: Vec<ScreenshotEntry>,
    #[serde(default)]
    pub failed_phases: Vec<FailedPhase>,
    #[serde(default)]
    pub token_usage: BTreeMap<String, TokenUsage>,
}

impl FinalReport {
    pub fn from_state(state: PipelineState, token_usage: BTreeMap<String, TokenUsage>) -> Self {
        let recommendations = state.final_recommendations();
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            config: state.config,
            research: state.research,
            code_analysis: state.code_analysis,
            recommendations,
            feasibility: state.feasibility,
            quality_audit: state.quality_audit,
            tech_stack_advisor: state.tech_stack_advisor,
            ux_design: state.ux_design,
            executive_summary: state.executive_summary,
            screenshots: state.screenshots,
            failed_phases: state.failed_phases,
            token_usage,
        }
    }
}
