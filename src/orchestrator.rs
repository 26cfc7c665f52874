//! Runs the analysis phases in a fixed order and assembles the report.
//!
//! A failed phase is logged and recorded in `failed_phases`; later phases
//! run on whatever earlier ones produced.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::Engine;
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::agents::code_analysis::run_code_analysis;
use crate::agents::feasibility::run_feasibility;
use crate::agents::ranking::{run_pass1, run_pass2};
use crate::agents::research::run_research;
use crate::agents::synthesis::run_synthesis;
use crate::agents::tech_stack::{feature_requests, features_to_evaluate, run_tech_stack};
use crate::agents::ux_design::{run_ux_audit, PriorAnalysis};
use crate::agents::{AgentContext, AgentKind};
use crate::browser::{check_url_reachable, with_browser, BrowserFactory};
use crate::codebase::CodebaseReader;
use crate::config::AnalysisConfig;
use crate::llm::agentic::LoopLimits;
use crate::llm::client::LlmClient;
use crate::progress::{ProgressSink, UserPrompt};
use crate::schemas::feasibility::FeasibilityOutput;
use crate::schemas::pipeline::{FinalReport, PipelineState, ScreenshotEntry};
use crate::schemas::recommendations::{ids_by_title, Recommendation};
use crate::schemas::research::ComparativeResearchOutput;
use crate::schemas::tech_stack::TechStackAdvisorOutput;
use crate::util::slugify;

/// Most URLs captured in the screenshot phase.
pub const MAX_SCREENSHOT_URLS: usize = 6;

pub const SCREENSHOT_PHASE: &str = "Screenshots";

pub const REPORT_FILE: &str = "report.json";
pub const SUMMARY_FILE: &str = "executive-summary.txt";
pub const SCREENSHOT_DIR: &str = "screenshots";
pub const SCREENSHOT_INDEX_FILE: &str = "screenshot-paths.json";
pub const FEATURE_FILE: &str = "feature-evaluation.json";

const SLUG_MAX: usize = 80;

pub struct Orchestrator {
    client: LlmClient,
    progress: Arc<dyn ProgressSink>,
    prompt: Arc<dyn UserPrompt>,
    browsers: Arc<dyn BrowserFactory>,
    limits: LoopLimits,
    check_urls: bool,
}

impl Orchestrator {
    pub fn new(
        client: LlmClient,
        progress: Arc<dyn ProgressSink>,
        prompt: Arc<dyn UserPrompt>,
        browsers: Arc<dyn BrowserFactory>,
    ) -> Self {
        Self {
            client,
            progress,
            prompt,
            browsers,
            limits: LoopLimits::default(),
            check_urls: true,
        }
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Skip the reachability check on the target URL.
    pub fn without_url_check(mut self) -> Self {
        self.check_urls = false;
        self
    }

    fn ctx(&self) -> AgentContext<'_> {
        AgentContext::new(&self.client, self.progress.as_ref()).with_limits(self.limits)
    }

    /// Preflight, every phase, then the output files.
    pub async fn run(&self, mut config: AnalysisConfig) -> Result<FinalReport> {
        self.preflight(&mut config).await?;
        let out_dir = config.output_dir();
        let state = self.execute(config).await;
        let report = FinalReport::from_state(state, self.progress.token_usage());
        write_outputs(&report, &out_dir)?;
        Ok(report)
    }

    /// Check the targets before spending anything on agents.
    ///
    /// An unreachable URL is dropped only if the user agrees.
    pub async fn preflight(&self, config: &mut AnalysisConfig) -> Result<()> {
        if config.has_path() && !Path::new(&config.target_path).is_dir() {
            bail!("Target path is not a directory: {}", config.target_path);
        }
        if !config.has_url() || !self.check_urls {
            return Ok(());
        }

        let Err(err) = check_url_reachable(&config.target_url).await else {
            return Ok(());
        };
        warn!(url = %config.target_url, error = %err, "Target URL is unreachable");
        if !self.prompt.is_interactive() {
            return Err(err.context("Target URL is unreachable and no one can confirm continuing without it"));
        }

        let question = format!(
            "{} is unreachable ({}). Continue without it? [y/N]",
            config.target_url, err
        );
        let answer = self.prompt.ask(&question, self.progress.as_ref()).await;
        if !is_yes(&answer) {
            bail!("Aborted: {} is unreachable", config.target_url);
        }
        info!(url = %config.target_url, "Continuing without the target URL");
        config.target_url.clear();
        if !config.has_path() {
            bail!("Nothing left to analyze without the target URL");
        }
        Ok(())
    }

    /// Every phase in order. Never fails; failures are recorded on the state.
    pub async fn execute(&self, config: AnalysisConfig) -> PipelineState {
        let ctx = self.ctx();
        let mut state = PipelineState::new(config);

        let reader = if state.config.has_path() {
            let root = PathBuf::from(&state.config.target_path);
            match CodebaseReader::new(root) {
                Ok(reader) => Some(reader),
                Err(e) => {
                    self.fail(&mut state, AgentKind::CodeAnalysis.label(), &e.to_string());
                    None
                }
            }
        } else {
            None
        };

        // Research and code analysis
        self.progress.phase("Research and code analysis");
        let config = &state.config;
        let research_phase = async {
            if !config.has_url() && !config.has_path() {
                return None;
            }
            Some(self.research_phase(&ctx, config).await)
        };
        let code_phase = async {
            let reader = reader.as_ref()?;
            Some(
                self.tracked(
                    AgentKind::CodeAnalysis,
                    &config.target_path,
                    async {
                        run_code_analysis(&ctx, reader, &config.priorities)
                            .await
                            .map_err(anyhow::Error::from)
                    },
                    |out| {
                        format!(
                            "{} stack items, {} components",
                            out.tech_stack.len(),
                            out.components.len()
                        )
                    },
                )
                .await,
            )
        };
        let (research, code) = tokio::join!(research_phase, code_phase);

        if let Some(result) = research {
            match result {
                Ok((output, captured)) => {
                    state.screenshots.extend(captured);
                    state.research = Some(output);
                }
                Err(e) => state.mark_failed(AgentKind::ComparativeResearch.label(), e),
            }
        }
        if let Some(result) = code {
            state.code_analysis = settle(&mut state, AgentKind::CodeAnalysis, result);
        }

        // Screenshots
        let urls = screenshot_urls(
            &state.config.target_url,
            state.research.as_ref(),
            &state.screenshots,
        );
        if !urls.is_empty() {
            self.progress.phase("Screenshots");
            match self.capture_screenshots(&urls).await {
                Ok(entries) => state.screenshots.extend(entries),
                Err(e) => self.fail(&mut state, SCREENSHOT_PHASE, &format!("{:#}", e)),
            }
        }

        // Ranking pass 1
        if state.research.is_some() || state.code_analysis.is_some() {
            self.progress.phase("Feature ranking");
            let research = state.research.clone().unwrap_or_default();
            let code = state.code_analysis.clone().unwrap_or_default();
            let priorities = state.config.priorities.clone();
            let result = self
                .tracked(
                    AgentKind::RankingPass1,
                    "initial ranking",
                    async {
                        run_pass1(&ctx, &research, &code, &priorities)
                            .await
                            .map_err(anyhow::Error::from)
                    },
                    |out| format!("{} recommendations", out.recommendations.len()),
                )
                .await;
            state.pass1 = settle(&mut state, AgentKind::RankingPass1, result);
        } else {
            self.fail(
                &mut state,
                AgentKind::RankingPass1.label(),
                "No research or code analysis output to rank",
            );
        }

        if state.pass1.is_some() {
            // Feasibility and tech stack run one after the other
            self.progress.phase("Feasibility");
            self.feasibility_phase(&ctx, &mut state, reader.as_ref()).await;
            if let Some(reader) = reader.as_ref() {
                self.tech_stack_phase(&ctx, &mut state, reader).await;
            }

            self.progress.phase("Re-ranking");
            self.pass2_phase(&ctx, &mut state).await;
        }

        // Visual design audit
        if state.screenshots.iter().any(|s| !s.tiles.is_empty()) {
            self.progress.phase("Design audit");
            let prior = PriorAnalysis {
                research: state.research.as_ref(),
                code_analysis: state.code_analysis.as_ref(),
                quality: state.quality_audit.as_ref(),
            };
            let detail = format!("{} screenshot(s)", state.screenshots.len());
            let result = self
                .tracked(
                    AgentKind::UxDesignAudit,
                    &detail,
                    async {
                        run_ux_audit(&ctx, &state.screenshots, &prior)
                            .await
                            .map_err(anyhow::Error::from)
                    },
                    |out| format!("{} issues", out.issues.len()),
                )
                .await;
            state.ux_design = settle(&mut state, AgentKind::UxDesignAudit, result);
        }

        // Executive summary
        self.progress.phase("Synthesis");
        let label = AgentKind::Synthesis.label();
        self.progress.start_agent(label, "executive summary");
        state.executive_summary = run_synthesis(&ctx, &state).await;
        self.progress.finish_agent(label, "done");

        info!(failed = state.failed_phases.len(), "Pipeline finished");
        state
    }

    async fn research_phase(
        &self,
        ctx: &AgentContext<'_>,
        config: &AnalysisConfig,
    ) -> Result<(ComparativeResearchOutput, Vec<ScreenshotEntry>)> {
        let kind = AgentKind::ComparativeResearch;
        let detail = if config.has_url() {
            &config.target_url
        } else {
            &config.target_path
        };
        self.progress.start_agent(kind.label(), detail);
        let prompt = self.prompt.as_ref();
        let result = with_browser(self.browsers.as_ref(), |browser| async move {
            let output = run_research(ctx, config, browser.clone(), prompt).await;
            Ok((output, browser.captured_screenshots()))
        })
        .await;

        let outcome = result.and_then(|(output, captured)| {
            output
                .map(|output| (output, captured))
                .map_err(anyhow::Error::from)
        });
        match &outcome {
            Ok((output, _)) => self
                .progress
                .finish_agent(kind.label(), &format!("{} competitors", output.competitors.len())),
            Err(e) => {
                error!(phase = kind.label(), error = %e, "Phase failed");
                self.progress.fail_agent(kind.label(), &e.to_string());
            }
        }
        outcome
    }

    async fn capture_screenshots(&self, urls: &[String]) -> Result<Vec<ScreenshotEntry>> {
        self.progress.start_agent(SCREENSHOT_PHASE, &format!("{} URL(s)", urls.len()));
        let result = with_browser(self.browsers.as_ref(), |browser| async move {
            let browser = &browser;
            let captures = join_all(urls.iter().map(|url| async move {
                (url, browser.screenshot(url).await)
            }))
            .await;

            let mut entries = Vec::new();
            for (url, capture) in captures {
                match capture {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!(url = %url, error = %e, "Screenshot failed"),
                }
            }
            Ok(entries)
        })
        .await;

        if let Ok(entries) = &result {
            self.progress
                .finish_agent(SCREENSHOT_PHASE, &format!("{} of {} captured", entries.len(), urls.len()));
        }
        result
    }

    async fn feasibility_phase(
        &self,
        ctx: &AgentContext<'_>,
        state: &mut PipelineState,
        reader: Option<&CodebaseReader>,
    ) {
        let kind = AgentKind::TechFeasibility;
        let Some(reader) = reader else {
            self.fail(state, kind.label(), "No codebase path");
            return;
        };
        let result = self
            .tracked(
                kind,
                "assessing recommendations",
                async {
                    run_feasibility(
                        ctx,
                        reader,
                        state.pass1.as_ref(),
                        state.code_analysis.as_ref(),
                        &state.config.constraints,
                    )
                    .await
                    .map_err(anyhow::Error::from)
                },
                |out| format!("{} assessments", out.assessments.len()),
            )
            .await;
        state.feasibility = settle(state, kind, result);
    }

    async fn tech_stack_phase(
        &self,
        ctx: &AgentContext<'_>,
        state: &mut PipelineState,
        reader: &CodebaseReader,
    ) {
        let kind = AgentKind::TechStackAdvisor;
        let names = features_to_evaluate(&state.config.features, state.pass1.as_ref());
        if names.is_empty() {
            info!("No features for the tech stack advisor");
            return;
        }
        let features = feature_requests(&names, state.pass1.as_ref());
        let detail = format!("{} feature(s)", features.len());
        let result = self
            .tracked(
                kind,
                &detail,
                async {
                    run_tech_stack(ctx, reader, &features, state.code_analysis.as_ref())
                        .await
                        .map_err(anyhow::Error::from)
                },
                |out| out.summary.clone(),
            )
            .await;
        state.tech_stack_advisor = settle(state, kind, result);
    }

    async fn pass2_phase(&self, ctx: &AgentContext<'_>, state: &mut PipelineState) {
        let kind = AgentKind::RankingPass2;
        let Some(pass1) = state.pass1.clone() else {
            return;
        };
        let feasibility = state.feasibility.clone().unwrap_or_default();
        let quality = state.quality_audit.clone().unwrap_or_default();
        let result = self
            .tracked(
                kind,
                "re-ranking with feasibility",
                async {
                    run_pass2(ctx, &pass1, &feasibility, &quality)
                        .await
                        .map_err(anyhow::Error::from)
                },
                |out| format!("{} promoted, {} demoted", out.promoted.len(), out.demoted.len()),
            )
            .await;
        state.pass2 = settle(state, kind, result);

        if let (Some(pass2), Some(feasibility)) = (&state.pass2, state.feasibility.as_mut()) {
            remap_feasibility_ids(feasibility, &pass1.recommendations, &pass2.recommendations);
        }
    }

    /// Start, await and finish or fail one agent in the progress display.
    async fn tracked<T, Fut>(
        &self,
        kind: AgentKind,
        detail: &str,
        fut: Fut,
        summarize: impl FnOnce(&T) -> String,
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let label = kind.label();
        self.progress.start_agent(label, detail);
        let result = fut.await;
        match &result {
            Ok(value) => self.progress.finish_agent(label, &summarize(value)),
            Err(e) => {
                error!(phase = label, error = %e, "Phase failed");
                self.progress.fail_agent(label, &e.to_string());
            }
        }
        result
    }

    fn fail(&self, state: &mut PipelineState, phase: &str, message: &str) {
        warn!(phase, error = message, "Phase skipped");
        self.progress.fail_agent(phase, message);
        state.mark_failed(phase, message);
    }

    /// Code analysis followed by the tech stack advisor for `names`.
    ///
    /// A failed code analysis only removes the stack context.
    pub async fn evaluate_features(
        &self,
        config: &AnalysisConfig,
        names: &[String],
    ) -> Result<TechStackAdvisorOutput> {
        if !config.has_path() {
            bail!("Feature evaluation needs target_path in the config");
        }
        let reader = CodebaseReader::new(&config.target_path)?;
        let ctx = self.ctx();

        self.progress.phase("Code analysis");
        let code = self
            .tracked(
                AgentKind::CodeAnalysis,
                &config.target_path,
                async {
                    run_code_analysis(&ctx, &reader, &config.priorities)
                        .await
                        .map_err(anyhow::Error::from)
                },
                |out| format!("{} stack items", out.tech_stack.len()),
            )
            .await
            .ok();

        self.progress.phase("Tech stack");
        let features = feature_requests(names, None);
        let detail = format!("{} feature(s)", features.len());
        self.tracked(
            AgentKind::TechStackAdvisor,
            &detail,
            async {
                run_tech_stack(&ctx, &reader, &features, code.as_ref())
                    .await
                    .map_err(anyhow::Error::from)
            },
            |out| out.summary.clone(),
        )
        .await
    }
}

fn settle<T>(state: &mut PipelineState, kind: AgentKind, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            state.mark_failed(kind.label(), e);
            None
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Target first, then research competitors. Duplicates and URLs that are
/// already captured are skipped, and the list is capped.
pub fn screenshot_urls(
    target_url: &str,
    research: Option<&ComparativeResearchOutput>,
    captured: &[ScreenshotEntry],
) -> Vec<String> {
    let competitors = research.into_iter().flat_map(|r| r.competitor_urls());
    let mut urls: Vec<String> = Vec::new();
    for url in std::iter::once(target_url).chain(competitors) {
        let url = url.trim();
        if url.is_empty()
            || urls.iter().any(|u| u == url)
            || captured.iter().any(|c| c.url == url)
        {
            continue;
        }
        urls.push(url.to_string());
        if urls.len() == MAX_SCREENSHOT_URLS {
            break;
        }
    }
    urls
}

/// Re-key feasibility assessments from pass-1 ids to pass-2 ids.
///
/// Titles are the only key shared by the two passes. An assessment whose
/// title cannot be found keeps its id.
pub fn remap_feasibility_ids(
    feasibility: &mut FeasibilityOutput,
    pass1: &[Recommendation],
    pass2: &[Recommendation],
) {
    let new_ids = ids_by_title(pass2);
    if new_ids.is_empty() {
        warn!("Pass 2 produced no titles, feasibility ids left unchanged");
        return;
    }
    let old_titles: HashMap<&str, &str> = pass1
        .iter()
        .map(|r| (r.id.as_str(), r.title.as_str()))
        .collect();

    for assessment in &mut feasibility.assessments {
        let old_id = assessment.recommendation_id.as_str();
        let new_id = old_titles
            .get(old_id)
            .and_then(|title| new_ids.get(title));
        match new_id {
            Some(new_id) => assessment.recommendation_id = (*new_id).to_string(),
            None => warn!(id = old_id, "No pass 2 recommendation with a matching title"),
        }
    }
    feasibility
        .assessments
        .sort_by(|a, b| a.recommendation_id.cmp(&b.recommendation_id));
}

#[derive(Serialize)]
struct ScreenshotPaths {
    url: String,
    tile_paths: Vec<String>,
    full_page_path: Option<String>,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_jpeg(path: &Path, data: &str) -> Result<()> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .with_context(|| format!("Invalid image data for {}", path.display()))?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Index path for a file in the screenshot directory, relative to the
/// report directory.
fn screenshot_index_path(file_name: &str) -> String {
    format!("{}/{}", SCREENSHOT_DIR, file_name)
}

/// Decode every tile to disk. Tiles that fail to decode are skipped.
fn write_screenshots(screenshots: &[ScreenshotEntry], out_dir: &Path) -> Result<Vec<ScreenshotPaths>> {
    let dir = out_dir.join(SCREENSHOT_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut index = Vec::new();
    for entry in screenshots {
        let slug = slugify(&entry.url, SLUG_MAX);
        let mut tile_paths = Vec::new();
        for (i, tile) in entry.tiles.iter().enumerate() {
            let name = format!("{}_{}.jpg", slug, i + 1);
            match write_jpeg(&dir.join(&name), tile) {
                Ok(()) => tile_paths.push(screenshot_index_path(&name)),
                Err(e) => warn!(error = %e, "Skipping screenshot tile"),
            }
        }
        let full_page_path = if entry.full_page.is_empty() {
            None
        } else {
            let name = format!("{}_full.jpg", slug);
            match write_jpeg(&dir.join(&name), &entry.full_page) {
                Ok(()) => Some(screenshot_index_path(&name)),
                Err(e) => {
                    warn!(error = %e, "Skipping full-page screenshot");
                    None
                }
            }
        };
        index.push(ScreenshotPaths {
            url: entry.url.clone(),
            tile_paths,
            full_page_path,
        });
    }
    Ok(index)
}

/// Report, executive summary and screenshot files under `out_dir`.
pub fn write_outputs(report: &FinalReport, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    write_json(&out_dir.join(REPORT_FILE), report)?;
    let summary_path = out_dir.join(SUMMARY_FILE);
    fs::write(&summary_path, &report.executive_summary)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    if !report.screenshots.is_empty() {
        let index = write_screenshots(&report.screenshots, out_dir)?;
        write_json(&out_dir.join(SCREENSHOT_INDEX_FILE), &index)?;
    }
    info!(dir = %out_dir.display(), "Outputs written");
    Ok(())
}

pub fn write_feature_evaluation(output: &TechStackAdvisorOutput, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let path = out_dir.join(FEATURE_FILE);
    write_json(&path, output)?;
    Ok(path)
}

/// Replace the tech stack section of an existing report.
pub fn patch_report(report_dir: &Path, output: &TechStackAdvisorOutput) -> Result<PathBuf> {
    let path = report_dir.join(REPORT_FILE);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut report: FinalReport = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    report.tech_stack_advisor = Some(output.clone());
    write_json(&path, &report)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakeFactory};
    use crate::browser::Browser;
    use crate::config::Constraints;
    use crate::llm::messages::{AssistantMessage, ToolCallMessage};
    use crate::llm::scripted::ScriptedBackend;
    use crate::progress::{ConsoleProgress, FixedAnswer, StdinPrompt};
    use crate::schemas::feasibility::FeasibilityAssessment;
    use crate::schemas::pipeline::FailedPhase;
    use crate::schemas::recommendations::ScoreBreakdown;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn config(path: &Path, out: &Path) -> AnalysisConfig {
        AnalysisConfig {
            target_path: path.display().to_string(),
            target_url: String::new(),
            priorities: vec!["accessibility".to_string()],
            site_name: "Demo".to_string(),
            site_description: String::new(),
            competitor_urls: Vec::new(),
            known_issues: Vec::new(),
            user_feedback: String::new(),
            design_assets: Vec::new(),
            features: Vec::new(),
            site_depth: 1,
            output_directory: out.display().to_string(),
            constraints: Constraints::default(),
        }
    }

    fn codebase() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "demo"}"#).unwrap();
        dir
    }

    fn rec(id: &str, title: &str, rank: u32) -> Recommendation {
        Recommendation {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            rationale: String::new(),
            category: String::new(),
            estimated_complexity: String::new(),
            expected_impact: String::new(),
            scores: ScoreBreakdown::default(),
            rank,
            parity_gap: false,
            competitors_with_feature: Vec::new(),
            user_value_signal: String::new(),
        }
    }

    fn assessment(id: &str) -> FeasibilityAssessment {
        serde_json::from_value(json!({"recommendation_id": id, "rating": "easy"})).unwrap()
    }

    fn orchestrator(backend: Arc<ScriptedBackend>, browser: Arc<FakeBrowser>) -> Orchestrator {
        Orchestrator::new(
            LlmClient::new(backend),
            Arc::new(ConsoleProgress::new()),
            Arc::new(StdinPrompt::non_interactive()),
            Arc::new(FakeFactory(browser)),
        )
    }

    const CODE_JSON: &str = r#"{"tech_stack": [{"name": "React", "category": "framework"}], "architecture": {}, "summary": "React app"}"#;
    const PASS1_JSON: &str = r#"{"recommendations": [
        {"id": "REC-001", "title": "Dark mode", "description": "d", "rank": 1},
        {"id": "REC-002", "title": "Search", "description": "d", "rank": 2}
    ], "summary": "two"}"#;
    const PASS2_JSON: &str = r#"{"recommendations": [
        {"id": "REC-001", "title": "Search", "description": "d", "rank": 1},
        {"id": "REC-002", "title": "Dark mode", "description": "d", "rank": 2}
    ], "promoted": ["REC-001"], "summary": "swapped"}"#;
    const FEASIBILITY_JSON: &str = r#"{"assessments": [
        {"recommendation_id": "REC-001", "rating": "easy"},
        {"recommendation_id": "REC-002", "rating": "hard"}
    ], "summary": "ok"}"#;

    fn advice(name: &str) -> String {
        format!(
            r#"{{"features": [{{"feature_name": "{}", "simple_approach": {{"approach_name": "simple", "description": "d"}}}}]}}"#,
            name
        )
    }

    #[test]
    fn test_remap_follows_titles() {
        let pass1 = [rec("REC-001", "A", 1), rec("REC-002", "B", 2), rec("REC-003", "C", 3)];
        let pass2 = [rec("REC-001", "C", 1), rec("REC-002", "A", 2), rec("REC-003", "B", 3)];
        let mut feasibility = FeasibilityOutput {
            assessments: vec![assessment("REC-002")],
            ..Default::default()
        };
        remap_feasibility_ids(&mut feasibility, &pass1, &pass2);
        assert_eq!(feasibility.assessments[0].recommendation_id, "REC-003");
    }

    #[test]
    fn test_remap_keeps_unmatched_ids_and_sorts() {
        let pass1 = [rec("REC-001", "A", 1), rec("REC-002", "B", 2)];
        let pass2 = [rec("REC-001", "B", 1), rec("REC-002", "A reworded", 2)];
        let mut feasibility = FeasibilityOutput {
            assessments: vec![assessment("REC-002"), assessment("REC-001"), assessment("REC-009")],
            ..Default::default()
        };
        remap_feasibility_ids(&mut feasibility, &pass1, &pass2);
        let ids: Vec<_> = feasibility
            .assessments
            .iter()
            .map(|a| a.recommendation_id.as_str())
            .collect();
        // B -> REC-001; A has no match; REC-009 was never in pass 1
        assert_eq!(ids, vec!["REC-001", "REC-001", "REC-009"]);
    }

    #[test]
    fn test_remap_without_pass2_titles_is_a_no_op() {
        let pass1 = [rec("REC-001", "A", 1)];
        let mut feasibility = FeasibilityOutput {
            assessments: vec![assessment("REC-001")],
            ..Default::default()
        };
        remap_feasibility_ids(&mut feasibility, &pass1, &[]);
        assert_eq!(feasibility.assessments[0].recommendation_id, "REC-001");
    }

    #[test]
    fn test_screenshot_urls_dedupe_and_cap() {
        let research: ComparativeResearchOutput = serde_json::from_value(json!({
            "competitors": (1..=8)
                .map(|i| json!({"name": format!("C{}", i), "url": format!("https://c{}.test", i)}))
                .chain(std::iter::once(json!({"name": "Dup", "url": "https://a.test"})))
                .collect::<Vec<_>>()
        }))
        .unwrap();
        let captured = [ScreenshotEntry {
            url: "https://c1.test".to_string(),
            tiles: vec!["T".to_string()],
            full_page: String::new(),
        }];
        let urls = screenshot_urls("https://a.test", Some(&research), &captured);
        assert_eq!(urls.len(), MAX_SCREENSHOT_URLS);
        assert_eq!(urls[0], "https://a.test");
        assert!(!urls.contains(&"https://c1.test".to_string()));
        assert!(screenshot_urls("", None, &[]).is_empty());
    }

    #[test]
    fn test_yes_answers() {
        assert!(is_yes(" Y "));
        assert!(is_yes("yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[tokio::test]
    async fn test_path_only_run_researches_competitors_only() {
        let code = codebase();
        let out = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(
            AgentKind::ComparativeResearch,
            AssistantMessage::with_tool_calls(vec![ToolCallMessage::new(
                "r0",
                "browse_page",
                json!({"url": "https://rival.test/"}),
            )]),
        );
        backend.push(
            AgentKind::ComparativeResearch,
            AssistantMessage::text(
                r#"{"competitors": [{"name": "Rival", "url": "https://rival.test/"}], "summary": "r"}"#,
            ),
        );
        backend.push(AgentKind::CodeAnalysis, AssistantMessage::text(CODE_JSON));
        backend.push(AgentKind::RankingPass1, AssistantMessage::text(PASS1_JSON));
        backend.push(AgentKind::TechFeasibility, AssistantMessage::text(FEASIBILITY_JSON));
        backend.push(AgentKind::TechStackAdvisor, AssistantMessage::text(advice("Dark mode")));
        backend.push(AgentKind::TechStackAdvisor, AssistantMessage::text(advice("Search")));
        backend.push(AgentKind::RankingPass2, AssistantMessage::text(PASS2_JSON));
        backend.push(AgentKind::Synthesis, AssistantMessage::text("# Summary"));
        let mut fake = FakeBrowser::default();
        fake.pages.insert(
            "https://rival.test/".to_string(),
            "<html><body><h1>Rival</h1></body></html>".to_string(),
        );
        let browser = Arc::new(fake);
        let orch = orchestrator(backend.clone(), browser.clone());
        let mut cfg = config(code.path(), out.path());
        cfg.competitor_urls = vec!["https://rival.test/".to_string()];

        let report = orch.run(cfg).await.unwrap();

        assert!(report.failed_phases.is_empty(), "{:?}", report.failed_phases);
        assert_eq!(report.research.as_ref().unwrap().competitors[0].name, "Rival");
        assert_eq!(report.code_analysis.as_ref().unwrap().summary, "React app");
        assert_eq!(backend.calls_for(AgentKind::ComparativeResearch), 2);
        // Only the competitor was fetched; there is no target URL to visit
        assert_eq!(
            *browser.visited.lock().unwrap(),
            vec!["https://rival.test/".to_string()]
        );
        let opening = backend
            .requests()
            .into_iter()
            .find(|r| r.agent == AgentKind::ComparativeResearch)
            .unwrap();
        let brief = serde_json::to_string(&opening.messages[1]).unwrap();
        assert!(!brief.contains("Target URL"));
        assert!(brief.contains("Known competitors: https://rival.test/"));
        // research session, then the failed competitor capture
        assert_eq!(browser.closed.load(Ordering::SeqCst), 2);
        assert!(report.ux_design.is_none());

        // Swapped titles move the feasibility ids with them
        let recs = report.recommendations.as_ref().unwrap();
        assert_eq!(recs.summary, "swapped");
        let ratings: Vec<_> = report
            .feasibility
            .as_ref()
            .unwrap()
            .assessments
            .iter()
            .map(|a| (a.recommendation_id.as_str(), a.rating.as_str()))
            .collect();
        assert_eq!(ratings, vec![("REC-001", "hard"), ("REC-002", "easy")]);
        assert_eq!(report.tech_stack_advisor.as_ref().unwrap().features.len(), 2);
        assert_eq!(report.executive_summary, "# Summary");

        let written: FinalReport =
            serde_json::from_str(&fs::read_to_string(out.path().join(REPORT_FILE)).unwrap()).unwrap();
        assert_eq!(written.recommendations, report.recommendations);
        assert_eq!(
            fs::read_to_string(out.path().join(SUMMARY_FILE)).unwrap(),
            "# Summary"
        );
        assert!(!out.path().join(SCREENSHOT_INDEX_FILE).exists());
    }

    fn code_failure(state: &PipelineState) -> &FailedPhase {
        state
            .failed_phases
            .iter()
            .find(|f| f.phase == AgentKind::CodeAnalysis.label())
            .unwrap()
    }

    #[tokio::test]
    async fn test_iteration_cap_and_parse_failure_are_distinct() {
        let code = codebase();
        let out = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        for i in 0..2 {
            backend.push(
                AgentKind::CodeAnalysis,
                AssistantMessage::with_tool_calls(vec![ToolCallMessage::new(
                    format!("c{}", i),
                    "get_tree",
                    json!({}),
                )]),
            );
        }
        let orch = orchestrator(backend.clone(), Arc::new(FakeBrowser::default())).with_limits(LoopLimits {
            max_iterations: 2,
            ..LoopLimits::default()
        });

        let state = orch.execute(config(code.path(), out.path())).await;

        assert_eq!(backend.calls_for(AgentKind::CodeAnalysis), 2);
        let code_failure = code_failure(&state);
        assert!(code_failure.error.contains("did not finish within 2 iterations"));
        // Nothing to rank, so pass 1 is marked too
        assert!(state
            .failed_phases
            .iter()
            .any(|f| f.phase == AgentKind::RankingPass1.label()));
        assert!(state.pass1.is_none());
        // Synthesis still ran, and fell back
        assert_eq!(backend.calls_for(AgentKind::Synthesis), 1);

        let backend = Arc::new(ScriptedBackend::new());
        backend.push(AgentKind::CodeAnalysis, AssistantMessage::text("{not json"));
        backend.push(AgentKind::CodeAnalysis, AssistantMessage::text("still not json"));
        let orch = orchestrator(backend.clone(), Arc::new(FakeBrowser::default()));
        let state = orch.execute(config(code.path(), out.path())).await;
        let code_failure = self::code_failure(&state);
        assert!(code_failure.error.contains("could not be parsed"));
        assert!(!code_failure.error.contains("iterations"));
    }

    #[tokio::test]
    async fn test_url_run_collects_screenshots_and_audits() {
        let out = tempfile::tempdir().unwrap();
        let mut fake = FakeBrowser::default();
        fake.shots
            .insert("https://a.test".to_string(), vec!["/9j/AA==".to_string()]);
        let browser = Arc::new(fake);

        let backend = Arc::new(ScriptedBackend::new());
        backend.push(
            AgentKind::ComparativeResearch,
            AssistantMessage::text(
                r#"{"competitors": [{"name": "Rival", "url": "https://rival.test"}], "summary": "r"}"#,
            ),
        );
        backend.push(AgentKind::RankingPass1, AssistantMessage::text(PASS1_JSON));
        backend.push(AgentKind::RankingPass2, AssistantMessage::text(PASS2_JSON));
        backend.push(
            AgentKind::UxDesignAudit,
            AssistantMessage::text(r#"{"summary": "fine"}"#),
        );
        backend.push(AgentKind::Synthesis, AssistantMessage::text("# Summary"));
        let orch = orchestrator(backend.clone(), browser.clone());

        let mut cfg = config(Path::new(""), out.path());
        cfg.target_path = String::new();
        cfg.target_url = "https://a.test".to_string();
        let state = orch.execute(cfg).await;

        // research session and screenshot session
        assert_eq!(browser.closed.load(Ordering::SeqCst), 2);
        assert_eq!(state.screenshots.len(), 1);
        assert_eq!(state.ux_design.as_ref().unwrap().summary, "fine");
        assert!(state
            .failed_phases
            .iter()
            .any(|f| f.phase == AgentKind::TechFeasibility.label() && f.error == "No codebase path"));
        assert!(state.tech_stack_advisor.is_none());
        assert!(state.pass2.is_some());

        let report = FinalReport::from_state(state, Default::default());
        write_outputs(&report, out.path()).unwrap();
        assert!(out.path().join(SCREENSHOT_DIR).join("https_a_test_1.jpg").exists());
        let index: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.path().join(SCREENSHOT_INDEX_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(index[0]["url"], "https://a.test");
        assert_eq!(index[0]["tile_paths"], json!(["screenshots/https_a_test_1.jpg"]));
        assert!(index[0]["full_page_path"].is_null());
    }

    struct BrokenFactory;

    impl BrowserFactory for BrokenFactory {
        fn open(&self) -> BoxFuture<'_, Result<Arc<dyn Browser>>> {
            Box::pin(async { Err(anyhow::anyhow!("no browser available")) })
        }
    }

    #[tokio::test]
    async fn test_browser_open_failure_marks_research_and_screenshots() {
        let out = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(AgentKind::Synthesis, AssistantMessage::text("# Summary"));
        let orch = Orchestrator::new(
            LlmClient::new(backend.clone()),
            Arc::new(ConsoleProgress::new()),
            Arc::new(StdinPrompt::non_interactive()),
            Arc::new(BrokenFactory),
        );
        let mut cfg = config(Path::new(""), out.path());
        cfg.target_path = String::new();
        cfg.target_url = "https://a.test".to_string();

        let state = orch.execute(cfg).await;
        let phases: Vec<_> = state.failed_phases.iter().map(|f| f.phase.as_str()).collect();
        assert_eq!(
            phases,
            vec![
                AgentKind::ComparativeResearch.label(),
                SCREENSHOT_PHASE,
                AgentKind::RankingPass1.label()
            ]
        );
        assert_eq!(state.executive_summary, "# Summary");
    }

    #[tokio::test]
    async fn test_preflight_rejects_missing_directory() {
        let out = tempfile::tempdir().unwrap();
        let orch = orchestrator(Arc::new(ScriptedBackend::new()), Arc::new(FakeBrowser::default()));
        let mut cfg = config(&out.path().join("missing"), out.path());
        assert!(orch.preflight(&mut cfg).await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_url_needs_consent() {
        let code = codebase();
        let out = tempfile::tempdir().unwrap();
        let unreachable = "http://127.0.0.1:9/";
        let make = |prompt: Arc<dyn UserPrompt>| {
            Orchestrator::new(
                LlmClient::new(Arc::new(ScriptedBackend::new())),
                Arc::new(ConsoleProgress::new()),
                prompt,
                Arc::new(FakeFactory(Arc::new(FakeBrowser::default()))),
            )
        };

        let mut cfg = config(code.path(), out.path());
        cfg.target_url = unreachable.to_string();
        make(Arc::new(FixedAnswer("y".to_string())))
            .preflight(&mut cfg)
            .await
            .unwrap();
        assert!(cfg.target_url.is_empty());

        let mut cfg = config(code.path(), out.path());
        cfg.target_url = unreachable.to_string();
        assert!(make(Arc::new(FixedAnswer("n".to_string())))
            .preflight(&mut cfg)
            .await
            .is_err());

        let mut cfg = config(code.path(), out.path());
        cfg.target_url = unreachable.to_string();
        assert!(make(Arc::new(StdinPrompt::non_interactive()))
            .preflight(&mut cfg)
            .await
            .is_err());
    }

    #[test]
    fn test_patch_report_replaces_tech_stack() {
        let out = tempfile::tempdir().unwrap();
        let code = codebase();
        let state = PipelineState::new(config(code.path(), out.path()));
        write_outputs(&FinalReport::from_state(state, Default::default()), out.path()).unwrap();

        let output: TechStackAdvisorOutput = serde_json::from_str(&advice("Search")).unwrap();
        patch_report(out.path(), &output).unwrap();
        let text = fs::read_to_string(out.path().join(REPORT_FILE)).unwrap();
        let report: FinalReport = serde_json::from_str(&text).unwrap();
        assert_eq!(report.tech_stack_advisor.unwrap().features[0].feature_name, "Search");

        let empty = tempfile::tempdir().unwrap();
        assert!(patch_report(empty.path(), &output).is_err());
    }
}
