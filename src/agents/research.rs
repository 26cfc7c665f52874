//! Browser-backed competitive research.
//!
//! Page fetches draw from a depth-sized budget and screenshots from their
//! own fixed one. Link discovery is free and tells the model how many page
//! visits it has left.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{info, warn};

use super::prompts::RESEARCH_SYSTEM;
use super::{run_tool_agent, AgentContext, AgentKind};
use crate::browser::Browser;
use crate::budget::{PageBudget, ScreenshotBudget};
use crate::config::AnalysisConfig;
use crate::error::{AgentError, ToolError};
use crate::llm::tools::{single_string_schema, str_arg, ToolHandler, ToolKind, ToolOutput, ToolSpec};
use crate::progress::{ProgressSink, UserPrompt};
use crate::schemas::research::ComparativeResearchOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchTool {
    BrowsePage,
    DiscoverLinks,
    Screenshot,
    ExtractCss,
    AskUser,
}

impl ToolKind for ResearchTool {
    const ALL: &'static [Self] = &[
        ResearchTool::BrowsePage,
        ResearchTool::DiscoverLinks,
        ResearchTool::Screenshot,
        ResearchTool::ExtractCss,
        ResearchTool::AskUser,
    ];

    fn name(self) -> &'static str {
        match self {
            ResearchTool::BrowsePage => "browse_page",
            ResearchTool::DiscoverLinks => "discover_links",
            ResearchTool::Screenshot => "screenshot",
            ResearchTool::ExtractCss => "extract_css",
            ResearchTool::AskUser => "ask_user",
        }
    }

    fn spec(self) -> ToolSpec {
        let (description, input_schema) = match self {
            ResearchTool::BrowsePage => (
                "Fetch a page and return its structured text content: headings, navigation, main text, interactive elements, and semantic landmarks. This is efficient for understanding content and features. Use 'screenshot' for visual design assessment.",
                single_string_schema("url", "The URL to browse."),
            ),
            ResearchTool::DiscoverLinks => (
                "Discover internal navigation links on a page. Returns a list of {url, text} objects. Use this to find key pages to explore within the configured site_depth.",
                single_string_schema("url", "The URL to discover links on."),
            ),
            ResearchTool::Screenshot => (
                "Take a full-page screenshot of a URL. Returns all viewport-height sections for visual UX comparison. Screenshot the target site and each competitor homepage.",
                single_string_schema("url", "The URL to screenshot."),
            ),
            ResearchTool::ExtractCss => (
                "Extract CSS custom properties, fonts, and colors from a page.",
                single_string_schema("url", "The URL to extract CSS from."),
            ),
            ResearchTool::AskUser => (
                "Ask the user a question and get their text response. Use this to validate competitor choices or clarify requirements.",
                single_string_schema("question", "The question to ask the user."),
            ),
        };
        ToolSpec {
            name: self.name(),
            description,
            input_schema,
        }
    }
}

/// Research tool handler for one invocation. Budgets start fresh per handler.
pub struct ResearchTools<'a> {
    browser: Arc<dyn Browser>,
    pages: PageBudget,
    shots: ScreenshotBudget,
    prompt: &'a dyn UserPrompt,
    progress: &'a dyn ProgressSink,
}

impl<'a> ResearchTools<'a> {
    pub fn new(
        browser: Arc<dyn Browser>,
        site_depth: u32,
        prompt: &'a dyn UserPrompt,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            browser,
            pages: PageBudget::for_depth(site_depth),
            shots: ScreenshotBudget::default(),
            prompt,
            progress,
        }
    }

    pub fn pages(&self) -> &PageBudget {
        &self.pages
    }

    async fn browse_page(&self, url: &str) -> ToolOutput {
        if let Err(refusal) = self.pages.try_consume() {
            warn!(url, "Budget exhausted, rejecting browse_page");
            return refusal.into();
        }
        info!(visit = self.pages.used(), budget = self.pages.budget(), url, "Page visit");
        match self.browser.page_text(url).await {
            Ok(text) => text.into(),
            Err(e) => format!("Error browsing {}: {}", url, e).into(),
        }
    }

    async fn discover_links(&self, url: &str) -> ToolOutput {
        match self.browser.discover_links(url).await {
            Ok(links) => {
                let listing = serde_json::to_string_pretty(&links).unwrap_or_default();
                format!("{}{}", self.pages.remaining_banner(), listing).into()
            }
            Err(e) => format!("Error discovering links on {}: {}", url, e).into(),
        }
    }

    async fn screenshot(&self, url: &str) -> ToolOutput {
        if let Err(refusal) = self.shots.try_acquire() {
            return refusal.into();
        }
        match self.browser.screenshot(url).await {
            Ok(entry) => {
                self.progress
                    .log_event(AgentKind::ComparativeResearch.label(), &format!("screenshot: {}", url));
                ToolOutput::Images(entry.tiles)
            }
            Err(e) => {
                self.shots.refund();
                format!("Error taking screenshot of {}: {}", url, e).into()
            }
        }
    }

    async fn extract_css(&self, url: &str) -> ToolOutput {
        if let Err(refusal) = self.pages.try_consume() {
            warn!(url, "Budget exhausted, rejecting extract_css");
            return refusal.into();
        }
        info!(visit = self.pages.used(), budget = self.pages.budget(), url, "Page visit");
        match self.browser.extract_css(url).await {
            Ok(css) => css.into(),
            Err(e) => format!("Error extracting CSS from {}: {}", url, e).into(),
        }
    }
}

impl ToolHandler for ResearchTools<'_> {
    fn specs(&self) -> Vec<ToolSpec> {
        ResearchTool::ALL.iter().map(|t| t.spec()).collect()
    }

    fn call<'b>(
        &'b self,
        name: &'b str,
        args: &'b Value,
    ) -> BoxFuture<'b, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let output = match ResearchTool::parse(name)? {
                ResearchTool::BrowsePage => self.browse_page(str_arg(name, args, "url")?).await,
                ResearchTool::DiscoverLinks => {
                    self.discover_links(str_arg(name, args, "url")?).await
                }
                ResearchTool::Screenshot => self.screenshot(str_arg(name, args, "url")?).await,
                ResearchTool::ExtractCss => self.extract_css(str_arg(name, args, "url")?).await,
                ResearchTool::AskUser => {
                    let question = str_arg(name, args, "question")?;
                    self.prompt.ask(question, self.progress).await.into()
                }
            };
            Ok(output)
        })
    }
}

/// Opening user turn describing the target.
pub fn research_brief(config: &AnalysisConfig) -> String {
    let mut lines = Vec::new();
    if config.has_url() {
        lines.push(format!("Target URL: {}", config.target_url));
    }
    if config.has_path() {
        lines.push(format!("Target codebase: {}", config.target_path));
    }
    if !config.site_name.is_empty() {
        lines.push(format!("Site name: {}", config.site_name));
    }
    if !config.site_description.is_empty() {
        lines.push(format!("Site description: {}", config.site_description));
    }
    if !config.competitor_urls.is_empty() {
        lines.push(format!("Known competitors: {}", config.competitor_urls.join(", ")));
    }
    lines.push("Target audience: All audiences".to_string());
    lines.push(format!("Priorities: {}", config.priorities.join(", ")));
    lines.push(format!("site_depth: {}", config.site_depth));
    lines.join("\n")
}

pub async fn run_research(
    ctx: &AgentContext<'_>,
    config: &AnalysisConfig,
    browser: Arc<dyn Browser>,
    prompt: &dyn UserPrompt,
) -> Result<ComparativeResearchOutput, AgentError> {
    let tools = ResearchTools::new(browser, config.site_depth, prompt, ctx.progress);
    let result = run_tool_agent(
        ctx,
        AgentKind::ComparativeResearch,
        RESEARCH_SYSTEM,
        &research_brief(config),
        Some(&tools),
    )
    .await;
    info!(
        pages = tools.pages().used(),
        budget = tools.pages().budget(),
        "Research page visits"
    );
    result
}
