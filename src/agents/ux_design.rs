//! Visual design audit from captured screenshots.

use super::prompts::UX_DESIGN_SYSTEM;
use super::{run_vision_agent, AgentContext, AgentKind};
use crate::error::AgentError;
use crate::llm::agentic::TILE_HEIGHT_PX;
use crate::llm::messages::ContentPart;
use crate::schemas::code_analysis::CodeAnalysisOutput;
use crate::schemas::pipeline::ScreenshotEntry;
use crate::schemas::quality::QualityAuditOutput;
use crate::schemas::research::ComparativeResearchOutput;
use crate::schemas::ux_design::UxDesignOutput;

const TILES_PER_SCREENSHOT: usize = 2;

const INTRO: &str = "Evaluate the UX and visual design of the target site based on the screenshots below. Compare against competitor screenshots where available.";
const NO_SCREENSHOTS: &str = "No screenshots are available. Provide your best assessment based on the context from other agents.";

/// Upstream outputs the audit uses as text context.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorAnalysis<'a> {
    pub research: Option<&'a ComparativeResearchOutput>,
    pub code_analysis: Option<&'a CodeAnalysisOutput>,
    pub quality: Option<&'a QualityAuditOutput>,
}

impl PriorAnalysis<'_> {
    fn context_block(&self) -> Option<String> {
        let mut lines = Vec::new();
        if let Some(research) = self.research {
            lines.push(format!("Research summary: {}", research.summary));
        }
        if let Some(code) = self.code_analysis {
            lines.push(format!("Code analysis: {}", code.summary));
        }
        if let Some(quality) = self.quality {
            lines.push(format!("Quality audit: {}", quality.summary));
        }
        if let Some(code) = self.code_analysis {
            let ds = &code.design_system;
            lines.push(format!(
                "Design system: Has design system: {}, Theming: {}, Component library: {}",
                ds.has_design_system, ds.theming_support, ds.component_library
            ));
        }
        if lines.is_empty() {
            return None;
        }
        Some(format!("## Context from prior analysis\n{}", lines.join("\n")))
    }
}

/// Intro, prior context, then a header and the first tiles of each
/// screenshot.
pub fn build_parts(screenshots: &[ScreenshotEntry], prior: &PriorAnalysis<'_>) -> Vec<ContentPart> {
    let mut parts = vec![ContentPart::text(INTRO)];
    if let Some(context) = prior.context_block() {
        parts.push(ContentPart::text(context));
    }

    let mut has_images = false;
    for shot in screenshots.iter().filter(|s| !s.tiles.is_empty()) {
        let total = shot.tiles.len();
        let shown = total.min(TILES_PER_SCREENSHOT);
        parts.push(ContentPart::text(format!(
            "[Screenshot: {}] ({} of {} sections)",
            shot.url, shown, total
        )));
        for (i, tile) in shot.tiles.iter().take(shown).enumerate() {
            parts.push(ContentPart::text(format!(
                "[Section {}/{}, y={}px]",
                i + 1,
                total,
                i * TILE_HEIGHT_PX
            )));
            parts.push(ContentPart::jpeg_base64(tile));
            has_images = true;
        }
    }

    if !has_images {
        parts.push(ContentPart::text(NO_SCREENSHOTS));
    }
    parts
}

pub async fn run_ux_audit(
    ctx: &AgentContext<'_>,
    screenshots: &[ScreenshotEntry],
    prior: &PriorAnalysis<'_>,
) -> Result<UxDesignOutput, AgentError> {
    let parts = build_parts(screenshots, prior);
    run_vision_agent(ctx, AgentKind::UxDesignAudit, UX_DESIGN_SYSTEM, parts).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::LlmClient;
    use crate::llm::messages::AssistantMessage;
    use crate::llm::scripted::ScriptedBackend;
    use crate::progress::ConsoleProgress;
    use std::sync::Arc;

    fn shot(url: &str, tiles: &[&str]) -> ScreenshotEntry {
        ScreenshotEntry {
            url: url.to_string(),
            tiles: tiles.iter().map(|t| t.to_string()).collect(),
            full_page: String::new(),
        }
    }

    fn texts(parts: &[ContentPart]) -> Vec<String> {
        parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn image_count(parts: &[ContentPart]) -> usize {
        parts
            .iter()
            .filter(|p| p.is_image())
            .count()
    }

    #[test]
    fn test_only_first_tiles_are_sent() {
        let shots = [shot("https://a.test", &["T1", "T2", "T3"]), shot("https://b.test", &["U1"])];
        let parts = build_parts(&shots, &PriorAnalysis::default());

        assert_eq!(image_count(&parts), 3);
        let texts = texts(&parts);
        assert_eq!(texts[0], INTRO);
        assert!(texts.contains(&"[Screenshot: https://a.test] (2 of 3 sections)".to_string()));
        assert!(texts.contains(&"[Section 2/3, y=800px]".to_string()));
        assert!(texts.contains(&"[Screenshot: https://b.test] (1 of 1 sections)".to_string()));
        assert!(!texts.contains(&NO_SCREENSHOTS.to_string()));
    }

    #[test]
    fn test_no_tiles_adds_note() {
        let shots = [shot("https://a.test", &[])];
        let code: CodeAnalysisOutput = serde_json::from_str(
            r#"{"tech_stack": [], "architecture": {}, "summary": "Next app",
                "design_system": {"has_design_system": true, "theming_support": "css vars"}}"#,
        )
        .unwrap();
        let prior = PriorAnalysis {
            code_analysis: Some(&code),
            ..Default::default()
        };
        let parts = build_parts(&shots, &prior);

        assert_eq!(image_count(&parts), 0);
        let texts = texts(&parts);
        assert_eq!(texts.last().unwrap(), NO_SCREENSHOTS);
        assert!(texts[1].starts_with("## Context from prior analysis\n"));
        assert!(texts[1].contains("Code analysis: Next app"));
        assert!(texts[1].contains("Has design system: true, Theming: css vars"));
    }

    #[tokio::test]
    async fn test_audit_sends_one_multimodal_request() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push(
            AgentKind::UxDesignAudit,
            AssistantMessage::text(r#"{"strengths": ["Clean"], "summary": "Solid"}"#),
        );
        let client = LlmClient::new(backend.clone());
        let progress = ConsoleProgress::new();
        let ctx = AgentContext::new(&client, &progress);

        let shots = [shot("https://a.test", &["T1"])];
        let out = run_ux_audit(&ctx, &shots, &PriorAnalysis::default()).await.unwrap();

        assert_eq!(out.summary, "Solid");
        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tools.is_empty());
        assert!(requests[0].messages[1].has_images());
    }
}
