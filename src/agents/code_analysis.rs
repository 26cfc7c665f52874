//! Codebase exploration tools and the code analysis agent.

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use super::prompts::CODE_ANALYSIS_SYSTEM;
use super::{run_tool_agent, AgentContext, AgentKind};
use crate::codebase::CodebaseReader;
use crate::error::{AgentError, ToolError};
use crate::llm::tools::{
    empty_schema, single_string_schema, str_arg, ToolHandler, ToolKind, ToolOutput, ToolSpec,
};
use crate::schemas::code_analysis::CodeAnalysisOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTool {
    ListDir,
    ReadFile,
    SearchCode,
    GetTree,
    ReadManifest,
}

/// Read-only subset offered to the feasibility and tech stack agents.
pub const READ_AND_SEARCH: &[CodeTool] = &[CodeTool::ReadFile, CodeTool::SearchCode];

impl ToolKind for CodeTool {
    const ALL: &'static [Self] = &[
        CodeTool::ListDir,
        CodeTool::ReadFile,
        CodeTool::SearchCode,
        CodeTool::GetTree,
        CodeTool::ReadManifest,
    ];

    fn name(self) -> &'static str {
        match self {
            CodeTool::ListDir => "list_dir",
            CodeTool::ReadFile => "read_file",
            CodeTool::SearchCode => "search_code",
            CodeTool::GetTree => "get_tree",
            CodeTool::ReadManifest => "read_manifest",
        }
    }

    fn spec(self) -> ToolSpec {
        let (description, input_schema) = match self {
            CodeTool::ListDir => (
                "List the contents of a directory in the codebase. Returns file and directory names.",
                single_string_schema(
                    "path",
                    "Relative path from the codebase root. Use '.' for the root directory.",
                ),
            ),
            CodeTool::ReadFile => (
                "Read the contents of a file in the codebase.",
                single_string_schema("path", "Relative path to the file from the codebase root."),
            ),
            CodeTool::SearchCode => (
                "Search across all files in the codebase for a regex pattern. Returns matching lines with file paths and line numbers.",
                single_string_schema("pattern", "Regex pattern to search for (case-insensitive)."),
            ),
            CodeTool::GetTree => (
                "Get an indented directory tree of the codebase (up to 3 levels deep).",
                empty_schema(),
            ),
            CodeTool::ReadManifest => (
                "Read the project manifest file (package.json, pyproject.toml, etc.).",
                empty_schema(),
            ),
        };
        ToolSpec {
            name: self.name(),
            description,
            input_schema,
        }
    }
}

/// Dispatches codebase tools against one reader.
pub struct CodebaseTools<'a> {
    reader: &'a CodebaseReader,
    offered: &'static [CodeTool],
}

impl<'a> CodebaseTools<'a> {
    pub fn all(reader: &'a CodebaseReader) -> Self {
        Self {
            reader,
            offered: CodeTool::ALL,
        }
    }

    pub fn read_and_search(reader: &'a CodebaseReader) -> Self {
        Self {
            reader,
            offered: READ_AND_SEARCH,
        }
    }

    fn dispatch(&self, tool: CodeTool, args: &Value) -> Result<String, ToolError> {
        let name = tool.name();
        let text = match tool {
            // A missing path lists the root
            CodeTool::ListDir => {
                let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
                self.reader.list_directory(path).join("\n")
            }
            CodeTool::ReadFile => self.reader.read_file(str_arg(name, args, "path")?),
            CodeTool::SearchCode => self.reader.search_code_text(str_arg(name, args, "pattern")?),
            CodeTool::GetTree => self.reader.get_tree(),
            CodeTool::ReadManifest => self.reader.read_manifest(),
        };
        Ok(text)
    }
}

impl ToolHandler for CodebaseTools<'_> {
    fn specs(&self) -> Vec<ToolSpec> {
        self.offered.iter().map(|t| t.spec()).collect()
    }

    fn call<'b>(
        &'b self,
        name: &'b str,
        args: &'b Value,
    ) -> BoxFuture<'b, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let tool = CodeTool::parse(name)?;
            if !self.offered.contains(&tool) {
                return Err(ToolError::UnknownTool(name.to_string()));
            }
            debug!(tool = name, "Codebase tool");
            self.dispatch(tool, args).map(ToolOutput::Text)
        })
    }
}

pub fn analysis_brief(priorities: &[String]) -> String {
    format!(
        "Analyze the codebase at the root directory. The user's priorities are: {}",
        priorities.join(", ")
    )
}

pub async fn run_code_analysis(
    ctx: &AgentContext<'_>,
    reader: &CodebaseReader,
    priorities: &[String],
) -> Result<CodeAnalysisOutput, AgentError> {
    let tools = CodebaseTools::all(reader);
    run_tool_agent(
        ctx,
        AgentKind::CodeAnalysis,
        CODE_ANALYSIS_SYSTEM,
        &analysis_brief(priorities),
        Some(&tools),
    )
    .await
}
