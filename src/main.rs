//! `sea`: site evolution agents.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sea_agents::browser::HttpBrowserFactory;
use sea_agents::config::{AnalysisConfig, LlmSettings};
use sea_agents::llm::{CompletionBackend, DryRunBackend, LlmClient, OpenAiBackend};
use sea_agents::orchestrator::{patch_report, write_feature_evaluation, Orchestrator, REPORT_FILE};
use sea_agents::progress::{ConsoleProgress, StdinPrompt, UserPrompt};
use sea_agents::schemas::pipeline::FinalReport;
use sea_agents::schemas::tech_stack::TechStackAdvisorOutput;

const DEFAULT_CONFIG: &str = "analysis-config.toml";
const DEFAULT_LOG_FILTER: &str = "sea_agents=info,warn";
const VERBOSE_LOG_FILTER: &str = "sea_agents=debug,info";

/// Top recommendations printed after a run
const SUMMARY_RECOMMENDATIONS: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "sea",
    about = "Multi-agent UX and feature recommendations for a website and its codebase",
    version
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate a config, then show what would be analyzed
    Validate(ConfigArgs),
    /// Run the full analysis pipeline
    Analyze(AnalyzeArgs),
    /// Evaluate how to build specific features on the current stack
    Feature(FeatureArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Analysis config (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Use canned agent replies instead of the completion API
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct FeatureArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Feature to evaluate; repeat for several
    #[arg(short = 'n', long = "name", required = true)]
    names: Vec<String>,

    /// Use canned agent replies instead of the completion API
    #[arg(long)]
    dry_run: bool,

    /// Report directory whose report.json gets the new tech stack section
    #[arg(long)]
    patch_report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Validate(args) => validate(&args),
        Commands::Analyze(args) => analyze(args).await,
        Commands::Feature(args) => feature(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn validate(args: &ConfigArgs) -> Result<()> {
    let config = AnalysisConfig::load(&args.config)?;
    println!("Config OK: {}", args.config.display());
    println!("  Site:        {}", config.display_name());
    if config.has_path() {
        println!("  Codebase:    {}", config.target_path);
    }
    if config.has_url() {
        println!("  URL:         {}", config.target_url);
        println!("  Site depth:  {}", config.site_depth);
    }
    println!("  Priorities:  {}", config.priorities.join(", "));
    if !config.competitor_urls.is_empty() {
        println!("  Competitors: {}", config.competitor_urls.join(", "));
    }
    if !config.features.is_empty() {
        println!("  Features:    {}", config.features.join(", "));
    }
    println!("  Output:      {}", config.output_dir().display());
    Ok(())
}

fn backend(dry_run: bool) -> Result<Arc<dyn CompletionBackend>> {
    if dry_run {
        return Ok(Arc::new(DryRunBackend::new()));
    }
    let settings = LlmSettings::from_env()?;
    Ok(Arc::new(OpenAiBackend::new(settings)?))
}

fn orchestrator(dry_run: bool) -> Result<Orchestrator> {
    let prompt: Arc<dyn UserPrompt> = if dry_run {
        Arc::new(StdinPrompt::non_interactive())
    } else {
        Arc::new(StdinPrompt::new())
    };
    let orchestrator = Orchestrator::new(
        LlmClient::new(backend(dry_run)?),
        Arc::new(ConsoleProgress::new()),
        prompt,
        Arc::new(HttpBrowserFactory),
    );
    Ok(if dry_run {
        orchestrator.without_url_check()
    } else {
        orchestrator
    })
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let config = AnalysisConfig::load(&args.config.config)?;
    let out_dir = config.output_dir();
    let report = orchestrator(args.dry_run)?.run(config).await?;
    print_report(&report, &out_dir);
    Ok(())
}

async fn feature(args: FeatureArgs) -> Result<()> {
    let config = AnalysisConfig::load(&args.config.config)?;
    if let Some(dir) = &args.patch_report {
        if !dir.join(REPORT_FILE).is_file() {
            bail!("No {} in {}", REPORT_FILE, dir.display());
        }
    }

    let output = orchestrator(args.dry_run)?
        .evaluate_features(&config, &args.names)
        .await?;
    let path = write_feature_evaluation(&output, &config.output_dir())?;
    print_features(&output, &path);

    if let Some(dir) = &args.patch_report {
        let patched = patch_report(dir, &output)?;
        println!("Updated {}", patched.display());
    }
    Ok(())
}

fn print_report(report: &FinalReport, out_dir: &Path) {
    println!();
    println!("Analysis of {}", report.config.display_name());
    if let Some(recs) = &report.recommendations {
        println!("Top recommendations:");
        for rec in recs.recommendations.iter().take(SUMMARY_RECOMMENDATIONS) {
            let parity = if rec.parity_gap { " [parity]" } else { "" };
            println!("  {} {} ({}){}", rec.id, rec.title, rec.category, parity);
        }
    }
    if !report.failed_phases.is_empty() {
        println!("Failed phases:");
        for failed in &report.failed_phases {
            println!("  {}: {}", failed.phase, failed.error);
        }
    }
    let (input, output) = report
        .token_usage
        .values()
        .fold((0, 0), |(i, o), u| (i + u.input_tokens, o + u.output_tokens));
    println!("Tokens: {} in, {} out", input, output);
    println!("Report written to {}", out_dir.display());
}

fn print_features(output: &TechStackAdvisorOutput, path: &Path) {
    println!();
    for feature in &output.features {
        let approach = if feature.recommended_approach.is_empty() {
            "simple"
        } else {
            feature.recommended_approach.as_str()
        };
        println!("{}", feature.feature_name);
        println!("  Recommended: {}", approach);
        println!("  Simple: {}", feature.simple_approach.description);
        if !feature.simple_approach.effort_estimate.is_empty() {
            println!("  Effort: {}", feature.simple_approach.effort_estimate);
        }
        if let Some(comprehensive) = &feature.comprehensive_approach {
            println!("  Comprehensive: {}", comprehensive.description);
        }
        if !feature.parity_source.is_empty() {
            println!("  Shipped by: {}", feature.parity_source.join(", "));
        }
    }
    println!("{}", output.summary);
    println!("Written to {}", path.display());
}
