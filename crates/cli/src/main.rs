//! devloop CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `.devloop/config.json` (or `--config`),
//!    validate it, and read secrets from the environment.
//! 2. **Wire observability**: install the `tracing-subscriber` registry, with
//!    an OpenTelemetry OTLP exporter when one is configured.
//! 3. **Construct infrastructure**: the PostgREST backlog store, the Anthropic
//!    provider, the file artifact, the git repository, and the report store,
//!    injected into the agents through an [`AgentContext`].
//! 4. **Dispatch**: run the orchestrator or a single agent.
//!
//! Only startup failures produce a non-zero exit status. Item and cycle
//! failures are reported in the printed summary and the report files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agents::{
    AgentContext, Implementer, ItemOutcome, LlmGateway, Orchestrator, Planner, PlannerOutcome,
    ReviewOutcome, Reviewer,
};
use anyhow::Context;
use backlog::PostgrestBacklogStore;
use clap::{Parser, Subcommand};
use llm::AnthropicProvider;
use pipeline::{CycleResult, PipelineConfig, WorkItemId};
use repo::{FileArtifact, GitRepository, JsonReportStore};

mod settings;
mod telemetry;

use settings::{load_config, Secrets};
use telemetry::{LogFormat, Telemetry};

#[derive(Debug, Parser)]
#[command(name = "devloop", version, about = "Autonomous implement/review/plan loop over a backlog")]
struct Cli {
    /// Configuration file, relative to the project root unless absolute.
    #[arg(long, default_value = ".devloop/config.json")]
    config: PathBuf,

    /// Project root: the git working tree holding the artifact.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "DEVLOOP_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a full session: implement/review cycles, then planning.
    Run,
    /// Implement the highest-priority open items without reviewing them.
    Implement {
        /// Number of items to process (defaults to `workflow.implementer_batch`).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Review the most recent artifact change for one item.
    Review {
        #[arg(value_name = "ITEM_ID")]
        item_id: String,
    },
    /// Run a single planning pass.
    Plan,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = Telemetry::init(cli.log_format)?;
    let result = run(cli).await;
    telemetry.shutdown();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = resolve(&cli.root, &cli.config);
    let config = load_config(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let secrets = Secrets::from_env()?;
    let ctx = build_context(&cli.root, config, &secrets)?;

    match cli.command {
        Command::Run => run_session(ctx).await,
        Command::Implement { limit } => {
            let limit = limit.unwrap_or(ctx.config.workflow.implementer_batch);
            run_implementer(ctx, limit).await
        }
        Command::Review { item_id } => {
            let id = WorkItemId::new(item_id).context("parsing ITEM_ID")?;
            run_reviewer(ctx, &id).await
        }
        Command::Plan => run_planner(ctx).await,
    }
    Ok(())
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn build_context(
    root: &Path,
    config: PipelineConfig,
    secrets: &Secrets,
) -> anyhow::Result<AgentContext> {
    let store = PostgrestBacklogStore::new(
        &secrets.supabase_url,
        secrets.supabase_key.clone(),
        &config.store.table,
    )?
    .with_vocabulary(config.store.vocabulary);
    let provider = AnthropicProvider::new(secrets.anthropic_api_key.clone())?;
    let artifact = FileArtifact::new(resolve(root, Path::new(&config.artifact)));
    let vcs = GitRepository::open(root, &config.artifact)
        .with_context(|| format!("opening the git repository at {}", root.display()))?;
    let reports = JsonReportStore::new(resolve(root, Path::new(&config.reports_dir)));

    tracing::info!(
        artifact = %artifact.path().display(),
        reports = %reports.dir().display(),
        table = %config.store.table,
        "adapters ready"
    );

    Ok(AgentContext {
        store: Arc::new(store),
        artifact: Arc::new(artifact),
        vcs: Arc::new(vcs),
        reports: Arc::new(reports),
        gateway: Arc::new(LlmGateway::new(Arc::new(provider))),
        config: Arc::new(config),
    })
}

async fn run_session(ctx: AgentContext) {
    let outcome = Orchestrator::new(ctx).run().await;
    let report = &outcome.report;

    println!("Session {}", report.session_id);
    println!(
        "  cycles: {} total, {} successful, {} failed, {} needing revision",
        report.total_cycles,
        report.successful_cycles,
        report.failed_cycles,
        report.needs_revision_cycles
    );
    for cycle in &report.cycles {
        let verdict = match &cycle.result {
            CycleResult::Completed => "completed".to_string(),
            CycleResult::NeedsRevision => "needs revision".to_string(),
            CycleResult::Failed { phase, reason } => format!("failed ({phase:?}): {reason}"),
        };
        let subject = cycle
            .item
            .as_ref()
            .map(|item| format!("{} [{}]", item.title, item.id))
            .unwrap_or_else(|| "no item".to_string());
        match cycle.review_score {
            Some(score) => println!("  #{} {subject} {verdict}, score {score}", cycle.cycle),
            None => println!("  #{} {subject} {verdict}", cycle.cycle),
        }
    }
    let implemented: Vec<String> = report
        .implemented()
        .filter_map(|cycle| {
            let item = cycle.item.as_ref()?;
            Some(match cycle.review_score {
                Some(score) => format!("{} ({score})", item.id),
                None => item.id.to_string(),
            })
        })
        .collect();
    if !implemented.is_empty() {
        println!("  implemented: {}", implemented.join(", "));
    }
    if let Some(planner) = &report.planner {
        if planner.success {
            println!("  planner: {} new items", planner.created.len());
        } else {
            println!(
                "  planner failed: {}",
                planner.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!(
        "  tokens: {} calls, {} in, {} out",
        report.token_usage.calls, report.token_usage.input_tokens, report.token_usage.output_tokens
    );
    match &outcome.location {
        Some(location) => println!("  report: {location}"),
        None => println!("  report: not saved"),
    }
}

async fn run_implementer(ctx: AgentContext, limit: usize) {
    let results = match Implementer::new(ctx).run(limit).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(error = %e, "could not fetch work items");
            println!("Implementer: backlog unavailable: {e}");
            return;
        }
    };
    if results.is_empty() {
        println!("Implementer: no pending work items");
        return;
    }
    let succeeded = results.iter().filter(|r| r.outcome.is_success()).count();
    println!("Implementer: {succeeded}/{} items implemented", results.len());
    for result in &results {
        match &result.outcome {
            ItemOutcome::Implemented { commit, .. } => println!(
                "  {} [{}] awaiting review{}",
                result.item.title,
                result.item.id,
                commit
                    .as_ref()
                    .map(|sha| format!(", commit {sha}"))
                    .unwrap_or_default()
            ),
            ItemOutcome::Failed { reason } => {
                println!("  {} [{}] failed: {reason}", result.item.title, result.item.id)
            }
        }
    }
}

async fn run_reviewer(ctx: AgentContext, id: &WorkItemId) {
    match Reviewer::new(ctx).run(id).await {
        ReviewOutcome::Reviewed {
            report, location, ..
        } => {
            let verdict = if report.approved { "approved" } else { "rejected" };
            println!("Review of {id}: {verdict}, score {}", report.score);
            for issue in &report.issues {
                println!("  [{}] {}", issue.severity, issue.description);
            }
            println!("  report: {location}");
        }
        ReviewOutcome::Failed { reason } => println!("Review of {id} failed: {reason}"),
    }
}

async fn run_planner(ctx: AgentContext) {
    match Planner::new(ctx).run().await {
        PlannerOutcome::Planned {
            insights,
            created,
            adjustments_applied,
            location,
        } => {
            println!(
                "Planner: {} new items, {adjustments_applied} priority adjustments",
                created.len()
            );
            for item in &created {
                println!("  + {} [{}] {}", item.title, item.id, item.priority.as_str());
            }
            println!("  recommendations: {}", insights.recommendations);
            if let Some(location) = location {
                println!("  report: {location}");
            }
        }
        PlannerOutcome::Failed { reason } => println!("Planner failed: {reason}"),
    }
}
