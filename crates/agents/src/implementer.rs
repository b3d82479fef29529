//! Implementer: picks the most urgent open item and rewrites the artifact for it.
//!
//! Per-item status machine:
//!
//! ```text
//! Pending/InProgress ──► InProgress(0) ──analyze──► implement ──► [commit] ──► InProgress(80)
//!                              │              │            │
//!                              └── any failure leaves the item at InProgress(0)
//! ```
//!
//! The status flip happens before any completion call so an interrupted run
//! never leaves an item silently Pending.

use pipeline::{
    extract_delimited_body, AgentError, AnalysisResult, CommitSha, ListQuery, Progress,
    WorkItem, WorkItemPatch, WorkStatus,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::prompts::{self, IMPLEMENTATION_MARKER};
use crate::AgentContext;

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The artifact was rewritten and the item awaits review.
    Implemented {
        analysis: AnalysisResult,
        commit: Option<CommitSha>,
    },
    /// The item was left in its last persisted state.
    Failed { reason: String },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Implemented { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    /// The row as last persisted: the awaiting-review row on success, the
    /// fetched row on failure.
    pub item: WorkItem,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

pub struct Implementer {
    ctx: AgentContext,
}

impl Implementer {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Open items, most urgent first, oldest first within a priority.
    pub async fn fetch_next(&self, limit: usize) -> Result<Vec<WorkItem>, AgentError> {
        let query = ListQuery::open_by_priority().with_limit(limit);
        Ok(self.ctx.store.list(&query).await?)
    }

    #[instrument(skip_all, fields(item_id = %item.id))]
    pub async fn analyze(&self, item: &WorkItem) -> Result<AnalysisResult, AgentError> {
        let prompt = prompts::analysis(item, &self.ctx.artifact.location());
        let analysis: AnalysisResult = self
            .ctx
            .gateway
            .request_json(
                prompts::ANALYST_SYSTEM,
                prompt,
                &self.ctx.config.agents.implementer,
            )
            .await?;
        info!(
            complexity = %analysis.complexity,
            files = ?analysis.files_to_modify,
            ready = analysis.ready_to_implement,
            "analysis complete"
        );
        Ok(analysis)
    }

    /// Rewrites the artifact from the completion response.
    ///
    /// The live artifact is untouched unless a non-empty body follows the
    /// marker; the previous content is backed up before the overwrite.
    #[instrument(skip_all, fields(item_id = %item.id))]
    pub async fn implement(
        &self,
        item: &WorkItem,
        analysis: &AnalysisResult,
    ) -> Result<(), AgentError> {
        let current = self.ctx.artifact.read().await?;
        let prompt = prompts::implementation(
            item,
            analysis,
            &self.ctx.artifact.location(),
            &current,
        );
        let response = self
            .ctx
            .gateway
            .request_text(
                prompts::IMPLEMENTER_SYSTEM,
                prompt,
                &self.ctx.config.agents.implementer,
            )
            .await?;
        let body = extract_delimited_body(&response, IMPLEMENTATION_MARKER).ok_or_else(|| {
            AgentError::Implementation {
                reason: format!("response has no body after `{IMPLEMENTATION_MARKER}`"),
            }
        })?;
        self.ctx.artifact.replace(&body).await?;
        info!(bytes = body.len(), "artifact rewritten");
        Ok(())
    }

    /// Commits the artifact when auto-commit is enabled.
    ///
    /// Failures are logged and swallowed; they never fail the item.
    pub async fn commit(&self, item: &WorkItem, analysis: &AnalysisResult) -> Option<CommitSha> {
        if !self.ctx.config.workflow.auto_commit {
            info!("auto-commit disabled; skipping commit");
            return None;
        }
        let message = prompts::commit_message(item, analysis);
        match self.ctx.vcs.commit_artifact(&message).await {
            Ok(sha) => Some(sha),
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "commit failed; continuing");
                None
            }
        }
    }

    async fn set_status(
        &self,
        item: &WorkItem,
        status: WorkStatus,
        progress: Progress,
    ) -> Result<WorkItem, AgentError> {
        let patch = WorkItemPatch::status(status, progress);
        Ok(self.ctx.store.update(&item.id, &patch).await?)
    }

    async fn try_process(
        &self,
        item: &WorkItem,
    ) -> Result<(WorkItem, AnalysisResult, Option<CommitSha>), AgentError> {
        self.set_status(item, WorkStatus::InProgress, Progress::STARTED)
            .await?;
        let analysis = self.analyze(item).await?;
        if !analysis.ready_to_implement {
            return Err(AgentError::NotReady {
                id: item.id.clone(),
            });
        }
        self.implement(item, &analysis).await?;
        let commit = self.commit(item, &analysis).await;
        let updated = self
            .set_status(item, WorkStatus::InProgress, Progress::AWAITING_REVIEW)
            .await?;
        Ok((updated, analysis, commit))
    }

    #[instrument(skip_all, fields(item_id = %item.id, title = %item.title))]
    pub async fn process_item(&self, item: WorkItem) -> ItemResult {
        match self.try_process(&item).await {
            Ok((updated, analysis, commit)) => {
                info!("item implemented; awaiting review");
                ItemResult {
                    item: updated,
                    outcome: ItemOutcome::Implemented { analysis, commit },
                }
            }
            Err(e) => {
                error!(error = %e, "implementation failed");
                ItemResult {
                    item,
                    outcome: ItemOutcome::Failed {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    /// Processes up to `limit` open items, one after another.
    ///
    /// A failing item does not stop the rest. Only a failure to list the
    /// backlog is returned as an error, since there is no item to attach it to.
    #[instrument(skip(self))]
    pub async fn run(&self, limit: usize) -> Result<Vec<ItemResult>, AgentError> {
        let items = self.fetch_next(limit).await?;
        info!(count = items.len(), "open items fetched");
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.process_item(item).await);
        }
        Ok(results)
    }
}
