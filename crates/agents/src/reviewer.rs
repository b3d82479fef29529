//! Reviewer: grades the latest artifact change and settles the item's status.
//!
//! The report is persisted before the status is touched, so every status
//! change the Reviewer makes has a report behind it. Any failure before that
//! point leaves the item exactly as it was.

use pipeline::{
    AgentError, Change, Progress, ReportLocation, ReviewAssessment, ReviewReport, StaticCheck,
    StaticCheckSummary, VcsError, WorkItem, WorkItemId, WorkItemPatch, WorkStatus,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::prompts;
use crate::AgentContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Reviewed {
        report: ReviewReport,
        location: ReportLocation,
        item: WorkItem,
    },
    Failed { reason: String },
}

impl ReviewOutcome {
    pub fn report(&self) -> Option<&ReviewReport> {
        match self {
            ReviewOutcome::Reviewed { report, .. } => Some(report),
            ReviewOutcome::Failed { .. } => None,
        }
    }
}

pub struct Reviewer {
    ctx: AgentContext,
}

impl Reviewer {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// The newest commit touching the artifact; `VcsError::NoCommit` means
    /// there is nothing to review.
    pub async fn get_last_change(&self) -> Result<Change, AgentError> {
        Ok(self.ctx.vcs.last_change().await?)
    }

    /// Structural presence checks against `content`. Never gates approval.
    pub fn run_static_checks(&self, content: &str) -> StaticCheckSummary {
        let checks = self
            .ctx
            .config
            .review
            .static_checks
            .iter()
            .map(|spec| StaticCheck {
                name: spec.name.clone(),
                passed: content.contains(&spec.marker),
            })
            .collect();
        StaticCheckSummary::from_checks(checks)
    }

    #[instrument(skip_all, fields(item_id = %item.id, sha = %change.sha))]
    pub async fn review(&self, item: &WorkItem, change: &Change) -> Result<ReviewReport, AgentError> {
        let current = self.ctx.artifact.read().await?;
        let prompt = prompts::review(item, change, &self.ctx.artifact.location(), &current);
        let assessment: ReviewAssessment = self
            .ctx
            .gateway
            .request_json(
                prompts::REVIEWER_SYSTEM,
                prompt,
                &self.ctx.config.agents.reviewer,
            )
            .await?;
        let checks = self.run_static_checks(&current);
        info!(
            approved = assessment.approved,
            score = assessment.score.as_u8(),
            issues = assessment.issues.len(),
            critical = assessment.critical_issues(),
            static_passed = checks.passed,
            static_total = checks.total,
            "review complete"
        );
        Ok(ReviewReport::new(item, assessment, Some(checks)))
    }

    /// Completed when approved, otherwise back to InProgress for another pass.
    ///
    /// Depends only on the report, so applying it twice lands on the same status.
    pub async fn apply_outcome(
        &self,
        id: &WorkItemId,
        report: &ReviewReport,
    ) -> Result<WorkItem, AgentError> {
        let patch = if report.approved {
            WorkItemPatch::status(WorkStatus::Completed, Progress::DONE)
        } else {
            WorkItemPatch::status(WorkStatus::InProgress, Progress::STARTED)
        };
        let item = self.ctx.store.update(id, &patch).await?;
        info!(item_id = %id, status = %item.status, "review outcome applied");
        Ok(item)
    }

    pub async fn persist_report(&self, report: &ReviewReport) -> Result<ReportLocation, AgentError> {
        let location = self.ctx.reports.save_review(report).await?;
        info!(item_id = %report.item_id, report = %location, "review report saved");
        Ok(location)
    }

    async fn try_run(&self, id: &WorkItemId) -> Result<ReviewOutcome, AgentError> {
        let item = self.ctx.store.get(id).await?;
        let change = self.get_last_change().await?;
        let report = self.review(&item, &change).await?;
        let location = self.persist_report(&report).await?;
        let item = self.apply_outcome(id, &report).await?;
        Ok(ReviewOutcome::Reviewed {
            report,
            location,
            item,
        })
    }

    /// Reviews the latest change on behalf of item `id`.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn run(&self, id: &WorkItemId) -> ReviewOutcome {
        match self.try_run(id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, AgentError::Vcs(VcsError::NoCommit { .. })) {
                    warn!(error = %e, "nothing to review");
                } else {
                    error!(error = %e, "review failed");
                }
                ReviewOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
