//! Planner: replenishes and re-prioritises the backlog from its history.

use std::collections::BTreeMap;

use pipeline::{
    AgentError, BacklogStats, FeatureProposal, Insights, ListQuery, NewWorkItem, PlannerReport,
    PriorityAdjustment, Progress, ReportLocation, ReviewReport, Timestamp, WorkItem, WorkItemId,
    WorkItemPatch, WorkStatus,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::prompts;
use crate::AgentContext;

/// Backlog health figures. Empty input yields all-zero stats.
///
/// `completed` is the set of finished items, `all` the whole backlog, and
/// `reports` the review history the mean score is taken over.
pub fn aggregate_stats(
    completed: &[WorkItem],
    all: &[WorkItem],
    reports: &[ReviewReport],
) -> BacklogStats {
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_priority: BTreeMap<String, usize> = BTreeMap::new();
    let (mut pending, mut in_progress) = (0, 0);
    for item in all {
        *by_category.entry(item.category.clone()).or_default() += 1;
        *by_priority
            .entry(item.priority.as_str().to_string())
            .or_default() += 1;
        match item.status {
            WorkStatus::Pending => pending += 1,
            WorkStatus::InProgress => in_progress += 1,
            WorkStatus::Completed => {}
        }
    }

    let total = all.len();
    let completion_ratio = if total == 0 {
        0.0
    } else {
        completed.len() as f64 / total as f64
    };
    let mean_review_score = if reports.is_empty() {
        0
    } else {
        let sum: u32 = reports.iter().map(|r| u32::from(r.score.as_u8())).sum();
        (f64::from(sum) / reports.len() as f64).round() as u8
    };

    BacklogStats {
        total,
        completed: completed.len(),
        in_progress,
        pending,
        by_category,
        by_priority,
        completion_ratio,
        mean_review_score,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlannerOutcome {
    Planned {
        insights: Insights,
        created: Vec<WorkItem>,
        adjustments_applied: usize,
        /// `None` when the report could not be written.
        location: Option<ReportLocation>,
    },
    Failed { reason: String },
}

pub struct Planner {
    ctx: AgentContext,
}

impl Planner {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip_all, fields(total = stats.total))]
    pub async fn propose_insights(
        &self,
        stats: &BacklogStats,
        recent_completed: &[WorkItem],
        recent_reports: &[ReviewReport],
        open_items: &[WorkItem],
        artifact_excerpt: &str,
    ) -> Result<Insights, AgentError> {
        let prompt = prompts::insights(
            stats,
            recent_completed,
            recent_reports,
            open_items,
            artifact_excerpt,
        );
        let insights: Insights = self
            .ctx
            .gateway
            .request_json(prompts::PLANNER_SYSTEM, prompt, &self.ctx.config.agents.planner)
            .await?;
        info!(
            proposals = insights.new_features.len(),
            adjustments = insights.priority_adjustments.len(),
            "insights received"
        );
        Ok(insights)
    }

    /// Inserts one Pending item per proposal. Failed inserts are skipped.
    pub async fn materialize(&self, features: &[FeatureProposal]) -> Vec<WorkItem> {
        let mut created = Vec::with_capacity(features.len());
        for feature in features {
            let now = Timestamp::now();
            let item = NewWorkItem {
                id: WorkItemId::generate(),
                title: feature.title.clone(),
                category: feature.category.clone(),
                description: Some(feature.description.clone()),
                priority: feature.priority,
                quarter: Some(feature.quarter.clone()).filter(|q| !q.trim().is_empty()),
                status: WorkStatus::Pending,
                progress: Progress::STARTED,
                responsible: Some(self.ctx.config.planner.default_responsible.clone()),
                deadline: None,
                subtasks: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            match self.ctx.store.insert(item).await {
                Ok(stored) => {
                    info!(item_id = %stored.id, title = %stored.title, "backlog item created");
                    created.push(stored);
                }
                Err(e) => warn!(title = %feature.title, error = %e, "could not create backlog item"),
            }
        }
        created
    }

    /// Updates the priority of every referenced item that exists in `all`.
    /// Returns how many updates were applied.
    pub async fn apply_priority_adjustments(
        &self,
        adjustments: &[PriorityAdjustment],
        all: &[WorkItem],
    ) -> usize {
        let mut applied = 0;
        for adjustment in adjustments {
            let Some(item) = all.iter().find(|i| i.id == adjustment.item_id) else {
                warn!(item_id = %adjustment.item_id, "priority adjustment for unknown item skipped");
                continue;
            };
            let patch = WorkItemPatch::priority(adjustment.suggested_priority);
            match self.ctx.store.update(&item.id, &patch).await {
                Ok(_) => {
                    info!(
                        item_id = %item.id,
                        from = %item.priority,
                        to = %adjustment.suggested_priority,
                        "priority adjusted"
                    );
                    applied += 1;
                }
                Err(e) => warn!(item_id = %item.id, error = %e, "priority adjustment failed"),
            }
        }
        applied
    }

    async fn try_run(&self) -> Result<PlannerOutcome, AgentError> {
        let settings = &self.ctx.config.planner;
        let all = self.ctx.store.list(&ListQuery::all_newest_first()).await?;
        let recent_completed = self
            .ctx
            .store
            .list(&ListQuery::recently_completed(settings.completed_window))
            .await?;
        let reports = self.ctx.reports.load_reviews().await.unwrap_or_else(|e| {
            warn!(error = %e, "review history unavailable");
            Vec::new()
        });
        let current = self.ctx.artifact.read().await?;

        let completed: Vec<WorkItem> = all
            .iter()
            .filter(|i| i.status == WorkStatus::Completed)
            .cloned()
            .collect();
        let open: Vec<WorkItem> = all.iter().filter(|i| i.status.is_open()).cloned().collect();
        let stats = aggregate_stats(&completed, &all, &reports);

        let recent_window = settings.recent_completed.min(recent_completed.len());
        let report_window = settings.recent_reports.min(reports.len());
        let insights = self
            .propose_insights(
                &stats,
                &recent_completed[..recent_window],
                &reports[..report_window],
                &open,
                &prompts::excerpt(&current, settings.excerpt_chars),
            )
            .await?;

        let created = self.materialize(&insights.new_features).await;
        let adjustments_applied = self
            .apply_priority_adjustments(&insights.priority_adjustments, &all)
            .await;

        let report = PlannerReport {
            timestamp: Timestamp::now(),
            stats,
            analysis: insights.analysis.clone(),
            new_features: created.iter().map(WorkItem::summary).collect(),
            priority_adjustments_applied: adjustments_applied,
            recommendations: insights.recommendations.clone(),
        };
        let location = match self.ctx.reports.save_planner(&report).await {
            Ok(location) => Some(location),
            Err(e) => {
                warn!(error = %e, "planner report could not be saved");
                None
            }
        };

        Ok(PlannerOutcome::Planned {
            insights,
            created,
            adjustments_applied,
            location,
        })
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> PlannerOutcome {
        match self.try_run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "planning pass failed");
                PlannerOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
