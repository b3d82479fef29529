//! Orchestrator: drives a session of sequential Implement → Review cycles,
//! an optional planning pass, and the session report.
//!
//! Cycles never overlap; each one reads the store state the previous one
//! committed. A cycle that finds no open item ends the session early.

use std::time::Duration;

use pipeline::{
    CycleOutcome, CyclePhase, CycleResult, EventLevel, PlannerSummary, Progress, ReportLocation,
    SessionId, SessionReport, WorkItemPatch, WorkStatus,
};
use tracing::{error, info, instrument, warn, Instrument};

use crate::implementer::{ItemOutcome, Implementer};
use crate::planner::{Planner, PlannerOutcome};
use crate::reviewer::{ReviewOutcome, Reviewer};
use crate::AgentContext;

/// A finished session: the report and where it was written.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub report: SessionReport,
    /// `None` when the report could not be written.
    pub location: Option<ReportLocation>,
}

enum CycleStep {
    /// A cycle ran against an item.
    Ran(CycleOutcome),
    /// No open item; the session ends.
    NoWork,
}

/// Appends to the session log and mirrors the event to tracing.
fn narrate(session: &mut SessionReport, level: EventLevel, message: impl Into<String>) {
    let message = message.into();
    match level {
        EventLevel::Info | EventLevel::Success => info!(level = ?level, "{message}"),
        EventLevel::Warning => warn!("{message}"),
        EventLevel::Error => error!("{message}"),
    }
    session.record_event(level, message);
}

pub struct Orchestrator {
    ctx: AgentContext,
    implementer: Implementer,
    reviewer: Reviewer,
    planner: Planner,
}

impl Orchestrator {
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            implementer: Implementer::new(ctx.clone()),
            reviewer: Reviewer::new(ctx.clone()),
            planner: Planner::new(ctx.clone()),
            ctx,
        }
    }

    async fn cycle(&self, number: u32, session: &mut SessionReport) -> CycleStep {
        narrate(session, EventLevel::Info, format!("Starting cycle {number}"));

        let results = match self.implementer.run(1).await {
            Ok(results) => results,
            Err(e) => {
                let reason = e.to_string();
                narrate(
                    session,
                    EventLevel::Error,
                    format!("Backlog unavailable: {reason}"),
                );
                return CycleStep::Ran(CycleOutcome {
                    cycle: number,
                    item: None,
                    result: CycleResult::Failed {
                        phase: CyclePhase::Fetch,
                        reason,
                    },
                    review_score: None,
                });
            }
        };
        let Some(result) = results.into_iter().next() else {
            narrate(session, EventLevel::Warning, "No pending work items found");
            return CycleStep::NoWork;
        };
        let item = result.item.summary();

        if let ItemOutcome::Failed { reason } = result.outcome {
            narrate(
                session,
                EventLevel::Error,
                format!("Implementation of '{}' failed: {reason}", item.title),
            );
            return CycleStep::Ran(CycleOutcome {
                cycle: number,
                item: Some(item),
                result: CycleResult::Failed {
                    phase: CyclePhase::Implement,
                    reason,
                },
                review_score: None,
            });
        }
        narrate(
            session,
            EventLevel::Success,
            format!("Implemented '{}'", item.title),
        );

        if !self.ctx.config.workflow.require_review_approval {
            let patch = WorkItemPatch::status(WorkStatus::Completed, Progress::DONE);
            let result = match self.ctx.store.update(&item.id, &patch).await {
                Ok(_) => {
                    narrate(
                        session,
                        EventLevel::Success,
                        format!("Marked '{}' completed without review", item.title),
                    );
                    CycleResult::Completed
                }
                Err(e) => {
                    let reason = e.to_string();
                    narrate(
                        session,
                        EventLevel::Error,
                        format!("Could not complete '{}': {reason}", item.title),
                    );
                    CycleResult::Failed {
                        phase: CyclePhase::Complete,
                        reason,
                    }
                }
            };
            return CycleStep::Ran(CycleOutcome {
                cycle: number,
                item: Some(item),
                result,
                review_score: None,
            });
        }

        let (result, review_score) = match self.reviewer.run(&item.id).await {
            ReviewOutcome::Failed { reason } => {
                narrate(
                    session,
                    EventLevel::Error,
                    format!("Review of '{}' failed: {reason}", item.title),
                );
                (
                    CycleResult::Failed {
                        phase: CyclePhase::Review,
                        reason,
                    },
                    None,
                )
            }
            ReviewOutcome::Reviewed { report, .. } if report.approved => {
                narrate(
                    session,
                    EventLevel::Success,
                    format!("Review approved '{}' with score {}", item.title, report.score),
                );
                (CycleResult::Completed, Some(report.score))
            }
            ReviewOutcome::Reviewed { report, .. } => {
                narrate(
                    session,
                    EventLevel::Warning,
                    format!(
                        "Review rejected '{}' with score {} ({} issues)",
                        item.title,
                        report.score,
                        report.issues.len()
                    ),
                );
                (CycleResult::NeedsRevision, Some(report.score))
            }
        };
        CycleStep::Ran(CycleOutcome {
            cycle: number,
            item: Some(item),
            result,
            review_score,
        })
    }

    async fn plan(&self, session: &mut SessionReport) {
        narrate(session, EventLevel::Info, "Running planning pass");
        let summary = match self.planner.run().await {
            PlannerOutcome::Planned {
                insights, created, ..
            } => {
                narrate(
                    session,
                    EventLevel::Success,
                    format!("Planner created {} new items", created.len()),
                );
                narrate(
                    session,
                    EventLevel::Info,
                    format!("Planner recommendations: {}", insights.recommendations),
                );
                PlannerSummary {
                    success: true,
                    created: created.iter().map(|i| i.summary()).collect(),
                    recommendations: Some(insights.recommendations),
                    error: None,
                }
            }
            PlannerOutcome::Failed { reason } => {
                narrate(
                    session,
                    EventLevel::Error,
                    format!("Planning pass failed: {reason}"),
                );
                PlannerSummary {
                    success: false,
                    created: Vec::new(),
                    recommendations: None,
                    error: Some(reason),
                }
            }
        };
        session.planner = Some(summary);
    }

    /// Runs one session and persists its report exactly once.
    ///
    /// Never fails: per-item and per-cycle failures are recorded in the report.
    #[instrument(skip(self), fields(session_id = tracing::field::Empty))]
    pub async fn run(&self) -> SessionOutcome {
        let session_id = SessionId::new_random();
        tracing::Span::current().record("session_id", tracing::field::display(session_id));
        let workflow = &self.ctx.config.workflow;
        let mut session = SessionReport::start(session_id);
        narrate(
            &mut session,
            EventLevel::Info,
            format!("Session {session_id} started ({} cycles)", workflow.cycles),
        );

        for number in 1..=workflow.cycles {
            if number > 1 && workflow.cycle_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(workflow.cycle_delay_ms)).await;
            }
            let span = tracing::info_span!("cycle", cycle = number);
            match self.cycle(number, &mut session).instrument(span).await {
                CycleStep::Ran(outcome) => session.record_cycle(outcome),
                CycleStep::NoWork => {
                    let completed = session.cycles.len();
                    narrate(
                        &mut session,
                        EventLevel::Info,
                        format!("Ending session early after {completed} cycles"),
                    );
                    break;
                }
            }
        }

        if workflow.run_planner {
            self.plan(&mut session).await;
        }

        session.finalize(self.ctx.gateway.usage());
        info!(
            total = session.total_cycles,
            successful = session.successful_cycles,
            failed = session.failed_cycles,
            needs_revision = session.needs_revision_cycles,
            "session finished"
        );

        let location = match self.ctx.reports.save_session(&session).await {
            Ok(location) => {
                info!(report = %location, "session report saved");
                Some(location)
            }
            Err(e) => {
                error!(error = %e, "session report could not be saved");
                None
            }
        };
        SessionOutcome {
            report: session,
            location,
        }
    }
}
