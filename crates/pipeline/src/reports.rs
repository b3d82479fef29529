//! Persisted report documents.
//!
//! Reports are written once and never modified: one per reviewer pass, one per
//! planner pass, one per orchestrator session. The Planner reads review
//! reports back for history; everything else is for human operators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    InsightAnalysis, ReviewAssessment, ReviewIssue, ReviewScore, SessionId, Timestamp,
    TokenCount, WorkItem, WorkItemId, WorkItemSummary,
};

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// Result of one deterministic marker check against the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCheck {
    pub name: String,
    pub passed: bool,
}

/// Tally of the static check battery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticCheckSummary {
    pub checks: Vec<StaticCheck>,
    pub passed: usize,
    pub total: usize,
}

impl StaticCheckSummary {
    pub fn from_checks(checks: Vec<StaticCheck>) -> Self {
        let passed = checks.iter().filter(|c| c.passed).count();
        let total = checks.len();
        Self {
            checks,
            passed,
            total,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

/// Immutable record of one review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub item_id: WorkItemId,
    pub item_title: String,
    pub approved: bool,
    pub score: ReviewScore,
    pub summary: String,
    pub issues: Vec<ReviewIssue>,
    pub strengths: Vec<String>,
    #[serde(default)]
    pub testing_notes: Option<String>,
    #[serde(default)]
    pub static_checks: Option<StaticCheckSummary>,
    pub recommendation: String,
    pub timestamp: Timestamp,
}

impl ReviewReport {
    pub fn new(
        item: &WorkItem,
        assessment: ReviewAssessment,
        static_checks: Option<StaticCheckSummary>,
    ) -> Self {
        let recommendation = if assessment.approved {
            "Approved for production"
        } else {
            "Needs revision before approval"
        };
        Self {
            item_id: item.id.clone(),
            item_title: item.title.clone(),
            approved: assessment.approved,
            score: assessment.score,
            summary: assessment.feedback,
            issues: assessment.issues,
            strengths: assessment.strengths,
            testing_notes: assessment.testing_notes,
            static_checks,
            recommendation: recommendation.to_string(),
            timestamp: Timestamp::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Aggregate backlog health figures computed by the Planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacklogStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    /// `completed / total`, `0.0` for an empty backlog.
    pub completion_ratio: f64,
    /// Rounded mean of review scores, `0` when there are no reviews.
    pub mean_review_score: u8,
}

/// Immutable record of one planner pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerReport {
    pub timestamp: Timestamp,
    pub stats: BacklogStats,
    pub analysis: InsightAnalysis,
    pub new_features: Vec<WorkItemSummary>,
    pub priority_adjustments_applied: usize,
    pub recommendations: String,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The stage at which a cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// The backlog could not be read, so no item was selected.
    Fetch,
    Implement,
    Review,
    Complete,
}

/// How one Implement → Review cycle ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CycleResult {
    /// The item is now Completed.
    Completed,
    /// Review rejected the change; the item is back InProgress.
    NeedsRevision,
    /// A stage failed; the item keeps its last persisted status.
    Failed { phase: CyclePhase, reason: String },
}

/// Outcome of one cycle as recorded in the session report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle: u32,
    /// `None` when the cycle failed before an item was selected.
    pub item: Option<WorkItemSummary>,
    #[serde(flatten)]
    pub result: CycleResult,
    pub review_score: Option<ReviewScore>,
}

impl CycleOutcome {
    /// A cycle is successful when the pipeline ran to a verdict, approved or not.
    pub fn is_successful(&self) -> bool {
        !matches!(self.result, CycleResult::Failed { .. })
    }

    pub fn needs_revision(&self) -> bool {
        matches!(self.result, CycleResult::NeedsRevision)
    }
}

/// Severity of a narrated session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One line of the narrated session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub timestamp: Timestamp,
    pub level: EventLevel,
    pub message: String,
}

/// Token totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub calls: u64,
    pub input_tokens: TokenCount,
    pub output_tokens: TokenCount,
}

/// What the planner pass contributed to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerSummary {
    pub success: bool,
    pub created: Vec<WorkItemSummary>,
    pub recommendations: Option<String>,
    pub error: Option<String>,
}

/// The single report an orchestrator session produces.
///
/// Built incrementally while the session runs and persisted exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub session_start: Timestamp,
    pub session_end: Option<Timestamp>,
    pub total_cycles: usize,
    pub successful_cycles: usize,
    pub failed_cycles: usize,
    pub needs_revision_cycles: usize,
    pub cycles: Vec<CycleOutcome>,
    pub planner: Option<PlannerSummary>,
    pub token_usage: TokenUsage,
    pub log: Vec<SessionEvent>,
}

impl SessionReport {
    pub fn start(session_id: SessionId) -> Self {
        Self {
            session_id,
            session_start: Timestamp::now(),
            session_end: None,
            total_cycles: 0,
            successful_cycles: 0,
            failed_cycles: 0,
            needs_revision_cycles: 0,
            cycles: Vec::new(),
            planner: None,
            token_usage: TokenUsage::default(),
            log: Vec::new(),
        }
    }

    pub fn record_cycle(&mut self, outcome: CycleOutcome) {
        self.cycles.push(outcome);
    }

    pub fn record_event(&mut self, level: EventLevel, message: impl Into<String>) {
        self.log.push(SessionEvent {
            timestamp: Timestamp::now(),
            level,
            message: message.into(),
        });
    }

    /// Computes the aggregate counts and stamps the end time.
    pub fn finalize(&mut self, token_usage: TokenUsage) {
        self.total_cycles = self.cycles.len();
        self.successful_cycles = self.cycles.iter().filter(|c| c.is_successful()).count();
        self.failed_cycles = self.total_cycles - self.successful_cycles;
        self.needs_revision_cycles = self.cycles.iter().filter(|c| c.needs_revision()).count();
        self.token_usage = token_usage;
        self.session_end = Some(Timestamp::now());
    }

    /// Items implemented in this session (cycles that reached a verdict).
    pub fn implemented(&self) -> impl Iterator<Item = &CycleOutcome> {
        self.cycles.iter().filter(|c| c.is_successful())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;

    fn outcome(cycle: u32, result: CycleResult) -> CycleOutcome {
        CycleOutcome {
            cycle,
            item: Some(WorkItemSummary {
                id: WorkItemId::new(format!("i{cycle}")).unwrap(),
                title: "t".into(),
                category: "c".into(),
                priority: Priority::Low,
                quarter: None,
            }),
            result,
            review_score: None,
        }
    }

    #[test]
    fn finalize_counts_each_outcome() {
        let mut report = SessionReport::start(SessionId::new_random());
        report.record_cycle(outcome(1, CycleResult::Completed));
        report.record_cycle(outcome(2, CycleResult::NeedsRevision));
        report.record_cycle(outcome(
            3,
            CycleResult::Failed {
                phase: CyclePhase::Implement,
                reason: "x".into(),
            },
        ));
        report.finalize(TokenUsage::default());
        assert_eq!(report.total_cycles, 3);
        assert_eq!(report.successful_cycles, 2);
        assert_eq!(report.failed_cycles, 1);
        assert_eq!(report.needs_revision_cycles, 1);
        assert!(report.session_end.is_some());
    }

    #[test]
    fn fetch_failures_count_without_an_item() {
        let mut report = SessionReport::start(SessionId::new_random());
        report.record_cycle(CycleOutcome {
            cycle: 1,
            item: None,
            result: CycleResult::Failed {
                phase: CyclePhase::Fetch,
                reason: "store down".into(),
            },
            review_score: None,
        });
        report.record_cycle(outcome(2, CycleResult::Completed));
        report.finalize(TokenUsage::default());

        assert_eq!(report.total_cycles, 2);
        assert_eq!(report.failed_cycles, 1);
        let implemented: Vec<u32> = report.implemented().map(|c| c.cycle).collect();
        assert_eq!(implemented, vec![2]);

        let json = serde_json::to_value(&report.cycles[0]).unwrap();
        assert_eq!(json["phase"], "fetch");
        assert!(json["item"].is_null());
    }

    #[test]
    fn cycle_result_is_flattened_into_outcome() {
        let json = serde_json::to_value(outcome(
            1,
            CycleResult::Failed {
                phase: CyclePhase::Review,
                reason: "no commit".into(),
            },
        ))
        .unwrap();
        assert_eq!(json["result"], "failed");
        assert_eq!(json["phase"], "review");
    }

    #[test]
    fn static_summary_tallies() {
        let s = StaticCheckSummary::from_checks(vec![
            StaticCheck { name: "a".into(), passed: true },
            StaticCheck { name: "b".into(), passed: false },
        ]);
        assert_eq!((s.passed, s.total), (1, 2));
        assert!(!s.all_passed());
    }
}
