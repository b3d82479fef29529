//! Structured results parsed out of completion-service responses.
//!
//! Each agent asks the completion service for one JSON object and parses it
//! into one of the types here. Parsing is strict: every field named in the
//! role prompt is required, and [`Validate`] runs after deserialisation to
//! reject values that are well-typed but meaningless (empty plans, blank
//! titles). A response that fails either step is a
//! [`crate::ProtocolError`], never a partially-filled value.

use serde::{Deserialize, Serialize};

use crate::{Complexity, IssueSeverity, Priority, ReviewScore, WorkItemId};

/// Post-parse field validation for completion-service results.
pub trait Validate {
    /// Returns a description of the first invalid field, if any.
    fn validate(&self) -> Result<(), String>;
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{field}` must not be empty"))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Implementer
// ---------------------------------------------------------------------------

/// The Implementer's plan for one work item. Lives for one cycle only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub implementation_plan: String,
    pub files_to_modify: Vec<String>,
    pub complexity: Complexity,
    pub dependencies: Vec<String>,
    pub testing_strategy: String,
    pub ready_to_implement: bool,
}

impl Validate for AnalysisResult {
    fn validate(&self) -> Result<(), String> {
        require("implementationPlan", &self.implementation_plan)?;
        require("testingStrategy", &self.testing_strategy)
    }
}

// ---------------------------------------------------------------------------
// Reviewer
// ---------------------------------------------------------------------------

/// One problem found during review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub severity: IssueSeverity,
    pub description: String,
    pub suggestion: String,
}

/// The Reviewer's structured assessment of a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAssessment {
    pub approved: bool,
    pub score: ReviewScore,
    pub strengths: Vec<String>,
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub testing_notes: Option<String>,
    pub feedback: String,
}

impl ReviewAssessment {
    /// Number of issues at [`IssueSeverity::Critical`].
    pub fn critical_issues(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Critical)
            .count()
    }
}

impl Validate for ReviewAssessment {
    fn validate(&self) -> Result<(), String> {
        for (n, issue) in self.issues.iter().enumerate() {
            require(&format!("issues[{n}].description"), &issue.description)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Qualitative part of the Planner's insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightAnalysis {
    pub completed_impact: String,
    pub gaps: Vec<String>,
    pub technical_debt: Vec<String>,
    pub category_balance: String,
}

/// A new backlog entry proposed by the Planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProposal {
    pub title: String,
    pub category: String,
    pub description: String,
    pub priority: Priority,
    pub quarter: String,
    pub reasoning: String,
}

/// A suggested priority change for an existing item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityAdjustment {
    #[serde(alias = "actionId")]
    pub item_id: WorkItemId,
    pub current_priority: Priority,
    pub suggested_priority: Priority,
    pub reasoning: String,
}

/// Everything the Planner learned from one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub analysis: InsightAnalysis,
    pub new_features: Vec<FeatureProposal>,
    pub priority_adjustments: Vec<PriorityAdjustment>,
    pub recommendations: String,
}

impl Validate for Insights {
    fn validate(&self) -> Result<(), String> {
        for (n, f) in self.new_features.iter().enumerate() {
            require(&format!("newFeatures[{n}].title"), &f.title)?;
            require(&format!("newFeatures[{n}].category"), &f.category)?;
        }
        for (n, a) in self.priority_adjustments.iter().enumerate() {
            require(&format!("priorityAdjustments[{n}].itemId"), a.item_id.as_str())?;
        }
        Ok(())
    }
}
