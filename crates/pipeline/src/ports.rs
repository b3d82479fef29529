//! Port traits implemented by infrastructure crates.
//!
//! Agents depend only on these traits. Each is async and dyn-compatible (via
//! `async-trait`) so the composition root can inject `Arc<dyn ...>` values and
//! tests can substitute in-memory fakes.
//!
//! | Port | Adapter |
//! |------|---------|
//! | [`BacklogStore`] | `backlog::PostgrestBacklogStore` |
//! | [`LlmProvider`] | `llm::AnthropicProvider` |
//! | [`ArtifactStore`] | `repo::FileArtifact` |
//! | [`VersionControl`] | `repo::GitRepository` |
//! | [`ReportStore`] | `repo::JsonReportStore` |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    ArtifactError, CommitSha, CompletionError, ListQuery, NewWorkItem, PlannerReport,
    ReportError, ReportLocation, ReviewReport, RoleParams, SessionReport, StoreError, TokenCount,
    VcsError, WorkItem, WorkItemId, WorkItemPatch,
};

// ---------------------------------------------------------------------------
// Backlog
// ---------------------------------------------------------------------------

/// Row-oriented persistence for work items. Sole owner of canonical state.
#[async_trait]
pub trait BacklogStore: Send + Sync {
    /// Rows matching `query`'s status filter, in `query`'s order, up to its limit.
    async fn list(&self, query: &ListQuery) -> Result<Vec<WorkItem>, StoreError>;

    /// The row with `id`, or [`StoreError::NotFound`].
    async fn get(&self, id: &WorkItemId) -> Result<WorkItem, StoreError>;

    /// Inserts a row and returns it as stored.
    async fn insert(&self, item: NewWorkItem) -> Result<WorkItem, StoreError>;

    /// Applies `patch` to the row with `id` and returns the updated row.
    async fn update(&self, id: &WorkItemId, patch: &WorkItemPatch)
        -> Result<WorkItem, StoreError>;
}

// ---------------------------------------------------------------------------
// Completion service
// ---------------------------------------------------------------------------

/// One request/response exchange with the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Fixed role instruction (system prompt).
    pub system: String,
    /// Item and context data for this call.
    pub prompt: String,
    pub params: RoleParams,
}

/// Raw text answer plus the token accounting the provider reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub input_tokens: TokenCount,
    pub output_tokens: TokenCount,
}

/// Text-in/text-out access to a large-language-model provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError>;
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// The single shared file implementation changes target.
///
/// Always read and written in full. A sibling backup of the previous content
/// is written before every overwrite.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Human-readable location for logs and prompts.
    fn location(&self) -> String;

    async fn read(&self) -> Result<String, ArtifactError>;

    /// Backs up the current content, then overwrites it with `content`.
    ///
    /// If the backup cannot be written the live artifact is not touched.
    async fn replace(&self, content: &str) -> Result<(), ArtifactError>;

    /// Copies the backup over the live artifact.
    async fn restore_backup(&self) -> Result<(), ArtifactError>;
}

// ---------------------------------------------------------------------------
// Version control
// ---------------------------------------------------------------------------

/// The most recent commit touching the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub sha: CommitSha,
    pub message: String,
    /// Unified diff of the artifact against the commit's first parent.
    pub diff: String,
}

/// Commits and history for the artifact file only.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Stages the artifact and commits it with `message`.
    async fn commit_artifact(&self, message: &str) -> Result<CommitSha, VcsError>;

    /// The newest commit touching the artifact, or [`VcsError::NoCommit`].
    async fn last_change(&self) -> Result<Change, VcsError>;
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Write-once storage for report documents.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_review(&self, report: &ReviewReport) -> Result<ReportLocation, ReportError>;

    async fn save_planner(&self, report: &PlannerReport) -> Result<ReportLocation, ReportError>;

    async fn save_session(&self, report: &SessionReport) -> Result<ReportLocation, ReportError>;

    /// Every stored review report, newest first.
    async fn load_reviews(&self) -> Result<Vec<ReviewReport>, ReportError>;
}
