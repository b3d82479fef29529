//! Core domain for devloop.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, parsed completion result, report document, and error type used
//! throughout the pipeline, plus the port traits infrastructure crates
//! implement. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`WorkItemId`, `SessionId`, etc.) |
//! | [`types`] | Shared value types (`Priority`, `WorkStatus`, `ReviewScore`, etc.) |
//! | [`work_item`] | Backlog rows, patches, and list queries |
//! | [`results`] | Typed completion results with post-parse validation |
//! | [`extract`] | JSON-object and delimited-body extraction from free text |
//! | [`reports`] | Review, planner, and session report documents |
//! | [`config`] | Immutable run configuration |
//! | [`ports`] | Port traits for store, completion service, artifact, VCS, reports |
//! | [`errors`] | Error taxonomy |

pub mod config;
pub mod errors;
pub mod extract;
pub mod identifiers;
pub mod ports;
pub mod reports;
pub mod results;
pub mod types;
pub mod work_item;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{
    AgentsConfig, PipelineConfig, PlannerConfig, ReviewConfig, RoleParams, StaticCheckSpec,
    StoreConfig, StoreVocabulary, WorkflowConfig,
};
pub use errors::{
    AgentError, ArtifactError, CompletionError, ConfigError, ProtocolError, ReportError,
    StoreError, VcsError,
};
pub use extract::{extract_delimited_body, extract_json_object, parse_structured};
pub use identifiers::{CommitSha, ModelName, ReportLocation, SessionId, WorkItemId};
pub use ports::{
    ArtifactStore, BacklogStore, Change, Completion, CompletionRequest, LlmProvider,
    ReportStore, VersionControl,
};
pub use reports::{
    BacklogStats, CycleOutcome, CyclePhase, CycleResult, EventLevel, PlannerReport,
    PlannerSummary, ReviewReport, SessionEvent, SessionReport, StaticCheck, StaticCheckSummary,
    TokenUsage,
};
pub use results::{
    AnalysisResult, FeatureProposal, InsightAnalysis, Insights, PriorityAdjustment,
    ReviewAssessment, ReviewIssue, Validate,
};
pub use types::{
    Complexity, IssueSeverity, Priority, Progress, ReviewScore, Timestamp, TokenCount, WorkStatus,
};
pub use work_item::{
    ListQuery, NewWorkItem, SortField, SortKey, Subtask, WorkItem, WorkItemPatch, WorkItemSummary,
};
