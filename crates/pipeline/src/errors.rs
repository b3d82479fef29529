//! Error taxonomy for the devloop pipeline.
//!
//! Each port has its own error type so adapters can classify failures without
//! knowing about agents. [`AgentError`] aggregates them for agent internals;
//! agent `run` entry points turn it into an outcome value so no failure
//! crosses a component boundary as an error. [`ConfigError`] is the only
//! error that stops a process from starting.

use thiserror::Error;

use crate::WorkItemId;

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::BacklogStore`].
///
/// Callers never retry automatically; the failing step is recorded as failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store could not be reached or returned an unexpected response.
    #[error("Backlog store unavailable: {message}")]
    Connectivity { message: String },

    /// The store rejected the write (duplicate id, check constraint, ...).
    #[error("Backlog store rejected the write: {message}")]
    Constraint { message: String },

    /// No row has the requested id.
    #[error("Work item '{id}' not found")]
    NotFound { id: WorkItemId },

    /// A row could not be decoded into a work item.
    #[error("Malformed backlog row: {message}")]
    MalformedRow { message: String },
}

/// Failures of the completion-service transport itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    /// The request never produced an HTTP response.
    #[error("Completion service unreachable: {message}")]
    Transport { message: String },

    /// The service answered with a non-success status.
    #[error("Completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response carried no text content.
    #[error("Completion service returned no text")]
    EmptyResponse,
}

/// A completion-service response did not honour its text contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// No `{ ... }` object could be located in the response.
    #[error("Response contains no JSON object")]
    NoJsonObject,

    /// An object was located but is not valid JSON.
    #[error("Response JSON is malformed: {reason}")]
    MalformedJson { reason: String },

    /// The JSON is valid but a field is missing, mistyped, or empty.
    #[error("Response JSON has an invalid field: {reason}")]
    InvalidField { reason: String },
}

/// Failures reading or replacing the shared artifact.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArtifactError {
    #[error("Artifact I/O failed on '{path}': {message}")]
    Io { path: String, message: String },

    #[error("No backup exists at '{path}'")]
    NoBackup { path: String },
}

/// Failures of the version-control adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VcsError {
    /// History holds no commit touching the artifact; there is nothing to review.
    #[error("No commit touching '{path}' was found")]
    NoCommit { path: String },

    #[error("Version control error: {message}")]
    Repository { message: String },
}

/// Failures writing or reading report files.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    #[error("Report I/O failed on '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Report could not be encoded: {message}")]
    Encode { message: String },
}

// ---------------------------------------------------------------------------
// Agent-level errors
// ---------------------------------------------------------------------------

/// Why an agent step failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The implementation response held no delimited replacement body.
    #[error("Implementation failed: {reason}")]
    Implementation { reason: String },

    /// The analysis said the item cannot be implemented yet.
    #[error("Work item '{id}' is not ready to implement")]
    NotReady { id: WorkItemId },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

// ---------------------------------------------------------------------------
// Startup errors
// ---------------------------------------------------------------------------

/// The process configuration is missing or invalid.
///
/// Produced at load time; the pipeline never starts with an invalid config.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Configuration could not be parsed: {message}")]
    Parse { message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Required environment variable '{name}' is not set")]
    MissingSecret { name: String },

    #[error("Configuration file '{path}' could not be read: {message}")]
    Io { path: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
