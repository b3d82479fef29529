//! Shared value types for the devloop domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. review scores are in `[0, 100]`,
//! progress markers never exceed `100`) and participate in domain computations.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Token accounting
// ---------------------------------------------------------------------------

/// Number of tokens consumed or budgeted in a completion-service call.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Backlog enums
// ---------------------------------------------------------------------------

/// Business priority of a work item.
///
/// Ordering follows urgency: `High > Medium > Low`. The store adapter accepts
/// the legacy Spanish labels on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "high", alias = "HIGH", alias = "Alta", alias = "alta")]
    High,
    #[serde(alias = "medium", alias = "MEDIUM", alias = "Media", alias = "media")]
    Medium,
    #[serde(alias = "low", alias = "LOW", alias = "Baja", alias = "baja")]
    Low,
}

impl Priority {
    /// Numeric urgency rank; higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    /// The label written to the store.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    /// The label a legacy (Spanish-labelled) backlog table uses.
    pub fn legacy_label(self) -> &'static str {
        match self {
            Priority::High => "Alta",
            Priority::Medium => "Media",
            Priority::Low => "Baja",
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// Lifecycle state of a work item.
///
/// Status only advances `Pending → InProgress → Completed`, except that a
/// rejected review returns a completed implementation to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkStatus {
    #[serde(alias = "Pendiente")]
    Pending,
    #[serde(alias = "En curso", alias = "En Progreso", alias = "In Progress")]
    InProgress,
    #[serde(alias = "Completado")]
    Completed,
}

impl WorkStatus {
    /// Statuses that are eligible for an implementation pass.
    pub const OPEN: [WorkStatus; 2] = [WorkStatus::Pending, WorkStatus::InProgress];

    /// The label written to the store.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkStatus::Pending => "Pending",
            WorkStatus::InProgress => "InProgress",
            WorkStatus::Completed => "Completed",
        }
    }

    /// The label a legacy (Spanish-labelled) backlog table uses.
    pub fn legacy_label(self) -> &'static str {
        match self {
            WorkStatus::Pending => "Pendiente",
            WorkStatus::InProgress => "En curso",
            WorkStatus::Completed => "Completado",
        }
    }

    /// Every stored label that deserialises to this status.
    pub fn accepted_labels(self) -> &'static [&'static str] {
        match self {
            WorkStatus::Pending => &["Pending", "Pendiente"],
            WorkStatus::InProgress => &["InProgress", "En curso", "En Progreso", "In Progress"],
            WorkStatus::Completed => &["Completed", "Completado"],
        }
    }

    /// Returns `true` for statuses the Implementer may pick up.
    pub fn is_open(self) -> bool {
        !matches!(self, WorkStatus::Completed)
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// Percentage progress marker stored alongside [`WorkStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Progress(u8);

impl Progress {
    /// Work has started but nothing has been produced yet.
    pub const STARTED: Progress = Progress(0);
    /// Implementation written; waiting for review.
    pub const AWAITING_REVIEW: Progress = Progress(80);
    /// Work is done.
    pub const DONE: Progress = Progress(100);

    /// Creates a [`Progress`], returning `None` above `100`.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    /// Returns the percentage.
    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Progress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Rows written by other tools may carry out-of-range values; clamp them.
        let raw = i64::deserialize(deserializer)?;
        Ok(Self(raw.clamp(0, 100) as u8))
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ---------------------------------------------------------------------------
// Review types
// ---------------------------------------------------------------------------

/// A review quality score in the range `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReviewScore(u8);

impl ReviewScore {
    /// Creates a [`ReviewScore`], returning `None` if `value` is above `100`.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    /// Returns the score.
    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for ReviewScore {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        if raw.is_finite() && (0.0..=100.0).contains(&raw) {
            Ok(Self(raw.round() as u8))
        } else {
            Err(serde::de::Error::custom(format!(
                "review score {raw} is outside 0..=100"
            )))
        }
    }
}

impl std::fmt::Display for ReviewScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/100", self.0)
    }
}

// ---------------------------------------------------------------------------

/// Severity of a review finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Must be fixed before the change can be accepted.
    #[serde(alias = "Critical", alias = "CRITICAL", alias = "blocker")]
    Critical,
    /// Should be fixed; the change is questionable as-is.
    #[serde(alias = "Major", alias = "MAJOR", alias = "high")]
    Major,
    /// Cosmetic or low-risk.
    #[serde(alias = "Minor", alias = "MINOR", alias = "low")]
    Minor,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IssueSeverity::Critical => "CRITICAL",
            IssueSeverity::Major => "MAJOR",
            IssueSeverity::Minor => "MINOR",
        })
    }
}

// ---------------------------------------------------------------------------

/// Estimated implementation complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    #[serde(alias = "low", alias = "LOW", alias = "Baja")]
    Low,
    #[serde(alias = "medium", alias = "MEDIUM", alias = "Media")]
    Medium,
    #[serde(alias = "high", alias = "HIGH", alias = "Alta")]
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Complexity::Low => "Low",
            Complexity::Medium => "Medium",
            Complexity::High => "High",
        })
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Milliseconds since the Unix epoch; used to name report files.
    pub fn as_millis(self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
