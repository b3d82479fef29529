//! Backlog rows and the query/patch shapes used to read and mutate them.
//!
//! The [`crate::BacklogStore`] owns canonical [`WorkItem`] state. Agents read
//! rows through a [`ListQuery`] and mutate them only through a
//! [`WorkItemPatch`], so every write is row-scoped and explicit about which
//! columns change.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Priority, Progress, Timestamp, WorkItemId, WorkStatus};

/// One entry of an item's checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// A backlog entry tracked through `Pending → InProgress → Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub quarter: Option<String>,
    pub status: WorkStatus,
    /// Last persisted progress marker (see [`Progress`]).
    #[serde(default)]
    pub progress: Progress,
    #[serde(default, alias = "responsable")]
    pub responsible: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkItem {
    /// Description text for prompts and commit messages.
    pub fn description_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(fallback)
    }

    /// Quarter label, or `"unscheduled"` when absent.
    pub fn quarter_label(&self) -> &str {
        self.quarter.as_deref().unwrap_or("unscheduled")
    }

    /// Compact summary for session and planner reports.
    pub fn summary(&self) -> WorkItemSummary {
        WorkItemSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            priority: self.priority,
            quarter: self.quarter.clone(),
        }
    }
}

/// The fields of a [`WorkItem`] worth repeating in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemSummary {
    pub id: WorkItemId,
    pub title: String,
    pub category: String,
    pub priority: Priority,
    pub quarter: Option<String>,
}

// ---------------------------------------------------------------------------
// Mutation shapes
// ---------------------------------------------------------------------------

/// A partial update for one row. `None` fields are left untouched.
///
/// `updated_at` is always written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub updated_at: Timestamp,
}

impl WorkItemPatch {
    /// Patch that moves an item to `status` with the given progress marker.
    pub fn status(status: WorkStatus, progress: Progress) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            priority: None,
            updated_at: Timestamp::now(),
        }
    }

    /// Patch that changes only the priority.
    pub fn priority(priority: Priority) -> Self {
        Self {
            status: None,
            progress: None,
            priority: Some(priority),
            updated_at: Timestamp::now(),
        }
    }

    /// Applies this patch to an in-memory row.
    pub fn apply_to(&self, item: &mut WorkItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(progress) = self.progress {
            item.progress = progress;
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        item.updated_at = self.updated_at;
    }
}

// ---------------------------------------------------------------------------
// Query shapes
// ---------------------------------------------------------------------------

/// Column a [`ListQuery`] can order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Urgency rank (`High > Medium > Low`), not the label's lexical order.
    Priority,
    CreatedAt,
    UpdatedAt,
}

/// One ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

/// Filter, order, and limit for a backlog read.
///
/// An empty `statuses` list means "any status".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListQuery {
    pub statuses: Vec<WorkStatus>,
    pub order: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl ListQuery {
    /// Open items, most urgent first, oldest first within a priority.
    pub fn open_by_priority() -> Self {
        Self {
            statuses: WorkStatus::OPEN.to_vec(),
            order: vec![
                SortKey::desc(SortField::Priority),
                SortKey::asc(SortField::CreatedAt),
            ],
            limit: None,
        }
    }

    /// Every item, newest first.
    pub fn all_newest_first() -> Self {
        Self {
            statuses: Vec::new(),
            order: vec![SortKey::desc(SortField::CreatedAt)],
            limit: None,
        }
    }

    /// Completed items, most recently updated first.
    pub fn recently_completed(limit: usize) -> Self {
        Self {
            statuses: vec![WorkStatus::Completed],
            order: vec![SortKey::desc(SortField::UpdatedAt)],
            limit: Some(limit),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `item` passes the status filter.
    pub fn matches(&self, item: &WorkItem) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&item.status)
    }

    /// Filters, orders, and truncates `items` according to this query.
    ///
    /// Store adapters that cannot express the full ordering server-side use
    /// this so every backend produces the same sequence.
    pub fn apply(&self, items: Vec<WorkItem>) -> Vec<WorkItem> {
        let mut rows: Vec<WorkItem> = items.into_iter().filter(|i| self.matches(i)).collect();
        rows.sort_by(|a, b| {
            self.order.iter().fold(std::cmp::Ordering::Equal, |acc, key| {
                acc.then_with(|| {
                    let ord = match key.field {
                        SortField::Priority => a.priority.cmp(&b.priority),
                        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                    };
                    if key.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
            })
        });
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// A row to insert. The store assigns nothing; every column is supplied here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub quarter: Option<String>,
    pub status: WorkStatus,
    pub progress: Progress,
    pub responsible: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub subtasks: Vec<Subtask>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NewWorkItem {
    /// Converts the insert payload into the row the store now holds.
    pub fn into_work_item(self) -> WorkItem {
        WorkItem {
            id: self.id,
            title: self.title,
            category: self.category,
            description: self.description,
            priority: self.priority,
            quarter: self.quarter,
            status: self.status,
            progress: self.progress,
            responsible: self.responsible,
            deadline: self.deadline,
            subtasks: self.subtasks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
