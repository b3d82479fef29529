//! Shared fakes and fixtures for agent tests.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use agents::{AgentContext, LlmGateway};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use pipeline::{
    BacklogStore, Change, CommitSha, Completion, CompletionError, CompletionRequest, ListQuery,
    LlmProvider, NewWorkItem, PipelineConfig, Priority, Progress, StoreError, Timestamp,
    TokenCount, VcsError, VersionControl, WorkItem, WorkItemId, WorkItemPatch, WorkStatus,
};
use repo::{FileArtifact, JsonReportStore};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Backlog store
// ---------------------------------------------------------------------------

/// In-memory backlog with injectable list and insert failures.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<WorkItem>>,
    failing_titles: Mutex<HashSet<String>>,
    list_unavailable: Mutex<bool>,
    updates: Mutex<Vec<(WorkItemId, WorkItemPatch)>>,
}

impl MemoryStore {
    pub fn with_items(items: Vec<WorkItem>) -> Self {
        Self {
            rows: Mutex::new(items),
            ..Self::default()
        }
    }

    /// Inserts of an item with this title fail with a constraint error.
    pub fn fail_inserts_titled(&self, title: &str) {
        self.failing_titles.lock().unwrap().insert(title.to_string());
    }

    /// Every subsequent `list` fails with a connectivity error.
    pub fn fail_lists(&self) {
        *self.list_unavailable.lock().unwrap() = true;
    }

    pub fn item(&self, id: &str) -> WorkItem {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id.as_str() == id)
            .cloned()
            .unwrap_or_else(|| panic!("no item {id}"))
    }

    pub fn all(&self) -> Vec<WorkItem> {
        self.rows.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl BacklogStore for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<Vec<WorkItem>, StoreError> {
        if *self.list_unavailable.lock().unwrap() {
            return Err(StoreError::Connectivity {
                message: "connection refused".into(),
            });
        }
        Ok(query.apply(self.all()))
    }

    async fn get(&self, id: &WorkItemId) -> Result<WorkItem, StoreError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|i| &i.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    async fn insert(&self, item: NewWorkItem) -> Result<WorkItem, StoreError> {
        if self.failing_titles.lock().unwrap().contains(&item.title) {
            return Err(StoreError::Constraint {
                message: format!("insert of '{}' rejected", item.title),
            });
        }
        let item = item.into_work_item();
        self.rows.lock().unwrap().push(item.clone());
        Ok(item)
    }

    async fn update(&self, id: &WorkItemId, patch: &WorkItemPatch) -> Result<WorkItem, StoreError> {
        self.updates
            .lock()
            .unwrap()
            .push((id.clone(), patch.clone()));
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        patch.apply_to(row);
        Ok(row.clone())
    }
}

// ---------------------------------------------------------------------------
// Completion service
// ---------------------------------------------------------------------------

/// Returns queued responses in order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::default(),
        }
    }

    pub fn push_error(&self, error: CompletionError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(CompletionError::Transport {
                    message: "script exhausted".into(),
                })
            })?;
        Ok(Completion {
            text: next,
            input_tokens: TokenCount::new(100),
            output_tokens: TokenCount::new(50),
        })
    }
}

// ---------------------------------------------------------------------------
// Version control
// ---------------------------------------------------------------------------

/// Records commits; `last_change` returns whatever was staged with `set_change`.
#[derive(Default)]
pub struct FakeVcs {
    commits: Mutex<Vec<String>>,
    change: Mutex<Option<Change>>,
    fail_commits: Mutex<bool>,
}

impl FakeVcs {
    pub fn set_change(&self, message: &str, diff: &str) {
        *self.change.lock().unwrap() = Some(Change {
            sha: CommitSha::new("0123456789abcdef0123456789abcdef01234567").unwrap(),
            message: message.to_string(),
            diff: diff.to_string(),
        });
    }

    pub fn fail_commits(&self) {
        *self.fail_commits.lock().unwrap() = true;
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn commit_artifact(&self, message: &str) -> Result<CommitSha, VcsError> {
        if *self.fail_commits.lock().unwrap() {
            return Err(VcsError::Repository {
                message: "index locked".into(),
            });
        }
        self.commits.lock().unwrap().push(message.to_string());
        let n = self.commits.lock().unwrap().len();
        self.set_change(message, "+changed");
        Ok(CommitSha::new(format!("{n:040x}")).unwrap())
    }

    async fn last_change(&self) -> Result<Change, VcsError> {
        self.change
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| VcsError::NoCommit {
                path: "index.html".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub const ARTIFACT_V1: &str = "<!DOCTYPE html>\n<html><body>v1</body></html>\n";

/// Fakes plus real file adapters rooted in a temporary directory.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub llm: Arc<ScriptedLlm>,
    pub vcs: Arc<FakeVcs>,
    pub artifact: Arc<FileArtifact>,
    pub reports: Arc<JsonReportStore>,
    pub gateway: Arc<LlmGateway>,
}

impl Harness {
    pub fn new(items: Vec<WorkItem>, responses: Vec<String>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let artifact = FileArtifact::new(dir.path().join("index.html"));
        std::fs::write(artifact.path(), ARTIFACT_V1).unwrap();
        let llm = Arc::new(ScriptedLlm::new(responses));
        Self {
            reports: Arc::new(JsonReportStore::new(dir.path().join("reports"))),
            dir,
            store: Arc::new(MemoryStore::with_items(items)),
            gateway: Arc::new(LlmGateway::new(llm.clone())),
            llm,
            vcs: Arc::new(FakeVcs::default()),
            artifact: Arc::new(artifact),
        }
    }

    pub fn ctx(&self, config: PipelineConfig) -> AgentContext {
        AgentContext {
            store: self.store.clone(),
            artifact: self.artifact.clone(),
            vcs: self.vcs.clone(),
            reports: self.reports.clone(),
            gateway: self.gateway.clone(),
            config: Arc::new(config),
        }
    }

    pub fn artifact_text(&self) -> String {
        std::fs::read_to_string(self.artifact.path()).unwrap()
    }

    pub fn backup_text(&self) -> Option<String> {
        std::fs::read_to_string(self.artifact.backup_path()).ok()
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.dir.path().join("reports")
    }

    /// Report files whose name starts with `prefix`.
    pub fn report_files(&self, prefix: &str) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.reports_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .unwrap()
                    .to_string_lossy()
                    .starts_with(prefix)
            })
            .collect();
        files.sort();
        files
    }
}

/// Defaults with no inter-cycle delay.
pub fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.workflow.cycle_delay_ms = 0;
    config
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A work item created `age_minutes` after a fixed epoch.
pub fn work_item(id: &str, priority: Priority, status: WorkStatus, age_minutes: i64) -> WorkItem {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let at = Timestamp::from_utc(base + Duration::minutes(age_minutes));
    WorkItem {
        id: WorkItemId::new(id).unwrap(),
        title: format!("Title {id}"),
        category: "Product".into(),
        description: Some(format!("Description of {id}")),
        priority,
        quarter: Some("Q1 2026".into()),
        status,
        progress: Progress::STARTED,
        responsible: None,
        deadline: None,
        subtasks: vec![],
        created_at: at,
        updated_at: at,
    }
}

pub fn analysis_response(ready: bool) -> String {
    format!(
        "Here is the plan.\n{{\"implementationPlan\": \"Add a settings panel\", \
         \"filesToModify\": [\"index.html\"], \"complexity\": \"Medium\", \
         \"dependencies\": [], \"testingStrategy\": \"Open the panel\", \
         \"readyToImplement\": {ready}}}\nLet me know."
    )
}

pub fn implementation_response(body: &str) -> String {
    format!("Done.\n<!-- UPDATED CODE -->\n```html\n{body}\n```\n")
}

pub fn review_response(approved: bool, score: u8) -> String {
    let body = serde_json::json!({
        "approved": approved,
        "score": score,
        "strengths": ["Readable"],
        "issues": [
            {"severity": "major", "description": "Missing error handling", "suggestion": "Wrap the fetch"}
        ],
        "testingNotes": "Manual check",
        "feedback": "Reasonable change"
    });
    format!("My review:\n{body}\n")
}

pub fn insights_response(features: &[&str], adjustments: &[(&str, &str)]) -> String {
    let new_features: Vec<_> = features
        .iter()
        .map(|title| {
            serde_json::json!({
                "title": title,
                "category": "Product",
                "description": format!("Build {title}"),
                "priority": "Alta",
                "quarter": "Q2 2026",
                "reasoning": "Users asked"
            })
        })
        .collect();
    let priority_adjustments: Vec<_> = adjustments
        .iter()
        .map(|(id, to)| {
            serde_json::json!({
                "actionId": id,
                "currentPriority": "Low",
                "suggestedPriority": to,
                "reasoning": "Shifted goals"
            })
        })
        .collect();
    let body = serde_json::json!({
        "analysis": {
            "completedImpact": "Solid progress",
            "gaps": ["Onboarding"],
            "technicalDebt": ["Large file"],
            "categoryBalance": "Product heavy"
        },
        "newFeatures": new_features,
        "priorityAdjustments": priority_adjustments,
        "recommendations": "Focus on onboarding"
    });
    format!("Insights follow.\n{body}")
}
