//! Write-once JSON report directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{
    PlannerReport, ReportError, ReportLocation, ReportStore, ReviewReport, SessionReport,
    Timestamp,
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

const REVIEW_PREFIX: &str = "review-";
const PLANNER_PREFIX: &str = "planner-";
const SESSION_PREFIX: &str = "session-";

/// Upper bound on `-N` suffixes tried when two reports share a millisecond.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// [`ReportStore`] writing one pretty-printed JSON file per report.
///
/// Files are created exclusively and never rewritten. Names carry the
/// report's millisecond timestamp:
///
/// - `review-{item id}-{millis}.json`
/// - `planner-{millis}.json`
/// - `session-{millis}.json`
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    dir: PathBuf,
}

impl JsonReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[instrument(skip(self, report), fields(dir = %self.dir.display()))]
    async fn write_new<T: Serialize + Sync>(
        &self,
        stem: &str,
        report: &T,
    ) -> Result<ReportLocation, ReportError> {
        let body = serde_json::to_vec_pretty(report).map_err(|e| ReportError::Encode {
            message: e.to_string(),
        })?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}-{attempt}.json")
            };
            let path = self.dir.join(name);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_error(&path, e)),
            };
            file.write_all(&body)
                .await
                .map_err(|e| io_error(&path, e))?;
            file.flush().await.map_err(|e| io_error(&path, e))?;

            let location = path.display().to_string();
            info!(report = %location, "report written");
            return ReportLocation::new(location).ok_or_else(|| ReportError::Io {
                path: path.display().to_string(),
                message: "empty report path".to_string(),
            });
        }
        Err(ReportError::Io {
            path: self.dir.join(format!("{stem}.json")).display().to_string(),
            message: "no free file name".to_string(),
        })
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Keeps file names portable whatever the store uses as ids.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn millis(ts: Timestamp) -> i64 {
    ts.as_millis()
}

#[async_trait]
impl ReportStore for JsonReportStore {
    async fn save_review(&self, report: &ReviewReport) -> Result<ReportLocation, ReportError> {
        let stem = format!(
            "{REVIEW_PREFIX}{}-{}",
            sanitize(report.item_id.as_str()),
            millis(report.timestamp)
        );
        self.write_new(&stem, report).await
    }

    async fn save_planner(&self, report: &PlannerReport) -> Result<ReportLocation, ReportError> {
        let stem = format!("{PLANNER_PREFIX}{}", millis(report.timestamp));
        self.write_new(&stem, report).await
    }

    async fn save_session(&self, report: &SessionReport) -> Result<ReportLocation, ReportError> {
        let ended = report.session_end.unwrap_or(report.session_start);
        let stem = format!("{SESSION_PREFIX}{}", millis(ended));
        self.write_new(&stem, report).await
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn load_reviews(&self) -> Result<Vec<ReviewReport>, ReportError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir, e)),
        };

        let mut reviews = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(REVIEW_PREFIX) && name.ends_with(".json")) {
                continue;
            }
            let path = entry.path();
            let parsed = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<ReviewReport>(&bytes).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match parsed {
                Ok(report) => reviews.push(report),
                Err(reason) => {
                    warn!(report = %path.display(), %reason, "skipping unreadable review report")
                }
            }
        }

        reviews.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        debug!(count = reviews.len(), "review reports loaded");
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pipeline::{
        Priority, ReviewAssessment, ReviewScore, SessionId, WorkItem, WorkItemId, WorkStatus,
    };

    use super::*;

    fn item(id: &str) -> WorkItem {
        let now = Timestamp::now();
        WorkItem {
            id: WorkItemId::new(id).unwrap(),
            title: format!("Item {id}"),
            category: "UX".into(),
            description: None,
            priority: Priority::Medium,
            quarter: None,
            status: WorkStatus::InProgress,
            progress: Default::default(),
            responsible: None,
            deadline: None,
            subtasks: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn review(id: &str, at_secs: i64) -> ReviewReport {
        let assessment = ReviewAssessment {
            approved: true,
            score: ReviewScore::new(90).unwrap(),
            strengths: vec!["clear".into()],
            issues: vec![],
            testing_notes: None,
            feedback: "good".into(),
        };
        let mut report = ReviewReport::new(&item(id), assessment, None);
        report.timestamp = Timestamp::from_utc(Utc.timestamp_opt(at_secs, 0).unwrap());
        report
    }

    #[tokio::test]
    async fn reviews_load_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path().join("reports"));
        store.save_review(&review("a", 1_000)).await.unwrap();
        store.save_review(&review("b", 3_000)).await.unwrap();
        store.save_review(&review("c", 2_000)).await.unwrap();

        let ids: Vec<String> = store
            .load_reviews()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.item_id.as_str().to_string())
            .collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path());
        store.save_review(&review("ok", 1_000)).await.unwrap();
        std::fs::write(dir.path().join("review-broken-1.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let reviews = store.load_reviews().await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].item_id.as_str(), "ok");
    }

    #[tokio::test]
    async fn missing_directory_has_no_reviews() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path().join("never-created"));
        assert!(store.load_reviews().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_millisecond_reports_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path());
        let first = store.save_review(&review("x", 5_000)).await.unwrap();
        let second = store.save_review(&review("x", 5_000)).await.unwrap();

        assert_ne!(first, second);
        assert!(first.as_str().ends_with("review-x-5000000.json"));
        assert!(second.as_str().ends_with("review-x-5000000-1.json"));
        assert_eq!(store.load_reviews().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn session_report_is_named_after_its_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path());
        let mut session = SessionReport::start(SessionId::new_random());
        session.finalize(Default::default());

        let location = store.save_session(&session).await.unwrap();
        let name = Path::new(location.as_str())
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("session-"));
        let written: SessionReport =
            serde_json::from_slice(&std::fs::read(location.as_str()).unwrap()).unwrap();
        assert_eq!(written.session_id, session.session_id);
    }

    #[test]
    fn ids_are_sanitized_for_file_names() {
        assert_eq!(sanitize("a/b c:1"), "a_b_c_1");
        assert_eq!(sanitize("item-42_x"), "item-42_x");
    }
}
