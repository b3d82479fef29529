mod common;

use agents::{Implementer, ItemOutcome};
use common::{
    analysis_response, config, implementation_response, work_item, Harness, ARTIFACT_V1,
};
use pipeline::{Priority, Progress, WorkStatus};

#[tokio::test]
async fn fetch_next_orders_by_priority_then_age_and_skips_completed() {
    let items = vec![
        work_item("low-old", Priority::Low, WorkStatus::Pending, 0),
        work_item("high-new", Priority::High, WorkStatus::Pending, 30),
        work_item("high-done", Priority::High, WorkStatus::Completed, 1),
        work_item("medium", Priority::Medium, WorkStatus::InProgress, 5),
        work_item("high-old", Priority::High, WorkStatus::InProgress, 10),
    ];
    let h = Harness::new(items, vec![]);
    let implementer = Implementer::new(h.ctx(config()));

    let ids: Vec<String> = implementer
        .fetch_next(10)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id.as_str().to_string())
        .collect();
    assert_eq!(ids, ["high-old", "high-new", "medium", "low-old"]);

    let first = implementer.fetch_next(1).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id.as_str(), "high-old");
}

#[tokio::test]
async fn successful_item_awaits_review_with_backup_on_disk() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec![
            analysis_response(true),
            implementation_response("<html><body>v2</body></html>"),
        ],
    );
    let implementer = Implementer::new(h.ctx(config()));

    let results = implementer.run(1).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].outcome.is_success());
    let p1 = h.store.item("p1");
    assert_eq!(p1.status, WorkStatus::InProgress);
    assert_eq!(p1.progress, Progress::AWAITING_REVIEW);
    assert_eq!(results[0].item, p1);
    assert_eq!(h.artifact_text(), "<html><body>v2</body></html>");
    assert_eq!(h.backup_text().as_deref(), Some(ARTIFACT_V1));
}

#[tokio::test]
async fn commit_message_encodes_the_item() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec![analysis_response(true), implementation_response("<p>new</p>")],
    );
    let implementer = Implementer::new(h.ctx(config()));

    let results = implementer.run(1).await.unwrap();

    let commits = h.vcs.commits();
    assert_eq!(commits.len(), 1);
    assert!(commits[0].starts_with("feat(product): Title p1"));
    assert!(commits[0].contains("Complexity: Medium"));
    match &results[0].outcome {
        ItemOutcome::Implemented { commit, .. } => assert!(commit.is_some()),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn commit_failure_does_not_fail_the_item() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec![analysis_response(true), implementation_response("<p>new</p>")],
    );
    h.vcs.fail_commits();
    let implementer = Implementer::new(h.ctx(config()));

    let results = implementer.run(1).await.unwrap();

    match &results[0].outcome {
        ItemOutcome::Implemented { commit, .. } => assert!(commit.is_none()),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.store.item("p1").progress, Progress::AWAITING_REVIEW);
}

#[tokio::test]
async fn auto_commit_disabled_skips_version_control() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec![analysis_response(true), implementation_response("<p>new</p>")],
    );
    let mut cfg = config();
    cfg.workflow.auto_commit = false;
    let implementer = Implementer::new(h.ctx(cfg));

    implementer.run(1).await.unwrap();

    assert!(h.vcs.commits().is_empty());
}

#[tokio::test]
async fn unparsable_analysis_leaves_item_started_and_artifact_untouched() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec!["I would rather not answer in JSON.".to_string()],
    );
    let implementer = Implementer::new(h.ctx(config()));

    let results = implementer.run(1).await.unwrap();

    assert!(matches!(results[0].outcome, ItemOutcome::Failed { .. }));
    // The result carries the row as fetched.
    assert_eq!(results[0].item.status, WorkStatus::Pending);
    let p1 = h.store.item("p1");
    assert_eq!(p1.status, WorkStatus::InProgress);
    assert_eq!(p1.progress, Progress::STARTED);
    assert_eq!(h.artifact_text(), ARTIFACT_V1);
    assert!(h.backup_text().is_none());
    // Only the initial status flip reached the store.
    assert_eq!(h.store.update_count(), 1);
}

#[tokio::test]
async fn missing_marker_does_not_touch_the_artifact() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec![
            analysis_response(true),
            "Here is a diff instead of the file.".to_string(),
        ],
    );
    let implementer = Implementer::new(h.ctx(config()));

    let results = implementer.run(1).await.unwrap();

    match &results[0].outcome {
        ItemOutcome::Failed { reason } => assert!(reason.contains("Implementation failed")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.artifact_text(), ARTIFACT_V1);
    assert!(h.backup_text().is_none());
    assert_eq!(h.store.item("p1").progress, Progress::STARTED);
}

#[tokio::test]
async fn item_not_ready_is_not_implemented() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec![analysis_response(false)],
    );
    let implementer = Implementer::new(h.ctx(config()));

    let results = implementer.run(1).await.unwrap();

    match &results[0].outcome {
        ItemOutcome::Failed { reason } => assert!(reason.contains("not ready")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.llm.requests().len(), 1);
    assert_eq!(h.artifact_text(), ARTIFACT_V1);
}

#[tokio::test]
async fn one_failing_item_does_not_block_the_next() {
    let h = Harness::new(
        vec![
            work_item("first", Priority::High, WorkStatus::Pending, 0),
            work_item("second", Priority::Medium, WorkStatus::Pending, 0),
        ],
        vec![
            "no json here".to_string(),
            analysis_response(true),
            implementation_response("<p>second</p>"),
        ],
    );
    let implementer = Implementer::new(h.ctx(config()));

    let results = implementer.run(2).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(!results[0].outcome.is_success());
    assert!(results[1].outcome.is_success());
    assert_eq!(h.store.item("second").progress, Progress::AWAITING_REVIEW);
}

#[tokio::test]
async fn gateway_accumulates_token_usage() {
    let h = Harness::new(
        vec![work_item("p1", Priority::High, WorkStatus::Pending, 0)],
        vec![analysis_response(true), implementation_response("<p>x</p>")],
    );
    let implementer = Implementer::new(h.ctx(config()));

    implementer.run(1).await.unwrap();

    let usage = h.gateway.usage();
    assert_eq!(usage.calls, 2);
    assert_eq!(usage.input_tokens.as_u64(), 200);
    assert_eq!(usage.output_tokens.as_u64(), 100);
}
