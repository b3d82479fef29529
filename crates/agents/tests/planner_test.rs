mod common;

use agents::{Planner, PlannerOutcome};
use common::{config, insights_response, work_item, Harness};
use pipeline::{FeatureProposal, Priority, Progress, WorkStatus};

fn backlog() -> Vec<pipeline::WorkItem> {
    vec![
        work_item("done-1", Priority::High, WorkStatus::Completed, 0),
        work_item("open-1", Priority::Low, WorkStatus::Pending, 5),
        work_item("open-2", Priority::Medium, WorkStatus::InProgress, 10),
    ]
}

fn proposal(title: &str) -> FeatureProposal {
    FeatureProposal {
        title: title.to_string(),
        category: "Growth".into(),
        description: format!("Build {title}"),
        priority: Priority::Medium,
        quarter: "Q3 2026".into(),
        reasoning: "Demand".into(),
    }
}

#[tokio::test]
async fn materialize_skips_failed_inserts() {
    let h = Harness::new(backlog(), vec![]);
    h.store.fail_inserts_titled("Referral program");
    let planner = Planner::new(h.ctx(config()));

    let created = planner
        .materialize(&[proposal("Referral program"), proposal("Usage dashboard")])
        .await;

    assert_eq!(created.len(), 1);
    let item = &created[0];
    assert_eq!(item.title, "Usage dashboard");
    assert_eq!(item.status, WorkStatus::Pending);
    assert_eq!(item.progress, Progress::STARTED);
    assert_eq!(item.responsible.as_deref(), Some("Implementer Agent"));
    assert!(item.id.as_str().starts_with("item-"));
    assert_eq!(h.store.all().len(), 4);
}

#[tokio::test]
async fn planning_pass_creates_items_adjusts_priorities_and_saves_report() {
    let h = Harness::new(
        backlog(),
        vec![insights_response(
            &["Onboarding tour", "Keyboard shortcuts"],
            &[("open-1", "High"), ("missing-id", "Low")],
        )],
    );
    let planner = Planner::new(h.ctx(config()));

    let outcome = planner.run().await;

    match outcome {
        PlannerOutcome::Planned {
            created,
            adjustments_applied,
            location,
            insights,
        } => {
            assert_eq!(created.len(), 2);
            assert!(created.iter().all(|i| i.priority == Priority::High));
            assert_eq!(adjustments_applied, 1);
            assert!(location.is_some());
            assert_eq!(insights.recommendations, "Focus on onboarding");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.store.item("open-1").priority, Priority::High);
    assert_eq!(h.store.all().len(), 5);

    let files = h.report_files("planner-");
    assert_eq!(files.len(), 1);
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(saved["priority_adjustments_applied"], 1);
    assert_eq!(saved["stats"]["total"], 3);
    assert_eq!(saved["new_features"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn prompt_is_bounded_by_the_excerpt_limit() {
    let h = Harness::new(backlog(), vec![insights_response(&[], &[])]);
    std::fs::write(h.artifact.path(), "x".repeat(10_000)).unwrap();
    let mut cfg = config();
    cfg.planner.excerpt_chars = 100;
    let planner = Planner::new(h.ctx(cfg));

    planner.run().await;

    let prompt = &h.llm.requests()[0].prompt;
    assert!(prompt.contains(&format!("{}... [truncated]", "x".repeat(100))));
    assert!(!prompt.contains(&"x".repeat(101)));
}

#[tokio::test]
async fn unparsable_insights_fail_without_mutation() {
    let h = Harness::new(backlog(), vec!["Nothing to suggest today.".to_string()]);
    let planner = Planner::new(h.ctx(config()));

    assert!(matches!(planner.run().await, PlannerOutcome::Failed { .. }));
    assert_eq!(h.store.all().len(), 3);
    assert_eq!(h.store.update_count(), 0);
    assert!(h.report_files("planner-").is_empty());
}

#[tokio::test]
async fn empty_backlog_still_plans() {
    let h = Harness::new(vec![], vec![insights_response(&["First feature"], &[])]);
    let planner = Planner::new(h.ctx(config()));

    match planner.run().await {
        PlannerOutcome::Planned { created, .. } => assert_eq!(created.len(), 1),
        other => panic!("unexpected outcome {other:?}"),
    }
}
