mod common;

use goalgraph::executors::{RunStatus, TopologicalExecutor};
use goalgraph::orchestrator::GoalOrchestrator;
use goalgraph::types::{NodeStatus, Priority, RelationshipType};

#[test]
fn decomposed_goal_aggregates_contributor_progress() {
    let mut orchestrator = GoalOrchestrator::new();
    let goal = orchestrator
        .add_goal("Release", "Ship the release", vec!["green CI".into()], Priority::High)
        .unwrap();
    let t1 = orchestrator
        .add_task("t1", "", "code", Priority::Normal)
        .unwrap();
    let t2 = orchestrator
        .add_task("t2", "", "code", Priority::Normal)
        .unwrap();
    orchestrator
        .decompose(&goal, &[t1.clone(), t2.clone()], &[])
        .unwrap();

    assert_eq!(orchestrator.progress(&goal).unwrap(), 0.0);
    orchestrator
        .graph_mut()
        .mark_status(&t1, NodeStatus::Completed)
        .unwrap();
    assert_eq!(orchestrator.progress(&goal).unwrap(), 0.5);
}

#[test]
fn decompose_does_not_imply_ordering() {
    let mut orchestrator = GoalOrchestrator::new();
    let goal = orchestrator
        .add_goal("g", "", vec![], Priority::Normal)
        .unwrap();
    let task = orchestrator
        .add_task("t", "", "code", Priority::Normal)
        .unwrap();
    orchestrator.decompose(&goal, &[task.clone()], &[]).unwrap();

    // Progress aggregation only: no enables edge was added.
    assert!(orchestrator.graph().edges().is_empty());
    let status = orchestrator.get_status();
    assert_eq!(status.ready.len(), 2, "goal and task are both ready");

    // Ordering is an explicit relate call.
    orchestrator
        .relate(&task, &goal, RelationshipType::Enables)
        .unwrap();
    assert_eq!(orchestrator.get_status().ready, vec![task]);
}

#[test]
fn status_counts_goals_tasks_and_statuses() {
    let mut orchestrator = GoalOrchestrator::new();
    let goal = orchestrator
        .add_goal("g", "", vec![], Priority::Normal)
        .unwrap();
    let t1 = orchestrator
        .add_task("t1", "", "code", Priority::Normal)
        .unwrap();
    let t2 = orchestrator
        .add_task("t2", "", "research", Priority::Low)
        .unwrap();
    orchestrator
        .graph_mut()
        .mark_status(&t1, NodeStatus::Completed)
        .unwrap();

    let status = orchestrator.get_status();
    assert_eq!(status.goals, 1);
    assert_eq!(status.tasks, 2);
    assert_eq!(status.status_counts[&NodeStatus::Completed], 1);
    assert_eq!(status.status_counts[&NodeStatus::Pending], 2);
    let order = status.execution_order.unwrap();
    assert_eq!(order.len(), 3);
    assert!(order.contains(&goal) && order.contains(&t2));
}

#[test]
fn serialization_exposes_nodes_and_edges() {
    let mut orchestrator = GoalOrchestrator::new();
    let a = orchestrator
        .add_task("Fetch", "", "io", Priority::Normal)
        .unwrap();
    let b = orchestrator
        .add_task("Parse", "", "code", Priority::Normal)
        .unwrap();
    orchestrator
        .relate(&a, &b, RelationshipType::Enables)
        .unwrap();

    let value = orchestrator.to_value();
    assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(value["edges"].as_array().unwrap().len(), 1);
    assert_eq!(value["edges"][0]["relationship"], "enables");

    let dot = orchestrator.visualize("plan");
    assert!(dot.starts_with("digraph plan {"));
    assert!(dot.contains(&format!("\"{a}\" [label=\"Fetch\"];")));
    assert!(dot.contains(&format!("\"{a}\" -> \"{b}\";")));
}

#[tokio::test]
async fn facade_end_to_end_run() {
    let mut orchestrator = GoalOrchestrator::new();
    let goal = orchestrator
        .add_goal("Ship", "Ship it", vec![], Priority::Critical)
        .unwrap();
    let build = orchestrator
        .add_task("Build", "", "code", Priority::High)
        .unwrap();
    let test = orchestrator
        .add_task("Test", "", "code", Priority::High)
        .unwrap();
    orchestrator
        .relate(&build, &test, RelationshipType::Enables)
        .unwrap();
    orchestrator
        .decompose(&goal, &[build.clone(), test.clone()], &[])
        .unwrap();

    let report = TopologicalExecutor::new(2)
        .run(orchestrator.graph_mut())
        .await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(orchestrator.progress(&goal).unwrap(), 1.0);

    let status = orchestrator.get_status();
    assert!(status.ready.is_empty());
    assert_eq!(status.status_counts[&NodeStatus::Completed], 3);
}

#[test]
fn decompose_unknown_contributor_errors() {
    let mut orchestrator = GoalOrchestrator::new();
    let goal = orchestrator
        .add_goal("g", "", vec![], Priority::Normal)
        .unwrap();
    let err = orchestrator
        .decompose(&goal, &["task-ghost".to_string()], &[])
        .unwrap_err();
    assert!(err.to_string().contains("missing node"));
}

#[test]
fn infer_relationship_requires_registered_nodes() {
    let orchestrator = GoalOrchestrator::new();
    assert!(orchestrator
        .infer_relationship("task-missing", "task-also-missing")
        .is_err());
}
