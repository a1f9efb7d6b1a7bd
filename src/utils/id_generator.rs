//! Unique id generation for nodes and runs.

use uuid::Uuid;

/// Mints the unique ids used across goalgraph.
///
/// Ids are uuid-v4 based with a short kind prefix so logs and DOT output
/// stay readable (`task-…`, `goal-…`, `run-…`).
#[derive(Clone, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn generate_task_id(&self) -> String {
        format!("task-{}", Uuid::new_v4())
    }

    #[must_use]
    pub fn generate_goal_id(&self) -> String {
        format!("goal-{}", Uuid::new_v4())
    }

    #[must_use]
    pub fn generate_run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }
}
