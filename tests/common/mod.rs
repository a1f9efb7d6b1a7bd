#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use goalgraph::executors::{ExecutionContext, ExecutionOutput, ExecutorError, NodeExecutor};
use goalgraph::graphs::{DependencyEdge, MultiGoalDag};
use goalgraph::node::{Node, NodeFactory};
use goalgraph::types::Priority;

/// Register a fresh task and return its id.
pub fn add_task(
    dag: &mut MultiGoalDag,
    factory: &mut NodeFactory,
    title: &str,
    priority: Priority,
) -> String {
    let node = factory.create_task(title, "", "code", priority);
    let id = node.id.clone();
    dag.add_node(node).expect("unique factory id");
    id
}

/// Register an `enables` edge.
pub fn enables(dag: &mut MultiGoalDag, source: &str, target: &str) {
    dag.add_edge(
        DependencyEdge::between(source, target)
            .enables()
            .build()
            .expect("distinct endpoints"),
    )
    .expect("registered endpoints");
}

/// One recorded dispatch: the ids sent to the executor, the wave number,
/// and (for groups) the merge strategy.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub ids: Vec<String>,
    pub wave: u64,
    pub strategy: Option<String>,
}

/// Executor double that records every dispatch and succeeds.
#[derive(Clone, Debug, Default)]
pub struct RecordingExecutor {
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// The wave in which a node id was dispatched.
    pub fn wave_of(&self, id: &str) -> Option<u64> {
        self.calls()
            .iter()
            .find(|call| call.ids.iter().any(|i| i == id))
            .map(|call| call.wave)
    }
}

#[async_trait]
impl NodeExecutor for RecordingExecutor {
    async fn execute(
        &self,
        node: Node,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutorError> {
        self.calls.lock().expect("lock poisoned").push(RecordedCall {
            ids: vec![node.id],
            wave: ctx.wave,
            strategy: None,
        });
        Ok(ExecutionOutput::empty())
    }

    async fn execute_group(
        &self,
        nodes: Vec<Node>,
        strategy: Option<String>,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutorError> {
        self.calls.lock().expect("lock poisoned").push(RecordedCall {
            ids: nodes.iter().map(|n| n.id.clone()).collect(),
            wave: ctx.wave,
            strategy,
        });
        Ok(ExecutionOutput::json(serde_json::json!({
            "members": nodes.len(),
        })))
    }
}

/// Executor double failing every node whose title is listed.
#[derive(Clone, Debug, Default)]
pub struct FailingExecutor {
    pub fail_titles: Vec<&'static str>,
}

impl FailingExecutor {
    pub fn failing(titles: &[&'static str]) -> Self {
        Self {
            fail_titles: titles.to_vec(),
        }
    }
}

#[async_trait]
impl NodeExecutor for FailingExecutor {
    async fn execute(
        &self,
        node: Node,
        _ctx: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutorError> {
        if self.fail_titles.contains(&node.title.as_str()) {
            return Err(ExecutorError::NodeFailed {
                id: node.id,
                message: "injected failure".into(),
            });
        }
        Ok(ExecutionOutput::empty())
    }
}

/// Executor double failing the first `failures` executions, then succeeding.
#[derive(Clone, Debug)]
pub struct FlakyExecutor {
    failures_remaining: Arc<AtomicU32>,
}

impl FlakyExecutor {
    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures_remaining: Arc::new(AtomicU32::new(failures)),
        }
    }
}

#[async_trait]
impl NodeExecutor for FlakyExecutor {
    async fn execute(
        &self,
        node: Node,
        _ctx: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutorError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ExecutorError::NodeFailed {
                id: node.id,
                message: "flaky failure".into(),
            });
        }
        Ok(ExecutionOutput::empty())
    }
}
