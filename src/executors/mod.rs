//! Execution strategies: walking a [`MultiGoalDag`] in dependency-respecting
//! waves.
//!
//! A strategy repeatedly computes the ready set, admits up to `max_parallel`
//! nodes (priority first, conflicts arbitrated), dispatches them through an
//! injected [`NodeExecutor`], and applies status updates at the wave
//! barrier. The graph is only ever mutated between waves, so the per-node
//! executor is the sole concurrent operation.
//!
//! - [`TopologicalExecutor`]: one node per dispatch.
//! - [`SynergyExecutor`]: synergy components dispatched as single units.
//!
//! The default [`CompletionExecutor`] marks nodes completed without side
//! effects; it is an ordinary injectable value, useful for dry runs and
//! tests.
//!
//! # Examples
//!
//! ```rust
//! use goalgraph::executors::{RunStatus, TopologicalExecutor};
//! use goalgraph::graphs::{DependencyEdge, MultiGoalDag};
//! use goalgraph::node::NodeFactory;
//! use goalgraph::types::Priority;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut factory = NodeFactory::new();
//! let mut dag = MultiGoalDag::new();
//! let a = factory.create_task("a", "", "code", Priority::Normal);
//! let b = factory.create_task("b", "", "code", Priority::Normal);
//! let (a_id, b_id) = (a.id.clone(), b.id.clone());
//! dag.add_node(a)?;
//! dag.add_node(b)?;
//! dag.add_edge(DependencyEdge::between(&a_id, &b_id).enables().build()?)?;
//!
//! let report = TopologicalExecutor::new(4).run(&mut dag).await;
//! assert_eq!(report.status, RunStatus::Completed);
//! assert_eq!(report.nodes_completed, 2);
//! # Ok(())
//! # }
//! ```

mod synergy;
mod topological;

pub use synergy::SynergyExecutor;
pub use topological::TopologicalExecutor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use thiserror::Error;
use tokio::sync::watch;

use crate::graphs::{GraphError, MultiGoalDag};
use crate::node::Node;
use crate::types::NodeStatus;

// ============================================================================
// Core Trait
// ============================================================================

/// A pluggable per-node execution callback.
///
/// Implementations route a node to whatever actually does the work (an agent
/// dispatch table, a subprocess, a test double). They must be safe to run
/// concurrently for any two non-conflicting nodes, and are expected to honor
/// [`ExecutionContext::cancel`] by returning
/// [`ExecutorError::Cancelled`] instead of finishing.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Execute a single node, returning its structured output.
    async fn execute(
        &self,
        node: Node,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutorError>;

    /// Execute a synergy component as one unit and return one merged result.
    ///
    /// `strategy` is the merge policy taken from the component's
    /// `Synergistic` edge metadata. The default implementation runs the
    /// members sequentially and concatenates their outputs into a JSON
    /// array, ignoring the policy.
    async fn execute_group(
        &self,
        nodes: Vec<Node>,
        _strategy: Option<String>,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutorError> {
        let mut outputs = Vec::with_capacity(nodes.len());
        for node in nodes {
            let result = self.execute(node, ctx.clone()).await?;
            outputs.push(result.output);
        }
        Ok(ExecutionOutput::json(Value::Array(outputs)))
    }
}

/// Default dry-run executor: emits one event and succeeds with no output.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompletionExecutor;

#[async_trait]
impl NodeExecutor for CompletionExecutor {
    async fn execute(
        &self,
        node: Node,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutorError> {
        ctx.emit("dry-run", format!("completing '{}'", node.title)).ok();
        Ok(ExecutionOutput::empty())
    }
}

// ============================================================================
// Execution Context & Cancellation
// ============================================================================

/// Context handed to a [`NodeExecutor`] for one dispatch.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    /// Id of the node being executed (for groups: the unit's first member).
    pub node_id: String,
    /// Zero-based wave number.
    pub wave: u64,
    /// Cooperative cancellation signal for the overall run.
    pub cancel: CancelToken,
    events: flume::Sender<ExecutionEvent>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        wave: u64,
        events: flume::Sender<ExecutionEvent>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            wave,
            cancel,
            events,
        }
    }

    /// Emit a node-scoped progress event enriched with this context's
    /// metadata. Collected into [`ExecutionReport::events`].
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ExecutorError> {
        self.events
            .send(ExecutionEvent {
                when: Utc::now(),
                wave: self.wave,
                node_id: self.node_id.clone(),
                scope: scope.into(),
                message: message.into(),
            })
            .map_err(|_| ExecutorError::EventChannelClosed)
    }
}

/// Cancels a run; hand its [`token`](Self::token) to an executor.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSource {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
            _keep_alive: None,
        }
    }

    /// Signal cancellation: no further waves are dispatched and in-flight
    /// executions are expected to wind down as `Cancelled`.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cooperative cancellation signal observed by executors and wave loops.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    // Keeps the sender alive for never-cancelled tokens.
    _keep_alive: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl CancelToken {
    /// A token that is never cancelled; the default for executors.
    #[must_use]
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keep_alive: Some(std::sync::Arc::new(tx)),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is signalled; pends forever on a
    /// never-cancelled token.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// ============================================================================
// Results & Reports
// ============================================================================

/// Structured output of one node (or synergy unit) execution.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExecutionOutput {
    pub output: Value,
}

impl ExecutionOutput {
    /// Successful execution with no payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Successful execution carrying a JSON payload.
    #[must_use]
    pub fn json(output: Value) -> Self {
        Self { output }
    }
}

/// Progress event emitted by an executor through [`ExecutionContext::emit`].
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionEvent {
    pub when: DateTime<Utc>,
    pub wave: u64,
    pub node_id: String,
    pub scope: String,
    pub message: String,
}

/// Final per-node record in an [`ExecutionReport`].
#[derive(Clone, Debug, Serialize)]
pub struct NodeRunResult {
    pub node_id: String,
    pub status: NodeStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// Wave in which the node was dispatched.
    pub wave: u64,
}

/// Advisory priority boost recorded when a `Reinforces` source completed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReinforcementApplied {
    pub source_id: String,
    pub target_id: String,
    pub boost: f64,
}

/// Overall outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every node completed successfully.
    Completed,
    /// Some nodes completed; others failed, were cancelled, or stayed
    /// blocked behind a failed predecessor.
    Partial,
    /// No node completed.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Aggregate summary returned by the execution strategies.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionReport {
    pub status: RunStatus,
    /// Nodes in `Completed` status when the run ended.
    pub nodes_completed: usize,
    /// Number of waves dispatched.
    pub waves: u64,
    pub duration_seconds: f64,
    /// Per-node outcomes for every dispatched node.
    pub results: FxHashMap<String, NodeRunResult>,
    /// Boosts recorded from `Reinforces` edges whose source completed.
    pub reinforcements: Vec<ReinforcementApplied>,
    /// Events emitted during the run, in emission order.
    pub events: Vec<ExecutionEvent>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by executors and wave loops.
///
/// A node-level failure is recorded on the node (and its report entry) and
/// never aborts siblings in the same wave; it only blocks strict `Enables`
/// successors of that node.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// The per-node callback reported failure.
    #[error("node '{id}' failed: {message}")]
    #[diagnostic(code(goalgraph::executors::node_failed))]
    NodeFailed { id: String, message: String },

    /// Execution observed the cancellation signal and stopped.
    #[error("node '{id}' cancelled")]
    #[diagnostic(code(goalgraph::executors::cancelled))]
    Cancelled { id: String },

    /// A dispatched task panicked or was aborted.
    #[error("execution task failed to join: {0}")]
    #[diagnostic(code(goalgraph::executors::join))]
    Join(#[from] tokio::task::JoinError),

    /// `Failed -> Pending` retries exceeded the caller-supplied budget.
    #[error("retry budget of {budget} exhausted; still failed: {}", failed.join(", "))]
    #[diagnostic(
        code(goalgraph::executors::retry_budget_exhausted),
        help("Inspect the failing nodes' errors in the last report, or raise the budget.")
    )]
    RetryBudgetExhausted { budget: u32, failed: Vec<String> },

    /// JSON serialization error inside an executor.
    #[error(transparent)]
    #[diagnostic(code(goalgraph::executors::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Event could not be emitted because the run's channel is closed.
    #[error("failed to emit event: event channel closed")]
    #[diagnostic(code(goalgraph::executors::event_channel_closed))]
    EventChannelClosed,

    /// Graph-level error while driving the run.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

// ============================================================================
// Shared wave helpers
// ============================================================================

/// Sort candidate ids for admission: priority descending, then registration
/// order, so waves are deterministic.
pub(crate) fn sort_for_admission(dag: &MultiGoalDag, ids: &mut [String]) {
    let index_of: FxHashMap<&str, usize> = dag
        .node_ids()
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    ids.sort_by_key(|id| {
        let priority = dag.node(id).map(|n| n.priority).unwrap_or_default();
        let index = index_of.get(id.as_str()).copied().unwrap_or(usize::MAX);
        (Reverse(priority), index)
    });
}

/// Summarize the dag's terminal state into a report.
pub(crate) fn finalize_report(
    dag: &MultiGoalDag,
    waves: u64,
    duration_seconds: f64,
    results: FxHashMap<String, NodeRunResult>,
    reinforcements: Vec<ReinforcementApplied>,
    events: Vec<ExecutionEvent>,
) -> ExecutionReport {
    let total = dag.len();
    let nodes_completed = dag
        .nodes()
        .filter(|n| n.status == NodeStatus::Completed)
        .count();
    let status = if nodes_completed == total {
        RunStatus::Completed
    } else if nodes_completed > 0 {
        RunStatus::Partial
    } else {
        RunStatus::Failed
    };
    tracing::info!(
        %status,
        nodes_completed,
        total,
        waves,
        duration_seconds,
        "run finished"
    );
    ExecutionReport {
        status,
        nodes_completed,
        waves,
        duration_seconds,
        results,
        reinforcements,
        events,
    }
}

/// Record reinforcement boosts for every `Reinforces` edge leaving a node
/// that just completed.
pub(crate) fn collect_reinforcements(
    dag: &MultiGoalDag,
    completed_id: &str,
    out: &mut Vec<ReinforcementApplied>,
) {
    for edge in dag.edges_from(completed_id) {
        if edge.relationship == crate::types::RelationshipType::Reinforces {
            out.push(ReinforcementApplied {
                source_id: edge.source_id.clone(),
                target_id: edge.target_id.clone(),
                boost: edge.boost().unwrap_or(1.0),
            });
        }
    }
}
