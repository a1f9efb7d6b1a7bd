//! Wave-based topological execution of a goal graph.

use futures_util::future::join_all;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::{
    CancelToken, CompletionExecutor, ExecutionContext, ExecutionEvent, ExecutionOutput,
    ExecutionReport, ExecutorError, NodeExecutor, NodeRunResult, ReinforcementApplied, RunStatus,
    collect_reinforcements, finalize_report, sort_for_admission,
};
use crate::graphs::MultiGoalDag;
use crate::types::NodeStatus;

/// Executes ready nodes in dependency-respecting waves.
///
/// Each iteration computes the ready set, admits up to `max_parallel`
/// non-conflicting nodes in priority order, dispatches them concurrently
/// through the injected [`NodeExecutor`], awaits the whole wave, and applies
/// status updates before recomputing readiness. A single node's failure
/// never aborts its wave siblings; it only keeps strict `Enables` successors
/// blocked.
///
/// # Examples
///
/// ```rust
/// use goalgraph::executors::TopologicalExecutor;
///
/// // Four concurrent slots, dry-run executor.
/// let strategy = TopologicalExecutor::new(4);
/// ```
pub struct TopologicalExecutor {
    max_parallel: usize,
    executor: Arc<dyn NodeExecutor>,
    cancel: CancelToken,
}

impl TopologicalExecutor {
    /// New strategy with the default dry-run [`CompletionExecutor`].
    /// `max_parallel` is clamped to at least 1.
    #[must_use]
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            executor: Arc::new(CompletionExecutor),
            cancel: CancelToken::never(),
        }
    }

    /// Inject the per-node executor callback.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn NodeExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Attach a cancellation token; see [`CancelSource`](super::CancelSource).
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive the graph until no node is ready or every node is terminal.
    #[instrument(skip(self, dag), fields(max_parallel = self.max_parallel))]
    pub async fn run(&self, dag: &mut MultiGoalDag) -> ExecutionReport {
        let started = Instant::now();
        let (events_tx, events_rx) = flume::unbounded();
        let mut results: FxHashMap<String, NodeRunResult> = FxHashMap::default();
        let mut reinforcements: Vec<ReinforcementApplied> = Vec::new();
        let mut wave: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(wave, "cancellation observed; stopping dispatch");
                break;
            }
            let mut ready: Vec<String> = dag.get_ready_nodes().into_iter().collect();
            if ready.is_empty() {
                break;
            }
            sort_for_admission(dag, &mut ready);
            let admitted = admit_non_conflicting(dag, &ready, self.max_parallel);
            tracing::debug!(wave, admitted = admitted.len(), "dispatching wave");

            let mut dispatched = Vec::with_capacity(admitted.len());
            let mut joins = Vec::with_capacity(admitted.len());
            for id in &admitted {
                let Some(node) = dag.node(id).cloned() else {
                    continue;
                };
                let _ = dag.mark_status(id, NodeStatus::InProgress);
                let ctx = ExecutionContext::new(
                    id.clone(),
                    wave,
                    events_tx.clone(),
                    self.cancel.clone(),
                );
                let executor = Arc::clone(&self.executor);
                dispatched.push(id.clone());
                joins.push(tokio::spawn(async move { executor.execute(node, ctx).await }));
            }
            let outcomes = join_all(joins).await;
            for (id, joined) in dispatched.into_iter().zip(outcomes) {
                apply_outcome(dag, &id, wave, joined, &mut results, &mut reinforcements);
            }
            wave += 1;
        }

        drop(events_tx);
        let events: Vec<ExecutionEvent> = events_rx.drain().collect();
        finalize_report(
            dag,
            wave,
            started.elapsed().as_secs_f64(),
            results,
            reinforcements,
            events,
        )
    }

    /// Run, then retry `Failed -> Pending` up to `budget` additional times.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::RetryBudgetExhausted`] when failed nodes remain
    /// after the last permitted attempt. A partial run without failures
    /// (cancelled or blocked nodes only) is returned as-is.
    #[instrument(skip(self, dag))]
    pub async fn run_with_retries(
        &self,
        dag: &mut MultiGoalDag,
        budget: u32,
    ) -> Result<ExecutionReport, ExecutorError> {
        let mut report = self.run(dag).await;
        let mut attempts: u32 = 0;
        while report.status != RunStatus::Completed && attempts < budget {
            let reset = dag.reset_failed();
            if reset.is_empty() {
                break;
            }
            attempts += 1;
            tracing::info!(attempt = attempts, retrying = reset.len(), "retrying failed nodes");
            report = self.run(dag).await;
        }
        let failed: Vec<String> = dag
            .nodes()
            .filter(|n| n.status == NodeStatus::Failed)
            .map(|n| n.id.clone())
            .collect();
        if failed.is_empty() {
            Ok(report)
        } else {
            Err(ExecutorError::RetryBudgetExhausted { budget, failed })
        }
    }
}

/// Walk the priority-sorted candidates, skipping any that conflict with a
/// node already admitted to this wave (the skipped node waits for a later
/// wave), until `max` slots are filled.
fn admit_non_conflicting(dag: &MultiGoalDag, sorted: &[String], max: usize) -> Vec<String> {
    let mut admitted: Vec<String> = Vec::new();
    for id in sorted {
        if admitted.len() >= max {
            break;
        }
        let conflicts = dag.conflict_partners(id);
        if admitted.iter().any(|other| conflicts.contains(other)) {
            tracing::debug!(node = %id, "deferring conflicting node to a later wave");
            continue;
        }
        admitted.push(id.clone());
    }
    admitted
}

/// Apply one joined execution outcome to the graph and the result map.
fn apply_outcome(
    dag: &mut MultiGoalDag,
    id: &str,
    wave: u64,
    joined: Result<Result<ExecutionOutput, ExecutorError>, tokio::task::JoinError>,
    results: &mut FxHashMap<String, NodeRunResult>,
    reinforcements: &mut Vec<ReinforcementApplied>,
) {
    let result = match joined {
        Ok(Ok(output)) => {
            let _ = dag.mark_status(id, NodeStatus::Completed);
            collect_reinforcements(dag, id, reinforcements);
            NodeRunResult {
                node_id: id.to_string(),
                status: NodeStatus::Completed,
                output: Some(output.output),
                error: None,
                wave,
            }
        }
        Ok(Err(ExecutorError::Cancelled { .. })) => {
            let _ = dag.mark_status(id, NodeStatus::Cancelled);
            NodeRunResult {
                node_id: id.to_string(),
                status: NodeStatus::Cancelled,
                output: None,
                error: None,
                wave,
            }
        }
        Ok(Err(err)) => {
            let _ = dag.mark_status(id, NodeStatus::Failed);
            tracing::warn!(node = %id, error = %err, "node execution failed");
            NodeRunResult {
                node_id: id.to_string(),
                status: NodeStatus::Failed,
                output: None,
                error: Some(err.to_string()),
                wave,
            }
        }
        Err(join_err) => {
            let _ = dag.mark_status(id, NodeStatus::Failed);
            tracing::error!(node = %id, error = %join_err, "execution task failed to join");
            NodeRunResult {
                node_id: id.to_string(),
                status: NodeStatus::Failed,
                output: None,
                error: Some(join_err.to_string()),
                wave,
            }
        }
    };
    results.insert(id.to_string(), result);
}
