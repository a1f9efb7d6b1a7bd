//! Synergy-aware execution: components of `Synergistic` edges run as units.

use futures_util::future::join_all;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::{
    CancelToken, CompletionExecutor, ExecutionContext, ExecutionEvent, ExecutionOutput,
    ExecutionReport, ExecutorError, NodeExecutor, NodeRunResult, ReinforcementApplied,
    collect_reinforcements, finalize_report,
};
use crate::graphs::MultiGoalDag;
use crate::types::{NodeStatus, Priority, RelationshipType};

/// Wave-based strategy that dispatches synergy components as single units.
///
/// Nodes are partitioned into connected components under `Synergistic`
/// edges; when a component's ready members are admitted they go to the
/// executor together via [`NodeExecutor::execute_group`], which returns one
/// merged result (merge policy from the edges' `strategy` metadata). At
/// admission time `ConflictsWith` pairs are arbitrated: of two conflicting
/// ready units only the higher-priority one enters the wave, the other is
/// deferred.
pub struct SynergyExecutor {
    max_parallel: usize,
    executor: Arc<dyn NodeExecutor>,
    cancel: CancelToken,
}

impl SynergyExecutor {
    /// New strategy with the default dry-run [`CompletionExecutor`].
    /// `max_parallel` counts units per wave and is clamped to at least 1.
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
        let components = synergy_components(dag);
        tracing::debug!(components = components.len(), "partitioned synergy components");

        let (events_tx, events_rx) = flume::unbounded();
        let mut results: FxHashMap<String, NodeRunResult> = FxHashMap::default();
        let mut reinforcements: Vec<ReinforcementApplied> = Vec::new();
        let mut wave: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(wave, "cancellation observed; stopping dispatch");
                break;
            }
            let ready = dag.get_ready_nodes();
            if ready.is_empty() {
                break;
            }

            // A unit is the ready slice of one component. A component whose
            // other members are still blocked contributes its ready members
            // now rather than stalling the whole run.
            let mut units: Vec<Vec<String>> = components
                .iter()
                .map(|component| {
                    component
                        .iter()
                        .filter(|member| ready.contains(*member))
                        .cloned()
                        .collect::<Vec<String>>()
                })
                .filter(|unit| !unit.is_empty())
                .collect();
            sort_units(dag, &mut units);
            let admitted = admit_units(dag, units, self.max_parallel);
            tracing::debug!(wave, units = admitted.len(), "dispatching wave");

            let mut dispatched = Vec::with_capacity(admitted.len());
            let mut joins = Vec::with_capacity(admitted.len());
            for unit in admitted {
                let strategy = merge_strategy(dag, &unit);
                let mut nodes = Vec::with_capacity(unit.len());
                for id in &unit {
                    if let Some(node) = dag.node(id).cloned() {
                        let _ = dag.mark_status(id, NodeStatus::InProgress);
                        nodes.push(node);
                    }
                }
                let lead = unit.first().cloned().unwrap_or_default();
                let ctx =
                    ExecutionContext::new(lead, wave, events_tx.clone(), self.cancel.clone());
                let executor = Arc::clone(&self.executor);
                joins.push(tokio::spawn(async move {
                    let mut nodes = nodes;
                    if nodes.len() == 1 {
                        match nodes.pop() {
                            Some(node) => executor.execute(node, ctx).await,
                            None => Ok(ExecutionOutput::empty()),
                        }
                    } else {
                        executor.execute_group(nodes, strategy, ctx).await
                    }
                }));
                dispatched.push(unit);
            }
            let outcomes = join_all(joins).await;
            for (unit, joined) in dispatched.into_iter().zip(outcomes) {
                apply_unit_outcome(dag, &unit, wave, joined, &mut results, &mut reinforcements);
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
}

/// Connected components under `Synergistic` edges, members and components
/// both in registration order. Nodes without synergy edges form singletons.
fn synergy_components(dag: &MultiGoalDag) -> Vec<Vec<String>> {
    let ids = dag.node_ids();
    let index_of: FxHashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut parent: Vec<usize> = (0..ids.len()).collect();

    fn find(parent: &mut [usize], i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        let mut current = i;
        while parent[current] != root {
            let next = parent[current];
            parent[current] = root;
            current = next;
        }
        root
    }

    for edge in dag.edges() {
        if edge.relationship == RelationshipType::Synergistic
            && let (Some(&a), Some(&b)) = (
                index_of.get(edge.source_id.as_str()),
                index_of.get(edge.target_id.as_str()),
            )
        {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[rb.max(ra)] = rb.min(ra);
            }
        }
    }

    let mut grouped: FxHashMap<usize, Vec<String>> = FxHashMap::default();
    let mut order: Vec<usize> = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let root = find(&mut parent, i);
        let members = grouped.entry(root).or_insert_with(|| {
            order.push(root);
            Vec::new()
        });
        members.push(id.clone());
    }
    order
        .into_iter()
        .filter_map(|root| grouped.remove(&root))
        .collect()
}

/// Sort units for admission: highest member priority first, registration
/// order as the tie-break.
fn sort_units(dag: &MultiGoalDag, units: &mut [Vec<String>]) {
    let index_of: FxHashMap<&str, usize> = dag
        .node_ids()
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    units.sort_by_key(|unit| {
        let priority = unit
            .iter()
            .filter_map(|id| dag.node(id).map(|n| n.priority))
            .max()
            .unwrap_or(Priority::Low);
        let first = unit
            .iter()
            .filter_map(|id| index_of.get(id.as_str()).copied())
            .min()
            .unwrap_or(usize::MAX);
        (std::cmp::Reverse(priority), first)
    });
}

/// Admit units in priority order, deferring any unit with a member that
/// conflicts with a member of an already-admitted unit.
fn admit_units(dag: &MultiGoalDag, sorted: Vec<Vec<String>>, max: usize) -> Vec<Vec<String>> {
    let mut admitted: Vec<Vec<String>> = Vec::new();
    let mut admitted_members: FxHashSet<String> = FxHashSet::default();
    for unit in sorted {
        if admitted.len() >= max {
            break;
        }
        let conflicted = unit.iter().any(|id| {
            dag.conflict_partners(id)
                .iter()
                .any(|partner| admitted_members.contains(partner))
        });
        if conflicted {
            tracing::debug!(unit = ?unit, "deferring conflicting unit to a later wave");
            continue;
        }
        admitted_members.extend(unit.iter().cloned());
        admitted.push(unit);
    }
    admitted
}

/// Merge policy for a unit: the distinct `strategy` strings of its internal
/// synergistic edges, sorted and joined with `+`. `None` for singletons or
/// unlabeled edges.
fn merge_strategy(dag: &MultiGoalDag, unit: &[String]) -> Option<String> {
    let members: FxHashSet<&str> = unit.iter().map(String::as_str).collect();
    let strategies: BTreeSet<&str> = dag
        .edges()
        .iter()
        .filter(|e| {
            e.relationship == RelationshipType::Synergistic
                && members.contains(e.source_id.as_str())
                && members.contains(e.target_id.as_str())
        })
        .filter_map(|e| e.strategy())
        .collect();
    if strategies.is_empty() {
        None
    } else {
        Some(strategies.into_iter().collect::<Vec<_>>().join("+"))
    }
}

/// Apply one joined unit outcome to every member.
fn apply_unit_outcome(
    dag: &mut MultiGoalDag,
    unit: &[String],
    wave: u64,
    joined: Result<Result<ExecutionOutput, ExecutorError>, tokio::task::JoinError>,
    results: &mut FxHashMap<String, NodeRunResult>,
    reinforcements: &mut Vec<ReinforcementApplied>,
) {
    let (status, output, error) = match joined {
        Ok(Ok(out)) => (NodeStatus::Completed, Some(out.output), None),
        Ok(Err(ExecutorError::Cancelled { .. })) => (NodeStatus::Cancelled, None, None),
        Ok(Err(err)) => {
            tracing::warn!(unit = ?unit, error = %err, "unit execution failed");
            (NodeStatus::Failed, None, Some(err.to_string()))
        }
        Err(join_err) => {
            tracing::error!(unit = ?unit, error = %join_err, "execution task failed to join");
            (NodeStatus::Failed, None, Some(join_err.to_string()))
        }
    };
    for id in unit {
        let _ = dag.mark_status(id, status);
        if status == NodeStatus::Completed {
            collect_reinforcements(dag, id, reinforcements);
        }
        results.insert(
            id.clone(),
            NodeRunResult {
                node_id: id.clone(),
                status,
                output: output.clone(),
                error: error.clone(),
                wave,
            },
        );
    }
}
