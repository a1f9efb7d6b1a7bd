//! The multi-goal dependency graph and its scheduling queries.
//!
//! [`MultiGoalDag`] owns every registered [`Node`] and all
//! [`DependencyEdge`]s between them. Structural analysis (cycle detection,
//! topological order, readiness, parallelizability) is restricted to the
//! **ordering subgraph**: `Enables` edges plus the implicit decomposition
//! arcs from a contributor to its parent goal. Synergistic, conflicting,
//! reinforcing and independent edges never constrain execution order.
//!
//! All queries here are synchronous, pure computations over in-memory state;
//! the graph is mutated only between execution waves by a single owner, so
//! no interior locking is needed.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, json};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::edges::{DependencyEdge, EdgeError};
use crate::node::{Node, NodeSpec};
use crate::types::{NodeStatus, Priority, RelationshipType};

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by graph mutation and query operations.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A node with this id is already registered.
    #[error("node '{id}' is already registered")]
    #[diagnostic(code(goalgraph::graph::duplicate_node))]
    DuplicateNode { id: String },

    /// An operation referenced a node id that is not registered.
    #[error("missing node '{id}'")]
    #[diagnostic(
        code(goalgraph::graph::missing_node),
        help("Register the node with add_node before referencing it.")
    )]
    MissingNode { id: String },

    /// Decomposition target is not a goal.
    #[error("node '{id}' is not a goal and cannot be decomposed")]
    #[diagnostic(code(goalgraph::graph::not_a_goal))]
    NotAGoal { id: String },

    /// No edge matches the requested endpoints/relationship.
    #[error("no {relationship} edge from '{source_id}' to '{target_id}'")]
    #[diagnostic(code(goalgraph::graph::missing_edge))]
    MissingEdge {
        source_id: String,
        target_id: String,
        relationship: RelationshipType,
    },

    /// The ordering subgraph is cyclic, so no topological order exists.
    #[error("ordering subgraph is cyclic; unresolved nodes: {}", unresolved.join(", "))]
    #[diagnostic(
        code(goalgraph::graph::cyclic_ordering),
        help("Run validate() to list every cycle, then break one edge per cycle.")
    )]
    CyclicOrdering { unresolved: Vec<String> },

    /// Edge-level validation failure, re-checked defensively on add_edge.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Edge(#[from] EdgeError),
}

/// Directed multi-relationship graph over goals and tasks.
///
/// Nodes are owned exclusively by the graph after registration; edges are
/// immutable once added (remove and re-add to change a relationship).
///
/// # Examples
///
/// ```rust
/// use goalgraph::graphs::{DependencyEdge, MultiGoalDag};
/// use goalgraph::node::NodeFactory;
/// use goalgraph::types::Priority;
///
/// let mut factory = NodeFactory::new();
/// let mut dag = MultiGoalDag::new();
///
/// let research = factory.create_task("Research", "Survey options", "research", Priority::High);
/// let build = factory.create_task("Build", "Implement the design", "code", Priority::Normal);
/// let research_id = research.id.clone();
/// let build_id = build.id.clone();
///
/// dag.add_node(research)?;
/// dag.add_node(build)?;
/// dag.add_edge(DependencyEdge::between(&research_id, &build_id).enables().build()?)?;
///
/// let (valid, errors) = dag.validate();
/// assert!(valid && errors.is_empty());
/// assert_eq!(dag.execution_order()?, vec![research_id.clone(), build_id]);
/// assert!(dag.get_ready_nodes().contains(&research_id));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct MultiGoalDag {
    nodes: FxHashMap<String, Node>,
    /// Registration order; the deterministic tie-breaker everywhere.
    insertion: Vec<String>,
    edges: Vec<DependencyEdge>,
    outgoing: FxHashMap<String, Vec<usize>>,
    incoming: FxHashMap<String, Vec<usize>>,
}

impl MultiGoalDag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Register a node. Fails if the id is already present.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode { id: node.id });
        }
        tracing::debug!(node = %node.id, title = %node.title, "registering node");
        self.insertion.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.insertion.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Node ids in registration order.
    #[must_use]
    pub fn node_ids(&self) -> &[String] {
        &self.insertion
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.insertion.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insertion.is_empty()
    }

    /// Record a status transition on a registered node.
    ///
    /// This is the mutation execution strategies use at wave boundaries; the
    /// graph itself never changes status on its own.
    pub fn mark_status(&mut self, id: &str, status: NodeStatus) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(id).ok_or_else(|| GraphError::MissingNode {
            id: id.to_string(),
        })?;
        node.mark_status(status);
        Ok(())
    }

    /// Flip every `Failed` node back to `Pending` and return their ids in
    /// registration order. The retry driver in the executors calls this
    /// between attempts.
    pub fn reset_failed(&mut self) -> Vec<String> {
        let mut reset = Vec::new();
        for id in &self.insertion {
            if let Some(node) = self.nodes.get_mut(id)
                && node.status == NodeStatus::Failed
            {
                node.mark_status(NodeStatus::Pending);
                reset.push(id.clone());
            }
        }
        if !reset.is_empty() {
            tracing::info!(count = reset.len(), "reset failed nodes to pending");
        }
        reset
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Register an edge between two already-registered nodes.
    ///
    /// Self-loops are re-checked defensively even though the builder already
    /// rejects them. On error the adjacency structure is left untouched.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> Result<(), GraphError> {
        if edge.source_id == edge.target_id {
            return Err(EdgeError::SelfLoop { id: edge.source_id }.into());
        }
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::MissingNode {
                    id: endpoint.clone(),
                });
            }
        }
        tracing::debug!(
            source = %edge.source_id,
            target = %edge.target_id,
            relationship = %edge.relationship,
            "registering edge"
        );
        let idx = self.edges.len();
        self.outgoing
            .entry(edge.source_id.clone())
            .or_default()
            .push(idx);
        self.incoming
            .entry(edge.target_id.clone())
            .or_default()
            .push(idx);
        self.edges.push(edge);
        Ok(())
    }

    /// Remove the first edge matching the endpoints and relationship.
    ///
    /// Edges are immutable; replacing a relationship is remove + re-add.
    pub fn remove_edge(
        &mut self,
        source_id: &str,
        target_id: &str,
        relationship: RelationshipType,
    ) -> Result<DependencyEdge, GraphError> {
        let idx = self
            .edges
            .iter()
            .position(|e| {
                e.source_id == source_id
                    && e.target_id == target_id
                    && e.relationship == relationship
            })
            .ok_or_else(|| GraphError::MissingEdge {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
                relationship,
            })?;
        let removed = self.edges.remove(idx);
        self.rebuild_indices();
        Ok(removed)
    }

    fn rebuild_indices(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();
        for (idx, edge) in self.edges.iter().enumerate() {
            self.outgoing
                .entry(edge.source_id.clone())
                .or_default()
                .push(idx);
            self.incoming
                .entry(edge.target_id.clone())
                .or_default()
                .push(idx);
        }
    }

    /// All edges in registration order.
    #[must_use]
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Outgoing edges of a node, in registration order.
    #[must_use]
    pub fn edges_from(&self, id: &str) -> Vec<&DependencyEdge> {
        self.outgoing
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Incoming edges of a node, in registration order.
    #[must_use]
    pub fn edges_to(&self, id: &str) -> Vec<&DependencyEdge> {
        self.incoming
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Every edge connecting the unordered pair `{a, b}`.
    #[must_use]
    pub fn edges_between(&self, a: &str, b: &str) -> Vec<&DependencyEdge> {
        self.edges.iter().filter(|e| e.connects(a, b)).collect()
    }

    /// Ids that may never run concurrently with `id`.
    #[must_use]
    pub fn conflict_partners(&self, id: &str) -> FxHashSet<String> {
        self.edges
            .iter()
            .filter(|e| e.relationship == RelationshipType::ConflictsWith)
            .filter_map(|e| {
                if e.source_id == id {
                    Some(e.target_id.clone())
                } else if e.target_id == id {
                    Some(e.source_id.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Decomposition
    // ------------------------------------------------------------------

    /// Register contributors on a goal for progress aggregation.
    ///
    /// Every referenced id must already be registered; the goal itself must
    /// be a goal. No `Enables` edges are inserted (ordering between a
    /// contributor and its parent is an explicit, separate decision), but
    /// the implicit contributor-to-goal arcs do participate in cycle
    /// detection so a goal can never feed its own prerequisites.
    pub fn decompose(
        &mut self,
        goal_id: &str,
        task_ids: &[String],
        subgoal_ids: &[String],
    ) -> Result<(), GraphError> {
        if !self.nodes.contains_key(goal_id) {
            return Err(GraphError::MissingNode {
                id: goal_id.to_string(),
            });
        }
        for id in task_ids.iter().chain(subgoal_ids) {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::MissingNode { id: id.clone() });
            }
        }
        let node = self
            .nodes
            .get_mut(goal_id)
            .ok_or_else(|| GraphError::MissingNode {
                id: goal_id.to_string(),
            })?;
        match &mut node.spec {
            NodeSpec::Goal {
                contributing_tasks,
                contributing_subgoals,
                ..
            } => {
                contributing_tasks.extend(task_ids.iter().cloned());
                contributing_subgoals.extend(subgoal_ids.iter().cloned());
                tracing::debug!(
                    goal = %goal_id,
                    tasks = task_ids.len(),
                    subgoals = subgoal_ids.len(),
                    "registered contributors"
                );
                Ok(())
            }
            NodeSpec::Task { .. } => Err(GraphError::NotAGoal {
                id: goal_id.to_string(),
            }),
        }
    }

    /// Mark a goal's decomposition as finished (or reopen it).
    pub fn set_decomposition_complete(
        &mut self,
        goal_id: &str,
        complete: bool,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(goal_id)
            .ok_or_else(|| GraphError::MissingNode {
                id: goal_id.to_string(),
            })?;
        match &mut node.spec {
            NodeSpec::Goal {
                decomposition_complete,
                ..
            } => {
                *decomposition_complete = complete;
                Ok(())
            }
            NodeSpec::Task { .. } => Err(GraphError::NotAGoal {
                id: goal_id.to_string(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Ordering subgraph analysis
    // ------------------------------------------------------------------

    /// Forward adjacency of the ordering subgraph: `Enables` edges plus the
    /// implicit contributor-to-parent-goal decomposition arcs.
    fn ordering_adjacency(&self) -> FxHashMap<&str, Vec<&str>> {
        let mut adj: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for edge in &self.edges {
            if edge.relationship.is_ordering() {
                adj.entry(edge.source_id.as_str())
                    .or_default()
                    .push(edge.target_id.as_str());
            }
        }
        for id in &self.insertion {
            if let Some(node) = self.nodes.get(id)
                && node.is_goal()
            {
                for contributor in node.contributors() {
                    adj.entry(contributor).or_default().push(id.as_str());
                }
            }
        }
        adj
    }

    /// Detect cycles in the ordering subgraph.
    ///
    /// DFS with a recursion-stack set; each back-edge yields one cycle as
    /// the node-id sequence from the back-edge's target to its source.
    /// Non-ordering edges are excluded because they impose no execution
    /// order.
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        fn dfs<'a>(
            node: &'a str,
            adj: &FxHashMap<&'a str, Vec<&'a str>>,
            visited: &mut FxHashSet<&'a str>,
            on_stack: &mut FxHashSet<&'a str>,
            stack: &mut Vec<&'a str>,
            cycles: &mut Vec<Vec<String>>,
        ) {
            visited.insert(node);
            on_stack.insert(node);
            stack.push(node);
            if let Some(targets) = adj.get(node) {
                for &target in targets {
                    if on_stack.contains(target) {
                        if let Some(pos) = stack.iter().position(|&n| n == target) {
                            cycles.push(stack[pos..].iter().map(|s| (*s).to_string()).collect());
                        }
                    } else if !visited.contains(target) {
                        dfs(target, adj, visited, on_stack, stack, cycles);
                    }
                }
            }
            stack.pop();
            on_stack.remove(node);
        }

        let adj = self.ordering_adjacency();
        let mut visited = FxHashSet::default();
        let mut on_stack = FxHashSet::default();
        let mut stack = Vec::new();
        let mut cycles = Vec::new();
        for id in &self.insertion {
            if !visited.contains(id.as_str()) {
                dfs(
                    id.as_str(),
                    &adj,
                    &mut visited,
                    &mut on_stack,
                    &mut stack,
                    &mut cycles,
                );
            }
        }
        cycles
    }

    /// Structural validation: `(is_valid, errors)`.
    ///
    /// Every cycle becomes one human-readable error, collected rather than
    /// thrown so callers can see all of them before deciding.
    #[must_use]
    pub fn validate(&self) -> (bool, Vec<String>) {
        let errors: Vec<String> = self
            .detect_cycles()
            .into_iter()
            .map(|cycle| format!("dependency cycle detected: {}", cycle.join(" -> ")))
            .collect();
        (errors.is_empty(), errors)
    }

    /// Topological order over the ordering subgraph (Kahn's algorithm).
    ///
    /// Ties among simultaneously-ready nodes are broken by priority
    /// descending (`Critical` first), then by registration order, so the
    /// result is deterministic.
    ///
    /// # Errors
    ///
    /// [`GraphError::CyclicOrdering`] when the ordering subgraph is cyclic;
    /// the unresolved (cycle-bound) node ids are reported.
    pub fn execution_order(&self) -> Result<Vec<String>, GraphError> {
        let adj = self.ordering_adjacency();
        let index_of: FxHashMap<&str, usize> = self
            .insertion
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut in_degree: FxHashMap<&str, usize> =
            self.insertion.iter().map(|id| (id.as_str(), 0)).collect();
        for targets in adj.values() {
            for &target in targets {
                if let Some(deg) = in_degree.get_mut(target) {
                    *deg += 1;
                }
            }
        }

        // Max-heap keyed by (priority, Reverse(registration index)).
        let mut ready: BinaryHeap<(Priority, Reverse<usize>)> = BinaryHeap::new();
        for (id, &deg) in &in_degree {
            if deg == 0
                && let (Some(node), Some(&idx)) = (self.nodes.get(*id), index_of.get(id))
            {
                ready.push((node.priority, Reverse(idx)));
            }
        }

        let mut order: Vec<String> = Vec::with_capacity(self.insertion.len());
        while let Some((_, Reverse(idx))) = ready.pop() {
            let id = &self.insertion[idx];
            order.push(id.clone());
            if let Some(targets) = adj.get(id.as_str()) {
                for &target in targets {
                    if let Some(deg) = in_degree.get_mut(target) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0
                            && let (Some(node), Some(&tidx)) =
                                (self.nodes.get(target), index_of.get(target))
                        {
                            ready.push((node.priority, Reverse(tidx)));
                        }
                    }
                }
            }
        }

        if order.len() != self.insertion.len() {
            let placed: FxHashSet<&str> = order.iter().map(String::as_str).collect();
            let unresolved: Vec<String> = self
                .insertion
                .iter()
                .filter(|id| !placed.contains(id.as_str()))
                .cloned()
                .collect();
            return Err(GraphError::CyclicOrdering { unresolved });
        }
        Ok(order)
    }

    /// Nodes eligible to start now: `Pending`, with every incoming
    /// `Enables` predecessor already `Completed`.
    ///
    /// Decomposition arcs do not gate readiness; they only participate in
    /// cycle analysis.
    #[must_use]
    pub fn get_ready_nodes(&self) -> FxHashSet<String> {
        self.insertion
            .iter()
            .filter(|id| self.is_ready(id))
            .cloned()
            .collect()
    }

    fn is_ready(&self, id: &str) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if node.status != NodeStatus::Pending {
            return false;
        }
        self.edges_to(id).iter().all(|edge| {
            edge.relationship != RelationshipType::Enables
                || self
                    .nodes
                    .get(&edge.source_id)
                    .map(|source| source.status == NodeStatus::Completed)
                    .unwrap_or(false)
        })
    }

    /// Nodes with no ordering path to or from `id` in either direction,
    /// minus `id`'s conflict partners (which may never run concurrently
    /// with it).
    pub fn get_parallelizable_nodes(&self, id: &str) -> Result<FxHashSet<String>, GraphError> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::MissingNode { id: id.to_string() });
        }
        let forward = self.ordering_adjacency();
        let mut reverse: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for (&from, targets) in &forward {
            for &to in targets {
                reverse.entry(to).or_default().push(from);
            }
        }

        let descendants = reachable_from(id, &forward);
        let ancestors = reachable_from(id, &reverse);
        let conflicts = self.conflict_partners(id);

        Ok(self
            .insertion
            .iter()
            .filter(|other| {
                other.as_str() != id
                    && !descendants.contains(other.as_str())
                    && !ancestors.contains(other.as_str())
                    && !conflicts.contains(other.as_str())
            })
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------

    /// Progress of a node in `[0.0, 1.0]`.
    ///
    /// Tasks are binary. Goal progress is the mean of contributor progress,
    /// recursively; a goal with no contributors reports 0.0. A contributor
    /// id that is not (or no longer) registered counts as 0.0 so status
    /// reporting stays total.
    pub fn progress_fraction(&self, id: &str) -> Result<f64, GraphError> {
        let node = self.nodes.get(id).ok_or_else(|| GraphError::MissingNode {
            id: id.to_string(),
        })?;
        let mut visiting = FxHashSet::default();
        Ok(self.progress_inner(node, &mut visiting))
    }

    fn progress_inner<'a>(&'a self, node: &'a Node, visiting: &mut FxHashSet<&'a str>) -> f64 {
        if let Some(progress) = node.local_progress() {
            return progress;
        }
        // A contributor loop contributes nothing rather than recursing forever.
        if !visiting.insert(node.id.as_str()) {
            return 0.0;
        }
        let contributors = node.contributors();
        let progress = if contributors.is_empty() {
            0.0
        } else {
            let total: f64 = contributors
                .iter()
                .map(|cid| {
                    self.nodes
                        .get(*cid)
                        .map(|child| self.progress_inner(child, visiting))
                        .unwrap_or(0.0)
                })
                .sum();
            total / contributors.len() as f64
        };
        visiting.remove(node.id.as_str());
        progress
    }

    // ------------------------------------------------------------------
    // Reporting & serialization
    // ------------------------------------------------------------------

    /// Node counts per status.
    #[must_use]
    pub fn status_counts(&self) -> FxHashMap<NodeStatus, usize> {
        let mut counts = FxHashMap::default();
        for node in self.nodes() {
            *counts.entry(node.status).or_insert(0) += 1;
        }
        counts
    }

    /// Number of registered goals.
    #[must_use]
    pub fn goal_count(&self) -> usize {
        self.nodes().filter(|n| n.is_goal()).count()
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.nodes().filter(|n| n.is_task()).count()
    }

    /// JSON snapshot of the graph (nodes in registration order, then edges).
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "nodes": self.nodes().collect::<Vec<_>>(),
            "edges": &self.edges,
        })
    }

    /// DOT digraph for visualization tooling.
    ///
    /// Ordering edges render as plain arrows; other relationships carry a
    /// label and dashed style so they read as annotations, not order.
    #[must_use]
    pub fn to_dot(&self, name: &str) -> String {
        fn escape(s: &str) -> String {
            s.replace('"', "\\\"")
        }

        let mut out = format!("digraph {name} {{\n");
        for node in self.nodes() {
            out.push_str(&format!(
                "  \"{}\" [label=\"{}\"];\n",
                escape(&node.id),
                escape(&node.title)
            ));
        }
        for edge in &self.edges {
            if edge.relationship.is_ordering() {
                out.push_str(&format!(
                    "  \"{}\" -> \"{}\";\n",
                    escape(&edge.source_id),
                    escape(&edge.target_id)
                ));
            } else {
                out.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\", style=dashed];\n",
                    escape(&edge.source_id),
                    escape(&edge.target_id),
                    edge.relationship
                ));
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Every node reachable from `start` (excluding `start` itself unless it
/// sits on a cycle through itself).
fn reachable_from<'a>(
    start: &'a str,
    adjacency: &FxHashMap<&'a str, Vec<&'a str>>,
) -> FxHashSet<&'a str> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut stack: Vec<&str> = adjacency.get(start).cloned().unwrap_or_default();
    while let Some(node) = stack.pop() {
        if seen.insert(node)
            && let Some(next) = adjacency.get(node)
        {
            stack.extend(next.iter().copied());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeFactory;

    fn task(factory: &mut NodeFactory, title: &str, priority: Priority) -> Node {
        factory.create_task(title, "", "code", priority)
    }

    fn linked_dag(ids: &mut Vec<String>) -> MultiGoalDag {
        // a -> b (enables), plus free-standing c
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        for title in ["a", "b", "c"] {
            let node = task(&mut factory, title, Priority::Normal);
            ids.push(node.id.clone());
            dag.add_node(node).unwrap();
        }
        dag.add_edge(
            DependencyEdge::between(&ids[0], &ids[1])
                .enables()
                .build()
                .unwrap(),
        )
        .unwrap();
        dag
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let node = task(&mut factory, "a", Priority::Normal);
        let clone = node.clone();
        dag.add_node(node).unwrap();
        assert!(matches!(
            dag.add_node(clone),
            Err(GraphError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn add_edge_missing_endpoint_leaves_graph_untouched() {
        let mut ids = Vec::new();
        let mut dag = linked_dag(&mut ids);
        let before = dag.edges().len();
        let err = dag
            .add_edge(
                DependencyEdge::between(&ids[0], "task-ghost")
                    .enables()
                    .build()
                    .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingNode { .. }));
        assert_eq!(dag.edges().len(), before);
        assert!(dag.edges_to("task-ghost").is_empty());
    }

    #[test]
    fn three_node_cycle_detected_and_reported() {
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            let node = task(&mut factory, title, Priority::Normal);
            ids.push(node.id.clone());
            dag.add_node(node).unwrap();
        }
        for (s, t) in [(0, 1), (1, 2), (2, 0)] {
            dag.add_edge(
                DependencyEdge::between(&ids[s], &ids[t])
                    .enables()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        }
        let cycles = dag.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
        for id in &ids {
            assert!(cycles[0].contains(id));
        }
        let (valid, errors) = dag.validate();
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cycle"));
        assert!(matches!(
            dag.execution_order(),
            Err(GraphError::CyclicOrdering { .. })
        ));
    }

    #[test]
    fn non_ordering_edges_never_cycle() {
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let a = task(&mut factory, "a", Priority::Normal);
        let b = task(&mut factory, "b", Priority::Normal);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        dag.add_node(a).unwrap();
        dag.add_node(b).unwrap();
        dag.add_edge(
            DependencyEdge::between(&a_id, &b_id)
                .synergistic("merge")
                .build()
                .unwrap(),
        )
        .unwrap();
        dag.add_edge(
            DependencyEdge::between(&b_id, &a_id)
                .conflicts()
                .build()
                .unwrap(),
        )
        .unwrap();
        assert!(dag.detect_cycles().is_empty());
        assert!(dag.execution_order().is_ok());
    }

    #[test]
    fn execution_order_respects_enables_and_priority() {
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let low = task(&mut factory, "low", Priority::Low);
        let critical = task(&mut factory, "critical", Priority::Critical);
        let blocked = task(&mut factory, "blocked", Priority::Critical);
        let (low_id, critical_id, blocked_id) =
            (low.id.clone(), critical.id.clone(), blocked.id.clone());
        dag.add_node(low).unwrap();
        dag.add_node(critical).unwrap();
        dag.add_node(blocked).unwrap();
        dag.add_edge(
            DependencyEdge::between(&low_id, &blocked_id)
                .enables()
                .build()
                .unwrap(),
        )
        .unwrap();

        let order = dag.execution_order().unwrap();
        assert_eq!(order.len(), 3);
        // Critical outranks low among simultaneously-ready nodes.
        assert_eq!(order[0], critical_id);
        assert_eq!(order[1], low_id);
        assert_eq!(order[2], blocked_id);
    }

    #[test]
    fn ready_and_parallelizable_sets() {
        let mut ids = Vec::new();
        let mut dag = linked_dag(&mut ids);

        let ready = dag.get_ready_nodes();
        assert!(ready.contains(&ids[0]));
        assert!(!ready.contains(&ids[1]));
        assert!(ready.contains(&ids[2]));

        let parallel = dag.get_parallelizable_nodes(&ids[0]).unwrap();
        assert!(parallel.contains(&ids[2]));
        assert!(!parallel.contains(&ids[1]));
        assert!(!parallel.contains(&ids[0]));

        // Completing a unblocks b.
        dag.mark_status(&ids[0], NodeStatus::Completed).unwrap();
        assert!(dag.get_ready_nodes().contains(&ids[1]));
    }

    #[test]
    fn conflict_partner_excluded_from_parallelizable() {
        let mut ids = Vec::new();
        let mut dag = linked_dag(&mut ids);
        dag.add_edge(
            DependencyEdge::between(&ids[0], &ids[2])
                .conflicts()
                .build()
                .unwrap(),
        )
        .unwrap();
        let parallel = dag.get_parallelizable_nodes(&ids[0]).unwrap();
        assert!(!parallel.contains(&ids[2]));
    }

    #[test]
    fn goal_progress_is_mean_of_contributors() {
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let goal = factory.create_goal("g", "", vec![], Priority::Normal);
        let t1 = task(&mut factory, "t1", Priority::Normal);
        let t2 = task(&mut factory, "t2", Priority::Normal);
        let (goal_id, t1_id, t2_id) = (goal.id.clone(), t1.id.clone(), t2.id.clone());
        dag.add_node(goal).unwrap();
        dag.add_node(t1).unwrap();
        dag.add_node(t2).unwrap();
        dag.decompose(&goal_id, &[t1_id.clone(), t2_id.clone()], &[])
            .unwrap();

        assert_eq!(dag.progress_fraction(&goal_id).unwrap(), 0.0);
        dag.mark_status(&t1_id, NodeStatus::Completed).unwrap();
        assert_eq!(dag.progress_fraction(&goal_id).unwrap(), 0.5);
        dag.mark_status(&t2_id, NodeStatus::Completed).unwrap();
        assert_eq!(dag.progress_fraction(&goal_id).unwrap(), 1.0);
    }

    #[test]
    fn nested_goal_progress_recurses() {
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let parent = factory.create_goal("parent", "", vec![], Priority::Normal);
        let child = factory.create_goal("child", "", vec![], Priority::Normal);
        let t = task(&mut factory, "t", Priority::Normal);
        let (parent_id, child_id, t_id) = (parent.id.clone(), child.id.clone(), t.id.clone());
        dag.add_node(parent).unwrap();
        dag.add_node(child).unwrap();
        dag.add_node(t).unwrap();
        dag.decompose(&parent_id, &[], &[child_id.clone()]).unwrap();
        dag.decompose(&child_id, &[t_id.clone()], &[]).unwrap();

        assert_eq!(dag.progress_fraction(&parent_id).unwrap(), 0.0);
        dag.mark_status(&t_id, NodeStatus::Completed).unwrap();
        assert_eq!(dag.progress_fraction(&parent_id).unwrap(), 1.0);
    }

    #[test]
    fn decompose_rejects_unknown_contributor_without_mutation() {
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let goal = factory.create_goal("g", "", vec![], Priority::Normal);
        let goal_id = goal.id.clone();
        dag.add_node(goal).unwrap();
        let err = dag
            .decompose(&goal_id, &["task-ghost".to_string()], &[])
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingNode { .. }));
        assert!(dag.node(&goal_id).unwrap().contributors().is_empty());
    }

    #[test]
    fn decomposition_arc_participates_in_cycle_detection() {
        // goal enables its own contributor: contributor -> goal (implicit)
        // and goal -> contributor (enables) form a 2-cycle.
        let mut factory = NodeFactory::new();
        let mut dag = MultiGoalDag::new();
        let goal = factory.create_goal("g", "", vec![], Priority::Normal);
        let t = task(&mut factory, "t", Priority::Normal);
        let (goal_id, t_id) = (goal.id.clone(), t.id.clone());
        dag.add_node(goal).unwrap();
        dag.add_node(t).unwrap();
        dag.decompose(&goal_id, &[t_id.clone()], &[]).unwrap();
        dag.add_edge(
            DependencyEdge::between(&goal_id, &t_id)
                .enables()
                .build()
                .unwrap(),
        )
        .unwrap();
        assert!(!dag.detect_cycles().is_empty());
    }

    #[test]
    fn remove_edge_then_readd_changes_relationship() {
        let mut ids = Vec::new();
        let mut dag = linked_dag(&mut ids);
        dag.remove_edge(&ids[0], &ids[1], RelationshipType::Enables)
            .unwrap();
        assert!(dag.get_ready_nodes().contains(&ids[1]));
        dag.add_edge(
            DependencyEdge::between(&ids[0], &ids[1])
                .conflicts()
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(dag.edges_between(&ids[0], &ids[1]).len(), 1);
    }

    #[test]
    fn dot_output_has_documented_shape() {
        let mut ids = Vec::new();
        let dag = linked_dag(&mut ids);
        let dot = dag.to_dot("plan");
        assert!(dot.starts_with("digraph plan {"));
        assert!(dot.contains(&format!("\"{}\" [label=\"a\"];", ids[0])));
        assert!(dot.contains(&format!("\"{}\" -> \"{}\";", ids[0], ids[1])));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn status_counts_and_reset_failed() {
        let mut ids = Vec::new();
        let mut dag = linked_dag(&mut ids);
        dag.mark_status(&ids[0], NodeStatus::Failed).unwrap();
        assert_eq!(dag.status_counts()[&NodeStatus::Failed], 1);
        let reset = dag.reset_failed();
        assert_eq!(reset, vec![ids[0].clone()]);
        assert_eq!(dag.node(&ids[0]).unwrap().status, NodeStatus::Pending);
    }
}
