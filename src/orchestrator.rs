//! High-level facade over the graph, factory, and detector.
//!
//! [`GoalOrchestrator`] is a thin composition layer: it mints nodes through
//! the [`NodeFactory`], registers them in a [`MultiGoalDag`], declares or
//! infers relationships, and exposes aggregate status plus serialization for
//! downstream collaborators (persistence, dispatch, visualization). It does
//! no scheduling of its own; hand [`graph_mut`](GoalOrchestrator::graph_mut)
//! to an execution strategy for that.
//!
//! # Examples
//!
//! ```rust
//! use goalgraph::orchestrator::GoalOrchestrator;
//! use goalgraph::types::{Priority, RelationshipType};
//!
//! let mut orchestrator = GoalOrchestrator::new();
//! let goal = orchestrator.add_goal(
//!     "Ship v1",
//!     "Ship the first release",
//!     vec!["all tests pass".into()],
//!     Priority::Critical,
//! )?;
//! let build = orchestrator.add_task("Build", "Build the artifact", "code", Priority::High)?;
//! let test = orchestrator.add_task("Test", "Run the test suite", "code", Priority::High)?;
//!
//! orchestrator.relate(&build, &test, RelationshipType::Enables)?;
//! orchestrator.decompose(&goal, &[build.clone(), test.clone()], &[])?;
//!
//! let status = orchestrator.get_status();
//! assert_eq!(status.goals, 1);
//! assert_eq!(status.tasks, 2);
//! assert!(status.validation_errors.is_empty());
//! # Ok::<(), goalgraph::orchestrator::OrchestratorError>(())
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::detection::{DetectedRelationship, RelationshipDetector};
use crate::graphs::{DependencyEdge, EdgeError, GraphError, MultiGoalDag};
use crate::node::NodeFactory;
use crate::types::{NodeStatus, Priority, RelationshipType};

/// Merge policy recorded on synergistic edges created without an explicit
/// strategy (simple `relate` calls and inferred edges).
pub const DEFAULT_MERGE_STRATEGY: &str = "merge";

/// Errors surfaced by the facade; unions the graph and edge taxonomies.
#[derive(Debug, Error, Diagnostic)]
pub enum OrchestratorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Edge(#[from] EdgeError),
}

/// Aggregate view returned by [`GoalOrchestrator::get_status`].
///
/// Always reflects the latest known per-node state, including failed and
/// cancelled nodes, so callers can present partial-success results.
#[derive(Clone, Debug, Serialize)]
pub struct OrchestratorStatus {
    pub goals: usize,
    pub tasks: usize,
    pub status_counts: FxHashMap<NodeStatus, usize>,
    /// Ready node ids in registration order.
    pub ready: Vec<String>,
    /// Topological order, `None` while the ordering subgraph is cyclic.
    pub execution_order: Option<Vec<String>>,
    /// One human-readable entry per detected cycle.
    pub validation_errors: Vec<String>,
}

/// Facade composing factory, graph, and relationship detector.
#[derive(Debug, Default)]
pub struct GoalOrchestrator {
    dag: MultiGoalDag,
    factory: NodeFactory,
    detector: RelationshipDetector,
}

impl GoalOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the relationship detector (e.g. with tuned thresholds).
    #[must_use]
    pub fn with_detector(mut self, detector: RelationshipDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Create and register a task; returns its id.
    pub fn add_task(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        task_type: impl Into<String>,
        priority: Priority,
    ) -> Result<String, OrchestratorError> {
        let node = self
            .factory
            .create_task(title, description, task_type, priority);
        let id = node.id.clone();
        self.dag.add_node(node)?;
        Ok(id)
    }

    /// Create and register a goal; returns its id.
    pub fn add_goal(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        success_criteria: Vec<String>,
        priority: Priority,
    ) -> Result<String, OrchestratorError> {
        let node = self
            .factory
            .create_goal(title, description, success_criteria, priority);
        let id = node.id.clone();
        self.dag.add_node(node)?;
        Ok(id)
    }

    /// Declare a relationship with default weight and metadata.
    ///
    /// Synergistic edges get [`DEFAULT_MERGE_STRATEGY`] and reinforcing
    /// edges a boost of 1.0; use [`relate_with`](Self::relate_with) with a
    /// fully-built [`DependencyEdge`] for anything richer.
    pub fn relate(
        &mut self,
        source_id: &str,
        target_id: &str,
        relationship: RelationshipType,
    ) -> Result<(), OrchestratorError> {
        let builder = DependencyEdge::between(source_id, target_id);
        let builder = match relationship {
            RelationshipType::Enables => builder.enables(),
            RelationshipType::Synergistic => builder.synergistic(DEFAULT_MERGE_STRATEGY),
            RelationshipType::ConflictsWith => builder.conflicts(),
            RelationshipType::Reinforces => builder.reinforces(1.0),
            RelationshipType::Independent => builder.independent(),
        };
        self.relate_with(builder.build()?)
    }

    /// Register a pre-built edge.
    pub fn relate_with(&mut self, edge: DependencyEdge) -> Result<(), OrchestratorError> {
        self.dag.add_edge(edge)?;
        Ok(())
    }

    /// Classify the relationship between two registered nodes without
    /// touching the graph.
    pub fn infer_relationship(
        &self,
        a_id: &str,
        b_id: &str,
    ) -> Result<DetectedRelationship, OrchestratorError> {
        let a = self.node_or_err(a_id)?;
        let b = self.node_or_err(b_id)?;
        Ok(self.detector.detect_directed(a, b))
    }

    /// Infer the relationship and, unless it is `Independent`, register the
    /// corresponding edge (directed per the detection). Returns what was
    /// detected; `None` means no edge was added.
    pub fn relate_inferred(
        &mut self,
        a_id: &str,
        b_id: &str,
    ) -> Result<Option<DetectedRelationship>, OrchestratorError> {
        let detected = self.infer_relationship(a_id, b_id)?;
        if detected.relationship == RelationshipType::Independent {
            return Ok(None);
        }
        let builder = DependencyEdge::between(&detected.source_id, &detected.target_id);
        let builder = match detected.relationship {
            RelationshipType::Enables => builder.enables(),
            RelationshipType::Synergistic => builder.synergistic(DEFAULT_MERGE_STRATEGY),
            RelationshipType::ConflictsWith => builder.conflicts(),
            RelationshipType::Reinforces => builder.reinforces(1.0),
            RelationshipType::Independent => builder.independent(),
        };
        self.dag.add_edge(builder.build()?)?;
        Ok(Some(detected))
    }

    /// Register contributors on a goal for progress aggregation.
    ///
    /// No `Enables` edges are inserted; ordering between a contributor and
    /// its parent goal is an explicit, separate [`relate`](Self::relate)
    /// call.
    pub fn decompose(
        &mut self,
        goal_id: &str,
        task_ids: &[String],
        subgoal_ids: &[String],
    ) -> Result<(), OrchestratorError> {
        self.dag.decompose(goal_id, task_ids, subgoal_ids)?;
        Ok(())
    }

    /// Progress of a node in `[0.0, 1.0]`; goals aggregate recursively.
    pub fn progress(&self, id: &str) -> Result<f64, OrchestratorError> {
        Ok(self.dag.progress_fraction(id)?)
    }

    /// Aggregate counts, readiness, ordering, and validation findings.
    #[must_use]
    pub fn get_status(&self) -> OrchestratorStatus {
        let ready_set = self.dag.get_ready_nodes();
        let ready: Vec<String> = self
            .dag
            .node_ids()
            .iter()
            .filter(|id| ready_set.contains(*id))
            .cloned()
            .collect();
        let (_, validation_errors) = self.dag.validate();
        OrchestratorStatus {
            goals: self.dag.goal_count(),
            tasks: self.dag.task_count(),
            status_counts: self.dag.status_counts(),
            ready,
            execution_order: self.dag.execution_order().ok(),
            validation_errors,
        }
    }

    /// JSON snapshot of the underlying graph.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.dag.to_value()
    }

    /// DOT digraph of the underlying graph for visualization tooling.
    #[must_use]
    pub fn visualize(&self, name: &str) -> String {
        self.dag.to_dot(name)
    }

    /// Read access to the underlying graph.
    #[must_use]
    pub fn graph(&self) -> &MultiGoalDag {
        &self.dag
    }

    /// Mutable access to the underlying graph, e.g. for handing to an
    /// execution strategy.
    pub fn graph_mut(&mut self) -> &mut MultiGoalDag {
        &mut self.dag
    }

    fn node_or_err(&self, id: &str) -> Result<&crate::node::Node, OrchestratorError> {
        self.dag
            .node(id)
            .ok_or_else(|| GraphError::MissingNode { id: id.to_string() }.into())
    }
}
