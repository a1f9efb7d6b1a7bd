//! Node model for the goalgraph scheduling system.
//!
//! A [`Node`] is either a concrete unit of work (a *task*) or an aggregation
//! target (a *goal*); the distinction lives in the [`NodeSpec`] sum type so
//! execution strategies can match exhaustively instead of downcasting.
//!
//! Nodes are created through [`NodeFactory`], which assigns fresh unique ids
//! and initializes every node as `Pending`. After creation a node is owned by
//! the [`MultiGoalDag`](crate::graphs::MultiGoalDag) that registers it; only
//! the graph's operations mutate membership, and only execution strategies
//! mutate status during a run.
//!
//! # Examples
//!
//! ```rust
//! use goalgraph::node::NodeFactory;
//! use goalgraph::types::{NodeStatus, Priority};
//!
//! let mut factory = NodeFactory::new();
//! let task = factory.create_task(
//!     "Index corpus",
//!     "Build the search index over the document corpus",
//!     "code",
//!     Priority::High,
//! );
//! assert_eq!(task.status, NodeStatus::Pending);
//! assert!(task.is_task());
//! assert_eq!(task.local_progress(), Some(0.0));
//! ```

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::types::{NodeStatus, Priority};
use crate::utils::id_generator::IdGenerator;

/// Variant-specific payload of a [`Node`].
///
/// Kept as a tagged sum type rather than a trait hierarchy so that strategy
/// code handling both variants is a compile-time-checked `match`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpec {
    /// A concrete, executable unit of work.
    Task {
        /// Free-form routing tag, e.g. `"code"` or `"research"`. Consumed by
        /// the agent-dispatch collaborator, opaque to the core.
        task_type: String,
    },
    /// An aggregation target whose progress is derived from contributors.
    Goal {
        /// Ordered, human-readable completion criteria.
        success_criteria: Vec<String>,
        /// Ids of tasks whose completion contributes to this goal.
        contributing_tasks: FxHashSet<String>,
        /// Ids of subgoals whose completion contributes to this goal.
        contributing_subgoals: FxHashSet<String>,
        /// Whether decomposition is considered finished by the planner.
        decomposition_complete: bool,
    },
}

/// A single node in a goal graph: shared scheduling fields plus the
/// task/goal payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id within the owning graph.
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: NodeStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Task/goal payload.
    pub spec: NodeSpec,
}

impl Node {
    /// Returns `true` if this node is a task.
    #[must_use]
    pub fn is_task(&self) -> bool {
        matches!(self.spec, NodeSpec::Task { .. })
    }

    /// Returns `true` if this node is a goal.
    #[must_use]
    pub fn is_goal(&self) -> bool {
        matches!(self.spec, NodeSpec::Goal { .. })
    }

    /// The routing tag for tasks, `None` for goals.
    #[must_use]
    pub fn task_type(&self) -> Option<&str> {
        match &self.spec {
            NodeSpec::Task { task_type } => Some(task_type),
            NodeSpec::Goal { .. } => None,
        }
    }

    /// Progress derivable from this node alone.
    ///
    /// Tasks are binary: `Some(1.0)` once `Completed`, `Some(0.0)` otherwise.
    /// Goals return `None` because their progress is the recursive mean over
    /// contributors, computed by
    /// [`MultiGoalDag::progress_fraction`](crate::graphs::MultiGoalDag::progress_fraction).
    #[must_use]
    pub fn local_progress(&self) -> Option<f64> {
        match self.spec {
            NodeSpec::Task { .. } => {
                if self.status == NodeStatus::Completed {
                    Some(1.0)
                } else {
                    Some(0.0)
                }
            }
            NodeSpec::Goal { .. } => None,
        }
    }

    /// Record a status transition.
    ///
    /// Legality of the transition is not enforced here; execution strategies
    /// own the state machine and may consult
    /// [`NodeStatus::can_transition_to`] before calling. Illegal-looking
    /// transitions are logged so they show up in traces.
    pub fn mark_status(&mut self, new_status: NodeStatus) {
        if !self.status.can_transition_to(new_status) && self.status != new_status {
            tracing::warn!(
                node = %self.id,
                from = %self.status,
                to = %new_status,
                "recording status transition outside the nominal state machine"
            );
        } else {
            tracing::debug!(node = %self.id, from = %self.status, to = %new_status, "status transition");
        }
        self.status = new_status;
    }

    /// Contributor ids of a goal, tasks first, each set sorted for
    /// deterministic iteration. Empty for tasks.
    #[must_use]
    pub fn contributors(&self) -> Vec<&str> {
        match &self.spec {
            NodeSpec::Task { .. } => Vec::new(),
            NodeSpec::Goal {
                contributing_tasks,
                contributing_subgoals,
                ..
            } => {
                let mut tasks: Vec<&str> = contributing_tasks.iter().map(String::as_str).collect();
                tasks.sort_unstable();
                let mut subgoals: Vec<&str> =
                    contributing_subgoals.iter().map(String::as_str).collect();
                subgoals.sort_unstable();
                tasks.extend(subgoals);
                tasks
            }
        }
    }
}

/// Factory for [`Node`]s.
///
/// Every created node gets a fresh unique id (`task-…`/`goal-…`) and starts
/// `Pending`. The factory is the only place ids are minted, which keeps the
/// graph's uniqueness invariant easy to audit.
#[derive(Debug, Default)]
pub struct NodeFactory {
    ids: IdGenerator,
}

impl NodeFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new(),
        }
    }

    /// Create a task node.
    pub fn create_task(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        task_type: impl Into<String>,
        priority: Priority,
    ) -> Node {
        let node = Node {
            id: self.ids.generate_task_id(),
            title: title.into(),
            description: description.into(),
            status: NodeStatus::Pending,
            priority,
            created_at: Utc::now(),
            spec: NodeSpec::Task {
                task_type: task_type.into(),
            },
        };
        tracing::debug!(node = %node.id, title = %node.title, "created task");
        node
    }

    /// Create a goal node with no contributors registered yet.
    pub fn create_goal(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        success_criteria: Vec<String>,
        priority: Priority,
    ) -> Node {
        let node = Node {
            id: self.ids.generate_goal_id(),
            title: title.into(),
            description: description.into(),
            status: NodeStatus::Pending,
            priority,
            created_at: Utc::now(),
            spec: NodeSpec::Goal {
                success_criteria,
                contributing_tasks: FxHashSet::default(),
                contributing_subgoals: FxHashSet::default(),
                decomposition_complete: false,
            },
        };
        tracing::debug!(node = %node.id, title = %node.title, "created goal");
        node
    }
}
