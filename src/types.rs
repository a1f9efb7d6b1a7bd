//! Core types for the goalgraph scheduling system.
//!
//! This module defines the fundamental enums used throughout goalgraph to
//! classify nodes and edges in a goal/task dependency graph. These are the
//! core domain concepts that define what a plan *is*.
//!
//! # Key Types
//!
//! - [`NodeStatus`]: Lifecycle state of a task or goal
//! - [`Priority`]: Scheduling priority, used to break ties among ready nodes
//! - [`RelationshipType`]: Semantic classification of a dependency edge
//!
//! # Examples
//!
//! ```rust
//! use goalgraph::types::{NodeStatus, Priority, RelationshipType};
//!
//! // Status machine queries
//! assert!(NodeStatus::Completed.is_terminal());
//! assert!(NodeStatus::Failed.can_transition_to(NodeStatus::Pending)); // retry
//!
//! // Priorities order naturally, Critical highest
//! assert!(Priority::Critical > Priority::Low);
//!
//! // Encode for persistence
//! assert_eq!(RelationshipType::ConflictsWith.encode(), "conflicts_with");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a node within a goal graph.
///
/// The intended state machine is
/// `Pending -> InProgress -> {Completed, Failed, Cancelled}` with
/// `Failed -> Pending` permitted as a retry path. `Completed` and `Cancelled`
/// are terminal. [`Node::mark_status`](crate::node::Node::mark_status)
/// records any transition without enforcing legality; execution strategies
/// are the enforcing callers and can consult
/// [`can_transition_to`](Self::can_transition_to).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not yet started; eligible for scheduling once unblocked.
    #[default]
    Pending,
    /// Currently being executed by a strategy.
    InProgress,
    /// Finished successfully. Terminal.
    Completed,
    /// Execution failed. Retryable via `Failed -> Pending`.
    Failed,
    /// Abandoned before completion. Terminal.
    Cancelled,
}

impl NodeStatus {
    /// Returns `true` for states a node can never leave.
    ///
    /// `Failed` is deliberately not terminal: a caller may reset it to
    /// `Pending` until its retry budget runs out.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: NodeStatus) -> bool {
        use NodeStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Failed, Pending)
        )
    }

    /// Encode into the persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Decode a persisted string form. Unknown strings yield `None` so
    /// callers can surface a validation error instead of guessing.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// Scheduling priority of a node.
///
/// The derived ordering places `Low` lowest and `Critical` highest, so
/// sorting descending by priority yields the admission order used by the
/// execution strategies.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Encode into the persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Decode a persisted string form; unknown strings yield `None`.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// Semantic classification of a [`DependencyEdge`](crate::graphs::DependencyEdge).
///
/// Only [`Enables`](Self::Enables) imposes execution order; the other
/// variants describe how two nodes interact without constraining when they
/// run relative to each other (except [`ConflictsWith`](Self::ConflictsWith),
/// which forbids *concurrent* execution but not any particular order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// The source must reach `Completed` before the target may leave
    /// `Pending`. The only ordering/blocking relationship.
    Enables,
    /// Joint execution benefit; edge metadata carries a `strategy` string
    /// describing how the outputs merge.
    Synergistic,
    /// Mutual exclusion: the two endpoints must never both be `InProgress`
    /// at the same time.
    ConflictsWith,
    /// Advisory priority boost applied to the target when the source
    /// completes; edge metadata carries a numeric `boost` factor.
    Reinforces,
    /// No detected interaction. The default classification.
    Independent,
}

impl RelationshipType {
    /// Returns `true` if edges of this type participate in the ordering
    /// subgraph (cycle detection, topological order, readiness).
    #[must_use]
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Enables)
    }

    /// Encode into the persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            Self::Enables => "enables",
            Self::Synergistic => "synergistic",
            Self::ConflictsWith => "conflicts_with",
            Self::Reinforces => "reinforces",
            Self::Independent => "independent",
        }
    }

    /// Decode a persisted string form; unknown strings yield `None`.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "enables" => Some(Self::Enables),
            "synergistic" => Some(Self::Synergistic),
            "conflicts_with" => Some(Self::ConflictsWith),
            "reinforces" => Some(Self::Reinforces),
            "independent" => Some(Self::Independent),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}
