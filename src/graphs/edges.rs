//! Typed dependency edges and their fluent builder.
//!
//! Edges are immutable once built: to change a relationship, remove the edge
//! from the graph and add a new one. All validation happens in one place,
//! [`EdgeBuilder::build`], and is re-checked defensively by
//! [`MultiGoalDag::add_edge`](crate::graphs::MultiGoalDag::add_edge).
//!
//! # Examples
//!
//! ```rust
//! use goalgraph::graphs::DependencyEdge;
//! use goalgraph::types::RelationshipType;
//!
//! let edge = DependencyEdge::between("task-a", "task-b")
//!     .synergistic("merge-summaries")
//!     .with_weight(2.0)
//!     .build()
//!     .unwrap();
//! assert_eq!(edge.relationship, RelationshipType::Synergistic);
//! assert_eq!(edge.strategy(), Some("merge-summaries"));
//!
//! // Self-loops are rejected at build time.
//! assert!(DependencyEdge::between("task-a", "task-a").enables().build().is_err());
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::RelationshipType;
use crate::utils::collections::new_metadata_map;

/// Metadata key carrying the merge policy of a synergistic edge.
pub const STRATEGY_KEY: &str = "strategy";
/// Metadata key carrying the boost factor of a reinforcing edge.
pub const BOOST_KEY: &str = "boost";

/// Errors raised while constructing or registering an edge.
#[derive(Debug, Error, Diagnostic)]
pub enum EdgeError {
    /// Source and target are the same node.
    #[error("self-loop edge on node '{id}'")]
    #[diagnostic(
        code(goalgraph::edges::self_loop),
        help("An edge must connect two distinct nodes.")
    )]
    SelfLoop { id: String },

    /// Edge weight is NaN or infinite.
    #[error("non-finite edge weight {weight} on edge '{source_id}' -> '{target_id}'")]
    #[diagnostic(code(goalgraph::edges::non_finite_weight))]
    NonFiniteWeight {
        source_id: String,
        target_id: String,
        weight: f64,
    },
}

/// A directed, typed edge between two registered nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source_id: String,
    pub target_id: String,
    pub relationship: RelationshipType,
    /// Relative strength of the relationship; defaults to 1.0.
    pub weight: f64,
    /// String-keyed auxiliary data (`strategy`, `boost`, caller extras).
    pub metadata: FxHashMap<String, Value>,
}

impl DependencyEdge {
    /// Start building an edge between two node ids.
    #[must_use]
    pub fn between(source_id: impl Into<String>, target_id: impl Into<String>) -> EdgeBuilder {
        EdgeBuilder::new(source_id, target_id)
    }

    /// The merge policy of a synergistic edge, if present.
    #[must_use]
    pub fn strategy(&self) -> Option<&str> {
        self.metadata.get(STRATEGY_KEY).and_then(Value::as_str)
    }

    /// The boost factor of a reinforcing edge, if present.
    #[must_use]
    pub fn boost(&self) -> Option<f64> {
        self.metadata.get(BOOST_KEY).and_then(Value::as_f64)
    }

    /// Whether this edge connects the unordered pair `{a, b}`.
    #[must_use]
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source_id == a && self.target_id == b)
            || (self.source_id == b && self.target_id == a)
    }
}

/// Fluent builder for [`DependencyEdge`].
///
/// Each relationship method overwrites the previous choice, so the last call
/// before [`build`](Self::build) wins. The default relationship is
/// [`Independent`](RelationshipType::Independent).
#[derive(Debug)]
pub struct EdgeBuilder {
    source_id: String,
    target_id: String,
    relationship: RelationshipType,
    weight: f64,
    metadata: FxHashMap<String, Value>,
}

impl EdgeBuilder {
    #[must_use]
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship: RelationshipType::Independent,
            weight: 1.0,
            metadata: new_metadata_map(),
        }
    }

    /// Ordering/blocking: source must complete before target starts.
    #[must_use]
    pub fn enables(mut self) -> Self {
        self.relationship = RelationshipType::Enables;
        self
    }

    /// Joint execution benefit with the given output-merge policy.
    #[must_use]
    pub fn synergistic(mut self, strategy: impl Into<String>) -> Self {
        self.relationship = RelationshipType::Synergistic;
        self.metadata
            .insert(STRATEGY_KEY.to_string(), Value::String(strategy.into()));
        self
    }

    /// Mutual exclusion: the endpoints must never run concurrently.
    #[must_use]
    pub fn conflicts(mut self) -> Self {
        self.relationship = RelationshipType::ConflictsWith;
        self
    }

    /// Advisory boost applied to the target when the source completes.
    #[must_use]
    pub fn reinforces(mut self, boost_factor: f64) -> Self {
        self.relationship = RelationshipType::Reinforces;
        self.metadata
            .insert(BOOST_KEY.to_string(), Value::from(boost_factor));
        self
    }

    /// Explicitly mark the pair as non-interacting.
    #[must_use]
    pub fn independent(mut self) -> Self {
        self.relationship = RelationshipType::Independent;
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Attach an arbitrary metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Finalize and validate the edge.
    ///
    /// # Errors
    ///
    /// [`EdgeError::SelfLoop`] when source and target are identical, and
    /// [`EdgeError::NonFiniteWeight`] when the weight is NaN or infinite.
    pub fn build(self) -> Result<DependencyEdge, EdgeError> {
        if self.source_id == self.target_id {
            return Err(EdgeError::SelfLoop { id: self.source_id });
        }
        if !self.weight.is_finite() {
            return Err(EdgeError::NonFiniteWeight {
                source_id: self.source_id,
                target_id: self.target_id,
                weight: self.weight,
            });
        }
        Ok(DependencyEdge {
            source_id: self.source_id,
            target_id: self.target_id,
            relationship: self.relationship,
            weight: self.weight,
            metadata: self.metadata,
        })
    }
}
