//! Dependency graph construction and analysis.
//!
//! The central type is [`MultiGoalDag`], a directed multi-relationship graph
//! over goal and task nodes. Edges are built through the fluent
//! [`EdgeBuilder`] (reached via [`DependencyEdge::between`]) and classified
//! by [`RelationshipType`](crate::types::RelationshipType); only `Enables`
//! edges and implicit decomposition arcs constrain execution order.
//!
//! # Quick Start
//!
//! ```rust
//! use goalgraph::graphs::{DependencyEdge, MultiGoalDag};
//! use goalgraph::node::NodeFactory;
//! use goalgraph::types::Priority;
//!
//! let mut factory = NodeFactory::new();
//! let mut dag = MultiGoalDag::new();
//!
//! let fetch = factory.create_task("Fetch", "Fetch the dataset", "io", Priority::Normal);
//! let train = factory.create_task("Train", "Train the model", "compute", Priority::High);
//! let (fetch_id, train_id) = (fetch.id.clone(), train.id.clone());
//! dag.add_node(fetch)?;
//! dag.add_node(train)?;
//! dag.add_edge(DependencyEdge::between(&fetch_id, &train_id).enables().build()?)?;
//!
//! assert_eq!(dag.execution_order()?, vec![fetch_id, train_id]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod dag;
mod edges;

pub use dag::{GraphError, MultiGoalDag};
pub use edges::{BOOST_KEY, DependencyEdge, EdgeBuilder, EdgeError, STRATEGY_KEY};
