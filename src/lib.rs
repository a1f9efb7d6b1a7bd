//! # Goalgraph: Typed Goal/Task Scheduling Core
//!
//! Goalgraph is the scheduling core of a multi-agent task orchestration
//! platform: a typed dependency graph over goals and tasks, with declared or
//! heuristically-inferred relationships between nodes, cycle detection over
//! the ordering subgraph, and concurrency-aware execution strategies that
//! walk the graph in dependency-respecting waves.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Tasks (executable units) and goals (aggregation targets) as
//!   a tagged sum type with a shared status machine
//! - **Edges**: Typed relationships (`enables`, `synergistic`,
//!   `conflicts_with`, `reinforces`, `independent`) built fluently and
//!   validated in one place
//! - **Detection**: A pure, threshold-configurable classifier inferring an
//!   edge type from two nodes' text
//! - **Graph**: Cycle detection, deterministic topological order, readiness
//!   and parallelizability analysis over the ordering subgraph
//! - **Executors**: Wave-based concurrent execution with conflict
//!   arbitration, synergy grouping, retries, and cancellation
//!
//! ## Quick Start
//!
//! ```rust
//! use goalgraph::executors::{RunStatus, TopologicalExecutor};
//! use goalgraph::orchestrator::GoalOrchestrator;
//! use goalgraph::types::{Priority, RelationshipType};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut orchestrator = GoalOrchestrator::new();
//! let goal = orchestrator.add_goal(
//!     "Launch search",
//!     "Ship the search feature",
//!     vec!["index built".into(), "API live".into()],
//!     Priority::Critical,
//! )?;
//! let index = orchestrator.add_task("Index", "Build the index", "code", Priority::High)?;
//! let api = orchestrator.add_task("API", "Expose the query API", "code", Priority::High)?;
//!
//! // Ordering is explicit; decomposition only aggregates progress.
//! orchestrator.relate(&index, &api, RelationshipType::Enables)?;
//! orchestrator.decompose(&goal, &[index.clone(), api.clone()], &[])?;
//!
//! let report = TopologicalExecutor::new(4)
//!     .run(orchestrator.graph_mut())
//!     .await;
//! assert_eq!(report.status, RunStatus::Completed);
//! assert_eq!(orchestrator.progress(&goal)?, 1.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Status, priority, and relationship enums
//! - [`node`] - Task/goal node model and factory
//! - [`graphs`] - Dependency edges, builder, and the [`graphs::MultiGoalDag`]
//! - [`detection`] - Lexical relationship inference with tunable thresholds
//! - [`executors`] - Topological and synergy-aware execution strategies
//! - [`orchestrator`] - High-level facade tying the pieces together
//! - [`telemetry`] - Tracing bootstrap helpers

pub mod detection;
pub mod executors;
pub mod graphs;
pub mod node;
pub mod orchestrator;
pub mod telemetry;
pub mod types;
pub mod utils;
