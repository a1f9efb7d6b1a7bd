#[macro_use]
extern crate proptest;

use proptest::prelude::*;
use rustc_hash::FxHashSet;

use goalgraph::detection::{jaccard_similarity, tokenize};
use goalgraph::graphs::{DependencyEdge, MultiGoalDag};
use goalgraph::node::NodeFactory;
use goalgraph::types::{NodeStatus, Priority, RelationshipType};

const MAX_NODES: usize = 8;

/// Build a dag with `n` tasks and the given enables edges (self-loops and
/// out-of-range indices are skipped).
fn build_dag(n: usize, edges: &[(usize, usize)]) -> (MultiGoalDag, Vec<String>) {
    let mut factory = NodeFactory::new();
    let mut dag = MultiGoalDag::new();
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let node = factory.create_task(format!("n{i}"), "", "code", Priority::Normal);
        ids.push(node.id.clone());
        dag.add_node(node).expect("fresh id");
    }
    for &(s, t) in edges {
        if s < n && t < n && s != t {
            dag.add_edge(
                DependencyEdge::between(&ids[s], &ids[t])
                    .enables()
                    .build()
                    .expect("distinct endpoints"),
            )
            .expect("registered endpoints");
        }
    }
    (dag, ids)
}

fn edges_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..MAX_NODES, 0..MAX_NODES), 0..16)
}

proptest! {
    /// detect_cycles() is empty iff execution_order() succeeds, and a
    /// successful order contains every registered node exactly once.
    #[test]
    fn prop_cycles_iff_no_topological_order(
        n in 2..MAX_NODES,
        edges in edges_strategy(),
    ) {
        let (dag, ids) = build_dag(n, &edges);
        let cycles = dag.detect_cycles();
        match dag.execution_order() {
            Ok(order) => {
                prop_assert!(cycles.is_empty());
                prop_assert_eq!(order.len(), ids.len());
                let unique: FxHashSet<&String> = order.iter().collect();
                prop_assert_eq!(unique.len(), order.len());
            }
            Err(_) => prop_assert!(!cycles.is_empty()),
        }
    }

    /// Jaccard similarity is symmetric, bounded, and reflexive for
    /// non-empty token sets.
    #[test]
    fn prop_jaccard_contract(a in "[a-z ]{0,30}", b in "[a-z ]{0,30}") {
        let sim = jaccard_similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&sim));
        prop_assert_eq!(sim, jaccard_similarity(&b, &a));
        if tokenize(&a).is_empty() {
            prop_assert_eq!(jaccard_similarity(&a, &a), 0.0);
        } else {
            prop_assert_eq!(jaccard_similarity(&a, &a), 1.0);
        }
    }

    /// No ready node has a non-completed enables predecessor, for any
    /// combination of completed/pending statuses.
    #[test]
    fn prop_ready_nodes_have_completed_enablers(
        n in 2..MAX_NODES,
        edges in edges_strategy(),
        completed in prop::collection::vec(any::<bool>(), MAX_NODES),
    ) {
        let (mut dag, ids) = build_dag(n, &edges);
        for (i, id) in ids.iter().enumerate() {
            if completed[i] {
                dag.mark_status(id, NodeStatus::Completed).expect("registered");
            }
        }
        let ready = dag.get_ready_nodes();
        for id in &ready {
            prop_assert_eq!(dag.node(id).expect("registered").status, NodeStatus::Pending);
            for edge in dag.edges_to(id) {
                if edge.relationship == RelationshipType::Enables {
                    let source = dag.node(&edge.source_id).expect("registered");
                    prop_assert_eq!(source.status, NodeStatus::Completed);
                }
            }
        }
    }

    /// Parallelizable nodes of `x` are never an ancestor, descendant, or
    /// conflict partner of `x` (checked against an independent BFS).
    #[test]
    fn prop_parallelizable_excludes_related_nodes(
        n in 2..MAX_NODES,
        edges in edges_strategy(),
        conflicts in prop::collection::vec((0..MAX_NODES, 0..MAX_NODES), 0..4),
    ) {
        let (mut dag, ids) = build_dag(n, &edges);
        for &(s, t) in &conflicts {
            if s < n && t < n && s != t {
                dag.add_edge(
                    DependencyEdge::between(&ids[s], &ids[t])
                        .conflicts()
                        .build()
                        .expect("distinct endpoints"),
                )
                .expect("registered endpoints");
            }
        }
        let target = &ids[0];
        let parallel = dag.get_parallelizable_nodes(target).expect("registered");

        // Independent reachability over enables edges only.
        let reachable = |from: &str, forward: bool| -> FxHashSet<String> {
            let mut seen = FxHashSet::default();
            let mut stack = vec![from.to_string()];
            while let Some(current) = stack.pop() {
                for edge in dag.edges() {
                    if edge.relationship != RelationshipType::Enables {
                        continue;
                    }
                    let (a, b) = if forward {
                        (&edge.source_id, &edge.target_id)
                    } else {
                        (&edge.target_id, &edge.source_id)
                    };
                    if *a == current && seen.insert(b.clone()) {
                        stack.push(b.clone());
                    }
                }
            }
            seen
        };
        let descendants = reachable(target, true);
        let ancestors = reachable(target, false);

        prop_assert!(!parallel.contains(target));
        for id in &parallel {
            prop_assert!(!descendants.contains(id));
            prop_assert!(!ancestors.contains(id));
            for edge in dag.edges_between(target, id) {
                prop_assert_ne!(edge.relationship, RelationshipType::ConflictsWith);
            }
        }
    }
}
