//! Property tests for readiness and ordering over random acyclic graphs.

use proptest::prelude::*;
use std::collections::HashMap;

use swarmcore::domain::models::TodoStatus;
use swarmcore::services::{DependencyResolver, TaskGraph};

const STATUSES: [TodoStatus; 4] = [
    TodoStatus::Pending,
    TodoStatus::InProgress,
    TodoStatus::Completed,
    TodoStatus::Cancelled,
];

/// Groups `g0..gN`; an edge always points from a higher index to a lower one,
/// so every generated graph is acyclic.
#[derive(Debug, Clone)]
struct GraphShape {
    deps: Vec<Vec<usize>>,
    todos: Vec<Vec<usize>>,
}

fn graph_shape() -> impl Strategy<Value = GraphShape> {
    (1usize..10).prop_flat_map(|size| {
        let deps = (0..size)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i.min(3)))
            .collect::<Vec<_>>();
        let todos = proptest::collection::vec(proptest::collection::vec(0usize..4, 0..4), size);
        (deps, todos).prop_map(|(deps, todos)| GraphShape { deps, todos })
    })
}

fn build(shape: &GraphShape) -> TaskGraph {
    tokio_test::block_on(async {
        let graph = TaskGraph::new();
        for (i, deps) in shape.deps.iter().enumerate() {
            graph
                .create_group(
                    format!("g{i}"),
                    "dev",
                    "",
                    deps.iter().map(|d| format!("g{d}")),
                )
                .await
                .unwrap();
            for (n, status) in shape.todos[i].iter().enumerate() {
                let id = graph.add_todo(&format!("g{i}"), format!("todo {n}")).await.unwrap();
                graph
                    .set_todo_status(&format!("g{i}"), id, STATUSES[*status])
                    .await
                    .unwrap();
            }
        }
        graph
    })
}

proptest! {
    /// Every ready group is incomplete and all of its dependencies have
    /// every todo completed.
    #[test]
    fn prop_ready_groups_have_satisfied_dependencies(shape in graph_shape()) {
        let graph = build(&shape);
        let (ready, groups) = tokio_test::block_on(async {
            (graph.ready_groups().await, graph.groups().await)
        });
        let by_id: HashMap<_, _> = groups.iter().map(|g| (g.group_id.clone(), g)).collect();

        for group in &ready {
            prop_assert!(!group.is_complete());
            for dep in &group.dependencies {
                prop_assert!(by_id[dep].satisfies_dependents(), "{dep} not satisfied");
            }
        }
    }

    /// Readiness has no side effects: asking twice gives the same answer.
    #[test]
    fn prop_ready_groups_idempotent(shape in graph_shape()) {
        let graph = build(&shape);
        let (first, second) = tokio_test::block_on(async {
            (graph.ready_groups().await, graph.ready_groups().await)
        });
        prop_assert_eq!(first, second);
    }

    /// Without cancelled todos an incomplete graph always has a ready group.
    #[test]
    fn prop_no_stall_without_cancellation(shape in graph_shape()) {
        let has_cancelled = shape.todos.iter().flatten().any(|s| STATUSES[*s] == TodoStatus::Cancelled);
        prop_assume!(!has_cancelled);

        let graph = build(&shape);
        let (ready, complete) = tokio_test::block_on(async {
            (graph.ready_groups().await, graph.all_complete().await)
        });
        prop_assert!(complete || !ready.is_empty());
    }

    /// Topological order places every dependency before its dependents.
    #[test]
    fn prop_topological_order_respects_dependencies(shape in graph_shape()) {
        let graph = build(&shape);
        let groups = tokio_test::block_on(graph.groups());
        let order = DependencyResolver::new().topological_order(&groups).unwrap();
        let position: HashMap<_, _> = order.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();

        prop_assert_eq!(order.len(), groups.len());
        for group in &groups {
            for dep in &group.dependencies {
                prop_assert!(position[dep] < position[&group.group_id]);
            }
        }
    }
}
