//! Pure graph algorithms shared by the validator and the executor.
//!
//! The validator uses [`topological_sort`] to detect cycles (structural rule:
//! the graph must be acyclic); the executor uses it again, cheaply, as the
//! "re-check acyclicity" step at run start — a workflow can be `ACTIVE` at an
//! older, already-validated `version`, so we don't trust a stale validation
//! result blindly.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::models::{Edge, NodeDefinition};

/// Failure from the pure graph algorithms in this module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
    /// Topological sort could not place every node — the graph has a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,
}

/// Topologically sort `nodes` given `edges`, breaking ties by original
/// `nodes[]` order.
///
/// Assumes node ids are unique and every edge endpoint resolves to a node —
/// both are validator-enforced invariants by the time this runs.
pub fn topological_sort(
    nodes: &[NodeDefinition],
    edges: &[Edge],
) -> Result<Vec<String>, DagError> {
    let index_of: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];

    for edge in edges {
        let from = index_of[edge.from.as_str()];
        let to = index_of[edge.to.as_str()];
        adjacency[from].push(to);
        in_degree[to] += 1;
    }

    // `ready` holds original-array indices, so iterating a `BTreeSet` visits
    // them in `nodes[]` order for free — this is the deterministic tie-break.
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();

    let mut sorted: Vec<String> = Vec::with_capacity(nodes.len());

    while let Some(&idx) = ready.iter().next() {
        ready.remove(&idx);
        sorted.push(nodes[idx].id.clone());

        for &neighbour in &adjacency[idx] {
            in_degree[neighbour] -= 1;
            if in_degree[neighbour] == 0 {
                ready.insert(neighbour);
            }
        }
    }

    if sorted.len() != nodes.len() {
        return Err(DagError::CycleDetected);
    }

    Ok(sorted)
}

/// `true` if the graph over `nodes`/`edges` contains a cycle.
pub fn has_cycle(nodes: &[NodeDefinition], edges: &[Edge]) -> bool {
    topological_sort(nodes, edges).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn make_node(id: &str) -> NodeDefinition {
        NodeDefinition {
            id: id.to_string(),
            node_type: "mock".into(),
            config: Value::Null,
            position: None,
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    #[test]
    fn linear_dag_sorts_in_order() {
        let nodes = vec![make_node("a"), make_node("b"), make_node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c")];
        assert_eq!(
            topological_sort(&nodes, &edges).unwrap(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn diamond_dag_respects_original_order_tie_break() {
        // a -> b, a -> c, b -> d, c -> d; original order a,b,c,d so b before c.
        let nodes = vec![
            make_node("a"),
            make_node("b"),
            make_node("c"),
            make_node("d"),
        ];
        let edges = vec![
            edge("a", "b"),
            edge("a", "c"),
            edge("b", "d"),
            edge("c", "d"),
        ];
        let sorted = topological_sort(&nodes, &edges).unwrap();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn reversed_declaration_order_still_respects_original_index() {
        // Declared d, c, b, a but edges run a -> b -> c -> d; this checks
        // we sort by original index, not by id string.
        let nodes = vec![
            make_node("d"),
            make_node("c"),
            make_node("b"),
            make_node("a"),
        ];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "d")];
        let sorted = topological_sort(&nodes, &edges).unwrap();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn cycle_is_detected() {
        let nodes = vec![make_node("a"), make_node("b"), make_node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        assert_eq!(
            topological_sort(&nodes, &edges),
            Err(DagError::CycleDetected)
        );
    }

    #[test]
    fn single_node_no_edges_is_valid() {
        let nodes = vec![make_node("solo")];
        assert_eq!(topological_sort(&nodes, &[]).unwrap(), vec!["solo"]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let nodes = vec![make_node("a")];
        let edges = vec![edge("a", "a")];
        assert!(has_cycle(&nodes, &edges));
    }
}
