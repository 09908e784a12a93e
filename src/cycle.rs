//! Cycle detection over the derived adjacency.
//!
//! Pure functions: nothing here mutates the projection or keeps state
//! between calls.

use crate::graph::Adjacency;
use std::collections::HashSet;

/// Returns true if the adjacency contains any directed cycle.
///
/// Depth-first search with an explored set and an on-stack set; a
/// back-edge to a node still on the recursion stack is a cycle, and a
/// self-loop is a cycle of length one. Roots are visited in node-creation
/// order and successors in edge-insertion order, so the walk is
/// reproducible. An empty graph has no cycle.
pub fn has_cycle(adjacency: &Adjacency) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();
    for root in adjacency.node_order() {
        if !visited.contains(root.as_str()) && walk(adjacency, root, &mut visited, &mut on_stack) {
            return true;
        }
    }
    false
}

/// Tests whether committing the edge `from → to` would close a cycle.
/// Works on a copy of the adjacency; the committed projection stays as it
/// was.
pub fn would_close_cycle(adjacency: &Adjacency, from: &str, to: &str) -> bool {
    has_cycle(&adjacency.with_edge(from, to))
}

/// Probes converting a queued request into a grant: the candidate's own
/// request edge process→resource leaves the copy and the hypothetical
/// allocation edge resource→process joins it, so the test sees the graph
/// as the conversion would commit it.
pub fn grant_would_close_cycle(adjacency: &Adjacency, resource: &str, process: &str) -> bool {
    has_cycle(
        &adjacency
            .without_edge(process, resource)
            .with_edge(resource, process),
    )
}

fn walk<'a>(
    adjacency: &'a Adjacency,
    node: &'a str,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
) -> bool {
    if on_stack.contains(node) {
        return true;
    }
    if visited.contains(node) {
        return false;
    }
    visited.insert(node);
    on_stack.insert(node);
    for next in adjacency.successors(node) {
        if walk(adjacency, next, visited, on_stack) {
            return true;
        }
    }
    on_stack.remove(node);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind, GraphStore, NodeKind};

    fn store_with(edges: &[(&str, &str)]) -> GraphStore {
        let mut graph = GraphStore::new();
        for (source, target) in edges {
            for id in [source, target] {
                if !graph.contains(id) {
                    let kind = if id.starts_with('P') {
                        NodeKind::Process
                    } else {
                        NodeKind::Resource
                    };
                    graph.add_node(*id, kind).unwrap();
                }
            }
            graph.add_edge(Edge {
                source: (*source).into(),
                target: (*target).into(),
                kind: EdgeKind::Alloc,
            });
        }
        graph
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        assert!(!has_cycle(&Adjacency::default()));
    }

    #[test]
    fn chain_has_no_cycle() {
        let mut graph = store_with(&[("P1", "R1"), ("R1", "P2")]);
        assert!(!has_cycle(graph.rebuild_adjacency()));
    }

    #[test]
    fn back_edge_closes_a_cycle() {
        let mut graph = store_with(&[("P1", "R1"), ("R1", "P2"), ("P2", "P1")]);
        assert!(has_cycle(graph.rebuild_adjacency()));
    }

    #[test]
    fn self_loop_is_a_cycle_of_length_one() {
        let mut graph = store_with(&[("P1", "P1")]);
        assert!(has_cycle(graph.rebuild_adjacency()));
    }

    #[test]
    fn hypothetical_edge_is_probed_without_commit() {
        let mut graph = store_with(&[("R1", "P1")]);
        let adjacency = graph.rebuild_adjacency();

        assert!(would_close_cycle(adjacency, "P1", "R1"));
        // the committed projection is still acyclic
        assert!(!has_cycle(adjacency));
    }

    #[test]
    fn hypothetical_self_loop_is_denied() {
        let mut graph = store_with(&[("R1", "P1")]);
        let adjacency = graph.rebuild_adjacency();
        assert!(would_close_cycle(adjacency, "P1", "P1"));
    }

    #[test]
    fn disconnected_components_are_all_visited() {
        let mut graph = store_with(&[("P1", "R1"), ("P2", "R2"), ("R2", "P3"), ("P3", "P2")]);
        assert!(has_cycle(graph.rebuild_adjacency()));
    }

    #[test]
    fn grant_probe_ignores_the_candidates_own_request_edge() {
        // P1 waits on R1; converting that wait into a grant is safe even
        // though R1 -> P1 plus the request edge P1 -> R1 would read as a
        // 2-cycle if the request edge stayed in the probe
        let mut graph = store_with(&[("P1", "R1")]);
        let adjacency = graph.rebuild_adjacency();
        assert!(!grant_would_close_cycle(adjacency, "R1", "P1"));
    }

    #[test]
    fn grant_probe_still_sees_paths_through_other_resources() {
        // P1 waits on R1 and R2, R2 is held by P2, P2 waits on R1:
        // granting R1 to P1 closes R1 -> P1 -> R2 -> P2 -> R1
        let mut graph = store_with(&[("P1", "R1"), ("P1", "R2"), ("R2", "P2"), ("P2", "R1")]);
        let adjacency = graph.rebuild_adjacency();
        assert!(grant_would_close_cycle(adjacency, "R1", "P1"));
    }

    #[test]
    fn result_is_stable_across_repeated_calls() {
        let mut graph = store_with(&[("P1", "R1"), ("R1", "P2")]);
        let adjacency = graph.rebuild_adjacency();
        for _ in 0..8 {
            assert!(!has_cycle(adjacency));
            assert!(would_close_cycle(adjacency, "P2", "P1"));
        }
    }
}
