use std::collections::VecDeque;

use petgraph::{graph::{Graph, NodeIndex}, visit::{NodeIndexable, VisitMap, Visitable}, EdgeType};

use super::{Distance, INFINITE_DISTANCE};

/// breadth-first search from `source`
///
/// `callback` is invoked exactly once for every reachable node (including `source`
/// itself with distance 0), in non-decreasing order of distance.
pub fn bfs_from<N, E, Ty, F>(graph: &Graph<N, E, Ty>, source: NodeIndex, mut callback: F)
where
    Ty: EdgeType,
    F: FnMut(NodeIndex, Distance),
{
    let mut discovered = graph.visit_map();
    let mut queue = VecDeque::new();

    discovered.visit(source);
    queue.push_back((source, 0));

    while let Some((node, distance)) = queue.pop_front() {
        callback(node, distance);

        for next in graph.neighbors(node) {
            if discovered.visit(next) {
                queue.push_back((next, distance + 1));
            }
        }
    }
}

/// distance from `source` to every node, indexed by `NodeIndex::index()`
pub fn distances_from<N, E, Ty>(graph: &Graph<N, E, Ty>, source: NodeIndex) -> Vec<Distance>
where
    Ty: EdgeType,
{
    let mut distances = vec![INFINITE_DISTANCE; graph.node_bound()];
    bfs_from(graph, source, |node, distance| distances[node.index()] = distance);
    distances
}

#[cfg(test)]
mod tests {
    use petgraph::graph::{DiGraph, UnGraph};

    use super::*;

    #[test]
    fn visits_in_non_decreasing_distance_order() {
        // 0 - 1 - 2 - 3 with a shortcut 0 - 2
        let graph = UnGraph::<(), ()>::from_edges(&[(0, 1), (1, 2), (2, 3), (0, 2)]);

        let mut visits = Vec::new();
        bfs_from(&graph, NodeIndex::new(0), |node, distance| visits.push((node.index(), distance)));

        assert_eq!(visits.len(), 4);
        assert!(visits.windows(2).all(|pair| pair[0].1 <= pair[1].1));
        assert!(visits.contains(&(2, 1)));
        assert!(visits.contains(&(3, 2)));
    }

    #[test]
    fn unreachable_nodes_keep_sentinel() {
        let mut graph = UnGraph::<(), ()>::from_edges(&[(0, 1)]);
        graph.add_node(());

        let distances = distances_from(&graph, NodeIndex::new(0));
        assert_eq!(distances, vec![0, 1, INFINITE_DISTANCE]);
    }

    #[test]
    fn follows_outgoing_edges_only_on_directed_graphs() {
        let graph = DiGraph::<(), ()>::from_edges(&[(0, 1), (2, 1)]);

        let distances = distances_from(&graph, NodeIndex::new(0));
        assert_eq!(distances, vec![0, 1, INFINITE_DISTANCE]);
    }
}
