use std::{cmp::Reverse, sync::{Mutex, PoisonError}, time::Instant};

use crossbeam_utils::thread;
use petgraph::{graph::{Graph, NodeIndex}, EdgeType};

use super::{bfs, Distance};
use crate::error::{Error, Result};

/// closeness of a single node, derived from one full BFS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCloseness {
    pub node: NodeIndex,
    pub reached: usize,    // nodes reachable from `node` (itself included)
    pub farness: Distance, // sum of distances to all reachable nodes
}

impl NodeCloseness {
    /// more reached nodes first, then smaller farness, then smaller node id
    fn ranking_key(&self) -> (Reverse<usize>, Distance, NodeIndex) {
        (Reverse(self.reached), self.farness, self.node)
    }
}

/// the `n_results` nodes with the highest (unweighted, non-normalized) closeness,
/// best first
///
/// Every node gets one BFS; `n_threads` workers pull nodes from a shared stack.
pub fn top_closeness_nodes<N, E, Ty>(
    graph: &Graph<N, E, Ty>,
    n_results: usize,
    n_threads: usize,
) -> Result<Vec<NodeCloseness>>
where
    N: Sync,
    E: Sync,
    Ty: EdgeType + Sync,
{
    let start = Instant::now();

    let unprocessed_nodes = Mutex::new(graph.node_indices().rev().collect::<Vec<_>>());
    let processed_nodes = Mutex::new(Vec::with_capacity(graph.node_count()));

    thread::scope(|s| {
        // use multiple threads to run the BFSs
        for _ in 0..n_threads.max(1) {
            let unprocessed_nodes = &unprocessed_nodes;
            let processed_nodes = &processed_nodes;

            s.spawn(move |_| loop {
                let node_option = unprocessed_nodes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop();

                match node_option {
                    Some(node) => {
                        let mut reached = 0;
                        let mut farness = 0;
                        bfs::bfs_from(graph, node, |_, distance| {
                            reached += 1;
                            farness += distance;
                        });

                        processed_nodes
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(NodeCloseness { node, reached, farness });
                    }
                    None => {
                        // no node left to process
                        break;
                    }
                }
            });
        }
    })
    .map_err(|_| Error::WorkerPanicked { round: 0 })?;

    let mut ranking = processed_nodes.into_inner().unwrap_or_else(PoisonError::into_inner);
    ranking.sort_unstable_by_key(NodeCloseness::ranking_key);
    ranking.truncate(n_results);

    tracing::debug!(
        "[top_closeness_nodes()]: done ({}ms), best={:?}",
        start.elapsed().as_millis(),
        ranking.first()
    );

    Ok(ranking)
}
