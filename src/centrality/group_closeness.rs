//! Greedy approximation of the group with maximum group closeness.
//!
//! Starting from a single seed node, each round adds the node whose insertion
//! reduces the summed distance to the group the most. Candidates are processed
//! best-bound-first by a team of worker threads, and a round stops as soon as the
//! remaining bounds (exact gains from an earlier round) cannot beat the best gain
//! found so far. Gains only shrink as the group grows, so an old gain is a valid
//! upper bound.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
    time::Instant,
};

use crossbeam_utils::thread;
use petgraph::{graph::{Graph, NodeIndex}, visit::{NodeIndexable, VisitMap, Visitable}, EdgeType};

use super::{bfs, bucket_queue::BucketQueue, default_n_threads, top_closeness, Distance, INFINITE_DISTANCE};
use crate::error::{Error, Result};

/// best candidate of the running round
///
/// Can only be changed through `offer`, which keeps the larger improvement.
#[derive(Debug, Clone, Copy)]
struct BestCandidate {
    improvement: u64,
    node: Option<NodeIndex>,
}

impl BestCandidate {
    fn new() -> Self {
        Self {
            improvement: 0,
            node: None,
        }
    }

    /// returns true if `node` became the new best candidate
    fn offer(&mut self, node: NodeIndex, improvement: u64) -> bool {
        if improvement > self.improvement {
            self.improvement = improvement;
            self.node = Some(node);
            true
        } else {
            false
        }
    }

    #[inline]
    fn improvement(&self) -> u64 {
        self.improvement
    }

    #[inline]
    fn node(&self) -> Option<NodeIndex> {
        self.node
    }
}

/// everything the workers of one round share, guarded by a single lock
struct RoundState {
    queue: BucketQueue<NodeIndex>,
    best: BestCandidate,
}

/// result of one selection round
#[derive(Debug, Clone, Copy)]
struct RoundOutcome {
    selected: NodeIndex,
    evaluations: usize,
    pruned: bool,
}

/// Whether a candidate gets a full gain evaluation, given its current distance
/// to the group and its distance before the previous commit.
///
/// Candidates that were adjacent to the group already, and candidates that just
/// moved from distance 2 to distance 1, are rejected without a traversal.
#[inline]
fn needs_evaluation(distance: Distance, previous_distance: Distance) -> bool {
    previous_distance > 1 && !(distance == 1 && previous_distance == 2)
}

/// exact reduction of the summed distance if `u` joined the group
///
/// Relaxes a private copy of `distances` level by level from `u`. With
/// `max_depth > 0` the relaxation stops after expanding the first node more than
/// `max_depth` hops away from `u`.
fn marginal_gain<N, E, Ty>(
    graph: &Graph<N, E, Ty>,
    distances: &[Distance],
    u: NodeIndex,
    max_depth: Distance,
) -> u64
where
    Ty: EdgeType,
{
    let mut relaxed = distances.to_vec();
    relaxed[u.index()] = 0;

    let mut improvement = distances[u.index()];
    let mut queue = VecDeque::new();
    queue.push_back(u);

    let mut level = 0;
    while max_depth == 0 || level <= max_depth {
        let v = match queue.pop_front() {
            Some(v) => v,
            None => break,
        };
        level = relaxed[v.index()];

        for w in graph.neighbors(v) {
            if relaxed[w.index()] > level + 1 {
                relaxed[w.index()] = level + 1;
                improvement += distances[w.index()] - relaxed[w.index()];
                queue.push_back(w);
            }
        }
    }

    improvement
}

/// Greedy, parallel branch-and-bound search for a group of `group_size` nodes with
/// small farness.
///
/// ```
/// use group_closeness::centrality::group_closeness::GroupCloseness;
/// use petgraph::graph::UnGraph;
///
/// let graph = UnGraph::<(), ()>::from_edges(&[(0, 1), (1, 2), (2, 3), (3, 4)]);
/// let mut group_closeness = GroupCloseness::new(&graph, 2, 0).with_threads(1);
/// group_closeness.run().unwrap();
///
/// let group = group_closeness.group().unwrap();
/// assert_eq!(group.len(), 2);
/// assert_eq!(group_closeness.compute_farness(group, 0), 4);
/// ```
pub struct GroupCloseness<'g, N, E, Ty: EdgeType> {
    graph: &'g Graph<N, E, Ty>,
    group_size: usize,
    max_depth: Distance, // 0 = unbounded
    n_threads: usize,

    // distance of every node to the nearest group member
    distances: Vec<Distance>,
    group: Vec<NodeIndex>,

    rounds: usize,
    evaluations: usize,
    pruned: usize,
    has_run: bool,

    // a worker panics when it extracts this node
    #[cfg(test)]
    faulty_node: Option<NodeIndex>,
}

impl<'g, N, E, Ty> GroupCloseness<'g, N, E, Ty>
where
    N: Sync,
    E: Sync,
    Ty: EdgeType + Sync,
{
    /// `group_size` is k, `max_depth` is the search radius H (0 = unbounded).
    ///
    /// `group_size` is not validated: it has to be at least 1 and must not exceed
    /// the number of nodes reachable from the seed.
    pub fn new(graph: &'g Graph<N, E, Ty>, group_size: usize, max_depth: Distance) -> Self {
        Self {
            graph,
            group_size,
            max_depth,
            n_threads: default_n_threads(),
            distances: Vec::new(),
            group: Vec::new(),
            rounds: 0,
            evaluations: 0,
            pruned: 0,
            has_run: false,
            #[cfg(test)]
            faulty_node: None,
        }
    }

    /// number of workers per selection round (at least one)
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads.max(1);
        self
    }

    pub fn run(&mut self) -> Result<()> {
        let start = Instant::now();

        self.distances.clear();
        self.group.clear();
        self.rounds = 0;
        self.evaluations = 0;
        self.pruned = 0;
        self.has_run = false;

        if self.group_size == 0 || self.graph.node_count() == 0 {
            self.has_run = true;
            return Ok(());
        }

        let seed = self.select_seed()?;

        // first, we store the distances between each node and the seed
        self.distances = bfs::distances_from(self.graph, seed);
        self.group.push(seed);

        let sum_distances: u64 = self
            .distances
            .iter()
            .filter(|distance| **distance != INFINITE_DISTANCE)
            .sum();
        tracing::debug!("seed={}, farness={}", seed.index(), sum_distances);

        let previous_bounds: Vec<AtomicI64> = (0..self.distances.len()).map(|_| AtomicI64::new(0)).collect();
        let mut previous_distances = self.distances.clone();

        // loop to find the remaining k - 1 group members
        for round in 1..self.group_size {
            tracing::debug!("k = {}", round);

            let outcome = self.run_round(round, &previous_bounds, &previous_distances)?;

            previous_distances.copy_from_slice(&self.distances);
            let improvement = self.update_distances(outcome.selected);
            self.group.push(outcome.selected);

            self.rounds += 1;
            self.evaluations += outcome.evaluations;
            if outcome.pruned {
                self.pruned += 1;
            }

            tracing::debug!(
                "round {}: selected={}, improvement={}, evaluations={}",
                round,
                outcome.selected.index(),
                improvement,
                outcome.evaluations
            );
        }

        self.has_run = true;

        tracing::info!(
            "[group_closeness.run()]: done ({}ms), k={}, H={}, evaluations={}, pruned_rounds={}",
            start.elapsed().as_millis(),
            self.group_size,
            self.max_depth,
            self.evaluations,
            self.pruned
        );

        Ok(())
    }

    /// the most central node for an unbounded search, the node with the highest
    /// degree (first one on ties) for a bounded one
    fn select_seed(&self) -> Result<NodeIndex> {
        if self.max_depth == 0 {
            let top = top_closeness::top_closeness_nodes(self.graph, 1, self.n_threads)?;
            // the graph is not empty, so there is always a top node
            return top.first().map(|closeness| closeness.node).ok_or(Error::NoCandidate { round: 0 });
        }

        let mut seed = NodeIndex::new(0);
        let mut max_degree = None;
        for node in self.graph.node_indices() {
            let degree = self.graph.neighbors(node).count();
            if max_degree.map_or(true, |max_degree| degree > max_degree) {
                max_degree = Some(degree);
                seed = node;
            }
        }

        Ok(seed)
    }

    /// runs one greedy round and returns the node with the largest gain
    fn run_round(
        &self,
        round: usize,
        previous_bounds: &[AtomicI64],
        previous_distances: &[Distance],
    ) -> Result<RoundOutcome> {
        let graph = self.graph;
        let distances = &self.distances;
        let max_depth = self.max_depth;
        #[cfg(test)]
        let faulty_node = self.faulty_node;

        let is_candidate = |node: NodeIndex| {
            let distance = distances[node.index()];
            distance > 0 && distance != INFINITE_DISTANCE
        };

        // priorities are negated bounds, so the largest bound is extracted first
        let max_bound = graph
            .node_indices()
            .filter(|node| is_candidate(*node))
            .map(|node| previous_bounds[node.index()].load(Ordering::Relaxed))
            .max()
            .unwrap_or(0);

        let mut queue = BucketQueue::new(-max_bound, 0);
        for node in graph.node_indices().filter(|node| is_candidate(*node)) {
            queue.insert(-previous_bounds[node.index()].load(Ordering::Relaxed), node);
        }

        let shared = Mutex::new(RoundState {
            queue,
            best: BestCandidate::new(),
        });
        let interrupted = AtomicBool::new(false);
        let pruned = AtomicBool::new(false);
        let evaluations = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..self.n_threads {
                let shared = &shared;
                let interrupted = &interrupted;
                let pruned = &pruned;
                let evaluations = &evaluations;

                s.spawn(move |_| {
                    while !interrupted.load(Ordering::Relaxed) {
                        let (node, current_best) = {
                            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                            match state.queue.extract_min() {
                                Some((_, node)) => (node, state.best),
                                None => {
                                    interrupted.store(true, Ordering::Relaxed);
                                    break;
                                }
                            }
                        };

                        let bound = previous_bounds[node.index()].load(Ordering::Relaxed);
                        tracing::trace!("extracted node {} with bound {}", node.index(), bound);

                        #[cfg(test)]
                        {
                            if faulty_node == Some(node) {
                                panic!("worker fault at node {}", node.index());
                            }
                        }

                        // every node still queued has a bound <= this one
                        if round > 1 && current_best.node().is_some() && bound <= current_best.improvement() as i64 {
                            tracing::trace!(
                                "interrupting, current_best={}, bound={}",
                                current_best.improvement(),
                                bound
                            );
                            pruned.store(true, Ordering::Relaxed);
                            interrupted.store(true, Ordering::Relaxed);
                            break;
                        }

                        let distance = distances[node.index()];
                        if needs_evaluation(distance, previous_distances[node.index()]) {
                            let improvement = marginal_gain(graph, distances, node, max_depth);
                            evaluations.fetch_add(1, Ordering::Relaxed);

                            shared
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .best
                                .offer(node, improvement);

                            tracing::trace!("new bound for {} = {}", node.index(), improvement);
                            previous_bounds[node.index()].store(improvement as i64, Ordering::Relaxed);
                        } else {
                            // the gain is at least the node's own distance
                            shared
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .best
                                .offer(node, distance);

                            previous_bounds[node.index()].store(0, Ordering::Relaxed);
                        }
                    }
                });
            }
        })
        .map_err(|_| Error::WorkerPanicked { round })?;

        let state = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
        let selected = state.best.node().ok_or(Error::NoCandidate { round })?;

        Ok(RoundOutcome {
            selected,
            evaluations: evaluations.into_inner(),
            pruned: pruned.into_inner(),
        })
    }

    /// Marginal gain of adding `u` to the current group, exploring at most
    /// `max_depth` hops around `u` (0 = unbounded).
    ///
    /// Uses the distances of the last `run()`; returns `INFINITE_DISTANCE` for a
    /// node that is not reachable from the group.
    pub fn compute_improvement(&self, u: NodeIndex, max_depth: Distance) -> Result<u64> {
        if !self.has_run {
            return Err(Error::NotRun);
        }
        if self.distances[u.index()] == INFINITE_DISTANCE {
            return Ok(INFINITE_DISTANCE);
        }

        Ok(marginal_gain(self.graph, &self.distances, u, max_depth))
    }

    /// commits `u` to the group: lowers the distance of every node that is closer
    /// to `u` than to the rest of the group, returns the farness reduction
    fn update_distances(&mut self, u: NodeIndex) -> u64 {
        let mut improvement = self.distances[u.index()];
        self.distances[u.index()] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(u);

        while let Some(v) = queue.pop_front() {
            let next_distance = self.distances[v.index()] + 1;

            for w in self.graph.neighbors(v) {
                if self.distances[w.index()] > next_distance {
                    improvement += self.distances[w.index()] - next_distance;
                    self.distances[w.index()] = next_distance;
                    queue.push_back(w);
                }
            }
        }

        improvement
    }

    /// Sum of distances from every node within `max_depth` hops (0 = unbounded) to
    /// the nearest member of `group`. Nodes that cannot be reached are not counted.
    ///
    /// Independent of `run()`.
    pub fn compute_farness(&self, group: &[NodeIndex], max_depth: Distance) -> u64 {
        let mut farness = 0;
        let mut distances = vec![0; self.graph.node_bound()];
        let mut discovered = self.graph.visit_map();
        let mut queue = VecDeque::with_capacity(group.len());

        for &node in group {
            if discovered.visit(node) {
                queue.push_back(node);
            }
        }

        while let Some(u) = queue.pop_front() {
            if max_depth > 0 && distances[u.index()] > max_depth {
                break;
            }
            farness += distances[u.index()];

            for w in self.graph.neighbors(u) {
                if discovered.visit(w) {
                    distances[w.index()] = distances[u.index()] + 1;
                    queue.push_back(w);
                }
            }
        }

        farness
    }

    /// group closeness of `group`: `(n - |group|) / farness`, 0.0 for zero farness
    pub fn score_of_group(&self, group: &[NodeIndex]) -> f64 {
        let farness = self.compute_farness(group, 0);
        if farness == 0 {
            return 0.0;
        }

        self.graph.node_count().saturating_sub(group.len()) as f64 / farness as f64
    }

    /// selected group, in selection order
    pub fn group(&self) -> Result<&[NodeIndex]> {
        if !self.has_run {
            return Err(Error::NotRun);
        }
        Ok(&self.group)
    }

    /// group closeness score of the selected group
    pub fn group_max_closeness(&self) -> Result<f64> {
        let group = self.group()?;
        Ok(self.score_of_group(group))
    }

    /// distance of every node to the selected group after the last `run()`
    pub fn distances(&self) -> Result<&[Distance]> {
        if !self.has_run {
            return Err(Error::NotRun);
        }
        Ok(&self.distances)
    }

    /// completed selection rounds (the seed is not a round)
    #[inline]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// number of exact gain evaluations over all rounds
    #[inline]
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// number of rounds that stopped early because no remaining bound could win
    #[inline]
    pub fn pruned(&self) -> usize {
        self.pruned
    }
}
