//! Closeness-style centrality measures on unweighted graphs.
//!
//! All measures count hops, so distances are plain integers. Nodes that cannot
//! be reached carry [`INFINITE_DISTANCE`] and are excluded from every sum.

pub mod bfs;
pub mod bucket_queue;
pub mod group_closeness;
pub mod top_closeness;

/// hop distance between two nodes
pub type Distance = u64;

/// sentinel for nodes that are not reachable
pub const INFINITE_DISTANCE: Distance = Distance::MAX;

/// number of worker threads used when nothing else is configured
pub fn default_n_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
