//! Approximation of the group of `k` nodes with maximum group closeness, i.e. the
//! group that minimizes the summed distance from every node to its nearest member.

pub mod centrality;
pub mod csv_reader;
pub mod error;
pub mod model;

pub use centrality::{group_closeness::GroupCloseness, Distance, INFINITE_DISTANCE};
pub use error::{Error, Result};
pub use model::Model;
