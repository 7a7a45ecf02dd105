use std::{fs::File, io::{BufReader, BufWriter, Write}, path::Path, time::Instant};

use indexmap::IndexMap;
use petgraph::{dot::{Config, Dot}, graph::{NodeIndex, UnGraph}};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{csv_reader, error::{Error, Result}};

pub mod graph_weight;

use graph_weight::{NetworkEdge, NetworkNode};

const SNAPSHOT_FILE_NAME: &str = "model.bincode";

/// network model: an undirected, unweighted graph with dense node ids
#[derive(Serialize, Deserialize)]
pub struct Model {
    pub graph: UnGraph<NetworkNode, NetworkEdge>,

    // node ids follow the order in which labels were first seen in the input
    pub node_indices: IndexMap<String, NodeIndex>,
}

impl Model {

    /// Build a model from `(source, target)` label pairs.
    ///
    /// Self-loops are dropped and parallel edges are merged, neither changes any distance.
    pub fn with_edges(edges: &[(String, String)]) -> Self {
        let mut graph = UnGraph::default();
        let mut node_indices: IndexMap<String, NodeIndex> = IndexMap::new();

        let mut self_loop_counter = 0;

        for (source, target) in edges {
            let source_index = Self::node_index_or_insert(&mut graph, &mut node_indices, source);
            let target_index = Self::node_index_or_insert(&mut graph, &mut node_indices, target);

            if source_index == target_index {
                self_loop_counter += 1;
                continue;
            }

            graph.update_edge(source_index, target_index, NetworkEdge);
        }

        if self_loop_counter > 0 {
            tracing::warn!("dropped {} self-loop(s)", self_loop_counter);
        }

        Self {
            graph,
            node_indices,
        }
    }

    /// Build a model from an edge list CSV file with header `source,target`
    pub fn from_edge_list_csv(filepath: &str) -> Result<Self> {
        let start = Instant::now();

        let edges = csv_reader::read_edge_list(filepath)?;
        let model = Self::with_edges(&edges);

        tracing::info!(
            "[from_edge_list_csv()]: done ({}ms), graph.node_count()={}, graph.edge_count()={}",
            start.elapsed().as_millis(),
            model.graph.node_count(),
            model.graph.edge_count()
        );

        Ok(model)
    }

    /// Erdős–Rényi G(n, p) graph, reproducible for a given seed
    pub fn random(n_nodes: usize, edge_probability: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut graph = UnGraph::with_capacity(n_nodes, 0);
        let mut node_indices = IndexMap::with_capacity(n_nodes);

        for i in 0..n_nodes {
            let label = i.to_string();
            let node_index = graph.add_node(NetworkNode::new(&label));
            node_indices.insert(label, node_index);
        }

        for u in 0..n_nodes {
            for v in (u + 1)..n_nodes {
                if rng.gen_bool(edge_probability) {
                    graph.add_edge(NodeIndex::new(u), NodeIndex::new(v), NetworkEdge);
                }
            }
        }

        Self {
            graph,
            node_indices,
        }
    }

    fn node_index_or_insert(
        graph: &mut UnGraph<NetworkNode, NetworkEdge>,
        node_indices: &mut IndexMap<String, NodeIndex>,
        label: &str,
    ) -> NodeIndex {
        match node_indices.get(label) {
            Some(node_index) => *node_index,
            None => {
                let node_index = graph.add_node(NetworkNode::new(label));
                node_indices.insert(label.to_string(), node_index);
                node_index
            }
        }
    }

    /// look up a node by its input label
    pub fn node_index(&self, label: &str) -> Result<NodeIndex> {
        self.node_indices
            .get(label)
            .copied()
            .ok_or_else(|| Error::UnknownNode(label.to_string()))
    }

    #[inline]
    pub fn label(&self, node_index: NodeIndex) -> &str {
        &self.graph[node_index].label
    }

    /// save model to file (for later runs)
    pub fn save_to_file(&self, model_folder_path: &str) -> Result<()> {
        let filepath = Path::new(model_folder_path).join(SNAPSHOT_FILE_NAME);
        let start = Instant::now();

        let writer = BufWriter::new(File::create(&filepath)?);
        bincode::serialize_into(writer, self)?;

        tracing::info!("saved model to {} ({}ms)", filepath.display(), start.elapsed().as_millis());

        Ok(())
    }

    /// load model from file (from previous run)
    pub fn load_from_file(model_folder_path: &str) -> Result<Self> {
        let filepath = Path::new(model_folder_path).join(SNAPSHOT_FILE_NAME);
        let start = Instant::now();

        let reader = BufReader::new(File::open(&filepath)?);
        let model: Self = bincode::deserialize_from(reader)?;

        tracing::info!("loaded model from {} ({}ms)", filepath.display(), start.elapsed().as_millis());

        Ok(model)
    }

    /// create graphviz dot code of model's graph
    pub fn save_dot_code_to(&self, filepath: &str) -> Result<()> {
        let dot_code = format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]));

        let mut writer = BufWriter::new(File::create(filepath)?);
        writer.write_all(dot_code.as_bytes())?;
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(source, target)| (source.to_string(), target.to_string()))
            .collect()
    }

    #[test]
    fn node_ids_follow_first_appearance() {
        let model = Model::with_edges(&edges(&[("b", "a"), ("a", "c")]));

        assert_eq!(model.node_index("b").unwrap(), NodeIndex::new(0));
        assert_eq!(model.node_index("a").unwrap(), NodeIndex::new(1));
        assert_eq!(model.node_index("c").unwrap(), NodeIndex::new(2));
        assert_eq!(model.label(NodeIndex::new(2)), "c");
    }

    #[test]
    fn drops_self_loops_and_merges_parallel_edges() {
        let model = Model::with_edges(&edges(&[("a", "b"), ("b", "a"), ("a", "a"), ("a", "b")]));

        assert_eq!(model.graph.node_count(), 2);
        assert_eq!(model.graph.edge_count(), 1);
    }

    #[test]
    fn unknown_label_is_reported() {
        let model = Model::with_edges(&edges(&[("a", "b")]));
        assert!(matches!(model.node_index("z"), Err(Error::UnknownNode(label)) if label == "z"));
    }

    #[test]
    fn random_graph_is_reproducible() {
        let a = Model::random(30, 0.2, 7);
        let b = Model::random(30, 0.2, 7);

        assert_eq!(a.graph.node_count(), 30);
        assert_eq!(a.graph.edge_count(), b.graph.edge_count());

        let edges_a: Vec<_> = a.graph.edge_indices().map(|e| a.graph.edge_endpoints(e)).collect();
        let edges_b: Vec<_> = b.graph.edge_indices().map(|e| b.graph.edge_endpoints(e)).collect();
        assert_eq!(edges_a, edges_b);
    }

    #[test]
    fn snapshot_round_trip() {
        let folder = std::env::temp_dir().join(format!("group-closeness-snapshot-{}", std::process::id()));
        std::fs::create_dir_all(&folder).unwrap();
        let folder = folder.to_str().unwrap().to_string();

        let model = Model::with_edges(&edges(&[("x", "y"), ("y", "z")]));
        model.save_to_file(&folder).unwrap();
        let loaded = Model::load_from_file(&folder).unwrap();

        assert_eq!(loaded.graph.node_count(), 3);
        assert_eq!(loaded.graph.edge_count(), 2);
        assert_eq!(loaded.node_index("z").unwrap(), model.node_index("z").unwrap());

        std::fs::remove_dir_all(&folder).unwrap();
    }
}
