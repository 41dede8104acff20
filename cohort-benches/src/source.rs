//! Synthetic graphs for benchmarking.
//!
//! Graphs are generated from a seeded RNG so benchmark runs are reproducible.
//! [`SyntheticGraph::churn`] applies the same kind of small edge mutations an
//! interactive editor would, for measuring incremental updates.

use cohort_core::{EdgeId, GraphError, MutableGraph, NodeId};
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Errors that may occur during synthetic graph generation.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyntheticError {
    /// The requested node count was zero.
    #[error("node count must be greater than zero")]
    ZeroNodes,
    /// The graph rejected a mutation.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Configuration for synthetic graph generation.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Number of nodes to generate.
    pub node_count: usize,
    /// Number of edges to generate between uniformly chosen nodes.
    pub edge_count: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// A seeded random graph plus the RNG that keeps mutating it.
///
/// The generator tracks the edges it added itself, so edges must only be
/// added or removed through [`SyntheticGraph::churn`].
///
/// # Examples
///
/// ```
/// use cohort_benches::source::{SyntheticConfig, SyntheticGraph};
/// use cohort_core::GraphView;
///
/// let config = SyntheticConfig { node_count: 10, edge_count: 12, seed: 42 };
/// let synthetic = SyntheticGraph::generate(&config).expect("valid config");
/// assert_eq!(synthetic.graph().num_nodes(), 10);
/// assert_eq!(synthetic.graph().num_edges(), 12);
/// ```
#[derive(Debug)]
pub struct SyntheticGraph {
    graph: MutableGraph,
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
    rng: SmallRng,
}

impl SyntheticGraph {
    /// Generates the graph eagerly from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SyntheticError::ZeroNodes`] if `node_count` is zero and
    /// [`SyntheticError::Graph`] if an edge could not be added.
    pub fn generate(config: &SyntheticConfig) -> Result<Self, SyntheticError> {
        if config.node_count == 0 {
            return Err(SyntheticError::ZeroNodes);
        }

        let mut graph = MutableGraph::new();
        let nodes: Vec<NodeId> = (0..config.node_count).map(|_| graph.add_node()).collect();
        let mut synthetic = Self {
            graph,
            nodes,
            edges: Vec::with_capacity(config.edge_count),
            rng: SmallRng::seed_from_u64(config.seed),
        };
        for _ in 0..config.edge_count {
            synthetic.add_random_edge()?;
        }
        Ok(synthetic)
    }

    /// The generated graph.
    #[must_use]
    pub fn graph(&self) -> &MutableGraph {
        &self.graph
    }

    /// Mutable access to the generated graph.
    pub fn graph_mut(&mut self) -> &mut MutableGraph {
        &mut self.graph
    }

    /// Consumes the generator, returning the graph.
    #[must_use]
    pub fn into_graph(self) -> MutableGraph {
        self.graph
    }

    /// Removes and re-adds `count` random edges, leaving the edge count
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SyntheticError::Graph`] if a tracked edge is no longer in
    /// the graph or a replacement could not be added.
    pub fn churn(&mut self, count: usize) -> Result<(), SyntheticError> {
        for _ in 0..count {
            if self.edges.is_empty() {
                break;
            }
            let victim = self.edges.swap_remove(self.rng.gen_range(0..self.edges.len()));
            self.graph.remove_edge(victim)?;
            self.add_random_edge()?;
        }
        Ok(())
    }

    fn random_node(&mut self) -> Option<NodeId> {
        let index = self.rng.gen_range(0..self.nodes.len());
        self.nodes.get(index).copied()
    }

    fn add_random_edge(&mut self) -> Result<(), SyntheticError> {
        if let (Some(source), Some(target)) = (self.random_node(), self.random_node()) {
            let edge = self.graph.add_edge(source, target)?;
            self.edges.push(edge);
        }
        Ok(())
    }
}
