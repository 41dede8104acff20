//! Benchmark parameter types.

use std::fmt;

/// Parameters for a component update benchmark run.
#[derive(Clone, Debug)]
pub struct UpdateBenchParams {
    /// Number of nodes in the graph.
    pub node_count: usize,
    /// Number of edges in the graph.
    pub edge_count: usize,
}

impl fmt::Display for UpdateBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},m={}", self.node_count, self.edge_count)
    }
}
