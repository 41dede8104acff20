use std::sync::Arc;

use cohort_core::{
    ArraySource, EdgeId, ElementId, GraphView, IdSpace, MultiElementType, NodeId,
};

/// Minimal undirected graph with no merging, used to drive the component
/// manager through the [`GraphView`] seam alone.
#[derive(Debug)]
pub struct EdgeList {
    nodes: Arc<IdSpace<NodeId>>,
    edges: Arc<IdSpace<EdgeId>>,
    endpoints: Vec<Option<(NodeId, NodeId)>>,
}

impl EdgeList {
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        let nodes = IdSpace::shared();
        nodes.resize(node_count);
        Self {
            nodes,
            edges: IdSpace::shared(),
            endpoints: Vec::new(),
        }
    }

    pub fn connect(&mut self, source: usize, target: usize) -> EdgeId {
        let edge = EdgeId::from_index(self.endpoints.len());
        self.endpoints
            .push(Some((NodeId::from_index(source), NodeId::from_index(target))));
        self.edges.resize(self.endpoints.len());
        edge
    }

    pub fn disconnect(&mut self, edge: EdgeId) {
        if let Some(slot) = self.endpoints.get_mut(edge.index()) {
            *slot = None;
        }
    }

    #[must_use]
    pub fn node(index: usize) -> NodeId {
        NodeId::from_index(index)
    }
}

impl Drop for EdgeList {
    fn drop(&mut self) {
        self.nodes.invalidate();
        self.edges.invalidate();
    }
}

impl ArraySource<NodeId> for EdgeList {
    fn id_space(&self) -> &Arc<IdSpace<NodeId>> {
        &self.nodes
    }
}

impl ArraySource<EdgeId> for EdgeList {
    fn id_space(&self) -> &Arc<IdSpace<EdgeId>> {
        &self.edges
    }
}

impl GraphView for EdgeList {
    fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.watermark()).map(NodeId::from_index)
    }

    fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.endpoints
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|_| EdgeId::from_index(index)))
    }

    fn num_nodes(&self) -> usize {
        self.nodes.watermark()
    }

    fn num_edges(&self) -> usize {
        self.endpoints.iter().flatten().count()
    }

    fn contains_node(&self, node: NodeId) -> bool {
        !node.is_null() && node.index() < self.nodes.watermark()
    }

    fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edge_endpoints(edge).is_some()
    }

    fn node_type(&self, _node: NodeId) -> MultiElementType {
        MultiElementType::Not
    }

    fn edge_type(&self, _edge: EdgeId) -> MultiElementType {
        MultiElementType::Not
    }

    fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.endpoints.get(edge.index()).copied().flatten()
    }

    fn edge_ids_for_node(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.edge_ids().filter(move |&edge| {
            self.edge_endpoints(edge)
                .is_some_and(|(source, target)| source == node || target == node)
        })
    }

    fn canonical_node(&self, node: NodeId) -> NodeId {
        node
    }

    fn canonical_edge(&self, edge: EdgeId) -> EdgeId {
        edge
    }

    fn merged_node_ids(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.contains_node(node).then_some(node).into_iter()
    }

    fn merged_edge_ids(&self, edge: EdgeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.contains_edge(edge).then_some(edge).into_iter()
    }
}
