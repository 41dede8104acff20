//! Node and edge storage behind [`MutableGraph`](super::MutableGraph).

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    array::{ArraySource, EdgeArray, IdSpace, NodeArray},
    distinct_set::{DistinctSetCollection, DistinctSets},
    error::{GraphError, Result},
    ids::{EdgeId, ElementId, MultiElementType, NodeId},
};

use super::GraphView;

/// Pool of element ids: a watermark-backed id space plus released ids
/// awaiting reuse, lowest first.
///
/// While reuse is deferred, released ids are retired instead and only become
/// reusable on [`IdPool::recycle`].
#[derive(Debug)]
struct IdPool<I: ElementId> {
    space: Arc<IdSpace<I>>,
    released: BTreeSet<I>,
    retired: Vec<I>,
    defer_reuse: bool,
}

impl<I: ElementId> IdPool<I> {
    fn new() -> Self {
        Self {
            space: IdSpace::shared(),
            released: BTreeSet::new(),
            retired: Vec::new(),
            defer_reuse: false,
        }
    }

    fn issue(&mut self) -> I {
        if let Some(id) = self.released.pop_first() {
            return id;
        }
        let watermark = self.space.watermark();
        let id = I::from_index(watermark);
        self.space.resize(watermark + 1);
        id
    }

    fn release(&mut self, id: I) {
        if self.defer_reuse {
            self.retired.push(id);
        } else {
            self.released.insert(id);
        }
    }

    fn recycle(&mut self) {
        self.released.extend(self.retired.drain(..));
    }

    fn reset(&mut self) {
        self.released.clear();
        self.retired.clear();
        self.space.resize(0);
    }
}

/// Live nodes and edges, their adjacency, and their merge groups.
///
/// Adjacency is kept as two distinct-set collections over edge ids: each
/// node owns one group of outgoing and one group of incoming edges, named by
/// the group heads stored in `out_heads` and `in_heads`.
#[derive(Debug)]
pub(crate) struct Topology {
    nodes: IdPool<NodeId>,
    edges: IdPool<EdgeId>,
    node_live: NodeArray<bool>,
    edge_live: EdgeArray<bool>,
    num_nodes: usize,
    num_edges: usize,
    endpoints: EdgeArray<(NodeId, NodeId)>,
    out_edges: DistinctSetCollection<EdgeId>,
    in_edges: DistinctSetCollection<EdgeId>,
    out_heads: NodeArray<EdgeId>,
    in_heads: NodeArray<EdgeId>,
    merged_nodes: DistinctSetCollection<NodeId>,
    merged_edges: DistinctSetCollection<EdgeId>,
}

impl Topology {
    pub(crate) fn new() -> Self {
        let nodes = IdPool::new();
        let edges = IdPool::new();
        Self {
            node_live: NodeArray::new(&nodes.space),
            edge_live: EdgeArray::new(&edges.space),
            endpoints: EdgeArray::with_default(&edges.space, (NodeId::NULL, NodeId::NULL)),
            out_heads: NodeArray::new(&nodes.space),
            in_heads: NodeArray::new(&nodes.space),
            nodes,
            edges,
            num_nodes: 0,
            num_edges: 0,
            out_edges: DistinctSetCollection::new(),
            in_edges: DistinctSetCollection::new(),
            merged_nodes: DistinctSetCollection::new(),
            merged_edges: DistinctSetCollection::new(),
        }
    }

    pub(crate) fn add_node(&mut self) -> NodeId {
        let node = self.nodes.issue();
        self.node_live.set(node, true);
        self.num_nodes += 1;
        node
    }

    pub(crate) fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId> {
        self.require_node(source)?;
        self.require_node(target)?;

        let edge = self.edges.issue();
        self.edge_live.set(edge, true);
        self.endpoints.set(edge, (source, target));
        let head = self.out_edges.add(self.out_heads[source], edge);
        self.out_heads.set(source, head);
        let head = self.in_edges.add(self.in_heads[target], edge);
        self.in_heads.set(target, head);
        self.num_edges += 1;
        Ok(edge)
    }

    pub(crate) fn remove_edge(&mut self, edge: EdgeId) -> Result<()> {
        self.require_edge(edge)?;
        let (source, target) = self.endpoints[edge];

        let head = self.out_edges.remove(self.out_heads[source], edge);
        self.out_heads.set(source, head);
        let head = self.in_edges.remove(self.in_heads[target], edge);
        self.in_heads.set(target, head);

        if self.merged_edges.type_of(edge) != MultiElementType::Not {
            let head = self.merged_edges.head_of(edge);
            self.merged_edges.remove(head, edge);
        }

        self.endpoints.set(edge, (NodeId::NULL, NodeId::NULL));
        self.edge_live.set(edge, false);
        self.edges.release(edge);
        self.num_edges -= 1;
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<Vec<EdgeId>> {
        self.require_node(node)?;

        let mut incident: Vec<EdgeId> = self.out_edges.set(self.out_heads[node]).to_vec();
        incident.extend(self.in_edges.set(self.in_heads[node]).iter());
        incident.sort_unstable();
        incident.dedup();
        for &edge in &incident {
            self.remove_edge(edge)?;
        }

        if self.merged_nodes.type_of(node) != MultiElementType::Not {
            let head = self.merged_nodes.head_of(node);
            self.merged_nodes.remove(head, node);
        }

        self.node_live.set(node, false);
        self.nodes.release(node);
        self.num_nodes -= 1;
        Ok(incident)
    }

    pub(crate) fn merge_nodes(&mut self, first: NodeId, second: NodeId) -> Result<NodeId> {
        self.require_node(first)?;
        self.require_node(second)?;

        let first = self.merged_nodes.head_of(first);
        let second = self.merged_nodes.head_of(second);
        if first == second {
            return Ok(first);
        }
        Ok(self.merged_nodes.add(first, second))
    }

    pub(crate) fn merge_edges(&mut self, first: EdgeId, second: EdgeId) -> Result<EdgeId> {
        self.require_edge(first)?;
        self.require_edge(second)?;

        if self.canonical_endpoints(first) != self.canonical_endpoints(second) {
            return Err(GraphError::MismatchedEdgeEndpoints { first, second });
        }

        let first = self.merged_edges.head_of(first);
        let second = self.merged_edges.head_of(second);
        if first == second {
            return Ok(first);
        }
        Ok(self.merged_edges.add(first, second))
    }

    /// Unordered pair of endpoint heads.
    fn canonical_endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        let (source, target) = self.endpoints[edge];
        let source = self.merged_nodes.head_of(source);
        let target = self.merged_nodes.head_of(target);
        (source.min(target), source.max(target))
    }

    /// Holds removed ids back from reuse until the next [`recycle`].
    ///
    /// A component manager keeps the assignments of removed elements until
    /// its next update; an id reissued before then would inherit them.
    ///
    /// [`recycle`]: Self::recycle
    pub(crate) fn defer_reuse(&mut self) {
        self.nodes.defer_reuse = true;
        self.edges.defer_reuse = true;
    }

    /// Makes ids removed since the last call available for reuse.
    pub(crate) fn recycle(&mut self) {
        self.nodes.recycle();
        self.edges.recycle();
    }

    pub(crate) fn clear(&mut self) {
        self.out_edges.clear();
        self.in_edges.clear();
        self.merged_nodes.clear();
        self.merged_edges.clear();
        self.nodes.reset();
        self.edges.reset();
        self.num_nodes = 0;
        self.num_edges = 0;
    }

    pub(crate) fn require_node(&self, node: NodeId) -> Result<()> {
        if self.contains_node(node) {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound { node })
        }
    }

    pub(crate) fn require_edge(&self, edge: EdgeId) -> Result<()> {
        if self.contains_edge(edge) {
            Ok(())
        } else {
            Err(GraphError::EdgeNotFound { edge })
        }
    }

    pub(crate) fn outgoing(&self, node: NodeId) -> DistinctSets<'_, EdgeId> {
        self.merged_members(node)
            .map(|member| self.out_edges.set(self.out_heads[member]))
            .collect()
    }

    pub(crate) fn incoming(&self, node: NodeId) -> DistinctSets<'_, EdgeId> {
        self.merged_members(node)
            .map(|member| self.in_edges.set(self.in_heads[member]))
            .collect()
    }

    pub(crate) fn incident_edges(&self, node: NodeId) -> DistinctSets<'_, EdgeId> {
        let mut sets = self.outgoing(node);
        sets.extend(
            self.merged_members(node)
                .map(|member| self.in_edges.set(self.in_heads[member])),
        );
        sets
    }

    /// Members of `node`'s merge group; empty for dead nodes.
    fn merged_members(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let head = if self.contains_node(node) {
            self.merged_nodes.head_of(node)
        } else {
            NodeId::NULL
        };
        self.merged_nodes.set(head).iter()
    }
}

impl Drop for Topology {
    fn drop(&mut self) {
        self.nodes.space.invalidate();
        self.edges.space.invalidate();
    }
}

impl ArraySource<NodeId> for Topology {
    fn id_space(&self) -> &Arc<IdSpace<NodeId>> {
        &self.nodes.space
    }
}

impl ArraySource<EdgeId> for Topology {
    fn id_space(&self) -> &Arc<IdSpace<EdgeId>> {
        &self.edges.space
    }
}

impl GraphView for Topology {
    fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_live
            .iter_ids()
            .filter_map(|(node, &live)| live.then_some(node))
    }

    fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edge_live
            .iter_ids()
            .filter_map(|(edge, &live)| live.then_some(edge))
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn num_edges(&self) -> usize {
        self.num_edges
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.node_live.get(node).copied().unwrap_or(false)
    }

    fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edge_live.get(edge).copied().unwrap_or(false)
    }

    fn node_type(&self, node: NodeId) -> MultiElementType {
        self.merged_nodes.type_of(node)
    }

    fn edge_type(&self, edge: EdgeId) -> MultiElementType {
        self.merged_edges.type_of(edge)
    }

    fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.contains_edge(edge).then(|| self.endpoints[edge])
    }

    fn edge_ids_for_node(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.incident_edges(node).into_iter()
    }

    fn canonical_node(&self, node: NodeId) -> NodeId {
        self.merged_nodes.head_of(node)
    }

    fn canonical_edge(&self, edge: EdgeId) -> EdgeId {
        self.merged_edges.head_of(edge)
    }

    fn merged_node_ids(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.merged_members(node)
    }

    fn merged_edge_ids(&self, edge: EdgeId) -> impl Iterator<Item = EdgeId> + '_ {
        let head = if self.contains_edge(edge) {
            self.merged_edges.head_of(edge)
        } else {
            EdgeId::NULL
        };
        self.merged_edges.set(head).iter()
    }
}
