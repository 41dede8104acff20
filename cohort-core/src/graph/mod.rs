//! Graph access for component maintenance, and the mutable graph that
//! drives it.

mod topology;

use tracing::{debug, instrument};

use crate::{
    array::{ArraySource, IdSpace},
    components::{ComponentChanges, ComponentManager, ComponentManagerBuilder},
    distinct_set::DistinctSets,
    error::{GraphError, Result},
    ids::{EdgeId, ElementId, MultiElementType, NodeId},
};

use self::topology::Topology;

/// Read access to a graph whose elements may be coalesced into
/// multi-elements.
///
/// Tails of a merged node or edge are aliases of their head: they stay live
/// and keep their original endpoints, but adjacency queries on a head fold in
/// the adjacency of every member. The node and edge id spaces are exposed
/// through [`ArraySource`] so callers can build arrays against the graph.
///
/// An implementation must not reissue the id of a removed element to a new
/// element before the component manager has updated; the new element would
/// otherwise be read as the old one.
pub trait GraphView: ArraySource<NodeId> + ArraySource<EdgeId> {
    /// Live node ids in ascending order, tails included.
    fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_;

    /// Live edge ids in ascending order, tails included.
    fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_;

    /// Number of live nodes.
    fn num_nodes(&self) -> usize;

    /// Number of live edges.
    fn num_edges(&self) -> usize;

    /// Returns `true` when `node` is live.
    fn contains_node(&self, node: NodeId) -> bool;

    /// Returns `true` when `edge` is live.
    fn contains_edge(&self, edge: EdgeId) -> bool;

    /// Position of `node` within its merge group.
    fn node_type(&self, node: NodeId) -> MultiElementType;

    /// Position of `edge` within its merge group.
    fn edge_type(&self, edge: EdgeId) -> MultiElementType;

    /// Original `(source, target)` of a live edge.
    fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)>;

    /// Edges incident to any member of `node`'s merge group. Self-loops may
    /// be reported twice.
    fn edge_ids_for_node(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_;

    /// Head of `node`'s merge group, or `node` itself when it is not merged.
    fn canonical_node(&self, node: NodeId) -> NodeId;

    /// Head of `edge`'s merge group, or `edge` itself when it is not merged.
    fn canonical_edge(&self, edge: EdgeId) -> EdgeId;

    /// Every member of `node`'s merge group, head first.
    fn merged_node_ids(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;

    /// Every member of `edge`'s merge group, head first.
    fn merged_edge_ids(&self, edge: EdgeId) -> impl Iterator<Item = EdgeId> + '_;

    /// The endpoint head across `edge` from the merged node `node`.
    fn opposite_node(&self, edge: EdgeId, node: NodeId) -> NodeId {
        let Some((source, target)) = self.edge_endpoints(edge) else {
            return NodeId::NULL;
        };
        let source = self.canonical_node(source);
        let target = self.canonical_node(target);
        if source == self.canonical_node(node) {
            target
        } else {
            source
        }
    }
}

/// A directed multigraph with node and edge merging and optional
/// component maintenance.
///
/// Mutations mark the graph as changed; [`MutableGraph::commit`] is the change
/// notification that brings the bound [`ComponentManager`] up to date.
///
/// # Examples
/// ```
/// use cohort_core::{ComponentManagerBuilder, MutableGraph};
///
/// let mut graph = MutableGraph::new();
/// let a = graph.add_node();
/// let b = graph.add_node();
/// let c = graph.add_node();
/// graph.add_edge(a, b)?;
/// graph.enable_component_management(ComponentManagerBuilder::new())?;
///
/// let components = graph.component_manager().expect("management is enabled");
/// assert_eq!(components.num_components(), 2);
///
/// graph.add_edge(b, c)?;
/// let changes = graph.commit();
/// assert_eq!(changes.merges().count(), 1);
/// let components = graph.component_manager().expect("management is enabled");
/// assert_eq!(components.num_components(), 1);
/// # Ok::<(), cohort_core::GraphError>(())
/// ```
#[derive(Debug)]
pub struct MutableGraph {
    components: Option<ComponentManager>,
    topology: Topology,
    changed: bool,
}

impl Default for MutableGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableGraph {
    /// Creates an empty graph without component management.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: None,
            topology: Topology::new(),
            changed: false,
        }
    }

    /// Adds a node, reusing the lowest released id when one is available.
    ///
    /// Once component management is enabled, ids removed since the last
    /// commit stay retired until that commit has updated the components.
    pub fn add_node(&mut self) -> NodeId {
        self.changed = true;
        self.topology.add_node()
    }

    /// Adds a directed edge from `source` to `target`.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeNotFound`] when either endpoint is not live.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId> {
        let edge = self.topology.add_edge(source, target)?;
        self.changed = true;
        Ok(edge)
    }

    /// Removes `node` and every edge attached to it. Returns the removed
    /// edges in ascending order.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeNotFound`] when `node` is not live.
    pub fn remove_node(&mut self, node: NodeId) -> Result<Vec<EdgeId>> {
        let removed = self.topology.remove_node(node)?;
        self.changed = true;
        Ok(removed)
    }

    /// Removes `edge`.
    ///
    /// # Errors
    /// Returns [`GraphError::EdgeNotFound`] when `edge` is not live.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<()> {
        self.topology.remove_edge(edge)?;
        self.changed = true;
        Ok(())
    }

    /// Coalesces the merge groups of `first` and `second` into one
    /// multi-node and returns its head, the lowest member id.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeNotFound`] when either node is not live.
    pub fn merge_nodes(&mut self, first: NodeId, second: NodeId) -> Result<NodeId> {
        let head = self.topology.merge_nodes(first, second)?;
        self.changed = true;
        Ok(head)
    }

    /// Coalesces the merge groups of two parallel edges into one multi-edge
    /// and returns its head.
    ///
    /// # Errors
    /// Returns [`GraphError::EdgeNotFound`] when either edge is not live and
    /// [`GraphError::MismatchedEdgeEndpoints`] when the edges do not join the
    /// same merged nodes.
    pub fn merge_edges(&mut self, first: EdgeId, second: EdgeId) -> Result<EdgeId> {
        let head = self.topology.merge_edges(first, second)?;
        self.changed = true;
        Ok(head)
    }

    /// Removes `edge` and merges its endpoints. Returns the merged node's
    /// head.
    ///
    /// # Errors
    /// Returns [`GraphError::EdgeNotFound`] when `edge` is not live.
    pub fn contract_edge(&mut self, edge: EdgeId) -> Result<NodeId> {
        let (source, target) = self
            .topology
            .edge_endpoints(edge)
            .ok_or(GraphError::EdgeNotFound { edge })?;
        self.topology.remove_edge(edge)?;
        self.changed = true;
        self.topology.merge_nodes(source, target)
    }

    /// Contracts every live edge matching `predicate` and returns how many
    /// were contracted.
    #[instrument(level = "debug", skip_all, fields(contracted = tracing::field::Empty))]
    pub fn contract_edges(&mut self, mut predicate: impl FnMut(EdgeId) -> bool) -> usize {
        let matching: Vec<EdgeId> = self
            .topology
            .edge_ids()
            .filter(|&edge| predicate(edge))
            .collect();

        let mut contracted = 0;
        for edge in matching {
            if self.contract_edge(edge).is_ok() {
                contracted += 1;
            }
        }
        tracing::Span::current().record("contracted", contracted);
        contracted
    }

    /// Removes every node and edge and releases all ids.
    pub fn clear(&mut self) {
        self.topology.clear();
        self.changed = true;
    }

    /// Returns `true` when the graph has been mutated since the last
    /// [`commit`](Self::commit).
    #[rustfmt::skip]
    #[must_use]
    pub fn has_changed(&self) -> bool { self.changed }

    /// Outgoing edges of every member of `node`'s merge group.
    #[must_use]
    pub fn out_edges(&self, node: NodeId) -> DistinctSets<'_, EdgeId> {
        self.topology.outgoing(node)
    }

    /// Incoming edges of every member of `node`'s merge group.
    #[must_use]
    pub fn in_edges(&self, node: NodeId) -> DistinctSets<'_, EdgeId> {
        self.topology.incoming(node)
    }

    /// Outgoing then incoming edges of every member of `node`'s merge group.
    #[must_use]
    pub fn edges_for_node(&self, node: NodeId) -> DistinctSets<'_, EdgeId> {
        self.topology.incident_edges(node)
    }

    /// Binds a component manager to this graph and computes the initial
    /// partition. A graph binds at most one manager for its lifetime.
    ///
    /// # Errors
    /// Returns [`GraphError::AlreadyComponentManaged`] when a manager is
    /// already bound.
    pub fn enable_component_management(
        &mut self,
        builder: ComponentManagerBuilder,
    ) -> Result<ComponentChanges> {
        if self.components.is_some() {
            return Err(GraphError::AlreadyComponentManaged);
        }
        let manager = builder.build(&self.topology);
        let changes = manager.update(&self.topology);
        self.components = Some(manager);
        self.topology.defer_reuse();
        self.changed = false;
        Ok(changes)
    }

    /// The bound component manager, if management was enabled.
    #[must_use]
    pub fn component_manager(&self) -> Option<&ComponentManager> {
        self.components.as_ref()
    }

    /// Publishes pending mutations.
    ///
    /// When the graph changed since the last commit and an enabled
    /// component manager is bound, the partition is recomputed and the
    /// resulting changes are returned; otherwise the batch is empty. Ids
    /// removed before an update become reusable once it has run.
    pub fn commit(&mut self) -> ComponentChanges {
        let changed = std::mem::take(&mut self.changed);
        match &self.components {
            Some(manager) if changed && manager.is_enabled() => {
                let changes = manager.update(&self.topology);
                self.topology.recycle();
                changes
            }
            Some(_) if changed => {
                debug!("component management disabled; skipping update");
                ComponentChanges::default()
            }
            _ => ComponentChanges::default(),
        }
    }
}

impl ArraySource<NodeId> for MutableGraph {
    fn id_space(&self) -> &std::sync::Arc<IdSpace<NodeId>> {
        ArraySource::<NodeId>::id_space(&self.topology)
    }
}

impl ArraySource<EdgeId> for MutableGraph {
    fn id_space(&self) -> &std::sync::Arc<IdSpace<EdgeId>> {
        ArraySource::<EdgeId>::id_space(&self.topology)
    }
}

impl GraphView for MutableGraph {
    fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.topology.node_ids()
    }

    fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.topology.edge_ids()
    }

    fn num_nodes(&self) -> usize {
        self.topology.num_nodes()
    }

    fn num_edges(&self) -> usize {
        self.topology.num_edges()
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.topology.contains_node(node)
    }

    fn contains_edge(&self, edge: EdgeId) -> bool {
        self.topology.contains_edge(edge)
    }

    fn node_type(&self, node: NodeId) -> MultiElementType {
        self.topology.node_type(node)
    }

    fn edge_type(&self, edge: EdgeId) -> MultiElementType {
        self.topology.edge_type(edge)
    }

    fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.topology.edge_endpoints(edge)
    }

    fn edge_ids_for_node(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.topology.edge_ids_for_node(node)
    }

    fn canonical_node(&self, node: NodeId) -> NodeId {
        self.topology.canonical_node(node)
    }

    fn canonical_edge(&self, edge: EdgeId) -> EdgeId {
        self.topology.canonical_edge(edge)
    }

    fn merged_node_ids(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.topology.merged_node_ids(node)
    }

    fn merged_edge_ids(&self, edge: EdgeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.topology.merged_edge_ids(edge)
    }
}
