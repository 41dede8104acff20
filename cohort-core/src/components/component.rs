//! Published membership of a single component.

use crate::ids::{ComponentId, EdgeId, NodeId};

/// The nodes and edges assigned to one component, as of the update that
/// published it.
///
/// Snapshots are immutable and shared: an update that changes a component
/// publishes a new snapshot, so readers holding an older one keep a
/// consistent view. Merged-away tails are not listed; they share their
/// head's component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphComponent {
    id: ComponentId,
    node_ids: Vec<NodeId>,
    edge_ids: Vec<EdgeId>,
}

impl GraphComponent {
    pub(super) fn new(id: ComponentId, node_ids: Vec<NodeId>, edge_ids: Vec<EdgeId>) -> Self {
        Self {
            id,
            node_ids,
            edge_ids,
        }
    }

    pub(super) fn empty(id: ComponentId) -> Self {
        Self::new(id, Vec::new(), Vec::new())
    }

    /// The component's id at publication time.
    #[rustfmt::skip]
    #[must_use]
    pub fn id(&self) -> ComponentId { self.id }

    /// Member nodes in ascending id order.
    #[rustfmt::skip]
    #[must_use]
    pub fn node_ids(&self) -> &[NodeId] { &self.node_ids }

    /// Member edges in ascending id order.
    #[rustfmt::skip]
    #[must_use]
    pub fn edge_ids(&self) -> &[EdgeId] { &self.edge_ids }

    /// Number of member nodes.
    #[rustfmt::skip]
    #[must_use]
    pub fn num_nodes(&self) -> usize { self.node_ids.len() }

    /// Number of member edges.
    #[rustfmt::skip]
    #[must_use]
    pub fn num_edges(&self) -> usize { self.edge_ids.len() }

    /// Returns `true` when `node` is listed in this component.
    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node_ids.binary_search(&node).is_ok()
    }

    /// Returns `true` when `edge` is listed in this component.
    #[must_use]
    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edge_ids.binary_search(&edge).is_ok()
    }
}
