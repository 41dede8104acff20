//! The committed component partition and its incremental update.
//!
//! An update starts from the previous node and edge assignments and walks the
//! live nodes in id order. Each unclaimed node seeds a breadth-first flood
//! fill:
//!
//! - a node whose previous component has not been claimed yet claims it
//!   again; if the fill reaches nodes of other previous components, those
//!   components merged into it
//! - a node whose previous component was already claimed in this pass lies in
//!   a fragment of a split, and the fill claims a fresh id; other previous
//!   components the fragment reaches merged into it
//! - nodes with no previous component are handled in a second pass that
//!   claims fresh ids for entirely new components
//!
//! Fresh ids come from the queue of vacated ids, oldest first, before new
//! integers are minted.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
};

use crate::{
    array::{EdgeArray, GraphArray, IdSpace, NodeArray},
    graph::GraphView,
    ids::{ComponentId, EdgeId, ElementId, MultiElementType, NodeId},
};

use super::{
    Filters,
    component::GraphComponent,
    events::{ComponentChanges, ComponentEvent, ComponentMergeSet, ComponentSplitSet},
};

/// Per-element exclusion evaluated once per update.
///
/// `hidden_*` marks elements that never receive a component: dead ids,
/// filtered elements, members of a filtered head's group, and edges with a
/// hidden endpoint. `nodes` and `edges` mark what a flood fill may not pass
/// through: hidden nodes, tails, and edge groups without a visible member.
struct Masks {
    hidden_nodes: NodeArray<bool>,
    hidden_edges: EdgeArray<bool>,
    nodes: NodeArray<bool>,
    edges: EdgeArray<bool>,
}

impl Masks {
    fn evaluate<G: GraphView>(graph: &G, filters: &Filters) -> Self {
        let mut hidden_nodes = NodeArray::with_default(graph, true);
        let mut nodes = NodeArray::with_default(graph, true);
        for node in graph.node_ids() {
            let hidden =
                filters.excludes_node(node) || filters.excludes_node(graph.canonical_node(node));
            hidden_nodes.set(node, hidden);
            nodes.set(node, hidden || graph.node_type(node) == MultiElementType::Tail);
        }

        let mut hidden_edges = EdgeArray::with_default(graph, true);
        for edge in graph.edge_ids() {
            let endpoint_hidden = graph
                .edge_endpoints(edge)
                .is_none_or(|(source, target)| hidden_nodes[source] || hidden_nodes[target]);
            let hidden = endpoint_hidden
                || filters.excludes_edge(edge)
                || filters.excludes_edge(graph.canonical_edge(edge));
            hidden_edges.set(edge, hidden);
        }

        let mut edges = EdgeArray::with_default(graph, true);
        for edge in graph.edge_ids() {
            let blocked = graph.edge_type(edge) == MultiElementType::Tail
                || graph.merged_edge_ids(edge).all(|member| hidden_edges[member]);
            edges.set(edge, blocked);
        }

        Self {
            hidden_nodes,
            hidden_edges,
            nodes,
            edges,
        }
    }
}

/// Assignments being built by the current update.
struct Assignment {
    nodes: NodeArray<ComponentId>,
    edges: EdgeArray<ComponentId>,
}

/// Element-level membership changes keyed by component.
type ElementChanges<I> = BTreeMap<ComponentId, Vec<I>>;

/// Counts reported alongside an update's events.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct UpdateStats {
    pub(super) merges: usize,
    pub(super) splits: usize,
}

#[derive(Debug)]
pub(super) struct Partition {
    node_components: NodeArray<ComponentId>,
    edge_components: EdgeArray<ComponentId>,
    components: Vec<Option<Arc<GraphComponent>>>,
    live: BTreeSet<ComponentId>,
    ordered: Vec<ComponentId>,
    vacated: VecDeque<ComponentId>,
    next_id: usize,
}

impl Partition {
    pub(super) fn new<G: GraphView>(graph: &G) -> Self {
        Self {
            node_components: NodeArray::new(graph),
            edge_components: EdgeArray::new(graph),
            components: Vec::new(),
            live: BTreeSet::new(),
            ordered: Vec::new(),
            vacated: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Live ids ordered by descending node count, then ascending id.
    pub(super) fn component_ids(&self) -> &[ComponentId] {
        &self.ordered
    }

    pub(super) fn contains(&self, id: ComponentId) -> bool {
        self.live.contains(&id)
    }

    pub(super) fn component(&self, id: ComponentId) -> Option<&Arc<GraphComponent>> {
        if !self.contains(id) {
            return None;
        }
        self.components.get(id.index()).and_then(Option::as_ref)
    }

    pub(super) fn component_of_node(&self, node: NodeId) -> ComponentId {
        self.live_or_null(self.node_components.get(node).copied())
    }

    pub(super) fn component_of_edge(&self, edge: EdgeId) -> ComponentId {
        self.live_or_null(self.edge_components.get(edge).copied())
    }

    fn live_or_null(&self, id: Option<ComponentId>) -> ComponentId {
        id.filter(|&id| self.contains(id))
            .unwrap_or(ComponentId::NULL)
    }

    /// Number of component ids ever minted; the size of component arrays.
    pub(super) fn capacity(&self) -> usize {
        self.next_id
    }

    fn generate_id(&mut self) -> ComponentId {
        self.vacated.pop_front().unwrap_or_else(|| {
            let id = ComponentId::from_index(self.next_id);
            self.next_id += 1;
            id
        })
    }

    fn queue_rebuild(&mut self, id: ComponentId, required: &mut BTreeSet<ComponentId>) {
        required.insert(id);
        let index = id.index();
        if index >= self.components.len() {
            self.components.resize(index + 1, None);
        }
        if let Some(slot) = self.components.get_mut(index) {
            if slot.is_none() {
                *slot = Some(Arc::new(GraphComponent::empty(id)));
            }
        }
    }

    fn vacate(&mut self, id: ComponentId, required: &mut BTreeSet<ComponentId>) {
        if let Some(slot) = self.components.get_mut(id.index()) {
            if slot.take().is_some() {
                self.vacated.push_back(id);
                required.remove(&id);
            }
        }
    }

    fn shrink_to_fit(&mut self) {
        while self.components.last().is_some_and(Option::is_none) {
            self.components.pop();
        }
    }

    fn previous(&self, node: NodeId) -> ComponentId {
        self.node_components
            .get(node)
            .copied()
            .unwrap_or(ComponentId::NULL)
    }

    /// The first previous component found among the visible members of
    /// `node`'s merge group, head first.
    fn group_previous<G: GraphView>(&self, graph: &G, masks: &Masks, node: NodeId) -> ComponentId {
        graph
            .merged_node_ids(node)
            .filter(|&member| !masks.hidden_nodes[member])
            .map(|member| self.previous(member))
            .find(|id| !id.is_null())
            .unwrap_or(ComponentId::NULL)
    }

    /// Flood-fills from `root`, claiming every reachable element for `id`.
    /// Returns the previous components the fill passed through.
    fn claim<G: GraphView>(
        &self,
        graph: &G,
        masks: &Masks,
        root: NodeId,
        id: ComponentId,
        assignment: &mut Assignment,
    ) -> BTreeSet<ComponentId> {
        let mut affected = BTreeSet::new();
        let mut queue = VecDeque::from([root]);

        assignment.nodes.set(root, id);
        while let Some(node) = queue.pop_front() {
            for member in graph.merged_node_ids(node) {
                if !masks.hidden_nodes[member] {
                    affected.insert(self.previous(member));
                    assignment.nodes.set(member, id);
                }
            }

            for edge in graph.edge_ids_for_node(node) {
                if masks.edges[edge] {
                    continue;
                }
                for member in graph.merged_edge_ids(edge) {
                    if !masks.hidden_edges[member] {
                        assignment.edges.set(member, id);
                    }
                }

                let opposite = graph.opposite_node(edge, node);
                if assignment.nodes[opposite] != id {
                    assignment.nodes.set(opposite, id);
                    queue.push_back(opposite);
                }
            }
        }

        affected.remove(&ComponentId::NULL);
        affected
    }

    /// Recomputes the partition for `graph` and returns the resulting events.
    pub(super) fn update<G: GraphView>(
        &mut self,
        graph: &G,
        filters: &Filters,
        component_space: &IdSpace<ComponentId>,
    ) -> (ComponentChanges, UpdateStats) {
        let masks = Masks::evaluate(graph, filters);
        let mut assignment = Assignment {
            nodes: NodeArray::new(graph),
            edges: EdgeArray::new(graph),
        };

        let mut claimed = BTreeSet::new();
        let mut required = BTreeSet::new();
        let mut splits: BTreeMap<ComponentId, BTreeSet<ComponentId>> = BTreeMap::new();
        let mut split_ids = BTreeSet::new();
        let mut merges: BTreeMap<ComponentId, BTreeSet<ComponentId>> = BTreeMap::new();
        let mut merged_ids = BTreeSet::new();

        for node in graph.node_ids() {
            let previous = self.group_previous(graph, &masks, node);
            if masks.nodes[node] || !assignment.nodes[node].is_null() || previous.is_null() {
                continue;
            }

            if claimed.contains(&previous) {
                let fragment = self.generate_id();
                claimed.insert(fragment);
                let mut absorbed = self.claim(graph, &masks, node, fragment, &mut assignment);
                self.queue_rebuild(previous, &mut required);
                self.queue_rebuild(fragment, &mut required);
                splits.entry(previous).or_default().extend([previous, fragment]);
                split_ids.insert(fragment);
                absorbed.remove(&previous);
                if !absorbed.is_empty() {
                    merged_ids.extend(absorbed.iter().copied());
                    absorbed.insert(fragment);
                    merges.insert(fragment, absorbed);
                }
            } else {
                claimed.insert(previous);
                let affected = self.claim(graph, &masks, node, previous, &mut assignment);
                self.queue_rebuild(previous, &mut required);
                if affected.len() > 1 {
                    merged_ids.extend(affected.iter().copied().filter(|&id| id != previous));
                    merges.entry(previous).or_default().extend(affected);
                }
            }
        }

        for node in graph.node_ids() {
            if masks.nodes[node]
                || !assignment.nodes[node].is_null()
                || !self.group_previous(graph, &masks, node).is_null()
            {
                continue;
            }
            let id = self.generate_id();
            claimed.insert(id);
            self.claim(graph, &masks, node, id, &mut assignment);
            self.queue_rebuild(id, &mut required);
        }

        component_space.resize(self.capacity());

        let added: Vec<ComponentId> = claimed.difference(&self.live).copied().collect();
        let removed: Vec<ComponentId> = self.live.difference(&claimed).copied().collect();

        let (mut node_adds, mut node_removes) = diff(&self.node_components, &assignment.nodes);
        let (mut edge_adds, mut edge_removes) = diff(&self.edge_components, &assignment.edges);

        let stats = UpdateStats {
            merges: merges.len(),
            splits: splits.len(),
        };
        let mut changes = ComponentChanges::default();

        for (new_id, merged) in merges {
            changes.push(ComponentEvent::WillMerge(ComponentMergeSet::new(merged, new_id)));
        }

        for &component in &removed {
            let merged = merged_ids.contains(&component);
            changes.push(ComponentEvent::WillBeRemoved { component, merged });
            if !merged {
                node_removes.remove(&component);
                edge_removes.remove(&component);
            }
            self.live.remove(&component);
            self.vacate(component, &mut required);
        }

        self.ordered.clear();
        self.ordered.extend(self.live.iter().copied());
        self.shrink_to_fit();

        self.node_components = assignment.nodes;
        self.edge_components = assignment.edges;
        self.rebuild(graph, &masks, &required);

        self.live.extend(added.iter().copied());
        self.ordered.extend(added.iter().copied());
        self.sort_ordered();

        for &component in &added {
            let split = split_ids.contains(&component);
            changes.push(ComponentEvent::Added { component, split });
            if !split {
                node_adds.remove(&component);
                edge_adds.remove(&component);
            }
        }

        for (old_id, fragments) in splits {
            changes.push(ComponentEvent::Split(ComponentSplitSet::new(old_id, fragments)));
        }

        for (component, nodes) in node_adds {
            for node in nodes {
                changes.push(ComponentEvent::NodeAdded { node, component });
            }
        }
        for (component, edges) in edge_adds {
            for edge in edges {
                changes.push(ComponentEvent::EdgeAdded { edge, component });
            }
        }
        for (component, nodes) in node_removes {
            for node in nodes {
                changes.push(ComponentEvent::NodeRemoved { node, component });
            }
        }
        for (component, edges) in edge_removes {
            for edge in edges {
                changes.push(ComponentEvent::EdgeRemoved { edge, component });
            }
        }

        (changes, stats)
    }

    /// Publishes fresh membership snapshots for the `required` components.
    fn rebuild<G: GraphView>(&mut self, graph: &G, masks: &Masks, required: &BTreeSet<ComponentId>) {
        let mut members: BTreeMap<ComponentId, (Vec<NodeId>, Vec<EdgeId>)> = required
            .iter()
            .map(|&id| (id, (Vec::new(), Vec::new())))
            .collect();

        for node in graph.node_ids() {
            if masks.nodes[node] {
                continue;
            }
            if let Some((nodes, _)) = members.get_mut(&self.node_components[node]) {
                nodes.push(node);
            }
        }
        for edge in graph.edge_ids() {
            if masks.edges[edge] || masks.hidden_edges[edge] {
                continue;
            }
            if let Some((_, edges)) = members.get_mut(&self.edge_components[edge]) {
                edges.push(edge);
            }
        }

        for (id, (nodes, edges)) in members {
            if let Some(slot) = self.components.get_mut(id.index()) {
                *slot = Some(Arc::new(GraphComponent::new(id, nodes, edges)));
            }
        }
    }

    fn sort_ordered(&mut self) {
        let components = &self.components;
        let size = |id: ComponentId| {
            components
                .get(id.index())
                .and_then(Option::as_ref)
                .map_or(0, |component| component.num_nodes())
        };
        self.ordered.sort_by_key(|&id| (Reverse(size(id)), id));
    }
}

/// Elements whose component went from null to set (additions) or from set to
/// null (removals), grouped by component.
fn diff<I: ElementId>(
    before: &GraphArray<I, ComponentId>,
    after: &GraphArray<I, ComponentId>,
) -> (ElementChanges<I>, ElementChanges<I>) {
    let mut adds = ElementChanges::new();
    let mut removes = ElementChanges::new();

    for index in 0..before.len().max(after.len()) {
        let id = I::from_index(index);
        let old = before.get(id).copied().unwrap_or(ComponentId::NULL);
        let new = after.get(id).copied().unwrap_or(ComponentId::NULL);
        match (old.is_null(), new.is_null()) {
            (true, false) => adds.entry(new).or_insert_with(Vec::new).push(id),
            (false, true) => removes.entry(old).or_insert_with(Vec::new).push(id),
            _ => {}
        }
    }

    (adds, removes)
}
