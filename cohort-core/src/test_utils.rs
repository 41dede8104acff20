//! Shared test utilities for `cohort-core`.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use cohort_test_support::ci::property_test_profile::ProptestRunProfile;
use parking_lot::Mutex;
use proptest::test_runner::Config as ProptestConfig;

use crate::{
    components::{ComponentEvent, DiagnosticSink, LockContention},
    graph::{GraphView, MutableGraph},
    ids::{EdgeId, MultiElementType, NodeId},
};

/// Builds a standard proptest configuration from the shared CI profile.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// A graph with `count` isolated nodes, returned alongside their ids.
pub(crate) fn graph_with_nodes(count: usize) -> (MutableGraph, Vec<NodeId>) {
    let mut graph = MutableGraph::new();
    let nodes = (0..count).map(|_| graph.add_node()).collect();
    (graph, nodes)
}

/// Whether `node` takes part in components under `hides_node`: neither it
/// nor the head of its merge group is hidden.
pub(crate) fn node_visible<G: GraphView>(
    graph: &G,
    node: NodeId,
    hides_node: &impl Fn(NodeId) -> bool,
) -> bool {
    graph.contains_node(node) && !hides_node(node) && !hides_node(graph.canonical_node(node))
}

/// Whether `edge` takes part in components: it and its group head pass
/// `hides_edge`, and both of its endpoints are visible.
pub(crate) fn edge_visible<G: GraphView>(
    graph: &G,
    edge: EdgeId,
    hides_node: &impl Fn(NodeId) -> bool,
    hides_edge: &impl Fn(EdgeId) -> bool,
) -> bool {
    graph.edge_endpoints(edge).is_some_and(|(source, target)| {
        node_visible(graph, source, hides_node)
            && node_visible(graph, target, hides_node)
            && !hides_edge(edge)
            && !hides_edge(graph.canonical_edge(edge))
    })
}

/// Connected components of the visible non-tail nodes of `graph`, computed
/// with a plain union-find over the endpoint heads of visible edges.
pub(crate) fn oracle_components<G: GraphView>(
    graph: &G,
    hides_node: impl Fn(NodeId) -> bool,
    hides_edge: impl Fn(EdgeId) -> bool,
) -> BTreeSet<BTreeSet<NodeId>> {
    let mut parent: BTreeMap<NodeId, NodeId> = graph
        .node_ids()
        .filter(|&node| {
            graph.node_type(node) != MultiElementType::Tail
                && node_visible(graph, node, &hides_node)
        })
        .map(|node| (node, node))
        .collect();

    fn find(parent: &mut BTreeMap<NodeId, NodeId>, node: NodeId) -> NodeId {
        let mut root = node;
        while parent[&root] != root {
            root = parent[&root];
        }
        parent.insert(node, root);
        root
    }

    for edge in graph.edge_ids() {
        if !edge_visible(graph, edge, &hides_node, &hides_edge) {
            continue;
        }
        let Some((source, target)) = graph.edge_endpoints(edge) else {
            continue;
        };
        let (source, target) = (graph.canonical_node(source), graph.canonical_node(target));
        let (a, b) = (find(&mut parent, source), find(&mut parent, target));
        if a != b {
            parent.insert(a.max(b), a.min(b));
        }
    }

    let mut groups: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    let nodes: Vec<NodeId> = parent.keys().copied().collect();
    for node in nodes {
        let root = find(&mut parent, node);
        groups.entry(root).or_default().insert(node);
    }
    groups.into_values().collect()
}

/// Groups the nodes of `graph` by the component the manager reports.
pub(crate) fn managed_components(graph: &MutableGraph) -> BTreeSet<BTreeSet<NodeId>> {
    let Some(manager) = graph.component_manager() else {
        return BTreeSet::new();
    };
    manager
        .component_ids()
        .into_iter()
        .filter_map(|id| manager.component(id))
        .map(|component| component.node_ids().iter().copied().collect())
        .collect()
}

/// Collects every event delivered to it.
#[derive(Clone, Default)]
pub(crate) struct EventLog {
    events: Arc<Mutex<Vec<ComponentEvent>>>,
}

impl EventLog {
    pub(crate) fn listener(&self) -> impl Fn(&ComponentEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &ComponentEvent| events.lock().push(event.clone())
    }

    pub(crate) fn take(&self) -> Vec<ComponentEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

/// Diagnostic sink that keeps every contention report.
#[derive(Default)]
pub(crate) struct RecordingSink {
    reports: Mutex<Vec<LockContention>>,
}

impl RecordingSink {
    pub(crate) fn reports(&self) -> Vec<LockContention> {
        self.reports.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn lock_contention(&self, report: &LockContention) {
        self.reports.lock().push(report.clone());
    }
}
