//! Unit and property tests for component maintenance.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc, Barrier,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use cohort_test_support::tracing::RecordingLayer;
use proptest::prelude::*;
use rstest::rstest;
use tracing::Level;

use crate::{
    array::ComponentArray,
    graph::{GraphView, MutableGraph},
    ids::{ComponentId, EdgeId, ElementId, NodeId},
    test_utils::{
        EventLog, RecordingSink, edge_visible, graph_with_nodes, managed_components,
        node_visible, oracle_components, suite_proptest_config,
    },
};

use super::{
    ComponentChanges, ComponentEvent, ComponentManager, ComponentManagerBuilder,
    ComponentMergeSet, ComponentSplitSet,
};

fn c(raw: u32) -> ComponentId {
    ComponentId::new(raw)
}

fn ids(raw: &[u32]) -> BTreeSet<ComponentId> {
    raw.iter().copied().map(ComponentId::new).collect()
}

fn manage(graph: &mut MutableGraph, builder: ComponentManagerBuilder) -> ComponentChanges {
    graph
        .enable_component_management(builder)
        .expect("graph is not managed yet")
}

fn manager(graph: &MutableGraph) -> &ComponentManager {
    graph.component_manager().expect("graph is managed")
}

fn node_sets(raw: &[&[NodeId]]) -> BTreeSet<BTreeSet<NodeId>> {
    raw.iter().map(|set| set.iter().copied().collect()).collect()
}

#[test]
fn initial_update_adds_every_component_without_element_events() {
    let (mut graph, nodes) = graph_with_nodes(3);
    graph.add_edge(nodes[0], nodes[1]).expect("live");

    let changes = manage(&mut graph, ComponentManagerBuilder::new());
    assert_eq!(changes.events(), &[
        ComponentEvent::Added {
            component: c(0),
            split: false,
        },
        ComponentEvent::Added {
            component: c(1),
            split: false,
        },
    ]);

    let manager = manager(&graph);
    assert_eq!(manager.component_ids(), vec![c(0), c(1)]);
    assert_eq!(manager.largest_component_id(), c(0));
    let largest = manager.component(c(0)).expect("live");
    assert_eq!(largest.node_ids(), &[nodes[0], nodes[1]]);
    assert_eq!(largest.edge_ids(), &[EdgeId::new(0)]);
}

#[test]
fn connect_then_disconnect_reports_merge_and_split() {
    let (mut graph, nodes) = graph_with_nodes(3);
    let first = graph.add_edge(nodes[0], nodes[1]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());

    let second = graph.add_edge(nodes[1], nodes[2]).expect("live");
    let merged = graph.commit();
    assert_eq!(merged.events(), &[
        ComponentEvent::WillMerge(ComponentMergeSet::new(ids(&[0, 1]), c(0))),
        ComponentEvent::WillBeRemoved {
            component: c(1),
            merged: true,
        },
        ComponentEvent::EdgeAdded {
            edge: second,
            component: c(0),
        },
    ]);
    assert_eq!(merged.splits().count(), 0);
    assert_eq!(manager(&graph).num_components(), 1);
    assert!(!manager(&graph).contains_component(c(1)));

    graph.remove_edge(first).expect("live");
    let split = graph.commit();
    assert_eq!(split.events(), &[
        ComponentEvent::Added {
            component: c(1),
            split: true,
        },
        ComponentEvent::Split(ComponentSplitSet::new(c(0), ids(&[0, 1]))),
        ComponentEvent::EdgeRemoved {
            edge: first,
            component: c(0),
        },
    ]);
    assert_eq!(split.merges().count(), 0);

    let manager = manager(&graph);
    assert_eq!(manager.component_ids(), vec![c(1), c(0)]);
    assert_eq!(manager.component_of_node(nodes[0]), c(0));
    assert_eq!(manager.component_of_node(nodes[2]), c(1));
    assert_eq!(manager.component_of_edge(second), c(1));
    assert!(manager.component_of_edge(first).is_null());
}

#[test]
fn a_second_update_without_mutation_is_silent() {
    let (mut graph, nodes) = graph_with_nodes(4);
    graph.add_edge(nodes[0], nodes[3]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());

    let before = managed_components(&graph);
    assert!(manager(&graph).update(&graph).is_empty());
    assert!(graph.commit().is_empty());
    assert_eq!(managed_components(&graph), before);
}

#[test]
fn element_events_track_growth_and_shrinkage() {
    let (mut graph, nodes) = graph_with_nodes(2);
    graph.add_edge(nodes[0], nodes[1]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());

    let extra = graph.add_node();
    let edge = graph.add_edge(nodes[1], extra).expect("live");
    let grown = graph.commit();
    assert_eq!(grown.events(), &[
        ComponentEvent::NodeAdded {
            node: extra,
            component: c(0),
        },
        ComponentEvent::EdgeAdded {
            edge,
            component: c(0),
        },
    ]);

    graph.remove_node(extra).expect("live");
    let shrunk = graph.commit();
    assert_eq!(shrunk.events(), &[
        ComponentEvent::NodeRemoved {
            node: extra,
            component: c(0),
        },
        ComponentEvent::EdgeRemoved {
            edge,
            component: c(0),
        },
    ]);
}

#[test]
fn removing_a_whole_component_suppresses_element_events() {
    let (mut graph, nodes) = graph_with_nodes(3);
    graph.add_edge(nodes[1], nodes[2]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());
    let doomed = manager(&graph).component_of_node(nodes[1]);

    graph.remove_node(nodes[1]).expect("live");
    graph.remove_node(nodes[2]).expect("live");
    let changes = graph.commit();
    assert_eq!(changes.events(), &[ComponentEvent::WillBeRemoved {
        component: doomed,
        merged: false,
    }]);
}

#[test]
fn vacated_ids_are_reused_oldest_first() {
    let (mut graph, nodes) = graph_with_nodes(4);
    manage(&mut graph, ComponentManagerBuilder::new());
    assert_eq!(manager(&graph).component_of_node(nodes[2]), c(2));

    graph.remove_node(nodes[2]).expect("live");
    graph.commit();
    graph.remove_node(nodes[0]).expect("live");
    graph.commit();

    let first = graph.add_node();
    assert_eq!(graph.commit().added().collect::<Vec<_>>(), vec![(c(2), false)]);
    let second = graph.add_node();
    assert_eq!(graph.commit().added().collect::<Vec<_>>(), vec![(c(0), false)]);
    let third = graph.add_node();
    assert_eq!(graph.commit().added().collect::<Vec<_>>(), vec![(c(4), false)]);

    let manager = manager(&graph);
    assert_eq!(manager.component_of_node(first), c(2));
    assert_eq!(manager.component_of_node(second), c(0));
    assert_eq!(manager.component_of_node(third), c(4));
}

#[test]
fn removed_ids_are_not_reissued_before_commit() {
    let (mut graph, nodes) = graph_with_nodes(2);
    let edge = graph.add_edge(nodes[0], nodes[1]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());

    graph.remove_node(nodes[1]).expect("live");
    let fresh = graph.add_node();
    assert_ne!(fresh, nodes[1]);
    let changes = graph.commit();
    assert_eq!(changes.splits().count(), 0);
    assert_eq!(changes.events(), &[
        ComponentEvent::Added {
            component: c(1),
            split: false,
        },
        ComponentEvent::NodeRemoved {
            node: nodes[1],
            component: c(0),
        },
        ComponentEvent::EdgeRemoved {
            edge,
            component: c(0),
        },
    ]);

    let reused = graph.add_node();
    assert_eq!(reused, nodes[1]);
    let changes = graph.commit();
    assert_eq!(changes.splits().count(), 0);
    assert_eq!(changes.added().collect::<Vec<_>>(), vec![(c(2), false)]);
    assert_eq!(manager(&graph).component_of_node(reused), c(2));
}

#[test]
fn ordering_prefers_size_then_id() {
    let (mut graph, nodes) = graph_with_nodes(7);
    graph.add_edge(nodes[4], nodes[5]).expect("live");
    graph.add_edge(nodes[5], nodes[6]).expect("live");
    graph.add_edge(nodes[1], nodes[2]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());

    let manager = manager(&graph);
    let sizes: Vec<usize> = manager
        .component_ids()
        .into_iter()
        .map(|id| manager.component(id).expect("live").num_nodes())
        .collect();
    assert_eq!(sizes, vec![3, 2, 1, 1]);

    let singletons: Vec<ComponentId> = manager.component_ids()[2..].to_vec();
    assert!(singletons[0] < singletons[1]);
    assert_eq!(manager.largest_component_id(), manager.component_of_node(nodes[6]));
}

#[rstest]
#[case::missing(NodeId::new(40))]
#[case::null(NodeId::NULL)]
fn unknown_elements_have_no_component(#[case] node: NodeId) {
    let (mut graph, _) = graph_with_nodes(2);
    manage(&mut graph, ComponentManagerBuilder::new());
    let manager = manager(&graph);
    assert!(manager.component_of_node(node).is_null());
    assert!(manager.component_of_edge(EdgeId::new(9)).is_null());
    assert!(manager.component(ComponentId::new(17)).is_none());
}

#[test]
fn empty_graphs_have_no_largest_component() {
    let mut graph = MutableGraph::new();
    let changes = manage(&mut graph, ComponentManagerBuilder::new());
    assert!(changes.is_empty());
    assert!(manager(&graph).largest_component_id().is_null());
    assert_eq!(manager(&graph).num_components(), 0);
}

#[test]
fn filtered_nodes_drop_their_edges() {
    let (mut graph, nodes) = graph_with_nodes(3);
    let left = graph.add_edge(nodes[0], nodes[1]).expect("live");
    let right = graph.add_edge(nodes[1], nodes[2]).expect("live");
    let hidden = nodes[1];
    manage(
        &mut graph,
        ComponentManagerBuilder::new().with_node_filter(move |node| node == hidden),
    );

    let manager = manager(&graph);
    assert_eq!(manager.num_components(), 2);
    assert!(manager.component_of_node(hidden).is_null());
    assert!(manager.component_of_edge(left).is_null());
    assert!(manager.component_of_edge(right).is_null());
    assert_eq!(
        managed_components(&graph),
        node_sets(&[&[nodes[0]], &[nodes[2]]])
    );
}

#[test]
fn filtered_edges_do_not_connect() {
    let (mut graph, nodes) = graph_with_nodes(3);
    graph.add_edge(nodes[0], nodes[1]).expect("live");
    let bridge = graph.add_edge(nodes[1], nodes[2]).expect("live");
    manage(
        &mut graph,
        ComponentManagerBuilder::new().with_edge_filter(move |edge| edge == bridge),
    );

    assert_eq!(
        managed_components(&graph),
        node_sets(&[&[nodes[0], nodes[1]], &[nodes[2]]])
    );
    assert!(manager(&graph).component_of_edge(bridge).is_null());
}

#[test]
fn filters_are_evaluated_on_every_update() {
    let (mut graph, nodes) = graph_with_nodes(3);
    graph.add_edge(nodes[0], nodes[1]).expect("live");
    graph.add_edge(nodes[1], nodes[2]).expect("live");

    let hiding = Arc::new(AtomicBool::new(true));
    let hidden = nodes[1];
    let flag = Arc::clone(&hiding);
    manage(
        &mut graph,
        ComponentManagerBuilder::new()
            .with_node_filter(move |node| node == hidden && flag.load(Ordering::SeqCst)),
    );
    assert_eq!(manager(&graph).num_components(), 2);

    hiding.store(false, Ordering::SeqCst);
    let changes = manager(&graph).update(&graph);
    assert_eq!(changes.merges().count(), 1);
    assert_eq!(manager(&graph).num_components(), 1);
}

#[test]
fn filtered_merge_members_stay_unassigned() {
    let (mut graph, nodes) = graph_with_nodes(3);
    let kept = graph.add_edge(nodes[0], nodes[2]).expect("live");
    let dropped = graph.add_edge(nodes[1], nodes[2]).expect("live");
    graph.merge_nodes(nodes[0], nodes[1]).expect("live");
    let hidden = nodes[1];
    manage(
        &mut graph,
        ComponentManagerBuilder::new().with_node_filter(move |node| node == hidden),
    );

    let manager = manager(&graph);
    let component = manager.component_of_node(nodes[0]);
    assert!(manager.component_of_node(hidden).is_null());
    assert!(manager.component_of_edge(dropped).is_null());
    assert_eq!(manager.component_of_node(nodes[2]), component);
    assert_eq!(manager.component_of_edge(kept), component);
    assert_eq!(managed_components(&graph), node_sets(&[&[nodes[0], nodes[2]]]));
}

#[test]
fn filtered_tail_edges_stay_unassigned() {
    let (mut graph, nodes) = graph_with_nodes(2);
    let head = graph.add_edge(nodes[0], nodes[1]).expect("live");
    let tail = graph.add_edge(nodes[1], nodes[0]).expect("live");
    graph.merge_edges(head, tail).expect("same endpoints");
    manage(
        &mut graph,
        ComponentManagerBuilder::new().with_edge_filter(move |edge| edge == tail),
    );

    let manager = manager(&graph);
    assert_eq!(manager.num_components(), 1);
    assert_eq!(manager.component_of_edge(head), manager.component_of_node(nodes[1]));
    assert!(manager.component_of_edge(tail).is_null());
}

#[test]
fn a_filtered_head_hides_its_whole_group() {
    let (mut graph, nodes) = graph_with_nodes(3);
    graph.add_edge(nodes[1], nodes[2]).expect("live");
    graph.merge_nodes(nodes[0], nodes[1]).expect("live");
    let hidden = nodes[0];
    manage(
        &mut graph,
        ComponentManagerBuilder::new().with_node_filter(move |node| node == hidden),
    );

    let manager = manager(&graph);
    assert!(manager.component_of_node(nodes[1]).is_null());
    assert_eq!(managed_components(&graph), node_sets(&[&[nodes[2]]]));
}

#[test]
fn merged_nodes_share_their_head_component() {
    let (mut graph, nodes) = graph_with_nodes(3);
    manage(&mut graph, ComponentManagerBuilder::new());

    let head = graph.merge_nodes(nodes[0], nodes[2]).expect("live");
    let changes = graph.commit();
    assert_eq!(changes.events(), &[
        ComponentEvent::WillMerge(ComponentMergeSet::new(ids(&[0, 2]), c(0))),
        ComponentEvent::WillBeRemoved {
            component: c(2),
            merged: true,
        },
    ]);

    let manager = manager(&graph);
    assert_eq!(head, nodes[0]);
    assert_eq!(manager.component_of_node(nodes[2]), c(0));
    assert_eq!(manager.component(c(0)).expect("live").node_ids(), &[nodes[0]]);
    assert_eq!(manager.num_components(), 2);
}

#[test]
fn tail_edges_follow_their_head() {
    let (mut graph, nodes) = graph_with_nodes(2);
    let head = graph.add_edge(nodes[0], nodes[1]).expect("live");
    let tail = graph.add_edge(nodes[1], nodes[0]).expect("live");
    graph.merge_edges(head, tail).expect("same endpoints");
    manage(&mut graph, ComponentManagerBuilder::new());

    let manager = manager(&graph);
    let component = manager.component(manager.largest_component_id()).expect("live");
    assert_eq!(component.edge_ids(), &[head]);
    assert_eq!(manager.component_of_edge(tail), component.id());
}

#[test]
fn contraction_keeps_components_intact() {
    let (mut graph, nodes) = graph_with_nodes(4);
    let edges: Vec<EdgeId> = nodes
        .windows(2)
        .map(|pair| graph.add_edge(pair[0], pair[1]).expect("live"))
        .collect();
    manage(&mut graph, ComponentManagerBuilder::new());

    graph.contract_edges(|edge| edge != edges[1]);
    let changes = graph.commit();
    assert_eq!(changes.merges().count(), 0);
    assert_eq!(changes.splits().count(), 0);
    assert_eq!(manager(&graph).num_components(), 1);
    assert_eq!(managed_components(&graph), oracle_components(&graph, |_| false, |_| false));
}

#[test]
fn listeners_receive_the_batch_after_commit() {
    let log = EventLog::default();
    let (mut graph, nodes) = graph_with_nodes(2);
    manage(
        &mut graph,
        ComponentManagerBuilder::new().with_listener(log.listener()),
    );
    assert_eq!(log.take().len(), 2);

    let observed = Arc::new(AtomicUsize::new(usize::MAX));
    {
        let reader = manager(&graph).reader();
        let observed = Arc::clone(&observed);
        manager(&graph).add_listener(move |_: &ComponentEvent| {
            observed.store(reader.num_components(), Ordering::SeqCst);
        });
    }

    graph.add_edge(nodes[0], nodes[1]).expect("live");
    let changes = graph.commit();
    assert_eq!(log.take(), changes.events().to_vec());
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[test]
fn component_arrays_follow_the_id_space() {
    let (mut graph, nodes) = graph_with_nodes(2);
    manage(&mut graph, ComponentManagerBuilder::new());
    let mut labels: ComponentArray<&str> = ComponentArray::new(manager(&graph));
    assert_eq!(labels.len(), 2);
    labels[c(1)] = "second";

    graph.add_node();
    graph.add_node();
    graph.commit();
    assert_eq!(labels.len(), 4);
    assert_eq!(labels[c(1)], "second");
    assert_eq!(labels[c(3)], "");

    graph.add_edge(nodes[0], nodes[1]).expect("live");
    graph.commit();
    assert_eq!(labels.len(), 4);

    let reader = manager(&graph).reader();
    drop(graph);
    assert!(!labels.is_valid());
    assert_eq!(reader.num_components(), 3);
}

#[test]
fn readers_see_committed_state_from_other_threads() {
    let (mut graph, nodes) = graph_with_nodes(3);
    graph.add_edge(nodes[1], nodes[2]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());

    let reader = manager(&graph).reader();
    let (count, largest) = thread::spawn(move || {
        reader.read(|view| (view.num_components(), view.largest_component_id()))
    })
    .join()
    .expect("reader thread panicked");
    assert_eq!(count, 2);
    assert_eq!(largest, manager(&graph).component_of_node(nodes[2]));
}

#[test]
fn slow_lock_acquisition_is_reported() {
    let sink = Arc::new(RecordingSink::default());
    let (mut graph, _) = graph_with_nodes(2);
    manage(
        &mut graph,
        ComponentManagerBuilder::new()
            .with_lock_warning_threshold(Duration::from_millis(5))
            .with_diagnostic_sink(sink.clone()),
    );
    let manager = manager(&graph);
    let reader = manager.reader();
    let held = Barrier::new(2);

    thread::scope(|scope| {
        scope.spawn(|| {
            reader.read(|_| {
                held.wait();
                thread::sleep(Duration::from_millis(40));
            });
        });
        held.wait();
        thread::Builder::new()
            .name("updater".to_owned())
            .spawn_scoped(scope, || manager.update(&graph))
            .expect("spawn updater")
            .join()
            .expect("updater panicked");
    });

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].thread, "updater");
    assert_eq!(reports[0].resource, "components");
    assert!(reports[0].waited >= Duration::from_millis(5));
}

#[test]
fn updates_are_traced() {
    let (mut graph, nodes) = graph_with_nodes(3);
    manage(&mut graph, ComponentManagerBuilder::new());
    graph.add_edge(nodes[0], nodes[1]).expect("live");

    let (layer, changes) = RecordingLayer::capture(|| graph.commit());
    let spans = layer.spans_named("components.update");
    assert_eq!(spans.len(), 1);
    let fields = &spans[0].fields;
    assert_eq!(fields.get("nodes").map(String::as_str), Some("3"));
    assert_eq!(fields.get("edges").map(String::as_str), Some("1"));
    assert_eq!(fields.get("components").map(String::as_str), Some("2"));
    assert_eq!(
        fields.get("events").map(String::as_str),
        Some(changes.len().to_string().as_str())
    );

    let debug = layer.messages(Level::DEBUG);
    assert_eq!(
        debug.iter().filter(|message| *message == "component event").count(),
        changes.len()
    );
    assert!(debug.iter().any(|message| message == "component update committed"));
}

#[test]
fn a_fragment_reaching_another_component_reports_the_merge() {
    let (mut graph, nodes) = graph_with_nodes(3);
    let cut = graph.add_edge(nodes[0], nodes[1]).expect("live");
    manage(&mut graph, ComponentManagerBuilder::new());

    graph.remove_edge(cut).expect("live");
    let bridge = graph.add_edge(nodes[1], nodes[2]).expect("live");
    let changes = graph.commit();
    assert_eq!(changes.events(), &[
        ComponentEvent::WillMerge(ComponentMergeSet::new(ids(&[1, 2]), c(2))),
        ComponentEvent::WillBeRemoved {
            component: c(1),
            merged: true,
        },
        ComponentEvent::Added {
            component: c(2),
            split: true,
        },
        ComponentEvent::Split(ComponentSplitSet::new(c(0), ids(&[0, 2]))),
        ComponentEvent::EdgeAdded {
            edge: bridge,
            component: c(2),
        },
        ComponentEvent::EdgeRemoved {
            edge: cut,
            component: c(0),
        },
    ]);
    assert_eq!(manager(&graph).component_of_node(nodes[2]), c(2));
}

/// Node and edge filters hiding ids by residue, shared by the manager under
/// test and the reference union-find.
#[derive(Clone, Copy, Debug)]
struct Hidden {
    node: Option<usize>,
    edge: Option<usize>,
}

impl Hidden {
    fn hides_node(self, node: NodeId) -> bool {
        self.node.is_some_and(|residue| node.index() % 3 == residue)
    }

    fn hides_edge(self, edge: EdgeId) -> bool {
        self.edge.is_some_and(|residue| edge.index() % 4 == residue)
    }

    fn builder(self) -> ComponentManagerBuilder {
        let mut builder = ComponentManagerBuilder::new();
        if self.node.is_some() {
            builder = builder.with_node_filter(move |node| self.hides_node(node));
        }
        if self.edge.is_some() {
            builder = builder.with_edge_filter(move |edge| self.hides_edge(edge));
        }
        builder
    }
}

fn hiding() -> impl Strategy<Value = Hidden> {
    (prop::option::of(0_usize..3), prop::option::of(0_usize..4))
        .prop_map(|(node, edge)| Hidden { node, edge })
}

#[derive(Clone, Debug)]
enum Op {
    AddNode,
    AddEdge(usize, usize),
    RemoveNode(usize),
    RemoveEdge(usize),
    MergeNodes(usize, usize),
    MergeEdges(usize, usize),
    ContractEdges(usize),
    Clear,
    Commit,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::AddNode),
        4 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::AddEdge(a, b)),
        1 => any::<usize>().prop_map(Op::RemoveNode),
        2 => any::<usize>().prop_map(Op::RemoveEdge),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::MergeNodes(a, b)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::MergeEdges(a, b)),
        1 => (0_usize..5).prop_map(Op::ContractEdges),
        1 => Just(Op::Clear),
        3 => Just(Op::Commit),
    ]
}

fn pick<T: Copy>(items: &[T], seed: usize) -> Option<T> {
    (!items.is_empty()).then(|| items[seed % items.len()])
}

/// Unordered endpoint heads of `edge`.
fn canonical_ends(graph: &MutableGraph, edge: EdgeId) -> Option<(NodeId, NodeId)> {
    graph.edge_endpoints(edge).map(|(source, target)| {
        let (source, target) = (graph.canonical_node(source), graph.canonical_node(target));
        (source.min(target), source.max(target))
    })
}

/// Applies `op`, returning the batch when it was a commit.
fn apply(graph: &mut MutableGraph, op: &Op) -> Option<ComponentChanges> {
    let nodes: Vec<NodeId> = graph.node_ids().collect();
    let edges: Vec<EdgeId> = graph.edge_ids().collect();
    match *op {
        Op::AddNode => {
            graph.add_node();
        }
        Op::AddEdge(a, b) => {
            if let (Some(a), Some(b)) = (pick(&nodes, a), pick(&nodes, b)) {
                graph.add_edge(a, b).expect("picked nodes are live");
            }
        }
        Op::RemoveNode(a) => {
            if let Some(node) = pick(&nodes, a) {
                graph.remove_node(node).expect("picked node is live");
            }
        }
        Op::RemoveEdge(a) => {
            if let Some(edge) = pick(&edges, a) {
                graph.remove_edge(edge).expect("picked edge is live");
            }
        }
        Op::MergeNodes(a, b) => {
            if let (Some(a), Some(b)) = (pick(&nodes, a), pick(&nodes, b)) {
                graph.merge_nodes(a, b).expect("picked nodes are live");
            }
        }
        Op::MergeEdges(a, b) => {
            if let Some(first) = pick(&edges, a) {
                let ends = canonical_ends(graph, first);
                let parallel: Vec<EdgeId> = edges
                    .iter()
                    .copied()
                    .filter(|&edge| canonical_ends(graph, edge) == ends)
                    .collect();
                if let Some(second) = pick(&parallel, b) {
                    graph.merge_edges(first, second).expect("edges are parallel");
                }
            }
        }
        Op::ContractEdges(residue) => {
            graph.contract_edges(|edge| edge.index() % 5 == residue);
        }
        Op::Clear => graph.clear(),
        Op::Commit => return Some(graph.commit()),
    }
    None
}

fn check_partition(graph: &MutableGraph, hidden: Hidden) -> Result<(), TestCaseError> {
    let manager = manager(graph);
    let hides_node = |node: NodeId| hidden.hides_node(node);
    let hides_edge = |edge: EdgeId| hidden.hides_edge(edge);
    prop_assert_eq!(
        managed_components(graph),
        oracle_components(graph, hides_node, hides_edge)
    );

    let ordered = manager.component_ids();
    let sizes: Vec<(std::cmp::Reverse<usize>, ComponentId)> = ordered
        .iter()
        .map(|&id| {
            let size = manager.component(id).map_or(0, |component| component.num_nodes());
            (std::cmp::Reverse(size), id)
        })
        .collect();
    prop_assert!(sizes.windows(2).all(|pair| pair[0] < pair[1]));

    for node in graph.node_ids() {
        let component = manager.component_of_node(node);
        if node_visible(graph, node, &hides_node) {
            prop_assert!(manager.contains_component(component));
            prop_assert_eq!(component, manager.component_of_node(graph.canonical_node(node)));
        } else {
            prop_assert!(component.is_null());
        }
    }
    for edge in graph.edge_ids() {
        let (source, _) = graph.edge_endpoints(edge).expect("edge is live");
        let expected = if edge_visible(graph, edge, &hides_node, &hides_edge) {
            manager.component_of_node(source)
        } else {
            ComponentId::NULL
        };
        prop_assert_eq!(manager.component_of_edge(edge), expected);
    }
    Ok(())
}

/// What the manager reported at the last commit, and the nodes that came
/// and went since.
struct Ledger {
    live: BTreeSet<ComponentId>,
    committed: BTreeMap<NodeId, ComponentId>,
    departed: BTreeMap<NodeId, ComponentId>,
    arrived: BTreeSet<NodeId>,
}

impl Ledger {
    fn snapshot(graph: &MutableGraph) -> Self {
        let manager = manager(graph);
        Self {
            live: manager.component_ids().into_iter().collect(),
            committed: graph
                .node_ids()
                .map(|node| (node, manager.component_of_node(node)))
                .collect(),
            departed: BTreeMap::new(),
            arrived: BTreeSet::new(),
        }
    }

    fn track(&mut self, before: &BTreeSet<NodeId>, graph: &MutableGraph) {
        let after: BTreeSet<NodeId> = graph.node_ids().collect();
        for &node in before.difference(&after) {
            if self.arrived.remove(&node) {
                continue;
            }
            if let Some(&component) = self.committed.get(&node) {
                self.departed.entry(node).or_insert(component);
            }
        }
        self.arrived.extend(after.difference(before).copied());
    }
}

/// Checks that `changes` accounts for every node whose component differs
/// from the last commit.
fn check_events(
    graph: &MutableGraph,
    ledger: &Ledger,
    changes: &ComponentChanges,
) -> Result<(), TestCaseError> {
    let manager = manager(graph);
    let added: BTreeSet<ComponentId> = changes.added().map(|(id, _)| id).collect();
    let added_whole: BTreeSet<ComponentId> = changes
        .added()
        .filter_map(|(id, split)| (!split).then_some(id))
        .collect();
    let removed: BTreeSet<ComponentId> = changes.removed().map(|(id, _)| id).collect();
    let removed_whole: BTreeSet<ComponentId> = changes
        .removed()
        .filter_map(|(id, merged)| (!merged).then_some(id))
        .collect();

    let live: BTreeSet<ComponentId> = manager.component_ids().into_iter().collect();
    let expected_live: BTreeSet<ComponentId> = ledger
        .live
        .difference(&removed)
        .chain(&added)
        .copied()
        .collect();
    prop_assert_eq!(&live, &expected_live);

    let mut successors: BTreeMap<ComponentId, BTreeSet<ComponentId>> = BTreeMap::new();
    for merge in changes.merges() {
        prop_assert!(live.contains(&merge.new_id()));
        for &old in merge.merged() {
            successors.entry(old).or_default().insert(merge.new_id());
        }
    }
    for split in changes.splits() {
        successors
            .entry(split.old_id())
            .or_default()
            .extend(split.split_ids().iter().copied());
    }

    let mut joined = BTreeMap::new();
    let mut left = BTreeMap::new();
    for event in changes {
        match *event {
            ComponentEvent::NodeAdded { node, component } => {
                joined.insert(node, component);
            }
            ComponentEvent::NodeRemoved { node, component } => {
                left.insert(node, component);
            }
            _ => {}
        }
    }

    for (&node, &before) in &ledger.departed {
        if before.is_null() {
            prop_assert!(!left.contains_key(&node));
        } else {
            prop_assert!(left.get(&node) == Some(&before) || removed_whole.contains(&before));
        }
    }

    for &node in &ledger.arrived {
        let now = manager.component_of_node(node);
        if !ledger.departed.contains_key(&node) {
            prop_assert!(!left.contains_key(&node));
        }
        if now.is_null() {
            prop_assert!(!joined.contains_key(&node));
        } else {
            prop_assert!(joined.get(&node) == Some(&now) || added_whole.contains(&now));
        }
    }

    for node in graph.node_ids() {
        if ledger.arrived.contains(&node) {
            continue;
        }
        let Some(&before) = ledger.committed.get(&node) else {
            continue;
        };
        let now = manager.component_of_node(node);
        match (before.is_null(), now.is_null()) {
            (true, true) => {
                prop_assert!(!joined.contains_key(&node) && !left.contains_key(&node));
            }
            (true, false) => {
                prop_assert!(joined.get(&node) == Some(&now) || added_whole.contains(&now));
            }
            (false, true) => {
                prop_assert!(left.get(&node) == Some(&before) || removed_whole.contains(&before));
            }
            (false, false) => {
                prop_assert!(!joined.contains_key(&node) && !left.contains_key(&node));
                prop_assert!(
                    now == before || successors.get(&before).is_some_and(|next| next.contains(&now))
                );
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(suite_proptest_config(128))]

    #[test]
    fn incremental_updates_match_a_fresh_union_find(
        seed_nodes in 0_usize..8,
        hidden in hiding(),
        ops in prop::collection::vec(op(), 0..48),
    ) {
        let (mut graph, _) = graph_with_nodes(seed_nodes);
        manage(&mut graph, hidden.builder());
        check_partition(&graph, hidden)?;
        let mut ledger = Ledger::snapshot(&graph);

        for op in &ops {
            let before: BTreeSet<NodeId> = graph.node_ids().collect();
            let committed = apply(&mut graph, op);
            ledger.track(&before, &graph);
            if let Some(changes) = committed {
                check_partition(&graph, hidden)?;
                check_events(&graph, &ledger, &changes)?;
                ledger = Ledger::snapshot(&graph);
            }
        }

        let changes = graph.commit();
        check_partition(&graph, hidden)?;
        check_events(&graph, &ledger, &changes)?;
        prop_assert!(manager(&graph).update(&graph).is_empty());
    }
}
