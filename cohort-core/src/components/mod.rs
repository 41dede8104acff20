//! Incremental connected-component maintenance.
//!
//! A [`ComponentManager`] is bound to one graph. Each
//! [`update`](ComponentManager::update) recomputes the partition of the
//! graph's non-filtered elements into connected components, reusing the ids
//! of components that survive and reporting merges, splits, additions and
//! removals as a [`ComponentChanges`] batch. All state sits behind one timed
//! re-entrant lock shared with any number of [`ComponentReader`]s.

mod builder;
mod component;
mod events;
mod lock;
mod partition;

use std::{
    cell::RefCell,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::{
    array::{ArraySource, IdSpace},
    graph::GraphView,
    ids::{ComponentId, EdgeId, NodeId},
};

pub use self::{
    builder::ComponentManagerBuilder,
    component::GraphComponent,
    events::{ComponentChanges, ComponentEvent, ComponentListener, ComponentMergeSet, ComponentSplitSet},
    lock::{DEFAULT_LOCK_WARNING_THRESHOLD, DiagnosticSink, LockContention, TracingSink},
};
use self::{lock::TimedLock, partition::Partition};

/// Predicate excluding nodes from component maintenance.
pub type NodeFilter = Arc<dyn Fn(NodeId) -> bool + Send + Sync>;
/// Predicate excluding edges from component maintenance.
pub type EdgeFilter = Arc<dyn Fn(EdgeId) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Filters {
    node: Option<NodeFilter>,
    edge: Option<EdgeFilter>,
}

impl Filters {
    fn excludes_node(&self, node: NodeId) -> bool {
        self.node.as_ref().is_some_and(|filter| filter(node))
    }

    fn excludes_edge(&self, edge: EdgeId) -> bool {
        self.edge.as_ref().is_some_and(|filter| filter(edge))
    }
}

const LOCK_RESOURCE: &str = "components";

struct Shared {
    partition: TimedLock<RefCell<Partition>>,
    component_space: Arc<IdSpace<ComponentId>>,
}

/// Read access to the committed partition, valid while the lock is held.
///
/// Obtained through [`ComponentReader::read`]; every query made through one
/// view observes the same committed update.
pub struct ComponentView<'a> {
    partition: &'a Partition,
}

impl ComponentView<'_> {
    /// Live component ids, largest component first; ties in ascending id
    /// order.
    #[must_use]
    pub fn component_ids(&self) -> &[ComponentId] {
        self.partition.component_ids()
    }

    /// Number of live components.
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.partition.component_ids().len()
    }

    /// Returns `true` when `id` names a live component.
    #[must_use]
    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.partition.contains(id)
    }

    /// The published membership of a live component.
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<Arc<GraphComponent>> {
        self.partition.component(id).cloned()
    }

    /// The component with the most nodes, or null when there are none.
    #[must_use]
    pub fn largest_component_id(&self) -> ComponentId {
        self.partition
            .component_ids()
            .first()
            .copied()
            .unwrap_or_default()
    }

    /// The component of `node`; null for filtered, dead or unknown nodes.
    #[must_use]
    pub fn component_of_node(&self, node: NodeId) -> ComponentId {
        self.partition.component_of_node(node)
    }

    /// The component of `edge`; null for filtered, dead or unknown edges.
    #[must_use]
    pub fn component_of_edge(&self, edge: EdgeId) -> ComponentId {
        self.partition.component_of_edge(edge)
    }
}

/// A cloneable, thread-safe handle onto a manager's committed partition.
///
/// Every accessor takes the manager's lock, so readers block while an update
/// is in flight. Use [`ComponentReader::read`] to run several queries
/// against one consistent state.
#[derive(Clone)]
pub struct ComponentReader {
    shared: Arc<Shared>,
}

impl ComponentReader {
    /// Runs `f` against the committed partition while holding the lock.
    pub fn read<R>(&self, f: impl FnOnce(&ComponentView<'_>) -> R) -> R {
        let guard = self.shared.partition.lock();
        let partition = guard.borrow();
        f(&ComponentView {
            partition: &partition,
        })
    }

    /// Copies the live component ids, largest component first.
    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.read(|view| view.component_ids().to_vec())
    }

    /// Number of live components.
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.read(|view| view.num_components())
    }

    /// Returns `true` when `id` names a live component.
    #[must_use]
    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.read(|view| view.contains_component(id))
    }

    /// The published membership of a live component.
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<Arc<GraphComponent>> {
        self.read(|view| view.component(id))
    }

    /// The component with the most nodes, or null when there are none.
    #[must_use]
    pub fn largest_component_id(&self) -> ComponentId {
        self.read(|view| view.largest_component_id())
    }

    /// The component of `node`, or null.
    #[must_use]
    pub fn component_of_node(&self, node: NodeId) -> ComponentId {
        self.read(|view| view.component_of_node(node))
    }

    /// The component of `edge`, or null.
    #[must_use]
    pub fn component_of_edge(&self, edge: EdgeId) -> ComponentId {
        self.read(|view| view.component_of_edge(edge))
    }
}

impl ArraySource<ComponentId> for ComponentReader {
    fn id_space(&self) -> &Arc<IdSpace<ComponentId>> {
        &self.shared.component_space
    }
}

impl fmt::Debug for ComponentReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentReader")
            .field("component_space", &self.shared.component_space)
            .finish_non_exhaustive()
    }
}

/// Maintains the connected components of one graph.
///
/// # Examples
/// ```
/// use cohort_core::{ComponentArray, ComponentManagerBuilder, MutableGraph};
///
/// let mut graph = MutableGraph::new();
/// let a = graph.add_node();
/// let b = graph.add_node();
/// graph.add_edge(a, b)?;
///
/// let manager = ComponentManagerBuilder::new().build(&graph);
/// let changes = manager.update(&graph);
/// assert_eq!(changes.added().count(), 1);
///
/// let mut sizes: ComponentArray<usize> = ComponentArray::new(&manager);
/// for id in manager.component_ids() {
///     let component = manager.component(id).expect("live component");
///     sizes[id] = component.num_nodes();
/// }
/// assert_eq!(sizes.iter().sum::<usize>(), 2);
///
/// // A second update with no mutation changes nothing.
/// assert!(manager.update(&graph).is_empty());
/// # Ok::<(), cohort_core::GraphError>(())
/// ```
pub struct ComponentManager {
    reader: ComponentReader,
    filters: Filters,
    enabled: AtomicBool,
    listeners: Mutex<Vec<Arc<dyn ComponentListener>>>,
}

impl ComponentManager {
    fn new<G: GraphView>(graph: &G, builder: ComponentManagerBuilder) -> Self {
        let ComponentManagerBuilder {
            filters,
            lock_warning_threshold,
            sink,
            listeners,
            enabled,
        } = builder;

        let shared = Shared {
            partition: TimedLock::new(
                RefCell::new(Partition::new(graph)),
                LOCK_RESOURCE,
                lock_warning_threshold,
                sink,
            ),
            component_space: IdSpace::shared(),
        };
        Self {
            reader: ComponentReader {
                shared: Arc::new(shared),
            },
            filters,
            enabled: AtomicBool::new(enabled),
            listeners: Mutex::new(listeners),
        }
    }

    /// Recomputes the partition of `graph` and returns the resulting events.
    ///
    /// Runs regardless of [`is_enabled`](Self::is_enabled); the enabled flag
    /// only gates updates triggered by [`MutableGraph::commit`]. Listeners
    /// receive every event after the partition is committed and the lock is
    /// released.
    ///
    /// `graph` must be the graph the manager was built for.
    ///
    /// [`MutableGraph::commit`]: crate::MutableGraph::commit
    #[instrument(
        name = "components.update",
        skip_all,
        fields(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            components = tracing::field::Empty,
            events = tracing::field::Empty,
        ),
    )]
    pub fn update<G: GraphView>(&self, graph: &G) -> ComponentChanges {
        let started = Instant::now();
        let (changes, stats, components) = {
            let guard = self.reader.shared.partition.lock();
            let mut partition = guard.borrow_mut();
            let (changes, stats) =
                partition.update(graph, &self.filters, &self.reader.shared.component_space);
            (changes, stats, partition.component_ids().len())
        };

        let span = tracing::Span::current();
        span.record("components", components);
        span.record("events", changes.len());
        debug!(
            merges = stats.merges,
            splits = stats.splits,
            "component update committed"
        );
        self.record_update(started, stats.merges, stats.splits);

        let listeners = self.listeners.lock().clone();
        for event in &changes {
            debug!(%event, "component event");
            for listener in &listeners {
                listener.on_event(event);
            }
        }
        changes
    }

    #[cfg(feature = "metrics")]
    fn record_update(&self, started: Instant, merges: usize, splits: usize) {
        metrics::counter!("component_updates").increment(1);
        metrics::histogram!("component_update_latency_histogram")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("component_merges").increment(merges as u64);
        metrics::counter!("component_splits").increment(splits as u64);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_update(&self, _started: Instant, _merges: usize, _splits: usize) {}

    /// Registers a listener for subsequent updates.
    pub fn add_listener(&self, listener: impl ComponentListener + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Enables or disables updates on graph commits.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Returns `true` when graph commits trigger updates.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// A handle that can query the partition from other threads, and keeps
    /// working after the manager is dropped.
    #[must_use]
    pub fn reader(&self) -> ComponentReader {
        self.reader.clone()
    }

    /// See [`ComponentReader::read`].
    pub fn read<R>(&self, f: impl FnOnce(&ComponentView<'_>) -> R) -> R {
        self.reader.read(f)
    }

    /// See [`ComponentView::component_ids`].
    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.reader.component_ids()
    }

    /// Number of live components.
    /// See [`ComponentView::num_components`].
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.reader.num_components()
    }

    /// Returns `true` when `id` names a live component.
    /// See [`ComponentView::contains_component`].
    #[must_use]
    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.reader.contains_component(id)
    }

    /// The published membership of a live component.
    /// See [`ComponentView::component`].
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<Arc<GraphComponent>> {
        self.reader.component(id)
    }

    /// The component with the most nodes, or null when there are none.
    /// See [`ComponentView::largest_component_id`].
    #[must_use]
    pub fn largest_component_id(&self) -> ComponentId {
        self.reader.largest_component_id()
    }

    /// The component of `node`, or null.
    /// See [`ComponentView::component_of_node`].
    #[must_use]
    pub fn component_of_node(&self, node: NodeId) -> ComponentId {
        self.reader.component_of_node(node)
    }

    /// The component of `edge`, or null.
    /// See [`ComponentView::component_of_edge`].
    #[must_use]
    pub fn component_of_edge(&self, edge: EdgeId) -> ComponentId {
        self.reader.component_of_edge(edge)
    }
}

impl ArraySource<ComponentId> for ComponentManager {
    fn id_space(&self) -> &Arc<IdSpace<ComponentId>> {
        self.reader.id_space()
    }
}

impl Drop for ComponentManager {
    fn drop(&mut self) {
        self.reader.shared.component_space.invalidate();
    }
}

impl fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentManager")
            .field("enabled", &self.is_enabled())
            .field("listeners", &self.listeners.lock().len())
            .field("component_space", &self.reader.shared.component_space)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
