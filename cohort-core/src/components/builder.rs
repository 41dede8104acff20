//! Configuration surface for [`ComponentManager`].

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    graph::GraphView,
    ids::{EdgeId, NodeId},
};

use super::{
    ComponentManager, EdgeFilter, Filters, NodeFilter,
    events::ComponentListener,
    lock::{DEFAULT_LOCK_WARNING_THRESHOLD, DiagnosticSink, TracingSink},
};

/// Configures and constructs [`ComponentManager`] instances.
///
/// # Examples
/// ```
/// use std::time::Duration;
///
/// use cohort_core::{ComponentManagerBuilder, ElementId, MutableGraph, NodeId};
///
/// let mut graph = MutableGraph::new();
/// let a = graph.add_node();
/// let hidden = graph.add_node();
///
/// let builder = ComponentManagerBuilder::new()
///     .with_node_filter(move |node: NodeId| node == hidden)
///     .with_lock_warning_threshold(Duration::from_millis(250));
/// assert_eq!(builder.lock_warning_threshold(), Duration::from_millis(250));
///
/// graph.enable_component_management(builder)?;
/// let components = graph.component_manager().expect("management is enabled");
/// assert_eq!(components.num_components(), 1);
/// assert!(components.component_of_node(hidden).is_null());
/// assert!(!components.component_of_node(a).is_null());
/// # Ok::<(), cohort_core::GraphError>(())
/// ```
#[derive(Clone)]
pub struct ComponentManagerBuilder {
    pub(super) filters: Filters,
    pub(super) lock_warning_threshold: Duration,
    pub(super) sink: Arc<dyn DiagnosticSink>,
    pub(super) listeners: Vec<Arc<dyn ComponentListener>>,
    pub(super) enabled: bool,
}

impl Default for ComponentManagerBuilder {
    fn default() -> Self {
        Self {
            filters: Filters::default(),
            lock_warning_threshold: DEFAULT_LOCK_WARNING_THRESHOLD,
            sink: Arc::new(TracingSink),
            listeners: Vec::new(),
            enabled: true,
        }
    }
}

impl ComponentManagerBuilder {
    /// Creates a builder with no filters, no listeners, a 100 ms lock warning
    /// threshold reported through `tracing`, and management enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes every node for which `filter` returns `true`. Edges touching
    /// an excluded node are excluded too.
    #[must_use]
    pub fn with_node_filter(mut self, filter: impl Fn(NodeId) -> bool + Send + Sync + 'static) -> Self {
        self.filters.node = Some(Arc::new(filter) as NodeFilter);
        self
    }

    /// Excludes every edge for which `filter` returns `true`.
    #[must_use]
    pub fn with_edge_filter(mut self, filter: impl Fn(EdgeId) -> bool + Send + Sync + 'static) -> Self {
        self.filters.edge = Some(Arc::new(filter) as EdgeFilter);
        self
    }

    /// Sets how long a thread may block on the manager's lock before the
    /// wait is reported.
    #[must_use]
    pub fn with_lock_warning_threshold(mut self, threshold: Duration) -> Self {
        self.lock_warning_threshold = threshold;
        self
    }

    /// Returns the configured lock warning threshold.
    #[must_use]
    pub fn lock_warning_threshold(&self) -> Duration {
        self.lock_warning_threshold
    }

    /// Routes lock contention reports to `sink` instead of `tracing`.
    #[must_use]
    pub fn with_diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Registers a listener for every event of every update.
    #[must_use]
    pub fn with_listener(mut self, listener: impl ComponentListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Sets whether graph commits trigger updates initially.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns whether the manager starts enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Constructs a manager bound to `graph`. The partition stays empty until
    /// the first [`ComponentManager::update`].
    #[must_use]
    pub fn build<G: GraphView>(self, graph: &G) -> ComponentManager {
        ComponentManager::new(graph, self)
    }
}

impl fmt::Debug for ComponentManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentManagerBuilder")
            .field("node_filter", &self.filters.node.is_some())
            .field("edge_filter", &self.filters.edge.is_some())
            .field("lock_warning_threshold", &self.lock_warning_threshold)
            .field("listeners", &self.listeners.len())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
