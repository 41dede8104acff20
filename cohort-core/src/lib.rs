//! Cohort core library.
//!
//! Incremental connected-component tracking for mutable graphs: dense element
//! ids, graph-indexed arrays that follow their id space, distinct-set
//! collections for adjacency storage, and a component manager that keeps the
//! partition current and reports how it changed.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod array;
mod components;
mod distinct_set;
mod error;
mod graph;
mod ids;
#[cfg(test)]
mod test_utils;

pub use crate::{
    array::{
        ArraySource, ComponentArray, EdgeArray, GraphArray, IdSpace, LockedGraphArray, NodeArray,
    },
    components::{
        ComponentChanges, ComponentEvent, ComponentListener, ComponentManager,
        ComponentManagerBuilder, ComponentMergeSet, ComponentReader, ComponentSplitSet,
        ComponentView, DEFAULT_LOCK_WARNING_THRESHOLD, DiagnosticSink, EdgeFilter,
        GraphComponent, LockContention, NodeFilter, TracingSink,
    },
    distinct_set::{
        DistinctSet, DistinctSetCollection, DistinctSetIter, DistinctSets, DistinctSetsIntoIter,
        DistinctSetsIter,
    },
    error::{GraphError, GraphErrorCode, Result},
    graph::{GraphView, MutableGraph},
    ids::{ComponentId, EdgeId, ElementId, MultiElementType, NodeId},
};
