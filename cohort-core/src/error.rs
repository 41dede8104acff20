//! Error types for the cohort core library.
//!
//! Only the mutable graph reports recoverable errors; contract violations on
//! the lower-level structures are assertions.

use std::fmt;

use thiserror::Error;

use crate::ids::{EdgeId, NodeId};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Error type produced by [`crate::MutableGraph`] operations.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum GraphError {
    /// The node is null or not live in the graph.
    #[error("node {node} is not in the graph")]
    NodeNotFound {
        /// The node that could not be found.
        node: NodeId,
    },
    /// The edge is null or not live in the graph.
    #[error("edge {edge} is not in the graph")]
    EdgeNotFound {
        /// The edge that could not be found.
        edge: EdgeId,
    },
    /// Edges can only be merged when their endpoints resolve to the same
    /// merged nodes.
    #[error("edges {first} and {second} do not connect the same nodes")]
    MismatchedEdgeEndpoints {
        /// The edge the merge was anchored at.
        first: EdgeId,
        /// The edge that could not join it.
        second: EdgeId,
    },
    /// A graph binds at most one component manager for its lifetime.
    #[error("the graph already has a component manager")]
    AlreadyComponentManaged,
}

define_error_codes! {
    /// Stable codes describing [`GraphError`] variants.
    enum GraphErrorCode for GraphError {
        /// The node is null or not live in the graph.
        NodeNotFound => NodeNotFound { .. } => "GRAPH_NODE_NOT_FOUND",
        /// The edge is null or not live in the graph.
        EdgeNotFound => EdgeNotFound { .. } => "GRAPH_EDGE_NOT_FOUND",
        /// Edges can only be merged when their endpoints match.
        MismatchedEdgeEndpoints => MismatchedEdgeEndpoints { .. } => "GRAPH_MISMATCHED_EDGE_ENDPOINTS",
        /// A graph binds at most one component manager.
        AlreadyComponentManaged => AlreadyComponentManaged => "GRAPH_ALREADY_COMPONENT_MANAGED",
    }
}

/// Convenient alias for results returned by the graph API.
pub type Result<T, E = GraphError> = core::result::Result<T, E>;
