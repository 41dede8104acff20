//! Element identifiers for nodes, edges and components.
//!
//! Identifiers are small dense integers used directly as array indices. Each
//! kind has a distinguished null value that lies outside every valid index
//! range and is also the [`Default`].

use std::{fmt, hash::Hash};

/// Behaviour shared by every element identifier kind.
///
/// # Examples
/// ```
/// use cohort_core::{ElementId, NodeId};
///
/// let id = NodeId::from_index(3);
/// assert_eq!(id.index(), 3);
/// assert!(!id.is_null());
/// assert!(NodeId::NULL.is_null());
/// assert_eq!(NodeId::default(), NodeId::NULL);
/// ```
pub trait ElementId:
    Copy + Eq + Ord + Hash + Default + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// The null identifier. It never indexes a live element.
    const NULL: Self;

    /// Short lowercase label used in diagnostics (`"node"`, `"edge"`, ...).
    const KIND: &'static str;

    /// Builds an identifier from a dense index.
    ///
    /// # Panics
    /// Panics when `index` cannot be represented, which includes the index
    /// reserved for [`Self::NULL`].
    fn from_index(index: usize) -> Self;

    /// Returns the dense index of this identifier.
    fn index(self) -> usize;

    /// Returns `true` for the null identifier.
    #[must_use]
    fn is_null(self) -> bool {
        self == Self::NULL
    }
}

macro_rules! define_element_id {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Creates an identifier from its raw value.
            #[rustfmt::skip]
            #[must_use]
            pub const fn new(raw: u32) -> Self { Self(raw) }

            /// Returns the raw value, which is `u32::MAX` for the null id.
            #[rustfmt::skip]
            #[must_use]
            pub const fn get(self) -> u32 { self.0 }
        }

        impl ElementId for $name {
            const NULL: Self = Self(u32::MAX);
            const KIND: &'static str = $kind;

            fn from_index(index: usize) -> Self {
                match u32::try_from(index) {
                    Ok(raw) if raw != u32::MAX => Self(raw),
                    _ => panic!("{} index {index} exceeds the identifier range", $kind),
                }
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    write!(f, "{}(null)", stringify!($name))
                } else {
                    write!(f, "{}({})", stringify!($name), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    f.write_str("null")
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

define_element_id! {
    /// Identifies a node of a graph.
    NodeId => "node"
}

define_element_id! {
    /// Identifies an edge of a graph.
    EdgeId => "edge"
}

define_element_id! {
    /// Identifies a connected component.
    ///
    /// # Examples
    /// ```
    /// use cohort_core::ComponentId;
    ///
    /// let id = ComponentId::new(2);
    /// assert_eq!(id.get(), 2);
    /// assert_eq!(id.to_string(), "2");
    /// ```
    ComponentId => "component"
}

/// Position of an element relative to the multi-element group it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MultiElementType {
    /// Not grouped with anything (or a group of one).
    Not,
    /// Canonical representative of a group.
    Head,
    /// Any non-head member of a group; an alias of the head.
    Tail,
}
