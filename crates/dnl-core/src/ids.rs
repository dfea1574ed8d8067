//! Index handles for links, nodes, and interned paths.
//!
//! The engine keeps links and nodes in dense `Vec` stores and keys every
//! per-path table by a small integer handle, so three separate index spaces
//! are in play at once.  Mixing them up compiles fine with bare `usize` and
//! fails silently at runtime; wrapping each space in its own newtype makes
//! the mix-up a type error instead.  Handles deliberately expose only what
//! the engine needs: a store lookup via [`index`](LinkId::index), an
//! "unwired" sentinel, and readable formatting for error messages.

use std::fmt;

macro_rules! id_type {
    ($(#[$attr:meta])* $name:ident, $display:literal) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            /// Sentinel for a handle not yet wired into a network — a fresh
            /// link carries it as tail/head until the builder attaches both
            /// ends.
            pub const INVALID: $name = $name(u32::MAX);

            /// Position in the owning dense store.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($display, " {}"), self.0)
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                u32::try_from(n).map($name)
            }
        }
    };
}

id_type! {
    /// A directed link in the network's link store.
    LinkId, "link"
}

id_type! {
    /// A node in the network's node store.
    NodeId, "node"
}

id_type! {
    /// An interned path (ordered link sequence).  Per-path count maps and
    /// flow tables are keyed by this.
    PathId, "path"
}
