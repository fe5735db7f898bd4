//! Index newtypes for nodes, instances, and groups.
//!
//! The engine addresses every entity by a small integer index rather than by
//! name; names are only carried for diagnostics and opcode emission. Using
//! distinct newtypes (rather than bare `i64`) keeps a node index from being
//! passed where an instance index is expected at the type level.

use core::fmt;

macro_rules! def_idx {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub i64);

        impl $name {
            #[inline]
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

def_idx!(NodeIdx, "Index of a node within a cluster snapshot.");
def_idx!(InstanceIdx, "Index of an instance within a cluster snapshot.");
def_idx!(GroupIdx, "Index of a node group within a cluster snapshot.");
