//! Fatal, programmer-invariant-violation errors (§7.3). These are distinct
//! from `FailMode`, which is "information" steering the search, not a bug.

use crate::ids::{InstanceIdx, NodeIdx};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("node index {0} not present in snapshot")]
    MissingNode(NodeIdx),
    #[error("instance index {0} not present in snapshot")]
    MissingInstance(InstanceIdx),
    #[error("node {0} has an empty name")]
    EmptyNodeName(NodeIdx),
    #[error("instance {inst} is split across groups (primary={primary_group}, secondary={secondary_group})")]
    SplitInstance {
        inst: InstanceIdx,
        primary_group: i64,
        secondary_group: i64,
    },
}
