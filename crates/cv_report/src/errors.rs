//! §7.3 — fatal, programmer-invariant violations surfaced while rendering a
//! plan: an empty node name, a missing index, or an instance whose primary
//! and secondary have drifted into different groups reaching opcode
//! emission. None of these should occur for snapshots produced by this
//! engine's own moves; they exist to catch a caller handing in a
//! malformed one.

use cv_core::{CoreError, InstanceIdx, NodeIdx};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("node {0}: empty name")]
    EmptyNodeName(NodeIdx),
    #[error("instance {0}: empty name")]
    EmptyInstanceName(InstanceIdx),
    #[error("instance {0}: not found")]
    MissingInstance(InstanceIdx),
    #[error("node {0}: not found")]
    MissingNode(NodeIdx),
    #[error("instance {0}: primary and secondary are in different groups")]
    SplitInstance(InstanceIdx),
}

impl From<CoreError> for ReportError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MissingNode(n) => ReportError::MissingNode(n),
            CoreError::MissingInstance(i) => ReportError::MissingInstance(i),
            CoreError::EmptyNodeName(n) => ReportError::EmptyNodeName(n),
            CoreError::SplitInstance { inst, .. } => ReportError::SplitInstance(inst),
        }
    }
}
