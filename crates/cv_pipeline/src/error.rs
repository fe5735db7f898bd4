//! §7.2 — plan-construction errors: string-tagged failures from the search
//! orchestration, distinct from the typed `FailMode` that capacity
//! arithmetic produces. These surface to the caller annotated with the
//! stage that raised them.

use cv_core::InstanceIdx;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Not enough online nodes")]
    NotEnoughOnlineNodes,
    #[error("No online nodes")]
    NoOnlineNodes,
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),
    #[error("instance {0}: cannot be relocated")]
    CannotBeRelocated(InstanceIdx),
    #[error("Instances with disk template '{template}' can't execute change secondary")]
    ChangeSecondaryUnsupported { template: &'static str },
    #[error("Failing over to the secondary")]
    FailingOverToSecondary,
    #[error("no candidate group found for instance {0}")]
    NoCandidateGroup(InstanceIdx),
    #[error("group {0} is not connected to every network instance {1} requires")]
    NetworkUnreachable(i64, InstanceIdx),
}
