//! Closed enumerations shared across the capacity model, scoring, and moves.
//!
//! `FailMode`'s declaration order is load-bearing: `tieredAlloc`'s
//! shrink-by-most-common-failure logic sorts the failure histogram by count
//! and, on a tie, keeps the entry that sorts last — which is this order.
//! Do not reorder these variants without re-checking `cv_pipeline::iterate`.

use crate::ids::NodeIdx;
use core::fmt;

/// Disk backend of an instance. Determines `MirrorType` and move eligibility.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiskTemplate {
    Diskless,
    Plain,
    File,
    SharedFile,
    Block,
    Rbd,
    Ext,
    Drbd8,
}

impl DiskTemplate {
    /// The mirroring family this template belongs to.
    pub fn mirror_type(self) -> MirrorType {
        match self {
            DiskTemplate::Drbd8 => MirrorType::Internal,
            DiskTemplate::Diskless
            | DiskTemplate::SharedFile
            | DiskTemplate::Block
            | DiskTemplate::Rbd
            | DiskTemplate::Ext => MirrorType::External,
            DiskTemplate::Plain | DiskTemplate::File => MirrorType::None,
        }
    }

    /// Human-readable name as used in opcode diagnostics (lowercase, Ganeti-style).
    pub fn as_str(self) -> &'static str {
        match self {
            DiskTemplate::Diskless => "diskless",
            DiskTemplate::Plain => "plain",
            DiskTemplate::File => "file",
            DiskTemplate::SharedFile => "sharedfile",
            DiskTemplate::Block => "blockdev",
            DiskTemplate::Rbd => "rbd",
            DiskTemplate::Ext => "ext",
            DiskTemplate::Drbd8 => "drbd",
        }
    }
}

impl fmt::Display for DiskTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mirroring family: whether an instance has a secondary node at all.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MirrorType {
    None,
    Internal,
    External,
}

/// The six move variants. Target node indices are carried inline so
/// `applyMove` can remain a pure function of `(snapshot, instance, move)`.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IMove {
    Failover,
    FailoverToAny(NodeIdx),
    ReplacePrimary(NodeIdx),
    ReplaceSecondary(NodeIdx),
    ReplaceAndFailover(NodeIdx),
    FailoverAndReplace(NodeIdx),
}

impl IMove {
    /// Single-letter/short code used by `printSolutionLine`'s moves column.
    pub fn short_code(self) -> String {
        match self {
            IMove::Failover => "f".to_string(),
            IMove::FailoverToAny(n) => format!("fa:{n}"),
            IMove::ReplacePrimary(n) => format!("f r:{n}"),
            IMove::ReplaceSecondary(n) => format!("r:{n}"),
            IMove::ReplaceAndFailover(n) => format!("r:{n} f"),
            IMove::FailoverAndReplace(n) => format!("f r:{n} f"),
        }
    }
}

/// Evacuation scope requested for a node (or set of nodes) being drained.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EvacMode {
    ChangePrimary,
    ChangeSecondary,
    ChangeAll,
}

/// Per-group allocation preference. Ordering is significant: `tryMGAlloc`
/// sorts candidate groups by `(AllocPolicy, score)` ascending, so
/// `Preferred` must declare before `LastResort` before `Unallocable`.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AllocPolicy {
    Preferred,
    LastResort,
    Unallocable,
}

impl AllocPolicy {
    pub fn is_allocable(self) -> bool {
        !matches!(self, AllocPolicy::Unallocable)
    }
}

/// Reasons capacity arithmetic can reject a placement. Declaration order is
/// the tie-break order for `tieredAlloc`'s shrink selection — see module docs.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailMode {
    FailMem,
    FailDisk,
    FailCPU,
    FailN1,
    FailTags,
    FailDiskCount,
    FailSpindles,
    FailNetwork,
    FailDiskTemplate,
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailMode::FailMem => "FailMem",
            FailMode::FailDisk => "FailDisk",
            FailMode::FailCPU => "FailCPU",
            FailMode::FailN1 => "FailN1",
            FailMode::FailTags => "FailTags",
            FailMode::FailDiskCount => "FailDiskCount",
            FailMode::FailSpindles => "FailSpindles",
            FailMode::FailNetwork => "FailNetwork",
            FailMode::FailDiskTemplate => "FailDiskTemplate",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_policy_order_matches_preference() {
        assert!(AllocPolicy::Preferred < AllocPolicy::LastResort);
        assert!(AllocPolicy::LastResort < AllocPolicy::Unallocable);
    }

    #[test]
    fn mirror_type_by_template() {
        assert_eq!(DiskTemplate::Drbd8.mirror_type(), MirrorType::Internal);
        assert_eq!(DiskTemplate::Rbd.mirror_type(), MirrorType::External);
        assert_eq!(DiskTemplate::Plain.mirror_type(), MirrorType::None);
    }

    #[test]
    fn failmode_declaration_order() {
        let mut v = vec![FailMode::FailNetwork, FailMode::FailMem, FailMode::FailCPU];
        v.sort();
        assert_eq!(v, vec![FailMode::FailMem, FailMode::FailCPU, FailMode::FailNetwork]);
    }
}
