//! Instance entity: identity, placement, demand, and mirroring.

use crate::enums::{DiskTemplate, MirrorType};
use crate::ids::{InstanceIdx, NodeIdx};
use std::collections::BTreeSet;

/// A 4-wide dynamic utilization vector: cpu, mem, disk, net (in that order,
/// matching `compDetailedCV` metrics 8-11).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UtilVec {
    pub cpu: f64,
    pub mem: f64,
    pub disk: f64,
    pub net: f64,
}

/// A single NIC, optionally attached to a named network.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Nic {
    pub network: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instance {
    pub idx: InstanceIdx,
    pub name: String,
    pub alias: String,

    pub primary: NodeIdx,
    /// `None` plays the role of the source's `noSecondary` sentinel.
    pub secondary: Option<NodeIdx>,

    pub mem_mib: u64,
    pub disk_mib: u64,
    pub vcpus: u32,
    pub spindles: u32,
    pub util: UtilVec,

    pub running: bool,
    pub auto_balance: bool,
    pub movable: bool,

    pub disk_template: DiskTemplate,
    pub nics: Vec<Nic>,

    /// Exclusion tags: two primaries sharing any tag here conflict (§3,
    /// `conflictingPrimaries`).
    pub excl_tags: BTreeSet<String>,
}

impl Instance {
    pub fn mirror_type(&self) -> MirrorType {
        self.disk_template.mirror_type()
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Networks this instance's NICs require connectivity to (for
    /// `filterValidGroups`).
    pub fn required_networks(&self) -> BTreeSet<&str> {
        self.nics
            .iter()
            .filter_map(|n| n.network.as_deref())
            .collect()
    }
}
