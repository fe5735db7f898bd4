//! Per-group instance policy: the ratios `instMatchesPolicy` checks against.

use crate::enums::DiskTemplate;

/// Resource ratio bounds a group enforces on every instance it hosts.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Policy {
    /// Max vCPUs per physical CPU thread a single instance may request,
    /// independent of the node's current load (the node's own `hiCpu`
    /// watermark, consulted during `addPri`/`addSec`, covers the
    /// current-usage side of the same bound).
    pub vcpu_ratio: f64,
    pub min_vcpus: u32,
    pub max_vcpus: u32,
    pub min_mem_mib: u64,
    pub max_mem_mib: u64,
    pub min_disk_mib: u64,
    pub max_disk_mib: u64,
    /// Disk templates this group accepts; empty means "no restriction".
    pub allowed_templates: Vec<DiskTemplate>,
}

impl Policy {
    /// A permissive policy used by tests and as a sane default.
    pub fn unrestricted() -> Self {
        Policy {
            vcpu_ratio: 4.0,
            min_vcpus: 1,
            max_vcpus: u32::MAX,
            min_mem_mib: 0,
            max_mem_mib: u64::MAX,
            min_disk_mib: 0,
            max_disk_mib: u64::MAX,
            allowed_templates: Vec::new(),
        }
    }

    pub fn accepts_template(&self, t: DiskTemplate) -> bool {
        self.allowed_templates.is_empty() || self.allowed_templates.contains(&t)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::unrestricted()
    }
}
