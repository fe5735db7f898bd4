//! `CStats`: a 21-field aggregate of cluster totals, consumed by C7's
//! per-step diagnostics and `cv_report`'s summary line.

use crate::cluster::NodeList;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CStats {
    pub total_mem_mib: u64,
    pub free_mem_mib: u64,
    pub reserved_mem_mib: u64,
    pub allocatable_mem_mib: u64,
    pub max_mem_mib: u64,

    pub total_disk_mib: u64,
    pub free_disk_mib: u64,
    pub allocatable_disk_mib: u64,
    pub max_disk_mib: u64,

    pub total_cpus: u64,
    pub used_cpus: u64,
    pub hi_cpus: u64,
    pub normalized_cpu_usage: f64,

    pub total_spindles: u64,
    pub used_spindles: u64,
    pub hi_spindles: u64,

    pub node_count: u64,
    pub online_node_count: u64,
    pub instance_count: u64,
    pub bad_node_count: u64,

    pub score: f64,
}

impl CStats {
    /// Compute the aggregate over a node snapshot. `score` is filled by the
    /// caller (it requires `compCVNodes`, which lives in `cv_algo` and must
    /// not be depended on from here to keep `cv_core` free of scoring
    /// concerns).
    pub fn compute(nodes: &NodeList, score: f64) -> CStats {
        let mut s = CStats {
            score,
            ..CStats::default()
        };
        for n in nodes.elems() {
            s.node_count += 1;
            s.total_mem_mib += n.total_mem_mib;
            s.total_disk_mib += n.total_disk_mib;
            s.total_cpus += n.total_cpus as u64;
            s.total_spindles += n.hi_spindles as u64;
            s.hi_cpus += n.hi_cpu as u64;
            s.hi_spindles += n.hi_spindles as u64;
            if n.offline {
                s.bad_node_count += 1;
                continue;
            }
            s.online_node_count += 1;
            s.free_mem_mib += n.free_mem_mib;
            s.reserved_mem_mib += n.reserved_mem_mib;
            s.allocatable_mem_mib += n.free_mem_mib.saturating_sub(n.reserved_mem_mib);
            s.max_mem_mib = s.max_mem_mib.max(n.free_mem_mib);
            s.free_disk_mib += n.free_disk_mib;
            s.allocatable_disk_mib += n.free_disk_mib;
            s.max_disk_mib = s.max_disk_mib.max(n.free_disk_mib);
            s.used_cpus += n.used_cpus as u64;
            s.used_spindles += n.used_spindles as u64;
            s.instance_count += (n.primary.len() + n.secondary.len()) as u64;
            if n.hi_cpu > 0 {
                s.normalized_cpu_usage += n.used_cpus as f64 / n.hi_cpu as f64;
            }
        }
        s
    }
}
