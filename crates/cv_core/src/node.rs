//! Node entity and the capacity arithmetic of C1: `addPri`, `addSec`,
//! `removePri`, `removeSec`, and `instMatchesPolicy`.
//!
//! Every operation here is pure: it borrows a `Node` and an `Instance` and
//! returns either a brand-new `Node` or a typed `FailMode`. Nothing is
//! mutated in place; callers thread the returned value through the
//! container (`cv_core::cluster`) to get a new logical snapshot.

use crate::enums::FailMode;
use crate::ids::{GroupIdx, InstanceIdx, NodeIdx};
use crate::instance::{Instance, UtilVec};
use crate::policy::Policy;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub idx: NodeIdx,
    pub name: String,
    pub group: GroupIdx,
    /// Snapshot of the owning group's instance-acceptance policy (§3: "policy
    /// reference"). Denormalized onto the node so capacity arithmetic never
    /// needs a `GroupList` in scope.
    pub policy: Policy,

    pub total_mem_mib: u64,
    pub total_disk_mib: u64,
    pub total_cpus: u32,
    pub hi_cpu: u32,
    pub hi_spindles: u32,
    pub exclusive_storage: bool,
    pub offline: bool,

    pub free_mem_mib: u64,
    pub free_disk_mib: u64,
    pub reserved_mem_mib: u64,
    pub used_cpus: u32,
    pub used_spindles: u32,
    pub unaccounted_mem_mib: u64,
    pub own_mem_mib: u64,

    pub primary: BTreeSet<InstanceIdx>,
    /// Secondary instances hosted here, keyed by index with their memory
    /// demand carried alongside so `remove_sec` can recompute
    /// `reserved_mem_mib` (the max over remaining secondaries) without
    /// needing the full instance snapshot in scope.
    pub secondary: BTreeMap<InstanceIdx, u64>,

    pub dyn_util: UtilVec,

    /// Exclusion tag -> primaries on this node carrying that tag. Drives
    /// `conflicting_primaries` and the `FailTags` check in `add_pri`.
    /// Maintained incrementally by `add_pri`/`remove_pri`; callers building a
    /// snapshot from scratch may leave this empty.
    pub primary_tags: BTreeMap<String, BTreeSet<InstanceIdx>>,
}

impl Node {
    /// `true` if this node cannot currently absorb the failure of any one
    /// hosted peer (§3 invariant 7 violated).
    pub fn fail_n1(&self) -> bool {
        self.reserved_mem_mib > self.free_mem_mib
    }

    pub fn avail_disk(&self) -> u64 {
        self.free_disk_mib
    }

    pub fn avail_cpu(&self) -> u32 {
        self.hi_cpu.saturating_sub(self.used_cpus)
    }

    pub fn p_mem(&self) -> f64 {
        if self.total_mem_mib == 0 {
            0.0
        } else {
            100.0 * (self.total_mem_mib - self.free_mem_mib) as f64 / self.total_mem_mib as f64
        }
    }

    pub fn p_dsk(&self) -> f64 {
        if self.total_disk_mib == 0 {
            0.0
        } else {
            100.0 * (self.total_disk_mib - self.free_disk_mib) as f64 / self.total_disk_mib as f64
        }
    }

    pub fn p_cpu(&self) -> f64 {
        if self.hi_cpu == 0 {
            0.0
        } else {
            100.0 * self.used_cpus as f64 / self.hi_cpu as f64
        }
    }

    pub fn p_rem(&self) -> f64 {
        if self.total_mem_mib == 0 {
            0.0
        } else {
            100.0 * self.reserved_mem_mib as f64 / self.total_mem_mib as f64
        }
    }

    /// Count of primary instances sharing at least one exclusion tag with
    /// another primary on this node.
    pub fn conflicting_primaries(&self) -> u32 {
        let mut conflicting: BTreeSet<InstanceIdx> = BTreeSet::new();
        for holders in self.primary_tags.values() {
            if holders.len() > 1 {
                conflicting.extend(holders.iter().copied());
            }
        }
        conflicting.len() as u32
    }

    /// `instMatchesPolicy`: validates vcpu/mem/disk/spindle/template against
    /// this node's group policy, independent of current free capacity.
    pub fn inst_matches_policy(&self, inst: &Instance) -> Result<(), FailMode> {
        let policy = &self.policy;
        if inst.vcpus < policy.min_vcpus || inst.vcpus > policy.max_vcpus {
            return Err(FailMode::FailCPU);
        }
        if inst.vcpus as f64 > policy.vcpu_ratio * self.total_cpus as f64 {
            return Err(FailMode::FailCPU);
        }
        if inst.mem_mib < policy.min_mem_mib || inst.mem_mib > policy.max_mem_mib {
            return Err(FailMode::FailMem);
        }
        if inst.disk_mib < policy.min_disk_mib || inst.disk_mib > policy.max_disk_mib {
            return Err(FailMode::FailDisk);
        }
        if !policy.accepts_template(inst.disk_template) {
            return Err(FailMode::FailDiskTemplate);
        }
        if self.exclusive_storage && inst.spindles == 0 {
            return Err(FailMode::FailSpindles);
        }
        Ok(())
    }

    fn check_tags(&self, inst: &Instance) -> Result<(), FailMode> {
        for tag in &inst.excl_tags {
            if self.primary_tags.contains_key(tag) {
                return Err(FailMode::FailTags);
            }
        }
        Ok(())
    }

    /// `addPri`, unforced (online-node path).
    pub fn add_pri(&self, inst: &Instance) -> Result<Node, FailMode> {
        self.add_pri_ex(inst, false)
    }

    /// `addPriEx(force)`: `force = true` skips the N+1 reservation check,
    /// used when the originating node is offline (forced failover).
    pub fn add_pri_ex(&self, inst: &Instance, force: bool) -> Result<Node, FailMode> {
        self.inst_matches_policy(inst)?;
        self.check_tags(inst)?;
        if inst.disk_mib > self.free_disk_mib {
            return Err(FailMode::FailDisk);
        }
        if self.used_spindles + inst.spindles > self.hi_spindles {
            return Err(FailMode::FailSpindles);
        }
        if self.used_cpus + inst.vcpus > self.hi_cpu {
            return Err(FailMode::FailCPU);
        }
        let new_free_mem = if force {
            self.free_mem_mib.saturating_sub(inst.mem_mib)
        } else {
            if inst.mem_mib > self.free_mem_mib {
                return Err(FailMode::FailMem);
            }
            self.free_mem_mib - inst.mem_mib
        };
        if !force && self.reserved_mem_mib > new_free_mem {
            return Err(FailMode::FailN1);
        }

        let mut n = self.clone();
        n.free_mem_mib = new_free_mem;
        n.free_disk_mib -= inst.disk_mib;
        n.used_cpus += inst.vcpus;
        n.used_spindles += inst.spindles;
        n.dyn_util.cpu += inst.util.cpu;
        n.dyn_util.mem += inst.util.mem;
        n.dyn_util.disk += inst.util.disk;
        n.dyn_util.net += inst.util.net;
        n.primary.insert(inst.idx);
        for tag in &inst.excl_tags {
            n.primary_tags.entry(tag.clone()).or_default().insert(inst.idx);
        }
        Ok(n)
    }

    /// `addSec`, unforced.
    pub fn add_sec(&self, inst: &Instance) -> Result<Node, FailMode> {
        self.add_sec_ex(inst, false)
    }

    /// `addSecEx(force)`. Reservation is the max memory demand across all
    /// hosted secondaries (§3 invariant 7).
    pub fn add_sec_ex(&self, inst: &Instance, force: bool) -> Result<Node, FailMode> {
        if inst.disk_mib > self.free_disk_mib {
            return Err(FailMode::FailDisk);
        }
        if self.used_spindles + inst.spindles > self.hi_spindles {
            return Err(FailMode::FailSpindles);
        }
        let new_rmem = self.reserved_mem_mib.max(inst.mem_mib);
        if !force && new_rmem > self.free_mem_mib {
            return Err(FailMode::FailN1);
        }
        let mut n = self.clone();
        n.free_disk_mib -= inst.disk_mib;
        n.used_spindles += inst.spindles;
        n.reserved_mem_mib = new_rmem;
        n.secondary.insert(inst.idx, inst.mem_mib);
        Ok(n)
    }

    /// Inverse of `add_pri`/`add_pri_ex`.
    pub fn remove_pri(&self, inst: &Instance) -> Node {
        let mut n = self.clone();
        n.free_mem_mib += inst.mem_mib;
        n.free_disk_mib += inst.disk_mib;
        n.used_cpus = n.used_cpus.saturating_sub(inst.vcpus);
        n.used_spindles = n.used_spindles.saturating_sub(inst.spindles);
        n.dyn_util.cpu -= inst.util.cpu;
        n.dyn_util.mem -= inst.util.mem;
        n.dyn_util.disk -= inst.util.disk;
        n.dyn_util.net -= inst.util.net;
        n.primary.remove(&inst.idx);
        for tag in &inst.excl_tags {
            if let Some(holders) = n.primary_tags.get_mut(tag) {
                holders.remove(&inst.idx);
                if holders.is_empty() {
                    n.primary_tags.remove(tag);
                }
            }
        }
        n
    }

    /// Inverse of `add_sec`/`add_sec_ex`. Recomputes `reserved_mem_mib` as
    /// the max memory demand over whatever secondaries remain.
    pub fn remove_sec(&self, inst: &Instance) -> Node {
        let mut n = self.clone();
        n.free_disk_mib += inst.disk_mib;
        n.used_spindles = n.used_spindles.saturating_sub(inst.spindles);
        n.secondary.remove(&inst.idx);
        n.reserved_mem_mib = n.secondary.values().copied().max().unwrap_or(0);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::DiskTemplate;
    use std::collections::BTreeSet as Set;

    fn plain_node(idx: i64, mem: u64, disk: u64) -> Node {
        Node {
            idx: NodeIdx(idx),
            name: format!("node{idx}"),
            group: GroupIdx(0),
            policy: Policy::unrestricted(),
            total_mem_mib: mem,
            total_disk_mib: disk,
            total_cpus: 8,
            hi_cpu: 32,
            hi_spindles: 12,
            exclusive_storage: false,
            offline: false,
            free_mem_mib: mem,
            free_disk_mib: disk,
            reserved_mem_mib: 0,
            used_cpus: 0,
            used_spindles: 0,
            unaccounted_mem_mib: 0,
            own_mem_mib: 0,
            primary: Set::new(),
            secondary: BTreeMap::new(),
            dyn_util: UtilVec::default(),
            primary_tags: BTreeMap::new(),
        }
    }

    fn plain_inst(idx: i64, mem: u64, disk: u64, primary: i64) -> Instance {
        Instance {
            idx: InstanceIdx(idx),
            name: format!("inst{idx}"),
            alias: String::new(),
            primary: NodeIdx(primary),
            secondary: None,
            mem_mib: mem,
            disk_mib: disk,
            vcpus: 2,
            spindles: 1,
            util: UtilVec::default(),
            running: true,
            auto_balance: true,
            movable: true,
            disk_template: DiskTemplate::Plain,
            nics: Vec::new(),
            excl_tags: Set::new(),
        }
    }

    #[test]
    fn add_pri_then_remove_pri_round_trips() {
        let n = plain_node(1, 65536, 1048576);
        let i = plain_inst(1, 4096, 51200, 1);
        let n2 = n.add_pri(&i).unwrap();
        assert_eq!(n2.free_mem_mib, 65536 - 4096);
        assert!(n2.primary.contains(&i.idx));
        let n3 = n2.remove_pri(&i);
        assert_eq!(n3.free_mem_mib, n.free_mem_mib);
        assert_eq!(n3.free_disk_mib, n.free_disk_mib);
        assert!(!n3.primary.contains(&i.idx));
    }

    #[test]
    fn add_pri_rejects_insufficient_memory() {
        let n = plain_node(1, 2048, 1048576);
        let i = plain_inst(1, 4096, 51200, 1);
        let err = n.add_pri(&i).unwrap_err();
        assert_eq!(err, FailMode::FailMem);
    }

    #[test]
    fn add_pri_forced_ignores_n1_reservation() {
        let mut n = plain_node(1, 8192, 1048576);
        n.reserved_mem_mib = 9000; // already N+1-failing before this add
        let i = plain_inst(1, 100, 1024, 1);
        assert!(n.add_pri(&i).is_err());
        assert!(n.add_pri_ex(&i, true).is_ok());
    }

    #[test]
    fn add_sec_reservation_is_max_of_secondaries() {
        let n = plain_node(1, 16384, 1048576);
        let i1 = plain_inst(1, 4096, 1024, 2);
        let i2 = plain_inst(2, 6144, 1024, 3);
        let n2 = n.add_sec(&i1).unwrap();
        assert_eq!(n2.reserved_mem_mib, 4096);
        let n3 = n2.add_sec(&i2).unwrap();
        assert_eq!(n3.reserved_mem_mib, 6144);
        let n4 = n3.remove_sec(&i2);
        assert_eq!(n4.reserved_mem_mib, 4096);
    }

    #[test]
    fn conflicting_tags_reject_second_primary() {
        let n = plain_node(1, 65536, 1048576);
        let mut i1 = plain_inst(1, 1024, 1024, 1);
        i1.excl_tags.insert("rack:a".into());
        let mut i2 = plain_inst(2, 1024, 1024, 1);
        i2.excl_tags.insert("rack:a".into());
        let n2 = n.add_pri(&i1).unwrap();
        let err = n2.add_pri(&i2).unwrap_err();
        assert_eq!(err, FailMode::FailTags);
    }
}
