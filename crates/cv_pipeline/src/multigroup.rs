//! Remainder of C4 — multi-group allocation: `tryMGAlloc`, `findBestAllocGroup`,
//! and the network-connectivity filter `filterValidGroups`.

use cv_algo::comp_cv;
use cv_core::cluster::split_cluster;
use cv_core::{AllocPolicy, GroupIdx, GroupList, Instance, InstanceList, NodeList};

use crate::alloc::{gen_alloc_nodes, try_alloc, AllocSolution};
use crate::error::PipelineError;

/// Per-group candidate: the group's own policy, the post-placement score of
/// its best solution, and the solution itself.
#[derive(Clone, Debug)]
pub struct GroupAlloc {
    pub group: GroupIdx,
    pub policy: AllocPolicy,
    pub solution: AllocSolution,
}

/// `filterValidGroups`: drop groups not connected to every network the
/// instance's NICs require.
pub fn filter_valid_groups<'a>(groups: &'a GroupList, inst: &Instance) -> Vec<&'a cv_core::Group> {
    let required = inst.required_networks();
    groups
        .elems()
        .filter(|g| required.iter().all(|net| g.connected_to(net)))
        .collect()
}

/// Run `tryAlloc` independently in every network-eligible group, without
/// picking a winner. Exposed so `tieredAlloc` can aggregate the failure
/// histogram across every group it tried, not just the winner's.
pub fn evaluate_all_groups(groups: &GroupList, nl: &NodeList, inst: &Instance, count: u8) -> Result<Vec<GroupAlloc>, PipelineError> {
    let eligible = filter_valid_groups(groups, inst);
    if eligible.is_empty() {
        return Err(PipelineError::NoCandidateGroup(inst.idx));
    }

    let parts = split_cluster(nl, &InstanceList::new());
    let mut candidates: Vec<GroupAlloc> = Vec::new();
    for g in &eligible {
        let Some((group_nl, _)) = parts.get(&g.idx) else { continue };
        let nodes = gen_alloc_nodes(groups, group_nl, count, false)?;
        let solution = try_alloc(group_nl, inst, nodes).unwrap_or_else(|_| AllocSolution::empty());
        candidates.push(GroupAlloc {
            group: g.idx,
            policy: g.alloc_policy,
            solution,
        });
    }
    Ok(candidates)
}

/// `findBestAllocGroup`: run `tryAlloc` independently in every eligible
/// group and keep the lowest-scoring solution, `(AllocPolicy, score)`
/// ascending (Preferred before LastResort before Unallocable, §4.4).
pub fn find_best_alloc_group(groups: &GroupList, nl: &NodeList, inst: &Instance, count: u8) -> Result<GroupAlloc, PipelineError> {
    let mut candidates = evaluate_all_groups(groups, nl, inst, count)?;

    candidates.sort_by(|a, b| {
        let score_a = a.solution.best.as_ref().map(|e| e.score).unwrap_or(f64::INFINITY);
        let score_b = b.solution.best.as_ref().map(|e| e.score).unwrap_or(f64::INFINITY);
        (a.policy, score_a)
            .partial_cmp(&(b.policy, score_b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    candidates
        .into_iter()
        .find(|c| c.solution.has_solution() && c.policy.is_allocable())
        .ok_or(PipelineError::NoCandidateGroup(inst.idx))
}

/// `tryMGAlloc`: allocate across every node group, reporting the
/// cluster-wide score that results once the chosen group's solution is
/// folded back into the full node list.
pub fn try_mg_alloc(groups: &GroupList, nl: &NodeList, inst: &Instance, count: u8) -> Result<(GroupAlloc, f64), PipelineError> {
    let best = find_best_alloc_group(groups, nl, inst, count)?;
    let elem = best.solution.best.clone().ok_or(PipelineError::NoCandidateGroup(inst.idx))?;

    let mut merged = nl.clone();
    for ndx in &elem.affected_nodes {
        if let Some(updated) = elem.nodes.find(*ndx) {
            merged = merged.add(*ndx, updated.clone());
        }
    }
    let score = comp_cv(&merged);
    Ok((best, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::{DiskTemplate, GroupIdx, InstanceIdx, Node, NodeIdx, Policy, UtilVec};
    use std::collections::BTreeSet;

    fn group(idx: i64, policy: AllocPolicy) -> cv_core::Group {
        cv_core::Group {
            idx: GroupIdx(idx),
            name: format!("g{idx}"),
            alloc_policy: policy,
            networks: BTreeSet::new(),
        }
    }

    fn node(idx: i64, group: i64, free_mem: u64) -> Node {
        Node {
            idx: NodeIdx(idx),
            name: format!("n{idx}"),
            group: GroupIdx(group),
            policy: Policy::unrestricted(),
            total_mem_mib: 65536,
            total_disk_mib: 1_000_000,
            total_cpus: 16,
            hi_cpu: 32,
            hi_spindles: 24,
            exclusive_storage: false,
            offline: false,
            free_mem_mib: free_mem,
            free_disk_mib: 1_000_000,
            reserved_mem_mib: 0,
            used_cpus: 0,
            used_spindles: 0,
            unaccounted_mem_mib: 0,
            own_mem_mib: 0,
            primary: BTreeSet::new(),
            secondary: Default::default(),
            dyn_util: UtilVec::default(),
            primary_tags: Default::default(),
        }
    }

    fn plain_inst() -> Instance {
        Instance {
            idx: InstanceIdx(1),
            name: "new".into(),
            alias: String::new(),
            primary: NodeIdx(0),
            secondary: None,
            mem_mib: 4096,
            disk_mib: 10240,
            vcpus: 2,
            spindles: 1,
            util: UtilVec::default(),
            running: true,
            auto_balance: true,
            movable: true,
            disk_template: DiskTemplate::Plain,
            nics: Vec::new(),
            excl_tags: BTreeSet::new(),
        }
    }

    #[test]
    fn find_best_alloc_group_prefers_preferred_policy() {
        let mut groups = GroupList::new();
        groups = groups.add(GroupIdx(0), group(0, AllocPolicy::LastResort));
        groups = groups.add(GroupIdx(1), group(1, AllocPolicy::Preferred));

        let mut nl = NodeList::new();
        nl = nl.add(NodeIdx(1), node(1, 0, 32768));
        nl = nl.add(NodeIdx(2), node(2, 1, 32768));

        let inst = plain_inst();
        let best = find_best_alloc_group(&groups, &nl, &inst, 1).unwrap();
        assert_eq!(best.group, GroupIdx(1));
    }

    #[test]
    fn no_connected_group_fails_with_no_candidate() {
        let mut groups = GroupList::new();
        groups = groups.add(GroupIdx(0), group(0, AllocPolicy::Preferred));
        let nl = NodeList::new();
        let mut inst = plain_inst();
        inst.nics.push(cv_core::Nic { network: Some("prod".into()) });
        let err = find_best_alloc_group(&groups, &nl, &inst, 1).unwrap_err();
        assert_eq!(err, PipelineError::NoCandidateGroup(inst.idx));
    }
}
