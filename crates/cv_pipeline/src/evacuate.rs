//! C6 — evacuation and group change: `nodeEvacInstance`, `evacOneNodeOnly`,
//! `evacDrbdAllInner`, `tryNodeEvac`, `tryChangeGroup`.

use std::collections::BTreeSet;

use cv_algo::{apply_move, comp_cv};
use cv_core::{DiskTemplate, EvacMode, FailMode, GroupIdx, GroupList, IMove, Instance, InstanceIdx, InstanceList, MirrorType, NodeIdx, NodeList};

use crate::error::PipelineError;
use crate::multigroup::find_best_alloc_group;

/// Outcome of an evacuation sweep: successfully relocated instances (with
/// the opcode-shaped move sequence that relocated them) and the ones that
/// could not be moved, with a reason.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvacSolution {
    pub moved: Vec<(InstanceIdx, Vec<IMove>)>,
    pub failed: Vec<(InstanceIdx, String)>,
}

fn stage_err(stage: &str, fm: FailMode) -> PipelineError {
    PipelineError::AllocationFailed(format!("{stage}: {fm}"))
}

fn group_score(nl: &NodeList, gdx: GroupIdx) -> f64 {
    comp_cv(&nl.filter(|n| n.group == gdx))
}

/// `evacOneNodeOnly`: try `op_fn(candidate)` for every candidate, keeping the
/// lowest target-group score among the moves that succeed. The last error is
/// retained only until the first success.
fn evac_one_node_only<F: Fn(NodeIdx) -> IMove>(
    nl: &NodeList,
    il: &InstanceList,
    inst: &Instance,
    gdx: GroupIdx,
    avail_nodes: &[NodeIdx],
    op_fn: F,
) -> Result<(NodeList, InstanceList, Vec<IMove>, f64), PipelineError> {
    let mut best: Option<(NodeList, Instance, f64, IMove)> = None;
    let mut last_err: Option<FailMode> = None;

    for &ndx in avail_nodes {
        let mv = op_fn(ndx);
        match apply_move(nl, inst, mv) {
            Ok((nl2, inst2)) => {
                let score = group_score(&nl2, gdx);
                if best.as_ref().map(|b| score < b.2).unwrap_or(true) {
                    best = Some((nl2, inst2, score, mv));
                }
            }
            Err(fm) => {
                if best.is_none() {
                    last_err = Some(fm);
                }
            }
        }
    }

    match best {
        Some((nl2, inst2, score, mv)) => {
            let il2 = il.add(inst.idx, inst2);
            Ok((nl2, il2, vec![mv], score))
        }
        None => Err(last_err.map(|fm| stage_err("evacuate", fm)).unwrap_or_else(|| PipelineError::AllocationFailed("no evacuation candidate".into()))),
    }
}

/// `evacDrbdAllInner`: the four-stage DRBD `ChangeAll` sequence.
fn evac_drbd_all_inner(
    nl: &NodeList,
    il: &InstanceList,
    inst: &Instance,
    gdx: GroupIdx,
    targets: (NodeIdx, NodeIdx),
) -> Result<(NodeList, InstanceList, Vec<IMove>, f64), PipelineError> {
    let (t_pdx, t_sdx) = targets;
    let mut cur_nl = nl.clone();
    let mut cur_inst = inst.clone();
    let mut ops = Vec::new();

    if let Some(p) = nl.find(inst.primary) {
        if p.offline {
            let (nl1, inst1) = apply_move(&cur_nl, &cur_inst, IMove::Failover).map_err(|e| stage_err("pre-failover", e))?;
            cur_nl = nl1;
            cur_inst = inst1;
            ops.push(IMove::Failover);
        }
    }

    let (nl2, inst2) = apply_move(&cur_nl, &cur_inst, IMove::ReplaceSecondary(t_pdx)).map_err(|e| stage_err("replace-secondary-to-old-primary", e))?;
    cur_nl = nl2;
    cur_inst = inst2;
    ops.push(IMove::ReplaceSecondary(t_pdx));

    let (nl3, inst3) = apply_move(&cur_nl, &cur_inst, IMove::Failover).map_err(|e| stage_err("failover", e))?;
    cur_nl = nl3;
    cur_inst = inst3;
    ops.push(IMove::Failover);

    let (nl4, inst4) = apply_move(&cur_nl, &cur_inst, IMove::ReplaceSecondary(t_sdx)).map_err(|e| stage_err("replace-secondary-to-new-secondary", e))?;
    cur_nl = nl4;
    cur_inst = inst4;
    ops.push(IMove::ReplaceSecondary(t_sdx));

    let il2 = il.add(inst.idx, cur_inst);
    let score = group_score(&cur_nl, gdx);
    Ok((cur_nl, il2, ops, score))
}

/// `nodeEvacInstance`: dispatch by `(disk_template, mode)` per §4.6's table.
pub fn node_evac_instance(
    nl: &NodeList,
    il: &InstanceList,
    mode: EvacMode,
    inst: &Instance,
    gdx: GroupIdx,
    avail_nodes: &[NodeIdx],
) -> Result<(NodeList, InstanceList, Vec<IMove>, f64), PipelineError> {
    match inst.disk_template {
        DiskTemplate::Plain | DiskTemplate::File => Err(PipelineError::CannotBeRelocated(inst.idx)),
        t if t.mirror_type() == MirrorType::External => match mode {
            EvacMode::ChangeSecondary => Err(PipelineError::ChangeSecondaryUnsupported { template: t.as_str() }),
            EvacMode::ChangePrimary | EvacMode::ChangeAll => evac_one_node_only(nl, il, inst, gdx, avail_nodes, IMove::FailoverToAny),
        },
        DiskTemplate::Drbd8 => match mode {
            EvacMode::ChangePrimary => {
                let (nl2, inst2) = apply_move(nl, inst, IMove::Failover).map_err(|e| stage_err("failover", e))?;
                let il2 = il.add(inst.idx, inst2);
                let score = group_score(&nl2, gdx);
                Ok((nl2, il2, vec![IMove::Failover], score))
            }
            EvacMode::ChangeSecondary => evac_one_node_only(nl, il, inst, gdx, avail_nodes, IMove::ReplaceSecondary),
            EvacMode::ChangeAll => {
                let mut best: Option<(NodeList, InstanceList, Vec<IMove>, f64)> = None;
                for &p in avail_nodes {
                    for &s in avail_nodes {
                        if p == s {
                            continue;
                        }
                        if let Ok(result) = evac_drbd_all_inner(nl, il, inst, gdx, (p, s)) {
                            if best.as_ref().map(|b| result.3 < b.3).unwrap_or(true) {
                                best = Some(result);
                            }
                        }
                    }
                }
                best.ok_or_else(|| PipelineError::AllocationFailed("no feasible drbd change-all pair".into()))
            }
        },
        // Diskless/SharedFile/Block/Rbd/Ext handled by the mirror_type arm above.
        _ => Err(PipelineError::AllocationFailed("unsupported template/mode combination".into())),
    }
}

/// `tryNodeEvac`: relocate every listed instance off the nodes being
/// evacuated, in input order, excluding offline nodes and the nodes being
/// evacuated from the candidate set.
pub fn try_node_evac(nl: &NodeList, il: &InstanceList, nodes_to_evacuate: &[NodeIdx], instances: &[InstanceIdx]) -> (NodeList, InstanceList, EvacSolution) {
    let offline: BTreeSet<NodeIdx> = nl.offline_indices().into_iter().collect();
    let evacuating: BTreeSet<NodeIdx> = nodes_to_evacuate.iter().copied().collect();
    let excluded: BTreeSet<NodeIdx> = offline.union(&evacuating).copied().collect();

    let mut cur_nl = nl.clone();
    let mut cur_il = il.clone();
    let mut solution = EvacSolution::default();

    for &idx in instances {
        let Some(inst) = cur_il.find(idx).cloned() else { continue };
        let Some(gdx) = cur_nl.find(inst.primary).map(|n| n.group) else { continue };
        let avail: Vec<NodeIdx> = cur_nl
            .online()
            .filter(|n| n.group == gdx && n.idx != inst.primary && !excluded.contains(&n.idx))
            .map(|n| n.idx)
            .collect();

        match node_evac_instance(&cur_nl, &cur_il, EvacMode::ChangeAll, &inst, gdx, &avail) {
            Ok((nl2, il2, ops, _score)) => {
                cur_nl = nl2;
                cur_il = il2;
                solution.moved.push((idx, ops));
            }
            Err(e) => solution.failed.push((idx, e.to_string())),
        }
    }

    (cur_nl, cur_il, solution)
}

/// `tryChangeGroup`: relocate every listed instance into the best of the
/// requested target groups (or all groups, if none were requested), minus
/// the groups those instances currently sit in.
pub fn try_change_group(nl: &NodeList, il: &InstanceList, groups: &GroupList, requested_groups: &[GroupIdx], instances: &[InstanceIdx]) -> (NodeList, InstanceList, EvacSolution) {
    let evacuating: BTreeSet<GroupIdx> = instances
        .iter()
        .filter_map(|&idx| il.find(idx))
        .filter_map(|i| nl.find(i.primary))
        .map(|n| n.group)
        .collect();
    let base_targets: BTreeSet<GroupIdx> = if requested_groups.is_empty() {
        groups.keys().collect()
    } else {
        requested_groups.iter().copied().collect()
    };
    let target_groups: Vec<GroupIdx> = base_targets.difference(&evacuating).copied().collect();

    let mut filtered_groups = GroupList::new();
    for g in &target_groups {
        if let Some(gval) = groups.find(*g) {
            filtered_groups = filtered_groups.add(*g, gval.clone());
        }
    }

    let mut cur_nl = nl.clone();
    let mut cur_il = il.clone();
    let mut solution = EvacSolution::default();

    for &idx in instances {
        let Some(inst) = cur_il.find(idx).cloned() else { continue };
        let count = if inst.has_secondary() { 2 } else { 1 };
        match find_best_alloc_group(&filtered_groups, &cur_nl, &inst, count) {
            Ok(best) => {
                let avail: Vec<NodeIdx> = cur_nl.online().filter(|n| n.group == best.group).map(|n| n.idx).collect();
                match node_evac_instance(&cur_nl, &cur_il, EvacMode::ChangeAll, &inst, best.group, &avail) {
                    Ok((nl2, il2, ops, _score)) => {
                        cur_nl = nl2;
                        cur_il = il2;
                        solution.moved.push((idx, ops));
                    }
                    Err(e) => solution.failed.push((idx, e.to_string())),
                }
            }
            Err(e) => solution.failed.push((idx, e.to_string())),
        }
    }

    (cur_nl, cur_il, solution)
}
