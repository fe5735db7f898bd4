//! C3 — the move algebra. `apply_move` composes `Node::add_pri`/`add_sec`
//! (with `force` precisely where §4.3 specifies it) and never mutates its
//! inputs; `possible_moves` is the closed dispatch table of §4.3's matrix.

use cv_core::{FailMode, Instance, MirrorType, NodeIdx, NodeList};

pub use cv_core::IMove;

/// `applyMove(nl, inst, move) -> (nl', inst')` or a typed failure. The new
/// primary/secondary indices are read off the returned `Instance`.
pub fn apply_move(nl: &NodeList, inst: &Instance, mv: IMove) -> Result<(NodeList, Instance), FailMode> {
    match mv {
        IMove::Failover => failover(nl, inst),
        IMove::FailoverToAny(tdx) => failover_to_any(nl, inst, tdx),
        IMove::ReplacePrimary(tdx) => replace_primary(nl, inst, tdx),
        IMove::ReplaceSecondary(tdx) => replace_secondary(nl, inst, tdx),
        IMove::ReplaceAndFailover(tdx) => replace_and_failover(nl, inst, tdx),
        IMove::FailoverAndReplace(tdx) => failover_and_replace(nl, inst, tdx),
    }
}

fn node(nl: &NodeList, idx: NodeIdx) -> Result<&cv_core::Node, FailMode> {
    nl.find(idx).ok_or(FailMode::FailN1)
}

/// Failover: swap primary/secondary roles of an Internal-mirror instance.
/// Forced if the current primary is offline.
fn failover(nl: &NodeList, inst: &Instance) -> Result<(NodeList, Instance), FailMode> {
    let opdx = inst.primary;
    let osdx = inst.secondary.ok_or(FailMode::FailDiskTemplate)?;
    let op = node(nl, opdx)?;
    let os = node(nl, osdx)?;
    let forced = op.offline;

    let op1 = op.remove_pri(inst);
    let os1 = os.remove_sec(inst);

    let os2 = os1.add_pri_ex(inst, forced)?;
    let op2 = op1.add_sec_ex(inst, forced)?;

    let nl2 = nl.add_two((opdx, op2), (osdx, os2));
    let mut inst2 = inst.clone();
    inst2.primary = osdx;
    inst2.secondary = Some(opdx);
    Ok((nl2, inst2))
}

/// FailoverToAny(tdx): External mirror, move primary only. Forced if the
/// current primary is offline.
fn failover_to_any(nl: &NodeList, inst: &Instance, tdx: NodeIdx) -> Result<(NodeList, Instance), FailMode> {
    let opdx = inst.primary;
    let op = node(nl, opdx)?;
    let tgt = node(nl, tdx)?;
    let forced = op.offline;

    let op1 = op.remove_pri(inst);
    let tgt1 = tgt.add_pri_ex(inst, forced)?;

    let nl2 = nl.add_two((opdx, op1), (tdx, tgt1));
    let mut inst2 = inst.clone();
    inst2.primary = tdx;
    Ok((nl2, inst2))
}

/// ReplacePrimary(new_pdx): Internal mirror. The old secondary briefly hosts
/// the instance as primary to validate migration-through-secondary before
/// the real target takes over, matching the source's tentative-add/remove
/// dance. All steps forced if the old primary is offline.
fn replace_primary(nl: &NodeList, inst: &Instance, new_pdx: NodeIdx) -> Result<(NodeList, Instance), FailMode> {
    let opdx = inst.primary;
    let osdx = inst.secondary.ok_or(FailMode::FailDiskTemplate)?;
    let op = node(nl, opdx)?;
    let os = node(nl, osdx)?;
    let tgt = node(nl, new_pdx)?;
    let forced = op.offline;

    let op1 = op.remove_pri(inst);
    let os1 = os.remove_sec(inst);

    // Tentative: validate os1 could host the instance as primary, then
    // immediately drop it again — it is not the final placement.
    let _os_tentative = os1.add_pri_ex(inst, forced)?;

    let tgt1 = tgt.add_pri_ex(inst, forced)?;
    let os2 = os1.add_sec_ex(inst, forced)?;

    let nl2 = nl.add_two((opdx, op1), (osdx, os2)).add(new_pdx, tgt1);
    let mut inst2 = inst.clone();
    inst2.primary = new_pdx;
    inst2.secondary = Some(osdx);
    Ok((nl2, inst2))
}

/// ReplaceSecondary(new_sdx): Internal mirror, move secondary only. Forced
/// if the old secondary is offline.
fn replace_secondary(nl: &NodeList, inst: &Instance, new_sdx: NodeIdx) -> Result<(NodeList, Instance), FailMode> {
    let osdx = inst.secondary.ok_or(FailMode::FailDiskTemplate)?;
    let os = node(nl, osdx)?;
    let tgt = node(nl, new_sdx)?;
    let forced = os.offline;

    let os1 = os.remove_sec(inst);
    let tgt1 = tgt.add_sec_ex(inst, forced)?;

    let nl2 = nl.add_two((osdx, os1), (new_sdx, tgt1));
    let mut inst2 = inst.clone();
    inst2.secondary = Some(new_sdx);
    Ok((nl2, inst2))
}

/// ReplaceAndFailover(new_pdx): move to a fresh primary, then fail over onto
/// the freed old-primary node as secondary. Forced if the old secondary is
/// offline (the secondary's disk must be readable to seed the new primary).
fn replace_and_failover(nl: &NodeList, inst: &Instance, new_pdx: NodeIdx) -> Result<(NodeList, Instance), FailMode> {
    let opdx = inst.primary;
    let osdx = inst.secondary.ok_or(FailMode::FailDiskTemplate)?;
    let op = node(nl, opdx)?;
    let os = node(nl, osdx)?;
    let tgt = node(nl, new_pdx)?;
    let forced = os.offline;

    let op1 = op.remove_pri(inst);
    let os1 = os.remove_sec(inst);

    let tgt1 = tgt.add_pri_ex(inst, forced)?;
    let op2 = op1.add_sec_ex(inst, forced)?;

    let nl2 = nl.add_two((opdx, op2), (osdx, os1)).add(new_pdx, tgt1);
    let mut inst2 = inst.clone();
    inst2.primary = new_pdx;
    inst2.secondary = Some(opdx);
    Ok((nl2, inst2))
}

/// FailoverAndReplace(new_sdx): fail over onto the freed secondary, then
/// replace the secondary with a fresh target. Forced if the old primary is
/// offline.
fn failover_and_replace(nl: &NodeList, inst: &Instance, new_sdx: NodeIdx) -> Result<(NodeList, Instance), FailMode> {
    let opdx = inst.primary;
    let osdx = inst.secondary.ok_or(FailMode::FailDiskTemplate)?;
    let op = node(nl, opdx)?;
    let os = node(nl, osdx)?;
    let tgt = node(nl, new_sdx)?;
    let forced = op.offline;

    let op1 = op.remove_pri(inst);
    let os1 = os.remove_sec(inst);

    let os2 = os1.add_pri_ex(inst, forced)?;
    let tgt1 = tgt.add_sec_ex(inst, forced)?;

    let nl2 = nl.add_two((opdx, op1), (osdx, os2)).add(new_sdx, tgt1);
    let mut inst2 = inst.clone();
    inst2.primary = osdx;
    inst2.secondary = Some(new_sdx);
    Ok((nl2, inst2))
}

/// `possibleMoves`: the closed dispatch table of §4.3. `secondary_is_candidate`
/// is whether the instance's *current* secondary is itself a member of the
/// candidate-target set (it determines whether `Failover`-composed variants
/// are safe to offer alongside plain replaces).
pub fn possible_moves(
    mirror: MirrorType,
    secondary_is_candidate: bool,
    instance_moves_allowed: bool,
    tdx: NodeIdx,
) -> Vec<IMove> {
    match (mirror, instance_moves_allowed) {
        (MirrorType::None, _) => Vec::new(),
        (MirrorType::External, false) => Vec::new(),
        (MirrorType::External, true) => vec![IMove::FailoverToAny(tdx)],
        (MirrorType::Internal, false) => vec![IMove::ReplaceSecondary(tdx)],
        (MirrorType::Internal, true) => {
            if secondary_is_candidate {
                vec![
                    IMove::ReplaceSecondary(tdx),
                    IMove::ReplaceAndFailover(tdx),
                    IMove::ReplacePrimary(tdx),
                    IMove::FailoverAndReplace(tdx),
                ]
            } else {
                vec![IMove::ReplaceSecondary(tdx), IMove::ReplaceAndFailover(tdx)]
            }
        }
    }
}
