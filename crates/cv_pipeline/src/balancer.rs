//! C5 — the hill-climbing balancer: `Table`, `checkInstanceMove`, `checkMove`
//! (the second of the two parallel folds specified in §5), `tryBalance`, and
//! `doNextBalance`.

use std::collections::BTreeSet;

use cv_algo::{apply_move, comp_cv, possible_moves, IMove};
use cv_core::{Instance, InstanceIdx, InstanceList, NodeIdx, NodeList};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One accepted move: the instance, its new placement, the move that
/// produced it, and the cluster score immediately afterward.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub instance: InstanceIdx,
    pub new_primary: NodeIdx,
    pub new_secondary: Option<NodeIdx>,
    pub mv: IMove,
    pub score: f64,
}

/// The balancer's state: a node/instance snapshot, its score, and the
/// placements applied to reach it (newest first).
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub nodes: NodeList,
    pub instances: InstanceList,
    pub score: f64,
    pub placements: Vec<Placement>,
}

impl Table {
    pub fn new(nodes: NodeList, instances: InstanceList) -> Self {
        let score = comp_cv(&nodes);
        Table {
            nodes,
            instances,
            score,
            placements: Vec::new(),
        }
    }
}

/// `compareTables`: `a` (the incumbent / first argument) wins ties.
pub fn compare_tables(a: Table, b: Table) -> Table {
    if a.score > b.score {
        b
    } else {
        a
    }
}

/// Apply `mv` to `inst_idx` within `tbl`, producing a fresh `Table` with one
/// more placement pushed to the front. Returns `None` if the instance is
/// missing or the move is rejected by `applyMove`.
fn apply_move_to_table(tbl: &Table, inst_idx: InstanceIdx, mv: IMove) -> Option<Table> {
    let inst = tbl.instances.find(inst_idx)?;
    let (nl2, inst2) = apply_move(&tbl.nodes, inst, mv).ok()?;
    let il2 = tbl.instances.add(inst_idx, inst2.clone());
    let score = comp_cv(&nl2);
    let mut placements = Vec::with_capacity(tbl.placements.len() + 1);
    placements.push(Placement {
        instance: inst_idx,
        new_primary: inst2.primary,
        new_secondary: inst2.secondary,
        mv,
        score,
    });
    placements.extend(tbl.placements.iter().cloned());
    Some(Table {
        nodes: nl2,
        instances: il2,
        score,
        placements,
    })
}

/// `checkInstanceMove`: evaluate every move available to `inst_idx` against
/// `candidate_nodes` and keep the best resulting `Table`.
pub fn check_instance_move(candidate_nodes: &[NodeIdx], disk_moves: bool, inst_moves: bool, tbl: &Table, inst_idx: InstanceIdx) -> Table {
    let Some(inst) = tbl.instances.find(inst_idx) else {
        return tbl.clone();
    };
    let opdx = inst.primary;
    let osdx = inst.secondary;
    let bad: BTreeSet<NodeIdx> = [Some(opdx), osdx].into_iter().flatten().collect();
    let candidates: Vec<NodeIdx> = candidate_nodes.iter().copied().filter(|n| !bad.contains(n)).collect();

    let mirror = inst.mirror_type();
    let osdx_is_candidate = osdx.map(|o| candidate_nodes.contains(&o)).unwrap_or(false);

    let mut aft_failover = tbl.clone();
    if mirror == cv_core::MirrorType::Internal && inst_moves && osdx_is_candidate {
        if let Some(candidate) = apply_move_to_table(tbl, inst_idx, IMove::Failover) {
            // Unlike every other step here, the bare failover is let through on an
            // equal score: it is always a valid, cost-free rebalance (the primary
            // and secondary simply swap roles), so the candidate is the incumbent
            // at this step and wins ties instead of losing to the untouched table.
            aft_failover = compare_tables(candidate, tbl.clone());
        }
    }

    let mut best = aft_failover;
    if disk_moves {
        for &tdx in &candidates {
            let secondary_is_candidate = osdx.map(|o| candidates.contains(&o)).unwrap_or(false);
            for mv in possible_moves(mirror, secondary_is_candidate, inst_moves, tdx) {
                if let Some(candidate) = apply_move_to_table(tbl, inst_idx, mv) {
                    best = compare_tables(best, candidate);
                }
            }
        }
    }
    best
}

/// `checkMove`: evaluate `checkInstanceMove` over every victim in parallel
/// and reduce to the minimum-score result (§5.2). If no victim produced a
/// longer placement list than `tbl`, the input table is returned unchanged.
pub fn check_move(candidate_nodes: &[NodeIdx], disk_moves: bool, inst_moves: bool, tbl: &Table, victims: &[InstanceIdx]) -> Table {
    if victims.is_empty() {
        return tbl.clone();
    }
    let mut results = eval_victims(candidate_nodes, disk_moves, inst_moves, tbl, victims).into_iter();
    let best = match results.next() {
        Some(first) => results.fold(first, compare_tables),
        None => return tbl.clone(),
    };
    // A result that only ties the untouched table (e.g. a bare failover, which is
    // score-preserving) is still a real move and should win over doing nothing;
    // that's different from a tie between two distinct candidate moves, where the
    // fold above keeps the first one found.
    let best = compare_tables(best, tbl.clone());
    if best.placements.len() == tbl.placements.len() {
        tbl.clone()
    } else {
        best
    }
}

#[cfg(feature = "rayon")]
fn eval_victims(candidate_nodes: &[NodeIdx], disk_moves: bool, inst_moves: bool, tbl: &Table, victims: &[InstanceIdx]) -> Vec<Table> {
    victims
        .par_iter()
        .map(|&idx| check_instance_move(candidate_nodes, disk_moves, inst_moves, tbl, idx))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn eval_victims(candidate_nodes: &[NodeIdx], disk_moves: bool, inst_moves: bool, tbl: &Table, victims: &[InstanceIdx]) -> Vec<Table> {
    victims
        .iter()
        .map(|&idx| check_instance_move(candidate_nodes, disk_moves, inst_moves, tbl, idx))
        .collect()
}

fn is_balance_victim(inst: &Instance, evac_mode: bool, offline: &BTreeSet<NodeIdx>) -> bool {
    if !(inst.movable && inst.auto_balance) {
        return false;
    }
    if evac_mode {
        let touches_offline = offline.contains(&inst.primary) || inst.secondary.map(|s| offline.contains(&s)).unwrap_or(false);
        if !touches_offline {
            return false;
        }
    }
    true
}

/// `tryBalance`: one hill-climbing step. Accepts the result of `checkMove`
/// iff it strictly improves the score and either the cluster is badly
/// unbalanced (`ini_cv > mg_limit`) or the improvement clears `min_gain`;
/// otherwise the input table is returned unchanged (no-progress).
pub fn try_balance(tbl: &Table, disk_moves: bool, inst_moves: bool, evac_mode: bool, offline: &BTreeSet<NodeIdx>, mg_limit: f64, min_gain: f64) -> Table {
    let victims: Vec<InstanceIdx> = tbl
        .instances
        .elems()
        .filter(|i| is_balance_victim(i, evac_mode, offline))
        .map(|i| i.idx)
        .collect();
    let candidate_nodes: Vec<NodeIdx> = tbl.nodes.online().map(|n| n.idx).collect();

    let result = check_move(&candidate_nodes, disk_moves, inst_moves, tbl, &victims);
    let ini_cv = tbl.score;
    let fin_cv = result.score;

    if fin_cv < ini_cv && (ini_cv > mg_limit || ini_cv - fin_cv >= min_gain) {
        result
    } else {
        tbl.clone()
    }
}

/// `doNextBalance`: whether another balancing round should run.
pub fn do_next_balance(tbl: &Table, max_rounds: i64, min_score: f64) -> bool {
    (max_rounds < 0 || (tbl.placements.len() as i64) < max_rounds) && tbl.score > min_score
}
