//! C4 — allocation search: `allocateOnSingle`/`allocateOnPair`, `tryAlloc`,
//! and `genAllocNodes`. The pair branch of `tryAlloc` is the first of the
//! two parallel folds specified in §5.

use std::collections::BTreeMap;

use cv_algo::comp_cv;
use cv_core::{FailMode, GroupList, Instance, NodeIdx, NodeList};

use crate::error::PipelineError;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One successful placement: the resulting snapshot, the placed instance,
/// the nodes it touched, and the cluster score after placement.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocElement {
    pub nodes: NodeList,
    pub instance: Instance,
    pub affected_nodes: Vec<NodeIdx>,
    pub score: f64,
}

/// `bestAllocElement(a, b)`: `a` is the incumbent. `None` loses to `Some`;
/// between two `Some`s the lower score wins, and `a` wins ties.
pub fn best_alloc_element(a: Option<AllocElement>, b: Option<AllocElement>) -> Option<AllocElement> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if b.score < a.score {
                Some(b)
            } else {
                Some(a)
            }
        }
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Aggregate result of a search: a failure histogram, a success count, the
/// best placement found so far, and a diagnostics log.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocSolution {
    pub failures: BTreeMap<FailMode, u32>,
    pub success_count: u32,
    pub best: Option<AllocElement>,
    pub log: Vec<String>,
}

impl AllocSolution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_failure(fm: FailMode) -> Self {
        let mut failures = BTreeMap::new();
        failures.insert(fm, 1);
        AllocSolution {
            failures,
            success_count: 0,
            best: None,
            log: vec![format!("{fm}")],
        }
    }

    pub fn from_success(elem: AllocElement) -> Self {
        AllocSolution {
            failures: BTreeMap::new(),
            success_count: 1,
            best: Some(elem),
            log: Vec::new(),
        }
    }

    /// `"<FailMode>: <count>"` lines, in `FailMode`'s declaration order —
    /// the same order `tieredAlloc` uses to break shrink-dimension ties
    /// (§7.1 `describeSolution`, §9 open question).
    pub fn describe(&self) -> Vec<String> {
        self.failures.iter().map(|(fm, n)| format!("{fm}: {n}")).collect()
    }

    pub fn has_solution(&self) -> bool {
        self.best.is_some()
    }
}

/// `concatAllocs` / `sumAllocs`: the associative reduction for `AllocSolution`.
/// Failures sum per `FailMode`; `best` resolves via `best_alloc_element`
/// (incumbent `a` wins ties); success counts add; logs concatenate `b ++ a`
/// (§5: "logs concatenate in the order b ++ a").
pub fn concat_allocs(a: AllocSolution, b: AllocSolution) -> AllocSolution {
    let mut failures = a.failures;
    for (fm, n) in b.failures {
        *failures.entry(fm).or_insert(0) += n;
    }
    let mut log = b.log;
    log.extend(a.log);
    AllocSolution {
        failures,
        success_count: a.success_count + b.success_count,
        best: best_alloc_element(a.best, b.best),
        log,
    }
}

/// `allocateOnSingle`: place a non-mirrored instance on one node.
pub fn allocate_on_single(nl: &NodeList, inst: &Instance, ndx: NodeIdx) -> Result<AllocElement, FailMode> {
    let target = nl.find(ndx).ok_or(FailMode::FailN1)?;
    target.inst_matches_policy(inst)?;
    let mut placed = inst.clone();
    placed.primary = ndx;
    placed.secondary = None;
    let new_target = target.add_pri(&placed)?;
    let nl2 = nl.add(ndx, new_target);
    let score = comp_cv(&nl2);
    Ok(AllocElement {
        nodes: nl2,
        instance: placed,
        affected_nodes: vec![ndx],
        score,
    })
}

/// `allocateOnPair`: place a mirrored instance on a primary+secondary pair.
pub fn allocate_on_pair(nl: &NodeList, inst: &Instance, pdx: NodeIdx, sdx: NodeIdx) -> Result<AllocElement, FailMode> {
    let primary = nl.find(pdx).ok_or(FailMode::FailN1)?;
    let secondary = nl.find(sdx).ok_or(FailMode::FailN1)?;
    primary.inst_matches_policy(inst)?;

    let mut placed = inst.clone();
    placed.primary = pdx;
    placed.secondary = Some(sdx);

    let new_primary = primary.add_pri(&placed)?;
    let new_secondary = secondary.add_sec(&placed)?;
    let nl2 = nl.add_two((pdx, new_primary), (sdx, new_secondary));
    let score = comp_cv(&nl2);
    Ok(AllocElement {
        nodes: nl2,
        instance: placed,
        affected_nodes: vec![pdx, sdx],
        score,
    })
}

/// Candidate target set produced by `genAllocNodes`: either single nodes
/// (1-node instances) or `(primary, [secondary candidates])` pairs.
#[derive(Clone, Debug, PartialEq)]
pub enum AllocNodes {
    Single(Vec<NodeIdx>),
    Pair(Vec<(NodeIdx, Vec<NodeIdx>)>),
}

/// `genAllocNodes`: enumerate allocation targets for a 1- or 2-node
/// instance, optionally dropping nodes in unallocable groups. Pairs are
/// generated in ascending primary-node-index order (§9 open question),
/// which is automatic here since `NodeList::keys` iterates a `BTreeMap`.
pub fn gen_alloc_nodes(groups: &GroupList, nl: &NodeList, count: u8, drop_unallocable: bool) -> Result<AllocNodes, PipelineError> {
    let online: Vec<NodeIdx> = nl
        .online()
        .filter(|n| {
            !drop_unallocable
                || groups
                    .find(n.group)
                    .map(|g| g.is_allocable())
                    .unwrap_or(true)
        })
        .map(|n| n.idx)
        .collect();

    match count {
        1 => Ok(AllocNodes::Single(online)),
        2 => {
            let pairs: Vec<(NodeIdx, Vec<NodeIdx>)> = online
                .iter()
                .map(|&p| {
                    let secondaries: Vec<NodeIdx> = online
                        .iter()
                        .copied()
                        .filter(|&s| s != p && nl.find(s).map(|n| n.group) == nl.find(p).map(|n| n.group))
                        .collect();
                    (p, secondaries)
                })
                .filter(|(_, secs)| !secs.is_empty())
                .collect();
            Ok(AllocNodes::Pair(pairs))
        }
        _ => Err(PipelineError::AllocationFailed(format!("unsupported allocation arity {count}"))),
    }
}

/// `tryAlloc`: evaluate every candidate and reduce to a single
/// `AllocSolution` via `concat_allocs`. Pair evaluation is embarrassingly
/// parallel across primaries (§5.1).
pub fn try_alloc(nl: &NodeList, inst: &Instance, nodes: AllocNodes) -> Result<AllocSolution, PipelineError> {
    match nodes {
        AllocNodes::Single(candidates) => {
            if candidates.is_empty() {
                return Err(PipelineError::NoOnlineNodes);
            }
            Ok(candidates
                .into_iter()
                .map(|ndx| match allocate_on_single(nl, inst, ndx) {
                    Ok(elem) => AllocSolution::from_success(elem),
                    Err(fm) => AllocSolution::from_failure(fm),
                })
                .fold(AllocSolution::empty(), concat_allocs))
        }
        AllocNodes::Pair(pairs) => {
            if pairs.is_empty() {
                return Err(PipelineError::NotEnoughOnlineNodes);
            }
            let per_primary: Vec<AllocSolution> = eval_pairs(nl, inst, &pairs);
            Ok(per_primary.into_iter().fold(AllocSolution::empty(), concat_allocs))
        }
    }
}

fn eval_one_primary(nl: &NodeList, inst: &Instance, pdx: NodeIdx, secondaries: &[NodeIdx]) -> AllocSolution {
    secondaries
        .iter()
        .map(|&sdx| match allocate_on_pair(nl, inst, pdx, sdx) {
            Ok(elem) => AllocSolution::from_success(elem),
            Err(fm) => AllocSolution::from_failure(fm),
        })
        .fold(AllocSolution::empty(), concat_allocs)
}

#[cfg(feature = "rayon")]
fn eval_pairs(nl: &NodeList, inst: &Instance, pairs: &[(NodeIdx, Vec<NodeIdx>)]) -> Vec<AllocSolution> {
    pairs
        .par_iter()
        .map(|(pdx, secs)| eval_one_primary(nl, inst, *pdx, secs))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn eval_pairs(nl: &NodeList, inst: &Instance, pairs: &[(NodeIdx, Vec<NodeIdx>)]) -> Vec<AllocSolution> {
    pairs.iter().map(|(pdx, secs)| eval_one_primary(nl, inst, *pdx, secs)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::{DiskTemplate, GroupIdx, InstanceIdx, Node, Policy, UtilVec};
    use std::collections::BTreeSet;

    fn node_at(idx: i64, free_mem: u64) -> Node {
        Node {
            idx: NodeIdx(idx),
            name: format!("n{idx}"),
            group: GroupIdx(0),
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
    fn try_alloc_picks_minimum_score_single() {
        let mut nl = NodeList::new();
        nl = nl.add(NodeIdx(1), node_at(1, 8192)); // nearly full -> high score after placement
        nl = nl.add(NodeIdx(2), node_at(2, 32768)); // more headroom -> lower score after placement
        let inst = plain_inst();
        let sol = try_alloc(&nl, &inst, AllocNodes::Single(vec![NodeIdx(1), NodeIdx(2)])).unwrap();
        let best = sol.best.unwrap();
        assert_eq!(best.affected_nodes, vec![NodeIdx(2)]);
    }

    #[test]
    fn try_alloc_empty_candidates_fails() {
        let nl = NodeList::new();
        let inst = plain_inst();
        assert!(try_alloc(&nl, &inst, AllocNodes::Single(Vec::new())).is_err());
        assert!(try_alloc(&nl, &inst, AllocNodes::Pair(Vec::new())).is_err());
    }
}
