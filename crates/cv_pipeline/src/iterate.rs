//! C7 — iterative and tiered allocation: `iterateAlloc` and `tieredAlloc`.

use cv_core::{CStats, FailMode, GroupList, Instance, InstanceIdx, InstanceList, NodeList};

use crate::multigroup::{evaluate_all_groups, try_mg_alloc};

/// Accumulated result of repeatedly allocating clones of a base spec.
#[derive(Clone, Debug, PartialEq)]
pub struct IterateResult {
    pub nodes: NodeList,
    pub instances: InstanceList,
    pub allocated: Vec<InstanceIdx>,
    pub steps: Vec<CStats>,
}

/// `iterateAlloc`: repeatedly allocate clones of `base` (renamed `new-<depth>`,
/// with a fresh index taken from the current instance count) until `tryAlloc`
/// yields no solution, or `max_iterations` counts down to zero.
pub fn iterate_alloc(groups: &GroupList, nl: &NodeList, il: &InstanceList, base: &Instance, count: u8, max_iterations: Option<u32>) -> IterateResult {
    let mut cur_nl = nl.clone();
    let mut cur_il = il.clone();
    let mut allocated = Vec::new();
    let mut steps = Vec::new();
    let mut depth: u32 = 0;

    loop {
        if let Some(max) = max_iterations {
            if depth >= max {
                break;
            }
        }

        let mut candidate = base.clone();
        candidate.idx = InstanceIdx(cur_il.size() as i64);
        candidate.name = format!("new-{depth}");

        match try_mg_alloc(groups, &cur_nl, &candidate, count) {
            Ok((group_alloc, score)) => {
                let Some(elem) = group_alloc.solution.best else { break };
                for ndx in &elem.affected_nodes {
                    if let Some(updated) = elem.nodes.find(*ndx) {
                        cur_nl = cur_nl.add(*ndx, updated.clone());
                    }
                }
                cur_il = cur_il.add(elem.instance.idx, elem.instance.clone());
                allocated.push(elem.instance.idx);
                steps.push(CStats::compute(&cur_nl, score));
                depth += 1;
            }
            Err(_) => break,
        }
    }

    IterateResult {
        nodes: cur_nl,
        instances: cur_il,
        allocated,
        steps,
    }
}

/// The resource dimension `tieredAlloc` shrinks when a `FailMode` dominates
/// the failure histogram. `None` means the instance spec cannot be shrunk
/// along that axis (the allocation is simply infeasible).
fn shrink_dimension(base: &Instance, fm: FailMode) -> Option<Instance> {
    let mut shrunk = base.clone();
    match fm {
        FailMode::FailMem if shrunk.mem_mib > 1 => {
            shrunk.mem_mib /= 2;
            Some(shrunk)
        }
        FailMode::FailDisk if shrunk.disk_mib > 1 => {
            shrunk.disk_mib /= 2;
            Some(shrunk)
        }
        FailMode::FailCPU if shrunk.vcpus > 1 => {
            shrunk.vcpus -= 1;
            Some(shrunk)
        }
        FailMode::FailSpindles if shrunk.spindles > 1 => {
            shrunk.spindles -= 1;
            Some(shrunk)
        }
        _ => None,
    }
}

/// Pick the `FailMode` with the highest failure count. Ties are broken by a
/// stable sort keyed by count, keeping the entry that sorts last — i.e. the
/// highest-declared `FailMode` among those tied for the top count (§9 open
/// question; `FailMode`'s derived `Ord` makes this a plain sort).
fn dominant_failure(failures: &std::collections::BTreeMap<FailMode, u32>) -> Option<FailMode> {
    let mut entries: Vec<(FailMode, u32)> = failures.iter().map(|(fm, n)| (*fm, *n)).collect();
    entries.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    entries.last().map(|(fm, _)| *fm)
}

/// `tieredAlloc`: call `iterateAlloc`, then shrink the spec along the
/// dimension that caused the most failures and recurse on the post-iterate
/// cluster state, so each tier packs smaller instances into whatever room
/// the previous tier left behind. Stops and returns the accumulated result
/// across every tier once `shrinkDimension` itself fails.
pub fn tiered_alloc(groups: &GroupList, nl: &NodeList, il: &InstanceList, base: &Instance, count: u8, max_iterations: Option<u32>) -> IterateResult {
    let result = iterate_alloc(groups, nl, il, base, count, max_iterations);

    let Ok(candidates) = evaluate_all_groups(groups, &result.nodes, base, count) else {
        return result;
    };
    let mut failures = std::collections::BTreeMap::new();
    for c in &candidates {
        for (fm, n) in &c.solution.failures {
            *failures.entry(*fm).or_insert(0) += n;
        }
    }

    match dominant_failure(&failures).and_then(|fm| shrink_dimension(base, fm)) {
        Some(shrunk) => {
            let next = tiered_alloc(groups, &result.nodes, &result.instances, &shrunk, count, max_iterations);
            let mut allocated = result.allocated;
            allocated.extend(next.allocated);
            let mut steps = result.steps;
            steps.extend(next.steps);
            IterateResult {
                nodes: next.nodes,
                instances: next.instances,
                allocated,
                steps,
            }
        }
        None => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_failure_breaks_ties_by_declaration_order() {
        let mut failures = std::collections::BTreeMap::new();
        failures.insert(FailMode::FailMem, 3);
        failures.insert(FailMode::FailCPU, 3);
        failures.insert(FailMode::FailDisk, 1);
        assert_eq!(dominant_failure(&failures), Some(FailMode::FailCPU));
    }

    #[test]
    fn shrink_dimension_halves_memory_on_failmem() {
        let base = cv_core::Instance {
            idx: InstanceIdx(0),
            name: "base".into(),
            alias: String::new(),
            primary: cv_core::NodeIdx(0),
            secondary: None,
            mem_mib: 8192,
            disk_mib: 10240,
            vcpus: 2,
            spindles: 1,
            util: cv_core::UtilVec::default(),
            running: true,
            auto_balance: true,
            movable: true,
            disk_template: cv_core::DiskTemplate::Plain,
            nics: Vec::new(),
            excl_tags: Default::default(),
        };
        let shrunk = shrink_dimension(&base, FailMode::FailMem).unwrap();
        assert_eq!(shrunk.mem_mib, 4096);
    }
}
