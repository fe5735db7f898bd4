//! C2 — cluster variance scoring.
//!
//! `compDetailedCV` is the single source of truth for what "balanced" means;
//! every other component (balancer, allocator, evacuation) only ever
//! compares two scores produced by `compCVNodes`, never the raw metrics.

use cv_core::NodeList;

/// Fixed weights applied to `compDetailedCV`'s 13 metrics, in declaration
/// order. Metric 6 (primaries stranded on offline nodes) dominates so that
/// evacuating offline hosts always outranks a cosmetic rebalance.
pub const WEIGHTS: [f64; 13] = [1.0, 1.0, 1.0, 1.0, 4.0, 16.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 1.0];

/// Name/weight pairs in the same fixed order, exposed for `printStats`-style
/// diagnostics (§4.2: "must be exposed").
pub const METRICS: [(&str, f64); 13] = [
    ("std_dev_mem", WEIGHTS[0]),
    ("std_dev_disk", WEIGHTS[1]),
    ("n1_instance_count", WEIGHTS[2]),
    ("std_dev_reserved_mem", WEIGHTS[3]),
    ("offline_instance_count", WEIGHTS[4]),
    ("offline_primary_count", WEIGHTS[5]),
    ("std_dev_cpu", WEIGHTS[6]),
    ("std_dev_load_cpu", WEIGHTS[7]),
    ("std_dev_load_mem", WEIGHTS[8]),
    ("std_dev_load_disk", WEIGHTS[9]),
    ("std_dev_load_net", WEIGHTS[10]),
    ("conflicting_primaries", WEIGHTS[11]),
    ("std_dev_spindles", WEIGHTS[12]),
];

fn stddev<I: Iterator<Item = f64>>(vals: I) -> f64 {
    let xs: Vec<f64> = vals.collect();
    let n = xs.len();
    if n == 0 {
        return 0.0;
    }
    let mean = xs.iter().sum::<f64>() / n as f64;
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
    var.sqrt()
}

/// Detailed 13-element metric vector, in the fixed order documented above.
pub fn comp_detailed_cv(nodes: &NodeList) -> [f64; 13] {
    let online: Vec<_> = nodes.online().collect();

    let m1 = stddev(online.iter().map(|n| n.p_mem()));
    let m2 = stddev(online.iter().map(|n| n.p_dsk()));
    let m3: f64 = online
        .iter()
        .filter(|n| n.fail_n1())
        .map(|n| (n.primary.len() + n.secondary.len()) as f64)
        .sum();
    let m4 = stddev(online.iter().map(|n| n.p_rem()));
    let m5: f64 = nodes
        .elems()
        .filter(|n| n.offline)
        .map(|n| (n.primary.len() + n.secondary.len()) as f64)
        .sum();
    let m6: f64 = nodes.elems().filter(|n| n.offline).map(|n| n.primary.len() as f64).sum();
    let m7 = stddev(online.iter().map(|n| n.p_cpu()));

    let n_online = online.len().max(1) as f64;
    let pool_cpu = online.iter().map(|n| n.dyn_util.cpu).sum::<f64>() / n_online;
    let pool_mem = online.iter().map(|n| n.dyn_util.mem).sum::<f64>() / n_online;
    let pool_disk = online.iter().map(|n| n.dyn_util.disk).sum::<f64>() / n_online;
    let pool_net = online.iter().map(|n| n.dyn_util.net).sum::<f64>() / n_online;
    let ratio = |v: f64, pool: f64| if pool == 0.0 { 0.0 } else { v / pool };

    let m8 = stddev(online.iter().map(|n| ratio(n.dyn_util.cpu, pool_cpu)));
    let m9 = stddev(online.iter().map(|n| ratio(n.dyn_util.mem, pool_mem)));
    let m10 = stddev(online.iter().map(|n| ratio(n.dyn_util.disk, pool_disk)));
    let m11 = stddev(online.iter().map(|n| ratio(n.dyn_util.net, pool_net)));

    let m12: f64 = nodes.elems().map(|n| n.conflicting_primaries() as f64).sum();
    let m13 = stddev(online.iter().map(|n| {
        if n.hi_spindles == 0 {
            0.0
        } else {
            n.used_spindles as f64 / n.hi_spindles as f64
        }
    }));

    [m1, m2, m3, m4, m5, m6, m7, m8, m9, m10, m11, m12, m13]
}

/// `compCVNodes = Σ w_i · m_i`.
pub fn comp_cv_nodes(nodes: &NodeList) -> f64 {
    let metrics = comp_detailed_cv(nodes);
    metrics.iter().zip(WEIGHTS.iter()).map(|(m, w)| m * w).sum()
}

/// `compCV(nodeList) = compCVNodes(elems(nodeList))`. Kept as a distinct
/// entry point so callers that think in terms of "the cluster variance of
/// this snapshot" don't need to know the weighting lives in `compCVNodes`.
pub fn comp_cv(nodes: &NodeList) -> f64 {
    comp_cv_nodes(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::{GroupIdx, Node, NodeIdx, Policy, UtilVec};
    use std::collections::BTreeSet;

    fn node(idx: i64, mem: u64, free_mem: u64, offline: bool) -> Node {
        Node {
            idx: NodeIdx(idx),
            name: format!("n{idx}"),
            group: GroupIdx(0),
            policy: Policy::unrestricted(),
            total_mem_mib: mem,
            total_disk_mib: 1_000_000,
            total_cpus: 8,
            hi_cpu: 16,
            hi_spindles: 12,
            exclusive_storage: false,
            offline,
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

    #[test]
    fn cv_is_non_negative_and_order_independent() {
        let mut nl = cv_core::NodeList::new();
        nl = nl.add(NodeIdx(1), node(1, 65536, 40000, false));
        nl = nl.add(NodeIdx(2), node(2, 65536, 60000, false));
        let cv1 = comp_cv(&nl);

        let mut nl2 = cv_core::NodeList::new();
        nl2 = nl2.add(NodeIdx(2), node(2, 65536, 60000, false));
        nl2 = nl2.add(NodeIdx(1), node(1, 65536, 40000, false));
        let cv2 = comp_cv(&nl2);

        assert!(cv1 >= 0.0);
        assert_eq!(cv1, cv2);
    }

    #[test]
    fn balanced_cluster_scores_lower_than_skewed() {
        let mut balanced = cv_core::NodeList::new();
        balanced = balanced.add(NodeIdx(1), node(1, 65536, 32768, false));
        balanced = balanced.add(NodeIdx(2), node(2, 65536, 32768, false));

        let mut skewed = cv_core::NodeList::new();
        skewed = skewed.add(NodeIdx(1), node(1, 65536, 8192, false));
        skewed = skewed.add(NodeIdx(2), node(2, 65536, 57344, false));

        assert!(comp_cv(&balanced) < comp_cv(&skewed));
    }
}
