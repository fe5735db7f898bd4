//! `printStats`-style diagnostics over `CStats` and the named metric vector.

use cv_algo::{comp_detailed_cv, METRICS};
use cv_core::{CStats, NodeList};

/// One line per named metric, in `METRICS`'s fixed order, plus the weighted
/// total. Exposes the same breakdown the balancer optimizes over, so a
/// human can see which dimension is driving the score.
pub fn format_metrics(nodes: &NodeList) -> Vec<String> {
    let detailed = comp_detailed_cv(nodes);
    METRICS
        .iter()
        .zip(detailed.iter())
        .map(|((name, weight), value)| format!("{name}: {value:.8} (weight {weight})"))
        .collect()
}

/// Summary line over a `CStats` snapshot: node/instance counts and the
/// headline score.
pub fn format_stats(stats: &CStats) -> String {
    format!(
        "nodes={} online={} bad={} instances={} score={:.8}",
        stats.node_count, stats.online_node_count, stats.bad_node_count, stats.instance_count, stats.score,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::{GroupIdx, Node, NodeIdx, Policy, UtilVec};
    use std::collections::BTreeSet;

    fn node(idx: i64) -> Node {
        Node {
            idx: NodeIdx(idx),
            name: format!("n{idx}"),
            group: GroupIdx(0),
            policy: Policy::unrestricted(),
            total_mem_mib: 65536,
            total_disk_mib: 1_048_576,
            total_cpus: 16,
            hi_cpu: 32,
            hi_spindles: 24,
            exclusive_storage: false,
            offline: false,
            free_mem_mib: 32768,
            free_disk_mib: 524_288,
            reserved_mem_mib: 0,
            used_cpus: 4,
            used_spindles: 2,
            unaccounted_mem_mib: 0,
            own_mem_mib: 0,
            primary: BTreeSet::new(),
            secondary: Default::default(),
            dyn_util: UtilVec::default(),
            primary_tags: Default::default(),
        }
    }

    #[test]
    fn format_metrics_has_thirteen_named_rows() {
        let mut nl = NodeList::new();
        nl = nl.add(NodeIdx(1), node(1));
        nl = nl.add(NodeIdx(2), node(2));
        let lines = format_metrics(&nl);
        assert_eq!(lines.len(), 13);
        assert!(lines[0].starts_with("std_dev_mem:"));
    }

    #[test]
    fn format_stats_reports_counts() {
        let mut nl = NodeList::new();
        nl = nl.add(NodeIdx(1), node(1));
        let stats = CStats::compute(&nl, 1.5);
        let line = format_stats(&stats);
        assert!(line.contains("nodes=1"));
        assert!(line.contains("score=1.50000000"));
    }
}
