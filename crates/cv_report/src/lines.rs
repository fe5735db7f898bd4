//! §6 — `printSolutionLine`: the human-readable plan format
//! `"  %3d. %-*s %-*s => %-*s %12.8f a=%s"`, with column widths computed
//! from the whole plan so every row lines up.

use std::collections::BTreeMap;

use cv_core::{InstanceIdx, InstanceList, NodeIdx, NodeList};
use cv_pipeline::balancer::Placement;

use crate::errors::ReportError;

struct Row {
    index: usize,
    inst_name: String,
    from: String,
    to: String,
    score: f64,
    code: String,
}

fn location(nl: &NodeList, pdx: NodeIdx, sdx: Option<NodeIdx>) -> Result<String, ReportError> {
    let pname = nl.find(pdx).ok_or(ReportError::MissingNode(pdx))?.name.clone();
    if pname.is_empty() {
        return Err(ReportError::EmptyNodeName(pdx));
    }
    let sname = match sdx {
        Some(s) => {
            let n = nl.find(s).ok_or(ReportError::MissingNode(s))?;
            if n.name.is_empty() {
                return Err(ReportError::EmptyNodeName(s));
            }
            n.name.clone()
        }
        None => String::new(),
    };
    Ok(format!("{pname}:{sname}"))
}

/// `printSolutionLine`: one row per placement, in chronological order.
/// `il` is the instance snapshot *before* any placement in the plan was
/// applied; the row's "from" location replays forward from there so that an
/// instance moved more than once shows its true intermediate locations.
pub fn format_plan(nl: &NodeList, il: &InstanceList, placements_chronological: &[Placement]) -> Result<Vec<String>, ReportError> {
    let mut locations: BTreeMap<InstanceIdx, (NodeIdx, Option<NodeIdx>)> = BTreeMap::new();
    let mut rows = Vec::with_capacity(placements_chronological.len());

    for (i, p) in placements_chronological.iter().enumerate() {
        let inst = il.find(p.instance).ok_or(ReportError::MissingInstance(p.instance))?;
        if inst.name.is_empty() {
            return Err(ReportError::EmptyInstanceName(p.instance));
        }
        let (old_p, old_s) = locations.get(&p.instance).copied().unwrap_or((inst.primary, inst.secondary));

        let from = location(nl, old_p, old_s)?;
        let to = location(nl, p.new_primary, p.new_secondary)?;
        locations.insert(p.instance, (p.new_primary, p.new_secondary));

        rows.push(Row {
            index: i + 1,
            inst_name: inst.name.clone(),
            from,
            to,
            score: p.score,
            code: p.mv.short_code(),
        });
    }

    let name_w = rows.iter().map(|r| r.inst_name.len()).max().unwrap_or(0);
    let from_w = rows.iter().map(|r| r.from.len()).max().unwrap_or(0);
    let to_w = rows.iter().map(|r| r.to.len()).max().unwrap_or(0);

    Ok(rows
        .iter()
        .map(|r| {
            format!(
                "  {:>3}. {:<name_w$} {:<from_w$} => {:<to_w$} {:12.8} a={}",
                r.index,
                r.inst_name,
                r.from,
                r.to,
                r.score,
                r.code,
                name_w = name_w,
                from_w = from_w,
                to_w = to_w,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_algo::IMove;
    use cv_core::{DiskTemplate, GroupIdx, Instance, Node, Policy, UtilVec};
    use std::collections::BTreeSet;

    fn node(idx: i64, name: &str) -> Node {
        Node {
            idx: NodeIdx(idx),
            name: name.to_string(),
            group: GroupIdx(0),
            policy: Policy::unrestricted(),
            total_mem_mib: 65536,
            total_disk_mib: 1_048_576,
            total_cpus: 16,
            hi_cpu: 32,
            hi_spindles: 24,
            exclusive_storage: false,
            offline: false,
            free_mem_mib: 65536,
            free_disk_mib: 1_048_576,
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

    fn fixture() -> (NodeList, InstanceList) {
        let mut nl = NodeList::new();
        nl = nl.add(NodeIdx(1), node(1, "node1"));
        nl = nl.add(NodeIdx(2), node(2, "node2"));
        let inst = Instance {
            idx: InstanceIdx(1),
            name: "inst1".into(),
            alias: String::new(),
            primary: NodeIdx(1),
            secondary: Some(NodeIdx(2)),
            mem_mib: 4096,
            disk_mib: 51200,
            vcpus: 2,
            spindles: 1,
            util: UtilVec::default(),
            running: true,
            auto_balance: true,
            movable: true,
            disk_template: DiskTemplate::Drbd8,
            nics: Vec::new(),
            excl_tags: BTreeSet::new(),
        };
        let mut il = InstanceList::new();
        il = il.add(InstanceIdx(1), inst);
        (nl, il)
    }

    #[test]
    fn single_failover_reports_swapped_location() {
        let (nl, il) = fixture();
        let placement = Placement {
            instance: InstanceIdx(1),
            new_primary: NodeIdx(2),
            new_secondary: Some(NodeIdx(1)),
            mv: IMove::Failover,
            score: 0.5,
        };
        let lines = format_plan(&nl, &il, &[placement]).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("node1:node2 => node2:node1"));
        assert!(lines[0].contains("a=f"));
        assert!(lines[0].trim_start().starts_with("1."));
    }

    #[test]
    fn repeated_moves_replay_intermediate_locations() {
        let (nl, il) = fixture();
        let first = Placement {
            instance: InstanceIdx(1),
            new_primary: NodeIdx(2),
            new_secondary: Some(NodeIdx(1)),
            mv: IMove::Failover,
            score: 0.5,
        };
        let second = Placement {
            instance: InstanceIdx(1),
            new_primary: NodeIdx(1),
            new_secondary: Some(NodeIdx(2)),
            mv: IMove::Failover,
            score: 0.0,
        };
        let lines = format_plan(&nl, &il, &[first, second]).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("node1:node2 => node2:node1"));
        assert!(lines[1].contains("node2:node1 => node1:node2"));
    }
}
