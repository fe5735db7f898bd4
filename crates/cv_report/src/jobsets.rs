//! §6 — `formatCmds`: group a chronological plan into disjoint-node-set
//! jobsets (`splitJobs`/`mergeJobs`) and render the exact-prefix shell
//! script lines the external job runner expects.

use std::collections::BTreeSet;

use cv_algo::{i_move_to_job, IMove, Opcode};
use cv_core::{InstanceIdx, InstanceList, NodeIdx, NodeList};
use cv_pipeline::balancer::Placement;
use cv_pipeline::evacuate::EvacSolution;

use crate::errors::ReportError;

/// One instance's move, rendered to shell command text, tagged with every
/// node index the move touches (used for jobset disjointness).
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub instance: InstanceIdx,
    pub commands: Vec<String>,
    pub nodes: BTreeSet<NodeIdx>,
}

fn opcode_node(op: &Opcode) -> Option<&str> {
    match op {
        Opcode::Migrate(m) => m.target_node.as_deref(),
        Opcode::ReplaceDisks(r) => r.remote_node.as_deref(),
    }
}

fn render_command(verb: &str, inst_name: &str, op: &Opcode) -> String {
    match op {
        Opcode::Migrate(m) => match &m.target_node {
            None => format!("{verb} -f {inst_name}"),
            Some(node) => format!("{verb} -f -n {node} {inst_name}"),
        },
        Opcode::ReplaceDisks(r) => {
            let node = r.remote_node.as_deref().unwrap_or("");
            format!("replace-disks -n {node} {inst_name}")
        }
    }
}

/// Build one `Job` per placement, in the chronological order given (the
/// caller is responsible for reversing a newest-first placement list).
/// `nl`/`il` only back name lookups; any post-move snapshot works since
/// indices, not names, are load-bearing across a whole plan.
pub fn build_jobs(nl: &NodeList, il: &InstanceList, placements_chronological: &[Placement]) -> Result<Vec<Job>, ReportError> {
    placements_chronological.iter().map(|p| build_job(nl, il, p)).collect()
}

fn build_job(nl: &NodeList, il: &InstanceList, p: &Placement) -> Result<Job, ReportError> {
    let inst = il.find(p.instance).ok_or(ReportError::MissingInstance(p.instance))?;
    if inst.name.is_empty() {
        return Err(ReportError::EmptyInstanceName(p.instance));
    }
    let verb = if inst.running { "migrate" } else { "failover" };

    let ops = i_move_to_job(nl, il, p.instance, p.mv)?;

    let mut nodes: BTreeSet<NodeIdx> = BTreeSet::new();
    nodes.insert(p.new_primary);
    if let Some(s) = p.new_secondary {
        nodes.insert(s);
    }
    for op in &ops {
        if let Some(name) = opcode_node(op) {
            if let Some(n) = nl.elems().find(|n| n.name == name) {
                nodes.insert(n.idx);
            }
        }
    }

    let commands = ops.iter().map(|op| render_command(verb, &inst.name, op)).collect();

    Ok(Job {
        instance: p.instance,
        commands,
        nodes,
    })
}

fn move_payload_node(mv: IMove) -> Option<NodeIdx> {
    match mv {
        IMove::Failover => None,
        IMove::FailoverToAny(n) | IMove::ReplacePrimary(n) | IMove::ReplaceSecondary(n) | IMove::ReplaceAndFailover(n) | IMove::FailoverAndReplace(n) => Some(n),
    }
}

/// Build one `Job` per relocated instance in an evacuation or group-change
/// solution. Unlike `build_jobs`, the source doesn't carry a resulting
/// primary/secondary per step, so the node set is the union of each move's
/// explicit target node only (a bare `Failover` step contributes nothing
/// beyond what surrounding steps in the same sequence already name).
pub fn build_jobs_from_evac(nl: &NodeList, il: &InstanceList, solution: &EvacSolution) -> Result<Vec<Job>, ReportError> {
    solution
        .moved
        .iter()
        .map(|(idx, moves)| {
            let inst = il.find(*idx).ok_or(ReportError::MissingInstance(*idx))?;
            if inst.name.is_empty() {
                return Err(ReportError::EmptyInstanceName(*idx));
            }
            let verb = if inst.running { "migrate" } else { "failover" };

            let mut commands = Vec::new();
            let mut nodes = BTreeSet::new();
            for &mv in moves {
                for op in i_move_to_job(nl, il, *idx, mv)? {
                    commands.push(render_command(verb, &inst.name, &op));
                }
                if let Some(n) = move_payload_node(mv) {
                    nodes.insert(n);
                }
            }

            Ok(Job { instance: *idx, commands, nodes })
        })
        .collect()
}

/// `splitJobs`/`mergeJobs`: a job joins the currently open jobset iff its
/// node set is disjoint from every job already placed in it; otherwise a
/// new jobset opens. Greedy, single pass, stable with respect to input order.
pub fn split_jobs(jobs: &[Job]) -> Vec<Vec<Job>> {
    let mut jobsets: Vec<Vec<Job>> = Vec::new();
    let mut jobset_nodes: Vec<BTreeSet<NodeIdx>> = Vec::new();

    'outer: for job in jobs {
        for (set, used) in jobsets.iter_mut().zip(jobset_nodes.iter_mut()) {
            if used.is_disjoint(&job.nodes) {
                used.extend(job.nodes.iter().copied());
                set.push(job.clone());
                continue 'outer;
            }
        }
        jobset_nodes.push(job.nodes.clone());
        jobsets.push(vec![job.clone()]);
    }

    jobsets
}

/// Render jobsets to the exact-prefix lines the external runner expects:
/// `echo jobset N, K jobs`, `echo job N/M`, `check`, `gnt-instance <cmd>`.
pub fn format_cmds(jobsets: &[Vec<Job>]) -> Vec<String> {
    let mut out = Vec::new();
    for (n, jobset) in jobsets.iter().enumerate() {
        let jobset_no = n + 1;
        out.push(format!("echo jobset {jobset_no}, {} jobs", jobset.len()));
        for (m, job) in jobset.iter().enumerate() {
            out.push(format!("echo job {}/{}", m + 1, jobset.len()));
            out.push("check".to_string());
            for cmd in &job.commands {
                out.push(format!("gnt-instance {cmd}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_algo::IMove;

    fn job(instance: i64, nodes: &[i64]) -> Job {
        Job {
            instance: InstanceIdx(instance),
            commands: vec![format!("migrate -f i{instance}")],
            nodes: nodes.iter().map(|&n| NodeIdx(n)).collect(),
        }
    }

    #[test]
    fn disjoint_jobs_batch_into_one_jobset() {
        let jobs = vec![job(1, &[1, 2]), job(2, &[3, 4])];
        let jobsets = split_jobs(&jobs);
        assert_eq!(jobsets.len(), 1);
        assert_eq!(jobsets[0].len(), 2);
    }

    #[test]
    fn overlapping_job_opens_new_jobset() {
        let jobs = vec![job(1, &[1, 2]), job(2, &[2, 3])];
        let jobsets = split_jobs(&jobs);
        assert_eq!(jobsets.len(), 2);
    }

    #[test]
    fn format_cmds_has_exact_prefixes() {
        let jobs = vec![job(1, &[1, 2])];
        let jobsets = split_jobs(&jobs);
        let lines = format_cmds(&jobsets);
        assert_eq!(lines[0], "echo jobset 1, 1 jobs");
        assert_eq!(lines[1], "echo job 1/1");
        assert_eq!(lines[2], "check");
        assert_eq!(lines[3], "gnt-instance migrate -f i1");
    }

    #[test]
    fn verb_follows_running_flag() {
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

        let mut nl = NodeList::new();
        nl = nl.add(NodeIdx(1), node(1, "node1"));
        nl = nl.add(NodeIdx(2), node(2, "node2"));

        let mut inst = Instance {
            idx: InstanceIdx(1),
            name: "down-inst".into(),
            alias: String::new(),
            primary: NodeIdx(2),
            secondary: Some(NodeIdx(1)),
            mem_mib: 4096,
            disk_mib: 51200,
            vcpus: 2,
            spindles: 1,
            util: UtilVec::default(),
            running: false,
            auto_balance: true,
            movable: true,
            disk_template: DiskTemplate::Drbd8,
            nics: Vec::new(),
            excl_tags: BTreeSet::new(),
        };
        let mut il = InstanceList::new();
        il = il.add(InstanceIdx(1), inst.clone());

        let placement = Placement {
            instance: InstanceIdx(1),
            new_primary: NodeIdx(2),
            new_secondary: Some(NodeIdx(1)),
            mv: IMove::Failover,
            score: 0.0,
        };
        let jobs = build_jobs(&nl, &il, std::slice::from_ref(&placement)).unwrap();
        assert_eq!(jobs[0].commands, vec!["failover -f down-inst".to_string()]);

        inst.running = true;
        il = il.add(InstanceIdx(1), inst);
        let jobs = build_jobs(&nl, &il, std::slice::from_ref(&placement)).unwrap();
        assert_eq!(jobs[0].commands, vec!["migrate -f down-inst".to_string()]);
    }
}
