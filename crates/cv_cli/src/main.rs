// crates/cv_cli/src/main.rs
//
// Demo CLI driving the cluster placement engine over a fixture snapshot.
// Strictly offline: a fixture file in, a plan and/or jobset script out.

mod args;
mod fixture;

use std::collections::BTreeSet;
use std::process::ExitCode;

use args::{Args, Command};
use cv_core::{CStats, DiskTemplate, GroupIdx, Instance, InstanceIdx, NodeIdx, UtilVec};
use cv_pipeline::balancer::{do_next_balance, try_balance, Table};
use cv_pipeline::evacuate::{try_change_group, try_node_evac};
use cv_pipeline::iterate::tiered_alloc;
use cv_pipeline::multigroup::try_mg_alloc;
use cv_report::{build_jobs, build_jobs_from_evac, format_cmds, format_plan, format_stats, split_jobs};

fn main() -> ExitCode {
    env_logger::init();
    let args = args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("cvbal: error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<ExitCode, String> {
    let snapshot = fixture::load(&args.fixture).map_err(|e| e.to_string())?;
    let quiet = args.quiet;

    match args.command {
        Command::Alloc(spec) => run_alloc(snapshot, spec, quiet),
        Command::Balance {
            max_rounds,
            min_score,
            mg_limit,
            min_gain,
            disk_moves,
            inst_moves,
        } => run_balance(snapshot, max_rounds, min_score, mg_limit, min_gain, disk_moves, inst_moves, quiet),
        Command::Evacuate { nodes, instances } => run_evacuate(snapshot, nodes, instances, quiet),
        Command::ChangeGroup { groups, instances } => run_change_group(snapshot, groups, instances, quiet),
        Command::Tier(spec) => run_tier(snapshot, spec, quiet),
    }
}

fn spec_to_instance(idx: InstanceIdx, spec: &args::InstanceSpecArgs) -> Instance {
    Instance {
        idx,
        name: spec.name.clone(),
        alias: String::new(),
        primary: NodeIdx(0),
        secondary: None,
        mem_mib: spec.mem_mib,
        disk_mib: spec.disk_mib,
        vcpus: spec.vcpus,
        spindles: spec.spindles,
        util: UtilVec::default(),
        running: true,
        auto_balance: true,
        movable: true,
        disk_template: if spec.mirrored { DiskTemplate::Drbd8 } else { DiskTemplate::Plain },
        nics: Vec::new(),
        excl_tags: BTreeSet::new(),
    }
}

fn run_alloc(snapshot: fixture::Snapshot, spec: args::InstanceSpecArgs, quiet: bool) -> Result<ExitCode, String> {
    let count = if spec.mirrored { 2 } else { 1 };
    let idx = InstanceIdx(snapshot.instances.size() as i64);
    let inst = spec_to_instance(idx, &spec);

    let (best, score) = try_mg_alloc(&snapshot.groups, &snapshot.nodes, &inst, count).map_err(|e| e.to_string())?;
    let elem = best.solution.best.ok_or("allocator reported success with no placement")?;

    if !quiet {
        println!("placed {} in group {} at score {:.8}", spec.name, best.group.get(), score);
        println!("{}", format_stats(&CStats::compute(&elem.nodes, score)));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_balance(
    snapshot: fixture::Snapshot,
    max_rounds: i64,
    min_score: f64,
    mg_limit: f64,
    min_gain: f64,
    disk_moves: bool,
    inst_moves: bool,
    quiet: bool,
) -> Result<ExitCode, String> {
    let starting_instances = snapshot.instances.clone();
    let mut tbl = Table::new(snapshot.nodes, snapshot.instances);

    while do_next_balance(&tbl, max_rounds, min_score) {
        let next = try_balance(&tbl, disk_moves, inst_moves, false, &BTreeSet::new(), mg_limit, min_gain);
        if next.placements.len() == tbl.placements.len() {
            break;
        }
        tbl = next;
    }

    if !quiet {
        let chronological: Vec<_> = tbl.placements.iter().rev().cloned().collect();
        for line in format_plan(&tbl.nodes, &starting_instances, &chronological).map_err(|e| e.to_string())? {
            println!("{line}");
        }
        let jobs = build_jobs(&tbl.nodes, &tbl.instances, &chronological).map_err(|e| e.to_string())?;
        for line in format_cmds(&split_jobs(&jobs)) {
            println!("{line}");
        }
        println!("{}", format_stats(&CStats::compute(&tbl.nodes, tbl.score)));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_evacuate(snapshot: fixture::Snapshot, nodes: Vec<i64>, instances: Vec<i64>, quiet: bool) -> Result<ExitCode, String> {
    let nodes_to_evacuate: Vec<NodeIdx> = nodes.into_iter().map(NodeIdx).collect();
    let instance_list: Vec<InstanceIdx> = instances.into_iter().map(InstanceIdx).collect();

    let (nl2, il2, solution) = try_node_evac(&snapshot.nodes, &snapshot.instances, &nodes_to_evacuate, &instance_list);

    if !quiet {
        let jobs = build_jobs_from_evac(&nl2, &il2, &solution).map_err(|e| e.to_string())?;
        for line in format_cmds(&split_jobs(&jobs)) {
            println!("{line}");
        }
        for (idx, reason) in &solution.failed {
            println!("instance {idx}: {reason}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_change_group(snapshot: fixture::Snapshot, groups: Vec<i64>, instances: Vec<i64>, quiet: bool) -> Result<ExitCode, String> {
    let requested_groups: Vec<GroupIdx> = groups.into_iter().map(GroupIdx).collect();
    let instance_list: Vec<InstanceIdx> = instances.into_iter().map(InstanceIdx).collect();

    let (nl2, il2, solution) = try_change_group(&snapshot.nodes, &snapshot.instances, &snapshot.groups, &requested_groups, &instance_list);

    if !quiet {
        let jobs = build_jobs_from_evac(&nl2, &il2, &solution).map_err(|e| e.to_string())?;
        for line in format_cmds(&split_jobs(&jobs)) {
            println!("{line}");
        }
        for (idx, reason) in &solution.failed {
            println!("instance {idx}: {reason}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_tier(snapshot: fixture::Snapshot, spec: args::TieredSpecArgs, quiet: bool) -> Result<ExitCode, String> {
    let count = if spec.spec.mirrored { 2 } else { 1 };
    let base = spec_to_instance(InstanceIdx(0), &spec.spec);

    let result = tiered_alloc(&snapshot.groups, &snapshot.nodes, &snapshot.instances, &base, count, spec.max_iterations);

    if !quiet {
        println!("placed {} clones of {}", result.allocated.len(), spec.spec.name);
        for (n, stats) in result.steps.iter().enumerate() {
            println!("step {}: {}", n + 1, format_stats(stats));
        }
    }
    Ok(ExitCode::SUCCESS)
}
