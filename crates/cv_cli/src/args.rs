//! Deterministic, offline CLI argument parsing. No network paths, no
//! implicit defaults that would make a run depend on wall-clock state.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cvbal", about = "Demo CLI for the cluster placement engine")]
pub struct Args {
    /// Path to a fixture JSON file describing the starting snapshot.
    #[arg(long, global = true)]
    pub fixture: PathBuf,

    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Place a new instance spec via multi-group allocation search.
    Alloc(InstanceSpecArgs),
    /// Run the hill-climbing balancer to convergence (or `--max-rounds`).
    Balance {
        #[arg(long, default_value_t = -1)]
        max_rounds: i64,
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,
        #[arg(long, default_value_t = 0.0)]
        mg_limit: f64,
        #[arg(long, default_value_t = 1e-2)]
        min_gain: f64,
        #[arg(long)]
        disk_moves: bool,
        #[arg(long)]
        inst_moves: bool,
    },
    /// Relocate instances off the listed nodes.
    Evacuate {
        #[arg(long = "node", required = true)]
        nodes: Vec<i64>,
        #[arg(long = "instance", required = true)]
        instances: Vec<i64>,
    },
    /// Relocate instances into a different node group.
    ChangeGroup {
        #[arg(long = "group")]
        groups: Vec<i64>,
        #[arg(long = "instance", required = true)]
        instances: Vec<i64>,
    },
    /// Repeatedly allocate clones of a spec, shrinking it on exhaustion.
    Tier(TieredSpecArgs),
}

#[derive(Debug, clap::Args)]
pub struct InstanceSpecArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub mem_mib: u64,
    #[arg(long)]
    pub disk_mib: u64,
    #[arg(long, default_value_t = 2)]
    pub vcpus: u32,
    #[arg(long, default_value_t = 1)]
    pub spindles: u32,
    #[arg(long)]
    pub mirrored: bool,
}

#[derive(Debug, clap::Args)]
pub struct TieredSpecArgs {
    #[command(flatten)]
    pub spec: InstanceSpecArgs,
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_subcommand_parses() {
        let args = Args::parse_from([
            "cvbal",
            "--fixture",
            "snap.json",
            "alloc",
            "--name",
            "web-1",
            "--mem-mib",
            "4096",
            "--disk-mib",
            "10240",
            "--mirrored",
        ]);
        assert!(matches!(args.command, Command::Alloc(ref s) if s.name == "web-1" && s.mirrored));
    }

    #[test]
    fn balance_defaults_are_conservative() {
        let args = Args::parse_from(["cvbal", "--fixture", "snap.json", "balance"]);
        match args.command {
            Command::Balance { max_rounds, min_gain, .. } => {
                assert_eq!(max_rounds, -1);
                assert!((min_gain - 1e-2).abs() < 1e-12);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
