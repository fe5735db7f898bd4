//! A small, CLI-only snapshot format. This is deliberately not a general
//! input parser (that's explicitly out of scope for the engine itself): a
//! fixture declares raw node capacity and instance placements, and the
//! loader folds each placement through `Node::add_pri`/`add_sec` so every
//! derived field (free memory, reserved memory, dynamic utilization,
//! conflicting-primaries) comes out of the same arithmetic the balancer
//! itself relies on, rather than being hand-computed in JSON.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use cv_core::{AllocPolicy, DiskTemplate, FailMode, Group, GroupIdx, GroupList, Instance, InstanceIdx, InstanceList, Nic, Node, NodeIdx, NodeList, Policy, UtilVec};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read fixture {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("cannot parse fixture {path}: {source}")]
    Parse { path: String, #[source] source: serde_json::Error },
    #[error("instance {name:?} placement onto node {node} failed: {reason}")]
    Placement { name: String, node: i64, reason: FailMode },
    #[error("instance {name:?} references unknown node {node}")]
    UnknownNode { name: String, node: i64 },
}

#[derive(Debug, Deserialize)]
struct FixtureGroup {
    idx: i64,
    name: String,
    #[serde(default)]
    alloc_policy: Option<AllocPolicy>,
    #[serde(default)]
    networks: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct FixtureNode {
    idx: i64,
    name: String,
    #[serde(default)]
    group: i64,
    total_mem_mib: u64,
    total_disk_mib: u64,
    total_cpus: u32,
    #[serde(default)]
    hi_cpu: u32,
    #[serde(default)]
    hi_spindles: u32,
    #[serde(default)]
    exclusive_storage: bool,
    #[serde(default)]
    offline: bool,
}

#[derive(Debug, Deserialize)]
struct FixtureInstance {
    idx: i64,
    name: String,
    #[serde(default)]
    alias: String,
    primary: i64,
    #[serde(default)]
    secondary: Option<i64>,
    mem_mib: u64,
    disk_mib: u64,
    #[serde(default = "default_vcpus")]
    vcpus: u32,
    #[serde(default = "default_spindles")]
    spindles: u32,
    #[serde(default = "default_running")]
    running: bool,
    #[serde(default = "default_auto_balance")]
    auto_balance: bool,
    #[serde(default = "default_movable")]
    movable: bool,
    #[serde(default)]
    disk_template: Option<DiskTemplate>,
    #[serde(default)]
    networks: Vec<String>,
    #[serde(default)]
    excl_tags: BTreeSet<String>,
}

fn default_vcpus() -> u32 {
    1
}
fn default_spindles() -> u32 {
    1
}
fn default_running() -> bool {
    true
}
fn default_auto_balance() -> bool {
    true
}
fn default_movable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    groups: Vec<FixtureGroup>,
    nodes: Vec<FixtureNode>,
    #[serde(default)]
    instances: Vec<FixtureInstance>,
}

/// A loaded snapshot, ready to feed straight into `cv_pipeline`.
pub struct Snapshot {
    pub groups: GroupList,
    pub nodes: NodeList,
    pub instances: InstanceList,
}

pub fn load(path: &Path) -> Result<Snapshot, FixtureError> {
    let text = fs::read_to_string(path).map_err(|e| FixtureError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: FixtureFile = serde_json::from_str(&text).map_err(|e| FixtureError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    build(raw)
}

fn build(raw: FixtureFile) -> Result<Snapshot, FixtureError> {
    let mut groups = GroupList::new();
    if raw.groups.is_empty() {
        groups = groups.add(
            GroupIdx(0),
            Group {
                idx: GroupIdx(0),
                name: "default".to_string(),
                alloc_policy: AllocPolicy::Preferred,
                networks: BTreeSet::new(),
            },
        );
    }
    for g in &raw.groups {
        groups = groups.add(
            GroupIdx(g.idx),
            Group {
                idx: GroupIdx(g.idx),
                name: g.name.clone(),
                alloc_policy: g.alloc_policy.unwrap_or(AllocPolicy::Preferred),
                networks: g.networks.clone(),
            },
        );
    }

    let mut nodes = NodeList::new();
    for n in &raw.nodes {
        let policy = Policy::unrestricted();
        nodes = nodes.add(
            NodeIdx(n.idx),
            Node {
                idx: NodeIdx(n.idx),
                name: n.name.clone(),
                group: GroupIdx(n.group),
                policy,
                total_mem_mib: n.total_mem_mib,
                total_disk_mib: n.total_disk_mib,
                total_cpus: n.total_cpus,
                hi_cpu: if n.hi_cpu == 0 { n.total_cpus * 4 } else { n.hi_cpu },
                hi_spindles: if n.hi_spindles == 0 { 32 } else { n.hi_spindles },
                exclusive_storage: n.exclusive_storage,
                offline: n.offline,
                free_mem_mib: n.total_mem_mib,
                free_disk_mib: n.total_disk_mib,
                reserved_mem_mib: 0,
                used_cpus: 0,
                used_spindles: 0,
                unaccounted_mem_mib: 0,
                own_mem_mib: 0,
                primary: BTreeSet::new(),
                secondary: Default::default(),
                dyn_util: UtilVec::default(),
                primary_tags: Default::default(),
            },
        );
    }

    let mut instances = InstanceList::new();
    for i in &raw.instances {
        let inst = Instance {
            idx: InstanceIdx(i.idx),
            name: i.name.clone(),
            alias: i.alias.clone(),
            primary: NodeIdx(i.primary),
            secondary: i.secondary.map(NodeIdx),
            mem_mib: i.mem_mib,
            disk_mib: i.disk_mib,
            vcpus: i.vcpus,
            spindles: i.spindles,
            util: UtilVec::default(),
            running: i.running,
            auto_balance: i.auto_balance,
            movable: i.movable,
            disk_template: i.disk_template.unwrap_or(if i.secondary.is_some() { DiskTemplate::Drbd8 } else { DiskTemplate::Plain }),
            nics: i.networks.iter().cloned().map(|network| Nic { network: Some(network) }).collect(),
            excl_tags: i.excl_tags.clone(),
        };

        let pnode = nodes.find(inst.primary).cloned().ok_or_else(|| FixtureError::UnknownNode {
            name: inst.name.clone(),
            node: inst.primary.get(),
        })?;
        let pnode = pnode.add_pri(&inst).map_err(|e| FixtureError::Placement {
            name: inst.name.clone(),
            node: inst.primary.get(),
            reason: e,
        })?;
        nodes = nodes.add(inst.primary, pnode);

        if let Some(sdx) = inst.secondary {
            let snode = nodes.find(sdx).cloned().ok_or_else(|| FixtureError::UnknownNode {
                name: inst.name.clone(),
                node: sdx.get(),
            })?;
            let snode = snode.add_sec(&inst).map_err(|e| FixtureError::Placement {
                name: inst.name.clone(),
                node: sdx.get(),
                reason: e,
            })?;
            nodes = nodes.add(sdx, snode);
        }

        instances = instances.add(inst.idx, inst);
    }

    Ok(Snapshot { groups, nodes, instances })
}
