//! §6 — opcode shape: the two opcode templates and the closed `IMove ->
//! [Opcode]` dispatch table. This is pure data; textual rendering into
//! shell-command lines and jobset batching is `cv_report`'s job, one layer
//! up, so it can stay free of opcode-internal knowledge.

use cv_core::{CoreError, IMove, InstanceIdx, InstanceList, NodeIdx, NodeList};

/// Default migration mode; never varied by this engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MigrationMode {
    #[default]
    Live,
}

/// Default live-mode for the node being vacated; never varied by this engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OldLiveMode {
    #[default]
    Auto,
}

/// `OpInstanceReplaceDisks`'s replacement mode; this engine only ever emits
/// `ReplaceNewSecondary` moves, never in-place disk swaps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplaceDisksMode {
    #[default]
    ReplaceNewSecondary,
}

/// `OpInstanceMigrate` — used for `Failover` (`target_node = None`) and
/// `FailoverToAny` (`target_node = Some(new_primary_name)`).
#[derive(Clone, Debug, PartialEq)]
pub struct OpInstanceMigrate {
    pub instance_name: String,
    pub migration_mode: MigrationMode,
    pub old_live_mode: OldLiveMode,
    pub target_node: Option<String>,
    pub allow_runtime_changes: bool,
    pub ignore_ipolicy: bool,
    pub migration_cleanup: bool,
    pub iallocator: Option<String>,
    pub allow_failover: bool,
}

/// `OpInstanceReplaceDisks` — used for every replace step, with
/// `remote_node` set to the replacement target.
#[derive(Clone, Debug, PartialEq)]
pub struct OpInstanceReplaceDisks {
    pub instance_name: String,
    pub early_release: bool,
    pub ignore_ipolicy: bool,
    pub mode: ReplaceDisksMode,
    pub disks: Vec<u32>,
    pub remote_node: Option<String>,
    pub iallocator: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Opcode {
    Migrate(OpInstanceMigrate),
    ReplaceDisks(OpInstanceReplaceDisks),
}

fn migrate(instance_name: String, target_node: Option<String>) -> Opcode {
    Opcode::Migrate(OpInstanceMigrate {
        instance_name,
        migration_mode: MigrationMode::default(),
        old_live_mode: OldLiveMode::default(),
        target_node,
        allow_runtime_changes: false,
        ignore_ipolicy: false,
        migration_cleanup: false,
        iallocator: None,
        allow_failover: true,
    })
}

fn replace(instance_name: String, remote_node: String) -> Opcode {
    Opcode::ReplaceDisks(OpInstanceReplaceDisks {
        instance_name,
        early_release: false,
        ignore_ipolicy: false,
        mode: ReplaceDisksMode::default(),
        disks: Vec::new(),
        remote_node: Some(remote_node),
        iallocator: None,
    })
}

fn node_name(nl: &NodeList, idx: NodeIdx) -> Result<String, CoreError> {
    let s = nl.name_of(idx);
    if s.is_empty() {
        Err(CoreError::EmptyNodeName(idx))
    } else {
        Ok(s.to_string())
    }
}

/// `iMoveToJob(nl, il, idx, move)`: the ordered opcode sequence for one
/// move, per §6's table. Node name lookups that would yield an empty
/// string are fatal (programmer error) and surface as `CoreError`.
pub fn i_move_to_job(nl: &NodeList, il: &InstanceList, idx: InstanceIdx, mv: IMove) -> Result<Vec<Opcode>, CoreError> {
    let inst = il.find(idx).ok_or(CoreError::MissingInstance(idx))?;
    let iname = inst.name.clone();

    Ok(match mv {
        IMove::Failover => vec![migrate(iname, None)],
        IMove::FailoverToAny(np) => vec![migrate(iname, Some(node_name(nl, np)?))],
        IMove::ReplacePrimary(np) => {
            let np_name = node_name(nl, np)?;
            vec![migrate(iname.clone(), None), replace(iname.clone(), np_name), migrate(iname, None)]
        }
        IMove::ReplaceSecondary(ns) => vec![replace(iname, node_name(nl, ns)?)],
        IMove::ReplaceAndFailover(np) => {
            let np_name = node_name(nl, np)?;
            vec![replace(iname.clone(), np_name), migrate(iname, None)]
        }
        IMove::FailoverAndReplace(ns) => {
            let ns_name = node_name(nl, ns)?;
            vec![migrate(iname.clone(), None), replace(iname, ns_name)]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn inst(idx: i64, name: &str) -> Instance {
        Instance {
            idx: InstanceIdx(idx),
            name: name.to_string(),
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
        }
    }

    fn fixture() -> (NodeList, InstanceList) {
        let mut nl = NodeList::new();
        nl = nl.add(NodeIdx(1), node(1, "node1"));
        nl = nl.add(NodeIdx(2), node(2, "node2"));
        nl = nl.add(NodeIdx(3), node(3, "node3"));
        let mut il = InstanceList::new();
        il = il.add(InstanceIdx(1), inst(1, "inst1"));
        (nl, il)
    }

    #[test]
    fn failover_emits_single_migrate() {
        let (nl, il) = fixture();
        let ops = i_move_to_job(&nl, &il, InstanceIdx(1), IMove::Failover).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], Opcode::Migrate(m) if m.target_node.is_none()));
    }

    #[test]
    fn replace_primary_emits_migrate_replace_migrate() {
        let (nl, il) = fixture();
        let ops = i_move_to_job(&nl, &il, InstanceIdx(1), IMove::ReplacePrimary(NodeIdx(3))).unwrap();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], Opcode::Migrate(_)));
        assert!(matches!(&ops[1], Opcode::ReplaceDisks(r) if r.remote_node.as_deref() == Some("node3")));
        assert!(matches!(&ops[2], Opcode::Migrate(_)));
    }

    #[test]
    fn empty_target_name_is_fatal() {
        let (mut nl, il) = fixture();
        nl = nl.add(NodeIdx(3), { let mut n = nl.find(NodeIdx(3)).unwrap().clone(); n.name = String::new(); n });
        let err = i_move_to_job(&nl, &il, InstanceIdx(1), IMove::FailoverToAny(NodeIdx(3))).unwrap_err();
        assert_eq!(err, CoreError::EmptyNodeName(NodeIdx(3)));
    }
}
