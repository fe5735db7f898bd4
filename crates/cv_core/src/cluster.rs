//! Immutable snapshot containers over nodes, instances, and groups.
//!
//! Per §9's design note, a systems-language port needs an opaque container
//! abstraction supporting `find`, `add`, `addTwo`, `elems`, `keys`, `filter`,
//! `size`, `nameOf`, with "modification" always producing a new logical
//! value. `BTreeMap` gives us that for free: cloning an `Rc`-free `BTreeMap`
//! is O(n log n) to touch the path being replaced conceptually, and iteration
//! order is always by key, so scoring/printing never depends on insertion
//! order.

use crate::group::Group;
use crate::ids::{GroupIdx, InstanceIdx, NodeIdx};
use crate::instance::Instance;
use crate::node::Node;
use std::collections::BTreeMap;

macro_rules! def_container {
    ($list:ident, $idx:ty, $elem:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct $list(BTreeMap<$idx, $elem>);

        impl $list {
            pub fn new() -> Self {
                Self(BTreeMap::new())
            }

            pub fn from_map(m: BTreeMap<$idx, $elem>) -> Self {
                Self(m)
            }

            pub fn find(&self, idx: $idx) -> Option<&$elem> {
                self.0.get(&idx)
            }

            /// Replace (or insert) a single entry, returning a new container.
            pub fn add(&self, idx: $idx, v: $elem) -> Self {
                let mut m = self.0.clone();
                m.insert(idx, v);
                Self(m)
            }

            /// Atomically replace two entries at once (the common case for
            /// moves that touch a primary and a secondary together).
            pub fn add_two(&self, a: ($idx, $elem), b: ($idx, $elem)) -> Self {
                let mut m = self.0.clone();
                m.insert(a.0, a.1);
                m.insert(b.0, b.1);
                Self(m)
            }

            pub fn remove(&self, idx: $idx) -> Self {
                let mut m = self.0.clone();
                m.remove(&idx);
                Self(m)
            }

            pub fn elems(&self) -> impl Iterator<Item = &$elem> {
                self.0.values()
            }

            pub fn keys(&self) -> impl Iterator<Item = $idx> + '_ {
                self.0.keys().copied()
            }

            pub fn filter<F: Fn(&$elem) -> bool>(&self, f: F) -> Self {
                Self(self.0.iter().filter(|(_, v)| f(v)).map(|(k, v)| (*k, v.clone())).collect())
            }

            pub fn size(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }
    };
}

def_container!(NodeList, NodeIdx, Node, "Immutable snapshot of nodes, keyed by index.");
def_container!(InstanceList, InstanceIdx, Instance, "Immutable snapshot of instances, keyed by index.");
def_container!(GroupList, GroupIdx, Group, "Immutable snapshot of node groups, keyed by index.");

impl NodeList {
    pub fn name_of(&self, idx: NodeIdx) -> &str {
        self.find(idx).map(|n| n.name.as_str()).unwrap_or("")
    }

    pub fn online(&self) -> impl Iterator<Item = &Node> {
        self.elems().filter(|n| !n.offline)
    }

    pub fn offline_indices(&self) -> Vec<NodeIdx> {
        self.elems().filter(|n| n.offline).map(|n| n.idx).collect()
    }
}

impl InstanceList {
    pub fn name_of(&self, idx: InstanceIdx) -> &str {
        self.find(idx).map(|i| i.name.as_str()).unwrap_or("")
    }
}

/// Split a cluster snapshot into one `(NodeList, InstanceList)` pair per
/// group. Every node belongs to exactly one group, so the partition is
/// exhaustive and disjoint (§8 property 7).
pub fn split_cluster(nl: &NodeList, il: &InstanceList) -> BTreeMap<GroupIdx, (NodeList, InstanceList)> {
    let mut out: BTreeMap<GroupIdx, (NodeList, InstanceList)> = BTreeMap::new();
    for n in nl.elems() {
        let entry = out.entry(n.group).or_insert_with(|| (NodeList::new(), InstanceList::new()));
        entry.0 = entry.0.add(n.idx, n.clone());
    }
    for i in il.elems() {
        if let Some(p) = nl.find(i.primary) {
            let entry = out.entry(p.group).or_insert_with(|| (NodeList::new(), InstanceList::new()));
            entry.1 = entry.1.add(i.idx, i.clone());
        }
    }
    out
}

/// §8 property 8: instances whose primary and secondary sit in different
/// groups (a topology that should never arise from moves this engine
/// performs, but snapshots handed in by a caller may already contain one).
pub fn find_split_instances(nl: &NodeList, il: &InstanceList) -> Vec<InstanceIdx> {
    il.elems()
        .filter(|i| {
            let Some(sec) = i.secondary else { return false };
            let pg = nl.find(i.primary).map(|n| n.group);
            let sg = nl.find(sec).map(|n| n.group);
            pg != sg
        })
        .map(|i| i.idx)
        .collect()
}
