//! Node group entity: allocation policy and network connectivity.

use crate::enums::AllocPolicy;
use crate::ids::GroupIdx;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    pub idx: GroupIdx,
    pub name: String,
    pub alloc_policy: AllocPolicy,
    pub networks: BTreeSet<String>,
}

impl Group {
    pub fn is_allocable(&self) -> bool {
        self.alloc_policy.is_allocable()
    }

    pub fn connected_to(&self, network: &str) -> bool {
        self.networks.contains(network)
    }
}
