//! cv_pipeline — C4 through C7: allocation search, the balancer, evacuation
//! and group change, and iterative/tiered allocation. Everything here is
//! orchestration over `cv_core`'s snapshots and `cv_algo`'s scoring/move
//! primitives; nothing in this crate does I/O.

#![deny(unsafe_code)]

pub mod alloc;
pub mod balancer;
pub mod error;
pub mod evacuate;
pub mod iterate;
pub mod multigroup;

pub use alloc::{allocate_on_pair, allocate_on_single, best_alloc_element, concat_allocs, gen_alloc_nodes, try_alloc, AllocElement, AllocNodes, AllocSolution};
pub use balancer::{check_instance_move, check_move, compare_tables, do_next_balance, try_balance, Placement, Table};
pub use error::PipelineError;
pub use evacuate::{node_evac_instance, try_change_group, try_node_evac, EvacSolution};
pub use iterate::{iterate_alloc, tiered_alloc, IterateResult};
pub use multigroup::{filter_valid_groups, find_best_alloc_group, try_mg_alloc, GroupAlloc};
