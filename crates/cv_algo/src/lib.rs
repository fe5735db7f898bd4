//! cv_algo — C2 scoring and C3 move algebra, layered directly on `cv_core`.
//!
//! Nothing here touches a container of more than one node/instance pair at
//! a time except `scoring`, which folds over an entire `NodeList`. Search,
//! balancing, and evacuation orchestration (C4-C7) live one layer up, in
//! `cv_pipeline`.

#![deny(unsafe_code)]

pub mod moves;
pub mod opcode;
pub mod scoring;

pub use moves::{apply_move, possible_moves, IMove};
pub use opcode::{
    i_move_to_job, MigrationMode, OldLiveMode, OpInstanceMigrate, OpInstanceReplaceDisks, Opcode, ReplaceDisksMode,
};
pub use scoring::{comp_cv, comp_cv_nodes, comp_detailed_cv, METRICS, WEIGHTS};
