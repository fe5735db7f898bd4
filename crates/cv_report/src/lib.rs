//! cv_report — §6's external interfaces: the human-readable plan format
//! (`printSolutionLine`), the named-metric diagnostics (`printStats`), and
//! the job-runner script shape (`formatCmds`, built on the opcode templates
//! and dispatch table defined in `cv_algo::opcode`).
//!
//! Everything here is rendering over `cv_core`/`cv_pipeline` output; there is
//! no parsing and no I/O.

#![deny(unsafe_code)]

pub mod errors;
pub mod jobsets;
pub mod lines;
pub mod stats;

pub use errors::ReportError;
pub use jobsets::{build_jobs, build_jobs_from_evac, format_cmds, split_jobs, Job};
pub use lines::format_plan;
pub use stats::{format_metrics, format_stats};
