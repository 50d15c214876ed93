//! # Workflows Module
//!
//! High-level entry points that run a structure-based model simulation from
//! SMOG 2 input files to trajectory and energy output.
//!
//! ## Overview
//!
//! [`simulation::Sbm`] ties the input readers, the system assembly and the
//! simulation context together. It loads a `.gro`, `.top` and `.xml` triple,
//! creates the context on the selected platform, opens the output reporters
//! and runs the requested number of steps while writing the run log.
//!
//! ## Architecture
//!
//! - **Simulation Workflow** ([`simulation`]) - Ordered setup and execution of one simulation
//! - **Reporters** ([`reporters`]) - DCD trajectory, energy and per-force output with backups of existing files
//! - **Run Log** ([`logfile`]) - The banner and the `OpenSMOG.log` summary of a run

pub mod logfile;
pub mod reporters;
pub mod simulation;
