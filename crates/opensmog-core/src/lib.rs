//! # OpenSMOG Core Library
//!
//! Molecular dynamics of structure-based models (SBM) from force field files
//! generated by SMOG 2.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture with a clear separation of concerns.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Topology`), readers for
//!   `.gro`, `.top` and OpenSMOG `.xml` files, the DCD trajectory writer, pair potentials and
//!   the custom expression compiler used by contact and nonbonded forces.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It assembles a `System` of grouped
//!   forces from the inputs, and its `Context` evaluates energies and forces and integrates the
//!   equations of motion with Langevin, Verlet or Brownian dynamics.
//!
//! - **[`workflows`]: The Public API.** The `Sbm` simulation facade, output reporters and the
//!   run log, tying `core` and `engine` together into a complete simulation.

pub mod core;
pub mod engine;
pub mod workflows;
