//! # Engine Module
//!
//! This module turns loaded SMOG inputs into a runnable molecular dynamics
//! system and advances it in time.
//!
//! ## Overview
//!
//! The engine is the stateful layer of OpenSMOG. [`assembly`] combines a
//! coordinate file, a topology and the custom forces of a SMOG XML file into
//! a [`System`](crate::core::forcefield::forces::System) whose forces are
//! arranged in numbered groups. A [`context::Context`] then binds that system
//! to an integrator and a platform, evaluates energies and forces, and
//! integrates the equations of motion.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`], [`platform`]) - Physical parameters, platform and integrator selection
//! - **Assembly** ([`assembly`]) - Default SBM forces, contact forces and type-based nonbonded forces
//! - **Execution** ([`context`], [`integrators`], [`neighbor`]) - Force kernels, Langevin, Verlet and Brownian dynamics, Verlet neighbour lists
//! - **Progress Monitoring** ([`progress`]) - Progress events for long runs
//! - **Error Handling** ([`error`]) - Assembly and execution errors
//!
//! ## Key Capabilities
//!
//! - **Force groups** so that every named force can be reported separately
//! - **Parallel force evaluation** on the CPU platform, serial on the Reference platform
//! - **Custom expressions** compiled once with analytic derivatives

pub mod assembly;
pub mod config;
pub mod context;
pub mod error;
pub mod integrators;
pub mod neighbor;
pub mod platform;
pub mod progress;
