//! # Force Field Module
//!
//! Force objects and the analytic potentials they are built from.
//!
//! ## Overview
//!
//! A [`forces::System`] holds particle masses and a list of named
//! [`forces::Force`]s, each tagged with a force group so that energies can be
//! reported per component. The standard structure-based model terms are:
//!
//! - **Bonds, angles and dihedrals** from the topology, using harmonic and
//!   periodic potentials
//! - **Electrostatics** with a reaction-field Coulomb kernel
//! - **Custom contacts** as expression-defined pair potentials over explicit
//!   atom pairs
//! - **Custom nonbonded** interactions over every non-excluded pair, with
//!   per-type parameters supplied as tabulated functions
//!
//! ## Key Components
//!
//! - [`forces`] - Force and system containers
//! - [`potentials`] - Energy and derivative kernels
//! - [`units`] - Physical constants and temperature conversions

pub mod forces;
pub mod potentials;
pub mod units;
