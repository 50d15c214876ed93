//! # Core Models Module
//!
//! Plain data structures describing the inputs of a simulation.
//!
//! - [`structure`] - Coordinates, velocities and the periodic box of a `.gro` file
//! - [`topology`] - Atom types, molecule types and bonded terms of a `.top` file

pub mod structure;
pub mod topology;
