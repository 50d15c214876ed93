//! Provides input/output functionality for simulation file formats.
//!
//! The readers share the [`traits::InputFile`] interface and cover the three
//! inputs of a structure-based model simulation: GROMACS coordinates
//! ([`gro`]), GROMACS topologies ([`top`]) and the SMOG 2 custom potential
//! description ([`smog_xml`]). Trajectories are written in the binary DCD
//! format ([`dcd`]).

pub mod dcd;
pub mod gro;
pub mod smog_xml;
pub mod top;
pub mod traits;
