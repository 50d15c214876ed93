//! # Core Module
//!
//! This module provides the stateless building blocks of OpenSMOG: data
//! models, file readers, the custom-expression compiler and force objects.
//!
//! ## Architecture
//!
//! - **Input Models** ([`models`]) - Structures and topologies as read from disk
//! - **File I/O** ([`io`]) - Readers for `.gro`, `.top` and SMOG XML files and a DCD writer
//! - **Custom Expressions** ([`expression`]) - Parsing, differentiation and compilation of energy expressions
//! - **Forces** ([`forcefield`]) - Force containers and analytic potential kernels
//! - **Geometry** ([`utils`]) - Periodic distances and internal-coordinate gradients

pub mod expression;
pub mod forcefield;
pub mod io;
pub mod models;
pub mod utils;
