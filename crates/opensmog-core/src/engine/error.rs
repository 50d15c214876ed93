use thiserror::Error;

use crate::core::expression::ExpressionError;

/// Failures while turning loaded inputs into a simulated [`System`](crate::core::forcefield::forces::System).
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Nonbonded forces found, but PBC is off")]
    NonbondWithoutPbc,

    #[error("The coordinate file has {structure} atoms but the topology defines {topology}")]
    AtomCountMismatch { structure: usize, topology: usize },

    #[error("Atom type '{0}' is used in [ atoms ] but not defined in [ atomtypes ]")]
    UndefinedAtomType(String),

    #[error("Contact force '{force}' references atom {index}, but the system has {num_atoms} atoms")]
    AtomIndexOutOfRange {
        force: String,
        index: usize,
        num_atoms: usize,
    },

    #[error("Nonbonded parameter '{parameter}' is not defined for the atom type pair ({type1}, {type2})")]
    MissingTypePair {
        parameter: String,
        type1: String,
        type2: String,
    },

    #[error("Atom type '{atom_type}' of atom {atom} has no entry in nonbonded force {force}")]
    UnlistedAtomType {
        atom_type: String,
        atom: usize,
        force: usize,
    },

    #[error("Force group {0} exceeds the maximum of 31")]
    TooManyForceGroups(usize),

    #[error("Duplicate force name '{0}'")]
    DuplicateForce(String),

    #[error("Periodic boundary conditions require a rectangular box")]
    TriclinicBox,

    #[error("Invalid periodic box: every edge must be positive")]
    InvalidBox,

    #[error("The cutoff ({cutoff} nm) must not exceed half the smallest box edge ({half_edge} nm)")]
    CutoffTooLarge { cutoff: f64, half_edge: f64 },

    #[error("Invalid expression for force '{force}': {source}")]
    Expression {
        force: String,
        #[source]
        source: ExpressionError,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Platform '{0}' is not available in this build")]
    PlatformUnavailable(String),

    #[error("Expected {expected} {what}, found {found}")]
    ParticleCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Force '{force}' expects {expected} parameter values per entry, found {found}")]
    ParameterCountMismatch {
        force: String,
        expected: usize,
        found: usize,
    },

    #[error("Force '{force}' references particle {index}, but the system has {num_particles}")]
    ParticleIndexOutOfRange {
        force: String,
        index: usize,
        num_particles: usize,
    },

    #[error("Failed to prepare force '{force}': {source}")]
    Expression {
        force: String,
        #[source]
        source: ExpressionError,
    },

    #[error("Particle {0} has a non-positive mass")]
    InvalidMass(usize),

    #[error("Simulation became unstable: non-finite {0} at step {1}")]
    NonFinite(&'static str, u64),

    #[error("The Brownian integrator requires a positive collision rate")]
    BrownianWithoutFriction,
}
