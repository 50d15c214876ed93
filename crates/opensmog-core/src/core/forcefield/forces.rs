use crate::core::expression::{Discrete2DFunction, ExpressionError, RadialPotential, VariableLayout};
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonbondedMethod {
    #[default]
    NoCutoff,
    CutoffNonPeriodic,
    CutoffPeriodic,
}

impl NonbondedMethod {
    pub fn is_periodic(self) -> bool {
        self == Self::CutoffPeriodic
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicBondTerm {
    pub atoms: [usize; 2],
    /// Equilibrium length in nm.
    pub length: f64,
    /// Force constant in kJ/mol/nm².
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicAngleTerm {
    pub atoms: [usize; 3],
    /// Equilibrium angle in radians.
    pub angle: f64,
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicTorsionTerm {
    pub atoms: [usize; 4],
    pub periodicity: u32,
    /// Phase in radians.
    pub phase: f64,
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicImproperTerm {
    pub atoms: [usize; 4],
    pub phase: f64,
    pub k: f64,
}

/// Reaction-field electrostatics over all non-excluded pairs within the cutoff.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElectrostaticForce {
    pub charges: Vec<f64>,
    pub exclusions: Vec<(usize, usize)>,
    pub method: NonbondedMethod,
    pub cutoff: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomBond {
    pub atoms: [usize; 2],
    pub values: Vec<f64>,
}

/// A pair potential of `r` applied to an explicit list of atom pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomBondForce {
    pub expression: String,
    pub per_bond_parameters: Vec<String>,
    pub global_parameters: Vec<(String, f64)>,
    pub bonds: Vec<CustomBond>,
}

impl CustomBondForce {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn add_per_bond_parameter(&mut self, name: impl Into<String>) {
        self.per_bond_parameters.push(name.into());
    }

    pub fn add_global_parameter(&mut self, name: impl Into<String>, value: f64) {
        self.global_parameters.push((name.into(), value));
    }

    pub fn add_bond(&mut self, i: usize, j: usize, values: Vec<f64>) -> usize {
        self.bonds.push(CustomBond {
            atoms: [i, j],
            values,
        });
        self.bonds.len() - 1
    }

    /// Slots: `r`, then global parameters, then per-bond parameters.
    pub fn variable_layout(&self) -> VariableLayout {
        VariableLayout::new(
            std::iter::once("r")
                .chain(self.global_parameters.iter().map(|(name, _)| name.as_str()))
                .chain(self.per_bond_parameters.iter().map(String::as_str)),
        )
    }

    pub fn compile(&self) -> Result<RadialPotential, ExpressionError> {
        RadialPotential::compile(&self.expression, &self.variable_layout(), &[])
    }
}

/// A pair potential of `r` applied to every non-excluded pair of particles.
///
/// Per-particle parameters appear in the expression with suffixes `1` and
/// `2`, e.g. a parameter `q` is referenced as `q1` and `q2`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomNonbondedForce {
    pub expression: String,
    pub per_particle_parameters: Vec<String>,
    pub global_parameters: Vec<(String, f64)>,
    pub particles: Vec<Vec<f64>>,
    pub functions: Vec<(String, Discrete2DFunction)>,
    pub exclusions: Vec<(usize, usize)>,
    pub method: NonbondedMethod,
    pub cutoff: f64,
}

impl CustomNonbondedForce {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn add_per_particle_parameter(&mut self, name: impl Into<String>) {
        self.per_particle_parameters.push(name.into());
    }

    pub fn add_global_parameter(&mut self, name: impl Into<String>, value: f64) {
        self.global_parameters.push((name.into(), value));
    }

    pub fn add_particle(&mut self, values: Vec<f64>) -> usize {
        self.particles.push(values);
        self.particles.len() - 1
    }

    pub fn add_tabulated_function(&mut self, name: impl Into<String>, function: Discrete2DFunction) {
        self.functions.push((name.into(), function));
    }

    pub fn add_exclusion(&mut self, i: usize, j: usize) {
        self.exclusions.push((i.min(j), i.max(j)));
    }

    /// Slots: `r`, then global parameters, then every per-particle parameter
    /// with suffix `1`, then with suffix `2`.
    pub fn variable_layout(&self) -> VariableLayout {
        let mut layout = VariableLayout::new(
            std::iter::once("r")
                .chain(self.global_parameters.iter().map(|(name, _)| name.as_str())),
        );
        for suffix in ["1", "2"] {
            for name in &self.per_particle_parameters {
                layout.push(format!("{}{}", name, suffix));
            }
        }
        layout
    }

    pub fn compile(&self) -> Result<RadialPotential, ExpressionError> {
        RadialPotential::compile(&self.expression, &self.variable_layout(), &self.functions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForceKind {
    HarmonicBond(Vec<HarmonicBondTerm>),
    HarmonicAngle(Vec<HarmonicAngleTerm>),
    PeriodicTorsion(Vec<PeriodicTorsionTerm>),
    HarmonicImproper(Vec<HarmonicImproperTerm>),
    Electrostatic(ElectrostaticForce),
    CustomBond(CustomBondForce),
    CustomNonbonded(CustomNonbondedForce),
    /// Removes center-of-mass velocity every `frequency` steps.
    CmMotionRemover { frequency: usize },
}

impl ForceKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HarmonicBond(_) => "HarmonicBondForce",
            Self::HarmonicAngle(_) => "HarmonicAngleForce",
            Self::PeriodicTorsion(_) => "PeriodicTorsionForce",
            Self::HarmonicImproper(_) => "HarmonicImproperForce",
            Self::Electrostatic(_) => "ElectrostaticForce",
            Self::CustomBond(_) => "CustomBondForce",
            Self::CustomNonbonded(_) => "CustomNonbondedForce",
            Self::CmMotionRemover { .. } => "CMMotionRemover",
        }
    }

    /// Number of terms or particles the force acts on.
    pub fn size(&self) -> usize {
        match self {
            Self::HarmonicBond(terms) => terms.len(),
            Self::HarmonicAngle(terms) => terms.len(),
            Self::PeriodicTorsion(terms) => terms.len(),
            Self::HarmonicImproper(terms) => terms.len(),
            Self::Electrostatic(force) => force.charges.len(),
            Self::CustomBond(force) => force.bonds.len(),
            Self::CustomNonbonded(force) => force.particles.len(),
            Self::CmMotionRemover { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Force {
    pub name: String,
    /// Force group in `0..32`.
    pub group: usize,
    pub kind: ForceKind,
}

impl Force {
    pub fn new(name: impl Into<String>, group: usize, kind: ForceKind) -> Self {
        Self {
            name: name.into(),
            group,
            kind,
        }
    }
}

/// Particles and the forces acting on them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct System {
    masses: Vec<f64>,
    forces: Vec<Force>,
    /// Rectangular periodic cell edges in nm.
    box_vectors: Option<Vector3<f64>>,
}

impl System {
    pub fn new(masses: Vec<f64>) -> Self {
        Self {
            masses,
            ..Default::default()
        }
    }

    pub fn num_particles(&self) -> usize {
        self.masses.len()
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    pub fn box_vectors(&self) -> Option<&Vector3<f64>> {
        self.box_vectors.as_ref()
    }

    pub fn set_box_vectors(&mut self, box_vectors: Option<Vector3<f64>>) {
        self.box_vectors = box_vectors;
    }

    pub fn add_force(&mut self, force: Force) -> usize {
        self.forces.push(force);
        self.forces.len() - 1
    }

    pub fn remove_force(&mut self, index: usize) -> Option<Force> {
        (index < self.forces.len()).then(|| self.forces.remove(index))
    }

    pub fn force_by_name(&self, name: &str) -> Option<&Force> {
        self.forces.iter().find(|f| f.name == name)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.forces.iter().position(|f| f.name == name)
    }

    /// Frequency of the center-of-mass motion remover, if one is present.
    pub fn cm_motion_frequency(&self) -> Option<usize> {
        self.forces.iter().find_map(|f| match f.kind {
            ForceKind::CmMotionRemover { frequency } => Some(frequency),
            _ => None,
        })
    }

    pub fn uses_periodic_boundaries(&self) -> bool {
        self.forces.iter().any(|f| match &f.kind {
            ForceKind::Electrostatic(force) => force.method.is_periodic(),
            ForceKind::CustomNonbonded(force) => force.method.is_periodic(),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_with_forces() -> System {
        let mut system = System::new(vec![1.0; 3]);
        system.add_force(Force::new(
            "Bonds",
            2,
            ForceKind::HarmonicBond(vec![HarmonicBondTerm {
                atoms: [0, 1],
                length: 0.38,
                k: 2e4,
            }]),
        ));
        system.add_force(Force::new(
            "Remover",
            30,
            ForceKind::CmMotionRemover { frequency: 1 },
        ));
        system
    }

    #[test]
    fn forces_are_found_by_name() {
        let system = system_with_forces();
        assert_eq!(system.force_by_name("Bonds").map(|f| f.group), Some(2));
        assert_eq!(system.position_of("Remover"), Some(1));
        assert!(system.force_by_name("Angles").is_none());
        assert_eq!(system.cm_motion_frequency(), Some(1));
    }

    #[test]
    fn remove_force_shifts_later_forces() {
        let mut system = system_with_forces();
        let removed = system.remove_force(0).unwrap();
        assert_eq!(removed.name, "Bonds");
        assert_eq!(system.position_of("Remover"), Some(0));
        assert!(system.remove_force(5).is_none());
    }

    #[test]
    fn periodicity_follows_nonbonded_methods() {
        let mut system = system_with_forces();
        assert!(!system.uses_periodic_boundaries());
        let mut force = CustomNonbondedForce::new("1/r^12");
        force.method = NonbondedMethod::CutoffPeriodic;
        force.add_exclusion(2, 0);
        assert_eq!(force.exclusions, vec![(0, 2)]);
        system.add_force(Force::new("Nonbonded0", 5, ForceKind::CustomNonbonded(force)));
        assert!(system.uses_periodic_boundaries());
    }

    #[test]
    fn custom_bond_force_records_parameters_in_order() {
        let mut force = CustomBondForce::new("A/r^12-B/r^10");
        force.add_per_bond_parameter("A");
        force.add_per_bond_parameter("B");
        force.add_global_parameter("eps", 1.0);
        assert_eq!(force.add_bond(0, 3, vec![1.0, 2.0]), 0);
        assert_eq!(force.per_bond_parameters, vec!["A", "B"]);
        assert_eq!(force.bonds[0].atoms, [0, 3]);
        assert_eq!(
            force.variable_layout().names(),
            &["r".to_string(), "eps".into(), "A".into(), "B".into()]
        );
        assert!(force.compile().is_ok());
        assert_eq!(ForceKind::CustomBond(force).size(), 1);
    }

    #[test]
    fn custom_nonbonded_layout_suffixes_particle_parameters() {
        let mut force = CustomNonbondedForce::new("q1*q2/r + eps(type1,type2)/r^12");
        force.add_per_particle_parameter("q");
        force.add_per_particle_parameter("type");
        force.add_global_parameter("r_c", 3.0);
        let layout = force.variable_layout();
        assert_eq!(layout.slot("q1"), Some(2));
        assert_eq!(layout.slot("type2"), Some(5));

        assert!(force.compile().is_err());
        force.add_tabulated_function(
            "eps",
            Discrete2DFunction::new(1, 1, vec![1.0]).unwrap(),
        );
        assert!(force.compile().is_ok());
    }
}
