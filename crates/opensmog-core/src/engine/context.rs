use super::error::EngineError;
use super::integrators::{Integrator, gaussian_vector};
use super::neighbor::{DEFAULT_SKIN, NeighborList};
use super::platform::{PlatformConfig, PlatformKind};
use crate::core::expression::{ExpressionError, RadialPotential};
use crate::core::forcefield::forces::{
    CustomBond, Force, ForceKind, HarmonicAngleTerm, HarmonicBondTerm, HarmonicImproperTerm,
    NonbondedMethod, PeriodicTorsionTerm, System,
};
use crate::core::forcefield::potentials::{self, ReactionField};
use crate::core::forcefield::units::BOLTZMANN;
use crate::core::utils::geometry::{
    angle_with_gradient, dihedral_with_gradient, mass_weighted_center, minimum_image,
};
use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Snapshot of a simulation at one step.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub step: u64,
    /// ps
    pub time: f64,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub forces: Vec<Vector3<f64>>,
    /// kJ/mol
    pub potential_energy: f64,
    /// kJ/mol
    pub kinetic_energy: f64,
    /// K
    pub temperature: f64,
    /// Potential energy of each force group, kJ/mol.
    pub group_energies: BTreeMap<usize, f64>,
    pub box_vectors: Option<Vector3<f64>>,
}

impl State {
    pub fn total_energy(&self) -> f64 {
        self.potential_energy + self.kinetic_energy
    }

    pub fn group_energy(&self, group: usize) -> f64 {
        self.group_energies.get(&group).copied().unwrap_or(0.0)
    }
}

struct Accumulator {
    energy: f64,
    forces: Vec<Vector3<f64>>,
}

impl Accumulator {
    fn new(num_particles: usize) -> Self {
        Self {
            energy: 0.0,
            forces: vec![Vector3::zeros(); num_particles],
        }
    }

    /// Adds a radial term with `delta = x_i - x_j` and derivative `de_dr`.
    #[inline]
    fn add_radial(&mut self, i: usize, j: usize, energy: f64, de_dr: f64, delta: &Vector3<f64>, r: f64) {
        self.energy += energy;
        let force = delta * (-de_dr / r);
        self.forces[i] += force;
        self.forces[j] -= force;
    }

    fn merge(mut self, other: Self) -> Self {
        self.energy += other.energy;
        for (a, b) in self.forces.iter_mut().zip(other.forces) {
            *a += b;
        }
        self
    }
}

/// Folds `term` over `items`, in parallel when requested. Each worker owns
/// a private copy of the `template` scratch slots.
fn accumulate<T, F>(
    items: &[T],
    num_particles: usize,
    template: &[f64],
    parallel: bool,
    term: F,
) -> Result<Accumulator, ExpressionError>
where
    T: Sync,
    F: Fn(&T, &mut Accumulator, &mut [f64]) -> Result<(), ExpressionError> + Sync + Send,
{
    let identity = || (Accumulator::new(num_particles), template.to_vec());
    let fold = |(mut acc, mut scratch): (Accumulator, Vec<f64>), item: &T| {
        term(item, &mut acc, &mut scratch)?;
        Ok::<_, ExpressionError>((acc, scratch))
    };

    #[cfg(feature = "parallel")]
    {
        if parallel {
            return items
                .par_iter()
                .try_fold(identity, fold)
                .map(|partial| partial.map(|(acc, _)| acc))
                .try_reduce(|| Accumulator::new(num_particles), |a, b| Ok(a.merge(b)));
        }
    }

    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    items
        .iter()
        .try_fold(identity(), fold)
        .map(|(acc, _)| acc)
}

enum Kernel {
    Bonds(Vec<HarmonicBondTerm>),
    Angles(Vec<HarmonicAngleTerm>),
    Torsions(Vec<PeriodicTorsionTerm>),
    Impropers(Vec<HarmonicImproperTerm>),
    Electrostatic {
        charges: Vec<f64>,
        /// `None` for plain Coulomb without a cutoff.
        field: Option<ReactionField>,
        neighbors: NeighborList,
    },
    CustomBond {
        potential: RadialPotential,
        bonds: Vec<CustomBond>,
        template: Vec<f64>,
        first_parameter: usize,
    },
    CustomNonbonded {
        potential: RadialPotential,
        particles: Vec<Vec<f64>>,
        template: Vec<f64>,
        first_parameter: usize,
        neighbors: NeighborList,
    },
}

struct CompiledForce {
    name: String,
    group: usize,
    kernel: Kernel,
}

fn global_template(len: usize, globals: &[(String, f64)]) -> Vec<f64> {
    let mut template = vec![0.0; len];
    for (slot, (_, value)) in template.iter_mut().skip(1).zip(globals) {
        *slot = *value;
    }
    template
}

fn nonbonded_cutoff(method: NonbondedMethod, cutoff: f64) -> f64 {
    match method {
        NonbondedMethod::NoCutoff => f64::INFINITY,
        _ => cutoff,
    }
}

impl CompiledForce {
    fn compile(force: &Force, num_particles: usize) -> Result<Option<Self>, EngineError> {
        let out_of_range = |index: usize| EngineError::ParticleIndexOutOfRange {
            force: force.name.clone(),
            index,
            num_particles,
        };
        let check = |atoms: &[usize]| match atoms.iter().find(|&&a| a >= num_particles) {
            Some(&index) => Err(out_of_range(index)),
            None => Ok(()),
        };
        let check_count = |found: usize| {
            if found == num_particles {
                Ok(())
            } else {
                Err(EngineError::ParticleCountMismatch {
                    what: "per-particle entries",
                    expected: num_particles,
                    found,
                })
            }
        };
        let check_values = |expected: usize, found: usize| {
            if found == expected {
                Ok(())
            } else {
                Err(EngineError::ParameterCountMismatch {
                    force: force.name.clone(),
                    expected,
                    found,
                })
            }
        };
        let expression_error = |source| EngineError::Expression {
            force: force.name.clone(),
            source,
        };

        let kernel = match &force.kind {
            ForceKind::HarmonicBond(terms) => {
                terms.iter().try_for_each(|t| check(&t.atoms))?;
                Kernel::Bonds(terms.clone())
            }
            ForceKind::HarmonicAngle(terms) => {
                terms.iter().try_for_each(|t| check(&t.atoms))?;
                Kernel::Angles(terms.clone())
            }
            ForceKind::PeriodicTorsion(terms) => {
                terms.iter().try_for_each(|t| check(&t.atoms))?;
                Kernel::Torsions(terms.clone())
            }
            ForceKind::HarmonicImproper(terms) => {
                terms.iter().try_for_each(|t| check(&t.atoms))?;
                Kernel::Impropers(terms.clone())
            }
            ForceKind::Electrostatic(electrostatic) => {
                check_count(electrostatic.charges.len())?;
                let cutoff = nonbonded_cutoff(electrostatic.method, electrostatic.cutoff);
                Kernel::Electrostatic {
                    charges: electrostatic.charges.clone(),
                    field: (electrostatic.method != NonbondedMethod::NoCutoff)
                        .then(|| ReactionField::new(electrostatic.cutoff)),
                    neighbors: NeighborList::new(cutoff, DEFAULT_SKIN, &electrostatic.exclusions),
                }
            }
            ForceKind::CustomBond(custom) => {
                custom.bonds.iter().try_for_each(|b| {
                    check(&b.atoms)?;
                    check_values(custom.per_bond_parameters.len(), b.values.len())
                })?;
                let potential = custom.compile().map_err(expression_error)?;
                Kernel::CustomBond {
                    potential,
                    bonds: custom.bonds.clone(),
                    template: global_template(
                        custom.variable_layout().len(),
                        &custom.global_parameters,
                    ),
                    first_parameter: 1 + custom.global_parameters.len(),
                }
            }
            ForceKind::CustomNonbonded(custom) => {
                check_count(custom.particles.len())?;
                custom
                    .particles
                    .iter()
                    .try_for_each(|p| check_values(custom.per_particle_parameters.len(), p.len()))?;
                let potential = custom.compile().map_err(expression_error)?;
                let cutoff = nonbonded_cutoff(custom.method, custom.cutoff);
                Kernel::CustomNonbonded {
                    potential,
                    particles: custom.particles.clone(),
                    template: global_template(
                        custom.variable_layout().len(),
                        &custom.global_parameters,
                    ),
                    first_parameter: 1 + custom.global_parameters.len(),
                    neighbors: NeighborList::new(cutoff, DEFAULT_SKIN, &custom.exclusions),
                }
            }
            ForceKind::CmMotionRemover { .. } => return Ok(None),
        };

        Ok(Some(Self {
            name: force.name.clone(),
            group: force.group,
            kernel,
        }))
    }

    fn evaluate(
        &mut self,
        positions: &[Vector3<f64>],
        cell: Option<&Vector3<f64>>,
        parallel: bool,
    ) -> Result<Accumulator, ExpressionError> {
        let n = positions.len();
        match &mut self.kernel {
            Kernel::Bonds(terms) => accumulate(terms, n, &[], parallel, |t, acc, _| {
                let [i, j] = t.atoms;
                let delta = minimum_image(positions[i] - positions[j], cell);
                let r = delta.norm();
                let (energy, de_dr) = potentials::harmonic(r, t.length, t.k);
                if r > 0.0 {
                    acc.add_radial(i, j, energy, de_dr, &delta, r);
                } else {
                    acc.energy += energy;
                }
                Ok(())
            }),
            Kernel::Angles(terms) => accumulate(terms, n, &[], parallel, |t, acc, _| {
                let [i, j, k] = t.atoms;
                let (theta, gradient) =
                    angle_with_gradient(&positions[i], &positions[j], &positions[k], cell);
                let (energy, de) = potentials::harmonic(theta, t.angle, t.k);
                acc.energy += energy;
                for (atom, g) in t.atoms.iter().zip(gradient) {
                    acc.forces[*atom] -= g * de;
                }
                Ok(())
            }),
            Kernel::Torsions(terms) => accumulate(terms, n, &[], parallel, |t, acc, _| {
                let [i, j, k, l] = t.atoms;
                let (phi, gradient) = dihedral_with_gradient(
                    &positions[i],
                    &positions[j],
                    &positions[k],
                    &positions[l],
                    cell,
                );
                let (energy, de) =
                    potentials::periodic_torsion(phi, t.phase, t.k, f64::from(t.periodicity));
                acc.energy += energy;
                for (atom, g) in t.atoms.iter().zip(gradient) {
                    acc.forces[*atom] -= g * de;
                }
                Ok(())
            }),
            Kernel::Impropers(terms) => accumulate(terms, n, &[], parallel, |t, acc, _| {
                let [i, j, k, l] = t.atoms;
                let (phi, gradient) = dihedral_with_gradient(
                    &positions[i],
                    &positions[j],
                    &positions[k],
                    &positions[l],
                    cell,
                );
                let (energy, de) = potentials::harmonic_improper(phi, t.phase, t.k);
                acc.energy += energy;
                for (atom, g) in t.atoms.iter().zip(gradient) {
                    acc.forces[*atom] -= g * de;
                }
                Ok(())
            }),
            Kernel::Electrostatic {
                charges,
                field,
                neighbors,
            } => {
                neighbors.update(positions, cell, parallel);
                let cutoff2 = neighbors.cutoff().powi(2);
                let charges = &*charges;
                let field = *field;
                accumulate(neighbors.pairs(), n, &[], parallel, |&(i, j), acc, _| {
                    let qq = charges[i] * charges[j];
                    if qq == 0.0 {
                        return Ok(());
                    }
                    let delta = minimum_image(positions[i] - positions[j], cell);
                    let r2 = delta.norm_squared();
                    if r2 < cutoff2 {
                        let r = r2.sqrt();
                        let (energy, de_dr) = match field {
                            Some(field) => field.pair(r, qq),
                            None => potentials::coulomb(r, qq),
                        };
                        acc.add_radial(i, j, energy, de_dr, &delta, r);
                    }
                    Ok(())
                })
            }
            Kernel::CustomBond {
                potential,
                bonds,
                template,
                first_parameter,
            } => {
                let potential = &*potential;
                let first = *first_parameter;
                accumulate(bonds, n, template, parallel, |bond, acc, slots| {
                    let [i, j] = bond.atoms;
                    let delta = minimum_image(positions[i] - positions[j], cell);
                    let r = delta.norm();
                    slots[potential.r_slot()] = r;
                    slots[first..first + bond.values.len()].copy_from_slice(&bond.values);
                    let (energy, de_dr) = potential.evaluate(slots)?;
                    if r > 0.0 {
                        acc.add_radial(i, j, energy, de_dr, &delta, r);
                    } else {
                        acc.energy += energy;
                    }
                    Ok(())
                })
            }
            Kernel::CustomNonbonded {
                potential,
                particles,
                template,
                first_parameter,
                neighbors,
            } => {
                neighbors.update(positions, cell, parallel);
                let cutoff2 = neighbors.cutoff().powi(2);
                let potential = &*potential;
                let particles = &*particles;
                let first = *first_parameter;
                let width = particles.first().map_or(0, Vec::len);
                accumulate(neighbors.pairs(), n, template, parallel, |&(i, j), acc, slots| {
                    let delta = minimum_image(positions[i] - positions[j], cell);
                    let r2 = delta.norm_squared();
                    if r2 >= cutoff2 {
                        return Ok(());
                    }
                    let r = r2.sqrt();
                    slots[potential.r_slot()] = r;
                    slots[first..first + width].copy_from_slice(&particles[i]);
                    slots[first + width..first + 2 * width].copy_from_slice(&particles[j]);
                    let (energy, de_dr) = potential.evaluate(slots)?;
                    acc.add_radial(i, j, energy, de_dr, &delta, r);
                    Ok(())
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Evaluation {
    forces: Vec<Vector3<f64>>,
    group_energies: BTreeMap<usize, f64>,
}

impl Evaluation {
    fn potential_energy(&self) -> f64 {
        self.group_energies.values().sum()
    }
}

/// A system bound to an integrator and a platform, with its dynamic state.
pub struct Context {
    system: System,
    platform: PlatformConfig,
    integrator: Integrator,
    forces: Vec<CompiledForce>,
    inverse_masses: Vec<f64>,
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
    step: u64,
    rng: StdRng,
    cached: Option<Evaluation>,
}

impl Context {
    /// Binds `system` to an integrator on `platform`. Without a `seed` the
    /// random stream is seeded from the operating system.
    pub fn new(
        system: System,
        integrator: Integrator,
        platform: PlatformConfig,
        seed: Option<u64>,
    ) -> Result<Self, EngineError> {
        platform.ensure_available()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let n = system.num_particles();
        let inverse_masses = system
            .masses()
            .iter()
            .enumerate()
            .map(|(i, &m)| {
                if m > 0.0 {
                    Ok(1.0 / m)
                } else {
                    Err(EngineError::InvalidMass(i))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut forces = Vec::new();
        for force in system.forces() {
            if let Some(compiled) = CompiledForce::compile(force, n)? {
                debug!(
                    "Prepared {} '{}' ({} terms) in group {}",
                    force.kind.label(),
                    compiled.name,
                    force.kind.size(),
                    compiled.group
                );
                forces.push(compiled);
            }
        }
        info!(
            "Using platform {} with the {} integrator",
            platform.kind, integrator.kind()
        );

        Ok(Self {
            system,
            platform,
            integrator,
            forces,
            inverse_masses,
            positions: vec![Vector3::zeros(); n],
            velocities: vec![Vector3::zeros(); n],
            step: 0,
            rng,
            cached: None,
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn platform(&self) -> &PlatformConfig {
        &self.platform
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    pub fn current_step(&self) -> u64 {
        self.step
    }

    pub fn time(&self) -> f64 {
        self.step as f64 * self.integrator.time_step()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vector3<f64>] {
        &self.velocities
    }

    fn parallel(&self) -> bool {
        self.platform.kind != PlatformKind::Reference
    }

    fn check_len(&self, what: &'static str, found: usize) -> Result<(), EngineError> {
        let expected = self.system.num_particles();
        if found == expected {
            Ok(())
        } else {
            Err(EngineError::ParticleCountMismatch {
                what,
                expected,
                found,
            })
        }
    }

    pub fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), EngineError> {
        self.check_len("positions", positions.len())?;
        self.positions = positions.to_vec();
        self.cached = None;
        Ok(())
    }

    pub fn set_velocities(&mut self, velocities: &[Vector3<f64>]) -> Result<(), EngineError> {
        self.check_len("velocities", velocities.len())?;
        self.velocities = velocities.to_vec();
        Ok(())
    }

    /// Draws velocities from the Maxwell-Boltzmann distribution at `kelvin`
    /// and removes the center-of-mass velocity.
    pub fn set_velocities_to_temperature(&mut self, kelvin: f64) {
        let kt = BOLTZMANN * kelvin;
        for (v, inv_m) in self.velocities.iter_mut().zip(&self.inverse_masses) {
            *v = gaussian_vector(&mut self.rng) * (kt * inv_m).sqrt();
        }
        self.remove_center_of_mass_motion();
    }

    fn remove_center_of_mass_motion(&mut self) {
        let center = mass_weighted_center(&self.velocities, self.system.masses());
        for v in &mut self.velocities {
            *v -= center;
        }
    }

    /// Degrees of freedom used for the instantaneous temperature.
    pub fn degrees_of_freedom(&self) -> usize {
        let n = 3 * self.system.num_particles();
        if self.system.cm_motion_frequency().is_some() {
            n.saturating_sub(3)
        } else {
            n
        }
    }

    fn evaluate(&mut self) -> Result<&Evaluation, EngineError> {
        if self.cached.is_none() {
            let parallel = self.parallel();
            let cell = self.system.box_vectors().copied();
            let n = self.positions.len();
            let mut forces = vec![Vector3::zeros(); n];
            let mut group_energies = BTreeMap::new();
            for force in &mut self.forces {
                let partial = force
                    .evaluate(&self.positions, cell.as_ref(), parallel)
                    .map_err(|source| EngineError::Expression {
                        force: force.name.clone(),
                        source,
                    })?;
                *group_energies.entry(force.group).or_insert(0.0) += partial.energy;
                for (total, f) in forces.iter_mut().zip(partial.forces) {
                    *total += f;
                }
            }
            if forces.iter().any(|f| !f.iter().all(|c| c.is_finite())) {
                return Err(EngineError::NonFinite("forces", self.step));
            }
            self.cached = Some(Evaluation {
                forces,
                group_energies,
            });
        }
        self.cached
            .as_ref()
            .ok_or(EngineError::NonFinite("forces", self.step))
    }

    fn kinetic_energy(&self, forces: &[Vector3<f64>]) -> f64 {
        let half_step = if self.integrator.is_leapfrog() {
            0.5 * self.integrator.time_step()
        } else {
            0.0
        };
        self.velocities
            .iter()
            .zip(forces)
            .zip(self.system.masses())
            .map(|((v, f), &m)| {
                let v = v + f * (half_step / m);
                0.5 * m * v.norm_squared()
            })
            .sum()
    }

    pub fn potential_energy(&mut self) -> Result<f64, EngineError> {
        Ok(self.evaluate()?.potential_energy())
    }

    pub fn state(&mut self) -> Result<State, EngineError> {
        let evaluation = self.evaluate()?.clone();
        let kinetic_energy = self.kinetic_energy(&evaluation.forces);
        let dof = self.degrees_of_freedom();
        let temperature = if dof > 0 {
            2.0 * kinetic_energy / (dof as f64 * BOLTZMANN)
        } else {
            0.0
        };
        Ok(State {
            step: self.step,
            time: self.time(),
            positions: self.positions.clone(),
            velocities: self.velocities.clone(),
            potential_energy: evaluation.potential_energy(),
            kinetic_energy,
            temperature,
            group_energies: evaluation.group_energies,
            forces: evaluation.forces,
            box_vectors: self.system.box_vectors().copied(),
        })
    }

    #[instrument(level = "debug", skip(self), fields(from = self.step))]
    pub fn step(&mut self, steps: u64) -> Result<(), EngineError> {
        let cm_frequency = self.system.cm_motion_frequency().filter(|f| *f > 0);
        for _ in 0..steps {
            if let Some(frequency) = cm_frequency {
                if self.step % frequency as u64 == 0 {
                    self.remove_center_of_mass_motion();
                }
            }
            let forces = self.evaluate()?.forces.clone();
            self.integrator.advance(
                &mut self.positions,
                &mut self.velocities,
                &forces,
                &self.inverse_masses,
                &mut self.rng,
            );
            self.cached = None;
            self.step += 1;
            if self.positions.iter().any(|x| !x.iter().all(|c| c.is_finite())) {
                return Err(EngineError::NonFinite("positions", self.step));
            }
        }
        Ok(())
    }
}
