use super::config::SimulationConfig;
use super::error::AssemblyError;
use crate::core::expression::Discrete2DFunction;
use crate::core::forcefield::forces::{
    CustomBondForce, CustomNonbondedForce, ElectrostaticForce, Force, ForceKind,
    HarmonicAngleTerm, HarmonicBondTerm, HarmonicImproperTerm, NonbondedMethod,
    PeriodicTorsionTerm, System,
};
use crate::core::io::smog_xml::{ContactGroup, NonbondGroup, SmogForces};
use crate::core::models::structure::Structure;
use crate::core::models::topology::{MoleculeType, Topology};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, info};

pub const ELECTROSTATIC_FORCE: &str = "electrostatic";
pub const NON_CONTACTS_FORCE: &str = "Non-Contacts";
pub const BONDS_FORCE: &str = "Bonds";
pub const ANGLES_FORCE: &str = "Angles";
pub const DIHEDRALS_FORCE: &str = "Dihedrals";
pub const IMPROPERS_FORCE: &str = "Impropers";

/// Group shared by forces that are not reported individually.
pub const AUXILIARY_GROUP: usize = 30;
pub const MAX_FORCE_GROUP: usize = 31;

const DEFAULT_NONBONDED_EXPRESSION: &str = "acoef(type1,type2)/r^12 - bcoef(type1,type2)/r^6";
const PAIR_EXPRESSION: &str = "c12/r^12 - c6/r^6";

/// Whether the topology describes a coarse-grained or an all-atom model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    CAlpha,
    AllAtom,
}

/// The assembled system with the registry of individually reported forces.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    pub system: System,
    /// `(name, group)` of every named force, in creation order.
    pub force_names: Vec<(String, usize)>,
    pub model: ModelKind,
}

impl AssembledSystem {
    pub fn group_of(&self, name: &str) -> Option<usize> {
        self.force_names
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, group)| *group)
    }
}

/// Builds a [`System`] from a structure, its topology and the custom forces
/// of a SMOG XML file.
pub struct SystemAssembler<'a> {
    structure: &'a Structure,
    topology: &'a Topology,
    custom: &'a SmogForces,
    config: &'a SimulationConfig,
}

impl<'a> SystemAssembler<'a> {
    pub fn new(
        structure: &'a Structure,
        topology: &'a Topology,
        custom: &'a SmogForces,
        config: &'a SimulationConfig,
    ) -> Self {
        Self {
            structure,
            topology,
            custom,
            config,
        }
    }

    pub fn assemble(&self) -> Result<AssembledSystem, AssemblyError> {
        let num_atoms = self.topology.num_atoms();
        if self.structure.num_atoms() != num_atoms {
            return Err(AssemblyError::AtomCountMismatch {
                structure: self.structure.num_atoms(),
                topology: num_atoms,
            });
        }

        let mut builder = self.default_forces()?;
        for group in &self.custom.contacts {
            builder.add_contacts(group)?;
        }

        if self.custom.has_nonbond() {
            if !self.config.pbc {
                return Err(AssemblyError::NonbondWithoutPbc);
            }
            for group in &self.custom.nonbond {
                builder.add_nonbond(group, self.topology)?;
            }
            builder.remove_named(ELECTROSTATIC_FORCE);
            builder.remove_named(NON_CONTACTS_FORCE);
        }

        Ok(builder.finish())
    }

    fn cell(&self) -> Result<Option<nalgebra::Vector3<f64>>, AssemblyError> {
        if !self.config.pbc {
            return Ok(None);
        }
        let box_vectors = &self.structure.box_vectors;
        if !box_vectors.is_rectangular() {
            return Err(AssemblyError::TriclinicBox);
        }
        let cell = box_vectors.diagonal();
        if cell.iter().any(|edge| *edge <= 0.0) {
            return Err(AssemblyError::InvalidBox);
        }
        let half_edge = 0.5 * cell.min();
        if self.config.r_cutoff > half_edge {
            return Err(AssemblyError::CutoffTooLarge {
                cutoff: self.config.r_cutoff,
                half_edge,
            });
        }
        Ok(Some(cell))
    }

    fn default_forces(&self) -> Result<ForceBuilder, AssemblyError> {
        let topology = self.topology;
        let atoms = topology.expanded_atoms();
        let method = if self.config.pbc {
            info!("This simulation will use Periodic boundary conditions");
            NonbondedMethod::CutoffPeriodic
        } else {
            info!("This simulation will not use Periodic boundary conditions");
            NonbondedMethod::CutoffNonPeriodic
        };

        let mut system = System::new(atoms.iter().map(|a| a.atom.mass).collect());
        system.set_box_vectors(self.cell()?);

        let exclusions = system_exclusions(topology);
        debug!("{} excluded pairs", exclusions.len());

        let electrostatic = ElectrostaticForce {
            charges: atoms.iter().map(|a| a.atom.charge).collect(),
            exclusions: exclusions.clone(),
            method,
            cutoff: self.config.r_cutoff,
        };

        let type_indices = topology.atom_type_indices();
        let mut default_nonbonded = CustomNonbondedForce::new(DEFAULT_NONBONDED_EXPRESSION);
        default_nonbonded.add_per_particle_parameter("type");
        let (acoef, bcoef) = lennard_jones_tables(topology)?;
        default_nonbonded.add_tabulated_function("acoef", acoef);
        default_nonbonded.add_tabulated_function("bcoef", bcoef);
        for atom in &atoms {
            let index = type_indices
                .get(atom.atom.atom_type.as_str())
                .ok_or_else(|| AssemblyError::UndefinedAtomType(atom.atom.atom_type.clone()))?;
            default_nonbonded.add_particle(vec![*index as f64]);
        }
        default_nonbonded.exclusions = exclusions;
        default_nonbonded.method = method;
        default_nonbonded.cutoff = self.config.r_cutoff;

        let mut bonds = Vec::new();
        let mut angles = Vec::new();
        let mut torsions = Vec::new();
        let mut impropers = Vec::new();
        let mut pairs = CustomBondForce::new(PAIR_EXPRESSION);
        pairs.add_per_bond_parameter("c6");
        pairs.add_per_bond_parameter("c12");
        let rule = topology.defaults.combination_rule;

        for (molecule, offset) in topology.molecule_instances() {
            let global = |i: usize| i + offset;
            for bond in &molecule.bonds {
                bonds.push(HarmonicBondTerm {
                    atoms: bond.atoms.map(global),
                    length: bond.params[0],
                    k: bond.params[1],
                });
            }
            for angle in &molecule.angles {
                angles.push(HarmonicAngleTerm {
                    atoms: angle.atoms.map(global),
                    angle: angle.params[0].to_radians(),
                    k: angle.params[1],
                });
            }
            for dihedral in &molecule.dihedrals {
                let atoms = dihedral.atoms.map(global);
                if dihedral.function == 2 {
                    impropers.push(HarmonicImproperTerm {
                        atoms,
                        phase: dihedral.params[0].to_radians(),
                        k: dihedral.params[1],
                    });
                } else {
                    torsions.push(PeriodicTorsionTerm {
                        atoms,
                        periodicity: dihedral.params[2].round().max(0.0) as u32,
                        phase: dihedral.params[0].to_radians(),
                        k: dihedral.params[1],
                    });
                }
            }
            for pair in &molecule.pairs {
                let (c6, c12) = rule.pair_to_c6_c12(pair.params[0], pair.params[1]);
                let [i, j] = pair.atoms.map(global);
                pairs.add_bond(i, j, vec![c6, c12]);
            }
        }

        let model = if impropers.is_empty() {
            ModelKind::CAlpha
        } else {
            ModelKind::AllAtom
        };

        let mut builder = ForceBuilder {
            system,
            force_names: Vec::new(),
            next_group: 0,
            num_atoms: atoms.len(),
            constants: self.custom.constants.clone(),
            cutoff: self.config.r_cutoff,
            model,
        };
        builder.add_named(ELECTROSTATIC_FORCE, ForceKind::Electrostatic(electrostatic))?;
        builder.add_named(NON_CONTACTS_FORCE, ForceKind::CustomNonbonded(default_nonbonded))?;
        builder.add_named(BONDS_FORCE, ForceKind::HarmonicBond(bonds))?;
        builder.add_named(ANGLES_FORCE, ForceKind::HarmonicAngle(angles))?;
        builder.add_named(DIHEDRALS_FORCE, ForceKind::PeriodicTorsion(torsions))?;
        if model == ModelKind::AllAtom {
            builder.add_named(IMPROPERS_FORCE, ForceKind::HarmonicImproper(impropers))?;
        }
        if !pairs.bonds.is_empty() {
            builder.add_auxiliary("Pairs", ForceKind::CustomBond(pairs));
        }
        if self.config.remove_cm_motion {
            builder.add_auxiliary(
                "CMMotionRemover",
                ForceKind::CmMotionRemover { frequency: 1 },
            );
        }
        Ok(builder)
    }
}

struct ForceBuilder {
    system: System,
    force_names: Vec<(String, usize)>,
    next_group: usize,
    num_atoms: usize,
    constants: Vec<(String, f64)>,
    cutoff: f64,
    model: ModelKind,
}

impl ForceBuilder {
    /// Adds a force in the next free group and registers its name.
    fn add_named(&mut self, name: &str, kind: ForceKind) -> Result<usize, AssemblyError> {
        if self.force_names.iter().any(|(n, _)| n == name) {
            return Err(AssemblyError::DuplicateForce(name.to_string()));
        }
        let group = self.next_group;
        if group > MAX_FORCE_GROUP {
            return Err(AssemblyError::TooManyForceGroups(group));
        }
        self.system.add_force(Force::new(name, group, kind));
        self.force_names.push((name.to_string(), group));
        self.next_group += 1;
        Ok(group)
    }

    fn add_auxiliary(&mut self, name: &str, kind: ForceKind) {
        self.system.add_force(Force::new(name, AUXILIARY_GROUP, kind));
    }

    fn remove_named(&mut self, name: &str) {
        if let Some(index) = self.system.position_of(name) {
            self.system.remove_force(index);
        }
        self.force_names.retain(|(n, _)| n != name);
    }

    fn add_contacts(&mut self, contacts: &ContactGroup) -> Result<(), AssemblyError> {
        info!("Creating Contacts force {} from xml file", contacts.name);

        let mut force = CustomBondForce::new(contacts.expression.as_str());
        for parameter in &contacts.parameters {
            force.add_per_bond_parameter(parameter.as_str());
        }
        for (name, value) in &self.constants {
            force.add_global_parameter(name.as_str(), *value);
        }
        for interaction in &contacts.interactions {
            let [i, j] = [interaction.i, interaction.j].map(|index| {
                if index > self.num_atoms {
                    Err(AssemblyError::AtomIndexOutOfRange {
                        force: contacts.name.clone(),
                        index,
                        num_atoms: self.num_atoms,
                    })
                } else {
                    Ok(index - 1)
                }
            });
            force.add_bond(i?, j?, interaction.values.clone());
        }
        force.compile().map_err(|source| AssemblyError::Expression {
            force: contacts.name.clone(),
            source,
        })?;

        let group = self.add_named(&contacts.name, ForceKind::CustomBond(force))?;
        debug!(
            "Contacts force {} has {} interactions in group {}",
            contacts.name,
            contacts.interactions.len(),
            group
        );
        Ok(())
    }

    fn add_nonbond(&mut self, nonbond: &NonbondGroup, topology: &Topology) -> Result<(), AssemblyError> {
        let name = format!("Nonbonded{}", nonbond.index);
        info!("Creating Nonbonded force {} from xml file", name);

        let mut force = CustomNonbondedForce::new(nonbond.expression.as_str());
        force.add_per_particle_parameter("q");
        force.add_per_particle_parameter("type");
        for (constant, value) in &self.constants {
            force.add_global_parameter(constant.as_str(), *value);
        }
        force.add_global_parameter("r_c", self.cutoff);

        let types = unique_types(nonbond);
        for (position, parameter) in nonbond.parameters.iter().enumerate() {
            force.add_tabulated_function(
                parameter.as_str(),
                type_pair_table(nonbond, &types, position, parameter)?,
            );
        }

        for (atom_index, atom) in topology.expanded_atoms().iter().enumerate() {
            let type_index = types
                .iter()
                .position(|t| *t == atom.atom.atom_type)
                .ok_or_else(|| AssemblyError::UnlistedAtomType {
                    atom_type: atom.atom.atom_type.clone(),
                    atom: atom_index + 1,
                    force: nonbond.index,
                })?;
            force.add_particle(vec![atom.atom.charge, type_index as f64]);
        }

        if let Some(Force {
            kind: ForceKind::CustomNonbonded(default),
            ..
        }) = self.system.force_by_name(NON_CONTACTS_FORCE)
        {
            force.exclusions = default.exclusions.clone();
        }
        force.method = NonbondedMethod::CutoffPeriodic;
        force.cutoff = self.cutoff;

        force.compile().map_err(|source| AssemblyError::Expression {
            force: name.clone(),
            source,
        })?;
        self.add_named(&name, ForceKind::CustomNonbonded(force))?;
        Ok(())
    }

    fn finish(self) -> AssembledSystem {
        AssembledSystem {
            system: self.system,
            force_names: self.force_names,
            model: self.model,
        }
    }
}

/// Sorted atom type labels appearing in either column of the pair list.
fn unique_types(nonbond: &NonbondGroup) -> Vec<String> {
    nonbond
        .pairs
        .iter()
        .flat_map(|p| [p.type1.clone(), p.type2.clone()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn type_pair_table(
    nonbond: &NonbondGroup,
    types: &[String],
    position: usize,
    parameter: &str,
) -> Result<Discrete2DFunction, AssemblyError> {
    let n = types.len();
    let mut values: Vec<Option<f64>> = vec![None; n * n];
    for pair in &nonbond.pairs {
        let a = types.iter().position(|t| *t == pair.type1);
        let b = types.iter().position(|t| *t == pair.type2);
        if let (Some(a), Some(b)) = (a, b) {
            let value = pair.values[position];
            values[a + n * b] = Some(value);
            values[b + n * a] = Some(value);
        }
    }
    let values = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            value.ok_or_else(|| AssemblyError::MissingTypePair {
                parameter: parameter.to_string(),
                type1: types[index % n].clone(),
                type2: types[index / n].clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Discrete2DFunction::new(n, n, values).map_err(|source| AssemblyError::Expression {
        force: format!("Nonbonded{}", nonbond.index),
        source,
    })
}

/// Per-type `A = C12` and `B = C6` tables for the default repulsive
/// nonbonded term, indexed by position in `[ atomtypes ]`.
fn lennard_jones_tables(
    topology: &Topology,
) -> Result<(Discrete2DFunction, Discrete2DFunction), AssemblyError> {
    let rule = topology.defaults.combination_rule;
    let types = &topology.atom_types;
    let n = types.len();
    let mut acoef = vec![0.0; n * n];
    let mut bcoef = vec![0.0; n * n];
    for (i, a) in types.iter().enumerate() {
        for (j, b) in types.iter().enumerate() {
            let (c6, c12) = topology
                .explicit_pair(&a.name, &b.name)
                .unwrap_or_else(|| rule.combine((a.v, a.w), (b.v, b.w)));
            acoef[i + n * j] = c12;
            bcoef[i + n * j] = c6;
        }
    }
    let table = |values| {
        Discrete2DFunction::new(n, n, values).map_err(|source| AssemblyError::Expression {
            force: NON_CONTACTS_FORCE.to_string(),
            source,
        })
    };
    Ok((table(acoef)?, table(bcoef)?))
}

/// Pairs of one molecule type separated by at most `nrexcl` bonds.
fn bonded_exclusions(molecule: &MoleculeType) -> Vec<(usize, usize)> {
    let n = molecule.atoms.len();
    let mut neighbors = vec![Vec::new(); n];
    for bond in molecule.bonds.iter().filter(|b| b.function == 1) {
        let [i, j] = bond.atoms;
        neighbors[i].push(j);
        neighbors[j].push(i);
    }

    let mut excluded = Vec::new();
    for start in 0..n {
        let mut depth = vec![usize::MAX; n];
        depth[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(atom) = queue.pop_front() {
            if depth[atom] == molecule.nrexcl {
                continue;
            }
            for &next in &neighbors[atom] {
                if depth[next] == usize::MAX {
                    depth[next] = depth[atom] + 1;
                    queue.push_back(next);
                }
            }
        }
        excluded.extend(
            (start + 1..n)
                .filter(|&other| depth[other] != usize::MAX)
                .map(|other| (start, other)),
        );
    }
    excluded
}

/// Every excluded pair of the system, as sorted `(i, j)` with `i < j`.
fn system_exclusions(topology: &Topology) -> Vec<(usize, usize)> {
    let mut per_type = std::collections::HashMap::new();
    let mut pairs = HashSet::new();

    for (molecule, offset) in topology.molecule_instances() {
        let local = per_type.entry(molecule.name.as_str()).or_insert_with(|| {
            let mut local = bonded_exclusions(molecule);
            local.extend(molecule.pairs.iter().map(|p| {
                let [i, j] = p.atoms;
                (i.min(j), i.max(j))
            }));
            local.extend(molecule.exclusions.iter().copied());
            local
        });
        pairs.extend(
            local
                .iter()
                .filter(|(i, j)| i != j)
                .map(|(i, j)| (i + offset, j + offset)),
        );
    }

    let mut exclusions: Vec<_> = pairs.into_iter().collect();
    exclusions.sort_unstable();
    exclusions
}
