use std::collections::HashMap;

/// How per-type Lennard-Jones parameters combine into pair parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinationRule {
    /// V = C6, W = C12, both combined by geometric mean.
    #[default]
    C6C12,
    /// V = sigma, W = epsilon; arithmetic sigma, geometric epsilon.
    LorentzBerthelot,
    /// V = sigma, W = epsilon; both geometric.
    Geometric,
}

impl CombinationRule {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::C6C12),
            2 => Some(Self::LorentzBerthelot),
            3 => Some(Self::Geometric),
            _ => None,
        }
    }

    /// Combines two per-type `(V, W)` values and returns pair `(C6, C12)`.
    pub fn combine(&self, (v1, w1): (f64, f64), (v2, w2): (f64, f64)) -> (f64, f64) {
        match self {
            Self::C6C12 => ((v1 * v2).sqrt(), (w1 * w2).sqrt()),
            Self::LorentzBerthelot => {
                sigma_epsilon_to_c6_c12(0.5 * (v1 + v2), (w1 * w2).sqrt())
            }
            Self::Geometric => sigma_epsilon_to_c6_c12((v1 * v2).sqrt(), (w1 * w2).sqrt()),
        }
    }

    /// Converts an explicit pair `(V, W)` into `(C6, C12)`.
    pub fn pair_to_c6_c12(&self, v: f64, w: f64) -> (f64, f64) {
        match self {
            Self::C6C12 => (v, w),
            Self::LorentzBerthelot | Self::Geometric => sigma_epsilon_to_c6_c12(v, w),
        }
    }
}

fn sigma_epsilon_to_c6_c12(sigma: f64, epsilon: f64) -> (f64, f64) {
    let s6 = sigma.powi(6);
    (4.0 * epsilon * s6, 4.0 * epsilon * s6 * s6)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub nonbonded_function: i64,
    pub combination_rule: CombinationRule,
    pub generate_pairs: bool,
    pub fudge_lj: f64,
    pub fudge_qq: f64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            nonbonded_function: 1,
            combination_rule: CombinationRule::C6C12,
            generate_pairs: false,
            fudge_lj: 1.0,
            fudge_qq: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomType {
    pub name: String,
    pub mass: f64,
    pub charge: f64,
    pub particle_type: String,
    pub v: f64,
    pub w: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonbondParam {
    pub type_i: String,
    pub type_j: String,
    pub function: i64,
    pub v: f64,
    pub w: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopAtom {
    pub atom_type: String,
    pub residue_number: i64,
    pub residue_name: String,
    pub name: String,
    pub charge: f64,
    pub mass: f64,
}

/// A bonded interaction between `N` atoms of one molecule type.
///
/// Atom indices are zero-based within the molecule type.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction<const N: usize> {
    pub atoms: [usize; N],
    pub function: i64,
    pub params: Vec<f64>,
}

pub type BondEntry = Interaction<2>;
pub type AngleEntry = Interaction<3>;
pub type DihedralEntry = Interaction<4>;
pub type PairEntry = Interaction<2>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MoleculeType {
    pub name: String,
    pub nrexcl: usize,
    pub atoms: Vec<TopAtom>,
    pub bonds: Vec<BondEntry>,
    pub angles: Vec<AngleEntry>,
    pub dihedrals: Vec<DihedralEntry>,
    pub pairs: Vec<PairEntry>,
    /// Explicit exclusions, zero-based within the molecule type.
    pub exclusions: Vec<(usize, usize)>,
}

/// A fully-expanded atom of the simulated system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemAtom<'a> {
    pub molecule: &'a str,
    pub atom: &'a TopAtom,
}

/// The contents of a GROMACS-style `.top` file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    pub defaults: Defaults,
    pub atom_types: Vec<AtomType>,
    pub nonbond_params: Vec<NonbondParam>,
    pub molecule_types: Vec<MoleculeType>,
    pub system_name: String,
    /// `(molecule type name, count)` in system order.
    pub molecules: Vec<(String, usize)>,
}

impl Topology {
    pub fn atom_type(&self, name: &str) -> Option<&AtomType> {
        self.atom_types.iter().find(|t| t.name == name)
    }

    pub fn molecule_type(&self, name: &str) -> Option<&MoleculeType> {
        self.molecule_types.iter().find(|m| m.name == name)
    }

    /// Iterates every molecule instance in system order together with the
    /// index of its first atom.
    pub fn molecule_instances(&self) -> impl Iterator<Item = (&MoleculeType, usize)> + '_ {
        let mut offset = 0;
        self.molecules
            .iter()
            .filter_map(|(name, count)| self.molecule_type(name).map(|m| (m, *count)))
            .flat_map(|(molecule, count)| std::iter::repeat_n(molecule, count))
            .map(move |molecule| {
                let start = offset;
                offset += molecule.atoms.len();
                (molecule, start)
            })
    }

    /// Every atom of the system in order, each molecule type repeated by its count.
    pub fn expanded_atoms(&self) -> Vec<SystemAtom<'_>> {
        self.molecule_instances()
            .flat_map(|(molecule, _)| {
                molecule.atoms.iter().map(|atom| SystemAtom {
                    molecule: molecule.name.as_str(),
                    atom,
                })
            })
            .collect()
    }

    pub fn num_atoms(&self) -> usize {
        self.molecules
            .iter()
            .filter_map(|(name, count)| self.molecule_type(name).map(|m| m.atoms.len() * count))
            .sum()
    }

    /// Looks up the per-type `(C6, C12)` of an explicit `[nonbond_params]` entry.
    pub fn explicit_pair(&self, a: &str, b: &str) -> Option<(f64, f64)> {
        self.nonbond_params
            .iter()
            .find(|p| (p.type_i == a && p.type_j == b) || (p.type_i == b && p.type_j == a))
            .map(|p| self.defaults.combination_rule.pair_to_c6_c12(p.v, p.w))
    }

    /// Index of each atom type name, for tabulated per-type parameters.
    pub fn atom_type_indices(&self) -> HashMap<&str, usize> {
        self.atom_types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect()
    }
}
