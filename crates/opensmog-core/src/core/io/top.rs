use crate::core::io::traits::InputFile;
use crate::core::models::topology::{
    AtomType, CombinationRule, Defaults, Interaction, MoleculeType, NonbondParam, TopAtom,
    Topology,
};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to read included file '{path}': {source}", path = path.display())]
    Include {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Parse error on line {line} of {file}: {kind}")]
    Parse {
        file: String,
        line: usize,
        kind: TopParseErrorKind,
    },
    #[error("Inconsistent topology: {0}")]
    Inconsistency(String),
}

#[derive(Debug, Error)]
pub enum TopParseErrorKind {
    #[error("Unknown section [ {0} ]")]
    UnknownSection(String),
    #[error("Data line outside of any section")]
    NoSection,
    #[error("Section [ {0} ] appears outside of a [ moleculetype ]")]
    NoMoleculeType(&'static str),
    #[error("Expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },
    #[error("Invalid integer in field {field} (value: '{value}')")]
    InvalidInt { field: usize, value: String },
    #[error("Invalid float in field {field} (value: '{value}')")]
    InvalidFloat { field: usize, value: String },
    #[error("Unsupported {section} function type {function}")]
    UnsupportedFunction {
        section: &'static str,
        function: i64,
    },
    #[error("Missing parameters for {section} function type {function}")]
    MissingParameters {
        section: &'static str,
        function: i64,
    },
    #[error("Atom index {index} is outside of molecule type '{molecule}'")]
    AtomIndexOutOfRange { index: i64, molecule: String },
    #[error("Unknown atom type '{0}'")]
    UnknownAtomType(String),
    #[error("Invalid combination rule {0}")]
    InvalidCombinationRule(i64),
    #[error("Malformed preprocessor directive: {0}")]
    Directive(String),
    #[error("Unbalanced #else/#endif")]
    UnbalancedConditional,
    #[error("Include '{0}' cannot be resolved without a file path")]
    UnresolvedInclude(String),
}

/// One logical line after preprocessing, with its origin for error reporting.
#[derive(Debug, Clone)]
struct SourceLine {
    file: String,
    line: usize,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Defaults,
    AtomTypes,
    NonbondParams,
    MoleculeType,
    Atoms,
    Bonds,
    Angles,
    Dihedrals,
    Pairs,
    Exclusions,
    System,
    Molecules,
    Ignored,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "defaults" => Self::Defaults,
            "atomtypes" => Self::AtomTypes,
            "nonbond_params" => Self::NonbondParams,
            "moleculetype" => Self::MoleculeType,
            "atoms" => Self::Atoms,
            "bonds" => Self::Bonds,
            "angles" => Self::Angles,
            "dihedrals" => Self::Dihedrals,
            "pairs" => Self::Pairs,
            "exclusions" => Self::Exclusions,
            "system" => Self::System,
            "molecules" => Self::Molecules,
            "bondtypes" | "angletypes" | "dihedraltypes" | "pairtypes" | "constrainttypes"
            | "implicit_genborn_params" | "cmaptypes" => Self::Ignored,
            _ => return None,
        })
    }
}

/// Conditional-compilation state for one `#ifdef` level.
#[derive(Debug, Clone, Copy)]
struct Conditional {
    parent_active: bool,
    taken: bool,
}

struct Preprocessor<'a> {
    defines: &'a mut HashMap<String, String>,
    conditionals: Vec<Conditional>,
    output: Vec<SourceLine>,
}

impl Preprocessor<'_> {
    fn active(&self) -> bool {
        self.conditionals
            .last()
            .is_none_or(|c| c.parent_active && c.taken)
    }

    fn run(
        &mut self,
        reader: &mut dyn BufRead,
        file: &str,
        base_dir: Option<&Path>,
    ) -> Result<(), TopError> {
        let mut pending = String::new();
        let mut pending_start = 0;

        for (index, line_res) in reader.lines().enumerate() {
            let raw = line_res?;
            let line_num = index + 1;
            if pending.is_empty() {
                pending_start = line_num;
            }

            let without_comment = raw.split(';').next().unwrap_or("");
            if let Some(continued) = without_comment.trim_end().strip_suffix('\\') {
                pending.push_str(continued);
                pending.push(' ');
                continue;
            }
            pending.push_str(without_comment);
            let text = std::mem::take(&mut pending);
            self.process_line(text.trim(), file, pending_start, base_dir)?;
        }
        if !pending.trim().is_empty() {
            let text = std::mem::take(&mut pending);
            self.process_line(text.trim(), file, pending_start, base_dir)?;
        }
        Ok(())
    }

    fn process_line(
        &mut self,
        text: &str,
        file: &str,
        line: usize,
        base_dir: Option<&Path>,
    ) -> Result<(), TopError> {
        let error = |kind| TopError::Parse {
            file: file.to_string(),
            line,
            kind,
        };

        if let Some(directive) = text.strip_prefix('#') {
            let mut parts = directive.split_whitespace();
            let keyword = parts.next().unwrap_or("");
            match keyword {
                "ifdef" | "ifndef" => {
                    let name = parts
                        .next()
                        .ok_or_else(|| error(TopParseErrorKind::Directive(text.into())))?;
                    let defined = self.defines.contains_key(name);
                    let parent_active = self.active();
                    self.conditionals.push(Conditional {
                        parent_active,
                        taken: if keyword == "ifdef" { defined } else { !defined },
                    });
                }
                "else" => {
                    let cond = self
                        .conditionals
                        .last_mut()
                        .ok_or_else(|| error(TopParseErrorKind::UnbalancedConditional))?;
                    cond.taken = !cond.taken;
                }
                "endif" => {
                    self.conditionals
                        .pop()
                        .ok_or_else(|| error(TopParseErrorKind::UnbalancedConditional))?;
                }
                _ if !self.active() => {}
                "define" => {
                    let name = parts
                        .next()
                        .ok_or_else(|| error(TopParseErrorKind::Directive(text.into())))?;
                    let value = parts.collect::<Vec<_>>().join(" ");
                    self.defines.insert(name.to_string(), value);
                }
                "undef" => {
                    if let Some(name) = parts.next() {
                        self.defines.remove(name);
                    }
                }
                "include" => {
                    let target = parts
                        .next()
                        .map(|t| t.trim_matches(|c| c == '"' || c == '<' || c == '>'))
                        .ok_or_else(|| error(TopParseErrorKind::Directive(text.into())))?;
                    let dir = base_dir.ok_or_else(|| {
                        error(TopParseErrorKind::UnresolvedInclude(target.to_string()))
                    })?;
                    let path = dir.join(target);
                    let content = fs::read_to_string(&path).map_err(|source| TopError::Include {
                        path: path.clone(),
                        source,
                    })?;
                    let include_dir = path.parent().map(Path::to_path_buf);
                    self.run(
                        &mut content.as_bytes(),
                        &path.display().to_string(),
                        include_dir.as_deref(),
                    )?;
                }
                _ => return Err(error(TopParseErrorKind::Directive(text.into()))),
            }
            return Ok(());
        }

        if !self.active() || text.is_empty() {
            return Ok(());
        }

        let substituted = text
            .split_whitespace()
            .map(|token| {
                self.defines
                    .get(token)
                    .filter(|v| !v.is_empty())
                    .map_or(token, String::as_str)
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.output.push(SourceLine {
            file: file.to_string(),
            line,
            text: substituted,
        });
        Ok(())
    }
}

/// Reader for GROMACS-style `.top` topology files as written by SMOG 2.
pub struct TopFile;

impl TopFile {
    /// Parses a topology with a set of predefined preprocessor symbols.
    ///
    /// Includes are resolved relative to `base_dir`; without one, any
    /// `#include` directive is an error.
    pub fn read_with_defines(
        reader: &mut impl BufRead,
        file_name: &str,
        base_dir: Option<&Path>,
        defines: &HashMap<String, String>,
    ) -> Result<Topology, TopError> {
        let mut defines = defines.clone();
        let mut preprocessor = Preprocessor {
            defines: &mut defines,
            conditionals: Vec::new(),
            output: Vec::new(),
        };
        preprocessor.run(reader, file_name, base_dir)?;
        if !preprocessor.conditionals.is_empty() {
            return Err(TopError::Inconsistency(
                "unterminated #ifdef block".to_string(),
            ));
        }
        let lines = preprocessor.output;
        TopologyParser::default().parse(&lines)
    }
}

impl InputFile for TopFile {
    type Output = Topology;
    type Error = TopError;

    fn read_from(reader: &mut impl BufRead) -> Result<Topology, TopError> {
        Self::read_with_defines(reader, "<topology>", None, &HashMap::new())
    }

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Topology, TopError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::read_with_defines(
            &mut content.as_bytes(),
            &path.display().to_string(),
            path.parent(),
            &HashMap::new(),
        )
    }
}

#[derive(Default)]
struct TopologyParser {
    topology: Topology,
    current: Option<MoleculeType>,
}

impl TopologyParser {
    fn parse(mut self, lines: &[SourceLine]) -> Result<Topology, TopError> {
        let mut section = None;
        for source in lines {
            let text = source.text.as_str();
            if let Some(name) = text
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                let name = name.trim().to_ascii_lowercase();
                let parsed = Section::from_name(&name).ok_or_else(|| TopError::Parse {
                    file: source.file.clone(),
                    line: source.line,
                    kind: TopParseErrorKind::UnknownSection(name.clone()),
                })?;
                section = Some(parsed);
                continue;
            }

            let current = section.ok_or_else(|| TopError::Parse {
                file: source.file.clone(),
                line: source.line,
                kind: TopParseErrorKind::NoSection,
            })?;
            self.parse_line(current, source)
                .map_err(|kind| TopError::Parse {
                    file: source.file.clone(),
                    line: source.line,
                    kind,
                })?;
        }
        self.finish_molecule();
        self.validate()?;
        Ok(self.topology)
    }

    fn finish_molecule(&mut self) {
        if let Some(molecule) = self.current.take() {
            self.topology.molecule_types.push(molecule);
        }
    }

    fn validate(&self) -> Result<(), TopError> {
        for (name, _) in &self.topology.molecules {
            if self.topology.molecule_type(name).is_none() {
                return Err(TopError::Inconsistency(format!(
                    "[ molecules ] references undefined molecule type '{}'",
                    name
                )));
            }
        }
        if self.topology.molecules.is_empty() {
            return Err(TopError::Inconsistency(
                "no [ molecules ] entries found".to_string(),
            ));
        }
        Ok(())
    }

    fn molecule(&mut self, section: &'static str) -> Result<&mut MoleculeType, TopParseErrorKind> {
        self.current
            .as_mut()
            .ok_or(TopParseErrorKind::NoMoleculeType(section))
    }

    fn parse_line(&mut self, section: Section, source: &SourceLine) -> Result<(), TopParseErrorKind> {
        let fields: Vec<&str> = source.text.split_whitespace().collect();
        match section {
            Section::Ignored => Ok(()),
            Section::Defaults => self.parse_defaults(&fields),
            Section::AtomTypes => self.parse_atom_type(&fields),
            Section::NonbondParams => {
                require(&fields, 5)?;
                self.topology.nonbond_params.push(NonbondParam {
                    type_i: fields[0].to_string(),
                    type_j: fields[1].to_string(),
                    function: int(&fields, 2)?,
                    v: float(&fields, 3)?,
                    w: float(&fields, 4)?,
                });
                Ok(())
            }
            Section::MoleculeType => {
                require(&fields, 2)?;
                self.finish_molecule();
                let nrexcl = int(&fields, 1)?;
                self.current = Some(MoleculeType {
                    name: fields[0].to_string(),
                    nrexcl: usize::try_from(nrexcl).map_err(|_| TopParseErrorKind::InvalidInt {
                        field: 2,
                        value: fields[1].into(),
                    })?,
                    ..Default::default()
                });
                Ok(())
            }
            Section::Atoms => self.parse_atom(&fields),
            Section::Bonds => {
                let entry = interaction::<2>(&fields, self.molecule("bonds")?)?;
                match entry.function {
                    1 | 6 => expect_params(&entry, 2, "bonds")?,
                    f => {
                        return Err(TopParseErrorKind::UnsupportedFunction {
                            section: "bonds",
                            function: f,
                        });
                    }
                }
                self.molecule("bonds")?.bonds.push(entry);
                Ok(())
            }
            Section::Angles => {
                let entry = interaction::<3>(&fields, self.molecule("angles")?)?;
                if entry.function != 1 {
                    return Err(TopParseErrorKind::UnsupportedFunction {
                        section: "angles",
                        function: entry.function,
                    });
                }
                expect_params(&entry, 2, "angles")?;
                self.molecule("angles")?.angles.push(entry);
                Ok(())
            }
            Section::Dihedrals => {
                let entry = interaction::<4>(&fields, self.molecule("dihedrals")?)?;
                match entry.function {
                    1 | 9 => expect_params(&entry, 3, "dihedrals")?,
                    2 => expect_params(&entry, 2, "dihedrals")?,
                    f => {
                        return Err(TopParseErrorKind::UnsupportedFunction {
                            section: "dihedrals",
                            function: f,
                        });
                    }
                }
                self.molecule("dihedrals")?.dihedrals.push(entry);
                Ok(())
            }
            Section::Pairs => {
                let entry = interaction::<2>(&fields, self.molecule("pairs")?)?;
                if entry.function != 1 {
                    return Err(TopParseErrorKind::UnsupportedFunction {
                        section: "pairs",
                        function: entry.function,
                    });
                }
                expect_params(&entry, 2, "pairs")?;
                self.molecule("pairs")?.pairs.push(entry);
                Ok(())
            }
            Section::Exclusions => {
                require(&fields, 2)?;
                let molecule = self.molecule("exclusions")?;
                let first = atom_index(&fields, 0, molecule)?;
                for field in 1..fields.len() {
                    let other = atom_index(&fields, field, molecule)?;
                    molecule.exclusions.push((first.min(other), first.max(other)));
                }
                Ok(())
            }
            Section::System => {
                if !self.topology.system_name.is_empty() {
                    self.topology.system_name.push(' ');
                }
                self.topology.system_name.push_str(&source.text);
                Ok(())
            }
            Section::Molecules => {
                require(&fields, 2)?;
                let count = int(&fields, 1)?;
                let count = usize::try_from(count).map_err(|_| TopParseErrorKind::InvalidInt {
                    field: 2,
                    value: fields[1].into(),
                })?;
                self.finish_molecule();
                self.topology.molecules.push((fields[0].to_string(), count));
                Ok(())
            }
        }
    }

    fn parse_defaults(&mut self, fields: &[&str]) -> Result<(), TopParseErrorKind> {
        require(fields, 2)?;
        let rule_code = int(fields, 1)?;
        let combination_rule = CombinationRule::from_code(rule_code)
            .ok_or(TopParseErrorKind::InvalidCombinationRule(rule_code))?;
        let mut defaults = Defaults {
            nonbonded_function: int(fields, 0)?,
            combination_rule,
            ..Default::default()
        };
        if let Some(gen_pairs) = fields.get(2) {
            defaults.generate_pairs = gen_pairs.eq_ignore_ascii_case("yes");
        }
        if fields.len() > 3 {
            defaults.fudge_lj = float(fields, 3)?;
        }
        if fields.len() > 4 {
            defaults.fudge_qq = float(fields, 4)?;
        }
        self.topology.defaults = defaults;
        Ok(())
    }

    /// Atom type lines come in several layouts; the particle type column
    /// (a single letter) anchors the trailing `mass charge ptype V W` block.
    fn parse_atom_type(&mut self, fields: &[&str]) -> Result<(), TopParseErrorKind> {
        require(fields, 6)?;
        let ptype_index = (3..fields.len().saturating_sub(1))
            .rev()
            .find(|&i| {
                fields[i].len() == 1 && fields[i].chars().all(|c| c.is_ascii_alphabetic())
            })
            .ok_or(TopParseErrorKind::TooFewFields {
                expected: 6,
                found: fields.len(),
            })?;
        if ptype_index + 2 >= fields.len() {
            return Err(TopParseErrorKind::TooFewFields {
                expected: ptype_index + 3,
                found: fields.len(),
            });
        }
        self.topology.atom_types.push(AtomType {
            name: fields[0].to_string(),
            mass: float(fields, ptype_index - 2)?,
            charge: float(fields, ptype_index - 1)?,
            particle_type: fields[ptype_index].to_string(),
            v: float(fields, ptype_index + 1)?,
            w: float(fields, ptype_index + 2)?,
        });
        Ok(())
    }

    fn parse_atom(&mut self, fields: &[&str]) -> Result<(), TopParseErrorKind> {
        require(fields, 5)?;
        let atom_type_name = fields[1];
        let atom_type = self
            .topology
            .atom_type(atom_type_name)
            .cloned()
            .ok_or_else(|| TopParseErrorKind::UnknownAtomType(atom_type_name.to_string()))?;
        let charge = if fields.len() > 6 {
            float(fields, 6)?
        } else {
            atom_type.charge
        };
        let mass = if fields.len() > 7 {
            float(fields, 7)?
        } else {
            atom_type.mass
        };
        let atom = TopAtom {
            atom_type: atom_type_name.to_string(),
            residue_number: int(fields, 2)?,
            residue_name: fields[3].to_string(),
            name: fields[4].to_string(),
            charge,
            mass,
        };
        self.molecule("atoms")?.atoms.push(atom);
        Ok(())
    }
}

fn require(fields: &[&str], expected: usize) -> Result<(), TopParseErrorKind> {
    if fields.len() < expected {
        return Err(TopParseErrorKind::TooFewFields {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn int(fields: &[&str], index: usize) -> Result<i64, TopParseErrorKind> {
    fields[index]
        .parse()
        .map_err(|_| TopParseErrorKind::InvalidInt {
            field: index + 1,
            value: fields[index].into(),
        })
}

fn float(fields: &[&str], index: usize) -> Result<f64, TopParseErrorKind> {
    fields[index]
        .parse()
        .map_err(|_| TopParseErrorKind::InvalidFloat {
            field: index + 1,
            value: fields[index].into(),
        })
}

fn atom_index(
    fields: &[&str],
    index: usize,
    molecule: &MoleculeType,
) -> Result<usize, TopParseErrorKind> {
    let one_based = int(fields, index)?;
    if one_based < 1 || one_based as usize > molecule.atoms.len() {
        return Err(TopParseErrorKind::AtomIndexOutOfRange {
            index: one_based,
            molecule: molecule.name.clone(),
        });
    }
    Ok(one_based as usize - 1)
}

fn interaction<const N: usize>(
    fields: &[&str],
    molecule: &MoleculeType,
) -> Result<Interaction<N>, TopParseErrorKind> {
    require(fields, N + 1)?;
    let mut atoms = [0usize; N];
    for (slot, atom) in atoms.iter_mut().enumerate() {
        *atom = atom_index(fields, slot, molecule)?;
    }
    let function = int(fields, N)?;
    let params = (N + 1..fields.len())
        .map(|i| float(fields, i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Interaction {
        atoms,
        function,
        params,
    })
}

fn expect_params<const N: usize>(
    entry: &Interaction<N>,
    count: usize,
    section: &'static str,
) -> Result<(), TopParseErrorKind> {
    if entry.params.len() < count {
        return Err(TopParseErrorKind::MissingParameters {
            section,
            function: entry.function,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::tempdir;

    pub(crate) const CA_MODEL: &str = "\
; SMOG 2 C-alpha topology
[ defaults ]
; nbfunc comb-rule gen-pairs
  1      1       no

[ atomtypes ]
; name  mass  charge ptype  c6            c12
 NB_1   1.00  0.000  A      0.00000e+00   5.96046e-09
 NB_2   1.00  0.000  A      0.00000e+00   5.96046e-09

[ moleculetype ]
; name nrexcl
Macromolecule 3

[ atoms ]
; nr type resnr res atom cgnr charge mass
  1  NB_1  1  MET  CA  1  0.0  1.0
  2  NB_2  2  GLN  CA  2  0.0  1.0
  3  NB_1  3  ILE  CA  3  0.0  1.0
  4  NB_2  4  PHE  CA  4  0.0  1.0

[ bonds ]
  1  2  1  3.80e-01  2.00e+04
  2  3  1  3.80e-01  2.00e+04
  3  4  1  3.80e-01  2.00e+04

[ angles ]
  1  2  3  1  1.20e+02  4.00e+01
  2  3  4  1  1.10e+02  4.00e+01

[ dihedrals ]
  1  2  3  4  1  -1.20e+02  1.0  1
  1  2  3  4  1  -3.60e+02  0.5  3

[ exclusions ]
  1  4

[ system ]
Macromolecule

[ molecules ]
Macromolecule 1
";

    #[test]
    fn read_from_parses_c_alpha_model() {
        let top = TopFile::read_from_str(CA_MODEL).unwrap();
        assert_eq!(top.defaults.combination_rule, CombinationRule::C6C12);
        assert!(!top.defaults.generate_pairs);
        assert_eq!(top.atom_types.len(), 2);
        assert_relative_eq!(top.atom_types[0].w, 5.96046e-09);

        let molecule = &top.molecule_types[0];
        assert_eq!(molecule.name, "Macromolecule");
        assert_eq!(molecule.nrexcl, 3);
        assert_eq!(molecule.atoms.len(), 4);
        assert_eq!(molecule.bonds.len(), 3);
        assert_eq!(molecule.bonds[0].atoms, [0, 1]);
        assert_eq!(molecule.angles.len(), 2);
        assert_eq!(molecule.dihedrals.len(), 2);
        assert_relative_eq!(molecule.dihedrals[1].params[2], 3.0);
        assert_eq!(molecule.exclusions, vec![(0, 3)]);
        assert_eq!(top.system_name, "Macromolecule");
        assert_eq!(top.molecules, vec![("Macromolecule".to_string(), 1)]);
    }

    #[test]
    fn atom_charge_and_mass_default_to_atom_type() {
        let content = "\
[ atomtypes ]
 C  12.0  0.5  A  0.0  1.0e-6
[ moleculetype ]
M 3
[ atoms ]
 1  C  1  ALA  CB
[ molecules ]
M 2
";
        let top = TopFile::read_from_str(content).unwrap();
        let atom = &top.molecule_types[0].atoms[0];
        assert_relative_eq!(atom.charge, 0.5);
        assert_relative_eq!(atom.mass, 12.0);
        assert_eq!(top.num_atoms(), 2);
    }

    #[test]
    fn atom_type_with_bonded_type_and_atomic_number_is_parsed() {
        let content = "\
[ atomtypes ]
 CA  C  6  12.011  0.0  A  0.0  1.0e-6
[ moleculetype ]
M 3
[ atoms ]
 1  CA  1  ALA  CA
[ molecules ]
M 1
";
        let top = TopFile::read_from_str(content).unwrap();
        assert_relative_eq!(top.atom_types[0].mass, 12.011);
        assert_relative_eq!(top.atom_types[0].w, 1.0e-6);
    }

    #[test]
    fn line_continuation_and_defines_are_expanded() {
        let content = "\
#define KB 2.0e4
[ atomtypes ]
 C  1.0  0.0  A  0.0  1.0e-6
[ moleculetype ]
M 3
[ atoms ]
 1  C  1  ALA  CA
 2  C  2  ALA  CA
[ bonds ]
 1  2  1 \\
   0.38  KB
[ molecules ]
M 1
";
        let top = TopFile::read_from_str(content).unwrap();
        let bond = &top.molecule_types[0].bonds[0];
        assert_relative_eq!(bond.params[1], 2.0e4);
    }

    #[test]
    fn conditional_blocks_follow_defines() {
        let content = "\
[ atomtypes ]
#ifdef HEAVY
 C  12.0  0.0  A  0.0  1.0e-6
#else
 C  1.0  0.0  A  0.0  1.0e-6
#endif
[ moleculetype ]
M 3
[ atoms ]
 1  C  1  ALA  CA
[ molecules ]
M 1
";
        let light = TopFile::read_from_str(content).unwrap();
        assert_relative_eq!(light.atom_types[0].mass, 1.0);

        let mut defines = HashMap::new();
        defines.insert("HEAVY".to_string(), String::new());
        let heavy =
            TopFile::read_with_defines(&mut content.as_bytes(), "t", None, &defines).unwrap();
        assert_relative_eq!(heavy.atom_types[0].mass, 12.0);
    }

    #[test]
    fn include_is_resolved_relative_to_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("types.itp"),
            "[ atomtypes ]\n C  1.0  0.0  A  0.0  1.0e-6\n",
        )
        .unwrap();
        let top_path = dir.path().join("system.top");
        fs::write(
            &top_path,
            "#include \"types.itp\"\n[ moleculetype ]\nM 3\n[ atoms ]\n 1 C 1 ALA CA\n[ molecules ]\nM 1\n",
        )
        .unwrap();
        let top = TopFile::read_from_path(&top_path).unwrap();
        assert_eq!(top.atom_types.len(), 1);
    }

    #[test]
    fn include_without_path_context_fails() {
        let result = TopFile::read_from_str("#include \"x.itp\"\n");
        assert!(matches!(
            result,
            Err(TopError::Parse {
                kind: TopParseErrorKind::UnresolvedInclude(_),
                ..
            })
        ));
    }

    #[test]
    fn unknown_section_is_rejected() {
        let result = TopFile::read_from_str("[ bogus ]\n1 2 3\n");
        assert!(matches!(
            result,
            Err(TopError::Parse {
                line: 1,
                kind: TopParseErrorKind::UnknownSection(_),
                ..
            })
        ));
    }

    #[test]
    fn unknown_atom_type_is_rejected() {
        let content = "[ moleculetype ]\nM 3\n[ atoms ]\n 1 X 1 ALA CA\n[ molecules ]\nM 1\n";
        let result = TopFile::read_from_str(content);
        assert!(matches!(
            result,
            Err(TopError::Parse {
                kind: TopParseErrorKind::UnknownAtomType(_),
                ..
            })
        ));
    }

    #[test]
    fn bond_index_out_of_range_is_rejected() {
        let content = "\
[ atomtypes ]
 C  1.0  0.0  A  0.0  1.0e-6
[ moleculetype ]
M 3
[ atoms ]
 1  C  1  ALA  CA
[ bonds ]
 1  2  1  0.38  2.0e4
[ molecules ]
M 1
";
        let result = TopFile::read_from_str(content);
        assert!(matches!(
            result,
            Err(TopError::Parse {
                kind: TopParseErrorKind::AtomIndexOutOfRange { index: 2, .. },
                ..
            })
        ));
    }

    #[test]
    fn missing_bond_parameters_are_rejected() {
        let content = "\
[ atomtypes ]
 C  1.0  0.0  A  0.0  1.0e-6
[ moleculetype ]
M 3
[ atoms ]
 1  C  1  ALA  CA
 2  C  1  ALA  CB
[ bonds ]
 1  2  1
[ molecules ]
M 1
";
        let result = TopFile::read_from_str(content);
        assert!(matches!(
            result,
            Err(TopError::Parse {
                kind: TopParseErrorKind::MissingParameters { .. },
                ..
            })
        ));
    }

    #[test]
    fn undefined_molecule_in_system_is_rejected() {
        let content = "\
[ atomtypes ]
 C  1.0  0.0  A  0.0  1.0e-6
[ moleculetype ]
M 3
[ atoms ]
 1  C  1  ALA  CA
[ molecules ]
Other 1
";
        let result = TopFile::read_from_str(content);
        assert!(matches!(result, Err(TopError::Inconsistency(_))));
    }
}
