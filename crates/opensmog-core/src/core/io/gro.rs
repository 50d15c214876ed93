use crate::core::io::traits::InputFile;
use crate::core::models::structure::{BoxVectors, Structure, StructureAtom};
use nalgebra::Vector3;
use std::io::{self, BufRead};
use thiserror::Error;

const COORDINATE_START: usize = 20;
const DEFAULT_FIELD_WIDTH: usize = 8;

#[derive(Debug, Error)]
pub enum GroError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: GroParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum GroParseErrorKind {
    #[error("Invalid atom count (value: '{0}')")]
    InvalidAtomCount(String),
    #[error("Invalid integer in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float for {field} (value: '{value}')")]
    InvalidFloat { field: &'static str, value: String },
    #[error("Atom line is too short to hold three coordinates")]
    LineTooShort,
    #[error("Box line must contain 3 or 9 values, found {0}")]
    InvalidBox(usize),
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

/// Infers the coordinate field width from the spacing of decimal points.
fn field_width(line: &str) -> usize {
    let tail = line.get(COORDINATE_START..).unwrap_or("");
    let mut dots = tail.match_indices('.').map(|(i, _)| i);
    match (dots.next(), dots.next()) {
        (Some(first), Some(second)) if second > first => second - first,
        _ => DEFAULT_FIELD_WIDTH,
    }
}

fn parse_float(
    line: &str,
    start: usize,
    width: usize,
    field: &'static str,
    line_num: usize,
) -> Result<f64, GroError> {
    let value = slice_and_trim(line, start, start + width);
    value.parse().map_err(|_| GroError::Parse {
        line: line_num,
        kind: GroParseErrorKind::InvalidFloat {
            field,
            value: value.into(),
        },
    })
}

/// Reader for GROMACS `.gro` coordinate files.
pub struct GroFile;

impl GroFile {
    fn parse_atom_line(
        line: &str,
        line_num: usize,
    ) -> Result<(StructureAtom, Vector3<f64>, Option<Vector3<f64>>), GroError> {
        let width = field_width(line);
        if line.len() < COORDINATE_START + 3 * width - 1 {
            return Err(GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::LineTooShort,
            });
        }

        let residue_number_str = slice_and_trim(line, 0, 5);
        let residue_number = residue_number_str.parse().map_err(|_| GroError::Parse {
            line: line_num,
            kind: GroParseErrorKind::InvalidInt {
                columns: "1-5".into(),
                value: residue_number_str.into(),
            },
        })?;
        let atom_number_str = slice_and_trim(line, 15, 20);
        let atom_number = atom_number_str.parse().map_err(|_| GroError::Parse {
            line: line_num,
            kind: GroParseErrorKind::InvalidInt {
                columns: "16-20".into(),
                value: atom_number_str.into(),
            },
        })?;

        let atom = StructureAtom {
            residue_number,
            residue_name: slice_and_trim(line, 5, 10).to_string(),
            atom_name: slice_and_trim(line, 10, 15).to_string(),
            atom_number,
        };

        let x = parse_float(line, COORDINATE_START, width, "x", line_num)?;
        let y = parse_float(line, COORDINATE_START + width, width, "y", line_num)?;
        let z = parse_float(line, COORDINATE_START + 2 * width, width, "z", line_num)?;

        let velocity_start = COORDINATE_START + 3 * width;
        let velocity = if slice_and_trim(line, velocity_start, line.len()).is_empty() {
            None
        } else {
            let vx = parse_float(line, velocity_start, width, "vx", line_num)?;
            let vy = parse_float(line, velocity_start + width, width, "vy", line_num)?;
            let vz = parse_float(line, velocity_start + 2 * width, width, "vz", line_num)?;
            Some(Vector3::new(vx, vy, vz))
        };

        Ok((atom, Vector3::new(x, y, z), velocity))
    }

    fn parse_box_line(line: &str, line_num: usize) -> Result<BoxVectors, GroError> {
        let values = line
            .split_whitespace()
            .map(|v| {
                v.parse::<f64>().map_err(|_| GroError::Parse {
                    line: line_num,
                    kind: GroParseErrorKind::InvalidFloat {
                        field: "box",
                        value: v.into(),
                    },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            [x, y, z] => Ok(BoxVectors::rectangular(*x, *y, *z)),
            [v1x, v2y, v3z, v1y, v1z, v2x, v2z, v3x, v3y] => Ok(BoxVectors {
                a: Vector3::new(*v1x, *v1y, *v1z),
                b: Vector3::new(*v2x, *v2y, *v2z),
                c: Vector3::new(*v3x, *v3y, *v3z),
            }),
            other => Err(GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::InvalidBox(other.len()),
            }),
        }
    }
}

impl InputFile for GroFile {
    type Output = Structure;
    type Error = GroError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, GroError> {
        let mut lines = reader.lines();

        let title = lines
            .next()
            .transpose()?
            .ok_or_else(|| GroError::MissingRecord("title line".into()))?;
        let count_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| GroError::MissingRecord("atom count line".into()))?;
        let num_atoms: usize = count_line.trim().parse().map_err(|_| GroError::Parse {
            line: 2,
            kind: GroParseErrorKind::InvalidAtomCount(count_line.trim().into()),
        })?;

        let mut atoms = Vec::new();
        let mut positions = Vec::new();
        let mut velocities = Vec::new();

        for index in 0..num_atoms {
            let line_num = index + 3;
            let line = lines.next().transpose()?.ok_or_else(|| {
                GroError::MissingRecord(format!(
                    "atom line {} of {} (file ends at line {})",
                    index + 1,
                    num_atoms,
                    line_num - 1
                ))
            })?;
            let (atom, position, velocity) = Self::parse_atom_line(&line, line_num)?;
            atoms.push(atom);
            positions.push(position);
            velocities.push(velocity);
        }

        let box_line = lines
            .next()
            .transpose()?
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| GroError::MissingRecord("box vectors line".into()))?;
        let box_vectors = Self::parse_box_line(&box_line, num_atoms + 3)?;

        let velocities = velocities.into_iter().collect::<Option<Vec<_>>>();

        Ok(Structure {
            title: title.trim().to_string(),
            atoms,
            positions,
            velocities,
            box_vectors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::tempdir;

    const TWO_ATOMS: &str = "\
Generated by SMOG
    2
    1MET     CA    1   1.000   2.000   3.000
    2GLY     CA    2   1.380   2.000   3.000
  10.00000  11.00000  12.00000
";

    #[test]
    fn read_from_parses_atoms_and_box() {
        let structure = GroFile::read_from_str(TWO_ATOMS).unwrap();
        assert_eq!(structure.title, "Generated by SMOG");
        assert_eq!(structure.num_atoms(), 2);
        assert_eq!(structure.atoms[1].residue_name, "GLY");
        assert_eq!(structure.atoms[1].atom_name, "CA");
        assert_eq!(structure.atoms[1].atom_number, 2);
        assert_relative_eq!(structure.positions[1].x, 1.38);
        assert!(structure.velocities.is_none());
        assert_eq!(
            structure.unit_cell_dimensions(),
            Vector3::new(10.0, 11.0, 12.0)
        );
    }

    #[test]
    fn read_from_parses_velocities_when_present() {
        let content = "\
t
    1
    1MET     CA    1   1.000   2.000   3.000  0.1000 -0.2000  0.3000
   5.0 5.0 5.0
";
        let structure = GroFile::read_from_str(content).unwrap();
        let v = structure.velocities.unwrap();
        assert_relative_eq!(v[0].y, -0.2);
    }

    #[test]
    fn read_from_infers_high_precision_field_width() {
        let content = "\
t
    1
    1MET     CA    1   1.00000   2.50000   3.00000
   5.0 5.0 5.0
";
        let structure = GroFile::read_from_str(content).unwrap();
        assert_relative_eq!(structure.positions[0].y, 2.5);
    }

    #[test]
    fn read_from_parses_triclinic_box() {
        let content = "\
t
    1
    1MET     CA    1   1.000   2.000   3.000
   5.0 5.0 5.0 0.0 0.0 1.0 0.0 0.0 0.0
";
        let structure = GroFile::read_from_str(content).unwrap();
        assert!(!structure.box_vectors.is_rectangular());
        assert_relative_eq!(structure.box_vectors.b.x, 1.0);
    }

    #[test]
    fn read_from_fails_when_atom_lines_are_missing() {
        let content = "t\n    3\n    1MET     CA    1   1.000   2.000   3.000\n";
        let result = GroFile::read_from_str(content);
        assert!(matches!(result, Err(GroError::MissingRecord(_))));
    }

    #[test]
    fn read_from_fails_cleanly_for_huge_declared_count() {
        let result = GroFile::read_from_str("t\n99999999999999\n");
        assert!(matches!(result, Err(GroError::MissingRecord(_))));
    }

    #[test]
    fn read_from_fails_for_invalid_count() {
        let result = GroFile::read_from_str("t\nabc\n");
        assert!(matches!(
            result,
            Err(GroError::Parse {
                line: 2,
                kind: GroParseErrorKind::InvalidAtomCount(_)
            })
        ));
    }

    #[test]
    fn read_from_fails_for_malformed_coordinate() {
        let content = "\
t
    1
    1MET     CA    1   1.000   x.yyy   3.000
   5.0 5.0 5.0
";
        let result = GroFile::read_from_str(content);
        assert!(matches!(result, Err(GroError::Parse { line: 3, .. })));
    }

    #[test]
    fn read_from_fails_without_box_line() {
        let content = "t\n    1\n    1MET     CA    1   1.000   2.000   3.000\n";
        let result = GroFile::read_from_str(content);
        assert!(matches!(result, Err(GroError::MissingRecord(_))));
    }

    #[test]
    fn read_from_path_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.gro");
        fs::write(&path, TWO_ATOMS).unwrap();
        let structure = GroFile::read_from_path(&path).unwrap();
        assert_eq!(structure.num_atoms(), 2);
    }
}
