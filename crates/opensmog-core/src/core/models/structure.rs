use nalgebra::Vector3;

/// Identity of a single particle as listed in a coordinate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureAtom {
    pub residue_number: i64,
    pub residue_name: String,
    pub atom_name: String,
    pub atom_number: i64,
}

/// The three periodic box vectors, in nanometers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxVectors {
    pub a: Vector3<f64>,
    pub b: Vector3<f64>,
    pub c: Vector3<f64>,
}

impl BoxVectors {
    pub fn rectangular(x: f64, y: f64, z: f64) -> Self {
        Self {
            a: Vector3::new(x, 0.0, 0.0),
            b: Vector3::new(0.0, y, 0.0),
            c: Vector3::new(0.0, 0.0, z),
        }
    }

    pub fn is_rectangular(&self) -> bool {
        self.a.y == 0.0
            && self.a.z == 0.0
            && self.b.x == 0.0
            && self.b.z == 0.0
            && self.c.x == 0.0
            && self.c.y == 0.0
    }

    /// Edge lengths of the orthorhombic cell spanned by the diagonal.
    pub fn diagonal(&self) -> Vector3<f64> {
        Vector3::new(self.a.x, self.b.y, self.c.z)
    }
}

/// Initial coordinates of a system, as read from a `.gro` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub title: String,
    pub atoms: Vec<StructureAtom>,
    /// Positions in nanometers.
    pub positions: Vec<Vector3<f64>>,
    /// Velocities in nm/ps, present only if every atom line carried them.
    pub velocities: Option<Vec<Vector3<f64>>>,
    pub box_vectors: BoxVectors,
}

impl Structure {
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Returns the unit cell edge lengths (nm) used for periodic simulations.
    pub fn unit_cell_dimensions(&self) -> Vector3<f64> {
        self.box_vectors.diagonal()
    }
}
