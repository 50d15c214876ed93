use crate::core::utils::geometry::minimum_image;
use nalgebra::Vector3;
use std::collections::HashSet;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Extra distance added to the cutoff when building the list.
pub const DEFAULT_SKIN: f64 = 0.3;

/// Verlet list of particle pairs within `cutoff + skin`, rebuilt once any
/// particle has moved more than half the skin since the last build.
#[derive(Debug, Clone)]
pub struct NeighborList {
    cutoff: f64,
    skin: f64,
    exclusions: HashSet<(usize, usize)>,
    pairs: Vec<(usize, usize)>,
    reference: Vec<Vector3<f64>>,
    builds: usize,
}

impl NeighborList {
    pub fn new(cutoff: f64, skin: f64, exclusions: &[(usize, usize)]) -> Self {
        Self {
            cutoff,
            skin,
            exclusions: exclusions
                .iter()
                .map(|&(i, j)| (i.min(j), i.max(j)))
                .collect(),
            pairs: Vec::new(),
            reference: Vec::new(),
            builds: 0,
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Candidate pairs `(i, j)` with `i < j`; some may lie beyond the cutoff.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn is_excluded(&self, i: usize, j: usize) -> bool {
        self.exclusions.contains(&(i.min(j), i.max(j)))
    }

    /// Rebuilds the list if needed; returns whether a rebuild happened.
    pub fn update(
        &mut self,
        positions: &[Vector3<f64>],
        cell: Option<&Vector3<f64>>,
        parallel: bool,
    ) -> bool {
        if !self.needs_rebuild(positions, cell) {
            return false;
        }
        self.build(positions, cell, parallel);
        true
    }

    fn needs_rebuild(&self, positions: &[Vector3<f64>], cell: Option<&Vector3<f64>>) -> bool {
        if self.reference.len() != positions.len() || self.builds == 0 {
            return true;
        }
        let limit = 0.25 * self.skin * self.skin;
        positions
            .iter()
            .zip(&self.reference)
            .any(|(now, then)| minimum_image(now - then, cell).norm_squared() > limit)
    }

    fn build(&mut self, positions: &[Vector3<f64>], cell: Option<&Vector3<f64>>, parallel: bool) {
        let reach = self.cutoff + self.skin;
        let reach2 = reach * reach;
        let n = positions.len();
        let exclusions = &self.exclusions;
        let neighbors_of = |i: usize| -> Vec<(usize, usize)> {
            (i + 1..n)
                .filter(|&j| {
                    !exclusions.contains(&(i, j))
                        && minimum_image(positions[i] - positions[j], cell).norm_squared() <= reach2
                })
                .map(|j| (i, j))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let pairs: Vec<(usize, usize)> = if parallel {
            (0..n).into_par_iter().flat_map_iter(neighbors_of).collect()
        } else {
            (0..n).flat_map(neighbors_of).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let pairs: Vec<(usize, usize)> = {
            let _ = parallel;
            (0..n).flat_map(neighbors_of).collect()
        };

        self.pairs = pairs;
        self.reference = positions.to_vec();
        self.builds += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, spacing: f64) -> Vec<Vector3<f64>> {
        (0..n)
            .map(|i| Vector3::new(i as f64 * spacing, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn pairs_within_reach_are_listed_except_exclusions() {
        let positions = line(4, 1.0);
        let mut list = NeighborList::new(1.2, 0.3, &[(1, 0)]);
        assert!(list.update(&positions, None, false));
        assert_eq!(list.pairs(), &[(1, 2), (2, 3)]);
        assert!(list.is_excluded(0, 1));
    }

    #[test]
    fn small_moves_do_not_trigger_rebuild() {
        let mut positions = line(3, 1.0);
        let mut list = NeighborList::new(1.2, 0.3, &[]);
        list.update(&positions, None, false);
        positions[0].x += 0.1;
        assert!(!list.update(&positions, None, false));
        positions[0].x += 0.1;
        assert!(list.update(&positions, None, false));
        assert_eq!(list.builds(), 2);
    }

    #[test]
    fn periodic_images_are_considered() {
        let positions = vec![Vector3::new(0.1, 0.0, 0.0), Vector3::new(4.9, 0.0, 0.0)];
        let cell = Vector3::new(5.0, 5.0, 5.0);
        let mut list = NeighborList::new(1.0, 0.1, &[]);
        list.update(&positions, Some(&cell), false);
        assert_eq!(list.pairs(), &[(0, 1)]);
    }

    #[test]
    fn parallel_and_serial_builds_agree() {
        let positions: Vec<_> = (0..40)
            .map(|i| {
                let f = i as f64;
                Vector3::new((f * 0.37) % 3.0, (f * 0.61) % 3.0, (f * 0.23) % 3.0)
            })
            .collect();
        let mut serial = NeighborList::new(1.0, 0.2, &[(0, 1), (5, 9)]);
        let mut parallel = serial.clone();
        serial.update(&positions, None, false);
        parallel.update(&positions, None, true);
        assert_eq!(serial.pairs(), parallel.pairs());
    }
}
