use nalgebra::Vector3;
use std::f64::consts::PI;

/// Shortest periodic image of `delta` in a rectangular box with edge lengths `cell`.
#[inline]
pub fn minimum_image(delta: Vector3<f64>, cell: Option<&Vector3<f64>>) -> Vector3<f64> {
    match cell {
        Some(cell) => Vector3::new(
            delta.x - cell.x * (delta.x / cell.x).round(),
            delta.y - cell.y * (delta.y / cell.y).round(),
            delta.z - cell.z * (delta.z / cell.z).round(),
        ),
        None => delta,
    }
}

/// Maps an angle in radians into `(-pi, pi]`.
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let mut wrapped = angle % (2.0 * PI);
    if wrapped > PI {
        wrapped -= 2.0 * PI;
    } else if wrapped <= -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

/// Angle i-j-k in radians with its gradient with respect to each position.
pub fn angle_with_gradient(
    xi: &Vector3<f64>,
    xj: &Vector3<f64>,
    xk: &Vector3<f64>,
    cell: Option<&Vector3<f64>>,
) -> (f64, [Vector3<f64>; 3]) {
    let u = minimum_image(xi - xj, cell);
    let v = minimum_image(xk - xj, cell);
    let normal = u.cross(&v);
    let sin_term = normal.norm();
    let theta = sin_term.atan2(u.dot(&v));

    if sin_term < 1e-12 {
        // Collinear atoms: the gradient direction is undefined.
        return (theta, [Vector3::zeros(); 3]);
    }

    let gi = u.cross(&normal) / (u.norm_squared() * sin_term);
    let gk = -v.cross(&normal) / (v.norm_squared() * sin_term);
    (theta, [gi, -gi - gk, gk])
}

/// Dihedral angle i-j-k-l in radians (IUPAC sign convention, trans = pi)
/// with its gradient with respect to each position.
pub fn dihedral_with_gradient(
    xi: &Vector3<f64>,
    xj: &Vector3<f64>,
    xk: &Vector3<f64>,
    xl: &Vector3<f64>,
    cell: Option<&Vector3<f64>>,
) -> (f64, [Vector3<f64>; 4]) {
    let r_ij = minimum_image(xi - xj, cell);
    let r_kj = minimum_image(xk - xj, cell);
    let r_kl = minimum_image(xk - xl, cell);
    let m = r_ij.cross(&r_kj);
    let n = r_kj.cross(&r_kl);
    let kj_norm = r_kj.norm();
    let phi = (kj_norm * r_ij.dot(&n)).atan2(m.dot(&n));

    let (m2, n2) = (m.norm_squared(), n.norm_squared());
    if m2 < 1e-24 || n2 < 1e-24 {
        return (phi, [Vector3::zeros(); 4]);
    }

    let gi = m * (kj_norm / m2);
    let gl = -n * (kj_norm / n2);
    let kj2 = kj_norm * kj_norm;
    let p = r_ij.dot(&r_kj) / kj2;
    let q = r_kl.dot(&r_kj) / kj2;
    let gj = gi * (p - 1.0) - gl * q;
    let gk = gl * (q - 1.0) - gi * p;
    (phi, [gi, gj, gk, gl])
}

/// Mass-weighted center of the given vectors.
pub fn mass_weighted_center(values: &[Vector3<f64>], masses: &[f64]) -> Vector3<f64> {
    let (sum, total) = values
        .iter()
        .zip(masses)
        .filter(|(_, m)| **m > 0.0)
        .fold((Vector3::zeros(), 0.0), |(sum, total), (v, m)| {
            (sum + v * *m, total + m)
        });
    if total > 0.0 { sum / total } else { sum }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn numeric_gradient<const N: usize>(
        positions: [Vector3<f64>; N],
        f: impl Fn(&[Vector3<f64>; N]) -> f64,
    ) -> [Vector3<f64>; N] {
        let h = 1e-6;
        let mut gradient = [Vector3::zeros(); N];
        for atom in 0..N {
            for axis in 0..3 {
                let mut plus = positions;
                let mut minus = positions;
                plus[atom][axis] += h;
                minus[atom][axis] -= h;
                gradient[atom][axis] = (f(&plus) - f(&minus)) / (2.0 * h);
            }
        }
        gradient
    }

    #[test]
    fn minimum_image_wraps_into_half_box() {
        let cell = Vector3::new(10.0, 10.0, 10.0);
        let wrapped = minimum_image(Vector3::new(9.0, -6.0, 4.0), Some(&cell));
        assert_relative_eq!(wrapped, Vector3::new(-1.0, 4.0, 4.0));
        assert_eq!(minimum_image(Vector3::new(9.0, 0.0, 0.0), None).x, 9.0);
    }

    #[test]
    fn wrap_angle_maps_into_principal_range() {
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0);
        assert_relative_eq!(wrap_angle(-3.0 * PI / 2.0), PI / 2.0);
        assert_relative_eq!(wrap_angle(0.5), 0.5);
    }

    #[test]
    fn right_angle_is_detected() {
        let (theta, _) = angle_with_gradient(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::zeros(),
            &Vector3::new(0.0, 2.0, 0.0),
            None,
        );
        assert_relative_eq!(theta, PI / 2.0);
    }

    #[test]
    fn angle_gradient_matches_finite_difference() {
        let positions = [
            Vector3::new(0.3, -0.2, 0.1),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(-0.1, 0.4, 0.25),
        ];
        let (_, analytic) = angle_with_gradient(&positions[0], &positions[1], &positions[2], None);
        let numeric = numeric_gradient(positions, |p| angle_with_gradient(&p[0], &p[1], &p[2], None).0);
        for (a, n) in analytic.iter().zip(&numeric) {
            assert_relative_eq!(a, n, epsilon = 1e-6);
        }
    }

    #[test]
    fn trans_dihedral_is_pi() {
        let (phi, _) = dihedral_with_gradient(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::zeros(),
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::new(-1.0, 1.0, 0.0),
            None,
        );
        assert_relative_eq!(phi.abs(), PI);
    }

    #[test]
    fn dihedral_gradient_matches_finite_difference() {
        let positions = [
            Vector3::new(0.35, -0.1, 0.2),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.1, 0.38, 0.05),
            Vector3::new(-0.2, 0.5, 0.3),
        ];
        let (_, analytic) = dihedral_with_gradient(
            &positions[0],
            &positions[1],
            &positions[2],
            &positions[3],
            None,
        );
        let numeric = numeric_gradient(positions, |p| {
            dihedral_with_gradient(&p[0], &p[1], &p[2], &p[3], None).0
        });
        for (a, n) in analytic.iter().zip(&numeric) {
            assert_relative_eq!(a, n, epsilon = 1e-6);
        }
    }

    #[test]
    fn mass_weighted_center_ignores_massless_particles() {
        let values = [Vector3::new(1.0, 0.0, 0.0), Vector3::new(3.0, 0.0, 0.0), Vector3::new(100.0, 0.0, 0.0)];
        let center = mass_weighted_center(&values, &[1.0, 3.0, 0.0]);
        assert_relative_eq!(center.x, 2.5);
    }
}
