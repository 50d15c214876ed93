use super::units::{ONE_4PI_EPS0, REACTION_FIELD_DIELECTRIC};
use crate::core::utils::geometry::wrap_angle;

/// Harmonic term `½k(x-x0)²`; returns the energy and `dE/dx`.
#[inline]
pub fn harmonic(x: f64, x0: f64, k: f64) -> (f64, f64) {
    let dx = x - x0;
    (0.5 * k * dx * dx, k * dx)
}

/// Periodic torsion `k(1+cos(nφ-φ0))`; returns the energy and `dE/dφ`.
#[inline]
pub fn periodic_torsion(phi: f64, phi0: f64, k: f64, multiplicity: f64) -> (f64, f64) {
    let arg = multiplicity * phi - phi0;
    (k * (1.0 + arg.cos()), -k * multiplicity * arg.sin())
}

/// Harmonic improper `½k(Δφ)²` with `Δφ` wrapped into `(-π, π]`.
#[inline]
pub fn harmonic_improper(phi: f64, phi0: f64, k: f64) -> (f64, f64) {
    let delta = wrap_angle(phi - phi0);
    (0.5 * k * delta * delta, k * delta)
}

/// Plain Coulomb interaction; returns the energy and `dE/dr`.
#[inline]
pub fn coulomb(r: f64, qq: f64) -> (f64, f64) {
    let energy = ONE_4PI_EPS0 * qq / r;
    (energy, -energy / r)
}

/// Reaction-field Coulomb interaction truncated at a cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionField {
    pub cutoff: f64,
    k_rf: f64,
    c_rf: f64,
}

impl ReactionField {
    pub fn new(cutoff: f64) -> Self {
        Self::with_dielectric(cutoff, REACTION_FIELD_DIELECTRIC)
    }

    pub fn with_dielectric(cutoff: f64, dielectric: f64) -> Self {
        let k_rf = (dielectric - 1.0) / ((2.0 * dielectric + 1.0) * cutoff.powi(3));
        let c_rf = 1.0 / cutoff + k_rf * cutoff * cutoff;
        Self { cutoff, k_rf, c_rf }
    }

    /// Energy and `dE/dr` for a pair with charge product `qq` at distance `r`.
    /// Excluded pairs and pairs beyond the cutoff are not passed here.
    #[inline]
    pub fn pair(&self, r: f64, qq: f64) -> (f64, f64) {
        let prefactor = ONE_4PI_EPS0 * qq;
        (
            prefactor * (1.0 / r + self.k_rf * r * r - self.c_rf),
            prefactor * (-1.0 / (r * r) + 2.0 * self.k_rf * r),
        )
    }
}
