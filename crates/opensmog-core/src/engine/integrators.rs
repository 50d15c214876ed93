use super::error::EngineError;
use super::platform::IntegratorKind;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Three independent standard normal deviates.
pub(crate) fn gaussian_vector(rng: &mut impl Rng) -> Vector3<f64> {
    let mut component = || -> f64 { StandardNormal.sample(&mut *rng) };
    Vector3::new(component(), component(), component())
}

/// Propagates positions and velocities by one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    kind: IntegratorKind,
    /// ps
    time_step: f64,
    /// 1/ps
    friction: f64,
    /// kJ/mol
    kt: f64,
}

impl Integrator {
    pub fn new(
        kind: IntegratorKind,
        time_step: f64,
        friction: f64,
        kt: f64,
    ) -> Result<Self, EngineError> {
        if kind == IntegratorKind::Brownian && friction <= 0.0 {
            return Err(EngineError::BrownianWithoutFriction);
        }
        Ok(Self {
            kind,
            time_step,
            friction,
            kt,
        })
    }

    pub fn kind(&self) -> IntegratorKind {
        self.kind
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Leapfrog schemes store velocities half a step behind the positions.
    pub fn is_leapfrog(&self) -> bool {
        matches!(self.kind, IntegratorKind::Langevin | IntegratorKind::Verlet)
    }

    pub fn advance(
        &self,
        positions: &mut [Vector3<f64>],
        velocities: &mut [Vector3<f64>],
        forces: &[Vector3<f64>],
        inverse_masses: &[f64],
        rng: &mut impl Rng,
    ) {
        let dt = self.time_step;
        match self.kind {
            IntegratorKind::Verlet => {
                for ((x, v), (f, inv_m)) in positions
                    .iter_mut()
                    .zip(velocities.iter_mut())
                    .zip(forces.iter().zip(inverse_masses))
                {
                    *v += f * (dt * inv_m);
                    *x += *v * dt;
                }
            }
            IntegratorKind::Langevin => {
                let vscale = (-dt * self.friction).exp();
                let fscale = if self.friction == 0.0 {
                    dt
                } else {
                    (1.0 - vscale) / self.friction
                };
                let noise = (self.kt * (1.0 - vscale * vscale)).sqrt();
                for ((x, v), (f, inv_m)) in positions
                    .iter_mut()
                    .zip(velocities.iter_mut())
                    .zip(forces.iter().zip(inverse_masses))
                {
                    *v = *v * vscale
                        + f * (fscale * inv_m)
                        + gaussian_vector(rng) * (noise * inv_m.sqrt());
                    *x += *v * dt;
                }
            }
            IntegratorKind::Brownian => {
                for ((x, v), (f, inv_m)) in positions
                    .iter_mut()
                    .zip(velocities.iter_mut())
                    .zip(forces.iter().zip(inverse_masses))
                {
                    let mobility = inv_m / self.friction;
                    let noise = (2.0 * self.kt * dt * mobility).sqrt();
                    let dx = f * (dt * mobility) + gaussian_vector(rng) * noise;
                    *x += dx;
                    *v = dx / dt;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn gaussian_vector_components_have_unit_variance() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f64> = (0..7_000)
            .flat_map(|_| {
                let v = gaussian_vector(&mut rng);
                [v.x, v.y, v.z]
            })
            .collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.03);
        assert!((var - 1.0).abs() < 0.05);
    }

    #[test]
    fn gaussian_vector_is_reproducible_for_a_seed() {
        let a = gaussian_vector(&mut StdRng::seed_from_u64(11));
        let b = gaussian_vector(&mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
        assert!(a.x != a.y && a.y != a.z);
    }

    #[test]
    fn verlet_follows_leapfrog_update() {
        let integrator = Integrator::new(IntegratorKind::Verlet, 0.01, 0.0, 0.0).unwrap();
        let mut x = vec![Vector3::zeros()];
        let mut v = vec![Vector3::new(1.0, 0.0, 0.0)];
        let f = vec![Vector3::new(2.0, 0.0, 0.0)];
        integrator.advance(&mut x, &mut v, &f, &[0.5], &mut StdRng::seed_from_u64(1));
        assert_relative_eq!(v[0].x, 1.01);
        assert_relative_eq!(x[0].x, 0.0101);
    }

    #[test]
    fn langevin_without_noise_damps_velocity() {
        let integrator = Integrator::new(IntegratorKind::Langevin, 0.1, 1.0, 0.0).unwrap();
        let mut x = vec![Vector3::zeros()];
        let mut v = vec![Vector3::new(1.0, 0.0, 0.0)];
        let f = vec![Vector3::zeros()];
        integrator.advance(&mut x, &mut v, &f, &[1.0], &mut StdRng::seed_from_u64(1));
        assert_relative_eq!(v[0].x, (-0.1f64).exp());
        assert_relative_eq!(x[0].x, 0.1 * (-0.1f64).exp());
    }

    #[test]
    fn langevin_without_friction_is_verlet() {
        let langevin = Integrator::new(IntegratorKind::Langevin, 0.01, 0.0, 2.5).unwrap();
        let verlet = Integrator::new(IntegratorKind::Verlet, 0.01, 0.0, 2.5).unwrap();
        let f = vec![Vector3::new(1.0, -2.0, 0.5)];
        let (mut xa, mut va) = (vec![Vector3::zeros()], vec![Vector3::new(0.3, 0.0, 0.0)]);
        let (mut xb, mut vb) = (xa.clone(), va.clone());
        langevin.advance(&mut xa, &mut va, &f, &[1.0], &mut StdRng::seed_from_u64(3));
        verlet.advance(&mut xb, &mut vb, &f, &[1.0], &mut StdRng::seed_from_u64(3));
        assert_relative_eq!(xa[0], xb[0], epsilon = 1e-12);
    }

    #[test]
    fn brownian_requires_friction() {
        assert!(matches!(
            Integrator::new(IntegratorKind::Brownian, 0.001, 0.0, 1.0),
            Err(EngineError::BrownianWithoutFriction)
        ));
    }

    #[test]
    fn brownian_velocity_is_displacement_over_step() {
        let integrator = Integrator::new(IntegratorKind::Brownian, 0.002, 1.0, 0.0).unwrap();
        let mut x = vec![Vector3::zeros()];
        let mut v = vec![Vector3::zeros()];
        let f = vec![Vector3::new(0.0, 0.0, 10.0)];
        integrator.advance(&mut x, &mut v, &f, &[0.5], &mut StdRng::seed_from_u64(1));
        assert_relative_eq!(x[0].z, 0.002 * 0.5 * 10.0);
        assert_relative_eq!(v[0].z, 5.0);
    }
}
