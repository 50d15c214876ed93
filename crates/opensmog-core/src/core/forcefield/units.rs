//! Physical constants in the nm / ps / amu / kJ·mol⁻¹ unit system.

/// Boltzmann constant in kJ/(mol·K).
pub const BOLTZMANN: f64 = 0.00831446261815324;

/// Coulomb prefactor 1/(4πε₀) in kJ·nm/(mol·e²).
pub const ONE_4PI_EPS0: f64 = 138.935456;

/// Factor relating reduced SBM temperature units to kelvin.
pub const REDUCED_TEMPERATURE_UNIT: f64 = 0.008314;

/// Solvent dielectric used by the reaction-field electrostatics.
pub const REACTION_FIELD_DIELECTRIC: f64 = 78.3;

#[inline]
pub fn reduced_to_kelvin(temperature: f64) -> f64 {
    temperature / REDUCED_TEMPERATURE_UNIT
}

/// Thermal energy kT in kJ/mol for a temperature in kelvin.
#[inline]
pub fn thermal_energy(kelvin: f64) -> f64 {
    BOLTZMANN * kelvin
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reduced_temperature_one_is_about_120_kelvin() {
        assert_relative_eq!(reduced_to_kelvin(1.0), 120.27904738994467, max_relative = 1e-12);
    }

    #[test]
    fn thermal_energy_at_reduced_unit_is_close_to_one() {
        assert_relative_eq!(thermal_energy(reduced_to_kelvin(1.0)), 1.0, max_relative = 1e-4);
    }
}
