use crate::core::forcefield::units;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for {parameter}: {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },

    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("Precision must be mixed, single or double (got '{0}')")]
    InvalidPrecision(String),

    #[error("Unknown integrator '{0}'; options are langevin, verlet and brownian")]
    UnknownIntegrator(String),
}

pub const DEFAULT_NAME: &str = "OpenSMOG";

const USUAL_TIME_STEPS: [f64; 2] = [0.0005, 0.002];
const USUAL_COLLISION_RATE: f64 = 1.0;
const USUAL_CUTOFFS: [f64; 3] = [3.0, 2.0, 1.2];

/// Physical parameters of a structure-based model simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Prefix of every output file.
    pub name: String,
    /// Integration time step in ps.
    pub time_step: f64,
    /// Friction coefficient in 1/ps.
    pub collision_rate: f64,
    /// Nonbonded cutoff in nm.
    pub r_cutoff: f64,
    /// Temperature in reduced SBM units.
    pub temperature: f64,
    pub pbc: bool,
    pub remove_cm_motion: bool,
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::new()
    }

    pub fn temperature_kelvin(&self) -> f64 {
        units::reduced_to_kelvin(self.temperature)
    }

    /// Thermal energy in kJ/mol.
    pub fn kt(&self) -> f64 {
        units::thermal_energy(self.temperature_kelvin())
    }

    /// Notes on parameter values that differ from the usual SBM choices.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !USUAL_TIME_STEPS.contains(&self.time_step) {
            warnings.push(
                "The given time_step value is not the one usually employed in the SBM models. \
                 Make sure this value is correct. The suggested values are: time_step=0.0005 for \
                 C-alpha and time_step=0.002 for All-Atoms."
                    .to_string(),
            );
        }
        if self.collision_rate != USUAL_COLLISION_RATE {
            warnings.push(
                "The given collision_rate value is not the one usually employed in the SBM models. \
                 Make sure this value is correct. The suggested value is: collision_rate=1.0."
                    .to_string(),
            );
        }
        if !USUAL_CUTOFFS.contains(&self.r_cutoff) {
            warnings.push(
                "The given r_cutoff value is not the one usually employed in the SBM models. \
                 Make sure this value is correct. The suggested values are: r_cutoff=3.0 for \
                 C-alpha and r_cutoff=1.2 for All-Atoms."
                    .to_string(),
            );
        }
        warnings
    }

    pub fn log_warnings(&self) {
        for message in self.warnings() {
            warn!("{}", message);
        }
    }
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    name: Option<String>,
    time_step: Option<f64>,
    collision_rate: Option<f64>,
    r_cutoff: Option<f64>,
    temperature: Option<f64>,
    pbc: Option<bool>,
    remove_cm_motion: Option<bool>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn time_step(mut self, picoseconds: f64) -> Self {
        self.time_step = Some(picoseconds);
        self
    }
    pub fn collision_rate(mut self, per_picosecond: f64) -> Self {
        self.collision_rate = Some(per_picosecond);
        self
    }
    pub fn r_cutoff(mut self, nanometers: f64) -> Self {
        self.r_cutoff = Some(nanometers);
        self
    }
    pub fn temperature(mut self, reduced: f64) -> Self {
        self.temperature = Some(reduced);
        self
    }
    pub fn pbc(mut self, enabled: bool) -> Self {
        self.pbc = Some(enabled);
        self
    }
    pub fn remove_cm_motion(mut self, enabled: bool) -> Self {
        self.remove_cm_motion = Some(enabled);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let config = SimulationConfig {
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            time_step: self
                .time_step
                .ok_or(ConfigError::MissingParameter("time_step"))?,
            collision_rate: self
                .collision_rate
                .ok_or(ConfigError::MissingParameter("collision_rate"))?,
            r_cutoff: self
                .r_cutoff
                .ok_or(ConfigError::MissingParameter("r_cutoff"))?,
            temperature: self
                .temperature
                .ok_or(ConfigError::MissingParameter("temperature"))?,
            pbc: self.pbc.unwrap_or(false),
            remove_cm_motion: self.remove_cm_motion.unwrap_or(true),
        };

        let checks: [(&'static str, f64, bool); 4] = [
            ("time_step", config.time_step, config.time_step > 0.0),
            ("collision_rate", config.collision_rate, config.collision_rate >= 0.0),
            ("r_cutoff", config.r_cutoff, config.r_cutoff > 0.0),
            ("temperature", config.temperature, config.temperature >= 0.0),
        ];
        for (parameter, value, valid) in checks {
            if !valid || !value.is_finite() {
                return Err(ConfigError::InvalidValue {
                    parameter,
                    reason: format!("{} is out of range", value),
                });
            }
        }
        if config.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(config)
    }
}
