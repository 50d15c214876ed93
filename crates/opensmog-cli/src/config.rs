use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use opensmog::engine::config::SimulationConfig;
use opensmog::workflows::simulation::ReporterOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const DEFAULT_PLATFORM: &str = "cpu";
const DEFAULT_PRECISION: &str = "single";
const DEFAULT_DEVICE_INDEX: &str = "default";
const DEFAULT_INTEGRATOR: &str = "langevin";
const DEFAULT_REPORT_INTERVAL: u64 = 10_000;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct FileInputConfig {
    gro: Option<PathBuf>,
    top: Option<PathBuf>,
    xml: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileSimulationConfig {
    name: Option<String>,
    time_step: Option<f64>,
    collision_rate: Option<f64>,
    r_cutoff: Option<f64>,
    temperature: Option<f64>,
    pbc: Option<bool>,
    remove_cm_motion: Option<bool>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FilePlatformConfig {
    platform: Option<String>,
    precision: Option<String>,
    device_index: Option<String>,
    integrator: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileOutputConfig {
    folder: Option<PathBuf>,
    trajectory: Option<bool>,
    trajectory_name: Option<String>,
    energies: Option<bool>,
    energies_name: Option<String>,
    energy_components: Option<bool>,
    energy_components_name: Option<String>,
    interval: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileRunConfig {
    steps: Option<u64>,
    report: Option<bool>,
    report_interval: Option<u64>,
}

/// The TOML configuration file, every field optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    input: Option<FileInputConfig>,
    simulation: Option<FileSimulationConfig>,
    platform: Option<FilePlatformConfig>,
    output: Option<FileOutputConfig>,
    run: Option<FileRunConfig>,
}

/// Platform selection as user-facing strings, parsed by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformOptions {
    pub platform: String,
    pub precision: String,
    pub device_index: String,
    pub integrator: String,
}

/// Fully resolved settings of one `run` invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gro: PathBuf,
    pub top: PathBuf,
    pub xml: PathBuf,
    pub simulation: SimulationConfig,
    pub platform: PlatformOptions,
    pub seed: Option<u64>,
    pub folder: PathBuf,
    pub reporters: ReporterOptions,
    pub steps: u64,
    pub report: bool,
    pub report_interval: u64,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| {
        CliError::Config(format!(
            "Missing required setting '{}' (set it in the config file or on the command line)",
            key
        ))
    })
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `KEY=VALUE` overrides such as `simulation.temperature=0.6`.
    pub fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            self.apply_value(key.trim(), value)?;
        }
        Ok(())
    }

    fn apply_value(&mut self, key: &str, value: &str) -> Result<()> {
        let text = value.trim().to_string();
        let Some((section, field)) = key.split_once('.') else {
            return Err(unsupported(key));
        };
        match section {
            "input" => {
                let input = self.input.get_or_insert_with(Default::default);
                match field {
                    "gro" => input.gro = Some(text.into()),
                    "top" => input.top = Some(text.into()),
                    "xml" => input.xml = Some(text.into()),
                    _ => return Err(unsupported(key)),
                }
            }
            "simulation" => {
                let sim = self.simulation.get_or_insert_with(Default::default);
                match field {
                    "name" => sim.name = Some(text),
                    "time-step" => sim.time_step = Some(parse_value(key, value)?),
                    "collision-rate" => sim.collision_rate = Some(parse_value(key, value)?),
                    "r-cutoff" => sim.r_cutoff = Some(parse_value(key, value)?),
                    "temperature" => sim.temperature = Some(parse_value(key, value)?),
                    "pbc" => sim.pbc = Some(parse_value(key, value)?),
                    "remove-cm-motion" => sim.remove_cm_motion = Some(parse_value(key, value)?),
                    "seed" => sim.seed = Some(parse_value(key, value)?),
                    _ => return Err(unsupported(key)),
                }
            }
            "platform" => {
                let platform = self.platform.get_or_insert_with(Default::default);
                match field {
                    "platform" => platform.platform = Some(text),
                    "precision" => platform.precision = Some(text),
                    "device-index" => platform.device_index = Some(text),
                    "integrator" => platform.integrator = Some(text),
                    _ => return Err(unsupported(key)),
                }
            }
            "output" => {
                let output = self.output.get_or_insert_with(Default::default);
                match field {
                    "folder" => output.folder = Some(text.into()),
                    "trajectory" => output.trajectory = Some(parse_value(key, value)?),
                    "trajectory-name" => output.trajectory_name = Some(text),
                    "energies" => output.energies = Some(parse_value(key, value)?),
                    "energies-name" => output.energies_name = Some(text),
                    "energy-components" => {
                        output.energy_components = Some(parse_value(key, value)?)
                    }
                    "energy-components-name" => output.energy_components_name = Some(text),
                    "interval" => output.interval = Some(parse_value(key, value)?),
                    _ => return Err(unsupported(key)),
                }
            }
            "run" => {
                let run = self.run.get_or_insert_with(Default::default);
                match field {
                    "steps" => run.steps = Some(parse_value(key, value)?),
                    "report" => run.report = Some(parse_value(key, value)?),
                    "report-interval" => run.report_interval = Some(parse_value(key, value)?),
                    _ => return Err(unsupported(key)),
                }
            }
            _ => return Err(unsupported(key)),
        }
        Ok(())
    }
}

fn unsupported(key: &str) -> CliError {
    CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
}

/// Merges defaults, the config file, `-S` overrides and explicit flags,
/// in increasing order of precedence.
pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let mut file = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    file.apply_set_values(&args.set_values)?;

    let input = file.input.take().unwrap_or_default();
    let sim = file.simulation.take().unwrap_or_default();
    let platform = file.platform.take().unwrap_or_default();
    let output = file.output.take().unwrap_or_default();
    let run = file.run.take().unwrap_or_default();

    let mut builder = SimulationConfig::builder()
        .time_step(required(sim.time_step, "simulation.time-step")?)
        .collision_rate(required(sim.collision_rate, "simulation.collision-rate")?)
        .r_cutoff(required(sim.r_cutoff, "simulation.r-cutoff")?)
        .temperature(required(sim.temperature, "simulation.temperature")?);
    if let Some(name) = args.name.clone().or(sim.name) {
        builder = builder.name(name);
    }
    if let Some(pbc) = sim.pbc {
        builder = builder.pbc(pbc);
    }
    if let Some(remove) = sim.remove_cm_motion {
        builder = builder.remove_cm_motion(remove);
    }
    let simulation = builder.build()?;

    let defaults = ReporterOptions::default();
    let reporters = ReporterOptions {
        trajectory: output.trajectory.unwrap_or(defaults.trajectory),
        trajectory_name: output.trajectory_name,
        energies: output.energies.unwrap_or(defaults.energies),
        energies_name: output.energies_name,
        energy_components: output
            .energy_components
            .unwrap_or(defaults.energy_components),
        energy_components_name: output.energy_components_name,
        interval: output.interval.unwrap_or(defaults.interval),
    };
    if reporters.interval == 0 {
        return Err(CliError::Config(
            "output.interval must be a positive number of steps".to_string(),
        ));
    }

    let report_interval = run.report_interval.unwrap_or(DEFAULT_REPORT_INTERVAL);
    if report_interval == 0 {
        return Err(CliError::Config(
            "run.report-interval must be a positive number of steps".to_string(),
        ));
    }

    Ok(AppConfig {
        gro: required(args.gro.clone().or(input.gro), "input.gro")?,
        top: required(args.top.clone().or(input.top), "input.top")?,
        xml: required(args.xml.clone().or(input.xml), "input.xml")?,
        simulation,
        platform: PlatformOptions {
            platform: args
                .platform
                .clone()
                .or(platform.platform)
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            precision: args
                .precision
                .clone()
                .or(platform.precision)
                .unwrap_or_else(|| DEFAULT_PRECISION.to_string()),
            device_index: args
                .device_index
                .clone()
                .or(platform.device_index)
                .unwrap_or_else(|| DEFAULT_DEVICE_INDEX.to_string()),
            integrator: args
                .integrator
                .clone()
                .or(platform.integrator)
                .unwrap_or_else(|| DEFAULT_INTEGRATOR.to_string()),
        },
        seed: args.seed.or(sim.seed),
        folder: args
            .folder
            .clone()
            .or(output.folder)
            .unwrap_or_else(|| PathBuf::from(".")),
        reporters,
        steps: required(args.steps.or(run.steps), "run.steps")?,
        report: run.report.unwrap_or(true),
        report_interval,
    })
}
