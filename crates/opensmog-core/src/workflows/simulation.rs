use super::logfile::{LOG_FILE_NAME, RunLog, header};
use super::reporters::{
    DcdReporter, ForcesReporter, Reporter, ReporterError, StateDataReporter, back_up_existing,
};
use crate::core::io::gro::{GroError, GroFile};
use crate::core::io::smog_xml::{SmogXml, SmogXmlError};
use crate::core::io::top::{TopError, TopFile};
use crate::core::io::traits::InputFile;
use crate::core::models::structure::Structure;
use crate::engine::assembly::{AssembledSystem, SystemAssembler};
use crate::engine::config::{ConfigError, SimulationConfig};
use crate::engine::context::{Context, State};
use crate::engine::error::{AssemblyError, EngineError};
use crate::engine::integrators::Integrator;
use crate::engine::platform::PlatformConfig;
use crate::engine::progress::{Progress, ProgressReporter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Wrong file extension: {file} must to be {extension} extension")]
    WrongExtension { file: String, extension: &'static str },

    #[error("Failed to read coordinate file: {0}")]
    Gro(#[from] GroError),

    #[error("Failed to read topology file: {0}")]
    Top(#[from] TopError),

    #[error("Failed to read xml file: {0}")]
    Xml(#[from] SmogXmlError),

    #[error("Failed to build the system: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Simulation engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Reporter error: {0}")]
    Reporter(#[from] ReporterError),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    InvalidState(&'static str),
}

/// Which output files a simulation writes, and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterOptions {
    pub trajectory: bool,
    /// File stem of the trajectory; `<name>_trajectory` by default.
    pub trajectory_name: Option<String>,
    pub energies: bool,
    pub energies_name: Option<String>,
    pub energy_components: bool,
    pub energy_components_name: Option<String>,
    pub interval: u64,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            trajectory: true,
            trajectory_name: None,
            energies: true,
            energies_name: None,
            energy_components: false,
            energy_components_name: None,
            interval: 1000,
        }
    }
}

struct LoadedSystem {
    inputs: [PathBuf; 3],
    structure: Structure,
    assembled: AssembledSystem,
}

/// Drives one structure-based model simulation from input files to output.
pub struct Sbm {
    config: SimulationConfig,
    platform: PlatformConfig,
    folder: PathBuf,
    seed: Option<u64>,
    loaded: Option<LoadedSystem>,
    context: Option<Context>,
    reporters: Vec<Box<dyn Reporter>>,
    outputs: Vec<PathBuf>,
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.rsplit_once('.').map(|(stem, _)| stem)
}

fn check_extension(path: &Path, extension: &'static str) -> Result<(), SimulationError> {
    let name = path.to_string_lossy();
    if name.to_lowercase().ends_with(extension) {
        Ok(())
    } else {
        Err(SimulationError::WrongExtension {
            file: name.into_owned(),
            extension,
        })
    }
}

/// Whether the three input files share a file name prefix.
pub fn same_prefix(gro: &Path, top: &Path, xml: &Path) -> bool {
    let stem = file_stem(gro);
    stem == file_stem(top) && stem == file_stem(xml)
}

impl Sbm {
    #[instrument(skip_all, fields(name = %config.name))]
    pub fn new(config: SimulationConfig) -> Self {
        for line in header().lines() {
            info!("{}", line);
        }
        config.log_warnings();
        Self {
            config,
            platform: PlatformConfig::default(),
            folder: PathBuf::from("."),
            seed: None,
            loaded: None,
            context: None,
            reporters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn platform(&self) -> &PlatformConfig {
        &self.platform
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    pub fn assembled(&self) -> Option<&AssembledSystem> {
        self.loaded.as_ref().map(|loaded| &loaded.assembled)
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Fixes the random seed used for velocities and stochastic dynamics.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    /// Selects the platform from user-facing option strings.
    pub fn setup_platform(
        &mut self,
        platform: &str,
        precision: &str,
        device_index: &str,
        integrator: &str,
    ) -> Result<(), SimulationError> {
        let platform = PlatformConfig::from_options(platform, precision, device_index, integrator)?;
        platform.ensure_available()?;
        info!(
            "Platform {} selected with the {} integrator",
            platform.kind, platform.integrator
        );
        self.platform = platform;
        Ok(())
    }

    /// Sets the output folder, creating it if needed.
    pub fn save_folder(&mut self, folder: impl AsRef<Path>) -> Result<(), SimulationError> {
        let folder = folder.as_ref();
        if !folder.exists() {
            fs::create_dir_all(folder).map_err(|source| SimulationError::Io {
                path: folder.to_path_buf(),
                source,
            })?;
        }
        self.folder = folder.to_path_buf();
        Ok(())
    }

    /// Loads the coordinate, topology and XML files and builds the system.
    #[instrument(skip_all, name = "load_system")]
    pub fn load_system(
        &mut self,
        gro: impl AsRef<Path>,
        top: impl AsRef<Path>,
        xml: impl AsRef<Path>,
    ) -> Result<(), SimulationError> {
        if self.loaded.is_some() {
            info!("Contacts forces already applied");
            return Ok(());
        }
        let (gro, top, xml) = (gro.as_ref(), top.as_ref(), xml.as_ref());
        if !same_prefix(gro, top, xml) {
            warn!(
                "The Gro, Top and Xml files have different prefixes. Most people use the same name, so this may be a mistake."
            );
        }

        check_extension(gro, ".gro")?;
        let structure = GroFile::read_from_path(gro)?;
        check_extension(top, ".top")?;
        let topology = TopFile::read_from_path(top)?;
        check_extension(xml, ".xml")?;
        let custom = SmogXml::read_from_path(xml)?;

        let assembled =
            SystemAssembler::new(&structure, &topology, &custom, &self.config).assemble()?;
        info!("Files loaded in the system.");

        self.loaded = Some(LoadedSystem {
            inputs: [gro.to_path_buf(), top.to_path_buf(), xml.to_path_buf()],
            structure,
            assembled,
        });
        Ok(())
    }

    /// Creates the simulation context with the initial positions and
    /// velocities drawn at the configured temperature.
    pub fn create_simulation(&mut self) -> Result<(), SimulationError> {
        if self.context.is_some() {
            info!("Simulation context already created");
            return Ok(());
        }
        let loaded = self.loaded.as_ref().ok_or(SimulationError::InvalidState(
            "load_system must be called before create_simulation",
        ))?;

        let integrator = Integrator::new(
            self.platform.integrator,
            self.config.time_step,
            self.config.collision_rate,
            self.config.kt(),
        )?;
        let mut context = Context::new(
            loaded.assembled.system.clone(),
            integrator,
            self.platform.clone(),
            self.seed,
        )?;
        context.set_positions(&loaded.structure.positions)?;
        context.set_velocities_to_temperature(self.config.temperature_kelvin());
        self.context = Some(context);
        Ok(())
    }

    fn output_path(&self, custom: Option<&str>, default_suffix: &str, extension: &str) -> PathBuf {
        match custom {
            Some(stem) => self.folder.join(format!("{}.{}", stem, extension)),
            None => self
                .folder
                .join(format!("{}_{}.{}", self.config.name, default_suffix, extension)),
        }
    }

    /// Opens the requested output files, backing up any existing ones.
    pub fn create_reporters(&mut self, options: &ReporterOptions) -> Result<(), SimulationError> {
        let (Some(context), Some(loaded)) = (self.context.as_ref(), self.loaded.as_ref()) else {
            return Err(SimulationError::InvalidState(
                "create_simulation must be called before create_reporters",
            ));
        };
        let periodic = context.system().box_vectors().is_some();
        let force_names = loaded.assembled.force_names.clone();

        self.outputs.clear();
        self.reporters.clear();
        if options.trajectory {
            let path = self.output_path(options.trajectory_name.as_deref(), "trajectory", "dcd");
            let reporter =
                DcdReporter::create(&path, options.interval, self.config.time_step, periodic)?;
            self.reporters.push(Box::new(reporter));
            self.outputs.push(path);
        }
        if options.energies {
            let path = self.output_path(options.energies_name.as_deref(), "energies", "txt");
            self.reporters
                .push(Box::new(StateDataReporter::create(&path, options.interval)?));
            self.outputs.push(path);
        }
        if options.energy_components {
            let path =
                self.output_path(options.energy_components_name.as_deref(), "forces", "txt");
            self.reporters.push(Box::new(ForcesReporter::create(
                &path,
                options.interval,
                &force_names,
            )?));
            self.outputs.push(path);
        }
        Ok(())
    }

    fn write_run_log(&mut self) -> Result<(), SimulationError> {
        let Some(loaded) = self.loaded.as_ref() else {
            return Err(SimulationError::InvalidState("no system loaded"));
        };
        let path = self.folder.join(LOG_FILE_NAME);
        let io_error = |source| SimulationError::Io {
            path: path.clone(),
            source,
        };
        back_up_existing(&path).map_err(io_error)?;
        let mut outputs = self.outputs.clone();
        if !outputs.contains(&path) {
            outputs.push(path.clone());
        }
        let log = RunLog {
            config: &self.config,
            platform: &self.platform,
            folder: &self.folder,
            inputs: &loaded.inputs,
            outputs: &outputs,
        };
        fs::write(&path, log.render(chrono::Local::now())).map_err(io_error)?;
        self.outputs = outputs;
        Ok(())
    }

    /// Advances the simulation by `steps`, driving the reporters. With
    /// `report` set, progress is published every `interval` steps.
    #[instrument(skip(self, progress))]
    pub fn run(
        &mut self,
        steps: u64,
        report: bool,
        interval: u64,
        progress: &ProgressReporter,
    ) -> Result<(), SimulationError> {
        if self.context.is_none() {
            return Err(SimulationError::InvalidState(
                "create_simulation must be called before run",
            ));
        }
        if report && interval == 0 {
            return Err(ReporterError::ZeroInterval.into());
        }
        self.write_run_log()?;

        let Some(context) = self.context.as_mut() else {
            return Err(SimulationError::InvalidState("no simulation context"));
        };
        let reporters = &mut self.reporters;
        let start = context.current_step();
        let end = start + steps;
        let started = Instant::now();

        progress.report(Progress::TaskStart { total_steps: steps });
        let next_multiple = |now: u64, every: u64| (now / every + 1) * every;
        while context.current_step() < end {
            let now = context.current_step();
            let mut next = end;
            for reporter in reporters.iter() {
                next = next.min(next_multiple(now, reporter.interval()));
            }
            if report {
                next = next.min(next_multiple(now, interval));
            }
            context.step(next - now)?;
            progress.report(Progress::TaskAdvance { steps: next - now });

            let due: Vec<usize> = reporters
                .iter()
                .enumerate()
                .filter(|(_, r)| next % r.interval() == 0)
                .map(|(i, _)| i)
                .collect();
            let show = report && next % interval == 0;
            if due.is_empty() && !show {
                continue;
            }
            let state = context.state()?;
            for index in due {
                reporters[index].report(&state)?;
            }
            if show {
                log_progress(&state, next - start, steps, started);
            }
        }
        for reporter in reporters.iter_mut() {
            reporter.finish()?;
        }
        progress.report(Progress::TaskFinish);
        info!("Simulation finished after {} steps", steps);
        Ok(())
    }

    /// Current state of the running simulation.
    pub fn state(&mut self) -> Result<State, SimulationError> {
        match self.context.as_mut() {
            Some(context) => Ok(context.state()?),
            None => Err(SimulationError::InvalidState(
                "create_simulation must be called before state",
            )),
        }
    }
}

fn log_progress(state: &State, done: u64, total: u64, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    let fraction = done as f64 / total.max(1) as f64;
    let ns_per_day = if elapsed > 0.0 {
        state.time.max(0.0) / 1000.0 / elapsed * 86_400.0
    } else {
        0.0
    };
    let remaining = if fraction > 0.0 {
        elapsed * (1.0 - fraction) / fraction
    } else {
        0.0
    };
    info!(
        "#Step {}\tProgress {:.1}%\tPotential {:.4}\tKinetic {:.4}\tTemperature {:.2} K\tSpeed {:.3} ns/day\tRemaining {:.0} s",
        state.step,
        100.0 * fraction,
        state.potential_energy,
        state.kinetic_energy,
        state.temperature,
        ns_per_day,
        remaining
    );
}
