use crate::core::io::dcd::{DcdError, DcdWriter};
use crate::engine::context::State;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Number of numbered backups kept for an output file.
pub const MAX_BACKUPS: usize = 10;

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write trajectory '{path}': {source}")]
    Dcd {
        path: PathBuf,
        #[source]
        source: DcdError,
    },
    #[error("Report interval must be positive")]
    ZeroInterval,
}

/// Moves an existing `path` to the first free `path_1` ... `path_10`.
/// Returns the backup location, or `None` when nothing was moved. When all
/// backup slots are taken the file is left in place to be overwritten.
pub fn back_up_existing(path: &Path) -> io::Result<Option<PathBuf>> {
    if !path.is_file() {
        return Ok(None);
    }
    for index in 1..=MAX_BACKUPS {
        let mut name = path.as_os_str().to_owned();
        name.push(format!("_{}", index));
        let backup = PathBuf::from(name);
        if !backup.is_file() {
            info!(
                "{} already exists.  Backing up to {}",
                path.display(),
                backup.display()
            );
            fs::rename(path, &backup)?;
            return Ok(Some(backup));
        }
    }
    Ok(None)
}

fn create_output(path: &Path) -> Result<BufWriter<File>, ReporterError> {
    let io_error = |source| ReporterError::Io {
        path: path.to_path_buf(),
        source,
    };
    back_up_existing(path).map_err(io_error)?;
    File::create(path).map(BufWriter::new).map_err(io_error)
}

/// Periodic observer of a running simulation.
pub trait Reporter {
    /// Steps between two reports.
    fn interval(&self) -> u64;

    fn report(&mut self, state: &State) -> Result<(), ReporterError>;

    /// Flushes buffered output at the end of a run.
    fn finish(&mut self) -> Result<(), ReporterError>;

    fn path(&self) -> &Path;
}

/// Writes positions to a DCD trajectory.
pub struct DcdReporter {
    path: PathBuf,
    interval: u64,
    time_step: f64,
    periodic: bool,
    file: Option<BufWriter<File>>,
    writer: Option<DcdWriter<BufWriter<File>>>,
}

impl DcdReporter {
    pub fn create(
        path: impl Into<PathBuf>,
        interval: u64,
        time_step: f64,
        periodic: bool,
    ) -> Result<Self, ReporterError> {
        if interval == 0 {
            return Err(ReporterError::ZeroInterval);
        }
        let path = path.into();
        let file = create_output(&path)?;
        Ok(Self {
            path,
            interval,
            time_step,
            periodic,
            file: Some(file),
            writer: None,
        })
    }

    fn dcd_error(&self, source: DcdError) -> ReporterError {
        ReporterError::Dcd {
            path: self.path.clone(),
            source,
        }
    }
}

impl Reporter for DcdReporter {
    fn interval(&self) -> u64 {
        self.interval
    }

    fn report(&mut self, state: &State) -> Result<(), ReporterError> {
        if self.writer.is_none() {
            let overflow = |what| DcdError::Overflow(what);
            let first_step = i32::try_from(state.step)
                .map_err(|_| self.dcd_error(overflow("first step")))?;
            let interval = i32::try_from(self.interval)
                .map_err(|_| self.dcd_error(overflow("interval")))?;
            if let Some(file) = self.file.take() {
                let writer = DcdWriter::new(
                    file,
                    state.positions.len(),
                    first_step,
                    interval,
                    self.time_step,
                    self.periodic,
                )
                .map_err(|e| self.dcd_error(e))?;
                self.writer = Some(writer);
            }
        }
        let result = match self.writer.as_mut() {
            Some(writer) => writer.write_frame(&state.positions, state.box_vectors),
            None => Ok(()),
        };
        result.map_err(|e| self.dcd_error(e))
    }

    fn finish(&mut self) -> Result<(), ReporterError> {
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Comma-separated step, energies and temperature.
pub struct StateDataReporter {
    path: PathBuf,
    interval: u64,
    out: BufWriter<File>,
}

impl StateDataReporter {
    pub const HEADER: &'static str = "#\"Step\",\"Potential Energy (kJ/mole)\",\"Kinetic Energy (kJ/mole)\",\"Total Energy (kJ/mole)\",\"Temperature (K)\"";

    pub fn create(path: impl Into<PathBuf>, interval: u64) -> Result<Self, ReporterError> {
        if interval == 0 {
            return Err(ReporterError::ZeroInterval);
        }
        let path = path.into();
        let mut out = create_output(&path)?;
        writeln!(out, "{}", Self::HEADER).map_err(|source| ReporterError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            interval,
            out,
        })
    }

    fn io_error(&self, source: io::Error) -> ReporterError {
        ReporterError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Reporter for StateDataReporter {
    fn interval(&self) -> u64 {
        self.interval
    }

    fn report(&mut self, state: &State) -> Result<(), ReporterError> {
        writeln!(
            self.out,
            "{},{},{},{},{}",
            state.step,
            state.potential_energy,
            state.kinetic_energy,
            state.total_energy(),
            state.temperature
        )
        .map_err(|e| self.io_error(e))
    }

    fn finish(&mut self) -> Result<(), ReporterError> {
        self.out.flush().map_err(|e| self.io_error(e))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Comma-separated energy of every named force, one column per force group.
pub struct ForcesReporter {
    path: PathBuf,
    interval: u64,
    groups: Vec<usize>,
    out: BufWriter<File>,
}

impl ForcesReporter {
    pub fn create(
        path: impl Into<PathBuf>,
        interval: u64,
        force_names: &[(String, usize)],
    ) -> Result<Self, ReporterError> {
        if interval == 0 {
            return Err(ReporterError::ZeroInterval);
        }
        let path = path.into();
        let mut out = create_output(&path)?;
        let mut header = String::from("#\"Step\"");
        for (name, _) in force_names {
            header.push_str(&format!(",\"{}\"", name));
        }
        writeln!(out, "{}", header).map_err(|source| ReporterError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            interval,
            groups: force_names.iter().map(|(_, group)| *group).collect(),
            out,
        })
    }

    fn io_error(&self, source: io::Error) -> ReporterError {
        ReporterError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Reporter for ForcesReporter {
    fn interval(&self) -> u64 {
        self.interval
    }

    fn report(&mut self, state: &State) -> Result<(), ReporterError> {
        let mut line = state.step.to_string();
        for group in &self.groups {
            line.push_str(&format!(",{}", state.group_energy(*group)));
        }
        writeln!(self.out, "{}", line).map_err(|e| self.io_error(e))
    }

    fn finish(&mut self) -> Result<(), ReporterError> {
        self.out.flush().map_err(|e| self.io_error(e))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
