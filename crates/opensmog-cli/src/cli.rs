use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The SMOG development team",
    version,
    about = "OpenSMOG CLI - Molecular dynamics of structure-based models generated by SMOG 2.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used by the CPU platform.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a structure-based model simulation.
    Run(RunArgs),
    /// Load and assemble a system without simulating it, and print its forces.
    Check(CheckArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to the simulation configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Input Overrides ---
    /// Override the coordinate file (.gro).
    #[arg(long, value_name = "PATH")]
    pub gro: Option<PathBuf>,

    /// Override the topology file (.top).
    #[arg(long, value_name = "PATH")]
    pub top: Option<PathBuf>,

    /// Override the OpenSMOG force file (.xml).
    #[arg(long, value_name = "PATH")]
    pub xml: Option<PathBuf>,

    // --- Run Overrides ---
    /// Override the number of integration steps.
    #[arg(short = 'n', long, value_name = "INT")]
    pub steps: Option<u64>,

    /// Override the simulation name used as output file prefix.
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Override the output folder.
    #[arg(short, long, value_name = "PATH")]
    pub folder: Option<PathBuf>,

    /// Fix the random seed for initial velocities and stochastic dynamics.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Platform Overrides ---
    /// Override the platform (reference, cpu, cuda, opencl, hip).
    #[arg(long, value_name = "NAME")]
    pub platform: Option<String>,

    /// Override the precision used by GPU platforms (single, mixed, double).
    #[arg(long, value_name = "NAME")]
    pub precision: Option<String>,

    /// Override the GPU device index.
    #[arg(long, value_name = "INDEX")]
    pub device_index: Option<String>,

    /// Override the integrator (langevin, verlet, brownian).
    #[arg(long, value_name = "NAME")]
    pub integrator: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S simulation.temperature=0.6
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the coordinate file (.gro).
    #[arg(long, required = true, value_name = "PATH")]
    pub gro: PathBuf,

    /// Path to the topology file (.top).
    #[arg(long, required = true, value_name = "PATH")]
    pub top: PathBuf,

    /// Path to the OpenSMOG force file (.xml).
    #[arg(long, required = true, value_name = "PATH")]
    pub xml: PathBuf,

    /// Use periodic boundary conditions.
    #[arg(long)]
    pub pbc: bool,

    /// Nonbonded cutoff in nm.
    #[arg(long, default_value_t = 3.0, value_name = "FLOAT")]
    pub r_cutoff: f64,
}
