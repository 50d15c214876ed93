use crate::cli::RunArgs;
use crate::config::{AppConfig, build_config};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use opensmog::engine::progress::ProgressReporter;
use opensmog::workflows::simulation::Sbm;
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;
    let sbm = simulate(&app, &CliProgressHandler::new())?;

    println!("Simulation '{}' finished.", app.simulation.name);
    for path in sbm.outputs() {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

/// Performs every setup stage of a simulation in order, then runs it.
pub fn simulate(app: &AppConfig, progress: &CliProgressHandler) -> Result<Sbm> {
    let mut sbm = Sbm::new(app.simulation.clone());
    sbm.setup_platform(
        &app.platform.platform,
        &app.platform.precision,
        &app.platform.device_index,
        &app.platform.integrator,
    )?;
    if let Some(seed) = app.seed {
        sbm.set_seed(seed);
    }
    sbm.save_folder(&app.folder)?;

    info!("Loading {:?}, {:?} and {:?}", app.gro, app.top, app.xml);
    sbm.load_system(&app.gro, &app.top, &app.xml)?;
    sbm.create_simulation()?;
    sbm.create_reporters(&app.reporters)?;

    let reporter = ProgressReporter::with_callback(progress.get_callback());
    println!("Running {} steps...", app.steps);
    sbm.run(app.steps, app.report, app.report_interval, &reporter)?;
    Ok(sbm)
}
