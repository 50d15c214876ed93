use crate::cli::CheckArgs;
use crate::error::Result;
use opensmog::engine::assembly::AssembledSystem;
use opensmog::engine::config::SimulationConfig;
use opensmog::engine::context::State;
use opensmog::workflows::simulation::Sbm;
use std::fmt::Write as _;
use tracing::info;

const CHECK_TIME_STEP: f64 = 0.0005;
const CHECK_COLLISION_RATE: f64 = 1.0;
const CHECK_TEMPERATURE: f64 = 0.5;

pub fn run(args: CheckArgs) -> Result<()> {
    let config = SimulationConfig::builder()
        .time_step(CHECK_TIME_STEP)
        .collision_rate(CHECK_COLLISION_RATE)
        .r_cutoff(args.r_cutoff)
        .temperature(CHECK_TEMPERATURE)
        .pbc(args.pbc)
        .build()?;

    let mut sbm = Sbm::new(config);
    sbm.setup_platform("reference", "double", "default", "langevin")?;
    sbm.set_seed(0);
    sbm.load_system(&args.gro, &args.top, &args.xml)?;
    sbm.create_simulation()?;
    let state = sbm.state()?;

    let Some(assembled) = sbm.assembled() else {
        return Ok(());
    };
    info!(
        "Assembled {} forces for {} particles",
        assembled.system.forces().len(),
        assembled.system.num_particles()
    );
    print!("{}", format_summary(assembled, &state));
    Ok(())
}

/// One line per force with its group, kind, size and initial energy.
pub fn format_summary(assembled: &AssembledSystem, state: &State) -> String {
    let system = &assembled.system;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Particles: {}  Model: {:?}  Periodic: {}",
        system.num_particles(),
        assembled.model,
        if system.box_vectors().is_some() { "yes" } else { "no" }
    );
    let _ = writeln!(
        out,
        "{:<24} {:>5}  {:<22} {:>8}  {:>16}",
        "Force", "Group", "Kind", "Terms", "Energy (kJ/mol)"
    );
    let _ = writeln!(out, "{}", "-".repeat(80));
    for force in system.forces() {
        let reported = assembled
            .force_names
            .iter()
            .any(|(name, _)| name == &force.name);
        let energy = if reported {
            format!("{:.4}", state.group_energy(force.group))
        } else {
            "-".to_string()
        };
        let _ = writeln!(
            out,
            "{:<24} {:>5}  {:<22} {:>8}  {:>16}",
            force.name,
            force.group,
            force.kind.label(),
            force.kind.size(),
            energy
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(80));
    let _ = writeln!(
        out,
        "{:<24} {:>5}  {:<22} {:>8}  {:>16.4}",
        "Total", "", "", "", state.potential_energy
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const GRO: &str = "\
dimer
    2
    1MET     CA    1   1.000   1.000   1.000
    2GLY     CA    2   1.380   1.000   1.000
   5.00000   5.00000   5.00000
";

    const TOP: &str = "\
[ defaults ]
  1 1 no 1.0 1.0

[ atomtypes ]
 CA   1.0   0.0    A     0.0  5.96e-09

[ moleculetype ]
Dimer 3

[ atoms ]
 1 CA 1 MET CA 1 0.0 1.0
 2 CA 2 GLY CA 2 0.0 1.0

[ bonds ]
 1 2 1 0.38 2.0e4

[ system ]
dimer

[ molecules ]
Dimer 1
";

    const XML: &str = r#"<OpenSMOGforces>
  <OpenSMOGminVersion>1.0</OpenSMOGminVersion>
  <contacts>
    <contacts_type name="contact_1-6-12">
      <expression expr="A/r^12-B/r^6"/>
      <parameter>A</parameter>
      <parameter>B</parameter>
      <interaction i="1" j="2" A="1.0e-6" B="2.0e-3"/>
    </contacts_type>
  </contacts>
</OpenSMOGforces>"#;

    fn write_inputs(dir: &std::path::Path) -> CheckArgs {
        let gro = dir.join("dimer.gro");
        let top = dir.join("dimer.top");
        let xml = dir.join("dimer.xml");
        fs::write(&gro, GRO).unwrap();
        fs::write(&top, TOP).unwrap();
        fs::write(&xml, XML).unwrap();
        CheckArgs {
            gro,
            top,
            xml,
            pbc: false,
            r_cutoff: 1.2,
        }
    }

    #[test]
    fn check_loads_and_assembles_inputs() {
        let dir = tempdir().unwrap();
        run(write_inputs(dir.path())).unwrap();
    }

    #[test]
    fn summary_lists_every_named_force_with_energy() {
        let dir = tempdir().unwrap();
        let args = write_inputs(dir.path());
        let config = SimulationConfig::builder()
            .time_step(CHECK_TIME_STEP)
            .collision_rate(CHECK_COLLISION_RATE)
            .r_cutoff(args.r_cutoff)
            .temperature(CHECK_TEMPERATURE)
            .build()
            .unwrap();
        let mut sbm = Sbm::new(config);
        sbm.setup_platform("reference", "double", "default", "langevin")
            .unwrap();
        sbm.load_system(&args.gro, &args.top, &args.xml).unwrap();
        sbm.create_simulation().unwrap();
        let state = sbm.state().unwrap();
        let summary = format_summary(sbm.assembled().unwrap(), &state);

        assert!(summary.starts_with("Particles: 2  Model: CAlpha  Periodic: no"));
        for name in ["Bonds", "Dihedrals", "contact_1-6-12", "CMMotionRemover"] {
            assert!(summary.contains(name), "missing {}", name);
        }
        let bond_line = summary
            .lines()
            .find(|line| line.starts_with("Bonds"))
            .unwrap();
        assert!(bond_line.trim_end().ends_with("0.0000"));
        assert!(summary.lines().last().unwrap().starts_with("Total"));
    }

    #[test]
    fn check_rejects_wrong_extension() {
        let dir = tempdir().unwrap();
        let mut args = write_inputs(dir.path());
        let renamed = dir.path().join("dimer.txt");
        fs::rename(&args.top, &renamed).unwrap();
        args.top = renamed;
        assert!(run(args).is_err());
    }
}
