use crate::engine::config::SimulationConfig;
use crate::engine::platform::PlatformConfig;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = "OpenSMOG.log";

const HEADER_WIDTH: usize = 96;
const RULE: &str =
    "****************************************************************************************";

/// Banner printed when a simulation is set up and at the top of the run log.
pub fn header() -> String {
    let title = format!(
        "**** *** *** *** *** *** *** *** OpenSMOG-{} *** *** *** *** *** *** *** ****",
        env!("CARGO_PKG_VERSION")
    );
    let lines: [&str; 21] = [
        RULE,
        &title,
        "",
        "The OpenSMOG classes perform molecular dynamics simulations using",
        "Structure-Based Models (SBM) for biomolecular systems,",
        "and it allows for the simulation of a wide variety of potential forms.",
        "OpenSMOG uses force field files generated by SMOG 2.",
        "OpenSMOG documentation is available at https://opensmog.readthedocs.io",
        "",
        "OpenSMOG is described in: Oliveira and Contessoto et al,",
        "SMOG 2 and OpenSMOG: Extending the limits of structure-based models.",
        "bioRxiv, DOI:10.1101/2021.08.15.456423.",
        "",
        "This package is the product of contributions from a number of people, including:",
        "Jeffrey Noel, Mariana Levi, Antonio Oliveira, Vinícius Contessoto,",
        "Mohit Raghunathan, Joyce Yang, Prasad Bandarkar, Udayan Mohanty,",
        "Ailun Wang, Heiko Lammert, Ryan Hayes",
        "Jose Onuchic & Paul Whitford",
        "",
        "Copyright (c) 2021, The SMOG development team at",
        "Rice University and Northeastern University",
    ];
    let mut out = String::new();
    for line in lines.iter().chain(std::iter::once(&RULE)) {
        let _ = writeln!(out, "{:^width$}", line, width = HEADER_WIDTH);
    }
    out
}

/// Everything recorded in the run log of one simulation.
pub struct RunLog<'a> {
    pub config: &'a SimulationConfig,
    pub platform: &'a PlatformConfig,
    pub folder: &'a Path,
    pub inputs: &'a [PathBuf; 3],
    pub outputs: &'a [PathBuf],
}

impl RunLog<'_> {
    pub fn render(&self, now: DateTime<Local>) -> String {
        let mut out = header();
        let config = self.config;

        let _ = writeln!(out, "\nSystem Information:");
        let _ = writeln!(out, "-------------------");
        let _ = writeln!(out, "Date and time: {}", now.format("%Y-%m-%d %H:%M:%S%.6f"));
        let _ = writeln!(
            out,
            "Machine information: System : {}, Version : {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let _ = writeln!(out, "Platform: {}", self.platform.kind);
        if self.platform.kind.is_gpu() {
            let _ = writeln!(out, "Precision: {}", self.platform.precision);
        }
        let _ = writeln!(out, "Integrator: {}", self.platform.integrator);
        let _ = writeln!(out, "Savefolder: {}", self.folder.display());

        let _ = writeln!(out, "\nSimulation Information:");
        let _ = writeln!(out, "-----------------------");
        let _ = writeln!(out, "Name: {}", config.name);
        let _ = writeln!(out, "Time step: {}", config.time_step);
        let _ = writeln!(out, "Collision Rate: {}", config.collision_rate);
        let _ = writeln!(out, "r_Cutoff: {}", config.r_cutoff);
        let _ = writeln!(out, "Temperature: {}", config.temperature);

        let _ = writeln!(out, "\nInput Files:");
        let _ = writeln!(out, "------------");
        for (label, path) in ["GroFile", "TopFile", "XmlFile"].iter().zip(self.inputs) {
            let _ = writeln!(out, "{}: {}", label, path.display());
        }

        let _ = writeln!(out, "\nOutput Files:");
        let _ = writeln!(out, "-------------");
        for path in self.outputs {
            let _ = writeln!(out, "{}", path.display());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::platform::PlatformKind;
    use chrono::TimeZone;

    #[test]
    fn header_lines_are_centered() {
        let header = header();
        let lines: Vec<_> = header.lines().collect();
        assert_eq!(lines.len(), 22);
        assert_eq!(lines[0].chars().count(), HEADER_WIDTH);
        assert!(lines[1].contains("OpenSMOG-"));
        assert_eq!(lines[0], lines[21]);
    }

    #[test]
    fn run_log_lists_sections_in_order() {
        let config = SimulationConfig::builder()
            .name("villin")
            .time_step(0.0005)
            .collision_rate(1.0)
            .r_cutoff(3.0)
            .temperature(0.5)
            .build()
            .unwrap();
        let platform = PlatformConfig {
            kind: PlatformKind::Reference,
            ..Default::default()
        };
        let inputs = [
            PathBuf::from("villin.gro"),
            PathBuf::from("villin.top"),
            PathBuf::from("villin.xml"),
        ];
        let outputs = vec![PathBuf::from("out/villin_energies.txt")];
        let log = RunLog {
            config: &config,
            platform: &platform,
            folder: Path::new("out"),
            inputs: &inputs,
            outputs: &outputs,
        };
        let now = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let text = log.render(now);

        let order = [
            "System Information:",
            "Date and time: 2024-05-01 12:30:00",
            "Platform: Reference",
            "Integrator: langevin",
            "Savefolder: out",
            "Simulation Information:",
            "Name: villin",
            "Time step: 0.0005",
            "Temperature: 0.5",
            "Input Files:",
            "GroFile: villin.gro",
            "XmlFile: villin.xml",
            "Output Files:",
            "out/villin_energies.txt",
        ];
        let mut cursor = 0;
        for needle in order {
            let found = text[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("'{}' missing or out of order", needle));
            cursor += found + needle.len();
        }
        assert!(!text.contains("Precision:"));
    }
}
