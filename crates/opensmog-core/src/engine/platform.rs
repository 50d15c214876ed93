use super::config::ConfigError;
use super::error::EngineError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformKind {
    Reference,
    #[default]
    Cpu,
    Cuda,
    OpenCl,
    Hip,
}

impl PlatformKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Reference => "Reference",
            Self::Cpu => "CPU",
            Self::Cuda => "CUDA",
            Self::OpenCl => "OpenCL",
            Self::Hip => "HIP",
        }
    }

    pub fn is_gpu(self) -> bool {
        matches!(self, Self::Cuda | Self::OpenCl | Self::Hip)
    }

    /// Whether the in-crate backend can execute on this platform.
    pub fn is_available(self) -> bool {
        !self.is_gpu()
    }
}

impl FromStr for PlatformKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "opencl" => Ok(Self::OpenCl),
            "hip" => Ok(Self::Hip),
            _ => Err(ConfigError::UnknownPlatform(s.to_string())),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Single,
    Mixed,
    Double,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Mixed => "mixed",
            Self::Double => "double",
        }
    }
}

impl FromStr for Precision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "mixed" => Ok(Self::Mixed),
            "double" => Ok(Self::Double),
            _ => Err(ConfigError::InvalidPrecision(s.to_string())),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegratorKind {
    #[default]
    Langevin,
    Verlet,
    Brownian,
}

impl IntegratorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Langevin => "langevin",
            Self::Verlet => "verlet",
            Self::Brownian => "brownian",
        }
    }
}

impl FromStr for IntegratorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "langevin" => Ok(Self::Langevin),
            "verlet" => Ok(Self::Verlet),
            "brownian" => Ok(Self::Brownian),
            _ => Err(ConfigError::UnknownIntegrator(s.to_string())),
        }
    }
}

impl fmt::Display for IntegratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where and how a simulation is executed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformConfig {
    pub kind: PlatformKind,
    pub precision: Precision,
    /// Comma-separated device indices, used only by GPU platforms.
    pub device_index: Option<String>,
    pub integrator: IntegratorKind,
}

impl PlatformConfig {
    /// Builds a configuration from user-facing option strings. A device index
    /// of `"default"` means no explicit device selection.
    pub fn from_options(
        platform: &str,
        precision: &str,
        device_index: &str,
        integrator: &str,
    ) -> Result<Self, ConfigError> {
        let device_index = match device_index.trim() {
            index if index.eq_ignore_ascii_case("default") || index.is_empty() => None,
            index => Some(index.to_string()),
        };
        Ok(Self {
            kind: platform.parse()?,
            precision: precision.parse()?,
            device_index,
            integrator: integrator.parse()?,
        })
    }

    /// Platform properties as they would be handed to the device runtime.
    /// CPU and Reference platforms take no properties.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        if self.kind.is_gpu() {
            properties.insert("Precision".to_string(), self.precision.as_str().to_string());
            if let Some(index) = &self.device_index {
                properties.insert("DeviceIndex".to_string(), index.clone());
            }
        }
        properties
    }

    pub fn ensure_available(&self) -> Result<(), EngineError> {
        if self.kind.is_available() {
            Ok(())
        } else {
            Err(EngineError::PlatformUnavailable(self.kind.name().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_names_parse_case_insensitively() {
        assert_eq!("OpenCL".parse::<PlatformKind>().unwrap(), PlatformKind::OpenCl);
        assert_eq!("cuda".parse::<PlatformKind>().unwrap(), PlatformKind::Cuda);
        assert_eq!(" Reference ".parse::<PlatformKind>().unwrap(), PlatformKind::Reference);
        assert_eq!(
            "metal".parse::<PlatformKind>(),
            Err(ConfigError::UnknownPlatform("metal".into()))
        );
    }

    #[test]
    fn invalid_precision_is_rejected_with_message() {
        let err = "quad".parse::<Precision>().unwrap_err();
        assert!(err.to_string().starts_with("Precision must be mixed, single or double"));
    }

    #[test]
    fn gpu_properties_include_precision_and_device() {
        let config = PlatformConfig::from_options("cuda", "Mixed", "0,1", "langevin").unwrap();
        let properties = config.properties();
        assert_eq!(properties.get("Precision").map(String::as_str), Some("mixed"));
        assert_eq!(properties.get("DeviceIndex").map(String::as_str), Some("0,1"));
    }

    #[test]
    fn default_device_index_is_omitted() {
        let config = PlatformConfig::from_options("opencl", "single", "default", "langevin").unwrap();
        assert!(!config.properties().contains_key("DeviceIndex"));
    }

    #[test]
    fn cpu_and_reference_have_no_properties() {
        for platform in ["cpu", "reference"] {
            let config = PlatformConfig::from_options(platform, "double", "0", "verlet").unwrap();
            assert!(config.properties().is_empty());
            assert!(config.ensure_available().is_ok());
        }
    }

    #[test]
    fn gpu_platforms_are_unavailable() {
        let config = PlatformConfig::from_options("hip", "single", "default", "langevin").unwrap();
        assert!(matches!(
            config.ensure_available(),
            Err(EngineError::PlatformUnavailable(name)) if name == "HIP"
        ));
    }

    #[test]
    fn integrators_parse() {
        assert_eq!("Brownian".parse::<IntegratorKind>().unwrap(), IntegratorKind::Brownian);
        assert!(matches!(
            "variableLangevin".parse::<IntegratorKind>(),
            Err(ConfigError::UnknownIntegrator(_))
        ));
    }
}
