use std::fmt::Display;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use mzspot::params::{AcquisitionType, IonMode, ProcessingParameters};

/// The configuration file read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "mzspotter.toml";

/// The prefix of environment variables overriding processing parameters. Nested keys are
/// separated by `__`, e.g. `MZSPOTTER_PEAK_PICK__MINIMUM_AMPLITUDE`.
pub const ENV_PREFIX: &str = "MZSPOTTER_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgIonMode {
    Positive,
    Negative,
}

impl From<ArgIonMode> for IonMode {
    fn from(value: ArgIonMode) -> Self {
        match value {
            ArgIonMode::Positive => IonMode::Positive,
            ArgIonMode::Negative => IonMode::Negative,
        }
    }
}

impl Display for ArgIonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", IonMode::from(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgAcquisitionType {
    /// Data dependent acquisition
    Dda,
    /// All-ions fragmentation
    Aif,
    /// Sequential isolation windows
    Swath,
}

impl From<ArgAcquisitionType> for AcquisitionType {
    fn from(value: ArgAcquisitionType) -> Self {
        match value {
            ArgAcquisitionType::Dda => AcquisitionType::DDA,
            ArgAcquisitionType::Aif => AcquisitionType::AIF,
            ArgAcquisitionType::Swath => AcquisitionType::SWATH,
        }
    }
}

impl Display for ArgAcquisitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", AcquisitionType::from(*self))
    }
}

/// Layer the processing parameter sources from lowest to highest precedence: `base`,
/// [`DEFAULT_CONFIG_FILE`] in the working directory, `config_file`, then the environment.
pub fn parameter_sources(base: &ProcessingParameters, config_file: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(base)).merge(Toml::file(DEFAULT_CONFIG_FILE));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file_exact(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// The stem used to name a sample's outputs, with compression and format extensions removed
pub fn sample_name_of(path: &Path) -> String {
    let mut name = PathBuf::from(path.file_name().unwrap_or(path.as_os_str()));
    while let Some(ext) = name.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if matches!(ext.as_str(), "gz" | "mzml" | "mgf" | "mzmlb" | "raw") {
            name.set_extension("");
        } else {
            break;
        }
    }
    name.to_string_lossy().to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sample_name() {
        assert_eq!(sample_name_of(Path::new("data/run_01.mzML")), "run_01");
        assert_eq!(sample_name_of(Path::new("run_01.mzML.gz")), "run_01");
        assert_eq!(sample_name_of(Path::new("run.v2.mgf")), "run.v2");
    }

    #[test]
    fn test_overrides() {
        assert_eq!(IonMode::from(ArgIonMode::Negative), IonMode::Negative);
        assert_eq!(
            AcquisitionType::from(ArgAcquisitionType::Swath),
            AcquisitionType::SWATH
        );
    }

    #[test]
    fn test_env_layer() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MZSPOTTER_PEAK_PICK__MINIMUM_AMPLITUDE", "2500");
            jail.set_env("MZSPOTTER_ION_MODE", "Negative");
            let params: ProcessingParameters =
                parameter_sources(&ProcessingParameters::default(), None).extract()?;
            assert_eq!(params.peak_pick.minimum_amplitude, 2500.0);
            assert_eq!(params.ion_mode, IonMode::Negative);
            Ok(())
        });
    }

    #[test]
    fn test_file_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [alignment]
                retention_time_tolerance = 0.25
                "#,
            )?;
            jail.create_file(
                "override.toml",
                r#"
                [alignment]
                ms1_tolerance = 0.02
                "#,
            )?;
            let params: ProcessingParameters = parameter_sources(
                &ProcessingParameters::default(),
                Some(Path::new("override.toml")),
            )
            .extract()?;
            assert_eq!(params.alignment.retention_time_tolerance, 0.25);
            assert_eq!(params.alignment.ms1_tolerance, 0.02);
            Ok(())
        });
    }
}
