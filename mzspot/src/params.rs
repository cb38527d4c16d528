//! Processing parameters for feature detection, isotope and character estimation and
//! alignment. All groups provide defaults so partial configurations can be deserialized.
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::ccs::{CcsCalibration, MobilityType};
use crate::smoothing::SmoothingMethod;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IonMode {
    #[default]
    Positive,
    Negative,
}

impl IonMode {
    pub fn sign(&self) -> i32 {
        match self {
            IonMode::Positive => 1,
            IonMode::Negative => -1,
        }
    }
}

impl Display for IonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IonMode::Positive => f.write_str("positive"),
            IonMode::Negative => f.write_str("negative"),
        }
    }
}

/// How MS2 scans relate to their precursors
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AcquisitionType {
    /// Data dependent acquisition, one selected precursor per MS2 scan
    #[default]
    DDA,
    /// All-ions fragmentation, cycling through several collision energies
    AIF,
    /// Sequential isolation windows
    SWATH,
}

impl AcquisitionType {
    /// Whether MS2 scans are matched by isolation window rather than selected precursor
    pub fn is_data_independent(&self) -> bool {
        matches!(self, Self::AIF | Self::SWATH)
    }

    /// Whether the acquisition enumerates several collision energies per cycle
    pub fn is_multi_ce(&self) -> bool {
        matches!(self, Self::AIF)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} {value:?}")]
pub struct ParameterParseError {
    kind: &'static str,
    value: String,
}

impl FromStr for IonMode {
    type Err = ParameterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "pos" | "+" => Ok(Self::Positive),
            "negative" | "neg" | "-" => Ok(Self::Negative),
            _ => Err(ParameterParseError {
                kind: "ion mode",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for AcquisitionType {
    type Err = ParameterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DDA" => Ok(Self::DDA),
            "AIF" => Ok(Self::AIF),
            "SWATH" | "DIA" => Ok(Self::SWATH),
            _ => Err(ParameterParseError {
                kind: "acquisition type",
                value: s.to_string(),
            }),
        }
    }
}

/// A mass to ignore during peak spotting
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExcludedMass {
    pub mass: f64,
    pub tolerance: f64,
}

impl ExcludedMass {
    pub fn new(mass: f64, tolerance: f64) -> Self {
        Self { mass, tolerance }
    }

    pub fn contains(&self, mass: f64) -> bool {
        (self.mass - mass).abs() <= self.tolerance
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PeakPickParameters {
    pub mass_slice_width: f64,
    pub centroid_ms1_tolerance: f64,
    pub centroid_ms2_tolerance: f64,
    pub minimum_datapoints: usize,
    pub minimum_amplitude: f64,
    pub noise_factor: f64,
    pub smoothing_method: SmoothingMethod,
    pub smoothing_level: usize,
    pub mass_range_begin: f64,
    pub mass_range_end: f64,
    pub retention_time_begin: f64,
    pub retention_time_end: f64,
    pub excluded_mass_list: Vec<ExcludedMass>,
    pub is_nominal_mass: bool,
}

impl Default for PeakPickParameters {
    fn default() -> Self {
        Self {
            mass_slice_width: 0.1,
            centroid_ms1_tolerance: 0.01,
            centroid_ms2_tolerance: 0.025,
            minimum_datapoints: 5,
            minimum_amplitude: 1000.0,
            noise_factor: 4.0,
            smoothing_method: SmoothingMethod::LinearWeightedMovingAverage,
            smoothing_level: 3,
            mass_range_begin: 0.0,
            mass_range_end: 2000.0,
            retention_time_begin: 0.0,
            retention_time_end: 100.0,
            excluded_mass_list: Vec::new(),
            is_nominal_mass: false,
        }
    }
}

impl PeakPickParameters {
    /// The step between focused masses of the spotting sweep
    pub fn mass_step(&self) -> f64 {
        if self.is_nominal_mass {
            1.0
        } else {
            self.mass_slice_width
        }
    }

    pub fn is_excluded(&self, mass: f64) -> bool {
        self.excluded_mass_list.iter().any(|e| e.contains(mass))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IsotopeParameters {
    pub max_charge_number: u32,
    pub is_brcl_considered_for_isotopes: bool,
    /// Copy isotope and adduct annotations from the reference sample after alignment
    /// instead of re-estimating them on the aligned spots
    pub tracking_isotope_labels: bool,
    pub isotope_tolerance: f64,
    pub retention_time_margin: f64,
    pub drift_time_margin: f64,
}

impl Default for IsotopeParameters {
    fn default() -> Self {
        Self {
            max_charge_number: 2,
            is_brcl_considered_for_isotopes: false,
            tracking_isotope_labels: false,
            isotope_tolerance: 0.01,
            retention_time_margin: 0.0275,
            drift_time_margin: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlignmentParameters {
    pub alignment_reference_file_id: usize,
    pub retention_time_tolerance: f64,
    pub drift_time_tolerance: f64,
    pub ms1_tolerance: f64,
    pub retention_time_factor: f64,
    pub ms1_factor: f64,
    pub is_force_insert_for_gap_filling: bool,
}

impl Default for AlignmentParameters {
    fn default() -> Self {
        Self {
            alignment_reference_file_id: 0,
            retention_time_tolerance: 0.1,
            drift_time_tolerance: 0.02,
            ms1_tolerance: 0.015,
            retention_time_factor: 0.5,
            ms1_factor: 0.5,
            is_force_insert_for_gap_filling: true,
        }
    }
}

/// Adduct searching and the optional cross-linking passes of character estimation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CharacterParameters {
    pub searched_adducts: Vec<String>,
    pub adduct_tolerance: f64,
    pub link_identified_compounds: bool,
    pub link_adduct_pairs: bool,
    pub link_chromatogram_correlation: bool,
    pub link_ms1_ms2_partial_match: bool,
    pub correlation_threshold: f64,
}

impl Default for CharacterParameters {
    fn default() -> Self {
        Self {
            searched_adducts: Vec::new(),
            adduct_tolerance: 0.01,
            link_identified_compounds: false,
            link_adduct_pairs: false,
            link_chromatogram_correlation: false,
            link_ms1_ms2_partial_match: false,
            correlation_threshold: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IonMobilityParameters {
    pub mobility_type: MobilityType,
    pub calibration: CcsCalibration,
}

/// Every parameter group of the detection and alignment pipeline
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProcessingParameters {
    pub ion_mode: IonMode,
    pub acquisition_type: AcquisitionType,
    pub peak_pick: PeakPickParameters,
    pub isotope: IsotopeParameters,
    pub alignment: AlignmentParameters,
    pub character: CharacterParameters,
    pub ion_mobility: IonMobilityParameters,
}

impl ProcessingParameters {
    pub fn new(ion_mode: IonMode, acquisition_type: AcquisitionType) -> Self {
        Self {
            ion_mode,
            acquisition_type,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mass_step() {
        let mut params = PeakPickParameters::default();
        assert_eq!(params.mass_step(), 0.1);
        params.is_nominal_mass = true;
        assert_eq!(params.mass_step(), 1.0);
    }

    #[test]
    fn test_exclusion() {
        let params = PeakPickParameters {
            excluded_mass_list: vec![ExcludedMass::new(391.2843, 0.005)],
            ..Default::default()
        };
        assert!(params.is_excluded(391.286));
        assert!(!params.is_excluded(391.3));
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("neg".parse::<IonMode>().unwrap(), IonMode::Negative);
        assert_eq!("swath".parse::<AcquisitionType>().unwrap(), AcquisitionType::SWATH);
        assert!("tof".parse::<AcquisitionType>().is_err());
        assert!(AcquisitionType::AIF.is_multi_ce());
    }
}
