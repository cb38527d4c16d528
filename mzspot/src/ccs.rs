//! Collision cross section estimation from ion mobility drift times
use tracing::{debug, warn};

use crate::chromatogram::ChromXUnit;
use crate::feature::ChromatogramPeakFeature;

/// Converts `z / sqrt(μT)` scaled inverse reduced mobility into Å²
const MASON_SCHAMP_COEFFICIENT: f64 = 18509.8632163405;
/// Monoisotopic mass of N2
pub const NITROGEN_MASS: f64 = 28.006148;
/// The drift tube temperature assumed by trapped ion mobility instruments, in Kelvin
pub const DEFAULT_TEMPERATURE: f64 = 305.0;

/// The ion mobility separation technology, which determines how drift time maps to CCS
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MobilityType {
    /// Trapped ion mobility; the drift value is the inverse reduced mobility 1/K0
    #[default]
    Tims,
    /// Drift tube ion mobility with single field calibration
    Dtims,
    /// Travelling wave ion mobility with a power law calibration
    Twims,
}

impl MobilityType {
    /// The unit drift values are reported in
    pub fn drift_unit(&self) -> ChromXUnit {
        match self {
            MobilityType::Tims => ChromXUnit::OneOverK0,
            MobilityType::Dtims | MobilityType::Twims => ChromXUnit::Msec,
        }
    }
}

/// Instrument calibration coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CcsCalibration {
    pub agilent_beta: f64,
    pub agilent_tfix: f64,
    pub waters_coefficient: f64,
    pub waters_t0: f64,
    pub waters_exponent: f64,
    pub buffer_gas_mass: f64,
    pub temperature: f64,
}

impl Default for CcsCalibration {
    fn default() -> Self {
        Self {
            agilent_beta: -1.0,
            agilent_tfix: -1.0,
            waters_coefficient: -1.0,
            waters_t0: -1.0,
            waters_exponent: -1.0,
            buffer_gas_mass: NITROGEN_MASS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl CcsCalibration {
    pub fn agilent(beta: f64, tfix: f64) -> Self {
        Self {
            agilent_beta: beta,
            agilent_tfix: tfix,
            ..Default::default()
        }
    }

    pub fn waters(coefficient: f64, t0: f64, exponent: f64) -> Self {
        Self {
            waters_coefficient: coefficient,
            waters_t0: t0,
            waters_exponent: exponent,
            ..Default::default()
        }
    }

    /// Whether the coefficients needed by `mobility_type` are present
    pub fn is_valid_for(&self, mobility_type: MobilityType) -> bool {
        let gas_ok = self.buffer_gas_mass > 0.0;
        match mobility_type {
            MobilityType::Tims => gas_ok && self.temperature > 0.0,
            MobilityType::Dtims => gas_ok && self.agilent_beta > 0.0,
            MobilityType::Twims => {
                gas_ok && self.waters_coefficient > 0.0 && self.waters_exponent > 0.0
            }
        }
    }

    fn reduced_mass(&self, ion_mass: f64) -> f64 {
        ion_mass * self.buffer_gas_mass / (ion_mass + self.buffer_gas_mass)
    }

    /// Compute the collision cross section of an ion.
    ///
    /// # Arguments
    /// - `drift`: The drift time, or inverse reduced mobility for TIMS
    /// - `mz`: The ion's m/z
    /// - `charge`: The absolute charge state
    /// - `mobility_type`: The separation technology
    ///
    /// Returns `None` when the drift time is not positive, the calibration lacks the needed
    /// coefficients or the result is not a finite positive value.
    pub fn collision_cross_section(
        &self,
        drift: f64,
        mz: f64,
        charge: u32,
        mobility_type: MobilityType,
    ) -> Option<f64> {
        if drift <= 0.0 || charge == 0 || mz <= 0.0 || !self.is_valid_for(mobility_type) {
            return None;
        }
        let z = charge as f64;
        let ion_mass = mz * z;
        let mu = self.reduced_mass(ion_mass);
        let ccs = match mobility_type {
            MobilityType::Tims => {
                MASON_SCHAMP_COEFFICIENT * z / (mu * self.temperature).sqrt() * drift
            }
            MobilityType::Dtims => {
                let gamma = (ion_mass / (ion_mass + self.buffer_gas_mass)).sqrt() / z;
                (drift - self.agilent_tfix) / (self.agilent_beta * gamma)
            }
            MobilityType::Twims => {
                let corrected = drift + self.waters_t0;
                if corrected <= 0.0 {
                    return None;
                }
                self.waters_coefficient * corrected.powf(self.waters_exponent) * z / mu.sqrt()
            }
        };
        (ccs.is_finite() && ccs > 0.0).then_some(ccs)
    }
}

/// Fills in `collision_cross_section` on features with positive drift times
#[derive(Debug, Clone, Copy)]
pub struct CcsEstimator {
    pub mobility_type: MobilityType,
    pub calibration: CcsCalibration,
}

impl CcsEstimator {
    pub fn new(mobility_type: MobilityType, calibration: CcsCalibration) -> Self {
        Self {
            mobility_type,
            calibration,
        }
    }

    fn estimate(&self, feature: &mut ChromatogramPeakFeature) -> bool {
        let drift = feature.drift_time();
        if drift <= 0.0 {
            return false;
        }
        match self.calibration.collision_cross_section(
            drift,
            feature.mass,
            feature.peak_character.charge.max(1),
            self.mobility_type,
        ) {
            Some(ccs) => {
                feature.collision_cross_section = Some(ccs);
                true
            }
            None => false,
        }
    }

    /// Compute CCS for every feature and drift sub-feature with a positive drift time,
    /// returning the number of values set
    pub fn process(&self, features: &mut [ChromatogramPeakFeature]) -> usize {
        if !self.calibration.is_valid_for(self.mobility_type) {
            warn!(
                "The CCS calibration is missing coefficients for {:?}, skipping",
                self.mobility_type
            );
            return 0;
        }
        let mut n_set = 0;
        for feature in features.iter_mut() {
            if self.estimate(feature) {
                n_set += 1;
            }
            for sub in feature.drift_chrom_features.iter_mut() {
                if self.estimate(sub) {
                    n_set += 1;
                }
            }
        }
        debug!("Computed {n_set} collision cross sections");
        n_set
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chromatogram::ChromXs;

    fn feature(drift: f64) -> ChromatogramPeakFeature {
        ChromatogramPeakFeature {
            mass: 622.0290,
            chrom_xs_top: ChromXs::from_drift(drift, ChromXUnit::Msec),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_drift_unset() {
        let est = CcsEstimator::new(MobilityType::Tims, CcsCalibration::default());
        let mut features = vec![feature(0.0)];
        assert_eq!(est.process(&mut features), 0);
        assert!(features[0].collision_cross_section.is_none());
    }

    #[test]
    fn test_tims_ccs() {
        let est = CcsEstimator::new(MobilityType::Tims, CcsCalibration::default());
        let mut features = vec![feature(0.9915)];
        assert_eq!(est.process(&mut features), 1);
        let ccs = features[0].collision_cross_section.unwrap();
        assert!(ccs.is_finite() && ccs > 0.0);
        assert!((ccs - 202.0).abs() < 10.0, "{ccs}");
    }

    #[test]
    fn test_calibrated_types() {
        let mut parent = feature(0.0);
        parent.drift_chrom_features = vec![feature(20.0)];
        let mut features = vec![parent];

        let missing = CcsEstimator::new(MobilityType::Dtims, CcsCalibration::default());
        assert_eq!(missing.process(&mut features), 0);

        let agilent = CcsEstimator::new(MobilityType::Dtims, CcsCalibration::agilent(0.13, 1.5));
        assert_eq!(agilent.process(&mut features), 1);
        assert!(features[0].collision_cross_section.is_none());
        assert!(features[0].drift_chrom_features[0].collision_cross_section.unwrap() > 0.0);

        let waters = CcsCalibration::waters(300.0, 0.1, 0.5);
        let ccs = waters
            .collision_cross_section(5.0, 500.0, 1, MobilityType::Twims)
            .unwrap();
        assert!(ccs.is_finite() && ccs > 0.0);
    }
}
