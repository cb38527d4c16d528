//! Tolerance based equality and similarity between features of different samples
use mzspot::chromatogram::ChromXType;
use mzspot::params::AlignmentParameters;

/// Compares features on mass and their main chromatographic coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureComparer {
    pub mass_tolerance: f64,
    pub time_tolerance: f64,
    pub mass_factor: f64,
    pub time_factor: f64,
}

impl FeatureComparer {
    pub fn new(mass_tolerance: f64, time_tolerance: f64, mass_factor: f64, time_factor: f64) -> Self {
        Self {
            mass_tolerance,
            time_tolerance,
            mass_factor,
            time_factor,
        }
    }

    /// The comparer for features aligned along `axis`
    pub fn from_params(params: &AlignmentParameters, axis: ChromXType) -> Self {
        let time_tolerance = match axis {
            ChromXType::Drift => params.drift_time_tolerance,
            ChromXType::RT | ChromXType::Mz => params.retention_time_tolerance,
        };
        Self::new(
            params.ms1_tolerance,
            time_tolerance,
            params.ms1_factor,
            params.retention_time_factor,
        )
    }

    #[inline]
    pub fn is_within(&self, mass_a: f64, time_a: f64, mass_b: f64, time_b: f64) -> bool {
        (mass_a - mass_b).abs() <= self.mass_tolerance
            && (time_a - time_b).abs() <= self.time_tolerance
    }

    /// A weighted sum of gaussian similarities in mass and time, or `None` when the pair
    /// falls outside either tolerance
    pub fn score(&self, mass_a: f64, time_a: f64, mass_b: f64, time_b: f64) -> Option<f64> {
        if !self.is_within(mass_a, time_a, mass_b, time_b) {
            return None;
        }
        let mass_sim = gaussian_similarity(mass_a - mass_b, self.mass_tolerance);
        let time_sim = gaussian_similarity(time_a - time_b, self.time_tolerance);
        Some(self.mass_factor * mass_sim + self.time_factor * time_sim)
    }
}

/// `exp(-0.5 (delta / tolerance)^2)`, and `1` for an exact match under a zero tolerance
#[inline]
pub fn gaussian_similarity(delta: f64, tolerance: f64) -> f64 {
    if tolerance <= 0.0 {
        return if delta == 0.0 { 1.0 } else { 0.0 };
    }
    let z = delta / tolerance;
    (-0.5 * z * z).exp()
}
