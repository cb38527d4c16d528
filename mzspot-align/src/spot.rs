//! The aligned data model: per-sample slots, spots and the alignment result
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use mzspot::chromatogram::ChromXs;
use mzspot::feature::{ChromatogramPeakFeature, IonFeature, IonFeatureCharacter, PeakShape};
use mzspot::params::IonMode;

/// `master_peak_id`/`peak_id` of a slot whose gap filling found nothing
pub const NOT_FOUND: i32 = -2;
/// `master_peak_id`/`peak_id` of a slot not backed by an independent detection
pub const UNASSIGNED: i32 = -1;

/// One sample's entry in an alignment spot.
///
/// `peak_id` is the sample-local id of the matched feature, [`UNASSIGNED`] for a peak
/// found by gap filling and [`NOT_FOUND`] when gap filling found nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentChromPeakFeature {
    pub file_id: usize,
    pub file_name: String,
    pub peak_id: i32,
    pub master_peak_id: i32,
    pub parent_peak_id: i32,
    pub mass: f64,

    pub chrom_xs_top: ChromXs,
    pub chrom_xs_left: ChromXs,
    pub chrom_xs_right: ChromXs,

    pub chrom_scan_id_top: usize,
    pub chrom_scan_id_left: usize,
    pub chrom_scan_id_right: usize,

    pub peak_height_top: f64,
    pub peak_height_left: f64,
    pub peak_height_right: f64,
    pub peak_area_above_zero: f64,
    pub peak_area_above_baseline: f64,

    pub ms1_raw_spectrum_id_top: usize,
    pub ms1_raw_spectrum_id_left: usize,
    pub ms1_raw_spectrum_id_right: usize,
    pub ms2_raw_spectrum_id: Option<usize>,

    pub collision_cross_section: Option<f64>,
    pub peak_shape: PeakShape,
    pub peak_character: IonFeatureCharacter,
    pub is_gap_filled: bool,
}

impl AlignmentChromPeakFeature {
    /// An unfilled slot centered on `center`
    pub fn empty(file_id: usize, file_name: impl Into<String>, mass: f64, center: ChromXs) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            peak_id: UNASSIGNED,
            master_peak_id: UNASSIGNED,
            parent_peak_id: UNASSIGNED,
            mass,
            chrom_xs_top: center,
            chrom_xs_left: center,
            chrom_xs_right: center,
            chrom_scan_id_top: 0,
            chrom_scan_id_left: 0,
            chrom_scan_id_right: 0,
            peak_height_top: 0.0,
            peak_height_left: 0.0,
            peak_height_right: 0.0,
            peak_area_above_zero: 0.0,
            peak_area_above_baseline: 0.0,
            ms1_raw_spectrum_id_top: 0,
            ms1_raw_spectrum_id_left: 0,
            ms1_raw_spectrum_id_right: 0,
            ms2_raw_spectrum_id: None,
            collision_cross_section: None,
            peak_shape: PeakShape::default(),
            peak_character: IonFeatureCharacter::default(),
            is_gap_filled: false,
        }
    }

    /// A gap filled slot where no plausible peak was found
    pub fn not_found(file_id: usize, file_name: impl Into<String>, mass: f64, center: ChromXs) -> Self {
        Self {
            peak_id: NOT_FOUND,
            master_peak_id: NOT_FOUND,
            is_gap_filled: true,
            ..Self::empty(file_id, file_name, mass, center)
        }
    }

    /// Project a detected feature into a slot
    pub fn from_feature(
        feature: &ChromatogramPeakFeature,
        file_id: usize,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            peak_id: feature.peak_id as i32,
            master_peak_id: feature.master_peak_id.max(feature.peak_id as i32),
            parent_peak_id: feature.parent_peak_id,
            mass: feature.mass,
            chrom_xs_top: feature.chrom_xs_top,
            chrom_xs_left: feature.chrom_xs_left,
            chrom_xs_right: feature.chrom_xs_right,
            chrom_scan_id_top: feature.chrom_scan_id_top,
            chrom_scan_id_left: feature.chrom_scan_id_left,
            chrom_scan_id_right: feature.chrom_scan_id_right,
            peak_height_top: feature.peak_height_top,
            peak_height_left: feature.peak_height_left,
            peak_height_right: feature.peak_height_right,
            peak_area_above_zero: feature.peak_area_above_zero,
            peak_area_above_baseline: feature.peak_area_above_baseline,
            ms1_raw_spectrum_id_top: feature.ms1_raw_spectrum_id_top,
            ms1_raw_spectrum_id_left: feature.ms1_raw_spectrum_id_left,
            ms1_raw_spectrum_id_right: feature.ms1_raw_spectrum_id_right,
            ms2_raw_spectrum_id: feature.ms2_raw_spectrum_id,
            collision_cross_section: feature.collision_cross_section,
            peak_shape: feature.peak_shape,
            peak_character: feature.peak_character.clone(),
            is_gap_filled: false,
        }
    }

    /// Whether the slot holds an independently detected feature
    pub fn is_detected(&self) -> bool {
        self.peak_id >= 0 && !self.is_gap_filled
    }

    /// Whether the slot holds any signal, detected or gap filled
    pub fn has_signal(&self) -> bool {
        self.peak_id != NOT_FOUND && self.peak_height_top > 0.0
    }

    pub fn apex_time(&self) -> f64 {
        self.chrom_xs_top.value()
    }

    pub fn width(&self) -> f64 {
        self.chrom_xs_right.value() - self.chrom_xs_left.value()
    }
}

/// A row of the alignment: one slot per sample plus representative values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSpotProperty {
    pub alignment_id: usize,
    pub master_alignment_id: usize,
    pub parent_alignment_id: i32,
    pub aligned_peak_properties: Vec<AlignmentChromPeakFeature>,
    pub mass_center: f64,
    pub times_center: ChromXs,
    pub times_min: ChromXs,
    pub times_max: ChromXs,
    pub average_peak_height: f64,
    pub max_peak_height: f64,
    pub representative_file_id: usize,
    pub fill_percentage: f64,
    pub collision_cross_section: Option<f64>,
    pub peak_character: IonFeatureCharacter,
    pub alignment_drift_spot_features: Vec<AlignmentSpotProperty>,
}

impl AlignmentSpotProperty {
    /// Build a spot and its representative values from its slots
    pub fn new(
        alignment_id: usize,
        master_alignment_id: usize,
        parent_alignment_id: i32,
        aligned_peak_properties: Vec<AlignmentChromPeakFeature>,
    ) -> Self {
        let mut spot = Self {
            alignment_id,
            master_alignment_id,
            parent_alignment_id,
            aligned_peak_properties,
            mass_center: 0.0,
            times_center: ChromXs::default(),
            times_min: ChromXs::default(),
            times_max: ChromXs::default(),
            average_peak_height: 0.0,
            max_peak_height: 0.0,
            representative_file_id: 0,
            fill_percentage: 0.0,
            collision_cross_section: None,
            peak_character: IonFeatureCharacter::default(),
            alignment_drift_spot_features: Vec::new(),
        };
        spot.update_representative();
        spot
    }

    /// Recompute the center, extent, heights, fill percentage and representative sample.
    ///
    /// Detected slots are preferred; gap filled slots with signal are used only when no
    /// sample detected the feature independently.
    pub fn update_representative(&mut self) {
        let n_samples = self.aligned_peak_properties.len();
        if n_samples == 0 {
            return;
        }
        let detected: Vec<&AlignmentChromPeakFeature> = self
            .aligned_peak_properties
            .iter()
            .filter(|p| p.is_detected())
            .collect();
        let basis: Vec<&AlignmentChromPeakFeature> = if detected.is_empty() {
            self.aligned_peak_properties
                .iter()
                .filter(|p| p.has_signal())
                .collect()
        } else {
            detected.clone()
        };
        self.fill_percentage = detected.len() as f64 / n_samples as f64;

        let Some(representative) = basis
            .iter()
            .max_by(|a, b| a.peak_height_top.total_cmp(&b.peak_height_top))
        else {
            let first = &self.aligned_peak_properties[0];
            self.mass_center = first.mass;
            self.times_center = first.chrom_xs_top;
            self.times_min = first.chrom_xs_left;
            self.times_max = first.chrom_xs_right;
            return;
        };
        self.representative_file_id = representative.file_id;
        self.collision_cross_section = representative.collision_cross_section;

        let n = basis.len() as f64;
        self.mass_center = basis.iter().map(|p| p.mass).sum::<f64>() / n;
        let mean_rt = basis.iter().map(|p| p.chrom_xs_top.rt).sum::<f64>() / n;
        let mean_drift = basis.iter().map(|p| p.chrom_xs_top.drift).sum::<f64>() / n;
        let mut center = representative.chrom_xs_top;
        center.rt = mean_rt;
        center.drift = mean_drift;
        center.mz = self.mass_center;
        self.times_center = center;

        self.times_min = basis
            .iter()
            .map(|p| p.chrom_xs_left)
            .min_by(|a, b| a.value().total_cmp(&b.value()))
            .unwrap_or(center);
        self.times_max = basis
            .iter()
            .map(|p| p.chrom_xs_right)
            .max_by(|a, b| a.value().total_cmp(&b.value()))
            .unwrap_or(center);

        self.average_peak_height = basis.iter().map(|p| p.peak_height_top).sum::<f64>() / n;
        self.max_peak_height = representative.peak_height_top;
    }

    pub fn is_ion_mobility(&self) -> bool {
        !self.alignment_drift_spot_features.is_empty()
    }
}

impl IonFeature for AlignmentSpotProperty {
    fn feature_id(&self) -> usize {
        self.alignment_id
    }

    fn mass(&self) -> f64 {
        self.mass_center
    }

    fn intensity(&self) -> f64 {
        self.average_peak_height
    }

    fn rt(&self) -> f64 {
        self.times_center.rt
    }

    fn drift_time(&self) -> f64 {
        self.times_center.drift
    }

    fn rt_span(&self) -> (f64, f64) {
        (self.times_min.rt, self.times_max.rt)
    }

    fn character(&self) -> &IonFeatureCharacter {
        &self.peak_character
    }

    fn character_mut(&mut self) -> &mut IonFeatureCharacter {
        &mut self.peak_character
    }
}

/// The complete output of an alignment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResultContainer {
    pub ion_mode: IonMode,
    pub sample_names: Vec<String>,
    pub total_alignment_spot_count: usize,
    pub alignment_spot_properties: Vec<AlignmentSpotProperty>,
    pub spot_info_path: Option<PathBuf>,
}

impl AlignmentResultContainer {
    pub fn len(&self) -> usize {
        self.alignment_spot_properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignment_spot_properties.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlignmentSpotProperty> {
        self.alignment_spot_properties.iter()
    }

    pub fn get(&self, alignment_id: usize) -> Option<&AlignmentSpotProperty> {
        self.alignment_spot_properties.get(alignment_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mzspot::chromatogram::ChromXUnit;

    fn slot(file_id: usize, peak_id: i32, mass: f64, rt: f64, height: f64) -> AlignmentChromPeakFeature {
        let center = ChromXs::from_rt(rt, ChromXUnit::Min);
        let mut p = AlignmentChromPeakFeature::empty(file_id, format!("s{file_id}"), mass, center);
        p.peak_id = peak_id;
        p.master_peak_id = peak_id;
        p.peak_height_top = height;
        p.chrom_xs_left = center.with_value(rt - 0.1);
        p.chrom_xs_right = center.with_value(rt + 0.1);
        p
    }

    #[test]
    fn test_representative() {
        let mut missing = slot(2, NOT_FOUND, 300.0, 5.0, 0.0);
        missing.is_gap_filled = true;
        let spot = AlignmentSpotProperty::new(
            0,
            0,
            UNASSIGNED,
            vec![
                slot(0, 3, 300.001, 5.0, 1000.0),
                slot(1, 7, 300.003, 5.2, 3000.0),
                missing,
            ],
        );
        assert_eq!(spot.representative_file_id, 1);
        assert!((spot.fill_percentage - 2.0 / 3.0).abs() < 1e-9);
        assert!((spot.mass_center - 300.002).abs() < 1e-9);
        assert!((spot.times_center.rt - 5.1).abs() < 1e-9);
        assert!((spot.times_min.rt - 4.9).abs() < 1e-9);
        assert!((spot.times_max.rt - 5.3).abs() < 1e-9);
        assert_eq!(spot.max_peak_height, 3000.0);
        assert_eq!(spot.rt_span(), (spot.times_min.rt, spot.times_max.rt));
    }

    #[test]
    fn test_not_found() {
        let center = ChromXs::from_rt(2.0, ChromXUnit::Min);
        let p = AlignmentChromPeakFeature::not_found(1, "b", 150.0, center);
        assert_eq!(p.peak_id, NOT_FOUND);
        assert_eq!(p.master_peak_id, NOT_FOUND);
        assert!(!p.is_detected());
        assert!(!p.has_signal());
    }
}
