//! Detected chromatographic features and their ion character annotations
use crate::adduct::AdductIon;
use crate::chromatogram::ChromXs;
use crate::peak_detection::PeakDetectionResult;

/// The kind of relationship a [`LinkedPeakFeature`] expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeakLinkKind {
    Isotope,
    Adduct,
    ChromSimilar,
    FoundInUpperMsMs,
}

/// An edge from one feature to another within the same feature list, keyed by peak id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkedPeakFeature {
    pub linked_peak_id: usize,
    pub kind: PeakLinkKind,
}

impl LinkedPeakFeature {
    pub fn new(linked_peak_id: usize, kind: PeakLinkKind) -> Self {
        Self {
            linked_peak_id,
            kind,
        }
    }
}

/// The isotope, charge, adduct and grouping annotations of a feature
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IonFeatureCharacter {
    /// `-1` when unassigned, `0` for a monoisotopic peak
    pub isotope_weight_number: i32,
    pub isotope_parent_peak_id: i32,
    pub charge: u32,
    pub adduct_type: Option<AdductIon>,
    /// The peak id of the adduct root; a root refers to itself
    pub adduct_parent: i32,
    pub peak_group_id: i32,
    pub peak_links: Vec<LinkedPeakFeature>,
    pub is_linked: bool,
}

impl Default for IonFeatureCharacter {
    fn default() -> Self {
        Self {
            isotope_weight_number: -1,
            isotope_parent_peak_id: -1,
            charge: 1,
            adduct_type: None,
            adduct_parent: -1,
            peak_group_id: -1,
            peak_links: Vec::new(),
            is_linked: false,
        }
    }
}

impl IonFeatureCharacter {
    pub fn is_isotope_assigned(&self) -> bool {
        self.isotope_weight_number >= 0
    }

    pub fn is_monoisotopic(&self) -> bool {
        self.isotope_weight_number == 0
    }

    /// Add a link unless an identical one is already present
    pub fn add_link(&mut self, link: LinkedPeakFeature) {
        if !self.peak_links.contains(&link) {
            self.peak_links.push(link);
        }
        self.is_linked = true;
    }
}

/// Peak shape statistics from the detection pass
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakShape {
    pub estimated_noise: f64,
    pub signal_to_noise: f64,
    pub symmetry: f64,
    pub sharpness: f64,
    pub gaussian_similarity: f64,
}

impl From<&PeakDetectionResult> for PeakShape {
    fn from(value: &PeakDetectionResult) -> Self {
        Self {
            estimated_noise: value.estimated_noise,
            signal_to_noise: value.signal_to_noise,
            symmetry: value.symmetry,
            sharpness: value.sharpness,
            gaussian_similarity: value.gaussian_similarity,
        }
    }
}

/// A chromatographic peak detected within one sample.
///
/// `chrom_scan_id_*` are ordinals along the chromatographic axis while
/// `ms1_raw_spectrum_id_*` index into the provider's full spectrum list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChromatogramPeakFeature {
    pub peak_id: usize,
    pub master_peak_id: i32,
    pub parent_peak_id: i32,
    pub mass: f64,

    pub chrom_xs: ChromXs,
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
    pub ms2_raw_spectrum_ids: Vec<usize>,
    /// The MS2 scan nearest the apex for each distinct collision energy
    pub ms2_raw_spectrum_id_to_ce: Vec<(usize, f64)>,

    pub drift_chrom_features: Vec<ChromatogramPeakFeature>,
    pub collision_cross_section: Option<f64>,
    pub peak_shape: PeakShape,
    pub peak_character: IonFeatureCharacter,
}

impl Default for ChromatogramPeakFeature {
    fn default() -> Self {
        Self {
            peak_id: 0,
            master_peak_id: -1,
            parent_peak_id: -1,
            mass: 0.0,
            chrom_xs: ChromXs::default(),
            chrom_xs_top: ChromXs::default(),
            chrom_xs_left: ChromXs::default(),
            chrom_xs_right: ChromXs::default(),
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
            ms2_raw_spectrum_ids: Vec::new(),
            ms2_raw_spectrum_id_to_ce: Vec::new(),
            drift_chrom_features: Vec::new(),
            collision_cross_section: None,
            peak_shape: PeakShape::default(),
            peak_character: IonFeatureCharacter::default(),
        }
    }
}

impl ChromatogramPeakFeature {
    #[inline]
    pub fn apex_time(&self) -> f64 {
        self.chrom_xs_top.value()
    }

    /// The apex retention time, regardless of the main axis
    #[inline]
    pub fn rt(&self) -> f64 {
        self.chrom_xs_top.rt
    }

    #[inline]
    pub fn drift_time(&self) -> f64 {
        self.chrom_xs_top.drift
    }

    pub fn width(&self) -> f64 {
        self.chrom_xs_right.value() - self.chrom_xs_left.value()
    }

    /// The net height of the apex above the lower of the two edges
    pub fn net_height(&self) -> f64 {
        self.peak_height_top - self.peak_height_left.min(self.peak_height_right)
    }

    pub fn is_ion_mobility(&self) -> bool {
        !self.drift_chrom_features.is_empty()
    }
}

/// The fields of a feature the isotope and character estimators read and annotate, shared
/// by per-sample features and aligned spots
pub trait IonFeature {
    fn feature_id(&self) -> usize;
    fn mass(&self) -> f64;
    fn intensity(&self) -> f64;
    fn rt(&self) -> f64;
    fn drift_time(&self) -> f64;
    /// The retention time boundaries of the feature
    fn rt_span(&self) -> (f64, f64);
    fn character(&self) -> &IonFeatureCharacter;
    fn character_mut(&mut self) -> &mut IonFeatureCharacter;
}

impl IonFeature for ChromatogramPeakFeature {
    fn feature_id(&self) -> usize {
        self.peak_id
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn intensity(&self) -> f64 {
        self.peak_height_top
    }

    fn rt(&self) -> f64 {
        self.chrom_xs_top.rt
    }

    fn drift_time(&self) -> f64 {
        self.chrom_xs_top.drift
    }

    fn rt_span(&self) -> (f64, f64) {
        (self.chrom_xs_left.rt, self.chrom_xs_right.rt)
    }

    fn character(&self) -> &IonFeatureCharacter {
        &self.peak_character
    }

    fn character_mut(&mut self) -> &mut IonFeatureCharacter {
        &mut self.peak_character
    }
}
