//! Cross-sample alignment.
//!
//! A master list is accumulated sequentially from the reference sample and every feature of
//! the other samples that no master entry already covers. Each sample's features are then
//! greedily matched to master slots in ascending `peak_id` order, the empty slots are gap
//! filled, and the columns are packed into [`AlignmentSpotProperty`] rows. Matching and gap
//! filling run in parallel across samples.
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use identity_hash::BuildIdentityHasher;
use itertools::Itertools;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, trace};

use mzspot::character::PeakCharacterEstimator;
use mzspot::chromatogram::{ChromXType, ChromXs};
use mzspot::feature::ChromatogramPeakFeature;
use mzspot::isotope::IsotopeEstimator;
use mzspot::params::ProcessingParameters;
use mzspot::progress::{CancellationToken, NoProgress, ProgressReporter};
use mzspot::spectrum::{RawDataError, RawSpectrumProvider};

use crate::comparer::FeatureComparer;
use crate::gap_fill::{GapFillAxis, GapFillTarget, GapFiller};
use crate::spot::{AlignmentChromPeakFeature, AlignmentResultContainer, AlignmentSpotProperty, UNASSIGNED};
use crate::spot_info::write_spot_info;

/// An error that might occur during alignment
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Required input {0} is empty")]
    EmptyInput(&'static str),
    #[error("The reference sample {index} is out of range for {count} samples")]
    ReferenceOutOfRange { index: usize, count: usize },
    #[error("Alignment was cancelled")]
    Cancelled,
    #[error("Failed to read raw data: {0}")]
    RawData(
        #[source]
        #[from]
        RawDataError,
    ),
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to (de)serialize spot information: {0}")]
    SerializationError(
        #[source]
        #[from]
        serde_json::Error,
    ),
}

/// One sample to align: its detected features and the raw data to gap fill from.
///
/// A sample's file id is its position in the slice passed to [`PeakAligner::align`].
#[derive(Debug)]
pub struct AlignmentSample<'a, P: RawSpectrumProvider + ?Sized> {
    pub name: String,
    pub features: &'a [ChromatogramPeakFeature],
    pub provider: &'a P,
}

impl<'a, P: RawSpectrumProvider + ?Sized> AlignmentSample<'a, P> {
    pub fn new(name: impl Into<String>, features: &'a [ChromatogramPeakFeature], provider: &'a P) -> Self {
        Self {
            name: name.into(),
            features,
            provider,
        }
    }
}

/// Where the alignment's auxiliary output goes
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlignmentTarget {
    pub name: String,
    /// The spot information stream is only written when this is set
    pub spot_info_path: Option<PathBuf>,
}

impl AlignmentTarget {
    pub fn new(name: impl Into<String>, spot_info_path: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            spot_info_path,
        }
    }
}

/// A row of the master list
#[derive(Debug, Clone, Copy, PartialEq)]
struct MasterEntry {
    file_id: usize,
    mass: f64,
    time: f64,
    center: ChromXs,
    width: f64,
}

impl MasterEntry {
    fn from_feature(feature: &ChromatogramPeakFeature, file_id: usize) -> Self {
        Self {
            file_id,
            mass: feature.mass,
            time: feature.apex_time(),
            center: feature.chrom_xs_top,
            width: feature.width(),
        }
    }
}

/// The master list with an index over mass for tolerance lookups
#[derive(Debug, Default, Clone)]
struct MasterList {
    entries: Vec<MasterEntry>,
    mass_order: Vec<usize>,
}

impl MasterList {
    /// Accumulate master entries from `feature_sets`, starting from `reference`. A feature
    /// is added when no entry present before its sample was visited covers it.
    fn build(feature_sets: &[&[ChromatogramPeakFeature]], reference: usize, comparer: &FeatureComparer) -> Self {
        let mut entries: Vec<MasterEntry> = feature_sets
            .get(reference)
            .map(|fs| fs.iter().map(|f| MasterEntry::from_feature(f, reference)).collect())
            .unwrap_or_default();
        for (file_id, features) in feature_sets.iter().enumerate() {
            if file_id == reference {
                continue;
            }
            let additions: Vec<MasterEntry> = features
                .iter()
                .sorted_by_key(|f| f.peak_id)
                .filter(|f| {
                    !entries
                        .iter()
                        .any(|m| comparer.is_within(m.mass, m.time, f.mass, f.apex_time()))
                })
                .map(|f| MasterEntry::from_feature(f, file_id))
                .collect();
            trace!("Sample {file_id} added {} master entries", additions.len());
            entries.extend(additions);
        }
        entries.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.mass.total_cmp(&b.mass)));
        let mass_order = (0..entries.len())
            .sorted_by(|a, b| entries[*a].mass.total_cmp(&entries[*b].mass))
            .collect();
        Self { entries, mass_order }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indices of the entries within `tolerance` of `mass`
    fn in_mass_window(&self, mass: f64, tolerance: f64) -> impl Iterator<Item = usize> + '_ {
        let lo = self
            .mass_order
            .partition_point(|i| self.entries[*i].mass < mass - tolerance);
        self.mass_order[lo..]
            .iter()
            .copied()
            .take_while(move |i| self.entries[*i].mass <= mass + tolerance)
    }

    /// Greedily assign `features` to slots, visiting features in ascending `peak_id` order.
    ///
    /// A feature takes the best scoring slot among those it would score higher in than the
    /// slot's current occupant, displacing that occupant.
    fn match_features(&self, features: &[ChromatogramPeakFeature], comparer: &FeatureComparer) -> Vec<Option<usize>> {
        let mut slots = vec![None; self.len()];
        let mut best_scores = vec![f64::NEG_INFINITY; self.len()];
        for fi in (0..features.len()).sorted_by_key(|i| features[*i].peak_id) {
            let feature = &features[fi];
            let time = feature.apex_time();
            let best = self
                .in_mass_window(feature.mass, comparer.mass_tolerance)
                .filter_map(|mi| {
                    let m = &self.entries[mi];
                    comparer
                        .score(m.mass, m.time, feature.mass, time)
                        .filter(|score| *score > best_scores[mi])
                        .map(|score| (mi, score))
                })
                .max_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((mi, score)) = best {
                slots[mi] = Some(fi);
                best_scores[mi] = score;
            }
        }
        slots
    }

    /// The expected position of each slot, averaged over the features matched to it
    fn targets(
        &self,
        feature_sets: &[&[ChromatogramPeakFeature]],
        assignments: &[Vec<Option<usize>>],
    ) -> Vec<GapFillTarget> {
        self.entries
            .iter()
            .enumerate()
            .map(|(mi, entry)| {
                let matched: Vec<&ChromatogramPeakFeature> = assignments
                    .iter()
                    .zip(feature_sets)
                    .filter_map(|(slots, features)| slots[mi].map(|fi| &features[fi]))
                    .collect();
                if matched.is_empty() {
                    return GapFillTarget::new(entry.mass, entry.center, entry.width);
                }
                let n = matched.len() as f64;
                let mass = matched.iter().map(|f| f.mass).sum::<f64>() / n;
                let time = matched.iter().map(|f| f.apex_time()).sum::<f64>() / n;
                let width = matched.iter().map(|f| f.width()).sum::<f64>() / n;
                GapFillTarget::new(mass, matched[0].chrom_xs_top.with_value(time), width)
            })
            .collect()
    }
}

/// Build one sample's column of slots, gap filling the unmatched ones
fn fill_column<P: RawSpectrumProvider + ?Sized>(
    file_id: usize,
    sample: &AlignmentSample<'_, P>,
    features: &[ChromatogramPeakFeature],
    slots: &[Option<usize>],
    targets: &[GapFillTarget],
    filler: &GapFiller,
    force_insert: bool,
) -> Vec<AlignmentChromPeakFeature> {
    slots
        .iter()
        .zip(targets)
        .map(|(slot, target)| match slot {
            Some(fi) => AlignmentChromPeakFeature::from_feature(&features[*fi], file_id, &sample.name),
            None => filler.fill(target, file_id, &sample.name, sample.provider, force_insert),
        })
        .collect()
}

/// Turn per-sample columns into per-slot rows
fn transpose(columns: Vec<Vec<AlignmentChromPeakFeature>>, n_slots: usize) -> Vec<Vec<AlignmentChromPeakFeature>> {
    let mut columns: Vec<_> = columns.into_iter().map(|c| c.into_iter()).collect();
    (0..n_slots)
        .map(|_| columns.iter_mut().filter_map(|c| c.next()).collect())
        .collect()
}

/// Aligns the features of several samples into spots
#[derive(Debug, Clone, Default)]
pub struct PeakAligner {
    params: ProcessingParameters,
}

impl PeakAligner {
    pub fn new(params: ProcessingParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ProcessingParameters {
        &self.params
    }

    pub fn align<P: RawSpectrumProvider + ?Sized>(
        &self,
        samples: &[AlignmentSample<'_, P>],
        target: &AlignmentTarget,
    ) -> Result<AlignmentResultContainer, AlignmentError> {
        self.align_with_progress(samples, target, &NoProgress, None)
    }

    /// Align `samples`, reporting progress as each sample's column is completed and
    /// checking `cancel` before each sample is matched and filled.
    ///
    /// # Errors
    /// [`AlignmentError::EmptyInput`] when there are no samples,
    /// [`AlignmentError::ReferenceOutOfRange`] when the configured reference sample does not
    /// exist, and I/O errors from writing the spot information stream.
    pub fn align_with_progress<P: RawSpectrumProvider + ?Sized, R: ProgressReporter + ?Sized>(
        &self,
        samples: &[AlignmentSample<'_, P>],
        target: &AlignmentTarget,
        progress: &R,
        cancel: Option<&CancellationToken>,
    ) -> Result<AlignmentResultContainer, AlignmentError> {
        if samples.is_empty() {
            return Err(AlignmentError::EmptyInput("samples"));
        }
        let reference = self.params.alignment.alignment_reference_file_id;
        if reference >= samples.len() {
            return Err(AlignmentError::ReferenceOutOfRange {
                index: reference,
                count: samples.len(),
            });
        }
        let is_cancelled = || cancel.is_some_and(|c| c.is_cancelled());
        let force_insert = self.params.alignment.is_force_insert_for_gap_filling;

        let feature_sets: Vec<&[ChromatogramPeakFeature]> = samples.iter().map(|s| s.features).collect();
        let comparer = FeatureComparer::from_params(&self.params.alignment, ChromXType::RT);
        let master = MasterList::build(&feature_sets, reference, &comparer);
        debug!(
            "Built a master list of {} entries from {} samples",
            master.len(),
            samples.len()
        );

        let assignments: Vec<Vec<Option<usize>>> = feature_sets
            .par_iter()
            .map(|features| master.match_features(features, &comparer))
            .collect();
        let targets = master.targets(&feature_sets, &assignments);

        let filler = GapFiller::new(GapFillAxis::RetentionTime, &self.params);
        let done = AtomicUsize::new(0);
        let columns: Vec<Vec<AlignmentChromPeakFeature>> = samples
            .par_iter()
            .enumerate()
            .map(|(file_id, sample)| {
                if is_cancelled() {
                    return Err(AlignmentError::Cancelled);
                }
                let column = fill_column(
                    file_id,
                    sample,
                    sample.features,
                    &assignments[file_id],
                    &targets,
                    &filler,
                    force_insert,
                );
                let n_filled = column.iter().filter(|p| p.is_gap_filled).count();
                trace!("Gap filled {n_filled} slots of {}", sample.name);
                progress.report(done.fetch_add(1, Ordering::SeqCst) + 1, samples.len());
                Ok(column)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut spots: Vec<AlignmentSpotProperty> = transpose(columns, master.len())
            .into_iter()
            .enumerate()
            .map(|(alignment_id, row)| AlignmentSpotProperty::new(alignment_id, 0, UNASSIGNED, row))
            .collect();

        if samples.iter().any(|s| s.provider.is_ion_mobility()) {
            if is_cancelled() {
                return Err(AlignmentError::Cancelled);
            }
            spots.par_iter_mut().enumerate().for_each(|(mi, spot)| {
                let slots: Vec<Option<usize>> = assignments.iter().map(|a| a[mi]).collect();
                spot.alignment_drift_spot_features =
                    self.align_drift_spots(samples, &feature_sets, &slots, spot, reference);
            });
        }
        assign_master_ids(&mut spots);

        if let Some(path) = target.spot_info_path.as_deref() {
            write_spot_info(&spots, samples, self.params.peak_pick.centroid_ms1_tolerance, path)?;
        }

        self.annotate_spots(&mut spots, reference);
        debug!("Aligned {} spots for {}", spots.len(), target.name);

        Ok(AlignmentResultContainer {
            ion_mode: self.params.ion_mode,
            sample_names: samples.iter().map(|s| s.name.clone()).collect(),
            total_alignment_spot_count: spots.len(),
            alignment_spot_properties: spots,
            spot_info_path: target.spot_info_path.clone(),
        })
    }

    /// Align the drift time sub-features of the features matched to one spot
    fn align_drift_spots<P: RawSpectrumProvider + ?Sized>(
        &self,
        samples: &[AlignmentSample<'_, P>],
        feature_sets: &[&[ChromatogramPeakFeature]],
        slots: &[Option<usize>],
        spot: &AlignmentSpotProperty,
        reference: usize,
    ) -> Vec<AlignmentSpotProperty> {
        let sub_sets: Vec<&[ChromatogramPeakFeature]> = slots
            .iter()
            .zip(feature_sets)
            .map(|(slot, features)| match slot {
                Some(fi) => features[*fi].drift_chrom_features.as_slice(),
                None => &[][..],
            })
            .collect();
        if sub_sets.iter().all(|s| s.is_empty()) {
            return Vec::new();
        }
        let comparer = FeatureComparer::from_params(&self.params.alignment, ChromXType::Drift);
        let master = MasterList::build(&sub_sets, reference, &comparer);
        let assignments: Vec<Vec<Option<usize>>> = sub_sets
            .iter()
            .map(|features| master.match_features(features, &comparer))
            .collect();
        let mut targets = master.targets(&sub_sets, &assignments);
        for t in targets.iter_mut() {
            t.center.rt = spot.times_center.rt;
        }
        let filler = GapFiller::new(
            GapFillAxis::Drift {
                rt_begin: spot.times_min.rt,
                rt_end: spot.times_max.rt,
            },
            &self.params,
        );
        let force_insert = self.params.alignment.is_force_insert_for_gap_filling;
        let columns = samples
            .iter()
            .enumerate()
            .map(|(file_id, sample)| {
                fill_column(
                    file_id,
                    sample,
                    sub_sets[file_id],
                    &assignments[file_id],
                    &targets,
                    &filler,
                    force_insert,
                )
            })
            .collect();
        transpose(columns, master.len())
            .into_iter()
            .enumerate()
            .map(|(i, row)| AlignmentSpotProperty::new(i, 0, spot.alignment_id as i32, row))
            .collect()
    }

    /// Run isotope and character estimation over the spots, or carry the reference
    /// sample's annotations over when isotope labels are being tracked
    fn annotate_spots(&self, spots: &mut [AlignmentSpotProperty], reference: usize) {
        if self.params.isotope.tracking_isotope_labels {
            copy_reference_annotations(spots, reference);
        } else {
            IsotopeEstimator::new(self.params.isotope.clone()).assign_isotopes(spots);
        }
        let estimator = PeakCharacterEstimator::new(self.params.character.clone(), self.params.ion_mode)
            .with_retention_time_tolerance(self.params.isotope.retention_time_margin);
        let adducts = estimator.searched_adducts();
        let summary = estimator.assign_character(spots, &adducts);
        debug!("Grouped aligned spots into {} peak groups", summary.n_groups);
    }
}

/// Number spots and their drift sub-spots consecutively
fn assign_master_ids(spots: &mut [AlignmentSpotProperty]) {
    let mut counter = 0;
    for spot in spots.iter_mut() {
        spot.master_alignment_id = counter;
        counter += 1;
        for sub in spot.alignment_drift_spot_features.iter_mut() {
            sub.master_alignment_id = counter;
            counter += 1;
        }
    }
}

/// Copy isotope and adduct annotations from each spot's reference slot, translating
/// sample peak ids into alignment ids
fn copy_reference_annotations(spots: &mut [AlignmentSpotProperty], reference: usize) {
    let id_map: HashMap<usize, usize, BuildIdentityHasher<usize>> = spots
        .iter()
        .filter_map(|s| {
            let slot = s.aligned_peak_properties.get(reference)?;
            slot.is_detected().then_some((slot.peak_id as usize, s.alignment_id))
        })
        .collect();
    let lookup = |peak_id: i32| usize::try_from(peak_id).ok().and_then(|k| id_map.get(&k).copied());
    for spot in spots.iter_mut() {
        let own_id = spot.alignment_id as i32;
        let Some(slot) = spot.aligned_peak_properties.get(reference) else {
            continue;
        };
        if !slot.is_detected() {
            continue;
        }
        let source = &slot.peak_character;
        let mut character = spot.peak_character.clone();
        character.charge = source.charge;
        character.adduct_type = source.adduct_type.clone();
        match lookup(source.isotope_parent_peak_id) {
            Some(parent) if source.is_isotope_assigned() => {
                character.isotope_weight_number = source.isotope_weight_number;
                character.isotope_parent_peak_id = parent as i32;
            }
            _ => {
                character.isotope_weight_number = 0;
                character.isotope_parent_peak_id = own_id;
            }
        }
        character.adduct_parent = lookup(source.adduct_parent).map(|p| p as i32).unwrap_or(-1);
        spot.peak_character = character;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spot::NOT_FOUND;
    use mzpeaks::CentroidPeak;
    use mzspot::chromatogram::ChromXUnit;
    use mzspot::spectrum::{RawMeasurement, RawSpectrum};

    /// A sample with triangular peaks of `(mass, apex scan, height)`
    fn measurement(name: &str, peaks: &[(f64, usize, f32)]) -> RawMeasurement {
        let spectra = (0usize..100)
            .map(|i| {
                let mut points = vec![CentroidPeak::new(50.0, 5.0, 0)];
                for (mass, apex, height) in peaks {
                    let d = i.abs_diff(*apex);
                    if d < 8 {
                        points.push(CentroidPeak::new(*mass, height * (8 - d) as f32 / 8.0, 1));
                    }
                }
                RawSpectrum::new(i, i as f64 * 0.05, 1, points)
            })
            .collect();
        RawMeasurement::new(name, spectra)
    }

    fn feature(peak_id: usize, mass: f64, apex: usize, height: f64) -> ChromatogramPeakFeature {
        let t = apex as f64 * 0.05;
        let top = ChromXs::from_rt(t, ChromXUnit::Min);
        ChromatogramPeakFeature {
            peak_id,
            master_peak_id: peak_id as i32,
            mass,
            chrom_xs: top,
            chrom_xs_top: top,
            chrom_xs_left: top.with_value(t - 0.35),
            chrom_xs_right: top.with_value(t + 0.35),
            chrom_scan_id_top: apex,
            chrom_scan_id_left: apex - 7,
            chrom_scan_id_right: apex + 7,
            peak_height_top: height,
            ..Default::default()
        }
    }

    #[test_log::test]
    fn test_reference_and_gap_fill() {
        let a = measurement("a", &[(200.0, 30, 10000.0), (350.0, 60, 8000.0)]);
        let b = measurement("b", &[(200.0, 31, 12000.0)]);
        let features_a = vec![feature(0, 200.0, 30, 10000.0), feature(1, 350.0, 60, 8000.0)];
        let features_b = vec![feature(0, 200.001, 31, 12000.0)];
        let samples = vec![
            AlignmentSample::new("a", &features_a, &a),
            AlignmentSample::new("b", &features_b, &b),
        ];
        let result = PeakAligner::default()
            .align(&samples, &AlignmentTarget::default())
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.total_alignment_spot_count, 2);
        for (i, spot) in result.iter().enumerate() {
            assert_eq!(spot.alignment_id, i);
            assert_eq!(spot.aligned_peak_properties.len(), 2);
        }
        let spot_a = &result.alignment_spot_properties[0];
        assert!(spot_a.aligned_peak_properties.iter().all(|p| p.is_detected()));
        assert_eq!(spot_a.representative_file_id, 1);
        assert_eq!(spot_a.fill_percentage, 1.0);

        let spot_b = &result.alignment_spot_properties[1];
        assert!(spot_b.aligned_peak_properties[0].is_detected());
        let filled = &spot_b.aligned_peak_properties[1];
        assert!(filled.is_gap_filled);
        assert_eq!(filled.peak_id, NOT_FOUND);
        assert_eq!(spot_b.fill_percentage, 0.5);
        assert!(result.iter().all(|s| s.peak_character.peak_group_id >= 0));
    }

    #[test]
    fn test_gap_fill_recovers_undetected() {
        let a = measurement("a", &[(200.0, 30, 10000.0), (350.0, 60, 8000.0)]);
        let b = measurement("b", &[(200.0, 31, 12000.0), (350.0, 60, 500.0)]);
        let features_a = vec![feature(0, 200.0, 30, 10000.0), feature(1, 350.0, 60, 8000.0)];
        let features_b = vec![feature(0, 200.001, 31, 12000.0)];
        let samples = vec![
            AlignmentSample::new("a", &features_a, &a),
            AlignmentSample::new("b", &features_b, &b),
        ];
        let result = PeakAligner::default()
            .align(&samples, &AlignmentTarget::default())
            .unwrap();
        let filled = &result.alignment_spot_properties[1].aligned_peak_properties[1];
        assert!(filled.is_gap_filled);
        assert_eq!(filled.peak_id, UNASSIGNED);
        assert_eq!(filled.chrom_scan_id_top, 60);
        assert!(filled.peak_height_top > 0.0);
    }

    #[test]
    fn test_master_list_merges_new_features() {
        let comparer = FeatureComparer::from_params(&Default::default(), ChromXType::RT);
        let fa = vec![feature(0, 200.0, 30, 1.0)];
        let fb = vec![feature(0, 200.002, 31, 1.0), feature(1, 410.0, 10, 1.0)];
        let sets: Vec<&[ChromatogramPeakFeature]> = vec![&fa, &fb];
        let master = MasterList::build(&sets, 0, &comparer);
        assert_eq!(master.len(), 2);
        assert_eq!(master.entries[0].file_id, 1);
        assert_eq!(master.entries[1].file_id, 0);

        let assignments = master.match_features(&fb, &comparer);
        assert_eq!(assignments, vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_greedy_displacement() {
        let comparer = FeatureComparer::from_params(&Default::default(), ChromXType::RT);
        let reference = vec![feature(0, 300.0, 40, 1.0)];
        let sets: Vec<&[ChromatogramPeakFeature]> = vec![&reference];
        let master = MasterList::build(&sets, 0, &comparer);
        let candidates = vec![feature(0, 300.008, 41, 1.0), feature(1, 300.0, 40, 1.0)];
        assert_eq!(master.match_features(&candidates, &comparer), vec![Some(1)]);
        let reversed = vec![feature(0, 300.0, 40, 1.0), feature(1, 300.008, 41, 1.0)];
        assert_eq!(master.match_features(&reversed, &comparer), vec![Some(0)]);
    }

    #[test]
    fn test_errors() {
        let a = measurement("a", &[]);
        let none: Vec<AlignmentSample<'_, RawMeasurement>> = Vec::new();
        assert!(matches!(
            PeakAligner::default().align(&none, &AlignmentTarget::default()),
            Err(AlignmentError::EmptyInput(_))
        ));
        let mut params = ProcessingParameters::default();
        params.alignment.alignment_reference_file_id = 3;
        let samples = vec![AlignmentSample::new("a", &[], &a)];
        assert!(matches!(
            PeakAligner::new(params).align(&samples, &AlignmentTarget::default()),
            Err(AlignmentError::ReferenceOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_tracking_labels() {
        let a = measurement("a", &[(500.0, 30, 10000.0), (501.00335, 30, 3000.0)]);
        let mut features_a = vec![feature(0, 500.0, 30, 10000.0), feature(1, 501.00335, 30, 3000.0)];
        features_a[0].peak_character.isotope_weight_number = 0;
        features_a[0].peak_character.isotope_parent_peak_id = 0;
        features_a[1].peak_character.isotope_weight_number = 1;
        features_a[1].peak_character.isotope_parent_peak_id = 0;
        let samples = vec![AlignmentSample::new("a", &features_a, &a)];
        let mut params = ProcessingParameters::default();
        params.isotope.tracking_isotope_labels = true;
        let result = PeakAligner::new(params)
            .align(&samples, &AlignmentTarget::default())
            .unwrap();
        let mono = result.iter().find(|s| (s.mass_center - 500.0).abs() < 1e-6).unwrap();
        let iso = result.iter().find(|s| (s.mass_center - 501.00335).abs() < 1e-6).unwrap();
        assert_eq!(iso.peak_character.isotope_weight_number, 1);
        assert_eq!(iso.peak_character.isotope_parent_peak_id, mono.alignment_id as i32);
        assert_eq!(mono.peak_character.peak_group_id, iso.peak_character.peak_group_id);
    }
}
