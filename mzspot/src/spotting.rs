//! The per-sample feature detection sweep.
//!
//! [`PeakSpottingCore`] walks a focused mass across the observed m/z range, picks peaks in
//! each extracted ion chromatogram, removes redundant detections between adjacent mass slices,
//! refines boundaries on a narrower extraction, links MS2 scans and, for ion mobility data,
//! splits each retention time peak along the drift time axis.
use std::ops::Range;

use thiserror::Error;
use tracing::{debug, trace};

use crate::chromatogram::{
    extract_drift_chromatogram, extract_rt_chromatogram, nearest_position, spans_overlap, Chromatogram,
    ChromXType, ChromXUnit, ChromatogramPeak,
};
use crate::feature::{ChromatogramPeakFeature, PeakShape};
use crate::params::{AcquisitionType, PeakPickParameters, ProcessingParameters};
use crate::peak_detection::{
    describe_peak, detect_peaks, estimate_noise, PeakDetectionParams, PeakDetectionResult,
};
use crate::progress::{CancellationToken, NoProgress, ProgressReporter};
use crate::smoothing::smooth;
use crate::spectrum::{RawDataError, RawSpectrum, RawSpectrumProvider};

/// An error that might occur during peak spotting
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpottingError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Required input {0} is empty")]
    EmptyInput(&'static str),
    #[error("Peak spotting was cancelled")]
    Cancelled,
    #[error("Failed to read raw data: {0}")]
    RawData(
        #[source]
        #[from]
        RawDataError,
    ),
}

/// The largest number of spike pairs tolerated around a peak
const MAX_SPIKE_PAIRS: usize = 4;
/// The furthest distance scanned for spikes on either side of a peak
const SPIKE_SCAN_CAP: usize = 50;
/// The largest apex distance at which two peaks of adjacent slices are considered redundant
const REDUNDANT_APEX_TOLERANCE: f64 = 0.03;
/// The search radius used when refining peak boundaries
const REFINE_RADIUS: usize = 2;
/// Drift sub-peaks whose edge-corrected height falls below this fraction of the tallest
/// sub-peak are dropped
const DRIFT_PEAK_MIN_RATIO: f64 = 0.1;

/// The spectra a sweep extracts chromatograms from, along one axis
#[derive(Debug, Clone, Copy)]
struct SweepSource<'a> {
    axis: ChromXType,
    unit: ChromXUnit,
    ms1: &'a [RawSpectrum],
    mobility_scans: &'a [RawSpectrum],
    begin: f64,
    end: f64,
}

impl SweepSource<'_> {
    fn extract(&self, mz: f64, tolerance: f64, begin: f64, end: f64) -> Chromatogram {
        let begin = begin.max(self.begin);
        let end = end.min(self.end);
        match self.axis {
            ChromXType::Drift => {
                let mut chrom = extract_drift_chromatogram(
                    self.mobility_scans,
                    mz,
                    tolerance,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    self.unit,
                );
                chrom
                    .peaks
                    .retain(|p| p.time() >= begin && p.time() <= end);
                chrom
            }
            _ => extract_rt_chromatogram(self.ms1, mz, tolerance, begin, end, self.unit),
        }
    }

    fn observed_mz_range(&self) -> Option<(f64, f64)> {
        let spectra = match self.axis {
            ChromXType::Drift => self.mobility_scans,
            _ => self.ms1,
        };
        spectra
            .iter()
            .filter_map(|s| s.mz_range())
            .fold(None, |acc, (lo, hi)| match acc {
                None => Some((lo, hi)),
                Some((a, b)) => Some((lo.min(a), hi.max(b))),
            })
    }
}

/// Detects chromatographic features within a single sample.
///
/// The sweep is strictly ordered from low to high mass because redundancy removal only
/// compares a slice's peaks against those of the slice before it.
#[derive(Debug, Clone, Default)]
pub struct PeakSpottingCore {
    params: ProcessingParameters,
}

impl PeakSpottingCore {
    pub fn new(params: ProcessingParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ProcessingParameters {
        &self.params
    }

    fn peak_pick(&self) -> &PeakPickParameters {
        &self.params.peak_pick
    }

    fn detection_params(&self) -> PeakDetectionParams {
        let p = self.peak_pick();
        PeakDetectionParams::new(p.minimum_datapoints, p.minimum_amplitude, p.noise_factor)
    }

    fn validate(&self, chrom_begin: f64, chrom_end: f64, axis: ChromXType) -> Result<(), SpottingError> {
        let p = self.peak_pick();
        let invalid = |name: &'static str, reason: String| {
            Err(SpottingError::InvalidParameter { name, reason })
        };
        if !(p.mass_slice_width > 0.0) {
            return invalid("mass_slice_width", format!("{} must be positive", p.mass_slice_width));
        }
        if !(p.centroid_ms1_tolerance > 0.0) {
            return invalid(
                "centroid_ms1_tolerance",
                format!("{} must be positive", p.centroid_ms1_tolerance),
            );
        }
        if p.minimum_datapoints == 0 {
            return invalid("minimum_datapoints", "must be at least 1".to_string());
        }
        if p.minimum_amplitude < 0.0 {
            return invalid(
                "minimum_amplitude",
                format!("{} must not be negative", p.minimum_amplitude),
            );
        }
        if p.mass_range_begin > p.mass_range_end {
            return invalid(
                "mass_range_begin",
                format!("{} exceeds mass_range_end {}", p.mass_range_begin, p.mass_range_end),
            );
        }
        if chrom_begin > chrom_end {
            return invalid("chrom_begin", format!("{chrom_begin} exceeds chrom_end {chrom_end}"));
        }
        if axis == ChromXType::Mz {
            return invalid("axis", "peak spotting requires a time axis".to_string());
        }
        Ok(())
    }

    /// Detect all features of a sample.
    ///
    /// # Arguments
    /// - `provider`: The source of raw spectra
    /// - `chrom_begin`, `chrom_end`: The range of the chromatographic axis to search
    /// - `axis`: The axis chromatograms are built along
    /// - `unit`: The unit of the chromatographic axis
    ///
    /// # Returns
    /// The features ordered by apex coordinate and then mass, with dense `peak_id`s
    pub fn detect_features<P: RawSpectrumProvider + ?Sized>(
        &self,
        provider: &P,
        chrom_begin: f64,
        chrom_end: f64,
        axis: ChromXType,
        unit: ChromXUnit,
    ) -> Result<Vec<ChromatogramPeakFeature>, SpottingError> {
        self.detect_features_with_progress(
            provider,
            chrom_begin,
            chrom_end,
            axis,
            unit,
            &NoProgress,
            None,
        )
    }

    /// As [`PeakSpottingCore::detect_features`], reporting progress after every mass slice
    /// and checking `cancel` between slices.
    #[allow(clippy::too_many_arguments)]
    pub fn detect_features_with_progress<P: RawSpectrumProvider + ?Sized, R: ProgressReporter + ?Sized>(
        &self,
        provider: &P,
        chrom_begin: f64,
        chrom_end: f64,
        axis: ChromXType,
        unit: ChromXUnit,
        progress: &R,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<ChromatogramPeakFeature>, SpottingError> {
        self.validate(chrom_begin, chrom_end, axis)?;
        let all_spectra = provider.load_ms_spectra()?;
        if all_spectra.is_empty() {
            return Err(SpottingError::EmptyInput("raw spectra"));
        }
        let ms1 = provider.load_ms1_spectra()?;
        let mobility_scans: Vec<RawSpectrum> = if provider.is_ion_mobility() {
            all_spectra
                .iter()
                .filter(|s| s.ms_level == 1 && s.has_ion_mobility())
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        let source = SweepSource {
            axis,
            unit,
            ms1,
            mobility_scans: &mobility_scans,
            begin: chrom_begin,
            end: chrom_end,
        };

        let is_cancelled = || cancel.is_some_and(|c| c.is_cancelled());

        let mut features = self.sweep(&source, progress, &is_cancelled)?;
        debug!("Retained {} peaks after the mass slice sweep", features.len());

        features = features
            .into_iter()
            .filter_map(|f| self.recalculate(&source, f))
            .collect();
        debug!("Retained {} peaks after boundary recalculation", features.len());

        features.sort_by(|a, b| {
            a.apex_time()
                .total_cmp(&b.apex_time())
                .then(a.mass.total_cmp(&b.mass))
        });
        for (i, f) in features.iter_mut().enumerate() {
            f.peak_id = i;
            f.master_peak_id = i as i32;
        }

        let msn: Vec<&RawSpectrum> = all_spectra.iter().filter(|s| s.ms_level > 1).collect();
        if !msn.is_empty() {
            for f in features.iter_mut() {
                if is_cancelled() {
                    return Err(SpottingError::Cancelled);
                }
                if axis == ChromXType::Drift {
                    self.link_ms2_by_drift(f, &msn);
                } else {
                    self.link_ms2(f, all_spectra, provider.is_ion_mobility());
                }
            }
        }

        if provider.is_ion_mobility() && axis == ChromXType::RT {
            for f in features.iter_mut() {
                if is_cancelled() {
                    return Err(SpottingError::Cancelled);
                }
                let mut drift_features = self.detect_drift_features(&mobility_scans, f);
                if !msn.is_empty() {
                    for d in drift_features.iter_mut() {
                        self.link_ms2_by_drift(d, &msn);
                    }
                }
                f.drift_chrom_features = drift_features;
            }
        }
        debug!("Detected {} features", features.len());
        Ok(features)
    }

    fn sweep<R: ProgressReporter + ?Sized>(
        &self,
        source: &SweepSource<'_>,
        progress: &R,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<Vec<ChromatogramPeakFeature>, SpottingError> {
        let p = self.peak_pick();
        let Some((min_mz, max_mz)) = source.observed_mz_range() else {
            return Ok(Vec::new());
        };
        let begin = min_mz.max(p.mass_range_begin);
        let end = max_mz.min(p.mass_range_end);
        if begin > end {
            return Ok(Vec::new());
        }
        let step = p.mass_step();
        // the last slice must reach past `end`
        let n_steps = ((end - begin) / step).ceil() as usize + 1;
        debug!("Sweeping {n_steps} mass slices from {begin:.4} to {end:.4}");

        let mut accumulated = Vec::new();
        let mut previous: Vec<ChromatogramPeakFeature> = Vec::new();
        for i in 0..n_steps {
            if is_cancelled() {
                return Err(SpottingError::Cancelled);
            }
            let focused_mass = begin + i as f64 * step;
            let mut current = self.spot_slice(source, focused_mass, step / 2.0);
            if !current.is_empty() {
                trace!("Found {} peaks at {focused_mass:.4}", current.len());
            }
            remove_redundant(&mut previous, &mut current, step);
            accumulated.append(&mut previous);
            previous = current;
            progress.report(i + 1, n_steps);
        }
        accumulated.append(&mut previous);
        Ok(accumulated)
    }

    /// Pick peaks in the chromatogram of one mass slice
    fn spot_slice(
        &self,
        source: &SweepSource<'_>,
        focused_mass: f64,
        half_width: f64,
    ) -> Vec<ChromatogramPeakFeature> {
        let p = self.peak_pick();
        let chrom = source.extract(focused_mass, half_width, source.begin, source.end);
        if chrom.len() < p.minimum_datapoints || chrom.is_blank() {
            return Vec::new();
        }
        let smoothed = smooth(&chrom.peaks, p.smoothing_method, p.smoothing_level);
        let results = detect_peaks(&smoothed, &self.detection_params());

        results
            .iter()
            .filter(|r| !is_spike_noise(&smoothed, r))
            .filter_map(|r| {
                let mass = chrom.peaks[r.top].mass;
                if p.is_excluded(mass) {
                    return None;
                }
                Some(build_feature(&smoothed, r, mass))
            })
            .collect()
    }

    /// Refine the boundaries of `feature` against a narrower extraction around it.
    ///
    /// Returns `None` when the refined peak falls below the minimum amplitude.
    fn recalculate(
        &self,
        source: &SweepSource<'_>,
        feature: ChromatogramPeakFeature,
    ) -> Option<ChromatogramPeakFeature> {
        let p = self.peak_pick();
        let margin = feature.width() * 1.5;
        let chrom = source.extract(
            feature.mass,
            p.centroid_ms1_tolerance,
            feature.chrom_xs_left.value() - margin,
            feature.chrom_xs_right.value() + margin,
        );
        if chrom.len() < 3 {
            return (feature.net_height() >= p.minimum_amplitude).then_some(feature);
        }
        let smoothed = smooth(&chrom.peaks, p.smoothing_method, p.smoothing_level);
        let n = smoothed.len();
        let near_top = nearest_position(&smoothed, feature.chrom_xs_top.value());
        let near_left = nearest_position(&smoothed, feature.chrom_xs_left.value());
        let near_right = nearest_position(&smoothed, feature.chrom_xs_right.value());

        let top = argmax(&smoothed, window(near_top, n)).unwrap_or(near_top);
        let left_range = window(near_left, n);
        let left = if top == 0 {
            0
        } else {
            argmin(&smoothed, left_range.start..left_range.end.min(top))
                .filter(|i| smoothed[*i].intensity <= smoothed[near_left.min(top)].intensity)
                .unwrap_or(near_left.min(top))
        };
        let right_range = window(near_right, n);
        let right = argmin(&smoothed, right_range.start.max(top + 1)..right_range.end)
            .filter(|i| smoothed[*i].intensity <= smoothed[near_right.max(top)].intensity)
            .unwrap_or(near_right.max(top));

        let noise = estimate_noise(&smoothed, p.noise_factor);
        let result = describe_peak(&smoothed, left, top, right, noise);
        if result.net_height() < p.minimum_amplitude {
            trace!(
                "Discarding peak at {:.4} {:.3} after recalculation",
                feature.mass,
                feature.apex_time()
            );
            return None;
        }
        let refined = build_feature(&smoothed, &result, smoothed[top].mass);
        Some(ChromatogramPeakFeature {
            mass: feature.mass,
            ..refined
        })
    }

    /// Link the MS2 scans acquired between the boundaries of `feature` whose precursor
    /// selection is compatible with its mass. For ion mobility data the right boundary
    /// extends to the last mobility scan of the right frame.
    fn link_ms2(
        &self,
        feature: &mut ChromatogramPeakFeature,
        all_spectra: &[RawSpectrum],
        ion_mobility: bool,
    ) {
        let right = if ion_mobility {
            last_scan_of_frame(all_spectra, feature.ms1_raw_spectrum_id_right)
        } else {
            feature.ms1_raw_spectrum_id_right
        };
        let start = all_spectra.partition_point(|s| s.index < feature.ms1_raw_spectrum_id_left);
        let end = all_spectra.partition_point(|s| s.index <= right);
        let candidates: Vec<&RawSpectrum> = all_spectra[start..end]
            .iter()
            .filter(|s| s.ms_level > 1)
            .collect();
        let apex = feature.rt();
        self.assign_ms2(feature, &candidates, |s| (s.time - apex).abs());
    }

    fn link_ms2_by_drift(&self, feature: &mut ChromatogramPeakFeature, msn: &[&RawSpectrum]) {
        let lo = feature.chrom_xs_left.drift;
        let hi = feature.chrom_xs_right.drift;
        let (rt_lo, rt_hi) = if feature.parent_peak_id >= 0 {
            (feature.chrom_xs_left.rt, feature.chrom_xs_right.rt)
        } else {
            (f64::NEG_INFINITY, f64::INFINITY)
        };
        let candidates: Vec<&RawSpectrum> = msn
            .iter()
            .copied()
            .filter(|s| s.drift_time >= lo && s.drift_time <= hi)
            .filter(|s| s.time >= rt_lo && s.time <= rt_hi)
            .collect();
        let apex = feature.drift_time();
        self.assign_ms2(feature, &candidates, |s| (s.drift_time - apex).abs());
    }

    fn assign_ms2<F: Fn(&RawSpectrum) -> f64>(
        &self,
        feature: &mut ChromatogramPeakFeature,
        candidates: &[&RawSpectrum],
        distance: F,
    ) {
        let tolerance = self.peak_pick().centroid_ms1_tolerance;
        let acquisition = self.params.acquisition_type;
        let matched: Vec<&RawSpectrum> = candidates
            .iter()
            .copied()
            .filter(|s| match s.precursor.as_ref() {
                Some(prec) => match acquisition {
                    AcquisitionType::DDA => (prec.selected_mz - feature.mass).abs() <= tolerance,
                    AcquisitionType::AIF | AcquisitionType::SWATH => prec.contains(feature.mass),
                },
                None => acquisition.is_data_independent(),
            })
            .collect();
        if matched.is_empty() {
            return;
        }
        feature.ms2_raw_spectrum_ids = matched.iter().map(|s| s.index).collect();
        feature.ms2_raw_spectrum_id = matched
            .iter()
            .min_by(|a, b| distance(a).total_cmp(&distance(b)))
            .map(|s| s.index);

        if acquisition.is_multi_ce() {
            let mut by_ce: Vec<(f64, &RawSpectrum)> = Vec::new();
            for s in matched {
                let ce = s.precursor.map(|p| p.collision_energy).unwrap_or_default();
                match by_ce.iter_mut().find(|(c, _)| (c - ce).abs() < 1e-6) {
                    Some(entry) => {
                        if distance(s) < distance(entry.1) {
                            entry.1 = s;
                        }
                    }
                    None => by_ce.push((ce, s)),
                }
            }
            by_ce.sort_by(|a, b| a.0.total_cmp(&b.0));
            feature.ms2_raw_spectrum_id_to_ce =
                by_ce.into_iter().map(|(ce, s)| (s.index, ce)).collect();
        }
    }

    /// Split a retention time peak along the drift time axis
    fn detect_drift_features(
        &self,
        mobility_scans: &[RawSpectrum],
        feature: &ChromatogramPeakFeature,
    ) -> Vec<ChromatogramPeakFeature> {
        let p = self.peak_pick();
        let chrom = extract_drift_chromatogram(
            mobility_scans,
            feature.mass,
            p.centroid_ms1_tolerance,
            feature.chrom_xs_left.rt,
            feature.chrom_xs_right.rt,
            self.params.ion_mobility.mobility_type.drift_unit(),
        );
        if chrom.len() < 3 || chrom.is_blank() {
            return Vec::new();
        }
        let smoothed = smooth(&chrom.peaks, p.smoothing_method, p.smoothing_level);
        let params = PeakDetectionParams::new(p.minimum_datapoints.min(3), 0.0, p.noise_factor);
        let results = detect_peaks(&smoothed, &params);
        let tallest = results
            .iter()
            .map(|r| r.net_height())
            .fold(0.0, f64::max);
        if tallest <= 0.0 {
            return Vec::new();
        }
        results
            .iter()
            .filter(|r| r.net_height() >= tallest * DRIFT_PEAK_MIN_RATIO)
            .enumerate()
            .map(|(i, r)| {
                let mut drift_feature = build_feature(&smoothed, r, feature.mass);
                drift_feature.peak_id = i;
                drift_feature.master_peak_id = i as i32;
                drift_feature.parent_peak_id = feature.peak_id as i32;
                for xs in [
                    &mut drift_feature.chrom_xs,
                    &mut drift_feature.chrom_xs_top,
                    &mut drift_feature.chrom_xs_left,
                    &mut drift_feature.chrom_xs_right,
                ] {
                    xs.rt = feature.rt();
                }
                drift_feature.chrom_xs_left.rt = feature.chrom_xs_left.rt;
                drift_feature.chrom_xs_right.rt = feature.chrom_xs_right.rt;
                drift_feature
            })
            .collect()
    }
}

/// The raw index of the last MS1 scan of the frame whose first scan has raw index `head`.
/// MSn scans interleaved with the frame's mobility scans are stepped over.
fn last_scan_of_frame(all_spectra: &[RawSpectrum], head: usize) -> usize {
    let start = all_spectra.partition_point(|s| s.index < head);
    let Some(first) = all_spectra.get(start) else {
        return head;
    };
    all_spectra[start..]
        .iter()
        .take_while(|s| s.ms_level > 1 || (s.time - first.time).abs() < 1e-9)
        .filter(|s| s.ms_level == 1)
        .map(|s| s.index)
        .last()
        .unwrap_or(head)
}

fn window(center: usize, n: usize) -> Range<usize> {
    center.saturating_sub(REFINE_RADIUS)..(center + REFINE_RADIUS + 1).min(n)
}

fn argmax(peaks: &[ChromatogramPeak], range: Range<usize>) -> Option<usize> {
    range
        .filter(|i| *i < peaks.len())
        .max_by(|a, b| peaks[*a].intensity.total_cmp(&peaks[*b].intensity))
}

fn argmin(peaks: &[ChromatogramPeak], range: Range<usize>) -> Option<usize> {
    range
        .filter(|i| *i < peaks.len())
        .min_by(|a, b| peaks[*a].intensity.total_cmp(&peaks[*b].intensity))
}

/// Build a feature from a detection result over `peaks`
fn build_feature(
    peaks: &[ChromatogramPeak],
    result: &PeakDetectionResult,
    mass: f64,
) -> ChromatogramPeakFeature {
    let (top, left, right) = (&peaks[result.top], &peaks[result.left], &peaks[result.right]);
    ChromatogramPeakFeature {
        mass,
        chrom_xs: top.chrom,
        chrom_xs_top: top.chrom,
        chrom_xs_left: left.chrom,
        chrom_xs_right: right.chrom,
        chrom_scan_id_top: top.id,
        chrom_scan_id_left: left.id,
        chrom_scan_id_right: right.id,
        peak_height_top: result.intensity_top,
        peak_height_left: result.intensity_left,
        peak_height_right: result.intensity_right,
        peak_area_above_zero: result.area_above_zero,
        peak_area_above_baseline: result.area_above_baseline,
        ms1_raw_spectrum_id_top: top.raw_spectrum_id,
        ms1_raw_spectrum_id_left: left.raw_spectrum_id,
        ms1_raw_spectrum_id_right: right.raw_spectrum_id,
        peak_shape: PeakShape::from(result),
        ..Default::default()
    }
}

fn count_spikes(peaks: &[ChromatogramPeak], threshold: f64) -> usize {
    let mut count = 0;
    let mut last_min: Option<f64> = None;
    for w in peaks.windows(3) {
        let (a, b, c) = (w[0].intensity, w[1].intensity, w[2].intensity);
        if b < a && b <= c {
            last_min = Some(b);
        } else if b > a && b >= c {
            if let Some(m) = last_min.take() {
                if b - m > threshold {
                    count += 1;
                }
            }
        }
    }
    count
}

/// Whether the baseline around a peak rings with spikes comparable to the peak itself
fn is_spike_noise(peaks: &[ChromatogramPeak], result: &PeakDetectionResult) -> bool {
    let threshold = result.net_height() / 3.0;
    let span = (10 * result.width()).min(SPIKE_SCAN_CAP);
    let start = result.left.saturating_sub(span);
    let end = (result.right + span + 1).min(peaks.len());
    let spikes = count_spikes(&peaks[start..=result.left], threshold)
        + count_spikes(&peaks[result.right..end], threshold);
    spikes > MAX_SPIKE_PAIRS
}

/// Whether two peaks from adjacent mass slices describe the same signal
pub fn is_redundant(a: &ChromatogramPeakFeature, b: &ChromatogramPeakFeature, mass_step: f64) -> bool {
    if (a.mass - b.mass).abs() > mass_step / 2.0 {
        return false;
    }
    if !spans_overlap(
        a.chrom_xs_left.value(),
        a.chrom_xs_right.value(),
        b.chrom_xs_left.value(),
        b.chrom_xs_right.value(),
    ) {
        return false;
    }
    let tolerance = REDUNDANT_APEX_TOLERANCE.min((a.width() + b.width()) * 0.25);
    (a.apex_time() - b.apex_time()).abs() < tolerance
}

/// Remove redundant peaks between the previous slice and the current one, keeping the
/// more intense member of each redundant pair.
pub fn remove_redundant(
    previous: &mut Vec<ChromatogramPeakFeature>,
    current: &mut Vec<ChromatogramPeakFeature>,
    mass_step: f64,
) {
    if previous.is_empty() || current.is_empty() {
        return;
    }
    let mut keep_previous = vec![true; previous.len()];
    let mut keep_current = vec![true; current.len()];
    for (j, c) in current.iter().enumerate() {
        for (i, p) in previous.iter().enumerate() {
            if !keep_previous[i] || !is_redundant(p, c, mass_step) {
                continue;
            }
            if c.peak_height_top > p.peak_height_top {
                keep_previous[i] = false;
            } else {
                keep_current[j] = false;
                break;
            }
        }
    }
    let mut it = keep_previous.iter();
    previous.retain(|_| *it.next().unwrap_or(&true));
    let mut it = keep_current.iter();
    current.retain(|_| *it.next().unwrap_or(&true));
}
