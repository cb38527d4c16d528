//! Re-extraction of peaks missing from a sample after matching.
//!
//! The search itself is axis independent. What differs between filling a retention time
//! slot and a drift time slot is which spectra are read and how the chromatogram is
//! extracted, which [`GapFillAxis`] encapsulates.
use std::ops::RangeInclusive;

use tracing::{trace, warn};

use mzspot::chromatogram::{
    extract_drift_chromatogram, extract_rt_chromatogram, nearest_position, trapezoid_area, ChromXType,
    ChromXUnit, ChromXs, ChromatogramPeak,
};
use mzspot::params::ProcessingParameters;
use mzspot::smoothing::{smooth, SmoothingMethod};
use mzspot::spectrum::{RawDataError, RawSpectrum, RawSpectrumProvider};

use crate::spot::{AlignmentChromPeakFeature, UNASSIGNED};

/// The smallest half-width of the extraction window in Da
pub const MINIMUM_MASS_TOLERANCE: f64 = 0.005;
/// The number of points searched either side of the apex when forcing a peak
pub const FORCED_RADIUS: usize = 5;
/// The number of points that must exist either side of a candidate apex
pub const EDGE_MARGIN: usize = 2;

/// The chromatographic axis a gap is filled along
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GapFillAxis {
    /// Extract from the MS1 spectra along retention time
    RetentionTime,
    /// Extract from the mobility scans within a retention time window along drift time
    Drift { rt_begin: f64, rt_end: f64 },
}

impl GapFillAxis {
    pub fn chrom_type(&self) -> ChromXType {
        match self {
            Self::RetentionTime => ChromXType::RT,
            Self::Drift { .. } => ChromXType::Drift,
        }
    }

    fn spectra<'a, P: RawSpectrumProvider + ?Sized>(
        &self,
        provider: &'a P,
    ) -> Result<&'a [RawSpectrum], RawDataError> {
        match self {
            Self::RetentionTime => provider.load_ms1_spectra(),
            Self::Drift { .. } => provider.load_ms_spectra(),
        }
    }

    fn extract(
        &self,
        spectra: &[RawSpectrum],
        mz: f64,
        tolerance: f64,
        window: RangeInclusive<f64>,
        unit: ChromXUnit,
    ) -> Vec<ChromatogramPeak> {
        match *self {
            Self::RetentionTime => {
                extract_rt_chromatogram(spectra, mz, tolerance, *window.start(), *window.end(), unit).peaks
            }
            Self::Drift { rt_begin, rt_end } => {
                let mut peaks =
                    extract_drift_chromatogram(spectra, mz, tolerance, rt_begin, rt_end, unit).peaks;
                peaks.retain(|p| window.contains(&p.time()));
                peaks
            }
        }
    }
}

/// Where a missing peak is expected to be
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapFillTarget {
    pub mass: f64,
    pub center: ChromXs,
    pub width: f64,
}

impl GapFillTarget {
    pub fn new(mass: f64, center: ChromXs, width: f64) -> Self {
        Self {
            mass,
            center,
            width,
        }
    }
}

/// Searches a sample's raw data for a peak at an expected mass and chromatographic
/// position
#[derive(Debug, Clone)]
pub struct GapFiller {
    pub axis: GapFillAxis,
    pub mass_tolerance: f64,
    pub chrom_tolerance: f64,
    pub smoothing_method: SmoothingMethod,
    pub smoothing_level: usize,
}

impl GapFiller {
    pub fn new(axis: GapFillAxis, params: &ProcessingParameters) -> Self {
        let chrom_tolerance = match axis {
            GapFillAxis::RetentionTime => params.alignment.retention_time_tolerance,
            GapFillAxis::Drift { .. } => params.alignment.drift_time_tolerance,
        };
        Self {
            axis,
            mass_tolerance: params.peak_pick.centroid_ms1_tolerance,
            chrom_tolerance,
            smoothing_method: params.peak_pick.smoothing_method,
            smoothing_level: params.peak_pick.smoothing_level,
        }
    }

    /// Search `provider` for a peak matching `target`.
    ///
    /// # Arguments
    /// - `target`: The expected mass, chromatographic center and width
    /// - `file_id`, `file_name`: The sample being filled
    /// - `provider`: The sample's raw data
    /// - `force_insert`: Whether to build a peak around the closest signal when no
    ///   peak shaped candidate exists
    ///
    /// # Returns
    /// A gap filled slot, or a [`AlignmentChromPeakFeature::not_found`] slot when nothing
    /// plausible exists. This never fails; a provider error degrades to the latter.
    pub fn fill<P: RawSpectrumProvider + ?Sized>(
        &self,
        target: &GapFillTarget,
        file_id: usize,
        file_name: &str,
        provider: &P,
        force_insert: bool,
    ) -> AlignmentChromPeakFeature {
        let not_found =
            || AlignmentChromPeakFeature::not_found(file_id, file_name, target.mass, target.center);
        let spectra = match self.axis.spectra(provider) {
            Ok(spectra) => spectra,
            Err(e) => {
                warn!("Failed to load spectra of {file_name} for gap filling: {e}");
                return not_found();
            }
        };
        let center = target.center.value();
        let half_window = (target.width * 1.5).max(self.chrom_tolerance * 2.0);
        let tolerance = self.mass_tolerance.max(MINIMUM_MASS_TOLERANCE);
        let raw = self.axis.extract(
            spectra,
            target.mass,
            tolerance,
            (center - half_window)..=(center + half_window),
            target.center.unit,
        );
        if raw.len() < 3 {
            return not_found();
        }
        let peaks = smooth(&raw, self.smoothing_method, self.smoothing_level);

        let candidates = self.local_maxima(&peaks, center);
        let (left, top, right) = if candidates.is_empty() {
            if !force_insert {
                return not_found();
            }
            match forced_window(&peaks, target.mass, center) {
                Some(window) => window,
                None => return not_found(),
            }
        } else {
            let Some(&apex) = candidates.iter().min_by(|a, b| {
                let da = (peaks[**a].mass - target.mass).abs();
                let db = (peaks[**b].mass - target.mass).abs();
                da.total_cmp(&db).then(
                    (peaks[**a].time() - center)
                        .abs()
                        .total_cmp(&(peaks[**b].time() - center).abs()),
                )
            }) else {
                return not_found();
            };
            if (apex < EDGE_MARGIN || apex + EDGE_MARGIN >= peaks.len()) && !force_insert {
                trace!("Rejecting gap fill candidate at the edge of the window for {file_name}");
                return not_found();
            }
            let (left, right) = walk_edges(&peaks, apex, 0..=peaks.len() - 1);
            let top = tallest(&peaks, left..=right).unwrap_or(apex);
            (left, top, right)
        };

        if peaks[top].intensity <= 0.0 {
            return not_found();
        }
        self.build(target, file_id, file_name, &peaks, left, top, right)
    }

    /// Apex positions of peak shaped runs within the chromatographic tolerance of `center`
    fn local_maxima(&self, peaks: &[ChromatogramPeak], center: f64) -> Vec<usize> {
        (1..peaks.len().saturating_sub(1))
            .filter(|i| {
                let (a, b, c) = (
                    peaks[i - 1].intensity,
                    peaks[*i].intensity,
                    peaks[i + 1].intensity,
                );
                b > 0.0 && a <= b && b >= c && (a < b || b > c)
            })
            .filter(|i| (peaks[*i].time() - center).abs() <= self.chrom_tolerance)
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        target: &GapFillTarget,
        file_id: usize,
        file_name: &str,
        peaks: &[ChromatogramPeak],
        left: usize,
        top: usize,
        right: usize,
    ) -> AlignmentChromPeakFeature {
        let (l, t, r) = (&peaks[left], &peaks[top], &peaks[right]);
        let area_above_zero = trapezoid_area(peaks, left, right);
        let baseline = (r.time() - l.time()) * (l.intensity + r.intensity) * 0.5;
        let mass = if t.intensity > 0.0 { t.mass } else { target.mass };
        let mut chrom_xs_top = t.chrom;
        if self.axis.chrom_type() == ChromXType::Drift {
            chrom_xs_top.rt = target.center.rt;
        }
        AlignmentChromPeakFeature {
            peak_id: UNASSIGNED,
            master_peak_id: UNASSIGNED,
            mass,
            chrom_xs_top,
            chrom_xs_left: l.chrom,
            chrom_xs_right: r.chrom,
            chrom_scan_id_top: t.id,
            chrom_scan_id_left: l.id,
            chrom_scan_id_right: r.id,
            peak_height_top: t.intensity,
            peak_height_left: l.intensity,
            peak_height_right: r.intensity,
            peak_area_above_zero: area_above_zero,
            peak_area_above_baseline: (area_above_zero - baseline).max(0.0),
            ms1_raw_spectrum_id_top: t.raw_spectrum_id,
            ms1_raw_spectrum_id_left: l.raw_spectrum_id,
            ms1_raw_spectrum_id_right: r.raw_spectrum_id,
            is_gap_filled: true,
            ..AlignmentChromPeakFeature::empty(file_id, file_name, mass, target.center)
        }
    }
}

/// Walk outwards from `apex` while intensity does not increase, stopping at the first zero
/// and staying within `bounds`
fn walk_edges(peaks: &[ChromatogramPeak], apex: usize, bounds: RangeInclusive<usize>) -> (usize, usize) {
    let mut left = apex;
    while left > *bounds.start()
        && peaks[left].intensity > 0.0
        && peaks[left - 1].intensity <= peaks[left].intensity
    {
        left -= 1;
    }
    let mut right = apex;
    while right < *bounds.end()
        && peaks[right].intensity > 0.0
        && peaks[right + 1].intensity <= peaks[right].intensity
    {
        right += 1;
    }
    (left, right)
}

fn tallest(peaks: &[ChromatogramPeak], range: RangeInclusive<usize>) -> Option<usize> {
    range.max_by(|a, b| peaks[*a].intensity.total_cmp(&peaks[*b].intensity))
}

/// Build a window around the point whose mass is closest to `mass`, preferring points
/// nearer `center` on ties. Returns `None` when the chromatogram holds no signal.
fn forced_window(peaks: &[ChromatogramPeak], mass: f64, center: f64) -> Option<(usize, usize, usize)> {
    let nearest_center = nearest_position(peaks, center);
    let seed = peaks
        .iter()
        .enumerate()
        .filter(|(_, p)| p.intensity > 0.0)
        .min_by(|(i, a), (j, b)| {
            (a.mass - mass).abs().total_cmp(&(b.mass - mass).abs()).then(
                i.abs_diff(nearest_center).cmp(&j.abs_diff(nearest_center)),
            )
        })
        .map(|(i, _)| i)?;
    let lo = seed.saturating_sub(FORCED_RADIUS);
    let hi = (seed + FORCED_RADIUS).min(peaks.len() - 1);
    let top = tallest(peaks, lo..=hi).unwrap_or(seed);
    let (left, right) = walk_edges(peaks, top, lo..=hi);
    Some((left, top, right))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spot::NOT_FOUND;
    use mzpeaks::CentroidPeak;
    use mzspot::spectrum::{RawMeasurement, RawSpectrum};

    fn measurement(mass: f64, apex: Option<usize>) -> RawMeasurement {
        let spectra = (0usize..100)
            .map(|i| {
                let mut peaks = vec![CentroidPeak::new(50.0, 10.0, 0)];
                if let Some(apex) = apex {
                    let d = i.abs_diff(apex);
                    if d < 6 {
                        peaks.push(CentroidPeak::new(mass, 10000.0 * (6 - d) as f32 / 6.0, 1));
                    }
                }
                RawSpectrum::new(i, i as f64 * 0.1, 1, peaks)
            })
            .collect();
        RawMeasurement::new("sample", spectra)
    }

    fn filler(params: &ProcessingParameters) -> GapFiller {
        GapFiller::new(GapFillAxis::RetentionTime, params)
    }

    #[test]
    fn test_fill_found() {
        let params = ProcessingParameters::default();
        let data = measurement(250.0, Some(40));
        let target = GapFillTarget::new(250.001, ChromXs::from_rt(4.0, ChromXUnit::Min), 1.0);
        let filled = filler(&params).fill(&target, 1, "sample", &data, false);
        assert_eq!(filled.peak_id, UNASSIGNED);
        assert!(filled.is_gap_filled);
        assert_eq!(filled.chrom_scan_id_top, 40);
        assert!(filled.chrom_scan_id_left < 40 && filled.chrom_scan_id_right > 40);
        assert!(filled.peak_height_top >= filled.peak_height_left);
        assert!(filled.peak_height_top >= filled.peak_height_right);
        assert!(filled.peak_area_above_zero > 0.0);
        assert!((filled.mass - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_fill_empty_region() {
        let params = ProcessingParameters::default();
        let data = measurement(250.0, None);
        let target = GapFillTarget::new(250.0, ChromXs::from_rt(4.0, ChromXUnit::Min), 1.0);
        for force in [false, true] {
            let filled = filler(&params).fill(&target, 1, "sample", &data, force);
            assert_eq!(filled.peak_id, NOT_FOUND);
            assert_eq!(filled.master_peak_id, NOT_FOUND);
        }
    }

    #[test]
    fn test_forced_off_center() {
        let params = ProcessingParameters::default();
        let data = measurement(250.0, Some(58));
        let target = GapFillTarget::new(250.0, ChromXs::from_rt(4.0, ChromXUnit::Min), 1.0);
        let unforced = filler(&params).fill(&target, 1, "sample", &data, false);
        assert_eq!(unforced.peak_id, NOT_FOUND);
        let forced = filler(&params).fill(&target, 1, "sample", &data, true);
        assert_eq!(forced.peak_id, UNASSIGNED);
        assert!(forced.peak_height_top > 0.0);
    }
}
