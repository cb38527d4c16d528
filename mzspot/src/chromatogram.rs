//! Chromatographic coordinates and extracted ion chromatogram construction.
use std::fmt::Display;

use crate::spectrum::RawSpectrum;

/// The axis a chromatogram is laid out along
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChromXType {
    #[default]
    RT,
    Drift,
    Mz,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChromXUnit {
    #[default]
    Min,
    Sec,
    Msec,
    /// Inverse reduced mobility, V·s/cm²
    OneOverK0,
    Mz,
    None,
}

impl Display for ChromXUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChromXUnit::Min => "min",
            ChromXUnit::Sec => "sec",
            ChromXUnit::Msec => "msec",
            ChromXUnit::OneOverK0 => "Vs/cm2",
            ChromXUnit::Mz => "m/z",
            ChromXUnit::None => "",
        };
        f.write_str(s)
    }
}

/// A point in chromatographic space. The retention time, drift time and m/z are all carried,
/// `main_type` selects which one [`ChromXs::value`] reports.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChromXs {
    pub rt: f64,
    pub drift: f64,
    pub mz: f64,
    pub main_type: ChromXType,
    pub unit: ChromXUnit,
}

impl ChromXs {
    pub fn new(rt: f64, drift: f64, mz: f64, main_type: ChromXType, unit: ChromXUnit) -> Self {
        Self {
            rt,
            drift,
            mz,
            main_type,
            unit,
        }
    }

    pub fn from_rt(rt: f64, unit: ChromXUnit) -> Self {
        Self::new(rt, 0.0, 0.0, ChromXType::RT, unit)
    }

    pub fn from_drift(drift: f64, unit: ChromXUnit) -> Self {
        Self::new(0.0, drift, 0.0, ChromXType::Drift, unit)
    }

    pub fn value(&self) -> f64 {
        match self.main_type {
            ChromXType::RT => self.rt,
            ChromXType::Drift => self.drift,
            ChromXType::Mz => self.mz,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        match self.main_type {
            ChromXType::RT => self.rt = value,
            ChromXType::Drift => self.drift = value,
            ChromXType::Mz => self.mz = value,
        }
        self
    }
}

/// One data point of an extracted ion chromatogram.
///
/// `id` is the ordinal of the point's spectrum along the chromatographic axis and
/// `raw_spectrum_id` is the index of that spectrum in the provider's full spectrum list.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChromatogramPeak {
    pub id: usize,
    pub raw_spectrum_id: usize,
    pub mass: f64,
    pub intensity: f64,
    pub chrom: ChromXs,
}

impl ChromatogramPeak {
    pub fn new(id: usize, raw_spectrum_id: usize, mass: f64, intensity: f64, chrom: ChromXs) -> Self {
        Self {
            id,
            raw_spectrum_id,
            mass,
            intensity,
            chrom,
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.chrom.value()
    }
}

/// An ordered list of [`ChromatogramPeak`] along one axis
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Chromatogram {
    pub peaks: Vec<ChromatogramPeak>,
    pub axis: ChromXType,
    pub unit: ChromXUnit,
}

impl Chromatogram {
    pub fn new(peaks: Vec<ChromatogramPeak>, axis: ChromXType, unit: ChromXUnit) -> Self {
        Self { peaks, axis, unit }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChromatogramPeak> {
        self.peaks.iter()
    }

    /// Whether every point has zero intensity
    pub fn is_blank(&self) -> bool {
        self.peaks.iter().all(|p| p.intensity <= 0.0)
    }

    /// The position of the point whose chromatographic coordinate is closest to `value`
    pub fn nearest_index(&self, value: f64) -> Option<usize> {
        (!self.peaks.is_empty()).then(|| nearest_position(&self.peaks, value))
    }

    /// The position of the point with the given axis ordinal `id`
    pub fn position_of(&self, id: usize) -> Option<usize> {
        self.peaks.binary_search_by(|p| p.id.cmp(&id)).ok()
    }
}

/// The position in `peaks` whose coordinate is closest to `value`. `peaks` must not be empty.
pub fn nearest_position(peaks: &[ChromatogramPeak], value: f64) -> usize {
    let i = peaks.partition_point(|p| p.time() < value);
    if i == 0 {
        0
    } else if i >= peaks.len() {
        peaks.len() - 1
    } else if (peaks[i].time() - value).abs() < (peaks[i - 1].time() - value).abs() {
        i
    } else {
        i - 1
    }
}

/// Sum the intensities of the peaks of `spectrum` within `[mz - tolerance, mz + tolerance]`,
/// returning the m/z of the most intense contributor and the summed intensity.
pub fn extract_intensity(spectrum: &RawSpectrum, mz: f64, tolerance: f64) -> (f64, f64) {
    let peaks = spectrum.peaks_between(mz - tolerance, mz + tolerance);
    let mut total = 0.0;
    let mut base_mz = mz;
    let mut base_int = -1.0f32;
    for p in peaks {
        total += p.intensity as f64;
        if p.intensity > base_int {
            base_int = p.intensity;
            base_mz = p.mz;
        }
    }
    (base_mz, total)
}

/// Build an extracted ion chromatogram along the retention time axis.
///
/// # Arguments
/// - `spectra`: The MS1 spectra in acquisition order
/// - `mz`: The center of the extraction window
/// - `tolerance`: The half-width of the extraction window in Da
/// - `chrom_begin`, `chrom_end`: The retention time range to include
/// - `unit`: The unit retention times are reported in
///
/// Every spectrum within the time range contributes one point, zero if nothing falls in
/// the window, so point ordinals stay aligned with spectrum ordinals.
pub fn extract_rt_chromatogram(
    spectra: &[RawSpectrum],
    mz: f64,
    tolerance: f64,
    chrom_begin: f64,
    chrom_end: f64,
    unit: ChromXUnit,
) -> Chromatogram {
    let mut peaks = Vec::new();
    for (i, s) in spectra.iter().enumerate() {
        if s.time < chrom_begin {
            continue;
        }
        if s.time > chrom_end {
            break;
        }
        let (mass, intensity) = extract_intensity(s, mz, tolerance);
        let chrom = ChromXs::new(s.time, 0.0, mass, ChromXType::RT, unit);
        peaks.push(ChromatogramPeak::new(i, s.index, mass, intensity, chrom));
    }
    Chromatogram::new(peaks, ChromXType::RT, unit)
}

/// Build an extracted ion chromatogram along the drift time axis from the MS1 mobility
/// scans whose retention time falls within `[rt_begin, rt_end]`. Scans sharing a drift
/// time are summed, and the raw spectrum id of a point is the scan with the largest
/// contribution.
pub fn extract_drift_chromatogram(
    spectra: &[RawSpectrum],
    mz: f64,
    tolerance: f64,
    rt_begin: f64,
    rt_end: f64,
    unit: ChromXUnit,
) -> Chromatogram {
    let mut bins: Vec<(f64, f64, f64, usize, f64, f64)> = Vec::new();
    let mut scans: Vec<&RawSpectrum> = spectra
        .iter()
        .filter(|s| s.ms_level == 1 && s.time >= rt_begin && s.time <= rt_end)
        .collect();
    scans.sort_by(|a, b| a.drift_time.total_cmp(&b.drift_time));

    for s in scans {
        let (mass, intensity) = extract_intensity(s, mz, tolerance);
        match bins.last_mut() {
            Some(last) if (last.0 - s.drift_time).abs() < 1e-6 => {
                last.1 += intensity;
                if intensity > last.4 {
                    last.2 = mass;
                    last.3 = s.index;
                    last.4 = intensity;
                    last.5 = s.time;
                }
            }
            _ => bins.push((s.drift_time, intensity, mass, s.index, intensity, s.time)),
        }
    }
    let peaks = bins
        .into_iter()
        .enumerate()
        .map(|(i, (drift, intensity, mass, raw_id, _, rt))| {
            let chrom = ChromXs::new(rt, drift, mass, ChromXType::Drift, unit);
            ChromatogramPeak::new(i, raw_id, mass, intensity, chrom)
        })
        .collect();
    Chromatogram::new(peaks, ChromXType::Drift, unit)
}

/// Whether the closed intervals `[a_start, a_end]` and `[b_start, b_end]` overlap
#[inline]
pub fn spans_overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Trapezoidal area under `peaks[left..=right]` along the chromatographic axis.
pub fn trapezoid_area(peaks: &[ChromatogramPeak], left: usize, right: usize) -> f64 {
    if peaks.is_empty() || left >= right || right >= peaks.len() {
        return 0.0;
    }
    peaks[left..=right]
        .windows(2)
        .map(|w| (w[1].time() - w[0].time()) * (w[0].intensity + w[1].intensity) * 0.5)
        .sum()
}

#[cfg(test)]
mod test {
    use super::*;
    use mzpeaks::CentroidPeak;

    fn spectra() -> Vec<RawSpectrum> {
        (0..10)
            .map(|i| {
                RawSpectrum::new(
                    i,
                    i as f64 * 0.1,
                    1,
                    vec![
                        CentroidPeak::new(200.0, (i * 10) as f32, 0),
                        CentroidPeak::new(200.004, 1.0, 0),
                        CentroidPeak::new(300.0, 5.0, 0),
                    ],
                )
            })
            .collect()
    }

    #[test]
    fn test_extract_rt() {
        let spectra = spectra();
        let chrom = extract_rt_chromatogram(&spectra, 200.0, 0.005, 0.15, 0.75, ChromXUnit::Min);
        assert_eq!(chrom.len(), 6);
        assert_eq!(chrom.peaks[0].id, 2);
        assert_eq!(chrom.peaks[0].intensity, 21.0);
        assert_eq!(chrom.peaks[0].mass, 200.0);
        assert_eq!(chrom.nearest_index(0.41), Some(2));
        assert_eq!(chrom.position_of(4), Some(2));
    }

    #[test]
    fn test_extract_drift() {
        let spectra: Vec<_> = (0..6)
            .map(|i| {
                RawSpectrum::new(i, 1.0, 1, vec![CentroidPeak::new(400.0, 10.0 * i as f32, 0)])
                    .with_drift_time(5.0 + (i % 3) as f64)
            })
            .collect();
        let chrom = extract_drift_chromatogram(&spectra, 400.0, 0.01, 0.9, 1.1, ChromXUnit::Msec);
        assert_eq!(chrom.len(), 3);
        assert_eq!(chrom.peaks[0].intensity, 30.0);
        assert_eq!(chrom.peaks[0].raw_spectrum_id, 3);
        assert_eq!(chrom.peaks[2].chrom.drift, 7.0);
    }

    #[test]
    fn test_trapezoid() {
        let peaks: Vec<_> = (0..3)
            .map(|i| {
                ChromatogramPeak::new(
                    i,
                    i,
                    100.0,
                    if i == 1 { 2.0 } else { 0.0 },
                    ChromXs::from_rt(i as f64, ChromXUnit::Min),
                )
            })
            .collect();
        assert_eq!(trapezoid_area(&peaks, 0, 2), 2.0);
        assert!(spans_overlap(0.0, 1.0, 1.0, 2.0));
        assert!(!spans_overlap(0.0, 1.0, 1.1, 2.0));
    }
}
