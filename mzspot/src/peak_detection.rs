//! Local-extremum peak detection over smoothed chromatograms
use std::borrow::Cow;

use mzsignal::feature_statistics::{GaussianPeakShape, PeakFitArgs};

use crate::chromatogram::{trapezoid_area, ChromatogramPeak};

/// The criteria a candidate peak must satisfy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakDetectionParams {
    pub minimum_datapoints: usize,
    pub minimum_amplitude: f64,
    /// Scales the median absolute first difference used as the noise estimate
    pub noise_factor: f64,
}

impl Default for PeakDetectionParams {
    fn default() -> Self {
        Self {
            minimum_datapoints: 5,
            minimum_amplitude: 1000.0,
            noise_factor: 4.0,
        }
    }
}

impl PeakDetectionParams {
    pub fn new(minimum_datapoints: usize, minimum_amplitude: f64, noise_factor: f64) -> Self {
        Self {
            minimum_datapoints,
            minimum_amplitude,
            noise_factor,
        }
    }
}

/// A detected peak, indexed into the chromatogram it was found in
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PeakDetectionResult {
    pub top: usize,
    pub left: usize,
    pub right: usize,
    pub intensity_top: f64,
    pub intensity_left: f64,
    pub intensity_right: f64,
    pub area_above_zero: f64,
    pub area_above_baseline: f64,
    pub estimated_noise: f64,
    pub signal_to_noise: f64,
    pub symmetry: f64,
    pub sharpness: f64,
    pub gaussian_similarity: f64,
}

impl PeakDetectionResult {
    /// The height of the apex above the lower of the two edges
    pub fn net_height(&self) -> f64 {
        self.intensity_top - self.intensity_left.min(self.intensity_right)
    }

    pub fn width(&self) -> usize {
        self.right - self.left
    }
}

/// Estimate the noise level of a trace as the median absolute first difference of its
/// non-zero points, scaled by `factor`
pub fn estimate_noise(peaks: &[ChromatogramPeak], factor: f64) -> f64 {
    let mut diffs: Vec<f64> = peaks
        .windows(2)
        .filter(|w| w[0].intensity > 0.0 && w[1].intensity > 0.0)
        .map(|w| (w[1].intensity - w[0].intensity).abs())
        .filter(|d| *d > 0.0)
        .collect();
    if diffs.is_empty() {
        return 1.0;
    }
    diffs.sort_by(|a, b| a.total_cmp(b));
    let median = if diffs.len() % 2 == 0 {
        (diffs[diffs.len() / 2 - 1] + diffs[diffs.len() / 2]) / 2.0
    } else {
        diffs[diffs.len() / 2]
    };
    (median * factor).max(1.0)
}

/// Scan `peaks` for rise-then-fall runs and report those that pass `params`.
///
/// # Arguments
/// - `peaks`: The smoothed chromatogram
/// - `params`: Minimum point count, net amplitude and noise scaling
///
/// Local maxima are extended outward while the intensity keeps falling. Neighbouring maxima
/// separated by a shallow non-zero valley, one whose depth is within the noise estimate,
/// are merged into the taller of the two.
pub fn detect_peaks(peaks: &[ChromatogramPeak], params: &PeakDetectionParams) -> Vec<PeakDetectionResult> {
    let n = peaks.len();
    if n < params.minimum_datapoints.max(3) {
        return Vec::new();
    }
    let y: Vec<f64> = peaks.iter().map(|p| p.intensity).collect();
    let noise = estimate_noise(peaks, params.noise_factor);

    let mut spans: Vec<(usize, usize, usize)> = Vec::new();
    let mut i = 0;
    while i < n {
        if !is_local_max(&y, i) {
            i += 1;
            continue;
        }
        let mut left = i;
        while left > 0 && y[left] > 0.0 && y[left - 1] <= y[left] {
            left -= 1;
        }
        // step across a plateau at the apex before descending
        let mut right = i;
        while right + 1 < n && y[right] > 0.0 && y[right + 1] <= y[right] {
            right += 1;
        }
        spans.push((left, i, right));
        i = right.max(i + 1);
    }

    let mut merged: Vec<(usize, usize, usize)> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = merged.last_mut() {
            let (l0, t0, r0) = *last;
            let (l1, t1, r1) = span;
            if r0 == l1 && y[r0] > 0.0 {
                let valley = y[r0];
                if y[t1] <= y[t0] && y[t1] - valley < noise {
                    *last = (l0, t0, r1);
                    continue;
                } else if y[t0] < y[t1] && y[t0] - valley < noise {
                    *last = (l0, t1, r1);
                    continue;
                }
            }
        }
        merged.push(span);
    }

    merged
        .into_iter()
        .filter_map(|(left, top, right)| {
            if right - left + 1 < params.minimum_datapoints {
                return None;
            }
            let result = describe_peak(peaks, left, top, right, noise);
            if result.net_height() < params.minimum_amplitude || result.intensity_top <= 0.0 {
                return None;
            }
            Some(result)
        })
        .collect()
}

fn is_local_max(y: &[f64], i: usize) -> bool {
    if y[i] <= 0.0 {
        return false;
    }
    let left_ok = i == 0 || y[i - 1] < y[i];
    let right_ok = i + 1 == y.len() || y[i + 1] <= y[i];
    left_ok && right_ok
}

/// Compute the shape statistics of the peak spanning `left..=right` with apex `top`.
pub fn describe_peak(
    peaks: &[ChromatogramPeak],
    left: usize,
    top: usize,
    right: usize,
    noise: f64,
) -> PeakDetectionResult {
    let (pl, pt, pr) = (&peaks[left], &peaks[top], &peaks[right]);
    let area_above_zero = trapezoid_area(peaks, left, right);
    let baseline_area = if right > left {
        (pr.time() - pl.time()) * (pl.intensity + pr.intensity) * 0.5
    } else {
        0.0
    };
    let area_above_baseline = (area_above_zero - baseline_area).max(0.0);

    let lead = pt.time() - pl.time();
    let tail = pr.time() - pt.time();
    let symmetry = if lead <= 0.0 || tail <= 0.0 {
        0.0
    } else {
        lead.min(tail) / lead.max(tail)
    };

    let net = pt.intensity - pl.intensity.min(pr.intensity);
    let mut sharpness = 0.0f64;
    for i in left..top {
        let dt = pt.time() - peaks[i].time();
        if dt > 0.0 {
            sharpness = sharpness.max((pt.intensity - peaks[i].intensity) / dt);
        }
    }
    for p in &peaks[top + 1..=right.max(top)] {
        let dt = p.time() - pt.time();
        if dt > 0.0 {
            sharpness = sharpness.max((pt.intensity - p.intensity) / dt);
        }
    }

    PeakDetectionResult {
        top,
        left,
        right,
        intensity_top: pt.intensity,
        intensity_left: pl.intensity,
        intensity_right: pr.intensity,
        area_above_zero,
        area_above_baseline,
        estimated_noise: noise,
        signal_to_noise: if noise > 0.0 { net / noise } else { 0.0 },
        symmetry,
        sharpness,
        gaussian_similarity: gaussian_similarity(peaks, left, top, right),
    }
}

/// Compare the peak to a gaussian guessed from its apex and half-height width, returning
/// `1 - normalized residual`, clamped to `[0, 1]`
fn gaussian_similarity(peaks: &[ChromatogramPeak], left: usize, top: usize, right: usize) -> f64 {
    if peaks[top].intensity <= 0.0 || right <= left {
        return 0.0;
    }
    let window = &peaks[left..=right];
    let args = PeakFitArgs::new(
        Cow::Owned(window.iter().map(|p| p.time()).collect()),
        Cow::Owned(window.iter().map(|p| p.intensity as f32).collect()),
    );
    let model = GaussianPeakShape::guess(&args);
    let (residual, total) = window.iter().fold((0.0, 0.0), |(residual, total), p| {
        (
            residual + (p.intensity - model.density(p.time())).abs(),
            total + p.intensity,
        )
    });
    if total <= 0.0 {
        0.0
    } else {
        (1.0 - residual / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chromatogram::{ChromXUnit, ChromXs};

    fn trace(values: &[f64]) -> Vec<ChromatogramPeak> {
        values
            .iter()
            .enumerate()
            .map(|(i, y)| {
                ChromatogramPeak::new(i, i, 100.0, *y, ChromXs::from_rt(i as f64 * 0.01, ChromXUnit::Min))
            })
            .collect()
    }

    fn triangle(n: usize, apex: usize, height: f64, half_width: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let d = i.abs_diff(apex);
                if d >= half_width {
                    0.0
                } else {
                    height * (1.0 - d as f64 / half_width as f64)
                }
            })
            .collect()
    }

    #[test]
    fn test_single_triangle() {
        let peaks = trace(&triangle(100, 50, 1000.0, 6));
        let params = PeakDetectionParams::new(5, 100.0, 4.0);
        let found = detect_peaks(&peaks, &params);
        assert_eq!(found.len(), 1);
        let p = found[0];
        assert_eq!(p.top, 50);
        assert_eq!(p.left, 44);
        assert_eq!(p.right, 56);
        assert_eq!(p.intensity_top, 1000.0);
        assert!((p.symmetry - 1.0).abs() < 1e-9);
        assert!(p.area_above_zero > 0.0);
    }

    #[test]
    fn test_gaussian_similarity() {
        let gaussian: Vec<f64> = (0..41)
            .map(|i| 1000.0 * (-0.5 * ((i as f64 - 20.0) / 4.0).powi(2)).exp())
            .collect();
        let found = describe_peak(&trace(&gaussian), 0, 20, 40, 1.0);
        assert!(found.gaussian_similarity > 0.9, "{}", found.gaussian_similarity);

        let mut square = vec![0.0; 41];
        square[5..36].iter_mut().for_each(|v| *v = 1000.0);
        square[20] = 1001.0;
        let found = describe_peak(&trace(&square), 0, 20, 40, 1.0);
        assert!(found.gaussian_similarity < 0.9, "{}", found.gaussian_similarity);
    }

    #[test]
    fn test_amplitude_and_width_filters() {
        let peaks = trace(&triangle(100, 50, 1000.0, 6));
        assert!(detect_peaks(&peaks, &PeakDetectionParams::new(5, 2000.0, 4.0)).is_empty());
        assert!(detect_peaks(&peaks, &PeakDetectionParams::new(20, 100.0, 4.0)).is_empty());
        assert!(detect_peaks(&peaks[..2], &PeakDetectionParams::new(1, 0.0, 4.0)).is_empty());
    }

    #[test]
    fn test_two_separated_peaks() {
        let mut values = triangle(100, 30, 1000.0, 6);
        for (v, w) in values.iter_mut().zip(triangle(100, 70, 500.0, 6)) {
            *v += w;
        }
        let found = detect_peaks(&trace(&values), &PeakDetectionParams::new(5, 100.0, 4.0));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].top, 30);
        assert_eq!(found[1].top, 70);
    }

    #[test]
    fn test_shallow_valley_merges() {
        let values = [
            0.0, 100.0, 400.0, 800.0, 1000.0, 790.0, 795.0, 700.0, 400.0, 100.0, 0.0,
        ];
        let found = detect_peaks(&trace(&values), &PeakDetectionParams::new(5, 100.0, 4.0));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].top, 4);
        assert_eq!(found[0].left, 0);
        assert_eq!(found[0].right, 10);
    }
}
