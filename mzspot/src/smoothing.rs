//! Chromatogram smoothing filters.
//!
//! The simple moving average and Savitzky-Golay filters come from `mzsignal`; the weighted
//! filters are computed here.
use std::str::FromStr;

use mzsignal::smooth::{moving_average_dyn, savitsky_golay};
use thiserror::Error;
use tracing::trace;

use crate::chromatogram::ChromatogramPeak;

/// The polynomial order of the Savitzky-Golay filter
const SAVITZKY_GOLAY_ORDER: usize = 2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SmoothingMethod {
    SimpleMovingAverage,
    #[default]
    LinearWeightedMovingAverage,
    SavitzkyGolay,
    BinomialFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown smoothing method {0:?}")]
pub struct SmoothingMethodParseError(String);

impl FromStr for SmoothingMethod {
    type Err = SmoothingMethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "sma" | "simplemovingaverage" => Ok(Self::SimpleMovingAverage),
            "lwma" | "linearweightedmovingaverage" => Ok(Self::LinearWeightedMovingAverage),
            "sg" | "savitzkygolay" => Ok(Self::SavitzkyGolay),
            "binomial" | "binomialfilter" => Ok(Self::BinomialFilter),
            _ => Err(SmoothingMethodParseError(s.to_string())),
        }
    }
}

/// Smooth the intensities of `peaks` with `method` using a window of `2 * level + 1` points.
///
/// Coordinates, masses and ids are carried over unchanged. A `level` of zero returns a copy.
/// The simple moving average window is capped at 20 points.
pub fn smooth(peaks: &[ChromatogramPeak], method: SmoothingMethod, level: usize) -> Vec<ChromatogramPeak> {
    if level == 0 || peaks.len() < 3 {
        return peaks.to_vec();
    }
    let values: Vec<f64> = peaks.iter().map(|p| p.intensity).collect();
    let window = 2 * level + 1;
    let smoothed = match method {
        SmoothingMethod::SimpleMovingAverage => {
            let mut out = values.clone();
            moving_average_dyn(&values, &mut out, window);
            out
        }
        SmoothingMethod::LinearWeightedMovingAverage => {
            let weights: Vec<f64> = (0..window)
                .map(|i| (level + 1 - i.abs_diff(level)) as f64)
                .collect();
            weighted_average(&values, &weights)
        }
        SmoothingMethod::BinomialFilter => weighted_average(&values, &binomial_weights(2 * level)),
        SmoothingMethod::SavitzkyGolay => {
            savitsky_golay(&values, window, SAVITZKY_GOLAY_ORDER, 0).unwrap_or_else(|e| {
                trace!("Leaving {} points unsmoothed: {e}", values.len());
                values.clone()
            })
        }
    };
    peaks
        .iter()
        .zip(smoothed)
        .map(|(p, y)| ChromatogramPeak {
            intensity: y,
            ..*p
        })
        .collect()
}

/// A centered weighted average which renormalizes the weights at the edges
fn weighted_average(values: &[f64], weights: &[f64]) -> Vec<f64> {
    let half = weights.len() / 2;
    let n = values.len();
    (0..n)
        .map(|i| {
            let mut acc = 0.0;
            let mut norm = 0.0;
            for (k, w) in weights.iter().enumerate() {
                let j = i as isize + k as isize - half as isize;
                if j < 0 || j >= n as isize {
                    continue;
                }
                acc += values[j as usize] * w;
                norm += w;
            }
            if norm > 0.0 {
                acc / norm
            } else {
                values[i]
            }
        })
        .collect()
}

fn binomial_weights(order: usize) -> Vec<f64> {
    let mut row = vec![1.0f64];
    for _ in 0..order {
        let mut next = vec![1.0; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
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
                ChromatogramPeak::new(i, i, 100.0, *y, ChromXs::from_rt(i as f64, ChromXUnit::Min))
            })
            .collect()
    }

    #[test]
    fn test_smoothing_preserves_constant() {
        let peaks = trace(&[5.0; 12]);
        for method in [
            SmoothingMethod::SimpleMovingAverage,
            SmoothingMethod::LinearWeightedMovingAverage,
            SmoothingMethod::SavitzkyGolay,
            SmoothingMethod::BinomialFilter,
        ] {
            let smoothed = smooth(&peaks, method, 2);
            for p in &smoothed[2..10] {
                assert!((p.intensity - 5.0).abs() < 1e-6, "{method:?} {}", p.intensity);
            }
        }
    }

    #[test]
    fn test_sma_centered() {
        let peaks = trace(&[0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0]);
        let smoothed = smooth(&peaks, SmoothingMethod::SimpleMovingAverage, 1);
        for i in 2..=4 {
            assert!((smoothed[i].intensity - 3.0).abs() < 1e-9);
        }
        assert_eq!(smoothed[1].intensity, 0.0);
        assert_eq!(smoothed[5].intensity, 0.0);
    }

    #[test]
    fn test_savitzky_golay_keeps_quadratic() {
        let values: Vec<f64> = (0..21).map(|i| 100.0 - (i as f64 - 10.0).powi(2)).collect();
        let smoothed = smooth(&trace(&values), SmoothingMethod::SavitzkyGolay, 2);
        for (p, y) in smoothed.iter().zip(&values).skip(2).take(17) {
            assert!((p.intensity - y).abs() < 1e-6, "{} {y}", p.intensity);
        }
        // too short for the window, left as is
        let short = trace(&[1.0, 4.0, 2.0]);
        let smoothed = smooth(&short, SmoothingMethod::SavitzkyGolay, 2);
        assert_eq!(smoothed[1].intensity, 4.0);
    }

    #[test]
    fn test_lwma_spreads_spike() {
        let peaks = trace(&[0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0]);
        let smoothed = smooth(&peaks, SmoothingMethod::LinearWeightedMovingAverage, 1);
        assert!((smoothed[3].intensity - 4.5).abs() < 1e-9);
        assert!((smoothed[2].intensity - 2.25).abs() < 1e-9);
        assert_eq!(smoothed[0].intensity, 0.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "lwma".parse::<SmoothingMethod>().unwrap(),
            SmoothingMethod::LinearWeightedMovingAverage
        );
        assert_eq!(
            "Savitzky-Golay".parse::<SmoothingMethod>().unwrap(),
            SmoothingMethod::SavitzkyGolay
        );
        assert!("fourier".parse::<SmoothingMethod>().is_err());
    }
}
