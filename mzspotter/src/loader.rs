//! Reading mass spectrometry files with `mzdata` into in-memory measurements
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use mzdata::params::{ParamDescribed, ParamLike};
use mzdata::prelude::*;
use mzdata::spectrum::{MultiLayerSpectrum, ScanPolarity as MzScanPolarity, SignalContinuity};
use mzdata::MZReader;
use mzpeaks::CentroidPeak;
use tracing::{debug, trace, warn};

use mzspot::spectrum::{PrecursorWindow, RawMeasurement, RawSpectrum, ScanPolarity};

use crate::driver::MZSpotterError;
use crate::time_range::TimeRange;

pub const LOAD_ATTEMPTS: usize = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// The signal to noise threshold used when profile spectra must be centroided
const PEAK_PICKING_SNR: f32 = 1.0;

/// Scan event parameters that carry a drift time or inverse reduced mobility
const ION_MOBILITY_PARAMS: [&str; 3] = [
    "ion mobility drift time",
    "inverse reduced ion mobility",
    "inverse reduced ion mobility drift time",
];

fn convert_polarity(polarity: MzScanPolarity) -> ScanPolarity {
    match polarity {
        MzScanPolarity::Positive => ScanPolarity::Positive,
        MzScanPolarity::Negative => ScanPolarity::Negative,
        _ => ScanPolarity::Unknown,
    }
}

fn drift_time_of(spectrum: &MultiLayerSpectrum) -> f64 {
    spectrum
        .acquisition()
        .first_scan()
        .and_then(|event| {
            event
                .iter_params()
                .find(|p| ION_MOBILITY_PARAMS.contains(&p.name()))
                .and_then(|p| p.to_f64().ok())
        })
        .unwrap_or(0.0)
}

fn precursor_window_of(spectrum: &MultiLayerSpectrum) -> Option<PrecursorWindow> {
    spectrum.precursor().map(|prec| {
        let selected_mz = prec.ion().mz;
        let window = &prec.isolation_window;
        let (lower, upper) = if window.lower_bound > 0.0 && window.upper_bound > 0.0 {
            (
                (selected_mz - window.lower_bound as f64).max(0.0),
                (window.upper_bound as f64 - selected_mz).max(0.0),
            )
        } else {
            (0.0, 0.0)
        };
        PrecursorWindow::new(selected_mz, lower, upper, prec.activation.energy as f64)
    })
}

/// Convert one `mzdata` spectrum, centroiding profile data first
pub fn convert_spectrum(mut spectrum: MultiLayerSpectrum) -> RawSpectrum {
    let index = spectrum.index();
    let time = spectrum.start_time();
    let ms_level = spectrum.ms_level();
    let polarity = convert_polarity(spectrum.polarity());
    let drift_time = drift_time_of(&spectrum);
    let precursor = precursor_window_of(&spectrum);

    if spectrum.signal_continuity() == SignalContinuity::Profile && spectrum.peaks.is_none() {
        if let Err(e) = spectrum.pick_peaks(PEAK_PICKING_SNR) {
            warn!("Failed to pick peaks from spectrum {}: {e}", spectrum.id());
        }
    }
    let peaks: Vec<CentroidPeak> = match spectrum.into_centroid() {
        Ok(centroided) => centroided.peaks.into_iter().collect(),
        Err(e) => {
            debug!("Spectrum at index {index} has no usable centroids: {e}");
            Vec::new()
        }
    };
    trace!("Converted spectrum {index} at {time:0.3} with {} peaks", peaks.len());

    let mut converted = RawSpectrum::new(index, time, ms_level, peaks)
        .with_drift_time(drift_time)
        .with_polarity(polarity);
    if let Some(precursor) = precursor {
        converted = converted.with_precursor(precursor);
    }
    converted
}

fn read_measurement(path: &Path, name: &str, time_range: Option<TimeRange>) -> io::Result<RawMeasurement> {
    let reader = MZReader::open_path(path)?;
    let spectra: Vec<RawSpectrum> = reader
        .into_iter()
        .filter(|s| time_range.map_or(true, |t| t.contains(s.start_time())))
        .map(convert_spectrum)
        .collect();
    Ok(RawMeasurement::new(name, spectra))
}

/// Read `path` into a [`RawMeasurement`], retrying a fixed number of times with a fixed
/// back-off before giving up.
pub fn load_measurement(
    path: &Path,
    name: &str,
    time_range: Option<TimeRange>,
) -> Result<RawMeasurement, MZSpotterError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match read_measurement(path, name, time_range) {
            Ok(measurement) => return Ok(measurement),
            Err(e) if attempt < LOAD_ATTEMPTS => {
                warn!(
                    "Failed to read {} on attempt {attempt}/{LOAD_ATTEMPTS}: {e}",
                    path.display()
                );
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => {
                return Err(MZSpotterError::LoadFailed {
                    path: path.display().to_string(),
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_missing_file_retries() {
        let err = load_measurement(Path::new("does/not/exist.mzML"), "missing", None).unwrap_err();
        match err {
            MZSpotterError::LoadFailed { attempts, path, .. } => {
                assert_eq!(attempts, LOAD_ATTEMPTS);
                assert!(path.ends_with("exist.mzML"));
            }
            e => panic!("Unexpected error {e}"),
        }
    }

    #[test]
    fn test_polarity() {
        assert_eq!(convert_polarity(MzScanPolarity::Negative), ScanPolarity::Negative);
        assert_eq!(convert_polarity(MzScanPolarity::Unknown), ScanPolarity::Unknown);
    }
}
