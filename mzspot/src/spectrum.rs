//! The raw spectrum model consumed by peak spotting, and the [`RawSpectrumProvider`]
//! trait through which acquisition data is supplied.
use std::collections::HashMap;

use itertools::Itertools;
use mzpeaks::CentroidPeak;
use thiserror::Error;
use tracing::debug;

/// An error that a raw data provider may produce
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RawDataError {
    #[error("Failed to load spectra from {source_name}: {message}")]
    LoadFailed { source_name: String, message: String },
    #[error("No spectra with MS level {0} are available")]
    MissingLevel(u8),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanPolarity {
    #[default]
    Unknown,
    Positive,
    Negative,
}

/// The precursor selection and isolation description of an MSn scan.
///
/// The isolation offsets are expressed relative to `selected_mz`, so the isolated
/// range is `[selected_mz - isolation_lower, selected_mz + isolation_upper]`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecursorWindow {
    pub selected_mz: f64,
    pub isolation_lower: f64,
    pub isolation_upper: f64,
    pub collision_energy: f64,
}

impl PrecursorWindow {
    pub fn new(
        selected_mz: f64,
        isolation_lower: f64,
        isolation_upper: f64,
        collision_energy: f64,
    ) -> Self {
        Self {
            selected_mz,
            isolation_lower,
            isolation_upper,
            collision_energy,
        }
    }

    pub fn lower_bound(&self) -> f64 {
        self.selected_mz - self.isolation_lower
    }

    pub fn upper_bound(&self) -> f64 {
        self.selected_mz + self.isolation_upper
    }

    /// Whether `mz` falls within the isolation window
    pub fn contains(&self, mz: f64) -> bool {
        self.lower_bound() <= mz && mz <= self.upper_bound()
    }
}

/// A single centroided spectrum.
///
/// `index` is the position of the spectrum in the provider's full acquisition order and is
/// what features refer to when they record raw spectrum ids. `drift_time` is `0.0` for
/// spectra without an ion mobility dimension.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSpectrum {
    pub index: usize,
    pub scan_number: usize,
    pub time: f64,
    pub drift_time: f64,
    pub ms_level: u8,
    pub polarity: ScanPolarity,
    pub precursor: Option<PrecursorWindow>,
    pub peaks: Vec<CentroidPeak>,
}

impl RawSpectrum {
    pub fn new(index: usize, time: f64, ms_level: u8, mut peaks: Vec<CentroidPeak>) -> Self {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        for (i, p) in peaks.iter_mut().enumerate() {
            p.index = i as u32;
        }
        Self {
            index,
            scan_number: index + 1,
            time,
            drift_time: 0.0,
            ms_level,
            polarity: ScanPolarity::Unknown,
            precursor: None,
            peaks,
        }
    }

    pub fn with_drift_time(mut self, drift_time: f64) -> Self {
        self.drift_time = drift_time;
        self
    }

    pub fn with_precursor(mut self, precursor: PrecursorWindow) -> Self {
        self.precursor = Some(precursor);
        self
    }

    pub fn with_polarity(mut self, polarity: ScanPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn has_ion_mobility(&self) -> bool {
        self.drift_time > 0.0
    }

    /// The peaks whose m/z falls within `[low, high]`. Assumes the peak list is sorted.
    pub fn peaks_between(&self, low: f64, high: f64) -> &[CentroidPeak] {
        let start = self.peaks.partition_point(|p| p.mz < low);
        let end = self.peaks.partition_point(|p| p.mz <= high);
        if start >= end {
            &[]
        } else {
            &self.peaks[start..end]
        }
    }

    pub fn mz_range(&self) -> Option<(f64, f64)> {
        match (self.peaks.first(), self.peaks.last()) {
            (Some(a), Some(b)) => Some((a.mz, b.mz)),
            _ => None,
        }
    }
}

/// A source of ordered raw spectra.
///
/// `load_ms_spectra` returns every spectrum in acquisition order. `load_ms1_spectra`
/// returns the MS1 spectra used for chromatogram extraction along the retention time
/// axis; for ion mobility data these are the per-frame accumulated spectra, while the
/// individual mobility scans remain available through `load_ms_spectra`.
pub trait RawSpectrumProvider: Sync {
    fn load_ms_spectra(&self) -> Result<&[RawSpectrum], RawDataError>;

    fn load_ms1_spectra(&self) -> Result<&[RawSpectrum], RawDataError>;

    fn load_msn_spectra(&self, ms_level: u8) -> Result<&[RawSpectrum], RawDataError>;

    fn is_ion_mobility(&self) -> bool {
        false
    }
}

/// An in-memory [`RawSpectrumProvider`] built from a list of spectra.
#[derive(Debug, Default, Clone)]
pub struct RawMeasurement {
    pub name: String,
    spectra: Vec<RawSpectrum>,
    ms1_spectra: Vec<RawSpectrum>,
    msn_spectra: HashMap<u8, Vec<RawSpectrum>>,
    ion_mobility: bool,
}

const FRAME_MERGE_PPM: f64 = 5.0;

impl RawMeasurement {
    /// Build a measurement from spectra in acquisition order.
    ///
    /// Spectra are re-indexed so that `index` matches their position. When MS1 spectra carry
    /// drift times, consecutive scans sharing a retention time are accumulated into a single
    /// frame spectrum for the retention time axis.
    pub fn new(name: impl Into<String>, mut spectra: Vec<RawSpectrum>) -> Self {
        for (i, s) in spectra.iter_mut().enumerate() {
            s.index = i;
        }
        let ion_mobility = spectra
            .iter()
            .any(|s| s.ms_level == 1 && s.has_ion_mobility());

        let ms1_spectra = if ion_mobility {
            accumulate_frames(&spectra)
        } else {
            spectra.iter().filter(|s| s.ms_level == 1).cloned().collect()
        };

        let msn_spectra: HashMap<u8, Vec<RawSpectrum>> = spectra
            .iter()
            .filter(|s| s.ms_level > 1)
            .map(|s| (s.ms_level, s.clone()))
            .into_group_map();
        let name = name.into();
        debug!(
            "Built measurement {name} with {} spectra, {} MS1 spectra, ion mobility: {ion_mobility}",
            spectra.len(),
            ms1_spectra.len()
        );
        Self {
            name,
            spectra,
            ms1_spectra,
            msn_spectra,
            ion_mobility,
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

impl RawSpectrumProvider for RawMeasurement {
    fn load_ms_spectra(&self) -> Result<&[RawSpectrum], RawDataError> {
        Ok(&self.spectra)
    }

    fn load_ms1_spectra(&self) -> Result<&[RawSpectrum], RawDataError> {
        Ok(&self.ms1_spectra)
    }

    fn load_msn_spectra(&self, ms_level: u8) -> Result<&[RawSpectrum], RawDataError> {
        if ms_level == 1 {
            return Ok(&self.ms1_spectra);
        }
        Ok(self
            .msn_spectra
            .get(&ms_level)
            .map(|v| v.as_slice())
            .unwrap_or(&[]))
    }

    fn is_ion_mobility(&self) -> bool {
        self.ion_mobility
    }
}

/// Sum the mobility scans of each MS1 frame into one spectrum, merging peaks within a
/// small ppm tolerance. The frame keeps the raw index of its first scan.
fn accumulate_frames(spectra: &[RawSpectrum]) -> Vec<RawSpectrum> {
    let mut frames: Vec<RawSpectrum> = Vec::new();
    let mut buffer: Vec<CentroidPeak> = Vec::new();
    let mut current: Option<&RawSpectrum> = None;

    let mut flush = |head: &RawSpectrum, buffer: &mut Vec<CentroidPeak>| {
        let peaks = merge_peaks(std::mem::take(buffer));
        let mut frame = RawSpectrum::new(head.index, head.time, 1, peaks);
        frame.scan_number = head.scan_number;
        frame.polarity = head.polarity;
        frames.push(frame);
    };

    for s in spectra.iter().filter(|s| s.ms_level == 1) {
        match current {
            Some(head) if (head.time - s.time).abs() < 1e-9 => {}
            Some(head) => {
                flush(head, &mut buffer);
                current = Some(s);
            }
            None => {
                current = Some(s);
            }
        }
        buffer.extend(s.peaks.iter().cloned());
    }
    if let Some(head) = current {
        flush(head, &mut buffer);
    }
    frames
}

fn merge_peaks(mut peaks: Vec<CentroidPeak>) -> Vec<CentroidPeak> {
    peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    let mut merged: Vec<CentroidPeak> = Vec::with_capacity(peaks.len());
    for p in peaks {
        match merged.last_mut() {
            Some(last) if (p.mz - last.mz).abs() / last.mz * 1e6 <= FRAME_MERGE_PPM => {
                let total = last.intensity + p.intensity;
                if total > 0.0 {
                    last.mz = (last.mz * last.intensity as f64 + p.mz * p.intensity as f64)
                        / total as f64;
                }
                last.intensity = total;
            }
            _ => merged.push(p),
        }
    }
    merged
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame_scan(time: f64, drift: f64, mz: f64, intensity: f32) -> RawSpectrum {
        RawSpectrum::new(0, time, 1, vec![CentroidPeak::new(mz, intensity, 0)])
            .with_drift_time(drift)
    }

    #[test]
    fn test_peaks_between() {
        let s = RawSpectrum::new(
            0,
            1.0,
            1,
            vec![
                CentroidPeak::new(300.0, 5.0, 0),
                CentroidPeak::new(100.0, 10.0, 0),
                CentroidPeak::new(200.0, 20.0, 0),
            ],
        );
        assert_eq!(s.peaks[0].mz, 100.0);
        assert_eq!(s.peaks_between(150.0, 250.0).len(), 1);
        assert_eq!(s.peaks_between(350.0, 450.0).len(), 0);
        assert_eq!(s.mz_range(), Some((100.0, 300.0)));
    }

    #[test]
    fn test_accumulate_frames() {
        let spectra = vec![
            frame_scan(1.0, 10.0, 500.0, 100.0),
            frame_scan(1.0, 11.0, 500.0005, 50.0),
            frame_scan(1.1, 10.0, 500.0, 10.0),
            RawSpectrum::new(0, 1.1, 2, vec![])
                .with_precursor(PrecursorWindow::new(500.0, 0.5, 0.5, 20.0)),
        ];
        let measurement = RawMeasurement::new("test", spectra);
        assert!(measurement.is_ion_mobility());
        let ms1 = measurement.load_ms1_spectra().unwrap();
        assert_eq!(ms1.len(), 2);
        assert_eq!(ms1[0].peaks.len(), 1);
        assert_eq!(ms1[0].peaks[0].intensity, 150.0);
        assert_eq!(ms1[1].index, 2);
        assert_eq!(measurement.load_msn_spectra(2).unwrap().len(), 1);
        assert!(measurement.load_msn_spectra(3).unwrap().is_empty());
    }

    #[test]
    fn test_precursor_window() {
        let w = PrecursorWindow::new(400.0, 12.5, 12.5, 30.0);
        assert!(w.contains(390.0));
        assert!(!w.contains(413.0));
    }
}
