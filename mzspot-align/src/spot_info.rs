//! The spot information stream: a JSON lines file with one record per alignment spot
//! holding every sample's chromatogram around that spot.
//!
//! Each sample's summaries are first written to their own temporary file in parallel.
//! The files are then read back in lockstep and merged into a temporary file next to the
//! destination, which is renamed over the destination once complete.
use std::fs::File;
use std::io::{self, prelude::*, BufReader, BufWriter, SeekFrom};
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use mzspot::chromatogram::{extract_rt_chromatogram, ChromXUnit};
use mzspot::spectrum::{RawSpectrum, RawSpectrumProvider};

use crate::aligner::{AlignmentError, AlignmentSample};
use crate::spot::{AlignmentChromPeakFeature, AlignmentSpotProperty};

/// One sample's chromatogram around an alignment spot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotChromatogramSummary {
    pub file_id: usize,
    pub peak_id: i32,
    pub mass: f64,
    pub apex: f64,
    pub left: f64,
    pub right: f64,
    pub height: f64,
    pub area: f64,
    pub is_gap_filled: bool,
    /// `(time, intensity)` pairs between the spot's extremes
    pub points: Vec<(f64, f64)>,
}

/// One line of the spot information stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotInfo {
    pub alignment_id: usize,
    pub mass_center: f64,
    pub time_center: f64,
    pub chromatograms: Vec<SpotChromatogramSummary>,
}

/// A temporary file receiving one sample's summaries
struct SampleSpotFile {
    temp_file: NamedTempFile,
    writer: BufWriter<File>,
}

impl SampleSpotFile {
    fn new_in(dir: &Path) -> io::Result<Self> {
        let temp_file = NamedTempFile::new_in(dir)?;
        let writer = BufWriter::new(temp_file.reopen()?);
        Ok(Self { temp_file, writer })
    }

    fn write_summary(&mut self, summary: &SpotChromatogramSummary) -> Result<(), AlignmentError> {
        serde_json::to_writer(&mut self.writer, summary)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush the writer and open a reader from the start of the file. The writer's handle
    /// is released before the reader is returned.
    fn into_reader(mut self) -> io::Result<(NamedTempFile, BufReader<File>)> {
        self.writer.flush()?;
        drop(self.writer);
        let mut file = self.temp_file.reopen()?;
        file.seek(SeekFrom::Start(0))?;
        Ok((self.temp_file, BufReader::new(file)))
    }
}

fn summarize(
    slot: &AlignmentChromPeakFeature,
    spot: &AlignmentSpotProperty,
    spectra: Option<&[RawSpectrum]>,
    tolerance: f64,
) -> SpotChromatogramSummary {
    let points = match spectra {
        Some(spectra) => extract_rt_chromatogram(
            spectra,
            spot.mass_center,
            tolerance,
            spot.times_min.rt,
            spot.times_max.rt,
            ChromXUnit::Min,
        )
        .peaks
        .into_iter()
        .map(|p| (p.chrom.rt, p.intensity))
        .collect(),
        None => Vec::new(),
    };
    SpotChromatogramSummary {
        file_id: slot.file_id,
        peak_id: slot.peak_id,
        mass: slot.mass,
        apex: slot.chrom_xs_top.value(),
        left: slot.chrom_xs_left.value(),
        right: slot.chrom_xs_right.value(),
        height: slot.peak_height_top,
        area: slot.peak_area_above_zero,
        is_gap_filled: slot.is_gap_filled,
        points,
    }
}

fn write_sample<P: RawSpectrumProvider + ?Sized>(
    file_id: usize,
    sample: &AlignmentSample<'_, P>,
    spots: &[AlignmentSpotProperty],
    tolerance: f64,
    dir: &Path,
) -> Result<SampleSpotFile, AlignmentError> {
    let spectra = match sample.provider.load_ms1_spectra() {
        Ok(spectra) => Some(spectra),
        Err(e) => {
            warn!("Writing spot information for {} without chromatograms: {e}", sample.name);
            None
        }
    };
    let mut out = SampleSpotFile::new_in(dir)?;
    for spot in spots {
        let slot = spot
            .aligned_peak_properties
            .get(file_id)
            .ok_or(AlignmentError::EmptyInput("aligned peak properties"))?;
        out.write_summary(&summarize(slot, spot, spectra, tolerance))?;
    }
    Ok(out)
}

/// Write the spot information stream for `spots` to `destination`.
///
/// `destination` is only replaced once the whole stream has been written, so a failure
/// leaves any previous file intact.
pub fn write_spot_info<P: RawSpectrumProvider + ?Sized>(
    spots: &[AlignmentSpotProperty],
    samples: &[AlignmentSample<'_, P>],
    tolerance: f64,
    destination: &Path,
) -> Result<(), AlignmentError> {
    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };

    let sample_files: Vec<SampleSpotFile> = samples
        .par_iter()
        .enumerate()
        .map(|(file_id, sample)| write_sample(file_id, sample, spots, tolerance, &dir))
        .collect::<Result<Vec<_>, _>>()?;

    let mut temp_files = Vec::with_capacity(sample_files.len());
    let mut readers = Vec::with_capacity(sample_files.len());
    for f in sample_files {
        let (temp_file, reader) = f.into_reader()?;
        temp_files.push(temp_file);
        readers.push(reader.lines());
    }

    let merged = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(merged.reopen()?);
        let mut line = String::new();
        for spot in spots {
            let mut chromatograms: Vec<SpotChromatogramSummary> = Vec::with_capacity(readers.len());
            for reader in readers.iter_mut() {
                let buf = reader.next().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("Spot information ended before spot {}", spot.alignment_id),
                    )
                })??;
                chromatograms.push(serde_json::from_str(&buf)?);
            }
            let info = SpotInfo {
                alignment_id: spot.alignment_id,
                mass_center: spot.mass_center,
                time_center: spot.times_center.value(),
                chromatograms,
            };
            line.clear();
            line.push_str(&serde_json::to_string(&info)?);
            line.push('\n');
            writer.write_all(line.as_bytes())?;
        }
        writer.flush()?;
    }

    drop(readers);
    for temp_file in temp_files {
        if let Err(e) = temp_file.close() {
            warn!("Failed to remove temporary spot information file: {e}");
        }
    }

    merged.persist(destination).map_err(|e| e.error)?;
    debug!(
        "Wrote spot information for {} spots to {}",
        spots.len(),
        destination.display()
    );
    Ok(())
}

/// Read a spot information stream back into memory
pub fn read_spot_info(path: &Path) -> Result<Vec<SpotInfo>, AlignmentError> {
    let reader = BufReader::new(File::open(path)?);
    let mut infos: Vec<SpotInfo> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        infos.push(serde_json::from_str(&line)?);
    }
    Ok(infos)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::aligner::{AlignmentTarget, PeakAligner};
    use mzpeaks::CentroidPeak;
    use mzspot::chromatogram::ChromXs;
    use mzspot::feature::ChromatogramPeakFeature;
    use mzspot::spectrum::RawMeasurement;

    fn measurement(name: &str, with_second: bool) -> RawMeasurement {
        let spectra = (0usize..60)
            .map(|i| {
                let d = i.abs_diff(30);
                let mut points = Vec::new();
                if d < 6 {
                    points.push(CentroidPeak::new(180.0, 1000.0 * (6 - d) as f32, 0));
                    if with_second {
                        points.push(CentroidPeak::new(260.0, 700.0 * (6 - d) as f32, 1));
                    }
                }
                RawSpectrum::new(i, i as f64 * 0.05, 1, points)
            })
            .collect();
        RawMeasurement::new(name, spectra)
    }

    fn feature(peak_id: usize, mass: f64) -> ChromatogramPeakFeature {
        let top = ChromXs::from_rt(1.5, ChromXUnit::Min);
        ChromatogramPeakFeature {
            peak_id,
            mass,
            chrom_xs_top: top,
            chrom_xs_left: top.with_value(1.25),
            chrom_xs_right: top.with_value(1.75),
            peak_height_top: 6000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_spot_info_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alignment.spotinfo.jsonl");
        let a = measurement("a", true);
        let b = measurement("b", false);
        let features_a = vec![feature(0, 180.0), feature(1, 260.0)];
        let features_b = vec![feature(0, 180.0)];
        let samples = vec![
            AlignmentSample::new("a", &features_a, &a),
            AlignmentSample::new("b", &features_b, &b),
        ];
        let target = AlignmentTarget::new("test", Some(path.clone()));
        let result = PeakAligner::default().align(&samples, &target).unwrap();
        assert_eq!(result.spot_info_path.as_deref(), Some(path.as_path()));

        let infos = read_spot_info(&path).unwrap();
        assert_eq!(infos.len(), result.len());
        for (i, info) in infos.iter().enumerate() {
            assert_eq!(info.alignment_id, i);
            assert_eq!(info.chromatograms.len(), 2);
            assert_eq!(info.chromatograms[0].file_id, 0);
            assert_eq!(info.chromatograms[1].file_id, 1);
        }
        assert!(infos[0].chromatograms[0].points.iter().any(|(_, y)| *y > 0.0));

        let n_files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(n_files, 1);
    }
}
