use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::Parser;
use crossbeam_channel::Sender;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzspot::chromatogram::{ChromXType, ChromXUnit};
use mzspot::feature::ChromatogramPeakFeature;
use mzspot::spectrum::{RawDataError, RawMeasurement, RawSpectrumProvider};
use mzspot::{
    CcsEstimator, IsotopeEstimator, PeakCharacterEstimator, PeakSpottingCore,
    ProcessingParameters, SpottingError,
};
use mzspot_align::{AlignmentError, AlignmentResultContainer, AlignmentSample, AlignmentTarget, PeakAligner};

use crate::args::{parameter_sources, sample_name_of, ArgAcquisitionType, ArgIonMode};
use crate::loader::load_measurement;
use crate::progress::{spawn_progress_logger, ProgressEvent, ProgressRecord};
use crate::time_range::TimeRange;
use crate::write::write_json;

pub const ALIGNMENT_FILE: &str = "alignment.json";
pub const SPOT_INFO_FILE: &str = "alignment.spotinfo.jsonl";
pub const PARAMETERS_FILE: &str = "parameters.toml";

#[derive(Debug, Error)]
pub enum MZSpotterError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to load {path} after {attempts} attempts: {source}")]
    LoadFailed {
        path: String,
        attempts: usize,
        source: io::Error,
    },
    #[error("The configuration file {0} does not exist")]
    ConfigFileMissing(String),
    #[error("Failed to read the configuration: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("Failed to read raw data: {0}")]
    RawDataError(
        #[source]
        #[from]
        RawDataError,
    ),
    #[error("Feature detection failed for {sample}: {source}")]
    SpottingFailed {
        sample: String,
        source: SpottingError,
    },
    #[error("Alignment failed: {0}")]
    AlignmentError(
        #[source]
        #[from]
        AlignmentError,
    ),
    #[error("Failed to serialize results: {0}")]
    SerializationError(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("Failed to record the parameters used: {0}")]
    ParameterRecordError(
        #[source]
        #[from]
        toml::ser::Error,
    ),
    #[error("Failed to build the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_threads() -> i32 {
    -1
}

/// Feature detection and cross-sample alignment of mass spectrometry files.
///
/// Read each input file as one sample, detect chromatographic features and annotate their
/// isotopes, adducts and collision cross sections, then align the features of all samples
/// and write the results as JSON.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZSpotter {
    /// The paths to read input spectra from, one sample per file
    #[arg(required = true)]
    pub input_files: Vec<PathBuf>,

    /// The directory to write feature tables and alignment results to
    #[arg(short = 'o', long = "output-directory", default_value = ".")]
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read processing parameters from.
    ///
    /// Configurations are also read from `mzspotter.toml` in the working directory.
    /// Environment variables prefixed with `MZSPOTTER_` will be read too, with nested
    /// keys separated by `__`.
    #[arg(long = "config-file")]
    #[serde(default)]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    #[serde(default = "default_threads")]
    pub threads: i32,

    /// The time range to process, denoted [start?]-[stop?]
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The time range to process, denoted [start?]-[stop?]

If a start is not specified, processing begins from the start of the run.
If a stop is not specified, processing stops at the end of the run.
"#
    )]
    #[serde(default)]
    pub time_range: Option<TimeRange>,

    /// The ionization polarity, overriding the configured value
    #[arg(short = 'p', long = "ion-mode")]
    #[serde(default)]
    pub ion_mode: Option<ArgIonMode>,

    /// How MS2 spectra were acquired, overriding the configured value
    #[arg(short = 'a', long = "acquisition-type")]
    #[serde(default)]
    pub acquisition_type: Option<ArgAcquisitionType>,

    /// The index of the input file to use as the alignment reference
    #[arg(short = 'R', long = "reference-file")]
    #[serde(default)]
    pub reference_file: Option<usize>,

    /// Gzip compress the JSON feature tables and alignment result
    #[arg(short = 'z', long = "compress")]
    #[serde(default)]
    pub compress: bool,

    #[arg(skip)]
    #[serde(default)]
    pub parameters: ProcessingParameters,
}

/// Give every path a distinct sample name, suffixing repeated stems with their ordinal
fn unique_sample_names(paths: &[PathBuf]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    paths
        .iter()
        .map(|path| {
            let name = sample_name_of(path);
            let count = seen.entry(name.clone()).or_default();
            *count += 1;
            if *count > 1 {
                format!("{name}_{count}")
            } else {
                name
            }
        })
        .collect()
}

fn send_event(events: &Sender<ProgressEvent>, event: ProgressEvent) {
    if let Err(e) = events.send(event) {
        debug!("Progress logger has stopped listening: {e}");
    }
}

/// Detect and annotate the features of one sample
fn spot_sample(
    params: &ProcessingParameters,
    measurement: &RawMeasurement,
    events: &Sender<ProgressEvent>,
) -> Result<(Vec<ChromatogramPeakFeature>, ProgressRecord), MZSpotterError> {
    let sample = measurement.name.as_str();
    let reporter = |done: usize, total: usize| {
        send_event(
            events,
            ProgressEvent::Spotting {
                sample: sample.to_string(),
                done,
                total,
            },
        )
    };

    let core = PeakSpottingCore::new(params.clone());
    let detected = core.detect_features_with_progress(
        measurement,
        params.peak_pick.retention_time_begin,
        params.peak_pick.retention_time_end,
        ChromXType::RT,
        ChromXUnit::Min,
        &reporter,
        None,
    );
    let mut features = match detected {
        Ok(features) => features,
        Err(SpottingError::EmptyInput(what)) => {
            warn!("{sample} has no {what}, no features will be reported for it");
            Vec::new()
        }
        Err(source) => {
            return Err(MZSpotterError::SpottingFailed {
                sample: sample.to_string(),
                source,
            })
        }
    };

    let ion_mobility = measurement.is_ion_mobility();
    IsotopeEstimator::new(params.isotope.clone())
        .with_ion_mobility(ion_mobility)
        .assign_isotopes(&mut features);

    let character = PeakCharacterEstimator::new(params.character.clone(), params.ion_mode)
        .with_retention_time_tolerance(params.alignment.retention_time_tolerance);
    let adducts = character.searched_adducts();
    let summary = character.assign_character(&mut features, &adducts);

    let ccs_assigned = if ion_mobility {
        CcsEstimator::new(
            params.ion_mobility.mobility_type,
            params.ion_mobility.calibration,
        )
        .process(&mut features)
    } else {
        0
    };

    let spectra = measurement.load_ms_spectra()?;
    let ms1_spectra = measurement.load_ms1_spectra()?.len();
    let record = ProgressRecord {
        samples: 1,
        ms1_spectra,
        msn_spectra: spectra.iter().filter(|s| s.ms_level > 1).count(),
        features: features.len(),
        monoisotopic_features: features
            .iter()
            .filter(|f| f.peak_character.is_monoisotopic())
            .count(),
        character_groups: summary.n_groups,
        ccs_assigned,
    };
    Ok((features, record))
}

impl MZSpotter {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZSpotterError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        };
        debug!("Using {} threads", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    /// Merge the configured parameter sources over [`MZSpotter::parameters`] and apply the
    /// command line overrides on top.
    pub fn resolve_parameters(&self) -> Result<ProcessingParameters, MZSpotterError> {
        if let Some(path) = self.config_file.as_deref() {
            if !path.exists() {
                return Err(MZSpotterError::ConfigFileMissing(
                    path.display().to_string(),
                ));
            }
        }
        let mut params: ProcessingParameters =
            parameter_sources(&self.parameters, self.config_file.as_deref()).extract()?;

        if let Some(ion_mode) = self.ion_mode {
            params.ion_mode = ion_mode.into();
        }
        if let Some(acquisition_type) = self.acquisition_type {
            params.acquisition_type = acquisition_type.into();
        }
        if let Some(reference) = self.reference_file {
            params.alignment.alignment_reference_file_id = reference;
        }
        if let Some(time_range) = self.time_range {
            params.peak_pick.retention_time_begin = time_range.start;
            if time_range.is_bounded() {
                params.peak_pick.retention_time_end = time_range.end;
            }
        }
        Ok(params)
    }

    pub fn main(&self) -> Result<(), MZSpotterError> {
        info!(
            "mzspotter v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!(
            "Inputs: {}",
            self.input_files.iter().map(|p| p.display()).join(", ")
        );
        info!("Output: {}", self.output_directory.display());
        let params = self.resolve_parameters()?;
        debug!("Processing parameters: {params:?}");
        fs::create_dir_all(&self.output_directory)?;
        fs::write(
            self.output_directory.join(PARAMETERS_FILE),
            toml::to_string_pretty(&params)?,
        )?;
        self.create_threadpool()?.install(|| self.run(&params))
    }

    fn run(&self, params: &ProcessingParameters) -> Result<(), MZSpotterError> {
        let start = Instant::now();
        let (events, logger) = spawn_progress_logger();
        let names = unique_sample_names(&self.input_files);

        let measurements: Result<Vec<RawMeasurement>, MZSpotterError> = self
            .input_files
            .par_iter()
            .zip(names.par_iter())
            .map(|(path, name)| {
                let measurement = load_measurement(path, name, self.time_range)?;
                send_event(
                    &events,
                    ProgressEvent::Loaded {
                        sample: name.clone(),
                        spectra: measurement.len(),
                    },
                );
                Ok(measurement)
            })
            .collect();
        let loaded = Instant::now();

        let result = measurements.and_then(|measurements| {
            self.process_measurements(&measurements, params, &events)
        });
        drop(events);

        let totals = match logger.join() {
            Ok(totals) => totals,
            Err(e) => {
                warn!("Failed to join progress logger: {e:?}");
                ProgressRecord::default()
            }
        };
        let alignment = result?;
        info!("Samples: {}", totals.samples);
        info!("MS1 Spectra: {}", totals.ms1_spectra);
        info!("MSn Spectra: {}", totals.msn_spectra);
        info!(
            "Features: {} | Monoisotopic: {} | Character Groups: {} | CCS Assigned: {}",
            totals.features,
            totals.monoisotopic_features,
            totals.character_groups,
            totals.ccs_assigned
        );
        info!("Alignment Spots: {}", alignment.total_alignment_spot_count);

        let elapsed = Instant::now() - start;
        debug!("Loading took {:0.3?}", loaded - start);
        info!("Elapsed Time: {:0.3?}", elapsed);
        Ok(())
    }

    /// Detect features in every measurement, write each sample's feature table, then align
    /// all samples and write the alignment result and its spot information stream.
    pub fn process_measurements(
        &self,
        measurements: &[RawMeasurement],
        params: &ProcessingParameters,
        events: &Sender<ProgressEvent>,
    ) -> Result<AlignmentResultContainer, MZSpotterError> {
        let feature_sets: Vec<Vec<ChromatogramPeakFeature>> = measurements
            .par_iter()
            .map(|measurement| {
                let (features, record) = spot_sample(params, measurement, events)?;
                write_json(
                    &self.output_directory,
                    &format!("{}.features.json", measurement.name),
                    &features,
                    self.compress,
                )?;
                send_event(
                    events,
                    ProgressEvent::SampleDone {
                        sample: measurement.name.clone(),
                        record,
                    },
                );
                Ok(features)
            })
            .collect::<Result<Vec<_>, MZSpotterError>>()?;

        let samples: Vec<AlignmentSample<'_, RawMeasurement>> = measurements
            .iter()
            .zip(feature_sets.iter())
            .map(|(measurement, features)| {
                AlignmentSample::new(measurement.name.clone(), features, measurement)
            })
            .collect();
        let target = AlignmentTarget::new(
            "alignment",
            Some(self.output_directory.join(SPOT_INFO_FILE)),
        );
        let reporter =
            |done: usize, total: usize| send_event(events, ProgressEvent::Aligning { done, total });
        let alignment =
            PeakAligner::new(params.clone()).align_with_progress(&samples, &target, &reporter, None)?;
        write_json(
            &self.output_directory,
            ALIGNMENT_FILE,
            &alignment,
            self.compress,
        )?;
        Ok(alignment)
    }
}

impl Default for MZSpotter {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            output_directory: default_output_directory(),
            log_file: None,
            config_file: None,
            threads: default_threads(),
            time_range: None,
            ion_mode: None,
            acquisition_type: None,
            reference_file: None,
            compress: false,
            parameters: ProcessingParameters::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mzpeaks::CentroidPeak;
    use mzspot::spectrum::RawSpectrum;
    use mzspot_align::spot_info::read_spot_info;

    fn triangle(i: usize, apex: usize, height: f32, half_width: usize) -> f32 {
        let d = i.abs_diff(apex);
        if d >= half_width {
            0.0
        } else {
            height * (1.0 - d as f32 / half_width as f32)
        }
    }

    fn measurement(name: &str, apex: usize) -> RawMeasurement {
        let spectra = (0..100)
            .map(|i| {
                let intensity = triangle(i, apex, 1000.0, 8);
                let peaks = if intensity > 0.0 {
                    vec![CentroidPeak::new(300.0, intensity, 0)]
                } else {
                    vec![]
                };
                RawSpectrum::new(i, i as f64 * 0.01, 1, peaks)
            })
            .collect();
        RawMeasurement::new(name, spectra)
    }

    fn params() -> ProcessingParameters {
        let mut params = ProcessingParameters::default();
        params.peak_pick.minimum_amplitude = 100.0;
        params.peak_pick.smoothing_level = 1;
        params.peak_pick.mass_slice_width = 0.01;
        params.peak_pick.mass_range_begin = 295.0;
        params.peak_pick.mass_range_end = 305.0;
        params.peak_pick.retention_time_end = 10.0;
        params
    }

    #[test_log::test]
    fn test_process_measurements() -> Result<(), MZSpotterError> {
        let dir = tempfile::tempdir()?;
        let driver = MZSpotter {
            output_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let measurements = vec![measurement("a", 50), measurement("b", 52)];
        let (events, logger) = spawn_progress_logger();
        let alignment = driver.process_measurements(&measurements, &params(), &events)?;
        drop(events);
        let totals = logger.join().unwrap();

        assert_eq!(totals.samples, 2);
        assert_eq!(totals.ms1_spectra, 200);
        assert_eq!(totals.features, 2);
        assert_eq!(alignment.sample_names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(alignment.len(), 1);
        let spot = &alignment.alignment_spot_properties[0];
        assert!(spot.aligned_peak_properties.iter().all(|p| p.is_detected()));

        assert!(dir.path().join("a.features.json").exists());
        assert!(dir.path().join("b.features.json").exists());
        assert!(dir.path().join(ALIGNMENT_FILE).exists());
        let infos = read_spot_info(&dir.path().join(SPOT_INFO_FILE))?;
        assert_eq!(infos.len(), alignment.len());
        Ok(())
    }

    #[test]
    fn test_resolve_overrides() -> Result<(), MZSpotterError> {
        let driver = MZSpotter {
            ion_mode: Some(ArgIonMode::Negative),
            reference_file: Some(1),
            time_range: Some(TimeRange::new(2.0, f64::INFINITY)),
            ..Default::default()
        };
        let params = driver.resolve_parameters()?;
        assert_eq!(params.ion_mode, mzspot::IonMode::Negative);
        assert_eq!(params.alignment.alignment_reference_file_id, 1);
        assert_eq!(params.peak_pick.retention_time_begin, 2.0);
        assert_eq!(params.peak_pick.retention_time_end, 100.0);
        Ok(())
    }

    #[test]
    fn test_missing_config_file() {
        let driver = MZSpotter {
            config_file: Some(PathBuf::from("not/a/config.toml")),
            ..Default::default()
        };
        assert!(matches!(
            driver.resolve_parameters(),
            Err(MZSpotterError::ConfigFileMissing(_))
        ));
    }

    #[test]
    fn test_unique_names() {
        let names = unique_sample_names(&[
            PathBuf::from("x/run.mzML"),
            PathBuf::from("y/run.mzML"),
            PathBuf::from("z/other.mgf"),
        ]);
        assert_eq!(names, vec!["run", "run_2", "other"]);
    }
}
