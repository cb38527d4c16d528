//! Chromatographic feature detection, isotope and adduct annotation for LC-MS and
//! ion mobility-MS data.
//!
//! The entry point is [`PeakSpottingCore`], which sweeps a [`RawSpectrumProvider`]
//! across the mass range and returns [`ChromatogramPeakFeature`]s. Those can then be
//! annotated with [`IsotopeEstimator`], [`PeakCharacterEstimator`] and [`CcsEstimator`].
pub mod adduct;
pub mod ccs;
pub mod character;
pub mod chromatogram;
pub mod feature;
pub mod isotope;
pub mod params;
pub mod peak_detection;
pub mod progress;
pub mod smoothing;
pub mod spectrum;
pub mod spotting;

pub use crate::adduct::{AdductIon, AdductParseError};
pub use crate::ccs::{CcsCalibration, CcsEstimator, MobilityType};
pub use crate::character::{CharacterSummary, LinkingContext, PeakCharacterEstimator};
pub use crate::chromatogram::{ChromXType, ChromXUnit, ChromXs, Chromatogram, ChromatogramPeak};
pub use crate::feature::{
    ChromatogramPeakFeature, IonFeature, IonFeatureCharacter, LinkedPeakFeature, PeakLinkKind,
};
pub use crate::isotope::{IsotopeEstimator, MsmsIsotopeRecognition, SpectrumPeak};
pub use crate::params::{
    AcquisitionType, AlignmentParameters, CharacterParameters, IonMobilityParameters, IonMode,
    IsotopeParameters, PeakPickParameters, ProcessingParameters,
};
pub use crate::progress::{CancellationToken, NoProgress, ProgressReporter};
pub use crate::spectrum::{RawDataError, RawMeasurement, RawSpectrum, RawSpectrumProvider};
pub use crate::spotting::{PeakSpottingCore, SpottingError};
