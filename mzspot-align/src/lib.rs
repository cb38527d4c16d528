//! Cross-sample alignment of chromatographic features detected by [`mzspot`].
//!
//! [`PeakAligner`] builds a master list over all samples, matches each sample's features
//! to it, fills the remaining gaps from raw data with [`GapFiller`] and packs the result
//! into [`AlignmentSpotProperty`] rows.
pub mod aligner;
pub mod comparer;
pub mod gap_fill;
pub mod spot;
pub mod spot_info;

pub use crate::aligner::{AlignmentError, AlignmentSample, AlignmentTarget, PeakAligner};
pub use crate::comparer::FeatureComparer;
pub use crate::gap_fill::{GapFillAxis, GapFillTarget, GapFiller};
pub use crate::spot::{AlignmentChromPeakFeature, AlignmentResultContainer, AlignmentSpotProperty};
pub use crate::spot_info::{read_spot_info, write_spot_info, SpotChromatogramSummary, SpotInfo};
