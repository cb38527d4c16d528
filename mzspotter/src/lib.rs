mod args;
mod driver;
mod loader;
mod progress;
mod time_range;
mod write;

pub use args::*;
pub use driver::{MZSpotter, MZSpotterError, ALIGNMENT_FILE, PARAMETERS_FILE, SPOT_INFO_FILE};
pub use loader::{convert_spectrum, load_measurement, LOAD_ATTEMPTS};
pub use progress::{ProgressEvent, ProgressRecord};
pub use time_range::{TimeRange, TimeRangeParseError};
