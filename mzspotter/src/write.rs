use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tracing::debug;

use crate::driver::MZSpotterError;

/// `path` with `.gz` appended when `compress` is set
pub fn output_path(directory: &Path, file_name: &str, compress: bool) -> PathBuf {
    if compress {
        directory.join(format!("{file_name}.gz"))
    } else {
        directory.join(file_name)
    }
}

/// Serialize `value` as JSON to `directory/file_name`, gzip compressed if `compress` is set
pub fn write_json<T: Serialize + ?Sized>(
    directory: &Path,
    file_name: &str,
    value: &T,
    compress: bool,
) -> Result<PathBuf, MZSpotterError> {
    let path = output_path(directory, file_name, compress);
    let mut handle = io::BufWriter::new(fs::File::create(&path)?);
    if compress {
        let mut encoder = GzEncoder::new(handle, Compression::best());
        serde_json::to_writer(&mut encoder, value)?;
        encoder.finish()?.flush()?;
    } else {
        serde_json::to_writer(&mut handle, value)?;
        handle.flush()?;
    }
    debug!("Wrote {}", path.display());
    Ok(path)
}
