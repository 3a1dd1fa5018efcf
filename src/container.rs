//! Locating the PR stream on disk: either a bare `.pr` file, or an entry of a zip based
//! `.cyt` archive.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::err::{DecodeError, Result};
use crate::pr_parser::ParserSettings;

const ARCHIVE_SUFFIX: &str = "cyt";

pub fn is_archive_path(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            name.to_string_lossy()
                .to_ascii_lowercase()
                .ends_with(ARCHIVE_SUFFIX)
        })
        .unwrap_or(false)
}

/// Reads the raw PR bytes for `path`.
///
/// Archives without the configured entry are read as a plain file.
pub fn read_pr_bytes(path: &Path, settings: &ParserSettings) -> Result<Vec<u8>> {
    if is_archive_path(path) {
        if let Some(data) = read_archive_entry(path, settings.get_archive_entry())? {
            return Ok(data);
        }
        warn!(
            "{} has no `{}` entry, reading it as a plain PR file",
            path.display(),
            settings.get_archive_entry()
        );
    }

    debug!("Reading plain PR file {}", path.display());
    Ok(fs::read(path)?)
}

fn read_archive_entry(path: &Path, entry: &str) -> Result<Option<Vec<u8>>> {
    let container_error = |message: String| DecodeError::Container {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| container_error(e.to_string()))?;

    let mut zipped = match archive.by_name(entry) {
        Ok(zipped) => zipped,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(container_error(e.to_string())),
    };

    debug!(
        "Extracting `{}` ({} bytes) from {}",
        entry,
        zipped.size(),
        path.display()
    );

    let mut data = Vec::new();
    zipped.read_to_end(&mut data)?;
    Ok(Some(data))
}
