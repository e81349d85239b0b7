//! Archive file naming and download bookkeeping.

use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::catalog::ReleaseRecord;

/// Local file name for a record: the last URL path segment with the version
/// inserted before its extension, so archives of different versions do not
/// overwrite each other.
///
/// `https://cdn/124.0.1/win64/chromedriver-win64.zip` at `124.0.1` becomes
/// `chromedriver-win64_124.0.1.zip`.
pub fn derive_filename(url: &str, version: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    if segment.is_empty() {
        bail!("Cannot derive a file name from url {}", url);
    }

    let (stem, extension) = split_extension(segment);
    Ok(format!("{}_{}{}", stem, version, extension))
}

/// Splits at the last dot. Leading dots belong to the stem, so `.bashrc` has
/// no extension and `archive.tar.gz` has `.gz`.
fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(dot) => name.split_at(leading_dots + dot),
        None => (name, ""),
    }
}

/// An archive written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArchive {
    pub record: ReleaseRecord,
    pub path: PathBuf,
    pub bytes: u64,
}

/// An archive that could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub record: ReleaseRecord,
    pub reason: String,
}

/// Result of a download batch, both lists in listing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub saved: Vec<SavedArchive>,
    pub failed: Vec<FailedDownload>,
}

impl DownloadReport {
    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempted() == 0
    }
}
