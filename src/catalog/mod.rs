//! Release catalog: the ChromeDriver "known good versions" index, its
//! flattening into per-platform records, and the client that lists and
//! downloads them.

mod client;
mod document;

use std::fmt;
use thiserror::Error;

use crate::http::HttpError;

pub use client::ReleaseCatalogClient;
pub use document::{Flattened, flatten};

/// Known-good versions index published by Chrome for Testing.
pub const DEFAULT_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/known-good-versions-with-downloads.json";

/// File the raw index is saved to when listing with `--save`.
pub const RAW_DOCUMENT_FILE: &str = "chromedriver_downloader.json";

/// One downloadable ChromeDriver archive for a (version, platform) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub version: String,
    pub revision: String,
    pub platform: String,
    pub url: String,
}

/// Filters applied while flattening the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Exact platform name, e.g. `win64`.
    pub platform: Option<String>,
    /// Plain string prefix of the version, e.g. `124.0`.
    pub version_prefix: Option<String>,
}

impl RecordFilter {
    pub fn new(platform: Option<String>, version_prefix: Option<String>) -> Self {
        Self {
            platform,
            version_prefix,
        }
    }

    pub fn matches_platform(&self, platform: &str) -> bool {
        self.platform.as_deref().is_none_or(|p| p == platform)
    }

    /// `"124"` matches `"124.0.6367.0"` and also `"1240.0.0.0"`.
    pub fn matches_version(&self, version: &str) -> bool {
        self.version_prefix
            .as_deref()
            .is_none_or(|prefix| version.starts_with(prefix))
    }
}

impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "platform={} and version={}",
            self.platform.as_deref().unwrap_or("None"),
            self.version_prefix.as_deref().unwrap_or("None")
        )
    }
}

/// Why the index could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Error accessing to url {url}. res={status}")]
    Status { url: String, status: u16 },
    #[error("Error accessing to url {url}. ({message})")]
    Transport { url: String, message: String },
    #[error("Invalid JSON document at url {url}. ({message})")]
    InvalidJson { url: String, message: String },
}

impl FetchError {
    pub(crate) fn from_http(url: &str, error: HttpError) -> Self {
        let url = url.to_string();
        match error {
            HttpError::Status { status } => FetchError::Status {
                url,
                status: status.as_u16(),
            },
            HttpError::InvalidJson(message) => FetchError::InvalidJson { url, message },
            other => FetchError::Transport {
                url,
                message: other.to_string(),
            },
        }
    }
}

/// A part of the index that could not be turned into records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlattenError {
    #[error("Unexpected document layout: {0}")]
    Layout(String),
    #[error("Skipping malformed version entry #{index}: {message}")]
    Entry { index: usize, message: String },
}

/// Outcome of listing the index.
#[derive(Debug)]
pub enum Listing {
    /// Every version entry was read.
    Complete(Vec<ReleaseRecord>),
    /// Some entries were skipped; `records` holds everything else.
    Partial {
        records: Vec<ReleaseRecord>,
        errors: Vec<FlattenError>,
    },
    /// The index could not be fetched at all.
    FetchFailed(FetchError),
}

impl Listing {
    pub fn records(&self) -> &[ReleaseRecord] {
        match self {
            Listing::Complete(records) | Listing::Partial { records, .. } => records,
            Listing::FetchFailed(_) => &[],
        }
    }

    pub fn into_records(self) -> Vec<ReleaseRecord> {
        match self {
            Listing::Complete(records) | Listing::Partial { records, .. } => records,
            Listing::FetchFailed(_) => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}
