use log::debug;
use serde::Deserialize;
use serde_json::Value;

use super::{FlattenError, RecordFilter, ReleaseRecord};

/// One element of the index's `versions` array. Channels other than
/// `chromedriver` (`chrome`, `chrome-headless-shell`) are ignored.
#[derive(Debug, Deserialize)]
struct VersionEntry {
    version: String,
    revision: String,
    #[serde(default)]
    downloads: Option<Downloads>,
}

#[derive(Debug, Default, Deserialize)]
struct Downloads {
    #[serde(default)]
    chromedriver: Option<Vec<DownloadEntry>>,
}

#[derive(Debug, Deserialize)]
struct DownloadEntry {
    platform: String,
    url: String,
}

/// Records extracted from an index plus the parts that had to be skipped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Flattened {
    pub records: Vec<ReleaseRecord>,
    pub errors: Vec<FlattenError>,
}

/// Flattens `versions[*].downloads.chromedriver[*]` into records, keeping
/// source order and applying `filter` on the way.
///
/// A malformed version entry is skipped on its own; entries after it are
/// still read.
pub fn flatten(document: &Value, filter: &RecordFilter) -> Flattened {
    let mut flattened = Flattened::default();

    let Some(root) = document.as_object() else {
        flattened.errors.push(FlattenError::Layout(format!(
            "expected a JSON object, found {}",
            kind_of(document)
        )));
        return flattened;
    };

    let versions = match root.get("versions") {
        None => {
            debug!("Document has no `versions` key");
            return flattened;
        }
        Some(Value::Array(versions)) => versions,
        Some(other) => {
            flattened.errors.push(FlattenError::Layout(format!(
                "`versions` should be an array, found {}",
                kind_of(other)
            )));
            return flattened;
        }
    };

    for (index, value) in versions.iter().enumerate() {
        let entry = match VersionEntry::deserialize(value) {
            Ok(entry) => entry,
            Err(e) => {
                flattened.errors.push(FlattenError::Entry {
                    index,
                    message: e.to_string(),
                });
                continue;
            }
        };

        if !filter.matches_version(&entry.version) {
            continue;
        }

        let downloads = entry
            .downloads
            .and_then(|d| d.chromedriver)
            .unwrap_or_default();

        for download in downloads {
            if !filter.matches_platform(&download.platform) {
                continue;
            }
            flattened.records.push(ReleaseRecord {
                version: entry.version.clone(),
                revision: entry.revision.clone(),
                platform: download.platform,
                url: download.url,
            });
        }
    }

    flattened
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
