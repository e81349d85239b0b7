use anyhow::Result;
use log::{info, warn};
use tabled::{Table, Tabled, settings::Style};

use crate::{
    catalog::{FlattenError, Listing, RecordFilter, ReleaseRecord},
    runtime::Runtime,
};

use super::config::{Config, Options};

/// Table row for a release record
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Revision")]
    revision: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Url")]
    url: String,
}

impl From<&ReleaseRecord> for RecordRow {
    fn from(record: &ReleaseRecord) -> Self {
        Self {
            version: record.version.clone(),
            revision: record.revision.clone(),
            platform: record.platform.clone(),
            url: record.url.clone(),
        }
    }
}

pub fn render_table(records: &[ReleaseRecord]) -> String {
    let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
    Table::new(rows).with(Style::psql()).to_string()
}

/// One-line summary of the parts of the index that were skipped.
fn skipped_summary(errors: &[FlattenError]) -> String {
    if errors.iter().any(|e| matches!(e, FlattenError::Layout(_))) {
        return "Release index has an unexpected layout; no records were read".to_string();
    }
    format!("Skipped {} malformed version entries", errors.len())
}

/// List the records of the release index matching `filter`.
///
/// Fetch and parse problems have already been logged by the client; they
/// leave an empty or shortened table and never fail the command.
#[tracing::instrument(skip(runtime, options))]
pub async fn list<R: Runtime>(
    runtime: R,
    options: Options,
    filter: RecordFilter,
    save: bool,
) -> Result<()> {
    let config = Config::new(runtime, options)?;
    let listing = config.client.list_records(&config.url, &filter, save).await;

    if let Listing::Partial { errors, .. } = &listing {
        warn!("{}", skipped_summary(errors));
    }

    if listing.is_empty() {
        info!("No records for combination {}", filter);
        println!();
        return Ok(());
    }

    println!("{}", render_table(listing.records()));
    Ok(())
}
