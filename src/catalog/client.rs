use anyhow::{Context, Result};
use futures_util::{StreamExt, stream};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;

use super::{FetchError, Listing, RAW_DOCUMENT_FILE, RecordFilter, ReleaseRecord, flatten};
use crate::download::{DownloadReport, FailedDownload, SavedArchive, derive_filename};
use crate::http::HttpClient;
use crate::logger::Logger;
use crate::runtime::Runtime;

/// Fetches the release index, lists its records and downloads archives.
///
/// Every failure is reported through the injected [`Logger`] where it
/// happens and returned as data; nothing here aborts the process.
pub struct ReleaseCatalogClient<R: Runtime, L: Logger> {
    runtime: R,
    http: HttpClient,
    logger: L,
    output_dir: PathBuf,
    jobs: usize,
}

impl<R: Runtime, L: Logger> ReleaseCatalogClient<R, L> {
    /// A client that writes into the current directory, one download at a
    /// time.
    pub fn new(runtime: R, http: HttpClient, logger: L) -> Self {
        Self {
            runtime,
            http,
            logger,
            output_dir: PathBuf::from("."),
            jobs: 1,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Maximum number of downloads in flight. Values below 1 are treated as 1.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// GETs the index at `url`. A non-200 status, a transport failure or a
    /// body that is not JSON is logged once and returned as [`FetchError`].
    #[tracing::instrument(skip(self))]
    pub async fn fetch_document(&self, url: &str) -> Result<Value, FetchError> {
        self.http.get_json(url).await.map_err(|e| {
            let error = FetchError::from_http(url, e);
            self.logger.error(&error.to_string());
            error
        })
    }

    /// Fetches and flattens the index, keeping records accepted by `filter`.
    ///
    /// With `persist_raw` the fetched document is also written to
    /// [`RAW_DOCUMENT_FILE`] before any filtering.
    #[tracing::instrument(skip(self))]
    pub async fn list_records(&self, url: &str, filter: &RecordFilter, persist_raw: bool) -> Listing {
        let document = match self.fetch_document(url).await {
            Ok(document) => document,
            Err(e) => return Listing::FetchFailed(e),
        };

        if persist_raw {
            match self.persist_document(&document) {
                Ok(path) => self
                    .logger
                    .info(&format!("Saved release index to {}", path.display())),
                Err(e) => self
                    .logger
                    .warn(&format!("Failed to save release index: {:#}", e)),
            }
        }

        let flattened = flatten(&document, filter);
        self.logger.debug(&format!(
            "Flattened {} record(s) matching {}",
            flattened.records.len(),
            filter
        ));

        if flattened.errors.is_empty() {
            return Listing::Complete(flattened.records);
        }
        for error in &flattened.errors {
            self.logger.error(&error.to_string());
        }
        Listing::Partial {
            records: flattened.records,
            errors: flattened.errors,
        }
    }

    /// Downloads every archive matching `version_prefix` and `platform`.
    ///
    /// Each archive succeeds or fails on its own; the report lists both in
    /// listing order regardless of how many downloads ran concurrently.
    /// Records that map to the same local file are downloaded one after the
    /// other in listing order, so the last one wins as with a single job.
    #[tracing::instrument(skip(self))]
    pub async fn download_matching(
        &self,
        version_prefix: &str,
        platform: Option<&str>,
        url: &str,
    ) -> DownloadReport {
        let filter = RecordFilter::new(platform.map(str::to_string), Some(version_prefix.to_string()));
        let records = self.list_records(url, &filter, false).await.into_records();

        let mut report = DownloadReport::default();
        if records.is_empty() {
            self.logger
                .error(&format!("No data for combination {}", filter));
            return report;
        }

        self.logger.debug(&format!(
            "Downloading {} archive(s) with {} job(s)",
            records.len(),
            self.jobs
        ));

        // Each download holds `done` until it finishes; the next record with
        // the same destination waits on the matching receiver.
        let mut last_for_path: HashMap<PathBuf, oneshot::Receiver<()>> = HashMap::new();
        let queued: Vec<_> = records
            .into_iter()
            .map(|record| {
                let destination = derive_filename(&record.url, &record.version)
                    .map(|filename| self.output_dir.join(filename));
                let (done, finished) = oneshot::channel::<()>();
                let previous = match &destination {
                    Ok(path) => last_for_path.insert(path.clone(), finished),
                    Err(_) => None,
                };
                (record, destination, previous, done)
            })
            .collect();

        let mut downloads = std::pin::pin!(
            stream::iter(queued)
                .map(|(record, destination, previous, done)| async move {
                    if let Some(previous) = previous {
                        let _ = previous.await;
                    }
                    let result = match destination {
                        Ok(path) => self.download_record(&record, path).await,
                        Err(e) => Err(e),
                    };
                    drop(done);
                    (record, result)
                })
                .buffered(self.jobs)
        );

        while let Some((record, result)) = downloads.next().await {
            match result {
                Ok((path, bytes)) => {
                    self.logger.info(&format!(
                        "Downloaded {} > {} ({} bytes)",
                        record.url,
                        path.display(),
                        bytes
                    ));
                    report.saved.push(SavedArchive {
                        record,
                        path,
                        bytes,
                    });
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    self.logger
                        .error(&format!("Failed to download {}. ({})", record.url, reason));
                    report.failed.push(FailedDownload { record, reason });
                }
            }
        }

        report
    }

    async fn download_record(&self, record: &ReleaseRecord, path: PathBuf) -> Result<(PathBuf, u64)> {
        let announcement = format!("Downloading {} > {}", record.url, path.display());
        // Start lines only keep listing order with a single job.
        if self.jobs == 1 {
            self.logger.info(&announcement);
        } else {
            self.logger.debug(&announcement);
        }

        let created = AtomicBool::new(false);
        let result = self
            .http
            .download_file(&record.url, || {
                created.store(true, Ordering::SeqCst);
                self.runtime.create_file(&path)
            })
            .await;

        match result {
            Ok(bytes) => Ok((path, bytes)),
            Err(e) => {
                if created.load(Ordering::SeqCst) && self.runtime.exists(&path) {
                    if let Err(remove_error) = self.runtime.remove_file(&path) {
                        self.logger.debug(&format!(
                            "Could not remove partial file {}: {:#}",
                            path.display(),
                            remove_error
                        ));
                    }
                }
                Err(anyhow::Error::new(e))
            }
        }
    }

    fn persist_document(&self, document: &Value) -> Result<PathBuf> {
        let path = self.output_dir.join(RAW_DOCUMENT_FILE);

        let mut contents = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut contents, formatter);
        document
            .serialize(&mut serializer)
            .context("Failed to serialize release index")?;

        self.runtime.write(&path, &contents)?;
        Ok(path)
    }
}
