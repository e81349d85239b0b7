use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;

use crate::{
    catalog::{DEFAULT_URL, ReleaseCatalogClient},
    http::{HttpClient, RetryPolicy},
    logger::LogLogger,
    runtime::Runtime,
};

/// Settings shared by the list and download commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Release index URL; [`DEFAULT_URL`] when unset.
    pub url: Option<String>,
    /// Where archives and the saved index go; the working directory when unset.
    pub output_dir: Option<PathBuf>,
    pub jobs: usize,
    pub retries: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: None,
            output_dir: None,
            jobs: 1,
            retries: 0,
        }
    }
}

pub struct Config<R: Runtime> {
    pub client: ReleaseCatalogClient<R, LogLogger>,
    pub url: String,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, options: Options) -> Result<Self> {
        let http = HttpClient::build()?.with_retry_policy(RetryPolicy::with_retries(options.retries));
        Self::with_http_client(runtime, options, http)
    }

    pub fn with_http_client(runtime: R, options: Options, http: HttpClient) -> Result<Self> {
        let output_dir = options.output_dir.unwrap_or_else(|| PathBuf::from("."));
        if !runtime.exists(&output_dir) {
            debug!("Creating output directory {:?}", output_dir);
            runtime
                .create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
        }

        let client = ReleaseCatalogClient::new(runtime, http, LogLogger::default())
            .with_output_dir(output_dir)
            .with_jobs(options.jobs);

        Ok(Self {
            client,
            url: options.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        })
    }
}
