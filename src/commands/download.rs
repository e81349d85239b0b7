use anyhow::Result;
use log::info;

use crate::runtime::Runtime;

use super::config::{Config, Options};

/// Download every archive whose version starts with `version_prefix`,
/// optionally restricted to one platform.
///
/// Individual failures are logged and counted but do not fail the command.
#[tracing::instrument(skip(runtime, options))]
pub async fn download<R: Runtime>(
    runtime: R,
    options: Options,
    version_prefix: &str,
    platform: Option<&str>,
) -> Result<()> {
    let config = Config::new(runtime, options)?;
    let report = config
        .client
        .download_matching(version_prefix, platform, &config.url)
        .await;

    if !report.is_empty() {
        info!(
            "Downloaded {} of {} archive(s) to {}",
            report.saved.len(),
            report.attempted(),
            config.client.output_dir().display()
        );
    }

    Ok(())
}
