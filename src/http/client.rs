//! HTTP client with an optional retry policy.

use anyhow::Result;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::io::Write;

use super::retry::{HttpError, RetryPolicy};

const USER_AGENT: &str = concat!("chromedriver-downloader/", env!("CARGO_PKG_VERSION"));

/// HTTP client used for both the release document and the archives.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Builds a client with the crate's user agent. Redirects are followed
    /// with reqwest's default policy.
    pub fn build() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::new(client))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Performs a GET request and parses the body as JSON.
    ///
    /// Anything other than `200 OK` is an error, as is a body that does not
    /// parse.
    #[tracing::instrument(skip(self))]
    pub async fn get_json(&self, url: &str) -> Result<Value, HttpError> {
        debug!("GET JSON from {}...", url);

        self.with_retry("GET JSON", || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(HttpError::transport)?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(HttpError::Status { status });
            }

            let body = response.bytes().await.map_err(HttpError::transport)?;
            serde_json::from_slice(&body).map_err(|e| HttpError::InvalidJson(e.to_string()))
        })
        .await
    }

    /// Downloads `url` into the writer returned by `create_writer`.
    ///
    /// The writer is only created once a successful status has been received,
    /// so a rejected request never touches the destination. Each retry calls
    /// `create_writer` again.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64, HttpError>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let create_writer = &create_writer;
        self.with_retry("Download", || self.download_file_once(url, create_writer))
            .await
    }

    /// Single download attempt without retry.
    async fn download_file_once<W, F>(&self, url: &str, create_writer: &F) -> Result<u64, HttpError>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(HttpError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status { status });
        }

        let mut writer = create_writer().map_err(HttpError::Output)?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(HttpError::transport)? {
            writer
                .write_all(&chunk)
                .map_err(|e| HttpError::Output(anyhow::Error::new(e).context("Failed to write chunk")))?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer
            .flush()
            .map_err(|e| HttpError::Output(anyhow::Error::new(e).context("Failed to flush file")))?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }

    /// Executes an async operation under the configured retry policy.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, HttpError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, HttpError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        return Err(e);
                    }
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                        operation_name,
                        attempt,
                        max_attempts,
                        e,
                        self.retry.delay.as_millis()
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_retries(retries: usize) -> RetryPolicy {
        RetryPolicy::with_retries(retries).delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/index.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"timestamp": "2024-04-01", "versions": []}"#)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result = client
            .get_json(&format!("{}/index.json", url))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result["timestamp"], "2024-04-01");
        assert!(result["versions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_json_preserves_key_order() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/index.json")
            .with_status(200)
            .with_body(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result = client
            .get_json(&format!("{}/index.json", url))
            .await
            .unwrap();

        let keys: Vec<&String> = result.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_get_json_non_ok_status() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/index.json")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let err = client
            .get_json(&format!("{}/index.json", url))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_get_json_non_200_success_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/index.json")
            .with_status(204)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let err = client
            .get_json(&format!("{}/index.json", url))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::NO_CONTENT));
    }

    #[tokio::test]
    async fn test_get_json_invalid_body() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/index.json")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let err = client
            .get_json(&format!("{}/index.json", url))
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_get_json_connection_refused() {
        let client = HttpClient::new(Client::new());
        let err = client
            .get_json("http://127.0.0.1:1/index.json")
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::Transport(_)));
    }

    #[tokio::test]
    async fn test_get_json_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/index.json")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new()).with_retry_policy(fast_retries(2));
        let result = client.get_json(&format!("{}/index.json", url)).await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_json_does_not_retry_client_errors() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/index.json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new()).with_retry_policy(fast_retries(2));
        let result = client.get_json(&format!("{}/index.json", url)).await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_download_file_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/chromedriver-linux64.zip")
            .with_status(200)
            .with_body("zip content")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let bytes = client
            .download_file(&format!("{}/chromedriver-linux64.zip", url), || {
                Ok(std::io::sink())
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 11);
    }

    #[tokio::test]
    async fn test_download_file_follows_redirects() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _redirect = server
            .mock("GET", "/latest.zip")
            .with_status(302)
            .with_header("location", &format!("{}/real.zip", url))
            .create_async()
            .await;
        let real = server
            .mock("GET", "/real.zip")
            .with_status(200)
            .with_body("abc")
            .create_async()
            .await;

        let client = HttpClient::build().unwrap();
        let bytes = client
            .download_file(&format!("{}/latest.zip", url), || Ok(std::io::sink()))
            .await
            .unwrap();

        real.assert_async().await;
        assert_eq!(bytes, 3);
    }

    #[tokio::test]
    async fn test_download_file_not_found_does_not_create_writer() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/missing.zip")
            .with_status(404)
            .create_async()
            .await;

        let created = AtomicUsize::new(0);
        let client = HttpClient::new(Client::new());
        let result = client
            .download_file(&format!("{}/missing.zip", url), || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(std::io::sink())
            })
            .await;

        assert!(matches!(result, Err(HttpError::Status { .. })));
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_download_file_writer_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/file.zip")
            .with_status(200)
            .with_body("data")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new()).with_retry_policy(fast_retries(3));
        let result = client
            .download_file(&format!("{}/file.zip", url), || {
                Err::<std::io::Sink, _>(anyhow::anyhow!("read-only file system"))
            })
            .await;

        match result {
            Err(HttpError::Output(e)) => assert!(e.to_string().contains("read-only")),
            other => panic!("expected output error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_success() {
        let client = HttpClient::new(Client::new()).with_retry_policy(fast_retries(5));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result = client
            .with_retry("test", || {
                let count = calls_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst);
                    if current < 2 {
                        Err(HttpError::Transport("connection reset".into()))
                    } else {
                        Ok("success after retries")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success after retries");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_default_policy_is_single_attempt() {
        let client = HttpClient::new(Client::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result = client
            .with_retry("test", || {
                let count = calls_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(HttpError::Transport("connection timeout".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
