//! Granule downloads with retry.
//!
//! - Streams the body into a `.partial` file, renamed on completion
//! - Exponential backoff retry on transport and server errors
//! - A 404 means the granule is not published upstream yet

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::SourceAuth;

/// Configuration for the downloader.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Directory for downloaded files
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(60),
            request_timeout: Duration::from_secs(600), // 10 minutes
            output_dir: PathBuf::from("/tmp"),
        }
    }
}

/// Outcome of one attempt.
enum Attempt {
    Done(u64),
    NotFound,
}

/// Downloads source files into the scratch directory.
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Download `url` to `{output_dir}/{filename}`.
    ///
    /// Returns `None` when the source does not have the file (404).
    #[instrument(skip(self, auth), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        filename: &str,
        auth: Option<&SourceAuth>,
    ) -> Result<Option<PathBuf>> {
        fs::create_dir_all(&self.config.output_dir).await?;

        let temp_path = self.config.output_dir.join(format!("{}.partial", filename));
        let final_path = self.config.output_dir.join(filename);

        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.attempt(url, &temp_path, auth).await {
                Ok(Attempt::Done(bytes)) => {
                    // Move to final location (use copy+delete for cross-filesystem support)
                    if fs::rename(&temp_path, &final_path).await.is_err() {
                        fs::copy(&temp_path, &final_path).await?;
                        fs::remove_file(&temp_path).await?;
                    }
                    info!(path = %final_path.display(), bytes = bytes, "Download completed");
                    return Ok(Some(final_path));
                }
                Ok(Attempt::NotFound) => {
                    debug!(url = %url, "Source file not available yet");
                    return Ok(None);
                }
                Err(e) => {
                    // Discard partial data; the next attempt starts over
                    let _ = fs::remove_file(&temp_path).await;
                    retry_count += 1;

                    if retry_count > self.config.max_retries {
                        return Err(anyhow!(
                            "Download failed after {} retries: {}",
                            retry_count - 1,
                            e
                        ));
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;

                    // Exponential backoff
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }

    async fn attempt(&self, url: &str, temp_path: &Path, auth: Option<&SourceAuth>) -> Result<Attempt> {
        let mut request = self.client.get(url);
        if let Some(auth) = auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }

        let response = request.send().await.context("Request failed")?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Attempt::NotFound);
        }
        if !status.is_success() {
            bail!("Unexpected status {}", status);
        }

        let mut file = File::create(temp_path)
            .await
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read response body")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(Attempt::Done(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::MockGeoServer;

    fn downloader(dir: &Path) -> Downloader {
        Downloader::new(DownloadConfig {
            max_retries: 2,
            initial_retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(20),
            request_timeout: Duration::from_secs(5),
            output_dir: dir.to_path_buf(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_file() {
        let server = MockGeoServer::start().await;
        server.respond("GET", "/flood/Flood_byStor_2024031015.bin", 200, b"\x01\x02\x03".to_vec());
        let dir = tempfile::tempdir().unwrap();

        let path = downloader(dir.path())
            .fetch(
                &server.url_for("/flood/Flood_byStor_2024031015.bin"),
                "gfms_current_2024031015.download",
                None,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert!(!dir.path().join("gfms_current_2024031015.download.partial").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_none() {
        let server = MockGeoServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let result = downloader(dir.path())
            .fetch(&server.url_for("/flood/missing.bin"), "missing.download", None)
            .await
            .unwrap();

        assert!(result.is_none());
        // not retried
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockGeoServer::start().await;
        server.respond("GET", "/flood/flaky.bin", 503, "");
        server.respond("GET", "/flood/flaky.bin", 200, "data");
        let dir = tempfile::tempdir().unwrap();

        let path = downloader(dir.path())
            .fetch(&server.url_for("/flood/flaky.bin"), "flaky.download", None)
            .await
            .unwrap();

        assert!(path.is_some());
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockGeoServer::start().await;
        server.respond("GET", "/flood/broken.bin", 500, "");
        let dir = tempfile::tempdir().unwrap();

        let result = downloader(dir.path())
            .fetch(&server.url_for("/flood/broken.bin"), "broken.download", None)
            .await;

        assert!(result.is_err());
        assert_eq!(server.requests().len(), 3);
    }
}
