use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::domain::{DATASETS, DatasetSpec};
use crate::error::OkavangoError;
use crate::pipeline::{ProgressEvent, ProgressSink};

/// One download attempt. Retrying is the [`Retriever`]'s job.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), OkavangoError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, OkavangoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("okavango/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| OkavangoError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| OkavangoError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, OkavangoError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(OkavangoError::HttpStatus { status, message })
    }
}

impl Fetcher for HttpFetcher {
    /// Streams the body into a temp file next to `destination` and renames it
    /// into place once complete.
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), OkavangoError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| OkavangoError::Http(err.to_string()))?;
        let mut response = Self::handle_status(response)?;

        let parent = destination
            .parent()
            .ok_or_else(|| OkavangoError::Filesystem("invalid destination path".to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".okavango-download")
            .tempfile_in(parent)
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        let written = std::io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| OkavangoError::Http(format!("reading body of {url}: {err}")))?;
        temp.persist(destination)
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        debug!(url, bytes = written, "response body written");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub items: Vec<FetchItemResult>,
}

impl FetchResult {
    pub fn paths(&self) -> Vec<Utf8PathBuf> {
        self.items.iter().map(|item| item.path.clone()).collect()
    }

    pub fn downloaded(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.action == FetchAction::Download)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchAction {
    Existing,
    Download,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchItemResult {
    pub filename: String,
    pub url: String,
    pub action: FetchAction,
    pub path: Utf8PathBuf,
    pub attempts: u32,
    pub downloaded_at: Option<String>,
}

pub struct Retriever<F: Fetcher> {
    fetcher: F,
    retry: RetryPolicy,
}

impl<F: Fetcher> Retriever<F> {
    pub fn new(fetcher: F, retry: RetryPolicy) -> Self {
        Self { fetcher, retry }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Ensures every configured dataset is on disk, returning paths in
    /// configuration order.
    pub fn ensure_datasets(
        &self,
        target_dir: &Utf8Path,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Utf8PathBuf>, OkavangoError> {
        Ok(self.ensure_all(target_dir, DATASETS, force, sink)?.paths())
    }

    pub fn ensure_all(
        &self,
        target_dir: &Utf8Path,
        specs: &[DatasetSpec],
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, OkavangoError> {
        fs::create_dir_all(target_dir.as_std_path())
            .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;

        let mut items = Vec::with_capacity(specs.len());
        for spec in specs {
            items.push(self.ensure_one(target_dir, spec, force, sink)?);
        }
        Ok(FetchResult { items })
    }

    fn ensure_one(
        &self,
        target_dir: &Utf8Path,
        spec: &DatasetSpec,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<FetchItemResult, OkavangoError> {
        let destination = target_dir.join(spec.filename);

        if destination.as_std_path().exists() && !force {
            info!(file = spec.filename, "already exists");
            sink.event(ProgressEvent {
                message: format!("exists {}", spec.filename),
                elapsed: None,
            });
            return Ok(FetchItemResult {
                filename: spec.filename.to_string(),
                url: spec.url.to_string(),
                action: FetchAction::Existing,
                path: destination,
                attempts: 0,
                downloaded_at: None,
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| OkavangoError::Filesystem(err.to_string()))?;
        }

        let start = std::time::Instant::now();
        let attempts = self.download_with_retries(spec, destination.as_std_path(), sink)?;
        info!(file = spec.filename, attempts, "downloaded");
        sink.event(ProgressEvent {
            message: format!("downloaded {}", spec.filename),
            elapsed: Some(start.elapsed()),
        });

        Ok(FetchItemResult {
            filename: spec.filename.to_string(),
            url: spec.url.to_string(),
            action: FetchAction::Download,
            path: destination,
            attempts,
            downloaded_at: Some(chrono::Utc::now().to_rfc3339()),
        })
    }

    fn download_with_retries(
        &self,
        spec: &DatasetSpec,
        destination: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<u32, OkavangoError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.fetcher.fetch(spec.url, destination) {
                Ok(()) => return Ok(attempt),
                Err(err) => {
                    warn!(file = spec.filename, attempt, max_attempts, error = %err, "download failed");
                    sink.event(ProgressEvent {
                        message: format!("retry {attempt}/{max_attempts} for {}", spec.filename),
                        elapsed: None,
                    });
                    last_error = Some(err);
                    if attempt < max_attempts {
                        thread::sleep(self.retry.delay_after(attempt));
                    }
                }
            }
        }

        Err(OkavangoError::Retrieval {
            url: spec.url.to_string(),
            attempts: max_attempts,
            source: Box::new(
                last_error.unwrap_or_else(|| OkavangoError::Http("no attempt made".to_string())),
            ),
        })
    }
}
