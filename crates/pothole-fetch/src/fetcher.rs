//! HTTP image fetcher that writes each download to its own scratch file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid image url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status} for {url}")]
    Server { status: u16, url: String },
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads images over HTTP with a bounded timeout.
pub struct ImageFetcher {
    client: reqwest::Client,
    scratch_dir: PathBuf,
    timeout: Duration,
}

/// A downloaded image on local disk.
///
/// The file is deleted when this value is dropped, on every exit path.
#[derive(Debug)]
pub struct FetchedImage {
    path: TempPath,
    bytes: u64,
}

impl FetchedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the downloaded body in bytes.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

impl ImageFetcher {
    /// Create a fetcher that writes into `scratch_dir`, creating it if needed.
    pub fn new(timeout: Duration, scratch_dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let scratch_dir = scratch_dir.into();
        std::fs::create_dir_all(&scratch_dir)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            scratch_dir,
            timeout,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Download `url` into a uniquely named file in the scratch directory.
    ///
    /// Any network failure or non-success status is a [`FetchError`]; no
    /// scratch file survives a failed download.
    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        info!(url = %parsed, "downloading complaint image");
        let mut resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Server {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tempfile::Builder::new()
            .prefix("complaint-")
            .suffix(".jpg")
            .tempfile_in(&self.scratch_dir)?;
        let mut bytes = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk)?;
            bytes += chunk.len() as u64;
        }
        file.flush()?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), bytes, "image written to scratch file");
        Ok(FetchedImage { path, bytes })
    }
}
