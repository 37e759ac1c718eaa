use crate::{cli, debug, error::BootstrapError, msg, types::Checksum, warn};

use anyhow::{bail, Context, Result};
use async_compression::tokio::write::GzipDecoder;
use futures_util::future::select_all;
use reqwest::{Client, StatusCode};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs::File, io::AsyncWriteExt, task::JoinHandle};

#[derive(Clone, Debug)]
pub struct DownloadJob {
    pub url: String,
    // Name of the file inside the download directory
    pub filename: String,
    pub size: Option<u64>,
    pub checksum: Option<Checksum>,
}

#[derive(Clone, Debug)]
pub struct DownloadOptions {
    pub max_concurrent: usize,
    pub max_attempts: usize,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            max_concurrent: 16,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

/// One connection pool shared by every request of a run
pub struct Downloader {
    client: Client,
    max_concurrent: usize,
    max_attempts: usize,
    retry_delay: Duration,
}

impl Downloader {
    pub fn new(options: &DownloadOptions) -> Result<Self> {
        let builder = Client::builder().timeout(options.timeout);
        // Tests talk to a local responder, keep proxy settings from the environment out of it
        #[cfg(test)]
        let builder = builder.no_proxy();
        let client = builder.build().context("Failed to initialize HTTP client")?;
        Ok(Downloader {
            client,
            max_concurrent: options.max_concurrent.max(1),
            max_attempts: options.max_attempts.max(1),
            retry_delay: options.retry_delay,
        })
    }

    /// Download all jobs into `download_path`, at most `max_concurrent` at a time.
    ///
    /// A file that keeps failing is given up on after `max_attempts` and left
    /// out of the result. Returns url -> local path for every file that made it.
    pub async fn fetch(
        &self,
        mut to_download: Vec<DownloadJob>,
        download_path: &Path,
    ) -> Result<HashMap<String, PathBuf>> {
        // Create download dir
        if !download_path.is_dir() {
            tokio::fs::create_dir_all(download_path)
                .await
                .context("Failed to create download directory")?;
        }

        // Jobs are popped from the back
        to_download.reverse();
        let mut res = HashMap::new();
        let mut handles = Vec::with_capacity(self.max_concurrent);

        while !to_download.is_empty() || !handles.is_empty() {
            while handles.len() < self.max_concurrent {
                match to_download.pop() {
                    Some(job) => handles.push(self.spawn(job, download_path, 1)),
                    None => break,
                }
            }
            // Wait for any of them to stop
            let (download_res, _, remaining) = select_all(handles).await;
            handles = remaining;
            match download_res? {
                Ok((url, path)) => {
                    res.insert(url, path);
                }
                Err(err) if err.attempt < self.max_attempts => {
                    warn!(
                        "Attempt {}/{} for {} failed: {:#}",
                        err.attempt, self.max_attempts, err.job.url, err.error
                    );
                    handles.push(self.spawn(err.job, download_path, err.attempt + 1));
                }
                Err(err) => {
                    let failure = BootstrapError::ArtifactFetchFailure {
                        url: err.job.url,
                        attempts: err.attempt,
                        reason: format!("{:#}", err.error),
                    };
                    warn!("{}, skipping", failure);
                }
            }
        }

        Ok(res)
    }

    /// Fetch gzip-compressed documents into memory, one attempt each.
    ///
    /// Results are in completion order, failed ones included.
    pub async fn fetch_gzip_documents(
        &self,
        urls: Vec<String>,
    ) -> Result<Vec<(String, Result<Vec<u8>>)>> {
        let mut res = Vec::with_capacity(urls.len());
        let mut urls = urls.into_iter();
        let mut handles: Vec<JoinHandle<(String, Result<Vec<u8>>)>> =
            Vec::with_capacity(self.max_concurrent);

        loop {
            while handles.len() < self.max_concurrent {
                match urls.next() {
                    Some(url) => {
                        let client = self.client.clone();
                        handles.push(tokio::spawn(async move {
                            let body = download_gzip(&client, &url).await;
                            (url, body)
                        }));
                    }
                    None => break,
                }
            }
            if handles.is_empty() {
                break;
            }
            let (done, _, remaining) = select_all(handles).await;
            handles = remaining;
            res.push(done?);
        }

        Ok(res)
    }

    fn spawn(
        &self,
        job: DownloadJob,
        path: &Path,
        attempt: usize,
    ) -> JoinHandle<Result<(String, PathBuf), DownloadError>> {
        let client = self.client.clone();
        let path = path.to_owned();
        let delay = if attempt > 1 {
            self.retry_delay
        } else {
            Duration::ZERO
        };
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            try_download_file(client, path, job, attempt).await
        })
    }
}

struct DownloadError {
    error: anyhow::Error,
    job: DownloadJob,
    attempt: usize,
}

async fn try_download_file(
    client: Client,
    path: PathBuf,
    job: DownloadJob,
    attempt: usize,
) -> Result<(String, PathBuf), DownloadError> {
    match download_file(&client, &path, &job).await {
        Ok(res) => Ok(res),
        Err(error) => {
            // Don't leave a truncated file behind for the extractor to find
            let partial = path.join(&job.filename);
            if partial.is_file() {
                if let Err(e) = tokio::fs::remove_file(&partial).await {
                    debug!("Failed to remove {}: {}", partial.display(), e);
                }
            }
            Err(DownloadError {
                error,
                job,
                attempt,
            })
        }
    }
}

async fn download_file(
    client: &Client,
    path: &Path,
    job: &DownloadJob,
) -> Result<(String, PathBuf)> {
    let file_path = path.join(&job.filename);

    if let (Some(checksum), true) = (&job.checksum, file_path.is_file()) {
        let checksum = checksum.clone();
        let p = file_path.clone();
        let res = tokio::task::spawn_blocking(move || checksum.cmp_file(&p)).await?;
        if matches!(res, Ok(true)) {
            msg!(&cli::done_prefix(), "{} (not modified)", &job.filename);
            return Ok((job.url.clone(), file_path));
        }
    }

    let mut resp = client.get(&job.url).send().await?;
    if resp.status() != StatusCode::OK {
        bail!("Server returned {}", resp.status());
    }

    let mut f = File::create(&file_path)
        .await
        .context(format!("Failed to create {}", file_path.display()))?;
    let mut validator = job.checksum.as_ref().map(|c| c.get_validator());
    let mut len: u64 = 0;
    while let Some(chunk) = resp.chunk().await? {
        f.write_all(&chunk).await?;
        len += chunk.len() as u64;
        if let Some(ref mut validator) = validator {
            validator.update(&chunk);
        }
    }
    f.flush().await?;

    if let Some(size) = job.size {
        if len != size {
            bail!(
                "Bad file size when downloading {}: expected {}, got {}. Mirror may be syncing.",
                job.url,
                size,
                len
            );
        }
    }
    if let (Some(validator), Some(checksum)) = (validator, &job.checksum) {
        // finish() returns false if validate failed
        if !validator.finish() {
            bail!(
                "Checksum mismatch for file {}, expected {}",
                job.filename,
                checksum
            );
        }
    }

    msg!(&cli::done_prefix(), "{}", &job.filename);
    Ok((job.url.clone(), file_path))
}

async fn download_gzip(client: &Client, url: &str) -> Result<Vec<u8>> {
    let mut resp = client.get(url).send().await?;
    if resp.status() != StatusCode::OK {
        bail!("Server returned {}", resp.status());
    }
    let mut writer = GzipDecoder::new(Vec::new());
    while let Some(chunk) = resp.chunk().await? {
        writer
            .write_all(&chunk)
            .await
            .context("Failed to decompress")?;
    }
    writer.shutdown().await.context("Failed to decompress")?;
    Ok(writer.into_inner())
}
