use crate::{debug, error::BootstrapError, info, utils::downloader::Downloader, warn};

use anyhow::Result;

pub const DEFAULT_COMPONENTS: &[&str] = &["main", "universe"];

pub fn index_url(mirror: &str, suite: &str, component: &str, arch: &str) -> String {
    format!(
        "{}/dists/{}/{}/binary-{}/Packages.gz",
        mirror, suite, component, arch
    )
}

/// Fetch the `Packages.gz` of every (suite, component) pair concurrently and
/// merge the decompressed documents, in completion order.
///
/// A pair that fails to download or decompress contributes nothing.
pub async fn fetch_indices(
    downloader: &Downloader,
    mirror: &str,
    arch: &str,
    suites: &[String],
    components: &[String],
) -> Result<String> {
    let mut urls = Vec::with_capacity(suites.len() * components.len());
    for suite in suites {
        for component in components {
            urls.push(index_url(mirror, suite, component, arch));
        }
    }
    let total = urls.len();
    info!("Fetching {} package indices...", total);

    let mut merged = String::new();
    let mut fetched = 0;
    for (url, body) in downloader.fetch_gzip_documents(urls).await? {
        match body {
            Ok(body) => {
                debug!("Fetched {} ({} bytes)", url, body.len());
                if !merged.is_empty() {
                    merged.push_str("\n\n");
                }
                merged.push_str(&String::from_utf8_lossy(&body));
                fetched += 1;
            }
            Err(e) => {
                let failure = BootstrapError::IndexFetchFailure {
                    url,
                    reason: format!("{:#}", e),
                };
                warn!("{}", failure);
            }
        }
    }

    if fetched == 0 {
        warn!("None of the package indices could be fetched");
    } else {
        debug!("{}/{} package indices fetched", fetched, total);
    }
    Ok(merged)
}
