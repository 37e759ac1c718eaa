use crate::{
    types::PackageTable,
    utils::downloader::{DownloadJob, Downloader},
    warn,
};

use anyhow::Result;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Turn resolved package names into download jobs against `mirror`.
///
/// Returns the jobs together with url -> package name. Packages without a
/// `Filename` cannot be fetched and are left out.
pub fn gen_jobs(
    names: &[String],
    table: &PackageTable,
    mirror: &str,
) -> (Vec<DownloadJob>, HashMap<String, String>) {
    let mut jobs = Vec::with_capacity(names.len());
    let mut owners = HashMap::with_capacity(names.len());

    for name in names {
        let record = match table.get(name) {
            Some(r) => r,
            None => {
                warn!("{} is not in the package table, skipping", name);
                continue;
            }
        };
        let filename = match &record.filename {
            Some(f) => f,
            None => {
                warn!("{} has no Filename, skipping", name);
                continue;
            }
        };
        let url = format!("{}/{}", mirror, filename.trim_start_matches('/'));
        let local_name = match filename.rsplit('/').next() {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => format!("{}_{}.deb", name, record.version),
        };
        owners.insert(url.clone(), name.clone());
        jobs.push(DownloadJob {
            url,
            filename: local_name,
            size: record.size,
            checksum: record.checksum.clone(),
        });
    }

    (jobs, owners)
}

/// Download the debs of `names` into `path`.
///
/// Returns package name -> local deb for every package that was fetched.
pub async fn fetch_debs(
    downloader: &Downloader,
    names: &[String],
    table: &PackageTable,
    mirror: &str,
    path: &Path,
) -> Result<HashMap<String, PathBuf>> {
    let (jobs, mut owners) = gen_jobs(names, table, mirror);
    let fetched = downloader.fetch(jobs, path).await?;

    let mut res = HashMap::with_capacity(fetched.len());
    for (url, deb) in fetched {
        if let Some(name) = owners.remove(&url) {
            res.insert(name, deb);
        }
    }
    Ok(res)
}
