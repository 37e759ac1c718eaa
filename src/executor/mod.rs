pub mod deb;
pub mod download;
pub mod rootfs;

use crate::{
    config::Config,
    info, repo,
    solver::{extraction_order, Solver},
    utils::{debcontrol::parse_index, downloader::Downloader},
    warn,
};
use deb::{ArCommand, ArLibrary, ArchiveTool};

use anyhow::{Context, Result};
use std::path::PathBuf;

/// What a bootstrap run did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub resolved: usize,
    pub downloaded: usize,
    pub extracted: usize,
    pub skipped: usize,
}

/// Build a root filesystem at `config.rootfs` out of `config.packages` and
/// everything they depend on
pub async fn bootstrap(config: &Config) -> Result<Summary> {
    let downloader = Downloader::new(&config.download_options())?;

    let index = repo::fetch_indices(
        &downloader,
        &config.mirror,
        &config.arch,
        &config.suites,
        &config.components,
    )
    .await?;
    let (table, aliases) = parse_index(&index)?;
    if aliases.is_empty() {
        info!("Loaded {} packages", table.len());
    } else {
        info!(
            "Loaded {} packages and {} virtual packages",
            table.len(),
            aliases.len()
        );
    }

    info!("Resolving dependencies...");
    let solver = Solver::new(&table, &aliases);
    let resolved = solver.resolve(&config.packages)?;
    info!("{} packages to install", resolved.len());

    // Downloaded debs and intermediate files live here
    let tempdir;
    let scratch: PathBuf = match &config.cache_dir {
        Some(dir) => dir.clone(),
        None => {
            tempdir = tempfile::tempdir().context("Failed to create temporary directory")?;
            tempdir.path().to_owned()
        }
    };

    info!("Downloading packages...");
    let debs =
        download::fetch_debs(&downloader, &resolved, &table, &config.mirror, &scratch).await?;

    let tool: Box<dyn ArchiveTool> = match &config.ar {
        Some(program) => Box::new(ArCommand::new(program)),
        None => Box::new(ArLibrary),
    };

    info!("Unpacking packages into {}...", config.rootfs.display());
    let mut extracted = 0;
    for name in extraction_order(&resolved) {
        let deb = match debs.get(name) {
            Some(deb) => deb,
            None => {
                warn!("{} was not downloaded, skipping", name);
                continue;
            }
        };
        deb::unpack_deb(&*tool, deb, &scratch, &config.rootfs)
            .context(format!("Failed to unpack {}", name))?;
        extracted += 1;
    }

    rootfs::link_lib(&config.rootfs).context("Failed to set up /lib")?;

    Ok(Summary {
        resolved: resolved.len(),
        downloaded: debs.len(),
        extracted,
        skipped: resolved.len() - extracted,
    })
}
