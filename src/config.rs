use crate::{repo::DEFAULT_COMPONENTS, utils::downloader::DownloadOptions};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[clap(about, version, author)]
pub struct Opts {
    /// Packages to install into the new root
    pub packages: Vec<String>,
    #[clap(short, long, help = "Read settings from this TOML file")]
    pub config: Option<PathBuf>,
    #[clap(long, help = "Base URL of the Debian/Ubuntu mirror")]
    pub mirror: Option<String>,
    #[clap(long, help = "Target architecture, e.g. amd64")]
    pub arch: Option<String>,
    #[clap(long = "suite", help = "Suite to fetch indices from, repeatable")]
    pub suites: Vec<String>,
    #[clap(long = "component", help = "Archive component, can be repeated")]
    pub components: Vec<String>,
    #[clap(long, help = "Directory to build the root filesystem in")]
    pub rootfs: Option<PathBuf>,
    #[clap(long, help = "Use this external ar program to read debs")]
    pub ar: Option<PathBuf>,
    #[clap(long, help = "Keep downloaded debs in this directory")]
    pub cache_dir: Option<PathBuf>,
    #[clap(short, long, help = "Print additional debug information")]
    pub verbose: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub mirror: String,
    pub arch: String,
    pub suites: Vec<String>,
    pub components: Vec<String>,
    pub rootfs: PathBuf,
    pub ar: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub packages: Vec<String>,
    pub max_attempts: usize,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mirror: String::new(),
            arch: String::new(),
            suites: Vec::new(),
            components: DEFAULT_COMPONENTS.iter().map(|c| c.to_string()).collect(),
            rootfs: PathBuf::new(),
            ar: None,
            cache_dir: None,
            packages: Vec::new(),
            max_attempts: 3,
            retry_delay_secs: 2,
            timeout_secs: 60,
            max_concurrent: 16,
        }
    }
}

impl Config {
    /// Load the config file named in `opts` (if any), then apply command line overrides
    pub fn from_opts(opts: Opts) -> Result<Self> {
        let mut config = match &opts.config {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .context(format!("Failed to read config file {}", path.display()))?;
                Config::from_toml(&data)
                    .context(format!("Failed to parse config file {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(mirror) = opts.mirror {
            config.mirror = mirror;
        }
        if let Some(arch) = opts.arch {
            config.arch = arch;
        }
        if !opts.suites.is_empty() {
            config.suites = opts.suites;
        }
        if !opts.components.is_empty() {
            config.components = opts.components;
        }
        if let Some(rootfs) = opts.rootfs {
            config.rootfs = rootfs;
        }
        if opts.ar.is_some() {
            config.ar = opts.ar;
        }
        if opts.cache_dir.is_some() {
            config.cache_dir = opts.cache_dir;
        }
        if !opts.packages.is_empty() {
            config.packages = opts.packages;
        }

        while config.mirror.ends_with('/') {
            config.mirror.pop();
        }
        Ok(config)
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let config: Config = toml::from_str(data)?;
        Ok(config)
    }

    pub fn check_sanity(&self) -> Result<()> {
        if self.mirror.is_empty() {
            bail!("No mirror specified");
        }
        if self.arch.is_empty() {
            bail!("No architecture specified");
        }
        if self.rootfs.as_os_str().is_empty() {
            bail!("No rootfs directory specified");
        }
        if self.suites.is_empty() {
            bail!("At least one suite is required");
        }
        if self.components.is_empty() {
            bail!("At least one component is required");
        }
        if self.packages.is_empty() {
            bail!("Nothing to install, no package specified");
        }
        if self.max_attempts < 1 {
            bail!("max_attempts must be at least 1");
        }
        if self.max_concurrent < 1 {
            bail!("max_concurrent must be at least 1");
        }
        Ok(())
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            max_concurrent: self.max_concurrent,
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}
