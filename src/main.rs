mod cli;
mod config;
mod error;
mod executor;
mod repo;
mod solver;
mod types;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, Opts};
use lazy_static::lazy_static;

// Initialize writer
lazy_static! {
    static ref WRITER: cli::Writer = cli::Writer::new();
}

/// Exit codes:
/// 0 => rootfs built, possibly with some packages skipped
/// 1 => program screwed up
#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = try_main().await {
        error!("{}", err.to_string());
        err.chain().skip(1).for_each(|cause| {
            due_to!("{}", cause);
        });
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let opts = Opts::parse();
    WRITER.set_verbose(opts.verbose);

    let config = Config::from_opts(opts)?;
    config.check_sanity().context("Invalid configuration")?;
    debug!("Using mirror {} for {}", config.mirror, config.arch);

    let summary = executor::bootstrap(&config).await?;
    if summary.skipped == 0 {
        success!(
            "Bootstrapped {} packages into {}",
            summary.extracted,
            config.rootfs.display()
        );
    } else {
        warn!(
            "{} of {} packages could not be installed",
            summary.skipped, summary.resolved
        );
        success!(
            "Bootstrapped {} packages ({} downloaded) into {}",
            summary.extracted,
            summary.downloaded,
            config.rootfs.display()
        );
    }

    Ok(())
}
