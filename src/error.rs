use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("Malformed package version: {0:?}")]
    InvalidVersionFormat(String),
    #[error("Package {name} not found{}", hint(.suggestion))]
    PackageNotFound {
        name: String,
        suggestion: Option<String>,
    },
    #[error("Failed to fetch package index {url}: {reason}")]
    IndexFetchFailure { url: String, reason: String },
    #[error("Failed to fetch {url} after {attempts} attempt(s): {reason}")]
    ArtifactFetchFailure {
        url: String,
        attempts: usize,
        reason: String,
    },
    #[error("No data.tar member in {}", .0.display())]
    MissingDataMember(PathBuf),
    #[error("Unsupported data member compression: {0}")]
    UnsupportedCompression(String),
}

fn hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean {s}?)"),
        None => String::new(),
    }
}
