mod ord;
mod parse;

use std::cmp::Ordering;

/// A Debian version split into `[epoch:]upstream[-revision]`.
///
/// Built on demand for each comparison, ordering compares the epoch, then
/// the upstream and revision parts run by run.
#[derive(Clone, Debug)]
pub struct DebVersion {
    pub epoch: u64,
    pub upstream: String,
    pub revision: String,
}

/// Compare two raw version strings
pub fn compare(a: &str, b: &str) -> anyhow::Result<Ordering> {
    let a = DebVersion::try_from(a)?;
    let b = DebVersion::try_from(b)?;
    Ok(a.cmp(&b))
}
