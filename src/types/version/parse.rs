use super::DebVersion;
use crate::error::BootstrapError;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VERSION: Regex =
        Regex::new("^(?:(?P<epoch>[0-9]+):)?(?P<upstream>[^-]+)(?:-(?P<revision>.+))?$").unwrap();
}

impl TryFrom<&str> for DebVersion {
    type Error = BootstrapError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let malformed = || BootstrapError::InvalidVersionFormat(s.to_string());
        let captures = VERSION.captures(s).ok_or_else(malformed)?;
        let epoch = match captures.name("epoch") {
            Some(epoch) => epoch.as_str().parse().map_err(|_| malformed())?,
            None => 0,
        };
        let upstream = captures
            .name("upstream")
            .ok_or_else(malformed)?
            .as_str()
            .to_string();
        let revision = captures
            .name("revision")
            .map(|r| r.as_str().to_string())
            .unwrap_or_default();

        Ok(DebVersion {
            epoch,
            upstream,
            revision,
        })
    }
}
