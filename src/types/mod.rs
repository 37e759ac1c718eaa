mod checksum;
pub mod version;

pub use checksum::Checksum;
pub use version::DebVersion;

use std::collections::HashMap;

/// The winning index entry for one package name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageRecord {
    pub version: String,
    // Path of the deb relative to the mirror root
    pub filename: Option<String>,
    pub depends: Option<String>,
    pub size: Option<u64>,
    pub checksum: Option<Checksum>,
}

pub type PackageTable = HashMap<String, PackageRecord>;

/// Virtual package name -> concrete providers, in the order they were seen
#[derive(Default, Debug, PartialEq, Eq)]
pub struct AliasTable {
    providers: HashMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        AliasTable::default()
    }

    /// Register `provider` for `alias`, ignoring repeats
    pub fn add(&mut self, alias: &str, provider: &str) {
        let providers = self.providers.entry(alias.to_string()).or_default();
        if !providers.iter().any(|p| p == provider) {
            providers.push(provider.to_string());
        }
    }

    pub fn providers(&self, alias: &str) -> &[String] {
        self.providers
            .get(alias)
            .map(|p| p.as_slice())
            .unwrap_or_default()
    }

    pub fn first_provider(&self, alias: &str) -> Option<&str> {
        self.providers(alias).first().map(|p| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
