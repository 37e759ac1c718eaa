use crate::{
    debug,
    error::BootstrapError,
    types::{AliasTable, PackageTable},
};

use anyhow::Result;
use std::collections::{HashSet, VecDeque};

/// Minimum Jaro-Winkler similarity for a "did you mean" hint
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Expands requested package names into their dependency closure
pub struct Solver<'a> {
    table: &'a PackageTable,
    aliases: &'a AliasTable,
}

impl<'a> Solver<'a> {
    pub fn new(table: &'a PackageTable, aliases: &'a AliasTable) -> Self {
        Solver { table, aliases }
    }

    /// Breadth-first closure over `Depends`, in first-resolved order.
    ///
    /// Requested names may be virtual. Dependencies are only followed when
    /// they name a real package, and only the first alternative counts.
    pub fn resolve(&self, requested: &[String]) -> Result<Vec<String>> {
        let mut res = Vec::new();
        let mut resolved: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = requested.iter().map(|s| s.as_str()).collect();
        // Everything that has ever been queued
        let mut seen: HashSet<&str> = queue.iter().copied().collect();

        while let Some(name) = queue.pop_front() {
            let pkgname = self.concrete_name(name)?;
            if resolved.contains(pkgname) {
                continue;
            }
            if pkgname != name {
                debug!("{} is provided by {}", name, pkgname);
            }
            resolved.insert(pkgname);
            res.push(pkgname.to_string());

            let depends = self.table[pkgname].depends.as_deref().unwrap_or_default();
            for dep in dependency_names(depends) {
                if self.table.contains_key(dep)
                    && !resolved.contains(dep)
                    && !seen.contains(dep)
                {
                    seen.insert(dep);
                    queue.push_back(dep);
                }
            }
        }

        Ok(res)
    }

    /// Itself if it is a real package, otherwise its first provider
    fn concrete_name<'n>(&self, name: &'n str) -> Result<&'n str, BootstrapError>
    where
        'a: 'n,
    {
        if let Some((pkgname, _)) = self.table.get_key_value(name) {
            return Ok(pkgname.as_str());
        }
        match self.aliases.first_provider(name) {
            Some(provider) if self.table.contains_key(provider) => Ok(provider),
            _ => Err(BootstrapError::PackageNotFound {
                name: name.to_string(),
                suggestion: self.suggest(name),
            }),
        }
    }

    fn suggest(&self, name: &str) -> Option<String> {
        self.table
            .keys()
            .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, candidate)| candidate.to_string())
    }
}

/// Bare package names of a `Depends` field: version constraints and
/// alternatives after the first are dropped.
pub fn dependency_names(depends: &str) -> impl Iterator<Item = &str> {
    depends
        .split(", ")
        .filter_map(|entry| entry.split(' ').next())
        .filter(|name| !name.is_empty())
}

/// Packages are unpacked last-resolved first, so requested packages win on
/// conflicting paths.
pub fn extraction_order(resolved: &[String]) -> impl Iterator<Item = &String> {
    resolved.iter().rev()
}
