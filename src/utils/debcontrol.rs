//! Package index parsing
use crate::{
    debug,
    types::{version, AliasTable, Checksum, DebVersion, PackageRecord, PackageTable},
    warn,
};

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::{cmp::Ordering, collections::HashMap};

const INTERESTED_FIELDS: &[&str] = &[
    "Package", "Version", "Filename", "Depends", "Provides", "Size", "SHA256", "SHA512",
];

/// Build the package table and the `Provides` alias table from one or more
/// concatenated index documents.
///
/// Only the highest version of each package is kept. Aliases are recorded
/// from the winning record only.
pub fn parse_index(text: &str) -> Result<(PackageTable, AliasTable)> {
    let mut table = PackageTable::new();
    let mut aliases = AliasTable::new();

    for block in paragraphs(text) {
        // A malformed entry only costs that entry
        let parsed = match debcontrol::parse_str(&block) {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping malformed package index entry: {}", e);
                continue;
            }
        };
        for paragraph in parsed {
            let mut fields: HashMap<&str, String> = HashMap::new();
            for field in paragraph.fields {
                if INTERESTED_FIELDS.contains(&field.name) {
                    fields.insert(field.name, field.value.trim().to_string());
                }
            }
            insert_record(&mut table, &mut aliases, fields)?;
        }
    }

    Ok((table, aliases))
}

fn insert_record(
    table: &mut PackageTable,
    aliases: &mut AliasTable,
    mut fields: HashMap<&str, String>,
) -> Result<()> {
    let name = match fields.remove("Package") {
        Some(name) => name,
        None => return Ok(()),
    };
    let version = match fields.remove("Version") {
        Some(version) => version,
        None => {
            debug!("Skipping {} without Version", name);
            return Ok(());
        }
    };

    let wins = match table.get(&name) {
        Some(old) => version::compare(&version, &old.version)? == Ordering::Greater,
        None => {
            DebVersion::try_from(version.as_str())?;
            true
        }
    };
    if !wins {
        return Ok(());
    }

    if let Some(provides) = fields.get("Provides") {
        for alias in parse_provides(provides) {
            aliases.add(alias, &name);
        }
    }
    table.insert(name, fields_to_record(version, fields));
    Ok(())
}

#[inline]
fn fields_to_record(version: String, mut f: HashMap<&str, String>) -> PackageRecord {
    let checksum = if let Some(hex) = f.get("SHA256") {
        Checksum::from_sha256_str(hex).ok()
    } else if let Some(hex) = f.get("SHA512") {
        Checksum::from_sha512_str(hex).ok()
    } else {
        None
    };

    PackageRecord {
        version,
        filename: f.remove("Filename"),
        depends: f.remove("Depends"),
        size: f.get("Size").and_then(|s| s.parse().ok()),
        checksum,
    }
}

/// Virtual package names in a `Provides` field, with `(= version)` dropped
fn parse_provides(s: &str) -> Vec<&str> {
    lazy_static! {
        static ref VERSIONED: Regex = Regex::new(r"^(?P<name>.*?)\s*\(=[^)]*\)$").unwrap();
    }

    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match VERSIONED.captures(p).and_then(|c| c.name("name")) {
            Some(name) => name.as_str(),
            None => p,
        })
        .collect()
}

/// Split into paragraphs on runs of blank lines, each ending with a newline
fn paragraphs(text: &str) -> Vec<String> {
    let mut res = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                res.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        res.push(current);
    }
    res
}
