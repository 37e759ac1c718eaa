use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256, Sha512};
use std::{fmt::Display, fs::File, io, path::Path};

/// Digest of a deb as advertised by the package index
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Checksum {
    Sha256(Vec<u8>),
    Sha512(Vec<u8>),
}

/// Incremental hasher fed chunk by chunk while downloading
pub enum ChecksumValidator {
    Sha256((Vec<u8>, Sha256)),
    Sha512((Vec<u8>, Sha512)),
}

impl ChecksumValidator {
    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        match self {
            ChecksumValidator::Sha256((_, v)) => v.update(data),
            ChecksumValidator::Sha512((_, v)) => v.update(data),
        }
    }

    /// false on mismatch
    pub fn finish(self) -> bool {
        match self {
            ChecksumValidator::Sha256((c, v)) => c == v.finalize().to_vec(),
            ChecksumValidator::Sha512((c, v)) => c == v.finalize().to_vec(),
        }
    }
}

impl Checksum {
    pub fn from_sha256_str(s: &str) -> Result<Self> {
        if s.len() != 64 {
            bail!("Malformed Sha256 string: bad length")
        }
        Ok(Checksum::Sha256(hex::decode(s)?))
    }

    pub fn from_sha512_str(s: &str) -> Result<Self> {
        if s.len() != 128 {
            bail!("Malformed Sha512 string: bad length")
        }
        Ok(Checksum::Sha512(hex::decode(s)?))
    }

    pub fn get_validator(&self) -> ChecksumValidator {
        match self {
            Checksum::Sha256(c) => ChecksumValidator::Sha256((c.clone(), Sha256::new())),
            Checksum::Sha512(c) => ChecksumValidator::Sha512((c.clone(), Sha512::new())),
        }
    }

    pub fn cmp_file(&self, path: &Path) -> Result<bool> {
        let mut file = File::open(path).context(format!(
            "Failed to open {} for checking checksum",
            path.display()
        ))?;
        let hash = match self {
            Checksum::Sha256(_) => {
                let mut hasher = Sha256::new();
                io::copy(&mut file, &mut hasher)?;
                hasher.finalize().to_vec()
            }
            Checksum::Sha512(_) => {
                let mut hasher = Sha512::new();
                io::copy(&mut file, &mut hasher)?;
                hasher.finalize().to_vec()
            }
        };
        Ok(match self {
            Checksum::Sha256(c) | Checksum::Sha512(c) => c == &hash,
        })
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Checksum::Sha256(hex) => {
                f.write_str("sha256::")?;
                f.write_str(&hex::encode(hex))
            }
            Checksum::Sha512(hex) => {
                f.write_str("sha512::")?;
                f.write_str(&hex::encode(hex))
            }
        }
    }
}
