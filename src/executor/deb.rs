//! Unpack the payload of a deb into the target root
use crate::{debug, error::BootstrapError};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tar::Archive;
use xz2::read::XzDecoder;

/// Something that can read the members of an `ar` archive
pub trait ArchiveTool {
    /// Member names, in archive order
    fn list_members(&self, archive: &Path) -> Result<Vec<String>>;
    /// Write the raw bytes of `member` to `dest`
    fn extract_member(&self, archive: &Path, member: &str, dest: &Path) -> Result<()>;
}

/// Reads archives in-process with the `ar` crate
pub struct ArLibrary;

impl ArchiveTool for ArLibrary {
    fn list_members(&self, archive: &Path) -> Result<Vec<String>> {
        let mut archive = open_ar(archive)?;
        let mut res = Vec::new();
        while let Some(entry) = archive.next_entry() {
            let entry = entry?;
            res.push(member_name(entry.header().identifier())?);
        }
        Ok(res)
    }

    fn extract_member(&self, archive: &Path, member: &str, dest: &Path) -> Result<()> {
        let mut ar = open_ar(archive)?;
        while let Some(entry) = ar.next_entry() {
            let mut entry = entry?;
            if member_name(entry.header().identifier())? == member {
                let mut f = File::create(dest)
                    .context(format!("Failed to create {}", dest.display()))?;
                io::copy(&mut entry, &mut f)?;
                return Ok(());
            }
        }
        bail!("{} has no member {}", archive.display(), member)
    }
}

/// Shells out to an `ar`-compatible executable
pub struct ArCommand {
    program: PathBuf,
}

impl ArCommand {
    pub fn new(program: &Path) -> Self {
        ArCommand {
            program: program.to_owned(),
        }
    }
}

impl ArchiveTool for ArCommand {
    fn list_members(&self, archive: &Path) -> Result<Vec<String>> {
        let output = Command::new(&self.program)
            .arg("t")
            .arg(archive)
            .stderr(Stdio::inherit())
            .output()
            .context(format!("Failed to execute {}", self.program.display()))?;
        check_status(&self.program, output.status)?;
        let stdout = String::from_utf8(output.stdout)?;
        Ok(stdout
            .lines()
            .map(|l| l.trim_end_matches('/').to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn extract_member(&self, archive: &Path, member: &str, dest: &Path) -> Result<()> {
        let f = File::create(dest)
            .context(format!("Failed to create {}", dest.display()))?;
        let status = Command::new(&self.program)
            .arg("p")
            .arg(archive)
            .arg(member)
            .stdout(Stdio::from(f))
            .status()
            .context(format!("Failed to execute {}", self.program.display()))?;
        check_status(&self.program, status)
    }
}

fn check_status(program: &Path, status: std::process::ExitStatus) -> Result<()> {
    if !status.success() {
        match status.code() {
            Some(code) => bail!(
                "{} exited with non-zero return code: {}.",
                program.display(),
                code
            ),
            None => bail!("{} was terminated by signal.", program.display()),
        }
    }
    Ok(())
}

fn open_ar(path: &Path) -> Result<ar::Archive<File>> {
    let f = File::open(path)
        .context(format!("Failed to open deb file at {}", path.display()))?;
    Ok(ar::Archive::new(f))
}

fn member_name(identifier: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(identifier)?
        .trim_end_matches('/')
        .to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataCompression {
    Xz,
    Gzip,
    Zstd,
}

impl DataCompression {
    /// Pick the codec from the member's extension
    pub fn from_member(member: &str) -> Result<Self, BootstrapError> {
        match Path::new(member).extension().and_then(|e| e.to_str()) {
            Some("xz") => Ok(DataCompression::Xz),
            Some("gz") => Ok(DataCompression::Gzip),
            Some("zst") => Ok(DataCompression::Zstd),
            _ => Err(BootstrapError::UnsupportedCompression(member.to_string())),
        }
    }
}

/// Unpack the `data.tar.*` member of `deb` into `root`, overwriting whatever
/// is already there. `scratch` holds the intermediate files.
pub fn unpack_deb(
    tool: &dyn ArchiveTool,
    deb: &Path,
    scratch: &Path,
    root: &Path,
) -> Result<()> {
    let members = tool.list_members(deb)?;
    let member = members
        .iter()
        .find(|m| m.starts_with("data.tar"))
        .ok_or_else(|| BootstrapError::MissingDataMember(deb.to_owned()))?;
    let compression = DataCompression::from_member(member)?;
    debug!("Unpacking {} from {}", member, deb.display());

    let stem = deb
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let raw = scratch.join(format!("{}.{}", stem, member));
    tool.extract_member(deb, member, &raw)?;

    fs::create_dir_all(root).context(format!("Failed to create {}", root.display()))?;
    let res = match compression {
        DataCompression::Xz => unpack_tar(XzDecoder::new(File::open(&raw)?), root),
        DataCompression::Gzip => unpack_tar(GzDecoder::new(File::open(&raw)?), root),
        DataCompression::Zstd => {
            // Decompress to a plain tar first
            let plain = scratch.join(format!("{}.data.tar", stem));
            let res = zstd::stream::copy_decode(File::open(&raw)?, File::create(&plain)?)
                .context(format!("Failed to decompress {}", member))
                .and_then(|_| unpack_tar(File::open(&plain)?, root));
            fs::remove_file(&plain)?;
            res
        }
    };
    fs::remove_file(&raw)?;
    res.context(format!("Failed to unpack {}", deb.display()))
}

fn unpack_tar<R: Read>(reader: R, root: &Path) -> Result<()> {
    let mut tar = Archive::new(reader);
    tar.set_overwrite(true);
    tar.set_preserve_permissions(true);
    tar.unpack(root)?;
    Ok(())
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::io::Write;

    /// Paths (dirs end with `/`) and file contents of a data.tar
    pub const CONTENT: &[(&str, &[u8])] = &[
        ("./usr/", b""),
        ("./usr/bin/", b""),
        ("./usr/bin/hello", b"#!/bin/sh\necho hello\n"),
        ("./usr/share/", b""),
        ("./usr/share/doc/", b""),
        ("./usr/share/doc/hello/copyright", b"public domain\n"),
    ];

    pub fn build_tar(content: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in content {
            let mut header = tar::Header::new_gnu();
            if path.ends_with('/') {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, path, io::empty()).unwrap();
            } else {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o755);
                header.set_size(data.len() as u64);
                builder.append_data(&mut header, path, *data).unwrap();
            }
        }
        builder.into_inner().unwrap()
    }

    pub fn compress(member: &str, data: &[u8]) -> Vec<u8> {
        match Path::new(member).extension().and_then(|e| e.to_str()) {
            Some("gz") => {
                let level = flate2::Compression::default();
                let mut e = flate2::write::GzEncoder::new(Vec::new(), level);
                e.write_all(data).unwrap();
                e.finish().unwrap()
            }
            Some("xz") => {
                let mut e = xz2::write::XzEncoder::new(Vec::new(), 6);
                e.write_all(data).unwrap();
                e.finish().unwrap()
            }
            Some("zst") => zstd::stream::encode_all(data, 3).unwrap(),
            _ => data.to_vec(),
        }
    }

    /// A deb with the usual three members, the payload stored as `data_member`
    pub fn build_deb(data_member: &str, content: &[(&str, &[u8])]) -> Vec<u8> {
        pack_deb(data_member, &build_tar(content))
    }

    fn pack_deb(data_member: &str, tar: &[u8]) -> Vec<u8> {
        let control_tar = build_tar(&[("./control", b"Package: hello\n")]);
        let control = compress("control.tar.gz", &control_tar);
        let data = compress(data_member, tar);
        let mut builder = ar::Builder::new(Vec::new());
        for (name, bytes) in [
            ("debian-binary", b"2.0\n".to_vec()),
            ("control.tar.gz", control),
            (data_member, data),
        ] {
            let header = ar::Header::new(name.as_bytes().to_vec(), bytes.len() as u64);
            builder.append(&header, bytes.as_slice()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_deb(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    /// Relative path -> contents (None for directories) of everything under `root`
    pub fn snapshot(root: &Path) -> Vec<(String, Option<Vec<u8>>)> {
        let mut res = Vec::new();
        let mut stack = vec![root.to_owned()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                let rel = path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned();
                if path.is_dir() {
                    stack.push(path);
                    res.push((rel, None));
                } else {
                    res.push((rel, Some(fs::read(&path).unwrap())));
                }
            }
        }
        res.sort();
        res
    }

    #[test]
    fn codecs_give_identical_trees() {
        let dir = tempfile::tempdir().unwrap();
        let mut trees = Vec::new();
        for member in ["data.tar.gz", "data.tar.xz", "data.tar.zst"] {
            let bytes = build_deb(member, CONTENT);
            let deb = write_deb(dir.path(), &format!("{member}.deb"), &bytes);
            let root = dir.path().join(format!("root-{member}"));
            let scratch = tempfile::tempdir().unwrap();
            unpack_deb(&ArLibrary, &deb, scratch.path(), &root).unwrap();
            // Scratch files are cleaned up
            assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
            trees.push(snapshot(&root));
        }
        assert_eq!(
            fs::read(dir.path().join("root-data.tar.zst/usr/bin/hello")).unwrap(),
            b"#!/bin/sh\necho hello\n"
        );
        assert_eq!(trees[0], trees[1]);
        assert_eq!(trees[0], trees[2]);
    }

    #[test]
    fn overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("usr/bin/hello"), b"old").unwrap();
        fs::write(root.join("usr/bin/other"), b"untouched").unwrap();

        let deb = write_deb(dir.path(), "hello.deb", &build_deb("data.tar.xz", CONTENT));
        unpack_deb(&ArLibrary, &deb, dir.path(), &root).unwrap();
        assert_eq!(
            fs::read(root.join("usr/bin/hello")).unwrap(),
            b"#!/bin/sh\necho hello\n"
        );
        assert_eq!(fs::read(root.join("usr/bin/other")).unwrap(), b"untouched");
    }

    /// Header with the name written as-is, skipping the builder's path checks
    fn raw_header(name: &str, kind: tar::EntryType, size: u64) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_entry_type(kind);
        header.set_mode(0o644);
        header.set_size(size);
        header
    }

    #[test]
    fn entry_paths_stay_inside_root() {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in [
            ("../escape", &b"outside"[..]),
            ("/abs/file", &b"anchored"[..]),
            ("./usr/ok", &b"ok"[..]),
        ] {
            let mut header = raw_header(name, tar::EntryType::Regular, data.len() as u64);
            header.set_cksum();
            builder.append(&header, data).unwrap();
        }
        let mut link = raw_header("./etc/alternatives/awk", tar::EntryType::Symlink, 0);
        link.as_old_mut().linkname[..12].copy_from_slice(b"../../../awk");
        link.set_cksum();
        builder.append(&link, io::empty()).unwrap();
        let tar = builder.into_inner().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let deb = write_deb(dir.path(), "paths.deb", &pack_deb("data.tar.gz", &tar));
        let root = dir.path().join("root");
        unpack_deb(&ArLibrary, &deb, dir.path(), &root).unwrap();

        // Parent references are dropped, absolute paths land under the root
        assert!(!dir.path().join("escape").exists());
        assert_eq!(fs::read(root.join("abs/file")).unwrap(), b"anchored");
        assert_eq!(fs::read(root.join("usr/ok")).unwrap(), b"ok");
        // Symlink targets are written verbatim
        assert_eq!(
            fs::read_link(root.join("etc/alternatives/awk")).unwrap(),
            Path::new("../../../awk")
        );
    }

    #[test]
    fn missing_data_member() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = ar::Builder::new(Vec::new());
        let header = ar::Header::new(b"debian-binary".to_vec(), 4);
        builder.append(&header, &b"2.0\n"[..]).unwrap();
        let deb = write_deb(dir.path(), "broken.deb", &builder.into_inner().unwrap());

        let root = dir.path().join("root");
        let err = unpack_deb(&ArLibrary, &deb, dir.path(), &root).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BootstrapError>(),
            Some(&BootstrapError::MissingDataMember(deb.clone()))
        );
    }

    #[test]
    fn unsupported_compression() {
        let dir = tempfile::tempdir().unwrap();
        let deb = write_deb(dir.path(), "bz.deb", &build_deb("data.tar.bz2", CONTENT));
        let root = dir.path().join("root");
        let err = unpack_deb(&ArLibrary, &deb, dir.path(), &root).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BootstrapError>(),
            Some(&BootstrapError::UnsupportedCompression("data.tar.bz2".to_string()))
        );
    }

    #[test]
    fn codec_from_member() {
        for (member, codec) in [
            ("data.tar.xz", DataCompression::Xz),
            ("data.tar.gz", DataCompression::Gzip),
            ("data.tar.zst", DataCompression::Zstd),
        ] {
            assert_eq!(DataCompression::from_member(member).unwrap(), codec);
        }
        assert!(DataCompression::from_member("data.tar").is_err());
    }

    #[test]
    fn library_lists_members_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let deb = write_deb(dir.path(), "hello.deb", &build_deb("data.tar.zst", CONTENT));
        assert_eq!(
            ArLibrary.list_members(&deb).unwrap(),
            ["debian-binary", "control.tar.gz", "data.tar.zst"]
        );
    }

    #[test]
    fn external_ar_tool() {
        // Only meaningful where binutils is installed
        let ar = Path::new("/usr/bin/ar");
        if !ar.is_file() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let deb = write_deb(dir.path(), "hello.deb", &build_deb("data.tar.gz", CONTENT));
        let tool = ArCommand::new(ar);
        assert_eq!(
            tool.list_members(&deb).unwrap(),
            ["debian-binary", "control.tar.gz", "data.tar.gz"]
        );
        let root = dir.path().join("root");
        unpack_deb(&tool, &deb, dir.path(), &root).unwrap();
        assert_eq!(
            fs::read(root.join("usr/share/doc/hello/copyright")).unwrap(),
            b"public domain\n"
        );
    }
}
