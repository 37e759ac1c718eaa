use crate::debug;

use anyhow::{Context, Result};
use std::{fs, os::unix::fs::symlink, path::Path};

/// Where `/lib` points to, relative so it resolves both inside and outside a chroot
pub const LIB_TARGET: &str = "usr/lib";

/// Make `<root>/lib` a symlink to `usr/lib`, moving a real `/lib` directory's
/// contents into `/usr/lib` first.
pub fn link_lib(root: &Path) -> Result<()> {
    let lib = root.join("lib");
    let usr_lib = root.join(LIB_TARGET);

    match fs::symlink_metadata(&lib) {
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::remove_file(&lib).context("Failed to remove old /lib symlink")?;
        }
        Ok(meta) if meta.is_dir() => {
            debug!("Merging /lib into /{}", LIB_TARGET);
            fs::create_dir_all(&usr_lib)
                .context(format!("Failed to create {}", usr_lib.display()))?;
            merge_dir(&lib, &usr_lib).context("Failed to merge /lib into /usr/lib")?;
            fs::remove_dir_all(&lib).context("Failed to remove /lib")?;
        }
        Ok(_) => {
            fs::remove_file(&lib).context("Failed to remove /lib")?;
        }
        Err(_) => (),
    }

    symlink(LIB_TARGET, &lib).context("Failed to create /lib symlink")?;
    Ok(())
}

/// Move everything under `src` into `dst`. Directories are merged, anything
/// else replaces what is in the way.
fn merge_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let existing = fs::symlink_metadata(&to).ok();

        if entry.file_type()?.is_dir() {
            match existing {
                Some(meta) if meta.is_dir() => {
                    merge_dir(&from, &to)?;
                    continue;
                }
                Some(_) => fs::remove_file(&to)?,
                None => (),
            }
            fs::rename(&from, &to)
                .context(format!("Failed to move {} to {}", from.display(), to.display()))?;
        } else {
            match existing {
                Some(meta) if meta.is_dir() => fs::remove_dir_all(&to)?,
                Some(_) => fs::remove_file(&to)?,
                None => (),
            }
            fs::rename(&from, &to)
                .context(format!("Failed to move {} to {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}
