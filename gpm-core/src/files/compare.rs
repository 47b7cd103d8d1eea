//! Content comparison between a proto source directory and the last published copy.
//!
//! Only files directly inside the new directory whose name ends with the given
//! extension are compared. Files that exist only in the old directory are not
//! detected, so a deleted proto alone does not trigger a regeneration.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{GpmError, Result};

/// Hex encoded SHA-256 of the full content of `path`.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| GpmError::io("unable to open file", path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| GpmError::io("unable to read file", path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compares two files by digest. A missing `old_path` is a new file and never equal.
pub fn files_equal(new_path: &Path, old_path: &Path) -> Result<bool> {
    if !old_path.exists() {
        debug!(new = %new_path.display(), old = %old_path.display(), "no previous file");
        return Ok(false);
    }
    let new_digest = file_digest(new_path)?;
    let old_digest = file_digest(old_path)?;
    debug!(new = %new_digest, old = %old_digest, "SHA-256");
    Ok(new_digest == old_digest)
}

/// Returns true when every `extension` file of `new_dir` has an identical
/// counterpart in `old_dir`. No matching files at all counts as equal.
pub fn directories_equal(extension: &str, new_dir: &Path, old_dir: &Path) -> Result<bool> {
    debug!(
        extension,
        new_dir = %new_dir.display(),
        old_dir = %old_dir.display(),
        "comparing files"
    );
    let entries =
        std::fs::read_dir(new_dir).map_err(|e| GpmError::io("unable to list directory", new_dir, e))?;

    let mut all_equal = true;
    for entry in entries {
        let entry = entry.map_err(|e| GpmError::io("unable to list directory", new_dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| GpmError::io("unable to stat entry", entry.path(), e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if file_type.is_dir() || !name.ends_with(extension) {
            continue;
        }

        let new_file = new_dir.join(name);
        let old_file = old_dir.join(name);
        let equal = files_equal(&new_file, &old_file)?;
        debug!(
            new_file = %new_file.display(),
            old_file = %old_file.display(),
            equal,
            "file comparison"
        );
        all_equal = all_equal && equal;
    }
    Ok(all_equal)
}
