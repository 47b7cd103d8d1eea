//! Moves generated stubs and their proto sources into a repository working copy.
//!
//! Generated layouts depend on the target language, so every file found is
//! flattened into the destination by its file name. Moving is always a copy
//! followed by a delete: the generator output usually sits on a different
//! device than the temp clone and `rename` fails with a cross-device error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{GpmError, Result};

/// Collects every regular file below `dir`, depth first.
fn visit_dir(dir: &Path, results: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| GpmError::io("unable to list directory", dir, e))?;
    for entry in entries {
        let path = entry
            .map_err(|e| GpmError::io("unable to list directory", dir, e))?
            .path();
        if path.is_dir() {
            visit_dir(&path, results)?;
        } else if path.is_file() {
            results.push(path);
        }
    }
    Ok(())
}

/// Destination of `file` once flattened into `dest_dir`.
fn flattened_target(file: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| {
        GpmError::io(
            "file has no name",
            file,
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    Ok(dest_dir.join(name))
}

pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|e| GpmError::io("unable to copy file", from, e))?;
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    copy_file(from, to)?;
    fs::remove_file(from).map_err(|e| GpmError::io("unable to remove moved file", from, e))
}

/// Copies every file under `source_dir` into `dest_dir` so the published
/// repository carries the proto definitions next to the generated code.
pub fn copy_all_source_files(source_dir: &Path, dest_dir: &Path) -> Result<()> {
    let mut to_copy = Vec::new();
    visit_dir(source_dir, &mut to_copy)?;
    for file in &to_copy {
        let target = flattened_target(file, dest_dir)?;
        debug!(from = %file.display(), to = %target.display(), "copying source file");
        copy_file(file, &target)?;
    }
    Ok(())
}

/// Moves everything the generator wrote below `generated_root` into
/// `dest_dir`, then deletes the generated tree.
pub fn move_generated_files(generated_root: &Path, dest_dir: &Path) -> Result<()> {
    debug!(
        generated_root = %generated_root.display(),
        dest_dir = %dest_dir.display(),
        "moving generated content"
    );
    let mut to_move = Vec::new();
    visit_dir(generated_root, &mut to_move)?;
    for file in &to_move {
        let target = flattened_target(file, dest_dir)?;
        debug!(from = %file.display(), to = %target.display(), "moving generated file");
        move_file(file, &target)?;
    }
    fs::remove_dir_all(generated_root)
        .map_err(|e| GpmError::io("unable to remove generated directory", generated_root, e))
}
