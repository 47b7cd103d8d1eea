//! Filesystem helpers: change detection between a proto directory and its
//! published copy, and relocation of generated output into a working copy.

pub mod compare;
pub mod relocate;

pub use compare::{directories_equal, file_digest, files_equal};
pub use relocate::{copy_all_source_files, copy_file, move_generated_files};
