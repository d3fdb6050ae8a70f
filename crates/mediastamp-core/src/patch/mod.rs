//! Writing capture dates into media files.
//!
//! Both patchers share the same contract: they never return an error.
//! Anything that goes wrong for one file is reported, turned into
//! [`PatchOutcome::Failed`], and leaves the original file as it was.

pub mod image;
pub mod jpeg;
pub mod video;

pub use image::patch_image;
pub use video::{patch_video, FfmpegRemuxer, Remuxer};

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// What happened to one matched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// A capture date was already present; nothing written
    Exists,
    Updated,
    /// Reason the file could not be patched
    Failed(String),
}

/// Directory used for sibling temporary files.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Replace `path` with `data` via a temporary file in the same directory and a rename.
///
/// The original permissions are kept. If anything fails before the rename,
/// the temporary file is removed and `path` is untouched.
pub(crate) fn replace_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let permissions = fs::metadata(path)?.permissions();
    let mut tmp = tempfile::Builder::new()
        .prefix(".mediastamp-")
        .tempfile_in(parent_dir(path))?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
