//! Full-directory backup taken before any file is touched, and its verification.
//!
//! The backup lands next to the source as `<source>_backup`, or
//! `<source>_backup(N)` for the smallest free `N`, so an earlier backup is
//! never overwritten. Copying and verifying are separate steps: the session
//! copies, then verifies, and a failed verification is reported without
//! undoing the copy.

mod copy;

pub use copy::*;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::cancel::{self, CancellationToken};
use crate::checksum;
use crate::error::{Error, Result};
use crate::report::Reporter;

pub const BACKUP_SUFFIX: &str = "_backup";

/// Copies a whole directory tree, preserving structure, data and timestamps.
pub trait TreeCopier {
    fn name(&self) -> &'static str;

    /// `dest` does not exist yet when this is called.
    fn copy_tree(
        &self,
        source: &Path,
        dest: &Path,
        reporter: &dyn Reporter,
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;
}

/// Pick the first free `<source>_backup`, `<source>_backup(1)`, ... sibling.
pub fn backup_destination(source: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| Error::InvalidDirectory(source.to_path_buf()))?;
    let parent = source.parent().unwrap_or_else(|| Path::new(""));

    let mut base = OsString::from(name);
    base.push(BACKUP_SUFFIX);

    let mut candidate = parent.join(&base);
    let mut counter = 1u32;
    while candidate.exists() {
        let mut numbered = base.clone();
        numbered.push(format!("({counter})"));
        candidate = parent.join(numbered);
        counter += 1;
    }
    Ok(candidate)
}

/// Copy `source` to a fresh sibling directory and return its path.
///
/// Does not verify; call [`verify_backup`] afterwards.
pub fn backup_directory(
    source: &Path,
    copier: &dyn TreeCopier,
    reporter: &dyn Reporter,
    cancel: Option<&CancellationToken>,
) -> Result<PathBuf> {
    if !source.is_dir() {
        return Err(Error::InvalidDirectory(source.to_path_buf()));
    }
    let dest = backup_destination(source)?;
    reporter.info(&format!(
        "Creating backup of '{}' at '{}' ({})",
        source.display(),
        dest.display(),
        copier.name()
    ));
    copier.copy_tree(source, &dest, reporter, cancel)?;
    Ok(dest)
}

/// Outcome of comparing every source file with its backup copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Source files compared
    pub checked: u64,
    /// Relative paths with no counterpart in the backup
    pub missing: Vec<PathBuf>,
    /// Relative paths whose size or content differ (or could not be read)
    pub mismatched: Vec<PathBuf>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

/// Compare every regular file under `source` with the same relative path under `backup`.
///
/// Every problem is reported through `reporter.error` as it is found; the
/// walk itself only fails on cancellation or an unreadable source tree.
pub fn verify_backup(
    source: &Path,
    backup: &Path,
    reporter: &dyn Reporter,
    cancel: Option<&CancellationToken>,
) -> Result<VerifyReport> {
    let files = regular_files(source)?;
    let total = files.len() as u64;
    let mut report = VerifyReport::default();

    for (i, src) in files.iter().enumerate() {
        cancel::checkpoint(cancel)?;
        let rel = src.strip_prefix(source).unwrap_or(src).to_path_buf();
        let dst = backup.join(&rel);
        report.checked += 1;

        if !dst.is_file() {
            reporter.error(&format!("File missing in backup: {}", dst.display()));
            report.missing.push(rel);
        } else {
            match checksum::files_identical(src, &dst) {
                Ok(true) => {}
                Ok(false) => {
                    reporter.error(&format!("File mismatch in backup: {}", dst.display()));
                    report.mismatched.push(rel);
                }
                Err(e) => {
                    reporter.error(&format!("Could not compare {}: {}", dst.display(), e));
                    report.mismatched.push(rel);
                }
            }
        }
        reporter.progress("verify", i as u64 + 1, total);
    }

    Ok(report)
}

/// All regular files below `root`, in a stable order.
pub(crate) fn regular_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
