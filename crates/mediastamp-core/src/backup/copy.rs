use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use filetime::FileTime;
use walkdir::WalkDir;

use super::TreeCopier;
use crate::cancel::{self, CancellationToken};
use crate::error::{Error, Result};
use crate::report::Reporter;
use crate::tool::{self, ToolConfig};

/// Streamed file-by-file copy with progress, used on Unix hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualCopier;

impl TreeCopier for ManualCopier {
    fn name(&self) -> &'static str {
        "manual copy"
    }

    fn copy_tree(
        &self,
        source: &Path,
        dest: &Path,
        reporter: &dyn Reporter,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let total = WalkDir::new(source)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count() as u64;

        fs::create_dir_all(dest)?;
        let mut copied = 0u64;

        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
            let target = dest.join(rel);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target)?;
            } else if file_type.is_file() {
                cancel::checkpoint(cancel)?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                copy_file_preserving(entry.path(), &target)?;
                copied += 1;
                reporter.progress("backup", copied, total);
            } else {
                tracing::warn!(path = %entry.path().display(), "skipping non-regular file in backup");
            }
        }

        // Directory mtimes change while their children are written; restore them last.
        for entry in WalkDir::new(source).contents_first(true) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
                copy_times(&entry.metadata()?, &dest.join(rel));
            }
        }

        Ok(())
    }
}

/// Copy data and permissions, then carry over access and modification times.
fn copy_file_preserving(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    copy_times(&fs::metadata(src)?, dst);
    Ok(())
}

fn copy_times(meta: &fs::Metadata, dst: &Path) {
    let atime = FileTime::from_last_access_time(meta);
    let mtime = FileTime::from_last_modification_time(meta);
    if let Err(e) = filetime::set_file_times(dst, atime, mtime) {
        tracing::debug!(path = %dst.display(), error = %e, "could not copy timestamps");
    }
}

/// Bulk mirror through `robocopy /E /COPY:DAT`, used on Windows hosts.
#[derive(Debug, Clone)]
pub struct RobocopyCopier {
    pub program: PathBuf,
    pub timeout: Option<Duration>,
}

impl RobocopyCopier {
    pub fn from_config(tools: &ToolConfig) -> Self {
        Self {
            program: tools.robocopy.clone(),
            timeout: tools.timeout(),
        }
    }
}

/// robocopy exit codes are bit flags: 0 = nothing to copy, 1 = files copied,
/// 2 and above signal extra files, mismatches or failures.
pub fn robocopy_succeeded(code: Option<i32>) -> bool {
    matches!(code, Some(0) | Some(1))
}

impl TreeCopier for RobocopyCopier {
    fn name(&self) -> &'static str {
        "robocopy"
    }

    fn copy_tree(
        &self,
        source: &Path,
        dest: &Path,
        _reporter: &dyn Reporter,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        cancel::checkpoint(cancel)?;
        let mut command = Command::new(&self.program);
        command.arg(source).arg(dest).arg("/E").arg("/COPY:DAT");

        let output = tool::run(command, self.timeout)?;
        if robocopy_succeeded(output.code) {
            Ok(())
        } else {
            Err(Error::ToolFailed {
                tool: "robocopy".to_string(),
                code: output.code,
                stderr: if output.stderr.trim().is_empty() {
                    output.stdout.trim().to_string()
                } else {
                    output.stderr.trim().to_string()
                },
            })
        }
    }
}

/// The copy strategy for the host platform.
pub fn platform_copier(tools: &ToolConfig) -> Result<Box<dyn TreeCopier>> {
    if cfg!(windows) {
        Ok(Box::new(RobocopyCopier::from_config(tools)))
    } else if cfg!(unix) {
        Ok(Box::new(ManualCopier))
    } else {
        Err(Error::UnsupportedPlatform)
    }
}
