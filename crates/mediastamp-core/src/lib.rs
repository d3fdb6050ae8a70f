pub mod backup;
pub mod cancel;
pub mod checksum;
pub mod classify;
pub mod date;
pub mod error;
pub mod media;
pub mod patch;
pub mod report;
pub mod tool;
pub mod walk;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use backup::{platform_copier, TreeCopier, VerifyReport};
pub use cancel::CancellationToken;
pub use classify::{classify, Classification, Mode};
pub use error::{Error, Result};
pub use patch::{FfmpegRemuxer, PatchOutcome, Remuxer};
pub use report::{Reporter, RunStats, SessionReport, TracingReporter};
pub use tool::ToolConfig;

fn default_true() -> bool {
    true
}

/// Everything one session needs to know, gathered before anything is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: Mode,
    pub directory: PathBuf,
    #[serde(default)]
    pub recursive: bool,
    /// Skip the backup and verification steps entirely
    #[serde(default)]
    pub skip_backup: bool,
    /// Capture date for files whose names carry none (`YYYY:MM:DD` in JSON)
    #[serde(default, with = "date::fallback_format")]
    pub fallback_date: Option<NaiveDate>,
    /// Leave videos alone when they already have a container `creation_time`
    #[serde(default = "default_true")]
    pub check_video_metadata: bool,
    #[serde(default)]
    pub tools: ToolConfig,
}

impl RunConfig {
    pub fn new(mode: Mode, directory: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            directory: directory.into(),
            recursive: false,
            skip_backup: false,
            fallback_date: None,
            check_video_metadata: true,
            tools: ToolConfig::default(),
        }
    }

    /// Load a run configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Check the preconditions of a run before any side effect.
    pub fn validate(&self) -> Result<()> {
        self.validate_for(&self.directory)
    }

    pub(crate) fn validate_for(&self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(Error::InvalidDirectory(dir.to_path_buf()));
        }
        if !self.mode.embeds_date() && self.fallback_date.is_none() {
            return Err(Error::MissingFallbackDate(self.mode.to_string()));
        }
        Ok(())
    }
}

/// Absolute form of `dir`, with a real final component for the backup name.
///
/// On Windows `canonicalize` yields verbatim `\\?\` paths, which robocopy
/// rejects, so the path is only made absolute there.
pub fn resolve_directory(dir: &Path) -> Result<PathBuf> {
    if cfg!(windows) {
        Ok(std::path::absolute(dir)?)
    } else {
        Ok(fs::canonicalize(dir)?)
    }
}

/// Collaborators a session runs against.
pub struct Services<'a> {
    /// Required unless the config skips the backup
    pub copier: Option<&'a dyn TreeCopier>,
    pub remuxer: &'a dyn Remuxer,
    pub reporter: &'a dyn Reporter,
    pub cancel: Option<&'a CancellationToken>,
}

/// Back up, verify, then patch every matching file under `config.directory`.
///
/// Setup failures (bad directory, missing fallback date, failed copy) abort
/// before any original is modified. A verification mismatch is reported
/// loudly and recorded in the returned report, but does not stop the run.
pub fn run_session(config: &RunConfig, services: &Services) -> Result<SessionReport> {
    config.validate()?;
    let directory = resolve_directory(&config.directory)?;
    let reporter = services.reporter;
    cancel::checkpoint(services.cancel)?;

    let (backup_dir, verification) = if config.skip_backup {
        reporter.info("Skipping backup, files will be modified in place");
        (None, None)
    } else {
        let copier = services.copier.ok_or(Error::UnsupportedPlatform)?;
        let backup_dir = backup::backup_directory(&directory, copier, reporter, services.cancel)?;
        reporter.info(&format!("Backup created successfully at {}", backup_dir.display()));

        reporter.info("Verifying backup integrity...");
        let verification = backup::verify_backup(&directory, &backup_dir, reporter, services.cancel)?;
        if verification.is_clean() {
            reporter.info(&format!("Backup verified: {} files match", verification.checked));
        } else {
            reporter.error(&format!(
                "BACKUP VERIFICATION FAILED: {} missing, {} mismatched. These files have no trustworthy backup.",
                verification.missing.len(),
                verification.mismatched.len()
            ));
            for p in verification.missing.iter().chain(&verification.mismatched) {
                reporter.error(&format!("  {}", p.display()));
            }
        }
        (Some(backup_dir), Some(verification))
    };

    reporter.info(&format!("Processing {} files in {}", config.mode, directory.display()));
    let stats = walk::walk_directory(&directory, config, services)?;
    reporter.info("Operation completed.");

    Ok(SessionReport {
        backup_dir,
        verification,
        stats,
    })
}

/// [`run_session`] with the stock collaborators for this platform.
pub fn run(
    config: &RunConfig,
    reporter: &dyn Reporter,
    cancel: Option<&CancellationToken>,
) -> Result<SessionReport> {
    let copier = if config.skip_backup {
        None
    } else {
        Some(platform_copier(&config.tools)?)
    };
    let remuxer = FfmpegRemuxer::from_config(&config.tools);
    run_session(
        config,
        &Services {
            copier: copier.as_deref(),
            remuxer: &remuxer,
            reporter,
            cancel,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::ManualCopier;
    use crate::patch::jpeg::testing::minimal_jpeg;
    use crate::report::testing::RecordingReporter;
    use tempfile::tempdir;

    fn photos(root: &Path) -> PathBuf {
        let dir = root.join("WhatsApp Images");
        fs::create_dir_all(dir.join("Sent")).unwrap();
        fs::write(dir.join("IMG-20230815-WA0001.jpg"), minimal_jpeg()).unwrap();
        fs::write(dir.join("IMG-20230816-WA0002.jpg"), b"broken").unwrap();
        fs::write(dir.join("Sent/IMG-20230817-WA0003.jpg"), minimal_jpeg()).unwrap();
        fs::write(dir.join("notes.txt"), b"hello").unwrap();
        dir
    }

    fn session(config: &RunConfig, reporter: &RecordingReporter) -> Result<SessionReport> {
        let remuxer = FfmpegRemuxer::default();
        run_session(
            config,
            &Services {
                copier: Some(&ManualCopier),
                remuxer: &remuxer,
                reporter,
                cancel: None,
            },
        )
    }

    #[test]
    fn test_backup_holds_pre_patch_bytes() {
        let root = tempdir().unwrap();
        let dir = photos(root.path());
        let config = RunConfig {
            recursive: true,
            ..RunConfig::new(Mode::WhatsApp, &dir)
        };
        let reporter = RecordingReporter::default();

        let report = session(&config, &reporter).unwrap();

        let backup = report.backup_dir.clone().unwrap();
        assert_eq!(backup.file_name().unwrap(), "WhatsApp Images_backup");
        assert_eq!(
            report.verification,
            Some(VerifyReport {
                checked: 4,
                ..VerifyReport::default()
            })
        );
        assert_eq!(
            report.stats,
            RunStats {
                total_files: 4,
                matched_files: 3,
                metadata_exists: 0,
                updated: 2,
                failed: 1,
            }
        );
        assert!(report.has_problems());

        // originals patched, backup untouched
        assert_ne!(fs::read(dir.join("IMG-20230815-WA0001.jpg")).unwrap(), minimal_jpeg());
        assert_eq!(fs::read(backup.join("IMG-20230815-WA0001.jpg")).unwrap(), minimal_jpeg());
        assert_eq!(fs::read(backup.join("Sent/IMG-20230817-WA0003.jpg")).unwrap(), minimal_jpeg());
    }

    #[test]
    fn test_second_session_gets_its_own_backup() {
        let root = tempdir().unwrap();
        let dir = photos(root.path());
        let config = RunConfig::new(Mode::WhatsApp, &dir);
        let reporter = RecordingReporter::default();

        let first = session(&config, &reporter).unwrap();
        let second = session(&config, &reporter).unwrap();
        assert_eq!(second.backup_dir.unwrap().file_name().unwrap(), "WhatsApp Images_backup(1)");
        // the first backup still holds the unpatched file
        assert_eq!(
            fs::read(first.backup_dir.unwrap().join("IMG-20230815-WA0001.jpg")).unwrap(),
            minimal_jpeg()
        );
        assert_eq!(second.stats.metadata_exists, 1);
    }

    #[test]
    fn test_skip_backup_creates_nothing() {
        let root = tempdir().unwrap();
        let dir = photos(root.path());
        let config = RunConfig {
            skip_backup: true,
            ..RunConfig::new(Mode::WhatsApp, &dir)
        };
        let reporter = RecordingReporter::default();
        let remuxer = FfmpegRemuxer::default();

        let report = run_session(
            &config,
            &Services {
                copier: None,
                remuxer: &remuxer,
                reporter: &reporter,
                cancel: None,
            },
        )
        .unwrap();
        assert!(report.backup_dir.is_none());
        assert!(report.verification.is_none());
        assert_eq!(report.stats.updated, 1);
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_backup_without_copier_is_fatal() {
        let root = tempdir().unwrap();
        let dir = photos(root.path());
        let config = RunConfig::new(Mode::WhatsApp, &dir);
        let remuxer = FfmpegRemuxer::default();

        let err = run_session(
            &config,
            &Services {
                copier: None,
                remuxer: &remuxer,
                reporter: &RecordingReporter::default(),
                cancel: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform));
        assert_eq!(fs::read(dir.join("IMG-20230815-WA0001.jpg")).unwrap(), minimal_jpeg());
    }

    #[test]
    fn test_snapchat_without_date_fails_before_backup() {
        let root = tempdir().unwrap();
        let dir = photos(root.path());
        let config = RunConfig::new(Mode::Snapchat, &dir);

        let err = session(&config, &RecordingReporter::default()).unwrap_err();
        assert!(matches!(err, Error::MissingFallbackDate(_)));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let root = tempdir().unwrap();
        let config = RunConfig::new(Mode::WhatsApp, root.path().join("nope"));

        let err = session(&config, &RecordingReporter::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidDirectory(_)));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let root = tempdir().unwrap();
        let dir = photos(root.path());
        let config = RunConfig::new(Mode::WhatsApp, &dir);
        let token = CancellationToken::new();
        token.cancel();
        let remuxer = FfmpegRemuxer::default();

        let err = run_session(
            &config,
            &Services {
                copier: Some(&ManualCopier),
                remuxer: &remuxer,
                reporter: &RecordingReporter::default(),
                cancel: Some(&token),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_resolved_directory_is_plain_and_named() {
        let resolved = resolve_directory(Path::new(".")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.file_name().is_some());
        assert!(!resolved.to_string_lossy().starts_with(r"\\?\"));
        assert_eq!(
            backup::backup_destination(&resolved).unwrap().parent(),
            resolved.parent()
        );
    }

    #[test]
    fn test_config_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{ "mode": "snapchat", "directory": "/media/snaps", "recursive": true,
                 "fallback_date": "2024:01:10", "tools": { "ffmpeg": "/opt/ffmpeg" } }"#,
        )
        .unwrap();

        let config = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(config.mode, Mode::Snapchat);
        assert!(config.recursive);
        assert!(!config.skip_backup);
        assert!(config.check_video_metadata);
        assert_eq!(config.fallback_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert_eq!(config.tools.ffmpeg, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.tools.ffprobe, ToolConfig::default().ffprobe);
    }

    #[test]
    fn test_config_rejects_bad_date() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{ "mode": "snapchat", "directory": ".", "fallback_date": "2024-01-10" }"#,
        )
        .unwrap();
        assert!(matches!(RunConfig::from_json_file(&path), Err(Error::Config(_))));
    }
}
