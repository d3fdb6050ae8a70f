use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::NaiveDate;

use super::{parent_dir, PatchOutcome};
use crate::date;
use crate::error::{Error, Result};
use crate::report::Reporter;
use crate::tool::{self, ToolConfig, ToolOutput};

/// Container-level remuxing, normally backed by ffmpeg/ffprobe.
pub trait Remuxer {
    /// The container's current `creation_time`, `None` when unset.
    fn creation_time(&self, input: &Path) -> Result<Option<String>>;

    /// Copy every stream of `input` unchanged into `output`, stamping
    /// `creation_time`. Must never modify `input`.
    fn remux(&self, input: &Path, output: &Path, creation_time: &str) -> Result<ToolOutput>;
}

#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub timeout: Option<Duration>,
}

impl FfmpegRemuxer {
    pub fn from_config(tools: &ToolConfig) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
            timeout: tools.timeout(),
        }
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::from_config(&ToolConfig::default())
    }
}

impl Remuxer for FfmpegRemuxer {
    fn creation_time(&self, input: &Path) -> Result<Option<String>> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "error", "-show_entries", "format_tags=creation_time"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(input);
        let output = tool::run(command, self.timeout)?.into_result("ffprobe")?;
        let value = output.stdout.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    fn remux(&self, input: &Path, output: &Path, creation_time: &str) -> Result<ToolOutput> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(input)
            .args(["-map", "0", "-c", "copy", "-metadata"])
            .arg(format!("creation_time={creation_time}"))
            .arg(output);
        tool::run(command, self.timeout)
    }
}

/// Stamp a container `creation_time` by remuxing into a sibling temp file
/// and renaming it over the original.
///
/// With `check_existing`, a video that already has a `creation_time` is
/// left alone and reported as `Exists`; a lookup that fails is logged and
/// the remux goes ahead.
pub fn patch_video(
    path: &Path,
    date: NaiveDate,
    remuxer: &dyn Remuxer,
    check_existing: bool,
    reporter: &dyn Reporter,
) -> PatchOutcome {
    if check_existing {
        match remuxer.creation_time(path) {
            Ok(Some(existing)) => {
                tracing::debug!(path = %path.display(), %existing, "creation_time already present");
                return PatchOutcome::Exists;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read creation_time");
            }
        }
    }

    match try_patch_video(path, date, remuxer) {
        Ok(()) => {
            reporter.info(&format!("Metadata updated for {}", path.display()));
            PatchOutcome::Updated
        }
        Err(e) => {
            reporter.error(&format!(
                "Failed to update metadata for {}: {}",
                path.display(),
                e
            ));
            PatchOutcome::Failed(e.to_string())
        }
    }
}

fn try_patch_video(path: &Path, date: NaiveDate, remuxer: &dyn Remuxer) -> Result<()> {
    let permissions = fs::metadata(path)?.permissions();
    // ffmpeg picks the muxer from the output extension, so keep it.
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    // Removed on drop unless persisted, so a failed remux leaves nothing behind.
    let temp = tempfile::Builder::new()
        .prefix(".mediastamp-")
        .suffix(&suffix)
        .tempfile_in(parent_dir(path))?
        .into_temp_path();

    let output = remuxer.remux(path, &temp, &date::iso_datetime(date))?;
    if !output.success() {
        return Err(Error::ToolFailed {
            tool: "ffmpeg".to_string(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    // temp files are created owner-only
    fs::set_permissions(&temp, permissions)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::testing::RecordingReporter;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Stand-in for ffmpeg: "remuxes" by appending the stamp to the input bytes.
    #[derive(Default)]
    struct FakeRemuxer {
        existing: Option<String>,
        lookup_fails: bool,
        exit_code: i32,
        write_partial: bool,
        stamps: RefCell<Vec<String>>,
    }

    impl Remuxer for FakeRemuxer {
        fn creation_time(&self, _input: &Path) -> Result<Option<String>> {
            if self.lookup_fails {
                return Err(Error::ToolFailed {
                    tool: "ffprobe".into(),
                    code: Some(1),
                    stderr: "boom".into(),
                });
            }
            Ok(self.existing.clone())
        }

        fn remux(&self, input: &Path, output: &Path, creation_time: &str) -> Result<ToolOutput> {
            self.stamps.borrow_mut().push(creation_time.to_string());
            if self.exit_code != 0 {
                if self.write_partial {
                    fs::write(output, b"half a file").unwrap();
                }
                return Ok(ToolOutput {
                    code: Some(self.exit_code),
                    stdout: String::new(),
                    stderr: "Invalid data found when processing input".into(),
                });
            }
            let mut bytes = fs::read(input).unwrap();
            bytes.extend_from_slice(creation_time.as_bytes());
            fs::write(output, bytes).unwrap();
            Ok(ToolOutput {
                code: Some(0),
                ..ToolOutput::default()
            })
        }
    }

    fn jan10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn test_stamps_iso_creation_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Snapchat-12345.mp4");
        fs::write(&path, b"moov").unwrap();
        let remuxer = FakeRemuxer::default();
        let reporter = RecordingReporter::default();

        let outcome = patch_video(&path, jan10(), &remuxer, true, &reporter);
        assert_eq!(outcome, PatchOutcome::Updated);
        assert_eq!(remuxer.stamps.borrow().as_slice(), ["2024-01-10T00:00:00"]);
        assert_eq!(fs::read(&path).unwrap(), b"moov2024-01-10T00:00:00");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_remux_leaves_original_and_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Snapchat-12345.mp4");
        fs::write(&path, b"original bytes").unwrap();
        let remuxer = FakeRemuxer {
            exit_code: 1,
            write_partial: true,
            ..FakeRemuxer::default()
        };
        let reporter = RecordingReporter::default();

        let outcome = patch_video(&path, jan10(), &remuxer, false, &reporter);
        assert!(matches!(outcome, PatchOutcome::Failed(ref why) if why.contains("Invalid data")));
        assert_eq!(fs::read(&path).unwrap(), b"original bytes");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("Snapchat-12345.mp4")]);
        assert_eq!(reporter.errors().len(), 1);
    }

    #[test]
    fn test_existing_creation_time_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Snapchat-7.mp4");
        fs::write(&path, b"moov").unwrap();
        let remuxer = FakeRemuxer {
            existing: Some("2022-02-02T10:00:00.000000Z".into()),
            ..FakeRemuxer::default()
        };

        let outcome = patch_video(&path, jan10(), &remuxer, true, &RecordingReporter::default());
        assert_eq!(outcome, PatchOutcome::Exists);
        assert!(remuxer.stamps.borrow().is_empty());
        assert_eq!(fs::read(&path).unwrap(), b"moov");
    }

    #[test]
    fn test_forced_overwrites_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Snapchat-7.mp4");
        fs::write(&path, b"moov").unwrap();
        let remuxer = FakeRemuxer {
            existing: Some("2022-02-02T10:00:00.000000Z".into()),
            ..FakeRemuxer::default()
        };

        let outcome = patch_video(&path, jan10(), &remuxer, false, &RecordingReporter::default());
        assert_eq!(outcome, PatchOutcome::Updated);
    }

    #[test]
    fn test_unreadable_creation_time_falls_through_to_remux() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Snapchat-8.mp4");
        fs::write(&path, b"moov").unwrap();
        let remuxer = FakeRemuxer {
            lookup_fails: true,
            ..FakeRemuxer::default()
        };

        let outcome = patch_video(&path, jan10(), &remuxer, true, &RecordingReporter::default());
        assert_eq!(outcome, PatchOutcome::Updated);
    }

    #[cfg(unix)]
    #[test]
    fn test_patched_video_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("Snapchat-12345.mp4");
        fs::write(&path, b"moov").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let remuxer = FakeRemuxer::default();
        let outcome = patch_video(&path, jan10(), &remuxer, false, &RecordingReporter::default());
        assert_eq!(outcome, PatchOutcome::Updated);
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_ffmpeg_fails_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Snapchat-9.mp4");
        fs::write(&path, b"moov").unwrap();
        let remuxer = FfmpegRemuxer {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe"),
            timeout: Some(Duration::from_secs(5)),
        };

        let outcome = patch_video(&path, jan10(), &remuxer, true, &RecordingReporter::default());
        assert!(matches!(outcome, PatchOutcome::Failed(_)));
        assert_eq!(fs::read(&path).unwrap(), b"moov");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
