//! Running external executables (ffmpeg, ffprobe, robocopy) with a bounded wait.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_robocopy() -> PathBuf {
    PathBuf::from("robocopy")
}

fn default_timeout_secs() -> Option<u64> {
    Some(600)
}

/// Where the external tools live and how long each call may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
    #[serde(default = "default_robocopy")]
    pub robocopy: PathBuf,
    /// `None` or `0` waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            robocopy: default_robocopy(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|&s| s > 0)
            .map(Duration::from_secs)
    }
}

/// What a finished tool invocation left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was ended by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into `Error::ToolFailed`.
    pub fn into_result(self, tool: &str) -> Result<ToolOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::ToolFailed {
                tool: tool.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn wait_bounded(child: &mut Child, tool: &str, timeout: Option<Duration>) -> Result<std::process::ExitStatus> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= limit {
            child.kill().ok();
            child.wait().ok();
            return Err(Error::ToolTimeout {
                tool: tool.to_string(),
                after: limit,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Spawn `command`, capture both output streams and wait at most `timeout`.
///
/// A child that overruns is killed and reaped before `Error::ToolTimeout`
/// is returned. Failing to spawn (e.g. the executable is missing) is an
/// `Error::Io`.
pub fn run(mut command: Command, timeout: Option<Duration>) -> Result<ToolOutput> {
    let tool = command.get_program().to_string_lossy().into_owned();
    tracing::debug!(?command, "running external tool");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes on their own threads so a chatty child never blocks on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    // On timeout the drain threads are detached: a grandchild may still hold the pipes.
    let status = wait_bounded(&mut child, &tool, timeout)?;
    Ok(ToolOutput {
        code: status.code(),
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}
