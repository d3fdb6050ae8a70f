use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::backup::VerifyReport;

/// Output capability injected into the pipeline.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    /// `current` is 1-based; `current == total` marks the end of a stage.
    fn progress(&self, _stage: &str, _current: u64, _total: u64) {}
}

/// Reporter that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn progress(&self, stage: &str, current: u64, total: u64) {
        tracing::trace!(stage, current, total, "progress");
    }
}

/// Per-outcome counters accumulated by the walker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Every regular file seen, matched or not
    pub total_files: u64,
    /// Files following the active mode's naming convention
    pub matched_files: u64,
    /// Matched files that already carried a capture date
    pub metadata_exists: u64,
    pub updated: u64,
    pub failed: u64,
}

/// Everything a finished session has to say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub backup_dir: Option<PathBuf>,
    pub verification: Option<VerifyReport>,
    pub stats: RunStats,
}

impl SessionReport {
    /// True when some file failed or the backup is not a faithful copy.
    pub fn has_problems(&self) -> bool {
        self.stats.failed > 0
            || self
                .verification
                .as_ref()
                .is_some_and(|v| !v.is_clean())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::Reporter;

    /// Captures reporter output for assertions.
    #[derive(Default)]
    pub struct RecordingReporter {
        pub infos: Mutex<Vec<String>>,
        pub errors: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        pub fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }
    }

    impl Reporter for RecordingReporter {
        fn info(&self, message: &str) {
            self.infos.lock().unwrap().push(message.to_string());
        }

        fn error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }
}
