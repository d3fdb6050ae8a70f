use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use mediastamp_core::Reporter;

/// Reporter drawing one progress bar per stage, with messages routed
/// through `tracing` above the bar.
pub struct BarReporter {
    show_bars: bool,
    current: Mutex<Option<(String, ProgressBar)>>,
}

impl BarReporter {
    pub fn new(show_bars: bool) -> Self {
        Self {
            show_bars,
            current: Mutex::new(None),
        }
    }

    fn suspend(&self, f: impl FnOnce()) {
        let slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some((_, pb)) => pb.suspend(f),
            None => f(),
        }
    }

    fn new_bar(&self, stage: &str, total: u64) -> ProgressBar {
        if !self.show_bars {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(stage.to_string());
        pb
    }

    /// Clear whatever bar is still on screen.
    pub fn finish(&self) {
        let mut slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, pb)) = slot.take() {
            pb.finish_and_clear();
        }
    }
}

impl Reporter for BarReporter {
    fn info(&self, message: &str) {
        self.suspend(|| tracing::info!("{message}"));
    }

    fn error(&self, message: &str) {
        self.suspend(|| tracing::error!("{message}"));
    }

    fn progress(&self, stage: &str, current: u64, total: u64) {
        let mut slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(slot.as_ref(), Some((s, _)) if s == stage) {
            if let Some((_, old)) = slot.take() {
                old.finish_and_clear();
            }
            *slot = Some((stage.to_string(), self.new_bar(stage, total)));
        }
        let done = match slot.as_ref() {
            Some((_, pb)) => {
                pb.set_length(total);
                pb.set_position(current);
                current >= total
            }
            None => false,
        };
        if done {
            if let Some((_, pb)) = slot.take() {
                pb.finish_and_clear();
            }
        }
    }
}
