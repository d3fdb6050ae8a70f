use std::path::{Path, PathBuf};

use crate::classify::Classification;
use crate::patch::PatchOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    /// Guess from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match mime_guess::from_path(path).first() {
            Some(m) if m.type_() == mime_guess::mime::IMAGE => MediaKind::Image,
            Some(m) if m.type_() == mime_guess::mime::VIDEO => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

/// One file seen during the walk. Lives only as long as its own processing.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Just the filename
    pub filename: String,
    pub kind: MediaKind,
    pub classification: Classification,
    /// Set once the patcher has run
    pub outcome: Option<PatchOutcome>,
}

impl MediaFile {
    pub fn new(path: PathBuf, filename: String, classification: Classification) -> Self {
        let kind = MediaKind::from_path(&path);
        Self {
            path,
            filename,
            kind,
            classification,
            outcome: None,
        }
    }

    pub fn had_metadata(&self) -> bool {
        matches!(self.outcome, Some(PatchOutcome::Exists))
    }
}
