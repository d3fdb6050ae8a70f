//! Error types for mediastamp-core

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for mediastamp operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a directory: {0}")]
    InvalidDirectory(PathBuf),

    #[error("Mode '{0}' needs a fallback date (YYYY:MM:DD)")]
    MissingFallbackDate(String),

    #[error("Invalid date '{input}': expected {expected}")]
    InvalidDate { input: String, expected: &'static str },

    #[error("Unknown mode '{0}' (expected whatsapp or snapchat)")]
    UnknownMode(String),

    #[error("Backups are not supported on this platform")]
    UnsupportedPlatform,

    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} did not finish within {after:?}")]
    ToolTimeout { tool: String, after: Duration },

    #[error("Not a JPEG file: {0}")]
    UnsupportedContainer(PathBuf),

    #[error("Malformed JPEG: {0}")]
    MalformedJpeg(String),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("EXIF block of {0} bytes does not fit in an APP1 segment")]
    MetadataTooLarge(usize),

    #[error("Directory walk failed: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for mediastamp operations
pub type Result<T> = std::result::Result<T, Error>;
