use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date;
use crate::error::{Error, Result};

static WHATSAPP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^IMG-[0-9]{8}-WA[0-9]{4}\.jpg$").unwrap());
static SNAPCHAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Snapchat-[0-9]+\.(jpg|mp4)$").unwrap());

/// Byte range of `YYYYMMDD` inside `IMG-YYYYMMDD-WA####.jpg`.
const WHATSAPP_DATE_RANGE: std::ops::Range<usize> = 4..12;

/// Naming convention a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// `IMG-YYYYMMDD-WA####.jpg`, date embedded in the name
    WhatsApp,
    /// `Snapchat-<digits>.jpg|mp4`, date supplied by the operator
    Snapchat,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::WhatsApp, Mode::Snapchat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::WhatsApp => "whatsapp",
            Mode::Snapchat => "snapchat",
        }
    }

    /// Whether filenames of this convention carry their own date.
    pub fn embeds_date(&self) -> bool {
        matches!(self, Mode::WhatsApp)
    }

    pub fn accepts(&self, classification: &Classification) -> bool {
        matches!(
            (self, classification),
            (Mode::WhatsApp, Classification::WhatsApp(_)) | (Mode::Snapchat, Classification::Snapchat)
        )
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Mode::WhatsApp),
            "snapchat" => Ok(Mode::Snapchat),
            other => Err(Error::UnknownMode(other.to_string())),
        }
    }
}

/// What a filename says about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unmatched,
    WhatsApp(NaiveDate),
    Snapchat,
}

impl Classification {
    pub fn embedded_date(&self) -> Option<NaiveDate> {
        match self {
            Classification::WhatsApp(d) => Some(*d),
            _ => None,
        }
    }
}

/// Classify a bare filename (no directory part).
///
/// Matching is case-sensitive and anchored. A WhatsApp name whose embedded
/// date is impossible (e.g. month 13) is an error rather than `Unmatched`,
/// so the caller can count it as a failure for that file.
pub fn classify(filename: &str) -> Result<Classification> {
    if WHATSAPP_RE.is_match(filename) {
        // the regex guarantees ASCII digits at these offsets
        let date = date::parse_compact_date(&filename[WHATSAPP_DATE_RANGE])?;
        return Ok(Classification::WhatsApp(date));
    }
    if SNAPCHAT_RE.is_match(filename) {
        return Ok(Classification::Snapchat);
    }
    Ok(Classification::Unmatched)
}
