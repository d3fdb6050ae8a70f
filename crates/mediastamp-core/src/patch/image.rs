use std::fs;
use std::io::Cursor;
use std::path::Path;

use chrono::NaiveDate;
use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};

use super::jpeg::{self, JpegFile};
use super::{replace_atomically, PatchOutcome};
use crate::date;
use crate::error::{Error, Result};
use crate::report::Reporter;

/// Fields stamped with the capture date.
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Stamp `date` into a JPEG unless it already has a DateTimeOriginal.
///
/// Re-running on a patched file returns `Exists` without writing, so the
/// operation is idempotent.
pub fn patch_image(path: &Path, date: NaiveDate, reporter: &dyn Reporter) -> PatchOutcome {
    match try_patch_image(path, date) {
        Ok(outcome) => outcome,
        Err(e) => {
            reporter.error(&format!("Error processing {}: {}", path.display(), e));
            PatchOutcome::Failed(e.to_string())
        }
    }
}

fn try_patch_image(path: &Path, date: NaiveDate) -> Result<PatchOutcome> {
    let bytes = fs::read(path)?;
    if !jpeg::is_jpeg(&bytes) {
        return Err(Error::UnsupportedContainer(path.to_path_buf()));
    }
    let mut jpeg = JpegFile::from_bytes(bytes)?;

    let existing = match jpeg.exif_tiff() {
        Some(tiff) => Some(Reader::new().read_raw(tiff)?),
        None => None,
    };
    if let Some(exif) = &existing {
        if exif.get_field(Tag::DateTimeOriginal, In::PRIMARY).is_some() {
            tracing::debug!(path = %path.display(), "capture date already present");
            return Ok(PatchOutcome::Exists);
        }
    }

    let tiff = build_exif(existing.as_ref(), date)?;
    jpeg.set_exif_tiff(&tiff)?;
    replace_atomically(path, &jpeg.into_bytes())?;
    tracing::debug!(path = %path.display(), %date, "capture date written");
    Ok(PatchOutcome::Updated)
}

/// Serialize the existing fields plus the three date fields into a TIFF block.
fn build_exif(existing: Option<&Exif>, date: NaiveDate) -> Result<Vec<u8>> {
    let stamp = date::exif_datetime(date).into_bytes();
    let stamped: Vec<Field> = DATE_TAGS
        .iter()
        .map(|&tag| Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![stamp.clone()]),
        })
        .collect();

    let mut writer = Writer::new();
    if let Some(exif) = existing {
        for field in exif.fields() {
            if field.ifd_num == In::PRIMARY && DATE_TAGS.contains(&field.tag) {
                continue;
            }
            if let Value::Unknown(..) = field.value {
                // the writer cannot re-encode values of unknown type
                tracing::debug!(tag = %field.tag, "dropping field of unknown type");
                continue;
            }
            writer.push_field(field);
        }
        if let Some(thumb) = thumbnail(exif) {
            writer.set_jpeg(thumb, In::THUMBNAIL);
        }
    }
    for field in &stamped {
        writer.push_field(field);
    }

    let little_endian = existing.is_some_and(|e| e.little_endian());
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, little_endian)?;
    Ok(buf.into_inner())
}

/// Embedded JPEG thumbnail referenced from IFD1, if any.
fn thumbnail(exif: &Exif) -> Option<&[u8]> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    exif.buf().get(offset..offset.checked_add(len)?)
}
