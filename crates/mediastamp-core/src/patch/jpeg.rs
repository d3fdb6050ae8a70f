//! Exif block access on a parsed JPEG container.
//!
//! Segments other than the Exif APP1 are carried over as parsed; the scan
//! data is never decoded.

use img_parts::jpeg::{markers, Jpeg, JpegSegment};
use img_parts::ImageEXIF;

use crate::error::{Error, Result};

/// Identifier that opens an Exif APP1 payload.
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest payload a marker segment can hold (length field counts itself).
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == markers::SOI && bytes[2] == 0xFF
}

/// A JPEG held in memory for a metadata rewrite.
#[derive(Debug, Clone)]
pub struct JpegFile {
    jpeg: Jpeg,
}

impl JpegFile {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let jpeg = Jpeg::from_bytes(bytes.into()).map_err(|e| Error::MalformedJpeg(e.to_string()))?;
        if !jpeg.segments().iter().any(|s| s.marker() == markers::SOS) {
            return Err(Error::MalformedJpeg("no scan data".into()));
        }
        Ok(Self { jpeg })
    }

    /// Raw TIFF data of the Exif block, without the `Exif\0\0` header.
    pub fn exif_tiff(&self) -> Option<Vec<u8>> {
        self.jpeg.exif().map(|b| b.to_vec())
    }

    /// Make `tiff` the only Exif block.
    ///
    /// The new segment goes right after any leading APP0 (JFIF) segments.
    pub fn set_exif_tiff(&mut self, tiff: &[u8]) -> Result<()> {
        let payload_len = EXIF_HEADER.len() + tiff.len();
        if payload_len > MAX_SEGMENT_PAYLOAD {
            return Err(Error::MetadataTooLarge(payload_len));
        }
        let mut contents = Vec::with_capacity(payload_len);
        contents.extend_from_slice(EXIF_HEADER);
        contents.extend_from_slice(tiff);

        self.jpeg.set_exif(None);
        let segments = self.jpeg.segments_mut();
        let at = segments
            .iter()
            .take_while(|s| s.marker() == markers::APP0)
            .count();
        segments.insert(at, JpegSegment::new_with_contents(markers::APP1, contents.into()));
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.jpeg.encoder().bytes().to_vec()
    }

    #[cfg(test)]
    fn markers(&self) -> Vec<u8> {
        self.jpeg.segments().iter().map(|s| s.marker()).collect()
    }
}
