//! Ringtone file decoders
//!
//! - MLD (i-melody, `melo`)
//! - SMAF Handy-Phone Standard (`MMMD`)
//!
//! Both produce the same immutable [`Song`]. Every entry point exists in three
//! flavours: whole buffer, sub-range of a buffer, and a streaming source.

pub mod mld;
pub mod smaf;

pub use mld::{decode_mld, decode_mld_range, MldDecoder, MLD_MAGIC};
pub use smaf::{decode_smaf, decode_smaf_range, SmafDecoder, SMAF_MAGIC};

use std::io::Read;

use crate::error::{FormatError, FormatResult};
use crate::song::{Song, SongFormat};
use crate::Result;

/// Trait for decoding a container into a [`Song`]
pub trait SongDecoder {
    /// Decode a complete file
    fn decode(&self, data: &[u8]) -> FormatResult<Song>;

    /// Decoder name
    fn name(&self) -> &str;

    /// Four-byte file identifier
    fn magic(&self) -> &[u8; 4];
}

/// Identify the container from its first four bytes
pub fn detect_format(data: &[u8]) -> Option<SongFormat> {
    match data.get(..4)? {
        magic if magic == MLD_MAGIC => Some(SongFormat::Mld),
        magic if magic == SMAF_MAGIC => Some(SongFormat::Smaf),
        _ => None,
    }
}

/// Decoder for a container format
pub fn decoder_for(format: SongFormat) -> &'static dyn SongDecoder {
    match format {
        SongFormat::Mld => &MldDecoder,
        SongFormat::Smaf => &SmafDecoder,
    }
}

/// Decode either format, chosen by the file identifier
pub fn decode(data: &[u8]) -> FormatResult<Song> {
    let format = detect_format(data).ok_or_else(|| FormatError::BadMagic {
        expected: "melo or MMMD",
        found: String::from_utf8_lossy(&data[..data.len().min(4)]).into_owned(),
        offset: 0,
    })?;
    decoder_for(format).decode(data)
}

/// Decode an MLD file from a streaming source
pub fn read_mld<R: Read>(mut source: R) -> Result<Song> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    Ok(decode_mld(&data)?)
}

/// Decode a SMAF file from a streaming source
pub fn read_smaf<R: Read>(mut source: R) -> Result<Song> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    Ok(decode_smaf(&data)?)
}

/// Decode either format from a streaming source
pub fn read_song<R: Read>(mut source: R) -> Result<Song> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    Ok(decode(&data)?)
}

/// Bounds-checked `data[offset..offset + length]`
pub(crate) fn slice_range(data: &[u8], offset: usize, length: usize) -> FormatResult<&[u8]> {
    offset
        .checked_add(length)
        .and_then(|end| data.get(offset..end))
        .ok_or(FormatError::LengthMismatch {
            declared: offset.saturating_add(length),
            available: data.len(),
        })
}

/// Text field with trailing NULs and whitespace removed
pub(crate) fn text_field(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"melo\0\0\0\0"), Some(SongFormat::Mld));
        assert_eq!(detect_format(b"MMMD"), Some(SongFormat::Smaf));
        assert_eq!(detect_format(b"MThd"), None);
        assert_eq!(detect_format(b"me"), None);
    }

    #[test]
    fn test_decode_rejects_unknown_magic() {
        assert!(matches!(
            decode(b"RIFF1234"),
            Err(FormatError::BadMagic { offset: 0, .. })
        ));
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_slice_range() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(slice_range(&data, 1, 2).unwrap(), &[2, 3]);
        assert!(slice_range(&data, 3, 2).is_err());
        assert!(slice_range(&data, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_text_field() {
        assert_eq!(text_field(b"Title \0\0junk"), "Title");
        assert_eq!(text_field(b""), "");
    }

    #[test]
    fn test_truncated_stream_is_format_error() {
        let err = read_mld(&b"melo\0\0\0\x10"[..]).unwrap_err();
        assert!(matches!(
            err,
            crate::ReplayerError::Format(FormatError::LengthMismatch { .. })
        ));
    }
}
