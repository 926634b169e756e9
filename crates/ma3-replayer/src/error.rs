//! Error types for decoding and playback

use ma3_sampler::SamplerError;
use thiserror::Error;

/// Errors raised while decoding an MLD or SMAF container
///
/// Any of these aborts the whole decode; no partial song is returned.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A read ran past the end of the enclosing chunk.
    #[error("unexpected end of data at offset 0x{offset:x} (needed {needed} more bytes)")]
    UnexpectedEof {
        /// Absolute offset of the failed read.
        offset: usize,
        /// Bytes the read required.
        needed: usize,
    },
    /// A chunk or file identifier did not match.
    #[error("expected '{expected}' but found '{found}' at offset 0x{offset:x}")]
    BadMagic {
        /// Identifier the decoder was looking for.
        expected: &'static str,
        /// Identifier actually present (lossy text).
        found: String,
        /// Absolute offset of the identifier.
        offset: usize,
    },
    /// A declared length does not fit the data it describes.
    #[error("declared length {declared} exceeds the {available} bytes available")]
    LengthMismatch {
        /// Length declared in the container.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// MLD content type other than the supported melody type.
    #[error("unsupported MLD content type 0x{found:04x}")]
    UnsupportedContentType {
        /// Content type code found in the header.
        found: u16,
    },
    /// More tracks than the format allows.
    #[error("{count} tracks declared, at most {max} supported")]
    TooManyTracks {
        /// Declared track count.
        count: usize,
        /// Limit for this format.
        max: usize,
    },
    /// SMAF track format other than Handy-Phone Standard.
    #[error("unsupported SMAF track format type {found}")]
    UnsupportedFormatType {
        /// Format type byte found in the track chunk.
        found: u8,
    },
    /// Timebase code with no entry in the lookup table.
    #[error("invalid timebase code 0x{code:02x}")]
    InvalidTimebase {
        /// Raw timebase code.
        code: u8,
    },
    /// SMAF exclusive block not closed by `0xF7`.
    #[error("exclusive block at offset 0x{offset:x} ends with 0x{found:02x} instead of 0xF7")]
    BadExclusiveTerminator {
        /// Absolute offset of the block's last byte.
        offset: usize,
        /// Byte found in place of the terminator.
        found: u8,
    },
    /// Generic validation error.
    #[error("{msg}")]
    InvalidData {
        /// Human-readable explanation of the validation failure.
        msg: String,
    },
}

impl From<String> for FormatError {
    fn from(msg: String) -> Self {
        FormatError::InvalidData { msg }
    }
}

impl From<&str> for FormatError {
    fn from(msg: &str) -> Self {
        FormatError::InvalidData {
            msg: msg.to_string(),
        }
    }
}

/// Error type for replayer operations
#[derive(Debug, Error)]
pub enum ReplayerError {
    /// Malformed or unsupported song data
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Error from the sound engine (bad render arguments, bad configuration)
    #[error("Sampler error: {0}")]
    Sampler(#[from] SamplerError),

    /// IO error from a streaming source or WAV output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ReplayerError {
    fn from(s: String) -> Self {
        ReplayerError::Other(s)
    }
}

impl From<&str> for ReplayerError {
    fn from(s: &str) -> Self {
        ReplayerError::Other(s.to_string())
    }
}

/// Result type for replayer operations
pub type Result<T> = std::result::Result<T, ReplayerError>;

/// Result type for decoder internals
pub type FormatResult<T> = std::result::Result<T, FormatError>;
