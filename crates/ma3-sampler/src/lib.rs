//! FM + wave-drum sound engine for Yamaha MA-2/MA-3 era ringtones
//!
//! A software model of the mobile-phone synthesizers that played i-melody (MLD) and
//! SMAF ringtones. Every voice is a 2- or 4-operator FM patch with OPL-style
//! envelopes and log-domain waveforms, or a one-shot ADPCM wave drum.
//!
//! The engine runs at the chip's internal rate (33.8688 MHz / 684, about 49.5 kHz)
//! and box-resamples to whatever output rate the caller asks for.
//!
//! # Backend Trait
//! Sequencers talk to an [`Instance`] through the [`SamplerBackend`] trait, so an
//! alternative engine can be dropped in without touching the replayer.
//!
//! # Quick start
//! ```
//! use ma3_sampler::{RenderOptions, Sampler, SamplerBackend, SamplerConfig, SamplerFactory};
//!
//! let sampler = Sampler::new(SamplerConfig::default()).unwrap();
//! let mut instance = sampler.make_instance(16, 44_100.0).unwrap();
//! instance.key_on(0, 0, 1.0); // A4 on channel 0
//!
//! let mut buffer = vec![0.0f32; 2 * 512];
//! instance.render(&mut buffer, 0, 512, &RenderOptions::default()).unwrap();
//! ```

#![warn(missing_docs)]

pub mod adpcm;
pub mod backend; // Sequencer-facing control surface
pub mod config;
pub mod constants;
pub mod preset;
pub mod tables;

mod engine; // Operators, notes, channels, resampler
mod instance;
mod sampler;

/// Error types for sampler operations
///
/// Malformed control data (unknown SysEx, out-of-range keys) is ignored rather than
/// reported; only caller mistakes that would corrupt output surface as errors.
#[derive(thiserror::Error, Debug)]
pub enum SamplerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Render call with bad bounds or gains
    #[error("Invalid render request: {0}")]
    InvalidRender(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SamplerError {
    /// Converts a String into `SamplerError::Other`.
    ///
    /// Prefer the specific variants (`ConfigError`, `InvalidRender`) where the
    /// failure has a clear category.
    fn from(msg: String) -> Self {
        SamplerError::Other(msg)
    }
}

impl From<&str> for SamplerError {
    fn from(msg: &str) -> Self {
        SamplerError::Other(msg.to_string())
    }
}

/// Result type for sampler operations
pub type Result<T> = std::result::Result<T, SamplerError>;

// Public API exports
pub use backend::{SamplerBackend, SamplerFactory};
pub use config::{DrumMode, PresetBank, RenderOptions, SamplerConfig, VolumeCurve};
pub use instance::Instance;
pub use sampler::Sampler;
