//! MLD and SMAF Ringtone Decoder and Replayer
//!
//! This crate decodes i-melody (MLD) and SMAF (MMF) ringtone files and plays
//! them through the `ma3-sampler` FM/ADPCM engine.
//!
//! # Features
//!
//! - MLD and SMAF Handy-Phone decoders producing one shared [`Song`] model
//! - Tick-accurate sequencing with tempo changes, gate times and loop cuepoints
//! - Seeking, looping and per-key notifications
//! - Generic over the sampler backend
//! - Optional WAV export (`export-wav`, enabled by default)
//!
//! # Example
//!
//! ```no_run
//! use ma3_replayer::load_song;
//! use ma3_sampler::{RenderOptions, Sampler, SamplerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("ring.mld")?;
//! let sampler = Sampler::new(SamplerConfig::default())?;
//! let mut player = load_song(&data, &sampler, 44_100.0)?;
//!
//! let mut buffer = vec![0.0f32; 2 * 4096];
//! let frames = player.render(&mut buffer, 0, 4096, &RenderOptions::default())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
mod error;
pub use error::{FormatError, FormatResult, ReplayerError, Result};

// Core modules
pub mod parser;
pub mod reader;
pub mod song;

mod scheduler;

pub use parser::{
    decode, decode_mld, decode_mld_range, decode_smaf, decode_smaf_range, detect_format,
    read_mld, read_smaf, read_song, SongDecoder,
};
pub use reader::ByteReader;
pub use song::{Control, Cue, Event, Song, SongFormat, SongInfo, TimedEvent, Track};

// Player module - sequencing and rendering
pub mod player;

pub use player::{
    load_song, MldDriver, MldPlayer, PlayerEvent, PlayerEventKind, SequenceDriver,
    SequencePlayer, SmafDriver, SmafPlayer, SongPlayer,
};

pub mod export;
pub mod metadata;

pub use metadata::MetadataFields;
