//! Song playback
//!
//! [`SequencePlayer`] is generic over the format driver and the sampler
//! backend; [`MldPlayer`] and [`SmafPlayer`] fix the driver. [`SongPlayer`] is
//! the object-safe view used when the format is only known at run time.

mod mld;
mod sequencer;
mod smaf;

#[cfg(test)]
pub(crate) mod recorder;

pub use mld::MldDriver;
pub use sequencer::{SequenceDriver, SequencePlayer};
pub use smaf::SmafDriver;

use std::sync::Arc;

use ma3_sampler::{Instance, RenderOptions, Sampler};

use crate::parser;
use crate::song::{Song, SongFormat};
use crate::Result;

/// i-melody player
pub type MldPlayer<B = Instance> = SequencePlayer<MldDriver, B>;

/// SMAF player
pub type SmafPlayer<B = Instance> = SequencePlayer<SmafDriver, B>;

/// Kind of a playback notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventKind {
    /// The song ended
    End,
    /// Playback jumped back to the loop start
    Loop,
    /// A note event for a registered key was read
    Key,
}

/// Playback notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerEvent {
    /// Song time in seconds at which the event occurred
    pub time: f64,
    /// What happened
    pub kind: PlayerEventKind,
    /// Key for [`PlayerEventKind::Key`], loop count for [`PlayerEventKind::Loop`]
    pub data: i32,
}

/// Object-safe player interface
///
/// # Example
///
/// ```no_run
/// use ma3_replayer::{load_song, SongPlayer};
/// use ma3_sampler::{RenderOptions, Sampler, SamplerConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = std::fs::read("ring.mld")?;
/// let sampler = Sampler::new(SamplerConfig::default())?;
/// let mut player = load_song(&data, &sampler, 44_100.0)?;
///
/// let mut buffer = vec![0.0f32; 2 * 1024];
/// while let Some(frames) = player.render(&mut buffer, 0, 1024, &RenderOptions::default())? {
///     // ... hand buffer[..frames * 2] to the audio device
///     for event in player.take_events() {
///         println!("{:?} at {:.2}s", event.kind, event.time);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub trait SongPlayer: Send {
    /// Render interleaved stereo frames; `None` once the song is finished
    fn render(
        &mut self,
        buffer: &mut [f32],
        offset: usize,
        frames: usize,
        options: &RenderOptions,
    ) -> Result<Option<usize>>;

    /// Seek; returns true when the end was reached first
    fn set_time(&mut self, seconds: f64) -> bool;

    /// Playback position in seconds
    fn time(&self) -> f64;

    /// True once the song has ended
    fn is_finished(&self) -> bool;

    /// Rewind to the start
    fn reset(&mut self);

    /// Report note events for `key`
    fn add_event_key(&mut self, key: i32);

    /// Stop reporting `key`
    fn remove_event_key(&mut self, key: i32);

    /// Enable or disable End and Loop notifications
    fn set_playback_events_enabled(&mut self, enabled: bool);

    /// Acknowledge and return pending notifications
    fn take_events(&mut self) -> Vec<PlayerEvent>;

    /// The song being played
    fn song(&self) -> &Song;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> f64;

    /// Song length in seconds (up to the loop end for looping songs)
    fn duration_seconds(&self) -> f64 {
        self.song().info.duration_seconds
    }
}

/// Decode a song of either format and create a player for it
///
/// # Errors
///
/// Decoding errors, or an output rate the sampler rejects.
pub fn load_song(data: &[u8], sampler: &Sampler, sample_rate: f64) -> Result<Box<dyn SongPlayer>> {
    let song = Arc::new(parser::decode(data)?);
    Ok(match song.format {
        SongFormat::Mld => Box::new(MldPlayer::new(song, sampler, sample_rate)?),
        SongFormat::Smaf => Box::new(SmafPlayer::new(song, sampler, sample_rate)?),
    })
}
