//! Decoded song representation shared by the MLD and SMAF decoders
//!
//! A [`Song`] is immutable once decoded. Players hold it behind an `Arc` and
//! keep all playback state in their own cursors.

use bitflags::bitflags;
use serde::Serialize;

/// Channels addressed by one track in both formats
pub const CHANNELS_PER_TRACK: usize = 4;

/// Container the song was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SongFormat {
    /// i-melody (`melo`)
    Mld,
    /// SMAF Handy-Phone Standard (`MMMD`)
    Smaf,
}

impl SongFormat {
    /// Short display name
    pub fn name(self) -> &'static str {
        match self {
            SongFormat::Mld => "MLD",
            SongFormat::Smaf => "SMAF",
        }
    }
}

/// Loop marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Loop start
    Start,
    /// Loop end: jump back to the last start
    End,
}

/// Channel and global controller changes
///
/// Channels are flat indices (`track * 4 + channel`). Values are already
/// normalised: volumes `0.0..=1.0`, pan and bend `-1.0..=1.0`, ranges and
/// tuning in semitones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    /// Program select
    Program {
        /// Target channel
        channel: usize,
        /// Program number
        program: u8,
    },
    /// Bank select (SMAF bit 7 marks a drum bank)
    Bank {
        /// Target channel
        channel: usize,
        /// Raw bank number
        bank: u8,
    },
    /// Channel volume
    Volume {
        /// Target channel
        channel: usize,
        /// `0.0..=1.0`
        value: f32,
    },
    /// Expression (scales channel volume)
    Expression {
        /// Target channel
        channel: usize,
        /// `0.0..=1.0`
        value: f32,
    },
    /// Stereo position
    Pan {
        /// Target channel
        channel: usize,
        /// `-1.0` left .. `1.0` right
        value: f32,
    },
    /// Pitch bend, scaled by the channel's bend range
    PitchBend {
        /// Target channel
        channel: usize,
        /// `-1.0..=1.0`
        value: f32,
    },
    /// Pitch-bend range
    PitchBendRange {
        /// Target channel
        channel: usize,
        /// Semitones
        semitones: f32,
    },
    /// Modulation depth (vibrato is not synthesized)
    Modulation {
        /// Target channel
        channel: usize,
        /// Raw depth
        value: u8,
    },
    /// Toggle i-melody drum interpretation of a channel
    DrumEnable {
        /// Target channel
        channel: usize,
        /// Drums on or off
        enabled: bool,
    },
    /// Tempo change: `timebase` ticks per quarter note at `bpm`
    Tempo {
        /// Ticks per quarter note
        timebase: u16,
        /// Quarter notes per minute
        bpm: u16,
    },
    /// Instance-wide volume
    MasterVolume(f32),
    /// Instance-wide tuning offset in semitones
    MasterTune(f32),
}

impl Control {
    /// Scheduler ticks per second implied by a tempo change
    ///
    /// `None` for every other control and for a zero tempo, which players ignore.
    pub fn tick_rate(&self) -> Option<f64> {
        match *self {
            Control::Tempo { timebase, bpm } if timebase > 0 && bpm > 0 => {
                Some(f64::from(timebase) * f64::from(bpm) / 60.0)
            }
            _ => None,
        }
    }
}

/// One sequence event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Key-on with automatic key-off after `gate` ticks; velocity 0 is a key-off
    Note {
        /// Flat channel index
        channel: usize,
        /// Semitones relative to A4
        key: i32,
        /// Ticks until key-off
        gate: u32,
        /// `0.0..=1.0`
        velocity: f32,
    },
    /// Controller change
    Control(Control),
    /// Loop marker
    Cuepoint(Cue),
    /// Vendor exclusive payload, forwarded to the sampler
    ExtInfo(Vec<u8>),
    /// Explicit end of the track
    EndOfTrack,
    /// Preserved but not interpreted
    Unknown {
        /// Event id
        id: u8,
        /// Raw payload
        data: Vec<u8>,
    },
}

/// Event with the delay that precedes it
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    /// Ticks since the previous event of the same track
    pub delta: u32,
    /// The event
    pub event: Event,
}

impl TimedEvent {
    /// Pair an event with its delay
    pub fn new(delta: u32, event: Event) -> Self {
        Self { delta, event }
    }
}

bitflags! {
    /// SMAF per-channel status nibble
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelStatus: u8 {
        /// Channel follows key control (transpose)
        const KEY_CONTROL = 0b1000;
        /// Channel drives the vibrator
        const VIBRATION = 0b0100;
        /// Two-bit channel type field
        const TYPE = 0b0011;
    }
}

impl ChannelStatus {
    /// Channel type: 0 none, 1 melody, 2 no melody, 3 rhythm
    pub fn channel_type(self) -> u8 {
        (self & ChannelStatus::TYPE).bits()
    }

    /// Split the 16-bit track field into per-channel nibbles (channel 0 first)
    pub fn unpack(raw: u16) -> [ChannelStatus; CHANNELS_PER_TRACK] {
        std::array::from_fn(|ch| {
            let nibble = (raw >> (12 - 4 * ch)) & 0x0F;
            ChannelStatus::from_bits_truncate(nibble as u8)
        })
    }
}

/// SMAF per-track header fields
#[derive(Debug, Clone, PartialEq)]
pub struct SmafTiming {
    /// Sequence type byte (0 stream, 1 sub-sequence)
    pub sequence_type: u8,
    /// Milliseconds per duration unit
    pub duration_ms: u32,
    /// Milliseconds per gate unit
    pub gate_ms: u32,
    /// Per-channel status
    pub channel_status: [ChannelStatus; CHANNELS_PER_TRACK],
    /// Raw setup (`Mtsu`) chunk, not dispatched
    pub setup: Vec<u8>,
}

/// Ordered events of one track
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    /// Events in playback order
    pub events: Vec<TimedEvent>,
    /// First flat channel this track addresses
    pub channel_base: usize,
    /// SMAF track header (SMAF only)
    pub smaf: Option<SmafTiming>,
}

/// Song metadata and the results of the timing scan
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SongInfo {
    /// Title
    pub title: String,
    /// Author or artist
    pub author: String,
    /// Copyright notice
    pub copyright: String,
    /// Creation date
    pub date: String,
    /// Version string
    pub version: String,
    /// Free text and other text fields
    pub comments: String,
    /// Fields the decoder stored without a dedicated slot (`id`, text)
    pub extra: Vec<(String, String)>,
    /// Number of tracks
    pub track_count: usize,
    /// Scheduler ticks until the end (or loop end)
    pub total_ticks: u64,
    /// Tick of the loop start, if the song loops
    pub loop_tick: Option<u64>,
    /// Seconds until the loop start, if the song loops
    pub loop_seconds: Option<f64>,
    /// Seconds until the end (or loop end)
    pub duration_seconds: f64,
}

/// Decoded song
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// Source container
    pub format: SongFormat,
    /// Metadata and timing
    pub info: SongInfo,
    /// Tracks in file order
    pub tracks: Vec<Track>,
    /// Flat channel count the song addresses
    pub channel_count: usize,
    /// Scheduler ticks per second at song start
    pub initial_tick_rate: f64,
    /// ADPCM blobs uploaded to wave RAM before playback (MLD)
    pub wave_data: Vec<Vec<u8>>,
    /// Stored-but-unverified SMAF CRC
    pub crc: Option<u16>,
}

impl Song {
    /// Total number of events over all tracks
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(|t| t.events.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tempo_tick_rate() {
        let tempo = Control::Tempo {
            timebase: 48,
            bpm: 120,
        };
        assert_relative_eq!(tempo.tick_rate().unwrap(), 96.0);
        assert!(Control::Tempo { timebase: 48, bpm: 0 }.tick_rate().is_none());
        assert!(Control::MasterVolume(1.0).tick_rate().is_none());
    }

    #[test]
    fn test_channel_status_unpack() {
        let status = ChannelStatus::unpack(0x8D01);
        assert!(status[0].contains(ChannelStatus::KEY_CONTROL));
        assert_eq!(status[0].channel_type(), 0);
        assert!(status[1].contains(ChannelStatus::KEY_CONTROL | ChannelStatus::VIBRATION));
        assert_eq!(status[1].channel_type(), 1);
        assert!(status[2].is_empty());
        assert_eq!(status[3].channel_type(), 1);
    }
}
