//! Per-channel controller state and note list

use arrayvec::ArrayVec;

use super::note::Note;
use crate::config::DrumMode;
use crate::constants::{DEFAULT_BEND_RANGE, MAX_NOTES_PER_CHANNEL};

/// Controller state of one channel plus the notes it owns
#[derive(Debug, Clone)]
pub(crate) struct Channel {
    pub program: u8,
    pub bank: u8,
    pub drum_mode: DrumMode,
    /// Volume after the volume curve
    pub gain: f32,
    /// -1.0 (left) ..= 1.0 (right)
    pub pan: f32,
    /// -1.0 ..= 1.0, scaled by `bend_range`
    pub bend: f32,
    pub bend_range: f32,
    pub notes: ArrayVec<Note, MAX_NOTES_PER_CHANNEL>,
}

/// Gain and pan of a channel, copied out so notes can be borrowed mutably
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChannelMix {
    gain: f32,
    pan: f32,
}

impl ChannelMix {
    /// Left/right gain for a note, before velocity
    ///
    /// Pan is linear: the far side falls to zero while the near side stays at unity.
    pub fn note_gains(&self, pan_bias: f32, master: f32) -> [f32; 2] {
        let pan = (self.pan + pan_bias).clamp(-1.0, 1.0);
        let gain = self.gain * master;
        [gain * (1.0 - pan).min(1.0), gain * (1.0 + pan).min(1.0)]
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            program: 0,
            bank: 0,
            drum_mode: DrumMode::None,
            gain: 1.0,
            pan: 0.0,
            bend: 0.0,
            bend_range: DEFAULT_BEND_RANGE,
            notes: ArrayVec::new(),
        }
    }
}

impl Channel {
    /// Pitch offset in semitones from the bend wheel
    pub fn bend_semitones(&self) -> f32 {
        self.bend * self.bend_range
    }

    /// Snapshot of the gain-related controls
    pub fn mix(&self) -> ChannelMix {
        ChannelMix {
            gain: self.gain,
            pan: self.pan,
        }
    }

    /// Add a note, stealing the oldest one when the list is full
    pub fn push_note(&mut self, note: Note) {
        if self.notes.is_full() {
            self.notes.remove(0);
        }
        self.notes.push(note);
    }

    /// Index of the held note on `key`, if any
    pub fn held_note(&self, key: i32) -> Option<usize> {
        self.notes.iter().position(|n| n.is_held() && n.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{FmAlgorithm, OperatorTemplate, PresetId};
    use approx::assert_relative_eq;

    fn note(key: i32) -> Note {
        let alg = FmAlgorithm::two_op(0, OperatorTemplate::new(1, 30), OperatorTemplate::new(1, 0));
        Note::fm(key, PresetId::Instrument { bank: 0, program: 0 }, alg, 440.0, 1.0, false)
    }

    #[test]
    fn test_linear_pan() {
        let mut channel = Channel::default();
        assert_eq!(channel.mix().note_gains(0.0, 1.0), [1.0, 1.0]);
        channel.pan = -1.0;
        assert_eq!(channel.mix().note_gains(0.0, 1.0), [1.0, 0.0]);
        channel.pan = 0.5;
        let [l, r] = channel.mix().note_gains(0.0, 0.5);
        assert_relative_eq!(l, 0.25);
        assert_relative_eq!(r, 0.5);
        // Bias is clamped together with the channel pan
        assert_eq!(channel.mix().note_gains(1.0, 1.0), [0.0, 1.0]);
    }

    #[test]
    fn test_oldest_note_is_stolen() {
        let mut channel = Channel::default();
        for key in 0..MAX_NOTES_PER_CHANNEL as i32 + 3 {
            channel.push_note(note(key));
        }
        assert_eq!(channel.notes.len(), MAX_NOTES_PER_CHANNEL);
        assert_eq!(channel.notes[0].key(), 3);
        assert_eq!(channel.held_note(3), Some(0));
        assert_eq!(channel.held_note(0), None);
    }
}
