//! Backend trait abstraction for sampler implementations
//!
//! This module defines the control surface a sequencer drives: key events,
//! per-channel controllers, global controls, SysEx and rendering.

use crate::{DrumMode, RenderOptions, Result, VolumeCurve};

/// Common interface for sampler instances
///
/// Channel indices outside `0..channel_count()` and out-of-range values are
/// ignored by implementations rather than reported; sequencers feed them
/// straight from song data.
///
/// Keys are semitones relative to A4 (MIDI note = key + 69).
///
/// # Example
///
/// ```
/// use ma3_sampler::{RenderOptions, SamplerBackend};
///
/// fn strike<B: SamplerBackend>(instance: &mut B) -> ma3_sampler::Result<Vec<f32>> {
///     instance.program_change(0, 24); // nylon guitar
///     instance.key_on(0, -9, 0.8); // C4
///
///     let mut buffer = vec![0.0; 2 * 256];
///     instance.render(&mut buffer, 0, 256, &RenderOptions::default())?;
///     Ok(buffer)
/// }
/// ```
pub trait SamplerBackend: Send {
    /// Number of channels the instance was created with
    fn channel_count(&self) -> usize;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> f64;

    /// Start a note
    ///
    /// # Arguments
    ///
    /// * `channel` - Channel index
    /// * `key` - Semitones relative to A4
    /// * `velocity` - `0.0..=1.0`; zero behaves like [`key_off`](Self::key_off)
    fn key_on(&mut self, channel: usize, key: i32, velocity: f32);

    /// Release a held note
    fn key_off(&mut self, channel: usize, key: i32);

    /// Select a program (0..=127) for subsequent notes
    fn program_change(&mut self, channel: usize, program: u8);

    /// Select a bank for subsequent notes
    fn bank_change(&mut self, channel: usize, bank: u8);

    /// Switch a channel between melodic and drum interpretation
    fn drum_mode(&mut self, channel: usize, mode: DrumMode);

    /// Set channel volume (`0.0..=1.0`) through the given curve
    fn volume(&mut self, channel: usize, volume: f32, curve: VolumeCurve);

    /// Set channel pan (`-1.0` left .. `1.0` right)
    fn panpot(&mut self, channel: usize, pan: f32);

    /// Set pitch bend (`-1.0..=1.0`, scaled by the bend range)
    fn pitch_bend(&mut self, channel: usize, bend: f32);

    /// Set pitch-bend range in semitones
    fn pitch_bend_range(&mut self, channel: usize, semitones: f32);

    /// Set master volume (linear gain)
    fn master_volume(&mut self, volume: f32);

    /// Set master tuning offset in semitones
    fn master_tune(&mut self, semitones: f32);

    /// Handle a Yamaha SysEx message (without the F0/F7 framing)
    ///
    /// Unknown or malformed messages are ignored.
    fn sysex(&mut self, data: &[u8]);

    /// Render interleaved stereo frames
    ///
    /// # Arguments
    ///
    /// * `buffer` - Interleaved L/R output
    /// * `offset` - First frame to write
    /// * `frames` - Number of frames to write
    /// * `options` - Gains, erase/accumulate and clamping
    ///
    /// # Errors
    ///
    /// Fails when `offset + frames` exceeds the buffer or a gain is invalid.
    fn render(
        &mut self,
        buffer: &mut [f32],
        offset: usize,
        frames: usize,
        options: &RenderOptions,
    ) -> Result<()>;

    /// Silence every voice and restore default channel state
    fn reset(&mut self);

    /// True when no voice is sounding
    fn is_finished(&self) -> bool;
}

/// Creates sampler instances
///
/// Implementations hold whatever is shared between instances (preset tables,
/// waveform ROM) and hand out independent voices and channel state.
pub trait SamplerFactory {
    /// Instance type handed out by this factory
    type Instance: SamplerBackend;

    /// Create an instance
    ///
    /// # Arguments
    ///
    /// * `channels` - Number of channels (at least one)
    /// * `sample_rate` - Output sample rate in Hz
    fn make_instance(&self, channels: usize, sample_rate: f64) -> Result<Self::Instance>;
}
