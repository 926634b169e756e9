//! Offline rendering and audio export
//!
//! [`render_song`] runs a player to completion (or through a number of loops)
//! into an interleaved stereo buffer; the `export-wav` feature adds WAV output.
//!
//! # Examples
//!
//! ```no_run
//! use ma3_replayer::export::{export_to_wav, ExportConfig};
//! use ma3_replayer::load_song;
//! use ma3_sampler::{Sampler, SamplerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("ring.mmf")?;
//! let sampler = Sampler::new(SamplerConfig::default())?;
//! let config = ExportConfig::default().loops(1).fade_out(2.0);
//! let mut player = load_song(&data, &sampler, f64::from(config.sample_rate))?;
//!
//! export_to_wav(player.as_mut(), "ring.wav", &config)?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "export-wav")]
mod wav;
#[cfg(feature = "export-wav")]
pub use wav::*;

use log::debug;
use ma3_sampler::RenderOptions;
use serde::{Deserialize, Serialize};

use crate::player::{PlayerEventKind, SongPlayer};
use crate::Result;

/// Frames rendered per player call
const CHUNK_FRAMES: usize = 4096;

/// Export configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output sample rate used when creating the player (default: 44100 Hz)
    pub sample_rate: u32,
    /// Hard limit on the rendered length in seconds
    pub max_seconds: f32,
    /// Extra passes through the loop section of looping songs
    pub loops: u32,
    /// Whether to normalize audio to prevent clipping
    pub normalize: bool,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_duration: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            max_seconds: 600.0,
            loops: 0,
            normalize: true,
            fade_out_duration: 0.0,
        }
    }
}

impl ExportConfig {
    /// Create config with custom sample rate
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    /// Limit the rendered length
    pub fn max_seconds(mut self, seconds: f32) -> Self {
        self.max_seconds = seconds;
        self
    }

    /// Play the loop section this many extra times
    pub fn loops(mut self, count: u32) -> Self {
        self.loops = count;
        self
    }

    /// Enable normalization to prevent clipping
    pub fn normalize(mut self, enable: bool) -> Self {
        self.normalize = enable;
        self
    }

    /// Add fade out at the end
    pub fn fade_out(mut self, duration_seconds: f32) -> Self {
        self.fade_out_duration = duration_seconds;
        self
    }
}

/// Render a song into interleaved stereo samples with post-processing applied
///
/// Rendering stops when the song ends, after `config.loops` extra loop passes,
/// or at `config.max_seconds`, whichever comes first.
pub fn render_song(player: &mut dyn SongPlayer, config: &ExportConfig) -> Result<Vec<f32>> {
    let max_frames = (f64::from(config.max_seconds.max(0.0)) * player.sample_rate()) as usize;
    player.set_playback_events_enabled(true);

    let mut samples = Vec::new();
    let mut chunk = vec![0.0f32; CHUNK_FRAMES * 2];
    let mut loops = 0;
    let options = RenderOptions::default();

    'render: while samples.len() / 2 < max_frames {
        let want = CHUNK_FRAMES.min(max_frames - samples.len() / 2);
        let Some(frames) = player.render(&mut chunk, 0, want, &options)? else {
            break;
        };
        samples.extend_from_slice(&chunk[..frames * 2]);

        for event in player.take_events() {
            match event.kind {
                PlayerEventKind::Loop => {
                    loops += 1;
                    if loops > config.loops {
                        break 'render;
                    }
                }
                PlayerEventKind::End => break 'render,
                PlayerEventKind::Key => {}
            }
        }
    }
    debug!(
        "rendered {} frames ({:.2}s, {loops} loop points)",
        samples.len() / 2,
        samples.len() as f64 / 2.0 / player.sample_rate()
    );

    if config.normalize {
        normalize_samples(&mut samples);
    }
    if config.fade_out_duration > 0.0 {
        let rate = player.sample_rate().round() as u32;
        apply_fade_out(&mut samples, config.fade_out_duration, rate);
    }
    Ok(samples)
}

/// Apply normalization to audio samples
fn normalize_samples(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }

    // Find peak amplitude
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

    // Normalize if peak > 0.95 (leave some headroom)
    if peak > 0.95 {
        let scale = 0.95 / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Apply fade out to the end of interleaved stereo samples
fn apply_fade_out(samples: &mut [f32], fade_duration: f32, sample_rate: u32) {
    if fade_duration <= 0.0 || samples.is_empty() {
        return;
    }

    let frames = samples.len() / 2;
    let fade_frames = ((fade_duration * sample_rate as f32) as usize).clamp(1, frames.max(1));
    let start_fade = frames.saturating_sub(fade_frames);

    for (i, frame) in samples.chunks_exact_mut(2).enumerate().skip(start_fade) {
        let progress = (i - start_fade) as f32 / fade_frames as f32;
        let fade_factor = 1.0 - progress;
        frame[0] *= fade_factor;
        frame[1] *= fade_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_samples() {
        let mut samples = vec![0.5, 1.5, -1.2, 0.8];
        normalize_samples(&mut samples);

        // Check that peak is now <= 0.95
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!(peak <= 0.96); // Allow small floating point error
    }

    #[test]
    fn test_quiet_samples_untouched() {
        let mut samples = vec![0.1, -0.2];
        normalize_samples(&mut samples);
        assert_relative_eq!(samples[1], -0.2);
    }

    #[test]
    fn test_fade_out() {
        let mut samples = vec![1.0; 2000];
        apply_fade_out(&mut samples, 0.1, 4410); // 441 frames

        // First frames should be unchanged, both channels faded alike
        assert_relative_eq!(samples[0], 1.0);
        assert_relative_eq!(samples[1], 1.0);
        let last = samples.len() - 2;
        assert!(samples[last] < 0.01);
        assert_relative_eq!(samples[last], samples[last + 1]);
    }

    #[test]
    fn test_config_builder_and_json() {
        let config = ExportConfig::with_sample_rate(22_050)
            .loops(2)
            .normalize(false)
            .fade_out(1.5);
        assert_eq!(config.sample_rate, 22_050);
        assert_eq!(config.loops, 2);

        let parsed: ExportConfig = serde_json::from_str(r#"{"loops": 3}"#).unwrap();
        assert_eq!(parsed.loops, 3);
        assert_eq!(parsed.sample_rate, 44_100);
    }
}
