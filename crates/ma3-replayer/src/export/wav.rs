//! WAV file export functionality

use std::path::Path;

use log::info;

use super::{render_song, ExportConfig};
use crate::player::SongPlayer;
use crate::Result;

/// Summary of a finished export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSummary {
    /// Stereo frames written
    pub frames: usize,
    /// Sample rate of the file
    pub sample_rate: u32,
}

impl ExportSummary {
    /// Length of the written audio in seconds
    pub fn seconds(&self) -> f64 {
        self.frames as f64 / f64::from(self.sample_rate)
    }
}

/// Render a song to a 16-bit stereo WAV file
///
/// The file uses the player's sample rate; create the player with
/// `config.sample_rate` to honour the configuration.
///
/// # Examples
///
/// ```no_run
/// use ma3_replayer::export::{export_to_wav, ExportConfig};
/// use ma3_replayer::load_song;
/// use ma3_sampler::{Sampler, SamplerConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = std::fs::read("ring.mld")?;
/// let sampler = Sampler::new(SamplerConfig::default())?;
/// let mut player = load_song(&data, &sampler, 44_100.0)?;
///
/// export_to_wav(player.as_mut(), "ring.wav", &ExportConfig::default())?;
/// # Ok(())
/// # }
/// ```
pub fn export_to_wav<P: AsRef<Path>>(
    player: &mut dyn SongPlayer,
    output_path: P,
    config: &ExportConfig,
) -> Result<ExportSummary> {
    let samples = render_song(player, config)?;
    let sample_rate = player.sample_rate().round() as u32;

    info!("Writing WAV file to {}...", output_path.as_ref().display());
    write_wav_file(output_path.as_ref(), &samples, sample_rate)?;

    Ok(ExportSummary {
        frames: samples.len() / 2,
        sample_rate,
    })
}

/// Write interleaved stereo samples to a 16-bit WAV file
pub fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("Failed to create WAV file: {e}"))?;

    // Convert f32 samples to i16
    for &sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| format!("Failed to write sample: {e}"))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV file: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_wav_file() {
        let path = std::env::temp_dir().join(format!("ma3-wav-test-{}.wav", std::process::id()));
        let samples = [0.0f32, 0.5, -0.5, 1.5];
        write_wav_file(&path, &samples, 22_050).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 22_050);
        let written: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![0, 16383, -16383, i16::MAX]);

        std::fs::remove_file(&path).ok();
    }
}
