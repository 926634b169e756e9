//! Player instantiation and file loading.
//!
//! This module handles:
//! - Loading the optional JSON configuration
//! - Loading MLD/SMAF files from disk
//! - Creating the player and a printable summary of the song

use std::fs;
use std::path::Path;

use log::debug;
use ma3_replayer::export::ExportConfig;
use ma3_replayer::{load_song, MetadataFields, ReplayerError, Result, SongPlayer};
use ma3_sampler::{Sampler, SamplerConfig};
use serde::{Deserialize, Serialize};

/// Contents of a `--config` file.
///
/// ```json
/// { "sampler": { "instruments": "ma2" }, "export": { "loops": 1, "fade_out_duration": 2.0 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Preset bank selection
    pub sampler: SamplerConfig,
    /// Rendering and post-processing
    pub export: ExportConfig,
}

/// Read the configuration file, or the defaults when no path was given.
pub fn load_config(path: Option<&str>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let text = fs::read_to_string(path)?;
    let config = serde_json::from_str(&text)
        .map_err(|e| ReplayerError::ConfigError(format!("{path}: {e}")))?;
    debug!("loaded configuration from {path}: {config:?}");
    Ok(config)
}

/// Information about a loaded player.
pub struct PlayerInfo {
    /// Boxed player instance
    pub player: Box<dyn SongPlayer>,
    /// Human-readable song information
    pub song_info: String,
}

/// Load a song file and create its player.
pub fn create_player(file_path: &str, sampler: &Sampler, sample_rate: u32) -> Result<PlayerInfo> {
    let data = fs::read(file_path)?;
    let player = load_song(&data, sampler, f64::from(sample_rate))?;
    let song_info = describe(file_path, player.as_ref());
    Ok(PlayerInfo { player, song_info })
}

fn describe(file_path: &str, player: &dyn SongPlayer) -> String {
    let song = player.song();
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    let loop_info = match song.loop_seconds() {
        Some(start) => format!("from {start:.2}s"),
        None => "none".to_string(),
    };

    let mut info = format!(
        "File: {}\nFormat: {}\n\
         Title: {}\nAuthor: {}\nCopyright: {}\n\
         Tracks: {} ({} channels, {} events)\n\
         Duration: {} ({:.2}s)\nLoop: {}",
        Path::new(file_path).display(),
        song.format(),
        or_dash(song.title()),
        or_dash(song.author()),
        or_dash(song.copyright()),
        song.info.track_count,
        song.channel_count,
        song.event_count(),
        song.duration_label(),
        song.duration_seconds(),
        loop_info,
    );
    for (key, value) in &song.info.extra {
        info.push_str(&format!("\n{key}: {value}"));
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_sections_are_optional() {
        let config: CliConfig = serde_json::from_str(r#"{"export": {"loops": 2}}"#).unwrap();
        assert_eq!(config.export.loops, 2);
        assert_eq!(config.sampler, SamplerConfig::default());

        assert_eq!(load_config(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            load_config(Some("/nonexistent/ma3-render.json")),
            Err(ReplayerError::Io(_))
        ));
    }
}
