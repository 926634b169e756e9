//! Sampler configuration and render options

use serde::{Deserialize, Serialize};

use crate::{Result, SamplerError};

/// Preset generation a table is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetBank {
    /// MA-2: 2-operator instruments, no ROM wave drums
    Ma2,
    /// MA-3: 4-operator instruments and ROM wave drums
    #[default]
    Ma3,
}

impl TryFrom<u8> for PresetBank {
    type Error = SamplerError;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            2 => Ok(PresetBank::Ma2),
            3 => Ok(PresetBank::Ma3),
            _ => Err(SamplerError::ConfigError(format!(
                "unknown preset bank id {id} (expected 2 or 3)"
            ))),
        }
    }
}

impl std::str::FromStr for PresetBank {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ma2" | "ma-2" | "2" => Ok(PresetBank::Ma2),
            "ma3" | "ma-3" | "3" => Ok(PresetBank::Ma3),
            other => Err(SamplerError::ConfigError(format!(
                "unknown preset bank '{other}'"
            ))),
        }
    }
}

/// Choice of preset tables for one [`crate::Sampler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// FM drum kit
    pub fm_drums: PresetBank,
    /// Melodic instruments
    pub instruments: PresetBank,
    /// Built-in wave drums (MA-3 only)
    pub wave_drums: PresetBank,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            fm_drums: PresetBank::Ma3,
            instruments: PresetBank::Ma3,
            wave_drums: PresetBank::Ma3,
        }
    }
}

impl SamplerConfig {
    /// Configuration using the MA-2 tables wherever they exist
    pub fn ma2() -> Self {
        Self {
            fm_drums: PresetBank::Ma2,
            instruments: PresetBank::Ma2,
            wave_drums: PresetBank::Ma3,
        }
    }

    /// Reject combinations that have no preset table behind them
    pub fn validate(&self) -> Result<()> {
        if self.wave_drums == PresetBank::Ma2 {
            return Err(SamplerError::ConfigError(
                "MA-2 has no wave-drum ROM; wave_drums must be ma3".into(),
            ));
        }
        Ok(())
    }
}

/// How a non-negative channel volume value maps to gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeCurve {
    /// `gain = v`, unbounded above
    #[default]
    Linear,
    /// `gain = 10^((1 - v) * -96 / 20)` for `v` in `0.0..=1.0`, full scale spans 96 dB
    Logarithmic,
}

impl VolumeCurve {
    /// Convert a volume value to a linear gain
    pub fn gain(self, volume: f32) -> f32 {
        match self {
            VolumeCurve::Linear if volume.is_finite() => volume.max(0.0),
            VolumeCurve::Linear => 0.0,
            VolumeCurve::Logarithmic => {
                let v = volume.clamp(0.0, 1.0);
                if v <= 0.0 {
                    0.0
                } else {
                    10f32.powf((1.0 - v) * -96.0 / 20.0)
                }
            }
        }
    }
}

/// Percussion interpretation of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrumMode {
    /// Melodic channel
    #[default]
    None,
    /// i-melody drums: the key (A4-relative) selects the drum
    Mfi,
    /// SMAF drums: the channel's program number selects the drum
    Smaf,
}

/// Options for one `render` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Gain applied to the left output
    pub left_gain: f32,
    /// Gain applied to the right output
    pub right_gain: f32,
    /// Overwrite the buffer instead of mixing into it
    pub erase: bool,
    /// Clamp the written samples to `-1.0..=1.0`
    pub clamp: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            left_gain: 1.0,
            right_gain: 1.0,
            erase: true,
            clamp: false,
        }
    }
}

impl RenderOptions {
    /// Mix into the existing buffer contents
    pub fn accumulate() -> Self {
        Self {
            erase: false,
            ..Self::default()
        }
    }

    /// Set both output gains
    pub fn gains(mut self, left: f32, right: f32) -> Self {
        self.left_gain = left;
        self.right_gain = right;
        self
    }

    /// Enable or disable output clamping
    pub fn clamp(mut self, enabled: bool) -> Self {
        self.clamp = enabled;
        self
    }

    /// Check that both gains are usable
    pub fn validate(&self) -> Result<()> {
        for (name, gain) in [("left", self.left_gain), ("right", self.right_gain)] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(SamplerError::InvalidRender(format!(
                    "{name} gain must be finite and non-negative, got {gain}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_validates() {
        assert!(SamplerConfig::default().validate().is_ok());
        assert!(SamplerConfig::ma2().validate().is_ok());
    }

    #[test]
    fn test_ma2_wave_drums_rejected() {
        let config = SamplerConfig {
            wave_drums: PresetBank::Ma2,
            ..SamplerConfig::default()
        };
        assert!(matches!(config.validate(), Err(SamplerError::ConfigError(_))));
    }

    #[test]
    fn test_preset_bank_parsing() {
        assert_eq!(PresetBank::try_from(2).unwrap(), PresetBank::Ma2);
        assert_eq!("MA-3".parse::<PresetBank>().unwrap(), PresetBank::Ma3);
        assert!(matches!(
            PresetBank::try_from(7),
            Err(SamplerError::ConfigError(_))
        ));
        assert!("opl2".parse::<PresetBank>().is_err());
    }

    #[test]
    fn test_volume_curves() {
        assert_relative_eq!(VolumeCurve::Linear.gain(0.25), 0.25);
        assert_relative_eq!(VolumeCurve::Logarithmic.gain(1.0), 1.0);
        assert_relative_eq!(VolumeCurve::Logarithmic.gain(0.75), 10f32.powf(-1.2), epsilon = 1e-6);
        assert_eq!(VolumeCurve::Logarithmic.gain(0.0), 0.0);
        assert_eq!(VolumeCurve::Linear.gain(3.0), 3.0);
        assert_eq!(VolumeCurve::Linear.gain(-0.5), 0.0);
        assert_eq!(VolumeCurve::Logarithmic.gain(3.0), 1.0);
    }

    #[test]
    fn test_render_options_rejects_bad_gain() {
        assert!(RenderOptions::default().validate().is_ok());
        assert!(RenderOptions::default().gains(f32::NAN, 1.0).validate().is_err());
        assert!(RenderOptions::default().gains(1.0, -0.5).validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: SamplerConfig =
            serde_json::from_str(r#"{"instruments":"ma2","fm_drums":"ma2"}"#).unwrap();
        assert_eq!(config.instruments, PresetBank::Ma2);
        assert_eq!(config.wave_drums, PresetBank::Ma3);
    }
}
