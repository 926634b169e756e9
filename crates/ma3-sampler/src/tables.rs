//! Log-domain lookup tables
//!
//! Operators work in the attenuation domain: a waveform lookup yields a
//! log2-attenuation (8 fractional bits) plus a sign bit, the envelope adds its own
//! attenuation, and a single exp lookup turns the sum back into a linear amplitude.
//!
//! The 32 waveforms are built once from four base quarter-wave shapes (sine,
//! triangle, trapezoid, sawtooth) via eight reflect/fold/clamp variants, so
//! `waveform >> 3` picks the base and `waveform & 7` the variant.

use crate::constants::{ENV_LEVEL_MAX, ENV_STEP_DB};

/// Entries in one full waveform period (10-bit phase index)
pub const WAVE_LENGTH: usize = 1024;

/// Number of selectable waveforms
pub const WAVEFORM_COUNT: usize = 32;

/// Sign bit in a waveform entry
pub const WAVE_SIGN: u16 = 0x8000;

/// Attenuation value that always decodes to silence
pub const WAVE_SILENT: u16 = 0x0FFF;

/// Peak linear amplitude produced by [`exp_lookup`]
pub const EXP_PEAK: i32 = 8192;

const QUARTER: usize = WAVE_LENGTH / 4;
const HALF: usize = WAVE_LENGTH / 2;

/// Waveform, exponent and gain tables shared by every instance
pub struct WaveTables {
    waves: Box<[[u16; WAVE_LENGTH]; WAVEFORM_COUNT]>,
    exp: [u16; 256],
    env_gain: [f32; ENV_LEVEL_MAX as usize + 1],
    am: [u8; 256],
}

impl WaveTables {
    /// Build every table. Done once per [`crate::Sampler`].
    pub fn build() -> Self {
        let mut waves = Box::new([[WAVE_SILENT; WAVE_LENGTH]; WAVEFORM_COUNT]);
        for (index, wave) in waves.iter_mut().enumerate() {
            let base = BaseShape::from_index(index >> 3);
            let variant = (index & 7) as u8;
            for (phase, entry) in wave.iter_mut().enumerate() {
                *entry = match variant_sample(base, variant, phase) {
                    Some((amplitude, negative)) => encode_log(amplitude, negative),
                    None => WAVE_SILENT,
                };
            }
        }

        let mut exp = [0u16; 256];
        for (i, entry) in exp.iter_mut().enumerate() {
            *entry = (EXP_PEAK as f64 * 2f64.powf(-(i as f64) / 256.0)).round() as u16;
        }

        let mut env_gain = [0.0f32; ENV_LEVEL_MAX as usize + 1];
        for (level, gain) in env_gain.iter_mut().enumerate() {
            *gain = if level as u16 >= ENV_LEVEL_MAX {
                0.0
            } else {
                10f64.powf(-(level as f64) * ENV_STEP_DB / 20.0) as f32
            };
        }

        let mut am = [0u8; 256];
        for (i, entry) in am.iter_mut().enumerate() {
            // Triangle: 0 -> 255 -> 0 over one LFO period
            let tri = if i < 128 { i * 2 } else { (255 - i) * 2 };
            *entry = tri.min(255) as u8;
        }

        Self {
            waves,
            exp,
            env_gain,
            am,
        }
    }

    /// Waveform table for a waveform select value (masked to 0..=31)
    #[inline]
    pub fn wave(&self, waveform: u8) -> &[u16; WAVE_LENGTH] {
        &self.waves[(waveform as usize) & (WAVEFORM_COUNT - 1)]
    }

    /// Turn a total log attenuation into a signed linear amplitude
    ///
    /// `attenuation` is in 1/256 octave units; anything past 13 octaves is silent.
    #[inline]
    pub fn exp_lookup(&self, attenuation: u32) -> i32 {
        let shift = attenuation >> 8;
        if shift > 13 {
            return 0;
        }
        (self.exp[(attenuation & 0xFF) as usize] >> shift) as i32
    }

    /// Linear gain for an envelope level (used by wave drums)
    #[inline]
    pub fn env_gain(&self, level: u16) -> f32 {
        self.env_gain[level.min(ENV_LEVEL_MAX) as usize]
    }

    /// Amplitude-LFO triangle value (0..=255) for an 8-bit LFO phase
    #[inline]
    pub fn am(&self, phase: u8) -> u8 {
        self.am[phase as usize]
    }
}

impl std::fmt::Debug for WaveTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveTables")
            .field("waveforms", &WAVEFORM_COUNT)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseShape {
    Sine,
    Triangle,
    Trapezoid,
    Sawtooth,
}

impl BaseShape {
    fn from_index(index: usize) -> Self {
        match index & 3 {
            0 => BaseShape::Sine,
            1 => BaseShape::Triangle,
            2 => BaseShape::Trapezoid,
            _ => BaseShape::Sawtooth,
        }
    }

    /// Positive quarter-wave amplitude for `i` in 0..256
    fn quarter(self, i: usize) -> f64 {
        let x = (i as f64 + 0.5) / QUARTER as f64;
        match self {
            BaseShape::Sine => (x * std::f64::consts::FRAC_PI_2).sin(),
            BaseShape::Triangle => x,
            BaseShape::Trapezoid => (x * 2.0).min(1.0),
            // Sawtooth covers its whole half period with one rising ramp
            BaseShape::Sawtooth => x * 0.5,
        }
    }

    /// Positive half-wave amplitude for `p` in 0..512
    fn half(self, p: usize) -> f64 {
        if p < QUARTER {
            self.quarter(p)
        } else if self == BaseShape::Sawtooth {
            // Fold: continue the ramp instead of mirroring it
            0.5 + self.quarter(p - QUARTER)
        } else {
            self.quarter(HALF - 1 - p)
        }
    }
}

/// Amplitude and sign of one waveform variant, `None` for a silent slot
fn variant_sample(base: BaseShape, variant: u8, phase: usize) -> Option<(f64, bool)> {
    let second_half = phase >= HALF;
    let p = phase & (HALF - 1);
    match variant {
        // Full wave
        0 => Some((base.half(p), second_half)),
        // Positive half only
        1 => (!second_half).then(|| (base.half(p), false)),
        // Rectified
        2 => Some((base.half(p), false)),
        // Pulse: first quarter of each half
        3 => (p < QUARTER).then(|| (base.half(p), false)),
        // Double speed, first half only
        4 => (!second_half).then(|| (base.half((phase * 2) & (HALF - 1)), phase >= QUARTER)),
        // Double speed rectified, first half only
        5 => (!second_half).then(|| (base.half((phase * 2) & (HALF - 1)), false)),
        // Square
        6 => Some((1.0, second_half)),
        // Clamped: overdriven base shape
        _ => Some(((base.half(p) * 2.0).min(1.0), second_half)),
    }
}

fn encode_log(amplitude: f64, negative: bool) -> u16 {
    let attenuation = if amplitude <= 1e-6 {
        WAVE_SILENT
    } else {
        ((-amplitude.log2() * 256.0).round() as i64).clamp(0, WAVE_SILENT as i64) as u16
    };
    if negative {
        attenuation | WAVE_SIGN
    } else {
        attenuation
    }
}
