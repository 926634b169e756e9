//! MA-3 Hardware Constants
//!
//! Clock figures, register ranges and the small ROM-style lookup tables shared by
//! the envelope generator and the operator pipeline.

/// Master clock of the MA-3 family (Hz)
pub const MASTER_CLOCK_HZ: f64 = 33_868_800.0;

/// Master clock divider producing the internal sample rate
pub const CLOCK_DIVIDER: f64 = 684.0;

/// Internal synthesis rate (about 49515.79 Hz)
pub const INTERNAL_SAMPLE_RATE: f64 = MASTER_CLOCK_HZ / CLOCK_DIVIDER;

/// Highest (quietest) envelope attenuation level
///
/// One step is 0.1875 dB, so 511 steps cover roughly 96 dB.
pub const ENV_LEVEL_MAX: u16 = 511;

/// Attenuation of one envelope step in dB
pub const ENV_STEP_DB: f64 = 0.1875;

/// Highest octave block of the phase generator
pub const MAX_BLOCK: u8 = 7;

/// Highest F-number of the phase generator (10 bits)
pub const MAX_FNUM: u16 = 1023;

/// Phase accumulator width in bits; the top 10 bits index the waveform
pub const PHASE_BITS: u32 = 20;

/// Phase accumulator mask
pub const PHASE_MASK: u32 = (1 << PHASE_BITS) - 1;

/// Tuning reference used by the pitch calculation (A4)
pub const REFERENCE_FREQ: f64 = 440.0;

/// Key number offset between the sampler's A4-relative keys and MIDI notes
pub const MIDI_A4: i32 = 69;

/// Notes tracked per channel before the oldest is stolen
pub const MAX_NOTES_PER_CHANNEL: usize = 16;

/// Keys that can carry a custom wave-drum preset
pub const MAX_CUSTOM_WAVE_DRUMS: usize = 128;

/// MIDI keys covered by the built-in FM drum kit (GM 35..=81)
pub const FM_DRUM_KEY_FIRST: i32 = 35;

/// Last MIDI key covered by the built-in FM drum kit
pub const FM_DRUM_KEY_LAST: i32 = 81;

/// Default pitch-bend range in semitones
pub const DEFAULT_BEND_RANGE: f32 = 2.0;

/// Per-internal-sample gain step used when a note eases toward its target gain
pub const GAIN_EASE_STEP: f32 = 1.0 / 128.0;

/// Total-level attenuation per unit (0.75 dB = 4 envelope steps)
pub const TL_STEPS: u16 = 4;

/// Sustain level per SL nibble, in envelope steps (3 dB per unit, 15 = max)
pub const SUSTAIN_LEVELS: [u16; 16] = [
    0, 16, 32, 48, 64, 80, 96, 112, 128, 144, 160, 176, 192, 208, 224, 496,
];

/// Frequency multiplier ROM, doubled (index 0 = x0.5)
pub const MUL_X2: [u32; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

/// Detune offsets in F-number units before block scaling
pub const DETUNE_OFFSETS: [i32; 8] = [0, 1, 2, 3, 0, -1, -2, -3];

/// Key-scale-level ROM indexed by the top four F-number bits (0.75 dB units)
pub const KSL_ROM: [u16; 16] = [0, 24, 32, 37, 40, 43, 45, 47, 48, 50, 51, 52, 53, 54, 55, 56];

/// Right shifts applied to the KSL value for settings 0..=3 (0, 3, 1.5, 6 dB/oct)
pub const KSL_SHIFT: [u32; 4] = [8, 1, 2, 0];

/// Peak depth of the amplitude LFO in envelope steps, per DAM setting
pub const AM_DEPTH: [u16; 4] = [0, 7, 15, 26];

/// LFO rates in Hz for the four LFO settings
pub const LFO_RATES_HZ: [f64; 4] = [1.8, 4.0, 5.9, 7.0];

/// Sample rate of the synthesized ROM wave banks
pub const ROM_SAMPLE_RATE: u16 = 8_000;

/// Yamaha manufacturer ID, first byte of every accepted SysEx
pub const SYSEX_YAMAHA: u8 = 0x43;
/// MA-series device ID
pub const SYSEX_DEVICE: u8 = 0x03;
/// Set the master fade level: `level`
pub const SYSEX_LEVEL: u8 = 0x01;
/// Register custom wave-drum presets: `count`, then `count` entries
pub const SYSEX_WAVE_DRUMS: u8 = 0x02;
/// Replace wave RAM with an ADPCM blob
pub const SYSEX_WAVE_RAM: u8 = 0x03;
/// Bytes per wave-drum entry in a [`SYSEX_WAVE_DRUMS`] message
pub const WAVE_DRUM_ENTRY_LEN: usize = 12;

/// Sustain level in envelope steps for an SL nibble
#[inline]
pub fn sustain_level(sl: u8) -> u16 {
    SUSTAIN_LEVELS[(sl & 0x0F) as usize]
}

/// Envelope step increment (16.16 fixed point) for an effective rate 0..=63
///
/// Rates below 4 never advance; every four rates the step doubles.
#[inline]
pub fn rate_increment(rate: u8) -> u32 {
    let rate = rate.min(63) as u32;
    if rate < 4 {
        return 0;
    }
    ((4 + (rate & 3)) << (rate >> 2)) << 1
}
