//! Voice presets
//!
//! A preset is either an FM patch ([`FmAlgorithm`]: connection graph plus up to
//! four operator templates) or a [`WaveDrum`] (one ADPCM sample played through a
//! single envelope). [`PresetTables`] holds the instrument banks, the FM drum kit,
//! the built-in wave drums and the wave ROM they point into.

mod drums;
mod instruments;
mod rom;

use crate::config::{PresetBank, SamplerConfig};
use crate::constants::{FM_DRUM_KEY_FIRST, FM_DRUM_KEY_LAST};

pub use rom::ROM_BANK_COUNT;

/// Operator parameters in register units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorTemplate {
    /// Frequency multiplier code (0 = x0.5, 1..=15)
    pub multiplier: u8,
    /// Detune code (0..=7)
    pub detune: u8,
    /// Total level (0..=63, 0.75 dB per unit)
    pub total_level: u8,
    /// Key scale level setting (0..=3)
    pub key_scale_level: u8,
    /// Key scale rate: envelope rates rise faster with pitch
    pub key_scale_rate: bool,
    /// Attack rate (0..=15, 15 is instant)
    pub attack: u8,
    /// Decay rate (0..=15)
    pub decay: u8,
    /// Sustain level (0..=15)
    pub sustain_level: u8,
    /// Sustain (second decay) rate (0..=15, 0 holds)
    pub sustain_rate: u8,
    /// Release rate (0..=15)
    pub release: u8,
    /// Waveform select (0..=31)
    pub waveform: u8,
    /// Self-feedback depth (0..=7), used on feedback operators only
    pub feedback: u8,
    /// Amplitude LFO depth (0..=3)
    pub am_depth: u8,
    /// Keep sounding through key-off (one-shot percussion)
    pub ignore_key_off: bool,
}

impl OperatorTemplate {
    /// Operator that never produces output
    pub const SILENT: Self = Self::new(1, 63).env(0, 0, 15, 0, 15);

    /// Sine operator with a percussive default envelope
    pub const fn new(multiplier: u8, total_level: u8) -> Self {
        Self {
            multiplier,
            detune: 0,
            total_level,
            key_scale_level: 1,
            key_scale_rate: false,
            attack: 15,
            decay: 4,
            sustain_level: 4,
            sustain_rate: 2,
            release: 8,
            waveform: 0,
            feedback: 0,
            am_depth: 0,
            ignore_key_off: false,
        }
    }

    /// Replace the envelope rates
    pub const fn env(self, attack: u8, decay: u8, sustain_level: u8, sustain_rate: u8, release: u8) -> Self {
        Self {
            attack,
            decay,
            sustain_level,
            sustain_rate,
            release,
            ..self
        }
    }

    /// Replace the waveform
    pub const fn wave(self, waveform: u8) -> Self {
        Self { waveform, ..self }
    }

    /// Set feedback depth
    pub const fn fb(self, feedback: u8) -> Self {
        Self { feedback, ..self }
    }

    /// Set detune
    pub const fn dt(self, detune: u8) -> Self {
        Self { detune, ..self }
    }

    /// Set amplitude LFO depth
    pub const fn am(self, am_depth: u8) -> Self {
        Self { am_depth, ..self }
    }

    /// Set key scale level and rate
    pub const fn ks(self, key_scale_level: u8, key_scale_rate: bool) -> Self {
        Self {
            key_scale_level,
            key_scale_rate,
            ..self
        }
    }

    /// Ignore key-off
    pub const fn one_shot(self) -> Self {
        Self {
            ignore_key_off: true,
            ..self
        }
    }

    /// Copy with total level raised by `amount`, saturating at 63
    pub const fn quieter(self, amount: u8) -> Self {
        let tl = self.total_level as u16 + amount as u16;
        Self {
            total_level: if tl > 63 { 63 } else { tl as u8 },
            ..self
        }
    }
}

/// Carrier operator masks per connection (bit n = operator n+1 is audible)
pub const CARRIER_MASKS: [u8; 8] = [0b0010, 0b0011, 0b1111, 0b1000, 0b1000, 0b1010, 0b1001, 0b1101];

/// An FM patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmAlgorithm {
    /// Connection graph (0..=7); 0 and 1 are 2-operator graphs
    pub connection: u8,
    /// LFO rate setting (0..=3)
    pub lfo: u8,
    /// Pan offset, -64 (left) ..= 63 (right)
    pub pan_bias: i8,
    /// Operator templates; the last two are unused by 2-operator graphs
    pub operators: [OperatorTemplate; 4],
}

impl FmAlgorithm {
    /// 2-operator patch (connection 0 = FM, 1 = additive)
    pub const fn two_op(connection: u8, modulator: OperatorTemplate, carrier: OperatorTemplate) -> Self {
        Self {
            connection: connection & 1,
            lfo: 1,
            pan_bias: 0,
            operators: [modulator, carrier, OperatorTemplate::SILENT, OperatorTemplate::SILENT],
        }
    }

    /// 4-operator patch
    pub const fn four_op(connection: u8, operators: [OperatorTemplate; 4]) -> Self {
        Self {
            connection: connection & 7,
            lfo: 1,
            pan_bias: 0,
            operators,
        }
    }

    /// Same patch with a different LFO rate
    pub const fn with_lfo(self, lfo: u8) -> Self {
        Self { lfo: lfo & 3, ..self }
    }

    /// Number of operators the connection graph uses
    pub fn operator_count(&self) -> usize {
        if self.connection < 2 {
            2
        } else {
            4
        }
    }

    /// Bit mask of audible operators
    pub fn carrier_mask(&self) -> u8 {
        CARRIER_MASKS[(self.connection & 7) as usize]
    }
}

/// Where a wave drum's samples live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveSource {
    /// Instance wave RAM (uploaded by SysEx or the song)
    Ram,
    /// Built-in ROM bank
    Rom(u8),
}

/// An ADPCM one-shot (or looped) drum sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveDrum {
    /// Sample storage
    pub source: WaveSource,
    /// Playback rate of the stored samples in Hz
    pub sample_rate: u16,
    /// Loop start in samples; loops only when less than `end_point`
    pub loop_point: u32,
    /// End of the sample in samples
    pub end_point: u32,
    /// Amplitude envelope
    pub operator: OperatorTemplate,
    /// Pan offset, -64 (left) ..= 63 (right)
    pub pan_bias: i8,
}

impl WaveDrum {
    /// True when playback wraps to `loop_point` instead of stopping
    pub fn is_looped(&self) -> bool {
        self.loop_point < self.end_point
    }
}

/// An FM drum: fixed-pitch FM patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmDrum {
    /// MIDI key the drum sounds at, regardless of the triggering key
    pub pitch: i32,
    /// Patch
    pub algorithm: FmAlgorithm,
}

/// Identity of the preset a note was started from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetId {
    /// Instrument from a bank
    Instrument {
        /// Bank number after fallback
        bank: u8,
        /// Program number after bank forcing
        program: u8,
    },
    /// FM drum by MIDI key
    FmDrum(u8),
    /// Built-in wave drum by MIDI key
    WaveDrum(u8),
    /// Custom (SysEx-registered) wave drum by MIDI key
    CustomWaveDrum(u8),
}

/// All built-in preset data for one [`SamplerConfig`]
#[derive(Debug)]
pub struct PresetTables {
    instruments: Vec<FmAlgorithm>,
    effect_banks: [FmAlgorithm; 2],
    fm_drums: Vec<Option<FmDrum>>,
    wave_drums: Vec<Option<WaveDrum>>,
    rom: Vec<Vec<i16>>,
}

impl PresetTables {
    /// Build the tables selected by `config`, including the wave ROM
    pub fn build(config: &SamplerConfig) -> Self {
        let rom = rom::build_rom_banks();
        let instruments = match config.instruments {
            PresetBank::Ma2 => instruments::ma2_bank(),
            PresetBank::Ma3 => instruments::ma3_bank(),
        };
        let fm_drums = match config.fm_drums {
            PresetBank::Ma2 => drums::ma2_kit(),
            PresetBank::Ma3 => drums::ma3_kit(),
        };
        let wave_drums = match config.wave_drums {
            PresetBank::Ma3 => drums::rom_wave_drums(&rom),
            PresetBank::Ma2 => vec![None; 128],
        };
        Self {
            instruments,
            effect_banks: instruments::effect_banks(),
            fm_drums,
            wave_drums,
            rom,
        }
    }

    /// Resolve a melodic instrument
    ///
    /// Bank 0 is the GM set; banks 1 and 2 hold a single effect patch each
    /// (the program is forced to 0); any other bank falls back to bank 0.
    pub fn instrument(&self, bank: u8, program: u8) -> (PresetId, FmAlgorithm) {
        let program = program & 0x7F;
        match bank {
            1 | 2 => (
                PresetId::Instrument { bank, program: 0 },
                self.effect_banks[(bank - 1) as usize],
            ),
            _ => (
                PresetId::Instrument { bank: 0, program },
                self.instruments[program as usize],
            ),
        }
    }

    /// FM drum for a MIDI key, if the kit covers it
    pub fn fm_drum(&self, midi_key: i32) -> Option<FmDrum> {
        if !(FM_DRUM_KEY_FIRST..=FM_DRUM_KEY_LAST).contains(&midi_key) {
            return None;
        }
        self.fm_drums.get(midi_key as usize).copied().flatten()
    }

    /// Built-in wave drum for a MIDI key
    pub fn wave_drum(&self, midi_key: i32) -> Option<WaveDrum> {
        if !(0..128).contains(&midi_key) {
            return None;
        }
        self.wave_drums[midi_key as usize]
    }

    /// Decoded ROM bank
    pub fn rom_bank(&self, bank: u8) -> Option<&[i16]> {
        self.rom.get(bank as usize).map(Vec::as_slice)
    }

    /// Number of ROM banks
    pub fn rom_bank_count(&self) -> usize {
        self.rom.len()
    }
}
