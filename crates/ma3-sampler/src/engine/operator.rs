//! FM operator: phase generator, envelope generator and log-domain output
//!
//! The envelope runs in 0.1875 dB steps (0 = loudest, 511 = silent) with a
//! 16.16 fixed-point step accumulator, so every rate advances the level by a
//! whole number of steps per sample on average.

use crate::constants::{
    rate_increment, sustain_level, AM_DEPTH, CLOCK_DIVIDER, DETUNE_OFFSETS, ENV_LEVEL_MAX, KSL_ROM,
    KSL_SHIFT, MASTER_CLOCK_HZ, MAX_BLOCK, MAX_FNUM, MUL_X2, PHASE_MASK, REFERENCE_FREQ, TL_STEPS,
};
use crate::preset::OperatorTemplate;
use crate::tables::{WaveTables, WAVE_SIGN};

/// Envelope generator stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Level falls toward 0 (loudest)
    Attack,
    /// Level rises toward the sustain level
    Decay,
    /// Level keeps rising at the sustain rate (0 holds)
    Sustain,
    /// Key released; level rises at the release rate
    Release,
    /// Maximum attenuation reached
    Done,
}

/// Compute the phase-generator block and F-number for a frequency in Hz
///
/// The block is the octave of the note relative to the A4 reference; the F-number
/// is then chosen so `fnum << block` steps a 20-bit phase at the internal rate.
pub fn block_fnum(freq: f64) -> (u8, u16) {
    if !freq.is_finite() || freq <= 0.0 {
        return (0, 0);
    }
    let semitones = ((freq / REFERENCE_FREQ).log2() * 12.0).round() as i32 + 57;
    let block = (semitones / 12).clamp(0, MAX_BLOCK as i32);
    let fnum = (freq * 2f64.powi(20 - block) * CLOCK_DIVIDER / MASTER_CLOCK_HZ)
        .round()
        .clamp(0.0, MAX_FNUM as f64);
    (block as u8, fnum as u16)
}

/// Effective envelope rate 0..=63 for a register rate and key-scale value
#[inline]
fn effective_rate(rate: u8, key_scale: u8) -> u8 {
    if rate == 0 {
        0
    } else {
        (rate * 4 + key_scale).min(63)
    }
}

/// One operator of a sounding note
#[derive(Debug, Clone, Copy)]
pub struct Operator {
    template: OperatorTemplate,
    stage: EnvelopeStage,
    level: u16,
    env_acc: u32,
    phase: u32,
    phase_inc: u32,
    key_scale: u8,
    ksl_att: u16,
    history: [i32; 2],
}

impl Operator {
    /// Operator at rest (silent) for a template
    pub fn new(template: OperatorTemplate) -> Self {
        Self {
            template,
            stage: EnvelopeStage::Done,
            level: ENV_LEVEL_MAX,
            env_acc: 0,
            phase: 0,
            phase_inc: 0,
            key_scale: 0,
            ksl_att: 0,
            history: [0; 2],
        }
    }

    /// Current envelope stage
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Current envelope level (0..=511)
    pub fn level(&self) -> u16 {
        self.level
    }

    /// Restart the envelope from the current level
    ///
    /// An attack rate of 0 can never open the envelope, so such operators go
    /// straight to `Done`.
    pub fn key_on(&mut self) {
        self.env_acc = 0;
        self.stage = if self.template.attack == 0 {
            self.level = ENV_LEVEL_MAX;
            EnvelopeStage::Done
        } else {
            EnvelopeStage::Attack
        };
    }

    /// Enter release unless the template ignores key-off
    pub fn key_off(&mut self) {
        if self.template.ignore_key_off || self.stage == EnvelopeStage::Done {
            return;
        }
        self.stage = EnvelopeStage::Release;
    }

    /// Force the envelope to silence
    pub fn stop(&mut self) {
        self.stage = EnvelopeStage::Done;
        self.level = ENV_LEVEL_MAX;
    }

    /// Program the phase increment and key scaling for a block/F-number pair
    pub fn set_pitch(&mut self, block: u8, fnum: u16) {
        let block = block.min(MAX_BLOCK) as u32;
        let fnum = fnum.min(MAX_FNUM) as i64;
        let detune = DETUNE_OFFSETS[(self.template.detune & 7) as usize] as i64;
        let base = ((fnum + detune).max(0) << block) as u64;
        let multiplier = MUL_X2[(self.template.multiplier & 15) as usize] as u64;
        self.phase_inc = ((base * multiplier) >> 1) as u32;

        let ks_index = (block * 2 + (fnum as u32 >> 9)) as u8;
        self.key_scale = if self.template.key_scale_rate {
            ks_index
        } else {
            ks_index >> 2
        };

        let ksl = KSL_ROM[(fnum >> 6) as usize & 15] as i32 - 8 * (7 - block as i32);
        let shift = KSL_SHIFT[(self.template.key_scale_level & 3) as usize];
        self.ksl_att = ((ksl.max(0) as u32 * 4) >> shift) as u16;
    }

    /// Advance the envelope by one internal sample
    pub fn advance_envelope(&mut self) {
        match self.stage {
            EnvelopeStage::Attack => {
                if self.template.attack >= 15 {
                    self.level = 0;
                } else {
                    let steps = self.steps(self.template.attack);
                    for _ in 0..steps {
                        if self.level == 0 {
                            break;
                        }
                        self.level = self.level.saturating_sub((self.level >> 3) + 1);
                    }
                }
                if self.level == 0 {
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                let target = sustain_level(self.template.sustain_level);
                let steps = self.steps(self.template.decay);
                self.level = (self.level + steps).min(ENV_LEVEL_MAX);
                if self.level >= target {
                    self.level = self.level.max(target);
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                let steps = self.steps(self.template.sustain_rate);
                self.rise(steps);
            }
            EnvelopeStage::Release => {
                let steps = self.steps(self.template.release);
                self.rise(steps);
            }
            EnvelopeStage::Done => {}
        }
    }

    fn rise(&mut self, steps: u16) {
        self.level = (self.level + steps).min(ENV_LEVEL_MAX);
        if self.level >= ENV_LEVEL_MAX {
            self.stage = EnvelopeStage::Done;
        }
    }

    fn steps(&mut self, rate: u8) -> u16 {
        let rate = effective_rate(rate, self.key_scale);
        self.env_acc += rate_increment(rate);
        let steps = self.env_acc >> 16;
        self.env_acc &= 0xFFFF;
        steps as u16
    }

    /// Envelope attenuation including total level and key scaling
    #[inline]
    pub fn attenuation(&self) -> u16 {
        (self.level + self.template.total_level as u16 * TL_STEPS + self.ksl_att).min(ENV_LEVEL_MAX)
    }

    /// Amplitude-LFO attenuation for this operator's depth
    #[inline]
    pub fn am_attenuation(&self, lfo_value: u8) -> u16 {
        (lfo_value as u16 * AM_DEPTH[(self.template.am_depth & 3) as usize]) >> 8
    }

    /// Self-feedback modulation from the last two outputs
    #[inline]
    pub fn feedback(&self) -> i32 {
        let fb = self.template.feedback & 7;
        if fb == 0 {
            0
        } else {
            (self.history[0] + self.history[1]) >> (10 - fb as u32)
        }
    }

    /// Produce one output sample and advance the phase
    ///
    /// `modulation` is added to the 10-bit waveform index.
    pub fn compute(&mut self, modulation: i32, tables: &WaveTables, lfo_value: u8) -> i32 {
        let out = if self.stage == EnvelopeStage::Done {
            0
        } else {
            let index = (((self.phase >> 10) as i32 + modulation) & 1023) as usize;
            let entry = tables.wave(self.template.waveform)[index];
            let envelope = (self.attenuation() + self.am_attenuation(lfo_value)).min(ENV_LEVEL_MAX);
            let magnitude = tables.exp_lookup((entry & !WAVE_SIGN) as u32 + ((envelope as u32) << 3));
            if entry & WAVE_SIGN != 0 {
                -magnitude
            } else {
                magnitude
            }
        };
        self.phase = (self.phase + self.phase_inc) & PHASE_MASK;
        self.history = [out, self.history[0]];
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INTERNAL_SAMPLE_RATE;
    use approx::assert_relative_eq;

    fn pitched(template: OperatorTemplate, freq: f64) -> Operator {
        let mut op = Operator::new(template);
        let (block, fnum) = block_fnum(freq);
        op.set_pitch(block, fnum);
        op
    }

    #[test]
    fn test_block_fnum_reproduces_frequency() {
        for freq in [55.0, 261.63, 440.0, 1760.0, 3520.0] {
            let (block, fnum) = block_fnum(freq);
            let back = fnum as f64 * INTERNAL_SAMPLE_RATE / 2f64.powi(20 - block as i32);
            assert_relative_eq!(back, freq, max_relative = 0.01);
        }
    }

    #[test]
    fn test_block_fnum_rejects_bad_input() {
        assert_eq!(block_fnum(0.0), (0, 0));
        assert_eq!(block_fnum(f64::NAN), (0, 0));
        assert_eq!(block_fnum(-10.0), (0, 0));
    }

    #[test]
    fn test_block_fnum_within_register_range() {
        for key in -80..60 {
            let freq = 440.0 * 2f64.powf(key as f64 / 12.0);
            let (block, fnum) = block_fnum(freq);
            assert!(block <= MAX_BLOCK);
            assert!(fnum <= MAX_FNUM);
        }
    }

    #[test]
    fn test_envelope_stage_order() {
        let template = OperatorTemplate::new(1, 0).env(12, 8, 4, 6, 10);
        let mut op = pitched(template, 440.0);
        op.key_on();
        let mut seen = vec![op.stage()];
        for i in 0..400_000 {
            if i == 20_000 {
                op.key_off();
            }
            op.advance_envelope();
            if *seen.last().unwrap() != op.stage() {
                seen.push(op.stage());
            }
            assert!(op.level() <= ENV_LEVEL_MAX);
            if op.stage() == EnvelopeStage::Done {
                break;
            }
        }
        assert_eq!(seen.first(), Some(&EnvelopeStage::Attack));
        assert_eq!(seen.last(), Some(&EnvelopeStage::Done));
        for pair in seen.windows(2) {
            let rank = |s: EnvelopeStage| s as u8;
            assert!(rank(pair[0]) < rank(pair[1]), "{seen:?}");
        }
    }

    #[test]
    fn test_instant_attack() {
        let mut op = pitched(OperatorTemplate::new(1, 0).env(15, 0, 0, 0, 8), 440.0);
        op.key_on();
        op.advance_envelope();
        assert_eq!(op.level(), 0);
        assert_eq!(op.stage(), EnvelopeStage::Decay);
    }

    #[test]
    fn test_zero_attack_never_sounds() {
        let mut op = pitched(OperatorTemplate::new(1, 0).env(0, 4, 4, 4, 8), 440.0);
        op.key_on();
        assert_eq!(op.stage(), EnvelopeStage::Done);
        assert_eq!(op.compute(0, &WaveTables::build(), 0), 0);
    }

    #[test]
    fn test_one_shot_ignores_key_off() {
        let mut op = pitched(OperatorTemplate::new(1, 0).one_shot(), 440.0);
        op.key_on();
        op.key_off();
        assert_eq!(op.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_sine_output_frequency() {
        let tables = WaveTables::build();
        let mut op = pitched(OperatorTemplate::new(1, 0).env(15, 0, 0, 0, 8), 1000.0);
        op.key_on();
        let samples = INTERNAL_SAMPLE_RATE as usize;
        let mut crossings = 0;
        let mut last = 0;
        for _ in 0..samples {
            op.advance_envelope();
            let out = op.compute(0, &tables, 0);
            if last < 0 && out >= 0 {
                crossings += 1;
            }
            last = out;
        }
        assert!((crossings as i32 - 1000).abs() <= 10, "crossings {crossings}");
    }

    #[test]
    fn test_total_level_attenuates() {
        let loud = OperatorTemplate::new(1, 0);
        let quiet = OperatorTemplate::new(1, 40);
        assert!(pitched(quiet, 440.0).attenuation() > pitched(loud, 440.0).attenuation());
    }
}
