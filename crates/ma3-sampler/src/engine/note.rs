//! Sounding notes
//!
//! A note owns its operator state outright: FM notes carry four operators (the
//! 2-operator graphs leave the last two idle), wave drums carry one envelope and a
//! sample position. Output gain eases toward its target every internal sample so
//! volume and pan changes never click.

use super::operator::{block_fnum, EnvelopeStage, Operator};
use crate::constants::{GAIN_EASE_STEP, INTERNAL_SAMPLE_RATE, LFO_RATES_HZ};
use crate::preset::{FmAlgorithm, PresetId, PresetTables, WaveDrum, WaveSource};
use crate::tables::{WaveTables, EXP_PEAK};

/// Output scale of one FM note (four full-scale carriers would reach 1.0)
const FM_OUTPUT_SCALE: f32 = 0.25 / EXP_PEAK as f32;

/// Output scale of one wave-drum note
const WAVE_OUTPUT_SCALE: f32 = 0.5 / 32_768.0;

/// Sample memory visible to wave drums during one render
pub(crate) struct WaveMemory<'a> {
    pub presets: &'a PresetTables,
    pub ram: Option<&'a [i16]>,
}

impl WaveMemory<'_> {
    fn samples(&self, source: WaveSource) -> Option<&[i16]> {
        match source {
            WaveSource::Ram => self.ram,
            WaveSource::Rom(bank) => self.presets.rom_bank(bank),
        }
    }
}

/// LFO phase (24-bit fraction of one period)
#[derive(Debug, Clone, Copy)]
struct Lfo {
    am_phase: u32,
    increment: u32,
}

impl Lfo {
    fn new(rate: u8) -> Self {
        let hz = LFO_RATES_HZ[(rate & 3) as usize];
        Self {
            am_phase: 0,
            increment: (hz / INTERNAL_SAMPLE_RATE * (1u32 << 24) as f64) as u32,
        }
    }

    /// Current 8-bit AM phase, then advance
    fn tick(&mut self) -> u8 {
        let phase = (self.am_phase >> 16) as u8;
        self.am_phase = (self.am_phase + self.increment) & 0x00FF_FFFF;
        phase
    }
}

#[derive(Debug, Clone)]
enum Voice {
    Fm {
        algorithm: FmAlgorithm,
        operators: [Operator; 4],
        lfo: Lfo,
    },
    Wave {
        drum: WaveDrum,
        envelope: Operator,
        position: f64,
        step: f64,
    },
}

/// One note on a channel
#[derive(Debug, Clone)]
pub(crate) struct Note {
    key: i32,
    preset: PresetId,
    velocity: f32,
    held: bool,
    drum: bool,
    pan_bias: f32,
    gain: [f32; 2],
    voice: Voice,
}

impl Note {
    /// Start an FM note at `freq` Hz
    pub fn fm(key: i32, preset: PresetId, algorithm: FmAlgorithm, freq: f64, velocity: f32, drum: bool) -> Self {
        let mut operators = algorithm.operators.map(Operator::new);
        let count = algorithm.operator_count();
        for operator in operators.iter_mut().take(count) {
            operator.key_on();
        }
        let mut note = Self {
            key,
            preset,
            velocity,
            held: true,
            drum,
            pan_bias: algorithm.pan_bias as f32 / 64.0,
            gain: [0.0; 2],
            voice: Voice::Fm {
                algorithm,
                operators,
                lfo: Lfo::new(algorithm.lfo),
            },
        };
        note.set_frequency(freq);
        note
    }

    /// Start a wave drum
    pub fn wave(key: i32, preset: PresetId, drum: WaveDrum, velocity: f32) -> Self {
        let mut envelope = Operator::new(drum.operator);
        envelope.key_on();
        Self {
            key,
            preset,
            velocity,
            held: true,
            drum: true,
            pan_bias: drum.pan_bias as f32 / 64.0,
            gain: [0.0; 2],
            voice: Voice::Wave {
                drum,
                envelope,
                position: 0.0,
                step: drum.sample_rate as f64 / INTERNAL_SAMPLE_RATE,
            },
        }
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn preset(&self) -> PresetId {
        self.preset
    }

    /// Key is still down
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Started in a drum mode
    pub fn is_drum(&self) -> bool {
        self.drum
    }

    pub fn is_wave_drum(&self) -> bool {
        matches!(self.voice, Voice::Wave { .. })
    }

    pub fn pan_bias(&self) -> f32 {
        self.pan_bias
    }

    /// Re-pitch a held note in place (FM only)
    pub fn set_frequency(&mut self, freq: f64) {
        if let Voice::Fm { operators, .. } = &mut self.voice {
            let (block, fnum) = block_fnum(freq);
            for operator in operators.iter_mut() {
                operator.set_pitch(block, fnum);
            }
        }
    }

    pub fn set_velocity(&mut self, velocity: f32) {
        self.velocity = velocity;
    }

    /// Release the note
    pub fn key_off(&mut self) {
        self.held = false;
        match &mut self.voice {
            Voice::Fm { operators, .. } => operators.iter_mut().for_each(Operator::key_off),
            Voice::Wave { envelope, .. } => envelope.key_off(),
        }
    }

    /// Cut the note without a release
    pub fn stop(&mut self) {
        self.held = false;
        match &mut self.voice {
            Voice::Fm { operators, .. } => operators.iter_mut().for_each(Operator::stop),
            Voice::Wave { envelope, .. } => envelope.stop(),
        }
    }

    /// Every audible operator has reached maximum attenuation
    pub fn is_silent(&self) -> bool {
        match &self.voice {
            Voice::Fm {
                algorithm, operators, ..
            } => {
                let mask = algorithm.carrier_mask();
                operators
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .all(|(_, op)| op.stage() == EnvelopeStage::Done)
            }
            Voice::Wave { envelope, .. } => envelope.stage() == EnvelopeStage::Done,
        }
    }

    /// Silent and faded out; safe to drop
    pub fn is_finished(&self) -> bool {
        self.is_silent() && self.gain == [0.0, 0.0]
    }

    /// Render one internal sample at the given channel gains
    pub fn render(&mut self, tables: &WaveTables, memory: &WaveMemory<'_>, target: [f32; 2]) -> [f32; 2] {
        let sample = match &mut self.voice {
            Voice::Fm {
                algorithm,
                operators,
                lfo,
            } => {
                let lfo_value = tables.am(lfo.tick());
                let count = algorithm.operator_count();
                for operator in operators.iter_mut().take(count) {
                    operator.advance_envelope();
                }
                run_graph(algorithm.connection, operators, tables, lfo_value) as f32 * FM_OUTPUT_SCALE
            }
            Voice::Wave {
                drum,
                envelope,
                position,
                step,
            } => {
                envelope.advance_envelope();
                wave_sample(drum, envelope, position, *step, tables, memory) * WAVE_OUTPUT_SCALE
            }
        };

        let target = if self.is_silent() {
            [0.0; 2]
        } else {
            [target[0] * self.velocity, target[1] * self.velocity]
        };
        for (gain, target) in self.gain.iter_mut().zip(target) {
            *gain = if *gain < target {
                (*gain + GAIN_EASE_STEP).min(target)
            } else {
                (*gain - GAIN_EASE_STEP).max(target)
            };
        }
        [sample * self.gain[0], sample * self.gain[1]]
    }
}

fn wave_sample(
    drum: &WaveDrum,
    envelope: &mut Operator,
    position: &mut f64,
    step: f64,
    tables: &WaveTables,
    memory: &WaveMemory<'_>,
) -> f32 {
    if envelope.stage() == EnvelopeStage::Done {
        return 0.0;
    }
    let Some(data) = memory.samples(drum.source) else {
        envelope.stop();
        return 0.0;
    };
    let end = (drum.end_point as usize).min(data.len());
    if *position as usize >= end {
        let loop_point = drum.loop_point as usize;
        if drum.is_looped() && loop_point < end {
            // One step may span several loop lengths
            let start = loop_point as f64;
            *position = start + (*position - start) % (end - loop_point) as f64;
        } else {
            envelope.stop();
            return 0.0;
        }
    }
    let Some(&sample) = data.get(*position as usize) else {
        envelope.stop();
        return 0.0;
    };
    let value = sample as f32 * tables.env_gain(envelope.attenuation());
    *position += step;
    value
}

/// Route operators through a connection graph and sum the carriers
///
/// Operator 1 always carries self-feedback; graphs 2 and 5 give operator 3 its own.
fn run_graph(connection: u8, ops: &mut [Operator; 4], tables: &WaveTables, lfo: u8) -> i32 {
    let [op1, op2, op3, op4] = ops;
    let fb1 = op1.feedback();
    match connection & 7 {
        0 => {
            let m = op1.compute(fb1, tables, lfo);
            op2.compute(m >> 1, tables, lfo)
        }
        1 => op1.compute(fb1, tables, lfo) + op2.compute(0, tables, lfo),
        2 => {
            let fb3 = op3.feedback();
            op1.compute(fb1, tables, lfo)
                + op2.compute(0, tables, lfo)
                + op3.compute(fb3, tables, lfo)
                + op4.compute(0, tables, lfo)
        }
        3 => {
            let o1 = op1.compute(fb1, tables, lfo);
            let o2 = op2.compute(0, tables, lfo);
            let o3 = op3.compute(o2 >> 1, tables, lfo);
            op4.compute((o1 + o3) >> 1, tables, lfo)
        }
        4 => {
            let o1 = op1.compute(fb1, tables, lfo);
            let o2 = op2.compute(o1 >> 1, tables, lfo);
            let o3 = op3.compute(o2 >> 1, tables, lfo);
            op4.compute(o3 >> 1, tables, lfo)
        }
        5 => {
            let fb3 = op3.feedback();
            let o1 = op1.compute(fb1, tables, lfo);
            let left = op2.compute(o1 >> 1, tables, lfo);
            let o3 = op3.compute(fb3, tables, lfo);
            left + op4.compute(o3 >> 1, tables, lfo)
        }
        6 => {
            let o1 = op1.compute(fb1, tables, lfo);
            let o2 = op2.compute(0, tables, lfo);
            let o3 = op3.compute(o2 >> 1, tables, lfo);
            o1 + op4.compute(o3 >> 1, tables, lfo)
        }
        _ => {
            let o1 = op1.compute(fb1, tables, lfo);
            let o2 = op2.compute(0, tables, lfo);
            let o3 = op3.compute(o2 >> 1, tables, lfo);
            o1 + o3 + op4.compute(0, tables, lfo)
        }
    }
}
