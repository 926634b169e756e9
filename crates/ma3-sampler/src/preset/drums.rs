//! Drum kits
//!
//! The FM kit maps every GM percussion key (35..=81) onto one of a handful of
//! drum archetypes at a fixed pitch. MA-3 layers a detuned second pair on top of
//! each 2-operator archetype. The built-in wave drums cover the noisy parts of the
//! kit from the ROM banks.

use super::rom::{ROM_CLAP, ROM_CYMBAL, ROM_HAT, ROM_SNARE};
use super::{FmAlgorithm, FmDrum, OperatorTemplate as Op, WaveDrum, WaveSource};
use crate::constants::{FM_DRUM_KEY_FIRST, FM_DRUM_KEY_LAST, ROM_SAMPLE_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Kick,
    Snare,
    Tom,
    ClosedHat,
    OpenHat,
    Cymbal,
    Clap,
    Metal,
    Wood,
}

fn archetype(kind: Kind) -> FmAlgorithm {
    let mut patch = match kind {
        Kind::Kick => FmAlgorithm::two_op(
            0,
            Op::new(1, 20).fb(5).env(15, 10, 15, 10, 10),
            Op::new(1, 0).env(15, 6, 15, 6, 9),
        ),
        Kind::Snare => FmAlgorithm::two_op(
            1,
            Op::new(15, 4).fb(7).env(15, 8, 15, 8, 9),
            Op::new(1, 6).env(15, 8, 15, 8, 9),
        ),
        Kind::Tom => FmAlgorithm::two_op(
            0,
            Op::new(1, 30).env(15, 9, 15, 9, 9),
            Op::new(1, 0).env(15, 6, 15, 6, 8),
        ),
        Kind::ClosedHat => FmAlgorithm::two_op(
            1,
            Op::new(15, 6).fb(7).env(15, 12, 15, 12, 12),
            Op::new(11, 14).wave(6).env(15, 12, 15, 12, 12),
        ),
        Kind::OpenHat => FmAlgorithm::two_op(
            1,
            Op::new(15, 6).fb(7).env(15, 7, 15, 7, 7),
            Op::new(11, 14).wave(6).env(15, 7, 15, 7, 7),
        ),
        Kind::Cymbal => FmAlgorithm::two_op(
            1,
            Op::new(15, 4).fb(7).env(15, 5, 15, 5, 5),
            Op::new(13, 12).wave(6).env(15, 5, 15, 5, 5),
        ),
        Kind::Clap => FmAlgorithm::two_op(
            1,
            Op::new(9, 6).fb(7).env(15, 9, 15, 9, 9),
            Op::new(3, 16).env(15, 9, 15, 9, 9),
        ),
        Kind::Metal => FmAlgorithm::two_op(
            0,
            Op::new(7, 22).env(15, 7, 15, 7, 7),
            Op::new(2, 2).env(15, 7, 15, 7, 7),
        ),
        Kind::Wood => FmAlgorithm::two_op(
            0,
            Op::new(3, 26).env(15, 11, 15, 11, 11),
            Op::new(1, 4).env(15, 10, 15, 10, 10),
        ),
    };
    for operator in patch.operators.iter_mut().take(2) {
        *operator = operator.one_shot();
    }
    patch
}

/// (archetype, sounding MIDI pitch) for GM keys 35..=81
fn gm_drum(key: i32) -> (Kind, i32) {
    match key {
        35 => (Kind::Kick, 26),
        36 => (Kind::Kick, 28),
        37 => (Kind::Wood, 74),
        38 | 40 => (Kind::Snare, 50),
        39 => (Kind::Clap, 60),
        41 => (Kind::Tom, 41),
        43 => (Kind::Tom, 45),
        45 => (Kind::Tom, 48),
        47 => (Kind::Tom, 52),
        48 => (Kind::Tom, 55),
        50 => (Kind::Tom, 59),
        42 | 44 => (Kind::ClosedHat, 90),
        46 => (Kind::OpenHat, 90),
        49 | 52 | 55 | 57 => (Kind::Cymbal, 84),
        51 | 53 | 59 => (Kind::Cymbal, 96),
        54 | 69 | 70 => (Kind::ClosedHat, 96),
        56 => (Kind::Metal, 69),
        58 => (Kind::Wood, 55),
        60 | 61 | 62 | 63 | 64 => (Kind::Tom, 62 + (key - 60) * 2),
        65 | 66 => (Kind::Tom, 67 + (key - 65) * 3),
        67 | 68 => (Kind::Metal, 76 + (key - 67) * 3),
        71 | 72 => (Kind::Wood, 86 + (key - 71) * 2),
        73 | 74 => (Kind::Wood, 79),
        75 | 76 | 77 => (Kind::Wood, 81 + (key - 75) * 2),
        78 | 79 => (Kind::Tom, 72 + (key - 78) * 2),
        80 | 81 => (Kind::Metal, 93),
        _ => (Kind::Tom, 60),
    }
}

/// Stack a detuned, quieter copy of a 2-operator patch on top of itself
fn layer(patch: FmAlgorithm) -> FmAlgorithm {
    let [modulator, carrier, _, _] = patch.operators;
    // FM pairs become two parallel pairs, additive pairs stay additive
    let connection = if patch.connection == 0 { 5 } else { 2 };
    FmAlgorithm::four_op(
        connection,
        [
            modulator,
            carrier,
            modulator.dt(2),
            carrier.dt(2).quieter(6),
        ],
    )
}

fn kit(layered: bool) -> Vec<Option<FmDrum>> {
    let mut kit = vec![None; 128];
    for key in FM_DRUM_KEY_FIRST..=FM_DRUM_KEY_LAST {
        let (kind, pitch) = gm_drum(key);
        let patch = archetype(kind);
        kit[key as usize] = Some(FmDrum {
            pitch,
            algorithm: if layered { layer(patch) } else { patch },
        });
    }
    kit
}

/// MA-2 FM drum kit (2-operator)
pub(super) fn ma2_kit() -> Vec<Option<FmDrum>> {
    kit(false)
}

/// MA-3 FM drum kit (layered 4-operator)
pub(super) fn ma3_kit() -> Vec<Option<FmDrum>> {
    kit(true)
}

/// Built-in wave drums indexed by MIDI key
pub(super) fn rom_wave_drums(rom: &[Vec<i16>]) -> Vec<Option<WaveDrum>> {
    let mut drums = vec![None; 128];
    let entries: [(i32, u8, Op, i8); 8] = [
        (38, ROM_SNARE, Op::new(1, 0).env(15, 6, 15, 6, 6), 0),
        (40, ROM_SNARE, Op::new(1, 4).env(15, 8, 15, 8, 8), 0),
        (39, ROM_CLAP, Op::new(1, 2).env(15, 6, 15, 6, 6), 8),
        (42, ROM_HAT, Op::new(1, 6).env(15, 11, 15, 11, 11), 24),
        (44, ROM_HAT, Op::new(1, 10).env(15, 12, 15, 12, 12), 24),
        (46, ROM_HAT, Op::new(1, 6).env(15, 5, 15, 5, 5), 24),
        (49, ROM_CYMBAL, Op::new(1, 4).env(15, 4, 15, 4, 4), -24),
        (57, ROM_CYMBAL, Op::new(1, 4).env(15, 4, 15, 4, 4), 24),
    ];
    for (key, bank, envelope, pan_bias) in entries {
        let Some(data) = rom.get(bank as usize) else {
            continue;
        };
        let end_point = data.len() as u32;
        // Open hat loops its noise tail until the envelope runs out
        let loop_point = if key == 46 { end_point / 2 } else { end_point };
        drums[key as usize] = Some(WaveDrum {
            source: WaveSource::Rom(bank),
            sample_rate: ROM_SAMPLE_RATE,
            loop_point,
            end_point,
            operator: envelope.one_shot(),
            pan_bias,
        });
    }
    drums
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drum_patches_ignore_key_off() {
        for key in FM_DRUM_KEY_FIRST..=FM_DRUM_KEY_LAST {
            let (kind, _) = gm_drum(key);
            let patch = archetype(kind);
            assert!(patch.operators[0].ignore_key_off && patch.operators[1].ignore_key_off);
        }
    }

    #[test]
    fn test_layered_kit_is_four_operator() {
        let kit = ma3_kit();
        let kick = kit[36].unwrap();
        assert_eq!(kick.algorithm.operator_count(), 4);
        assert_eq!(kick.algorithm.connection, 5);
        let snare = ma2_kit()[38].unwrap();
        assert_eq!(snare.algorithm.operator_count(), 2);
    }
}
