//! GM instrument banks
//!
//! Each bank is generated from sixteen family patches (one per GM family of
//! eight programs). Programs inside a family vary modulator brightness and ratio
//! so neighbouring programs do not sound identical.

use super::{FmAlgorithm, OperatorTemplate as Op};

const fn op(multiplier: u8, total_level: u8) -> Op {
    Op::new(multiplier, total_level)
}

/// 4-operator family patches (MA-3)
const MA3_FAMILIES: [FmAlgorithm; 16] = [
    // Piano
    FmAlgorithm::four_op(5, [
        op(2, 28).fb(3).env(15, 5, 6, 3, 7).ks(1, true),
        op(2, 0).env(15, 3, 5, 3, 7).ks(1, true),
        op(1, 34).env(15, 6, 8, 4, 7),
        op(1, 4).env(15, 2, 5, 2, 7).dt(1),
    ]),
    // Chromatic percussion
    FmAlgorithm::four_op(5, [
        op(7, 30).env(15, 6, 8, 3, 6),
        op(2, 0).env(15, 3, 8, 3, 5),
        op(14, 36).env(15, 7, 10, 4, 6),
        op(4, 6).env(15, 3, 8, 3, 5),
    ]),
    // Organ
    FmAlgorithm::four_op(2, [
        op(1, 10).fb(4).env(14, 0, 0, 0, 9),
        op(2, 12).env(14, 0, 0, 0, 9),
        op(4, 18).env(14, 0, 0, 0, 9),
        op(8, 24).env(14, 0, 0, 0, 9),
    ]),
    // Guitar
    FmAlgorithm::four_op(4, [
        op(3, 40).fb(5).env(15, 6, 8, 4, 7),
        op(1, 32).env(15, 5, 6, 3, 7),
        op(2, 26).env(15, 4, 6, 3, 7),
        op(1, 0).env(15, 4, 6, 3, 7).ks(1, true),
    ]),
    // Bass
    FmAlgorithm::four_op(3, [
        op(1, 24).fb(6).env(15, 5, 7, 3, 8),
        op(1, 30).env(15, 6, 8, 3, 8),
        op(2, 30).env(15, 6, 8, 3, 8),
        op(1, 0).env(15, 4, 5, 2, 8),
    ]),
    // Strings
    FmAlgorithm::four_op(5, [
        op(1, 26).fb(3).env(7, 2, 2, 0, 6),
        op(1, 2).env(7, 1, 1, 0, 6).am(1),
        op(2, 30).env(7, 2, 2, 0, 6),
        op(1, 4).env(7, 1, 1, 0, 6).dt(1),
    ])
    .with_lfo(2),
    // Ensemble
    FmAlgorithm::four_op(6, [
        op(1, 6).fb(2).env(6, 1, 1, 0, 6),
        op(3, 34).env(6, 2, 3, 0, 6),
        op(1, 30).env(6, 2, 3, 0, 6),
        op(1, 6).env(6, 1, 1, 0, 6).dt(2),
    ]),
    // Brass
    FmAlgorithm::four_op(3, [
        op(1, 24).fb(5).env(11, 3, 2, 0, 8),
        op(1, 28).env(11, 3, 3, 0, 8),
        op(1, 30).env(12, 3, 3, 0, 8),
        op(1, 0).env(12, 2, 2, 0, 8),
    ]),
    // Reed
    FmAlgorithm::four_op(4, [
        op(2, 38).fb(4).env(12, 2, 3, 0, 8),
        op(3, 36).env(12, 2, 3, 0, 8),
        op(1, 30).env(12, 2, 2, 0, 8),
        op(1, 0).env(12, 1, 1, 0, 8),
    ]),
    // Pipe
    FmAlgorithm::four_op(7, [
        op(1, 40).fb(7).env(12, 4, 6, 0, 8),
        op(1, 40).env(11, 2, 2, 0, 8),
        op(1, 2).env(11, 1, 1, 0, 8).am(1),
        op(2, 30).env(11, 2, 2, 0, 8),
    ])
    .with_lfo(2),
    // Synth lead
    FmAlgorithm::four_op(5, [
        op(1, 30).fb(6).env(15, 2, 2, 0, 8),
        op(1, 2).wave(6).env(15, 1, 1, 0, 8),
        op(2, 28).env(15, 2, 2, 0, 8),
        op(1, 6).wave(24).env(15, 1, 1, 0, 8).dt(1),
    ]),
    // Synth pad
    FmAlgorithm::four_op(2, [
        op(1, 10).wave(8).fb(2).env(5, 1, 1, 0, 5),
        op(1, 10).wave(8).env(5, 1, 1, 0, 5).dt(2),
        op(2, 16).wave(8).env(4, 1, 2, 0, 5).am(1),
        op(1, 12).env(4, 1, 1, 0, 5).dt(6),
    ])
    .with_lfo(1),
    // Synth effects
    FmAlgorithm::four_op(5, [
        op(7, 32).fb(5).env(9, 2, 3, 1, 6).am(2),
        op(1, 4).env(9, 2, 2, 1, 6),
        op(3, 30).env(8, 3, 4, 1, 6),
        op(1, 6).env(8, 2, 2, 1, 6).dt(3),
    ])
    .with_lfo(3),
    // Ethnic
    FmAlgorithm::four_op(4, [
        op(5, 38).fb(4).env(15, 6, 8, 4, 7),
        op(3, 34).env(15, 5, 7, 3, 7),
        op(1, 28).env(15, 4, 6, 3, 7),
        op(1, 0).env(15, 4, 6, 3, 7),
    ]),
    // Percussive
    FmAlgorithm::four_op(5, [
        op(1, 26).fb(4).env(15, 8, 10, 5, 8),
        op(1, 0).env(15, 6, 9, 5, 8).one_shot(),
        op(5, 34).env(15, 9, 12, 6, 8),
        op(1, 6).env(15, 7, 10, 5, 8).one_shot(),
    ]),
    // Sound effects
    FmAlgorithm::four_op(1, [
        op(15, 8).fb(7).env(12, 4, 4, 2, 6),
        op(1, 6).wave(3).env(12, 4, 4, 2, 6),
        Op::SILENT,
        Op::SILENT,
    ]),
];

/// Patches for banks 1 and 2
pub(super) fn effect_banks() -> [FmAlgorithm; 2] {
    [
        // Pure tone
        FmAlgorithm::two_op(1, Op::SILENT, op(1, 0).env(15, 0, 0, 0, 10)),
        // Bright square lead
        FmAlgorithm::two_op(0, op(1, 36).fb(6), op(1, 0).wave(6).env(15, 0, 0, 0, 8)),
    ]
}

/// 128 MA-3 programs
pub(super) fn ma3_bank() -> Vec<FmAlgorithm> {
    (0..128u8)
        .map(|program| vary(MA3_FAMILIES[(program >> 3) as usize], program & 7))
        .collect()
}

/// 128 MA-2 programs, reduced from the MA-3 families to two operators
pub(super) fn ma2_bank() -> Vec<FmAlgorithm> {
    (0..128u8)
        .map(|program| vary(reduce_to_two_op(MA3_FAMILIES[(program >> 3) as usize]), program & 7))
        .collect()
}

/// Keep the feedback operator as modulator and the last carrier as output
fn reduce_to_two_op(family: FmAlgorithm) -> FmAlgorithm {
    if family.operator_count() == 2 {
        return family;
    }
    let mask = family.carrier_mask();
    let carrier_index = (0..4).rev().find(|i| mask & (1 << i) != 0).unwrap_or(1);
    let modulator = family.operators[0];
    let carrier = family.operators[carrier_index];
    // Organ-like families (every operator audible) stay additive
    let connection = if mask == 0b1111 { 1 } else { 0 };
    FmAlgorithm {
        lfo: family.lfo,
        ..FmAlgorithm::two_op(connection, modulator, carrier)
    }
}

/// Per-program variation inside a family
fn vary(mut alg: FmAlgorithm, index: u8) -> FmAlgorithm {
    let mask = alg.carrier_mask();
    for (slot, operator) in alg.operators.iter_mut().enumerate() {
        if mask & (1 << slot) != 0 {
            continue;
        }
        // Modulators get darker in steps of 2 TL, and the upper half of the
        // family shifts the ratio by one
        *operator = operator.quieter((index & 3) * 2);
        if index >= 4 && operator.multiplier < 15 {
            operator.multiplier += 1;
        }
    }
    alg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_variations_differ() {
        let bank = ma3_bank();
        assert_ne!(bank[0], bank[1]);
        assert_ne!(bank[0], bank[4]);
        assert_eq!(bank.len(), 128);
    }

    #[test]
    fn test_reduce_keeps_additive_organ() {
        let organ = reduce_to_two_op(MA3_FAMILIES[2]);
        assert_eq!(organ.connection, 1);
        let piano = reduce_to_two_op(MA3_FAMILIES[0]);
        assert_eq!(piano.connection, 0);
        assert_eq!(piano.operators[1], MA3_FAMILIES[0].operators[3]);
    }
}
