//! Wave ROM
//!
//! The ROM banks are synthesized deterministically, stored as ADPCM like real
//! wave data, and decoded once when the tables are built.

use crate::adpcm;
use crate::constants::ROM_SAMPLE_RATE;

/// Snare body + noise
pub const ROM_SNARE: u8 = 0;
/// Short bright noise burst
pub const ROM_HAT: u8 = 1;
/// Triple noise burst
pub const ROM_CLAP: u8 = 2;
/// Long noise wash
pub const ROM_CYMBAL: u8 = 3;

/// Number of ROM banks
pub const ROM_BANK_COUNT: usize = 4;

/// Linear congruential noise source; fixed seed so the ROM never changes
struct Noise(u32);

impl Noise {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(214_013).wrapping_add(2_531_011);
        ((self.0 >> 16) & 0x7FFF) as f64 / 16_384.0 - 1.0
    }
}

fn render(length: usize, mut sample: impl FnMut(usize, f64) -> f64) -> Vec<i16> {
    let mut noise = Noise(0x1234_5678);
    (0..length)
        .map(|i| {
            let value = sample(i, noise.next());
            (value.clamp(-1.0, 1.0) * 24_000.0) as i16
        })
        .collect()
}

fn decay(i: usize, samples: f64) -> f64 {
    (-(i as f64) / samples).exp()
}

fn snare() -> Vec<i16> {
    let rate = ROM_SAMPLE_RATE as f64;
    render(2400, |i, n| {
        let body = (2.0 * std::f64::consts::PI * 180.0 * i as f64 / rate).sin() * decay(i, 300.0);
        0.6 * body + 0.7 * n * decay(i, 600.0)
    })
}

fn hat() -> Vec<i16> {
    let mut previous = 0.0;
    render(1600, move |i, n| {
        // First difference pushes the noise toward the top of the band
        let bright = n - previous;
        previous = n;
        0.5 * bright * decay(i, 500.0)
    })
}

fn clap() -> Vec<i16> {
    render(2800, |i, n| {
        let burst = match i {
            0..=239 => decay(i, 60.0),
            240..=479 => decay(i - 240, 60.0),
            _ => decay(i - 480, 500.0),
        };
        0.9 * n * burst
    })
}

fn cymbal() -> Vec<i16> {
    let mut previous = 0.0;
    render(8000, move |i, n| {
        let bright = n - 0.5 * previous;
        previous = n;
        0.6 * bright * decay(i, 2500.0)
    })
}

/// Build and decode every ROM bank
pub(super) fn build_rom_banks() -> Vec<Vec<i16>> {
    [snare(), hat(), clap(), cymbal()]
        .iter()
        .map(|pcm| adpcm::decode(&adpcm::encode(pcm)))
        .collect()
}
