//! Yamaha-style 4-bit ADPCM
//!
//! Each nibble carries a sign bit and a 3-bit magnitude code. The decoder keeps a
//! leaky predictor (it decays by 254/255 every sample, so a run of zero nibbles
//! fades to silence) and an adaptive step size bounded to `127..=24576`.
//! Nibbles are packed low nibble first.
//!
//! The encoder mirrors the decoder state exactly, which is how the built-in ROM
//! wave banks are produced.

/// Step scale factors (x/256) indexed by the magnitude code
const STEP_SCALE: [i32; 8] = [230, 230, 230, 230, 307, 409, 512, 614];

/// Smallest adaptive step
pub const STEP_MIN: i32 = 127;

/// Largest adaptive step
pub const STEP_MAX: i32 = 24_576;

/// Streaming ADPCM decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmDecoder {
    predictor: i32,
    step: i32,
}

impl Default for AdpcmDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdpcmDecoder {
    /// Decoder at its reset state (predictor 0, minimum step)
    pub fn new() -> Self {
        Self {
            predictor: 0,
            step: STEP_MIN,
        }
    }

    /// Current predictor value
    pub fn predictor(&self) -> i32 {
        self.predictor
    }

    /// Current step size
    pub fn step(&self) -> i32 {
        self.step
    }

    /// Decode one nibble and return the new 16-bit sample
    pub fn decode_nibble(&mut self, nibble: u8) -> i16 {
        let code = (nibble & 7) as i32;
        let magnitude = (self.step * code) >> 2;
        let delta = if nibble & 8 != 0 { -magnitude } else { magnitude };
        self.predictor = (delta + self.predictor * 254 / 255).clamp(-32_768, 32_767);
        self.step = ((STEP_SCALE[code as usize] * self.step) >> 8).clamp(STEP_MIN, STEP_MAX);
        self.predictor as i16
    }
}

/// Decode a whole ADPCM blob into 16-bit PCM (two samples per byte)
pub fn decode(data: &[u8]) -> Vec<i16> {
    let mut decoder = AdpcmDecoder::new();
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        out.push(decoder.decode_nibble(byte & 0x0F));
        out.push(decoder.decode_nibble(byte >> 4));
    }
    out
}

/// Encode 16-bit PCM into ADPCM
///
/// An odd trailing sample is padded with a zero nibble.
pub fn encode(samples: &[i16]) -> Vec<u8> {
    let mut state = AdpcmDecoder::new();
    let mut out = Vec::with_capacity(samples.len().div_ceil(2));
    for pair in samples.chunks(2) {
        let low = encode_sample(&mut state, pair[0]);
        let high = match pair.get(1) {
            Some(&sample) => encode_sample(&mut state, sample),
            None => 0,
        };
        out.push(low | (high << 4));
    }
    out
}

fn encode_sample(state: &mut AdpcmDecoder, target: i16) -> u8 {
    let predicted = state.predictor * 254 / 255;
    let diff = target as i32 - predicted;
    let sign = if diff < 0 { 8u8 } else { 0 };
    // Closest magnitude code for (step * code) >> 2
    let code = ((diff.abs() * 4 + state.step / 2) / state.step).min(7) as u8;
    let nibble = sign | code;
    state.decode_nibble(nibble);
    nibble
}
