//! Box-filter resampler from the internal rate to the output rate
//!
//! Each output frame integrates the internal signal over one output period. The
//! signal between two internal samples is taken as the straight line joining
//! them, integrated piecewise with the midpoint rule.

use crate::constants::INTERNAL_SAMPLE_RATE;

#[derive(Debug, Clone)]
pub(crate) struct Resampler {
    width: f64,
    position: f64,
    previous: [f32; 2],
    current: [f32; 2],
}

impl Resampler {
    pub fn new(output_rate: f64) -> Self {
        Self {
            width: INTERNAL_SAMPLE_RATE / output_rate,
            position: 0.0,
            previous: [0.0; 2],
            current: [0.0; 2],
        }
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.previous = [0.0; 2];
        self.current = [0.0; 2];
    }

    /// Produce one output frame, pulling internal frames from `next` as needed
    pub fn next_frame(&mut self, mut next: impl FnMut() -> [f32; 2]) -> [f32; 2] {
        let mut remaining = self.width;
        let mut acc = [0.0f64; 2];
        while remaining > 1e-9 {
            let take = remaining.min(1.0 - self.position);
            let mid = (self.position + take * 0.5) as f32;
            for (ch, sum) in acc.iter_mut().enumerate() {
                let value = self.previous[ch] + (self.current[ch] - self.previous[ch]) * mid;
                *sum += value as f64 * take;
            }
            self.position += take;
            remaining -= take;
            if self.position >= 1.0 - 1e-12 {
                self.position = 0.0;
                self.previous = self.current;
                self.current = next();
            }
        }
        [(acc[0] / self.width) as f32, (acc[1] / self.width) as f32]
    }
}
