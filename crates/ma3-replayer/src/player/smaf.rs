//! SMAF driver

use log::trace;
use ma3_sampler::{DrumMode, SamplerBackend, VolumeCurve};

use super::sequencer::SequenceDriver;
use crate::song::{Control, Song};

/// Bank bit selecting the drum set
const DRUM_BANK: u8 = 0x80;

/// Maps SMAF controllers onto the sampler
///
/// Channel volume follows the logarithmic curve and is scaled by expression.
/// A bank with bit 7 set switches the channel to program-addressed drums.
#[derive(Debug, Clone, Default)]
pub struct SmafDriver {
    volume: Vec<f32>,
    expression: Vec<f32>,
}

impl SmafDriver {
    fn apply_volume<B: SamplerBackend>(&self, channel: usize, instance: &mut B) {
        if let (Some(volume), Some(expression)) =
            (self.volume.get(channel), self.expression.get(channel))
        {
            instance.volume(channel, volume * expression, VolumeCurve::Logarithmic);
        }
    }
}

impl SequenceDriver for SmafDriver {
    const LOOPS: bool = false;

    fn setup<B: SamplerBackend>(&mut self, song: &Song, instance: &mut B) {
        // Channel volume 100, expression full
        let channels = instance.channel_count();
        self.volume = vec![100.0 / 127.0; channels];
        self.expression = vec![1.0; channels];
        for channel in 0..channels {
            self.apply_volume(channel, instance);
        }
        trace!("SMAF: {} tracks on {channels} channels", song.tracks.len());
    }

    fn control<B: SamplerBackend>(&mut self, control: &Control, instance: &mut B) {
        match *control {
            Control::Program { channel, program } => instance.program_change(channel, program),
            Control::Bank { channel, bank } => {
                let mode = if bank & DRUM_BANK != 0 {
                    DrumMode::Smaf
                } else {
                    DrumMode::None
                };
                instance.drum_mode(channel, mode);
                instance.bank_change(channel, bank & !DRUM_BANK);
            }
            Control::Volume { channel, value } => {
                if let Some(slot) = self.volume.get_mut(channel) {
                    *slot = value;
                    self.apply_volume(channel, instance);
                }
            }
            Control::Expression { channel, value } => {
                if let Some(slot) = self.expression.get_mut(channel) {
                    *slot = value;
                    self.apply_volume(channel, instance);
                }
            }
            Control::Pan { channel, value } => instance.panpot(channel, value),
            Control::PitchBend { channel, value } => instance.pitch_bend(channel, value),
            Control::PitchBendRange { channel, semitones } => {
                instance.pitch_bend_range(channel, semitones);
            }
            Control::MasterVolume(volume) => instance.master_volume(volume),
            Control::MasterTune(semitones) => instance.master_tune(semitones),
            Control::Tempo { .. } => {}
            Control::DrumEnable { .. } | Control::Modulation { .. } => {
                trace!("SMAF: unused control {control:?}");
            }
        }
    }
}
