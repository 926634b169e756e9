//! i-melody driver

use log::trace;
use ma3_sampler::constants::{SYSEX_DEVICE, SYSEX_WAVE_RAM, SYSEX_YAMAHA};
use ma3_sampler::{DrumMode, SamplerBackend, VolumeCurve};

use super::sequencer::SequenceDriver;
use crate::song::{Control, Song};

/// Maps MLD controllers onto the sampler
///
/// Channel volume is linear, drum channels use the key-addressed drum map,
/// and the song's ADPCM blobs become the instance's wave RAM on every reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct MldDriver;

impl SequenceDriver for MldDriver {
    const LOOPS: bool = true;

    fn setup<B: SamplerBackend>(&mut self, song: &Song, instance: &mut B) {
        if song.wave_data.is_empty() {
            return;
        }
        let size: usize = song.wave_data.iter().map(Vec::len).sum();
        let mut message = Vec::with_capacity(3 + size);
        message.extend_from_slice(&[SYSEX_YAMAHA, SYSEX_DEVICE, SYSEX_WAVE_RAM]);
        for blob in &song.wave_data {
            message.extend_from_slice(blob);
        }
        instance.sysex(&message);
    }

    fn control<B: SamplerBackend>(&mut self, control: &Control, instance: &mut B) {
        match *control {
            Control::Program { channel, program } => instance.program_change(channel, program),
            Control::Bank { channel, bank } => instance.bank_change(channel, bank),
            Control::Volume { channel, value } => {
                instance.volume(channel, value, VolumeCurve::Linear);
            }
            Control::Pan { channel, value } => instance.panpot(channel, value),
            Control::PitchBend { channel, value } => instance.pitch_bend(channel, value),
            Control::PitchBendRange { channel, semitones } => {
                instance.pitch_bend_range(channel, semitones);
            }
            Control::DrumEnable { channel, enabled } => {
                let mode = if enabled { DrumMode::Mfi } else { DrumMode::None };
                instance.drum_mode(channel, mode);
            }
            Control::MasterVolume(volume) => instance.master_volume(volume),
            Control::MasterTune(semitones) => instance.master_tune(semitones),
            Control::Tempo { .. } => {}
            Control::Expression { .. } | Control::Modulation { .. } => {
                trace!("MLD: unused control {control:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::recorder::{Call, Recorder};
    use crate::song::SongFormat;

    #[test]
    fn test_wave_data_uploaded_on_setup() {
        let mut song = crate::player::recorder::song(SongFormat::Mld, Vec::new());
        song.wave_data = vec![vec![1, 2], vec![3]];
        let mut instance = Recorder::default();

        MldDriver.setup(&song, &mut instance);
        assert_eq!(
            instance.calls,
            vec![Call::Sysex(vec![0x43, 0x03, 0x03, 1, 2, 3])]
        );
    }

    #[test]
    fn test_control_mapping() {
        let mut instance = Recorder::default();
        let mut driver = MldDriver;

        driver.control(
            &Control::DrumEnable {
                channel: 2,
                enabled: true,
            },
            &mut instance,
        );
        driver.control(
            &Control::Volume {
                channel: 1,
                value: 0.5,
            },
            &mut instance,
        );
        driver.control(
            &Control::Tempo {
                timebase: 48,
                bpm: 120,
            },
            &mut instance,
        );

        assert_eq!(
            instance.calls,
            vec![
                Call::Drum(2, DrumMode::Mfi),
                Call::Volume(1, 0.5, VolumeCurve::Linear),
            ]
        );
    }
}
