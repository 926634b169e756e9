//! Sampler instance: channel state, voice allocation, SysEx and rendering

use std::sync::Arc;

use log::{debug, trace};

use crate::adpcm;
use crate::backend::SamplerBackend;
use crate::config::{DrumMode, RenderOptions, VolumeCurve};
use crate::constants::{
    FM_DRUM_KEY_FIRST, FM_DRUM_KEY_LAST, MAX_CUSTOM_WAVE_DRUMS, MIDI_A4, REFERENCE_FREQ,
    SYSEX_DEVICE, SYSEX_LEVEL, SYSEX_WAVE_DRUMS, SYSEX_WAVE_RAM, SYSEX_YAMAHA,
    WAVE_DRUM_ENTRY_LEN,
};
use crate::engine::channel::Channel;
use crate::engine::note::{Note, WaveMemory};
use crate::engine::resampler::Resampler;
use crate::preset::{FmAlgorithm, OperatorTemplate, PresetId, WaveDrum, WaveSource};
use crate::sampler::Shared;
use crate::tables::WaveTables;
use crate::{Result, SamplerError};

/// Highest output rate accepted by [`Instance`]
const MAX_OUTPUT_RATE: f64 = 384_000.0;

/// A voice recipe resolved from channel state at key-on
enum Resolved {
    Fm {
        id: PresetId,
        algorithm: FmAlgorithm,
        /// Fixed A4-relative pitch for drums
        fixed_pitch: Option<i32>,
    },
    Wave {
        id: PresetId,
        drum: WaveDrum,
    },
}

impl Resolved {
    fn id(&self) -> PresetId {
        match self {
            Resolved::Fm { id, .. } | Resolved::Wave { id, .. } => *id,
        }
    }
}

/// An independent sampler voice set with its own channels and wave RAM
///
/// Created by [`crate::Sampler`]. All control methods ignore out-of-range
/// channels; see [`SamplerBackend`] for the full control surface.
pub struct Instance {
    shared: Arc<Shared>,
    sample_rate: f64,
    channels: Vec<Channel>,
    master_volume: f32,
    master_tune: f32,
    fade: f32,
    custom_drums: Vec<Option<WaveDrum>>,
    wave_ram: Option<Vec<i16>>,
    resampler: Resampler,
}

impl Instance {
    pub(crate) fn new(shared: Arc<Shared>, channels: usize, sample_rate: f64) -> Result<Self> {
        if channels == 0 {
            return Err(SamplerError::ConfigError("instance needs at least one channel".into()));
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 || sample_rate > MAX_OUTPUT_RATE {
            return Err(SamplerError::ConfigError(format!(
                "sample rate must be in (0, {MAX_OUTPUT_RATE}] Hz, got {sample_rate}"
            )));
        }
        Ok(Self {
            shared,
            sample_rate,
            channels: vec![Channel::default(); channels],
            master_volume: 1.0,
            master_tune: 0.0,
            fade: 1.0,
            custom_drums: vec![None; MAX_CUSTOM_WAVE_DRUMS],
            wave_ram: None,
            resampler: Resampler::new(sample_rate),
        })
    }

    /// Number of notes currently allocated (sounding or releasing)
    pub fn active_notes(&self) -> usize {
        self.channels.iter().map(|c| c.notes.len()).sum()
    }

    /// Presets of the notes allocated on a channel, oldest first
    pub fn channel_presets(&self, channel: usize) -> Vec<PresetId> {
        self.channels
            .get(channel)
            .map(|c| c.notes.iter().map(Note::preset).collect())
            .unwrap_or_default()
    }

    /// Decoded wave RAM, if a blob has been uploaded
    pub fn wave_ram(&self) -> Option<&[i16]> {
        self.wave_ram.as_deref()
    }

    /// Custom wave drum registered on a MIDI key
    pub fn custom_wave_drum(&self, midi_key: u8) -> Option<WaveDrum> {
        self.custom_drums.get(midi_key as usize).copied().flatten()
    }

    /// Current SysEx fade level
    pub fn fade_level(&self) -> f32 {
        self.fade
    }

    fn frequency(&self, key: f32) -> f64 {
        REFERENCE_FREQ * 2f64.powf((key + self.master_tune) as f64 / 12.0)
    }

    fn wave_drum_playable(&self, drum: &WaveDrum) -> bool {
        match drum.source {
            WaveSource::Ram => self
                .wave_ram
                .as_ref()
                .is_some_and(|ram| drum.end_point as usize <= ram.len()),
            WaveSource::Rom(bank) => self
                .shared
                .presets
                .rom_bank(bank)
                .is_some_and(|rom| drum.end_point as usize <= rom.len()),
        }
    }

    /// Drum lookup by MIDI key: custom wave drum, ROM wave drum, then FM drum
    fn resolve_drum(&self, midi_key: i32) -> Option<Resolved> {
        if (0..128).contains(&midi_key) {
            if let Some(drum) = self.custom_drums[midi_key as usize] {
                if self.wave_drum_playable(&drum) {
                    return Some(Resolved::Wave {
                        id: PresetId::CustomWaveDrum(midi_key as u8),
                        drum,
                    });
                }
                debug!("custom wave drum on key {midi_key} has no sample data");
            }
            if let Some(drum) = self.shared.presets.wave_drum(midi_key) {
                return Some(Resolved::Wave {
                    id: PresetId::WaveDrum(midi_key as u8),
                    drum,
                });
            }
        }
        self.resolve_fm_drum(midi_key)
    }

    fn resolve_fm_drum(&self, midi_key: i32) -> Option<Resolved> {
        self.shared.presets.fm_drum(midi_key).map(|drum| Resolved::Fm {
            id: PresetId::FmDrum(midi_key as u8),
            algorithm: drum.algorithm,
            fixed_pitch: Some(drum.pitch - MIDI_A4),
        })
    }

    fn resolve(&self, channel: &Channel, key: i32) -> Option<Resolved> {
        match channel.drum_mode {
            DrumMode::None => {
                let (id, algorithm) = self.shared.presets.instrument(channel.bank, channel.program);
                Some(Resolved::Fm {
                    id,
                    algorithm,
                    fixed_pitch: None,
                })
            }
            DrumMode::Mfi => self.resolve_drum(key + MIDI_A4),
            // SMAF kits address the FM drums by program, never the wave drums
            DrumMode::Smaf => self.resolve_fm_drum(channel.program as i32),
        }
    }

    /// Re-pitch every melodic note on a channel after bend or tuning changes
    fn retune(&mut self, channel: usize) {
        let Some(ch) = self.channels.get(channel) else {
            return;
        };
        let bend = ch.bend_semitones();
        let freqs: Vec<(usize, f64)> = ch
            .notes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.is_drum())
            .map(|(i, n)| (i, self.frequency(n.key() as f32 + bend)))
            .collect();
        let ch = &mut self.channels[channel];
        for (index, freq) in freqs {
            ch.notes[index].set_frequency(freq);
        }
    }

    fn register_wave_drums(&mut self, payload: &[u8]) {
        let Some((&count, entries)) = payload.split_first() else {
            debug!("wave-drum SysEx without entry count");
            return;
        };
        for entry in entries.chunks_exact(WAVE_DRUM_ENTRY_LEN).take(count as usize) {
            match self.parse_wave_drum(entry) {
                Ok((key, drum)) => {
                    trace!("custom wave drum on key {key}: {drum:?}");
                    self.custom_drums[key as usize] = Some(drum);
                }
                Err(reason) => debug!("ignoring wave-drum entry: {reason}"),
            }
        }
    }

    fn parse_wave_drum(&self, entry: &[u8]) -> std::result::Result<(u8, WaveDrum), String> {
        let be16 = |i: usize| u16::from_be_bytes([entry[i], entry[i + 1]]);
        let key = entry[0];
        if key as usize >= MAX_CUSTOM_WAVE_DRUMS {
            return Err(format!("key {key} out of range"));
        }
        if (FM_DRUM_KEY_FIRST..=FM_DRUM_KEY_LAST).contains(&(key as i32)) {
            return Err(format!("key {key} collides with the FM drum kit"));
        }
        let source = match entry[1] {
            0 => WaveSource::Ram,
            n => WaveSource::Rom(n - 1),
        };
        let (sample_rate, loop_point, end_point) = (be16(2), be16(4) as u32, be16(6) as u32);
        if sample_rate == 0 || end_point == 0 {
            return Err("zero sample rate or length".into());
        }
        if loop_point > end_point {
            return Err(format!("loop {loop_point} past end {end_point}"));
        }
        if let WaveSource::Rom(bank) = source {
            match self.shared.presets.rom_bank(bank) {
                Some(rom) if end_point as usize <= rom.len() => {}
                Some(rom) => return Err(format!("end {end_point} past ROM bank {bank} ({} samples)", rom.len())),
                None => return Err(format!("no ROM bank {bank}")),
            }
        }
        let envelope = OperatorTemplate::new(1, entry[10] & 0x3F).env(
            entry[8] >> 4,
            entry[8] & 0x0F,
            entry[9] >> 4,
            entry[8] & 0x0F,
            entry[9] & 0x0F,
        );
        // Looped samples only stop on key-off
        let operator = if loop_point < end_point {
            envelope
        } else {
            envelope.one_shot()
        };
        Ok((
            key,
            WaveDrum {
                source,
                sample_rate,
                loop_point,
                end_point,
                operator,
                pan_bias: ((entry[11] & 0x7F) as i16 - 64) as i8,
            },
        ))
    }

    fn upload_wave_ram(&mut self, blob: &[u8]) {
        for channel in &mut self.channels {
            for note in channel.notes.iter_mut().filter(|n| n.is_wave_drum()) {
                note.stop();
            }
        }
        let pcm = adpcm::decode(blob);
        debug!("wave RAM replaced: {} bytes ADPCM, {} samples", blob.len(), pcm.len());
        self.wave_ram = Some(pcm);
    }
}

/// Mix every channel for one internal sample and drop finished notes
fn mix_internal(
    tables: &WaveTables,
    memory: &WaveMemory<'_>,
    channels: &mut [Channel],
    master: f32,
) -> [f32; 2] {
    let mut out = [0.0f32; 2];
    for channel in channels.iter_mut() {
        if channel.notes.is_empty() {
            continue;
        }
        let mix = channel.mix();
        let mut finished = false;
        for note in channel.notes.iter_mut() {
            let target = mix.note_gains(note.pan_bias(), master);
            let [l, r] = note.render(tables, memory, target);
            out[0] += l;
            out[1] += r;
            finished |= note.is_finished();
        }
        if finished {
            channel.notes.retain(|n| !n.is_finished());
        }
    }
    out
}

impl SamplerBackend for Instance {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn key_on(&mut self, channel: usize, key: i32, velocity: f32) {
        if velocity <= 0.0 {
            self.key_off(channel, key);
            return;
        }
        let velocity = velocity.min(1.0);
        let Some(ch) = self.channels.get(channel) else {
            return;
        };
        let Some(resolved) = self.resolve(ch, key) else {
            trace!("ch {channel}: nothing mapped to key {key}");
            return;
        };
        let melodic = ch.drum_mode == DrumMode::None;
        let freq = match &resolved {
            Resolved::Fm {
                fixed_pitch: Some(pitch),
                ..
            } => self.frequency(*pitch as f32),
            _ => self.frequency(key as f32 + ch.bend_semitones()),
        };

        let ch = &mut self.channels[channel];
        if let Some(index) = ch.held_note(key) {
            let note = &mut ch.notes[index];
            if melodic && !note.is_drum() && note.preset() == resolved.id() {
                note.set_velocity(velocity);
                note.set_frequency(freq);
                return;
            }
            note.key_off();
        }
        if melodic {
            // Melodic voices are monophonic per channel
            for note in ch.notes.iter_mut().filter(|n| !n.is_drum() && n.is_held()) {
                note.key_off();
            }
        }
        let note = match resolved {
            Resolved::Fm { id, algorithm, .. } => Note::fm(key, id, algorithm, freq, velocity, !melodic),
            Resolved::Wave { id, drum } => Note::wave(key, id, drum, velocity),
        };
        ch.push_note(note);
    }

    fn key_off(&mut self, channel: usize, key: i32) {
        let Some(ch) = self.channels.get_mut(channel) else {
            return;
        };
        if let Some(index) = ch.held_note(key) {
            ch.notes[index].key_off();
        }
    }

    fn program_change(&mut self, channel: usize, program: u8) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.program = program & 0x7F;
        }
    }

    fn bank_change(&mut self, channel: usize, bank: u8) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.bank = bank;
        }
    }

    fn drum_mode(&mut self, channel: usize, mode: DrumMode) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.drum_mode = mode;
        }
    }

    fn volume(&mut self, channel: usize, volume: f32, curve: VolumeCurve) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.gain = curve.gain(volume);
        }
    }

    fn panpot(&mut self, channel: usize, pan: f32) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
        }
    }

    fn pitch_bend(&mut self, channel: usize, bend: f32) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.bend = if bend.is_finite() { bend.clamp(-1.0, 1.0) } else { 0.0 };
            self.retune(channel);
        }
    }

    fn pitch_bend_range(&mut self, channel: usize, semitones: f32) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.bend_range = if semitones.is_finite() { semitones.clamp(0.0, 24.0) } else { 0.0 };
            self.retune(channel);
        }
    }

    fn master_volume(&mut self, volume: f32) {
        self.master_volume = if volume.is_finite() { volume.max(0.0) } else { 0.0 };
    }

    fn master_tune(&mut self, semitones: f32) {
        self.master_tune = if semitones.is_finite() { semitones } else { 0.0 };
        for channel in 0..self.channels.len() {
            self.retune(channel);
        }
    }

    fn sysex(&mut self, data: &[u8]) {
        match data {
            [SYSEX_YAMAHA, SYSEX_DEVICE, SYSEX_LEVEL, level, ..] => {
                self.fade = (level & 0x7F) as f32 / 127.0;
                trace!("fade level {:.3}", self.fade);
            }
            [SYSEX_YAMAHA, SYSEX_DEVICE, SYSEX_WAVE_DRUMS, payload @ ..] => self.register_wave_drums(payload),
            [SYSEX_YAMAHA, SYSEX_DEVICE, SYSEX_WAVE_RAM, blob @ ..] => self.upload_wave_ram(blob),
            _ => debug!("ignoring SysEx ({} bytes)", data.len()),
        }
    }

    fn render(
        &mut self,
        buffer: &mut [f32],
        offset: usize,
        frames: usize,
        options: &RenderOptions,
    ) -> Result<()> {
        options.validate()?;
        let end = offset
            .checked_add(frames)
            .filter(|&end| end.saturating_mul(2) <= buffer.len())
            .ok_or_else(|| {
                SamplerError::InvalidRender(format!(
                    "{frames} frames at offset {offset} exceed buffer of {} frames",
                    buffer.len() / 2
                ))
            })?;

        let Self {
            shared,
            channels,
            wave_ram,
            resampler,
            master_volume,
            fade,
            ..
        } = self;
        let master = *master_volume * *fade;
        let memory = WaveMemory {
            presets: &shared.presets,
            ram: wave_ram.as_deref(),
        };

        for frame in buffer[offset * 2..end * 2].chunks_exact_mut(2) {
            let [l, r] = resampler.next_frame(|| mix_internal(&shared.tables, &memory, channels, master));
            let mut left = l * options.left_gain;
            let mut right = r * options.right_gain;
            if !options.erase {
                left += frame[0];
                right += frame[1];
            }
            if options.clamp {
                left = left.clamp(-1.0, 1.0);
                right = right.clamp(-1.0, 1.0);
            }
            frame[0] = left;
            frame[1] = right;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.channels.iter_mut().for_each(|c| *c = Channel::default());
        self.master_volume = 1.0;
        self.master_tune = 0.0;
        self.fade = 1.0;
        self.custom_drums.iter_mut().for_each(|d| *d = None);
        self.wave_ram = None;
        self.resampler.reset();
    }

    fn is_finished(&self) -> bool {
        self.channels.iter().all(|c| c.notes.is_empty())
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels.len())
            .field("active_notes", &self.active_notes())
            .field("master_volume", &self.master_volume)
            .field("master_tune", &self.master_tune)
            .field("fade", &self.fade)
            .field("wave_ram_samples", &self.wave_ram.as_ref().map(Vec::len))
            .finish()
    }
}

