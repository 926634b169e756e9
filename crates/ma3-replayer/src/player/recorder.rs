//! Backend double that records every call, for driver and player tests

use ma3_sampler::{DrumMode, RenderOptions, SamplerBackend, SamplerFactory, VolumeCurve};

use crate::song::{Event, Song, SongFormat, SongInfo, TimedEvent, Track};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    KeyOn(usize, i32),
    KeyOff(usize, i32),
    Program(usize, u8),
    Bank(usize, u8),
    Drum(usize, DrumMode),
    Volume(usize, f32, VolumeCurve),
    Pan(usize, f32),
    Sysex(Vec<u8>),
    Other,
    Reset,
}

#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub channels: usize,
    pub sample_rate: f64,
    pub calls: Vec<Call>,
    pub frames: usize,
}

impl SamplerBackend for Recorder {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn key_on(&mut self, channel: usize, key: i32, _velocity: f32) {
        self.calls.push(Call::KeyOn(channel, key));
    }

    fn key_off(&mut self, channel: usize, key: i32) {
        self.calls.push(Call::KeyOff(channel, key));
    }

    fn program_change(&mut self, channel: usize, program: u8) {
        self.calls.push(Call::Program(channel, program));
    }

    fn bank_change(&mut self, channel: usize, bank: u8) {
        self.calls.push(Call::Bank(channel, bank));
    }

    fn drum_mode(&mut self, channel: usize, mode: DrumMode) {
        self.calls.push(Call::Drum(channel, mode));
    }

    fn volume(&mut self, channel: usize, volume: f32, curve: VolumeCurve) {
        self.calls.push(Call::Volume(channel, volume, curve));
    }

    fn panpot(&mut self, channel: usize, pan: f32) {
        self.calls.push(Call::Pan(channel, pan));
    }

    fn pitch_bend(&mut self, _channel: usize, _bend: f32) {
        self.calls.push(Call::Other);
    }

    fn pitch_bend_range(&mut self, _channel: usize, _semitones: f32) {
        self.calls.push(Call::Other);
    }

    fn master_volume(&mut self, _volume: f32) {
        self.calls.push(Call::Other);
    }

    fn master_tune(&mut self, _semitones: f32) {
        self.calls.push(Call::Other);
    }

    fn sysex(&mut self, data: &[u8]) {
        self.calls.push(Call::Sysex(data.to_vec()));
    }

    fn render(
        &mut self,
        buffer: &mut [f32],
        offset: usize,
        frames: usize,
        _options: &RenderOptions,
    ) -> ma3_sampler::Result<()> {
        buffer[offset * 2..(offset + frames) * 2].fill(0.5);
        self.frames += frames;
        Ok(())
    }

    fn reset(&mut self) {
        self.calls.push(Call::Reset);
    }

    fn is_finished(&self) -> bool {
        true
    }
}

pub(crate) struct RecorderFactory;

impl SamplerFactory for RecorderFactory {
    type Instance = Recorder;

    fn make_instance(&self, channels: usize, sample_rate: f64) -> ma3_sampler::Result<Recorder> {
        Ok(Recorder {
            channels,
            sample_rate,
            ..Default::default()
        })
    }
}

/// Single-track song at 100 ticks per second
pub(crate) fn song(format: SongFormat, events: Vec<TimedEvent>) -> Song {
    let tracks = vec![Track {
        events,
        ..Track::default()
    }];
    Song {
        format,
        info: SongInfo::default(),
        tracks,
        channel_count: 4,
        initial_tick_rate: 100.0,
        wave_data: Vec::new(),
        crc: None,
    }
}

pub(crate) fn note(delta: u32, channel: usize, key: i32, gate: u32) -> TimedEvent {
    TimedEvent::new(
        delta,
        Event::Note {
            channel,
            key,
            gate,
            velocity: 1.0,
        },
    )
}
