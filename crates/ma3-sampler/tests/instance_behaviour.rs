use ma3_sampler::adpcm;
use ma3_sampler::preset::PresetId;
use ma3_sampler::{
    DrumMode, Instance, RenderOptions, Sampler, SamplerBackend, SamplerConfig, SamplerError,
    SamplerFactory,
};

const RATE: f64 = 22_050.0;

fn instance() -> Instance {
    Sampler::new(SamplerConfig::default())
        .unwrap()
        .make_instance(16, RATE)
        .unwrap()
}

fn render(instance: &mut Instance, frames: usize) -> Vec<f32> {
    let mut buffer = vec![0.0; frames * 2];
    instance
        .render(&mut buffer, 0, frames, &RenderOptions::default())
        .unwrap();
    buffer
}

fn peak(buffer: &[f32], side: usize) -> f32 {
    buffer
        .iter()
        .skip(side)
        .step_by(2)
        .fold(0.0f32, |acc, s| acc.max(s.abs()))
}

fn seconds(s: f64) -> usize {
    (s * RATE) as usize
}

/// Wave-drum SysEx entry: key, source, rate, loop, end, ar/dr, sl/rr, tl, pan
fn drum_entry(key: u8, source: u8, rate: u16, loop_point: u16, end: u16) -> Vec<u8> {
    let mut entry = vec![key, source];
    entry.extend_from_slice(&rate.to_be_bytes());
    entry.extend_from_slice(&loop_point.to_be_bytes());
    entry.extend_from_slice(&end.to_be_bytes());
    entry.extend_from_slice(&[0xF0, 0x0F, 0, 64]);
    entry
}

fn register_drums(instance: &mut Instance, entries: &[Vec<u8>]) {
    let mut message = vec![0x43, 0x03, 0x02, entries.len() as u8];
    for entry in entries {
        message.extend_from_slice(entry);
    }
    instance.sysex(&message);
}

fn upload_ram(instance: &mut Instance, samples: usize) {
    let pcm: Vec<i16> = (0..samples)
        .map(|i| if (i / 8) % 2 == 0 { 16_000 } else { -16_000 })
        .collect();
    let mut message = vec![0x43, 0x03, 0x03];
    message.extend_from_slice(&adpcm::encode(&pcm));
    instance.sysex(&message);
}

#[test]
fn silent_instance_renders_zeros() {
    let mut instance = instance();
    assert!(instance.is_finished());
    let buffer = render(&mut instance, 1024);
    assert!(buffer.iter().all(|&s| s == 0.0));
}

#[test]
fn note_is_audible_and_finishes_after_release() {
    let mut instance = instance();
    instance.key_on(0, 0, 1.0);
    let buffer = render(&mut instance, seconds(0.2));
    assert!(peak(&buffer, 0) > 0.001);
    assert!(!instance.is_finished());

    instance.key_off(0, 0);
    render(&mut instance, seconds(3.0));
    assert!(instance.is_finished());
    assert_eq!(instance.active_notes(), 0);
}

#[test]
fn zero_velocity_releases() {
    let mut instance = instance();
    instance.key_on(0, 0, 1.0);
    render(&mut instance, 256);
    instance.key_on(0, 0, 0.0);
    render(&mut instance, seconds(3.0));
    assert!(instance.is_finished());
}

#[test]
fn render_rejects_out_of_bounds() {
    let mut instance = instance();
    let mut buffer = vec![0.0; 200];
    let result = instance.render(&mut buffer, 90, 20, &RenderOptions::default());
    assert!(matches!(result, Err(SamplerError::InvalidRender(_))));
    let result = instance.render(&mut buffer, 0, 100, &RenderOptions::default().gains(-1.0, 1.0));
    assert!(matches!(result, Err(SamplerError::InvalidRender(_))));
    assert!(instance
        .render(&mut buffer, 80, 20, &RenderOptions::default())
        .is_ok());
}

#[test]
fn erase_accumulate_and_clamp() {
    let mut instance = instance();
    let mut buffer = vec![0.5; 64];
    instance
        .render(&mut buffer, 0, 32, &RenderOptions::accumulate())
        .unwrap();
    assert!(buffer.iter().all(|&s| s == 0.5));

    let mut buffer = vec![2.0; 64];
    instance
        .render(&mut buffer, 0, 32, &RenderOptions::accumulate().clamp(true))
        .unwrap();
    assert!(buffer.iter().all(|&s| s == 1.0));

    let mut buffer = vec![0.5; 64];
    instance
        .render(&mut buffer, 8, 8, &RenderOptions::default())
        .unwrap();
    assert!(buffer[..16].iter().all(|&s| s == 0.5));
    assert!(buffer[16..32].iter().all(|&s| s == 0.0));
    assert!(buffer[32..].iter().all(|&s| s == 0.5));
}

#[test]
fn hard_left_pan_silences_right() {
    let mut instance = instance();
    instance.panpot(0, -1.0);
    instance.key_on(0, 0, 1.0);
    let buffer = render(&mut instance, seconds(0.1));
    assert!(peak(&buffer, 0) > 0.001);
    assert_eq!(peak(&buffer, 1), 0.0);
}

#[test]
fn sysex_fade_level_scales_output() {
    let mut instance = instance();
    instance.sysex(&[0x43, 0x03, 0x01, 0x00]);
    assert_eq!(instance.fade_level(), 0.0);
    instance.key_on(0, 0, 1.0);
    let buffer = render(&mut instance, seconds(0.1));
    assert_eq!(peak(&buffer, 0), 0.0);

    instance.sysex(&[0x43, 0x03, 0x01, 0x7F]);
    assert_eq!(instance.fade_level(), 1.0);
}

#[test]
fn unknown_sysex_is_ignored() {
    let mut instance = instance();
    instance.sysex(&[]);
    instance.sysex(&[0x41, 0x10, 0x42]);
    instance.sysex(&[0x43, 0x03, 0x7E, 1, 2, 3]);
    assert_eq!(instance.fade_level(), 1.0);
    assert!(instance.wave_ram().is_none());
}

#[test]
fn custom_wave_drum_plays_from_ram() {
    let mut instance = instance();
    upload_ram(&mut instance, 800);
    assert_eq!(instance.wave_ram().map(<[i16]>::len), Some(800));
    register_drums(&mut instance, &[drum_entry(90, 0, 8_000, 800, 800)]);
    assert!(instance.custom_wave_drum(90).is_some());

    instance.drum_mode(9, DrumMode::Mfi);
    instance.key_on(9, 90 - 69, 1.0);
    let buffer = render(&mut instance, seconds(0.05));
    assert!(peak(&buffer, 0) > 0.001);

    // 800 samples at 8 kHz is 0.1 s; one-shot ends on its own
    render(&mut instance, seconds(0.5));
    assert!(instance.is_finished());
}

#[test]
fn short_loop_faster_than_output_wraps() {
    let mut instance = instance();
    upload_ram(&mut instance, 100);
    // One-sample loop stepped at more than one sample per internal tick
    register_drums(&mut instance, &[drum_entry(90, 0, 65_535, 99, 100)]);
    instance.drum_mode(0, DrumMode::Mfi);
    instance.key_on(0, 90 - 69, 1.0);

    let buffer = render(&mut instance, seconds(0.5));
    assert!(buffer.iter().all(|s| s.is_finite()));
    assert_eq!(instance.active_notes(), 1);

    instance.key_off(0, 90 - 69);
    render(&mut instance, seconds(1.0));
    assert!(instance.is_finished());
}

#[test]
fn invalid_wave_drum_entries_are_rejected() {
    let mut instance = instance();
    register_drums(
        &mut instance,
        &[
            // Inside the FM drum kit range
            drum_entry(40, 0, 8_000, 100, 100),
            // Past the end of ROM bank 0
            drum_entry(20, 1, 8_000, 60_000, 60_000),
            // Missing ROM bank
            drum_entry(21, 40, 8_000, 10, 10),
            // Loop after end
            drum_entry(22, 0, 8_000, 200, 100),
            // Valid ROM entry
            drum_entry(23, 1, 8_000, 100, 100),
        ],
    );
    for key in [40, 20, 21, 22] {
        assert!(instance.custom_wave_drum(key).is_none(), "key {key}");
    }
    assert!(instance.custom_wave_drum(23).is_some());
}

#[test]
fn ram_drum_without_ram_is_silent() {
    let mut instance = instance();
    register_drums(&mut instance, &[drum_entry(90, 0, 8_000, 400, 400)]);
    instance.drum_mode(0, DrumMode::Mfi);
    instance.key_on(0, 90 - 69, 1.0);
    // Key 90 has no FM drum or ROM wave drum either
    assert_eq!(instance.active_notes(), 0);
}

#[test]
fn ram_upload_stops_wave_drums() {
    let mut instance = instance();
    upload_ram(&mut instance, 4000);
    // Looped drum keeps going until stopped
    register_drums(&mut instance, &[drum_entry(90, 0, 8_000, 100, 4000)]);
    instance.drum_mode(0, DrumMode::Mfi);
    instance.key_on(0, 90 - 69, 1.0);
    render(&mut instance, seconds(1.0));
    assert_eq!(instance.active_notes(), 1);

    upload_ram(&mut instance, 100);
    render(&mut instance, 512);
    assert!(instance.is_finished());
}

#[test]
fn fm_drums_in_both_drum_modes() {
    let mut instance = instance();
    instance.drum_mode(0, DrumMode::Mfi);
    instance.key_on(0, 36 - 69, 1.0);
    assert_eq!(instance.active_notes(), 1);

    instance.drum_mode(1, DrumMode::Smaf);
    instance.program_change(1, 36);
    instance.key_on(1, 12, 1.0);
    assert_eq!(instance.active_notes(), 2);

    // Program outside the kit
    instance.program_change(1, 20);
    instance.key_on(1, 12, 1.0);
    assert!(peak(&render(&mut instance, seconds(0.05)), 0) > 0.001);

    // Drums are one-shots: they finish while the key is still down
    render(&mut instance, seconds(3.0));
    assert!(instance.is_finished());
}

#[test]
fn smaf_drums_use_the_fm_kit_by_program() {
    let mut instance = instance();
    // Key 38 has a ROM wave drum, which only the MFi kit uses
    instance.drum_mode(0, DrumMode::Mfi);
    instance.key_on(0, 38 - 69, 1.0);
    assert_eq!(instance.channel_presets(0), vec![PresetId::WaveDrum(38)]);

    instance.drum_mode(1, DrumMode::Smaf);
    instance.program_change(1, 38);
    instance.key_on(1, 0, 1.0);
    assert_eq!(instance.channel_presets(1), vec![PresetId::FmDrum(38)]);

    assert!(instance.channel_presets(99).is_empty());
}

#[test]
fn melodic_channel_is_monophonic() {
    let mut instance = instance();
    instance.key_on(0, 0, 1.0);
    instance.key_on(0, 3, 1.0);
    assert_eq!(instance.active_notes(), 2);
    render(&mut instance, seconds(2.0));
    assert_eq!(instance.active_notes(), 1);
}

#[test]
fn retrigger_same_key_updates_in_place() {
    let mut instance = instance();
    instance.key_on(0, 0, 1.0);
    instance.key_on(0, 0, 0.4);
    assert_eq!(instance.active_notes(), 1);
}

#[test]
fn drum_channel_steals_oldest_note() {
    let mut instance = instance();
    instance.drum_mode(0, DrumMode::Mfi);
    for key in 35..=60 {
        instance.key_on(0, key - 69, 1.0);
    }
    assert_eq!(instance.active_notes(), 16);
}

#[test]
fn out_of_range_channels_are_ignored() {
    let mut instance = instance();
    instance.key_on(99, 0, 1.0);
    instance.panpot(99, 1.0);
    instance.pitch_bend(99, 1.0);
    assert!(instance.is_finished());
}

#[test]
fn pitch_bend_moves_pitch() {
    fn zero_crossings(buffer: &[f32]) -> usize {
        buffer
            .iter()
            .step_by(2)
            .copied()
            .collect::<Vec<f32>>()
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count()
    }
    let sampler = Sampler::new(SamplerConfig::default()).unwrap();
    let mut plain = sampler.make_instance(1, 44_100.0).unwrap();
    let mut bent = sampler.make_instance(1, 44_100.0).unwrap();
    for instance in [&mut plain, &mut bent] {
        instance.bank_change(0, 1); // pure tone
        instance.key_on(0, 0, 1.0);
    }
    bent.pitch_bend_range(0, 12.0);
    bent.pitch_bend(0, 1.0);
    let mut a = vec![0.0; 2 * 44_100];
    let mut b = vec![0.0; 2 * 44_100];
    plain.render(&mut a, 0, 44_100, &RenderOptions::default()).unwrap();
    bent.render(&mut b, 0, 44_100, &RenderOptions::default()).unwrap();
    let (low, high) = (zero_crossings(&a), zero_crossings(&b));
    assert!((low as i32 - 440).abs() < 10, "plain {low}");
    assert!((high as i32 - 880).abs() < 20, "bent {high}");
}

#[test]
fn reset_silences_everything() {
    let mut instance = instance();
    upload_ram(&mut instance, 100);
    instance.key_on(0, 0, 1.0);
    instance.reset();
    assert!(instance.is_finished());
    assert!(instance.wave_ram().is_none());
    assert!(render(&mut instance, 256).iter().all(|&s| s == 0.0));
}

#[test]
fn ma2_tables_render() {
    let mut instance = Sampler::new(SamplerConfig::ma2())
        .unwrap()
        .make_instance(4, RATE)
        .unwrap();
    instance.program_change(0, 16);
    instance.key_on(0, -12, 1.0);
    assert!(peak(&render(&mut instance, seconds(0.1)), 0) > 0.001);
}
