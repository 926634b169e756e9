mod common;

use std::io::Cursor;

use approx::assert_relative_eq;
use ma3_replayer::song::ChannelStatus;
use ma3_replayer::{
    decode, decode_mld, decode_mld_range, decode_smaf, detect_format, read_song, Control, Cue, Event,
    FormatError, MetadataFields, ReplayerError, SongFormat,
};

use common::*;

#[test]
fn mld_metadata_and_timing() {
    let song = decode_mld(&mld_melody(false)).unwrap();

    assert_eq!(song.format, SongFormat::Mld);
    assert_eq!(song.info.title, "Test Tune");
    assert_eq!(song.info.author, "Tester");
    assert_eq!(song.info.extra, vec![("prot".to_string(), "x1".to_string())]);
    assert_eq!(song.info.track_count, 1);
    assert_eq!(song.channel_count, 16);
    assert_eq!(song.info.total_ticks, 96);
    assert_eq!(song.info.loop_tick, None);
    assert_relative_eq!(song.info.duration_seconds, 1.0, epsilon = 1e-9);
    assert_eq!(song.crc, None);

    let notes: Vec<i32> = song.tracks[0]
        .events
        .iter()
        .filter_map(|e| match e.event {
            Event::Note { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(notes, vec![0, 4]);
}

#[test]
fn mld_loop_points() {
    let song = decode_mld(&mld_melody(true)).unwrap();

    assert_eq!(song.info.loop_tick, Some(0));
    assert_eq!(song.info.loop_seconds, Some(0.0));
    assert_eq!(song.info.total_ticks, 96);
    assert_relative_eq!(song.info.duration_seconds, 1.0, epsilon = 1e-9);
    assert_eq!(
        song.tracks[0].events[3].event,
        Event::Cuepoint(Cue::Start)
    );
}

#[test]
fn mld_tempo_change_scales_duration() {
    // Same melody at 60 bpm: 48 ticks per second
    let mut track = mld_event(0, 0xC3, 60);
    track.extend(mld_note(0, 0, 24, 48));
    track.extend(mld_note(48, 0, 28, 48));
    let song = decode_mld(&mld_file(&[], &[], &[track])).unwrap();

    assert_eq!(song.info.total_ticks, 96);
    assert_relative_eq!(song.info.duration_seconds, 2.0, epsilon = 1e-9);
}

#[test]
fn mld_adpcm_blobs_and_four_byte_notes() {
    let mut track = mld_event(0, 0xBA, 0x01); // drums on channel 0
    track.extend([0, 35, 24, (63 << 2) | 0b01]); // note 35, octave up
    let file = mld_file(
        &[
            mld_sub_chunk(b"note", &[0, 1]),
            mld_sub_chunk(b"ainf", &[2]),
        ],
        &[vec![0x11; 8], vec![0x22; 4]],
        &[track],
    );
    let song = decode_mld(&file).unwrap();

    assert_eq!(song.wave_data, vec![vec![0x11; 8], vec![0x22; 4]]);
    assert_eq!(
        song.tracks[0].events[0].event,
        Event::Control(Control::DrumEnable {
            channel: 0,
            enabled: true
        })
    );
    match song.tracks[0].events[1].event {
        Event::Note { key, velocity, .. } => {
            assert_eq!(key, 35 + 12 - 24);
            assert_relative_eq!(velocity, 1.0);
        }
        ref other => panic!("expected a note, got {other:?}"),
    }
}

#[test]
fn mld_errors() {
    let file = mld_melody(false);

    let truncated = &file[..file.len() - 3];
    assert!(matches!(
        decode_mld(truncated),
        Err(FormatError::LengthMismatch { .. })
    ));

    let track = mld_note(0, 0, 24, 48);
    let too_many = mld_file_with(0x0101, 5, &[], &[], &[track.clone()]);
    assert!(matches!(
        decode_mld(&too_many),
        Err(FormatError::TooManyTracks { count: 5, max: 4 })
    ));

    let wrong_type = mld_file_with(0x0201, 1, &[], &[], &[track]);
    assert!(matches!(
        decode_mld(&wrong_type),
        Err(FormatError::UnsupportedContentType { found: 0x0201 })
    ));

    let bad_timebase = mld_file(&[], &[], &[mld_event(0, 0xC7, 120)]);
    assert!(matches!(
        decode_mld(&bad_timebase),
        Err(FormatError::InvalidTimebase { .. })
    ));
}

#[test]
fn mld_range_decoding() {
    let file = mld_melody(false);
    let mut wrapped = vec![0xAA; 7];
    wrapped.extend_from_slice(&file);
    wrapped.extend_from_slice(&[0xBB; 5]);

    let song = decode_mld_range(&wrapped, 7, file.len()).unwrap();
    assert_eq!(song.info.title, "Test Tune");

    assert!(decode_mld_range(&wrapped, 7, wrapped.len()).is_err());
}

#[test]
fn smaf_metadata_and_timing() {
    let song = decode_smaf(&smaf_song()).unwrap();

    assert_eq!(song.format, SongFormat::Smaf);
    assert_eq!(song.info.title, "Ring");
    assert_eq!(song.info.author, "Someone");
    assert_eq!(
        song.info.extra,
        vec![("ZZ".to_string(), "extra".to_string())]
    );
    assert_eq!(song.crc, Some(0x1234));
    assert_eq!(song.channel_count, 4);
    assert_eq!(song.info.total_ticks, 1000);
    assert_relative_eq!(song.info.duration_seconds, 1.0, epsilon = 1e-9);
    assert_eq!(song.info.loop_tick, None);

    let timing = song.tracks[0].smaf.as_ref().unwrap();
    assert_eq!(timing.duration_ms, 10);
    assert_eq!(timing.gate_ms, 10);
    assert_eq!(timing.channel_status, [ChannelStatus::empty(); 4]);

    assert_eq!(song.title(), "Ring");
    assert_eq!(song.format(), "SMAF");
    assert_eq!(song.duration_label(), "0:01");
}

#[test]
fn smaf_higher_track_index_widens_channels() {
    let file = smaf_file(&[smaf_track(2, &smaf_sequence())]);
    let song = decode_smaf(&file).unwrap();

    assert_eq!(song.channel_count, 12);
    assert_eq!(song.tracks[0].channel_base, 8);
}

#[test]
fn smaf_octave_shift_and_exclusive() {
    let sequence = [
        0x00, 0x00, 0x32, 0x01, // octave shift +1
        0x00, 0x29, 10, // A5 now
        0x00, 0xFF, 0xF0, 0x03, 0x43, 0x01, 0xF7, // exclusive
        10, 0x00, 0x00, 0x00,
    ];
    let song = decode_smaf(&smaf_file(&[smaf_track(0, &sequence)])).unwrap();
    let events = &song.tracks[0].events;

    assert!(matches!(events[0].event, Event::Note { key: 12, .. }));
    assert_eq!(events[1].event, Event::ExtInfo(vec![0x43, 0x01]));
    assert_eq!(events[2].event, Event::EndOfTrack);
    assert_eq!(events[2].delta, 100);
}

#[test]
fn smaf_errors() {
    let bad_exclusive = [0x00, 0xFF, 0xF0, 0x02, 0x43, 0x00];
    assert!(matches!(
        decode_smaf(&smaf_file(&[smaf_track(0, &bad_exclusive)])),
        Err(FormatError::BadExclusiveTerminator { found: 0x00, .. })
    ));

    assert!(decode_smaf(&smaf_file(&[smaf_contents("ST:Empty")])).is_err());

    let mut mobile_standard = smaf_track(0, &smaf_sequence());
    mobile_standard[8] = 0x01;
    assert!(matches!(
        decode_smaf(&smaf_file(&[mobile_standard])),
        Err(FormatError::UnsupportedFormatType { found: 0x01 })
    ));

    assert!(matches!(
        decode_smaf(&smaf_file(&[smaf_track(16, &smaf_sequence())])),
        Err(FormatError::TooManyTracks { .. })
    ));
}

#[test]
fn format_detection_and_streaming() {
    assert_eq!(detect_format(&mld_melody(false)), Some(SongFormat::Mld));
    assert_eq!(detect_format(&smaf_song()), Some(SongFormat::Smaf));
    assert_eq!(detect_format(b"RIFF...."), None);
    assert_eq!(detect_format(b"me"), None);

    assert_eq!(decode(&smaf_song()).unwrap().format, SongFormat::Smaf);
    assert!(matches!(
        decode(b"RIFF1234"),
        Err(FormatError::BadMagic { .. })
    ));

    let song = read_song(Cursor::new(mld_melody(true))).unwrap();
    assert_eq!(song.info.loop_tick, Some(0));

    assert!(matches!(
        read_song(Cursor::new(b"MMMD".to_vec())),
        Err(ReplayerError::Format(FormatError::UnexpectedEof { .. }))
    ));
}
