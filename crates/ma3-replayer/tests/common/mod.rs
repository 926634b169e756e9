//! Hand-assembled MLD and SMAF files for the integration tests

#![allow(dead_code)]

use ma3_sampler::{Sampler, SamplerConfig};

/// Output rate used by the playback tests (8000 frames per second keeps the
/// frame budget integral for both formats)
pub const RATE: f64 = 8_000.0;

pub fn sampler() -> Sampler {
    Sampler::new(SamplerConfig::default()).unwrap()
}

// MLD

/// Header sub-chunk: tag, u16 length, data
pub fn mld_sub_chunk(tag: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Complete MLD file with `track_count` taken from `tracks`
pub fn mld_file(sub_chunks: &[Vec<u8>], adpcm: &[Vec<u8>], tracks: &[Vec<u8>]) -> Vec<u8> {
    mld_file_with(0x0101, tracks.len() as u8, sub_chunks, adpcm, tracks)
}

pub fn mld_file_with(
    content_type: u16,
    track_count: u8,
    sub_chunks: &[Vec<u8>],
    adpcm: &[Vec<u8>],
    tracks: &[Vec<u8>],
) -> Vec<u8> {
    let mut header = content_type.to_be_bytes().to_vec();
    header.push(track_count);
    for chunk in sub_chunks {
        header.extend_from_slice(chunk);
    }

    let mut body = (header.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(&header);
    for blob in adpcm {
        body.extend_from_slice(b"adat");
        body.extend_from_slice(&(blob.len() as u32).to_be_bytes());
        body.extend_from_slice(blob);
    }
    for track in tracks {
        body.extend_from_slice(b"trac");
        body.extend_from_slice(&(track.len() as u32).to_be_bytes());
        body.extend_from_slice(track);
    }

    let mut file = b"melo".to_vec();
    file.extend_from_slice(&(body.len() as u32).to_be_bytes());
    file.extend_from_slice(&body);
    file
}

/// Three-byte note event: delta, channel/note status, gate
pub fn mld_note(delta: u8, channel: u8, note: u8, gate: u8) -> Vec<u8> {
    vec![delta, (channel << 6) | note, gate]
}

/// Non-note event: delta, 0xFF, id, value
pub fn mld_event(delta: u8, id: u8, value: u8) -> Vec<u8> {
    vec![delta, 0xFF, id, value]
}

/// One-second melody at 96 ticks per second: A4 then C#5, 48 ticks each.
/// With `looping` the whole melody sits between loop cuepoints.
pub fn mld_melody(looping: bool) -> Vec<u8> {
    let mut track = Vec::new();
    track.extend(mld_event(0, 0xC3, 120)); // timebase 48, 120 bpm
    track.extend(mld_event(0, 0xE0, 0)); // program 0 on channel 0
    track.extend(mld_event(0, 0xE2, 63)); // full volume
    if looping {
        track.extend(mld_event(0, 0xD0, 0));
    }
    track.extend(mld_note(0, 0, 24, 48)); // A4
    track.extend(mld_note(48, 0, 28, 48)); // C#5
    if looping {
        track.extend(mld_event(48, 0xD0, 1));
    }

    mld_file(
        &[
            mld_sub_chunk(b"note", &[0, 0]),
            mld_sub_chunk(b"titl", b"Test Tune"),
            mld_sub_chunk(b"auth", b"Tester\0\0"),
            mld_sub_chunk(b"prot", b"x1"),
        ],
        &[],
        &[track],
    )
}

// SMAF

/// Chunk with a u32 length
pub fn smaf_chunk(tag: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Complete SMAF file with CRC 0x1234 appended
pub fn smaf_file(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut body: Vec<u8> = chunks.concat();
    body.extend_from_slice(&[0x12, 0x34]);

    let mut file = b"MMMD".to_vec();
    file.extend_from_slice(&(body.len() as u32).to_be_bytes());
    file.extend_from_slice(&body);
    file
}

/// Contents-info chunk with comma-separated `XX:value` fields
pub fn smaf_contents(fields: &str) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 0, 0];
    data.extend_from_slice(fields.as_bytes());
    smaf_chunk(b"CNTI", &data)
}

/// Handy-Phone track with 10 ms duration and gate units
pub fn smaf_track(index: u8, sequence: &[u8]) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x10, 0x10, 0x00, 0x00];
    data.extend(smaf_chunk(b"Mtsq", sequence));
    smaf_chunk(&[b'M', b'T', b'R', index], &data)
}

/// One-second SMAF sequence: A4 then B4, 500 ms each, then end of track
pub fn smaf_sequence() -> Vec<u8> {
    vec![
        0x00, 0x00, 0x30, 0x00, // program 0
        0x00, 0x00, 0x37, 100, // channel volume
        0x00, 0x29, 50, // A4, gate 500 ms
        50, 0x2B, 50, // B4 after 500 ms
        50, 0x00, 0x00, 0x00, // end of track after another 500 ms
    ]
}

pub fn smaf_song() -> Vec<u8> {
    smaf_file(&[
        smaf_contents("ST:Ring,AN:Someone,ZZ:extra"),
        smaf_track(0, &smaf_sequence()),
    ])
}
