//! i-melody (MLD) decoder
//!
//! Layout: `"melo" u32 length`, a header chunk with content type, track count
//! and tagged sub-chunks, then the ADPCM `adat` chunks and the `trac` chunks.
//! Track events are a one-byte delta followed by a status byte; see
//! [`decode_mld`] for the event grammar.

use log::debug;

use super::{slice_range, text_field, SongDecoder};
use crate::error::{FormatError, FormatResult};
use crate::reader::ByteReader;
use crate::scheduler;
use crate::song::{
    Control, Cue, Event, Song, SongFormat, SongInfo, TimedEvent, Track, CHANNELS_PER_TRACK,
};

/// File identifier
pub const MLD_MAGIC: &[u8; 4] = b"melo";

/// The only content type carrying a melody
pub const CONTENT_TYPE_MELODY: u16 = 0x0101;

/// Track limit (4 tracks x 4 channels)
pub const MAX_TRACKS: usize = 4;

/// Ticks per quarter note selected by the low nibble of a tempo event
const TIMEBASES: [Option<u16>; 16] = [
    Some(6),
    Some(12),
    Some(24),
    Some(48),
    Some(96),
    Some(192),
    Some(384),
    None,
    Some(15),
    Some(30),
    Some(60),
    Some(120),
    Some(240),
    Some(480),
    Some(960),
    None,
];

const DEFAULT_TIMEBASE: u16 = 48;
const DEFAULT_BPM: u16 = 120;

/// Status low bits marking a non-note event
const NOTE_END: u8 = 0x3F;

/// MIDI note of the lowest MLD note (A2), relative to A4
const NOTE_BASE: i32 = 45 - 69;

/// Scheduler ticks per second before the first tempo event
pub fn default_tick_rate() -> f64 {
    f64::from(DEFAULT_TIMEBASE) * f64::from(DEFAULT_BPM) / 60.0
}

/// Decode an MLD file
///
/// After the events are parsed a dry run of the scheduler fills in
/// [`SongInfo::total_ticks`], the loop position and the duration. A song with a
/// loop-start cue followed by a loop-end cue stops the scan at the loop end;
/// otherwise the scan runs until the last note's gate has expired.
///
/// # Event grammar
///
/// * status `& 0x3F != 0x3F`: note on channel `status >> 6`, then a gate byte,
///   and in 4-byte mode a byte with velocity in bits 7..2 and a signed 2-bit
///   octave shift in bits 1..0.
/// * otherwise an id byte: `>= 0xF0` extended info with a `u16` length,
///   `< 0x80` an unknown event with one data byte, anything else a controller
///   with one value byte.
///
/// # Errors
///
/// Any truncation, bad identifier, unsupported content type, more than four
/// tracks or an undefined timebase aborts the decode.
pub fn decode_mld(data: &[u8]) -> FormatResult<Song> {
    let mut file = ByteReader::new(data);
    file.expect_tag("melo")?;
    let length = file.u32()? as usize;
    if length > file.remaining() {
        return Err(FormatError::LengthMismatch {
            declared: length,
            available: file.remaining(),
        });
    }
    let mut body = file.sub_reader(length)?;

    let header_length = usize::from(body.u16()?);
    let mut header_reader = body.sub_reader(header_length)?;
    let header = parse_header(&mut header_reader)?;

    let mut wave_data = Vec::with_capacity(usize::from(header.adpcm_count));
    for _ in 0..header.adpcm_count {
        body.expect_tag("adat")?;
        let len = body.u32()? as usize;
        wave_data.push(body.bytes(len)?.to_vec());
    }

    let mut tracks = Vec::with_capacity(header.track_count);
    for index in 0..header.track_count {
        body.expect_tag("trac")?;
        let len = body.u32()? as usize;
        let reader = body.sub_reader(len)?;
        tracks.push(parse_track(reader, index, header.four_byte_notes)?);
    }
    if !body.is_at_end() {
        debug!("MLD: ignoring {} trailing bytes", body.remaining());
    }

    let mut info = header.info;
    info.track_count = tracks.len();
    let tick_rate = default_tick_rate();
    let scan = scheduler::scan(&tracks, tick_rate, true);
    info.total_ticks = scan.total_ticks;
    info.loop_tick = scan.loop_tick;
    info.loop_seconds = scan.loop_seconds;
    info.duration_seconds = scan.duration_seconds;

    debug!(
        "MLD: {} tracks, {} ADPCM blobs, {} ticks, {:.2}s, loop {:?}",
        tracks.len(),
        wave_data.len(),
        info.total_ticks,
        info.duration_seconds,
        info.loop_tick
    );

    Ok(Song {
        format: SongFormat::Mld,
        info,
        tracks,
        channel_count: MAX_TRACKS * CHANNELS_PER_TRACK,
        initial_tick_rate: tick_rate,
        wave_data,
        crc: None,
    })
}

/// Decode an MLD file stored at `offset..offset + length` of `data`
pub fn decode_mld_range(data: &[u8], offset: usize, length: usize) -> FormatResult<Song> {
    decode_mld(slice_range(data, offset, length)?)
}

/// Unit decoder for format-agnostic loading
#[derive(Debug, Clone, Copy, Default)]
pub struct MldDecoder;

impl SongDecoder for MldDecoder {
    fn decode(&self, data: &[u8]) -> FormatResult<Song> {
        decode_mld(data)
    }

    fn name(&self) -> &str {
        "MLD"
    }

    fn magic(&self) -> &[u8; 4] {
        MLD_MAGIC
    }
}

struct Header {
    info: SongInfo,
    track_count: usize,
    four_byte_notes: bool,
    adpcm_count: u8,
}

fn parse_header(reader: &mut ByteReader<'_>) -> FormatResult<Header> {
    let content_type = reader.u16()?;
    if content_type != CONTENT_TYPE_MELODY {
        return Err(FormatError::UnsupportedContentType {
            found: content_type,
        });
    }
    let track_count = usize::from(reader.u8()?);
    if track_count > MAX_TRACKS {
        return Err(FormatError::TooManyTracks {
            count: track_count,
            max: MAX_TRACKS,
        });
    }

    let mut header = Header {
        info: SongInfo::default(),
        track_count,
        four_byte_notes: false,
        adpcm_count: 0,
    };

    while !reader.is_at_end() {
        let id = reader.tag()?;
        let len = usize::from(reader.u16()?);
        let mut chunk = reader.sub_reader(len)?;
        let info = &mut header.info;
        match &id {
            b"note" => header.four_byte_notes = chunk.u16()? == 1,
            // Loops follow the cuepoint events in the tracks
            b"cuep" => debug!("MLD: skipping cuepoint offset table ({len} bytes)"),
            b"ainf" => header.adpcm_count = chunk.u8()?,
            b"titl" => info.title = text_field(chunk.rest()),
            b"auth" => info.author = text_field(chunk.rest()),
            b"copy" => info.copyright = text_field(chunk.rest()),
            b"date" => info.date = text_field(chunk.rest()),
            b"vers" => info.version = text_field(chunk.rest()),
            b"exst" => info.comments = text_field(chunk.rest()),
            _ => {
                let name = String::from_utf8_lossy(&id).into_owned();
                debug!("MLD: keeping header sub-chunk '{name}' ({len} bytes)");
                info.extra.push((name, text_field(chunk.rest())));
            }
        }
    }
    Ok(header)
}

fn parse_track(
    mut reader: ByteReader<'_>,
    index: usize,
    four_byte_notes: bool,
) -> FormatResult<Track> {
    let channel_base = index * CHANNELS_PER_TRACK;
    let mut events = Vec::new();

    while !reader.is_at_end() {
        let delta = u32::from(reader.u8()?);
        let status = reader.u8()?;

        let event = if status & NOTE_END != NOTE_END {
            parse_note(&mut reader, status, channel_base, four_byte_notes)?
        } else {
            let id = reader.u8()?;
            if id >= 0xF0 {
                let len = usize::from(reader.u16()?);
                Event::ExtInfo(reader.bytes(len)?.to_vec())
            } else if id < 0x80 {
                Event::Unknown {
                    id,
                    data: vec![reader.u8()?],
                }
            } else {
                control_event(id, reader.u8()?, channel_base)?
            }
        };
        events.push(TimedEvent::new(delta, event));
    }

    Ok(Track {
        events,
        channel_base,
        smaf: None,
    })
}

fn parse_note(
    reader: &mut ByteReader<'_>,
    status: u8,
    channel_base: usize,
    four_byte_notes: bool,
) -> FormatResult<Event> {
    let channel = channel_base + usize::from(status >> 6);
    let note = i32::from(status & 0x3F);
    let gate = u32::from(reader.u8()?);

    let (velocity, shift) = if four_byte_notes {
        let b = reader.u8()?;
        let shift = match b & 0x03 {
            0 => 0,
            1 => 1,
            2 => -2,
            _ => -1,
        };
        (f32::from(b >> 2) / 63.0, shift)
    } else {
        (1.0, 0)
    };

    Ok(Event::Note {
        channel,
        key: note + 12 * shift + NOTE_BASE,
        gate,
        velocity,
    })
}

/// Split a 6-bit centred value into `-1.0..=1.0`
fn centred(p: u8) -> f32 {
    let p = f32::from(p) - 32.0;
    if p < 0.0 {
        p / 32.0
    } else {
        p / 31.0
    }
}

fn control_event(id: u8, value: u8, channel_base: usize) -> FormatResult<Event> {
    let channel = channel_base + usize::from(value >> 6);
    let low = value & 0x3F;

    let control = match id {
        0xB0 => Control::MasterVolume(f32::from(value & 0x7F) / 127.0),
        0xB1 => Control::MasterTune((f32::from(value & 0x7F) - 64.0) / 100.0),
        0xBA => Control::DrumEnable {
            channel,
            enabled: value & 0x01 != 0,
        },
        0xC0..=0xCF => {
            let timebase = TIMEBASES[usize::from(id & 0x0F)]
                .ok_or(FormatError::InvalidTimebase { code: id })?;
            Control::Tempo {
                timebase,
                bpm: u16::from(value),
            }
        }
        0xD0 => {
            return Ok(match value {
                0 => Event::Cuepoint(Cue::Start),
                1 => Event::Cuepoint(Cue::End),
                _ => Event::Unknown {
                    id,
                    data: vec![value],
                },
            })
        }
        0xE0 => Control::Program {
            channel,
            program: low,
        },
        0xE1 => Control::Bank { channel, bank: low },
        0xE2 => Control::Volume {
            channel,
            value: f32::from(low) / 63.0,
        },
        0xE3 => Control::Pan {
            channel,
            value: centred(low),
        },
        0xE4 => Control::PitchBend {
            channel,
            value: centred(low),
        },
        // Range in 1/100 semitone steps
        0xE7 => Control::PitchBendRange {
            channel,
            semitones: f32::from(low) / 100.0,
        },
        _ => {
            return Ok(Event::Unknown {
                id,
                data: vec![value],
            })
        }
    };
    Ok(Event::Control(control))
}
