//! SMAF (MMF) decoder, Handy-Phone Standard track format only
//!
//! The container is `"MMMD" u32 length` followed by chunks and a trailing
//! CRC-16. The CRC is kept in [`Song::crc`] but never verified. Durations and
//! gate times are scaled to milliseconds by the track timebases, so the
//! scheduler runs SMAF songs at 1000 ticks per second.

use log::{debug, trace};

use super::{slice_range, text_field, SongDecoder};
use crate::error::{FormatError, FormatResult};
use crate::reader::ByteReader;
use crate::scheduler;
use crate::song::{
    ChannelStatus, Control, Event, SmafTiming, Song, SongFormat, SongInfo, TimedEvent, Track,
    CHANNELS_PER_TRACK,
};

/// File identifier
pub const SMAF_MAGIC: &[u8; 4] = b"MMMD";

/// Scheduler ticks per second (one tick per millisecond)
pub const TICK_RATE: f64 = 1000.0;

/// Highest `MTRx` channel-group index accepted
pub const MAX_TRACK_INDEX: u8 = 15;

/// Handy-Phone Standard, the only supported format type
const FORMAT_HANDY_PHONE: u8 = 0;

const EXCLUSIVE_END: u8 = 0xF7;

/// Expression values for the short-form event ids (0 and 15 reserved)
const EXPRESSION_STEPS: [Option<u8>; 16] = [
    None,
    Some(0x00),
    Some(0x1F),
    Some(0x27),
    Some(0x2F),
    Some(0x37),
    Some(0x3F),
    Some(0x47),
    Some(0x4F),
    Some(0x57),
    Some(0x5F),
    Some(0x67),
    Some(0x6F),
    Some(0x77),
    Some(0x7F),
    None,
];

/// Modulation depths for the short-form event ids (0 and 15 reserved)
const MODULATION_STEPS: [Option<u8>; 16] = [
    None,
    Some(0x00),
    Some(0x08),
    Some(0x10),
    Some(0x18),
    Some(0x20),
    Some(0x28),
    Some(0x30),
    Some(0x38),
    Some(0x40),
    Some(0x48),
    Some(0x50),
    Some(0x60),
    Some(0x70),
    Some(0x7F),
    None,
];

/// Milliseconds per unit for a timebase code
fn timebase_ms(code: u8) -> FormatResult<u32> {
    match code {
        0x00 => Ok(1),
        0x01 => Ok(2),
        0x02 => Ok(4),
        0x03 => Ok(5),
        0x10 => Ok(10),
        0x11 => Ok(20),
        0x12 => Ok(40),
        0x13 => Ok(50),
        _ => Err(FormatError::InvalidTimebase { code }),
    }
}

/// Read a SMAF variable-length number (one or two bytes)
pub fn read_varlen(reader: &mut ByteReader<'_>) -> FormatResult<u32> {
    let first = reader.u8()?;
    if first < 0x80 {
        return Ok(u32::from(first));
    }
    let second = reader.u8()?;
    Ok(((u32::from(first & 0x7F) << 7) | u32::from(second)) + 128)
}

/// Decode a SMAF file
///
/// # Errors
///
/// Truncated chunks, a track format other than Handy-Phone Standard, an
/// undefined timebase, an exclusive block not ending in `0xF7` or a file
/// without any `MTR` chunk abort the decode.
pub fn decode_smaf(data: &[u8]) -> FormatResult<Song> {
    let mut file = ByteReader::new(data);
    file.expect_tag("MMMD")?;
    let length = file.u32()? as usize;
    if length > file.remaining() {
        return Err(FormatError::LengthMismatch {
            declared: length,
            available: file.remaining(),
        });
    }
    if length < 2 {
        return Err(format!("SMAF body of {length} bytes cannot hold the CRC").into());
    }
    let mut body = file.sub_reader(length)?;
    let mut chunks = body.sub_reader(length - 2)?;
    let crc = body.u16()?;

    let mut info = SongInfo::default();
    let mut tracks = Vec::new();
    let mut max_index = 0u8;

    while !chunks.is_at_end() {
        let id = chunks.tag()?;
        let len = chunks.u32()? as usize;
        let chunk = chunks.sub_reader(len)?;
        match id {
            [b'C', b'N', b'T', b'I'] => parse_contents_info(chunk, &mut info)?,
            [b'M', b'T', b'R', index] => {
                if index > MAX_TRACK_INDEX {
                    return Err(FormatError::TooManyTracks {
                        count: usize::from(index) + 1,
                        max: usize::from(MAX_TRACK_INDEX) + 1,
                    });
                }
                max_index = max_index.max(index);
                tracks.push(parse_track(chunk, index)?);
            }
            _ => debug!(
                "SMAF: skipping '{}' chunk ({len} bytes)",
                String::from_utf8_lossy(&id)
            ),
        }
    }

    if tracks.is_empty() {
        return Err("SMAF file has no MTR track chunk".into());
    }

    info.track_count = tracks.len();
    let scan = scheduler::scan(&tracks, TICK_RATE, false);
    info.total_ticks = scan.total_ticks;
    info.duration_seconds = scan.duration_seconds;

    debug!(
        "SMAF: {} tracks, {} events, {:.2}s, crc 0x{crc:04x} (unverified)",
        tracks.len(),
        tracks.iter().map(|t| t.events.len()).sum::<usize>(),
        info.duration_seconds
    );

    Ok(Song {
        format: SongFormat::Smaf,
        info,
        tracks,
        channel_count: (usize::from(max_index) + 1) * CHANNELS_PER_TRACK,
        initial_tick_rate: TICK_RATE,
        wave_data: Vec::new(),
        crc: Some(crc),
    })
}

/// Decode a SMAF file stored at `offset..offset + length` of `data`
pub fn decode_smaf_range(data: &[u8], offset: usize, length: usize) -> FormatResult<Song> {
    decode_smaf(slice_range(data, offset, length)?)
}

/// Unit decoder for format-agnostic loading
#[derive(Debug, Clone, Copy, Default)]
pub struct SmafDecoder;

impl SongDecoder for SmafDecoder {
    fn decode(&self, data: &[u8]) -> FormatResult<Song> {
        decode_smaf(data)
    }

    fn name(&self) -> &str {
        "SMAF"
    }

    fn magic(&self) -> &[u8; 4] {
        SMAF_MAGIC
    }
}

fn parse_contents_info(mut reader: ByteReader<'_>, info: &mut SongInfo) -> FormatResult<()> {
    let class = reader.u8()?;
    let kind = reader.u8()?;
    let code = reader.u8()?;
    let status = reader.u8()?;
    let counts = reader.u8()?;
    trace!("SMAF: CNTI class {class} type {kind} code {code} status {status} counts {counts}");

    for field in reader.rest().split(|&b| b == b',') {
        let [a, b, b':', value @ ..] = field else {
            continue;
        };
        let tag = String::from_utf8_lossy(&[*a, *b]).into_owned();
        let value = text_field(value);
        match tag.as_str() {
            "ST" => info.title = value,
            "AN" => info.author = value,
            "CR" => info.copyright = value,
            "CD" => info.date = value,
            _ => info.extra.push((tag, value)),
        }
    }
    Ok(())
}

fn parse_track(mut reader: ByteReader<'_>, index: u8) -> FormatResult<Track> {
    let format = reader.u8()?;
    if format != FORMAT_HANDY_PHONE {
        return Err(FormatError::UnsupportedFormatType { found: format });
    }
    let sequence_type = reader.u8()?;
    let duration_ms = timebase_ms(reader.u8()?)?;
    let gate_ms = timebase_ms(reader.u8()?)?;
    let channel_status = ChannelStatus::unpack(reader.u16()?);
    let channel_base = usize::from(index) * CHANNELS_PER_TRACK;

    let mut setup = Vec::new();
    let mut events = Vec::new();
    while !reader.is_at_end() {
        let id = reader.tag()?;
        let len = reader.u32()? as usize;
        let chunk = reader.sub_reader(len)?;
        match &id {
            b"Mtsu" => setup = chunk.rest().to_vec(),
            b"Mtsq" => events = parse_sequence(chunk, channel_base, duration_ms, gate_ms)?,
            _ => debug!(
                "SMAF: track {index}: skipping '{}' chunk",
                String::from_utf8_lossy(&id)
            ),
        }
    }

    Ok(Track {
        events,
        channel_base,
        smaf: Some(SmafTiming {
            sequence_type,
            duration_ms,
            gate_ms,
            channel_status,
            setup,
        }),
    })
}

fn parse_sequence(
    mut reader: ByteReader<'_>,
    channel_base: usize,
    duration_ms: u32,
    gate_ms: u32,
) -> FormatResult<Vec<TimedEvent>> {
    let mut events = Vec::new();
    let mut octave_shift = 0i32;
    // Time of events the decoder consumes itself (octave shift)
    let mut carry = 0u32;

    while !reader.is_at_end() {
        let delta = carry.saturating_add(read_varlen(&mut reader)?.saturating_mul(duration_ms));
        let first = reader.u8()?;

        let event = match first {
            0x00 => {
                let second = reader.u8()?;
                if second == 0x00 {
                    let third = reader.u8()?;
                    Some(if third == 0x00 {
                        Event::EndOfTrack
                    } else {
                        Event::Unknown {
                            id: 0x00,
                            data: vec![third],
                        }
                    })
                } else {
                    channel_event(&mut reader, second, channel_base, &mut octave_shift)?
                }
            }
            0xFF => Some(escape_event(&mut reader)?),
            _ => {
                let gate = read_varlen(&mut reader)?.saturating_mul(gate_ms);
                let octave = i32::from((first >> 4) & 0x03);
                let note = i32::from(first & 0x0F);
                let midi = 36 + 12 * (octave + octave_shift) + note;
                Some(Event::Note {
                    channel: channel_base + usize::from(first >> 6),
                    key: midi - 69,
                    gate,
                    velocity: 1.0,
                })
            }
        };

        match event {
            Some(event) => {
                events.push(TimedEvent::new(delta, event));
                carry = 0;
            }
            None => carry = delta,
        }
    }

    if carry > 0 {
        events.push(TimedEvent::new(carry, Event::EndOfTrack));
    }
    Ok(events)
}

/// `FF xx` events: no-op and exclusive blocks
fn escape_event(reader: &mut ByteReader<'_>) -> FormatResult<Event> {
    let kind = reader.u8()?;
    if kind != 0xF0 {
        return Ok(Event::Unknown {
            id: 0xFF,
            data: vec![kind],
        });
    }

    let len = usize::from(reader.u8()?);
    let offset = reader.absolute_position() + len.saturating_sub(1);
    let block = reader.bytes(len)?;
    match block.split_last() {
        Some((&EXCLUSIVE_END, payload)) => Ok(Event::ExtInfo(payload.to_vec())),
        Some((&found, _)) => Err(FormatError::BadExclusiveTerminator { offset, found }),
        None => Err("empty SMAF exclusive block".into()),
    }
}

/// `00 xx` events; `None` when the decoder consumes the event itself
fn channel_event(
    reader: &mut ByteReader<'_>,
    status: u8,
    channel_base: usize,
    octave_shift: &mut i32,
) -> FormatResult<Option<Event>> {
    let channel = channel_base + usize::from(status >> 6);
    let class = (status >> 4) & 0x03;
    let id = status & 0x0F;

    let control = match class {
        3 => {
            let value = reader.u8()?;
            match id {
                0 => Control::Program {
                    channel,
                    program: value,
                },
                1 => Control::Bank {
                    channel,
                    bank: value,
                },
                2 => {
                    match value {
                        0 => *octave_shift = 0,
                        1..=4 => *octave_shift = i32::from(value),
                        0x81..=0x84 => *octave_shift = -i32::from(value & 0x7F),
                        _ => debug!("SMAF: ignoring octave shift 0x{value:02x}"),
                    }
                    return Ok(None);
                }
                3 => Control::Modulation { channel, value },
                4 => Control::PitchBend {
                    channel,
                    value: (f32::from(value) - 64.0) / 64.0,
                },
                7 => Control::Volume {
                    channel,
                    value: f32::from(value) / 127.0,
                },
                10 => Control::Pan {
                    channel,
                    value: ((f32::from(value) - 64.0) / 64.0).clamp(-1.0, 1.0),
                },
                11 => Control::Expression {
                    channel,
                    value: f32::from(value) / 127.0,
                },
                _ => {
                    return Ok(Some(Event::Unknown {
                        id: status,
                        data: vec![value],
                    }))
                }
            }
        }
        0 => match EXPRESSION_STEPS[usize::from(id)] {
            Some(value) => Control::Expression {
                channel,
                value: f32::from(value) / 127.0,
            },
            None => {
                return Ok(Some(Event::Unknown {
                    id: status,
                    data: Vec::new(),
                }))
            }
        },
        1 => Control::PitchBend {
            channel,
            value: (f32::from(id * 8) - 64.0) / 64.0,
        },
        _ => match MODULATION_STEPS[usize::from(id)] {
            Some(value) => Control::Modulation { channel, value },
            None => {
                return Ok(Some(Event::Unknown {
                    id: status,
                    data: Vec::new(),
                }))
            }
        },
    };
    Ok(Some(Event::Control(control)))
}
