//! smf.rs
//!
//! Decodes a Standard MIDI File (SMF) into a flat `Song`: the header plus every
//! note and tempo event, each stamped with its absolute tick.
//!
//! ### Quick primer on the file layout
//! - A file is a sequence of chunks. The first is `MThd` (the header), the rest
//!   are `MTrk` (tracks). Each chunk is a 4-byte tag, a 4-byte big-endian length
//!   and then that many bytes.
//! - A track is a list of `(delta-time, event)` pairs. Delta times are VLQs and
//!   count ticks since the previous event in the same track.
//! - Channel messages may omit their status byte if it is the same as the last
//!   one ("running status"), so the decoder has to remember it per track.
//! - Meta events (`0xFF`) and SysEx (`0xF0`/`0xF7`) carry a length, so anything
//!   we do not understand can be skipped exactly.
//!
//! Only Note On/Off and Set Tempo survive decoding. Everything else is read
//! just far enough to keep the cursor aligned, then dropped.

use log::{debug, trace};

use crate::cursor::ByteCursor;
use crate::error::DecodeError;

const MTHD: u32 = 0x4D54_6864;
const MTRK: u32 = 0x4D54_726B;
const HEADER_LEN: u32 = 6;

const META_END_OF_TRACK: u8 = 0x2F;
const META_SET_TEMPO: u8 = 0x51;

/// How the header's division field says ticks relate to time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timing {
    /// Ticks per quarter note.
    Ppqn(u16),
    /// Frames per second (24, 25, 29 or 30) and ticks per frame.
    Smpte { fps: u8, subframes: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// 0 = single track, 1 = parallel tracks, 2 = independent sequences.
    pub format: u16,
    pub tracks: u16,
    /// The raw division field, kept for diagnostics.
    pub division: u16,
    pub timing: Timing,
}

impl Header {
    pub fn ppqn(&self) -> Option<u16> {
        match self.timing {
            Timing::Ppqn(ppqn) => Some(ppqn),
            Timing::Smpte { .. } => None,
        }
    }

    pub fn is_ppqn(&self) -> bool {
        self.ppqn().is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

/// A Note On or Note Off at an absolute tick.
///
/// A Note On with velocity 0 is decoded as `Off` (with velocity 0). A real Note
/// Off keeps whatever release velocity the file gave it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub tick: u32,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub kind: NoteKind,
}

/// A Set Tempo meta event: from `tick` on, a quarter note lasts `us_per_qn` µs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoEvent {
    pub tick: u32,
    pub us_per_qn: u32,
}

/// Everything we keep from a MIDI file.
///
/// `notes` and `tempi` are in decode order (track by track), not time order.
/// Tempo events are pooled from every track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Song {
    pub header: Header,
    pub notes: Vec<NoteEvent>,
    pub tempi: Vec<TempoEvent>,
}

/// Per-track decoder state, threaded through every event step.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TrackState {
    pub track: u16,
    pub tick: u32,
    /// Last channel status byte, for running status.
    pub running: Option<u8>,
}

impl TrackState {
    pub fn new(track: u16) -> Self {
        Self { track, tick: 0, running: None }
    }
}

enum Step {
    Continue,
    EndOfTrack,
}

/// Decode a whole SMF held in memory.
///
/// Walks exactly `header.tracks` track chunks in file order and stops at the
/// first error. Bytes after the last declared track are ignored.
pub fn decode(bytes: &[u8]) -> Result<Song, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);
    let header = decode_header(&mut cursor)?;

    let mut song = Song {
        header,
        notes: Vec::new(),
        tempi: Vec::new(),
    };

    for track in 0..header.tracks {
        let mut body = open_track(&mut cursor, track)?;
        let mut state = TrackState::new(track);
        let (notes_before, tempi_before) = (song.notes.len(), song.tempi.len());

        walk_track(&mut body, &mut state, &mut song.notes, &mut song.tempi)?;

        debug!(
            "track {}: {} note events, {} tempo events, last tick {}",
            track,
            song.notes.len() - notes_before,
            song.tempi.len() - tempi_before,
            state.tick
        );
    }

    Ok(song)
}

/// Read and validate the `MThd` chunk.
pub fn decode_header(cursor: &mut ByteCursor<'_>) -> Result<Header, DecodeError> {
    let start = cursor.offset();
    if cursor.read_be32()? != MTHD {
        return Err(DecodeError::InvalidFormat {
            offset: start,
            reason: "missing 'MThd' header chunk",
        });
    }

    let len_offset = cursor.offset();
    if cursor.read_be32()? != HEADER_LEN {
        return Err(DecodeError::InvalidFormat {
            offset: len_offset,
            reason: "header chunk length must be 6",
        });
    }

    let format = cursor.read_be16()?;
    let tracks = cursor.read_be16()?;
    let division_offset = cursor.offset();
    let division = cursor.read_be16()?;

    let timing = if division & 0x8000 == 0 {
        let ppqn = division & 0x7FFF;
        if ppqn == 0 {
            return Err(DecodeError::InvalidFormat {
                offset: division_offset,
                reason: "division of zero ticks per quarter note",
            });
        }
        Timing::Ppqn(ppqn)
    } else {
        // High byte is a negative frame rate in two's complement.
        let [hi, lo] = division.to_be_bytes();
        Timing::Smpte {
            fps: (256 - u16::from(hi)) as u8,
            subframes: lo,
        }
    };

    debug!(
        "SMF header: format {}, {} tracks, timing {:?}",
        format, tracks, timing
    );

    Ok(Header {
        format,
        tracks,
        division,
        timing,
    })
}

/// Read an `MTrk` chunk header and split off a cursor over its body.
fn open_track<'a>(cursor: &mut ByteCursor<'a>, track: u16) -> Result<ByteCursor<'a>, DecodeError> {
    let start = cursor.offset();
    if cursor.read_be32()? != MTRK {
        return Err(DecodeError::InvalidFormat {
            offset: start,
            reason: "missing 'MTrk' track chunk",
        });
    }

    let declared = cursor.read_be32()?;
    let available = cursor.remaining();
    if declared as usize > available {
        return Err(DecodeError::TruncatedTrack {
            track,
            declared,
            available,
        });
    }

    cursor.sub_cursor(declared as usize)
}

/// Walk one track body until End of Track or until its bytes run out.
pub(crate) fn walk_track(
    body: &mut ByteCursor<'_>,
    state: &mut TrackState,
    notes: &mut Vec<NoteEvent>,
    tempi: &mut Vec<TempoEvent>,
) -> Result<(), DecodeError> {
    while !body.is_empty() {
        if let Step::EndOfTrack = step(body, state, notes, tempi)? {
            if !body.is_empty() {
                trace!(
                    "track {}: ignoring {} bytes after End of Track",
                    state.track,
                    body.remaining()
                );
            }
            break;
        }
    }
    Ok(())
}

/// Decode one `(delta, event)` pair.
fn step(
    body: &mut ByteCursor<'_>,
    state: &mut TrackState,
    notes: &mut Vec<NoteEvent>,
    tempi: &mut Vec<TempoEvent>,
) -> Result<Step, DecodeError> {
    let delta = body.read_vlq()?;
    state.tick = state.tick.saturating_add(delta);

    let first_offset = body.offset();
    let first = body.read_u8()?;

    // With running status, `first` is already the first data byte.
    let (status, mut pending) = if first & 0x80 != 0 {
        if first < 0xF0 {
            state.running = Some(first);
        }
        (first, None)
    } else {
        let status = state
            .running
            .ok_or(DecodeError::RunningStatusBeforeAnyStatus {
                track: state.track,
                tick: state.tick,
                offset: first_offset,
            })?;
        (status, Some(first))
    };

    let mut data = |body: &mut ByteCursor<'_>| match pending.take() {
        Some(b) => Ok(b),
        None => body.read_u8(),
    };

    let channel = status & 0x0F;
    match status & 0xF0 {
        kind @ (0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0) => {
            let d1 = data(body)?;
            let d2 = body.read_u8()?;
            let note_kind = match kind {
                0x90 if d2 != 0 => Some(NoteKind::On),
                0x90 | 0x80 => Some(NoteKind::Off),
                // Poly pressure, control change, pitch bend
                _ => None,
            };
            if let Some(kind) = note_kind {
                notes.push(NoteEvent {
                    tick: state.tick,
                    channel,
                    note: d1,
                    velocity: d2,
                    kind,
                });
            }
        }
        0xC0 | 0xD0 => {
            // Program change, channel pressure
            data(body)?;
        }
        _ => match status {
            0xFF => {
                let meta_type = body.read_u8()?;
                let len = body.read_vlq()? as usize;
                match meta_type {
                    META_END_OF_TRACK => return Ok(Step::EndOfTrack),
                    META_SET_TEMPO if len == 3 => {
                        let us_per_qn = body.read_be24()?;
                        tempi.push(TempoEvent {
                            tick: state.tick,
                            us_per_qn,
                        });
                    }
                    _ => body.skip(len)?,
                }
            }
            0xF0 | 0xF7 => {
                let len = body.read_vlq()? as usize;
                body.skip(len)?;
            }
            _ => {
                return Err(DecodeError::UnsupportedStatusByte {
                    status,
                    track: state.track,
                    tick: state.tick,
                });
            }
        },
    }

    Ok(Step::Continue)
}
