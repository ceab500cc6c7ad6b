//! Standard MIDI File decoding and playback scheduling.
//!
//! ```text
//! bytes ──decode──▶ Song ──TempoMap::from_song──▶ TempoMap
//!                    └──────────schedule(song, map)──────────▶ [ScheduledEvent]
//! ```
//!
//! [`load`] and [`schedule`] are all a renderer needs. Everything here is pure
//! and synchronous: no I/O, no clocks, no shared state.

pub mod cursor;
pub mod error;
pub mod preview;
pub mod schedule;
pub mod smf;
pub mod soundfont;
#[cfg(feature = "audio")]
pub mod synth;
pub mod tempo;

pub use cursor::ByteCursor;
pub use error::DecodeError;
pub use schedule::{NoteSink, Playhead, ScheduledEvent, end_time, schedule};
pub use smf::{Header, NoteEvent, NoteKind, Song, TempoEvent, Timing, decode};
pub use tempo::{TempoMap, TempoSegment, ticks_to_seconds};

/// Decode a whole MIDI file and build its tempo map.
pub fn load(bytes: &[u8]) -> Result<(Song, TempoMap), DecodeError> {
    let song = decode(bytes)?;
    let tempo = TempoMap::from_song(&song);
    Ok((song, tempo))
}
