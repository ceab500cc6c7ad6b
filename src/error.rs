//! error.rs
//!
//! Every way decoding a MIDI file can fail. Decoding is fail-fast: the first
//! error aborts the whole parse and no partial `Song` is returned.

/// A typed decode failure, carrying enough position info to find the bad byte.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A read or skip would run past the end of the buffer.
    #[error("unexpected end of input at offset {offset} (wanted {wanted} more bytes)")]
    UnexpectedEndOfInput { offset: usize, wanted: usize },

    /// Bad chunk magic, bad header length, or an overlong VLQ.
    #[error("invalid format at offset {offset}: {reason}")]
    InvalidFormat { offset: usize, reason: &'static str },

    /// A track chunk declares more bytes than the file has left.
    #[error("track {track} declares {declared} bytes but only {available} remain")]
    TruncatedTrack {
        track: u16,
        declared: u32,
        available: usize,
    },

    /// A data byte showed up before any channel status byte in this track.
    #[error("running status used before any status byte (track {track}, tick {tick}, offset {offset})")]
    RunningStatusBeforeAnyStatus { track: u16, tick: u32, offset: usize },

    /// A status byte the decoder has no rule for (e.g. 0xF1..0xF6, 0xF8..0xFE).
    #[error("unsupported status byte 0x{status:02X} (track {track}, tick {tick})")]
    UnsupportedStatusByte { status: u8, track: u16, tick: u32 },
}

impl DecodeError {
    /// True if the buffer simply ran out, as opposed to containing bad data.
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, DecodeError::UnexpectedEndOfInput { .. })
    }
}
