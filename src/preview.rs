//! Console summary of a decoded song: the header, the tempo situation and the
//! first few notes with their times.

use std::io::{self, Write};

use crate::schedule::{ScheduledEvent, end_time};
use crate::smf::{Song, Timing};
use crate::tempo::TempoMap;

/// Write the summary. `events` should be the song's schedule; only the first
/// `limit` entries are listed.
pub fn write_preview<W: Write>(
    out: &mut W,
    song: &Song,
    tempo: &TempoMap,
    events: &[ScheduledEvent],
    limit: usize,
) -> io::Result<()> {
    let h = &song.header;
    writeln!(out, "SMF header:")?;
    writeln!(out, "  format  = {}", h.format)?;
    writeln!(out, "  nTracks = {}", h.tracks)?;
    match h.timing {
        Timing::Ppqn(ppqn) => writeln!(out, "  PPQN    = {ppqn} ticks/qn")?,
        Timing::Smpte { fps, subframes } => writeln!(
            out,
            "  SMPTE   = {fps} fps, {subframes} subframes (using {} ticks/qn)",
            tempo.ppqn()
        )?,
    }

    writeln!(
        out,
        "Initial tempo: {} µs/qn (~{:.1} BPM), {} tempo segments",
        tempo.initial_tempo(),
        tempo.bpm_at(0),
        tempo.segments().len()
    )?;
    writeln!(out, "Note events: {}", events.len())?;
    writeln!(out, "Length: {}", format_duration(end_time(events)))?;

    if events.is_empty() || limit == 0 {
        return Ok(());
    }

    writeln!(out, "\nFirst {} note events with time:", limit.min(events.len()))?;
    for e in events.iter().take(limit) {
        writeln!(
            out,
            "t={:.3}s  {} ch={} note={} vel={}",
            e.time,
            if e.on { "On " } else { "Off" },
            e.channel,
            e.note,
            e.velocity
        )?;
    }
    Ok(())
}

/// Format seconds as MM:SS.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
