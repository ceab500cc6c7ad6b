//! tempo.rs
//!
//! Turns the sparse Set Tempo events of a song into a piecewise-linear map from
//! ticks to seconds.
//!
//! Each segment says "from this tick (which is this many seconds in) a quarter
//! note lasts N µs". Inside a segment, time is linear in ticks, so converting a
//! tick means finding its segment and adding the linear offset.

use log::{debug, trace};

use crate::smf::{Song, TempoEvent, Timing};

/// 120 BPM, the SMF default until the first Set Tempo.
pub const DEFAULT_US_PER_QN: u32 = 500_000;

/// Stand-in resolution for SMPTE-timed files.
pub const SMPTE_FALLBACK_PPQN: u32 = 480;

const MICROS_PER_SECOND: f64 = 1_000_000.0;
const MICROS_PER_MINUTE: f64 = 60_000_000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoSegment {
    /// First tick this tempo applies to.
    pub start_tick: u32,
    /// Seconds elapsed at `start_tick`.
    pub start_sec: f64,
    pub us_per_qn: u32,
}

impl TempoSegment {
    /// Seconds spanned by `ticks` at this segment's tempo.
    fn span(&self, ticks: u32, ppqn: u32) -> f64 {
        f64::from(ticks) / f64::from(ppqn) * (f64::from(self.us_per_qn) / MICROS_PER_SECOND)
    }
}

/// Tempo segments sorted by strictly ascending `start_tick`. The first one
/// always starts at tick 0.
#[derive(Clone, Debug, PartialEq)]
pub struct TempoMap {
    ppqn: u32,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// Build the map for a decoded song.
    pub fn from_song(song: &Song) -> Self {
        let ppqn = match song.header.timing {
            Timing::Ppqn(ppqn) => u32::from(ppqn),
            Timing::Smpte { .. } => SMPTE_FALLBACK_PPQN,
        };
        Self::build(&song.tempi, ppqn)
    }

    /// Build a map from tempo events in any order.
    ///
    /// Events at the same tick are applied in input order, so the last one
    /// wins. A `ppqn` of 0 is treated as the SMPTE fallback.
    pub fn build(tempi: &[TempoEvent], ppqn: u32) -> Self {
        let ppqn = if ppqn == 0 { SMPTE_FALLBACK_PPQN } else { ppqn };

        let mut sorted = tempi.to_vec();
        sorted.sort_by_key(|t| t.tick);

        let mut segments = vec![TempoSegment {
            start_tick: 0,
            start_sec: 0.0,
            us_per_qn: DEFAULT_US_PER_QN,
        }];

        for t in sorted {
            // `segments` is never empty; the seed is pushed above.
            let Some(last) = segments.last_mut() else { break };

            if t.tick < last.start_tick {
                trace!("dropping out-of-order tempo {} at tick {}", t.us_per_qn, t.tick);
                continue;
            }

            if t.tick == last.start_tick {
                last.us_per_qn = t.us_per_qn;
                continue;
            }

            let start_sec = last.start_sec + last.span(t.tick - last.start_tick, ppqn);
            segments.push(TempoSegment {
                start_tick: t.tick,
                start_sec,
                us_per_qn: t.us_per_qn,
            });
        }

        debug!(
            "tempo map: ppqn {}, {} segments from {} tempo events",
            ppqn,
            segments.len(),
            tempi.len()
        );

        Self { ppqn, segments }
    }

    /// Ticks per quarter note used for conversion (never a raw SMPTE value).
    pub fn ppqn(&self) -> u32 {
        self.ppqn
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    /// The segment in effect at `tick`: the last one starting at or before it.
    pub fn segment_at(&self, tick: u32) -> &TempoSegment {
        let idx = self.segments.partition_point(|s| s.start_tick <= tick);
        // The first segment starts at tick 0, so idx >= 1.
        &self.segments[idx.saturating_sub(1)]
    }

    /// Absolute time in seconds of `tick`. Past the last tempo change the
    /// final tempo carries on forever.
    pub fn seconds_at(&self, tick: u32) -> f64 {
        let seg = self.segment_at(tick);
        seg.start_sec + seg.span(tick - seg.start_tick, self.ppqn)
    }

    /// Microseconds per quarter note at tick 0.
    pub fn initial_tempo(&self) -> u32 {
        self.segments[0].us_per_qn
    }

    pub fn bpm_at(&self, tick: u32) -> f64 {
        MICROS_PER_MINUTE / f64::from(self.segment_at(tick).us_per_qn.max(1))
    }
}

/// Free-function form of [`TempoMap::seconds_at`].
pub fn ticks_to_seconds(tick: u32, map: &TempoMap) -> f64 {
    map.seconds_at(tick)
}
