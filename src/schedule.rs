//! schedule.rs
//!
//! Projects a song's notes onto the time axis and orders them for playback.
//!
//! The renderer walks the result with a [`Playhead`]: every time its clock moves
//! it asks for the events that became due since the last call. The playhead
//! only moves forward and can be dropped at any point.

use std::cmp::Ordering;

use crate::smf::{NoteKind, Song};
use crate::tempo::TempoMap;

/// A note on or off at an absolute time in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledEvent {
    pub time: f64,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub on: bool,
}

/// Anything that can play notes.
pub trait NoteSink {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
}

/// Time order, then Off before On, then channel, then note.
///
/// Off-before-On matters: a note released and re-struck at the same instant
/// must end up sounding, not be cut off by its own release.
fn playback_order(a: &ScheduledEvent, b: &ScheduledEvent) -> Ordering {
    a.time
        .total_cmp(&b.time)
        .then_with(|| a.on.cmp(&b.on))
        .then_with(|| a.channel.cmp(&b.channel))
        .then_with(|| a.note.cmp(&b.note))
}

/// Build the playback order for a song. Stable: events that compare equal
/// keep decode order.
pub fn schedule(song: &Song, tempo: &TempoMap) -> Vec<ScheduledEvent> {
    let mut events: Vec<ScheduledEvent> = song
        .notes
        .iter()
        .map(|n| ScheduledEvent {
            time: tempo.seconds_at(n.tick),
            channel: n.channel,
            note: n.note,
            velocity: n.velocity,
            on: n.kind == NoteKind::On,
        })
        .collect();

    events.sort_by(playback_order);
    events
}

/// Time of the last event, or 0 for an empty schedule.
pub fn end_time(events: &[ScheduledEvent]) -> f64 {
    events.last().map(|e| e.time).unwrap_or(0.0)
}

/// A forward-only cursor over a sorted schedule.
#[derive(Clone, Debug)]
pub struct Playhead<'a> {
    events: &'a [ScheduledEvent],
    next: usize,
}

impl<'a> Playhead<'a> {
    pub fn new(events: &'a [ScheduledEvent]) -> Self {
        Self { events, next: 0 }
    }

    /// Every not-yet-returned event with `time <= now`.
    ///
    /// A `now` earlier than a previous call returns nothing; the playhead
    /// never moves back.
    pub fn advance(&mut self, now: f64) -> &'a [ScheduledEvent] {
        let start = self.next;
        let due = self.events[start..]
            .iter()
            .take_while(|e| e.time <= now)
            .count();
        self.next += due;
        &self.events[start..self.next]
    }

    /// Advance to `now` and apply the due events to `sink`. Returns how many
    /// were applied.
    pub fn drive<S: NoteSink + ?Sized>(&mut self, now: f64, sink: &mut S) -> usize {
        let due = self.advance(now);
        for e in due {
            if e.on {
                sink.note_on(e.channel, e.note, e.velocity);
            } else {
                sink.note_off(e.channel, e.note);
            }
        }
        due.len()
    }

    /// Time of the next pending event.
    pub fn next_time(&self) -> Option<f64> {
        self.events.get(self.next).map(|e| e.time)
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.events.len()
    }
}
