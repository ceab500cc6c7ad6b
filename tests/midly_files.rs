//! Decode files written by `midly` and compare against what went in.

use midly::num::{u4, u7, u14, u15, u24, u28};
use midly::{
    Format, Fps, Header as MidlyHeader, MetaMessage, MidiMessage, PitchBend, Smf, Timing as MidlyTiming,
    TrackEvent, TrackEventKind,
};
use smf_player::{NoteEvent, NoteKind, TempoEvent, Timing, load, schedule};

fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(channel),
            message,
        },
    }
}

fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(message),
    }
}

fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
    midi(delta, channel, MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(vel) })
}

fn note_off(delta: u32, channel: u8, key: u8) -> TrackEvent<'static> {
    midi(delta, channel, MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(0) })
}

fn write(smf: &Smf<'_>) -> Vec<u8> {
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();
    bytes
}

fn ev(tick: u32, channel: u8, note: u8, velocity: u8, kind: NoteKind) -> NoteEvent {
    NoteEvent { tick, channel, note, velocity, kind }
}

#[test]
fn two_track_song_with_tempo_in_second_track() {
    let mut smf = Smf::new(MidlyHeader::new(
        Format::Parallel,
        MidlyTiming::Metrical(u15::new(480)),
    ));

    smf.tracks.push(vec![
        meta(0, MetaMessage::TrackName(b"piano")),
        midi(0, 0, MidiMessage::ProgramChange { program: u7::new(0) }),
        midi(0, 0, MidiMessage::Controller { controller: u7::new(7), value: u7::new(100) }),
        note_on(0, 0, 60, 90),
        note_on(0, 0, 64, 90),
        midi(240, 0, MidiMessage::PitchBend { bend: PitchBend(u14::new(9000)) }),
        note_off(240, 0, 60),
        // velocity-0 note on as release
        note_on(0, 0, 64, 0),
        note_on(0, 0, 67, 80),
        note_off(480, 0, 67),
        meta(0, MetaMessage::EndOfTrack),
    ]);
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::SysEx(&[0x7E, 0x7F, 0x09, 0x01, 0xF7]),
        },
        meta(480, MetaMessage::Tempo(u24::new(1_000_000))),
        meta(0, MetaMessage::EndOfTrack),
    ]);

    let (song, tempo) = load(&write(&smf)).unwrap();

    assert_eq!(song.header.format, 1);
    assert_eq!(song.header.tracks, 2);
    assert_eq!(song.header.timing, Timing::Ppqn(480));
    assert_eq!(
        song.notes,
        vec![
            ev(0, 0, 60, 90, NoteKind::On),
            ev(0, 0, 64, 90, NoteKind::On),
            ev(480, 0, 60, 0, NoteKind::Off),
            ev(480, 0, 64, 0, NoteKind::Off),
            ev(480, 0, 67, 80, NoteKind::On),
            ev(960, 0, 67, 0, NoteKind::Off),
        ]
    );
    assert_eq!(song.tempi, vec![TempoEvent { tick: 480, us_per_qn: 1_000_000 }]);

    // 120 BPM for the first beat, 60 BPM after.
    let events = schedule(&song, &tempo);
    let times: Vec<f64> = events.iter().map(|e| e.time).collect();
    assert_eq!(times, vec![0.0, 0.0, 0.5, 0.5, 0.5, 1.5]);

    let at_half: Vec<(bool, u8)> = events[2..5].iter().map(|e| (e.on, e.note)).collect();
    assert_eq!(at_half, vec![(false, 60), (false, 64), (true, 67)]);
}

#[test]
fn smpte_file_uses_fallback_resolution() {
    let mut smf = Smf::new(MidlyHeader::new(
        Format::SingleTrack,
        MidlyTiming::Timecode(Fps::Fps30, 80),
    ));
    smf.tracks.push(vec![
        note_on(0, 9, 36, 127),
        note_off(480, 9, 36),
        meta(0, MetaMessage::EndOfTrack),
    ]);

    let (song, tempo) = load(&write(&smf)).unwrap();
    assert_eq!(song.header.timing, Timing::Smpte { fps: 30, subframes: 80 });
    assert_eq!(tempo.ppqn(), 480);

    let events = schedule(&song, &tempo);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].time, 0.5);
}

#[test]
fn agrees_with_midly_on_note_events() {
    // A busy single track: interleaved channels, lots of running status.
    let mut track = Vec::new();
    let mut x: u32 = 0xC0FF_EE11;
    for i in 0..500u32 {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        let channel = (x % 4) as u8;
        let key = (36 + x % 48) as u8;
        let delta = if i % 3 == 0 { 0 } else { x % 200 };
        let vel = if x % 5 == 0 { 0 } else { (1 + x % 126) as u8 };
        track.push(note_on(delta, channel, key, vel));
        if i % 50 == 0 {
            track.push(meta(0, MetaMessage::Tempo(u24::new(300_000 + x % 400_000))));
        }
    }
    track.push(meta(0, MetaMessage::EndOfTrack));

    let mut smf = Smf::new(MidlyHeader::new(
        Format::SingleTrack,
        MidlyTiming::Metrical(u15::new(96)),
    ));
    smf.tracks.push(track);
    let bytes = write(&smf);

    let reference = Smf::parse(&bytes).unwrap();
    let mut expected = Vec::new();
    let mut tick = 0u32;
    for e in &reference.tracks[0] {
        tick += e.delta.as_int();
        if let TrackEventKind::Midi { channel, message: MidiMessage::NoteOn { key, vel } } = e.kind {
            let kind = if vel.as_int() == 0 { NoteKind::Off } else { NoteKind::On };
            expected.push(ev(tick, channel.as_int(), key.as_int(), vel.as_int(), kind));
        }
    }

    let (song, tempo) = load(&bytes).unwrap();
    assert_eq!(song.notes, expected);
    assert_eq!(song.tempi.len(), 10);

    let events = schedule(&song, &tempo);
    assert_eq!(events.len(), expected.len());
    for pair in events.windows(2) {
        assert!(pair[0].time <= pair[1].time);
    }
}

#[test]
fn truncated_file_fails_cleanly() {
    let mut smf = Smf::new(MidlyHeader::new(
        Format::SingleTrack,
        MidlyTiming::Metrical(u15::new(96)),
    ));
    smf.tracks.push(vec![
        note_on(0, 0, 60, 100),
        note_off(96, 0, 60),
        meta(0, MetaMessage::EndOfTrack),
    ]);
    let bytes = write(&smf);

    for cut in 0..bytes.len() {
        assert!(load(&bytes[..cut]).is_err(), "prefix of {cut} bytes decoded");
    }
    assert!(load(&bytes).is_ok());
}
