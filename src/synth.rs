//! synth.rs
//!
//! Sound output for a scheduled song.
//!
//! - **FluidLite** loads a General MIDI SoundFont and renders PCM from note
//!   on/off calls.
//! - **CPAL** gives us an output stream on the default device. Its callback
//!   just asks FluidLite to `write()` into the buffer.
//!
//! The synth sits behind an `Arc<Mutex<…>>` shared by the CPAL callback and a
//! "conductor" thread. The conductor owns the schedule and a [`Playhead`] over
//! it, keeps a logical clock (wall time minus time spent paused) and drives the
//! playhead to that clock every few milliseconds.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use fluidlite::{Settings, Synth};
use log::{debug, error, info};

use crate::schedule::{NoteSink, Playhead, ScheduledEvent, end_time};

/// Let reverb and release tails ring out after the last event.
pub const TAIL_SECONDS: f64 = 2.0;

const CC_ALL_SOUND_OFF: u32 = 120;
const CC_RESET_ALL_CONTROLLERS: u32 = 121;

impl NoteSink for Synth {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        if let Err(e) = Synth::note_on(self, channel.into(), note.into(), velocity.into()) {
            debug!("note_on ch={channel} note={note}: {e}");
        }
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        // FluidLite reports an error for a note that is not sounding.
        let _ = Synth::note_off(self, channel.into(), note.into());
    }
}

fn silence(synth: &Synth) {
    for ch in 0..16u32 {
        let _ = synth.cc(ch, CC_ALL_SOUND_OFF, 0);
    }
}

/// Handle to a song playing on the conductor thread.
pub struct Player {
    paused: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    finished: Arc<AtomicBool>,
}

impl Player {
    /// Returns true if playback is now paused.
    pub fn toggle(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// A loaded synth plus the output stream pulling from it.
pub struct Audio {
    pub synth: Arc<Mutex<Synth>>,
    pub stream: Stream,
    pub sample_rate: f32,
}

impl Audio {
    /// Load `soundfont` into a fresh FluidLite synth and open the default
    /// output device. The stream is built but not started.
    pub fn new(soundfont: &Path) -> Result<Self> {
        let settings = Settings::new()?;
        let fl = Synth::new(settings)?;
        fl.sfload(soundfont, true)
            .with_context(|| format!("loading soundfont {}", soundfont.display()))?;

        fl.set_gain(0.7);
        fl.set_reverb_on(true);
        fl.set_reverb_params(0.7, 0.2, 0.9, 0.5);
        fl.set_chorus_on(true);
        fl.set_chorus_params(3, 1.2, 0.30, 8.0, Default::default());

        let host = cpal::default_host();
        let dev = host.default_output_device().context("no default output device")?;
        let cfg = dev.default_output_config().context("default_output_config")?;
        let sample_rate = cfg.sample_rate().0 as f32;

        fl.set_sample_rate(sample_rate);
        for ch in 0..16u32 {
            let _ = fl.pitch_bend(ch, 8192);
            let _ = fl.cc(ch, CC_RESET_ALL_CONTROLLERS, 0);
            let _ = fl.cc(ch, CC_ALL_SOUND_OFF, 0);
        }
        info!("Synth ready at {} Hz", sample_rate);

        let synth = Arc::new(Mutex::new(fl));
        let err_fn = |e| error!("stream error: {e}");
        let stream_cfg = cfg.config();

        let stream = match cfg.sample_format() {
            SampleFormat::I16 => dev.build_output_stream(
                &stream_cfg,
                {
                    let synth = synth.clone();
                    move |out: &mut [i16], _| match synth.lock() {
                        Ok(s) => {
                            if let Err(e) = s.write(out) {
                                error!("fluid write i16: {e}");
                            }
                        }
                        Err(_) => out.fill(0),
                    }
                },
                err_fn,
                None,
            )?,
            _ => dev.build_output_stream(
                &stream_cfg,
                {
                    let synth = synth.clone();
                    move |out: &mut [f32], _| match synth.lock() {
                        Ok(s) => {
                            if let Err(e) = s.write(out) {
                                error!("fluid write f32: {e}");
                            }
                        }
                        Err(_) => out.fill(0.0),
                    }
                },
                err_fn,
                None,
            )?,
        };

        Ok(Self { synth, stream, sample_rate })
    }

    /// Start pushing audio to the device. Must be called before anything is
    /// audible.
    pub fn start(&self) -> Result<()> {
        self.stream.play()?;
        Ok(())
    }

    /// Spawn the conductor thread for `events`, which must already be in
    /// playback order (see [`crate::schedule`]).
    pub fn play_schedule(&self, events: Vec<ScheduledEvent>) -> Player {
        let paused = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let paused_t = paused.clone();
        let finished_t = finished.clone();
        let synth = self.synth.clone();

        thread::spawn(move || {
            let end = end_time(&events) + TAIL_SECONDS;
            let mut head = Playhead::new(&events);

            let start = Instant::now();
            let mut paused_since: Option<Instant> = None;
            let mut paused_total = Duration::ZERO;

            loop {
                if stop_rx.try_recv().is_ok() {
                    debug!("playback stopped with {} events left", head.remaining());
                    break;
                }

                // Logical time does not advance while paused.
                if paused_t.load(Ordering::SeqCst) {
                    if paused_since.is_none() {
                        paused_since = Some(Instant::now());
                        if let Ok(s) = synth.lock() {
                            silence(&s);
                        }
                    }
                    thread::sleep(Duration::from_millis(10));
                    continue;
                } else if let Some(since) = paused_since.take() {
                    paused_total += since.elapsed();
                }

                let now = start.elapsed().saturating_sub(paused_total).as_secs_f64();
                if head.is_finished() && now >= end {
                    break;
                }

                match synth.lock() {
                    Ok(mut s) => {
                        head.drive(now, &mut *s);
                    }
                    Err(_) => break,
                }

                // Sleep in small chunks, never the whole gap.
                let wait = head.next_time().unwrap_or(end) - now;
                let wait = Duration::from_secs_f64(wait.clamp(0.0, 0.005));
                thread::sleep(wait.max(Duration::from_micros(200)));
            }

            if let Ok(s) = synth.lock() {
                silence(&s);
            }
            finished_t.store(true, Ordering::SeqCst);
        });

        Player { paused, stop_tx, finished }
    }
}

/// Load, start and play in one call. Convenience for callers that don't need
/// the `Audio` afterwards; it is returned so the stream stays alive.
pub fn play(soundfont: &Path, events: Vec<ScheduledEvent>) -> Result<(Audio, Player)> {
    let audio = Audio::new(soundfont)?;
    audio.start().context("starting audio stream")?;
    let player = audio.play_schedule(events);
    Ok((audio, player))
}
