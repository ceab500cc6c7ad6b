use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::{
    fs,
    io::{Write, stdout},
    path::{Path, PathBuf},
};

use smf_player::{load, preview::write_preview, schedule};

#[derive(Parser, Debug)]
#[command(name = "smf-player", about = "Decode and play a Standard MIDI File through a SoundFont")]
struct Opt {
    /// Path to a Standard MIDI File (.mid)
    midi: PathBuf,

    /// SoundFont to use: a path, or a name/stem inside --soundfonts
    #[arg(long = "sf")]
    soundfont: Option<String>,

    /// Directory searched for .sf2 files
    #[arg(long, default_value = "soundfonts")]
    soundfonts: PathBuf,

    /// How many note events to print before playing
    #[arg(long, default_value_t = 10)]
    preview: usize,

    /// Print the preview and exit without opening an audio device
    #[arg(short, long, default_value_t = false)]
    dry_run: bool,

    /// Debug-level logging (RUST_LOG still wins)
    #[arg(short, long)]
    verbose: bool,
}

/// Whole-file read; the decoder itself never touches the filesystem.
fn read_midi_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading MIDI file {}", path.display()))
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    let default_level = if opt.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let bytes = read_midi_file(&opt.midi)?;
    info!("Read {}: {} bytes", opt.midi.display(), bytes.len());

    let (song, tempo) = match load(&bytes) {
        Ok(parsed) => parsed,
        Err(e) if e.is_end_of_input() => {
            return Err(e).context(format!("{} looks truncated", opt.midi.display()));
        }
        Err(e) => return Err(e).context(format!("decoding {}", opt.midi.display())),
    };
    let events = schedule(&song, &tempo);

    let mut out = stdout().lock();
    write_preview(&mut out, &song, &tempo, &events, opt.preview)?;
    out.flush()?;
    drop(out);

    if opt.dry_run {
        return Ok(());
    }
    if events.is_empty() {
        warn!("No notes to play.");
        return Ok(());
    }

    play(&opt, events)
}

#[cfg(feature = "audio")]
fn play(opt: &Opt, events: Vec<smf_player::ScheduledEvent>) -> Result<()> {
    use crossterm::event::{self, Event, KeyCode, KeyModifiers};
    use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
    use std::time::Duration;

    struct RawGuard;
    impl RawGuard {
        fn enter() -> Result<Self> {
            enable_raw_mode()?;
            Ok(Self)
        }
    }
    impl Drop for RawGuard {
        fn drop(&mut self) {
            let _ = disable_raw_mode();
        }
    }

    let sf2 = smf_player::soundfont::resolve_soundfont(opt.soundfont.as_deref(), &opt.soundfonts)?;
    info!("Using SoundFont: {}", sf2.display());

    // Keep `_audio` alive: dropping it closes the stream.
    let (_audio, player) = smf_player::synth::play(&sf2, events)?;

    let _raw = RawGuard::enter()?;
    println!("Controls: Space = pause/resume, Esc = stop\r");

    loop {
        if player.is_finished() {
            println!("Playback finished.\r");
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(k) = event::read()? {
                match k.code {
                    KeyCode::Char(' ') => {
                        let paused = player.toggle();
                        info!("{}", if paused { "paused" } else { "playing" });
                    }
                    KeyCode::Esc => {
                        player.stop();
                        break;
                    }
                    KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => {
                        player.stop();
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "audio"))]
fn play(opt: &Opt, _events: Vec<smf_player::ScheduledEvent>) -> Result<()> {
    let sf2 = smf_player::soundfont::resolve_soundfont(opt.soundfont.as_deref(), &opt.soundfonts);
    match sf2 {
        Ok(path) => warn!(
            "Built without the `audio` feature; not playing {} with {}.",
            opt.midi.display(),
            path.display()
        ),
        Err(e) => warn!("Built without the `audio` feature; not playing ({e})."),
    }
    Ok(())
}
