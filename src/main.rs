use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;

mod cursor;
mod error;
mod loader;
mod mixer;
mod scheduler;
mod sink;
mod smf;
mod snapshot;
mod track;
mod visual;
mod voice;
mod wave;

use cursor::ByteImage;
use error::PlayerError;
use sink::AudioSink;
use voice::Synth;

/// `minimidi <file> [<loop 0|1>]`.
#[derive(Parser, Debug)]
#[command(name = "minimidi")]
struct Opt {
    /// Path to a Standard MIDI File.
    file: PathBuf,

    /// Replay the file indefinitely when non-zero.
    #[arg(default_value_t = 0)]
    r#loop: u8,

    /// Disable the terminal voice-activity visualizer.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_visualizer: bool,
}

fn run() -> Result<(), PlayerError> {
    let opt = Opt::parse();
    let bytes = loader::load_file(&opt.file)?;
    let image = ByteImage::new(bytes);
    let parsed = smf::parse(&image)?;

    println!("Loaded {}", opt.file.display());
    println!(
        "format {}  tracks {}  ticks/quarter {}",
        parsed.header.format_type,
        parsed.header.track_count,
        parsed.header.ticks_per_quarter()
    );

    let synth = Arc::new(Synth::new());
    // AudioSink owns a cpal::Stream, which is !Send: it must stay on the
    // thread that opened it. The scheduler (producer) and visualizer each
    // only touch the Arc<Synth>/done flag, so those are what get moved into
    // spawned threads; the mixer runs here on main, alongside the sink.
    let sink = AudioSink::open().map_err(|_| PlayerError::InvariantViolation("audio device unavailable"))?;
    let done = Arc::new(AtomicBool::new(false));
    let loop_enabled = opt.r#loop != 0;

    let producer_synth = synth.clone();
    let producer_done = done.clone();
    let producer_thread = thread::spawn(move || {
        let rebuild_image = image;
        let rebuild = || smf::parse(&rebuild_image);
        let result = scheduler::play(parsed, rebuild, &producer_synth, &producer_done, loop_enabled);
        producer_done.store(true, Ordering::Relaxed);
        result
    });

    let visual_thread = if !opt.no_visualizer {
        let visual_synth = synth.clone();
        let visual_done = done.clone();
        Some(thread::spawn(move || {
            visual::run(&visual_synth, &visual_done);
        }))
    } else {
        None
    };

    mixer::run(&synth, &sink, &done);

    if let Some(handle) = visual_thread {
        let _ = handle.join();
    }
    producer_thread.join().expect("producer thread panicked")
}

fn main() {
    match run() {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("minimidi: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
