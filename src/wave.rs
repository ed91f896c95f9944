//! wave.rs
//!
//! The waveform library and FM operator: phase advance with the
//! pitch-bend zero-crossing guard, seven primitive oscillator kernels, and
//! the 128-entry General-MIDI program map that pairs a carrier kernel with
//! a modulator kernel per instrument family.
//!
//! Grounded in `original_source/main.c` (the fullest `glouw/minimidi`
//! variant kept in the retrieval pack): `Note_Tick`/`Wave_Tick` for phase
//! advance, `Wave_Sin`..`Wave_TriangleHalf` for the primitive kernels, and
//! `Wave_Piano`..`Wave_Reed` plus `WAVE_WAVEFORMS` for the FM program map.

use crate::voice::{Voice, BEND_DEFAULT, MOD_GAIN};

const PI: f32 = std::f32::consts::PI;

/// `freq(n) = 440 * 2^((n - 69) / 12)`.
fn freq(id: f32) -> f32 {
    440.0 * 2f32.powf((id - 69.0) / 12.0)
}

fn phase_x(id: f32, progress: f32, sample_rate: f32) -> f32 {
    progress * 2.0 * PI * freq(id) / sample_rate
}

/// Advances one voice's phase by one sample, applying the zero-crossing
/// guard: a pitch bend change only takes effect at the next positive-going
/// sine zero-crossing, so a bend never causes an audible phase snap.
/// Returns the phase angle to render this sample (pre-increment).
fn phase_tick(voice: &Voice, bend: i32, midi_pitch: u8, sample_rate: f32) -> f32 {
    if !voice.is_initialized() {
        voice.set_initialized(true);
        voice.set_id(midi_pitch as f32);
    }
    if bend != voice.bend_last() {
        voice.set_bend_last(bend);
        voice.set_wait(true);
    }
    if voice.wait() {
        let progress = voice.progress() as f32;
        let x0 = phase_x(voice.id(), progress - 0.2, sample_rate);
        let x1 = phase_x(voice.id(), progress, sample_rate);
        let gain = voice.gain() as f32;
        let a = gain * x0.sin();
        let b = gain * x1.sin();
        let crossed = a < 0.0 && b > 0.0;
        if crossed {
            let bend_semitones = 12.0;
            let bend_id = (bend - BEND_DEFAULT) as f32 / (BEND_DEFAULT as f32 / bend_semitones);
            voice.set_id(bend_id + midi_pitch as f32);
            voice.set_wait(false);
            voice.set_progress(0);
        }
    }
    let progress = voice.progress() as f32;
    let x = phase_x(voice.id(), progress, sample_rate);
    voice.set_progress(voice.progress() + 1);
    x
}

type Kernel = fn(&Voice, i32, u8, f32, f32) -> f32;

fn sin_k(voice: &Voice, bend: i32, pitch: u8, sr: f32, fm: f32) -> f32 {
    let x = phase_tick(voice, bend, pitch, sr);
    voice.gain() as f32 * (x + fm).sin()
}

fn sinhalf_k(voice: &Voice, bend: i32, pitch: u8, sr: f32, fm: f32) -> f32 {
    let amp = sin_k(voice, bend, pitch, sr, fm);
    if amp > 0.0 {
        1.1 * amp
    } else {
        0.0
    }
}

fn sinabs_k(voice: &Voice, bend: i32, pitch: u8, sr: f32, fm: f32) -> f32 {
    sin_k(voice, bend, pitch, sr, fm).abs()
}

fn sinquarter_k(voice: &Voice, bend: i32, pitch: u8, sr: f32, fm: f32) -> f32 {
    let pre_id = if voice.is_initialized() {
        voice.id()
    } else {
        pitch as f32
    };
    let pre_progress = voice.progress() as f32;
    let f = phase_x(pre_id, pre_progress, sr);
    let x = 0.4 * sinhalf_k(voice, bend, pitch, sr, fm);
    if f.cos() > 0.0 {
        x
    } else {
        0.0
    }
}

fn square_k(voice: &Voice, bend: i32, pitch: u8, sr: f32, fm: f32) -> f32 {
    let amp = sin_k(voice, bend, pitch, sr, fm);
    let gain = voice.gain() as f32;
    (if amp >= 0.0 { gain } else { -gain }) / 8.0
}

fn triangle_k(voice: &Voice, bend: i32, pitch: u8, sr: f32, fm: f32) -> f32 {
    let x = phase_tick(voice, bend, pitch, sr);
    voice.gain() as f32 * (x + fm).sin().asin() / 1.5708 / 3.0
}

fn trianglehalf_k(voice: &Voice, bend: i32, pitch: u8, sr: f32, fm: f32) -> f32 {
    let amp = triangle_k(voice, bend, pitch, sr, fm);
    if amp > 0.0 {
        1.6 * amp
    } else {
        0.0
    }
}

/// `volume * carrier(x + m * modulator(x_mod) / MOD_GAIN)` (the FM operator).
/// `b` ticks the modulator's own independent phase; its output becomes a
/// phase offset fed into carrier kernel `a`.
fn fm(
    carrier: &Voice,
    modulator: &Voice,
    bend: i32,
    pitch: u8,
    sr: f32,
    a: Kernel,
    b: Kernel,
    multiplier: f32,
) -> f32 {
    let modulation = b(modulator, bend, pitch, sr, 0.0) / MOD_GAIN as f32;
    a(carrier, bend, pitch, sr, multiplier * modulation)
}

/// An instrument family: a carrier/modulator kernel pair, an FM
/// multiplier, and an overall output scale. One of these maps to every
/// entry of the 128-program General MIDI table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    Piano,
    Synth,
    Guitar,
    Bass,
    Pipe,
    Strings,
    Brass,
    Reed,
}

impl Instrument {
    /// Render one sample for this instrument, given its paired carrier and
    /// modulator voices at (channel, pitch).
    pub fn render(self, carrier: &Voice, modulator: &Voice, bend: i32, pitch: u8, sr: f32) -> f32 {
        use Instrument::*;
        match self {
            Piano => 0.2 * fm(carrier, modulator, bend, pitch, sr, trianglehalf_k, sin_k, 1.0),
            Synth => 0.4 * fm(carrier, modulator, bend, pitch, sr, triangle_k, sin_k, 1.0),
            Guitar => 0.5 * fm(carrier, modulator, bend, pitch, sr, sinquarter_k, sin_k, 1.0),
            Bass => 0.8 * fm(carrier, modulator, bend, pitch, sr, sinhalf_k, sin_k, 1.0),
            Pipe => 0.35 * fm(carrier, modulator, bend, pitch, sr, square_k, triangle_k, 0.5),
            Strings => 0.35 * fm(carrier, modulator, bend, pitch, sr, trianglehalf_k, square_k, 1.0),
            Brass => 0.4 * fm(carrier, modulator, bend, pitch, sr, square_k, sin_k, 1.0),
            Reed => 0.4 * fm(carrier, modulator, bend, pitch, sr, triangle_k, sin_k, 1.0),
        }
    }
}

/// Channel 9 is intentionally muted (percussion synthesis is a non-goal);
/// the program map is still queried by program number for channels 0-8
/// and 10-15, with `Synth::is_percussion` short-circuiting the mixer
/// before this table is ever consulted for channel 9.
pub const PROGRAM_MAP: [Instrument; 128] = build_program_map();

const fn build_program_map() -> [Instrument; 128] {
    use Instrument::*;
    let mut map = [Piano; 128];
    let mut i = 0;
    while i < 128 {
        map[i] = match i {
            0..=23 => Piano,       // piano, chromatic percussion, organ
            24..=31 => Guitar,
            32..=39 => Bass,
            40..=55 => Strings,
            56..=63 => Brass,
            64..=71 => Reed,
            72..=79 => Pipe,
            80..=103 => Synth,     // synth lead, pad, effects
            _ => Piano,            // ethnic, percussive, sound effects
        };
        i += 1;
    }
    map
}
