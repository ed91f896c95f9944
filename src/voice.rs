//! voice.rs
//!
//! The shared musical state: one `Voice` per (channel, pitch) pair, plus
//! sixteen `ChannelState` entries for program/bend/volume. This is the
//! table the scheduler thread writes into and the mixer thread reads and
//! rolls forward once per audio sample: relaxed atomic loads and stores,
//! no locks on the hot path. Every field gets an atomic home, including
//! the phase-related floats that only the mixer ever touches, so the
//! table is `Sync` without a mutex. `gain`, `gain_setpoint`, `progress`,
//! and `on` are the shared quartet the scheduler writes and the mixer
//! reads; `id`, `bend_last`, `wait`, and `was_init` are private state the
//! mixer alone advances.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU8, Ordering};

pub const CHANNELS: usize = 16;
pub const PITCHES: usize = 128;
pub const PERCUSSION_CHANNEL: usize = 9;

/// Amplitude units per unit velocity, both for the attack ramp and for the
/// gain clamp ceiling (`ATTACK * 127`).
pub const ATTACK: i32 = 4;
pub const SUSTAIN_MAX: i32 = ATTACK;

/// Samples between each one-unit sustain decay step while a voice is held.
pub const DECAY: i32 = 300;

/// Default (center) 14-bit pitch bend value.
pub const BEND_DEFAULT: i32 = 8192;

/// Fixed envelope depth a modulator voice is seeded with at startup.
pub const MOD_GAIN: i32 = 512;

/// One oscillator slot. Every field is atomic so `Voice` is `Sync` without
/// a lock: the scheduler writes `gain_setpoint`/`on`, the mixer alone
/// advances `gain`/`progress`/`id`/`wait`/`bend_last`/`initialized`.
#[derive(Debug)]
pub struct Voice {
    gain: AtomicI32,
    gain_setpoint: AtomicI32,
    progress: AtomicI32,
    on: AtomicBool,
    id_bits: AtomicU32,
    bend_last: AtomicI32,
    wait: AtomicBool,
    initialized: AtomicBool,
}

impl Voice {
    fn new() -> Self {
        Self {
            gain: AtomicI32::new(0),
            gain_setpoint: AtomicI32::new(0),
            progress: AtomicI32::new(0),
            on: AtomicBool::new(false),
            id_bits: AtomicU32::new(0f32.to_bits()),
            bend_last: AtomicI32::new(BEND_DEFAULT),
            wait: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    fn modulator() -> Self {
        let v = Self::new();
        v.gain.store(MOD_GAIN, Ordering::Relaxed);
        v.gain_setpoint.store(MOD_GAIN, Ordering::Relaxed);
        v
    }

    pub fn gain(&self) -> i32 {
        self.gain.load(Ordering::Relaxed)
    }

    pub fn gain_setpoint(&self) -> i32 {
        self.gain_setpoint.load(Ordering::Relaxed)
    }

    pub fn set_gain_setpoint(&self, v: i32) {
        self.gain_setpoint.store(v, Ordering::Relaxed);
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    pub fn set_on(&self, v: bool) {
        self.on.store(v, Ordering::Relaxed);
    }

    pub fn progress(&self) -> i32 {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn set_progress(&self, v: i32) {
        self.progress.store(v, Ordering::Relaxed);
    }

    pub fn id(&self) -> f32 {
        f32::from_bits(self.id_bits.load(Ordering::Relaxed))
    }

    pub fn set_id(&self, v: f32) {
        self.id_bits.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn bend_last(&self) -> i32 {
        self.bend_last.load(Ordering::Relaxed)
    }

    pub fn set_bend_last(&self, v: i32) {
        self.bend_last.store(v, Ordering::Relaxed);
    }

    pub fn wait(&self) -> bool {
        self.wait.load(Ordering::Relaxed)
    }

    pub fn set_wait(&self, v: bool) {
        self.wait.store(v, Ordering::Relaxed);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    pub fn set_initialized(&self, v: bool) {
        self.initialized.store(v, Ordering::Relaxed);
    }

    /// Envelope roll, run once per audio sample by the mixer.
    /// Returns `true` if the voice is (still, or newly) silent after the step.
    pub fn roll_envelope(&self) -> bool {
        let gain = self.gain();
        let setpoint = self.gain_setpoint();
        let diff = setpoint - gain;
        if diff == 0 {
            if gain == 0 {
                self.set_initialized(false);
                self.set_on(false);
            } else {
                let progress = self.progress();
                if progress != 0 && progress % DECAY == 0 {
                    self.gain.fetch_sub(1, Ordering::Relaxed);
                    self.gain_setpoint.fetch_sub(1, Ordering::Relaxed);
                }
            }
        } else {
            let step = diff.signum();
            self.gain.fetch_add(step, Ordering::Relaxed);
        }
        let clamped = self.gain().clamp(0, SUSTAIN_MAX * 127);
        self.gain.store(clamped, Ordering::Relaxed);
        clamped == 0
    }
}

/// Per-channel controller state: sixteen of these sit alongside the voice
/// table. Grounded on `Meta` in
/// `original_source/src/Meta.c`.
#[derive(Debug)]
pub struct ChannelState {
    program: AtomicU8,
    bend: AtomicI32,
    volume_bits: AtomicU32,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            program: AtomicU8::new(0),
            bend: AtomicI32::new(BEND_DEFAULT as i32),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    pub fn program(&self) -> u8 {
        self.program.load(Ordering::Relaxed)
    }

    pub fn set_program(&self, v: u8) {
        self.program.store(v, Ordering::Relaxed);
    }

    pub fn bend(&self) -> i32 {
        self.bend.load(Ordering::Relaxed)
    }

    pub fn set_bend(&self, v: i32) {
        self.bend.store(v, Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, v: f32) {
        self.volume_bits.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// The full shared musical state: a 16x128 carrier voice table, a parallel
/// modulator table for one-layer FM, and the sixteen channel
/// controller slots. Lives for the run and is zero-initialized once, then
/// mutated concurrently by the scheduler (producer) and the mixer
/// (consumer); an optional visualizer only reads it.
#[derive(Debug)]
pub struct Synth {
    voices: Box<[Voice]>,
    modulators: Box<[Voice]>,
    channels: Box<[ChannelState]>,
    tempo: AtomicU32,
}

impl Synth {
    pub fn new() -> Self {
        let voices = (0..CHANNELS * PITCHES).map(|_| Voice::new()).collect();
        let modulators = (0..CHANNELS * PITCHES).map(|_| Voice::modulator()).collect();
        let channels = (0..CHANNELS).map(|_| ChannelState::new()).collect();
        Self {
            voices,
            modulators,
            channels,
            tempo: AtomicU32::new(500_000),
        }
    }

    fn index(channel: usize, pitch: usize) -> usize {
        channel * PITCHES + pitch
    }

    pub fn voice(&self, channel: usize, pitch: usize) -> &Voice {
        &self.voices[Self::index(channel, pitch)]
    }

    pub fn modulator(&self, channel: usize, pitch: usize) -> &Voice {
        &self.modulators[Self::index(channel, pitch)]
    }

    pub fn channel(&self, channel: usize) -> &ChannelState {
        &self.channels[channel]
    }

    pub fn tempo(&self) -> u32 {
        self.tempo.load(Ordering::Relaxed)
    }

    pub fn set_tempo(&self, v: u32) {
        self.tempo.store(v, Ordering::Relaxed);
    }

    pub fn is_percussion(channel: usize) -> bool {
        channel == PERCUSSION_CHANNEL
    }

    /// Note on (nibble 0x9). Zero-velocity note-on acts as note-off
    /// by construction since `ATTACK * 0 * volume == 0`.
    pub fn note_on(&self, channel: usize, pitch: usize, velocity: u8) {
        if Self::is_percussion(channel) {
            return;
        }
        let volume = self.channel(channel).volume();
        let voice = self.voice(channel, pitch);
        let setpoint = (ATTACK as f32 * velocity as f32 * volume).round() as i32;
        voice.set_gain_setpoint(setpoint);
        voice.set_on(true);
        self.channel(channel).set_bend(BEND_DEFAULT);
    }

    /// Note off (nibble 0x8).
    pub fn note_off(&self, channel: usize, pitch: usize) {
        if Self::is_percussion(channel) {
            return;
        }
        self.voice(channel, pitch).set_gain_setpoint(0);
        self.channel(channel).set_bend(BEND_DEFAULT);
    }

    /// Channel volume controller (0x07). Rescales every currently-audible
    /// voice on the channel directly to `ATTACK * value`, and remembers
    /// `value / 127` as the per-channel volume scale consulted by future
    /// note-on events. See the open question in the design notes: this
    /// implementation carries both of the observed behaviors rather than
    /// picking one exclusively (recorded in DESIGN.md).
    pub fn set_channel_volume(&self, channel: usize, value: u8) {
        self.channel(channel).set_volume(value as f32 / 127.0);
        for pitch in 0..PITCHES {
            let voice = self.voice(channel, pitch);
            if voice.gain_setpoint() > 0 {
                voice.set_gain_setpoint(ATTACK * value as i32);
            }
        }
    }
}

impl Default for Synth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_sets_setpoint_and_on() {
        let synth = Synth::new();
        synth.note_on(0, 60, 100);
        let v = synth.voice(0, 60);
        assert_eq!(v.gain_setpoint(), ATTACK * 100);
        assert!(v.is_on());
    }

    #[test]
    fn percussion_channel_is_ignored() {
        let synth = Synth::new();
        synth.note_on(PERCUSSION_CHANNEL, 40, 127);
        let v = synth.voice(PERCUSSION_CHANNEL, 40);
        assert!(!v.is_on());
        assert_eq!(v.gain_setpoint(), 0);
    }

    #[test]
    fn zero_velocity_note_on_is_silent() {
        let synth = Synth::new();
        synth.note_on(0, 60, 0);
        assert_eq!(synth.voice(0, 60).gain_setpoint(), 0);
    }

    #[test]
    fn envelope_ramps_toward_setpoint_one_unit_per_sample() {
        let synth = Synth::new();
        synth.note_on(0, 60, 100);
        let v = synth.voice(0, 60);
        let target = ATTACK * 100;
        for _ in 0..target {
            v.roll_envelope();
        }
        assert_eq!(v.gain(), target);
    }

    #[test]
    fn note_off_decays_gain_to_zero_and_clears_on() {
        let synth = Synth::new();
        synth.note_on(0, 60, 100);
        let v = synth.voice(0, 60);
        for _ in 0..(ATTACK * 100) {
            v.roll_envelope();
        }
        synth.note_off(0, 60);
        let mut iterations = 0;
        while v.gain() != 0 && iterations < 10_000 {
            v.roll_envelope();
            iterations += 1;
        }
        assert_eq!(v.gain(), 0);
        // One more roll flips `on` false once gain has settled at setpoint 0.
        v.roll_envelope();
        assert!(!v.is_on());
    }

    #[test]
    fn gain_never_exceeds_clamp_ceiling() {
        let synth = Synth::new();
        synth.note_on(0, 60, 127);
        let v = synth.voice(0, 60);
        for _ in 0..100_000 {
            v.roll_envelope();
            assert!(v.gain() <= SUSTAIN_MAX * 127);
            assert!(v.gain() >= 0);
        }
    }

    #[test]
    fn controller_seven_rescales_held_voice() {
        let synth = Synth::new();
        synth.note_on(0, 60, 100);
        synth.set_channel_volume(0, 0);
        assert_eq!(synth.voice(0, 60).gain_setpoint(), 0);
    }

    #[test]
    fn controller_seven_leaves_silent_voices_alone() {
        let synth = Synth::new();
        synth.set_channel_volume(0, 64);
        assert_eq!(synth.voice(0, 61).gain_setpoint(), 0);
    }
}
