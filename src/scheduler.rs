//! scheduler.rs
//!
//! The Player: drives every track's pending delta toward zero, shaves the
//! minimum common number of ticks off all of them at once, converts that
//! tick count to a sleep duration from the current tempo, and repeats
//! until every track has stopped. Runs on the producer thread; the only
//! state it shares with the mixer is the `Synth` voice table.
//!
//! Tick shaving lets tracks with different pending deltas advance in
//! lockstep: find the minimum pending delta across every still-running
//! track, decrement all of them by one less than that minimum, then let
//! each track's own `advance_time` absorb the last tick. The sleep
//! duration for that batch of ticks comes from converting ticks to
//! microseconds at the current tempo, then correcting the actual sleep
//! against a small integral error term so drift doesn't accumulate across
//! a long file.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::PlayerError;
use crate::smf::Smf;
use crate::track::Track;
use crate::voice::Synth;

/// Small integral controller that nudges the next sleep duration to
/// compensate for consistent over- or under-sleeping by the host timer.
/// Converges to a unity multiplier when the host's sleep primitive is
/// already accurate, per the design note.
struct SleepCorrector {
    error_integral_us: f64,
    gain: f64,
}

impl SleepCorrector {
    fn new() -> Self {
        Self { error_integral_us: 0.0, gain: 0.02 }
    }

    /// Sleep for `requested`, accounting for the running integral error,
    /// then fold the observed error back into the integral.
    fn sleep(&mut self, requested: Duration) {
        let correction_us = self.error_integral_us * self.gain;
        let corrected = (requested.as_micros() as f64 - correction_us).max(0.0);
        let start = Instant::now();
        std::thread::sleep(Duration::from_micros(corrected as u64));
        let actual_us = start.elapsed().as_micros() as f64;
        self.error_integral_us += actual_us - requested.as_micros() as f64;
    }
}

/// Drives `smf.tracks` to completion once, writing into `synth` as events
/// fire, sleeping between ticks, and bailing out early if `done` is set
/// by another thread.
fn play_once(smf: &mut Smf, synth: &Synth, done: &AtomicBool) -> Result<(), PlayerError> {
    let time_division = smf.header.ticks_per_quarter() as u32;
    if time_division == 0 {
        return Err(PlayerError::InvariantViolation("time_division is zero"));
    }
    let mut corrector = SleepCorrector::new();

    loop {
        if done.load(Ordering::Relaxed) {
            return Ok(());
        }
        for track in smf.tracks.iter_mut().filter(|t| t.running) {
            step_until_delta_positive(track, synth)?;
        }
        let any_running = smf.tracks.iter().any(|t| t.running);
        if !any_running {
            return Ok(());
        }
        let ticks = smf
            .tracks
            .iter()
            .filter(|t| t.running)
            .map(|t| t.pending_delta())
            .min()
            .unwrap_or(0);
        if ticks > 0 {
            for track in smf.tracks.iter_mut().filter(|t| t.running) {
                shave(track, ticks);
            }
            let micros = (ticks as u64) * (synth.tempo() as u64) / time_division as u64;
            corrector.sleep(Duration::from_micros(micros));
        }
    }
}

/// Applies `advance_time`/`dispatch_if_due` until the track's pending
/// delta is strictly positive or the track has stopped.
fn step_until_delta_positive(track: &mut Track, synth: &Synth) -> Result<(), PlayerError> {
    loop {
        track.advance_time()?;
        track.dispatch_if_due(synth)?;
        if !track.running || track.pending_delta() > 0 {
            return Ok(());
        }
    }
}

/// Subtracts `ticks - 1` from a running track's pending delta: one tick of
/// the shaved amount is "spent" by the sleep itself, the rest brings every
/// track's counter down to what it would have been had the scheduler
/// ticked one at a time.
fn shave(track: &mut Track, ticks: i64) {
    let delta = track.pending_delta() - (ticks - 1);
    track.set_pending_delta(delta);
}

/// Plays `smf` to completion, looping (re-parsing the original byte image
/// into fresh tracks) while `loop_enabled` and `done` hasn't been raised.
/// Tempo persists across loop boundaries unless a track re-specifies it.
pub fn play(
    mut smf: Smf,
    rebuild: impl Fn() -> Result<Smf, PlayerError>,
    synth: &Synth,
    done: &AtomicBool,
    loop_enabled: bool,
) -> Result<(), PlayerError> {
    loop {
        play_once(&mut smf, synth, done)?;
        if done.load(Ordering::Relaxed) || !loop_enabled {
            return Ok(());
        }
        smf = rebuild()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smf::Header;

    fn track_from(bytes: &[u8]) -> Track {
        Track::new(bytes.to_vec())
    }

    fn smf_with(tracks: Vec<Track>, time_division: u16) -> Smf {
        Smf {
            header: Header { format_type: 0, track_count: tracks.len() as u16, time_division },
            tracks,
        }
    }

    #[test]
    fn single_track_reaches_completion() {
        let synth = Synth::new();
        let done = AtomicBool::new(false);
        let bytes = vec![
            0x00, 0x90, 60, 100, // note on @ delta 0
            10, 0x80, 60, 0, // note off @ delta 10
            0x00, 0xFF, 0x2F, 0x00, // end of track @ delta 0
        ];
        let mut smf = smf_with(vec![track_from(&bytes)], 480);
        play_once(&mut smf, &synth, &done).unwrap();
        assert!(!smf.tracks[0].running);
        assert_eq!(synth.voice(0, 60).gain_setpoint(), 0);
    }

    #[test]
    fn two_tracks_shave_to_common_minimum_tick() {
        let synth = Synth::new();
        let done = AtomicBool::new(false);
        let a = track_from(&[5, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00]);
        let b = track_from(&[5, 0x90, 61, 100, 0x00, 0xFF, 0x2F, 0x00]);
        let mut smf = smf_with(vec![a, b], 480);
        play_once(&mut smf, &synth, &done).unwrap();
        assert!(synth.voice(0, 60).is_on());
        assert!(synth.voice(0, 61).is_on());
    }

    #[test]
    fn done_flag_aborts_immediately() {
        let synth = Synth::new();
        let done = AtomicBool::new(true);
        let bytes = vec![5, 0x90, 60, 100, 5, 0xFF, 0x2F, 0x00];
        let mut smf = smf_with(vec![track_from(&bytes)], 480);
        play_once(&mut smf, &synth, &done).unwrap();
        assert!(!synth.voice(0, 60).is_on());
    }

    #[test]
    fn zero_time_division_is_an_invariant_violation() {
        let synth = Synth::new();
        let done = AtomicBool::new(false);
        let mut smf = smf_with(vec![track_from(&[0x00, 0xFF, 0x2F, 0x00])], 0);
        let err = play_once(&mut smf, &synth, &done).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
