//! snapshot.rs
//!
//! Read-only projection of the voice table for the visualizer.
//! Takes non-atomic snapshots of individual fields one at a time; torn
//! reads across fields are acceptable since the only consumer renders at
//! a human frame rate and never feeds a snapshot back into playback.

use crate::voice::{Synth, CHANNELS, PITCHES};
use crate::wave::{Instrument, PROGRAM_MAP};

#[derive(Debug, Clone, Copy)]
pub struct VoiceView {
    pub pitch: u8,
    pub gain: i32,
}

#[derive(Debug, Clone)]
pub struct ChannelView {
    pub instrument: Instrument,
    pub active_voices: Vec<VoiceView>,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub channels: Vec<ChannelView>,
}

/// Takes one snapshot of the whole voice table.
pub fn take(synth: &Synth) -> Snapshot {
    let mut channels = Vec::with_capacity(CHANNELS);
    for channel in 0..CHANNELS {
        let program = synth.channel(channel).program() as usize;
        let mut active_voices = Vec::new();
        for pitch in 0..PITCHES {
            let voice = synth.voice(channel, pitch);
            if voice.is_on() {
                active_voices.push(VoiceView { pitch: pitch as u8, gain: voice.gain() });
            }
        }
        channels.push(ChannelView { instrument: PROGRAM_MAP[program], active_voices });
    }
    Snapshot { channels }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_table_has_no_active_voices() {
        let synth = Synth::new();
        let snap = take(&synth);
        assert_eq!(snap.channels.len(), CHANNELS);
        assert!(snap.channels.iter().all(|c| c.active_voices.is_empty()));
    }

    #[test]
    fn held_note_appears_in_its_channel_view() {
        let synth = Synth::new();
        synth.note_on(3, 60, 100);
        let snap = take(&synth);
        assert_eq!(snap.channels[3].active_voices.len(), 1);
        assert_eq!(snap.channels[3].active_voices[0].pitch, 60);
    }
}
