//! smf.rs
//!
//! Standard MIDI File container parsing: the `MThd` header and the
//! sequence of `MTrk` chunks that follow it. Produces owned `Track`
//! instances over `ByteImage`-sliced copies of each chunk's payload, so
//! a loop replay can rebuild a fresh set of tracks from the same image
//! without re-reading the file.

use crate::cursor::ByteImage;
use crate::error::PlayerError;
use crate::track::Track;

const HEADER_CHUNK_ID: u32 = 0x4D54_6864; // "MThd"
const TRACK_CHUNK_ID: u32 = 0x4D54_726B; // "MTrk"
const HEADER_CHUNK_SIZE: u32 = 6;

/// Parsed `MThd` fields.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub format_type: u16,
    pub track_count: u16,
    pub time_division: u16,
}

impl Header {
    /// Ticks per quarter note when `time_division`'s top bit is clear.
    /// SMPTE-style divisions (top bit set) are an unsupported Non-goal
    /// and are rejected by the caller before this is consulted.
    pub fn ticks_per_quarter(&self) -> u16 {
        self.time_division & 0x7FFF
    }

    pub fn is_smpte(&self) -> bool {
        self.time_division & 0x8000 != 0
    }
}

/// A fully parsed file: the header plus one `Track` per `MTrk` chunk.
pub struct Smf {
    pub header: Header,
    pub tracks: Vec<Track>,
}

/// Parse the `MThd` header and every following `MTrk` chunk out of a
/// loaded byte image. Unknown chunk types between tracks are skipped by
/// their declared length rather than treated as fatal, matching real SMF
/// files that sometimes carry vendor chunks between tracks.
pub fn parse(image: &ByteImage) -> Result<Smf, PlayerError> {
    if image.len() < 14 || image.u32(0) != HEADER_CHUNK_ID || image.u32(4) != HEADER_CHUNK_SIZE {
        return Err(PlayerError::InvariantViolation("not a Standard MIDI File"));
    }
    let header = Header {
        format_type: image.u16(8),
        track_count: image.u16(10),
        time_division: image.u16(12),
    };
    if header.is_smpte() {
        return Err(PlayerError::UnsupportedTimeDivision);
    }

    let mut tracks = Vec::with_capacity(header.track_count as usize);
    let mut offset: u32 = 14;
    while offset + 8 <= image.len() && tracks.len() < header.track_count as usize {
        let chunk_id = image.u32(offset);
        let chunk_len = image.u32(offset + 4);
        let payload_start = offset + 8;
        if payload_start + chunk_len > image.len() {
            return Err(PlayerError::InvariantViolation("track chunk runs past end of file"));
        }
        if chunk_id == TRACK_CHUNK_ID {
            let bytes = image.slice(payload_start, chunk_len).to_vec();
            tracks.push(Track::new(bytes));
        }
        offset = payload_start + chunk_len;
    }
    if tracks.len() != header.track_count as usize {
        return Err(PlayerError::InvariantViolation("declared track count does not match file"));
    }
    Ok(Smf { header, tracks })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn sample_file(time_division: u16) -> Vec<u8> {
        let mut header_payload = vec![0x00, 0x01, 0x00, 0x01];
        header_payload.extend_from_slice(&time_division.to_be_bytes());
        let mut bytes = chunk(b"MThd", &header_payload);
        let track_payload = [0x00, 0xFF, 0x2F, 0x00]; // delta 0, end of track
        bytes.extend(chunk(b"MTrk", &track_payload));
        bytes
    }

    #[test]
    fn parses_header_and_one_track() {
        let image = ByteImage::new(sample_file(96));
        let smf = parse(&image).unwrap();
        assert_eq!(smf.header.format_type, 0);
        assert_eq!(smf.header.track_count, 1);
        assert_eq!(smf.header.ticks_per_quarter(), 96);
        assert_eq!(smf.tracks.len(), 1);
    }

    #[test]
    fn smpte_time_division_is_rejected() {
        let image = ByteImage::new(sample_file(0x8018));
        let err = parse(&image).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn bad_header_id_is_rejected() {
        let mut bytes = sample_file(96);
        bytes[0] = b'X';
        let image = ByteImage::new(bytes);
        assert!(parse(&image).is_err());
    }

    #[test]
    fn unknown_chunk_between_tracks_is_skipped() {
        let mut header_payload = vec![0x00, 0x00, 0x00, 0x01];
        header_payload.extend_from_slice(&96u16.to_be_bytes());
        let mut bytes = chunk(b"MThd", &header_payload);
        bytes.extend(chunk(b"XTRA", &[1, 2, 3]));
        bytes.extend(chunk(b"MTrk", &[0x00, 0xFF, 0x2F, 0x00]));
        let image = ByteImage::new(bytes);
        let smf = parse(&image).unwrap();
        assert_eq!(smf.tracks.len(), 1);
    }
}
