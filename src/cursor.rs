//! cursor.rs
//!
//! Random-access big-endian primitives over the loaded file image. The
//! image is immutable once loaded; bounds checking is left to the caller
//! — a read past the end is a fatal parse error, not a recoverable one.

use byteorder::{BigEndian, ByteOrder};

/// Immutable big-endian view over a loaded MIDI file's bytes.
#[derive(Debug)]
pub struct ByteImage {
    data: Vec<u8>,
}

impl ByteImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn u8(&self, index: u32) -> u8 {
        self.data[index as usize]
    }

    pub fn u16(&self, index: u32) -> u16 {
        BigEndian::read_u16(&self.data[index as usize..])
    }

    pub fn u32(&self, index: u32) -> u32 {
        BigEndian::read_u32(&self.data[index as usize..])
    }

    /// Byte slice `[start, start+len)`, for copying a track chunk's payload.
    pub fn slice(&self, start: u32, len: u32) -> &[u8] {
        &self.data[start as usize..(start + len) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let img = ByteImage::new(vec![0x4D, 0x54, 0x68, 0x64, 0x00, 0x01]);
        assert_eq!(img.u8(0), 0x4D);
        assert_eq!(img.u16(0), 0x4D54);
        assert_eq!(img.u32(0), 0x4D546864);
        assert_eq!(img.u16(4), 0x0001);
    }

    #[test]
    fn slices_a_span() {
        let img = ByteImage::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(img.slice(1, 3), &[2, 3, 4]);
    }
}
