//! loader.rs
//!
//! Turns a path on disk into the byte image the core consumes. This is
//! deliberately thin: it knows nothing about SMF chunk structure, it just
//! reads the whole file, mirroring the shape of `Wad::open` reading a WAD
//! header before handing off to chunk-specific parsing.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::PlayerError;

/// Read an entire file into memory as the raw byte image for the parser.
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<u8>, PlayerError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let mut file = File::open(&path).map_err(|source| PlayerError::CannotOpenFile {
        path: path.clone(),
        source,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|source| PlayerError::CannotOpenFile { path, source })?;
    Ok(bytes)
}
