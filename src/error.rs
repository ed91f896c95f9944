//! error.rs
//!
//! Exit-code taxonomy for the player, per the error handling design: the
//! program is a batch consumer of one file, and any fault is fatal. `main`
//! converts a top level `Result<(), PlayerError>` into a process exit code
//! instead of unwinding with a generic panic.

use std::path::PathBuf;

/// A ±30 byte window of raw bytes around a parse failure, for stderr dumps.
#[derive(Debug, Clone)]
pub struct CrashWindow {
    pub index: u32,
    pub start: u32,
    pub bytes: Vec<u8>,
}

impl std::fmt::Display for CrashWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (offset, byte) in self.bytes.iter().enumerate() {
            let at = self.start + offset as u32;
            let star = if at == self.index { "*" } else { "" };
            writeln!(f, "index {at} : 0x{byte:02X}{star}")?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("usage: minimidi <file> [<loop 0|1>]")]
    BadArgCount,

    #[error("cannot open {path:?}: {source}")]
    CannotOpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse crash at index {index}\n{window}")]
    ParseCrash { index: u32, window: CrashWindow },

    #[error("SMPTE time division is not supported")]
    UnsupportedTimeDivision,

    #[error("internal invariant violated: {0}")]
    InvariantViolation(&'static str),
}

impl PlayerError {
    /// Process exit code used by `main` to set the process exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlayerError::BadArgCount => 1,
            PlayerError::CannotOpenFile { .. } => 2,
            PlayerError::ParseCrash { .. } => 3,
            PlayerError::UnsupportedTimeDivision => 3,
            PlayerError::InvariantViolation(_) => 4,
        }
    }
}
