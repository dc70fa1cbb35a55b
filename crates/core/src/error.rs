//! Error types for RPT extraction.

use std::path::Path;
use thiserror::Error;

/// Primary error type for RPT extraction operations.
///
/// Each variant corresponds to exactly one process exit code; the CLI maps
/// a failed run to `exit_code()`.
#[derive(Error, Debug)]
pub enum RptError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid RPT file: {0}")]
    InvalidRpt(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("invalid selection rule: {0}")]
    InvalidSelectionRule(String),

    #[error("no pages selected")]
    NoPagesSelected,

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("out of memory: {0}")]
    Memory(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl RptError {
    /// Classify a read-side I/O failure against the path it occurred on.
    /// A missing file is its own exit code.
    pub fn read(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            RptError::FileNotFound(path.display().to_string())
        } else {
            RptError::Read(format!("{}: {err}", path.display()))
        }
    }

    /// Classify a write-side I/O failure against the path it occurred on.
    pub fn write(path: &Path, err: std::io::Error) -> Self {
        RptError::Write(format!("{}: {err}", path.display()))
    }

    /// The process exit code for this failure (stable contract, 1-10).
    pub fn exit_code(&self) -> i32 {
        match self {
            RptError::InvalidArgs(_) => 1,
            RptError::FileNotFound(_) => 2,
            RptError::InvalidRpt(_) => 3,
            RptError::Read(_) => 4,
            RptError::Write(_) => 5,
            RptError::InvalidSelectionRule(_) => 6,
            RptError::NoPagesSelected => 7,
            RptError::Decompression(_) => 8,
            RptError::Memory(_) => 9,
            RptError::Unknown(_) => 10,
        }
    }
}

/// Convenience Result type alias for RptError.
pub type Result<T> = std::result::Result<T, RptError>;
