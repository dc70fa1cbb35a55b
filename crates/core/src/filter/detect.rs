//! Magic-byte classification of the concatenated binary payload.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, RptError};
use crate::filter::afp;

/// Bytes inspected from the start of the payload.
pub const SNIFF_LEN: usize = 256;

/// The detected payload format. Anything that is neither PDF nor AFP is
/// passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Pdf,
    Afp,
    Opaque,
}

impl BinaryFormat {
    /// File extension used by export mode.
    pub fn extension(&self) -> &'static str {
        match self {
            BinaryFormat::Pdf => "pdf",
            BinaryFormat::Afp => "afp",
            BinaryFormat::Opaque => "bin",
        }
    }
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryFormat::Pdf => write!(f, "PDF"),
            BinaryFormat::Afp => write!(f, "AFP"),
            BinaryFormat::Opaque => write!(f, "opaque"),
        }
    }
}

/// Classify a payload from its leading bytes.
pub fn detect_bytes(prefix: &[u8]) -> BinaryFormat {
    if prefix.starts_with(b"%PDF") {
        BinaryFormat::Pdf
    } else if afp::is_afp(prefix) {
        BinaryFormat::Afp
    } else {
        BinaryFormat::Opaque
    }
}

/// Classify a payload file by reading at most [`SNIFF_LEN`] bytes.
pub fn detect_file(path: &Path) -> Result<BinaryFormat> {
    let file = File::open(path).map_err(|e| RptError::read(path, e))?;
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut prefix)
        .map_err(|e| RptError::read(path, e))?;
    Ok(detect_bytes(&prefix))
}
