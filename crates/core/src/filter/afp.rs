//! AFP structured-field parsing and page filtering.
//!
//! An AFP stream is a sequence of structured fields, each introduced by the
//! carriage-control byte `0x5A` followed by a big-endian u16 length covering
//! everything after that byte, a 3-byte type identifier (class byte `0xD3`),
//! a flag byte and a 2-byte sequence number. Pages run from `Begin Page`
//! (D3A8AF) to `End Page` (D3A9AF) inclusive; fields outside any page are
//! shared resources (fonts, overlays, page segments) or document framing
//! and must survive filtering.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, RptError};

/// Carriage-control byte introducing every structured field.
pub const CARRIAGE_CONTROL: u8 = 0x5A;

const SF_CLASS: u8 = 0xD3;
const TYPE_BEGIN_PAGE: [u8; 3] = [0xD3, 0xA8, 0xAF];
const TYPE_END_PAGE: [u8; 3] = [0xD3, 0xA9, 0xAF];

/// Introducer length: u16 length + 3-byte type + flag + 2-byte sequence.
const MIN_FIELD_LEN: usize = 8;

/// One structured field located in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredField {
    /// Offset of the 0x5A byte.
    pub offset: usize,
    /// Total length including the 0x5A byte.
    pub len: usize,
    pub type_id: [u8; 3],
}

impl StructuredField {
    pub fn is_begin_page(&self) -> bool {
        self.type_id == TYPE_BEGIN_PAGE
    }

    pub fn is_end_page(&self) -> bool {
        self.type_id == TYPE_END_PAGE
    }
}

/// Walk the whole stream, recording every structured field.
///
/// CR/LF padding between fields is tolerated; anything else that is not a
/// carriage-control byte rejects the stream.
pub fn parse_fields(data: &[u8]) -> Result<Vec<StructuredField>> {
    let mut fields = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        match data[pos] {
            0x0D | 0x0A => {
                pos += 1;
                continue;
            }
            CARRIAGE_CONTROL => {}
            other => {
                return Err(RptError::Unknown(format!(
                    "AFP: expected structured field at {pos:#x}, found {other:#04x}"
                )));
            }
        }
        if pos + 3 > data.len() {
            return Err(RptError::Unknown(format!(
                "AFP: truncated structured field at {pos:#x}"
            )));
        }
        let len = BigEndian::read_u16(&data[pos + 1..pos + 3]) as usize;
        if len < MIN_FIELD_LEN || pos + 1 + len > data.len() {
            return Err(RptError::Unknown(format!(
                "AFP: invalid structured field length {len} at {pos:#x}"
            )));
        }
        fields.push(StructuredField {
            offset: pos,
            len: 1 + len,
            type_id: [data[pos + 3], data[pos + 4], data[pos + 5]],
        });
        pos += 1 + len;
    }
    Ok(fields)
}

/// Byte spans of the pages, in encounter order (1-based page numbering is
/// positional). A Begin Page without a matching End Page runs to the end of
/// the stream.
pub fn page_spans(fields: &[StructuredField], stream_len: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    for field in fields {
        if field.is_begin_page() && open.is_none() {
            open = Some(field.offset);
        } else if field.is_end_page()
            && let Some(start) = open.take()
        {
            spans.push((start, field.offset + field.len));
        }
    }
    if let Some(start) = open {
        spans.push((start, stream_len));
    }
    spans
}

/// Write a filtered AFP stream containing the shared resources and the
/// requested pages in ascending order. An empty page list degenerates to a
/// byte-for-byte copy. Returns the number of pages written.
pub fn filter_pages(data: &[u8], pages: &[i32], output: &Path) -> Result<usize> {
    let file = File::create(output).map_err(|e| RptError::write(output, e))?;
    let mut writer = BufWriter::new(file);

    if pages.is_empty() {
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| RptError::write(output, e))?;
        let fields = parse_fields(data).unwrap_or_default();
        return Ok(page_spans(&fields, data.len()).len());
    }

    let fields = parse_fields(data)?;
    let spans = page_spans(&fields, data.len());
    let first_start = spans.first().map_or(data.len(), |s| s.0);
    let last_end = spans.last().map_or(data.len(), |s| s.1);

    let mut selected: Vec<usize> = pages
        .iter()
        .filter(|&&p| p >= 1)
        .map(|&p| p as usize)
        .collect();
    selected.sort_unstable();
    selected.dedup();

    let write_err = |e| RptError::write(output, e);

    // Shared resources and document prologue, plus any stray fields that
    // sit between pages.
    writer.write_all(&data[..first_start]).map_err(write_err)?;
    for pair in spans.windows(2) {
        writer
            .write_all(&data[pair[0].1..pair[1].0])
            .map_err(write_err)?;
    }

    let mut written = 0usize;
    for page in selected {
        if let Some(&(start, end)) = spans.get(page - 1) {
            writer.write_all(&data[start..end]).map_err(write_err)?;
            written += 1;
        }
    }

    // Document trailer (End Document and friends).
    writer.write_all(&data[last_end..]).map_err(write_err)?;
    writer.flush().map_err(write_err)?;
    Ok(written)
}

/// Minimal structural check used by format detection: a leading
/// carriage-control byte, a plausible length and the MO:DCA class byte.
pub fn is_afp(data: &[u8]) -> bool {
    if data.len() < 4 || data[0] != CARRIAGE_CONTROL {
        return false;
    }
    let len = BigEndian::read_u16(&data[1..3]) as usize;
    len >= MIN_FIELD_LEN && data[3] == SF_CLASS
}
