//! RPT spool-file parsing.
//!
//! An RPT file is a fixed leader followed by marker-delimited tables:
//! `PAGETBLHDR` (compressed text pages), `SECTIONHDR` (logical page groups,
//! terminated by `ENDDATA` or an all-zero entry) and `BPAGETBLHDR`
//! (compressed binary objects forming a PDF or AFP document). Offsets stored
//! in table entries are relative to the instance header and become absolute
//! by adding [`INSTANCE_HEADER_OFFSET`].

use crate::error::{Result, RptError};
use crate::inflate::inflate_at;
use crate::utils::{find, find_from, read_u16_le, read_u32_le};

/// File signature, first 10 bytes of every RPT.
pub const SIGNATURE: &[u8] = b"RPTFILEHDR";
/// Marker preceding the page table.
pub const PAGE_TABLE_MARKER: &[u8] = b"PAGETBLHDR";
/// Marker preceding the section table.
pub const SECTION_TABLE_MARKER: &[u8] = b"SECTIONHDR";
/// Marker preceding the binary-object table.
pub const BINARY_TABLE_MARKER: &[u8] = b"BPAGETBLHDR";
/// Terminator of the section-table area.
pub const END_DATA_MARKER: &[u8] = b"ENDDATA";

/// Base added to every relative offset stored in a table entry.
pub const INSTANCE_HEADER_OFFSET: u32 = 0xF0;

/// Table entry areas begin this many bytes after their marker start.
const MARKER_DATA_SKIP: usize = 13;

/// The text leader ends at the first 0x1A/0x00 within this prefix.
const TEXT_LEADER_LIMIT: usize = 192;

const HEADER_MIN_LEN: usize = 0x1F0;
const PAGE_COUNT_OFFSET: usize = 0x1D4;
const SECTION_COUNT_OFFSET: usize = 0x1E4;
const SECTION_DATA_OFFSET: usize = 0x1E8;
const BINARY_COUNT_OFFSET: usize = 0x1F4;

const PAGE_ENTRY_LEN: usize = 24;
const SECTION_ENTRY_LEN: usize = 12;
const BINARY_ENTRY_LEN: usize = 16;

/// Fixed-layout leader of an RPT file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RptHeader {
    pub domain_id: i32,
    pub species_id: i32,
    pub timestamp: String,
    pub page_count: u32,
    pub section_count: u32,
    /// End-of-compressed-data offset; parsed but not consumed.
    pub section_data_offset: u32,
    pub binary_object_count: u32,
}

/// One compressed text page. `page_number` is 1-based table position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub page_number: i32,
    pub page_offset: u32,
    pub line_width: u16,
    pub lines_per_page: u16,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
}

/// A contiguous page range grouped as a logical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionEntry {
    pub section_id: u32,
    pub start_page: u32,
    pub page_count: u32,
}

impl SectionEntry {
    /// Last page of the section, 1-based inclusive.
    pub fn end_page(&self) -> u32 {
        self.start_page.saturating_add(self.page_count) - 1
    }
}

/// One compressed chunk of the concatenated binary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryObjectEntry {
    pub index: i32,
    pub page_offset: u32,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
}

/// A fully parsed RPT file image.
#[derive(Debug, Clone)]
pub struct RptDocument {
    pub header: RptHeader,
    pub pages: Vec<PageTableEntry>,
    pub sections: Vec<SectionEntry>,
    pub binary_objects: Vec<BinaryObjectEntry>,
}

impl RptDocument {
    /// Parse the header and all tables from a fully loaded file image.
    pub fn parse(data: &[u8]) -> Result<RptDocument> {
        let header = parse_header(data)?;
        let pages = parse_page_table(data, header.page_count)?;
        let sections = parse_section_table(data);
        let binary_objects = if header.binary_object_count > 0 {
            parse_binary_table(data, header.binary_object_count)
        } else {
            Vec::new()
        };
        Ok(RptDocument {
            header,
            pages,
            sections,
            binary_objects,
        })
    }
}

/// Parse the fixed leader: signature, tab-delimited text region, counts.
pub fn parse_header(data: &[u8]) -> Result<RptHeader> {
    if data.len() < HEADER_MIN_LEN {
        return Err(RptError::Read(format!(
            "file too small for RPT header: {} bytes",
            data.len()
        )));
    }
    if &data[..SIGNATURE.len()] != SIGNATURE {
        return Err(RptError::InvalidRpt("missing RPTFILEHDR signature".into()));
    }

    let scan = &data[..TEXT_LEADER_LIMIT.min(data.len())];
    let leader_end = scan
        .iter()
        .position(|&b| b == 0x1A || b == 0x00)
        .unwrap_or(scan.len());
    let leader = String::from_utf8_lossy(&data[..leader_end]);
    let mut tokens = leader.split('\t');
    let _ = tokens.next();
    let (domain_id, species_id) = tokens
        .next()
        .and_then(|t| t.split_once(':'))
        .map(|(d, s)| {
            (
                d.trim().parse::<i32>().unwrap_or(0),
                s.trim().parse::<i32>().unwrap_or(0),
            )
        })
        .unwrap_or((0, 0));
    let timestamp = tokens.next().map(|t| t.trim_end().to_string()).unwrap_or_default();

    let binary_object_count = if data.len() >= 0x200 {
        read_u32_le(data, BINARY_COUNT_OFFSET)
    } else {
        0
    };

    Ok(RptHeader {
        domain_id,
        species_id,
        timestamp,
        page_count: read_u32_le(data, PAGE_COUNT_OFFSET),
        section_count: read_u32_le(data, SECTION_COUNT_OFFSET),
        section_data_offset: read_u32_le(data, SECTION_DATA_OFFSET),
        binary_object_count,
    })
}

/// Read exactly `page_count` 24-byte entries after the `PAGETBLHDR` marker,
/// stopping early only at end-of-file. A missing marker rejects the file.
pub fn parse_page_table(data: &[u8], page_count: u32) -> Result<Vec<PageTableEntry>> {
    let marker = find(data, PAGE_TABLE_MARKER)
        .ok_or_else(|| RptError::InvalidRpt("page table marker not found".into()))?;
    let start = marker + MARKER_DATA_SKIP;

    // A hostile count must not drive the allocation; only entries that fit
    // in the file can exist.
    let fitting = data.len().saturating_sub(start) / PAGE_ENTRY_LEN;
    let mut pages = Vec::with_capacity((page_count as usize).min(fitting));
    for i in 0..page_count as usize {
        let base = start + i * PAGE_ENTRY_LEN;
        if base + PAGE_ENTRY_LEN > data.len() {
            break;
        }
        pages.push(PageTableEntry {
            page_number: i as i32 + 1,
            page_offset: read_u32_le(data, base),
            line_width: read_u16_le(data, base + 8),
            lines_per_page: read_u16_le(data, base + 10),
            uncompressed_size: read_u32_le(data, base + 12),
            compressed_size: read_u32_le(data, base + 16),
        });
    }
    Ok(pages)
}

/// Read 12-byte section entries up to `ENDDATA` or end-of-file.
///
/// An all-zero triple terminates the scan; entries with a zero start page or
/// zero page count are skipped without terminating it. A missing marker
/// yields an empty table (sections are optional).
pub fn parse_section_table(data: &[u8]) -> Vec<SectionEntry> {
    let Some(marker) = find(data, SECTION_TABLE_MARKER) else {
        return Vec::new();
    };
    let start = marker + MARKER_DATA_SKIP;
    let end = find_from(data, END_DATA_MARKER, start).unwrap_or(data.len());

    let mut sections = Vec::new();
    let mut pos = start;
    while pos + SECTION_ENTRY_LEN <= end {
        let section_id = read_u32_le(data, pos);
        let start_page = read_u32_le(data, pos + 4);
        let page_count = read_u32_le(data, pos + 8);
        pos += SECTION_ENTRY_LEN;

        if section_id == 0 && start_page == 0 && page_count == 0 {
            break;
        }
        if start_page < 1 || page_count < 1 {
            continue;
        }
        sections.push(SectionEntry {
            section_id,
            start_page,
            page_count,
        });
    }
    sections
}

/// Read 16-byte binary-object entries after `BPAGETBLHDR`.
///
/// A missing marker despite a non-zero declared count yields an empty table;
/// the orchestrator then reports the run as having no binary payload.
pub fn parse_binary_table(data: &[u8], object_count: u32) -> Vec<BinaryObjectEntry> {
    let Some(marker) = find(data, BINARY_TABLE_MARKER) else {
        return Vec::new();
    };
    let start = marker + MARKER_DATA_SKIP;

    let fitting = data.len().saturating_sub(start) / BINARY_ENTRY_LEN;
    let mut objects = Vec::with_capacity((object_count as usize).min(fitting));
    for i in 0..object_count as usize {
        let base = start + i * BINARY_ENTRY_LEN;
        if base + BINARY_ENTRY_LEN > data.len() {
            break;
        }
        objects.push(BinaryObjectEntry {
            index: i as i32 + 1,
            page_offset: read_u32_le(data, base),
            uncompressed_size: read_u32_le(data, base + 8),
            compressed_size: read_u32_le(data, base + 12),
        });
    }
    objects
}

/// Decompress one text page out of the file image.
pub fn decompress_page(data: &[u8], entry: &PageTableEntry) -> Result<Vec<u8>> {
    inflate_at(
        data,
        (entry.page_offset + INSTANCE_HEADER_OFFSET) as usize,
        entry.compressed_size as usize,
        entry.uncompressed_size as usize,
    )
}

/// Decompress one binary-object chunk out of the file image.
pub fn decompress_object(data: &[u8], entry: &BinaryObjectEntry) -> Result<Vec<u8>> {
    inflate_at(
        data,
        (entry.page_offset + INSTANCE_HEADER_OFFSET) as usize,
        entry.compressed_size as usize,
        entry.uncompressed_size as usize,
    )
}
