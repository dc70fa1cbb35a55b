//! Shared test fixtures: synthetic RPT files, AFP streams and PDFs built
//! in memory, so no binary test data is checked in.

#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Document, Object, Stream, dictionary};

/// Offset base applied to relative payload offsets inside an RPT.
pub const INSTANCE_BASE: u32 = 0xF0;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Builder for a syntactically valid RPT image.
pub struct RptFixture {
    domain: i32,
    species: i32,
    timestamp: String,
    pages: Vec<Vec<u8>>,
    sections: Vec<(u32, u32, u32)>,
    binary_objects: Vec<Vec<u8>>,
    corrupt_page: Option<usize>,
}

impl Default for RptFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl RptFixture {
    pub fn new() -> Self {
        RptFixture {
            domain: 7,
            species: 42,
            timestamp: "2024-01-15 10:30:00".to_string(),
            pages: Vec::new(),
            sections: Vec::new(),
            binary_objects: Vec::new(),
            corrupt_page: None,
        }
    }

    pub fn ids(mut self, domain: i32, species: i32) -> Self {
        self.domain = domain;
        self.species = species;
        self
    }

    pub fn page(mut self, text: &str) -> Self {
        self.pages.push(text.as_bytes().to_vec());
        self
    }

    /// `n` pages with recognizable one-line bodies.
    pub fn numbered_pages(mut self, n: usize) -> Self {
        for i in 1..=n {
            self.pages.push(format!("PAGE {i} BODY\r\n").into_bytes());
        }
        self
    }

    /// Section entry as stored; zeros are allowed so tests can exercise the
    /// skip and sentinel rules.
    pub fn section(mut self, id: u32, start_page: u32, page_count: u32) -> Self {
        self.sections.push((id, start_page, page_count));
        self
    }

    pub fn binary_object(mut self, bytes: &[u8]) -> Self {
        self.binary_objects.push(bytes.to_vec());
        self
    }

    /// Split `bytes` into `chunks` binary objects of roughly equal size.
    pub fn binary_payload_chunked(mut self, bytes: &[u8], chunks: usize) -> Self {
        let chunk_len = bytes.len().div_ceil(chunks);
        for chunk in bytes.chunks(chunk_len.max(1)) {
            self.binary_objects.push(chunk.to_vec());
        }
        self
    }

    /// Damage the compressed bytes of page `index` (0-based).
    pub fn corrupt_page(mut self, index: usize) -> Self {
        self.corrupt_page = Some(index);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut page_blobs: Vec<Vec<u8>> = self.pages.iter().map(|p| deflate(p)).collect();
        if let Some(index) = self.corrupt_page {
            for byte in page_blobs[index].iter_mut().skip(2) {
                *byte ^= 0xA5;
            }
        }
        let object_blobs: Vec<Vec<u8>> =
            self.binary_objects.iter().map(|o| deflate(o)).collect();

        let page_block = 13 + 24 * page_blobs.len();
        let section_block = 13 + 12 * (self.sections.len() + 1) + b"ENDDATA".len();
        let binary_block = if object_blobs.is_empty() {
            0
        } else {
            13 + 16 * object_blobs.len()
        };
        let payload_start = 0x200 + page_block + section_block + binary_block;

        let mut buf = vec![0u8; 0x200];
        buf[..10].copy_from_slice(b"RPTFILEHDR");
        let leader = format!(
            "\t{}:{}\t{}\x1a",
            self.domain, self.species, self.timestamp
        );
        buf[10..10 + leader.len()].copy_from_slice(leader.as_bytes());
        put_u32(&mut buf, 0x1D4, page_blobs.len() as u32);
        put_u32(&mut buf, 0x1E4, self.sections.len() as u32);
        put_u32(&mut buf, 0x1F4, object_blobs.len() as u32);

        // Page table: marker, 3 bytes pad, 24-byte entries.
        let mut payload_offset = payload_start;
        buf.extend_from_slice(b"PAGETBLHDR");
        buf.extend_from_slice(&[0u8; 3]);
        for (page, blob) in self.pages.iter().zip(&page_blobs) {
            let mut entry = [0u8; 24];
            put_u32(&mut entry, 0, payload_offset as u32 - INSTANCE_BASE);
            put_u16(&mut entry, 8, 132);
            put_u16(&mut entry, 10, 66);
            put_u32(&mut entry, 12, page.len() as u32);
            put_u32(&mut entry, 16, blob.len() as u32);
            buf.extend_from_slice(&entry);
            payload_offset += blob.len();
        }

        // Section table: marker, pad, entries, zero sentinel, ENDDATA.
        buf.extend_from_slice(b"SECTIONHDR");
        buf.extend_from_slice(&[0u8; 3]);
        for &(id, start, count) in &self.sections {
            let mut entry = [0u8; 12];
            put_u32(&mut entry, 0, id);
            put_u32(&mut entry, 4, start);
            put_u32(&mut entry, 8, count);
            buf.extend_from_slice(&entry);
        }
        buf.extend_from_slice(&[0u8; 12]);
        buf.extend_from_slice(b"ENDDATA");

        // Binary-object table: marker (11 bytes), 2 bytes pad, 16-byte entries.
        if !object_blobs.is_empty() {
            buf.extend_from_slice(b"BPAGETBLHDR");
            buf.extend_from_slice(&[0u8; 2]);
            for (object, blob) in self.binary_objects.iter().zip(&object_blobs) {
                let mut entry = [0u8; 16];
                put_u32(&mut entry, 0, payload_offset as u32 - INSTANCE_BASE);
                put_u32(&mut entry, 8, object.len() as u32);
                put_u32(&mut entry, 12, blob.len() as u32);
                buf.extend_from_slice(&entry);
                payload_offset += blob.len();
            }
        }

        assert_eq!(buf.len(), payload_start);
        for blob in page_blobs.iter().chain(&object_blobs) {
            buf.extend_from_slice(blob);
        }
        buf
    }
}

/// A small PDF with `pages` one-line text pages, serialized to bytes.
pub fn make_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for number in 1..=pages {
        let content = format!("BT /F1 24 Tf 72 720 Td (Page {number}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// An AFP structured field: 0x5A, BE length, type id, flags, sequence, data.
pub fn afp_field(type_id: [u8; 3], data: &[u8]) -> Vec<u8> {
    let len = (8 + data.len()) as u16;
    let mut field = vec![0x5A];
    field.extend_from_slice(&len.to_be_bytes());
    field.extend_from_slice(&type_id);
    field.push(0);
    field.extend_from_slice(&[0, 0]);
    field.extend_from_slice(data);
    field
}

pub const AFP_BEGIN_DOCUMENT: [u8; 3] = [0xD3, 0xA8, 0xA8];
pub const AFP_END_DOCUMENT: [u8; 3] = [0xD3, 0xA9, 0xA8];
pub const AFP_BEGIN_PAGE: [u8; 3] = [0xD3, 0xA8, 0xAF];
pub const AFP_END_PAGE: [u8; 3] = [0xD3, 0xA9, 0xAF];
pub const AFP_MAP_CODED_FONT: [u8; 3] = [0xD3, 0xAB, 0x8A];
pub const AFP_INVOKE_MEDIUM_MAP: [u8; 3] = [0xD3, 0xAB, 0xCC];
pub const AFP_NOP: [u8; 3] = [0xD3, 0xEE, 0xEE];

/// An AFP document: font map, Begin Document, `pages` pages each holding a
/// NOP with a recognizable body, End Document.
pub fn make_afp(pages: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    stream.extend(afp_field(AFP_MAP_CODED_FONT, b"FONTRES"));
    stream.extend(afp_field(AFP_BEGIN_DOCUMENT, b"DOC01"));
    for number in 1..=pages {
        append_afp_page(&mut stream, number);
    }
    stream.extend(afp_field(AFP_END_DOCUMENT, b"DOC01"));
    stream
}

/// Like [`make_afp`], but with an Invoke Medium Map field sitting between
/// page 1 and page 2, outside any page.
pub fn make_afp_with_interstitial(pages: usize) -> Vec<u8> {
    assert!(pages >= 2);
    let mut stream = Vec::new();
    stream.extend(afp_field(AFP_MAP_CODED_FONT, b"FONTRES"));
    stream.extend(afp_field(AFP_BEGIN_DOCUMENT, b"DOC01"));
    append_afp_page(&mut stream, 1);
    stream.extend(afp_field(AFP_INVOKE_MEDIUM_MAP, b"MEDMAP01"));
    for number in 2..=pages {
        append_afp_page(&mut stream, number);
    }
    stream.extend(afp_field(AFP_END_DOCUMENT, b"DOC01"));
    stream
}

fn append_afp_page(stream: &mut Vec<u8>, number: usize) {
    stream.extend(afp_field(AFP_BEGIN_PAGE, format!("PAGE{number:03}").as_bytes()));
    stream.extend(afp_field(AFP_NOP, format!("BODY{number:03}").as_bytes()));
    stream.extend(afp_field(AFP_END_PAGE, format!("PAGE{number:03}").as_bytes()));
}
