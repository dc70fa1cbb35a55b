//! Tests for RPT header and table parsing.

mod common;

use common::RptFixture;
use rptool_core::RptError;
use rptool_core::parser::{self, RptDocument};

#[test]
fn test_header_fields() {
    let data = RptFixture::new()
        .ids(7, 42)
        .numbered_pages(3)
        .section(100, 1, 3)
        .binary_object(b"BLOB")
        .build();
    let doc = RptDocument::parse(&data).unwrap();

    assert_eq!(doc.header.domain_id, 7);
    assert_eq!(doc.header.species_id, 42);
    assert_eq!(doc.header.timestamp, "2024-01-15 10:30:00");
    assert_eq!(doc.header.page_count, 3);
    assert_eq!(doc.header.section_count, 1);
    assert_eq!(doc.header.binary_object_count, 1);
}

#[test]
fn test_page_table_layout() {
    let data = RptFixture::new().numbered_pages(4).build();
    let doc = RptDocument::parse(&data).unwrap();

    assert_eq!(doc.pages.len(), 4);
    for (i, page) in doc.pages.iter().enumerate() {
        assert_eq!(page.page_number, i as i32 + 1);
        assert_eq!(page.line_width, 132);
        assert_eq!(page.lines_per_page, 66);
        assert!(page.compressed_size > 0);
    }
}

#[test]
fn test_decompress_pages_roundtrip() {
    let data = RptFixture::new()
        .page("first page body\r\n")
        .page("second page body\r\n")
        .build();
    let doc = RptDocument::parse(&data).unwrap();

    let first = parser::decompress_page(&data, &doc.pages[0]).unwrap();
    let second = parser::decompress_page(&data, &doc.pages[1]).unwrap();
    assert_eq!(first, b"first page body\r\n");
    assert_eq!(second, b"second page body\r\n");
    assert_eq!(first.len(), doc.pages[0].uncompressed_size as usize);
}

#[test]
fn test_corrupted_page_is_decompression_error() {
    let data = RptFixture::new().numbered_pages(2).corrupt_page(1).build();
    let doc = RptDocument::parse(&data).unwrap();

    assert!(parser::decompress_page(&data, &doc.pages[0]).is_ok());
    let err = parser::decompress_page(&data, &doc.pages[1]).unwrap_err();
    assert!(matches!(err, RptError::Decompression(_)));
}

#[test]
fn test_missing_signature_rejected() {
    let mut data = RptFixture::new().numbered_pages(1).build();
    data[0] = b'X';
    let err = RptDocument::parse(&data).unwrap_err();
    assert!(matches!(err, RptError::InvalidRpt(_)));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn test_too_small_file_is_read_error() {
    let err = RptDocument::parse(&[0u8; 0x100]).unwrap_err();
    assert!(matches!(err, RptError::Read(_)));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_missing_page_table_marker_rejected() {
    let mut data = vec![0u8; 0x200];
    data[..10].copy_from_slice(b"RPTFILEHDR");
    let err = RptDocument::parse(&data).unwrap_err();
    assert!(matches!(err, RptError::InvalidRpt(_)));
}

#[test]
fn test_section_zero_triple_terminates_scan() {
    let data = RptFixture::new()
        .numbered_pages(10)
        .section(100, 1, 5)
        .section(0, 0, 0)
        .section(200, 6, 5)
        .build();
    let doc = RptDocument::parse(&data).unwrap();
    assert_eq!(doc.sections.len(), 1);
    assert_eq!(doc.sections[0].section_id, 100);
}

#[test]
fn test_invalid_section_skipped_without_terminating() {
    let data = RptFixture::new()
        .numbered_pages(10)
        .section(300, 0, 5)
        .section(100, 1, 5)
        .build();
    let doc = RptDocument::parse(&data).unwrap();
    assert_eq!(doc.sections.len(), 1);
    assert_eq!(doc.sections[0].section_id, 100);
    assert_eq!(doc.sections[0].end_page(), 5);
}

#[test]
fn test_binary_table_and_object_roundtrip() {
    let payload: Vec<u8> = (0u32..2048).map(|i| (i % 251) as u8).collect();
    let data = RptFixture::new()
        .numbered_pages(1)
        .binary_payload_chunked(&payload, 3)
        .build();
    let doc = RptDocument::parse(&data).unwrap();

    assert_eq!(doc.binary_objects.len(), 3);
    let mut assembled = Vec::new();
    for (i, entry) in doc.binary_objects.iter().enumerate() {
        assert_eq!(entry.index, i as i32 + 1);
        assembled.extend(parser::decompress_object(&data, entry).unwrap());
    }
    assert_eq!(assembled, payload);
}

#[test]
fn test_no_binary_table_when_count_zero() {
    let data = RptFixture::new().numbered_pages(2).build();
    let doc = RptDocument::parse(&data).unwrap();
    assert_eq!(doc.header.binary_object_count, 0);
    assert!(doc.binary_objects.is_empty());
}
