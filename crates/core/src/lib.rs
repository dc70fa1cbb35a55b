//! rptool - extraction library for the RPT report-spool format.
//!
//! An RPT file bundles zlib-compressed text pages, section metadata and
//! optionally a set of compressed binary objects forming a PDF or AFP
//! document. This crate parses the container, resolves page selections,
//! and produces the text and filtered-binary output artifacts, including
//! PDF watermark overlays.

pub mod error;
pub mod export;
pub mod extract;
pub mod filter;
pub mod inflate;
pub mod parser;
pub mod selection;
pub mod utils;
pub mod watermark;

pub use error::{Result, RptError};
pub use export::{BatchSummary, ExportOutcome, export_directory, export_file};
pub use extract::{ExtractionReport, extract};
pub use filter::detect::BinaryFormat;
pub use parser::{BinaryObjectEntry, PageTableEntry, RptDocument, RptHeader, SectionEntry};
pub use selection::SelectionRule;
pub use watermark::{Position, WatermarkConfig};
