//! The extraction pipeline: parse, select, emit text, emit filtered binary.
//!
//! Diagnostics follow the CLI contract: stdout carries the final `SUCCESS:`
//! line only, everything else goes to stderr with an `ERROR:`/`WARNING:`/
//! `NOTE:`/`INFO:` prefix. The PDF and AFP stages degrade to the unfiltered
//! payload with a warning; only a failure to produce any binary output at
//! all aborts the run.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::Mmap;

use crate::error::{Result, RptError};
use crate::filter::detect::{self, BinaryFormat};
use crate::filter::{afp, pdf};
use crate::parser::{self, RptDocument, RptHeader, SectionEntry};
use crate::selection::SelectionRule;
use crate::watermark::{WatermarkConfig, image_ops, pdf_builder};

/// Everything the minimum viable RPT carries: leader plus counts region.
const MIN_FILE_LEN: usize = 0x200;

/// What a completed run produced; export mode uses this to rename outputs
/// and emit the section CSV without re-parsing.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub pages_extracted: usize,
    /// `None` when the RPT carried no binary objects.
    pub format: Option<BinaryFormat>,
    pub header: RptHeader,
    pub sections: Vec<SectionEntry>,
}

/// Run the standard pipeline: text concatenation to `out_text`, filtered
/// binary document to `out_binary`.
pub fn extract(
    input: &Path,
    rule: &str,
    out_text: &Path,
    out_binary: &Path,
    watermark: &WatermarkConfig,
) -> Result<ExtractionReport> {
    let file = File::open(input).map_err(|e| RptError::read(input, e))?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| RptError::read(input, e))?;
    let data: &[u8] = &mmap;
    if data.len() < MIN_FILE_LEN {
        return Err(RptError::Read(format!(
            "{}: file too small to be an RPT ({} bytes)",
            input.display(),
            data.len()
        )));
    }

    let doc = RptDocument::parse(data)?;
    let rule = SelectionRule::parse(rule)?;
    let selected = rule.resolve(&doc.pages, &doc.sections);
    if selected.is_empty() {
        return Err(RptError::NoPagesSelected);
    }

    write_text_output(data, &selected, out_text)?;

    let format = if doc.binary_objects.is_empty() {
        eprintln!(
            "NOTE: No binary objects in {}; binary output not produced",
            input.display()
        );
        None
    } else {
        Some(run_binary_pipeline(
            data, &doc, &rule, &selected, out_binary, watermark,
        )?)
    };

    match format {
        Some(f) => println!("SUCCESS: Extracted {} pages ({f} binary)", selected.len()),
        None => println!("SUCCESS: Extracted {} pages", selected.len()),
    }

    Ok(ExtractionReport {
        pages_extracted: selected.len(),
        format,
        header: doc.header,
        sections: doc.sections,
    })
}

/// Decompress every selected page and write its bytes verbatim, in
/// selection order.
fn write_text_output(
    data: &[u8],
    selected: &[parser::PageTableEntry],
    out_text: &Path,
) -> Result<()> {
    let file = File::create(out_text).map_err(|e| RptError::write(out_text, e))?;
    let mut writer = BufWriter::new(file);
    for entry in selected {
        let page = parser::decompress_page(data, entry)?;
        writer
            .write_all(&page)
            .map_err(|e| RptError::write(out_text, e))?;
    }
    writer.flush().map_err(|e| RptError::write(out_text, e))
}

fn run_binary_pipeline(
    data: &[u8],
    doc: &RptDocument,
    rule: &SelectionRule,
    selected: &[parser::PageTableEntry],
    out_binary: &Path,
    watermark: &WatermarkConfig,
) -> Result<BinaryFormat> {
    let full_tmp = path_with_suffix(out_binary, ".full.tmp");
    let subset_tmp = path_with_suffix(out_binary, ".temp.pdf");

    let result = binary_pipeline_inner(
        data, doc, rule, selected, out_binary, watermark, &full_tmp, &subset_tmp,
    );
    remove_quiet(&full_tmp);
    remove_quiet(&subset_tmp);
    result
}

#[allow(clippy::too_many_arguments)]
fn binary_pipeline_inner(
    data: &[u8],
    doc: &RptDocument,
    rule: &SelectionRule,
    selected: &[parser::PageTableEntry],
    out_binary: &Path,
    watermark: &WatermarkConfig,
    full_tmp: &Path,
    subset_tmp: &Path,
) -> Result<BinaryFormat> {
    // Concatenate every decompressed binary object, in table order.
    {
        let file = File::create(full_tmp).map_err(|e| RptError::write(full_tmp, e))?;
        let mut writer = BufWriter::new(file);
        for entry in &doc.binary_objects {
            let blob = parser::decompress_object(data, entry)?;
            writer
                .write_all(&blob)
                .map_err(|e| RptError::write(full_tmp, e))?;
        }
        writer.flush().map_err(|e| RptError::write(full_tmp, e))?;
    }

    let format = detect::detect_file(full_tmp)?;
    let page_numbers: Vec<i32> = selected.iter().map(|e| e.page_number).collect();

    match format {
        BinaryFormat::Pdf => {
            finish_pdf(full_tmp, subset_tmp, &page_numbers, out_binary, watermark)?
        }
        BinaryFormat::Afp => finish_afp(full_tmp, rule, &page_numbers, out_binary)?,
        BinaryFormat::Opaque => {
            eprintln!("NOTE: binary payload is neither PDF nor AFP; copied unfiltered");
            move_file(full_tmp, out_binary)?;
        }
    }
    Ok(format)
}

fn finish_pdf(
    full_tmp: &Path,
    subset_tmp: &Path,
    page_numbers: &[i32],
    out_binary: &Path,
    watermark: &WatermarkConfig,
) -> Result<()> {
    eprintln!("INFO: PDF page filter: {}", pdf::coalesce_ranges(page_numbers));
    if let Err(e) = pdf::subset(full_tmp, page_numbers, subset_tmp) {
        eprintln!("WARNING: PDF page filtering failed ({e}); copying unfiltered document");
        move_file(full_tmp, out_binary)?;
        stamp_with_warning(out_binary);
        return Ok(());
    }

    if watermark.is_enabled() {
        match apply_watermark(subset_tmp, out_binary, watermark) {
            Ok(()) => remove_quiet(subset_tmp),
            Err(e) => {
                eprintln!("WARNING: watermark overlay failed ({e}); writing unwatermarked output");
                move_file(subset_tmp, out_binary)?;
            }
        }
    } else {
        move_file(subset_tmp, out_binary)?;
    }
    stamp_with_warning(out_binary);
    Ok(())
}

fn stamp_with_warning(out_binary: &Path) {
    if let Err(e) = pdf::stamp_info(out_binary) {
        eprintln!("WARNING: metadata stamping failed: {e}");
    }
}

fn apply_watermark(subset: &Path, out_binary: &Path, config: &WatermarkConfig) -> Result<()> {
    let (width, height) = pdf::probe_page_size(subset)?;
    let png = image_ops::prepare_watermark_png(config, width, height)?;
    let wm_path = watermark_temp_path(out_binary);
    let result = pdf_builder::build_watermark_pdf(&png, width, height, config.position(), &wm_path)
        .and_then(|_| pdf::overlay(subset, &wm_path, out_binary));
    remove_quiet(&wm_path);
    result
}

fn finish_afp(
    full_tmp: &Path,
    rule: &SelectionRule,
    page_numbers: &[i32],
    out_binary: &Path,
) -> Result<()> {
    let data = fs::read(full_tmp).map_err(|e| RptError::read(full_tmp, e))?;
    // `all` keeps the stream byte-for-byte.
    let pages: &[i32] = if matches!(rule, SelectionRule::All) {
        &[]
    } else {
        page_numbers
    };
    if let Err(e) = afp::filter_pages(&data, pages, out_binary) {
        eprintln!("WARNING: AFP page filtering failed ({e}); copying unfiltered document");
        move_file(full_tmp, out_binary)?;
    }
    Ok(())
}

/// Rename with a copy fallback, so outputs may live on another filesystem.
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| RptError::write(to, e))?;
    remove_quiet(from);
    Ok(())
}

/// Best-effort temp removal; cleanup failure is never fatal.
pub(crate) fn remove_quiet(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_file(path)
    {
        eprintln!("WARNING: could not remove temp file {}: {e}", path.display());
    }
}

fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Parallel-safe watermark temp name in the output directory.
fn watermark_temp_path(out_binary: &Path) -> PathBuf {
    let dir = match out_binary.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    dir.join(format!("_wm_{}_{}.pdf", std::process::id(), millis))
}
