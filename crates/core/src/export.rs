//! Export mode: auto-derived output paths, section CSV, and the batch
//! driver with its crash-safe progress ledger.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, RptError};
use crate::extract::{extract, move_file};
use crate::watermark::WatermarkConfig;

/// Name of the append-only batch ledger inside the export directory.
pub const PROGRESS_LEDGER: &str = "export_progress.txt";

/// Artifacts of one single-file export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub text_path: PathBuf,
    /// Absent when the RPT carried no binary objects.
    pub binary_path: Option<PathBuf>,
    pub csv_path: PathBuf,
    pub pages_extracted: usize,
}

/// Result of a batch-directory run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Exit code of the first failed file, for the process exit status.
    pub first_failure_code: Option<i32>,
}

/// Export a single RPT with rule `all` into `<dir>/export/`, deriving the
/// text/binary/CSV names from the input stem. The binary output extension
/// is rewritten to match the detected format.
pub fn export_file(input: &Path, watermark: &WatermarkConfig) -> Result<ExportOutcome> {
    let meta = fs::metadata(input).map_err(|e| RptError::read(input, e))?;
    if !meta.is_file() {
        return Err(RptError::FileNotFound(input.display().to_string()));
    }

    let parent = match input.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let export_dir = parent.join("export");
    fs::create_dir_all(&export_dir).map_err(|e| RptError::write(&export_dir, e))?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let text_path = export_dir.join(format!("{stem}.txt"));
    let bin_path = export_dir.join(format!("{stem}.bin"));

    let report = extract(input, "all", &text_path, &bin_path, watermark)?;

    let binary_path = match report.format {
        Some(format) => {
            let final_path = export_dir.join(format!("{stem}.{}", format.extension()));
            if final_path != bin_path {
                move_file(&bin_path, &final_path)?;
            }
            Some(final_path)
        }
        None => None,
    };

    let csv_path = export_dir.join(format!("{stem}.csv"));
    write_section_csv(&csv_path, &report)?;

    eprintln!("INFO: export wrote {}", text_path.display());
    if let Some(path) = &binary_path {
        eprintln!("INFO: export wrote {}", path.display());
    }
    eprintln!("INFO: export wrote {}", csv_path.display());

    Ok(ExportOutcome {
        text_path,
        binary_path,
        csv_path,
        pages_extracted: report.pages_extracted,
    })
}

/// One row per section, table order, unquoted integer values.
fn write_section_csv(csv_path: &Path, report: &crate::extract::ExtractionReport) -> Result<()> {
    let file = File::create(csv_path).map_err(|e| RptError::write(csv_path, e))?;
    let mut writer = BufWriter::new(file);
    let io_err = |e| RptError::write(csv_path, e);
    writeln!(writer, "SPECIES_ID,SECTION_ID,START_PAGE,PAGES").map_err(io_err)?;
    for section in &report.sections {
        writeln!(
            writer,
            "{},{},{},{}",
            report.header.species_id, section.section_id, section.start_page, section.page_count
        )
        .map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Export every `*.rpt` directly inside `dir`, resuming from the progress
/// ledger. Files already recorded in the ledger are skipped; each success
/// is appended and flushed before the next file starts, so a killed batch
/// loses at most the file it was processing.
pub fn export_directory(dir: &Path, watermark: &WatermarkConfig) -> Result<BatchSummary> {
    let meta = fs::metadata(dir).map_err(|e| RptError::read(dir, e))?;
    if !meta.is_dir() {
        return Err(RptError::InvalidArgs(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| RptError::read(dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("rpt"))
                .unwrap_or(false)
        })
        .collect();
    files.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));

    let export_dir = dir.join("export");
    fs::create_dir_all(&export_dir).map_err(|e| RptError::write(&export_dir, e))?;
    let ledger_path = export_dir.join(PROGRESS_LEDGER);

    let completed: HashSet<String> = match fs::read_to_string(&ledger_path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => HashSet::new(),
    };
    let mut ledger = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&ledger_path)
        .map_err(|e| RptError::write(&ledger_path, e))?;

    let mut summary = BatchSummary {
        total: files.len(),
        ..BatchSummary::default()
    };

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("EXPORT: {name}");

        if completed.contains(&name) {
            summary.skipped += 1;
            println!("--- skipped (already exported)");
            continue;
        }

        match export_file(path, watermark) {
            Ok(outcome) => {
                // Record before moving on; a crash after this line re-runs
                // nothing that already finished.
                writeln!(ledger, "{name}")
                    .and_then(|_| ledger.flush())
                    .map_err(|e| RptError::write(&ledger_path, e))?;
                summary.processed += 1;
                println!("--- done ({} pages)", outcome.pages_extracted);
            }
            Err(e) => {
                let code = e.exit_code();
                eprintln!("ERROR: {name}: {e}");
                summary.failed += 1;
                summary.first_failure_code.get_or_insert(code);
                println!("--- failed (exit code {code})");
            }
        }
    }

    println!(
        "Batch export complete: {} total, {} processed, {} skipped, {} failed",
        summary.total, summary.processed, summary.skipped, summary.failed
    );
    Ok(summary)
}
