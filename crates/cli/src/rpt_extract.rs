//! rpt-extract - extract text pages and filtered PDF/AFP documents from
//! RPT spool files.
//!
//! Two invocation shapes share one positional grammar:
//!
//! ```text
//! rpt-extract <input.rpt> <rule> <output.txt> <output.bin> [watermark opts]
//! rpt-extract <input.rpt|directory> Export [watermark opts]
//! ```
//!
//! Watermark options are name/value pairs; names are matched
//! case-insensitively, leading dashes are optional, and unrecognized names
//! are ignored so newer option sets stay compatible with older builds.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rptool_core::error::{Result, RptError};
use rptool_core::{Position, WatermarkConfig, export_directory, export_file, extract};

/// Extract text pages and filtered PDF/AFP documents from RPT spool files.
#[derive(Parser, Debug)]
#[command(name = "rpt-extract")]
#[command(version, about, long_about = None)]
#[command(override_usage = "rpt-extract <INPUT> <RULE> <OUTPUT_TXT> <OUTPUT_BIN> [WATERMARK_OPTS]...
       rpt-extract <INPUT> Export [WATERMARK_OPTS]...")]
struct Args {
    /// RPT file, or a directory of RPT files in Export mode
    input: PathBuf,

    /// Selection rule (`all`, `pages:1-3,7`, `sections:200,100`, a bare
    /// page number) or the word `Export`
    rule: String,

    /// Output paths followed by watermark options (WatermarkImage,
    /// WatermarkPosition, WatermarkRotation, WatermarkOpacity,
    /// WatermarkScale)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    rest: Vec<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    if args.rule.eq_ignore_ascii_case("export") {
        let watermark = parse_watermark_opts(&args.rest);
        if args.input.is_dir() {
            let summary = export_directory(&args.input, &watermark)?;
            if summary.failed > 0 {
                return Ok(summary.first_failure_code.unwrap_or(10) as u8);
            }
        } else {
            export_file(&args.input, &watermark)?;
        }
        return Ok(0);
    }

    if args.rest.len() < 2 {
        eprintln!(
            "Usage: rpt-extract <INPUT> <RULE> <OUTPUT_TXT> <OUTPUT_BIN> [WATERMARK_OPTS]..."
        );
        return Err(RptError::InvalidArgs(
            "standard mode needs <OUTPUT_TXT> and <OUTPUT_BIN>".into(),
        ));
    }
    let out_text = PathBuf::from(&args.rest[0]);
    let out_binary = PathBuf::from(&args.rest[1]);
    let watermark = parse_watermark_opts(&args.rest[2..]);

    extract(&args.input, &args.rule, &out_text, &out_binary, &watermark)?;
    Ok(0)
}

/// Parse trailing name/value watermark options.
///
/// Names are normalized by stripping leading dashes and lowercasing.
/// Unknown names are skipped together with their value; unparseable values
/// warn and keep the default.
fn parse_watermark_opts(opts: &[String]) -> WatermarkConfig {
    let mut config = WatermarkConfig::default();
    let mut iter = opts.iter();
    while let Some(raw_name) = iter.next() {
        let name = raw_name.trim_start_matches('-').to_ascii_lowercase();
        let Some(value) = iter.next() else {
            eprintln!("WARNING: option '{raw_name}' has no value; ignored");
            break;
        };
        match name.as_str() {
            "watermarkimage" => config.set_image_path(value),
            "watermarkposition" => match value.parse::<Position>() {
                Ok(position) => config.set_position(position),
                Err(_) => eprintln!("WARNING: unknown watermark position '{value}'; using default"),
            },
            "watermarkrotation" => match value.parse::<i32>() {
                Ok(degrees) => config.set_rotation(degrees),
                Err(_) => eprintln!("WARNING: invalid watermark rotation '{value}'; using default"),
            },
            "watermarkopacity" => match value.parse::<i32>() {
                Ok(percent) => config.set_opacity(percent),
                Err(_) => eprintln!("WARNING: invalid watermark opacity '{value}'; using default"),
            },
            "watermarkscale" => match value.parse::<f64>() {
                Ok(factor) => config.set_scale(factor),
                Err(_) => eprintln!("WARNING: invalid watermark scale '{value}'; using default"),
            },
            _ => {}
        }
    }
    config
}
