use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use dbc2parquet::parser::FieldDescriptor;
use dbc2parquet::{DbcFile, ParquetSink, ReadOptions, logger};

#[derive(Parser)]
#[command(name = "dbc2pq", version, about = "Convert DATASUS DBC files to Parquet")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one or more inputs to Parquet.
    Convert(ConvertArgs),
    /// Inspect table metadata and print a JSON summary.
    Inspect(InspectArgs),
}

#[derive(Parser, Clone)]
struct ConvertArgs {
    /// Input files or directories (recurses directories for .dbc files).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory (computed file names).
    #[arg(long, conflicts_with = "out")]
    out_dir: Option<PathBuf>,

    /// Output file (only valid with a single input).
    #[arg(long, conflicts_with = "out_dir")]
    out: Option<PathBuf>,

    /// Rows extracted per batch.
    #[arg(long)]
    batch_rows: Option<usize>,

    /// Parquet row group size (rows).
    #[arg(long)]
    row_group_size: Option<usize>,

    /// Number of concurrent worker threads.
    #[arg(long)]
    jobs: Option<usize>,

    /// Stop on first error.
    #[arg(long)]
    fail_fast: bool,

    /// Append warnings and errors to this log file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Parser)]
struct InspectArgs {
    /// Input .dbc file.
    input: PathBuf,

    /// Also print the first N rows.
    #[arg(long)]
    preview: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Convert(args) => run_convert(&args),
        Command::Inspect(args) => run_inspect(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            logger::log_error(&message);
            ExitCode::FAILURE
        }
    }
}

/// Expands files and directories into the list of `.dbc` inputs.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input) {
                let entry = entry.map_err(|err| format!("walking {}: {err}", input.display()))?;
                if entry.file_type().is_file() && has_dbc_extension(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    if files.is_empty() {
        return Err("no input files found".to_owned());
    }
    Ok(files)
}

fn has_dbc_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dbc"))
}

/// Derives the output path by replacing the input extension with `.parquet`.
fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let mut name = input.with_extension("parquet");
    if let Some(dir) = out_dir
        && let Some(file_name) = name.file_name()
    {
        name = dir.join(file_name);
    }
    name
}

fn run_convert(args: &ConvertArgs) -> Result<(), String> {
    if let Some(path) = &args.log_file {
        logger::set_log_file(path).map_err(|err| format!("creating log file: {err}"))?;
    }

    let files = collect_inputs(&args.inputs)?;
    if args.out.is_some() && files.len() > 1 {
        return Err("--out requires exactly one input file".to_owned());
    }
    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).map_err(|err| format!("creating output dir: {err}"))?;
    }

    let mut options = ReadOptions::new();
    if let Some(rows) = args.batch_rows {
        options = options.with_batch_rows(rows);
    }

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .map_err(|err| format!("configuring thread pool: {err}"))?;
    }

    let started = Instant::now();
    let failures = AtomicUsize::new(0);
    let outcome = files.par_iter().try_for_each(|input| {
        let output = args
            .out
            .clone()
            .unwrap_or_else(|| output_path(input, args.out_dir.as_deref()));
        match convert_one(input, &output, &options, args.row_group_size) {
            Ok(rows) => {
                println!("{} -> {} ({rows} rows)", input.display(), output.display());
                Ok(())
            }
            Err(message) => {
                failures.fetch_add(1, Ordering::Relaxed);
                logger::log_error(&format!("{}: {message}", input.display()));
                if args.fail_fast { Err(()) } else { Ok(()) }
            }
        }
    });

    let failed = failures.load(Ordering::Relaxed);
    if outcome.is_err() || failed > 0 {
        return Err(format!("{failed} of {} conversions failed", files.len()));
    }
    println!(
        "converted {} file(s) in {:.2}s",
        files.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Converts a single DBC file, returning its row count.
fn convert_one(
    input: &Path,
    output: &Path,
    options: &ReadOptions,
    row_group_size: Option<usize>,
) -> Result<usize, String> {
    let file = DbcFile::open(input).map_err(|err| err.to_string())?;

    let out_file = File::create(output).map_err(|err| err.to_string())?;
    let mut sink = ParquetSink::new(BufWriter::new(out_file));
    if let Some(size) = row_group_size {
        sink = sink.with_row_group_size(size);
    }

    if let Err(err) = file.convert(&mut sink, options) {
        // An aborted Parquet file has no footer; remove the partial artifact.
        let _ = std::fs::remove_file(output);
        return Err(err.to_string());
    }
    Ok(file.row_count())
}

#[derive(Serialize)]
struct TableSummary<'a> {
    path: String,
    record_count: usize,
    record_length: u16,
    header_length: u16,
    code_page: &'static str,
    fields: Vec<FieldSummary<'a>>,
}

#[derive(Serialize)]
struct FieldSummary<'a> {
    name: &'a str,
    field_type: String,
    column_type: &'static str,
    length: u8,
    decimals: u8,
    byte_offset: usize,
}

impl<'a> FieldSummary<'a> {
    fn new(field: &'a FieldDescriptor) -> Self {
        Self {
            name: &field.name,
            field_type: format!("{:?}", field.field_type),
            column_type: field.column_kind().name(),
            length: field.length,
            decimals: field.decimals,
            byte_offset: field.byte_offset,
        }
    }
}

fn run_inspect(args: &InspectArgs) -> Result<(), String> {
    let file = DbcFile::open(&args.input).map_err(|err| err.to_string())?;
    let table = file.table();

    let summary = TableSummary {
        path: args.input.display().to_string(),
        record_count: table.row_count(),
        record_length: table.header().record_length,
        header_length: table.header().header_length,
        code_page: table.encoding().code_page(),
        fields: table.fields().iter().map(FieldSummary::new).collect(),
    };
    let rendered = serde_json::to_string_pretty(&summary).map_err(|err| err.to_string())?;
    println!("{rendered}");

    if let Some(rows) = args.preview {
        let batch = dbc2parquet::parser::extract_batch(table, 0, rows);
        for row in 0..batch.row_count() {
            let cells: Vec<String> = (0..table.column_count())
                .map(|col| batch.value(row, col).map_or_else(String::new, |v| v.to_string()))
                .collect();
            println!("{}", cells.join("\t"));
        }
    }
    Ok(())
}
