// sqldump2csv command line: extract one table of a SQL dump into CSV chunks.

use clap::{CommandFactory, Parser};
use sqldump2csv::config::{DEFAULT_CHUNK_SIZE, DEFAULT_PATTERN, DEFAULT_PROGRESS_INTERVAL};
use sqldump2csv::progress::ProgressManager;
use sqldump2csv::{logger, ArityPolicy, ConvertConfig, ProgressObserver, RunSummary};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

// Command-line flags and positional arguments.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging (disables the progress bar).
    #[arg(long)]
    debug: bool,

    /// Table whose rows are extracted (matched case-sensitively).
    #[arg(long)]
    table: String,

    /// Data rows per output file.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Output file name pattern; {n} is the 4-digit chunk id, {table} the table name.
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Skip tuples whose value count differs from the schema instead of padding/truncating.
    #[arg(long, default_value_t = false)]
    strict_arity: bool,

    /// Lines between progress updates.
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,

    /// Write the run summary as JSON to this file.
    #[arg(long)]
    report_json: Option<String>,

    /// SQL dump file path.
    input: String,

    /// Directory receiving the chunk files (created if missing).
    output_dir: String,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        eprintln!();
        std::process::exit(1);
    }
    let args = Args::parse();

    logger::init(args.debug);
    debug!("main: input {}", args.input);
    debug!("main: output dir {}", args.output_dir);

    let arity = if args.strict_arity {
        ArityPolicy::Strict
    } else {
        ArityPolicy::Lenient
    };
    let config = ConvertConfig::new(&args.output_dir, &args.table)
        .chunk_size(args.chunk_size)
        .pattern(&args.pattern)
        .arity(arity)
        .progress_interval(args.progress_interval);
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;

    // Ctrl-C stops the pass after the current line; the open chunk is closed.
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        error!("failed to set Ctrl-C handler: {}", e);
    }

    // Progress bar is disabled in debug mode to avoid mangled output.
    let progress = ProgressManager::new(!logger::is_debug(), &args.input, &basename(&args.input));

    let summary = match sqldump2csv::convert_file(
        Path::new(&args.input),
        &config,
        Some(&progress as &dyn ProgressObserver),
        Some(cancel),
    ) {
        Ok(summary) => summary,
        Err(e) => {
            error!("conversion failed: {}", e);
            return Err(e.into());
        }
    };

    if let Some(path) = args.report_json.as_ref() {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)?;
        debug!("main: wrote report to {}", path);
    }

    print_summary(&summary)?;
    if summary.interrupted {
        info!("interrupted after {} rows", summary.rows_written);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) -> io::Result<()> {
    let sep = "=".repeat(60);
    let mut stderr = io::stderr();
    writeln!(stderr, "\n{}\nSUMMARY ({})\n{}", sep, summary.table, sep)?;
    writeln!(stderr, "Columns:    {}", summary.schema.len())?;
    writeln!(stderr, "Statements: {}", summary.statements)?;
    writeln!(stderr, "Rows:       {}", summary.rows_written)?;
    writeln!(stderr, "Chunks:     {}", summary.chunks.len())?;
    if summary.rows_padded + summary.rows_truncated + summary.rows_rejected > 0 {
        writeln!(
            stderr,
            "Arity:      {} padded, {} truncated, {} skipped",
            summary.rows_padded, summary.rows_truncated, summary.rows_rejected
        )?;
    }
    writeln!(stderr, "Anomalies:  {}", summary.anomalies.len())?;
    writeln!(stderr, "Elapsed:    {} ms", summary.elapsed_ms)?;
    if summary.interrupted {
        writeln!(stderr, "Run was interrupted; chunks above are complete.")?;
    }
    writeln!(stderr, "{}", sep)?;
    Ok(())
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}
