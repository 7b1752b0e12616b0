use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use quota_io::{
    process_file, save_atomically, InfeasibleMode, ProcessorConfig, RowOrder, RunSummary,
};
use quota_reduce::ReductionStatus;
use serde::Serialize;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnInfeasible {
    /// Fail without writing anything.
    Reject,
    /// Keep every quantity as it was (the historical behaviour).
    LeaveUnchanged,
    /// Floor every row at one and report how far the total still is from the target.
    ClampToFloor,
}

impl From<OnInfeasible> for InfeasibleMode {
    fn from(value: OnInfeasible) -> Self {
        match value {
            OnInfeasible::Reject => InfeasibleMode::Reject,
            OnInfeasible::LeaveUnchanged => InfeasibleMode::LeaveUnchanged,
            OnInfeasible::ClampToFloor => InfeasibleMode::ClampToFloor,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    /// Largest original quantity first.
    Descending,
    /// Same order as the input sheet.
    Original,
}

impl From<Order> for RowOrder {
    fn from(value: Order) -> Self {
        match value {
            Order::Descending => RowOrder::Descending,
            Order::Original => RowOrder::Original,
        }
    }
}

#[derive(Parser)]
#[command(about = "Reduce a spreadsheet's impressions column so it adds up to a real total.")]
pub struct Args {
    /// Spreadsheet (.xlsx/.xlsm/.xls/.xlsb/.ods) or a .zip archive containing one.
    input: PathBuf,

    /// Real total the quantity column must add up to.
    #[arg(long, short = 't', allow_negative_numbers = true)]
    target: i64,

    /// Where to write the reduced workbook.
    ///
    /// Defaults to `<stem>.xlsx` next to the input (`<stem>-reduced.xlsx` if that
    /// would overwrite the input).
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// JSON config file (column names, header style, column widths, policies).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Worksheet to read (default: first sheet). Overrides the config file.
    #[arg(long)]
    sheet: Option<String>,

    /// What to do when the target cannot be reached with every row kept at one or more.
    #[arg(long, value_enum)]
    on_infeasible: Option<OnInfeasible>,

    /// Row order of the output sheet.
    #[arg(long, value_enum)]
    order: Option<Order>,

    /// Summary format printed to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log more (`-v` info, `-vv` debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct JsonSummary<'a> {
    input: &'a str,
    output: &'a str,
    source: &'a str,
    status: &'static str,
    rows_in: usize,
    rows_out: usize,
    rows_dropped: usize,
    original_total: u64,
    target: u64,
    achieved_total: u64,
    shortfall: u64,
    coerced_cells: usize,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    let config = build_config(&args)?;

    let processed = process_file(&args.input, args.target, &config)
        .with_context(|| format!("process {}", args.input.display()))?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, &processed.file_name));
    save_atomically(&output, &processed.bytes)
        .with_context(|| format!("write {}", output.display()))?;
    log::info!("wrote {}", output.display());

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let printed = match args.format {
        OutputFormat::Text => print_text(&mut handle, &args.input, &output, &processed.summary),
        OutputFormat::Json => print_json(&mut handle, &args.input, &output, &processed.summary),
    };
    match printed {
        // A closed pipe (`quota_trim ... | head`) is not a failure: the workbook is written.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.context("write summary"),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn build_config(args: &Args) -> Result<ProcessorConfig> {
    let mut config = match &args.config {
        Some(path) => ProcessorConfig::from_path(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => ProcessorConfig::default(),
    };
    if let Some(sheet) = &args.sheet {
        config.sheet = Some(sheet.clone());
    }
    if let Some(policy) = args.on_infeasible {
        config.on_infeasible = policy.into();
    }
    if let Some(order) = args.order {
        config.order = order.into();
    }
    Ok(config)
}

/// `<input dir>/<file_name>`, unless that is the input itself.
fn default_output_path(input: &Path, file_name: &str) -> PathBuf {
    let candidate = input.with_file_name(file_name);
    if candidate != input {
        return candidate;
    }
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sheet1");
    input.with_file_name(format!("{stem}-reduced.xlsx"))
}

fn shortfall(status: ReductionStatus) -> u64 {
    match status {
        ReductionStatus::Infeasible { shortfall } => shortfall,
        ReductionStatus::Unchanged | ReductionStatus::Reduced => 0,
    }
}

fn print_text(
    out: &mut impl Write,
    input: &Path,
    output: &Path,
    summary: &RunSummary,
) -> io::Result<()> {
    writeln!(out, "Impressions reduction")?;
    writeln!(out, "  input:  {}", input.display())?;
    if summary.source_name != input.file_name().and_then(|n| n.to_str()).unwrap_or_default() {
        writeln!(out, "  source: {}", summary.source_name)?;
    }
    writeln!(out, "  output: {}", output.display())?;
    writeln!(out)?;
    writeln!(
        out,
        "Total: {} -> {} (target {})",
        summary.original_total, summary.achieved_total, summary.target
    )?;
    writeln!(
        out,
        "Rows: {} in, {} out, {} dropped",
        summary.rows_in, summary.rows_out, summary.rows_dropped
    )?;
    if summary.coerced_cells > 0 {
        writeln!(
            out,
            "Coerced quantity cells: {} (blank, non-numeric, negative or fractional)",
            summary.coerced_cells
        )?;
    }
    match summary.status {
        ReductionStatus::Unchanged => writeln!(out, "Status: unchanged (already at target)")?,
        ReductionStatus::Reduced => writeln!(out, "Status: reduced")?,
        ReductionStatus::Infeasible { shortfall } => writeln!(
            out,
            "Status: infeasible (output is {shortfall} above the target)"
        )?,
    }
    Ok(())
}

fn print_json(
    out: &mut impl Write,
    input: &Path,
    output: &Path,
    summary: &RunSummary,
) -> io::Result<()> {
    let input = input.to_string_lossy();
    let output = output.to_string_lossy();
    let json = JsonSummary {
        input: &input,
        output: &output,
        source: &summary.source_name,
        status: summary.status.as_str(),
        rows_in: summary.rows_in,
        rows_out: summary.rows_out,
        rows_dropped: summary.rows_dropped,
        original_total: summary.original_total,
        target: summary.target,
        achieved_total: summary.achieved_total,
        shortfall: shortfall(summary.status),
        coerced_cells: summary.coerced_cells,
    };
    serde_json::to_writer(&mut *out, &json)?;
    out.write_all(b"\n")
}
