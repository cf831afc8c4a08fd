//! utfcsv CLI - normalize delimited text to a fixed encoding and dialect

use clap::Parser;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;
use utfcsv::{
    parse_delimiters, Charset, DecodePolicy, ErrorPolicy, NamedDialect, SniffStrategy,
    Transcoder, DEFAULT_WINDOW_SIZE,
};

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "UTFCSV_LOG";

/// Transcode delimited text of unknown encoding and dialect.
///
/// The input encoding is taken from a leading byte-order mark, falling back
/// to --input-encoding. The delimiter is sniffed from the first line.
#[derive(Parser, Debug)]
#[command(name = "utfcsv")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file, or '-' for standard input
    #[arg(default_value = "-")]
    source: PathBuf,

    /// Discard the first input record
    #[arg(long)]
    header: bool,

    /// Candidate delimiters in priority order (\t, \| and \\ escapes accepted)
    #[arg(short = 'd', long, default_value = r"|,\t")]
    delimiters: String,

    /// Input encoding used when no BOM is present
    #[arg(short = 'e', long, alias = "default-encoding", default_value = "utf-8")]
    input_encoding: Charset,

    /// Malformed input handling: strict or replace
    #[arg(long, default_value = "strict")]
    input_errors: DecodePolicy,

    /// Output encoding
    #[arg(short = 'o', long, default_value = "utf-8")]
    output_encoding: Charset,

    /// Unencodable output handling: strict, replace, ignore or escape
    #[arg(long, default_value = "strict")]
    output_errors: ErrorPolicy,

    /// Output dialect: pipe, excel, excel-tab or unix
    #[arg(long, default_value = "pipe")]
    output_dialect: NamedDialect,

    /// Dialect sniffer: frequency or first-match
    #[arg(long, default_value = "frequency")]
    sniffer: SniffStrategy,

    /// Bytes examined for BOM and dialect sniffing
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window: usize,

    /// Only report warnings and errors
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.quiet);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn run(args: &Args) -> utfcsv::Result<()> {
    let delimiters = parse_delimiters(&args.delimiters)?;

    let mut transcoder = Transcoder::new();
    transcoder
        .skip_header(args.header)
        .delimiters(&delimiters)
        .input_encoding(args.input_encoding)
        .input_errors(args.input_errors)
        .output_encoding(args.output_encoding)
        .output_errors(args.output_errors)
        .output_dialect(args.output_dialect.dialect())
        .strategy(args.sniffer)
        .window_size(args.window);

    let stdout = io::stdout();
    let output = BufWriter::new(stdout.lock());

    let report = if args.source.as_os_str() == "-" {
        transcoder.transcode_reader(io::stdin().lock(), output)?
    } else {
        transcoder.transcode_path(&args.source, output)?
    };

    tracing::debug!("wrote {} records", report.records);
    Ok(())
}
