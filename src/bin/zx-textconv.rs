//! zx-textconv CLI
//!
//! Convert ZX Spectrum BASIC and GEN assembler files to and from Unicode text.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter, Log, Metadata, Record};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use zx_textconv::{ConvertOptions, Decoder, Encoder, Generation};

#[derive(Parser, Debug)]
#[command(name = "zx-textconv")]
#[command(version)]
#[command(
    about = "ZX Spectrum <-> Unicode file converter for Sinclair BASIC and HiSoft GEN assembler"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use 16K/48K graphics instead of the 128K SPECTRUM and PLAY tokens (bas2u)
    #[arg(short = '4', long, global = true)]
    use_48k_tokens: bool,

    /// Include line numbers in the text output (bas2u, asm2u)
    #[arg(short = 'l', long, global = true)]
    include_line_numbers: bool,

    /// Tape header file to read (bas2u) or write (u2asm)
    #[arg(short = 't', long, value_name = "FILE", global = true)]
    tape_header: Option<PathBuf>,

    /// Prepend a +3DOS header to the native output (u2asm)
    #[arg(short = '3', long, global = true)]
    disk_header: bool,

    /// Stop reading native input at the Soft-EOF byte, or append one to native output
    #[arg(short = 's', long, global = true)]
    soft_eof: bool,

    /// Soft-EOF byte value, in hex
    #[arg(
        long,
        value_name = "HEX",
        default_value = "1A",
        value_parser = parse_hex_byte,
        global = true
    )]
    soft_eof_byte: u8,

    /// Verbose output (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sinclair BASIC to Unicode text
    #[command(name = "bas2u")]
    Bas2u(Files),

    /// HiSoft GEN assembler to Unicode text
    #[command(name = "asm2u")]
    Asm2u(Files),

    /// Unicode text to HiSoft GEN assembler
    #[command(name = "u2asm")]
    U2asm(Files),
}

#[derive(Args, Debug)]
struct Files {
    /// File to convert
    input: PathBuf,

    /// File to write (default: input with .txt or .asm appended)
    output: Option<PathBuf>,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}", record.level().as_str().to_lowercase(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn parse_hex_byte(value: &str) -> Result<u8> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u8::from_str_radix(digits, 16).map_err(|e| anyhow!("'{}' is not a hex byte: {}", value, e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let generation = if cli.use_48k_tokens {
        Generation::Spectrum48
    } else {
        Generation::Spectrum128
    };
    let options = ConvertOptions::new()
        .with_generation(generation)
        .with_line_numbers(cli.include_line_numbers)
        .with_disk_header(cli.disk_header)
        .with_soft_eof(cli.soft_eof)
        .with_soft_eof_byte(cli.soft_eof_byte);
    options.check_conflicts(cli.tape_header.is_some())?;

    match cli.command {
        Commands::Bas2u(files) => {
            let output = output_path(&files, ".txt");
            let listing = Decoder::new()
                .with_options(options)
                .decode_basic_file(&files.input, cli.tape_header.as_deref())?;
            listing.write_to_file(&output)?;
            info!("Wrote {} ({} lines)", output.display(), listing.lines.len());
        }
        Commands::Asm2u(files) => {
            if cli.tape_header.is_some() {
                warn!("--tape-header is not used by asm2u");
            }
            let output = output_path(&files, ".txt");
            let listing = Decoder::new()
                .with_options(options)
                .decode_assembler_file(&files.input)?;
            listing.write_to_file(&output)?;
            info!("Wrote {} ({} lines)", output.display(), listing.lines.len());
        }
        Commands::U2asm(files) => {
            let output = output_path(&files, ".asm");
            let encoded = Encoder::new()
                .with_options(options)
                .encode_to_files(&files.input, &output, cli.tape_header.as_deref())?;
            info!("Wrote {} ({} bytes)", output.display(), encoded.data.len());
            if let Some(path) = &cli.tape_header {
                info!("Wrote tape header {}", path.display());
            }
        }
    }

    Ok(())
}

/// Explicit output, or the input name with `suffix` appended
fn output_path(files: &Files, suffix: &str) -> PathBuf {
    match &files.output {
        Some(path) => path.clone(),
        None => append_suffix(&files.input, suffix),
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
