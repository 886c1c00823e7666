//! Flow Log Reader CLI Application
//!
//! Command-line front end for the flow-log-decoder library. Reads one or more
//! flow logs and prints one line per flow, in the style of `flowd-reader`:
//! - `-v` shows every field instead of the brief set
//! - `-U` reports times in UTC
//! - `--json` writes JSON lines instead of text

use anyhow::{bail, Context, Result};
use clap::Parser;
use flow_log_decoder::{FieldMask, FlowFormatter, FlowLog, FormatConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod output;

use config::{AppConfig, OutputFormat};
use output::Printer;

/// Flow Log Reader - Decode and print flowd flow logs
#[derive(Parser, Debug)]
#[command(name = "flow-log-cli")]
#[command(about = "Decode and print binary flow logs", long_about = None)]
#[command(version)]
struct Args {
    /// Flow log file(s) to read
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Display all available flow information
    #[arg(short = 'v', long = "all")]
    all: bool,

    /// Report times in UTC rather than local time
    #[arg(short = 'U', long)]
    utc: bool,

    /// Fields to display: "brief", "all", a hex mask or a comma separated list of field names
    #[arg(short, long, value_name = "SPEC", conflicts_with = "all")]
    mask: Option<FieldMask>,

    /// Write JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log verbosity (can be repeated: -d, -dd, -ddd)
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count)]
    debug: u8,

    /// Suppress all log output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Effective settings after merging the config file and the command line
#[derive(Debug)]
struct Settings {
    files: Vec<PathBuf>,
    format: OutputFormat,
    display: FormatConfig,
    output: Option<PathBuf>,
}

impl Settings {
    /// Command-line flags win over config file values
    fn resolve(args: Args, config: AppConfig) -> Self {
        let mut output = config.output;
        if args.all {
            output.fields = FieldMask::ALL;
        } else if let Some(mask) = args.mask {
            output.fields = mask;
        }
        if args.json {
            output.format = OutputFormat::Json;
        }
        output.utc |= args.utc;
        let files = if args.files.is_empty() { config.input.files } else { args.files };

        Settings {
            files,
            format: output.format,
            display: output.format_config(),
            output: args.output.or(output.file),
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.debug, args.quiet);

    log::info!("Flow Log Reader CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", flow_log_decoder::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let settings = Settings::resolve(args, config);
    log::debug!("Effective settings: {:?}", settings);

    if settings.files.is_empty() {
        bail!("No logfile specified (use --help for usage)");
    }

    match &settings.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            run(&settings, BufWriter::new(file))
        }
        None => run(&settings, io::stdout().lock()),
    }
}

/// Decode every log in turn, stopping at the first error
fn run<W: Write>(settings: &Settings, out: W) -> Result<()> {
    let formatter = FlowFormatter::new(settings.display);
    let mut printer = Printer::new(out, settings.format, formatter);

    for path in &settings.files {
        let mut flow_log = FlowLog::open_path(path)
            .with_context(|| format!("Couldn't open flow log {:?}", path))?;
        printer.header(&path.display().to_string(), flow_log.header())?;

        for record in flow_log.records() {
            let record = record.with_context(|| format!("Failed to decode flow log {:?}", path))?;
            printer.record(&record)?;
        }
        printer.flush()?;

        log::info!("{:?}: {} flows", path, flow_log.records_read());
        flow_log.close();
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_are_brief_local_text() {
        let settings = Settings::resolve(parse(&["flow-log-cli", "a.log"]), AppConfig::default());
        assert_eq!(settings.files, vec![PathBuf::from("a.log")]);
        assert_eq!(settings.display.field_mask, FieldMask::BRIEF);
        assert_eq!(settings.format, OutputFormat::Text);
        assert!(!settings.display.utc);
        assert!(settings.output.is_none());
    }

    #[test]
    fn test_flowd_reader_flags() {
        let args = parse(&["flow-log-cli", "-v", "-U", "a.log", "b.log"]);
        let settings = Settings::resolve(args, AppConfig::default());
        assert_eq!(settings.files.len(), 2);
        assert_eq!(settings.display.field_mask, FieldMask::ALL);
        assert!(settings.display.utc);
    }

    #[test]
    fn test_mask_spec() {
        let args = parse(&["flow-log-cli", "--mask", "tag,crc32", "--json", "a.log"]);
        let settings = Settings::resolve(args, AppConfig::default());
        assert_eq!(settings.display.field_mask, FieldMask::TAG | FieldMask::CRC32);
        assert_eq!(settings.format, OutputFormat::Json);
        assert!(Args::try_parse_from(["flow-log-cli", "--mask", "nope", "a.log"]).is_err());
    }

    #[test]
    fn test_command_line_overrides_config() {
        let config: AppConfig = toml::from_str(
            "[input]\nfiles = [\"cfg.log\"]\n[output]\nformat = \"json\"\nfields = \"all\"\n",
        )
        .unwrap();
        let args = parse(&["flow-log-cli", "--mask", "brief"]);
        let settings = Settings::resolve(args, config.clone());
        assert_eq!(settings.files, vec![PathBuf::from("cfg.log")]);
        assert_eq!(settings.display.field_mask, FieldMask::BRIEF);
        assert_eq!(settings.format, OutputFormat::Json);

        let settings = Settings::resolve(parse(&["flow-log-cli", "cli.log"]), config);
        assert_eq!(settings.files, vec![PathBuf::from("cli.log")]);
        assert_eq!(settings.display.field_mask, FieldMask::ALL);
    }

    #[test]
    fn test_run_writes_all_logs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.log");
        let mut bytes = Vec::new();
        for v in [flow_log_decoder::LogHeader::MAGIC, 2, 0, 0, FieldMask::TAG.bits(), 7] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let settings = Settings {
            files: vec![path.clone()],
            format: OutputFormat::Text,
            display: FormatConfig::new().with_utc(true),
            output: None,
        };
        let mut out = Vec::new();
        run(&settings, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("FLOW tag 7 \n"));
        assert!(text.starts_with("LOGFILE "));
    }

    #[test]
    fn test_json_run_leaves_out_masked_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.log");
        let mask = (FieldMask::TAG | FieldMask::RECV_TIME).bits();
        let mut bytes = Vec::new();
        for v in [flow_log_decoder::LogHeader::MAGIC, 2, 0, 0, mask, 42, 1_000_000_000] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let args = parse(&["flow-log-cli", "--mask", "tag", "--json", &path_arg]);
        let settings = Settings::resolve(args, AppConfig::default());
        let mut out = Vec::new();
        run(&settings, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let record: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(record["tag"], 42);
        assert!(record.get("recv_secs").is_none());
    }

    #[test]
    fn test_run_fails_on_corrupt_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.log");
        std::fs::write(&path, [0u8; 16]).unwrap();

        let settings = Settings {
            files: vec![path],
            format: OutputFormat::Text,
            display: FormatConfig::new().with_utc(true),
            output: None,
        };
        let err = run(&settings, Vec::new()).unwrap_err();
        assert!(err.root_cause().to_string().contains("Bad magic"));
    }
}
