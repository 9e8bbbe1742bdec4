//! smm CLI - Command-line interface for semi-Markov model fitting
//!
//! Commands:
//! - fit: Fit an event log and export the parameter table
//! - validate: Validate an event log without fitting
//! - simulate: Sample a synthetic event log from an exported JSON table
//! - schema: Print the accepted input formats

mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use smm_fit::extract::extract_with_summary;
use smm_fit::schema::{
    EventFormat, EventLogAdapter, EVENT_COLUMN, MIN_EVENTS, SCHEMA_VERSION, TIMESTAMP_COLUMN,
};
use smm_fit::simulate::{simulate_events, MAX_DWELL_SEC, MIN_DWELL_SEC};
use smm_fit::{Action, ComputeError, FitConfig, ModelFitter, ParameterTable, SMM_VERSION};

/// smm - Fit semi-Markov behavioral models from event logs
#[derive(Parser)]
#[command(name = "smm")]
#[command(author = "Synheart AI Inc")]
#[command(version = SMM_VERSION)]
#[command(about = "Fit semi-Markov behavioral models from event logs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit an event log and export the parameter table
    Fit {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "smm_parameters.h")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "csv")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "header")]
        format: OutputFormat,

        /// Fit configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reject unrecognized action tokens
        #[arg(long)]
        strict: bool,

        /// Decimal places of exported float literals
        #[arg(long)]
        precision: Option<usize>,
    },

    /// Validate an event log without fitting
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "csv")]
        input_format: InputFormat,

        /// Treat unrecognized action tokens as invalid
        #[arg(long)]
        strict: bool,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sample a synthetic event log from an exported JSON table
    Simulate {
        /// Parameter table written by `smm fit --format json`
        #[arg(short, long)]
        params: PathBuf,

        /// Number of events to generate
        #[arg(short = 'n', long, default_value = "1000")]
        events: usize,

        /// RNG seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Action of the first event
        #[arg(long, default_value = "scroll")]
        initial: InitialAction,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Print the accepted input formats
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// CSV with a `timestamp,event` header row
    Csv,
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

impl From<InputFormat> for EventFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Csv => EventFormat::Csv,
            InputFormat::Ndjson => EventFormat::Ndjson,
            InputFormat::Json => EventFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// C header of float constants
    Header,
    /// Compact JSON parameter table
    Json,
    /// Pretty-printed JSON parameter table
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum InitialAction {
    Scroll,
    Like,
    DubiousScroll,
}

impl From<InitialAction> for Action {
    fn from(action: InitialAction) -> Self {
        match action {
            InitialAction::Scroll => Action::Scroll,
            InitialAction::Like => Action::Like,
            InitialAction::DubiousScroll => Action::DubiousScroll,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Fitting statistics are reported at info level.
    let verbosity = match cli.command {
        Commands::Fit { .. } => cli.verbose.max(1),
        _ => cli.verbose,
    };
    logging::init(verbosity);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SmmCliError> {
    match cli.command {
        Commands::Fit {
            input,
            output,
            input_format,
            format,
            config,
            strict,
            precision,
        } => cmd_fit(
            &input,
            &output,
            input_format,
            format,
            config.as_deref(),
            strict,
            precision,
        ),

        Commands::Validate {
            input,
            input_format,
            strict,
            json,
        } => cmd_validate(&input, input_format, strict, json),

        Commands::Simulate {
            params,
            events,
            seed,
            initial,
            output,
        } => cmd_simulate(&params, events, seed, initial.into(), &output),

        Commands::Schema => cmd_schema(),
    }
}

fn cmd_fit(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    format: OutputFormat,
    config: Option<&Path>,
    strict: bool,
    precision: Option<usize>,
) -> Result<(), SmmCliError> {
    let mut fit_config = match config {
        Some(path) => FitConfig::from_json(&fs::read_to_string(path)?)?,
        None => FitConfig::default(),
    };
    if strict {
        fit_config.strict_actions = true;
    }
    if let Some(precision) = precision {
        fit_config.precision = precision;
    }
    let fitter = ModelFitter::with_config(fit_config)?;

    let input_data = read_input(input)?;
    let model = fitter.fit_text(&input_data, input_format.into())?;

    model.report().log();

    let output_data = match format {
        OutputFormat::Header => fitter.encode_header(&model),
        OutputFormat::Json => serde_json::to_string(&fitter.encode_table(&model))?,
        OutputFormat::JsonPretty => fitter.encode_json(&model)?,
    };

    write_output(output, &output_data)?;
    if !is_stdio(output) {
        info!(path = %output.display(), "parameters exported");
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    strict: bool,
    json: bool,
) -> Result<(), SmmCliError> {
    let input_data = read_input(input)?;
    let records = EventLogAdapter::parse(&input_data, input_format.into())?;

    let results = EventLogAdapter::validate_events(&records, strict);

    let mut report = ValidationReport {
        total_events: records.len(),
        valid_events: records.len() - results.len(),
        invalid_events: results.len(),
        unrecognized_events: records.iter().filter(|r| r.action().is_none()).count(),
        transitions: None,
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                timestamp: r.timestamp,
                error: r.error.to_string(),
            })
            .collect(),
    };

    if report.invalid_events == 0 {
        match EventLogAdapter::to_events(&records, strict) {
            Ok(events) => {
                let (groups, _) = extract_with_summary(&events);
                report.transitions = Some(TransitionCounts {
                    scroll: groups[Action::Scroll].len(),
                    like: groups[Action::Like].len(),
                    dubious_scroll: groups[Action::DubiousScroll].len(),
                });
            }
            Err(e) => warn!(error = %e, "event log cannot be fitted"),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:        {}", report.total_events);
        println!("Valid events:        {}", report.valid_events);
        println!("Invalid events:      {}", report.invalid_events);
        println!("Unrecognized tokens: {}", report.unrecognized_events);

        if let Some(counts) = &report.transitions {
            println!("\nTransitions by previous action:");
            println!("  scroll:         {}", counts.scroll);
            println!("  like:           {}", counts.like);
            println!("  dubious_scroll: {}", counts.dubious_scroll);
        }

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (t={}): {}",
                    err.index + 1,
                    err.timestamp,
                    err.error
                );
            }
        }
    }

    if report.invalid_events > 0 {
        Err(SmmCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_simulate(
    params: &Path,
    n_events: usize,
    seed: u64,
    initial: Action,
    output: &Path,
) -> Result<(), SmmCliError> {
    let table = ParameterTable::from_json(&fs::read_to_string(params)?)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let events = simulate_events(&table.states, initial, n_events, &mut rng);
    info!(events = events.len(), seed, "simulated event log");

    write_output(output, &EventLogAdapter::write_csv(&events))?;
    Ok(())
}

fn cmd_schema() -> Result<(), SmmCliError> {
    println!("Input Schema: {}", SCHEMA_VERSION);
    println!();
    println!("An event log is a sequence of records with two fields:");
    println!("  - {TIMESTAMP_COLUMN}: seconds on the recording clock (finite number)");
    println!("  - {EVENT_COLUMN}: action token (scroll, like, dubious_scroll; case-insensitive)");
    println!();
    println!("Accepted encodings (--input-format):");
    println!("  csv    - header row with `{TIMESTAMP_COLUMN}` and `{EVENT_COLUMN}` columns in any order");
    println!("  ndjson - one JSON object per line");
    println!("  json   - JSON array of objects (`action` is accepted for `{EVENT_COLUMN}`)");
    println!();
    println!("Records are sorted by timestamp before fitting; at least {MIN_EVENTS} are required.");
    println!("Unrecognized tokens break the sequence unless --strict rejects them.");
    println!();
    println!("Simulated dwell times are clamped to [{MIN_DWELL_SEC}, {MAX_DWELL_SEC}] seconds.");
    Ok(())
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(input: &Path) -> Result<String, SmmCliError> {
    if is_stdio(input) {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading event log from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), SmmCliError> {
    if is_stdio(output) {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum SmmCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
}

impl From<io::Error> for SmmCliError {
    fn from(e: io::Error) -> Self {
        SmmCliError::Io(e)
    }
}

impl From<ComputeError> for SmmCliError {
    fn from(e: ComputeError) -> Self {
        SmmCliError::Compute(e)
    }
}

impl From<serde_json::Error> for SmmCliError {
    fn from(e: serde_json::Error) -> Self {
        SmmCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SmmCliError> for CliError {
    fn from(e: SmmCliError) -> Self {
        match e {
            SmmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SmmCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::MissingField(_) => (
                        "MISSING_FIELD",
                        "CSV input needs a header row with timestamp and event columns",
                    ),
                    ComputeError::InvalidTimestamp(_) => {
                        ("INVALID_TIMESTAMP", "Timestamps must be finite numbers of seconds")
                    }
                    ComputeError::UnknownAction(_) => (
                        "UNKNOWN_ACTION",
                        "Use scroll, like or dubious_scroll, or drop --strict",
                    ),
                    ComputeError::InsufficientEvents(_) => (
                        "INSUFFICIENT_EVENTS",
                        "At least two events are needed to observe a transition",
                    ),
                    ComputeError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Check the configuration file and flags")
                    }
                    ComputeError::InvalidTable(_) => (
                        "INVALID_TABLE",
                        "Re-export the table with 'smm fit --format json'",
                    ),
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Run 'smm schema' to see the accepted input formats",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SmmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SmmCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    unrecognized_events: usize,
    transitions: Option<TransitionCounts>,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct TransitionCounts {
    scroll: usize,
    like: usize,
    dubious_scroll: usize,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: f64,
    error: String,
}
