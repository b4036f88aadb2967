//! Engage CLI - Command-line interface for Synheart Engage
//!
//! Commands:
//! - replay: Replay a recorded page-event trace into analytics envelopes (batch mode)
//! - run: Process page events streamed on stdin (streaming mode)
//! - validate: Validate page-event trace schema
//! - doctor: Diagnose configuration and environment
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use synheart_engage::encoder::{EventEnvelope, ENVELOPE_VERSION};
use synheart_engage::pipeline::{encoder_for, replay, EngagementProcessor};
use synheart_engage::reporter::NdjsonReporter;
use synheart_engage::schema::{PageEvent, PageEventAdapter, SCHEMA_VERSION};
use synheart_engage::{EngageConfig, EngageError, ENGAGE_VERSION, PRODUCER_NAME};

/// Engage - Milestone-based engagement telemetry
#[derive(Parser)]
#[command(name = "engage")]
#[command(author = "Synheart AI Inc")]
#[command(version = ENGAGE_VERSION)]
#[command(about = "Turn page activity into engagement milestones", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a page-event trace into analytics envelopes (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load tracker configuration from file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the coalescing quiet period (milliseconds)
        #[arg(long)]
        quiet_period_ms: Option<u64>,
    },

    /// Process page events streamed on stdin (streaming mode)
    Run {
        /// Load tracker configuration from file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate page-event trace schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one envelope per line)
    Ndjson,
    /// JSON array of envelopes
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (engage.page_event.v1)
    Input,
    /// Output schema (engage.analytics_event.v1)
    Output,
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EngageCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            quiet_period_ms,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            quiet_period_ms,
        ),

        Commands::Run { config } => cmd_run(config.as_deref()),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema { schema_type, json_schema } => cmd_schema(schema_type, json_schema),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngageConfig, EngageCliError> {
    match path {
        Some(path) => Ok(EngageConfig::from_file(path)?),
        None => Ok(EngageConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, EngageCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_events(data: &str, format: &InputFormat) -> Result<Vec<PageEvent>, EngageCliError> {
    Ok(match format {
        InputFormat::Ndjson => PageEventAdapter::parse_ndjson(data)?,
        InputFormat::Json => PageEventAdapter::parse_array(data)?,
    })
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    quiet_period_ms: Option<u64>,
) -> Result<(), EngageCliError> {
    let mut config = load_config(config)?;
    if let Some(quiet) = quiet_period_ms {
        config.quiet_period_ms = quiet;
    }

    let input_data = read_input(input)?;
    let events = parse_events(&input_data, &input_format)?;

    if events.is_empty() {
        return Err(EngageCliError::NoEvents);
    }

    let envelopes = replay(&events, config)?;
    info!(events = events.len(), envelopes = envelopes.len(), "trace replayed");

    let output_data = format_output(&envelopes, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(config: Option<&Path>) -> Result<(), EngageCliError> {
    let config = load_config(config)?;
    let reporter = Arc::new(NdjsonReporter::with_encoder(io::stdout(), encoder_for(&config)));
    let mut processor = EngagementProcessor::with_config(config, reporter)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: PageEvent = serde_json::from_str(trimmed)
            .map_err(|e| EngageCliError::ParseError(format!("Failed to parse event: {}", e)))?;

        processor.handle(&event)?;
    }

    let flushed = processor.finish();
    debug!(handled = processor.events_handled(), flushed, "input closed");

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), EngageCliError> {
    let input_data = read_input(input)?;
    let events = parse_events(&input_data, &input_format)?;

    let results = PageEventAdapter::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                kind: r.kind.to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} event (index {}): {}", err.kind, err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(EngageCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), EngageCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "engage_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Engage version {}", ENGAGE_VERSION),
        },
        DoctorCheck {
            name: "schema_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Input schema: {}, output schema: {}", SCHEMA_VERSION, ENVELOPE_VERSION),
        },
    ];

    if let Some(config_path) = config {
        let check = if !config_path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist, defaults apply".to_string(),
            }
        } else {
            match EngageConfig::from_file(config_path) {
                Ok(config) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (quiet period {} ms, query resets {})",
                        config.quiet_period_ms,
                        if config.reset_on_query_change { "on" } else { "off" }
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGAGE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Engage Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EngageCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), EngageCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("Every event carries at_ms (host clock, non-decreasing) and a type:");
                println!();
                println!("1. navigate - {{ location }}");
                println!("2. scroll, resize - {{ scroll_top, viewport_height, height_signals[] }}");
                println!("   - coalesced: only the last sample of a burst is evaluated");
                println!("3. region_mount, region_update - {{ content_id, top, height }}");
                println!("4. region_unmount - {{ content_id }}");
                println!("5. cta_click - {{ name, location, category, metadata? }}");
                println!("   - categories: contact, booking, download, newsletter, navigation, social");
                println!("6. link_click - {{ destination, text, category, external? }}");
                println!("   - categories: internal, external, social, email, phone, download");
                println!("7. tick - advances the clock only");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", ENVELOPE_VERSION);
                println!();
                println!("Each envelope contains:");
                println!();
                println!("- schema_version, event_id, emitted_at");
                println!("- producer: {{ name, version, instance_id }}");
                println!("- event: one of");
                println!("  - scroll_milestone: {{ percentage, location }}");
                println!("  - reading_milestone: {{ content_id, percentage }}");
                println!("  - cta_activation: {{ name, location, category, metadata? }}");
                println!("  - link_activation: {{ destination, text, category }}");
                println!();
                println!("percentage is one of 25, 50, 75, 100");
            }
        }
    }

    Ok(())
}

// Helper functions

fn format_output(envelopes: &[EventEnvelope], format: &OutputFormat) -> Result<String, EngageCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for envelope in envelopes {
                lines.push(serde_json::to_string(envelope)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(envelopes)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(envelopes)?),
    }
}

fn get_input_json_schema() -> String {
    let geometry = serde_json::json!({
        "scroll_top": { "type": "number", "minimum": 0 },
        "viewport_height": { "type": "number", "minimum": 0 },
        "height_signals": { "type": "array", "items": { "type": "number", "minimum": 0 } }
    });
    let region = serde_json::json!({
        "content_id": { "type": "string", "minLength": 1 },
        "top": { "type": "number", "minimum": 0 },
        "height": { "type": "number", "minimum": 0 }
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/engage.page_event.v1.json",
        "title": SCHEMA_VERSION,
        "description": "Synheart Engage page event schema",
        "type": "object",
        "required": ["at_ms", "type"],
        "properties": {
            "at_ms": { "type": "integer", "minimum": 0 },
            "type": {
                "type": "string",
                "enum": [
                    "navigate", "scroll", "resize", "region_mount", "region_update",
                    "region_unmount", "cta_click", "link_click", "tick"
                ]
            }
        },
        "$defs": {
            "navigate": { "properties": { "location": { "type": "string" } }, "required": ["location"] },
            "scroll": { "properties": geometry.clone(), "required": ["scroll_top", "viewport_height"] },
            "resize": { "properties": geometry, "required": ["scroll_top", "viewport_height"] },
            "region_mount": { "properties": region.clone(), "required": ["content_id", "top", "height"] },
            "region_update": { "properties": region, "required": ["content_id", "top", "height"] },
            "region_unmount": {
                "properties": { "content_id": { "type": "string", "minLength": 1 } },
                "required": ["content_id"]
            },
            "cta_click": {
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "location": { "type": "string" },
                    "category": {
                        "enum": ["contact", "booking", "download", "newsletter", "navigation", "social"]
                    },
                    "metadata": { "type": "object" }
                },
                "required": ["name", "location", "category"]
            },
            "link_click": {
                "properties": {
                    "destination": { "type": "string", "minLength": 1 },
                    "text": { "type": "string" },
                    "category": {
                        "enum": ["internal", "external", "social", "email", "phone", "download"]
                    },
                    "external": { "type": "boolean" }
                },
                "required": ["destination", "text", "category"]
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/engage.analytics_event.v1.json",
        "title": ENVELOPE_VERSION,
        "description": "Synheart Engage analytics envelope schema",
        "type": "object",
        "required": ["schema_version", "event_id", "emitted_at", "producer", "event"],
        "properties": {
            "schema_version": { "type": "string", "const": ENVELOPE_VERSION },
            "event_id": { "type": "string" },
            "emitted_at": { "type": "string", "format": "date-time" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "event": {
                "type": "object",
                "required": ["event"],
                "properties": {
                    "event": {
                        "enum": ["scroll_milestone", "reading_milestone", "cta_activation", "link_activation"]
                    },
                    "percentage": { "enum": [25, 50, 75, 100] },
                    "location": { "type": "string" },
                    "content_id": { "type": "string" },
                    "name": { "type": "string" },
                    "category": { "type": "string" },
                    "metadata": { "type": "object" },
                    "destination": { "type": "string" },
                    "text": { "type": "string" }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum EngageCliError {
    Io(io::Error),
    Engage(EngageError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for EngageCliError {
    fn from(e: io::Error) -> Self {
        EngageCliError::Io(e)
    }
}

impl From<EngageError> for EngageCliError {
    fn from(e: EngageError) -> Self {
        EngageCliError::Engage(e)
    }
}

impl From<serde_json::Error> for EngageCliError {
    fn from(e: serde_json::Error) -> Self {
        EngageCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EngageCliError> for CliError {
    fn from(e: EngageCliError) -> Self {
        match e {
            EngageCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EngageCliError::Engage(EngageError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'engage doctor --config <file>' for details".to_string()),
            },
            EngageCliError::Engage(e @ EngageError::InvalidEvent(_)) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'engage validate' for details".to_string()),
            },
            EngageCliError::Engage(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            EngageCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EngageCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EngageCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            EngageCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            EngageCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
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
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    kind: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
