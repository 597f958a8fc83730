#![allow(clippy::collapsible_if)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use auditlog_core::{
    AuditPipeline, AuditPlan, FileHandle, QuerySelector, assemble_report, local_date,
    render_email_body, render_report, resolve_time_zone, validate_run_config,
};
use auditlog_domain::encode_legacy_batch;
use auditlog_types::{
    AuditType, DEFAULT_TIME_ZONE, Environment, RunConfig, RunReceipt, RunStatus, RunTiming,
    ToolMeta,
};

mod adapters;
mod config_loader;
mod env_expand;

use adapters::{DirectoryStore, JsonLinesSelector, OutboxNotifier};
use config_loader::{load_run_config, parse_run_config, resolve_config_path};
use env_expand::expand_env_vars;

#[derive(Parser)]
#[command(name = "auditlog")]
#[command(about = "Change-log audit reports", long_about = None)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, store and send one audit report, then write a run receipt.
    Run(RunArgs),

    /// Render a report from an entries file without delivering it.
    Render(RenderArgs),

    /// Validate the configuration file.
    Validate(ValidateArgs),

    /// Print the JSON Schema of the config file or the run receipt.
    Schema(SchemaArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to a config file. If omitted, uses ./auditlog.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines file of raw change-log entries.
    #[arg(long, value_name = "PATH")]
    entries: PathBuf,

    /// Directory that receives stored files and the notification outbox.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Where to write the run receipt (defaults to <out-dir>/receipt.json).
    #[arg(long)]
    receipt: Option<PathBuf>,

    /// Override the configured audit type (name or 1-3).
    #[arg(long)]
    audit_type: Option<AuditType>,

    /// Override the configured environment.
    #[arg(long, value_enum)]
    environment: Option<EnvironmentArg>,

    /// Override the configured IANA time zone.
    #[arg(long)]
    time_zone: Option<String>,

    /// Reference instant for ages and the file date (RFC 3339, defaults to now).
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Exit 2 on a fatal run and 3 on a partial one.
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EnvironmentArg {
    Production,
    Sandbox,
}

impl From<EnvironmentArg> for Environment {
    fn from(arg: EnvironmentArg) -> Self {
        match arg {
            EnvironmentArg::Production => Environment::Production,
            EnvironmentArg::Sandbox => Environment::Sandbox,
        }
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// JSON-lines file of raw change-log entries.
    #[arg(long, value_name = "PATH")]
    entries: PathBuf,

    /// Audit type of the entries (name or 1-3).
    #[arg(long)]
    audit_type: AuditType,

    /// Reference instant for ages and the file date (RFC 3339, defaults to now).
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// IANA zone that offset-less change dates and the file date are read in.
    #[arg(long, default_value = DEFAULT_TIME_ZONE)]
    time_zone: String,

    #[arg(long, value_enum, default_value_t = RenderFormat::Csv)]
    format: RenderFormat,

    /// Keep records whose legacy keys are identical.
    #[arg(long)]
    no_dedupe: bool,

    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RenderFormat {
    Csv,
    Html,
    Email,
    Legacy,
    Json,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Path to a config file. If omitted, uses ./auditlog.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ValidateFormat::Text)]
    format: ValidateFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ValidateFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
struct SchemaArgs {
    #[arg(value_enum)]
    target: SchemaTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SchemaTarget {
    Config,
    Receipt,
}

fn main() -> std::process::ExitCode {
    match run_with_args(std::env::args_os()) {
        Ok(code) => std::process::ExitCode::from(code),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(1)
        }
    }
}

fn run_with_args<I, T>(args: I) -> Result<u8>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Render(args) => {
            cmd_render(args)?;
            Ok(0)
        }
        Commands::Validate(args) => cmd_validate(args),
        Commands::Schema(args) => {
            cmd_schema(args)?;
            Ok(0)
        }
    }
}

fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

fn tool_meta() -> ToolMeta {
    ToolMeta {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn expand_env(text: &str) -> Result<String> {
    Ok(expand_env_vars(text)?.into_owned())
}

/// Exit code for a finished run.
fn exit_code(status: RunStatus, strict: bool) -> u8 {
    match (status, strict) {
        (RunStatus::Fatal, true) => 2,
        (RunStatus::Partial, true) => 3,
        _ => 0,
    }
}

fn apply_overrides(config: &mut RunConfig, args: &RunArgs) {
    if let Some(audit_type) = args.audit_type {
        config.audit_type = audit_type;
    }
    if let Some(environment) = args.environment {
        config.environment = environment.into();
    }
    if let Some(time_zone) = &args.time_zone {
        config.time_zone = time_zone.clone();
    }
}

fn cmd_run(args: RunArgs) -> Result<u8> {
    let config_path = resolve_config_path(args.config.clone())?;
    let mut config = load_run_config(&config_path, expand_env)?;
    apply_overrides(&mut config, &args);

    if !args.entries.is_file() {
        bail!("entries file '{}' does not exist", args.entries.display());
    }

    let receipt_path = args
        .receipt
        .clone()
        .unwrap_or_else(|| args.out_dir.join("receipt.json"));
    let plan = AuditPlan {
        config,
        now: args.now.unwrap_or_else(Utc::now),
    };

    info!(
        audit_type = plan.config.audit_type.as_str(),
        environment = plan.config.environment.as_str(),
        entries = %args.entries.display(),
        "resolved run inputs"
    );

    let selector = JsonLinesSelector::new(&args.entries);
    let store = DirectoryStore::new(&args.out_dir);
    let notifier = OutboxNotifier::new(&args.out_dir);
    let pipeline = AuditPipeline::new(&selector, &store, &notifier, tool_meta());

    let started_at = Utc::now();
    let clock = Instant::now();
    let outcome = pipeline.run(&plan);
    let mut receipt = outcome.receipt;
    receipt.timing = Some(RunTiming {
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        ended_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
    });

    if let Some(handle) = &receipt.file_handle {
        let path = store.resolve(&FileHandle(handle.clone()));
        info!(path = %path.display(), outbox = %notifier.dir().display(), "report stored");
    }

    write_json(&receipt_path, &receipt)?;
    info!(receipt = %receipt_path.display(), "wrote run receipt");
    print_summary(&receipt);

    Ok(exit_code(receipt.status, args.strict))
}

fn print_summary(receipt: &RunReceipt) {
    let mut line = format!(
        "{}: {} rows ({} queried, {} skipped)",
        receipt.status.as_str(),
        receipt.counts.reported,
        receipt.counts.queried,
        receipt.counts.skipped,
    );
    if let Some(subject) = &receipt.subject {
        line.push_str(&format!(" - {subject}"));
    }
    if let Some(failure) = &receipt.failure {
        line.push_str(&format!(" - {} {}: {}", failure.kind.as_str(), failure.code, failure.detail));
    }
    println!("{line}");
}

fn cmd_render(args: RenderArgs) -> Result<()> {
    let now = args.now.unwrap_or_else(Utc::now);
    let zone = resolve_time_zone(&args.time_zone)?;
    let today = local_date(now, zone);
    let entries = JsonLinesSelector::new(&args.entries)
        .select(args.audit_type)
        .with_context(|| format!("read entries '{}'", args.entries.display()))?;

    let assembly = assemble_report(entries, args.audit_type, now, zone, !args.no_dedupe);
    let report = assembly.report;
    debug!(
        reported = assembly.counts.reported,
        skipped = assembly.counts.skipped,
        "assembled report"
    );

    let text = match args.format {
        RenderFormat::Csv => render_report(&report, today).csv,
        RenderFormat::Html => render_report(&report, today).html,
        RenderFormat::Email => render_email_body(&render_report(&report, today).html),
        RenderFormat::Legacy => encode_legacy_batch(&report.records),
        RenderFormat::Json => serde_json::to_string_pretty(&report).context("serialize report")?,
    };

    match args.output {
        Some(path) => write_text(&path, &text)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}").context("write stdout")?;
        }
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<u8> {
    info!("Validating configuration file");

    let path = resolve_config_path(args.config)?;
    debug!("Loading config from: {}", path.display());

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;

    let mut errors: Vec<String> = Vec::new();
    match parse_run_config(&text, &path, expand_env) {
        Ok(config) => {
            if let Err(e) = validate_run_config(&config) {
                errors.push(e.to_string());
            }
        }
        Err(e) => errors.push(format!("{e:#}")),
    }

    match args.format {
        ValidateFormat::Text => {
            if errors.is_empty() {
                println!("Configuration is valid: {}", path.display());
            } else {
                println!("Configuration is invalid: {}", path.display());
                for err in &errors {
                    println!("  error: {err}");
                }
            }
        }
        ValidateFormat::Json => {
            let out = serde_json::json!({
                "path": path.display().to_string(),
                "valid": errors.is_empty(),
                "errors": errors,
            });
            println!("{}", serde_json::to_string_pretty(&out).context("render json")?);
        }
    }

    Ok(if errors.is_empty() { 0 } else { 1 })
}

fn cmd_schema(args: SchemaArgs) -> Result<()> {
    let schema = match args.target {
        SchemaTarget::Config => schemars::schema_for!(RunConfig),
        SchemaTarget::Receipt => schemars::schema_for!(RunReceipt),
    };
    let s = serde_json::to_string_pretty(&schema).context("render schema")?;
    println!("{s}");
    Ok(())
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let bytes = serde_json::to_vec_pretty(value).context("serialize receipt")?;
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
