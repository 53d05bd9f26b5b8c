//! Library module for the odoosynth command-line front end
//!
//! Argument parsing and the resolution of connection settings and secrets
//! live here so they can be tested without a live Odoo server. The command
//! handlers are in main.rs.

pub mod output;

use clap::{Args, Parser, Subcommand};
use odoosynth_core::{
    Connection, Credential, ExtractionConfig, OdooSynthError, PipelineConfig, ReasoningConfig,
    Result,
};
use std::path::{Path, PathBuf};

/// Environment variable holding the passphrase for sealed connections.
pub const MASTER_KEY_ENV: &str = "ODOOSYNTH_MASTER_KEY";

/// CLI argument structure
#[derive(Parser)]
#[command(name = "odoosynth")]
#[command(about = "Turn a plain-language report request into a table extracted from Odoo")]
#[command(version)]
#[command(long_about = "
odoosynth - AI-guided Odoo extraction and transformation

A reasoning service picks the Odoo models and fields relevant to your goal and
writes a SQL transformation. The plan is checked against the live schema,
records are extracted page by page, and the transformation runs in an
embedded SQL engine with no file or network access.

SECURITY FEATURES:
- Read-only remote access (search_read / fields_get)
- API keys are never logged
- Optional AES-GCM sealing of the Odoo API key

EXAMPLES:
  odoosynth models
  odoosynth plan --goal 'Monthly revenue by salesperson' --output plan.json
  odoosynth execute --plan plan.json --output revenue.json
  odoosynth run --goal 'Open invoices per customer' --document brief.txt
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Authenticate and list the models visible to the login
    Models,
    /// Synthesize a plan for review without extracting anything
    Plan(PlanArgs),
    /// Extract and transform according to a reviewed plan
    Execute(ExecuteArgs),
    /// Synthesize and execute in one go
    Run(RunArgs),
    /// Seal the Odoo connection into a file protected by a master passphrase
    #[cfg(feature = "encryption")]
    Seal(SealArgs),
}

#[derive(Args)]
pub struct GoalArgs {
    /// Reporting goal in plain language
    #[arg(short, long)]
    pub goal: String,

    /// Text file with supporting context (a brief, a spreadsheet export)
    #[arg(short, long, value_name = "FILE")]
    pub document: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub goal: GoalArgs,

    /// Where to write the plan
    #[arg(short, long, default_value = "plan.json")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct ExecuteArgs {
    /// Plan written by `odoosynth plan`
    #[arg(short, long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Also write the result rows as JSON
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub goal: GoalArgs,

    /// Also write the result rows as JSON
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[cfg(feature = "encryption")]
#[derive(Args)]
pub struct SealArgs {
    /// Where to write the sealed connection
    #[arg(short, long, default_value = "connection.sealed.json")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress all output except errors"
    )]
    pub quiet: bool,
}

/// Where the Odoo session and the reasoning service come from.
#[derive(Args, Default)]
pub struct ConnectionArgs {
    /// Odoo base URL, e.g. https://erp.example.com
    #[arg(long, env = "ODOO_URL", global = true)]
    pub odoo_url: Option<String>,

    /// Odoo database name
    #[arg(long, env = "ODOO_DB", global = true)]
    pub odoo_db: Option<String>,

    /// Odoo login
    #[arg(long, env = "ODOO_LOGIN", global = true)]
    pub odoo_login: Option<String>,

    /// Odoo API key or password
    #[arg(long, env = "ODOO_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// File containing the Odoo API key
    #[arg(long, value_name = "FILE", global = true)]
    pub api_key_file: Option<PathBuf>,

    /// Sealed connection written by `odoosynth seal`
    #[arg(long, value_name = "FILE", global = true)]
    pub sealed_connection: Option<PathBuf>,

    /// Reasoning service API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Reasoning service base URL
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub openai_base_url: Option<String>,

    /// Reasoning service model
    #[arg(long, env = "OPENAI_MODEL", global = true)]
    pub openai_model: Option<String>,

    /// Records requested per page
    #[arg(long, global = true)]
    pub page_size: Option<u32>,

    /// Delay in milliseconds between page requests
    #[arg(long, global = true)]
    pub throttle: Option<u64>,
}

/// Reads a secret file, trimming surrounding whitespace.
///
/// # Errors
/// Returns an I/O error if the file cannot be read, a credential error if
/// it is empty
pub fn read_secret_file(path: &Path) -> Result<Credential> {
    let contents = std::fs::read_to_string(path).map_err(|e| OdooSynthError::Io {
        context: format!("Failed to read secret file {}", path.display()),
        source: e,
    })?;

    let secret = contents.trim();
    if secret.is_empty() {
        return Err(OdooSynthError::credential(format!(
            "secret file {} is empty",
            path.display()
        )));
    }
    Ok(Credential::new(secret.to_string()))
}

/// Resolves the Odoo connection from flags, environment and files.
///
/// A sealed connection takes precedence and needs the passphrase in
/// `ODOOSYNTH_MASTER_KEY`. Otherwise URL, database and login are required,
/// and the key comes from `--api-key`/`ODOO_API_KEY` or `--api-key-file`.
///
/// # Errors
/// Returns a configuration error naming the first missing setting, or the
/// failure of reading and unsealing the key
pub fn resolve_connection(args: &ConnectionArgs) -> Result<Connection> {
    if let Some(path) = &args.sealed_connection {
        return unseal_connection(path);
    }

    let url = required(args.odoo_url.as_deref(), "--odoo-url or ODOO_URL")?;
    let database = required(args.odoo_db.as_deref(), "--odoo-db or ODOO_DB")?;
    let login = required(args.odoo_login.as_deref(), "--odoo-login or ODOO_LOGIN")?;

    let credential = match (&args.api_key, &args.api_key_file) {
        (Some(key), _) if !key.trim().is_empty() => Credential::new(key.trim().to_string()),
        (_, Some(path)) => read_secret_file(path)?,
        _ => {
            return Err(OdooSynthError::configuration(
                "Odoo API key required. Set ODOO_API_KEY or use --api-key-file",
            ));
        }
    };

    Connection::new(url, database, login, credential)
}

#[cfg(feature = "encryption")]
fn unseal_connection(path: &Path) -> Result<Connection> {
    let passphrase = std::env::var(MASTER_KEY_ENV).map_err(|_| {
        OdooSynthError::configuration(format!(
            "{} must be set to open a sealed connection",
            MASTER_KEY_ENV
        ))
    })?;
    output::read_sealed_connection(path)?.unseal(&passphrase)
}

#[cfg(not(feature = "encryption"))]
fn unseal_connection(_path: &Path) -> Result<Connection> {
    Err(OdooSynthError::configuration(
        "Sealed connections not available. Compile with --features encryption",
    ))
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OdooSynthError::configuration(format!("missing {}", name)))
}

/// Reasoning service settings and key.
///
/// # Errors
/// Returns a configuration error if no key is available
pub fn resolve_reasoning(args: &ConnectionArgs) -> Result<(ReasoningConfig, Credential)> {
    let key = required(args.openai_api_key.as_deref(), "--openai-api-key or OPENAI_API_KEY")?;

    let mut config = ReasoningConfig::default();
    if let Some(base_url) = &args.openai_base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(model) = &args.openai_model {
        config = config.with_model(model.as_str());
    }
    config.validate()?;

    Ok((config, Credential::new(key.to_string())))
}

/// Pipeline settings with the extraction overrides applied.
///
/// # Errors
/// Returns a configuration error if an override is out of range
pub fn pipeline_config(args: &ConnectionArgs, reasoning: ReasoningConfig) -> Result<PipelineConfig> {
    let mut extraction = ExtractionConfig::default();
    if let Some(size) = args.page_size {
        extraction = extraction.with_page_size(size);
    }
    if let Some(ms) = args.throttle {
        extraction = extraction.with_throttle_ms(ms);
    }

    let config = PipelineConfig::default()
        .with_extraction(extraction)
        .with_reasoning(reasoning);
    config.validate()?;
    Ok(config)
}

/// Reads the optional supporting document.
///
/// A PDF (by extension or `%PDF-` header) is reduced to its text; anything
/// else must be UTF-8 text.
///
/// # Errors
/// Returns an I/O error if the file cannot be read and a configuration error
/// if its text cannot be extracted
pub fn read_document(path: Option<&Path>) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let bytes = std::fs::read(path).map_err(|e| OdooSynthError::Io {
        context: format!("Failed to read document {}", path.display()),
        source: e,
    })?;

    if is_pdf(path, &bytes) {
        let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
            OdooSynthError::configuration(format!(
                "Failed to extract text from PDF document {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok(Some(text));
    }

    String::from_utf8(bytes).map(Some).map_err(|_| {
        OdooSynthError::configuration(format!(
            "Document {} is neither a PDF nor UTF-8 text",
            path.display()
        ))
    })
}

fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
        || path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
}

/// Multi-line failure report for stderr: message, stage, remediation, then
/// the diagnostic and the synthesized text when there are any.
pub fn describe_failure(error: &OdooSynthError) -> String {
    let mut report = format!("Error: {}", error.originating());
    if let Some(stage) = error.stage() {
        report.push_str(&format!("\n  stage: {}", stage));
    }
    report.push_str(&format!("\n  remediation: {}", error.remediation()));
    let diagnostic = error.diagnostic();
    if let Some(diagnostic) = diagnostic {
        report.push_str(&format!("\n  diagnostic: {}", diagnostic.trim()));
    }
    if let Some(artifact) = error.artifact().filter(|text| Some(*text) != diagnostic) {
        report.push_str("\n  synthesized:");
        for line in artifact.trim().lines() {
            report.push_str(&format!("\n    {}", line));
        }
    }
    report
}
