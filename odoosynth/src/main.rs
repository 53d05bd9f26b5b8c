//! AI-guided Odoo extraction and transformation tool.
//!
//! This binary turns a plain-language reporting goal into a table: it asks a
//! reasoning service for a plan, extracts the planned fields from Odoo and
//! runs the generated transformation in an embedded SQL engine.
//!
//! # Security Guarantees
//! - Read-only remote operations only
//! - No credentials stored or logged
//! - Generated SQL cannot touch files or the network
//! - Optional AES-GCM sealing of the Odoo API key

use async_trait::async_trait;
use clap::Parser;
use odoosynth::output::{load_plan, save_plan, save_rows};
use odoosynth::{
    Cli, Command, ConnectionArgs, describe_failure, pipeline_config, read_document,
    resolve_connection, resolve_reasoning,
};
use odoosynth_core::{
    ChatRequest, ExtractionProgress, OdooClient, OdooSynthError, OpenAiClient, Pipeline,
    ProgressCallback, ReasoningConfig, ReasoningService, RemoteConfig, RemoteSource, Result,
    ResultTable, SynthesizedPlan, logging::init_logging,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Stands in for the reasoning service when a reviewed plan is executed.
struct NoReasoning;

#[async_trait]
impl ReasoningService for NoReasoning {
    async fn complete_json(&self, _request: &ChatRequest) -> Result<String> {
        Err(OdooSynthError::configuration(
            "executing a reviewed plan does not consult the reasoning service",
        ))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("{}", describe_failure(&e));
        std::process::exit(2);
    }

    if let Err(e) = run_command(&cli).await {
        eprintln!("{}", describe_failure(&e));
        std::process::exit(1);
    }
}

async fn run_command(cli: &Cli) -> Result<()> {
    odoosynth_core::initialize_response_validators().map_err(|e| {
        OdooSynthError::configuration(format!("Failed to initialize response validators: {}", e))
    })?;

    match &cli.command {
        Command::Models => list_models(&cli.connection).await,
        Command::Plan(args) => {
            let document = read_document(args.goal.document.as_deref())?;
            let pipeline = open_pipeline(&cli.connection, true).await?;
            let plan = pipeline
                .synthesize_plan(&args.goal.goal, document.as_deref())
                .await?;

            save_plan(&plan, &args.output).await?;
            print_plan_summary(&plan, &args.output, cli.global.quiet);
            Ok(())
        }
        Command::Execute(args) => {
            let plan = load_plan(&args.plan).await?;
            info!("Loaded plan {} for goal: {}", plan.plan_id, plan.goal);

            let pipeline = open_pipeline(&cli.connection, false).await?;
            let result = pipeline.execute_plan(&plan, Some(progress_logger())).await?;
            emit_result(&result, args.output.as_deref(), cli.global.quiet).await
        }
        Command::Run(args) => {
            let document = read_document(args.goal.document.as_deref())?;
            let pipeline = open_pipeline(&cli.connection, true).await?;
            let result = pipeline
                .run(&args.goal.goal, document.as_deref(), Some(progress_logger()))
                .await?;
            emit_result(&result, args.output.as_deref(), cli.global.quiet).await
        }
        #[cfg(feature = "encryption")]
        Command::Seal(args) => seal_connection(&cli.connection, &args.output).await,
    }
}

async fn connect(args: &ConnectionArgs) -> Result<OdooClient> {
    let connection = resolve_connection(args)?;
    info!("Connecting to {}", connection.to_safe_string());
    OdooClient::connect(connection, &RemoteConfig::default()).await
}

async fn open_pipeline(args: &ConnectionArgs, with_reasoning: bool) -> Result<Pipeline> {
    let (reasoning, config): (Arc<dyn ReasoningService>, ReasoningConfig) = if with_reasoning {
        let (config, key) = resolve_reasoning(args)?;
        (Arc::new(OpenAiClient::new(config.clone(), key)?), config)
    } else {
        (Arc::new(NoReasoning), ReasoningConfig::default())
    };

    let config = pipeline_config(args, config)?;
    let remote = connect(args).await?;
    Pipeline::new(Arc::new(remote), reasoning, config)
}

async fn list_models(args: &ConnectionArgs) -> Result<()> {
    let remote = connect(args).await?;
    let catalog = remote.list_models().await?;

    info!("✓ {} models visible", catalog.len());
    for model in catalog.iter() {
        println!("{}", model);
    }
    Ok(())
}

fn progress_logger() -> ProgressCallback {
    Arc::new(|update: &ExtractionProgress| {
        if update.finished {
            info!(model = %update.model, rows = update.rows_so_far, "✓ Extraction finished");
        } else {
            info!(
                model = %update.model,
                page = update.page,
                rows = update.rows_so_far,
                "Extracting"
            );
        }
    })
}

fn print_plan_summary(plan: &SynthesizedPlan, output: &Path, quiet: bool) {
    if quiet {
        return;
    }

    println!("Plan {} written to {}", plan.plan_id, output.display());
    for (model, fields) in plan.extraction_plan.iter() {
        println!("  {}: {}", model, fields.join(", "));
    }
    println!();
    println!("Transformation:");
    println!("{}", plan.procedure.source().trim());
}

async fn emit_result(result: &ResultTable, output: Option<&Path>, quiet: bool) -> Result<()> {
    if !quiet {
        println!("{}", result.to_pretty_string()?);
        println!("{} row(s)", result.num_rows());
    }

    if let Some(path) = output {
        save_rows(result, path).await?;
        info!("✓ Result saved to {}", path.display());
    }
    Ok(())
}

/// Seals the resolved connection under a passphrase read from the terminal.
#[cfg(feature = "encryption")]
async fn seal_connection(args: &ConnectionArgs, output: &Path) -> Result<()> {
    use odoosynth::output::save_sealed_connection;
    use odoosynth_core::encryption::SealedConnection;
    use std::io::{self, Write};

    let connection = resolve_connection(args)?;

    print!("Enter master passphrase: ");
    io::stdout().flush().map_err(|e| {
        OdooSynthError::configuration(format!(
            "Failed to flush stdout before reading passphrase: {}",
            e
        ))
    })?;
    let passphrase = rpassword::read_password().map_err(|e| {
        OdooSynthError::configuration(format!("Failed to read passphrase: {}", e))
    })?;

    if passphrase.is_empty() {
        return Err(OdooSynthError::configuration("Passphrase cannot be empty"));
    }

    // Confirm to prevent typos
    print!("Confirm master passphrase: ");
    io::stdout().flush().map_err(|e| {
        OdooSynthError::configuration(format!(
            "Failed to flush stdout before reading passphrase confirmation: {}",
            e
        ))
    })?;
    let confirmation = rpassword::read_password().map_err(|e| {
        OdooSynthError::configuration(format!("Failed to read passphrase confirmation: {}", e))
    })?;

    if passphrase != confirmation {
        return Err(OdooSynthError::configuration("Passphrases do not match"));
    }

    let sealed = SealedConnection::seal(&connection, &passphrase)?;
    save_sealed_connection(&sealed, output).await?;

    println!("Sealed connection written to {}", output.display());
    println!("Set {} to use it with --sealed-connection", odoosynth::MASTER_KEY_ENV);
    Ok(())
}
