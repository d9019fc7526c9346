/// # docsync CLI interface
///
/// Command parsing and orchestration for the `docsync` binary. All domain
/// logic (schema, validation, sync, migration) lives in `docsync-core`; this
/// module wires configuration, credentials and the BookStack client into it.
///
/// ## Commands
/// - `validate`: check the docs tree against the structure file, write the report
/// - `sync`: push the tree to BookStack (`--dry-run`), or only validate (`--validate-only`)
/// - `migrate`: route legacy documents into the structured tree (`--limit`, `--dry-run`)
///
/// A command exits non-zero when its own gate fails. `sync` does not run the
/// validator: files with bad frontmatter are reported and skipped by the sync.
use crate::bookstack::BookStackClient;
use crate::load_config::{load_config, CliConfig, Credentials};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docsync_core::migrate::{Migrator, ProcessedSet, RoutingTable};
use docsync_core::report::ValidationReport;
use docsync_core::revision::source_revision;
use docsync_core::schema::StructureSchema;
use docsync_core::synchronise::{synchronise, SyncOptions};
use docsync_core::validate::{validate, ValidationOutcome};
use std::path::PathBuf;

/// CLI for docsync: keep a markdown tree and its BookStack mirror in step.
#[derive(Parser)]
#[clap(
    name = "docsync",
    version,
    about = "Validate a documentation tree against its BookStack structure and sync it"
)]
pub struct Cli {
    /// Log at debug level
    #[clap(long, short, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the documentation tree and write the report
    Validate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Synchronise the documentation tree to BookStack
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Look up remote state but do not change anything
        #[clap(long)]
        dry_run: bool,
        /// Stop after validation
        #[clap(long)]
        validate_only: bool,
    },
    /// Move legacy documents into the structured tree
    Migrate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Maximum number of files to process in this run
        #[clap(long)]
        limit: Option<usize>,
        /// Route files without writing or moving anything
        #[clap(long)]
        dry_run: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Validate { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "validate", "Starting validation");
            run_validation(&config)?;
            Ok(())
        }
        Commands::Sync {
            config,
            dry_run,
            validate_only,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", dry_run, validate_only, "Starting synchronisation");
            if validate_only {
                run_validation(&config)?;
                tracing::info!(command = "sync", "Validation passed, skipping sync");
                return Ok(());
            }
            let schema = StructureSchema::load(&config.structure)
                .context("Cannot sync without a readable structure file")?;
            run_sync(&config, &schema, dry_run).await
        }
        Commands::Migrate {
            config,
            limit,
            dry_run,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "migrate", ?limit, dry_run, "Starting migration");
            run_migration(&config, limit, dry_run)
        }
    }
}

/// Validates and writes the report; errors when validation fails.
fn run_validation(config: &CliConfig) -> Result<StructureSchema> {
    let schema = StructureSchema::load(&config.structure)
        .context("Cannot validate without a readable structure file")?;
    let outcome = validate(&schema, &config.docs_root);
    log_outcome(&outcome);

    if let Some(report_path) = &config.report {
        let report = ValidationReport::new(
            &outcome,
            &config.structure,
            &config.docs_root,
            schema.version_label(),
        );
        report
            .write(report_path)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        tracing::info!(report = %report_path.display(), "Validation report written");
    }

    if !outcome.passed {
        anyhow::bail!(
            "Validation failed with {} error(s)",
            outcome.errors.len()
        );
    }
    Ok(schema)
}

fn log_outcome(outcome: &ValidationOutcome) {
    for issue in &outcome.errors {
        tracing::error!(rule = %issue.rule, path = %issue.path, "[VALIDATE] {}", issue.message);
    }
    for issue in &outcome.warnings {
        tracing::warn!(rule = %issue.rule, path = %issue.path, "[VALIDATE] {}", issue.message);
    }
}

async fn run_sync(config: &CliConfig, schema: &StructureSchema, dry_run: bool) -> Result<()> {
    let section = config
        .bookstack
        .as_ref()
        .context("The config file has no `bookstack` section")?;
    let credentials = Credentials::from_env()?;
    let client = BookStackClient::new(
        &section.url,
        &credentials.token_id,
        &credentials.token_secret,
        section.timeout(),
    )?;

    let options = SyncOptions::new(dry_run, source_revision(&config.docs_root));
    let stats = synchronise(schema, &config.docs_root, &client, &options).await;

    if stats.succeeded() {
        tracing::info!(command = "sync", ?stats, "Synchronisation complete");
        Ok(())
    } else {
        tracing::error!(command = "sync", errors = stats.error_count(), "Synchronisation finished with errors");
        Err(anyhow::anyhow!(
            "Synchronisation finished with {} error(s)",
            stats.error_count()
        ))
    }
}

fn run_migration(config: &CliConfig, limit: Option<usize>, dry_run: bool) -> Result<()> {
    let section = config
        .migrate
        .as_ref()
        .context("The config file has no `migrate` section")?;
    let routes = match &section.rules {
        Some(path) => RoutingTable::load(path)
            .with_context(|| format!("Failed to load routing rules {}", path.display()))?,
        None => RoutingTable::builtin()?,
    };
    let processed = ProcessedSet::load(&section.log)?;

    let mut migrator = Migrator::new(section.paths(), routes, processed);
    let stats = migrator.run(limit, dry_run);

    if stats.errors.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Migration finished with {} error(s)",
            stats.errors.len()
        ))
    }
}
