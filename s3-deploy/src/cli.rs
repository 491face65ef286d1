///
/// This module implements the CLI interface for s3-deploy: command parsing,
/// argument exposure and the async entrypoint used by `main` and the tests.
///
/// All decisions (input validation, transcript parsing, invalidation planning)
/// live in the [`s3-deploy-core`] crate. This module wires the environment and
/// the `aws` tool into it.
///
/// ## Features
/// - Entry struct [`Cli`] with the `deploy` and `plan` subcommands.
/// - Async entrypoint (`run`) for programmatic invocation and integration testing.
/// - Reports are printed to stdout as JSON; logs go to stderr.
///
/// [`s3-deploy-core`]: ../../s3-deploy-core/
/// [`Cli`]: struct.Cli.html
use crate::aws::AwsCli;
use crate::load_input::{load_input, DEFAULT_PREFIX};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use s3_deploy_core::config::parse_plan_settings;
use s3_deploy_core::deploy::{deploy_from_input, DeployOptions};
use s3_deploy_core::invalidation::{plan_invalidation, InvalidationPlan};
use s3_deploy_core::sync_output::{parse_sync_output, ChangeRecord};
use serde::Serialize;
use std::path::PathBuf;

/// CLI for s3-deploy: publish a directory to S3 and invalidate what changed.
#[derive(Parser)]
#[clap(
    name = "s3-deploy",
    version,
    about = "Sync a local directory to S3 and invalidate the changed CloudFront paths"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync the configured source to the target bucket, then invalidate
    Deploy {
        /// dotenv-style file with input values; the process environment wins
        #[clap(long)]
        env_file: Option<PathBuf>,
        /// Prefix of the input environment variables
        #[clap(long, default_value = DEFAULT_PREFIX)]
        prefix: String,
        /// Only report what the sync would change; never invalidate
        #[clap(long)]
        dry_run: bool,
    },
    /// Print the invalidation plan for a saved `aws s3 sync` transcript
    Plan {
        /// File holding the sync output
        #[clap(long)]
        transcript: PathBuf,
        /// `frugal` or `balanced` (default)
        #[clap(long, default_value = "")]
        strategy: String,
        /// Most paths to invalidate individually (default 5)
        #[clap(long, default_value = "")]
        limit: String,
    },
}

/// Output of the `plan` subcommand.
#[derive(Debug, Serialize)]
struct PlanReport<'a> {
    changes: &'a [ChangeRecord],
    plan: &'a InvalidationPlan,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let result = match cli.command {
        Commands::Deploy {
            env_file,
            prefix,
            dry_run,
        } => {
            let raw = load_input(&prefix, env_file.as_deref())?;
            tracing::info!(command = "deploy", dry_run, "Starting deployment");
            let aws = AwsCli::from_env();
            match deploy_from_input(&raw, &aws, &aws, DeployOptions { dry_run }).await {
                Ok(report) => {
                    tracing::info!(command = "deploy", ?report, "Deployment complete");
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "deploy", error = %e, "Deployment failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Plan {
            transcript,
            strategy,
            limit,
        } => {
            let settings = parse_plan_settings(&strategy, &limit)?;
            let text = std::fs::read_to_string(&transcript)
                .with_context(|| format!("Failed to read transcript {}", transcript.display()))?;
            let changes = parse_sync_output(&text);
            let plan = plan_invalidation(&changes, settings.strategy, settings.balanced_limit);
            tracing::info!(command = "plan", changes = changes.len(), ?plan, "Plan computed");
            let report = PlanReport {
                changes: &changes,
                plan: &plan,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    };

    // Emit an 'exit' span as required for testing and structured tracing.
    let exit_span = tracing::info_span!("exit");
    exit_span.in_scope(|| {
        tracing::info!(success = result.is_ok(), "exit");
    });

    result
}
