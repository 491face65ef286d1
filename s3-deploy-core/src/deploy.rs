//! High-level pipeline: validate → sync → parse → plan → invalidate.
//!
//! This module sequences one deployment run. It owns no business rules of its
//! own; the interesting decisions live in [`crate::config`],
//! [`crate::sync_output`] and [`crate::invalidation`].
//!
//! # Responsibilities
//! - Fail fast: invalid input never reaches a collaborator, and a sync that did
//!   not complete never leads to an invalidation request.
//! - Skip the invalidation request entirely when the plan is an empty path set.
//! - Surface collaborator errors unchanged. There is no retry; a failed
//!   invalidation leaves the bucket updated and the cache stale until the next
//!   run.
//!
//! # Navigation
//! - Entrypoints: [`deploy_from_input`], [`deploy`]
//! - Supporting types: [`DeployOptions`], [`DeployReport`], [`DeployError`].

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{parse_input, Config, ValidationError};
use crate::contract::{
    InvalidationExecutionError, InvalidationOutcome, InvalidationRequest, Invalidator,
    SyncExecutionError, SyncRequest, Syncer,
};
use crate::invalidation::{plan_invalidation, InvalidationPlan};
use crate::sync_output::{parse_sync_output, ChangeRecord};

/// Flag appended to the sync arguments in dry-run mode.
pub const DRY_RUN_FLAG: &str = "--dryrun";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Let the sync only report what it would do, and never invalidate.
    /// Also implied by `--dryrun` in the configured sync arguments.
    pub dry_run: bool,
}

/// What happened to the invalidation step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvalidationStatus {
    Requested(InvalidationOutcome),
    /// The plan was an empty path set.
    SkippedNoChanges,
    SkippedDryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub changes: Vec<ChangeRecord>,
    pub plan: InvalidationPlan,
    pub invalidation: InvalidationStatus,
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sync(#[from] SyncExecutionError),
    #[error(transparent)]
    Invalidation(#[from] InvalidationExecutionError),
}

/// Validate `raw` and, only if it is valid, run the deployment.
pub async fn deploy_from_input<S, I>(
    raw: &HashMap<String, String>,
    syncer: &S,
    invalidator: &I,
    options: DeployOptions,
) -> Result<DeployReport, DeployError>
where
    S: Syncer,
    I: Invalidator,
{
    let config = parse_input(raw).map_err(|e| {
        error!(fields = ?e.fields(), error = %e, "[DEPLOY][ERROR] Input validation failed");
        e
    })?;
    config.trace_loaded();
    deploy(&config, syncer, invalidator, options).await
}

/// Run one deployment with an already validated [`Config`].
pub async fn deploy<S, I>(
    config: &Config,
    syncer: &S,
    invalidator: &I,
    options: DeployOptions,
) -> Result<DeployReport, DeployError>
where
    S: Syncer,
    I: Invalidator,
{
    // `--dryrun` in the sync arguments means nothing is written either.
    let dry_run = options.dry_run || config.s3_args().iter().any(|a| a == DRY_RUN_FLAG);
    info!(
        source = %config.source().display(),
        s3_target = %config.target(),
        dry_run,
        "[DEPLOY] Starting deployment"
    );

    // --- Step 1: Sync ---
    let sync_args = sync_args(config, dry_run);
    let output = syncer
        .run_sync(SyncRequest {
            source: config.source(),
            target: config.target(),
            extra_args: &sync_args,
        })
        .await
        .map_err(|e| {
            error!(error = %e, "[DEPLOY][ERROR][SYNC] Sync failed, not invalidating");
            e
        })?;
    info!("[DEPLOY][SYNC] Sync completed");

    // --- Step 2: Parse and plan ---
    let changes = parse_sync_output(&output.stdout);
    let plan = plan_invalidation(
        &changes,
        config.invalidation_strategy(),
        config.balanced_limit(),
    );
    info!(
        changes = changes.len(),
        strategy = %config.invalidation_strategy(),
        plan = ?plan,
        "[DEPLOY] Computed invalidation plan"
    );

    // --- Step 3: Invalidate ---
    let invalidation = if plan.is_noop() {
        info!("[DEPLOY][INVALIDATE] Nothing changed, skipping invalidation");
        InvalidationStatus::SkippedNoChanges
    } else if dry_run {
        info!("[DEPLOY][INVALIDATE] Dry run, skipping invalidation");
        InvalidationStatus::SkippedDryRun
    } else {
        let outcome = invalidator
            .request_invalidation(InvalidationRequest {
                distribution: config.distribution(),
                bucket: config.bucket(),
                plan: &plan,
                extra_args: config.cf_args(),
            })
            .await
            .map_err(|e| {
                error!(error = %e, "[DEPLOY][ERROR][INVALIDATE] Invalidation failed after a successful sync");
                e
            })?;
        info!(
            distribution_id = %outcome.distribution_id,
            invalidation_id = outcome.invalidation_id.as_deref().unwrap_or("<unknown>"),
            "[DEPLOY][INVALIDATE] Invalidation requested"
        );
        InvalidationStatus::Requested(outcome)
    };

    Ok(DeployReport {
        changes,
        plan,
        invalidation,
    })
}

fn sync_args(config: &Config, dry_run: bool) -> Vec<String> {
    let mut args = config.s3_args().to_vec();
    if dry_run && !args.iter().any(|a| a == DRY_RUN_FLAG) {
        args.push(DRY_RUN_FLAG.to_string());
    }
    args
}
