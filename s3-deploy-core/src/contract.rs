//! # contract: the two external capabilities a deployment run depends on
//!
//! A run needs to (1) sync a local directory to a bucket and (2) ask the CDN
//! to drop cached copies. Both are delegated to external tooling; this module
//! defines the traits the orchestrator calls and the request/response types
//! that cross them.
//!
//! ## Interface & Extensibility
//! - Implement [`Syncer`] and [`Invalidator`] to plug in a real client (the
//!   CLI crate shells out to `aws`) or a test double.
//! - Failures are typed: [`SyncExecutionError`] and
//!   [`InvalidationExecutionError`] carry the tool's own diagnostics verbatim.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; `MockSyncer` and
//!   `MockInvalidator` are exported under the default `test-export-mocks`
//!   feature so downstream crates can use them in their tests.

use async_trait::async_trait;
use mockall::automock;
use std::path::Path;
use thiserror::Error;

use crate::invalidation::InvalidationPlan;

/// Everything needed to run one sync.
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    /// Local directory to publish.
    pub source: &'a Path,
    /// Destination `s3://` URI.
    pub target: &'a str,
    /// Extra arguments appended to the sync command line.
    pub extra_args: &'a [String],
}

/// What a completed sync printed; the transcript later parsed into change records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutput {
    pub stdout: String,
}

#[derive(Debug, Error)]
pub enum SyncExecutionError {
    /// The sync tool ran but reported failure.
    #[error("sync failed with exit status {}: {stderr}", describe_status(.status))]
    Failed { status: Option<i32>, stderr: String },
    /// The sync tool could not be started.
    #[error("failed to launch sync command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything needed to request one invalidation.
#[derive(Debug, Clone, Copy)]
pub struct InvalidationRequest<'a> {
    /// Explicit distribution id; `None` asks the implementor to find it.
    pub distribution: Option<&'a str>,
    /// Bucket the sync wrote to, used to discover the distribution.
    pub bucket: &'a str,
    pub plan: &'a InvalidationPlan,
    /// Extra arguments appended to the invalidation command line.
    pub extra_args: &'a [String],
}

/// Identifiers reported back by the CDN.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct InvalidationOutcome {
    pub distribution_id: String,
    pub invalidation_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum InvalidationExecutionError {
    #[error("invalidation failed with exit status {}: {stderr}", describe_status(.status))]
    Failed { status: Option<i32>, stderr: String },
    #[error("failed to launch invalidation command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// No distribution id was given and none serves the bucket.
    #[error("no distribution given and none found with bucket '{bucket}' as origin")]
    NoDistribution { bucket: String },
    /// The tool succeeded but printed something we could not read.
    #[error("unreadable output from '{command}': {detail}")]
    MalformedOutput { command: String, detail: String },
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "<terminated by signal>".to_string(), |code| code.to_string())
}

/// Runs a one-way sync of a local directory to object storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Syncer: Send + Sync {
    /// Run the sync to completion. Only a successful exit yields `Ok`.
    async fn run_sync<'a>(&self, req: SyncRequest<'a>) -> Result<SyncOutput, SyncExecutionError>;
}

/// Asks the CDN to discard cached copies of paths.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Invalidator: Send + Sync {
    /// Submit a single invalidation for every path in the plan.
    async fn request_invalidation<'a>(
        &self,
        req: InvalidationRequest<'a>,
    ) -> Result<InvalidationOutcome, InvalidationExecutionError>;
}
