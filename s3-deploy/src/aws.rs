#![doc = "Bridges the core capability traits to the `aws` command line tool."]
//
//! # aws CLI collaborators
//!
//! [`AwsCli`] implements both [`Syncer`] (`aws s3 sync`) and [`Invalidator`]
//! (`aws cloudfront create-invalidation`). Credentials, retries and
//! pagination are left to the `aws` tool itself.
//!
//! When no distribution id is configured, the distribution is discovered with
//! `aws cloudfront list-distributions` by looking for one whose origin is the
//! target bucket.
//!
//! The binary defaults to `aws` on `PATH`; set `S3_DEPLOY_AWS_BIN` to point
//! somewhere else.

use async_trait::async_trait;
use s3_deploy_core::contract::{
    InvalidationExecutionError, InvalidationOutcome, InvalidationRequest, Invalidator,
    SyncExecutionError, SyncOutput, SyncRequest, Syncer,
};
use serde::Deserialize;
use std::env;
use std::process::{Output, Stdio};
use tokio::process::Command;

pub const AWS_BIN_ENV: &str = "S3_DEPLOY_AWS_BIN";
const DEFAULT_AWS_BIN: &str = "aws";

pub struct AwsCli {
    program: String,
}

impl AwsCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use `S3_DEPLOY_AWS_BIN` if set, `aws` otherwise.
    pub fn from_env() -> Self {
        let program = env::var(AWS_BIN_ENV).unwrap_or_else(|_| DEFAULT_AWS_BIN.to_string());
        tracing::info!(program = %program, "Initialized AwsCli");
        Self::new(program)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    async fn discover_distribution(
        &self,
        bucket: &str,
    ) -> Result<String, InvalidationExecutionError> {
        tracing::info!(bucket, "No distribution configured, looking it up by origin");
        let output = self
            .command()
            .args(["cloudfront", "list-distributions", "--output", "json"])
            .output()
            .await
            .map_err(|source| InvalidationExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(InvalidationExecutionError::Failed {
                status: output.status.code(),
                stderr: stderr_of(&output),
            });
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let found = find_distribution_for_bucket(&listing, bucket).map_err(|e| {
            InvalidationExecutionError::MalformedOutput {
                command: "cloudfront list-distributions".to_string(),
                detail: e.to_string(),
            }
        })?;
        match found {
            Some(id) => {
                tracing::info!(bucket, distribution_id = %id, "Discovered distribution");
                Ok(id)
            }
            None => Err(InvalidationExecutionError::NoDistribution {
                bucket: bucket.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Syncer for AwsCli {
    async fn run_sync<'a>(&self, req: SyncRequest<'a>) -> Result<SyncOutput, SyncExecutionError> {
        tracing::info!(
            source = %req.source.display(),
            s3_target = req.target,
            args = ?req.extra_args,
            "Running aws s3 sync"
        );
        let output = self
            .command()
            .args(["s3", "sync"])
            .arg(req.source)
            .arg(req.target)
            .args(req.extra_args)
            .output()
            .await
            .map_err(|source| SyncExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::error!(status = ?output.status.code(), "aws s3 sync exited unsuccessfully");
            return Err(SyncExecutionError::Failed {
                status: output.status.code(),
                stderr: stderr_of(&output),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(stdout = %stdout, "aws s3 sync transcript");
        Ok(SyncOutput { stdout })
    }
}

#[async_trait]
impl Invalidator for AwsCli {
    async fn request_invalidation<'a>(
        &self,
        req: InvalidationRequest<'a>,
    ) -> Result<InvalidationOutcome, InvalidationExecutionError> {
        let distribution_id = match req.distribution {
            Some(id) => id.to_string(),
            None => self.discover_distribution(req.bucket).await?,
        };
        let paths = req.plan.paths();
        tracing::info!(
            distribution_id = %distribution_id,
            paths = paths.len(),
            "Requesting CloudFront invalidation"
        );

        let output = self
            .command()
            .args(["cloudfront", "create-invalidation", "--distribution-id"])
            .arg(&distribution_id)
            .args(req.extra_args)
            .arg("--paths")
            .args(&paths)
            // Last so a user `--output` cannot change the format parsed below.
            .args(["--output", "json"])
            .output()
            .await
            .map_err(|source| InvalidationExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::error!(status = ?output.status.code(), "aws cloudfront create-invalidation exited unsuccessfully");
            return Err(InvalidationExecutionError::Failed {
                status: output.status.code(),
                stderr: stderr_of(&output),
            });
        }

        // The request went through; an unreadable response only loses the id.
        let invalidation_id =
            match serde_json::from_slice::<CreateInvalidationResponse>(&output.stdout) {
                Ok(resp) => Some(resp.invalidation.id),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read invalidation id from response");
                    None
                }
            };
        Ok(InvalidationOutcome {
            distribution_id,
            invalidation_id,
        })
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInvalidationResponse {
    invalidation: InvalidationBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidationBody {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DistributionListResponse {
    #[serde(default)]
    distribution_list: Option<ItemList<DistributionSummary>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", bound(deserialize = "T: Deserialize<'de>"))]
struct ItemList<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DistributionSummary {
    id: String,
    origins: ItemList<Origin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Origin {
    domain_name: String,
}

/// Find the first distribution in `list-distributions` JSON with `bucket` as an
/// S3 (REST or website endpoint) origin.
pub fn find_distribution_for_bucket(
    listing: &str,
    bucket: &str,
) -> Result<Option<String>, serde_json::Error> {
    if listing.trim().is_empty() {
        return Ok(None);
    }
    let listing: DistributionListResponse = serde_json::from_str(listing)?;
    let bucket = bucket.to_ascii_lowercase();
    let rest_prefix = format!("{bucket}.s3.");
    let website_prefix = format!("{bucket}.s3-website");

    let found = listing
        .distribution_list
        .into_iter()
        .flat_map(|list| list.items)
        .find(|dist| {
            dist.origins.items.iter().any(|origin| {
                let domain = origin.domain_name.to_ascii_lowercase();
                domain.starts_with(&rest_prefix)
                    || domain.starts_with(&website_prefix)
            })
        })
        .map(|dist| dist.id);
    Ok(found)
}
