//! Input schema: turns a raw `key -> value` mapping into a validated [`Config`].
//!
//! The mapping is passed in explicitly; nothing here reads the process
//! environment or touches global state, apart from checking that the
//! configured source directory exists.
//!
//! Every field is checked and all failures are reported together in one
//! [`ValidationError`]. A [`Config`] can only be obtained through
//! [`parse_input`], so holders of one never revalidate it.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub const FIELD_SOURCE: &str = "source";
pub const FIELD_TARGET: &str = "target";
pub const FIELD_S3_ARGS: &str = "s3args";
pub const FIELD_CF_ARGS: &str = "cfargs";
pub const FIELD_INVALIDATION_STRATEGY: &str = "invalidationStrategy";
pub const FIELD_BALANCED_LIMIT: &str = "balancedLimit";
pub const FIELD_DISTRIBUTION: &str = "distribution";

/// All recognised input keys, in the order they are validated.
pub const INPUT_FIELDS: [&str; 7] = [
    FIELD_SOURCE,
    FIELD_TARGET,
    FIELD_S3_ARGS,
    FIELD_CF_ARGS,
    FIELD_INVALIDATION_STRATEGY,
    FIELD_BALANCED_LIMIT,
    FIELD_DISTRIBUTION,
];

/// Sync arguments used when none are given: compare by size only.
pub const DEFAULT_S3_ARGS: &[&str] = &["--size-only"];
pub const DEFAULT_BALANCED_LIMIT: usize = 5;

const S3_SCHEME: &str = "s3://";
const MIN_BUCKET_LEN: usize = 3;

/// How aggressively to invalidate the CDN after a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationStrategy {
    /// Always invalidate everything with a single wildcard path.
    Frugal,
    /// Invalidate exactly the changed paths, up to a limit.
    #[default]
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown invalidation strategy '{0}', expected 'frugal' or 'balanced'")]
pub struct UnknownStrategy(pub String);

impl FromStr for InvalidationStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "frugal" => Ok(InvalidationStrategy::Frugal),
            "balanced" => Ok(InvalidationStrategy::Balanced),
            _ => Err(UnknownStrategy(trimmed.to_string())),
        }
    }
}

impl fmt::Display for InvalidationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationStrategy::Frugal => f.write_str("frugal"),
            InvalidationStrategy::Balanced => f.write_str("balanced"),
        }
    }
}

/// A single field that failed its constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every field-level failure of one [`parse_input`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid deployment input ({} problem(s)): {}", .errors.len(), render_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Names of the fields that failed, in validation order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(|e| e.field).collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn render_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validated deployment settings for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    source: PathBuf,
    target: String,
    s3_args: Vec<String>,
    cf_args: Vec<String>,
    invalidation_strategy: InvalidationStrategy,
    balanced_limit: NonZeroUsize,
    distribution: Option<String>,
}

impl Config {
    /// Local directory to publish.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Destination `s3://` URI, trimmed but otherwise as given.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Bucket name segment of [`Config::target`].
    pub fn bucket(&self) -> &str {
        bucket_segment(&self.target[S3_SCHEME.len()..])
    }

    pub fn s3_args(&self) -> &[String] {
        &self.s3_args
    }

    pub fn cf_args(&self) -> &[String] {
        &self.cf_args
    }

    pub fn invalidation_strategy(&self) -> InvalidationStrategy {
        self.invalidation_strategy
    }

    pub fn balanced_limit(&self) -> NonZeroUsize {
        self.balanced_limit
    }

    /// CloudFront distribution id, if one was given explicitly.
    pub fn distribution(&self) -> Option<&str> {
        self.distribution.as_deref()
    }

    pub fn trace_loaded(&self) {
        info!(
            source = %self.source.display(),
            s3_target = %self.target,
            strategy = %self.invalidation_strategy,
            balanced_limit = self.balanced_limit.get(),
            distribution = self.distribution.as_deref().unwrap_or("<discover>"),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

/// Validate a raw input mapping. Missing keys count as empty strings.
pub fn parse_input(raw: &HashMap<String, String>) -> Result<Config, ValidationError> {
    let value = |field: &str| raw.get(field).map(String::as_str).unwrap_or("");
    let mut errors = Vec::new();

    let source = record(&mut errors, FIELD_SOURCE, parse_source(value(FIELD_SOURCE)));
    let target = record(&mut errors, FIELD_TARGET, parse_target(value(FIELD_TARGET)));
    let s3_args = parse_s3_args(value(FIELD_S3_ARGS));
    let cf_args = split_args(value(FIELD_CF_ARGS));
    let invalidation_strategy = record(
        &mut errors,
        FIELD_INVALIDATION_STRATEGY,
        parse_strategy(value(FIELD_INVALIDATION_STRATEGY)),
    );
    let balanced_limit = record(
        &mut errors,
        FIELD_BALANCED_LIMIT,
        parse_balanced_limit(value(FIELD_BALANCED_LIMIT)),
    );
    let distribution = parse_distribution(value(FIELD_DISTRIBUTION));

    match (source, target, invalidation_strategy, balanced_limit) {
        (Some(source), Some(target), Some(invalidation_strategy), Some(balanced_limit))
            if errors.is_empty() =>
        {
            Ok(Config {
                source,
                target,
                s3_args,
                cf_args,
                invalidation_strategy,
                balanced_limit,
                distribution,
            })
        }
        _ => Err(ValidationError { errors }),
    }
}

/// Strategy and limit on their own, for planning from a saved transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSettings {
    pub strategy: InvalidationStrategy,
    pub balanced_limit: NonZeroUsize,
}

/// Validate just the planning fields, with the same rules as [`parse_input`].
pub fn parse_plan_settings(
    strategy: &str,
    balanced_limit: &str,
) -> Result<PlanSettings, ValidationError> {
    let mut errors = Vec::new();
    let strategy = record(&mut errors, FIELD_INVALIDATION_STRATEGY, parse_strategy(strategy));
    let balanced_limit = record(
        &mut errors,
        FIELD_BALANCED_LIMIT,
        parse_balanced_limit(balanced_limit),
    );
    match (strategy, balanced_limit) {
        (Some(strategy), Some(balanced_limit)) => Ok(PlanSettings {
            strategy,
            balanced_limit,
        }),
        _ => Err(ValidationError { errors }),
    }
}

fn record<T>(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    result: Result<T, String>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(message) => {
            errors.push(FieldError { field, message });
            None
        }
    }
}

fn parse_source(raw: &str) -> Result<PathBuf, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("must not be empty".to_string());
    }
    let path = PathBuf::from(trimmed);
    if !path.exists() {
        return Err(format!("path '{trimmed}' does not exist"));
    }
    Ok(path)
}

fn parse_target(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("must not be empty".to_string());
    }
    let Some(rest) = trimmed.strip_prefix(S3_SCHEME) else {
        return Err(format!("'{trimmed}' must start with '{S3_SCHEME}'"));
    };
    let bucket = bucket_segment(rest);
    if bucket.chars().any(char::is_whitespace) {
        return Err(format!("bucket in '{trimmed}' must not contain whitespace"));
    }
    if bucket.len() < MIN_BUCKET_LEN {
        return Err(format!(
            "'{trimmed}' must name a bucket of at least {MIN_BUCKET_LEN} characters"
        ));
    }
    Ok(trimmed.to_string())
}

fn bucket_segment(after_scheme: &str) -> &str {
    after_scheme
        .split_once('/')
        .map_or(after_scheme, |(bucket, _)| bucket)
}

fn parse_s3_args(raw: &str) -> Vec<String> {
    let args = split_args(raw);
    if args.is_empty() {
        DEFAULT_S3_ARGS.iter().map(|a| a.to_string()).collect()
    } else {
        args
    }
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn parse_strategy(raw: &str) -> Result<InvalidationStrategy, String> {
    if raw.trim().is_empty() {
        return Ok(InvalidationStrategy::default());
    }
    raw.parse().map_err(|e: UnknownStrategy| e.to_string())
}

fn parse_balanced_limit(raw: &str) -> Result<NonZeroUsize, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NonZeroUsize::new(DEFAULT_BALANCED_LIMIT)
            .ok_or_else(|| "default limit must be positive".to_string());
    }
    let value: i64 = trimmed
        .parse()
        .map_err(|_| format!("'{trimmed}' is not a whole number"))?;
    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| format!("'{trimmed}' must be greater than zero"))
}

fn parse_distribution(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
