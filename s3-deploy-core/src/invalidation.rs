//! Decides which CDN paths to invalidate after a sync.
//!
//! Invalidation requests are billed and rate limited per path, so the
//! operator picks a trade-off: [`InvalidationStrategy::Frugal`] always sends a
//! single wildcard, [`InvalidationStrategy::Balanced`] sends the exact paths
//! until there are more than `balanced_limit` of them.

use serde::Serialize;
use std::collections::HashSet;
use std::num::NonZeroUsize;

use crate::config::InvalidationStrategy;
use crate::sync_output::ChangeRecord;

/// The path CloudFront understands as "everything".
pub const WILDCARD_PATH: &str = "/*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "paths", rename_all = "snake_case")]
pub enum InvalidationPlan {
    /// Invalidate the whole distribution.
    Wildcard,
    /// Invalidate exactly these paths. Empty means there is nothing to do.
    PathSet(Vec<String>),
}

impl InvalidationPlan {
    /// True for an empty [`InvalidationPlan::PathSet`]; no request should be made.
    pub fn is_noop(&self) -> bool {
        matches!(self, InvalidationPlan::PathSet(paths) if paths.is_empty())
    }

    /// Paths as they should be handed to the CDN, percent-encoded per segment.
    pub fn paths(&self) -> Vec<String> {
        match self {
            InvalidationPlan::Wildcard => vec![WILDCARD_PATH.to_string()],
            InvalidationPlan::PathSet(paths) => paths.iter().map(|p| encode_path(p)).collect(),
        }
    }
}

/// `/how to/naïve.html` becomes `/how%20to/na%C3%AFve.html`; `/` is kept.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the plan for one run. Pure; the same input always gives the same plan.
///
/// Deleted objects are invalidated like added or updated ones so stale
/// cached copies of removed files disappear too.
pub fn plan_invalidation(
    changes: &[ChangeRecord],
    strategy: InvalidationStrategy,
    balanced_limit: NonZeroUsize,
) -> InvalidationPlan {
    match strategy {
        InvalidationStrategy::Frugal => InvalidationPlan::Wildcard,
        InvalidationStrategy::Balanced => {
            let paths = distinct_paths(changes);
            if paths.len() > balanced_limit.get() {
                tracing::debug!(
                    distinct = paths.len(),
                    limit = balanced_limit.get(),
                    "Changed paths exceed balanced limit, falling back to wildcard"
                );
                InvalidationPlan::Wildcard
            } else {
                InvalidationPlan::PathSet(paths)
            }
        }
    }
}

/// Changed paths without duplicates, in first-seen order.
fn distinct_paths(changes: &[ChangeRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    changes
        .iter()
        .filter(|change| seen.insert(change.path.as_str()))
        .map(|change| change.path.clone())
        .collect()
}
