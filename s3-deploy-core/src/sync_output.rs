//! Reads the transcript printed by `aws s3 sync` into [`ChangeRecord`]s.
//!
//! Recognised lines, optionally prefixed with `(dryrun) `:
//!
//! ```text
//! upload: dist/index.html to s3://bucket/index.html
//! copy: s3://other/a.css to s3://bucket/a.css
//! move: s3://other/b.css to s3://bucket/b.css
//! delete: s3://bucket/old.html
//! ```
//!
//! Everything else (progress redraws, warnings, `upload failed:` lines) is
//! noise. Lines are split on both `\n` and `\r`, so CRLF output and the
//! carriage-return progress counter the CLI prints are handled.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// What the sync did to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// One object touched by the sync, addressed by its CDN path (`/` + key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChangeRecord {
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\(dryrun\)\s+)?(upload|copy|move|delete):\s+(.+)$")
            .expect("sync line pattern is a valid regex")
    })
}

/// Extract one record per changed object, in transcript order.
///
/// An empty vector means nothing changed; that is not an error.
pub fn parse_sync_output(raw: &str) -> Vec<ChangeRecord> {
    let records: Vec<ChangeRecord> = raw
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_line)
        .collect();
    tracing::debug!(records = records.len(), "Parsed sync transcript");
    records
}

fn parse_line(line: &str) -> Option<ChangeRecord> {
    let captures = line_pattern().captures(line)?;
    let verb = captures.get(1)?.as_str();
    let operand = captures.get(2)?.as_str();

    let (kind, destination) = match verb {
        "upload" => (ChangeKind::Added, destination_of(operand)?),
        "copy" | "move" => (ChangeKind::Updated, destination_of(operand)?),
        "delete" => (ChangeKind::Deleted, operand),
        _ => return None,
    };
    let path = cdn_path(destination)?;
    Some(ChangeRecord { path, kind })
}

/// The `s3://` URI after the last ` to `.
fn destination_of(operand: &str) -> Option<&str> {
    let at = operand.rfind(" to s3://")?;
    Some(&operand[at + " to ".len()..])
}

/// `s3://bucket/some/key` becomes `/some/key`.
fn cdn_path(uri: &str) -> Option<String> {
    let (_bucket, key) = uri.trim().strip_prefix("s3://")?.split_once('/')?;
    if key.is_empty() {
        return None;
    }
    Some(format!("/{key}"))
}
