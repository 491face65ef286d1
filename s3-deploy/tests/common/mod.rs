//! A stand-in `aws` executable for tests.
//!
//! The script records every invocation in `calls.log` next to itself and
//! answers from files the test drops into the same directory.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$*" >> "$dir/calls.log"
case "$1 $2" in
  "s3 sync")
    if [ -f "$dir/sync-fails" ]; then
      echo "fatal error: An error occurred (AccessDenied) when calling the ListObjectsV2 operation" >&2
      exit 1
    fi
    [ -f "$dir/sync-output" ] && cat "$dir/sync-output"
    exit 0
    ;;
  "cloudfront list-distributions")
    cat "$dir/distributions.json"
    ;;
  "cloudfront create-invalidation")
    if [ -f "$dir/invalidation-fails" ]; then
      echo "An error occurred (TooManyInvalidationsInProgress)" >&2
      exit 254
    fi
    echo '{"Location":"https://cloudfront.amazonaws.com/2020-05-31/distribution/E1/invalidation/I2J0I21PCUYOIK","Invalidation":{"Id":"I2J0I21PCUYOIK","Status":"InProgress"}}'
    ;;
  *)
    echo "unexpected invocation: $*" >&2
    exit 3
    ;;
esac
"#;

pub const INVALIDATION_ID: &str = "I2J0I21PCUYOIK";

pub struct FakeAws {
    dir: TempDir,
}

impl FakeAws {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir for fake aws");
        let script = dir.path().join("aws");
        fs::write(&script, SCRIPT).expect("write fake aws script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .expect("make fake aws executable");
        Self { dir }
    }

    pub fn program(&self) -> PathBuf {
        self.dir.path().join("aws")
    }

    pub fn program_str(&self) -> String {
        self.program().to_str().expect("utf-8 temp path").to_string()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn with_sync_output(self, transcript: &str) -> Self {
        fs::write(self.dir.path().join("sync-output"), transcript).expect("write sync output");
        self
    }

    pub fn with_distributions(self, json: &str) -> Self {
        fs::write(self.dir.path().join("distributions.json"), json).expect("write distributions");
        self
    }

    pub fn failing_sync(self) -> Self {
        fs::write(self.dir.path().join("sync-fails"), "").expect("mark sync failing");
        self
    }

    pub fn failing_invalidation(self) -> Self {
        fs::write(self.dir.path().join("invalidation-fails"), "").expect("mark invalidation failing");
        self
    }

    /// Argument lists of every invocation so far, one string per call.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
