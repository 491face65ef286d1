#[cfg(unix)]
mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use s3_deploy_core::config::INPUT_FIELDS;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

const TRANSCRIPT: &str = "\
upload: ./index.html to s3://site-bucket/index.html
upload: ./app.js to s3://site-bucket/app.js
delete: s3://site-bucket/legacy.js
";

/// The binary with no inherited deployment input.
fn s3_deploy() -> Command {
    let mut cmd = Command::cargo_bin("s3-deploy").expect("Binary exists");
    for field in INPUT_FIELDS {
        cmd.env_remove(s3_deploy::load_input::env_key("INPUT_", field));
    }
    cmd.env_remove(s3_deploy::aws::AWS_BIN_ENV);
    cmd.current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn deploy_reports_every_invalid_field_and_fails() {
    let mut cmd = s3_deploy();
    cmd.arg("deploy")
        .env("INPUT_TARGET", "s3:///")
        .env("INPUT_BALANCEDLIMIT", "2.5")
        .env("INPUT_INVALIDATIONSTRATEGY", "sometimes");

    cmd.assert()
        .failure()
        .stderr(
            predicate::str::contains("source")
                .and(predicate::str::contains("target"))
                .and(predicate::str::contains("balancedLimit"))
                .and(predicate::str::contains("invalidationStrategy")),
        );
}

#[cfg(unix)]
#[test]
fn deploy_happy_flow_invalidates_changed_paths() {
    let fake = common::FakeAws::new().with_sync_output(TRANSCRIPT);
    let source = tempdir().unwrap();

    let mut cmd = s3_deploy();
    cmd.arg("deploy")
        .env(s3_deploy::aws::AWS_BIN_ENV, fake.program())
        .env("INPUT_SOURCE", source.path())
        .env("INPUT_TARGET", "s3://site-bucket/")
        .env("INPUT_DISTRIBUTION", "E1")
        .env("INPUT_CFARGS", "--debug");

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains(common::INVALIDATION_ID)
                .and(predicate::str::contains("/legacy.js"))
                .and(predicate::str::contains("path_set")),
        );

    let calls = fake.calls();
    assert_eq!(calls.len(), 2, "calls: {calls:?}");
    assert!(calls[0].starts_with("s3 sync "), "calls: {calls:?}");
    assert!(calls[0].ends_with("s3://site-bucket/ --size-only"), "calls: {calls:?}");
    assert_eq!(
        calls[1],
        "cloudfront create-invalidation --distribution-id E1 --debug --paths /index.html /app.js /legacy.js --output json"
    );
}

#[cfg(unix)]
#[test]
fn deploy_reads_input_from_env_file() {
    let fake = common::FakeAws::new().with_sync_output("");
    let source = tempdir().unwrap();
    let env_file = NamedTempFile::new().expect("temp file");
    write(
        env_file.path(),
        format!(
            "INPUT_SOURCE={}\nINPUT_TARGET=s3://site-bucket/\nINPUT_DISTRIBUTION=E1\n",
            source.path().display()
        ),
    )
    .unwrap();

    let mut cmd = s3_deploy();
    cmd.arg("deploy")
        .arg("--env-file")
        .arg(env_file.path())
        .env(s3_deploy::aws::AWS_BIN_ENV, fake.program());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("skipped_no_changes"));
    assert_eq!(fake.calls().len(), 1, "only the sync should run");
}

#[cfg(unix)]
#[test]
fn deploy_failed_sync_never_invalidates() {
    let fake = common::FakeAws::new().failing_sync();
    let source = tempdir().unwrap();

    let mut cmd = s3_deploy();
    cmd.arg("deploy")
        .env(s3_deploy::aws::AWS_BIN_ENV, fake.program())
        .env("INPUT_SOURCE", source.path())
        .env("INPUT_TARGET", "s3://site-bucket/")
        .env("INPUT_INVALIDATIONSTRATEGY", "frugal");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("AccessDenied"));

    let calls = fake.calls();
    assert_eq!(calls.len(), 1, "calls: {calls:?}");
    assert!(calls.iter().all(|c| !c.contains("create-invalidation")));
}

#[cfg(unix)]
#[test]
fn deploy_dry_run_never_invalidates() {
    let fake = common::FakeAws::new()
        .with_sync_output("(dryrun) upload: ./index.html to s3://site-bucket/index.html\n");
    let source = tempdir().unwrap();

    let mut cmd = s3_deploy();
    cmd.arg("deploy")
        .arg("--dry-run")
        .env(s3_deploy::aws::AWS_BIN_ENV, fake.program())
        .env("INPUT_SOURCE", source.path())
        .env("INPUT_TARGET", "s3://site-bucket/")
        .env("INPUT_DISTRIBUTION", "E1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("skipped_dry_run"));

    let calls = fake.calls();
    assert_eq!(calls.len(), 1, "calls: {calls:?}");
    assert!(calls[0].ends_with("--size-only --dryrun"), "calls: {calls:?}");
}

#[test]
fn plan_prints_path_set_within_limit() {
    let transcript = NamedTempFile::new().expect("temp file");
    write(transcript.path(), TRANSCRIPT).unwrap();

    let mut cmd = s3_deploy();
    cmd.arg("plan").arg("--transcript").arg(transcript.path());

    cmd.assert().success().stdout(
        predicate::str::contains("path_set")
            .and(predicate::str::contains("/index.html"))
            .and(predicate::str::contains("deleted")),
    );
}

#[test]
fn plan_falls_back_to_wildcard_above_limit() {
    let transcript = NamedTempFile::new().expect("temp file");
    write(transcript.path(), TRANSCRIPT).unwrap();

    let mut cmd = s3_deploy();
    cmd.arg("plan")
        .arg("--transcript")
        .arg(transcript.path())
        .arg("--limit")
        .arg("2");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("wildcard"));
}

#[test]
fn plan_rejects_invalid_limit() {
    let transcript = NamedTempFile::new().expect("temp file");
    write(transcript.path(), TRANSCRIPT).unwrap();

    let mut cmd = s3_deploy();
    cmd.arg("plan")
        .arg("--transcript")
        .arg(transcript.path())
        .arg("--limit")
        .arg("0");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("balancedLimit"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let msg = format!("{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use s3_deploy::cli::{run, Cli, Commands};

    // A missing transcript makes the run fail after the initial event.
    let cli = Cli {
        command: Commands::Plan {
            transcript: std::path::PathBuf::from("does-not-exist.txt"),
            strategy: String::new(),
            limit: String::new(),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
