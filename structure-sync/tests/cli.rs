use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::fs::write;
use tempfile::NamedTempFile;

const NOTION_VARS: &[&str] = &[
    "NOTION_API_KEY",
    "NOTION_PAGE_ID",
    "NOTION_BASE_URL",
    "NOTION_ANCHOR_TITLE",
];

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("structure-sync").expect("Binary exists");
    for var in NOTION_VARS {
        cmd.env_remove(var);
    }
    // keep a developer's .env out of the picture
    cmd.current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn sync_without_credentials_lists_missing_variables() {
    bin()
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stderr(
            predicate::str::contains("NOTION_API_KEY").and(predicate::str::contains("NOTION_PAGE_ID")),
        );
}

#[test]
fn only_the_absent_variable_is_reported() {
    bin()
        .arg("sync")
        .env("NOTION_API_KEY", "secret_test")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("NOTION_PAGE_ID").and(predicate::str::contains("NOTION_API_KEY").not()));
}

#[test]
fn invalid_config_file_fails_with_parse_error() {
    let config = NamedTempFile::new().expect("temp file");
    write(config.path(), b"max_depth: [:::").unwrap();
    bin()
        .arg("sync")
        .arg("--config")
        .arg(config.path())
        .env("NOTION_API_KEY", "secret_test")
        .env("NOTION_PAGE_ID", "page")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("parse config YAML"));
}

#[test]
fn unreachable_api_fails_with_error_chain() {
    bin()
        .args(["mark-deleted", "--branch", "feature/x"])
        .env("NOTION_API_KEY", "secret_test")
        .env("NOTION_PAGE_ID", "page")
        // nothing listens on the discard port
        .env("NOTION_BASE_URL", "http://127.0.0.1:9")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Marking branch as deleted failed"));
}

#[test]
fn help_explains_how_to_get_a_backtrace() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("RUST_BACKTRACE=1"));
}

#[test]
fn mark_deleted_requires_a_branch() {
    bin().arg("mark-deleted").assert().failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
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
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
#[serial]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use structure_sync::cli::{run, Cli, Commands};

    for var in NOTION_VARS {
        std::env::remove_var(var);
    }
    let cli = Cli {
        command: Commands::Sync {
            config: None,
            force: false,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "missing credentials must fail the run");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
