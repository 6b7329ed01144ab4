use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{self, write};
use tempfile::{tempdir, NamedTempFile};

const KEY_VARS: &[&str] = &["GENAI_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Writes a config pointing the GraphQL endpoint and download directory at test fixtures.
fn create_config(endpoint: &str, output_dir: &std::path::Path) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    let yaml = format!(
        "graphql:\n  endpoint: \"{endpoint}\"\ndownload:\n  output_dir: \"{}\"\n",
        output_dir.display()
    );
    write(config.path(), yaml).expect("Writing temp config failed");
    config
}

fn records_body(base: &str) -> String {
    serde_json::json!({
        "data": {
            "getCallDataTranscribe": [
                {"callId": "C1", "entityName": "Hostel One", "Recordings": [{"s3Url": format!("{base}/rec/c1.mp3"), "dateCreatedInUpdates": "2025-10-02T10:00:00Z"}]},
                {"callId": "C2", "Recordings": [{"s3Url": format!("{base}/rec/missing.mp3")}]}
            ]
        }
    })
    .to_string()
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("recording-sync").expect("Binary exists");
    cmd.arg("--help").assert().success().stdout(
        predicate::str::contains("download")
            .and(predicate::str::contains("process"))
            .and(predicate::str::contains("reconcile")),
    );
}

#[test]
fn download_cli_syncs_recordings_from_graphql() {
    let mut server = mockito::Server::new();
    let base = server.url();
    let _gql = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(records_body(&base))
        .create();
    let _c1 = server.mock("GET", "/rec/c1.mp3").with_body("c1-audio").create();
    let _missing = server.mock("GET", "/rec/missing.mp3").with_status(404).create();

    let out = tempdir().unwrap();
    let dir = out.path().join("downloads");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("stale.mp3"), b"old").unwrap();
    let config = create_config(&format!("{base}/graphql"), &dir);

    let mut cmd = Command::cargo_bin("recording-sync").expect("Binary exists");
    cmd.arg("download")
        .arg("--config")
        .arg(config.path())
        .env_remove("GRAPHQL_URL");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("C1.mp3"));

    assert_eq!(fs::read_to_string(dir.join("C1.mp3")).unwrap(), "c1-audio");
    assert!(!dir.join("stale.mp3").exists());
    assert!(!dir.join("C2.mp3").exists());
}

#[test]
fn fetch_cli_prints_records_as_json() {
    let mut server = mockito::Server::new();
    let base = server.url();
    let _gql = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(records_body(&base))
        .create();

    let out = tempdir().unwrap();
    let config = create_config(&format!("{base}/graphql"), out.path());

    let mut cmd = Command::cargo_bin("recording-sync").expect("Binary exists");
    cmd.arg("fetch")
        .arg("--config")
        .arg(config.path())
        .arg("--from")
        .arg("2025-10-01")
        .arg("--to")
        .arg("2025-10-03")
        .env_remove("GRAPHQL_URL");

    // C2 has no dated recording, so the range filter drops it.
    cmd.assert().success().stdout(
        predicate::str::contains("\"callId\": \"C1\"").and(predicate::str::contains("C2").not()),
    );
}

#[test]
fn process_without_api_key_fails() {
    let out = tempdir().unwrap();
    let config = create_config("http://127.0.0.1:1/graphql", out.path());

    let mut cmd = Command::cargo_bin("recording-sync").expect("Binary exists");
    cmd.arg("process").arg("--config").arg(config.path());
    for var in KEY_VARS {
        cmd.env_remove(var);
    }

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Gemini API key not found"));
}

#[test]
fn missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("recording-sync").expect("Binary exists");
    cmd.arg("download")
        .arg("--config")
        .arg("/definitely/not/here.yaml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
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
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use recording_sync::cli::{run, Cli, Commands, RangeArgs};

    let cli = Cli {
        command: Commands::Fetch {
            config: std::path::PathBuf::from("dummy.yaml"),
            range: RangeArgs::default(),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
