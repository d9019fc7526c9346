use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STRUCTURE: &str = r#"
version: "1.0"
structure:
  - shelf:
      name: Ops
      slug: ops
      books:
        - book:
            name: Runbooks
            slug: runbooks
            chapters:
              - chapter:
                  name: Backup
                  slug: backup
                  pages: [01-strategy]
"#;

const PAGE: &str = "---\ntitle: \"Strategy\"\norder: 1\ncategory: \"ops\"\ntags: [\"backup\"]\nlast_updated: \"2024-05-01\"\nauthor: \"docs\"\n---\n\n# Strategy\n";

/// Lays out a docs tree, structure file and config in a temp dir.
fn workspace(page: &str, extra_config: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    let chapter = root.join("docs/ops/runbooks/backup");
    fs::create_dir_all(&chapter).unwrap();
    fs::write(chapter.join("01-strategy.md"), page).unwrap();
    fs::write(root.join("structure.yaml"), STRUCTURE).unwrap();

    let config = root.join("docsync.yaml");
    fs::write(
        &config,
        format!(
            "docs_root: {docs}\nstructure: {structure}\nreport: {report}\n{extra_config}",
            docs = root.join("docs").display(),
            structure = root.join("structure.yaml").display(),
            report = root.join("report.json").display(),
        ),
    )
    .unwrap();
    (dir, config)
}

fn docsync() -> Command {
    let mut cmd = Command::cargo_bin("docsync").expect("Binary exists");
    cmd.env_remove("BOOKSTACK_TOKEN_ID")
        .env_remove("BOOKSTACK_TOKEN_SECRET");
    cmd
}

fn report(dir: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(dir.join("report.json")).unwrap()).unwrap()
}

#[test]
fn validate_succeeds_and_writes_report() {
    let (dir, config) = workspace(PAGE, "");

    docsync()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("trace_initialised"));

    let report = report(dir.path());
    assert_eq!(report["summary"]["passed"], true);
    assert_eq!(report["version"], "1.0");
}

#[test]
fn validate_fails_on_missing_frontmatter() {
    let (dir, config) = workspace("# Strategy\n", "");

    docsync()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation failed"));

    let report = report(dir.path());
    assert_eq!(report["summary"]["passed"], false);
    assert_eq!(report["errors"][0]["rule"], "frontmatter_required");
}

#[test]
fn sync_validate_only_needs_no_credentials() {
    let (_dir, config) = workspace(PAGE, "bookstack:\n  url: http://127.0.0.1:9\n");

    docsync()
        .arg("sync")
        .arg("--config")
        .arg(&config)
        .arg("--validate-only")
        .assert()
        .success();
}

#[test]
fn sync_requires_bookstack_section() {
    let (_dir, config) = workspace(PAGE, "");

    docsync()
        .arg("sync")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("bookstack"));
}

#[test]
fn sync_requires_credentials() {
    let (_dir, config) = workspace(PAGE, "bookstack:\n  url: http://127.0.0.1:9\n");

    docsync()
        .arg("sync")
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BOOKSTACK_TOKEN_ID"));
}

#[test]
fn sync_is_not_gated_by_validation_errors() {
    let (dir, config) = workspace(PAGE, "bookstack:\n  url: http://127.0.0.1:9\n  timeout_secs: 2\n");
    let drafts = dir.path().join("docs/drafts");
    fs::create_dir_all(&drafts).unwrap();
    fs::write(drafts.join("idea.md"), "# Idea\n").unwrap();

    // Nothing listens on port 9, so remote lookups fail; the run must still start.
    docsync()
        .env("BOOKSTACK_TOKEN_ID", "id")
        .env("BOOKSTACK_TOKEN_SECRET", "secret")
        .arg("sync")
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .assert()
        .stdout(predicate::str::contains("Starting documentation sync"))
        .stderr(predicate::str::contains("Validation failed").not());
}

#[test]
fn migrate_dry_run_leaves_files_in_place() {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    let legacy = root.join("old/api");
    fs::create_dir_all(&legacy).unwrap();
    fs::write(legacy.join("notes.md"), "# API notes\n").unwrap();
    fs::write(root.join("structure.yaml"), STRUCTURE).unwrap();
    let config = root.join("docsync.yaml");
    fs::write(
        &config,
        format!(
            "docs_root: {docs}\nstructure: {structure}\nmigrate:\n  source_dir: {old}\n  target_dir: {docs}\n  moved_dir: {moved}\n  log: {log}\n",
            docs = root.join("docs").display(),
            structure = root.join("structure.yaml").display(),
            old = root.join("old").display(),
            moved = root.join("old/_moved").display(),
            log = root.join("MIGRATION-LOG.md").display(),
        ),
    )
    .unwrap();

    docsync()
        .arg("migrate")
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("api-documentation"));

    assert!(legacy.join("notes.md").exists());
    assert!(!root.join("MIGRATION-LOG.md").exists());
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

    use docsync::cli::{run, Cli, Commands};

    let cli = Cli {
        verbose: false,
        command: Commands::Validate {
            config: PathBuf::from("dummy.yaml"),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "missing config must fail");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
