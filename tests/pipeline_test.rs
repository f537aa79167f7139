//! End-to-end tests for the heartbeat pipeline with a fake reporter
//!
//! The fake reporter is a shell script that records its arguments and stdin,
//! so these tests only run on unix.

#![cfg(unix)]

use std::io::{Cursor, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wakatime_agent::config::{shared_settings, Settings};
use wakatime_agent::credentials::{MemoryCredentialStore, API_KEY_TOKEN};
use wakatime_agent::dispatch::{CommandBuilder, CycleOutcome, DispatchCycle, DispatchScheduler};
use wakatime_agent::editor::{Document, EditorEvent, HostInfo};
use wakatime_agent::heartbeat::{Heartbeat, HeartbeatBuffer, Timestamp};
use wakatime_agent::install::{Platform, ReleaseConfig};
use wakatime_agent::transparency::create_shared_log;
use wakatime_agent::{Agent, AgentOptions};

const PLUGIN: &str = "vim/9.1 vim-wakatime/0.1.0";

fn reporter_script(record_dir: &Path) -> String {
    format!(
        "#!/bin/sh\n\
         printf '%s\\n' \"$@\" > \"{dir}/args-$$\"\n\
         cat > \"{dir}/stdin-$$\"\n\
         : > \"{dir}/done-$$\"\n",
        dir = record_dir.display()
    )
}

fn install_fake_reporter(dir: &Path, record_dir: &Path) -> PathBuf {
    let path = dir.join("wakatime-cli-linux-amd64");
    std::fs::write(&path, reporter_script(record_dir)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct Recorded {
    args: Vec<String>,
    stdin: String,
}

fn read_recording(record_dir: &Path, pid: &str) -> Recorded {
    let args = std::fs::read_to_string(record_dir.join(format!("args-{pid}"))).unwrap();
    let stdin = std::fs::read_to_string(record_dir.join(format!("stdin-{pid}"))).unwrap();
    Recorded {
        args: args.lines().map(str::to_string).collect(),
        stdin,
    }
}

/// Wait for the first reporter run to finish and return its recording.
fn wait_for_run(record_dir: &Path, timeout: Duration) -> Recorded {
    let deadline = Instant::now() + timeout;
    loop {
        let done = std::fs::read_dir(record_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .find_map(|name| name.strip_prefix("done-").map(str::to_string));
        if let Some(pid) = done {
            return read_recording(record_dir, &pid);
        }
        assert!(Instant::now() < deadline, "reporter never ran");
        thread::sleep(Duration::from_millis(20));
    }
}

fn heartbeat(entity: &str, ticks: u64) -> Heartbeat {
    Heartbeat::new(entity, Timestamp::from_ticks(ticks)).unwrap()
}

#[test]
fn test_cycle_sends_primary_as_args_and_rest_on_stdin() {
    let temp = TempDir::new().unwrap();
    let record_dir = temp.path().join("calls");
    std::fs::create_dir_all(&record_dir).unwrap();
    let binary = install_fake_reporter(temp.path(), &record_dir);

    let buffer = Arc::new(HeartbeatBuffer::new());
    buffer.push(
        heartbeat("/src/a.rs", 1_000_000)
            .with_line_count(10)
            .with_write(true),
    );
    buffer.push(heartbeat("/src/b.rs", 1_005_000).with_unsaved_file(true));
    buffer.push(heartbeat("/src/c.rs", 1_010_000));

    let log = create_shared_log();
    let cycle = DispatchCycle::new(
        buffer.clone(),
        CommandBuilder::new(&binary, PLUGIN),
        Arc::new(MemoryCredentialStore::with_token(API_KEY_TOKEN, "waka_test")),
        shared_settings(Settings::default()),
        log.clone(),
    );

    let process = match cycle.run_once() {
        CycleOutcome::Dispatched {
            heartbeats,
            process,
        } => {
            assert_eq!(heartbeats, 3);
            process
        }
        other => panic!("unexpected outcome: {other:?}"),
    };
    let pid = process.pid().to_string();
    let status = process.wait().expect("reporter status");
    assert!(status.success());

    let run = read_recording(&record_dir, &pid);
    assert_eq!(
        run.args,
        vec![
            "--plugin",
            PLUGIN,
            "--entity",
            "/src/a.rs",
            "--time",
            "100.0000",
            "--key",
            "waka_test",
            "--lines-in-file",
            "10",
            "--write",
            "--extra-heartbeats",
        ]
    );

    assert!(run.stdin.ends_with('\n'));
    assert!(run.stdin.contains(r#""timestamp":100.5000"#));
    assert!(run.stdin.contains(r#""timestamp":101.0000"#));
    let extras: serde_json::Value = serde_json::from_str(&run.stdin).unwrap();
    let extras = extras.as_array().unwrap();
    assert_eq!(extras.len(), 2);
    assert_eq!(extras[0]["entity"], "/src/b.rs");
    assert_eq!(extras[0]["isUnsavedFile"], true);
    assert_eq!(extras[0]["timestamp"].as_f64(), Some(100.5));
    assert_eq!(extras[1]["entity"], "/src/c.rs");
    assert_eq!(extras[1]["timestamp"].as_f64(), Some(101.0));

    assert!(buffer.is_empty());
    assert_eq!(log.stats().heartbeats_dispatched, 3);
}

#[test]
fn test_settings_changes_apply_to_next_cycle() {
    let temp = TempDir::new().unwrap();
    let record_dir = temp.path().join("calls");
    std::fs::create_dir_all(&record_dir).unwrap();
    let binary = install_fake_reporter(temp.path(), &record_dir);

    let buffer = Arc::new(HeartbeatBuffer::new());
    let settings = shared_settings(Settings::default());
    let cycle = DispatchCycle::new(
        buffer.clone(),
        CommandBuilder::new(&binary, PLUGIN),
        Arc::new(MemoryCredentialStore::new()),
        settings.clone(),
        create_shared_log(),
    );

    {
        let mut s = settings.write().unwrap();
        s.debug = true;
        s.proxy = "http://proxy.local:3128".to_string();
    }
    buffer.push(heartbeat("/src/a.rs", 1_000_000));

    let CycleOutcome::Dispatched { process, .. } = cycle.run_once() else {
        panic!("expected a dispatch");
    };
    let pid = process.pid().to_string();
    process.wait();

    let run = read_recording(&record_dir, &pid);
    assert_eq!(
        run.args,
        vec![
            "--plugin",
            PLUGIN,
            "--entity",
            "/src/a.rs",
            "--time",
            "100.0000",
            "--verbose",
            "--proxy",
            "http://proxy.local:3128",
        ]
    );
    assert_eq!(run.stdin, "[]\n");
}

#[test]
fn test_scheduler_dispatches_on_first_firing() {
    let temp = TempDir::new().unwrap();
    let record_dir = temp.path().join("calls");
    std::fs::create_dir_all(&record_dir).unwrap();
    let binary = install_fake_reporter(temp.path(), &record_dir);

    let buffer = Arc::new(HeartbeatBuffer::new());
    buffer.push(heartbeat("/src/only.rs", 2_000_000));

    let cycle = DispatchCycle::new(
        buffer.clone(),
        CommandBuilder::new(&binary, PLUGIN),
        Arc::new(MemoryCredentialStore::new()),
        shared_settings(Settings::default()),
        create_shared_log(),
    );
    let mut scheduler = DispatchScheduler::start(cycle, Duration::from_secs(3600)).unwrap();

    let run = wait_for_run(&record_dir, Duration::from_secs(10));
    scheduler.stop();

    assert_eq!(run.args[3], "/src/only.rs");
    assert!(!run.args.contains(&"--extra-heartbeats".to_string()));
    assert_eq!(run.stdin, "[]\n");
}

fn zip_with_reporter(record_dir: &Path) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default().unix_permissions(0o644);
    writer.start_file("wakatime-cli-linux-amd64", options).unwrap();
    writer
        .write_all(reporter_script(record_dir).as_bytes())
        .unwrap();
    writer.finish().unwrap().into_inner()
}

#[test]
fn test_agent_provisions_then_forwards_editor_events() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let temp = TempDir::new().unwrap();
    let record_dir = temp.path().join("calls");
    std::fs::create_dir_all(&record_dir).unwrap();
    let install_dir = temp.path().join("wakatime");

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/wakatime/wakatime-cli/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tag_name": "v9.9.9" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(
                "/wakatime/wakatime-cli/releases/download/v9.9.9/wakatime-cli-linux-amd64.zip",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_with_reporter(&record_dir)))
            .mount(&server)
            .await;
        server
    });

    let options = AgentOptions {
        host: HostInfo::new("vim", "9.1"),
        plugin_version: "0.1.0".to_string(),
        settings: shared_settings(Settings::default()),
        credentials: Arc::new(MemoryCredentialStore::with_token(API_KEY_TOKEN, "waka_e2e")),
        release: ReleaseConfig::with_base(server.uri()),
        platform: Platform::new("linux", "amd64"),
        install_dir: install_dir.clone(),
        dispatch_interval: Duration::from_millis(100),
        log: create_shared_log(),
    };

    let agent = Agent::activate(options).unwrap();
    assert_eq!(
        agent.installation().binary_path,
        install_dir.join("wakatime-cli-linux-amd64")
    );

    agent.settings().write().unwrap().debug = true;

    let document_path = temp.path().join("main.rs");
    let producer = agent.producer();
    let queued = producer
        .on_event(&EditorEvent::Saved {
            document: Document::new(&document_path, "fn main() {}\n"),
        })
        .unwrap();
    assert!(queued);

    let run = wait_for_run(&record_dir, Duration::from_secs(10));
    let log = agent.log();
    agent.deactivate();

    assert_eq!(run.args[0], "--plugin");
    assert_eq!(run.args[1], PLUGIN);
    assert_eq!(run.args[3], document_path.to_string_lossy());
    assert!(run.args.contains(&"--write".to_string()));
    assert!(run.args.contains(&"waka_e2e".to_string()));
    assert!(run.args.contains(&"--verbose".to_string()));
    assert_eq!(log.stats().heartbeats_captured, 1);

    drop(server);
}
