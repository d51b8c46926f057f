//! Tests for the execution supervisor

use super::*;
use crate::config::SessionConfig;
use crate::session::SessionState;
use crate::stats::StatsCollector;
use parking_lot::Mutex;
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    session: Arc<SandboxSession>,
    supervisor: ExecutionSupervisor,
    stats: SharedStats,
}

fn supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        grace_period: Duration::from_millis(200),
        ..SupervisorConfig::default()
    }
}

async fn fixture_with(supervisor: SupervisorConfig, session: SessionConfig) -> Fixture {
    let root = TempDir::new().unwrap();
    let session = SandboxSession::new(SessionConfig {
        root_dir: Some(root.path().to_path_buf()),
        ..session
    });
    session.initialize().await.unwrap();
    let stats = StatsCollector::shared();

    Fixture {
        _root: root,
        session,
        supervisor: ExecutionSupervisor::new(supervisor, Arc::clone(&stats)),
        stats,
    }
}

async fn fixture() -> Fixture {
    fixture_with(supervisor_config(), SessionConfig::default()).await
}

const LONG: Duration = Duration::from_secs(10);

async fn wait_for_active(session: &SandboxSession, count: usize) {
    for _ in 0..200 {
        if session.active_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} active executions, have {}", count, session.active_count());
}

#[test]
fn test_spawn_plan_direct() {
    let plan = SpawnPlan::parse("git commit -m 'first commit'").unwrap();
    assert_eq!(
        plan,
        SpawnPlan::Direct {
            program: "git".to_string(),
            args: vec!["commit".into(), "-m".into(), "first commit".into()],
        }
    );
    assert!(!plan.uses_shell());

    // Operators inside single quotes are data
    let plan = SpawnPlan::parse("sh -c 'echo $PORT; exit 3'").unwrap();
    assert!(!plan.uses_shell());
}

#[test]
fn test_spawn_plan_shell() {
    for command in [
        "ls | grep src",
        "npm install && npm test",
        "echo hi > out.txt",
        "ls *.json",
        "echo \"$HOME\"",
        "cat ~/notes",
    ] {
        assert!(
            SpawnPlan::parse(command).unwrap().uses_shell(),
            "{command} should need a shell"
        );
    }
    assert!(SpawnPlan::parse("   ").is_err());
}

#[test]
fn test_utf8_decoder_reassembles_split_sequences() {
    let bytes = "héllo ✓".as_bytes();
    let mut decoder = Utf8Decoder::default();

    let mut text = String::new();
    for byte in bytes {
        text.push_str(&decoder.decode(std::slice::from_ref(byte)));
    }
    text.push_str(&decoder.finish());
    assert_eq!(text, "héllo ✓");

    let mut decoder = Utf8Decoder::default();
    assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    assert_eq!(decoder.decode(b"\xe2\x9c"), "");
    assert_eq!(decoder.finish(), "\u{FFFD}");
}

#[test]
fn test_output_buffer_truncates_on_char_boundary() {
    let mut buffer = OutputBuffer::new(4);
    buffer.push("ab");
    buffer.push("cé");
    assert!(buffer.is_truncated());
    assert_eq!(buffer.as_str(), format!("abc{}", TRUNCATION_MARKER));

    buffer.push("more");
    assert_eq!(buffer.as_str(), format!("abc{}", TRUNCATION_MARKER));
}

#[test]
fn test_readiness_probe() {
    let ready = CancellationToken::new();
    let mut probe = ReadinessProbe::new(&["Ready in".to_string()], ready.clone());

    assert!(!probe.feed("VITE v5.0.0  "));
    assert!(!probe.feed("READY"));
    // Marker split across chunks, different case
    assert!(probe.feed(" IN 312 ms"));
    assert!(ready.is_cancelled());
    assert!(probe.feed("anything"));
}

#[test]
fn test_builtin_profiles() {
    let profiles = builtin_profiles();
    for name in ["react", "vite", "vue", "next", "angular", "svelte", "express", "static"] {
        let profile = profiles.get(name).unwrap();
        assert!(!profile.command.is_empty());
        assert!(!profile.ready_markers.is_empty());
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_success() {
    let fx = fixture().await;

    let outcome = fx
        .supervisor
        .execute(&fx.session, "echo hello", LONG, &ExecutionOptions::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome.stdout, "hello\n");
    assert_eq!(outcome.exit_code, 0);
    assert!(!outcome.command_id.is_empty());
    assert_eq!(fx.session.active_count(), 0);
    assert_eq!(fx.stats.active_timeouts(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_nonzero_exit() {
    let fx = fixture().await;

    let err = fx
        .supervisor
        .execute(
            &fx.session,
            "sh -c 'echo oops >&2; exit 3'",
            LONG,
            &ExecutionOptions::new(),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::Execution { .. }));
    assert_eq!(err.exit_code(), Some(3));
    assert_eq!(err.stderr(), Some("oops\n"));
    assert_eq!(fx.session.active_count(), 0);
    assert_eq!(fx.stats.active_timeouts(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_timeout() {
    let fx = fixture().await;
    let started = Instant::now();

    let err = fx
        .supervisor
        .execute(
            &fx.session,
            "sh -c 'echo partial; sleep 10'",
            Duration::from_millis(300),
            &ExecutionOptions::new(),
            None,
        )
        .await
        .unwrap_err();

    match &err {
        SandboxError::Timeout { stdout, elapsed_ms, .. } => {
            assert_eq!(stdout, "partial\n");
            assert!(*elapsed_ms >= 300);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(fx.stats.timeouts.get(), 1);
    assert_eq!(fx.stats.active_timeouts(), 0);
    assert_eq!(fx.session.active_count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_escalates_past_ignored_sigterm() {
    let fx = fixture().await;
    let started = Instant::now();

    let err = fx
        .supervisor
        .execute(
            &fx.session,
            "sh -c 'trap \"\" TERM; sleep 10'",
            Duration::from_millis(200),
            &ExecutionOptions::new(),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[tokio::test]
async fn test_spawn_failure() {
    let fx = fixture().await;

    let err = fx
        .supervisor
        .execute(
            &fx.session,
            "warden-no-such-binary --version",
            LONG,
            &ExecutionOptions::new(),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::Spawn { .. }));
    assert_eq!(fx.session.active_count(), 0);
    assert_eq!(fx.stats.active_timeouts(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_kill_process() {
    let fx = fixture().await;

    let session = Arc::clone(&fx.session);
    let supervisor = fx.supervisor.clone();
    let task = tokio::spawn(async move {
        supervisor
            .execute(&session, "sleep 10", LONG, &ExecutionOptions::new(), None)
            .await
    });

    wait_for_active(&fx.session, 1).await;
    let id = fx.session.records()[0].command_id.clone();

    let result = fx.supervisor.kill_process(&fx.session, &id);
    assert!(result.success);

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, SandboxError::Cancelled { .. }));
    assert_eq!(fx.session.active_count(), 0);
    assert_eq!(fx.stats.active_timeouts(), 0);

    // Idempotent: already gone
    let again = fx.supervisor.kill_process(&fx.session, &id);
    assert!(!again.success);
    assert!(again.error.is_some());
    assert!(!fx.supervisor.kill_process(&fx.session, "nope").success);
}

#[cfg(unix)]
#[tokio::test]
async fn test_port_and_env() {
    let fx = fixture_with(
        supervisor_config(),
        SessionConfig {
            base_port: 4100,
            ..SessionConfig::default()
        },
    )
    .await;

    let first = fx
        .supervisor
        .execute(&fx.session, "sh -c 'echo $PORT'", LONG, &ExecutionOptions::new(), None)
        .await
        .unwrap();
    let second = fx
        .supervisor
        .execute(&fx.session, "sh -c 'echo $PORT'", LONG, &ExecutionOptions::new(), None)
        .await
        .unwrap();
    assert_eq!(first.stdout, "4100\n");
    assert_eq!(second.stdout, "4101\n");

    let options = ExecutionOptions::new().with_env("GREETING", "hi there");
    let outcome = fx
        .supervisor
        .execute(&fx.session, "sh -c 'echo $GREETING'", LONG, &options, None)
        .await
        .unwrap();
    assert_eq!(outcome.stdout, "hi there\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_cwd_override_is_confined() {
    let fx = fixture().await;
    std::fs::create_dir(fx.session.working_dir().join("web")).unwrap();

    let outcome = fx
        .supervisor
        .execute(
            &fx.session,
            "pwd",
            LONG,
            &ExecutionOptions::new().with_cwd("web"),
            None,
        )
        .await
        .unwrap();
    assert!(outcome.stdout.trim_end().ends_with("/web"));

    for bad in ["../outside", "/tmp"] {
        let err = fx
            .supervisor
            .execute(
                &fx.session,
                "pwd",
                LONG,
                &ExecutionOptions::new().with_cwd(bad),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::InvalidOptions(_)), "{bad}");
    }
    assert_eq!(fx.session.active_count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_observer_and_shell_plan() {
    let fx = fixture().await;
    let chunks = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&chunks);
    let observer: OutputObserver = Arc::new(move |chunk: OutputChunk| sink.lock().push(chunk));

    let outcome = fx
        .supervisor
        .execute(
            &fx.session,
            "echo one && echo two",
            LONG,
            &ExecutionOptions::new(),
            Some(observer),
        )
        .await
        .unwrap();
    assert_eq!(outcome.stdout, "one\ntwo\n");

    let streamed: String = chunks
        .lock()
        .iter()
        .filter(|c| c.stream == OutputStream::Stdout)
        .map(|c| c.text.as_str())
        .collect();
    assert_eq!(streamed, "one\ntwo\n");
    assert!(chunks.lock().iter().all(|c| c.command_id == outcome.command_id));
}

#[cfg(unix)]
#[tokio::test]
async fn test_output_cap() {
    let fx = fixture_with(
        SupervisorConfig {
            max_output_bytes: 16,
            ..supervisor_config()
        },
        SessionConfig::default(),
    )
    .await;

    let outcome = fx
        .supervisor
        .execute(
            &fx.session,
            "sh -c 'yes | head -c 1000'",
            LONG,
            &ExecutionOptions::new(),
            None,
        )
        .await
        .unwrap();
    assert!(outcome.stdout.ends_with(TRUNCATION_MARKER));
    assert_eq!(outcome.stdout.len(), 16 + TRUNCATION_MARKER.len());
}

#[cfg(unix)]
#[tokio::test]
async fn test_concurrency_slots() {
    let fx = fixture_with(
        supervisor_config(),
        SessionConfig {
            max_concurrent: 1,
            ..SessionConfig::default()
        },
    )
    .await;
    let started = Instant::now();

    let options = ExecutionOptions::new();
    let (a, b) = tokio::join!(
        fx.supervisor
            .execute(&fx.session, "sleep 0.3", LONG, &options, None),
        fx.supervisor
            .execute(&fx.session, "sleep 0.3", LONG, &options, None),
    );
    assert!(a.is_ok() && b.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(600));
}

#[cfg(unix)]
#[tokio::test]
async fn test_session_must_be_ready() {
    let root = TempDir::new().unwrap();
    let session = SandboxSession::new(SessionConfig {
        root_dir: Some(root.path().to_path_buf()),
        ..SessionConfig::default()
    });
    let supervisor = ExecutionSupervisor::new(supervisor_config(), StatsCollector::shared());

    let err = supervisor
        .execute(&session, "echo hi", LONG, &ExecutionOptions::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::SessionNotReady { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dev_server_lifecycle() {
    let fx = fixture().await;
    let profile = FrameworkProfile::new(
        "sh -c 'echo Server Listening on port $PORT; sleep 30'",
        &["listening on"],
    );

    let handle = fx
        .supervisor
        .start_server(&fx.session, &profile.command, &profile, LONG, "localhost", None)
        .await
        .unwrap();

    assert_eq!(handle.url, format!("http://localhost:{}", handle.port));
    assert_eq!(fx.session.active_count(), 1);
    assert_eq!(fx.session.ports().get(&handle.command_id), Some(&handle.port));
    assert_eq!(fx.stats.active_timeouts(), 0);

    fx.supervisor
        .stop_server(&fx.session, &handle.command_id)
        .await
        .unwrap();
    assert_eq!(fx.session.active_count(), 0);
    assert!(fx.session.ports().is_empty());

    let err = fx
        .supervisor
        .stop_server(&fx.session, &handle.command_id)
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::UnknownExecution(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dev_server_startup_timeout() {
    let fx = fixture().await;
    let profile = FrameworkProfile::new("sleep 30", &["ready"]);

    let err = fx
        .supervisor
        .start_server(
            &fx.session,
            &profile.command,
            &profile,
            Duration::from_millis(300),
            "localhost",
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::Timeout { .. }));
    assert_eq!(fx.session.active_count(), 0);
    assert_eq!(fx.stats.timeouts.get(), 1);
    assert_eq!(fx.stats.active_timeouts(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_dev_server_exits_before_ready() {
    let fx = fixture().await;
    let profile = FrameworkProfile::new("sh -c 'echo boom >&2; exit 1'", &["ready"]);

    let err = fx
        .supervisor
        .start_server(&fx.session, &profile.command, &profile, LONG, "localhost", None)
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::Execution { .. }));
    assert_eq!(err.stderr(), Some("boom\n"));
    assert_eq!(fx.session.active_count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_cleanup_stops_everything() {
    let fx = fixture().await;
    let working_dir = fx.session.working_dir().to_path_buf();
    let profile = FrameworkProfile::new("sh -c 'echo ready; sleep 30'", &["ready"]);
    fx.supervisor
        .start_server(&fx.session, &profile.command, &profile, LONG, "localhost", None)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let session = Arc::clone(&fx.session);
        let supervisor = fx.supervisor.clone();
        tasks.push(tokio::spawn(async move {
            supervisor
                .execute(&session, "sleep 30", LONG, &ExecutionOptions::new(), None)
                .await
        }));
    }
    wait_for_active(&fx.session, 3).await;

    let report = fx.session.cleanup().await;
    assert_eq!(report.cancelled, 3);
    assert_eq!(report.forced, 0);
    assert!(report.directory_removed);
    assert!(!working_dir.exists());
    assert_eq!(fx.session.active_count(), 0);
    assert_eq!(fx.session.state(), SessionState::Closed);

    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SandboxError::Cancelled { .. }));
    }
    assert_eq!(fx.stats.active_timeouts(), 0);

    // Second cleanup is a no-op
    assert_eq!(fx.session.cleanup().await, crate::session::CleanupReport::default());

    let err = fx
        .supervisor
        .execute(&fx.session, "echo late", LONG, &ExecutionOptions::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::SessionNotReady { .. }));
}
