//! Process runner behaviour against a real `sh`.
#![cfg(unix)]

mod common;

use std::fs;
use std::time::Duration;

use common::{collect, sh_config};
use scriptpad::{RunError, RunEvent, RunnerConfig, ScriptRunner};

#[test]
fn run_reports_both_streams_then_exit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ScriptRunner::new(sh_config(dir.path()));
    let handle = runner
        .run("echo out\necho err >&2\nexit 2\n")
        .expect("run");

    let collected = collect(&handle);
    assert_eq!(collected.stdout, vec!["out"]);
    assert_eq!(collected.stderr, vec!["err"]);
    assert_eq!(collected.exits, vec![Some(2)]);
    assert_eq!(
        collected.events.last(),
        Some(&RunEvent::Exited { code: Some(2) })
    );
    assert_eq!(handle.recv(), None);
}

#[test]
fn run_zero_exit_without_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("true\n")
        .expect("run");
    let collected = collect(&handle);
    assert!(collected.stdout.is_empty());
    assert!(collected.stderr.is_empty());
    assert_eq!(collected.exits, vec![Some(0)]);
}

#[test]
fn run_keeps_stream_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = "i=1\nwhile [ $i -le 300 ]; do echo $i; echo e$i >&2; i=$((i+1)); done\n";
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run(script)
        .expect("run");

    let collected = collect(&handle);
    let expected: Vec<String> = (1..=300).map(|i| i.to_string()).collect();
    let expected_err: Vec<String> = (1..=300).map(|i| format!("e{i}")).collect();
    assert_eq!(collected.stdout, expected);
    assert_eq!(collected.stderr, expected_err);
}

#[test]
fn run_delivers_unterminated_last_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("printf 'first\\nlast'\n")
        .expect("run");
    assert_eq!(collect(&handle).stdout, vec!["first", "last"]);
}

#[test]
fn run_strips_crlf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("printf 'a\\r\\nb\\n' >&2\n")
        .expect("run");
    assert_eq!(collect(&handle).stderr, vec!["a", "b"]);
}

#[test]
fn run_overwrites_script_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = sh_config(dir.path());
    let runner = ScriptRunner::new(config.clone());

    collect(&runner.run("echo one\n").expect("first run"));
    let second = collect(&runner.run("echo two\n").expect("second run"));

    assert_eq!(second.stdout, vec!["two"]);
    assert_eq!(
        fs::read_to_string(&config.script_path).expect("script"),
        "echo two\n"
    );
}

#[test]
fn run_creates_script_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = sh_config(dir.path());
    config.script_path = dir.path().join("nested").join("deeper").join("script.kts");
    let handle = ScriptRunner::new(config).run("echo ok\n").expect("run");
    assert_eq!(collect(&handle).stdout, vec!["ok"]);
}

#[test]
fn run_passes_script_flag() {
    let dir = tempfile::tempdir().expect("tempdir");
    // `sh -e script` is a stand-in for `kotlinc -script script`
    let config = RunnerConfig {
        script_flag: Some("-e".to_string()),
        ..sh_config(dir.path())
    };
    let handle = ScriptRunner::new(config)
        .run("false\necho unreachable\n")
        .expect("run");
    let collected = collect(&handle);
    assert!(collected.stdout.is_empty());
    assert_eq!(collected.exits, vec![Some(1)]);
}

#[test]
fn spawn_failure_is_an_error_not_an_exit_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = RunnerConfig {
        interpreter: "/nonexistent/scriptpad-interpreter".to_string(),
        ..sh_config(dir.path())
    };
    let err = ScriptRunner::new(config).run("echo hi\n").unwrap_err();
    assert!(matches!(err, RunError::Spawn { .. }));
    assert!(err.to_string().contains("/nonexistent/scriptpad-interpreter"));
}

#[test]
fn unwritable_script_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("file");
    fs::write(&blocker, "").expect("write");
    let config = RunnerConfig {
        script_path: blocker.join("script.kts"),
        ..sh_config(dir.path())
    };
    let err = ScriptRunner::new(config).run("echo hi\n").unwrap_err();
    assert!(matches!(err, RunError::WriteScript { .. }));
}

#[test]
fn kill_ends_run_without_exit_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("echo started\nexec sleep 30\n")
        .expect("run");

    assert_eq!(
        handle.recv_timeout(common::TIMEOUT),
        Ok(RunEvent::Stdout("started".to_string()))
    );
    handle.kill().expect("kill");

    let collected = collect(&handle);
    assert_eq!(collected.exits, vec![None]);
}

#[test]
fn kill_reaches_processes_started_by_the_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("echo started\nsleep 30\necho after\n")
        .expect("run");

    assert_eq!(
        handle.recv_timeout(common::TIMEOUT),
        Ok(RunEvent::Stdout("started".to_string()))
    );
    let started = std::time::Instant::now();
    handle.kill().expect("kill");

    let collected = collect(&handle);
    assert_eq!(collected.exits, vec![None]);
    assert!(collected.stdout.is_empty());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn kill_reaches_background_jobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("sleep 30 &\nsleep 30 &\necho started\nwait\n")
        .expect("run");

    assert_eq!(
        handle.recv_timeout(common::TIMEOUT),
        Ok(RunEvent::Stdout("started".to_string()))
    );
    handle.kill().expect("kill");

    // both sleeps hold the output pipes; the run only ends once they die
    assert_eq!(collect(&handle).exits, vec![None]);
}

#[test]
fn kill_after_exit_is_harmless() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("exit 0\n")
        .expect("run");
    let killer = handle.killer();
    collect(&handle);
    killer.kill().expect("kill after exit");
}

#[test]
fn events_are_buffered_until_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = ScriptRunner::new(sh_config(dir.path()))
        .run("echo early\n")
        .expect("run");
    std::thread::sleep(Duration::from_millis(200));
    let events: Vec<RunEvent> = handle.events().collect();
    assert_eq!(
        events,
        vec![
            RunEvent::Stdout("early".to_string()),
            RunEvent::Exited { code: Some(0) },
        ]
    );
}
