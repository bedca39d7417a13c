#![allow(dead_code)]

use std::path::Path;
use std::time::{Duration, Instant};

use scriptpad::{Diagnostic, ParsedLine, RunEvent, RunHandle, RunnerConfig, parse_line};

/// Upper bound for anything a test waits on.
pub const TIMEOUT: Duration = Duration::from_secs(20);

/// Runner configuration executing scripts with `sh`, writing the script
/// inside `dir` so tests never share a script path.
pub fn sh_config(dir: &Path) -> RunnerConfig {
    RunnerConfig {
        interpreter: "sh".to_string(),
        script_flag: None,
        script_path: dir.join("script.kts"),
        poll_interval_ms: 5,
    }
}

pub fn diagnostic(line: &str) -> Diagnostic {
    match parse_line(line) {
        ParsedLine::Diagnostic(d) => d,
        ParsedLine::Unstructured(text) => panic!("not a diagnostic: {text}"),
    }
}

/// Everything a run reported, split by kind.
#[derive(Debug, Default)]
pub struct Collected {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exits: Vec<Option<i32>>,
    pub events: Vec<RunEvent>,
}

/// Drain `handle` until its channel closes, panicking after `TIMEOUT`.
pub fn collect(handle: &RunHandle) -> Collected {
    let deadline = Instant::now() + TIMEOUT;
    let mut collected = Collected::default();
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("run did not finish in time");
        match handle.recv_timeout(remaining) {
            Ok(event) => {
                match &event {
                    RunEvent::Stdout(line) => collected.stdout.push(line.clone()),
                    RunEvent::Stderr(line) => collected.stderr.push(line.clone()),
                    RunEvent::Exited { code } => collected.exits.push(*code),
                }
                collected.events.push(event);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return collected,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                panic!("run did not finish in time")
            }
        }
    }
}
