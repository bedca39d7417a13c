//! Runs the script buffer through an external interpreter.
//!
//! Each run writes the script to a fixed path, spawns the interpreter
//! and starts three threads: one reader per output stream and a waiter
//! that joins both readers before reporting the exit status. All three
//! feed one channel, so a [`RunHandle`] sees every line of a stream in
//! order and [`RunEvent::Exited`] strictly last.
//!
//! On unix the interpreter leads its own process group. Killing a run
//! signals the whole group, so processes the interpreter started die
//! with it and release the output pipes.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, trace, warn};

use crate::lines::LineBuffer;

const READ_CHUNK: usize = 8 * 1024;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Something that happened to a running script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A complete line on standard output.
    Stdout(String),
    /// A complete line on standard error.
    Stderr(String),
    /// The interpreter terminated and both streams are drained. `code`
    /// is `None` when the process was killed by a signal or its status
    /// could not be collected. Always the last event of a run.
    Exited { code: Option<i32> },
}

impl RunEvent {
    #[must_use]
    pub const fn line(stream: Stream, text: String) -> Self {
        match stream {
            Stream::Stdout => Self::Stdout(text),
            Stream::Stderr => Self::Stderr(text),
        }
    }
}

/// Failure to start a run. Distinct from the script exiting with a
/// nonzero code, which is reported through [`RunEvent::Exited`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The script could not be written to its temporary path.
    #[error("cannot write script to {}: {source}", path.display())]
    WriteScript { path: PathBuf, source: io::Error },
    /// The interpreter could not be started (missing, not executable).
    #[error("cannot start {program}: {source}")]
    Spawn { program: String, source: io::Error },
    /// The interpreter started without a pipe for `stream`.
    #[error("interpreter has no {0} pipe")]
    MissingPipe(Stream),
    /// A reader or waiter thread could not be started.
    #[error("cannot start {name} thread: {source}")]
    Thread { name: &'static str, source: io::Error },
}

/// How scripts are executed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interpreter binary, looked up on `PATH` when not absolute.
    pub interpreter: String,
    /// Flag placed before the script path, `-script` for `kotlinc`.
    pub script_flag: Option<String>,
    /// Where the buffer is written before each run; overwritten every time.
    pub script_path: PathBuf,
    /// How often the waiter polls for exit once both streams closed.
    pub poll_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: "kotlinc".to_string(),
            script_flag: Some("-script".to_string()),
            script_path: std::env::temp_dir().join("scriptpad").join("script.kts"),
            poll_interval_ms: 10,
        }
    }
}

/// Spawns script runs according to a [`RunnerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    config: RunnerConfig,
}

impl ScriptRunner {
    #[must_use]
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Write `script` to the script path and start the interpreter on it.
    ///
    /// Returns once the process is running; no output has been read yet.
    ///
    /// # Errors
    ///
    /// Returns `RunError` if the script cannot be written or the
    /// interpreter cannot be started. Nothing is left running in that
    /// case.
    pub fn run(&self, script: &str) -> Result<RunHandle, RunError> {
        let path = &self.config.script_path;
        write_script(path, script).map_err(|source| RunError::WriteScript {
            path: path.clone(),
            source,
        })?;

        let mut command = Command::new(&self.config.interpreter);
        if let Some(flag) = &self.config.script_flag {
            command.arg(flag);
        }
        command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| {
            warn!(
                target: "scriptpad::runner",
                program = %self.config.interpreter,
                error = %source,
                "spawn_failed"
            );
            RunError::Spawn {
                program: self.config.interpreter.clone(),
                source,
            }
        })?;
        let pid = child.id();
        info!(
            target: "scriptpad::runner",
            pid,
            program = %self.config.interpreter,
            script = %path.display(),
            "spawned"
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let process = Arc::new(Mutex::new(Process {
            child,
            reaped: false,
        }));

        start_threads(&process, stdout, stderr, self.poll_interval())
            .map(|events| RunHandle {
                events,
                process: Arc::clone(&process),
                pid,
            })
            .inspect_err(|_| {
                let mut process = lock(&process);
                let _ = process.terminate();
                let _ = process.child.wait();
            })
    }

    const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }
}

fn write_script(path: &Path, script: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, script)
}

/// The interpreter process, shared by the waiter and any killers.
#[derive(Debug)]
struct Process {
    child: Child,
    /// Set once the waiter collected the exit status. The pid may be
    /// reused by the OS from then on and must not be signalled.
    reaped: bool,
}

impl Process {
    fn terminate(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }
        #[cfg(unix)]
        {
            kill_group(self.child.id())
        }
        #[cfg(not(unix))]
        {
            match self.child.kill() {
                Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
                other => other,
            }
        }
    }
}

/// SIGKILL every process in the group led by `pid`. A group that is
/// already gone counts as killed.
#[cfg(unix)]
fn kill_group(pid: u32) -> io::Result<()> {
    let pgid =
        libc::pid_t::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: killpg only takes plain integers.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

fn start_threads(
    process: &Arc<Mutex<Process>>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    poll: Duration,
) -> Result<Receiver<RunEvent>, RunError> {
    let stdout = stdout.ok_or(RunError::MissingPipe(Stream::Stdout))?;
    let stderr = stderr.ok_or(RunError::MissingPipe(Stream::Stderr))?;

    let (tx, rx) = mpsc::channel();
    let readers = [
        spawn_reader(Stream::Stdout, stdout, tx.clone())?,
        spawn_reader(Stream::Stderr, stderr, tx.clone())?,
    ];

    let process = Arc::clone(process);
    thread::Builder::new()
        .name("scriptpad-waiter".to_string())
        .spawn(move || wait_for_exit(&process, readers, poll, &tx))
        .map_err(|source| RunError::Thread {
            name: "waiter",
            source,
        })?;

    Ok(rx)
}

fn spawn_reader(
    stream: Stream,
    pipe: impl Read + Send + 'static,
    tx: Sender<RunEvent>,
) -> Result<JoinHandle<()>, RunError> {
    let name = match stream {
        Stream::Stdout => "stdout reader",
        Stream::Stderr => "stderr reader",
    };
    thread::Builder::new()
        .name(format!("scriptpad-{stream}"))
        .spawn(move || read_lines(stream, pipe, &tx))
        .map_err(|source| RunError::Thread { name, source })
}

/// Forward every line of `pipe` until end of stream. Keeps draining when
/// nobody listens anymore so the script never blocks on a full pipe.
fn read_lines(stream: Stream, mut pipe: impl Read, tx: &Sender<RunEvent>) {
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut count = 0usize;

    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    trace!(target: "scriptpad::runner", %stream, %line, "line");
                    count += 1;
                    let _ = tx.send(RunEvent::line(stream, line));
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(target: "scriptpad::runner", %stream, error = %err, "read_failed");
                break;
            }
        }
    }

    if let Some(line) = buffer.finish() {
        count += 1;
        let _ = tx.send(RunEvent::line(stream, line));
    }
    debug!(target: "scriptpad::runner", %stream, lines = count, "stream_drained");
}

fn wait_for_exit(
    process: &Mutex<Process>,
    readers: [JoinHandle<()>; 2],
    poll: Duration,
    tx: &Sender<RunEvent>,
) {
    for reader in readers {
        if reader.join().is_err() {
            warn!(target: "scriptpad::runner", "reader_panicked");
        }
    }

    // poll instead of a blocking wait so `kill` can take the lock
    let code = loop {
        let polled = {
            let mut process = lock(process);
            let polled = process.child.try_wait();
            process.reaped = !matches!(polled, Ok(None));
            polled
        };
        match polled {
            Ok(Some(status)) => break status.code(),
            Ok(None) => thread::sleep(poll),
            Err(err) => {
                warn!(target: "scriptpad::runner", error = %err, "wait_failed");
                break None;
            }
        }
    };

    info!(target: "scriptpad::runner", ?code, "exited");
    let _ = tx.send(RunEvent::Exited { code });
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A started run.
///
/// Events are buffered in a channel until read, so nothing is lost
/// between [`ScriptRunner::run`] returning and the first receive.
#[derive(Debug)]
pub struct RunHandle {
    events: Receiver<RunEvent>,
    process: Arc<Mutex<Process>>,
    pid: u32,
}

impl RunHandle {
    /// OS process id of the interpreter.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Block for the next event. `None` once [`RunEvent::Exited`] has
    /// been delivered.
    #[must_use]
    pub fn recv(&self) -> Option<RunEvent> {
        self.events.recv().ok()
    }

    /// Like [`recv`](Self::recv) with an upper bound on the wait.
    ///
    /// # Errors
    ///
    /// `RecvTimeoutError::Timeout` if nothing arrived in time,
    /// `RecvTimeoutError::Disconnected` after the run finished.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RunEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Blocking iterator over the remaining events, ending after
    /// [`RunEvent::Exited`].
    pub fn events(&self) -> impl Iterator<Item = RunEvent> + '_ {
        self.events.iter()
    }

    /// A handle that can terminate this run from another thread.
    #[must_use]
    pub fn killer(&self) -> RunKiller {
        RunKiller {
            process: Arc::clone(&self.process),
            pid: self.pid,
        }
    }

    /// Terminate the interpreter and every process it started. Harmless
    /// if the run already finished.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the signal could not be delivered.
    pub fn kill(&self) -> io::Result<()> {
        self.killer().kill()
    }
}

/// Terminates a run without owning its event stream.
#[derive(Debug, Clone)]
pub struct RunKiller {
    process: Arc<Mutex<Process>>,
    pid: u32,
}

impl RunKiller {
    /// Terminate the interpreter and every process it started. Harmless
    /// if the run already finished.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the signal could not be delivered.
    pub fn kill(&self) -> io::Result<()> {
        debug!(target: "scriptpad::runner", pid = self.pid, "kill");
        lock(&self.process).terminate()
    }
}
