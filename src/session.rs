//! Run session coordination.
//!
//! A [`RunCoordinator`] owns at most one current [`RunSession`]. Starting
//! a run supersedes the previous one: its interpreter is killed and any
//! event it still produces is dropped, because every event is tagged
//! with the id of the session that spawned it and only the current id
//! may mutate state. All mutations go through one mutex, so the output
//! document grows in the order events arrive.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::diagnostic::{Diagnostic, ParsedLine, parse_line};
use crate::highlight::{Color, Palette, push_colored};
use crate::runner::{RunEvent, RunHandle, RunKiller, ScriptRunner, lock};

/// Identifies one run. Ids increase monotonically per coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has been run yet.
    Idle,
    Running,
    /// The interpreter exited. `code` is `None` when it was killed.
    Completed { code: Option<i32> },
    /// The interpreter never started; no exit code exists.
    Failed { reason: String },
}

impl RunState {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the run is over, successfully or not.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// One entry of the output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEntry {
    /// Standard output line, shown with success styling.
    Stdout(String),
    /// Standard error line after diagnostic recognition.
    Stderr(ParsedLine),
}

impl OutputEntry {
    /// The diagnostic carried by this entry, if any. Activating it is a
    /// matter of resolving [`Diagnostic::cursor_request`] against the
    /// current buffer.
    #[must_use]
    pub const fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Stderr(parsed) => parsed.as_diagnostic(),
            Self::Stdout(_) => None,
        }
    }

    /// Base color of the entry.
    #[must_use]
    pub const fn color(&self, palette: &Palette) -> Color {
        match self {
            Self::Stdout(_) => palette.stdout,
            Self::Stderr(_) => palette.stderr,
        }
    }

    /// The entry for a terminal, diagnostic locations in the location
    /// color. No trailing newline.
    #[must_use]
    pub fn render_ansi(&self, palette: &Palette) -> String {
        let mut out = String::new();
        match self {
            Self::Stdout(text) => push_colored(&mut out, text, palette.stdout),
            Self::Stderr(ParsedLine::Unstructured(text)) => {
                push_colored(&mut out, text, palette.stderr);
            }
            Self::Stderr(ParsedLine::Diagnostic(diagnostic)) => {
                push_colored(&mut out, &diagnostic.prefix, palette.stderr);
                push_colored(&mut out, &diagnostic.location(), palette.location);
                push_colored(&mut out, &format!(":{}", diagnostic.message), palette.stderr);
            }
        }
        out
    }
}

impl fmt::Display for OutputEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout(text) => f.write_str(text),
            Self::Stderr(parsed) => fmt::Display::fmt(parsed, f),
        }
    }
}

/// One execution of the script buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSession {
    pub id: SessionId,
    /// The buffer as it was when the run started.
    pub script: String,
    pub state: RunState,
    pub output: Vec<OutputEntry>,
}

impl RunSession {
    /// Diagnostics in output order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.output.iter().filter_map(OutputEntry::diagnostic)
    }
}

/// Change notification for subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A session entered a new state.
    State { id: SessionId, state: RunState },
    /// An entry was appended to the current session's output.
    Output { id: SessionId, entry: OutputEntry },
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    session: Option<RunSession>,
    killer: Option<RunKiller>,
    last_exit_code: Option<i32>,
    subscribers: Vec<Sender<SessionUpdate>>,
}

impl Inner {
    fn current(&mut self, id: SessionId) -> Option<&mut RunSession> {
        self.session
            .as_mut()
            .filter(|session| session.id == id && session.state.is_running())
    }

    fn publish(&mut self, update: &SessionUpdate) {
        self.subscribers
            .retain(|subscriber| subscriber.send(update.clone()).is_ok());
    }

    fn set_state(&mut self, id: SessionId, state: RunState) {
        if let Some(session) = self.session.as_mut().filter(|s| s.id == id) {
            session.state = state.clone();
        }
        self.publish(&SessionUpdate::State { id, state });
    }

    /// Apply an event from the run `id`. Returns `false` when the event
    /// is stale and was dropped.
    fn apply(&mut self, id: SessionId, event: Event) -> bool {
        let Some(session) = self.current(id) else {
            return false;
        };

        match event {
            Event::Output(entry) => {
                session.output.push(entry.clone());
                self.publish(&SessionUpdate::Output { id, entry });
            }
            Event::Exited(code) => {
                self.killer = None;
                self.last_exit_code = code;
                self.set_state(id, RunState::Completed { code });
            }
        }
        true
    }
}

/// A runner event translated for the output document.
enum Event {
    Output(OutputEntry),
    Exited(Option<i32>),
}

impl From<RunEvent> for Event {
    fn from(event: RunEvent) -> Self {
        match event {
            RunEvent::Stdout(text) => Self::Output(OutputEntry::Stdout(text)),
            RunEvent::Stderr(text) => Self::Output(OutputEntry::Stderr(parse_line(&text))),
            RunEvent::Exited { code } => Self::Exited(code),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }
}

/// Serializes run requests and collects their output.
#[derive(Debug)]
pub struct RunCoordinator {
    runner: ScriptRunner,
    shared: Arc<Shared>,
}

impl RunCoordinator {
    #[must_use]
    pub fn new(runner: ScriptRunner) -> Self {
        Self {
            runner,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Start running `script`, superseding any run in progress.
    ///
    /// Never fails: a script that cannot be started produces a session in
    /// [`RunState::Failed`].
    pub fn run(&self, script: impl Into<String>) -> SessionId {
        let script = script.into();
        let mut inner = self.shared.lock();

        if let Some(killer) = inner.killer.take() {
            if let Err(err) = killer.kill() {
                warn!(target: "scriptpad::session", error = %err, "kill_superseded_failed");
            }
        }
        if let Some(old) = inner.session.as_ref().filter(|s| s.state.is_running()) {
            info!(target: "scriptpad::session", superseded = %old.id, "superseded");
        }

        inner.next_id += 1;
        let id = SessionId(inner.next_id);

        // spawning under the lock keeps the shared script path single-flight,
        // and the pump cannot apply events before the session is in place
        let started = self.runner.run(&script);
        inner.session = Some(RunSession {
            id,
            script,
            state: RunState::Running,
            output: Vec::new(),
        });
        inner.publish(&SessionUpdate::State {
            id,
            state: RunState::Running,
        });
        // wake waiters of the superseded session
        self.shared.changed.notify_all();

        match started {
            Ok(handle) => {
                info!(target: "scriptpad::session", %id, pid = handle.pid(), "started");
                let killer = handle.killer();
                match self.spawn_pump(id, handle) {
                    Ok(()) => inner.killer = Some(killer),
                    Err(err) => {
                        let _ = killer.kill();
                        self.fail(&mut inner, id, format!("cannot start output pump: {err}"));
                    }
                }
            }
            Err(err) => self.fail(&mut inner, id, err.to_string()),
        }

        id
    }

    fn fail(&self, inner: &mut Inner, id: SessionId, reason: String) {
        warn!(target: "scriptpad::session", %id, %reason, "failed");
        inner.set_state(id, RunState::Failed { reason });
        self.shared.changed.notify_all();
    }

    fn spawn_pump(&self, id: SessionId, handle: RunHandle) -> std::io::Result<()> {
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("scriptpad-session-{}", id.get()))
            .spawn(move || pump(&shared, id, &handle))
            .map(drop)
    }

    /// Terminate the current run, if any. Its session completes without
    /// an exit code.
    pub fn cancel(&self) {
        let inner = self.shared.lock();
        if let Some(killer) = &inner.killer {
            if let Err(err) = killer.kill() {
                warn!(target: "scriptpad::session", error = %err, "cancel_failed");
            }
        }
    }

    /// Receive every future state change and output append.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<SessionUpdate> {
        let (tx, rx) = mpsc::channel();
        self.shared.lock().subscribers.push(tx);
        rx
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Option<RunSession> {
        self.shared.lock().session.clone()
    }

    /// State of the current session; `Idle` before the first run.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.shared
            .lock()
            .session
            .as_ref()
            .map_or(RunState::Idle, |s| s.state.clone())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Exit code of the most recent run that exited, kept across runs.
    #[must_use]
    pub fn last_exit_code(&self) -> Option<i32> {
        self.shared.lock().last_exit_code
    }

    /// Block until session `id` is finished or superseded. Returns its
    /// final snapshot, or `None` if another run replaced it.
    #[must_use]
    pub fn wait(&self, id: SessionId) -> Option<RunSession> {
        let inner = self
            .shared
            .changed
            .wait_while(self.shared.lock(), |inner| is_pending(inner, id))
            .unwrap_or_else(PoisonError::into_inner);
        finished(&inner, id)
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning
    /// `None` if the session is still running.
    #[must_use]
    pub fn wait_timeout(&self, id: SessionId, timeout: Duration) -> Option<RunSession> {
        let (inner, _) = self
            .shared
            .changed
            .wait_timeout_while(self.shared.lock(), timeout, |inner| is_pending(inner, id))
            .unwrap_or_else(PoisonError::into_inner);
        finished(&inner, id)
    }
}

impl Default for RunCoordinator {
    fn default() -> Self {
        Self::new(ScriptRunner::default())
    }
}

impl Drop for RunCoordinator {
    fn drop(&mut self) {
        if let Some(killer) = self.shared.lock().killer.take() {
            let _ = killer.kill();
        }
    }
}

fn is_pending(inner: &Inner, id: SessionId) -> bool {
    inner
        .session
        .as_ref()
        .is_some_and(|s| s.id == id && s.state.is_running())
}

fn finished(inner: &Inner, id: SessionId) -> Option<RunSession> {
    inner
        .session
        .as_ref()
        .filter(|s| s.id == id && s.state.is_finished())
        .cloned()
}

fn pump(shared: &Shared, id: SessionId, handle: &RunHandle) {
    let mut dropped = 0usize;
    for event in handle.events() {
        let event = Event::from(event);
        let exited = matches!(event, Event::Exited(_));
        let mut inner = shared.lock();
        if inner.apply(id, event) {
            if exited {
                info!(target: "scriptpad::session", %id, code = ?inner.last_exit_code, "completed");
                shared.changed.notify_all();
            }
        } else {
            dropped += 1;
            trace!(target: "scriptpad::session", %id, "stale_event");
        }
    }
    if dropped > 0 {
        debug!(target: "scriptpad::session", %id, dropped, "stale_events_dropped");
    }
}
