//! Core of an interactive script editor.
//!
//! Lexical highlighting of the script buffer, execution of the buffer
//! through an external interpreter with both output streams read live,
//! and recognition of compiler diagnostics in that output so they can
//! be turned into cursor jumps.
//!
//! # Quick start
//!
//! ## Highlight a buffer
//!
//! ```
//! use scriptpad::{Color, Highlighter, TokenClass, tokenize};
//!
//! let tokens = tokenize("val x = 1;");
//! assert_eq!(tokens[0].class, TokenClass::Keyword);
//!
//! let spans = Highlighter::default().highlight("val x = 1;");
//! assert_eq!(spans[0].color, Color::Blue);
//! ```
//!
//! ## Recognize a diagnostic and jump to it
//!
//! ```
//! use scriptpad::{ParsedLine, parse_line, to_offset_clamped};
//!
//! let script = "val a = 1\nval b = c\n";
//! let ParsedLine::Diagnostic(d) = parse_line("error: script.kts:2:9: unresolved reference: c")
//! else {
//!     panic!("expected a diagnostic");
//! };
//! assert_eq!(d.cursor_request().resolve(script), 18);
//! assert_eq!(to_offset_clamped(script, 2, 9), 18);
//! ```
//!
//! ## Run a script
//!
//! ```no_run
//! use scriptpad::{RunCoordinator, ScriptRunner, RunnerConfig};
//!
//! let coordinator = RunCoordinator::new(ScriptRunner::new(RunnerConfig::default()));
//! let id = coordinator.run("println(\"hi\")");
//! let session = coordinator.wait(id).expect("not superseded");
//! for entry in &session.output {
//!     println!("{entry}");
//! }
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod config;
pub mod diagnostic;
pub mod editor;
pub mod highlight;
pub mod lexer;
pub mod lines;
pub mod offset;
pub mod runner;
pub mod session;
pub mod token;

pub use config::{Config, ConfigError};
pub use diagnostic::{CursorRequest, Diagnostic, ParsedLine, parse_line};
pub use editor::{SAMPLE_SCRIPT, ScriptEditor};
pub use highlight::{Color, HighlightConfig, Highlighter, Palette, StyledSpan, render_ansi};
pub use lexer::{DEFAULT_KEYWORDS, Tokenizer, tokenize};
pub use lines::LineBuffer;
pub use offset::{OffsetError, OffsetErrorKind, to_offset, to_offset_clamped, to_position};
pub use runner::{RunError, RunEvent, RunHandle, RunKiller, RunnerConfig, ScriptRunner, Stream};
pub use session::{OutputEntry, RunCoordinator, RunSession, RunState, SessionId, SessionUpdate};
pub use token::{Token, TokenClass};

/// Unified error type for loading the inputs of an editing session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),
    /// A script file could not be read.
    #[error("{}: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
