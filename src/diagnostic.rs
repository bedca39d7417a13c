//! Recognizes compiler diagnostics in script output.
//!
//! A diagnostic line has the shape
//! `<prefix><name>.kts:<line>:<column>:<message>` where `<name>` is made
//! of ASCII letters, digits, `_` and `-`. Everything else is kept as
//! plain text.

use std::fmt;

use crate::offset::{self, OffsetError};

const SCRIPT_EXTENSION: &str = ".kts";

/// A compiler or interpreter diagnostic pointing into the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Text before the file name, e.g. `"error: "`. May be empty.
    pub prefix: String,
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// Everything after the third colon, unparsed.
    pub message: String,
}

impl Diagnostic {
    /// The `file:line:column` fragment shown as a link.
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }

    /// Cursor request issued when the user activates this diagnostic.
    #[must_use]
    pub const fn cursor_request(&self) -> CursorRequest {
        CursorRequest {
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for Diagnostic {
    /// Reproduces the output line the diagnostic was parsed from.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", self.prefix, self.location(), self.message)
    }
}

/// Request to move the editor cursor to a 1-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRequest {
    pub line: u32,
    pub column: u32,
}

impl CursorRequest {
    /// Byte offset in `source`, failing if the position no longer exists
    /// (the buffer may have been edited since the run started).
    ///
    /// # Errors
    ///
    /// Returns `OffsetError` when the position is outside `source`.
    pub fn try_resolve(self, source: &str) -> Result<usize, OffsetError> {
        offset::to_offset(source, self.line as usize, self.column as usize)
    }

    /// Byte offset in `source`, clamped into the buffer.
    #[must_use]
    pub fn resolve(self, source: &str) -> usize {
        offset::to_offset_clamped(source, self.line as usize, self.column as usize)
    }
}

/// One line of script output after diagnostic recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Diagnostic(Diagnostic),
    /// A line that does not have the diagnostic shape, verbatim.
    Unstructured(String),
}

impl ParsedLine {
    #[must_use]
    pub const fn as_diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Diagnostic(diagnostic) => Some(diagnostic),
            Self::Unstructured(_) => None,
        }
    }
}

impl fmt::Display for ParsedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagnostic(diagnostic) => fmt::Display::fmt(diagnostic, f),
            Self::Unstructured(text) => f.write_str(text),
        }
    }
}

/// Parse a single output line. Total: lines without the diagnostic
/// shape come back as [`ParsedLine::Unstructured`].
///
/// The prefix is the shortest one that lets the rest of the line match,
/// so a message that itself contains `file.kts:1:2:` stays in the
/// message.
#[must_use]
pub fn parse_line(line: &str) -> ParsedLine {
    let bytes = line.as_bytes();

    // a match starting mid-name would already have matched at the start
    // of that name
    let mut name_starts = (0..bytes.len()).filter(|&start| {
        is_name_byte(bytes[start]) && (start == 0 || !is_name_byte(bytes[start - 1]))
    });

    name_starts
        .find_map(|start| match_at(line, start))
        .map_or_else(
            || ParsedLine::Unstructured(line.to_string()),
            ParsedLine::Diagnostic,
        )
}

const fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn match_at(line: &str, start: usize) -> Option<Diagnostic> {
    let name_len = line[start..].bytes().take_while(|&b| is_name_byte(b)).count();
    let name_end = start + name_len;

    let rest = line[name_end..].strip_prefix(SCRIPT_EXTENSION)?;
    let rest = rest.strip_prefix(':')?;
    let (line_number, rest) = split_number(rest)?;
    let rest = rest.strip_prefix(':')?;
    let (column, rest) = split_number(rest)?;
    let message = rest.strip_prefix(':')?;

    Some(Diagnostic {
        prefix: line[..start].to_string(),
        file: line[start..name_end + SCRIPT_EXTENSION.len()].to_string(),
        line: line_number,
        column,
        message: message.to_string(),
    })
}

/// Split a leading run of ASCII digits off `s` and parse it.
fn split_number(s: &str) -> Option<(u32, &str)> {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    let value = s[..len].parse().ok()?;
    Some((value, &s[len..]))
}
