use crate::diagnostic::Diagnostic;
use crate::highlight::{Highlighter, StyledSpan};
use crate::offset::{self, OffsetError};

/// Buffer contents shown on first start.
pub const SAMPLE_SCRIPT: &str = "\
// This is a simple Kotlin script to test the process execution
println(\"Hello from the Kotlin script!\")

// Simple computation
val result = 42 * 2
println(\"The result of 42 * 2 is: $result\")

// Simulate a delay (for testing live output)
Thread.sleep(1000)
println(\"This is printed after a 1-second delay.\")
";

/// The script buffer with its cursor.
///
/// Highlighting is recomputed from the whole text on request; there is
/// no incremental state to keep in sync with edits.
#[derive(Debug, Clone)]
pub struct ScriptEditor {
    text: String,
    cursor: usize,
    highlighter: Highlighter,
}

impl ScriptEditor {
    #[must_use]
    pub fn new(highlighter: Highlighter) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            highlighter,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the buffer contents, keeping the cursor inside the text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.set_cursor(self.cursor);
    }

    /// Cursor as a byte offset, always on a char boundary.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, clamping into the buffer.
    pub fn set_cursor(&mut self, offset: usize) {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        self.cursor = offset;
    }

    /// 1-based `(line, column)` of the cursor.
    #[must_use]
    pub fn cursor_position(&self) -> (usize, usize) {
        offset::to_position(&self.text, self.cursor)
    }

    /// Colored spans covering the whole buffer.
    #[must_use]
    pub fn spans(&self) -> Vec<StyledSpan<'_>> {
        self.highlighter.highlight(&self.text)
    }

    #[must_use]
    pub const fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    /// Jump to the location of `diagnostic`. Positions the buffer no
    /// longer has are clamped to the nearest existing one. Returns the
    /// new cursor offset.
    pub fn activate(&mut self, diagnostic: &Diagnostic) -> usize {
        self.cursor = diagnostic.cursor_request().resolve(&self.text);
        self.cursor
    }

    /// Jump to the location of `diagnostic` only if it still exists;
    /// the cursor is left alone otherwise.
    ///
    /// # Errors
    ///
    /// Returns `OffsetError` when the position is outside the buffer.
    pub fn try_activate(&mut self, diagnostic: &Diagnostic) -> Result<usize, OffsetError> {
        self.cursor = diagnostic.cursor_request().try_resolve(&self.text)?;
        Ok(self.cursor)
    }
}

impl Default for ScriptEditor {
    fn default() -> Self {
        Self::new(Highlighter::default()).with_text(SAMPLE_SCRIPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{ParsedLine, parse_line};

    fn diagnostic(line: &str) -> Diagnostic {
        match parse_line(line) {
            ParsedLine::Diagnostic(d) => d,
            ParsedLine::Unstructured(text) => panic!("not a diagnostic: {text}"),
        }
    }

    #[test]
    fn activation_moves_cursor() {
        let mut editor = ScriptEditor::new(Highlighter::default()).with_text("ab\ncd\nef");
        let offset = editor.activate(&diagnostic("error: script.kts:2:2: boom"));
        assert_eq!(offset, 4);
        assert_eq!(editor.cursor_position(), (2, 2));
    }

    #[test]
    fn stale_location_is_clamped() {
        let mut editor = ScriptEditor::new(Highlighter::default()).with_text("ab");
        assert_eq!(editor.activate(&diagnostic("script.kts:40:1: x")), 2);
    }

    #[test]
    fn stale_location_is_rejected_without_moving() {
        let mut editor = ScriptEditor::new(Highlighter::default()).with_text("ab");
        editor.set_cursor(1);
        assert!(editor.try_activate(&diagnostic("script.kts:40:1: x")).is_err());
        assert_eq!(editor.cursor(), 1);
    }

    #[test]
    fn shrinking_text_clamps_cursor() {
        let mut editor = ScriptEditor::default();
        editor.set_cursor(usize::MAX);
        editor.set_text("é");
        assert_eq!(editor.cursor(), "é".len());
    }

    #[test]
    fn sample_highlights_keywords() {
        let editor = ScriptEditor::default();
        assert!(
            editor
                .spans()
                .iter()
                .any(|span| span.text == "val" && span.color == crate::Color::Blue)
        );
    }
}
