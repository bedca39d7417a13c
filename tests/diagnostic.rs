//! Diagnostic line recognition.

mod common;

use common::diagnostic;
use scriptpad::{CursorRequest, OffsetErrorKind, ParsedLine, parse_line};

#[test]
fn parse_error_with_prefix() {
    let d = diagnostic("error: foo.kts:10:5: unresolved reference");
    assert_eq!(d.prefix, "error: ");
    assert_eq!(d.file, "foo.kts");
    assert_eq!(d.line, 10);
    assert_eq!(d.column, 5);
    assert_eq!(d.message, " unresolved reference");
    assert_eq!(d.location(), "foo.kts:10:5");
}

#[test]
fn parse_plain_line() {
    assert_eq!(
        parse_line("Hello, World!"),
        ParsedLine::Unstructured("Hello, World!".to_string())
    );
}

#[test]
fn parse_empty_line() {
    assert_eq!(parse_line(""), ParsedLine::Unstructured(String::new()));
}

#[test]
fn parse_name_characters() {
    let d = diagnostic("warning: my_script-2.kts:1:1: deprecated");
    assert_eq!(d.file, "my_script-2.kts");
    assert_eq!(d.prefix, "warning: ");
}

#[test]
fn parse_dot_in_name_moves_to_prefix() {
    let d = diagnostic("foo.bar.kts:1:2:x");
    assert_eq!(d.prefix, "foo.");
    assert_eq!(d.file, "bar.kts");
    assert_eq!(d.message, "x");
}

#[test]
fn parse_other_extension() {
    assert!(matches!(
        parse_line("error: foo.kt:10:5: nope"),
        ParsedLine::Unstructured(_)
    ));
}

#[test]
fn parse_requires_third_colon() {
    assert!(matches!(
        parse_line("foo.kts:10:5 no colon"),
        ParsedLine::Unstructured(_)
    ));
}

#[test]
fn parse_rejects_signed_numbers() {
    assert!(matches!(
        parse_line("foo.kts:-1:5: x"),
        ParsedLine::Unstructured(_)
    ));
}

#[test]
fn parse_message_keeps_colons() {
    let d = diagnostic("e: script.kts:2:3: expecting ':' here: really");
    assert_eq!(d.message, " expecting ':' here: really");
}

#[test]
fn parse_later_match_when_first_fails() {
    let d = diagnostic("a.kts:x then b.kts:4:5: m");
    assert_eq!(d.prefix, "a.kts:x then ");
    assert_eq!(d.file, "b.kts");
    assert_eq!(d.line, 4);
}

#[test]
fn parse_absolute_path_prefix() {
    let d = diagnostic("/tmp/scriptpad/script.kts:7:12: error: type mismatch");
    assert_eq!(d.prefix, "/tmp/scriptpad/");
    assert_eq!(d.file, "script.kts");
    assert_eq!((d.line, d.column), (7, 12));
}

#[test]
fn parse_non_ascii_name_is_plain_text() {
    assert!(matches!(
        parse_line("fehler: ü.kts:1:1: x"),
        ParsedLine::Unstructured(_)
    ));
}

#[test]
fn parse_non_ascii_prefix() {
    let d = diagnostic("→ fehler: ü-x.kts:1:1: x");
    assert_eq!(d.prefix, "→ fehler: ü");
    assert_eq!(d.file, "-x.kts");
}

#[test]
fn display_round_trip() {
    for line in [
        "error: foo.kts:10:5: unresolved reference",
        "plain text",
        "script.kts:1:1:",
    ] {
        assert_eq!(parse_line(line).to_string(), line);
    }
}

#[test]
fn cursor_request_from_diagnostic() {
    let d = diagnostic("error: script.kts:2:1: boom");
    let request = d.cursor_request();
    assert_eq!(request, CursorRequest { line: 2, column: 1 });
    assert_eq!(request.resolve("ab\ncd\nef"), 3);
    assert_eq!(request.try_resolve("ab\ncd\nef"), Ok(3));
}

#[test]
fn cursor_request_past_edited_buffer() {
    let request = diagnostic("error: script.kts:9:1: boom").cursor_request();
    assert_eq!(request.resolve("short"), 5);
    let err = request.try_resolve("short").unwrap_err();
    assert_eq!(err.kind, OffsetErrorKind::LineOutOfRange { lines: 1 });
}
