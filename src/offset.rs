//! Conversion between 1-based `(line, column)` positions and byte
//! offsets into a buffer.
//!
//! Lines are separated by `\n`. Columns count characters, not bytes, so
//! a position inside a line containing multi-byte text still maps onto
//! a char boundary.

use std::fmt;

/// Classifies an offset mapping failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffsetErrorKind {
    /// Line or column is zero; positions are 1-based.
    ZeroPosition,
    /// The buffer has fewer lines than requested.
    LineOutOfRange { lines: usize },
    /// The line is shorter than requested. `width` is its length in
    /// characters; a column of `width + 1` (end of line) is valid.
    ColumnOutOfRange { width: usize },
}

impl fmt::Display for OffsetErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPosition => write!(f, "line and column are 1-based"),
            Self::LineOutOfRange { lines } => {
                write!(f, "buffer has only {lines} line(s)")
            }
            Self::ColumnOutOfRange { width } => {
                write!(f, "line has only {width} character(s)")
            }
        }
    }
}

/// Error produced when a position does not exist in the buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} (requested line {line}, column {column})")]
pub struct OffsetError {
    pub kind: OffsetErrorKind,
    pub line: usize,
    pub column: usize,
}

/// Byte offset of `(line, column)` in `source`.
///
/// # Errors
///
/// Returns `OffsetError` when either coordinate is zero, the line does
/// not exist, or the column lies past the end of the line.
pub fn to_offset(source: &str, line: usize, column: usize) -> Result<usize, OffsetError> {
    let error = |kind| OffsetError { kind, line, column };

    if line == 0 || column == 0 {
        return Err(error(OffsetErrorKind::ZeroPosition));
    }

    let Some((start, text)) = source
        .split('\n')
        .scan(0, |start, text| {
            let line_start = *start;
            *start += text.len() + 1;
            Some((line_start, text))
        })
        .nth(line - 1)
    else {
        return Err(error(OffsetErrorKind::LineOutOfRange {
            lines: line_count(source),
        }));
    };

    column_offset(text, column - 1)
        .map(|within| start + within)
        .ok_or_else(|| {
            error(OffsetErrorKind::ColumnOutOfRange {
                width: text.chars().count(),
            })
        })
}

/// Like [`to_offset`] but never fails.
///
/// Zero coordinates are treated as 1, a line past the end maps to the
/// end of the buffer, and a column past the end of its line maps to the
/// end of that line.
#[must_use]
pub fn to_offset_clamped(source: &str, line: usize, column: usize) -> usize {
    let line = line.max(1);
    let column = column.max(1);

    match to_offset(source, line, column) {
        Ok(offset) => offset,
        Err(OffsetError {
            kind: OffsetErrorKind::ColumnOutOfRange { width },
            ..
        }) => to_offset(source, line, width + 1).unwrap_or(source.len()),
        Err(_) => source.len(),
    }
}

/// 1-based `(line, column)` of a byte offset.
///
/// Offsets past the end are clamped to the end of the buffer; offsets
/// inside a multi-byte character resolve to that character.
#[must_use]
pub fn to_position(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }

    let before = &source[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line = before.matches('\n').count() + 1;
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Number of lines in `source`; an empty buffer has one empty line.
#[must_use]
pub fn line_count(source: &str) -> usize {
    source.matches('\n').count() + 1
}

/// Byte offset of the `index`-th character of `line`, allowing the
/// position just past the last character.
fn column_offset(line: &str, index: usize) -> Option<usize> {
    line.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
        .nth(index)
}
