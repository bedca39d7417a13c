//! Maps tokens to display colors for the host UI.
//!
//! The adapter is a pure function of the buffer: callers re-run
//! [`Highlighter::highlight`] on every edit and hand the spans to
//! whatever renders them. [`render_ansi`] is a terminal renderer used by
//! the CLI.

use std::fmt::Write as _;

use serde::Deserialize;

use crate::lexer::{DEFAULT_KEYWORDS, Tokenizer};
use crate::token::TokenClass;

/// Display color of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    White,
    Gray,
    Red,
    Green,
    Blue,
    Yellow,
    Magenta,
    Cyan,
}

impl Color {
    /// SGR foreground code for ANSI terminals.
    #[must_use]
    pub const fn ansi_code(self) -> u8 {
        match self {
            Self::Black => 30,
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
            Self::Cyan => 36,
            Self::White => 37,
            Self::Gray => 90,
        }
    }
}

/// Class and output-kind to color lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub keyword: Color,
    pub punctuation: Color,
    pub comment: Color,
    /// Color of everything not covered by a more specific entry.
    pub default: Color,
    /// Script standard output lines.
    pub stdout: Color,
    /// Script standard error lines.
    pub stderr: Color,
    /// The `file:line:column` part of a diagnostic.
    pub location: Color,
}

impl Palette {
    /// Color for a token class.
    #[must_use]
    pub const fn color_of(&self, class: TokenClass) -> Color {
        match class {
            TokenClass::Keyword => self.keyword,
            TokenClass::Punctuation => self.punctuation,
            TokenClass::Comment => self.comment,
            TokenClass::Whitespace | TokenClass::Other => self.default,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            keyword: Color::Blue,
            punctuation: Color::Gray,
            comment: Color::Black,
            default: Color::Black,
            stdout: Color::Gray,
            stderr: Color::Red,
            location: Color::Blue,
        }
    }
}

/// Highlighting settings: keyword table plus palette.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub keywords: Vec<String>,
    pub palette: Palette,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(ToString::to_string).collect(),
            palette: Palette::default(),
        }
    }
}

/// A renderable fragment: source text plus the color to draw it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyledSpan<'a> {
    pub text: &'a str,
    pub color: Color,
}

/// Tokenizer paired with a palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighter {
    tokenizer: Tokenizer,
    palette: Palette,
}

impl Highlighter {
    #[must_use]
    pub const fn new(tokenizer: Tokenizer, palette: Palette) -> Self {
        Self { tokenizer, palette }
    }

    #[must_use]
    pub fn from_config(config: &HighlightConfig) -> Self {
        Self::new(
            Tokenizer::new(config.keywords.iter().cloned()),
            config.palette,
        )
    }

    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    #[must_use]
    pub const fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// One span per token, in source order.
    #[must_use]
    pub fn highlight<'a>(&self, source: &'a str) -> Vec<StyledSpan<'a>> {
        self.tokenizer
            .tokenize(source)
            .into_iter()
            .map(|token| StyledSpan {
                text: token.text,
                color: self.palette.color_of(token.class),
            })
            .collect()
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::from_config(&HighlightConfig::default())
    }
}

/// Render spans with ANSI escape sequences, resetting after each span.
#[must_use]
pub fn render_ansi(spans: &[StyledSpan<'_>]) -> String {
    let mut out = String::new();
    for span in spans {
        push_colored(&mut out, span.text, span.color);
    }
    out
}

/// Append `text` to `out` wrapped in the escape sequence for `color`.
pub fn push_colored(out: &mut String, text: &str, color: Color) {
    // writing into a String cannot fail
    let _ = write!(out, "\x1b[{}m{text}\x1b[0m", color.ansi_code());
}
