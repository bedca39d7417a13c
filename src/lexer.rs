use std::collections::HashSet;

use crate::token::{Token, TokenClass};

/// Keywords highlighted when no table is configured.
pub const DEFAULT_KEYWORDS: &[&str] = &["val", "var", "if", "for", "fun", "println"];

/// Tokenize a script with the default keyword table.
///
/// Never fails: every input is covered by comments, words and
/// separator runs.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    Tokenizer::default().tokenize(source)
}

/// Splits script text into classified tokens.
///
/// The tokenizer owns its keyword table; there is no global state, so
/// differently configured tokenizers can be used side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    keywords: HashSet<String>,
}

impl Tokenizer {
    /// Create a tokenizer recognizing exactly the given keywords.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `word` is in the keyword table. Matching is exact and
    /// case-sensitive.
    #[must_use]
    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    /// Tokenize `source`. Concatenating the token texts in order
    /// reproduces `source` byte for byte.
    #[must_use]
    pub fn tokenize<'a>(&self, source: &'a str) -> Vec<Token<'a>> {
        Lexer::new(source, self).tokenize()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

/// Whitespace as understood by the highlighter: space, tab, line feed,
/// vertical tab, form feed and carriage return.
const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}

/// Characters that end a word: parentheses, whitespace and `;`.
const fn is_separator(b: u8) -> bool {
    matches!(b, b'(' | b')' | b';') || is_whitespace(b)
}

/// Characters that end a line comment: line feed, carriage return, next
/// line, line separator and paragraph separator.
const fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

struct Lexer<'a, 't> {
    source: &'a str,
    input: &'a [u8],
    pos: usize,
    tokenizer: &'t Tokenizer,
}

impl<'a, 't> Lexer<'a, 't> {
    const fn new(source: &'a str, tokenizer: &'t Tokenizer) -> Self {
        Self {
            source,
            input: source.as_bytes(),
            pos: 0,
            tokenizer,
        }
    }

    fn tokenize(mut self) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();

        while self.pos < self.input.len() {
            let start = self.pos;
            let class = match (self.input[start], self.peek_at(1)) {
                (b'/', Some(b'/')) => {
                    self.read_line_comment();
                    TokenClass::Comment
                }
                (b'/', Some(b'*')) => {
                    self.read_block_comment();
                    TokenClass::Comment
                }
                (ch, _) if is_separator(ch) => {
                    self.read_while(is_separator);
                    self.classify_separators(start)
                }
                _ => {
                    self.read_while(|b| !is_separator(b));
                    self.classify_word(start)
                }
            };

            tokens.push(Token {
                class,
                text: &self.source[start..self.pos],
                offset: start,
            });
        }

        tokens
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn read_while(&mut self, keep: impl Fn(u8) -> bool) {
        while self.pos < self.input.len() && keep(self.input[self.pos]) {
            self.pos += 1;
        }
    }

    fn read_line_comment(&mut self) {
        let rest = &self.source[self.pos..];
        self.pos += rest.find(is_line_terminator).unwrap_or(rest.len());
    }

    fn read_block_comment(&mut self) {
        // skip the opening `/*` so that `/*/` is not taken as closed
        let body = self.pos + 2;
        self.pos = self.source[body..]
            .find("*/")
            .map_or(self.input.len(), |end| body + end + 2);
    }

    fn classify_word(&self, start: usize) -> TokenClass {
        if self.tokenizer.is_keyword(&self.source[start..self.pos]) {
            TokenClass::Keyword
        } else {
            TokenClass::Other
        }
    }

    fn classify_separators(&self, start: usize) -> TokenClass {
        let run = &self.input[start..self.pos];
        if run == b";" {
            TokenClass::Punctuation
        } else if run.iter().copied().all(is_whitespace) {
            TokenClass::Whitespace
        } else {
            TokenClass::Other
        }
    }
}
