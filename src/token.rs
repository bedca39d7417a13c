/// Token classes produced by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    /// Word found in the keyword table (`val`, `fun`, ...).
    Keyword,
    /// Run made only of whitespace characters.
    Whitespace,
    /// The statement separator `;` on its own.
    Punctuation,
    /// Line comment (`// ...`) or block comment (`/* ... */`).
    Comment,
    /// Any other word or separator run.
    Other,
}

impl TokenClass {
    /// Lowercase name used by the CLI token dump.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Whitespace => "whitespace",
            Self::Punctuation => "punctuation",
            Self::Comment => "comment",
            Self::Other => "other",
        }
    }
}

/// A classified, non-empty slice of the source.
///
/// Tokens borrow from the source they were produced from and cover it
/// without gaps or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub class: TokenClass,
    pub text: &'a str,
    /// Byte offset of `text` in the source.
    pub offset: usize,
}

impl Token<'_> {
    /// Byte offset one past the end of the token.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}
