//! Diagnostics raised while lexing and parsing a source line.
//!
//! Both error kinds carry the 1-based line number, the 0-based column of
//! the offending token and a copy of the source line, so that they can be
//! rendered with a caret under the problem without access to the file.
use std::fmt;

/// Raised by the lexer on an unterminated literal or an illegal character.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub character: Option<char>,
    pub message: String,
    pub source_line: String,
}

/// Raised by the parser when a line does not match the grammar.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub source_line: String,
}

/// Any failure produced while turning text into a program.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
}

impl Error {
    pub fn line(&self) -> usize {
        match self {
            Error::Lex(e) => e.line,
            Error::Parse(e) => e.line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            Error::Lex(e) => e.column,
            Error::Parse(e) => e.column,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lex error on line {}, column {}: {}", self.line, self.column + 1, self.message)?;
        write_caret(f, &self.source_line, self.column)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error on line {}, column {}: {}", self.line, self.column + 1, self.message)?;
        write_caret(f, &self.source_line, self.column)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex(e) => e.fmt(f),
            Error::Parse(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for LexError {}
impl std::error::Error for ParseError {}
impl std::error::Error for Error {}

impl From<LexError> for Error {
    fn from(err: LexError) -> Self {
        Error::Lex(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

/// Writes the source line and a caret under `column`.
/// Tabs before the column are kept so the caret lines up in a terminal.
fn write_caret(f: &mut fmt::Formatter<'_>, source: &str, column: usize) -> fmt::Result {
    let padding: String = source
        .chars()
        .take(column)
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();
    write!(f, "\n{}\n{}^", source.trim_end_matches(&['\r', '\n'][..]), padding)
}
