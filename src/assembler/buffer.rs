//! Lookahead over the tokens of a single line.
use super::error::{LexError, ParseError};
use super::lexer::{Lexer, Token, TokenKind};

/// Eagerly drains a [`Lexer`] so the parser can peek at any offset.
pub struct TokenBuffer {
    tokens: Vec<Token>,
    current: usize,
    eof: Token,
    source: String,
    line: usize,
}

impl TokenBuffer {
    pub fn new(mut lexer: Lexer) -> Result<Self, LexError> {
        let mut tokens = Vec::new();
        let eof = loop {
            let token = lexer.next_token()?;
            if token.is(TokenKind::Eof) {
                break token;
            }
            tokens.push(token);
        };

        Ok(TokenBuffer {
            tokens,
            current: 0,
            eof,
            source: lexer.source().to_string(),
            line: lexer.line(),
        })
    }

    /// The token `offset` slots past the cursor, or `Eof` past the end.
    pub fn peek(&self, offset: usize) -> &Token {
        self.tokens.get(self.current + offset).unwrap_or(&self.eof)
    }

    pub fn peek_kind(&self) -> TokenKind {
        self.peek(0).kind
    }

    /// Consumes the current token if it has the given kind.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.peek(0);
        if token.kind != kind {
            return Err(self.error(format!("expected {} but found {}", kind, token.kind)));
        }
        let token = token.clone();
        self.consume();
        Ok(token)
    }

    /// Returns the current token and advances past it.
    pub fn advance(&mut self) -> Token {
        let token = self.peek(0).clone();
        self.consume();
        token
    }

    pub fn consume(&mut self) {
        if self.current < self.tokens.len() {
            self.current += 1;
        }
    }

    pub fn at_end(&self) -> bool {
        self.peek(0).is(TokenKind::Eof)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// A diagnostic pointing at the current token.
    pub fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.peek(0), message)
    }

    /// A diagnostic pointing at `token`.
    pub fn error_at(&self, token: &Token, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line + 1,
            column: token.column,
            message: message.into(),
            source_line: self.source.clone(),
        }
    }
}
