//! This lexer tokenizes one line of MPASM source at a time.
//!
//! The grammar is column sensitive (labels live in column 0, and a `#`
//! only opens a pragma when nothing but whitespace precedes it), so every
//! token carries the 0-based column it starts at.
use std::fmt;

use super::error::LexError;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    Comment,
    Pragma,
    Identifier,
    Number,
    ChipId,
    String,
    ProgramCounter,

    Comma,
    Colon,
    OpenParen,
    CloseParen,

    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
    LeftShift,
    RightShift,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    EqualTo,
    NotEqualTo,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
    Not,
    Complement,
    Pound,
    Increment,
    Decrement,

    Equals,
    PlusEquals,
    MinusEquals,
    MultiplyEquals,
    DivideEquals,
    ModulusEquals,
    LeftShiftEquals,
    RightShiftEquals,
    AndEquals,
    OrEquals,
    XorEquals,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let name = match self {
            Comment => "comment",
            Pragma => "pragma",
            Identifier => "identifier",
            Number => "number",
            ChipId => "chip-id",
            String => "string",
            ProgramCounter => "'$'",
            Comma => "','",
            Colon => "':'",
            OpenParen => "'('",
            CloseParen => "')'",
            Plus => "'+'",
            Minus => "'-'",
            Multiply => "'*'",
            Divide => "'/'",
            Modulus => "'%'",
            LeftShift => "'<<'",
            RightShift => "'>>'",
            LessThan => "'<'",
            LessThanEqual => "'<='",
            GreaterThan => "'>'",
            GreaterThanEqual => "'>='",
            EqualTo => "'=='",
            NotEqualTo => "'!='",
            BitAnd => "'&'",
            BitXor => "'^'",
            BitOr => "'|'",
            LogicalAnd => "'&&'",
            LogicalOr => "'||'",
            Not => "'!'",
            Complement => "'~'",
            Pound => "'#'",
            Increment => "'++'",
            Decrement => "'--'",
            Equals => "'='",
            PlusEquals => "'+='",
            MinusEquals => "'-='",
            MultiplyEquals => "'*='",
            DivideEquals => "'/='",
            ModulusEquals => "'%='",
            LeftShiftEquals => "'<<='",
            RightShiftEquals => "'>>='",
            AndEquals => "'&='",
            OrEquals => "'|='",
            XorEquals => "'^='",
            Eof => "end of line",
        };
        f.write_str(name)
    }
}

/// A lexeme with its kind and position. A token never spans lines.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Token { kind, text: text.into(), line, column }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Maps an operator lexeme of one to three characters to its kind.
fn operator_kind(lexeme: &str) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match lexeme {
        "<<=" => LeftShiftEquals,
        ">>=" => RightShiftEquals,

        "==" => EqualTo,
        "!=" => NotEqualTo,
        "<=" => LessThanEqual,
        ">=" => GreaterThanEqual,
        "<<" => LeftShift,
        ">>" => RightShift,
        "&&" => LogicalAnd,
        "||" => LogicalOr,
        "++" => Increment,
        "--" => Decrement,
        "+=" => PlusEquals,
        "-=" => MinusEquals,
        "*=" => MultiplyEquals,
        "/=" => DivideEquals,
        "%=" => ModulusEquals,
        "&=" => AndEquals,
        "|=" => OrEquals,
        "^=" => XorEquals,

        "+" => Plus,
        "-" => Minus,
        "*" => Multiply,
        "/" => Divide,
        "%" => Modulus,
        "<" => LessThan,
        ">" => GreaterThan,
        "&" => BitAnd,
        "|" => BitOr,
        "^" => BitXor,
        "~" => Complement,
        "!" => Not,
        "=" => Equals,
        _ => return None,
    };
    Some(kind)
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Letters that open a quoted literal such as `H'1F'` when followed by `'`.
pub(crate) fn is_radix_prefix(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'B' | 'D' | 'H' | 'O' | 'A')
}

/// Characters that may continue a bare numeric run. Lowercase letters are
/// admitted so device names such as `16f1939` stay a single token.
fn is_number_run_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, 'A'..='F' | '.') || c.is_ascii_lowercase()
}

/// Whether `c` is a legal body digit for the quoted literal opened by `prefix`.
fn is_quoted_digit(prefix: char, c: char) -> bool {
    match prefix.to_ascii_uppercase() {
        'B' => matches!(c, '0' | '1'),
        'O' => matches!(c, '0'..='7'),
        'D' => c.is_ascii_digit(),
        'H' => c.is_ascii_hexdigit(),
        _ => false,
    }
}

/// A single-pass cursor over one line of text.
pub struct Lexer {
    source: String,
    chars: Vec<char>,
    pos: usize,
    end: usize,
    line: usize,
}

impl Lexer {
    /// Creates a lexer over the whole of `source`, which is line `line`
    /// (0-based) of its file.
    pub fn new(source: &str, line: usize) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let end = chars.len();
        Lexer { source: source.to_string(), chars, pos: 0, end, line }
    }

    /// Creates a lexer that only scans the character range `start..end` of
    /// `source`. Columns stay relative to the full line, and everything
    /// before `start` still counts when deciding whether a `#` is the first
    /// meaningful character.
    pub fn with_bounds(source: &str, line: usize, start: usize, end: usize) -> Self {
        let mut lexer = Lexer::new(source, line);
        lexer.end = end.min(lexer.chars.len());
        lexer.pos = start.min(lexer.end);
        lexer
    }

    /// The full text of the line being scanned.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Returns the next token, or an `Eof` token once the line is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        while self.peek(0).map_or(false, is_whitespace) {
            self.pos += 1;
        }

        let start = self.pos;
        let c = match self.peek(0) {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, "", self.line, start)),
        };

        match c {
            ';' => Ok(self.comment()),
            '#' if self.is_first_meaningful(start) => Ok(self.pragma()),
            '#' => Ok(self.single(TokenKind::Pound)),
            '"' => self.string(),
            '\'' => self.char_literal(),
            '$' => Ok(self.single(TokenKind::ProgramCounter)),
            ',' => Ok(self.single(TokenKind::Comma)),
            ':' => Ok(self.single(TokenKind::Colon)),
            '(' => Ok(self.single(TokenKind::OpenParen)),
            ')' => Ok(self.single(TokenKind::CloseParen)),
            c if is_radix_prefix(c) && self.peek(1) == Some('\'') => self.quoted_number(),
            c if is_identifier_start(c) => Ok(self.identifier()),
            c if c.is_ascii_digit() || c == '.' => Ok(self.bare_number()),
            c => match self.operator() {
                Some(token) => Ok(token),
                None => Err(self.error(start, Some(c), format!("unexpected character '{}'", c))),
            },
        }
    }

    /// Drains the lexer, returning every token before `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.is(TokenKind::Eof) {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        let i = self.pos + offset;
        if i < self.end {
            Some(self.chars[i])
        } else {
            None
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, self.text(start, self.pos), self.line, start)
    }

    fn error(&self, column: usize, character: Option<char>, message: String) -> LexError {
        LexError {
            line: self.line + 1,
            column,
            character,
            message,
            source_line: self.source.clone(),
        }
    }

    fn is_first_meaningful(&self, index: usize) -> bool {
        self.chars[..index].iter().all(|&c| is_whitespace(c))
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.pos;
        self.pos += 1;
        self.token(kind, start)
    }

    fn comment(&mut self) -> Token {
        let start = self.pos;
        self.pos = self.end;
        self.token(TokenKind::Comment, start)
    }

    /// A pragma runs to the first `;` or the end of the line.
    fn pragma(&mut self) -> Token {
        let start = self.pos;
        let stop = (start + 1..self.end)
            .find(|&i| self.chars[i] == ';')
            .unwrap_or(self.end);
        self.pos = stop;
        let text = self.text(start, stop);
        Token::new(TokenKind::Pragma, text.trim_end(), self.line, start)
    }

    fn string(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '"' {
                return Ok(self.token(TokenKind::String, start));
            }
        }
        Err(self.error(start, Some('"'), "unterminated string literal".to_string()))
    }

    fn char_literal(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        self.pos += 1;
        if self.peek(0).is_none() {
            return Err(self.error(start, Some('\''), "unterminated character literal".to_string()));
        }
        self.pos += 1;
        self.close_quote(start, "character literal")?;
        Ok(self.token(TokenKind::Number, start))
    }

    fn quoted_number(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let prefix = self.chars[start];
        self.pos += 2;

        if prefix.to_ascii_uppercase() == 'A' {
            if self.peek(0).is_none() {
                return Err(self.error(start, Some(prefix), "unterminated character literal".to_string()));
            }
            self.pos += 1;
        } else {
            while self.peek(0).map_or(false, |c| is_quoted_digit(prefix, c)) {
                self.pos += 1;
            }
        }

        self.close_quote(start, "numeric literal")?;
        Ok(self.token(TokenKind::Number, start))
    }

    fn close_quote(&mut self, start: usize, what: &str) -> Result<(), LexError> {
        match self.peek(0) {
            Some('\'') => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(self.pos, Some(c), format!("unexpected character '{}' in {}", c, what))),
            None => Err(self.error(start, None, format!("unterminated {}", what))),
        }
    }

    fn identifier(&mut self) -> Token {
        let start = self.pos;
        while self.peek(0).map_or(false, is_identifier_char) {
            self.pos += 1;
        }
        self.token(TokenKind::Identifier, start)
    }

    /// Bare runs default to numbers. A run containing a lowercase letter is
    /// a chip id, unless it is shorter than five characters and does not
    /// start with `1`.
    fn bare_number(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;

        let mut is_chip = false;
        while let Some(c) = self.peek(0).filter(|&c| is_number_run_char(c)) {
            if c.is_ascii_lowercase() {
                is_chip = true;
            }
            self.pos += 1;
        }

        if self.pos - start < 5 && self.chars[start] != '1' {
            is_chip = false;
        }

        let kind = if is_chip { TokenKind::ChipId } else { TokenKind::Number };
        self.token(kind, start)
    }

    /// Greedy longest match over the operator table.
    fn operator(&mut self) -> Option<Token> {
        let start = self.pos;
        for len in (1..=3).rev() {
            if start + len > self.end {
                continue;
            }
            let lexeme = self.text(start, start + len);
            if let Some(kind) = operator_kind(&lexeme) {
                self.pos += len;
                return Some(Token::new(kind, lexeme, self.line, start));
            }
        }
        None
    }
}
