//! The Parser module turns each source line into a [`SourceLine`].
//!
//! Lines are independent: a line is lexed into a [`TokenBuffer`], classified
//! as a pragma, a define or a statement, and its operands are parsed by
//! precedence climbing. There is no recovery, the first error on a line
//! aborts the file.
use super::ast::*;
use super::buffer::TokenBuffer;
use super::error::Error;
use super::lexer::{is_radix_prefix, Lexer, Token, TokenKind};

/// Parses a whole file. The program has exactly one entry per `\n`-separated
/// line of `text`.
pub fn parse_file(text: &str) -> Result<Program, Error> {
    let lines = text
        .split('\n')
        .enumerate()
        .map(|(index, line)| parse_line(line, index))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("parsed {} line(s)", lines.len());
    Ok(Program::new(lines))
}

/// Parses line `index` (0-based) of a file.
pub fn parse_line(text: &str, index: usize) -> Result<SourceLine, Error> {
    let buffer = TokenBuffer::new(Lexer::new(text, index))?;
    Parser { buffer }.line()
}

/// Parses a single operand expression, which must span all of `text`.
pub fn parse_operand(text: &str) -> Result<Node, Error> {
    let mut parser = Parser { buffer: TokenBuffer::new(Lexer::new(text, 0))? };
    let node = parser.expression(0)?;
    parser.end_of_line()?;
    Ok(node)
}

struct Parser {
    buffer: TokenBuffer,
}

impl Parser {
    fn line(&mut self) -> Result<SourceLine, Error> {
        if self.buffer.peek_kind() == TokenKind::Pragma {
            let token = self.buffer.advance();
            return self.directive(token);
        }
        Ok(SourceLine::Statement(self.statement()?))
    }

    fn directive(&mut self, token: Token) -> Result<SourceLine, Error> {
        let word = token.text.split_whitespace().next().unwrap_or_default().to_string();

        if word.eq_ignore_ascii_case("#define") {
            return self.define(&token, &word);
        }

        let value = token.text[word.len()..].trim().to_string();
        let comment = self.comment()?;
        trace!("line {}: pragma {} {}", self.buffer.line() + 1, word, value);
        Ok(SourceLine::Pragma(Pragma { pragma: word, value, comment }))
    }

    /// Re-lexes the body of a `#define` pragma as an ordinary operand list.
    fn define(&mut self, token: &Token, word: &str) -> Result<SourceLine, Error> {
        let start = token.column + word.chars().count();
        let end = token.column + token.text.chars().count();
        let lexer = Lexer::with_bounds(self.buffer.source(), self.buffer.line(), start, end);

        let mut body = Parser { buffer: TokenBuffer::new(lexer)? };
        let name = body.buffer.expect(TokenKind::Identifier)?.text;
        let operands = body.operands()?;
        body.end_of_line()?;

        let comment = self.comment()?;
        trace!("line {}: define {} with {} operand(s)", self.buffer.line() + 1, name, operands.len());
        Ok(SourceLine::Define(Define { name, operands, comment }))
    }

    fn statement(&mut self) -> Result<Statement, Error> {
        let mut statement = Statement::default();

        let first = self.buffer.peek(0);
        if first.is(TokenKind::Identifier) && first.column == 0 {
            statement.label = Some(self.buffer.advance().text);
            if self.buffer.peek_kind() == TokenKind::Colon {
                self.buffer.consume();
            }
        }

        if self.buffer.peek_kind() == TokenKind::Identifier {
            statement.mnemonic = Some(self.buffer.advance().text);
        }

        statement.operands = self.operands()?;
        statement.comment = self.comment()?;
        Ok(statement)
    }

    /// Expressions up to a comment or the end of the line. Commas between
    /// them are consumed when present.
    fn operands(&mut self) -> Result<Vec<Node>, Error> {
        let mut operands = Vec::new();
        while !matches!(self.buffer.peek_kind(), TokenKind::Comment | TokenKind::Eof) {
            operands.push(self.expression(0)?);
            if self.buffer.peek_kind() == TokenKind::Comma {
                self.buffer.consume();
            }
        }
        Ok(operands)
    }

    /// An optional trailing comment, stripped of its `;`. Nothing may follow.
    fn comment(&mut self) -> Result<Option<String>, Error> {
        let comment = if self.buffer.peek_kind() == TokenKind::Comment {
            let text = self.buffer.advance().text;
            let text = text.trim_start_matches(';').trim();
            Some(text.to_string()).filter(|t| !t.is_empty())
        } else {
            None
        };
        self.end_of_line()?;
        Ok(comment)
    }

    fn end_of_line(&mut self) -> Result<(), Error> {
        if !self.buffer.at_end() {
            let found = self.buffer.peek_kind();
            return Err(self.buffer.error(format!("expected end of line but found {}", found)).into());
        }
        Ok(())
    }

    /// Precedence climbing. Operators binding looser than `min_power` are
    /// left for the caller.
    fn expression(&mut self, min_power: u8) -> Result<Node, Error> {
        let mut lhs = self.primary()?;

        loop {
            let kind = self.buffer.peek_kind();

            if let Some(op) = postfix_op(kind) {
                if POSTFIX_POWER < min_power {
                    break;
                }
                self.buffer.consume();
                lhs = Node::Postfix { op, operand: Box::new(lhs) };
                continue;
            }

            if kind == TokenKind::OpenParen {
                if lhs.as_identifier().is_none() {
                    let paren = self.buffer.peek(0).clone();
                    return Err(self.buffer.error_at(&paren, "only an identifier can be called").into());
                }
                self.buffer.consume();
                let args = self.arguments()?;
                lhs = Node::Call { callee: Box::new(lhs), args };
                continue;
            }

            if let Some(op) = assign_op(kind) {
                if ASSIGN_POWER < min_power {
                    break;
                }
                self.buffer.consume();
                let rhs = self.expression(ASSIGN_POWER)?;
                lhs = Node::assign(op, lhs, rhs);
                continue;
            }

            if let Some(op) = binary_op(kind) {
                let power = op.binding_power();
                if power < min_power {
                    break;
                }
                self.buffer.consume();
                let rhs = self.expression(power + 1)?;
                lhs = Node::binary(op, lhs, rhs);
                continue;
            }

            break;
        }

        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Node, Error> {
        let token = self.buffer.advance();

        let node = match token.kind {
            TokenKind::Number if token.text.starts_with('\'') => Node::String { value: token.text },
            TokenKind::Number => self.number(&token)?,
            TokenKind::String => Node::String { value: token.text },
            TokenKind::ChipId => Node::ChipId { text: token.text },
            TokenKind::ProgramCounter => Node::ProgramCounter,
            TokenKind::Identifier => match UnaryOp::keyword(&token.text) {
                Some(op) => {
                    let operand = self.expression(UNARY_POWER)?;
                    Node::Unary { op, lexeme: token.text, operand: Box::new(operand) }
                }
                None => Node::Identifier { name: token.text },
            },
            TokenKind::OpenParen => {
                let inner = self.expression(0)?;
                self.buffer.expect(TokenKind::CloseParen)?;
                inner
            }
            TokenKind::Pound => {
                let name = self.buffer.expect(TokenKind::Identifier)?.text;
                Node::Unary { op: UnaryOp::Pound, lexeme: token.text, operand: Box::new(Node::Identifier { name }) }
            }
            TokenKind::Increment | TokenKind::Decrement => {
                let op = if token.is(TokenKind::Increment) { UnaryOp::Increment } else { UnaryOp::Decrement };
                let operand = self.expression(0)?;
                Node::Unary { op, lexeme: token.text, operand: Box::new(operand) }
            }
            TokenKind::Complement | TokenKind::Not | TokenKind::Minus => {
                let op = match token.kind {
                    TokenKind::Complement => UnaryOp::Complement,
                    TokenKind::Not => UnaryOp::Not,
                    _ => UnaryOp::Negate,
                };
                let operand = self.expression(UNARY_POWER)?;
                Node::Unary { op, lexeme: token.text, operand: Box::new(operand) }
            }
            kind => return Err(self.buffer.error_at(&token, format!("unexpected {}", kind)).into()),
        };

        Ok(node)
    }

    /// The argument list of a call, after its `(`.
    fn arguments(&mut self) -> Result<Vec<Node>, Error> {
        let mut args = Vec::new();
        if self.buffer.peek_kind() == TokenKind::CloseParen {
            self.buffer.consume();
            return Ok(args);
        }

        loop {
            args.push(self.expression(0)?);
            match self.buffer.peek_kind() {
                TokenKind::Comma => self.buffer.consume(),
                TokenKind::CloseParen => {
                    self.buffer.consume();
                    return Ok(args);
                }
                found => {
                    return Err(self.buffer.error(format!("expected ',' or ')' in argument list but found {}", found)).into())
                }
            }
        }
    }

    fn number(&self, token: &Token) -> Result<Node, Error> {
        let chars: Vec<char> = token.text.chars().collect();

        let (radix, body): (Radix, String) = if chars.len() >= 3 && chars[1] == '\'' && is_radix_prefix(chars[0]) {
            let body: String = chars[2..chars.len() - 1].iter().collect();
            match chars[0].to_ascii_uppercase() {
                'A' => {
                    let code = body.chars().next().map_or(0, |c| c as u64);
                    return Ok(Node::Number { value: code, radix: Radix::Decimal, literal: token.text.clone() });
                }
                'B' => (Radix::Binary, body),
                'O' => (Radix::Octal, body),
                'D' => (Radix::Decimal, body),
                _ => (Radix::Hexadecimal, body),
            }
        } else if let Some(rest) = token.text.strip_prefix('.') {
            (Radix::Decimal, rest.to_string())
        } else {
            let digits = token.text.strip_prefix("0x").unwrap_or(&token.text);
            (Radix::Hexadecimal, digits.to_string())
        };

        let value = decode_digits(&body, radix).ok_or_else(|| {
            self.buffer.error_at(token, format!("numeric literal {} does not fit in 64 bits", token.text))
        })?;

        Ok(Node::Number { value, radix, literal: token.text.clone() })
    }
}

/// Decodes the longest prefix of `body` made of digits valid in `radix`.
/// An empty prefix is zero; `None` means the magnitude overflowed.
fn decode_digits(body: &str, radix: Radix) -> Option<u64> {
    let base = radix.base();
    body.chars()
        .map_while(|c| c.to_digit(base))
        .try_fold(0u64, |acc, digit| acc.checked_mul(u64::from(base))?.checked_add(u64::from(digit)))
}

fn postfix_op(kind: TokenKind) -> Option<PostfixOp> {
    match kind {
        TokenKind::Increment => Some(PostfixOp::Increment),
        TokenKind::Decrement => Some(PostfixOp::Decrement),
        _ => None,
    }
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    let op = match kind {
        TokenKind::Equals => AssignOp::Assign,
        TokenKind::PlusEquals => AssignOp::Add,
        TokenKind::MinusEquals => AssignOp::Subtract,
        TokenKind::MultiplyEquals => AssignOp::Multiply,
        TokenKind::DivideEquals => AssignOp::Divide,
        TokenKind::ModulusEquals => AssignOp::Modulus,
        TokenKind::LeftShiftEquals => AssignOp::LeftShift,
        TokenKind::RightShiftEquals => AssignOp::RightShift,
        TokenKind::AndEquals => AssignOp::And,
        TokenKind::OrEquals => AssignOp::Or,
        TokenKind::XorEquals => AssignOp::Xor,
        _ => return None,
    };
    Some(op)
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Multiply => BinaryOp::Multiply,
        TokenKind::Divide => BinaryOp::Divide,
        TokenKind::Modulus => BinaryOp::Modulus,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Subtract,
        TokenKind::LeftShift => BinaryOp::LeftShift,
        TokenKind::RightShift => BinaryOp::RightShift,
        TokenKind::LessThan => BinaryOp::LessThan,
        TokenKind::LessThanEqual => BinaryOp::LessThanEqual,
        TokenKind::GreaterThan => BinaryOp::GreaterThan,
        TokenKind::GreaterThanEqual => BinaryOp::GreaterThanEqual,
        TokenKind::EqualTo => BinaryOp::EqualTo,
        TokenKind::NotEqualTo => BinaryOp::NotEqualTo,
        TokenKind::BitAnd => BinaryOp::BitAnd,
        TokenKind::BitXor => BinaryOp::BitXor,
        TokenKind::BitOr => BinaryOp::BitOr,
        TokenKind::LogicalAnd => BinaryOp::LogicalAnd,
        TokenKind::LogicalOr => BinaryOp::LogicalOr,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn statement(line: &str) -> Statement {
        match parse_line(line, 0).unwrap() {
            SourceLine::Statement(s) => s,
            other => panic!("expected a statement, got {:?}", other),
        }
    }

    fn hex(value: u64, literal: &str) -> Node {
        Node::Number { value, radix: Radix::Hexadecimal, literal: literal.to_string() }
    }

    fn ident(name: &str) -> Node {
        Node::identifier(name)
    }

    #[rstest]
    #[case("H'1A'", 26, Radix::Hexadecimal)]
    #[case("h'ff'", 255, Radix::Hexadecimal)]
    #[case("B'00000101'", 5, Radix::Binary)]
    #[case("O'17'", 15, Radix::Octal)]
    #[case(".14", 14, Radix::Decimal)]
    #[case("D'2'", 2, Radix::Decimal)]
    #[case("A'z'", 122, Radix::Decimal)]
    #[case("1A", 26, Radix::Hexadecimal)]
    #[case("0ff", 255, Radix::Hexadecimal)]
    #[case("0xFF", 255, Radix::Hexadecimal)]
    #[case("0x1", 1, Radix::Hexadecimal)]
    fn test_number_decoding(#[case] text: &str, #[case] value: u64, #[case] radix: Radix) {
        assert_eq!(
            parse_operand(text).unwrap(),
            Node::Number { value, radix, literal: text.to_string() }
        );
    }

    #[test]
    fn test_number_overflow() {
        let err = parse_operand("H'FFFFFFFFFFFFFFFFF'").unwrap_err();
        assert_eq!(err.column(), 0);
    }

    #[test]
    fn test_labels() {
        let st = statement("label hello");
        assert_eq!(st.label.as_deref(), Some("label"));
        assert_eq!(st.mnemonic.as_deref(), Some("hello"));

        let st = statement("label: hello");
        assert_eq!(st.label.as_deref(), Some("label"));
        assert_eq!(st.mnemonic.as_deref(), Some("hello"));

        let st = statement(" label hello");
        assert_eq!(st.label, None);
        assert_eq!(st.mnemonic.as_deref(), Some("label"));
        assert_eq!(st.operands, vec![ident("hello")]);
    }

    #[test]
    fn test_comments() {
        let st = statement("; hello");
        assert_eq!(st.comment.as_deref(), Some("hello"));
        assert_eq!(st.mnemonic, None);

        assert_eq!(statement(" nop ;").comment, None);
        assert!(statement("").is_blank());
        assert!(statement(" \t ").is_blank());
    }

    #[test]
    fn test_operand_list() {
        let st = statement(" test 1+2, 'c'");
        assert_eq!(st.operands.len(), 2);
        assert_eq!(st.operands[0], Node::binary(BinaryOp::Add, hex(1, "1"), hex(2, "2")));
        assert_eq!(st.operands[1], Node::String { value: "'c'".to_string() });

        // Commas are optional between operands.
        assert_eq!(statement(" dw 1 2").operands.len(), 2);
    }

    #[test]
    fn test_pound() {
        let st = statement(" test #hi");
        assert_eq!(
            st.operands,
            vec![Node::Unary { op: UnaryOp::Pound, lexeme: "#".to_string(), operand: Box::new(ident("hi")) }]
        );
        assert!(parse_line(" test #1", 0).is_err());
    }

    #[test]
    fn test_call() {
        let st = statement(" test seven(8, 9)");
        assert_eq!(
            st.operands,
            vec![Node::Call { callee: Box::new(Node::identifier("seven")), args: vec![hex(8, "8"), hex(9, "9")] }]
        );
        assert_eq!(parse_operand("f()").unwrap(), Node::Call { callee: Box::new(Node::identifier("f")), args: vec![] });
    }

    #[test]
    fn test_malformed_call() {
        let err = parse_line(" test seven(8 9)", 0).unwrap_err();
        assert_eq!(err.line(), 1);
        assert_eq!(err.column(), 14);

        let err = parse_operand("3(4)").unwrap_err();
        assert_eq!(err.column(), 1);
    }

    #[test]
    fn test_pragma() {
        assert_eq!(
            parse_line("#include <test.h> ; hello", 0).unwrap(),
            SourceLine::Pragma(Pragma {
                pragma: "#include".to_string(),
                value: "<test.h>".to_string(),
                comment: Some("hello".to_string()),
            })
        );
        assert_eq!(
            parse_line("  #endif", 0).unwrap(),
            SourceLine::Pragma(Pragma { pragma: "#endif".to_string(), value: String::new(), comment: None })
        );
    }

    #[test]
    fn test_define() {
        assert_eq!(
            parse_line("#define TEST 1", 0).unwrap(),
            SourceLine::Define(Define { name: "TEST".to_string(), operands: vec![hex(1, "1")], comment: None })
        );
        assert_eq!(
            parse_line("#DEFINE LED PORTB, 3 ; status led", 0).unwrap(),
            SourceLine::Define(Define {
                name: "LED".to_string(),
                operands: vec![ident("PORTB"), hex(3, "3")],
                comment: Some("status led".to_string()),
            })
        );
        assert!(parse_line("#define 5", 0).is_err());
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_operand("1+2*3").unwrap(),
            Node::binary(BinaryOp::Add, hex(1, "1"), Node::binary(BinaryOp::Multiply, hex(2, "2"), hex(3, "3")))
        );
        assert_eq!(
            parse_operand("a - b - c").unwrap(),
            Node::binary(BinaryOp::Subtract, Node::binary(BinaryOp::Subtract, ident("a"), ident("b")), ident("c"))
        );
        assert_eq!(
            parse_operand("a | b ^ c & d").unwrap(),
            Node::binary(
                BinaryOp::BitOr,
                ident("a"),
                Node::binary(BinaryOp::BitXor, ident("b"), Node::binary(BinaryOp::BitAnd, ident("c"), ident("d")))
            )
        );
        assert_eq!(
            parse_operand("(1+2)*3").unwrap(),
            Node::binary(BinaryOp::Multiply, Node::binary(BinaryOp::Add, hex(1, "1"), hex(2, "2")), hex(3, "3"))
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(
            parse_operand("a = b += c").unwrap(),
            Node::assign(AssignOp::Assign, ident("a"), Node::assign(AssignOp::Add, ident("b"), ident("c")))
        );
        assert_eq!(
            parse_operand("p=16f1939").unwrap(),
            Node::assign(AssignOp::Assign, ident("p"), Node::ChipId { text: "16f1939".to_string() })
        );
    }

    #[test]
    fn test_unary_and_postfix() {
        assert_eq!(
            parse_operand("LOW x + 1").unwrap(),
            Node::binary(
                BinaryOp::Add,
                Node::Unary { op: UnaryOp::Low, lexeme: "LOW".to_string(), operand: Box::new(ident("x")) },
                hex(1, "1")
            )
        );
        assert_eq!(
            parse_operand("-x * 2").unwrap(),
            Node::binary(BinaryOp::Multiply, Node::unary(UnaryOp::Negate, ident("x")), hex(2, "2"))
        );
        assert_eq!(
            parse_operand("++a + b").unwrap(),
            Node::unary(UnaryOp::Increment, Node::binary(BinaryOp::Add, ident("a"), ident("b")))
        );
        assert_eq!(
            parse_operand("x++ + 1").unwrap(),
            Node::binary(
                BinaryOp::Add,
                Node::Postfix { op: PostfixOp::Increment, operand: Box::new(ident("x")) },
                hex(1, "1")
            )
        );
        assert_eq!(parse_operand("$").unwrap(), Node::ProgramCounter);
    }

    #[test]
    fn test_errors() {
        assert!(parse_operand("(1 + 2").is_err());
        assert!(parse_operand("1 +").is_err());
        assert!(parse_operand("1 2").is_err());
        assert!(matches!(parse_line(" dw 1,,2", 0), Err(Error::Parse(_))));
        assert!(matches!(parse_line(" dw \"abc", 0), Err(Error::Lex(_))));
    }

    #[test]
    fn test_parse_file() {
        let program = parse_file("start: nop\n\n goto start\n").unwrap();
        assert_eq!(program.len(), 4);
        assert!(program.lines[1].as_statement().unwrap().is_blank());

        let err = parse_file(" nop\n test seven(8 9)").unwrap_err();
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 14);
    }
}
