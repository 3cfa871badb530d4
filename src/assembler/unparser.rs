//! Renders a [`Program`] back to text in one canonical layout.
//!
//! Statement labels sit in a gutter wide enough for the longest label, so
//! every mnemonic starts in the same column. Operators are spaced uniformly
//! and parentheses are emitted only where the tree needs them to survive a
//! second parse.
use std::fmt;

use super::ast::*;

/// Mnemonics whose label names the thing being declared. These never get a
/// forced colon.
const DECLARING_MNEMONICS: [&str; 4] = ["macro", "equ", "udata", "code"];

#[derive(Clone, Debug)]
pub struct UnparseOptions {
    /// Text written before comments.
    pub comment_marker: String,
    /// Minimum width of the label gutter.
    pub indent: usize,
    /// Write labels as `label:` where the mnemonic allows it.
    pub force_label_colons: bool,
}

impl Default for UnparseOptions {
    fn default() -> Self {
        UnparseOptions { comment_marker: ";".to_string(), indent: 4, force_label_colons: false }
    }
}

pub struct Unparser {
    options: UnparseOptions,
}

impl Unparser {
    pub fn new(options: UnparseOptions) -> Self {
        Unparser { options }
    }

    pub fn unparse_program(&self, program: &Program) -> String {
        let gutter = self.gutter(program);
        let mut out: Vec<String> = Vec::with_capacity(program.len());

        for (index, line) in program.lines.iter().enumerate() {
            if let SourceLine::Statement(statement) = line {
                let labelled = statement.label.as_deref().map_or(false, |l| !l.is_empty());
                let after_blank = index > 0 && program.lines[index - 1].as_statement().map_or(false, Statement::is_blank);
                if labelled && !after_blank {
                    out.push(String::new());
                }
            }
            out.push(self.render(line, gutter));
        }

        debug!("unparsed {} line(s) into {}", program.len(), out.len());
        out.join("\n")
    }

    /// Width of the label field shared by every statement of `program`.
    pub fn gutter(&self, program: &Program) -> usize {
        let colon = if self.options.force_label_colons { 1 } else { 0 };
        let longest = program
            .statements()
            .filter_map(|s| s.label.as_ref())
            .map(|l| l.chars().count() + colon)
            .max()
            .unwrap_or(0);
        longest.max(self.options.indent)
    }

    /// Renders one line with the given gutter. Never carries trailing
    /// whitespace.
    pub fn render(&self, line: &SourceLine, gutter: usize) -> String {
        match line {
            SourceLine::Pragma(pragma) => join(&[
                pragma.pragma.clone(),
                pragma.value.clone(),
                self.comment(pragma.comment.as_deref()),
            ]),
            SourceLine::Define(define) => join(&[
                "#define".to_string(),
                define.name.clone(),
                operand_list(&define.operands),
                self.comment(define.comment.as_deref()),
            ]),
            SourceLine::Statement(statement) => self.statement(statement, gutter),
        }
    }

    fn statement(&self, statement: &Statement, gutter: usize) -> String {
        let mut label = statement.label.clone().unwrap_or_default();
        if !label.is_empty() && self.needs_colon(statement) {
            label.push(':');
        }

        let mut text = format!("{:width$}", label, width = gutter);
        let operands = match &statement.mnemonic {
            Some(_) => operand_list(&statement.operands),
            None => headless_operand_list(&statement.operands),
        };
        let body = join(&[
            statement.mnemonic.clone().unwrap_or_default(),
            operands,
            self.comment(statement.comment.as_deref()),
        ]);
        if !body.is_empty() {
            text.push(' ');
            text.push_str(&body);
        }
        text.trim_end().to_string()
    }

    fn needs_colon(&self, statement: &Statement) -> bool {
        self.options.force_label_colons && !DECLARING_MNEMONICS.iter().any(|m| statement.has_mnemonic(m))
    }

    fn comment(&self, comment: Option<&str>) -> String {
        match comment {
            Some(text) if !text.is_empty() => format!("{} {}", self.options.comment_marker, text),
            _ => String::new(),
        }
    }
}

/// Convenience wrapper around [`Unparser::unparse_program`].
pub fn unparse_program(program: &Program, options: &UnparseOptions) -> String {
    Unparser::new(options.clone()).unparse_program(program)
}

fn join(parts: &[String]) -> String {
    parts.iter().filter(|p| !p.is_empty()).map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn operand_list(operands: &[Node]) -> String {
    operands.iter().map(Node::to_string).collect::<Vec<_>>().join(", ")
}

/// Operands of a statement without a mnemonic. A leading operand that
/// would re-lex as a mnemonic or a pragma is parenthesized.
fn headless_operand_list(operands: &[Node]) -> String {
    let mut rendered: Vec<String> = operands.iter().map(Node::to_string).collect();
    if let (Some(first), Some(node)) = (rendered.first_mut(), operands.first()) {
        if first.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '#') {
            *first = grouped(node, true);
        }
    }
    rendered.join(", ")
}

fn grouped(node: &Node, wrap: bool) -> String {
    if wrap {
        format!("({})", node)
    } else {
        node.to_string()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Number { literal, .. } => f.write_str(literal),
            Node::String { value } => f.write_str(value),
            Node::ChipId { text } => f.write_str(text),
            Node::ProgramCounter => f.write_str("$"),
            Node::Identifier { name } => f.write_str(name),
            Node::Unary { op, lexeme, operand } => {
                let wrap = op.operand_power() > 0 && operand.binding_power() < UNARY_POWER;
                let operand = grouped(operand, wrap);
                // `- -x` must not lex as a decrement.
                if lexeme.chars().count() == 1 && !(lexeme == "-" && operand.starts_with('-')) {
                    write!(f, "{}{}", lexeme, operand)
                } else {
                    write!(f, "{} {}", lexeme, operand)
                }
            }
            Node::Postfix { op, operand } => {
                write!(f, "{}{}", grouped(operand, operand.binding_power() < POSTFIX_POWER), op.lexeme())
            }
            Node::Binary { op, left, right } => {
                let power = op.binding_power();
                write!(
                    f,
                    "{} {} {}",
                    grouped(left, left.binding_power() < power),
                    op.lexeme(),
                    grouped(right, right.binding_power() <= power)
                )
            }
            Node::Assign { op, left, right } => write!(
                f,
                "{}{}{}",
                grouped(left, left.binding_power() <= ASSIGN_POWER),
                op.lexeme(),
                grouped(right, right.binding_power() < ASSIGN_POWER)
            ),
            Node::Call { callee, args } => write!(f, "{}({})", callee, operand_list(args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::parser::{parse_file, parse_operand};

    fn unparse(source: &str, options: &UnparseOptions) -> String {
        unparse_program(&parse_file(source).unwrap(), options)
    }

    fn forced() -> UnparseOptions {
        UnparseOptions { force_label_colons: true, ..UnparseOptions::default() }
    }

    fn canonical(operand: &str) -> String {
        parse_operand(operand).unwrap().to_string()
    }

    #[test]
    fn test_default_layout() {
        let output = unparse("start movlw H'0A' ;load\n goto   start", &UnparseOptions::default());
        assert_eq!(output, "\nstart movlw H'0A' ; load\n      goto start");
    }

    #[test]
    fn test_label_alignment() {
        let output = unparse("abc nop\nabcdefg nop", &forced());
        let lines: Vec<&str> = output.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["abc:     nop", "abcdefg: nop"]);
        assert_eq!(lines[0].find("nop"), lines[1].find("nop"));
    }

    #[test]
    fn test_declaring_mnemonics_keep_bare_labels() {
        let output = unparse("LOW_VOLT_VAL\t\tEQU\t.684\t;ADC count", &forced());
        assert_eq!(output.trim(), "LOW_VOLT_VAL  EQU .684 ; ADC count");

        let output = unparse("Start movlw 1\nMATH_DATA udata", &forced());
        assert!(output.contains("Start:"));
        assert!(output.contains("MATH_DATA  udata"));
    }

    #[test]
    fn test_blank_line_before_labels() {
        let output = unparse(" nop\n\nloop goto loop", &UnparseOptions::default());
        assert_eq!(output, "     nop\n\nloop goto loop");
    }

    #[test]
    fn test_comment_marker() {
        let options = UnparseOptions { comment_marker: "//".to_string(), ..UnparseOptions::default() };
        assert_eq!(unparse("; hello", &options), "     // hello");
        assert_eq!(unparse("#include <x.inc> ; chip", &options), "#include <x.inc> // chip");
    }

    #[test]
    fn test_pragmas_and_defines() {
        assert_eq!(unparse("  #ifdef   DEBUG", &UnparseOptions::default()), "#ifdef DEBUG");
        assert_eq!(unparse("#define TEST 1,2", &UnparseOptions::default()), "#define TEST 1, 2");
        assert_eq!(unparse("#define FLAG", &UnparseOptions::default()), "#define FLAG");
    }

    #[test]
    fn test_keyword_unary_spacing() {
        assert_eq!(unparse(" movlw LOW  REG_Z", &forced()).trim(), "movlw LOW REG_Z");
        assert_eq!(canonical("~ x"), "~x");
        assert_eq!(canonical("- -x"), "- -x");
        assert_eq!(unparse(" test #hi", &UnparseOptions::default()), "     test #hi");
        assert_eq!(canonical("++ a"), "++ a");
    }

    #[test]
    fn test_operator_spacing() {
        assert_eq!(canonical("1+2"), "1 + 2");
        assert_eq!(canonical("a = b"), "a=b");
        assert_eq!(canonical("x ++"), "x++");
        assert_eq!(canonical("seven( 8,9 )"), "seven(8, 9)");
        assert_eq!(canonical("$ + 2"), "$ + 2");
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(canonical("(1+2)*3"), "(1 + 2) * 3");
        assert_eq!(canonical("1+(2*3)"), "1 + 2 * 3");
        assert_eq!(canonical("a-(b-c)"), "a - (b - c)");
        assert_eq!(canonical("(a-b)-c"), "a - b - c");
        assert_eq!(canonical("low (x+1)"), "low (x + 1)");
        assert_eq!(canonical("(a=b)=c"), "(a=b)=c");
        assert_eq!(canonical("a=(b=c)"), "a=b=c");
        assert_eq!(canonical("(++a)+b"), "(++ a) + b");
        assert_eq!(canonical("(-x)++"), "(-x)++");
    }

    #[test]
    fn test_operands_without_mnemonic() {
        let options = UnparseOptions::default();
        for (source, expected) in [
            (" (a), b", "     (a), b"),
            ("lbl (x), 1", "\nlbl  (x), 1"),
            (" (f)(1)", "     (f(1))"),
            (" (#addr)", "     (#addr)"),
            (" 5, a", "     5, a"),
        ] {
            let once = unparse(source, &options);
            assert_eq!(once, expected);
            assert_eq!(unparse(&once, &options), once);
        }
    }

    #[test]
    fn test_no_trailing_whitespace() {
        let output = unparse("lbl\n   \n nop ;   ", &forced());
        assert!(output.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn test_mutated_tree() {
        let mut program = parse_file(" movlw H'FF'").unwrap();
        if let SourceLine::Statement(st) = &mut program.lines[0] {
            st.mnemonic = Some("MOVLW".to_string());
            st.operands[0] = Node::Number { value: 255, radix: Radix::Hexadecimal, literal: "0xFF".to_string() };
        }
        assert_eq!(unparse_program(&program, &UnparseOptions::default()), "     MOVLW 0xFF");
    }
}
