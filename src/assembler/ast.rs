//! This AST describes a parsed MPASM source file, one entry per line.
//!
//! Lines come in three shapes:
//!
//! ```nasm
//! #include <p16f877.inc>    ; a pragma
//! #define  LED PORTB, 3     ; a define
//! Start:  movlw H'0A'       ; a statement: label, mnemonic, operands, comment
//! ```
//!
//! Operands are expression trees. Every node is owned by its parent and
//! there is no sharing, so rewrite passes mutate the tree in place and the
//! unparser renders whatever state it finds.

/// Binding power of assignment operators (both sides).
pub const ASSIGN_POWER: u8 = 10;
/// Binding power of prefix operators.
pub const UNARY_POWER: u8 = 80;
/// Binding power of postfix `++` and `--`.
pub const POSTFIX_POWER: u8 = 90;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Radix {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn base(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOp {
    High,
    Low,
    Upper,
    Complement,
    Not,
    Negate,
    Pound,
    Increment,
    Decrement,
}

impl UnaryOp {
    /// Recognises the `high`/`low`/`upper` keywords in any case.
    pub fn keyword(name: &str) -> Option<UnaryOp> {
        match name.to_ascii_lowercase().as_str() {
            "high" => Some(UnaryOp::High),
            "low" => Some(UnaryOp::Low),
            "upper" => Some(UnaryOp::Upper),
            _ => None,
        }
    }

    /// The fixed spelling of symbolic operators. Keywords have none, their
    /// spelling is whatever the source used.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            UnaryOp::High | UnaryOp::Low | UnaryOp::Upper => None,
            UnaryOp::Complement => Some("~"),
            UnaryOp::Not => Some("!"),
            UnaryOp::Negate => Some("-"),
            UnaryOp::Pound => Some("#"),
            UnaryOp::Increment => Some("++"),
            UnaryOp::Decrement => Some("--"),
        }
    }

    /// Prefix `++`/`--` take everything to their right, the rest bind
    /// at [`UNARY_POWER`].
    pub fn operand_power(self) -> u8 {
        match self {
            UnaryOp::Increment | UnaryOp::Decrement => 0,
            _ => UNARY_POWER,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

impl PostfixOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            PostfixOp::Increment => "++",
            PostfixOp::Decrement => "--",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    Multiply,
    Divide,
    Modulus,
    Add,
    Subtract,
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
}

impl BinaryOp {
    /// Left binding power; the right side binds one tighter.
    pub fn binding_power(self) -> u8 {
        use BinaryOp::*;
        match self {
            Multiply | Divide | Modulus => 70,
            Add | Subtract => 60,
            LeftShift | RightShift => 50,
            LessThan | LessThanEqual | GreaterThan | GreaterThanEqual => 40,
            EqualTo | NotEqualTo => 35,
            BitAnd => 32,
            BitXor => 31,
            BitOr => 30,
            LogicalAnd => 20,
            LogicalOr => 15,
        }
    }

    pub fn lexeme(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Multiply => "*",
            Divide => "/",
            Modulus => "%",
            Add => "+",
            Subtract => "-",
            LeftShift => "<<",
            RightShift => ">>",
            LessThan => "<",
            LessThanEqual => "<=",
            GreaterThan => ">",
            GreaterThanEqual => ">=",
            EqualTo => "==",
            NotEqualTo => "!=",
            BitAnd => "&",
            BitXor => "^",
            BitOr => "|",
            LogicalAnd => "&&",
            LogicalOr => "||",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    LeftShift,
    RightShift,
    And,
    Or,
    Xor,
}

impl AssignOp {
    pub fn lexeme(self) -> &'static str {
        use AssignOp::*;
        match self {
            Assign => "=",
            Add => "+=",
            Subtract => "-=",
            Multiply => "*=",
            Divide => "/=",
            Modulus => "%=",
            LeftShift => "<<=",
            RightShift => ">>=",
            And => "&=",
            Or => "|=",
            Xor => "^=",
        }
    }
}

/// Discriminant of [`Node`], used to select nodes when walking a tree.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    Number,
    String,
    ChipId,
    ProgramCounter,
    Identifier,
    Unary,
    Postfix,
    Binary,
    Assign,
    Call,
}

/// An operand expression.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    /// `literal` is the source spelling and is what gets printed, so a pass
    /// may restyle it without touching `value`, or the other way round.
    Number { value: u64, radix: Radix, literal: String },
    /// Raw text including its quotes, `"text"` or `'c'`.
    String { value: String },
    /// A device name such as `16f1939`. Lexes like a number, means a name.
    ChipId { text: String },
    ProgramCounter,
    Identifier { name: String },
    /// `lexeme` is the operator as it was written (`LOW`, `high`, `~`, ...).
    Unary { op: UnaryOp, lexeme: String, operand: Box<Node> },
    Postfix { op: PostfixOp, operand: Box<Node> },
    Binary { op: BinaryOp, left: Box<Node>, right: Box<Node> },
    Assign { op: AssignOp, left: Box<Node>, right: Box<Node> },
    /// `callee` is always an identifier.
    Call { callee: Box<Node>, args: Vec<Node> },
}

impl Node {
    pub fn identifier(name: impl Into<String>) -> Node {
        Node::Identifier { name: name.into() }
    }

    /// Builds a prefix node spelled with the operator's own symbol
    /// (keywords are spelled in lowercase).
    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        let lexeme = match (op, op.symbol()) {
            (_, Some(symbol)) => symbol.to_string(),
            (UnaryOp::High, None) => "high".to_string(),
            (UnaryOp::Low, None) => "low".to_string(),
            (_, None) => "upper".to_string(),
        };
        Node::Unary { op, lexeme, operand: Box::new(operand) }
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn assign(op: AssignOp, left: Node, right: Node) -> Node {
        Node::Assign { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Number { .. } => NodeKind::Number,
            Node::String { .. } => NodeKind::String,
            Node::ChipId { .. } => NodeKind::ChipId,
            Node::ProgramCounter => NodeKind::ProgramCounter,
            Node::Identifier { .. } => NodeKind::Identifier,
            Node::Unary { .. } => NodeKind::Unary,
            Node::Postfix { .. } => NodeKind::Postfix,
            Node::Binary { .. } => NodeKind::Binary,
            Node::Assign { .. } => NodeKind::Assign,
            Node::Call { .. } => NodeKind::Call,
        }
    }

    /// The name of an identifier node.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Node::Identifier { name } => Some(name),
            _ => None,
        }
    }

    /// How tightly this node holds together when it appears as an operand
    /// of another operator. Leaves and calls never need grouping.
    pub fn binding_power(&self) -> u8 {
        match self {
            Node::Binary { op, .. } => op.binding_power(),
            Node::Assign { .. } => ASSIGN_POWER,
            Node::Unary { op, .. } => op.operand_power(),
            Node::Postfix { .. } => POSTFIX_POWER,
            _ => u8::MAX,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Pragma {
    pub pragma: String,
    pub value: String,
    pub comment: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Define {
    pub name: String,
    pub operands: Vec<Node>,
    pub comment: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Statement {
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub operands: Vec<Node>,
    pub comment: Option<String>,
}

impl Statement {
    /// Case-insensitive mnemonic comparison.
    pub fn has_mnemonic(&self, mnemonic: &str) -> bool {
        self.mnemonic.as_deref().map_or(false, |m| m.eq_ignore_ascii_case(mnemonic))
    }

    /// True for a line with nothing on it at all.
    pub fn is_blank(&self) -> bool {
        self.label.is_none() && self.mnemonic.is_none() && self.operands.is_empty() && self.comment.is_none()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SourceLine {
    Pragma(Pragma),
    Define(Define),
    Statement(Statement),
}

impl SourceLine {
    pub fn as_statement(&self) -> Option<&Statement> {
        match self {
            SourceLine::Statement(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_statement_mut(&mut self) -> Option<&mut Statement> {
        match self {
            SourceLine::Statement(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SourceLine::Pragma(_) => "pragma",
            SourceLine::Define(_) => "define",
            SourceLine::Statement(_) => "statement",
        }
    }
}

/// A parsed file. `lines[i]` is line `i` of the input.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Program {
    pub lines: Vec<SourceLine>,
}

impl Program {
    pub fn new(lines: Vec<SourceLine>) -> Self {
        Program { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn insert(&mut self, index: usize, line: SourceLine) {
        self.lines.insert(index, line);
    }

    pub fn remove(&mut self, index: usize) -> SourceLine {
        self.lines.remove(index)
    }

    /// Replaces the line at `index` with `replacement`, which may hold any
    /// number of lines. Indices taken before the call are stale afterwards.
    pub fn splice(&mut self, index: usize, replacement: Vec<SourceLine>) {
        self.lines.splice(index..=index, replacement);
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.lines.iter().filter_map(SourceLine::as_statement)
    }

    pub fn statements_mut(&mut self) -> impl Iterator<Item = &mut Statement> {
        self.lines.iter_mut().filter_map(SourceLine::as_statement_mut)
    }
}
