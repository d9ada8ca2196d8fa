//! Token definitions for cmmc

use std::fmt;

use crate::utils::Position;

/// Words the lexer reports as [`TokenKind::Keyword`]
pub const KEYWORDS: &[&str] = &[
    "unsigned",
    "signed",
    "char",
    "short",
    "int",
    "float",
    "double",
    "long",
    "void",
    "struct",
    "union",
    "static",
    "__ignore_typecheck__",
    "return",
    "include",
    "sizeof",
    "if",
    "else",
    "while",
    "for",
    "do",
    "break",
    "continue",
    "switch",
    "case",
    "default",
    "goto",
    "typedef",
    "const",
    "extern",
    "restrict",
];

/// Every operator spelling the lexer accepts
pub const OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "!", "^", "+=", "-=", "*=", "/=", ">>=", "<<=", ">>", "<<", ">=", "<=",
    ">", "<", "||", "&&", "|", "&", "++", "--", "=", "!=", "==", "->", "(", "[", ",", ".", "...",
    "~", "?", "%",
];

/// Primitive type keywords, in the order the datatype resolver knows them
pub const PRIMITIVE_TYPES: &[&str] = &["void", "char", "short", "int", "long", "float", "double"];

/// Subtype recorded on number literals from their suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberKind {
    #[default]
    Normal,
    /// `L` suffix
    Long,
    /// `f` suffix
    Float,
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Keyword(String),
    Operator(String),
    String(String),
    Number { value: u64, kind: NumberKind },
    Comment(String),
    Newline,
    Symbol(char),
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
    /// Set when a space or tab directly follows the token
    pub whitespace: bool,
    /// Raw text read since the innermost unclosed `(`, if any
    pub between_brackets: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Position) -> Self {
        Self {
            kind,
            pos,
            whitespace: false,
            between_brackets: None,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if k == keyword)
    }

    pub fn is_symbol(&self, sym: char) -> bool {
        matches!(self.kind, TokenKind::Symbol(c) if c == sym)
    }

    pub fn is_operator(&self, op: &str) -> bool {
        matches!(&self.kind, TokenKind::Operator(o) if o == op)
    }

    pub fn is_primitive_keyword(&self) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if is_primitive_type(k))
    }

    /// Newlines, comments and `\` line continuations carry no meaning for the parser
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Newline | TokenKind::Comment(_)) || self.is_symbol('\\')
    }
}

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

pub fn is_valid_operator(s: &str) -> bool {
    OPERATORS.contains(&s)
}

pub fn is_primitive_type(s: &str) -> bool {
    PRIMITIVE_TYPES.contains(&s)
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s) => write!(f, "identifier '{}'", s),
            TokenKind::Keyword(s) => write!(f, "keyword '{}'", s),
            TokenKind::Operator(s) => write!(f, "operator '{}'", s),
            TokenKind::String(s) => write!(f, "string \"{}\"", s),
            TokenKind::Number { value, .. } => write!(f, "number {}", value),
            TokenKind::Comment(_) => write!(f, "comment"),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Symbol(c) => write!(f, "symbol '{}'", c),
        }
    }
}
