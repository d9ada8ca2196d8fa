//! Parser for cmmc
//!
//! Recursive descent over the token vector. Expressions are built as a
//! right-leaning spine and fixed up by the reorder pass in [`super::expr`];
//! declarations, datatypes and statements live in [`super::decl`] and
//! [`super::stmt`].

use log::debug;

use crate::frontend::ast::{Ast, NodeId};
use crate::frontend::expr::starts_expression;
use crate::frontend::scope::ScopeChain;
use crate::frontend::symbol::SymbolTables;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Diagnostic, Diagnostics, Error, Position, Result};

/// Output of a successful parse
#[derive(Debug)]
pub struct Program {
    pub ast: Ast,
    /// Top-level nodes in source order
    pub roots: Vec<NodeId>,
    pub warnings: Vec<Diagnostic>,
}

/// Context flags handed down through nested parse calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct History {
    flags: u32,
}

impl History {
    /// A top-level `,` ends the expression (declarator initializers)
    pub const STOP_AT_COMMA: u32 = 1 << 0;
    /// Parsing inside a function or struct body
    pub const IN_BODY: u32 = 1 << 1;
    /// The false branch of `?:` ends before an assignment or `,`
    pub const TERNARY_BRANCH: u32 = 1 << 2;

    pub fn with(self, flag: u32) -> Self {
        Self {
            flags: self.flags | flag,
        }
    }

    pub fn without(self, flag: u32) -> Self {
        Self {
            flags: self.flags & !flag,
        }
    }

    pub fn has(self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// History for an expression closed by its own delimiter, like `( )` or `[ ]`
    pub fn nested(self) -> Self {
        self.without(Self::STOP_AT_COMMA | Self::TERNARY_BRANCH)
    }
}

/// Cases collected for the innermost `switch`
#[derive(Debug, Default)]
pub(crate) struct SwitchFrame {
    pub cases: Vec<NodeId>,
    pub has_default: bool,
}

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub(crate) ast: Ast,
    pub(crate) scopes: ScopeChain,
    pub(crate) symbols: SymbolTables,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) switches: Vec<SwitchFrame>,
    pub(crate) anonymous_count: usize,
    eof_pos: Position,
}

impl Parser {
    /// Create a parser from pre-tokenized input
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_pos = tokens.last().map(|t| t.pos.clone()).unwrap_or_default();
        Self {
            tokens,
            pos: 0,
            ast: Ast::new(),
            scopes: ScopeChain::new(),
            symbols: SymbolTables::new(),
            diagnostics: Diagnostics::new(),
            switches: Vec::new(),
            anonymous_count: 0,
            eof_pos,
        }
    }

    // ==================== Helper Methods ====================

    /// `n`-th meaningful token ahead of the cursor
    pub(crate) fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens[self.pos..].iter().filter(|t| !t.is_trivia()).nth(n)
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.peek_nth(0)
    }

    fn skip_trivia(&mut self) {
        while self.tokens.get(self.pos).is_some_and(Token::is_trivia) {
            self.pos += 1;
        }
    }

    pub(crate) fn next_token(&mut self) -> Option<Token> {
        self.skip_trivia();
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Position of the next meaningful token, or of the end of input
    pub(crate) fn current_pos(&self) -> Position {
        self.peek().map(|t| t.pos.clone()).unwrap_or_else(|| self.eof_pos.clone())
    }

    pub(crate) fn check_operator(&self, op: &str) -> bool {
        self.peek().is_some_and(|t| t.is_operator(op))
    }

    pub(crate) fn check_symbol(&self, sym: char) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(sym))
    }

    pub(crate) fn check_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    pub(crate) fn consume_operator(&mut self, op: &str) -> bool {
        if self.check_operator(op) {
            self.next_token();
            true
        } else {
            false
        }
    }

    pub(crate) fn consume_symbol(&mut self, sym: char) -> bool {
        if self.check_symbol(sym) {
            self.next_token();
            true
        } else {
            false
        }
    }

    /// Error describing the token at the cursor as not being `expected`
    pub(crate) fn unexpected(&self, expected: &str) -> Error {
        match self.peek() {
            Some(token) => Error::UnexpectedToken {
                expected: expected.to_string(),
                got: token.kind.to_string(),
                pos: token.pos.clone(),
            },
            None => Error::UnexpectedEof {
                expected: expected.to_string(),
                pos: self.eof_pos.clone(),
            },
        }
    }

    pub(crate) fn expect_symbol(&mut self, sym: char) -> Result<Token> {
        if !self.check_symbol(sym) {
            return Err(self.unexpected(&format!("'{}'", sym)));
        }
        self.next_token().ok_or_else(|| self.unexpected(&format!("'{}'", sym)))
    }

    pub(crate) fn expect_operator(&mut self, op: &str) -> Result<Token> {
        if !self.check_operator(op) {
            return Err(self.unexpected(&format!("'{}'", op)));
        }
        self.next_token().ok_or_else(|| self.unexpected(&format!("'{}'", op)))
    }

    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> Result<Token> {
        if !self.check_keyword(keyword) {
            return Err(self.unexpected(&format!("'{}'", keyword)));
        }
        self.next_token().ok_or_else(|| self.unexpected(&format!("'{}'", keyword)))
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<(String, Position)> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                pos,
                ..
            }) => {
                let found = (name.clone(), pos.clone());
                self.next_token();
                Ok(found)
            }
            Some(token) => Err(Error::ExpectedIdentifier {
                got: token.kind.to_string(),
                pos: token.pos.clone(),
            }),
            None => Err(Error::ExpectedIdentifier {
                got: "end of input".to_string(),
                pos: self.eof_pos.clone(),
            }),
        }
    }

    // ==================== Parsing Methods ====================

    /// Parse the whole token vector
    pub fn parse(mut self) -> Result<Program> {
        let mut roots = Vec::new();

        while self.peek().is_some() {
            if let Some(node) = self.parse_next()? {
                roots.push(node);
            }
        }

        self.scopes.free_root();
        debug!("parsed {} top-level nodes ({} nodes total)", roots.len(), self.ast.len());

        Ok(Program {
            ast: self.ast,
            roots,
            warnings: self.diagnostics.into_vec(),
        })
    }

    /// Parse one top-level construct. `None` means tokens were skipped.
    fn parse_next(&mut self) -> Result<Option<NodeId>> {
        let Some(kind) = self.peek().map(|t| t.kind.clone()) else {
            return Ok(None);
        };

        let history = History::default();
        match &kind {
            TokenKind::Number { .. } | TokenKind::String(_) | TokenKind::Identifier(_) => {
                let node = self.parse_expression(history)?;
                self.consume_symbol(';');
                Ok(Some(node))
            }
            TokenKind::Operator(op) if starts_expression(op) => {
                let node = self.parse_expression(history)?;
                self.consume_symbol(';');
                Ok(Some(node))
            }
            TokenKind::Keyword(_) => self.parse_variable_function_or_struct_union(history).map(Some),
            TokenKind::Symbol('#') => {
                self.skip_directive();
                Ok(None)
            }
            _ => {
                self.next_token();
                Ok(None)
            }
        }
    }

    /// Skip a `#` line up to (not including) its newline
    fn skip_directive(&mut self) {
        self.skip_trivia();
        while let Some(token) = self.tokens.get(self.pos) {
            if token.kind == TokenKind::Newline {
                break;
            }
            self.pos += 1;
        }
    }
}
