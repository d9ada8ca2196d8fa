//! Frontend module - Lexer, Parser, Scopes and Symbols

pub mod ast;
pub mod decl;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod stmt;
pub mod symbol;
pub mod token;
