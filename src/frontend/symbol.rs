//! Symbol tables for named definitions (structs, unions, functions)

use std::collections::HashMap;

use crate::frontend::ast::NodeId;
use crate::utils::{Error, Position, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Defined by a node of the tree
    Node(NodeId),
    NativeFunction,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn node(&self) -> Option<NodeId> {
        match self.kind {
            SymbolKind::Node(id) => Some(id),
            _ => None,
        }
    }
}

/// Stack of symbol tables, innermost last
#[derive(Debug)]
pub struct SymbolTables {
    tables: Vec<HashMap<String, Symbol>>,
}

impl SymbolTables {
    /// Create the stack with the global table
    pub fn new() -> Self {
        Self {
            tables: vec![HashMap::new()],
        }
    }

    pub fn push_table(&mut self) {
        self.tables.push(HashMap::new());
    }

    /// Drop the innermost table. The global table is kept.
    pub fn pop_table(&mut self) {
        if self.tables.len() > 1 {
            self.tables.pop();
        }
    }

    /// Register `name` in the innermost table
    pub fn register(&mut self, name: &str, kind: SymbolKind, pos: &Position) -> Result<()> {
        let table = self.tables.last_mut().expect("global symbol table is never popped");
        if table.contains_key(name) {
            return Err(Error::DuplicateSymbol {
                name: name.to_string(),
                pos: pos.clone(),
            });
        }
        table.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                kind,
            },
        );
        Ok(())
    }

    /// Replace the definition of `name` in the innermost table
    pub fn redefine(&mut self, name: &str, kind: SymbolKind) {
        if let Some(table) = self.tables.last_mut() {
            table.insert(
                name.to_string(),
                Symbol {
                    name: name.to_string(),
                    kind,
                },
            );
        }
    }

    /// Look `name` up, innermost table first
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.tables.iter().rev().find_map(|table| table.get(name))
    }

    /// Look `name` up in the innermost table only
    pub fn get_local(&self, name: &str) -> Option<&Symbol> {
        self.tables.last().and_then(|table| table.get(name))
    }
}

impl Default for SymbolTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{Ast, NodeKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_and_shadow() {
        let mut ast = Ast::new();
        let outer = ast.push(NodeKind::Blank, Position::dummy());
        let inner = ast.push(NodeKind::Blank, Position::dummy());

        let mut symbols = SymbolTables::new();
        symbols.register("point", SymbolKind::Node(outer), &Position::dummy()).unwrap();
        symbols.push_table();
        assert!(symbols.get_local("point").is_none());
        symbols.register("point", SymbolKind::Node(inner), &Position::dummy()).unwrap();
        assert_eq!(symbols.get("point").and_then(Symbol::node), Some(inner));

        symbols.pop_table();
        assert_eq!(symbols.get("point").and_then(Symbol::node), Some(outer));
    }

    #[test]
    fn test_duplicate_is_an_error() {
        let mut symbols = SymbolTables::new();
        symbols.register("f", SymbolKind::NativeFunction, &Position::dummy()).unwrap();
        let err = symbols.register("f", SymbolKind::Unknown, &Position::dummy()).unwrap_err();
        assert!(matches!(err, Error::DuplicateSymbol { ref name, .. } if name == "f"));
        assert_eq!(symbols.get("f").map(|s| s.kind), Some(SymbolKind::NativeFunction));
    }
}
