//! Lexical scope chain
//!
//! Scopes are entered and left in strict nesting order, so the chain is kept
//! as an arena indexed by [`ScopeId`] where the current scope is always the
//! last one. Entities are [`NodeId`]s; the scope never owns the nodes.

use log::trace;

use crate::frontend::ast::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// What opened a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeFlags(u32);

impl ScopeFlags {
    pub const NONE: Self = Self(0);
    pub const GLOBAL: Self = Self(1 << 0);
    pub const FUNCTION: Self = Self(1 << 1);
    pub const STRUCT: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug)]
pub struct Scope {
    pub flags: ScopeFlags,
    /// Declared entities, oldest first
    pub entities: Vec<NodeId>,
    /// Sum of the sizes passed to [`ScopeChain::declare`]
    pub size: usize,
    pub parent: Option<ScopeId>,
}

impl Scope {
    fn new(flags: ScopeFlags, parent: Option<ScopeId>) -> Self {
        Self {
            flags,
            entities: Vec::new(),
            size: 0,
            parent,
        }
    }
}

/// Stack of nested scopes for one compilation
#[derive(Debug)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

impl ScopeChain {
    /// Create a chain holding only the root scope
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeFlags::GLOBAL, None)],
        }
    }

    pub fn root(&self) -> Option<ScopeId> {
        (!self.scopes.is_empty()).then_some(ScopeId(0))
    }

    pub fn current(&self) -> Option<ScopeId> {
        self.scopes.len().checked_sub(1).map(ScopeId)
    }

    /// Depth of the current scope, the root being 0
    pub fn depth(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    fn current_scope_mut(&mut self) -> &mut Scope {
        self.scopes
            .last_mut()
            .expect("scope chain used after its root was destroyed")
    }

    /// Open a child of the current scope and make it current
    pub fn enter(&mut self, flags: ScopeFlags) -> ScopeId {
        let parent = self.current();
        assert!(parent.is_some(), "scope chain used after its root was destroyed");
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(flags, parent));
        trace!("enter scope {} ({:?})", id.0, flags);
        id
    }

    /// Leave the current scope, discarding it and its entities. Leaving the
    /// root destroys it.
    pub fn exit(&mut self) -> Scope {
        let scope = self
            .scopes
            .pop()
            .expect("scope chain used after its root was destroyed");
        trace!("exit scope {} ({} entities, {} bytes)", self.scopes.len(), scope.entities.len(), scope.size);
        scope
    }

    /// Destroy the root scope. Only valid while the root is current.
    pub fn free_root(&mut self) {
        assert_eq!(self.scopes.len(), 1, "root scope freed while a nested scope is current");
        self.scopes.clear();
    }

    /// Record `entity` in the current scope and return the scope's new size.
    /// `None` if the size would overflow; nothing is recorded then.
    pub fn declare(&mut self, entity: NodeId, size: usize) -> Option<usize> {
        let scope = self.current_scope_mut();
        scope.size = scope.size.checked_add(size)?;
        scope.entities.push(entity);
        Some(scope.size)
    }

    /// Most recently declared entity of `scope`
    pub fn last_entity_at(&self, scope: ScopeId) -> Option<NodeId> {
        self.get(scope).entities.last().copied()
    }

    /// Walk from the current scope outwards and return the last entity of the
    /// first scope that has one. The walk ends before reaching `stop_at`.
    pub fn lookup_nearest(&self, stop_at: Option<ScopeId>) -> Option<NodeId> {
        let mut next = self.current();
        while let Some(id) = next {
            if Some(id) == stop_at {
                return None;
            }
            if let Some(entity) = self.last_entity_at(id) {
                return Some(entity);
            }
            next = self.get(id).parent;
        }
        None
    }

    /// Iterate the current scope's entities newest first
    pub fn iter_back(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.scopes.last().into_iter().flat_map(|s| s.entities.iter().rev().copied())
    }
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{Ast, NodeKind};
    use crate::utils::Position;
    use pretty_assertions::assert_eq;

    fn entity(ast: &mut Ast, name: &str) -> NodeId {
        ast.push(NodeKind::Identifier(name.into()), Position::dummy())
    }

    #[test]
    fn test_scope_law() {
        let mut ast = Ast::new();
        let x = entity(&mut ast, "x");
        let y = entity(&mut ast, "y");

        let mut chain = ScopeChain::new();
        chain.enter(ScopeFlags::NONE);
        chain.declare(x, 4);
        chain.enter(ScopeFlags::NONE);
        chain.declare(y, 4);
        assert_eq!(chain.lookup_nearest(None), Some(y));

        let inner = chain.exit();
        assert_eq!(inner.entities, vec![y]);
        assert_eq!(chain.lookup_nearest(None), Some(x));
    }

    #[test]
    fn test_lookup_skips_empty_scopes() {
        let mut ast = Ast::new();
        let g = entity(&mut ast, "g");

        let mut chain = ScopeChain::new();
        chain.declare(g, 4);
        chain.enter(ScopeFlags::FUNCTION);
        chain.enter(ScopeFlags::NONE);
        assert_eq!(chain.lookup_nearest(None), Some(g));
        assert_eq!(chain.depth(), 2);
    }

    #[test]
    fn test_lookup_stops_at_scope() {
        let mut ast = Ast::new();
        let g = entity(&mut ast, "g");
        let a = entity(&mut ast, "a");

        let mut chain = ScopeChain::new();
        chain.declare(g, 4);
        let func = chain.enter(ScopeFlags::FUNCTION);
        chain.enter(ScopeFlags::NONE);
        assert_eq!(chain.lookup_nearest(Some(func)), None);

        chain.exit();
        chain.declare(a, 1);
        assert_eq!(chain.lookup_nearest(chain.root()), Some(a));
        assert_eq!(chain.get(func).size, 1);
    }

    #[test]
    fn test_iter_back_is_newest_first() {
        let mut ast = Ast::new();
        let a = entity(&mut ast, "a");
        let b = entity(&mut ast, "b");

        let mut chain = ScopeChain::new();
        chain.declare(a, 1);
        chain.declare(b, 2);
        assert_eq!(chain.iter_back().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(chain.get(chain.root().unwrap()).size, 3);
    }

    #[test]
    fn test_declare_rejects_size_overflow() {
        let mut ast = Ast::new();
        let big = entity(&mut ast, "big");
        let more = entity(&mut ast, "more");

        let mut chain = ScopeChain::new();
        assert_eq!(chain.declare(big, usize::MAX - 1), Some(usize::MAX - 1));
        assert_eq!(chain.declare(more, 2), None);
        assert_eq!(chain.iter_back().collect::<Vec<_>>(), vec![big]);
        assert_eq!(chain.get(chain.root().unwrap()).size, usize::MAX - 1);
    }

    #[test]
    fn test_exit_root_destroys_chain() {
        let mut chain = ScopeChain::new();
        chain.exit();
        assert_eq!(chain.root(), None);
        assert_eq!(chain.current(), None);
    }

    #[test]
    #[should_panic(expected = "root scope freed while a nested scope is current")]
    fn test_free_root_with_nested_scope_panics() {
        let mut chain = ScopeChain::new();
        chain.enter(ScopeFlags::NONE);
        chain.free_root();
    }
}
