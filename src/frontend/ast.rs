//! Syntax tree definitions for cmmc
//!
//! Nodes live in an [`Ast`] arena and refer to each other through [`NodeId`]
//! handles. A parent always owns its children; the [`Binding`] ids on every
//! node are plain lookups of the enclosing body and function.

use std::fmt::Write as _;
use std::ops::{BitOr, BitOrAssign};

use crate::frontend::token::NumberKind;
use crate::types::Datatype;
use crate::utils::Position;

/// Stable handle of a node in an [`Ast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeFlags(u32);

impl NodeFlags {
    pub const NONE: Self = Self(0);
    pub const INSIDE_EXPRESSION: Self = Self(1 << 0);
    pub const CLONED: Self = Self(1 << 1);
    pub const FORWARD_DECLARATION: Self = Self(1 << 2);
    pub const HAS_VARIABLE_COMBINED: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for NodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Non-owning links to the enclosing body and function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Binding {
    pub owner: Option<NodeId>,
    pub function: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Position,
    pub flags: NodeFlags,
    pub binding: Binding,
}

/// Variable declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub datatype: Datatype,
    pub name: Option<String>,
    /// Initializer expression
    pub value: Option<NodeId>,
}

/// Statement block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub statements: Vec<NodeId>,
    /// Bytes taken by the variables declared directly in the body
    pub size: usize,
    pub padded: bool,
    /// Largest variable declared directly in the body
    pub largest_var: Option<NodeId>,
}

/// Function definition or prototype
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub return_type: Datatype,
    pub name: String,
    /// Argument [`Variable`] nodes
    pub args: Vec<NodeId>,
    /// Declared with a trailing `...`
    pub variadic: bool,
    /// `None` for a prototype
    pub body: Option<NodeId>,
    /// Bytes the caller pushes for the arguments
    pub stack_size: usize,
}

/// Struct or union definition
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub name: String,
    /// `None` for a forward declaration
    pub body: Option<NodeId>,
    /// Variable declared together with the definition (`struct a {...} x;`)
    pub var: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Binary expression `left op right`
    Expression {
        left: NodeId,
        right: NodeId,
        op: String,
    },
    /// `( expr )`, also the argument list of a call
    Parentheses { expr: Option<NodeId> },
    Number { value: u64, kind: NumberKind },
    Identifier(String),
    String(String),
    Variable(Variable),
    /// Declarators sharing one base type (`int a, b;`)
    VariableList(Vec<NodeId>),
    Function(Function),
    Body(Body),
    Return { value: Option<NodeId> },
    If {
        condition: NodeId,
        body: NodeId,
        /// An `Else` node or a chained `If`
        otherwise: Option<NodeId>,
    },
    Else { body: NodeId },
    While { condition: NodeId, body: NodeId },
    DoWhile { body: NodeId, condition: NodeId },
    For {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    },
    Break,
    Continue,
    Switch {
        expression: NodeId,
        body: NodeId,
        cases: Vec<NodeId>,
        has_default: bool,
    },
    Case { expression: NodeId },
    Default,
    Goto { label: String },
    /// Branches of `cond ? a : b`; the condition is the left side of the `?` expression
    Ternary { true_node: NodeId, false_node: NodeId },
    Label { name: String },
    Unary {
        op: String,
        operand: NodeId,
        postfix: bool,
    },
    Struct(Aggregate),
    Union(Aggregate),
    /// `[ expr ]` of an index expression
    Bracket { inner: NodeId },
    Cast { datatype: Datatype, operand: NodeId },
    /// Empty statement
    Blank,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Expression { .. } => "Expression",
            Self::Parentheses { .. } => "Parentheses",
            Self::Number { .. } => "Number",
            Self::Identifier(_) => "Identifier",
            Self::String(_) => "String",
            Self::Variable(_) => "Variable",
            Self::VariableList(_) => "VariableList",
            Self::Function(_) => "Function",
            Self::Body(_) => "Body",
            Self::Return { .. } => "Return",
            Self::If { .. } => "If",
            Self::Else { .. } => "Else",
            Self::While { .. } => "While",
            Self::DoWhile { .. } => "DoWhile",
            Self::For { .. } => "For",
            Self::Break => "Break",
            Self::Continue => "Continue",
            Self::Switch { .. } => "Switch",
            Self::Case { .. } => "Case",
            Self::Default => "Default",
            Self::Goto { .. } => "Goto",
            Self::Ternary { .. } => "Ternary",
            Self::Label { .. } => "Label",
            Self::Unary { .. } => "Unary",
            Self::Struct(_) => "Struct",
            Self::Union(_) => "Union",
            Self::Bracket { .. } => "Bracket",
            Self::Cast { .. } => "Cast",
            Self::Blank => "Blank",
        }
    }

    /// Nodes owned by this one, in source order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Self::Expression { left, right, .. } => vec![*left, *right],
            Self::Parentheses { expr } => expr.iter().copied().collect(),
            Self::Variable(var) => var.value.iter().copied().collect(),
            Self::VariableList(vars) => vars.clone(),
            Self::Function(func) => func.args.iter().chain(func.body.iter()).copied().collect(),
            Self::Body(body) => body.statements.clone(),
            Self::Return { value } => value.iter().copied().collect(),
            Self::If {
                condition,
                body,
                otherwise,
            } => [Some(*condition), Some(*body), *otherwise].into_iter().flatten().collect(),
            Self::Else { body } => vec![*body],
            Self::While { condition, body } => vec![*condition, *body],
            Self::DoWhile { body, condition } => vec![*body, *condition],
            Self::For {
                init,
                condition,
                step,
                body,
            } => [*init, *condition, *step, Some(*body)].into_iter().flatten().collect(),
            Self::Switch { expression, body, .. } => vec![*expression, *body],
            Self::Case { expression } => vec![*expression],
            Self::Ternary {
                true_node,
                false_node,
            } => vec![*true_node, *false_node],
            Self::Unary { operand, .. } => vec![*operand],
            Self::Struct(agg) | Self::Union(agg) => agg.body.iter().chain(agg.var.iter()).copied().collect(),
            Self::Bracket { inner } => vec![*inner],
            Self::Cast { operand, .. } => vec![*operand],
            Self::Number { .. }
            | Self::Identifier(_)
            | Self::String(_)
            | Self::Break
            | Self::Continue
            | Self::Default
            | Self::Goto { .. }
            | Self::Label { .. }
            | Self::Blank => Vec::new(),
        }
    }
}

/// Arena owning every node of one compilation unit
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose children already exist
    pub fn push(&mut self, kind: NodeKind, pos: Position) -> NodeId {
        let id = NodeId(self.nodes.len());
        debug_assert!(
            kind.children().iter().all(|child| *child < id),
            "{} built before its children",
            kind.name()
        );
        self.nodes.push(Node {
            kind,
            pos,
            flags: NodeFlags::NONE,
            binding: Binding::default(),
        });
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node with its id, in creation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().enumerate().map(|(index, node)| (NodeId(index), node))
    }

    pub fn set_flag(&mut self, id: NodeId, flag: NodeFlags) {
        self.nodes[id.0].flags |= flag;
    }

    pub fn as_variable(&self, id: NodeId) -> Option<&Variable> {
        match self.kind(id) {
            NodeKind::Variable(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_body(&self, id: NodeId) -> Option<&Body> {
        match self.kind(id) {
            NodeKind::Body(body) => Some(body),
            _ => None,
        }
    }

    /// Point every not yet owned descendant of `body` at it
    pub fn bind_owner(&mut self, body: NodeId) {
        let mut stack = self.kind(body).children();
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id.0];
            if node.binding.owner.is_some() {
                continue;
            }
            node.binding.owner = Some(body);
            stack.extend(node.kind.children());
        }
    }

    /// Point every descendant of `function` at it
    pub fn bind_function(&mut self, function: NodeId) {
        let mut stack = self.kind(function).children();
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.binding.function = Some(function);
            stack.extend(node.kind.children());
        }
    }

    /// Compact prefix rendering of an expression tree, e.g. `(+ 1 (* 2 3))`
    pub fn sexpr(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Expression { left, right, op } => {
                format!("({} {} {})", op, self.sexpr(*left), self.sexpr(*right))
            }
            NodeKind::Parentheses { expr: Some(expr) } => format!("(paren {})", self.sexpr(*expr)),
            NodeKind::Parentheses { expr: None } => "(paren)".to_string(),
            NodeKind::Number { value, .. } => value.to_string(),
            NodeKind::Identifier(name) => name.clone(),
            NodeKind::String(s) => format!("{:?}", s),
            NodeKind::Unary { op, operand, postfix } => {
                let fix = if *postfix { "post" } else { "" };
                format!("({}{} {})", fix, op, self.sexpr(*operand))
            }
            NodeKind::Ternary {
                true_node,
                false_node,
            } => format!("(: {} {})", self.sexpr(*true_node), self.sexpr(*false_node)),
            NodeKind::Bracket { inner } => format!("[{}]", self.sexpr(*inner)),
            NodeKind::Cast { datatype, operand } => format!("(cast {} {})", datatype, self.sexpr(*operand)),
            other => other.name().to_string(),
        }
    }

    /// Indented multi-line dump of the trees rooted at `roots`
    pub fn dump(&self, roots: &[NodeId]) -> String {
        let mut out = String::new();
        for root in roots {
            self.dump_node(*root, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.get(id);
        let detail = match &node.kind {
            NodeKind::Expression { op, .. } | NodeKind::Unary { op, .. } => format!(" {}", op),
            NodeKind::Number { value, .. } => format!(" {}", value),
            NodeKind::Identifier(name) => format!(" {}", name),
            NodeKind::String(s) => format!(" {:?}", s),
            NodeKind::Variable(var) => format!(
                " {} {} (size {})",
                var.datatype,
                var.name.as_deref().unwrap_or("<unnamed>"),
                var.datatype.size()
            ),
            NodeKind::Function(func) => format!(" {} {}", func.return_type, func.name),
            NodeKind::Body(body) => format!(" (size {})", body.size),
            NodeKind::Struct(agg) | NodeKind::Union(agg) => format!(" {}", agg.name),
            NodeKind::Goto { label } => format!(" {}", label),
            NodeKind::Label { name } => format!(" {}", name),
            NodeKind::Cast { datatype, .. } => format!(" {}", datatype),
            _ => String::new(),
        };
        let _ = writeln!(out, "{:indent$}{}{} @{}", "", node.kind.name(), detail, node.pos, indent = depth * 2);
        for child in node.kind.children() {
            self.dump_node(child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn number(ast: &mut Ast, value: u64) -> NodeId {
        ast.push(
            NodeKind::Number {
                value,
                kind: NumberKind::Normal,
            },
            Position::dummy(),
        )
    }

    #[test]
    fn test_children_before_parent() {
        let mut ast = Ast::new();
        let one = number(&mut ast, 1);
        let two = number(&mut ast, 2);
        let exp = ast.push(
            NodeKind::Expression {
                left: one,
                right: two,
                op: "+".into(),
            },
            Position::dummy(),
        );
        assert!(one < exp && two < exp);
        assert_eq!(ast.sexpr(exp), "(+ 1 2)");
        assert_eq!(ast.kind(exp).children(), vec![one, two]);
    }

    #[test]
    fn test_bind_owner_keeps_inner_bodies() {
        let mut ast = Ast::new();
        let one = number(&mut ast, 1);
        let inner = ast.push(
            NodeKind::Body(Body {
                statements: vec![one],
                ..Body::default()
            }),
            Position::dummy(),
        );
        ast.bind_owner(inner);
        let two = number(&mut ast, 2);
        let outer = ast.push(
            NodeKind::Body(Body {
                statements: vec![inner, two],
                ..Body::default()
            }),
            Position::dummy(),
        );
        ast.bind_owner(outer);

        assert_eq!(ast.get(one).binding.owner, Some(inner));
        assert_eq!(ast.get(inner).binding.owner, Some(outer));
        assert_eq!(ast.get(two).binding.owner, Some(outer));
        assert_eq!(ast.get(outer).binding.owner, None);
    }

    #[test]
    fn test_flags() {
        let mut ast = Ast::new();
        let one = number(&mut ast, 1);
        ast.set_flag(one, NodeFlags::INSIDE_EXPRESSION);
        assert!(ast.get(one).flags.contains(NodeFlags::INSIDE_EXPRESSION));
        assert!(!ast.get(one).flags.contains(NodeFlags::CLONED));
    }
}
