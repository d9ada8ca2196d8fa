//! Expression parsing
//!
//! Binary operators are parsed into a right-leaning spine: `a op1 b op2 c`
//! first becomes `a op1 (b op2 c)`. Every new expression node is then
//! checked against its right child and rotated into `(a op1 b) op2 c` when
//! `op1` binds at least as tightly as `op2`. The rotation rewrites the two
//! nodes in place, so no node is ever rebuilt and the arena keeps children
//! ahead of their parents.

use log::trace;

use crate::frontend::ast::{NodeFlags, NodeId, NodeKind};
use crate::frontend::parser::{History, Parser};
use crate::frontend::token::TokenKind;
use crate::utils::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy)]
pub struct PrecedenceGroup {
    pub operators: &'static [&'static str],
    pub associativity: Associativity,
}

/// Operator groups, tightest binding first
pub const PRECEDENCE_GROUPS: [PrecedenceGroup; 14] = [
    PrecedenceGroup {
        operators: &["++", "--", "()", "[]", "(", "[", ".", "->"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["*", "/", "%"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["+", "-"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["<<", ">>"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["<", "<=", ">", ">="],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["==", "!="],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["&"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["^"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["|"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["&&"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["||"],
        associativity: Associativity::LeftToRight,
    },
    PrecedenceGroup {
        operators: &["?", ":"],
        associativity: Associativity::RightToLeft,
    },
    PrecedenceGroup {
        operators: &["=", "+=", "-=", "*=", "/=", "%=", "<<=", ">>=", "&=", "^=", "|="],
        associativity: Associativity::RightToLeft,
    },
    PrecedenceGroup {
        operators: &[","],
        associativity: Associativity::LeftToRight,
    },
];

/// Prefix operators accepted in front of an operand
const UNARY_OPERATORS: &[&str] = &["-", "+", "!", "~", "*", "&", "++", "--"];

/// Index of the `? :` group. Looser operators end a ternary's false branch.
const TERNARY_GROUP: usize = 11;

/// Group index and associativity of `op`
pub fn precedence_of(op: &str) -> Option<(usize, Associativity)> {
    PRECEDENCE_GROUPS
        .iter()
        .position(|group| group.operators.contains(&op))
        .map(|index| (index, PRECEDENCE_GROUPS[index].associativity))
}

/// Whether `left op_left (x op_right y)` must become `(left op_left x) op_right y`.
///
/// Within a left-to-right group equal precedence rotates too, which makes
/// `1 - 2 - 3` group as `(1 - 2) - 3`. A right-to-left operator only gives
/// way to a strictly looser one, so `a = b = c` stays `a = (b = c)`.
pub fn left_op_has_priority(op_left: &str, op_right: &str) -> bool {
    let (Some((left, associativity)), Some((right, _))) = (precedence_of(op_left), precedence_of(op_right)) else {
        return false;
    };
    match associativity {
        Associativity::LeftToRight => left <= right,
        Associativity::RightToLeft => left < right,
    }
}

/// Operators that can open an expression at statement or top level
pub(crate) fn starts_expression(op: &str) -> bool {
    op == "(" || UNARY_OPERATORS.contains(&op)
}

fn is_binary_operator(op: &str) -> bool {
    !matches!(op, "(" | "[" | "." | "->" | "++" | "--" | "!" | "~" | "...") && precedence_of(op).is_some()
}

impl Parser {
    /// Parse a full expression
    pub(crate) fn parse_expression(&mut self, history: History) -> Result<NodeId> {
        let mut left = self.parse_operand(history)?;
        while let Some(op) = self.peek_binary_operator(history) {
            left = self.parse_binary(left, op, history)?;
        }
        Ok(left)
    }

    fn peek_binary_operator(&self, history: History) -> Option<String> {
        match &self.peek()?.kind {
            TokenKind::Operator(op) if op == "," && history.has(History::STOP_AT_COMMA) => None,
            TokenKind::Operator(op)
                if history.has(History::TERNARY_BRANCH)
                    && precedence_of(op).is_some_and(|(group, _)| group > TERNARY_GROUP) =>
            {
                None
            }
            TokenKind::Operator(op) if is_binary_operator(op) => Some(op.clone()),
            _ => None,
        }
    }

    fn parse_binary(&mut self, left: NodeId, op: String, history: History) -> Result<NodeId> {
        self.next_token();
        if op == "?" {
            return self.parse_ternary(left, history);
        }

        let right = self.parse_expression(history)?;
        let exp = self.make_expression(left, right, op);
        self.reorder_expression(exp);
        Ok(exp)
    }

    /// `cond ? a : b` as `Expression(cond "?" Ternary(a, b))`
    fn parse_ternary(&mut self, condition: NodeId, history: History) -> Result<NodeId> {
        let true_node = self.parse_expression(history.nested())?;
        self.expect_symbol(':')?;
        let false_node = self.parse_expression(history.with(History::TERNARY_BRANCH))?;

        let pos = self.ast.get(true_node).pos.clone();
        let ternary = self.ast.push(
            NodeKind::Ternary {
                true_node,
                false_node,
            },
            pos,
        );
        Ok(self.make_expression(condition, ternary, "?".to_string()))
    }

    fn make_expression(&mut self, left: NodeId, right: NodeId, op: String) -> NodeId {
        self.ast.set_flag(left, NodeFlags::INSIDE_EXPRESSION);
        self.ast.set_flag(right, NodeFlags::INSIDE_EXPRESSION);
        let pos = self.ast.get(left).pos.clone();
        self.ast.push(NodeKind::Expression { left, right, op }, pos)
    }

    /// Rotate `id` while its right child binds no tighter than itself
    pub(crate) fn reorder_expression(&mut self, id: NodeId) {
        let (right, op) = match self.ast.kind(id) {
            NodeKind::Expression { right, op, .. } => (*right, op.clone()),
            _ => return,
        };
        let right_op = match self.ast.kind(right) {
            NodeKind::Expression { op, .. } => op.clone(),
            _ => return,
        };
        if !left_op_has_priority(&op, &right_op) {
            return;
        }

        trace!("reorder: '{}' before '{}'", op, right_op);
        if let Some((left, right)) = self.shift_children_left(id) {
            self.reorder_expression(left);
            self.reorder_expression(right);
        }
    }

    /// `a op1 (b op2 c)` into `(a op1 b) op2 c`. The right child's node is
    /// reused for the new left child. Returns the new children.
    fn shift_children_left(&mut self, id: NodeId) -> Option<(NodeId, NodeId)> {
        let NodeKind::Expression { left: a, right: r, op: op1 } = self.ast.kind(id).clone() else {
            return None;
        };
        let NodeKind::Expression { left: b, right: c, op: op2 } = self.ast.kind(r).clone() else {
            return None;
        };

        let a_pos = self.ast.get(a).pos.clone();
        let inner = self.ast.get_mut(r);
        inner.kind = NodeKind::Expression {
            left: a,
            right: b,
            op: op1,
        };
        inner.pos = a_pos;
        self.ast.get_mut(id).kind = NodeKind::Expression {
            left: r,
            right: c,
            op: op2,
        };
        Some((r, c))
    }

    /// A single operand: literal, identifier, parenthesized expression, cast
    /// or prefix unary, followed by any postfix operators
    fn parse_operand(&mut self, history: History) -> Result<NodeId> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("expression"));
        };

        let node = match token.kind {
            TokenKind::Number { value, kind } => {
                self.next_token();
                self.ast.push(NodeKind::Number { value, kind }, token.pos)
            }
            TokenKind::Identifier(name) => {
                self.next_token();
                self.ast.push(NodeKind::Identifier(name), token.pos)
            }
            TokenKind::String(s) => {
                self.next_token();
                self.ast.push(NodeKind::String(s), token.pos)
            }
            TokenKind::Operator(ref op) if op == "(" => {
                if self.peek_nth(1).is_some_and(|t| self.is_datatype_start(t)) {
                    self.parse_cast(history)?
                } else {
                    self.parse_parentheses(history)?
                }
            }
            TokenKind::Operator(ref op) if UNARY_OPERATORS.contains(&op.as_str()) => {
                self.next_token();
                let operand = self.parse_operand(history)?;
                self.ast.set_flag(operand, NodeFlags::INSIDE_EXPRESSION);
                self.ast.push(
                    NodeKind::Unary {
                        op: op.clone(),
                        operand,
                        postfix: false,
                    },
                    token.pos,
                )
            }
            _ => return Err(self.unexpected("expression")),
        };

        self.parse_postfix(node, history)
    }

    /// `( expr )` or `()`. Commas are operators again inside the parentheses.
    fn parse_parentheses(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_operator("(")?.pos;
        if self.consume_symbol(')') {
            return Ok(self.ast.push(NodeKind::Parentheses { expr: None }, pos));
        }

        let expr = self.parse_expression(history.nested())?;
        self.expect_symbol(')')?;
        self.ast.set_flag(expr, NodeFlags::INSIDE_EXPRESSION);
        Ok(self.ast.push(NodeKind::Parentheses { expr: Some(expr) }, pos))
    }

    /// `(datatype) operand`
    fn parse_cast(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_operator("(")?.pos;
        let datatype = self.parse_datatype()?;
        self.expect_symbol(')')?;
        let operand = self.parse_operand(history)?;
        self.ast.set_flag(operand, NodeFlags::INSIDE_EXPRESSION);
        Ok(self.ast.push(NodeKind::Cast { datatype, operand }, pos))
    }

    /// Calls, indexing, member access and postfix `++`/`--`
    fn parse_postfix(&mut self, mut node: NodeId, history: History) -> Result<NodeId> {
        loop {
            if self.check_operator("(") {
                let args = self.parse_parentheses(history)?;
                node = self.make_expression(node, args, "()".to_string());
            } else if self.check_operator("[") {
                let pos = self.expect_operator("[")?.pos;
                let inner = self.parse_expression(history.nested())?;
                self.expect_symbol(']')?;
                let bracket = self.ast.push(NodeKind::Bracket { inner }, pos);
                node = self.make_expression(node, bracket, "[]".to_string());
            } else if self.check_operator(".") || self.check_operator("->") {
                let Some(token) = self.next_token() else {
                    break;
                };
                let TokenKind::Operator(op) = token.kind else {
                    break;
                };
                let (name, pos) = self.expect_identifier()?;
                let member = self.ast.push(NodeKind::Identifier(name), pos);
                node = self.make_expression(node, member, op);
            } else if self.check_operator("++") || self.check_operator("--") {
                let Some(token) = self.next_token() else {
                    break;
                };
                let TokenKind::Operator(op) = token.kind else {
                    break;
                };
                self.ast.set_flag(node, NodeFlags::INSIDE_EXPRESSION);
                let pos = self.ast.get(node).pos.clone();
                node = self.ast.push(
                    NodeKind::Unary {
                        op,
                        operand: node,
                        postfix: true,
                    },
                    pos,
                );
            } else {
                break;
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::lex;
    use pretty_assertions::assert_eq;

    fn expr(source: &str) -> String {
        let tokens = lex(source, "expr.cmm").unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        assert_eq!(program.roots.len(), 1, "expected a single root for {:?}", source);
        program.ast.sexpr(program.roots[0])
    }

    #[test]
    fn test_precedence_table() {
        assert_eq!(precedence_of("*"), Some((1, Associativity::LeftToRight)));
        assert_eq!(precedence_of("+"), Some((2, Associativity::LeftToRight)));
        assert_eq!(precedence_of("="), Some((12, Associativity::RightToLeft)));
        assert_eq!(precedence_of("?"), Some((11, Associativity::RightToLeft)));
        assert_eq!(precedence_of(","), Some((13, Associativity::LeftToRight)));
        assert_eq!(precedence_of("..."), None);
    }

    #[test]
    fn test_priority() {
        assert!(left_op_has_priority("*", "+"));
        assert!(left_op_has_priority("+", "-"));
        assert!(left_op_has_priority("+", "+"));
        assert!(!left_op_has_priority("+", "*"));
        assert!(!left_op_has_priority("=", "="));
        assert!(!left_op_has_priority("=", "+"));
        assert!(left_op_has_priority("=", ","));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(expr("1+2*3"), "(+ 1 (* 2 3))");
        assert_eq!(expr("1*2+3"), "(+ (* 1 2) 3)");
        assert_eq!(expr("1+2*3+4"), "(+ (+ 1 (* 2 3)) 4)");
        assert_eq!(expr("a / b % c"), "(% (/ a b) c)");
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(expr("a < b == c > d"), "(== (< a b) (> c d))");
        assert_eq!(expr("a && b || c && d"), "(|| (&& a b) (&& c d))");
        assert_eq!(expr("a | b ^ c & d"), "(| a (^ b (& c d)))");
        assert_eq!(expr("1 << 2 + 3"), "(<< 1 (+ 2 3))");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(expr("a = b = c"), "(= a (= b c))");
        assert_eq!(expr("a = 1 + 2"), "(= a (+ 1 2))");
        assert_eq!(expr("a += b * 2"), "(+= a (* b 2))");
    }

    #[test]
    fn test_comma() {
        assert_eq!(expr("a = 1, b = 2"), "(, (= a 1) (= b 2))");
    }

    #[test]
    fn test_ternary() {
        assert_eq!(expr("a ? b : c"), "(? a (: b c))");
        assert_eq!(expr("x = a > 1 ? b + 1 : c"), "(= x (? (> a 1) (: (+ b 1) c)))");
        assert_eq!(expr("a ? b : c ? d : e"), "(? a (: b (? c (: d e))))");
    }

    #[test]
    fn test_ternary_false_branch_stops_at_looser_operators() {
        assert_eq!(expr("f(a ? b : c, d)"), "(() f (paren (, (? a (: b c)) d)))");
        assert_eq!(expr("x = a ? b : c, y = 2"), "(, (= x (? a (: b c))) (= y 2))");
        assert_eq!(expr("a ? b : (c, d)"), "(? a (: b (paren (, c d))))");
        assert_eq!(expr("a ? x = 1 : y"), "(? a (: (= x 1) y))");
    }

    #[test]
    fn test_member_access() {
        assert_eq!(expr("a.b.c"), "(. (. a b) c)");
        assert_eq!(expr("p->x + 1"), "(+ (-> p x) 1)");
        assert_eq!(expr("a.b[1]"), "([] (. a b) [1])");
        assert_eq!(expr("f(x).y"), "(. (() f (paren x)) y)");
    }

    #[test]
    fn test_member_access_binds_tighter_than_prefix() {
        assert_eq!(expr("*p->x"), "(* (-> p x))");
        assert_eq!(expr("&s.f"), "(& (. s f))");
        assert_eq!(expr("-a.b + 1"), "(+ (- (. a b)) 1)");
        assert_eq!(expr("p->next->v++"), "(post++ (-> (-> p next) v))");
    }

    #[test]
    fn test_call_and_index() {
        assert_eq!(expr("f(1, 2)"), "(() f (paren (, 1 2)))");
        assert_eq!(expr("f()"), "(() f (paren))");
        assert_eq!(expr("a[i + 1] * 2"), "(* ([] a [(+ i 1)]) 2)");
        assert_eq!(expr("1 + f(x)"), "(+ 1 (() f (paren x)))");
    }

    #[test]
    fn test_unary() {
        assert_eq!(expr("-a + b"), "(+ (- a) b)");
        assert_eq!(expr("!x"), "(! x)");
        assert_eq!(expr("*p++"), "(* (post++ p))");
        assert_eq!(expr("&a[1]"), "(& ([] a [1]))");
        assert_eq!(expr("i--"), "(post-- i)");
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(expr("(1 + 2) * 3"), "(* (paren (+ 1 2)) 3)");
        assert_eq!(expr("2 * (3 - 1)"), "(* 2 (paren (- 3 1)))");
    }

    #[test]
    fn test_cast() {
        assert_eq!(expr("(char) x"), "(cast char x)");
        assert_eq!(expr("(unsigned int*) p + 1"), "(+ (cast unsigned int* p) 1)");
    }

    #[test]
    fn test_rotation_keeps_children_ahead_of_parents() {
        let tokens = lex("1 - 2 * 3 - 4 + 5", "expr.cmm").unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        for (id, node) in program.ast.iter() {
            for child in node.kind.children() {
                assert!(child < id, "{:?} is not ahead of {:?}", child, id);
            }
        }
        assert_eq!(program.ast.sexpr(program.roots[0]), "(+ (- (- 1 (* 2 3)) 4) 5)");
    }
}
