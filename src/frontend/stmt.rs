//! Bodies and statements

use crate::frontend::ast::{NodeId, NodeKind};
use crate::frontend::parser::{History, Parser, SwitchFrame};
use crate::frontend::scope::ScopeFlags;
use crate::frontend::token::TokenKind;
use crate::utils::{Error, Result};

impl Parser {
    /// `{ statements }` or a single statement, in a scope of its own
    pub(crate) fn parse_body(&mut self, history: History) -> Result<NodeId> {
        let pos = self.current_pos();
        let history = history.with(History::IN_BODY).without(History::STOP_AT_COMMA);
        self.scopes.enter(ScopeFlags::NONE);

        let mut statements = Vec::new();
        if self.consume_symbol('{') {
            while !self.check_symbol('}') {
                if self.peek().is_none() {
                    return Err(self.unexpected("'}'"));
                }
                statements.push(self.parse_statement(history)?);
            }
            self.expect_symbol('}')?;
        } else {
            statements.push(self.parse_statement(history)?);
        }

        let scope = self.scopes.exit();
        Ok(self.finish_body(statements, scope, false, pos))
    }

    pub(crate) fn parse_statement(&mut self, history: History) -> Result<NodeId> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("statement"));
        };

        match &token.kind {
            TokenKind::Keyword(keyword) => match keyword.as_str() {
                "return" => self.parse_return(history),
                "if" => self.parse_if(history),
                "while" => self.parse_while(history),
                "do" => self.parse_do_while(history),
                "for" => self.parse_for(history),
                "switch" => self.parse_switch(history),
                "case" => self.parse_case(history),
                "default" => self.parse_default(),
                "goto" => self.parse_goto(),
                "break" | "continue" => {
                    self.next_token();
                    self.expect_symbol(';')?;
                    let kind = if keyword == "break" {
                        NodeKind::Break
                    } else {
                        NodeKind::Continue
                    };
                    Ok(self.ast.push(kind, token.pos))
                }
                _ => self.parse_variable_function_or_struct_union(history),
            },
            TokenKind::Symbol('{') => self.parse_body(history),
            TokenKind::Symbol(';') => {
                self.next_token();
                Ok(self.ast.push(NodeKind::Blank, token.pos))
            }
            TokenKind::Identifier(name) if self.peek_nth(1).is_some_and(|t| t.is_symbol(':')) => {
                self.next_token();
                self.next_token();
                Ok(self.ast.push(NodeKind::Label { name: name.clone() }, token.pos))
            }
            _ => {
                let expr = self.parse_expression(history)?;
                self.expect_symbol(';')?;
                Ok(expr)
            }
        }
    }

    /// `( expression )` after a control keyword
    fn parse_condition(&mut self, history: History) -> Result<NodeId> {
        self.expect_operator("(")?;
        let condition = self.parse_expression(history)?;
        self.expect_symbol(')')?;
        Ok(condition)
    }

    fn parse_return(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_keyword("return")?.pos;
        if self.consume_symbol(';') {
            return Ok(self.ast.push(NodeKind::Return { value: None }, pos));
        }
        let value = self.parse_expression(history)?;
        self.expect_symbol(';')?;
        Ok(self.ast.push(NodeKind::Return { value: Some(value) }, pos))
    }

    fn parse_if(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_keyword("if")?.pos;
        let condition = self.parse_condition(history)?;
        let body = self.parse_body(history)?;

        let otherwise = if self.check_keyword("else") {
            let else_pos = self.expect_keyword("else")?.pos;
            if self.check_keyword("if") {
                Some(self.parse_if(history)?)
            } else {
                let body = self.parse_body(history)?;
                Some(self.ast.push(NodeKind::Else { body }, else_pos))
            }
        } else {
            None
        };

        Ok(self.ast.push(
            NodeKind::If {
                condition,
                body,
                otherwise,
            },
            pos,
        ))
    }

    fn parse_while(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_keyword("while")?.pos;
        let condition = self.parse_condition(history)?;
        let body = self.parse_body(history)?;
        Ok(self.ast.push(NodeKind::While { condition, body }, pos))
    }

    fn parse_do_while(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_keyword("do")?.pos;
        let body = self.parse_body(history)?;
        self.expect_keyword("while")?;
        let condition = self.parse_condition(history)?;
        self.expect_symbol(';')?;
        Ok(self.ast.push(NodeKind::DoWhile { body, condition }, pos))
    }

    /// `for (init; condition; step) body`. Variables declared in the
    /// initializer live in a scope wrapping the loop.
    fn parse_for(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_keyword("for")?.pos;
        self.expect_operator("(")?;
        self.scopes.enter(ScopeFlags::NONE);

        let init = if self.consume_symbol(';') {
            None
        } else if self.peek().is_some_and(|t| self.is_datatype_start(t)) {
            Some(self.parse_variable_function_or_struct_union(history)?)
        } else {
            let init = self.parse_expression(history)?;
            self.expect_symbol(';')?;
            Some(init)
        };

        let condition = if self.consume_symbol(';') {
            None
        } else {
            let condition = self.parse_expression(history)?;
            self.expect_symbol(';')?;
            Some(condition)
        };

        let step = if self.check_symbol(')') {
            None
        } else {
            Some(self.parse_expression(history)?)
        };
        self.expect_symbol(')')?;

        let body = self.parse_body(history)?;
        self.scopes.exit();

        Ok(self.ast.push(
            NodeKind::For {
                init,
                condition,
                step,
                body,
            },
            pos,
        ))
    }

    fn parse_switch(&mut self, history: History) -> Result<NodeId> {
        let pos = self.expect_keyword("switch")?.pos;
        let expression = self.parse_condition(history)?;

        self.switches.push(SwitchFrame::default());
        let body = self.parse_body(history);
        let frame = self.switches.pop().unwrap_or_default();
        let body = body?;

        Ok(self.ast.push(
            NodeKind::Switch {
                expression,
                body,
                cases: frame.cases,
                has_default: frame.has_default,
            },
            pos,
        ))
    }

    fn parse_case(&mut self, history: History) -> Result<NodeId> {
        let pos = self.current_pos();
        if self.switches.is_empty() {
            return Err(Error::OutsideSwitch {
                keyword: "case".to_string(),
                pos,
            });
        }
        self.expect_keyword("case")?;
        let expression = self.parse_expression(history)?;
        self.expect_symbol(':')?;

        let id = self.ast.push(NodeKind::Case { expression }, pos);
        if let Some(frame) = self.switches.last_mut() {
            frame.cases.push(id);
        }
        Ok(id)
    }

    fn parse_default(&mut self) -> Result<NodeId> {
        let pos = self.current_pos();
        if self.switches.is_empty() {
            return Err(Error::OutsideSwitch {
                keyword: "default".to_string(),
                pos,
            });
        }
        self.expect_keyword("default")?;
        self.expect_symbol(':')?;

        if let Some(frame) = self.switches.last_mut() {
            frame.has_default = true;
        }
        Ok(self.ast.push(NodeKind::Default, pos))
    }

    fn parse_goto(&mut self) -> Result<NodeId> {
        let pos = self.expect_keyword("goto")?.pos;
        let (label, _) = self.expect_identifier()?;
        self.expect_symbol(';')?;
        Ok(self.ast.push(NodeKind::Goto { label }, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::Ast;
    use crate::frontend::lexer::lex;
    use crate::frontend::parser::Program;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Result<Program> {
        Parser::new(lex(source, "stmt.cmm")?).parse()
    }

    /// Statements of the body of the only function in `program`
    fn function_statements(program: &Program) -> Vec<NodeId> {
        let NodeKind::Function(func) = program.ast.kind(program.roots[0]) else {
            panic!("expected a function");
        };
        program.ast.as_body(func.body.unwrap()).unwrap().statements.clone()
    }

    fn names(ast: &Ast, ids: &[NodeId]) -> Vec<&'static str> {
        ids.iter().map(|id| ast.kind(*id).name()).collect()
    }

    #[test]
    fn test_statement_kinds() {
        let source = "void f() {\n\
                      int x = 1;\n\
                      ;\n\
                      x = x + 1;\n\
                      start:\n\
                      goto start;\n\
                      { int y; }\n\
                      return;\n\
                      }";
        let program = parse(source).unwrap();
        let statements = function_statements(&program);
        assert_eq!(
            names(&program.ast, &statements),
            vec!["Variable", "Blank", "Expression", "Label", "Goto", "Body", "Return"]
        );
    }

    #[test]
    fn test_body_size_counts_direct_variables() {
        let program = parse("int f() { int a; char b[10]; short c; { int inner; } return a; }").unwrap();
        let NodeKind::Function(func) = program.ast.kind(program.roots[0]) else {
            panic!("expected a function");
        };
        let body = program.ast.as_body(func.body.unwrap()).unwrap();
        assert_eq!(body.size, 16);
        assert!(!body.padded);

        let largest = program.ast.as_variable(body.largest_var.unwrap()).unwrap();
        assert_eq!(largest.name.as_deref(), Some("b"));
    }

    #[test]
    fn test_if_else_chain() {
        let program = parse("int f(int a) { if (a > 1) return 1; else if (a) return 2; else { return 3; } }").unwrap();
        let statements = function_statements(&program);
        let NodeKind::If { condition, otherwise, .. } = program.ast.kind(statements[0]) else {
            panic!("expected an if");
        };
        assert_eq!(program.ast.sexpr(*condition), "(> a 1)");

        let chained = otherwise.unwrap();
        let NodeKind::If { otherwise, .. } = program.ast.kind(chained) else {
            panic!("expected a chained if");
        };
        assert!(matches!(program.ast.kind(otherwise.unwrap()), NodeKind::Else { .. }));
    }

    #[test]
    fn test_loops() {
        let source = "void f() {\n\
                      while (1) { break; }\n\
                      do { continue; } while (0);\n\
                      for (int i = 0; i < 10; i++) { }\n\
                      for (;;) ;\n\
                      }";
        let program = parse(source).unwrap();
        let statements = function_statements(&program);
        assert_eq!(names(&program.ast, &statements), vec!["While", "DoWhile", "For", "For"]);

        let NodeKind::For { init, condition, step, .. } = program.ast.kind(statements[2]) else {
            panic!("expected a for");
        };
        assert!(program.ast.as_variable(init.unwrap()).is_some());
        assert_eq!(program.ast.sexpr(condition.unwrap()), "(< i 10)");
        assert_eq!(program.ast.sexpr(step.unwrap()), "(post++ i)");

        let NodeKind::For { init, condition, step, .. } = program.ast.kind(statements[3]) else {
            panic!("expected a for");
        };
        assert_eq!((*init, *condition, *step), (None, None, None));
    }

    #[test]
    fn test_switch_collects_cases() {
        let source = "int f(int x) {\n\
                      switch (x) {\n\
                      case 1: return 10;\n\
                      case 2: break;\n\
                      default: return 0;\n\
                      }\n\
                      }";
        let program = parse(source).unwrap();
        let statements = function_statements(&program);
        let NodeKind::Switch { cases, has_default, .. } = program.ast.kind(statements[0]) else {
            panic!("expected a switch");
        };
        assert_eq!(cases.len(), 2);
        assert!(*has_default);
        let values: Vec<String> = cases
            .iter()
            .map(|id| match program.ast.kind(*id) {
                NodeKind::Case { expression } => program.ast.sexpr(*expression),
                other => other.name().to_string(),
            })
            .collect();
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn test_case_outside_switch() {
        let err = parse("void f() { case 1: return; }").unwrap_err();
        assert!(matches!(err, Error::OutsideSwitch { ref keyword, .. } if keyword == "case"));

        let err = parse("void f() { default: return; }").unwrap_err();
        assert!(matches!(err, Error::OutsideSwitch { ref keyword, .. } if keyword == "default"));
    }

    #[test]
    fn test_missing_closing_brace() {
        let err = parse("void f() { return;").unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { ref expected, .. } if expected == "'}'"));
    }

    #[test]
    fn test_owner_binding_of_nested_bodies() {
        let program = parse("void f() { while (1) { g(); } }").unwrap();
        let NodeKind::Function(func) = program.ast.kind(program.roots[0]) else {
            panic!("expected a function");
        };
        let outer = func.body.unwrap();
        let statements = function_statements(&program);
        let NodeKind::While { body, .. } = program.ast.kind(statements[0]) else {
            panic!("expected a while");
        };
        let call = program.ast.as_body(*body).unwrap().statements[0];
        assert_eq!(program.ast.get(call).binding.owner, Some(*body));
        assert_eq!(program.ast.get(statements[0]).binding.owner, Some(outer));
        assert_eq!(program.ast.get(*body).binding.owner, Some(outer));
    }
}
