//! cmmc - front end for a small C-like language
//!
//! Source text goes through the [`frontend::lexer`] into a token vector and
//! through the [`frontend::parser`] into an arena syntax tree annotated with
//! datatypes, body sizes and owner bindings.

pub mod frontend;
pub mod types;
pub mod utils;

use log::debug;

use crate::frontend::lexer::lex;
use crate::frontend::parser::{Parser, Program};
use crate::frontend::token::Token;
use crate::utils::Result;

/// Result of running the front end over one source file
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub program: Program,
}

/// Lex and parse `source`. `filename` only labels positions.
pub fn compile_source(source: &str, filename: &str) -> Result<Compilation> {
    let tokens = lex(source, filename)?;
    debug!("{}: {} tokens", filename, tokens.len());

    let program = Parser::new(tokens.clone()).parse()?;
    Ok(Compilation { tokens, program })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::NodeKind;
    use crate::utils::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_program() {
        let source = "#include <stdio.h>\n\
                      struct point { int x; int y; };\n\
                      int dot(struct point *a, struct point *b) {\n\
                      return a->x * b->x + a->y * b->y;\n\
                      }\n";
        let compilation = compile_source(source, "dot.cmm").unwrap();
        let program = &compilation.program;
        assert_eq!(program.roots.len(), 2);
        assert!(program.warnings.is_empty());

        let NodeKind::Function(func) = program.ast.kind(program.roots[1]) else {
            panic!("expected a function");
        };
        assert_eq!(func.stack_size, 8);
        let body = program.ast.as_body(func.body.unwrap()).unwrap();
        let NodeKind::Return { value } = program.ast.kind(body.statements[0]) else {
            panic!("expected a return");
        };
        assert_eq!(
            program.ast.sexpr(value.unwrap()),
            "(+ (* (-> a x) (-> b x)) (* (-> a y) (-> b y)))"
        );
    }

    #[test]
    fn test_lex_errors_surface() {
        let err = compile_source("int x = 'ab';", "bad.cmm").unwrap_err();
        assert!(matches!(err, Error::ExpectedChar { .. }));
        assert_eq!(err.pos().line, 1);
    }
}
