//! Declarations: datatypes, variables, functions, structs and unions

use log::debug;

use crate::frontend::ast::{Aggregate, Body, Function, NodeFlags, NodeId, NodeKind, Variable};
use crate::frontend::parser::{History, Parser};
use crate::frontend::scope::{Scope, ScopeFlags};
use crate::frontend::symbol::SymbolKind;
use crate::frontend::token::{Token, TokenKind};
use crate::types::{ArrayInfo, Datatype, DatatypeFlags, DatatypeKind, DATA_SIZE_DWORD};
use crate::utils::{Error, Position, Result};

/// Keywords that may surround the base type of a datatype
const DATATYPE_MODIFIERS: &[&str] = &[
    "unsigned",
    "signed",
    "static",
    "const",
    "extern",
    "restrict",
    "__ignore_typecheck__",
];

/// Symbol table key of a struct or union tag
fn tag_key(kind: DatatypeKind, name: &str) -> String {
    match kind {
        DatatypeKind::Union => format!("union {}", name),
        _ => format!("struct {}", name),
    }
}

impl Parser {
    /// Whether `token` can open a datatype
    pub(crate) fn is_datatype_start(&self, token: &Token) -> bool {
        match &token.kind {
            TokenKind::Keyword(word) => {
                DATATYPE_MODIFIERS.contains(&word.as_str()) || DatatypeKind::from_keyword(word).is_some()
            }
            _ => false,
        }
    }

    // ==================== Datatypes ====================

    /// Parse modifiers, the base type, an optional secondary primitive,
    /// pointer stars and trailing modifiers
    pub(crate) fn parse_datatype(&mut self) -> Result<Datatype> {
        let mut flags = DatatypeFlags::SIGNED;
        self.parse_datatype_modifiers(&mut flags);

        let mut datatype = self.parse_datatype_type(flags)?;

        let depth = self.parse_pointer_depth();
        if depth > 0 {
            datatype.pointer_depth = depth;
            datatype.flags |= DatatypeFlags::POINTER;
        }

        self.parse_datatype_modifiers(&mut datatype.flags);
        Ok(datatype)
    }

    fn parse_datatype_modifiers(&mut self, flags: &mut DatatypeFlags) {
        while let Some(Token {
            kind: TokenKind::Keyword(word),
            ..
        }) = self.peek()
        {
            match word.as_str() {
                "unsigned" => flags.remove(DatatypeFlags::SIGNED),
                "signed" => flags.insert(DatatypeFlags::SIGNED),
                "static" => flags.insert(DatatypeFlags::STATIC),
                "const" => flags.insert(DatatypeFlags::CONST),
                "extern" => flags.insert(DatatypeFlags::EXTERN),
                "restrict" => flags.insert(DatatypeFlags::RESTRICT),
                "__ignore_typecheck__" => flags.insert(DatatypeFlags::IGNORE_TYPE_CHECKING),
                _ => break,
            }
            self.next_token();
        }
    }

    fn parse_datatype_type(&mut self, mut flags: DatatypeFlags) -> Result<Datatype> {
        let pos = self.current_pos();
        let kind = match self.peek() {
            Some(Token {
                kind: TokenKind::Keyword(word),
                ..
            }) => DatatypeKind::from_keyword(word),
            _ => None,
        };
        let Some(kind) = kind else {
            return Err(match self.peek() {
                Some(token) => Error::ExpectedDatatype {
                    got: token.kind.to_string(),
                    pos,
                },
                None => Error::ExpectedDatatype {
                    got: "end of input".to_string(),
                    pos,
                },
            });
        };
        let keyword = match self.next_token().map(|t| t.kind) {
            Some(TokenKind::Keyword(word)) => word,
            _ => return Err(self.unexpected("datatype")),
        };

        if kind.is_struct_or_union() {
            let name = match self.peek() {
                Some(Token {
                    kind: TokenKind::Identifier(name),
                    ..
                }) => {
                    let name = name.clone();
                    self.next_token();
                    name
                }
                _ => {
                    flags.insert(DatatypeFlags::STRUCT_UNION_NO_NAME);
                    self.anonymous_name()
                }
            };
            let mut datatype = Datatype::new(kind, name);
            datatype.flags = flags;
            self.resolve_struct_size(&mut datatype);
            return Ok(datatype);
        }

        let mut datatype = Datatype::new(kind, keyword);
        datatype.flags = flags;

        let secondary = match self.peek() {
            Some(token) if token.is_primitive_keyword() => token.clone(),
            _ => return Ok(datatype),
        };
        self.next_token();
        self.apply_secondary(&mut datatype, &secondary)?;
        Ok(datatype)
    }

    /// Combine a second primitive keyword into `datatype`
    fn apply_secondary(&mut self, datatype: &mut Datatype, token: &Token) -> Result<()> {
        if !datatype.kind.allows_secondary() {
            return Err(Error::SecondaryNotAllowed {
                base: datatype.type_str.clone(),
                pos: token.pos.clone(),
            });
        }
        let TokenKind::Keyword(word) = &token.kind else {
            return Err(self.unexpected("datatype"));
        };
        let Some(secondary) = Datatype::primitive(word) else {
            return Err(Error::ExpectedDatatype {
                got: token.kind.to_string(),
                pos: token.pos.clone(),
            });
        };

        // `long int`, `short int`
        if secondary.kind == DatatypeKind::Integer {
            return Ok(());
        }

        if datatype.kind == DatatypeKind::Long && secondary.kind == DatatypeKind::Long {
            self.diagnostics.warning(
                token.pos.clone(),
                "long long is not supported on a 32-bit target, treating it as long",
            );
            datatype.size = DATA_SIZE_DWORD;
        } else {
            datatype.size += secondary.size;
        }
        datatype.secondary = Some(Box::new(secondary));
        datatype.flags |= DatatypeFlags::SECONDARY;
        Ok(())
    }

    fn parse_pointer_depth(&mut self) -> usize {
        let mut depth = 0;
        while self.consume_operator("*") {
            depth += 1;
        }
        depth
    }

    pub(crate) fn anonymous_name(&mut self) -> String {
        let name = format!("anonymous_{}", self.anonymous_count);
        self.anonymous_count += 1;
        name
    }

    /// Pick up the body and size of an already defined struct or union
    fn resolve_struct_size(&self, datatype: &mut Datatype) {
        let key = tag_key(datatype.kind, &datatype.type_str);
        let Some(id) = self.symbols.get(&key).and_then(|s| s.node()) else {
            return;
        };
        let (NodeKind::Struct(agg) | NodeKind::Union(agg)) = self.ast.kind(id) else {
            return;
        };
        if let Some(body) = agg.body {
            datatype.struct_node = Some(body);
            datatype.size = self.ast.as_body(body).map_or(0, |b| b.size);
        }
    }

    /// A trailing `int` is decorative after a base that admits a secondary
    fn parse_ignore_int(&mut self, datatype: &Datatype) -> Result<()> {
        if !self.check_keyword("int") {
            return Ok(());
        }
        if !datatype.kind.allows_secondary() {
            return Err(Error::DecorativeIntNotAllowed {
                base: datatype.type_str.clone(),
                pos: self.current_pos(),
            });
        }
        self.next_token();
        Ok(())
    }

    // ==================== Declarations ====================

    /// Variable, declarator list, function or struct/union
    pub(crate) fn parse_variable_function_or_struct_union(&mut self, history: History) -> Result<NodeId> {
        let pos = self.current_pos();
        let datatype = self.parse_datatype()?;

        if datatype.is_struct_or_union() && datatype.pointer_depth == 0 {
            if self.check_symbol('{') {
                return self.parse_struct_or_union(datatype, pos, history);
            }
            if self.consume_symbol(';') {
                return self.parse_struct_forward_declaration(datatype, pos);
            }
        }

        self.parse_ignore_int(&datatype)?;
        let (name, name_pos) = self.expect_identifier()?;

        if self.check_operator("(") {
            if history.has(History::IN_BODY) {
                return Err(Error::NestedFunction { pos: name_pos });
            }
            return self.parse_function(datatype, name, pos, history);
        }

        let var = self.parse_variable(datatype.clone(), name, pos.clone(), history)?;
        if !self.check_operator(",") {
            self.expect_symbol(';')?;
            return Ok(var);
        }

        let mut vars = vec![var];
        while self.consume_operator(",") {
            let mut next = datatype.clone();
            let depth = self.parse_pointer_depth();
            if depth > 0 {
                next.pointer_depth += depth;
                next.flags |= DatatypeFlags::POINTER;
            }
            let var_pos = self.current_pos();
            let (name, _) = self.expect_identifier()?;
            vars.push(self.parse_variable(next, name, var_pos, history)?);
        }
        self.expect_symbol(';')?;
        Ok(self.ast.push(NodeKind::VariableList(vars), pos))
    }

    /// Array brackets and initializer of a named declarator. The variable is
    /// declared in the current scope.
    fn parse_variable(&mut self, mut datatype: Datatype, name: String, pos: Position, history: History) -> Result<NodeId> {
        if self.check_operator("[") {
            self.parse_array_brackets(&mut datatype)?;
        }

        let value = if self.consume_operator("=") {
            Some(self.parse_expression(history.with(History::STOP_AT_COMMA))?)
        } else {
            None
        };

        let size = datatype.size();
        let id = self.ast.push(
            NodeKind::Variable(Variable {
                datatype,
                name: Some(name),
                value,
            }),
            pos,
        );
        self.declare_variable(id, size)?;
        Ok(id)
    }

    fn declare_variable(&mut self, id: NodeId, size: usize) -> Result<()> {
        match self.scopes.declare(id, size) {
            Some(_) => Ok(()),
            None => Err(Error::SizeTooLarge {
                pos: self.ast.get(id).pos.clone(),
            }),
        }
    }

    fn parse_array_brackets(&mut self, datatype: &mut Datatype) -> Result<()> {
        let start = self.current_pos();
        let mut brackets = Vec::new();
        while self.check_operator("[") {
            let pos = self.current_pos();
            self.next_token();
            let size = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Number { value, .. }) => {
                    usize::try_from(*value).map_err(|_| Error::SizeTooLarge { pos: pos.clone() })?
                }
                _ => return Err(Error::ExpectedArraySize { pos }),
            };
            self.next_token();
            self.expect_symbol(']')?;
            brackets.push(size);
        }

        let size = brackets
            .iter()
            .try_fold(datatype.element_size(), |total, n| total.checked_mul(*n))
            .ok_or(Error::SizeTooLarge { pos: start })?;
        datatype.flags |= DatatypeFlags::ARRAY;
        datatype.array = Some(ArrayInfo { brackets, size });
        Ok(())
    }

    // ==================== Functions ====================

    fn parse_function(&mut self, return_type: Datatype, name: String, pos: Position, history: History) -> Result<NodeId> {
        self.expect_operator("(")?;
        self.scopes.enter(ScopeFlags::FUNCTION);
        self.symbols.push_table();

        let (args, variadic) = self.parse_function_arguments()?;
        self.expect_symbol(')')?;
        let stack_size = args
            .iter()
            .filter_map(|id| self.ast.as_variable(*id))
            .try_fold(0usize, |total, var| {
                let slot = var.datatype.size().checked_next_multiple_of(DATA_SIZE_DWORD)?;
                total.checked_add(slot)
            })
            .ok_or_else(|| Error::SizeTooLarge { pos: pos.clone() })?;

        let body = if self.consume_symbol(';') {
            None
        } else {
            Some(self.parse_body(history.with(History::IN_BODY))?)
        };
        self.symbols.pop_table();
        self.scopes.exit();

        let id = self.ast.push(
            NodeKind::Function(Function {
                return_type,
                name: name.clone(),
                args,
                variadic,
                body,
                stack_size,
            }),
            pos.clone(),
        );
        if body.is_none() {
            self.ast.set_flag(id, NodeFlags::FORWARD_DECLARATION);
        }
        self.ast.bind_function(id);
        self.register_definition(&name, id, &pos)?;

        debug!("function {} ({} bytes of arguments)", name, stack_size);
        Ok(id)
    }

    fn parse_function_arguments(&mut self) -> Result<(Vec<NodeId>, bool)> {
        let mut args = Vec::new();
        if self.check_symbol(')') {
            return Ok((args, false));
        }
        if self.check_keyword("void") && self.peek_nth(1).is_some_and(|t| t.is_symbol(')')) {
            self.next_token();
            return Ok((args, false));
        }

        loop {
            if self.consume_operator("...") {
                return Ok((args, true));
            }

            let pos = self.current_pos();
            let mut datatype = self.parse_datatype()?;
            self.parse_ignore_int(&datatype)?;
            let name = match self.peek() {
                Some(Token {
                    kind: TokenKind::Identifier(name),
                    ..
                }) => {
                    let name = name.clone();
                    self.next_token();
                    Some(name)
                }
                _ => None,
            };
            if self.check_operator("[") {
                self.parse_array_brackets(&mut datatype)?;
            }

            let size = datatype.size();
            let id = self.ast.push(
                NodeKind::Variable(Variable {
                    datatype,
                    name,
                    value: None,
                }),
                pos,
            );
            self.declare_variable(id, size)?;
            args.push(id);

            if !self.consume_operator(",") {
                return Ok((args, false));
            }
        }
    }

    /// Register a function or tag. A forward declaration may be replaced.
    fn register_definition(&mut self, key: &str, id: NodeId, pos: &Position) -> Result<()> {
        let existing = self.symbols.get_local(key).and_then(|s| s.node());
        match existing {
            Some(prev) if self.ast.get(prev).flags.contains(NodeFlags::FORWARD_DECLARATION) => {
                self.symbols.redefine(key, SymbolKind::Node(id));
                Ok(())
            }
            _ => self.symbols.register(key, SymbolKind::Node(id), pos),
        }
    }

    // ==================== Structs and unions ====================

    fn parse_struct_forward_declaration(&mut self, datatype: Datatype, pos: Position) -> Result<NodeId> {
        let aggregate = Aggregate {
            name: datatype.type_str.clone(),
            body: None,
            var: None,
        };
        let kind = match datatype.kind {
            DatatypeKind::Union => NodeKind::Union(aggregate),
            _ => NodeKind::Struct(aggregate),
        };
        let id = self.ast.push(kind, pos.clone());
        self.ast.set_flag(id, NodeFlags::FORWARD_DECLARATION);

        let key = tag_key(datatype.kind, &datatype.type_str);
        if self.symbols.get_local(&key).is_none() {
            self.symbols.register(&key, SymbolKind::Node(id), &pos)?;
        }
        Ok(id)
    }

    /// `struct name { fields } [declarator];`
    fn parse_struct_or_union(&mut self, mut datatype: Datatype, pos: Position, history: History) -> Result<NodeId> {
        let is_union = datatype.kind == DatatypeKind::Union;
        let body = self.parse_struct_body(is_union, history)?;
        datatype.struct_node = Some(body);
        datatype.size = self.ast.as_body(body).map_or(0, |b| b.size);

        let var = if self.consume_symbol(';') {
            None
        } else {
            let depth = self.parse_pointer_depth();
            if depth > 0 {
                datatype.pointer_depth = depth;
                datatype.flags |= DatatypeFlags::POINTER;
            }
            let var_pos = self.current_pos();
            let (name, _) = self.expect_identifier()?;
            let var = self.parse_variable(datatype.clone(), name, var_pos, history)?;
            self.expect_symbol(';')?;
            Some(var)
        };

        let aggregate = Aggregate {
            name: datatype.type_str.clone(),
            body: Some(body),
            var,
        };
        let id = self.ast.push(
            if is_union {
                NodeKind::Union(aggregate)
            } else {
                NodeKind::Struct(aggregate)
            },
            pos.clone(),
        );
        if var.is_some() {
            self.ast.set_flag(id, NodeFlags::HAS_VARIABLE_COMBINED);
        }

        let key = tag_key(datatype.kind, &datatype.type_str);
        self.register_definition(&key, id, &pos)?;
        debug!("{} ({} bytes)", key, datatype.size);
        Ok(id)
    }

    /// Field declarations between braces, in their own scope
    fn parse_struct_body(&mut self, is_union: bool, history: History) -> Result<NodeId> {
        let pos = self.expect_symbol('{')?.pos;
        self.scopes.enter(ScopeFlags::STRUCT);

        let mut statements = Vec::new();
        while !self.check_symbol('}') {
            if self.peek().is_none() {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_variable_function_or_struct_union(history.with(History::IN_BODY))?);
        }
        self.expect_symbol('}')?;

        let scope = self.scopes.exit();
        Ok(self.finish_body(statements, scope, is_union, pos))
    }

    /// Build a body node from the scope its statements were declared in.
    /// A union takes the size of its largest member.
    pub(crate) fn finish_body(&mut self, statements: Vec<NodeId>, scope: Scope, is_union: bool, pos: Position) -> NodeId {
        let mut largest_var: Option<(NodeId, usize)> = None;
        for id in &scope.entities {
            let Some(var) = self.ast.as_variable(*id) else {
                continue;
            };
            let size = var.datatype.size();
            if largest_var.map_or(true, |(_, best)| size > best) {
                largest_var = Some((*id, size));
            }
        }

        let size = if is_union {
            largest_var.map_or(0, |(_, size)| size)
        } else {
            scope.size
        };

        // TODO: round `size` up to the alignment of `largest_var` and set
        // `padded` once stack frames are laid out.
        let id = self.ast.push(
            NodeKind::Body(Body {
                statements,
                size,
                padded: false,
                largest_var: largest_var.map(|(id, _)| id),
            }),
            pos,
        );
        self.ast.bind_owner(id);
        id
    }
}
