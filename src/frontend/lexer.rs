//! Lexer for cmmc
//!
//! Converts source code into a stream of tokens. Newlines and comments are
//! kept in the stream; the parser skips them itself.

use log::{debug, trace};

use crate::frontend::token::{is_keyword, is_valid_operator, NumberKind, Token, TokenKind};
use crate::utils::{Error, Position, Result};

/// Characters that start (or continue) an operator
const OPERATOR_CHARS: &[char] = &[
    '+', '-', '*', '/', '>', '<', '^', '%', '!', '=', '~', '|', '&', '(', '[', ',', '.', '?',
];

/// Characters lexed as single-character symbols
const SYMBOL_CHARS: &[char] = &['{', '}', ':', ';', '#', '\\', ')', ']'];

/// How many consumed positions are remembered for pushback
const PUSHBACK_DEPTH: usize = 4;

fn is_operator_char(c: char) -> bool {
    OPERATOR_CHARS.contains(&c)
}

/// Pull-based character input
pub trait CharSource {
    /// Look at the next character without consuming it
    fn peek(&self) -> Option<char>;
    /// Consume the next character
    fn next(&mut self) -> Option<char>;
    /// Put a consumed character back so it is read again
    fn push(&mut self, c: char);
}

/// [`CharSource`] over an in-memory string
pub struct StrSource {
    chars: Vec<char>,
    pos: usize,
    pushed: Vec<char>,
}

impl StrSource {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            pushed: Vec::new(),
        }
    }
}

impl CharSource for StrSource {
    fn peek(&self) -> Option<char> {
        self.pushed
            .last()
            .copied()
            .or_else(|| self.chars.get(self.pos).copied())
    }

    fn next(&mut self) -> Option<char> {
        if let Some(c) = self.pushed.pop() {
            return Some(c);
        }
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn push(&mut self, c: char) {
        self.pushed.push(c);
    }
}

/// The lexer state for one source
pub struct Lexer<S: CharSource = StrSource> {
    source: S,
    /// Position of the next character
    pos: Position,
    /// Positions before the most recently consumed characters
    history: Vec<Position>,
    tokens: Vec<Token>,
    /// Number of `(` not yet closed
    expression_depth: usize,
    /// Raw text consumed since the outermost open `(`
    bracket_buffer: String,
}

impl Lexer<StrSource> {
    /// Create a new lexer for the given source code
    pub fn new(source: &str, filename: &str) -> Self {
        Self::with_source(StrSource::new(source), filename)
    }
}

impl<S: CharSource> Lexer<S> {
    pub fn with_source(source: S, filename: &str) -> Self {
        Self {
            source,
            pos: Position::start(filename),
            history: Vec::with_capacity(PUSHBACK_DEPTH),
            tokens: Vec::new(),
            expression_depth: 0,
            bracket_buffer: String::new(),
        }
    }

    /// Tokenize the entire source
    pub fn lex(mut self) -> Result<Vec<Token>> {
        while let Some(token) = self.read_next_token()? {
            self.tokens.push(token);
        }

        if self.expression_depth > 0 {
            return Err(Error::UnclosedParenthesis { pos: self.pos });
        }

        debug!("lexed {} tokens from {}", self.tokens.len(), self.pos.filename);
        Ok(self.tokens)
    }

    // ==================== Character Access ====================

    fn peekc(&self) -> Option<char> {
        self.source.peek()
    }

    fn nextc(&mut self) -> Option<char> {
        let c = self.source.next()?;
        if self.history.len() == PUSHBACK_DEPTH {
            self.history.remove(0);
        }
        self.history.push(self.pos.clone());
        self.pos.advance(c);
        if self.in_expression() {
            self.bracket_buffer.push(c);
        }
        Some(c)
    }

    fn pushc(&mut self, c: char) {
        self.source.push(c);
        if let Some(pos) = self.history.pop() {
            self.pos = pos;
        }
        if self.in_expression() {
            self.bracket_buffer.pop();
        }
    }

    fn in_expression(&self) -> bool {
        self.expression_depth > 0
    }

    fn make_token(&self, kind: TokenKind, pos: Position) -> Token {
        let mut token = Token::new(kind, pos);
        if self.in_expression() {
            token.between_brackets = Some(self.bracket_buffer.clone());
        }
        token
    }

    fn previous_token_is_keyword(&self, keyword: &str) -> bool {
        self.tokens.last().is_some_and(|t| t.is_keyword(keyword))
    }

    // ==================== Dispatch ====================

    fn read_next_token(&mut self) -> Result<Option<Token>> {
        loop {
            let pos = self.pos.clone();
            let Some(c) = self.peekc() else {
                return Ok(None);
            };

            let token = match c {
                '/' => self.read_comment_or_operator(pos)?,
                '0'..='9' => self.read_number(pos)?,
                c if is_operator_char(c) => self.read_operator(pos)?,
                c if SYMBOL_CHARS.contains(&c) => self.read_symbol(pos)?,
                ' ' | '\t' | '\r' => {
                    self.nextc();
                    if let Some(last) = self.tokens.last_mut() {
                        last.whitespace = true;
                    }
                    continue;
                }
                '"' => self.read_string('"', '"', pos)?,
                '\'' => self.read_char(pos)?,
                '\n' => {
                    self.nextc();
                    self.make_token(TokenKind::Newline, pos)
                }
                c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier_or_keyword(pos),
                c => return Err(Error::UnexpectedCharacter { ch: c, pos }),
            };

            trace!("token {} at {}", token.kind, token.pos);
            return Ok(Some(token));
        }
    }

    // ==================== Token Readers ====================

    fn read_comment_or_operator(&mut self, pos: Position) -> Result<Token> {
        self.nextc(); // /
        match self.peekc() {
            Some('/') => {
                self.nextc();
                Ok(self.read_one_line_comment(pos))
            }
            Some('*') => {
                self.nextc();
                self.read_multi_line_comment(pos)
            }
            _ => {
                self.pushc('/');
                self.read_operator(pos)
            }
        }
    }

    fn read_one_line_comment(&mut self, pos: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peekc() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.nextc();
        }
        self.make_token(TokenKind::Comment(text), pos)
    }

    fn read_multi_line_comment(&mut self, pos: Position) -> Result<Token> {
        let mut text = String::new();
        loop {
            match self.nextc() {
                None => return Err(Error::UnterminatedComment { pos }),
                Some('*') if self.peekc() == Some('/') => {
                    self.nextc();
                    break;
                }
                Some(c) => text.push(c),
            }
        }
        Ok(self.make_token(TokenKind::Comment(text), pos))
    }

    /// Read a number literal with an optional `L`/`f` suffix
    fn read_number(&mut self, pos: Position) -> Result<Token> {
        let mut text = String::new();
        let mut radix = 10;

        if self.peekc() == Some('0') {
            self.nextc();
            match self.peekc() {
                Some('x') => {
                    self.nextc();
                    radix = 16;
                }
                Some('b') => {
                    self.nextc();
                    radix = 2;
                }
                _ => text.push('0'),
            }
        }

        while let Some(c) = self.peekc() {
            if !c.is_digit(radix) {
                break;
            }
            text.push(c);
            self.nextc();
        }

        if text.is_empty() {
            let ch = if radix == 16 { 'x' } else { 'b' };
            return Err(Error::UnexpectedCharacter { ch, pos });
        }

        let value = u64::from_str_radix(&text, radix).map_err(|_| Error::NumberTooLarge {
            text: text.clone(),
            pos: pos.clone(),
        })?;

        let kind = match self.peekc() {
            Some('L') => {
                self.nextc();
                NumberKind::Long
            }
            Some('f') => {
                self.nextc();
                NumberKind::Float
            }
            _ => NumberKind::Normal,
        };

        Ok(self.make_token(TokenKind::Number { value, kind }, pos))
    }

    fn read_operator(&mut self, pos: Position) -> Result<Token> {
        if self.peekc() == Some('<') && self.previous_token_is_keyword("include") {
            return self.read_string('<', '>', pos);
        }

        let Some(first) = self.nextc() else {
            return Err(Error::UnexpectedEof {
                expected: "operator".to_string(),
                pos,
            });
        };
        let mut op = String::from(first);

        // Try the longest spelling first and give back what does not fit.
        if let Some(second) = self.peekc().filter(|c| is_operator_char(*c)) {
            self.nextc();
            op.push(second);
            if let Some(third) = self.peekc().filter(|c| is_operator_char(*c)) {
                self.nextc();
                op.push(third);
                if !is_valid_operator(&op) {
                    op.pop();
                    self.pushc(third);
                }
            }
            if !is_valid_operator(&op) {
                op.pop();
                self.pushc(second);
            }
        }

        if !is_valid_operator(&op) {
            return Err(Error::InvalidOperator { op, pos });
        }

        if op == "(" {
            self.new_expression();
        }

        Ok(self.make_token(TokenKind::Operator(op), pos))
    }

    fn read_symbol(&mut self, pos: Position) -> Result<Token> {
        let c = self.nextc().unwrap_or_default();
        if c == ')' {
            self.finish_expression(&pos)?;
        }
        Ok(self.make_token(TokenKind::Symbol(c), pos))
    }

    fn new_expression(&mut self) {
        self.expression_depth += 1;
        if self.expression_depth == 1 {
            self.bracket_buffer.clear();
        }
    }

    fn finish_expression(&mut self, pos: &Position) -> Result<()> {
        if self.expression_depth == 0 {
            return Err(Error::UnbalancedParenthesis { pos: pos.clone() });
        }
        self.expression_depth -= 1;
        Ok(())
    }

    /// Read a string between `start` and `end`. A backslash is dropped and the
    /// character after it is kept as written.
    fn read_string(&mut self, start: char, end: char, pos: Position) -> Result<Token> {
        debug_assert_eq!(self.peekc(), Some(start));
        self.nextc();

        let mut value = String::new();
        loop {
            match self.nextc() {
                None => return Err(Error::UnterminatedString { pos }),
                Some(c) if c == end => break,
                Some('\\') => match self.nextc() {
                    Some(c) => value.push(c),
                    None => return Err(Error::UnterminatedString { pos }),
                },
                Some(c) => value.push(c),
            }
        }

        Ok(self.make_token(TokenKind::String(value), pos))
    }

    /// Read a character literal as a number token holding its code
    fn read_char(&mut self, pos: Position) -> Result<Token> {
        self.nextc(); // opening quote

        let c = match self.nextc() {
            Some('\\') => match self.nextc() {
                Some('n') => '\n',
                Some('\\') => '\\',
                Some('t') => '\t',
                Some('\'') => '\'',
                Some(_) => '\0',
                None => return Err(Error::ExpectedChar { expected: '\'', pos }),
            },
            Some(c) => c,
            None => return Err(Error::ExpectedChar { expected: '\'', pos }),
        };

        if self.nextc() != Some('\'') {
            return Err(Error::ExpectedChar {
                expected: '\'',
                pos: self.pos.clone(),
            });
        }

        let kind = TokenKind::Number {
            value: c as u64,
            kind: NumberKind::Normal,
        };
        Ok(self.make_token(kind, pos))
    }

    fn read_identifier_or_keyword(&mut self, pos: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peekc() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            text.push(c);
            self.nextc();
        }

        let kind = if is_keyword(&text) {
            TokenKind::Keyword(text)
        } else {
            TokenKind::Identifier(text)
        };
        self.make_token(kind, pos)
    }
}

/// Tokenize `source`, naming it `filename` in positions
pub fn lex(source: &str, filename: &str) -> Result<Vec<Token>> {
    Lexer::new(source, filename).lex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, "test.cmm")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn op(s: &str) -> TokenKind {
        TokenKind::Operator(s.to_string())
    }

    fn num(value: u64) -> TokenKind {
        TokenKind::Number {
            value,
            kind: NumberKind::Normal,
        }
    }

    #[test]
    fn test_digits_make_one_number() {
        for (src, value) in [("0", 0), ("7", 7), ("123456", 123456), ("18446744073709551615", u64::MAX)] {
            assert_eq!(kinds(src), vec![num(value)]);
        }
    }

    #[test]
    fn test_number_suffixes() {
        assert_eq!(
            kinds("50L 3f"),
            vec![
                TokenKind::Number { value: 50, kind: NumberKind::Long },
                TokenKind::Number { value: 3, kind: NumberKind::Float },
            ]
        );
        assert_eq!(kinds("0x1F 0b101"), vec![num(31), num(5)]);
    }

    #[test]
    fn test_number_overflow_is_fatal() {
        let err = lex("18446744073709551616", "t.cmm").unwrap_err();
        assert!(matches!(err, Error::NumberTooLarge { .. }));
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("int intx _tmp struct __ignore_typecheck__"),
            vec![
                TokenKind::Keyword("int".into()),
                TokenKind::Identifier("intx".into()),
                TokenKind::Identifier("_tmp".into()),
                TokenKind::Keyword("struct".into()),
                TokenKind::Keyword("__ignore_typecheck__".into()),
            ]
        );
    }

    #[test]
    fn test_operators_merge_and_split() {
        assert_eq!(
            kinds("a+=b<<=c->d...e"),
            vec![
                TokenKind::Identifier("a".into()),
                op("+="),
                TokenKind::Identifier("b".into()),
                op("<<="),
                TokenKind::Identifier("c".into()),
                op("->"),
                TokenKind::Identifier("d".into()),
                op("..."),
                TokenKind::Identifier("e".into()),
            ]
        );
        // "**" and "=-" are not operators; the second character is given back
        assert_eq!(kinds("**p"), vec![op("*"), op("*"), TokenKind::Identifier("p".into())]);
        assert_eq!(kinds("x=-1"), vec![TokenKind::Identifier("x".into()), op("="), op("-"), num(1)]);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(
            kinds("{};:#]"),
            vec![
                TokenKind::Symbol('{'),
                TokenKind::Symbol('}'),
                TokenKind::Symbol(';'),
                TokenKind::Symbol(':'),
                TokenKind::Symbol('#'),
                TokenKind::Symbol(']'),
            ]
        );
    }

    #[test]
    fn test_whitespace_flag_marks_previous_token() {
        let tokens = lex("a b\tc", "t.cmm").unwrap();
        let flags: Vec<bool> = tokens.iter().map(|t| t.whitespace).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_comments_and_newlines_are_kept() {
        assert_eq!(
            kinds("1 // one\n/* two\nlines */2"),
            vec![
                num(1),
                TokenKind::Comment(" one".into()),
                TokenKind::Newline,
                TokenKind::Comment(" two\nlines ".into()),
                num(2),
            ]
        );
    }

    #[test]
    fn test_division_is_not_a_comment() {
        assert_eq!(kinds("6/2"), vec![num(6), op("/"), num(2)]);
        assert_eq!(kinds("a/=2"), vec![TokenKind::Identifier("a".into()), op("/="), num(2)]);
    }

    #[test]
    fn test_unterminated_comment_is_fatal() {
        let err = lex("int x; /* unterminated", "t.cmm").unwrap_err();
        assert!(matches!(err, Error::UnterminatedComment { .. }));
    }

    #[test]
    fn test_strings_keep_escaped_characters_undecoded() {
        assert_eq!(kinds(r#""a\nb" "q\"x""#), vec![TokenKind::String("anb".into()), TokenKind::String("q\"x".into())]);
        assert!(matches!(lex("\"open", "t.cmm"), Err(Error::UnterminatedString { .. })));
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(kinds(r"'a' '\n' '\\' '\t' '\'' '\q'"), vec![num(97), num(10), num(92), num(9), num(39), num(0)]);
        assert!(matches!(lex("'ab'", "t.cmm"), Err(Error::ExpectedChar { .. })));
    }

    #[test]
    fn test_include_header_name() {
        assert_eq!(
            kinds("#include <stdio.h>"),
            vec![
                TokenKind::Symbol('#'),
                TokenKind::Keyword("include".into()),
                TokenKind::String("stdio.h".into()),
            ]
        );
        assert_eq!(kinds("a<b"), vec![TokenKind::Identifier("a".into()), op("<"), TokenKind::Identifier("b".into())]);
    }

    #[test]
    fn test_between_brackets() {
        let tokens = lex("(1+ 2) 3", "t.cmm").unwrap();
        let spans: Vec<Option<&str>> = tokens.iter().map(|t| t.between_brackets.as_deref()).collect();
        assert_eq!(spans, vec![Some(""), Some("1"), Some("1+"), Some("1+ 2"), None, None]);
    }

    #[test]
    fn test_between_brackets_spans_nested_parentheses() {
        let tokens = lex("(a(b)c)", "t.cmm").unwrap();
        let spans: Vec<Option<&str>> = tokens.iter().map(|t| t.between_brackets.as_deref()).collect();
        assert_eq!(
            spans,
            vec![Some(""), Some("a"), Some("a("), Some("a(b"), Some("a(b)"), Some("a(b)c"), None]
        );
    }

    #[test]
    fn test_parenthesis_balance() {
        assert!(lex("((1)+(2))", "t.cmm").is_ok());
        assert!(matches!(lex("(1+2", "t.cmm"), Err(Error::UnclosedParenthesis { .. })));
        assert!(matches!(lex("1+2)", "t.cmm"), Err(Error::UnbalancedParenthesis { .. })));
    }

    #[test]
    fn test_positions() {
        let tokens = lex("a\n  bb", "p.cmm").unwrap();
        let pos = &tokens[2].pos;
        assert_eq!((pos.line, pos.col), (2, 3));
    }

    #[test]
    fn test_unexpected_character() {
        let err = lex("int $x;", "t.cmm").unwrap_err();
        assert_eq!(err, Error::UnexpectedCharacter { ch: '$', pos: Position { line: 1, col: 5, filename: "t.cmm".into() } });
    }
}
