//! Error handling for cmmc

use crate::utils::Position;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal compiler error. Any of these stops the compilation of the unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("unexpected token '{ch}'")]
    UnexpectedCharacter { ch: char, pos: Position },

    #[error("unterminated comment")]
    UnterminatedComment { pos: Position },

    #[error("unterminated string literal")]
    UnterminatedString { pos: Position },

    #[error("expected '{expected}' to close the character literal")]
    ExpectedChar { expected: char, pos: Position },

    #[error("the operator {op} is not valid")]
    InvalidOperator { op: String, pos: Position },

    #[error("number literal {text} does not fit in 64 bits")]
    NumberTooLarge { text: String, pos: Position },

    #[error("closing parenthesis without a matching '('")]
    UnbalancedParenthesis { pos: Position },

    #[error("end of input inside an unclosed '('")]
    UnclosedParenthesis { pos: Position },

    // ==================== Parser Errors ====================

    #[error("expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        pos: Position,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, pos: Position },

    #[error("expected a name for the declaration, got {got}")]
    ExpectedIdentifier { got: String, pos: Position },

    #[error("expected a datatype, got {got}")]
    ExpectedDatatype { got: String, pos: Position },

    #[error("secondary datatype not allowed for {base}")]
    SecondaryNotAllowed { base: String, pos: Position },

    #[error("a trailing int is not supported after {base}")]
    DecorativeIntNotAllowed { base: String, pos: Position },

    #[error("array size must be a number literal")]
    ExpectedArraySize { pos: Position },

    #[error("functions cannot be declared inside a body")]
    NestedFunction { pos: Position },

    #[error("'{keyword}' is only allowed inside a switch")]
    OutsideSwitch { keyword: String, pos: Position },

    #[error("object size exceeds the addressable range")]
    SizeTooLarge { pos: Position },

    // ==================== Symbol Errors ====================

    #[error("redefinition of {name}")]
    DuplicateSymbol { name: String, pos: Position },
}

impl Error {
    /// Get the position associated with this error
    pub fn pos(&self) -> &Position {
        match self {
            Self::UnexpectedCharacter { pos, .. }
            | Self::UnterminatedComment { pos }
            | Self::UnterminatedString { pos }
            | Self::ExpectedChar { pos, .. }
            | Self::InvalidOperator { pos, .. }
            | Self::NumberTooLarge { pos, .. }
            | Self::UnbalancedParenthesis { pos }
            | Self::UnclosedParenthesis { pos }
            | Self::UnexpectedToken { pos, .. }
            | Self::UnexpectedEof { pos, .. }
            | Self::ExpectedIdentifier { pos, .. }
            | Self::ExpectedDatatype { pos, .. }
            | Self::SecondaryNotAllowed { pos, .. }
            | Self::DecorativeIntNotAllowed { pos, .. }
            | Self::ExpectedArraySize { pos }
            | Self::NestedFunction { pos }
            | Self::OutsideSwitch { pos, .. }
            | Self::SizeTooLarge { pos }
            | Self::DuplicateSymbol { pos, .. } => pos,
        }
    }

    /// Stable code used in structured reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnexpectedCharacter { .. } => "E0001",
            Self::UnterminatedComment { .. } => "E0002",
            Self::UnterminatedString { .. } => "E0003",
            Self::ExpectedChar { .. } => "E0004",
            Self::InvalidOperator { .. } => "E0005",
            Self::NumberTooLarge { .. } => "E0006",
            Self::UnbalancedParenthesis { .. } => "E0007",
            Self::UnclosedParenthesis { .. } => "E0008",
            Self::UnexpectedToken { .. } => "E0100",
            Self::UnexpectedEof { .. } => "E0101",
            Self::ExpectedIdentifier { .. } => "E0102",
            Self::ExpectedDatatype { .. } => "E0103",
            Self::SecondaryNotAllowed { .. } => "E0104",
            Self::DecorativeIntNotAllowed { .. } => "E0105",
            Self::ExpectedArraySize { .. } => "E0106",
            Self::NestedFunction { .. } => "E0107",
            Self::OutsideSwitch { .. } => "E0108",
            Self::SizeTooLarge { .. } => "E0109",
            Self::DuplicateSymbol { .. } => "E0200",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_message_and_position() {
        let err = Error::InvalidOperator {
            op: "@".to_string(),
            pos: Position::start("t.cmm"),
        };
        assert_eq!(err.to_string(), "the operator @ is not valid");
        assert_eq!(err.pos().line, 1);
        assert_eq!(err.code(), "E0005");
    }
}
