//! `ParseError`: the single error kind every parser failure surfaces as,
//! `{ message, position }` plus an `ErrorCode` for
//! programmatic matching.

use crate::ErrorCode;
use std::fmt;

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParseError {
    code: ErrorCode,
    message: String,
    position: u32,
}

impl ParseError {
    #[cold]
    pub fn new(code: ErrorCode, message: impl Into<String>, position: u32) -> Self {
        ParseError { code, message: message.into(), position }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    // --- Lex (E0xxx) ---

    #[cold]
    pub fn unterminated_string(position: u32) -> Self {
        ParseError::new(ErrorCode::UnterminatedString, "unterminated string literal", position)
    }

    #[cold]
    pub fn bad_character(ch: char, position: u32) -> Self {
        ParseError::new(ErrorCode::BadCharacter, format!("unexpected character `{ch}`"), position)
    }

    #[cold]
    pub fn invalid_character_literal_length(position: u32) -> Self {
        ParseError::new(
            ErrorCode::InvalidCharacterLiteralLength,
            "character literal must contain exactly one character",
            position,
        )
    }

    #[cold]
    pub fn missing_digit(position: u32) -> Self {
        ParseError::new(ErrorCode::MissingDigit, "expected a digit", position)
    }

    // --- Parse-structural (E1xxx) ---

    #[cold]
    pub fn unexpected_token(found: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::UnexpectedToken, format!("syntax error near `{found}`"), position)
    }

    #[cold]
    pub fn missing(expected: char, position: u32) -> Self {
        let code = match expected {
            ')' => ErrorCode::MissingCloseParen,
            ']' => ErrorCode::MissingCloseBracket,
            ':' => ErrorCode::MissingColon,
            ',' => ErrorCode::MissingComma,
            _ => ErrorCode::UnexpectedToken,
        };
        ParseError::new(code, format!("expected `{expected}`"), position)
    }

    // --- Name (E2xxx) ---

    #[cold]
    pub fn unknown_identifier(name: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::UnknownIdentifier, format!("unknown identifier `{name}`"), position)
    }

    #[cold]
    pub fn no_implicit_scope_parameter(keyword: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::NoImplicitScopeParameter,
            format!("`{keyword}` is not in scope here"),
            position,
        )
    }

    #[cold]
    pub fn duplicate_identifier(name: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::DuplicateIdentifier, format!("`{name}` is already defined"), position)
    }

    // --- Type (E3xxx) ---

    #[cold]
    pub fn expression_of_type_expected(expected: &str, found: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::ExpressionOfTypeExpected,
            format!("expected expression of type '{expected}', found '{found}'"),
            position,
        )
    }

    #[cold]
    pub fn incompatible_operand_types(op: &str, left: &str, right: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::IncompatibleOperandTypes,
            format!("operator '{op}' incompatible with operand types '{left}' and '{right}'"),
            position,
        )
    }

    #[cold]
    pub fn cannot_convert(from: &str, to: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::CannotConvertValue,
            format!("value of type '{from}' cannot be converted to type '{to}'"),
            position,
        )
    }

    #[cold]
    pub fn no_nullable_form(of: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::NoNullableForm, format!("type '{of}' has no nullable form"), position)
    }

    #[cold]
    pub fn no_matching_constructor(type_name: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::NoMatchingConstructor,
            format!("no matching constructor for '{type_name}'"),
            position,
        )
    }

    #[cold]
    pub fn ambiguous_constructor(type_name: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::AmbiguousConstructor,
            format!("ambiguous constructor invocation for '{type_name}'"),
            position,
        )
    }

    #[cold]
    pub fn no_applicable_method(name: &str, on: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::NoApplicableMethod,
            format!("no applicable method '{name}' on type '{on}'"),
            position,
        )
    }

    #[cold]
    pub fn ambiguous_method(name: &str, on: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::AmbiguousMethod,
            format!("ambiguous method invocation '{name}' on type '{on}'"),
            position,
        )
    }

    #[cold]
    pub fn no_applicable_indexer(on: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::NoApplicableIndexer, format!("no applicable indexer on type '{on}'"), position)
    }

    #[cold]
    pub fn ambiguous_indexer(on: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::AmbiguousIndexer, format!("ambiguous indexer on type '{on}'"), position)
    }

    #[cold]
    pub fn no_applicable_aggregate(name: &str, on: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::NoApplicableAggregate,
            format!("no applicable aggregate '{name}' on type '{on}'"),
            position,
        )
    }

    #[cold]
    pub fn member_not_found(name: &str, on: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::MemberNotFound, format!("no property or field '{name}' on type '{on}'"), position)
    }

    #[cold]
    pub fn inaccessible_type(type_name: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::InaccessibleType, format!("type '{type_name}' is not accessible"), position)
    }

    // --- Literal (E4xxx) ---

    #[cold]
    pub fn invalid_integer_literal(text: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::InvalidIntegerLiteral, format!("invalid integer literal '{text}'"), position)
    }

    #[cold]
    pub fn invalid_real_literal(text: &str, position: u32) -> Self {
        ParseError::new(ErrorCode::InvalidRealLiteral, format!("invalid real literal '{text}'"), position)
    }

    #[cold]
    pub fn invalid_character_literal(text: &str, position: u32) -> Self {
        ParseError::new(
            ErrorCode::InvalidCharacterLiteral,
            format!("invalid character literal '{text}'"),
            position,
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at position {}", self.message, self.code, self.position)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn carries_position_and_code() {
        let err = ParseError::unknown_identifier("Foo", 12);
        assert_eq!(err.position, 12);
        assert_eq!(err.code, ErrorCode::UnknownIdentifier);
        assert!(err.message.contains("Foo"));
    }
}
