//! Lexer output: `Token` and `TokenKind`.
//!
//! Kinds follow exactly: end, identifier, the three literal forms,
//! and the fixed single/double-character punctuation table.

use crate::Span;
use std::sync::Arc;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TokenKind {
    End,
    Identifier,
    StringLiteral,
    IntegerLiteral,
    RealLiteral,

    Bang, // !
    Percent, // %
    Amp, // &
    LParen, // (
    RParen, // )
    Star, // *
    Plus, // +
    Comma, // ,
    Minus, // -
    Dot, // .
    Slash, // /
    Colon, // :
    Lt, // <
    Eq, // =
    Gt, // >
    Question, // ?
    LBracket, // [
    RBracket, // ]
    Pipe, // |

    BangEq, // !=
    AmpAmp, // &&
    LtEq, // <=
    LtGt, // <>
    EqEq, // ==
    GtEq, // >=
    PipePipe, // ||
    GtGt, // >>
    LtLt, // <<
}

impl TokenKind {
    /// Human-readable form for error messages ("expected `)`").
    pub fn display_name(self) -> &'static str {
        use TokenKind::*;
        match self {
            End => "end of expression",
            Identifier => "identifier",
            StringLiteral => "string literal",
            IntegerLiteral => "integer literal",
            RealLiteral => "real literal",
            Bang => "!",
            Percent => "%",
            Amp => "&",
            LParen => "(",
            RParen => ")",
            Star => "*",
            Plus => "+",
            Comma => ",",
            Minus => "-",
            Dot => ".",
            Slash => "/",
            Colon => ":",
            Lt => "<",
            Eq => "=",
            Gt => ">",
            Question => "?",
            LBracket => "[",
            RBracket => "]",
            Pipe => "|",
            BangEq => "!=",
            AmpAmp => "&&",
            LtEq => "<=",
            LtGt => "<>",
            EqEq => "==",
            GtEq => ">=",
            PipePipe => "||",
            GtGt => ">>",
            LtLt => "<<",
        }
    }
}

/// A single lexed token: its kind, the exact source text it covers
/// (suffix included for numeric literals), and its starting position.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Arc<str>,
    pub position: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<Arc<str>>, position: u32) -> Self {
        Token { kind, text: text.into(), position }
    }

    pub fn span(&self) -> Span {
        Span::new(self.position, self.position + self.text.chars().count() as u32)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}
