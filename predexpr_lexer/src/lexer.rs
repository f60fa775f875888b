//! Single-pass character-cursor lexer: whitespace is skipped,
//! identifiers and sigil aliases are recognized, strings use doubled-quote
//! escapes, and numeric literals are scanned maximally (digits plus any
//! suffix letter the active [`NumberParserRegistry`] recognizes) without
//! being resolved to a value yet — that happens once the parser knows
//! whether an integer or real literal is expected.

use std::sync::Arc;

use predexpr_diagnostic::ParseError;
use predexpr_ir::{Token, TokenKind};
use rustc_hash::FxHashSet;

use crate::cursor::Cursor;

/// Identifier start characters beyond ASCII letters and `_`: the three
/// scope sigils (`$` = it, `^` = parent, `~` = root) are each a complete
/// one-character identifier on their own, and `@` starts a positional
/// substitution placeholder (`@0`, `@1`, ...).
fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '@' || c == '$' || c == '^' || c == '~'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    chars: &'a [char],
    suffix_chars: &'a FxHashSet<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(chars: &'a [char], suffix_chars: &'a FxHashSet<char>) -> Self {
        Lexer { cursor: Cursor::new(chars), chars, suffix_chars }
    }

    /// Tokenizes the whole input, appending a trailing `End` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_end = tok.kind == TokenKind::End;
            tokens.push(tok);
            if is_end {
                break;
            }
        }
        Ok(tokens)
    }

    fn make(&self, kind: TokenKind, start: u32) -> Token {
        let text: Arc<str> = self.chars[start as usize..self.cursor.pos() as usize].iter().collect::<String>().into();
        Token::new(kind, text, start)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.cursor.eat_while(char::is_whitespace);
        let start = self.cursor.pos();

        if self.cursor.is_eof() {
            return Ok(Token::new(TokenKind::End, Arc::from(""), start));
        }

        let c = self.cursor.current();

        if c == '$' || c == '^' || c == '~' {
            self.cursor.advance();
            return Ok(self.make(TokenKind::Identifier, start));
        }

        if is_identifier_start(c) {
            return self.lex_identifier(start);
        }

        if c.is_ascii_digit() {
            return self.lex_number(start);
        }

        if c == '"' || c == '\'' {
            return self.lex_string(start, c);
        }

        self.lex_punctuation(start)
    }

    fn lex_identifier(&mut self, start: u32) -> Result<Token, ParseError> {
        self.cursor.advance();
        self.cursor.eat_while(is_identifier_continue);
        Ok(self.make(TokenKind::Identifier, start))
    }

    fn lex_number(&mut self, start: u32) -> Result<Token, ParseError> {
        self.cursor.eat_while(|c| c.is_ascii_digit());
        let mut is_real = false;

        if self.cursor.current() == '.' && self.cursor.peek().is_ascii_digit() {
            is_real = true;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }

        if matches!(self.cursor.current(), 'e' | 'E') {
            let exp_start = self.cursor.pos();
            self.cursor.advance();
            if matches!(self.cursor.current(), '+' | '-') {
                self.cursor.advance();
            }
            if self.cursor.current().is_ascii_digit() {
                is_real = true;
                self.cursor.eat_while(|c| c.is_ascii_digit());
            } else {
                return Err(ParseError::missing_digit(exp_start));
            }
        }

        // Maximal munch: consume any trailing letters from the active
        // numeric-suffix set. Validity is decided later by the
        // registry, not here.
        self.cursor.eat_while(|c| self.suffix_chars.contains(&c.to_ascii_uppercase()));

        let kind = if is_real { TokenKind::RealLiteral } else { TokenKind::IntegerLiteral };
        Ok(self.make(kind, start))
    }

    fn lex_string(&mut self, start: u32, quote: char) -> Result<Token, ParseError> {
        self.cursor.advance();
        loop {
            if self.cursor.is_eof() {
                return Err(ParseError::unterminated_string(start));
            }
            let c = self.cursor.current();
            if c == quote {
                self.cursor.advance();
                if self.cursor.current() == quote {
                    // doubled quote escape: consume both and keep scanning
                    self.cursor.advance();
                    continue;
                }
                break;
            }
            self.cursor.advance();
        }

        if quote == '\'' {
            let unescaped = unescape_doubled(&self.chars[start as usize + 1..self.cursor.pos() as usize - 1], quote);
            if unescaped.chars().count() != 1 {
                return Err(ParseError::invalid_character_literal_length(start));
            }
        }

        Ok(self.make(TokenKind::StringLiteral, start))
    }

    fn lex_punctuation(&mut self, start: u32) -> Result<Token, ParseError> {
        let c = self.cursor.current();
        self.cursor.advance();
        let kind = match c {
            '!' => {
                if self.cursor.eat('=') {
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            '%' => TokenKind::Percent,
            '&' => {
                if self.cursor.eat('&') {
                    TokenKind::AmpAmp
                } else {
                    TokenKind::Amp
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '*' => TokenKind::Star,
            '+' => TokenKind::Plus,
            ',' => TokenKind::Comma,
            '-' => TokenKind::Minus,
            '.' => TokenKind::Dot,
            '/' => TokenKind::Slash,
            ':' => TokenKind::Colon,
            '<' => {
                if self.cursor.eat('=') {
                    TokenKind::LtEq
                } else if self.cursor.eat('>') {
                    TokenKind::LtGt
                } else if self.cursor.eat('<') {
                    TokenKind::LtLt
                } else {
                    TokenKind::Lt
                }
            }
            '=' => {
                if self.cursor.eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '>' => {
                if self.cursor.eat('=') {
                    TokenKind::GtEq
                } else if self.cursor.eat('>') {
                    TokenKind::GtGt
                } else {
                    TokenKind::Gt
                }
            }
            '?' => TokenKind::Question,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '|' => {
                if self.cursor.eat('|') {
                    TokenKind::PipePipe
                } else {
                    TokenKind::Pipe
                }
            }
            other => return Err(ParseError::bad_character(other, start)),
        };
        Ok(self.make(kind, start))
    }
}

/// Folds doubled-quote escapes (`""` -> `"`, `''` -> `'`) in a string or
/// character literal's interior, used to validate character-literal length
/// and later (by the parser) to build the literal's runtime value.
pub fn unescape_doubled(interior: &[char], quote: char) -> String {
    let mut out = String::with_capacity(interior.len());
    let mut i = 0;
    while i < interior.len() {
        let c = interior[i];
        if c == quote && interior.get(i + 1) == Some(&quote) {
            out.push(quote);
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::number_literal::NumberParserRegistry;
    use pretty_assertions::assert_eq;

    fn lex(src: &str) -> Vec<Token> {
        let chars: Vec<char> = src.chars().collect();
        let registry = NumberParserRegistry::new();
        let suffixes = registry.suffix_chars();
        Lexer::new(&chars, &suffixes).tokenize().unwrap()
    }

    #[test]
    fn skips_whitespace_and_emits_end() {
        let toks = lex(" ");
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::End);
    }

    #[test]
    fn lexes_identifiers_and_sigils() {
        let toks = lex("City $ ^ ~ @0");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::End,
        ]);
        assert_eq!(&*toks[4].text, "@0");
    }

    #[test]
    fn lexes_operators_with_maximal_munch() {
        let toks = lex("<= <> << >= != &&");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
                TokenKind::LtEq,
                TokenKind::LtGt,
                TokenKind::LtLt,
                TokenKind::GtEq,
                TokenKind::BangEq,
                TokenKind::AmpAmp,
                TokenKind::End,
        ]);
    }

    #[test]
    fn lexes_real_literal_with_exponent_and_suffix() {
        let toks = lex("1.5E+3F");
        assert_eq!(toks[0].kind, TokenKind::RealLiteral);
        assert_eq!(&*toks[0].text, "1.5E+3F");
    }

    #[test]
    fn exponent_without_digit_is_a_lex_error() {
        let chars: Vec<char> = "1.5E+".chars().collect();
        let registry = NumberParserRegistry::new();
        let suffixes = registry.suffix_chars();
        let err = Lexer::new(&chars, &suffixes).tokenize().unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::MissingDigit);
    }

    #[test]
    fn lexes_integer_with_unsigned_suffix() {
        let toks = lex("42UL");
        assert_eq!(toks[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(&*toks[0].text, "42UL");
    }

    #[test]
    fn doubled_quote_escapes_a_string() {
        let toks = lex(r#""it""s fine""#);
        assert_eq!(toks[0].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn single_char_literal_is_accepted() {
        let toks = lex("'x'");
        assert_eq!(toks[0].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn multi_char_literal_is_rejected() {
        let chars: Vec<char> = "'xy'".chars().collect();
        let registry = NumberParserRegistry::new();
        let suffixes = registry.suffix_chars();
        let err = Lexer::new(&chars, &suffixes).tokenize().unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::InvalidCharacterLiteralLength);
    }

    #[test]
    fn unterminated_string_reports_error() {
        let chars: Vec<char> = "\"abc".chars().collect();
        let registry = NumberParserRegistry::new();
        let suffixes = registry.suffix_chars();
        let err = Lexer::new(&chars, &suffixes).tokenize().unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::UnterminatedString);
    }

    #[test]
    fn unknown_character_reports_position() {
        let chars: Vec<char> = "a # b".chars().collect();
        let registry = NumberParserRegistry::new();
        let suffixes = registry.suffix_chars();
        let err = Lexer::new(&chars, &suffixes).tokenize().unwrap_err();
        assert_eq!(err.position(), 2);
    }
}
