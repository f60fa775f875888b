//! Recursive-descent parser and semantic analyzer: turns
//! token streams from `predexpr_lexer` into a fully typed `TypedExpr`,
//! resolving identifiers through `Scope`, operators through `operators`,
//! conversions through `promotion`, and overloaded calls through
//! `overload`.

use std::sync::Arc;

use predexpr_diagnostic::ParseError;
use predexpr_ir::{
    BinaryOp, DynamicProperty, ExprKind, LambdaExpr, Name, ParamDef, Signature, Span, Token, TokenKind, TypeDesc,
    TypeKey, TypeRegistry, TypedExpr, UnaryOp, Value,
};
use predexpr_lexer::{Lexer, NumberParserRegistry};

use crate::anon_class::AnonymousClassFactory;
use crate::bindings::{positional_locals, Binding};
use crate::operators::type_binary;
use crate::overload::{resolve, Candidate, Resolution};
use crate::promotion::{explicit_convert, promote};
use crate::scope::{Externals, Scope};

/// Construction-time options: case sensitivity of
/// identifier/member resolution, and the active numeric-suffix bundle.
#[derive(Clone)]
pub struct ParserOptions {
    pub case_sensitive_identifiers: bool,
    pub numeric_suffix_handlers: NumberParserRegistry,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions { case_sensitive_identifiers: false, numeric_suffix_handlers: NumberParserRegistry::new() }
    }
}

/// An expression plus the raw literal text it came from, when it is
/// nothing but a single numeric/string literal token (possibly folded
/// under a unary minus) — consulted by `promotion::promote`'s re-parse
/// narrowing. Cleared as soon as an operator combines it with anything.
type Parsed = (TypedExpr, Option<String>);

const AGGREGATE_NAMES: &[&str] = &[
    "where", "any", "all", "first", "firstordefault", "single", "singleordefault", "last", "lastordefault", "count",
    "min", "max", "sum", "average", "select", "orderby", "orderbydescending", "contains",
];

fn primitive_type_named(name: &str) -> Option<TypeDesc> {
    let table: &[(&str, TypeDesc)] = &[
        ("sbyte", TypeDesc::I8),
        ("short", TypeDesc::I16),
        ("int", TypeDesc::I32),
        ("long", TypeDesc::I64),
        ("byte", TypeDesc::U8),
        ("ushort", TypeDesc::U16),
        ("uint", TypeDesc::U32),
        ("ulong", TypeDesc::U64),
        ("float", TypeDesc::F32),
        ("double", TypeDesc::F64),
        ("decimal", TypeDesc::Decimal),
        ("bool", TypeDesc::Bool),
        ("char", TypeDesc::Char),
        ("string", TypeDesc::String),
        ("guid", TypeDesc::Guid),
    ];
    table.iter().find(|(n, _)| name.eq_ignore_ascii_case(n)).map(|(_, t)| t.clone())
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    registry: &'a NumberParserRegistry,
    types: &'a TypeRegistry,
    anon: &'a AnonymousClassFactory,
    options: &'a ParserOptions,
    scope: Scope,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected_char: char) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.bump())
        } else {
            Err(ParseError::missing(expected_char, self.cur().position))
        }
    }

    fn is_word(&self, word: &str) -> bool {
        self.check(TokenKind::Identifier) && self.cur().text.eq_ignore_ascii_case(word)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.is_word(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn names_match(&self, a: &str, b: &str) -> bool {
        if self.options.case_sensitive_identifiers {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    // ---- precedence chain ----

    fn parse_top(&mut self) -> Result<Parsed, ParseError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Parsed, ParseError> {
        let (test, _) = self.parse_logical_or()?;
        if self.eat(TokenKind::Question) {
            let position = test.span.start;
            if test.ty != TypeDesc::Bool {
                return Err(ParseError::expression_of_type_expected("bool", &test.ty.to_string(), position));
            }
            let (then_branch, _) = self.parse_conditional()?;
            self.expect(TokenKind::Colon, ':')?;
            let (else_branch, _) = self.parse_conditional()?;
            let combined = self.combine_conditional(test, then_branch, else_branch)?;
            return Ok((combined, None));
        }
        Ok((test, None))
    }

    fn combine_conditional(&self, test: TypedExpr, then_branch: TypedExpr, else_branch: TypedExpr) -> Result<TypedExpr, ParseError> {
        let span = test.span.merge(then_branch.span).merge(else_branch.span);
        if then_branch.ty == else_branch.ty {
            let ty = then_branch.ty.clone();
            return Ok(TypedExpr::new(
                    ExprKind::Conditional { test: Box::new(test), then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) },
                    ty,
                    span,
            ));
        }
        if let Ok(promoted) = promote(else_branch.clone(), None, &then_branch.ty, false, self.registry, self.types) {
            let ty = then_branch.ty.clone();
            return Ok(TypedExpr::new(
                    ExprKind::Conditional { test: Box::new(test), then_branch: Box::new(then_branch), else_branch: Box::new(promoted) },
                    ty,
                    span,
            ));
        }
        if let Ok(promoted) = promote(then_branch.clone(), None, &else_branch.ty, false, self.registry, self.types) {
            let ty = else_branch.ty.clone();
            return Ok(TypedExpr::new(
                    ExprKind::Conditional { test: Box::new(test), then_branch: Box::new(promoted), else_branch: Box::new(else_branch) },
                    ty,
                    span,
            ));
        }
        Err(ParseError::incompatible_operand_types("?:", &then_branch.ty.to_string(), &else_branch.ty.to_string(), span.start))
    }

    fn parse_logical_or(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_in()?;
        loop {
            if self.eat(TokenKind::PipePipe) || self.eat_word("or") {
                let (right, _) = self.parse_in()?;
                let span = left.span.merge(right.span);
                left = type_binary(BinaryOp::Or, left, right, self.registry, self.types, span)?;
                lit = None;
            } else {
                break;
            }
        }
        Ok((left, lit))
    }

    fn parse_in(&mut self) -> Result<Parsed, ParseError> {
        let (left, lit) = self.parse_logical_and()?;
        if !self.eat_word("in") {
            return Ok((left, lit));
        }
        let position = left.span.start;
        if self.eat(TokenKind::LParen) {
            let mut combined: Option<TypedExpr> = None;
            loop {
                let (candidate, _) = self.parse_conditional()?;
                let span = left.span.merge(candidate.span);
                let eq = type_binary(BinaryOp::Eq, left.clone(), candidate, self.registry, self.types, span)?;
                combined = Some(match combined {
                        None => eq,
                        Some(acc) => {
                            let span = acc.span.merge(eq.span);
                            type_binary(BinaryOp::Or, acc, eq, self.registry, self.types, span)?
                        }
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, ')')?;
            let out = combined.ok_or_else(|| ParseError::unexpected_token(")", position))?;
            Ok((out, None))
        } else {
            let (container, _) = self.parse_logical_and()?;
            let out = self.apply_contains(container, left, position)?;
            Ok((out, None))
        }
    }

    fn parse_logical_and(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_bitwise()?;
        loop {
            if self.eat(TokenKind::AmpAmp) || self.eat_word("and") {
                let (right, _) = self.parse_bitwise()?;
                let span = left.span.merge(right.span);
                left = type_binary(BinaryOp::And, left, right, self.registry, self.types, span)?;
                lit = None;
            } else {
                break;
            }
        }
        Ok((left, lit))
    }

    fn parse_bitwise(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_equality()?;
        loop {
            let op = if self.eat(TokenKind::Pipe) {
                BinaryOp::BitOr
            } else if self.eat(TokenKind::Amp) {
                BinaryOp::BitAnd
            } else {
                break;
            };
            let (right, _) = self.parse_equality()?;
            let span = left.span.merge(right.span);
            left = type_binary(op, left, right, self.registry, self.types, span)?;
            lit = None;
        }
        Ok((left, lit))
    }

    fn parse_equality(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_relational()?;
        loop {
            let op = if self.eat(TokenKind::Eq) || self.eat(TokenKind::EqEq) {
                BinaryOp::Eq
            } else if self.eat(TokenKind::BangEq) || self.eat(TokenKind::LtGt) {
                BinaryOp::Ne
            } else {
                break;
            };
            let (right, _) = self.parse_relational()?;
            let span = left.span.merge(right.span);
            left = type_binary(op, left, right, self.registry, self.types, span)?;
            lit = None;
        }
        Ok((left, lit))
    }

    fn parse_relational(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_shift()?;
        loop {
            let op = if self.eat(TokenKind::Lt) {
                BinaryOp::Lt
            } else if self.eat(TokenKind::LtEq) {
                BinaryOp::Le
            } else if self.eat(TokenKind::Gt) {
                BinaryOp::Gt
            } else if self.eat(TokenKind::GtEq) {
                BinaryOp::Ge
            } else {
                break;
            };
            let (right, _) = self.parse_shift()?;
            let span = left.span.merge(right.span);
            left = type_binary(op, left, right, self.registry, self.types, span)?;
            lit = None;
        }
        Ok((left, lit))
    }

    fn parse_shift(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_additive()?;
        loop {
            let op = if self.eat(TokenKind::LtLt) {
                BinaryOp::Shl
            } else if self.eat(TokenKind::GtGt) {
                BinaryOp::Shr
            } else {
                break;
            };
            let (right, _) = self.parse_additive()?;
            let span = left.span.merge(right.span);
            left = type_binary(op, left, right, self.registry, self.types, span)?;
            lit = None;
        }
        Ok((left, lit))
    }

    fn parse_additive(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_multiplicative()?;
        loop {
            let op = if self.eat(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.eat(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let (right, _) = self.parse_multiplicative()?;
            let span = left.span.merge(right.span);
            left = type_binary(op, left, right, self.registry, self.types, span)?;
            lit = None;
        }
        Ok((left, lit))
    }

    fn parse_multiplicative(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut lit) = self.parse_unary()?;
        loop {
            let op = if self.eat(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.eat(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.eat(TokenKind::Percent) || self.eat_word("mod") {
                BinaryOp::Mod
            } else {
                break;
            };
            let (right, _) = self.parse_unary()?;
            let span = left.span.merge(right.span);
            left = type_binary(op, left, right, self.registry, self.types, span)?;
            lit = None;
        }
        Ok((left, lit))
    }

    fn parse_unary(&mut self) -> Result<Parsed, ParseError> {
        if self.eat(TokenKind::Minus) {
            let start = self.tokens[self.pos - 1].position;
            let (operand, lit) = self.parse_unary()?;
            if let (Some(text), Some(kind)) = (&lit, operand.ty.numeric_kind()) {
                if let Ok(value) = if kind.is_real() {
                    self.registry.parse_real(text, true, start)
                } else {
                    self.registry.parse_integer(text, true, start)
                } {
                    let span = Span::new(start, operand.span.end);
                    let folded = TypedExpr::new(ExprKind::Constant(value), operand.ty.clone(), span);
                    return Ok((folded, Some(format!("-{text}"))));
                }
            }
            if operand.ty.numeric_kind().is_none() {
                return Err(ParseError::expression_of_type_expected("numeric", &operand.ty.to_string(), start));
            }
            let span = Span::new(start, operand.span.end);
            let ty = operand.ty.clone();
            return Ok((TypedExpr::new(ExprKind::Unary { op: UnaryOp::Negate, operand: Box::new(operand) }, ty, span), None));
        }
        if self.eat(TokenKind::Bang) || self.eat_word("not") {
            let start = self.tokens[self.pos - 1].position;
            let (operand, _) = self.parse_unary()?;
            if operand.ty != TypeDesc::Bool {
                return Err(ParseError::expression_of_type_expected("bool", &operand.ty.to_string(), start));
            }
            let span = Span::new(start, operand.span.end);
            return Ok((TypedExpr::new(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) }, TypeDesc::Bool, span), None));
        }
        self.parse_postfix()
    }

    // ---- postfix chain: member access, indexing, calls ----

    fn parse_postfix(&mut self) -> Result<Parsed, ParseError> {
        let (mut expr, mut lit) = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::Dot) {
                let name_tok = self.expect(TokenKind::Identifier, '.')?;
                if self.check(TokenKind::LParen) {
                    expr = self.parse_call(expr, &name_tok.text, name_tok.position)?;
                } else {
                    expr = self.lookup_member(expr, &name_tok.text, name_tok.position)?;
                }
                lit = None;
            } else if self.eat(TokenKind::LBracket) {
                let (index, index_lit) = self.parse_conditional()?;
                self.expect(TokenKind::RBracket, ']')?;
                expr = self.apply_index(expr, index, index_lit.as_deref())?;
                lit = None;
            } else if matches!(expr.ty, TypeDesc::Lambda(..)) && self.check(TokenKind::LParen) {
                expr = self.parse_invoke(expr)?;
                lit = None;
            } else {
                break;
            }
        }
        Ok((expr, lit))
    }

    /// `@i(args)`: a bound `LambdaExpression` substitution value applied to
    /// a parenthesized argument list. There is exactly one candidate
    /// signature — the lambda's own parameter list — so this promotes
    /// arguments directly against it rather than going through overload
    /// resolution.
    fn parse_invoke(&mut self, lambda: TypedExpr) -> Result<TypedExpr, ParseError> {
        let TypeDesc::Lambda(params, ret) = lambda.ty.clone() else {
            return Err(ParseError::no_applicable_method("invoke", &lambda.ty.to_string(), lambda.span.start));
        };
        let start = lambda.span.start;
        let (args, lits) = self.parse_argument_list()?;
        if args.len() != params.len() {
            return Err(ParseError::no_applicable_method("invoke", &lambda.ty.to_string(), start));
        }
        let mut promoted = Vec::with_capacity(args.len());
        for ((arg, lit), target) in args.into_iter().zip(lits).zip(params.iter()) {
            let arg = promote(arg, lit.as_deref(), target, false, self.registry, self.types)
            .map_err(|_| ParseError::no_applicable_method("invoke", &lambda.ty.to_string(), start))?;
            promoted.push(arg);
        }
        let end = self.tokens[self.pos - 1].position;
        Ok(TypedExpr::new(ExprKind::Invoke { lambda: Box::new(lambda), args: promoted }, *ret, Span::new(start, end)))
    }

    fn parse_argument_list(&mut self) -> Result<(Vec<TypedExpr>, Vec<Option<String>>), ParseError> {
        self.expect(TokenKind::LParen, '(')?;
        let mut exprs = Vec::new();
        let mut lits = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let (e, l) = self.parse_conditional()?;
                exprs.push(e);
                lits.push(l);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ')')?;
        Ok((exprs, lits))
    }

    fn object_info(&self, ty: &TypeDesc) -> Option<Arc<predexpr_ir::TypeInfo>> {
        match ty {
            TypeDesc::Object(key) => self.types.lookup(key).cloned(),
            _ => None,
        }
    }

    fn parse_call(&mut self, receiver: TypedExpr, method: &str, position: u32) -> Result<TypedExpr, ParseError> {
        let lower = method.to_ascii_lowercase();
        let is_enumerable = matches!(&receiver.ty, TypeDesc::Array(_))
        || self.object_info(&receiver.ty).is_some_and(|info| info.enumerable_element.is_some());
        let has_host_method = self.object_info(&receiver.ty).is_some_and(|info| {
                self.base_chain_infos(info.key.clone()).iter().any(|i| i.methods.iter().any(|m| !m.is_static && self.names_match(m.name.as_str(), method)))
        });

        if is_enumerable && !has_host_method && AGGREGATE_NAMES.contains(&lower.as_str()) {
            return self.parse_aggregate_call(receiver, &lower, position);
        }

        let (args, lits) = self.parse_argument_list()?;
        let lit_refs: Vec<Option<&str>> = lits.iter().map(|l| l.as_deref()).collect();

        let Some(info) = self.object_info(&receiver.ty) else {
            return Err(ParseError::no_applicable_method(method, &receiver.ty.to_string(), position));
        };
        let candidates: Vec<Candidate<Name>> = self
        .base_chain_infos(info.key.clone())
        .iter()
        .flat_map(|i| i.methods.iter())
        .filter(|m| !m.is_static && self.names_match(m.name.as_str(), method))
        .map(|m| Candidate { params: m.params.clone(), payload: m.name.clone() })
        .collect();
        let return_ty = self
        .base_chain_infos(info.key.clone())
        .iter()
        .flat_map(|i| i.methods.iter())
        .find(|m| !m.is_static && self.names_match(m.name.as_str(), method) && m.params.len() == args.len())
        .map(|m| m.return_type.clone());

        match resolve(candidates, &args, &lit_refs, self.registry, self.types) {
            Resolution::None => Err(ParseError::no_applicable_method(method, &receiver.ty.to_string(), position)),
            Resolution::Ambiguous(_) => Err(ParseError::ambiguous_method(method, &receiver.ty.to_string(), position)),
            Resolution::Unique { payload, promoted_args } => {
                let span = Span::new(receiver.span.start, position);
                let ty = return_ty.unwrap_or(TypeDesc::Void);
                Ok(TypedExpr::new(
                        ExprKind::MethodCall { receiver: Some(Box::new(receiver)), method: payload, args: promoted_args },
                        ty,
                        span,
                ))
            }
        }
    }

    fn base_chain_infos(&self, key: TypeKey) -> Vec<Arc<predexpr_ir::TypeInfo>> {
        let mut out = Vec::new();
        if let Some(info) = self.types.lookup(&key) {
            out.push(info.clone());
        }
        for base in self.types.base_chain(&key) {
            if let Some(info) = self.types.lookup(&base) {
                out.push(info.clone());
            }
        }
        out
    }

    fn lookup_member(&self, target: TypedExpr, name: &str, position: u32) -> Result<TypedExpr, ParseError> {
        match &target.ty {
            TypeDesc::Tuple(elems) => {
                if let Some(ty) = tuple_item_index(name).and_then(|idx| tuple_item_type(elems, idx)) {
                    let span = Span::new(target.span.start, position);
                    return Ok(TypedExpr::new(ExprKind::MemberAccess { target: Box::new(target), member: Name::from(name) }, ty, span));
                }
                Err(ParseError::member_not_found(name, &target.ty.to_string(), position))
            }
            TypeDesc::Anonymous(sig) => {
                if let Some(field) = sig.fields().iter().find(|f| self.names_match(f.name.as_str(), name)) {
                    let ty = field.ty.clone();
                    let span = Span::new(target.span.start, position);
                    return Ok(TypedExpr::new(ExprKind::MemberAccess { target: Box::new(target), member: Name::from(name) }, ty, span));
                }
                Err(ParseError::member_not_found(name, &target.ty.to_string(), position))
            }
            TypeDesc::Object(key) => {
                for info in self.base_chain_infos(key.clone()) {
                    if let Some(field) = info.fields.iter().find(|f| !f.is_static && self.names_match(f.name.as_str(), name)) {
                        let ty = field.ty.clone();
                        let span = Span::new(target.span.start, position);
                        return Ok(TypedExpr::new(ExprKind::MemberAccess { target: Box::new(target), member: Name::from(name) }, ty, span));
                    }
                }
                Err(ParseError::member_not_found(name, &target.ty.to_string(), position))
            }
            other => Err(ParseError::member_not_found(name, &other.to_string(), position)),
        }
    }

    fn apply_index(&self, target: TypedExpr, index: TypedExpr, index_lit: Option<&str>) -> Result<TypedExpr, ParseError> {
        let position = index.span.start;
        match &target.ty {
            TypeDesc::Array(elem) => {
                let elem_ty = (**elem).clone();
                let index = promote(index, index_lit, &TypeDesc::I32, false, self.registry, self.types)?;
                let span = Span::new(target.span.start, index.span.end);
                Ok(TypedExpr::new(ExprKind::Index { target: Box::new(target), index: Box::new(index) }, elem_ty, span))
            }
            TypeDesc::Object(key) => {
                let indexer = self.base_chain_infos(key.clone()).into_iter().find_map(|i| i.indexer.clone());
                match indexer {
                    Some(ix) => {
                        let index = promote(index, index_lit, &ix.index_ty, false, self.registry, self.types)
                        .map_err(|_| ParseError::no_applicable_indexer(&target.ty.to_string(), position))?;
                        let span = Span::new(target.span.start, index.span.end);
                        Ok(TypedExpr::new(ExprKind::Index { target: Box::new(target), index: Box::new(index) }, ix.element_ty, span))
                    }
                    None => Err(ParseError::no_applicable_indexer(&target.ty.to_string(), position)),
                }
            }
            other => Err(ParseError::no_applicable_indexer(&other.to_string(), position)),
        }
    }

    fn element_type_of(&self, ty: &TypeDesc) -> Option<TypeDesc> {
        match ty {
            TypeDesc::Array(elem) => Some((**elem).clone()),
            TypeDesc::Object(key) => self.types.lookup(key).and_then(|i| i.enumerable_element.clone()),
            _ => None,
        }
    }

    fn apply_contains(&mut self, container: TypedExpr, needle: TypedExpr, position: u32) -> Result<TypedExpr, ParseError> {
        let Some(elem_ty) = self.element_type_of(&container.ty) else {
            return Err(ParseError::no_applicable_aggregate("Contains", &container.ty.to_string(), position));
        };
        let needle = promote(needle, None, &elem_ty, false, self.registry, self.types)?;
        let span = Span::new(container.span.start, needle.span.end);
        Ok(TypedExpr::new(
                ExprKind::MethodCall { receiver: Some(Box::new(container)), method: Name::from("Contains"), args: vec![needle] },
                TypeDesc::Bool,
                span,
        ))
    }

    /// Parses and types one aggregate-operator call. Every
    /// operator but `Contains` shifts `it` to the enumerable's element type
    /// while its single predicate/selector argument is parsed; `Contains`
    /// keeps the outer `it` since its argument is a plain value, not a
    /// per-element body.
    fn parse_aggregate_call(&mut self, receiver: TypedExpr, op: &str, position: u32) -> Result<TypedExpr, ParseError> {
        let Some(elem_ty) = self.element_type_of(&receiver.ty) else {
            return Err(ParseError::no_applicable_aggregate(op, &receiver.ty.to_string(), position));
        };

        let needs_shift = op != "contains";
        let saved_scope = self.scope.clone();
        if needs_shift {
            let new_it = TypedExpr::new(ExprKind::Parameter(Name::from("it")), elem_ty.clone(), Span::point(position));
            self.scope = self.scope.enter_aggregate(new_it);
        }
        let parsed = self.parse_argument_list();
        if needs_shift {
            self.scope = saved_scope;
        }
        let (mut args, _lits) = parsed?;
        let span = Span::new(receiver.span.start, position);

        if op == "contains" {
            if args.len() != 1 {
                return Err(ParseError::no_applicable_aggregate("Contains", &receiver.ty.to_string(), position));
            }
            let needle = promote(args.remove(0), None, &elem_ty, false, self.registry, self.types)?;
            return Ok(TypedExpr::new(
                    ExprKind::MethodCall { receiver: Some(Box::new(receiver)), method: Name::from("Contains"), args: vec![needle] },
                    TypeDesc::Bool,
                    span,
            ));
        }

        let require_no_args_or_predicate = |args: &[TypedExpr]| -> Result<(), ParseError> {
            match args.first() {
                None => Ok(()),
                Some(a) if a.ty == TypeDesc::Bool => Ok(()),
                Some(a) => Err(ParseError::expression_of_type_expected("bool", &a.ty.to_string(), a.span.start)),
            }
        };
        let require_one_predicate = |args: &[TypedExpr]| -> Result<(), ParseError> {
            match args {
                [a] if a.ty == TypeDesc::Bool => Ok(()),
                [a] => Err(ParseError::expression_of_type_expected("bool", &a.ty.to_string(), a.span.start)),
                _ => Err(ParseError::no_applicable_aggregate(op, &receiver.ty.to_string(), position)),
            }
        };

        let (method, result_ty): (&str, TypeDesc) = match op {
            "where" => {
                require_one_predicate(&args)?;
                ("Where", receiver.ty.clone())
            }
            "any" => {
                require_no_args_or_predicate(&args)?;
                ("Any", TypeDesc::Bool)
            }
            "all" => {
                require_one_predicate(&args)?;
                ("All", TypeDesc::Bool)
            }
            "first" => {
                require_no_args_or_predicate(&args)?;
                ("First", elem_ty.clone())
            }
            "firstordefault" => {
                require_no_args_or_predicate(&args)?;
                ("FirstOrDefault", elem_ty.clone())
            }
            "single" => {
                require_no_args_or_predicate(&args)?;
                ("Single", elem_ty.clone())
            }
            "singleordefault" => {
                require_no_args_or_predicate(&args)?;
                ("SingleOrDefault", elem_ty.clone())
            }
            "last" => {
                require_no_args_or_predicate(&args)?;
                ("Last", elem_ty.clone())
            }
            "lastordefault" => {
                require_no_args_or_predicate(&args)?;
                ("LastOrDefault", elem_ty.clone())
            }
            "count" => {
                require_no_args_or_predicate(&args)?;
                ("Count", TypeDesc::I32)
            }
            "min" => ("Min", args.first().map(|a| a.ty.clone()).unwrap_or_else(|| elem_ty.clone())),
            "max" => ("Max", args.first().map(|a| a.ty.clone()).unwrap_or_else(|| elem_ty.clone())),
            "sum" => {
                let ty = args.first().map(|a| a.ty.clone()).unwrap_or_else(|| elem_ty.clone());
                if ty.numeric_kind().is_none() {
                    return Err(ParseError::expression_of_type_expected("numeric", &ty.to_string(), position));
                }
                ("Sum", ty)
            }
            "average" => {
                let ty = args.first().map(|a| a.ty.clone()).unwrap_or_else(|| elem_ty.clone());
                if ty.numeric_kind().is_none() {
                    return Err(ParseError::expression_of_type_expected("numeric", &ty.to_string(), position));
                }
                ("Average", if ty == TypeDesc::Decimal { TypeDesc::Decimal } else { TypeDesc::F64 })
            }
            "select" => {
                if args.len() != 1 {
                    return Err(ParseError::no_applicable_aggregate("Select", &receiver.ty.to_string(), position));
                }
                ("Select", TypeDesc::Array(Box::new(args[0].ty.clone())))
            }
            "orderby" => {
                if args.len() != 1 {
                    return Err(ParseError::no_applicable_aggregate("OrderBy", &receiver.ty.to_string(), position));
                }
                ("OrderBy", receiver.ty.clone())
            }
            "orderbydescending" => {
                if args.len() != 1 {
                    return Err(ParseError::no_applicable_aggregate("OrderByDescending", &receiver.ty.to_string(), position));
                }
                ("OrderByDescending", receiver.ty.clone())
            }
            _ => return Err(ParseError::no_applicable_aggregate(op, &receiver.ty.to_string(), position)),
        };

        Ok(TypedExpr::new(ExprKind::MethodCall { receiver: Some(Box::new(receiver)), method: Name::from(method), args }, result_ty, span))
    }

    fn parse_primary(&mut self) -> Result<Parsed, ParseError> {
        let tok = self.cur().clone();
        match tok.kind {
            TokenKind::IntegerLiteral => {
                self.bump();
                let value = self.registry.parse_integer(&tok.text, false, tok.position)?;
                let ty = value_type_of(&value);
                Ok((TypedExpr::new(ExprKind::Constant(value), ty, tok.span()), Some(tok.text.to_string())))
            }
            TokenKind::RealLiteral => {
                self.bump();
                let value = self.registry.parse_real(&tok.text, false, tok.position)?;
                let ty = value_type_of(&value);
                Ok((TypedExpr::new(ExprKind::Constant(value), ty, tok.span()), Some(tok.text.to_string())))
            }
            TokenKind::StringLiteral => {
                self.bump();
                let is_char = tok.text.starts_with('\'');
                let interior: Vec<char> = tok.text.chars().skip(1).take(tok.text.chars().count().saturating_sub(2)).collect();
                let quote = if is_char { '\'' } else { '"' };
                let unescaped = predexpr_lexer::unescape_doubled(&interior, quote);
                let (value, ty) = if is_char {
                    let ch = unescaped.chars().next().unwrap_or('\0');
                    (Value::Char(ch), TypeDesc::Char)
                } else {
                    (Value::String(Arc::from(unescaped.as_str())), TypeDesc::String)
                };
                Ok((TypedExpr::new(ExprKind::Constant(value), ty, tok.span()), Some(tok.text.to_string())))
            }
            TokenKind::LParen => {
                self.bump();
                let (inner, lit) = self.parse_conditional()?;
                self.expect(TokenKind::RParen, ')')?;
                Ok((inner, lit))
            }
            TokenKind::Identifier => self.parse_identifier_primary(),
            _ => Err(ParseError::unexpected_token(tok.text.as_ref(), tok.position)),
        }
    }

    fn parse_identifier_primary(&mut self) -> Result<Parsed, ParseError> {
        let tok = self.bump();
        let text = tok.text.to_string();

        if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
            let b = text.eq_ignore_ascii_case("true");
            return Ok((TypedExpr::new(ExprKind::Constant(Value::Bool(b)), TypeDesc::Bool, tok.span()), None));
        }
        if text.eq_ignore_ascii_case("null") {
            let ty = TypeDesc::Object(TypeKey::new("Object"));
            return Ok((TypedExpr::new(ExprKind::Constant(Value::Null), ty, tok.span()), None));
        }
        if text.eq_ignore_ascii_case("iif") && self.check(TokenKind::LParen) {
            return self.parse_iif(tok.position).map(|e| (e, None));
        }
        if text.eq_ignore_ascii_case("new") && self.check(TokenKind::LParen) {
            return self.parse_new_anonymous(tok.position).map(|e| (e, None));
        }
        if text.eq_ignore_ascii_case("tuple") && self.check(TokenKind::LParen) {
            return self.parse_tuple(tok.position).map(|e| (e, None));
        }

        if (primitive_type_named(&text).is_some() || self.types.lookup_by_name(&text).is_some())
        && (self.check(TokenKind::LParen) || self.check(TokenKind::Question))
        {
            return self.parse_type_expression(&text, tok.position).map(|e| (e, None));
        }

        if text.eq_ignore_ascii_case("guid") && self.check(TokenKind::Dot) {
            return self.parse_guid_static_call(tok.position).map(|e| (e, None));
        }

        if text == "$" || text == "^" || text == "~" || Scope::is_keyword(&text) {
            return match self.scope.resolve_keyword(&text) {
                Some(expr) => Ok((canonicalize_keyword_parameter(&text, expr), None)),
                None => Err(ParseError::no_implicit_scope_parameter(&text, tok.position)),
            };
        }

        if let Some(local) = self.scope.resolve_local(&text) {
            return Ok((local, None));
        }
        if let Some((ty, value)) = self.scope.resolve_external(&text) {
            return Ok((TypedExpr::new(ExprKind::Constant(value), ty, tok.span()), None));
        }
        if let Some(it) = self.scope.it().cloned() {
            if let Ok(member) = self.lookup_member(it, &text, tok.position) {
                return Ok((member, None));
            }
        }
        Err(ParseError::unknown_identifier(&text, tok.position))
    }

    /// `Guid.Parse("...")`: the one static call the grammar recognizes
    /// directly, built the same way an explicit `Guid(...)` conversion is
    /// (see `parse_type_expression`).
    fn parse_guid_static_call(&mut self, position: u32) -> Result<TypedExpr, ParseError> {
        self.expect(TokenKind::Dot, '.')?;
        let method_tok = self.expect(TokenKind::Identifier, '.')?;
        if !method_tok.text.eq_ignore_ascii_case("parse") {
            return Err(ParseError::no_applicable_method(&method_tok.text, "Guid", method_tok.position));
        }
        let (mut args, _lits) = self.parse_argument_list()?;
        if args.len() != 1 {
            return Err(ParseError::no_matching_constructor("Guid", position));
        }
        let arg = args.remove(0);
        Ok(TypedExpr::new(ExprKind::New { ctor: TypeKey::new("Guid"), args: vec![arg] }, TypeDesc::Guid, Span::point(position)))
    }

    fn parse_iif(&mut self, position: u32) -> Result<TypedExpr, ParseError> {
        self.expect(TokenKind::LParen, '(')?;
        let (test, _) = self.parse_conditional()?;
        if test.ty != TypeDesc::Bool {
            return Err(ParseError::expression_of_type_expected("bool", &test.ty.to_string(), position));
        }
        self.expect(TokenKind::Comma, ',')?;
        let (then_branch, _) = self.parse_conditional()?;
        self.expect(TokenKind::Comma, ',')?;
        let (else_branch, _) = self.parse_conditional()?;
        self.expect(TokenKind::RParen, ')')?;
        self.combine_conditional(test, then_branch, else_branch)
    }

    fn parse_new_anonymous(&mut self, position: u32) -> Result<TypedExpr, ParseError> {
        self.expect(TokenKind::LParen, '(')?;
        let mut fields = Vec::new();
        let mut bindings = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let (value, _) = self.parse_conditional()?;
                self.eat_word("as");
                let name_tok = self.expect(TokenKind::Identifier, '.')?;
                let lowered = name_tok.text.to_ascii_lowercase();
                if seen.contains(&lowered) {
                    return Err(ParseError::duplicate_identifier(&name_tok.text, name_tok.position));
                }
                seen.push(lowered);
                fields.push(DynamicProperty::new(name_tok.text.as_ref(), value.ty.clone()));
                bindings.push(value);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ')')?;
        let signature = Signature::new(fields);
        let interned = self.anon.intern(signature);
        let span = Span::point(position);
        Ok(TypedExpr::new(ExprKind::NewAnonymous { signature: (*interned).clone(), bindings }, TypeDesc::Anonymous((*interned).clone()), span))
    }

    fn parse_tuple(&mut self, position: u32) -> Result<TypedExpr, ParseError> {
        self.expect(TokenKind::LParen, '(')?;
        let mut elements = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let (value, _) = self.parse_conditional()?;
                elements.push(value);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ')')?;
        Ok(nest_tuple_elements(elements, position))
    }

    fn parse_type_expression(&mut self, type_name: &str, position: u32) -> Result<TypedExpr, ParseError> {
        let nullable = self.eat(TokenKind::Question);
        let primitive = primitive_type_named(type_name);
        let key = self.types.lookup_by_name(type_name).map(|i| i.key.clone());

        if !self.check(TokenKind::LParen) {
            return Err(ParseError::unexpected_token(self.cur().text.as_ref(), self.cur().position));
        }
        let (mut args, lits) = self.parse_argument_list()?;
        let lit_refs: Vec<Option<&str>> = lits.iter().map(|l| l.as_deref()).collect();

        let base_ty = if matches!(primitive, Some(TypeDesc::Guid)) {
            // Guid isn't a numeric/char/enum conversion target, so it skips
            // explicit_convert entirely and is built the same way the
            // equality coercion in operators.rs treats it: a synthesized
            // constructor call.
            if args.len() != 1 {
                return Err(ParseError::no_matching_constructor(type_name, position));
            }
            let arg = args.remove(0);
            TypedExpr::new(ExprKind::New { ctor: TypeKey::new("Guid"), args: vec![arg] }, TypeDesc::Guid, Span::point(position))
        } else if let Some(prim) = &primitive {
            if args.len() != 1 {
                return Err(ParseError::no_matching_constructor(type_name, position));
            }
            explicit_convert(args.remove(0), prim, self.registry, self.types)?
        } else if let Some(key) = key {
            if args.len() == 1 && self.types.lookup(&key).is_some_and(|i| i.ctors.is_empty()) {
                let target = TypeDesc::Object(key.clone());
                explicit_convert(args.remove(0), &target, self.registry, self.types)?
            } else {
                let candidates: Vec<Candidate<()>> = self
                .types
                .lookup(&key)
                .map(|info| info.ctors.iter().map(|c| Candidate { params: c.params.clone(), payload: () }).collect())
                .unwrap_or_default();
                match resolve(candidates, &args, &lit_refs, self.registry, self.types) {
                    Resolution::None => return Err(ParseError::no_matching_constructor(type_name, position)),
                    Resolution::Ambiguous(_) => return Err(ParseError::ambiguous_constructor(type_name, position)),
                    Resolution::Unique { promoted_args, .. } => {
                        let span = Span::point(position);
                        TypedExpr::new(ExprKind::New { ctor: key.clone(), args: promoted_args }, TypeDesc::Object(key), span)
                    }
                }
            }
        } else {
            return Err(ParseError::inaccessible_type(type_name, position));
        };

        if nullable {
            let span = base_ty.span;
            let target = base_ty
            .ty
            .clone()
            .nullable_of()
            .ok_or_else(|| ParseError::no_nullable_form(&base_ty.ty.to_string(), position))?;
            return Ok(TypedExpr::new(ExprKind::Convert { checked: false, expr: Box::new(base_ty) }, target, span));
        }
        Ok(base_ty)
    }
}

/// Maps a member name like `Item1` to its zero-based tuple slot.
fn tuple_item_index(name: &str) -> Option<usize> {
    let lower = name.to_ascii_lowercase();
    let digits = lower.strip_prefix("item")?;
    digits.parse::<usize>().ok()?.checked_sub(1)
}

/// Resolves a zero-based `Item` index against a tuple's element types,
/// walking into the 8th slot's nested tuple for indices past the
/// rolling 7-wide window.
fn tuple_item_type(elems: &[TypeDesc], index: usize) -> Option<TypeDesc> {
    if index < 7 {
        return elems.get(index).cloned();
    }
    match elems.get(7) {
        Some(TypeDesc::Tuple(rest)) => tuple_item_type(rest, index - 7),
        _ => None,
    }
}

/// Builds a `tuple(...)` literal's `New` node, nesting elements past the
/// seventh into a rolling 7-wide window of `Tuple`s rather than one flat
/// arbitrary-arity tuple.
fn nest_tuple_elements(mut elements: Vec<TypedExpr>, position: u32) -> TypedExpr {
    if elements.len() > 7 {
        let rest = elements.split_off(7);
        elements.push(nest_tuple_elements(rest, position));
    }
    let ty = TypeDesc::Tuple(elements.iter().map(|e| e.ty.clone()).collect());
    TypedExpr::new(ExprKind::New { ctor: TypeKey::new("Tuple"), args: elements }, ty, Span::point(position))
}

/// `enter_aggregate` always names the shifted `it` literally `"it"`
///, so at two or more levels of nesting the `parent` slot can
/// hold a `Parameter` that is *also* named `"it"`. Forcing the keyword that
/// was actually written onto the resolved node keeps the two occurrences
/// distinguishable by anything that walks the tree by parameter name (the
/// runtime evaluator's `it`/`parent`/`root` scope).
fn canonicalize_keyword_parameter(keyword: &str, expr: TypedExpr) -> TypedExpr {
    let canonical = if keyword == "$" || keyword.eq_ignore_ascii_case("it") {
        "it"
    } else if keyword == "^" || keyword.eq_ignore_ascii_case("parent") {
        "parent"
    } else {
        "root"
    };
    match expr.kind {
        ExprKind::Parameter(_) => TypedExpr::new(ExprKind::Parameter(Name::from(canonical)), expr.ty, expr.span),
        other => TypedExpr::new(other, expr.ty, expr.span),
    }
}

fn value_type_of(value: &Value) -> TypeDesc {
    match value {
        Value::I8(_) => TypeDesc::I8,
        Value::I16(_) => TypeDesc::I16,
        Value::I32(_) => TypeDesc::I32,
        Value::I64(_) => TypeDesc::I64,
        Value::U8(_) => TypeDesc::U8,
        Value::U16(_) => TypeDesc::U16,
        Value::U32(_) => TypeDesc::U32,
        Value::U64(_) => TypeDesc::U64,
        Value::F32(_) => TypeDesc::F32,
        Value::F64(_) => TypeDesc::F64,
        Value::Decimal(_) => TypeDesc::Decimal,
        _ => TypeDesc::Object(TypeKey::new("Object")),
    }
}

fn tokenize(text: &str, registry: &NumberParserRegistry) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let suffixes = registry.suffix_chars();
    Lexer::new(&chars, &suffixes).tokenize()
}

fn run(text: &str, scope: Scope, options: &ParserOptions, types: &TypeRegistry, anon: &AnonymousClassFactory, expected: Option<&TypeDesc>) -> Result<TypedExpr, ParseError> {
    let tokens = tokenize(text, &options.numeric_suffix_handlers)?;
    let mut parser =
    Parser { tokens, pos: 0, registry: &options.numeric_suffix_handlers, types, anon, options, scope };
    let (expr, lit) = parser.parse_top()?;
    if !parser.check(TokenKind::End) {
        return Err(ParseError::unexpected_token(parser.cur().text.as_ref(), parser.cur().position));
    }
    match expected {
        Some(target) => promote(expr, lit.as_deref(), target, true, parser.registry, parser.types),
        None => Ok(expr),
    }
}

/// `parse(result_type?, text, values...)`: no unbound parameters.
pub fn parse_top_level(
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<TypedExpr, ParseError> {
    let locals = positional_locals(values);
    let scope = Scope::without_it(locals, externals);
    run(text, scope, options, types, anon, result_type)
}

/// `parse_expression(parameter, result_type?, text, values...)`: a single
/// named parameter in scope, addressable both by name and as `it`.
pub fn parse_expression(
    param_name: &str,
    param_ty: TypeDesc,
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<TypedExpr, ParseError> {
    let it = TypedExpr::new(ExprKind::Parameter(Name::from(param_name)), param_ty, Span::DUMMY);
    let mut locals = positional_locals(values);
    locals.insert(param_name.to_ascii_lowercase(), it.clone());
    let scope = Scope::with_it(it, locals, externals);
    run(text, scope, options, types, anon, result_type)
}

/// `parse_lambda(element_type, result_type?, text, values...)`: a single
/// unnamed parameter named `""`; its members are implicitly in scope via
/// `it`.
pub fn parse_lambda(
    element_type: TypeDesc,
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<LambdaExpr, ParseError> {
    let it = TypedExpr::new(ExprKind::Parameter(Name::from("")), element_type.clone(), Span::DUMMY);
    let locals = positional_locals(values);
    let scope = Scope::with_it(it, locals, externals);
    let body = run(text, scope, options, types, anon, result_type)?;
    let return_type = body.ty.clone();
    Ok(LambdaExpr { parameters: vec![ParamDef::new("", element_type)], body, return_type })
}

/// `parse_lambda(parameters, result_type?, text, values...)`: multiple
/// named parameters, no implicit `it`.
pub fn parse_lambda_multi(
    parameters: &[(String, TypeDesc)],
    text: &str,
    values: &[Binding],
    externals: Externals,
    result_type: Option<&TypeDesc>,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<LambdaExpr, ParseError> {
    let mut locals = positional_locals(values);
    let mut param_defs = Vec::with_capacity(parameters.len());
    for (name, ty) in parameters {
        let p = TypedExpr::new(ExprKind::Parameter(Name::from(name.as_str())), ty.clone(), Span::DUMMY);
        locals.insert(name.to_ascii_lowercase(), p);
        param_defs.push(ParamDef::new(name.as_str(), ty.clone()));
    }
    let scope = Scope::without_it(locals, externals);
    let body = run(text, scope, options, types, anon, result_type)?;
    let return_type = body.ty.clone();
    Ok(LambdaExpr { parameters: param_defs, body, return_type })
}

/// `parse_ordering(element_type, text, values...)`: repeated
/// `expr [asc|ascending|desc|descending]` separated by `,`. Any non-`end`
/// token after the final selector is rejected.
pub fn parse_ordering(
    element_type: TypeDesc,
    text: &str,
    values: &[Binding],
    externals: Externals,
    options: &ParserOptions,
    types: &TypeRegistry,
    anon: &AnonymousClassFactory,
) -> Result<Vec<predexpr_ir::OrderingDirective>, ParseError> {
    let it = TypedExpr::new(ExprKind::Parameter(Name::from("")), element_type, Span::DUMMY);
    let locals = positional_locals(values);
    let scope = Scope::with_it(it, locals, externals);
    let tokens = tokenize(text, &options.numeric_suffix_handlers)?;
    let mut parser = Parser { tokens, pos: 0, registry: &options.numeric_suffix_handlers, types, anon, options, scope };

    let mut directives = Vec::new();
    loop {
        let (selector, _) = parser.parse_conditional()?;
        let ascending = if parser.eat_word("desc") || parser.eat_word("descending") {
            false
        } else {
            let _ = parser.eat_word("asc") || parser.eat_word("ascending");
            true
        };
        directives.push(predexpr_ir::OrderingDirective { selector, ascending });
        if !parser.eat(TokenKind::Comma) {
            break;
        }
    }
    if !parser.check(TokenKind::End) {
        return Err(ParseError::unexpected_token(parser.cur().text.as_ref(), parser.cur().position));
    }
    Ok(directives)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn opts() -> ParserOptions {
        ParserOptions::default()
    }

    #[test]
    fn arithmetic_widens_correctly() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let expr = parse_top_level("1 + 2 * 3", &[], Externals::default(), None, &opts(), &types, &anon).unwrap();
        assert_eq!(expr.ty, TypeDesc::I32);
    }

    #[test]
    fn conditional_requires_bool_test() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let err = parse_top_level("1 ? 2 : 3", &[], Externals::default(), None, &opts(), &types, &anon).unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::ExpressionOfTypeExpected);
    }

    #[test]
    fn it_keyword_resolves_named_parameter() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let expr = parse_expression("x", TypeDesc::I32, "it + 1", &[], Externals::default(), None, &opts(), &types, &anon).unwrap();
        assert_eq!(expr.ty, TypeDesc::I32);
    }

    #[test]
    fn bare_it_without_scope_reports_no_implicit_scope_parameter() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let err = parse_top_level("it", &[], Externals::default(), None, &opts(), &types, &anon).unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::NoImplicitScopeParameter);
    }

    #[test]
    fn negative_literal_folds_without_overflow() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let expr = parse_top_level("-9223372036854775808L", &[], Externals::default(), None, &opts(), &types, &anon).unwrap();
        assert_eq!(expr.ty, TypeDesc::I64);
        assert!(matches!(expr.kind, ExprKind::Constant(Value::I64(i64::MIN))));
    }

    #[test]
    fn tuple_literal_carries_element_types() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let expr = parse_top_level("tuple(1, \"x\")", &[], Externals::default(), None, &opts(), &types, &anon).unwrap();
        assert_eq!(expr.ty, TypeDesc::Tuple(vec![TypeDesc::I32, TypeDesc::String]));
    }

    #[test]
    fn tuples_past_seven_elements_nest_the_tail() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let expr = parse_top_level("tuple(1, 2, 3, 4, 5, 6, 7, 8, 9)", &[], Externals::default(), None, &opts(), &types, &anon).unwrap();
        let TypeDesc::Tuple(elems) = &expr.ty else {
            panic!("expected a tuple type");
        };
        assert_eq!(elems.len(), 8);
        assert!(elems[..7].iter().all(|e| *e == TypeDesc::I32));
        assert_eq!(elems[7], TypeDesc::Tuple(vec![TypeDesc::I32, TypeDesc::I32]));

        let item9 = parse_top_level(
            "tuple(1, 2, 3, 4, 5, 6, 7, 8, 9).Item9",
            &[],
            Externals::default(),
            None,
            &opts(),
            &types,
            &anon,
        )
        .unwrap();
        assert_eq!(item9.ty, TypeDesc::I32);
    }

    #[test]
    fn anonymous_projection_reuses_cached_signature() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        parse_top_level("new(1 as A)", &[], Externals::default(), None, &opts(), &types, &anon).unwrap();
        parse_top_level("new(2 as A)", &[], Externals::default(), None, &opts(), &types, &anon).unwrap();
        assert_eq!(anon.len(), 1);
    }

    #[test]
    fn positional_lambda_binding_is_invocable() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let body = TypedExpr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(TypedExpr::new(ExprKind::Parameter(Name::from("n")), TypeDesc::I32, Span::DUMMY)),
                right: Box::new(TypedExpr::new(ExprKind::Constant(Value::I32(1)), TypeDesc::I32, Span::DUMMY)),
            },
            TypeDesc::I32,
            Span::DUMMY,
        );
        let lambda = LambdaExpr { parameters: vec![ParamDef::new("n", TypeDesc::I32)], body, return_type: TypeDesc::I32 };
        let ty = TypeDesc::Lambda(vec![TypeDesc::I32], Box::new(TypeDesc::I32));
        let bindings = vec![Binding::new(ty, Value::Lambda(Arc::new(lambda)))];
        let expr = parse_top_level("@0(41)", &bindings, Externals::default(), None, &opts(), &types, &anon).unwrap();
        assert_eq!(expr.ty, TypeDesc::I32);
        assert!(matches!(expr.kind, ExprKind::Invoke { .. }));
    }

    #[test]
    fn invoking_with_the_wrong_argument_count_is_rejected() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let body = TypedExpr::new(ExprKind::Parameter(Name::from("n")), TypeDesc::I32, Span::DUMMY);
        let lambda = LambdaExpr { parameters: vec![ParamDef::new("n", TypeDesc::I32)], body, return_type: TypeDesc::I32 };
        let ty = TypeDesc::Lambda(vec![TypeDesc::I32], Box::new(TypeDesc::I32));
        let bindings = vec![Binding::new(ty, Value::Lambda(Arc::new(lambda)))];
        let err = parse_top_level("@0()", &bindings, Externals::default(), None, &opts(), &types, &anon).unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::NoApplicableMethod);
    }

    #[test]
    fn canonicalize_keyword_parameter_overrides_the_underlying_name() {
        // `parent` resolves to whatever `TypedExpr` occupies that scope slot,
        // which after a second `enter_aggregate` shift is itself named "it".
        let inner = TypedExpr::new(ExprKind::Parameter(Name::from("it")), TypeDesc::I32, Span::DUMMY);
        let renamed = canonicalize_keyword_parameter("parent", inner);
        assert!(matches!(&renamed.kind, ExprKind::Parameter(n) if n.as_str() == "parent"));
        assert_eq!(renamed.ty, TypeDesc::I32);
    }

    #[test]
    fn ordering_parses_descending_then_default_ascending() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let directives = parse_ordering(TypeDesc::I32, "it desc, it", &[], Externals::default(), &opts(), &types, &anon).unwrap();
        assert_eq!(directives.len(), 2);
        assert!(!directives[0].ascending);
        assert!(directives[1].ascending);
    }

    #[test]
    fn ordering_rejects_trailing_garbage() {
        let types = TypeRegistry::new();
        let anon = AnonymousClassFactory::new();
        let err = parse_ordering(TypeDesc::I32, "it desc oops", &[], Externals::default(), &opts(), &types, &anon).unwrap_err();
        assert_eq!(err.code(), predexpr_diagnostic::ErrorCode::UnexpectedToken);
    }
}
