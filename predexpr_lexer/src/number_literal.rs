//! Number-literal parser registry: a priority-ordered chain of handlers,
//! each owning a suffix and a target numeric type. The lexer only needs
//! the union of suffix letters (to know which trailing characters belong
//! to a number token); resolving the literal's text into a typed [`Value`]
//! happens here, queried by the parser once it knows whether an integer
//! or real literal is expected.

use std::sync::Arc;

use predexpr_diagnostic::ParseError;
use predexpr_ir::Value;
use rustc_hash::FxHashSet;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NumberKind {
    Integer,
    Real,
}

/// One entry in the registry's chain of responsibility.
pub trait NumberHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> NumberKind;
    /// Lower values run first. Fallback handlers use the highest priority
    /// so every more specific handler gets a chance first.
    fn priority(&self) -> u8;
    /// Suffix letters (uppercase) this handler recognizes, for the lexer's
    /// maximal-munch suffix set. Empty for fallback handlers.
    fn suffix_letters(&self) -> &'static [char];
    fn can_handle(&self, text: &str) -> bool;
    fn try_parse(&self, text: &str, negated: bool) -> Option<Value>;
}

macro_rules! suffix_handler {
    ($struct_name:ident, $kind:expr, $priority:expr, $letters:expr, $can_handle:expr, $parse:expr) => {
        struct $struct_name;
        impl NumberHandler for $struct_name {
            fn name(&self) -> &'static str {
                stringify!($struct_name)
            }
            fn kind(&self) -> NumberKind {
                $kind
            }
            fn priority(&self) -> u8 {
                $priority
            }
            fn suffix_letters(&self) -> &'static [char] {
                $letters
            }
            fn can_handle(&self, text: &str) -> bool {
                $can_handle(text)
            }
            fn try_parse(&self, text: &str, negated: bool) -> Option<Value> {
                $parse(text, negated)
            }
        }
    };
}

fn ends_with_ignore_case(text: &str, suffix: &str) -> bool {
    text.len() >= suffix.len() && text[text.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> &'a str {
    &text[..text.len() - suffix.len()]
}

/// Parses an unsigned digit run as a signed magnitude, negating without the
/// intermediate `i64` overflow that a plain `-(core.parse::<i64>?)` would
/// hit for `i64::MIN` (whose magnitude does not fit in `i64`).
fn parse_signed_i64(core: &str, negated: bool) -> Option<i64> {
    let magnitude: u64 = core.parse().ok()?;
    if negated {
        if magnitude > i64::MAX as u64 + 1 {
            return None;
        }
        Some(if magnitude == i64::MAX as u64 + 1 { i64::MIN } else { -(magnitude as i64) })
    } else {
        i64::try_from(magnitude).ok()
    }
}

suffix_handler!(
    FloatHandler,
    NumberKind::Real,
    10,
    &['F'],
    |text: &str| ends_with_ignore_case(text, "F"),
    |text: &str, negated: bool| {
        let core = strip_suffix_ignore_case(text, "F");
        let mut v: f32 = core.parse().ok()?;
        if negated {
            v = -v;
        }
        Some(Value::F32(v))
    }
);

suffix_handler!(
    DecimalHandler,
    NumberKind::Real,
    11,
    &['M'],
    |text: &str| ends_with_ignore_case(text, "M"),
    |text: &str, negated: bool| {
        let core = strip_suffix_ignore_case(text, "M");
        let mut v: rust_decimal::Decimal = core.parse().ok()?;
        if negated {
            v = -v;
        }
        Some(Value::Decimal(v))
    }
);

suffix_handler!(
    DoubleHandler,
    NumberKind::Real,
    12,
    &['D'],
    |text: &str| ends_with_ignore_case(text, "D"),
    |text: &str, negated: bool| {
        let core = strip_suffix_ignore_case(text, "D");
        let mut v: f64 = core.parse().ok()?;
        if negated {
            v = -v;
        }
        Some(Value::F64(v))
    }
);

suffix_handler!(
    FallbackRealHandler,
    NumberKind::Real,
    255,
    &[],
    |_text: &str| true,
    |text: &str, negated: bool| {
        let mut v: f64 = text.parse().ok()?;
        if negated {
            v = -v;
        }
        Some(Value::F64(v))
    }
);

const UNSIGNED_TWO_CHAR: [(&str, fn(u64) -> Value); 4] = [
    ("UB", |v| Value::U8(v as u8)),
    ("US", |v| Value::U16(v as u16)),
    ("UI", |v| Value::U32(v as u32)),
    ("UL", |v| Value::U64(v)),
];

suffix_handler!(
    UnsignedHandler,
    NumberKind::Integer,
    10,
    &['U', 'B'],
    |text: &str| {
        UNSIGNED_TWO_CHAR.iter().any(|(suf, _)| ends_with_ignore_case(text, suf))
        || ends_with_ignore_case(text, "B")
    },
    |text: &str, negated: bool| {
        if negated {
            // unsigned targets can never hold a negative literal
            return None;
        }
        for (suf, make) in UNSIGNED_TWO_CHAR {
            if ends_with_ignore_case(text, suf) {
                let core = strip_suffix_ignore_case(text, suf);
                let v: u64 = core.parse().ok()?;
                return Some(make(v));
            }
        }
        if ends_with_ignore_case(text, "B") {
            let core = strip_suffix_ignore_case(text, "B");
            let v: u8 = core.parse().ok()?;
            return Some(Value::U8(v));
        }
        None
    }
);

const SIGNED_TWO_CHAR: [(&str, fn(i64) -> Value); 1] = [("SB", |v| Value::I8(v as i8))];
const SIGNED_ONE_CHAR: [(&str, fn(i64) -> Value); 3] = [
    ("S", |v| Value::I16(v as i16)),
    ("I", |v| Value::I32(v as i32)),
    ("L", |v| Value::I64(v)),
];

suffix_handler!(
    SignedHandler,
    NumberKind::Integer,
    11,
    &['S', 'I', 'L'],
    |text: &str| {
        SIGNED_TWO_CHAR.iter().any(|(suf, _)| ends_with_ignore_case(text, suf))
        || SIGNED_ONE_CHAR.iter().any(|(suf, _)| ends_with_ignore_case(text, suf))
    },
    |text: &str, negated: bool| {
        for (suf, make) in SIGNED_TWO_CHAR {
            if ends_with_ignore_case(text, suf) {
                let core = strip_suffix_ignore_case(text, suf);
                let v = parse_signed_i64(core, negated)?;
                return Some(make(v));
            }
        }
        for (suf, make) in SIGNED_ONE_CHAR {
            if ends_with_ignore_case(text, suf) {
                let core = strip_suffix_ignore_case(text, suf);
                let v = parse_signed_i64(core, negated)?;
                return Some(make(v));
            }
        }
        None
    }
);

suffix_handler!(
    FallbackIntegerHandler,
    NumberKind::Integer,
    255,
    &[],
    |_text: &str| true,
    |text: &str, negated: bool| {
        // `text` is an unsigned digit run (the lexer never emits a sign into
        // the literal); unary minus is folded in by the parser and passed
        // here as `negated` so e.g. `-2147483648` still fits `int`.
        if negated {
            let v = parse_signed_i64(text, true)?;
            return Some(match i32::try_from(v) {
                    Ok(v32) => Value::I32(v32),
                    Err(_) => Value::I64(v),
            });
        }
        let magnitude: u64 = text.parse().ok()?;
        if let Ok(v32) = i32::try_from(magnitude) {
            Some(Value::I32(v32))
        } else if let Ok(v32u) = u32::try_from(magnitude) {
            Some(Value::U32(v32u))
        } else if let Ok(v64) = i64::try_from(magnitude) {
            Some(Value::I64(v64))
        } else {
            Some(Value::U64(magnitude))
        }
    }
);

/// Priority-ordered set of number handlers, extensible per `ParserOptions`.
#[derive(Clone)]
pub struct NumberParserRegistry {
    handlers: Vec<Arc<dyn NumberHandler>>,
}

impl Default for NumberParserRegistry {
    fn default() -> Self {
        let mut handlers: Vec<Arc<dyn NumberHandler>> = vec![
            Arc::new(FloatHandler),
            Arc::new(DecimalHandler),
            Arc::new(DoubleHandler),
            Arc::new(FallbackRealHandler),
            Arc::new(UnsignedHandler),
            Arc::new(SignedHandler),
            Arc::new(FallbackIntegerHandler),
        ];
        handlers.sort_by_key(|h| h.priority());
        NumberParserRegistry { handlers }
    }
}

impl NumberParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an additional handler, re-sorting the chain by priority.
    /// Used by hosts extending `ParserOptions` with custom numeric suffixes.
    pub fn with_handler(mut self, handler: Arc<dyn NumberHandler>) -> Self {
        self.handlers.push(handler);
        self.handlers.sort_by_key(|h| h.priority());
        self
    }

    /// Union of every handler's recognized suffix letters, consulted by the
    /// lexer to know which trailing characters belong to a number token.
    pub fn suffix_chars(&self) -> FxHashSet<char> {
        self.handlers.iter().flat_map(|h| h.suffix_letters().iter().copied()).collect()
    }

    pub fn parse_integer(&self, text: &str, negated: bool, position: u32) -> Result<Value, ParseError> {
        self.parse_with_kind(text, NumberKind::Integer, negated)
        .ok_or_else(|| ParseError::invalid_integer_literal(text, position))
    }

    pub fn parse_real(&self, text: &str, negated: bool, position: u32) -> Result<Value, ParseError> {
        self.parse_with_kind(text, NumberKind::Real, negated)
        .ok_or_else(|| ParseError::invalid_real_literal(text, position))
    }

    fn parse_with_kind(&self, text: &str, kind: NumberKind, negated: bool) -> Option<Value> {
        self.handlers
        .iter()
        .filter(|h| h.kind() == kind)
        .find(|h| h.can_handle(text))
        .and_then(|h| h.try_parse(text, negated))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn integer_without_suffix_picks_narrowest_signed() {
        let reg = NumberParserRegistry::new();
        assert_eq!(reg.parse_integer("42", false, 0).unwrap(), Value::I32(42));
    }

    #[test]
    fn integer_overflowing_i32_widens_to_u32_then_i64() {
        let reg = NumberParserRegistry::new();
        assert_eq!(reg.parse_integer("3000000000", false, 0).unwrap(), Value::U32(3_000_000_000));
        assert_eq!(reg.parse_integer("10000000000", false, 0).unwrap(), Value::I64(10_000_000_000));
    }

    #[test]
    fn negated_fallback_never_yields_unsigned() {
        let reg = NumberParserRegistry::new();
        assert_eq!(reg.parse_integer("2147483648", true, 0).unwrap(), Value::I32(i32::MIN));
    }

    #[test]
    fn suffix_handlers_strip_and_widen() {
        let reg = NumberParserRegistry::new();
        assert_eq!(reg.parse_integer("5L", false, 0).unwrap(), Value::I64(5));
        assert_eq!(reg.parse_integer("5UL", false, 0).unwrap(), Value::U64(5));
        assert_eq!(reg.parse_real("1.5F", false, 0).unwrap(), Value::F32(1.5));
        assert_eq!(reg.parse_real("1.5D", false, 0).unwrap(), Value::F64(1.5));
    }

    #[test]
    fn unsigned_suffix_rejects_negation() {
        let reg = NumberParserRegistry::new();
        assert!(reg.parse_integer("5UL", true, 0).is_err());
    }

    #[test]
    fn suffix_chars_is_the_union_of_all_handlers() {
        let reg = NumberParserRegistry::new();
        let chars = reg.suffix_chars();
        for c in ['F', 'M', 'D', 'U', 'B', 'S', 'I', 'L'] {
            assert!(chars.contains(&c), "missing suffix char {c}");
        }
    }

    proptest::proptest! {
        #[test]
        fn positive_i32_literals_round_trip_without_suffix(v in 0i32..i32::MAX) {
            let reg = NumberParserRegistry::new();
            let parsed = reg.parse_integer(&v.to_string(), false, 0).unwrap();
            prop_assert_eq!(parsed, Value::I32(v));
        }

        #[test]
        fn long_suffixed_literals_round_trip(v in any::<i64>()) {
            let reg = NumberParserRegistry::new();
            let (negated, magnitude) = if v < 0 { (true, v.unsigned_abs()) } else { (false, v as u64) };
            let text = format!("{magnitude}L");
            let parsed = reg.parse_integer(&text, negated, 0).unwrap();
            prop_assert_eq!(parsed, Value::I64(v));
        }
    }
}
