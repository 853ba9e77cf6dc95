/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of the Ark Sovereign Compiler.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

use crate::callback::GuestCallback;
use crate::dispatch::Throw;
use crate::env::GuestEnv;
use num_bigint::{BigInt, Sign};
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type Properties = BTreeMap<String, HostValue>;
pub type ArrayRef = Rc<RefCell<Vec<HostValue>>>;
pub type ObjectRef = Rc<RefCell<Object>>;
pub type FunctionRef = Rc<Function>;
pub type ErrorRef = Rc<RefCell<ErrorValue>>;

/// Host function body: `(env, this, args)`.
pub type NativeFn = dyn Fn(&mut dyn GuestEnv, &HostValue, &[HostValue]) -> Result<HostValue, Throw>;
/// Host constructor body: `(env, args)`.
pub type NativeCtor = dyn Fn(&mut dyn GuestEnv, &[HostValue]) -> Result<HostValue, Throw>;

/// A value living on the host side of the bridge.
///
/// Arrays, objects, functions and errors are shared and compared by identity.
/// Everything else is compared by value.
#[derive(Clone)]
pub enum HostValue {
    Null,
    Undefined,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(BigInt),
    Uint64(BigInt),
    Double(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
    Error(ErrorRef),
}

#[derive(Default)]
pub struct Object {
    pub properties: Properties,
    /// Set when the object was produced by `construct`.
    pub constructor: Option<FunctionRef>,
}

pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub code: Option<HostValue>,
    pub cause: Option<HostValue>,
    pub constructor: Option<FunctionRef>,
    pub properties: Properties,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorValue {
            name: name.into(),
            message: message.into(),
            code: None,
            cause: None,
            constructor: None,
            properties: Properties::new(),
        }
    }
}

/// Constructors the host recognises for `instanceof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Object,
    Array,
    Error,
    TypeError,
    RangeError,
}

pub enum FunctionKind {
    Native {
        call: Rc<NativeFn>,
        construct: Option<Rc<NativeCtor>>,
    },
    /// Proxy for a function living in the guest's function table.
    Guest(GuestCallback),
}

pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
    pub intrinsic: Option<Intrinsic>,
    pub properties: RefCell<Properties>,
}

impl Function {
    pub fn is_constructor(&self) -> bool {
        matches!(
            self.kind,
            FunctionKind::Native {
                construct: Some(_),
                ..
            }
        )
    }

    pub fn as_callback(&self) -> Option<&GuestCallback> {
        match &self.kind {
            FunctionKind::Guest(callback) => Some(callback),
            FunctionKind::Native { .. } => None,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FunctionKind::Native { construct, .. } => f
                .debug_struct("Function")
                .field("name", &self.name)
                .field("constructor", &construct.is_some())
                .finish(),
            FunctionKind::Guest(callback) => f
                .debug_struct("Function")
                .field("name", &self.name)
                .field("callback", callback)
                .finish(),
        }
    }
}

/// Reverse-index key: primitives by value, shared values by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey {
    Null,
    Undefined,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(BigInt),
    Uint64(BigInt),
    Double(u64),
    String(Rc<str>),
    Ref(usize),
}

impl HostValue {
    pub fn string(text: impl AsRef<str>) -> HostValue {
        HostValue::String(Rc::from(text.as_ref()))
    }

    pub fn array(elements: Vec<HostValue>) -> HostValue {
        HostValue::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn object() -> HostValue {
        HostValue::Object(Rc::new(RefCell::new(Object::default())))
    }

    pub fn object_from(properties: Properties) -> HostValue {
        HostValue::Object(Rc::new(RefCell::new(Object {
            properties,
            constructor: None,
        })))
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> HostValue {
        HostValue::Error(Rc::new(RefCell::new(ErrorValue::new(name, message))))
    }

    pub fn native_function<F>(name: impl Into<String>, call: F) -> HostValue
    where
        F: Fn(&mut dyn GuestEnv, &HostValue, &[HostValue]) -> Result<HostValue, Throw> + 'static,
    {
        HostValue::Function(Rc::new(Function {
            name: name.into(),
            kind: FunctionKind::Native {
                call: Rc::new(call),
                construct: None,
            },
            intrinsic: None,
            properties: RefCell::new(Properties::new()),
        }))
    }

    pub fn native_constructor<F, C>(
        name: impl Into<String>,
        intrinsic: Option<Intrinsic>,
        call: F,
        construct: C,
    ) -> HostValue
    where
        F: Fn(&mut dyn GuestEnv, &HostValue, &[HostValue]) -> Result<HostValue, Throw> + 'static,
        C: Fn(&mut dyn GuestEnv, &[HostValue]) -> Result<HostValue, Throw> + 'static,
    {
        HostValue::Function(Rc::new(Function {
            name: name.into(),
            kind: FunctionKind::Native {
                call: Rc::new(call),
                construct: Some(Rc::new(construct)),
            },
            intrinsic,
            properties: RefCell::new(Properties::new()),
        }))
    }

    pub(crate) fn key(&self) -> ValueKey {
        match self {
            HostValue::Null => ValueKey::Null,
            HostValue::Undefined => ValueKey::Undefined,
            HostValue::Bool(b) => ValueKey::Bool(*b),
            HostValue::Int32(v) => ValueKey::Int32(*v),
            HostValue::Uint32(v) => ValueKey::Uint32(*v),
            HostValue::Int64(v) => ValueKey::Int64(v.clone()),
            HostValue::Uint64(v) => ValueKey::Uint64(v.clone()),
            // NaN and -0 fold onto one key each, like a same-value-zero map.
            HostValue::Double(v) if v.is_nan() => ValueKey::Double(f64::NAN.to_bits()),
            HostValue::Double(v) if *v == 0.0 => ValueKey::Double(0),
            HostValue::Double(v) => ValueKey::Double(v.to_bits()),
            HostValue::String(s) => ValueKey::String(s.clone()),
            _ => ValueKey::Ref(self.identity().unwrap_or_default()),
        }
    }

    /// Address of the shared allocation backing a reference value.
    pub fn identity(&self) -> Option<usize> {
        match self {
            HostValue::Array(a) => Some(Rc::as_ptr(a) as *const () as usize),
            HostValue::Object(o) => Some(Rc::as_ptr(o) as *const () as usize),
            HostValue::Function(f) => Some(Rc::as_ptr(f) as *const () as usize),
            HostValue::Error(e) => Some(Rc::as_ptr(e) as *const () as usize),
            _ => None,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Bool(_) => "boolean",
            HostValue::Int32(_) | HostValue::Uint32(_) | HostValue::Double(_) => "number",
            HostValue::Int64(_) | HostValue::Uint64(_) => "bigint",
            HostValue::String(_) => "string",
            HostValue::Function(_) => "function",
            HostValue::Null | HostValue::Array(_) | HostValue::Object(_) | HostValue::Error(_) => {
                "object"
            }
        }
    }

    /// Variant name, used by diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Undefined => "undefined",
            HostValue::Bool(_) => "bool",
            HostValue::Int32(_) => "int32",
            HostValue::Uint32(_) => "uint32",
            HostValue::Int64(_) => "int64",
            HostValue::Uint64(_) => "uint64",
            HostValue::Double(_) => "double",
            HostValue::String(_) => "string",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
            HostValue::Function(_) => "function",
            HostValue::Error(_) => "error",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            HostValue::Int32(_) | HostValue::Uint32(_) | HostValue::Double(_)
        )
    }

    pub fn is_bigint(&self) -> bool {
        matches!(self, HostValue::Int64(_) | HostValue::Uint64(_))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Null | HostValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Null | HostValue::Undefined => false,
            HostValue::Bool(b) => *b,
            HostValue::Int32(v) => *v != 0,
            HostValue::Uint32(v) => *v != 0,
            HostValue::Int64(v) | HostValue::Uint64(v) => !v.is_zero(),
            HostValue::Double(v) => !(v.is_nan() || *v == 0.0),
            HostValue::String(s) => !s.is_empty(),
            HostValue::Array(_)
            | HostValue::Object(_)
            | HostValue::Function(_)
            | HostValue::Error(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            HostValue::Null => 0.0,
            HostValue::Undefined => f64::NAN,
            HostValue::Bool(b) => f64::from(u8::from(*b)),
            HostValue::Int32(v) => f64::from(*v),
            HostValue::Uint32(v) => f64::from(*v),
            HostValue::Int64(v) | HostValue::Uint64(v) => v.to_f64().unwrap_or(f64::NAN),
            HostValue::Double(v) => *v,
            HostValue::String(s) => parse_number(s),
            HostValue::Array(_) => parse_number(&self.to_display_string()),
            HostValue::Object(_) | HostValue::Function(_) | HostValue::Error(_) => f64::NAN,
        }
    }

    /// Exact integer value, when the value has one.
    pub fn to_bigint(&self) -> Option<BigInt> {
        match self {
            HostValue::Null => Some(BigInt::zero()),
            HostValue::Bool(b) => Some(BigInt::from(u8::from(*b))),
            HostValue::Int32(v) => Some(BigInt::from(*v)),
            HostValue::Uint32(v) => Some(BigInt::from(*v)),
            HostValue::Int64(v) | HostValue::Uint64(v) => Some(v.clone()),
            HostValue::Double(v) if v.is_finite() => BigInt::from_f64(v.trunc()),
            HostValue::String(s) => s.trim().parse::<BigInt>().ok(),
            _ => None,
        }
    }

    /// Low 32 bits, two's complement.
    pub fn to_int32(&self) -> i32 {
        match self {
            HostValue::Int32(v) => *v,
            HostValue::Uint32(v) => *v as i32,
            HostValue::Int64(v) | HostValue::Uint64(v) => low_u32(v) as i32,
            other => f64_to_uint32(other.to_number()) as i32,
        }
    }

    pub fn to_uint32(&self) -> u32 {
        self.to_int32() as u32
    }

    /// Low 64 bits, two's complement.
    pub fn to_int64(&self) -> i64 {
        self.to_bigint().map(|v| low_u64(&v) as i64).unwrap_or(0)
    }

    /// Unsigned 64-bit view. Values that were not created unsigned clamp at zero.
    pub fn to_uint64(&self) -> u64 {
        match self {
            HostValue::Uint64(v) => low_u64(v),
            other => match other.to_bigint() {
                Some(v) if v.sign() == Sign::Minus => 0,
                Some(v) => low_u64(&v),
                None => 0,
            },
        }
    }

    pub fn to_display_string(&self) -> String {
        self.display_with(&mut Vec::new())
    }

    /// `stack` holds the arrays being joined; one met again renders as "".
    fn display_with(&self, stack: &mut Vec<usize>) -> String {
        match self {
            HostValue::Null => "null".to_string(),
            HostValue::Undefined => "undefined".to_string(),
            HostValue::Bool(b) => b.to_string(),
            HostValue::Int32(v) => v.to_string(),
            HostValue::Uint32(v) => v.to_string(),
            HostValue::Int64(v) | HostValue::Uint64(v) => v.to_string(),
            HostValue::Double(v) => format_number(*v),
            HostValue::String(s) => s.to_string(),
            HostValue::Array(elements) => {
                let id = Rc::as_ptr(elements) as *const () as usize;
                if stack.contains(&id) {
                    return String::new();
                }
                stack.push(id);
                let joined = elements
                    .borrow()
                    .iter()
                    .map(|e| {
                        if e.is_nullish() {
                            String::new()
                        } else {
                            e.display_with(stack)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                stack.pop();
                joined
            }
            HostValue::Object(_) => "[object Object]".to_string(),
            HostValue::Function(f) => format!("function {}() {{ [native code] }}", f.name),
            HostValue::Error(e) => {
                let e = e.borrow();
                if e.message.is_empty() {
                    e.name.clone()
                } else {
                    format!("{}: {}", e.name, e.message)
                }
            }
        }
    }

    pub fn strict_equals(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) | (HostValue::Undefined, HostValue::Undefined) => {
                true
            }
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            _ if self.is_number() && other.is_number() => self.to_number() == other.to_number(),
            _ if self.is_bigint() && other.is_bigint() => self.to_bigint() == other.to_bigint(),
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Abstract equality: nullish values are equal to each other, numbers,
    /// bigints and strings compare numerically, booleans coerce to numbers and
    /// reference values coerce to their string form against primitives.
    pub fn loose_equals(&self, other: &HostValue) -> bool {
        if self.type_of() == other.type_of() {
            return self.strict_equals(other);
        }
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (HostValue::Bool(b), rest) | (rest, HostValue::Bool(b)) => {
                HostValue::Int32(i32::from(*b)).loose_equals(rest)
            }
            (HostValue::String(s), n) | (n, HostValue::String(s)) if n.is_number() => {
                parse_number(s) == n.to_number()
            }
            (HostValue::String(s), big) | (big, HostValue::String(s)) if big.is_bigint() => {
                s.trim().parse::<BigInt>().ok() == big.to_bigint()
            }
            (big, n) | (n, big) if big.is_bigint() && n.is_number() => {
                let v = n.to_number();
                v.is_finite() && v.trunc() == v && BigInt::from_f64(v) == big.to_bigint()
            }
            (a, b) if a.identity().is_some() && b.identity().is_none() => {
                HostValue::string(a.to_display_string()).loose_equals(b)
            }
            (a, b) if b.identity().is_some() && a.identity().is_none() => {
                a.loose_equals(&HostValue::string(b.to_display_string()))
            }
            _ => false,
        }
    }

    pub fn utf16_len(&self) -> usize {
        match self {
            HostValue::String(s) => s.encode_utf16().count(),
            other => other.to_display_string().encode_utf16().count(),
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::String(s) => write!(f, "String({:?})", s),
            HostValue::Array(_) => write!(f, "Array([{}])", self.to_display_string()),
            HostValue::Object(o) => {
                f.debug_set().entries(o.borrow().properties.keys()).finish()
            }
            HostValue::Function(func) => fmt::Debug::fmt(&**func, f),
            HostValue::Error(e) => {
                let e = e.borrow();
                write!(f, "Error({}: {})", e.name, e.message)
            }
            other => write!(f, "{}({})", other.kind_name(), other.to_display_string()),
        }
    }
}

fn low_u32(v: &BigInt) -> u32 {
    (v & &BigInt::from(u32::MAX)).to_u32().unwrap_or(0)
}

fn low_u64(v: &BigInt) -> u64 {
    (v & &BigInt::from(u64::MAX)).to_u64().unwrap_or(0)
}

fn f64_to_uint32(v: f64) -> u32 {
    if !v.is_finite() {
        return 0;
    }
    v.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Number parsing for string coercion: surrounding whitespace is ignored,
/// the empty string is zero, and radix prefixes are honoured.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match trimmed.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&trimmed[2..], radix)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    let numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !numeric {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let magnitude = v.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{:e}", v);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    format!("{}", v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_of() {
        assert_eq!(HostValue::Null.type_of(), "object");
        assert_eq!(HostValue::Int32(1).type_of(), "number");
        assert_eq!(HostValue::Int64(BigInt::from(1)).type_of(), "bigint");
        assert_eq!(HostValue::string("x").type_of(), "string");
        assert_eq!(HostValue::array(vec![]).type_of(), "object");
    }

    #[test]
    fn test_self_containing_array_stringifies() {
        let arr = HostValue::array(vec![HostValue::Int32(1)]);
        if let HostValue::Array(elements) = &arr {
            elements.borrow_mut().push(arr.clone());
        }
        assert_eq!(arr.to_display_string(), "1,");
        assert_eq!(format!("{:?}", arr), "Array([1,])");
        assert!(arr.loose_equals(&HostValue::string("1,")));
        assert!(!arr.loose_equals(&HostValue::Int32(1)));
        assert!(arr.to_number().is_nan());

        let outer = HostValue::array(vec![arr.clone(), arr.clone()]);
        assert_eq!(outer.to_display_string(), "1,,1,");
    }

    #[test]
    fn test_low_bits_of_bigint() {
        let v = HostValue::Int64(BigInt::from(-1));
        assert_eq!(v.to_int32(), -1);
        assert_eq!(v.to_uint32(), u32::MAX);
        let big = HostValue::Int64(BigInt::from(0x1_0000_0005_i64));
        assert_eq!(big.to_int32(), 5);
    }

    #[test]
    fn test_double_to_int32_wraps() {
        assert_eq!(HostValue::Double(4_294_967_297.0).to_int32(), 1);
        assert_eq!(HostValue::Double(-1.5).to_int32(), -1);
        assert_eq!(HostValue::Double(f64::NAN).to_int32(), 0);
    }

    #[test]
    fn test_uint64_clamps_signed_sources() {
        assert_eq!(HostValue::Int32(-4).to_uint64(), 0);
        assert_eq!(HostValue::Int64(BigInt::from(-4)).to_uint64(), 0);
        assert_eq!(HostValue::Int32(9).to_uint64(), 9);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("  42 "), 42.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("0x10"), 16.0);
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("abc").is_nan());
    }

    #[test]
    fn test_strict_equality_across_widths() {
        let int = HostValue::Int32(5);
        let double = HostValue::Double(5.0);
        let big = HostValue::Int64(BigInt::from(5));
        let ubig = HostValue::Uint64(BigInt::from(5));
        assert!(int.strict_equals(&double));
        assert!(big.strict_equals(&ubig));
        assert!(!int.strict_equals(&big));
        assert!(int.loose_equals(&big));
    }

    #[test]
    fn test_loose_equality() {
        assert!(HostValue::Null.loose_equals(&HostValue::Undefined));
        assert!(!HostValue::Null.loose_equals(&HostValue::Int32(0)));
        assert!(HostValue::string("5").loose_equals(&HostValue::Int32(5)));
        assert!(HostValue::Bool(true).loose_equals(&HostValue::Int32(1)));
        assert!(HostValue::array(vec![HostValue::Int32(3)]).loose_equals(&HostValue::string("3")));
        assert!(!HostValue::object().loose_equals(&HostValue::object()));
    }

    #[test]
    fn test_truthiness() {
        assert!(!HostValue::string("").is_truthy());
        assert!(!HostValue::Double(f64::NAN).is_truthy());
        assert!(!HostValue::Uint64(BigInt::zero()).is_truthy());
        assert!(HostValue::object().is_truthy());
    }

    #[test]
    fn test_display_of_array_and_error() {
        let arr = HostValue::array(vec![
            HostValue::Int32(1),
            HostValue::Null,
            HostValue::string("x"),
        ]);
        assert_eq!(arr.to_display_string(), "1,,x");
        let err = HostValue::error("TypeError", "bad");
        assert_eq!(err.to_display_string(), "TypeError: bad");
    }

    #[test]
    fn test_keys_fold_zero_and_nan() {
        assert_eq!(HostValue::Double(-0.0).key(), HostValue::Double(0.0).key());
        assert_eq!(
            HostValue::Double(f64::NAN).key(),
            HostValue::Double(-f64::NAN).key()
        );
        assert_ne!(HostValue::Int32(1).key(), HostValue::Uint32(1).key());
    }
}
