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

//! Dynamic dispatch over host values: property access, calls, construction,
//! ordering and `instanceof`.

use crate::env::GuestEnv;
use crate::value::{ErrorValue, FunctionKind, FunctionRef, HostValue, Intrinsic};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// A host value raised by a failing host operation.
#[derive(Debug, Clone)]
pub struct Throw(pub HostValue);

impl Throw {
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Throw(HostValue::error(name, message))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error("TypeError", message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::error("RangeError", message)
    }

    pub fn value(&self) -> &HostValue {
        &self.0
    }
}

/// Arrays are stored densely; growth past this many elements is a
/// RangeError rather than an allocation the host cannot survive.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Validates a requested array length.
pub fn array_length(len: f64) -> Result<usize, Throw> {
    if len.trunc() != len || !(0.0..=MAX_ARRAY_LENGTH as f64).contains(&len) {
        return Err(Throw::range_error("Invalid array length"));
    }
    Ok(len as usize)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKey {
    Index(u32),
    Name(String),
}

impl PropertyKey {
    pub fn from_value(key: &HostValue) -> Self {
        match key {
            HostValue::Int32(v) if *v >= 0 => PropertyKey::Index(*v as u32),
            HostValue::Uint32(v) if *v < u32::MAX => PropertyKey::Index(*v),
            HostValue::Double(v) if v.trunc() == *v && *v >= 0.0 && *v < f64::from(u32::MAX) => {
                PropertyKey::Index(*v as u32)
            }
            HostValue::String(s) => Self::from_name(s),
            other => Self::from_name(&other.to_display_string()),
        }
    }

    /// Canonical array indices become `Index`, everything else a name.
    pub fn from_name(name: &str) -> Self {
        let canonical = !name.is_empty()
            && name.bytes().all(|b| b.is_ascii_digit())
            && (name == "0" || !name.starts_with('0'));
        match name.parse::<u32>() {
            Ok(index) if canonical && index < u32::MAX => PropertyKey::Index(index),
            _ => PropertyKey::Name(name.to_string()),
        }
    }

    fn as_name(&self) -> Option<&str> {
        match self {
            PropertyKey::Name(name) => Some(name),
            PropertyKey::Index(_) => None,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Name(name) => f.write_str(name),
        }
    }
}

pub fn get_property(target: &HostValue, key: &PropertyKey) -> Result<HostValue, Throw> {
    let name = key.as_name();
    let value = match target {
        HostValue::Null | HostValue::Undefined => {
            return Err(Throw::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                target.to_display_string(),
                key
            )))
        }
        HostValue::String(s) => match key {
            PropertyKey::Name(name) if name == "length" => {
                HostValue::Uint32(s.encode_utf16().count() as u32)
            }
            PropertyKey::Index(i) => s
                .encode_utf16()
                .nth(*i as usize)
                .map(|unit| HostValue::string(String::from_utf16_lossy(&[unit])))
                .unwrap_or(HostValue::Undefined),
            PropertyKey::Name(_) => HostValue::Undefined,
        },
        HostValue::Array(elements) => match key {
            PropertyKey::Index(i) => elements
                .borrow()
                .get(*i as usize)
                .cloned()
                .unwrap_or(HostValue::Undefined),
            PropertyKey::Name(name) if name == "length" => {
                HostValue::Uint32(elements.borrow().len() as u32)
            }
            PropertyKey::Name(_) => HostValue::Undefined,
        },
        HostValue::Object(object) => {
            let object = object.borrow();
            match (name, &object.constructor) {
                (Some("constructor"), Some(ctor)) => HostValue::Function(ctor.clone()),
                _ => object
                    .properties
                    .get(&key.to_string())
                    .cloned()
                    .unwrap_or(HostValue::Undefined),
            }
        }
        HostValue::Function(function) => match name {
            Some("name") => HostValue::string(&function.name),
            _ => function
                .properties
                .borrow()
                .get(&key.to_string())
                .cloned()
                .unwrap_or(HostValue::Undefined),
        },
        HostValue::Error(error) => {
            let error = error.borrow();
            match name {
                Some("name") => HostValue::string(&error.name),
                Some("message") => HostValue::string(&error.message),
                Some("code") => error.code.clone().unwrap_or(HostValue::Undefined),
                Some("cause") => error.cause.clone().unwrap_or(HostValue::Undefined),
                _ => error
                    .properties
                    .get(&key.to_string())
                    .cloned()
                    .unwrap_or(HostValue::Undefined),
            }
        }
        HostValue::Bool(_)
        | HostValue::Int32(_)
        | HostValue::Uint32(_)
        | HostValue::Int64(_)
        | HostValue::Uint64(_)
        | HostValue::Double(_) => HostValue::Undefined,
    };
    Ok(value)
}

/// Assignments to primitives and to non-index names on arrays are ignored.
pub fn set_property(target: &HostValue, key: &PropertyKey, value: HostValue) -> Result<(), Throw> {
    match target {
        HostValue::Null | HostValue::Undefined => Err(Throw::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            target.to_display_string(),
            key
        ))),
        HostValue::Array(elements) => {
            let mut elements = elements.borrow_mut();
            match key {
                PropertyKey::Index(i) => {
                    let i = *i as usize;
                    if i >= MAX_ARRAY_LENGTH {
                        return Err(Throw::range_error("Invalid array length"));
                    }
                    if i >= elements.len() {
                        elements.resize(i + 1, HostValue::Undefined);
                    }
                    elements[i] = value;
                }
                PropertyKey::Name(name) if name == "length" => {
                    let len = array_length(value.to_number())?;
                    elements.resize(len, HostValue::Undefined);
                }
                PropertyKey::Name(_) => {}
            }
            Ok(())
        }
        HostValue::Object(object) => {
            object.borrow_mut().properties.insert(key.to_string(), value);
            Ok(())
        }
        HostValue::Function(function) => {
            function
                .properties
                .borrow_mut()
                .insert(key.to_string(), value);
            Ok(())
        }
        HostValue::Error(error) => {
            let mut error = error.borrow_mut();
            match key.as_name() {
                Some("name") => error.name = value.to_display_string(),
                Some("message") => error.message = value.to_display_string(),
                Some("code") => error.code = Some(value),
                Some("cause") => error.cause = Some(value),
                _ => {
                    error.properties.insert(key.to_string(), value);
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// The `in` operator: fails on primitives.
pub fn has_property(target: &HostValue, key: &PropertyKey) -> Result<bool, Throw> {
    if target.identity().is_none() {
        return Err(Throw::type_error(format!(
            "Cannot use 'in' operator to search for '{}' in {}",
            key,
            target.to_display_string()
        )));
    }
    Ok(has_own_property(target, key))
}

pub fn has_own_property(target: &HostValue, key: &PropertyKey) -> bool {
    let name = key.as_name();
    match target {
        HostValue::String(s) => match key {
            PropertyKey::Index(i) => (*i as usize) < s.encode_utf16().count(),
            PropertyKey::Name(name) => name == "length",
        },
        HostValue::Array(elements) => match key {
            PropertyKey::Index(i) => (*i as usize) < elements.borrow().len(),
            PropertyKey::Name(name) => name == "length",
        },
        HostValue::Object(object) => object.borrow().properties.contains_key(&key.to_string()),
        HostValue::Function(function) => {
            name == Some("name") || function.properties.borrow().contains_key(&key.to_string())
        }
        HostValue::Error(error) => {
            let error = error.borrow();
            match name {
                Some("name") | Some("message") => true,
                Some("code") => error.code.is_some(),
                Some("cause") => error.cause.is_some(),
                _ => error.properties.contains_key(&key.to_string()),
            }
        }
        _ => false,
    }
}

pub fn call(
    env: &mut dyn GuestEnv,
    callee: &HostValue,
    this: &HostValue,
    args: &[HostValue],
) -> Result<HostValue, Throw> {
    let HostValue::Function(function) = callee else {
        return Err(Throw::type_error(format!(
            "{} is not a function",
            callee.to_display_string()
        )));
    };
    match &function.kind {
        FunctionKind::Native { call, .. } => call(env, this, args),
        FunctionKind::Guest(callback) => callback.invoke(env, args),
    }
}

pub fn call_method(
    env: &mut dyn GuestEnv,
    target: &HostValue,
    name: &str,
    args: &[HostValue],
) -> Result<HostValue, Throw> {
    let method = get_property(target, &PropertyKey::from_name(name))?;
    if !matches!(method, HostValue::Function(_)) {
        return Err(Throw::type_error(format!(
            "{}.{} is not a function",
            target.type_of(),
            name
        )));
    }
    call(env, &method, target, args)
}

pub fn construct(
    env: &mut dyn GuestEnv,
    callee: &HostValue,
    args: &[HostValue],
) -> Result<HostValue, Throw> {
    let constructor = match callee {
        HostValue::Function(function) => match &function.kind {
            FunctionKind::Native {
                construct: Some(construct),
                ..
            } => Some((function.clone(), construct.clone())),
            _ => None,
        },
        _ => None,
    };
    let Some((function, construct)) = constructor else {
        return Err(Throw::type_error(format!(
            "{} is not a constructor",
            callee.to_display_string()
        )));
    };
    let instance = construct(env, args)?;
    stamp_constructor(&instance, &function);
    Ok(instance)
}

fn stamp_constructor(instance: &HostValue, function: &FunctionRef) {
    match instance {
        HostValue::Object(object) => {
            let mut object = object.borrow_mut();
            if object.constructor.is_none() {
                object.constructor = Some(function.clone());
            }
        }
        HostValue::Error(error) => {
            let mut error = error.borrow_mut();
            if error.constructor.is_none() {
                error.constructor = Some(function.clone());
            }
        }
        _ => {}
    }
}

/// Relational ordering. `None` when the operands are unordered (NaN involved).
pub fn compare(a: &HostValue, b: &HostValue) -> Option<Ordering> {
    match (a, b) {
        (HostValue::String(x), HostValue::String(y)) => Some(x.encode_utf16().cmp(y.encode_utf16())),
        _ if a.is_bigint() && b.is_bigint() => Some(a.to_bigint()?.cmp(&b.to_bigint()?)),
        _ => a.to_number().partial_cmp(&b.to_number()),
    }
}

pub fn instance_of(value: &HostValue, constructor: &HostValue) -> Result<bool, Throw> {
    let HostValue::Function(ctor) = constructor else {
        return Err(Throw::type_error(
            "Right-hand side of 'instanceof' is not callable",
        ));
    };
    let same = |candidate: &Option<FunctionRef>| {
        candidate
            .as_ref()
            .map(|c| Rc::ptr_eq(c, ctor))
            .unwrap_or(false)
    };
    let result = match (value, ctor.intrinsic) {
        (v, Some(Intrinsic::Object)) => v.identity().is_some(),
        (HostValue::Array(_), Some(Intrinsic::Array)) => true,
        (HostValue::Error(_), Some(Intrinsic::Error)) => true,
        (HostValue::Error(error), Some(Intrinsic::TypeError)) => error.borrow().name == "TypeError",
        (HostValue::Error(error), Some(Intrinsic::RangeError)) => error.borrow().name == "RangeError",
        (HostValue::Error(error), _) => same(&error.borrow().constructor),
        (HostValue::Object(object), _) => same(&object.borrow().constructor),
        _ => false,
    };
    Ok(result)
}

/// Wraps a thrown value into a structured error: name, message and code are
/// lifted from the original when it has them, and the original becomes the cause.
pub fn normalize_failure(thrown: Throw) -> HostValue {
    let original = thrown.0;
    let (name, message, code) = match &original {
        HostValue::Error(error) => {
            let error = error.borrow();
            (error.name.clone(), error.message.clone(), error.code.clone())
        }
        HostValue::Object(object) => {
            let object = object.borrow();
            let text = |key: &str| object.properties.get(key).map(HostValue::to_display_string);
            (
                text("name").unwrap_or_else(|| "Error".to_string()),
                text("message").unwrap_or_else(|| original.to_display_string()),
                object.properties.get("code").cloned(),
            )
        }
        other => ("Error".to_string(), other.to_display_string(), None),
    };
    let mut error = ErrorValue::new(name, message);
    error.code = code;
    error.cause = Some(original);
    HostValue::Error(Rc::new(RefCell::new(error)))
}
