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

//! The global root bound at handle 4.

use crate::dispatch::{self, PropertyKey, Throw};
use crate::json;
use crate::value::{ErrorValue, HostValue, Intrinsic, Properties};
use std::cell::RefCell;
use std::rc::Rc;

/// `console` is the same object the bridge binds at handle 5.
pub fn global_object(console: HostValue) -> HostValue {
    let mut globals = Properties::new();
    globals.insert("Object".to_string(), object_constructor());
    globals.insert("Array".to_string(), array_constructor());
    for (name, intrinsic) in [
        ("Error", Intrinsic::Error),
        ("TypeError", Intrinsic::TypeError),
        ("RangeError", Intrinsic::RangeError),
    ] {
        globals.insert(name.to_string(), error_constructor(name, intrinsic));
    }
    globals.insert("console".to_string(), console);
    globals.insert("JSON".to_string(), json::json_object());
    globals.insert("NaN".to_string(), HostValue::Double(f64::NAN));
    globals.insert("Infinity".to_string(), HostValue::Double(f64::INFINITY));
    globals.insert("undefined".to_string(), HostValue::Undefined);
    HostValue::object_from(globals)
}

fn object_from_arg(args: &[HostValue]) -> HostValue {
    match args.first() {
        Some(value) if value.identity().is_some() => value.clone(),
        _ => HostValue::object(),
    }
}

fn object_constructor() -> HostValue {
    let ctor = HostValue::native_constructor(
        "Object",
        Some(Intrinsic::Object),
        |_env, _this, args| Ok(object_from_arg(args)),
        |_env, args| Ok(object_from_arg(args)),
    );
    if let HostValue::Function(function) = &ctor {
        function.properties.borrow_mut().insert(
            "keys".to_string(),
            HostValue::native_function("keys", |_env, _this, args| {
                let target = args.first().cloned().unwrap_or(HostValue::Undefined);
                object_keys(&target)
            }),
        );
    }
    ctor
}

fn object_keys(target: &HostValue) -> Result<HostValue, Throw> {
    let keys: Vec<String> = match target {
        HostValue::Null | HostValue::Undefined => {
            return Err(Throw::type_error("Cannot convert undefined or null to object"))
        }
        HostValue::Object(object) => object.borrow().properties.keys().cloned().collect(),
        HostValue::Array(elements) => (0..elements.borrow().len()).map(|i| i.to_string()).collect(),
        HostValue::Function(function) => function.properties.borrow().keys().cloned().collect(),
        HostValue::Error(error) => error.borrow().properties.keys().cloned().collect(),
        _ => Vec::new(),
    };
    Ok(HostValue::array(keys.into_iter().map(HostValue::string).collect()))
}

fn new_array(args: &[HostValue]) -> Result<HostValue, Throw> {
    match args {
        [len] if len.is_number() => {
            let n = dispatch::array_length(len.to_number())?;
            Ok(HostValue::array(vec![HostValue::Undefined; n]))
        }
        _ => Ok(HostValue::array(args.to_vec())),
    }
}

fn array_constructor() -> HostValue {
    let ctor = HostValue::native_constructor(
        "Array",
        Some(Intrinsic::Array),
        |_env, _this, args| new_array(args),
        |_env, args| new_array(args),
    );
    if let HostValue::Function(function) = &ctor {
        function.properties.borrow_mut().insert(
            "isArray".to_string(),
            HostValue::native_function("isArray", |_env, _this, args| {
                Ok(HostValue::Bool(matches!(args.first(), Some(HostValue::Array(_)))))
            }),
        );
    }
    ctor
}

fn new_error(name: &str, args: &[HostValue]) -> Result<HostValue, Throw> {
    let message = match args.first() {
        None | Some(HostValue::Undefined) => String::new(),
        Some(value) => value.to_display_string(),
    };
    let mut error = ErrorValue::new(name, message);
    if let Some(options) = args.get(1).filter(|o| o.identity().is_some()) {
        let cause = PropertyKey::from_name("cause");
        if dispatch::has_own_property(options, &cause) {
            error.cause = Some(dispatch::get_property(options, &cause)?);
        }
    }
    Ok(HostValue::Error(Rc::new(RefCell::new(error))))
}

fn error_constructor(name: &'static str, intrinsic: Intrinsic) -> HostValue {
    HostValue::native_constructor(
        name,
        Some(intrinsic),
        move |_env, _this, args| new_error(name, args),
        move |_env, args| new_error(name, args),
    )
}
