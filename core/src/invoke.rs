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

//! Invocation, callback and housekeeping operations of the guest ABI.
//!
//! Host dispatch failures never leave this module as errors: they are
//! normalized into error values and handed back to the guest as ordinary
//! handles. The only way to unwind the guest is the explicit `throw`.

use crate::bridge;
use crate::callback;
use crate::dispatch::{self, PropertyKey, Throw};
use crate::env::GuestEnv;
use crate::error::BridgeError;
use crate::handle_table::Handle;
use crate::value::HostValue;
use tracing::{debug, info};

fn resolve(env: &mut dyn GuestEnv, handle: i32) -> Result<HostValue, BridgeError> {
    env.bridge().resolve(Handle::from_wire(handle))
}

/// Registers the outcome of a host dispatch, then sweeps dropped callbacks.
fn settle(env: &mut dyn GuestEnv, op: &'static str, outcome: Result<HostValue, Throw>) -> i32 {
    let value = match outcome {
        Ok(value) => value,
        Err(thrown) => {
            let error = dispatch::normalize_failure(thrown);
            debug!(
                target: "ark_host_bridge::invoke",
                op,
                error = %error.to_display_string(),
                "host dispatch failed"
            );
            error
        }
    };
    let handle = env.bridge().register(value);
    callback::drain_releases(env);
    handle.to_wire()
}

/// Unpacks an argument list one level deep. Null and undefined mean no arguments.
fn arguments(list: &HostValue) -> Result<Vec<HostValue>, Throw> {
    match list {
        HostValue::Array(elements) => Ok(elements.borrow().clone()),
        HostValue::Null | HostValue::Undefined => Ok(Vec::new()),
        other => Err(Throw::type_error(format!(
            "argument list must be an array, got {}",
            other.type_of()
        ))),
    }
}

pub fn get(env: &mut dyn GuestEnv, target: i32, key: i32) -> Result<i32, BridgeError> {
    let (target, key) = (resolve(env, target)?, resolve(env, key)?);
    let outcome = dispatch::get_property(&target, &PropertyKey::from_value(&key));
    Ok(settle(env, "get", outcome))
}

/// Returns the `true` or `false` handle, or an error handle.
pub fn has(env: &mut dyn GuestEnv, target: i32, key: i32) -> Result<i32, BridgeError> {
    let (target, key) = (resolve(env, target)?, resolve(env, key)?);
    let outcome = dispatch::has_property(&target, &PropertyKey::from_value(&key)).map(HostValue::Bool);
    Ok(settle(env, "has", outcome))
}

/// Returns the `undefined` handle, or an error handle.
pub fn set(env: &mut dyn GuestEnv, target: i32, key: i32, value: i32) -> Result<i32, BridgeError> {
    let (target, key, value) = (resolve(env, target)?, resolve(env, key)?, resolve(env, value)?);
    let outcome = dispatch::set_property(&target, &PropertyKey::from_value(&key), value)
        .map(|()| HostValue::Undefined);
    Ok(settle(env, "set", outcome))
}

/// Appends the value and returns a handle to the new length.
pub fn push(env: &mut dyn GuestEnv, array: i32, value: i32) -> Result<i32, BridgeError> {
    let (array, value) = (resolve(env, array)?, resolve(env, value)?);
    let outcome = match &array {
        HostValue::Array(elements) => {
            let mut elements = elements.borrow_mut();
            if elements.len() >= dispatch::MAX_ARRAY_LENGTH {
                Err(Throw::range_error("Invalid array length"))
            } else {
                elements.push(value);
                Ok(HostValue::Uint32(elements.len() as u32))
            }
        }
        other => Err(Throw::type_error(format!(
            "cannot push onto {}",
            other.type_of()
        ))),
    };
    Ok(settle(env, "push", outcome))
}

pub fn get_index(env: &mut dyn GuestEnv, array: i32, index: i32) -> Result<i32, BridgeError> {
    let array = resolve(env, array)?;
    let outcome = dispatch::get_property(&array, &PropertyKey::from_value(&HostValue::Int32(index)));
    Ok(settle(env, "get_index", outcome))
}

pub fn set_index(env: &mut dyn GuestEnv, array: i32, index: i32, value: i32) -> Result<i32, BridgeError> {
    let (array, value) = (resolve(env, array)?, resolve(env, value)?);
    let key = PropertyKey::from_value(&HostValue::Int32(index));
    let outcome = dispatch::set_property(&array, &key, value).map(|()| HostValue::Undefined);
    Ok(settle(env, "set_index", outcome))
}

/// Length of an array or string; zero for anything else.
pub fn array_len(env: &mut dyn GuestEnv, array: i32) -> Result<i32, BridgeError> {
    let len = match resolve(env, array)? {
        HostValue::Array(elements) => elements.borrow().len(),
        HostValue::String(s) => s.encode_utf16().count(),
        _ => 0,
    };
    Ok(len as i32)
}

pub fn call(env: &mut dyn GuestEnv, callee: i32, this: i32, argv: i32) -> Result<i32, BridgeError> {
    let (callee, this, list) = (resolve(env, callee)?, resolve(env, this)?, resolve(env, argv)?);
    let outcome = arguments(&list).and_then(|args| dispatch::call(env, &callee, &this, &args));
    Ok(settle(env, "call", outcome))
}

pub fn call_method(env: &mut dyn GuestEnv, target: i32, name: i32, argv: i32) -> Result<i32, BridgeError> {
    let (target, name, list) = (resolve(env, target)?, resolve(env, name)?, resolve(env, argv)?);
    let name = name.to_display_string();
    let outcome = arguments(&list).and_then(|args| dispatch::call_method(env, &target, &name, &args));
    Ok(settle(env, "call_method", outcome))
}

pub fn construct(env: &mut dyn GuestEnv, ctor: i32, argv: i32) -> Result<i32, BridgeError> {
    let (ctor, list) = (resolve(env, ctor)?, resolve(env, argv)?);
    let outcome = arguments(&list).and_then(|args| dispatch::construct(env, &ctor, &args));
    Ok(settle(env, "construct", outcome))
}

pub fn global(_env: &mut dyn GuestEnv) -> i32 {
    Handle::GLOBAL.to_wire()
}

// Callbacks

pub fn make_callback(env: &mut dyn GuestEnv, table_index: i32, closure_data: i32) -> i32 {
    let bridge = env.bridge();
    let proxy = bridge.callbacks_mut().make(table_index as u32, closure_data);
    bridge.register(proxy).to_wire()
}

/// Releases the proxy behind `handle`. The handle itself stays live until
/// the guest drops it with `dec_ref`.
pub fn release_callback(env: &mut dyn GuestEnv, handle: i32) -> Result<(), BridgeError> {
    let proxy = resolve(env, handle)?;
    if !callback::release_callback(env, &proxy)? {
        debug!(target: "ark_host_bridge::callback", handle, "not a live callback");
    }
    Ok(())
}

// Housekeeping

pub fn init(env: &mut dyn GuestEnv) -> Result<(), BridgeError> {
    bridge::initialize(env).map(|_| ())
}

pub fn reset(env: &mut dyn GuestEnv) {
    env.bridge().reset();
    callback::drain_releases(env);
}

/// Logs every live entry and returns how many there are.
pub fn dump(env: &mut dyn GuestEnv) -> i32 {
    let entries = env.bridge().dump();
    for entry in &entries {
        info!(target: "ark_host_bridge::dump", "{}", entry);
    }
    entries.len() as i32
}

pub fn memory_grow(env: &mut dyn GuestEnv, pages: i32) {
    env.bridge().views_mut().notify_growth(pages as u32);
}

pub fn inc_ref(env: &mut dyn GuestEnv, handle: i32) -> Result<(), BridgeError> {
    env.bridge().retain(Handle::from_wire(handle))
}

/// Reserved handles are ignored. Stale handles are ignored too: a double
/// release is a guest bug, not a reason to trap.
pub fn dec_ref(env: &mut dyn GuestEnv, handle: i32) {
    let handle = Handle::from_wire(handle);
    if env.bridge().release(handle) {
        callback::drain_releases(env);
    }
}

/// Raises the value behind `handle` as a trap in the calling guest.
pub fn throw(env: &mut dyn GuestEnv, handle: i32) -> Result<(), BridgeError> {
    let value = resolve(env, handle)?;
    let message = value.to_display_string();
    env.bridge().raise(value);
    Err(BridgeError::Thrown(message))
}
