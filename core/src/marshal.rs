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

//! Value construction, extraction and predicates of the guest ABI.
//!
//! Every function takes wire-level arguments, as the guest passes them, and
//! returns wire-level results. Errors are bridge failures that end the guest
//! call in a trap.

use crate::dispatch::{self, PropertyKey};
use crate::env::GuestEnv;
use crate::error::BridgeError;
use crate::handle_table::Handle;
use crate::value::HostValue;
use num_bigint::BigInt;
use std::cmp::Ordering;
use tracing::debug;

fn register(env: &mut dyn GuestEnv, value: HostValue) -> i32 {
    env.bridge().register(value).to_wire()
}

fn resolve(env: &mut dyn GuestEnv, handle: i32) -> Result<HostValue, BridgeError> {
    env.bridge().resolve(Handle::from_wire(handle))
}

fn flag(value: bool) -> i32 {
    i32::from(value)
}

// Construction

pub fn make_bool(env: &mut dyn GuestEnv, value: i32) -> i32 {
    register(env, HostValue::Bool(value != 0))
}

pub fn make_int(env: &mut dyn GuestEnv, value: i32) -> i32 {
    register(env, HostValue::Int32(value))
}

pub fn make_uint(env: &mut dyn GuestEnv, value: i32) -> i32 {
    register(env, HostValue::Uint32(value as u32))
}

pub fn make_bigint(env: &mut dyn GuestEnv, value: i64) -> i32 {
    register(env, HostValue::Int64(BigInt::from(value)))
}

/// The wire value is signed; negative values are renormalized by adding 2^64.
pub fn make_biguint(env: &mut dyn GuestEnv, value: i64) -> i32 {
    register(env, HostValue::Uint64(BigInt::from(value as u64)))
}

pub fn make_double(env: &mut dyn GuestEnv, value: f64) -> i32 {
    register(env, HostValue::Double(value))
}

pub fn read_str(env: &mut dyn GuestEnv, ptr: i32, len: i32) -> Result<String, BridgeError> {
    let (memory, bridge) = env.memory_and_bridge()?;
    bridge.views_mut().ensure_fresh(memory).utf8(ptr as u32, len as u32)
}

pub fn make_str(env: &mut dyn GuestEnv, ptr: i32, len: i32) -> Result<i32, BridgeError> {
    let text = read_str(env, ptr, len)?;
    Ok(register(env, HostValue::string(text)))
}

/// `len` counts 16-bit code units.
pub fn make_str16(env: &mut dyn GuestEnv, ptr: i32, len: i32) -> Result<i32, BridgeError> {
    let (memory, bridge) = env.memory_and_bridge()?;
    let text = bridge
        .views_mut()
        .ensure_fresh(memory)
        .utf16(ptr as u32, len as u32)?;
    Ok(bridge.register(HostValue::string(text)).to_wire())
}

pub fn new_object(env: &mut dyn GuestEnv) -> i32 {
    register(env, HostValue::object())
}

pub fn new_array(env: &mut dyn GuestEnv) -> i32 {
    register(env, HostValue::array(Vec::new()))
}

pub fn new_error(env: &mut dyn GuestEnv, ptr: i32, len: i32) -> Result<i32, BridgeError> {
    let message = read_str(env, ptr, len)?;
    Ok(register(env, HostValue::error("Error", message)))
}

// Extraction

pub fn get_value_bool(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    Ok(flag(resolve(env, handle)?.is_truthy()))
}

pub fn get_value_int(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    Ok(resolve(env, handle)?.to_int32())
}

pub fn get_value_uint(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    Ok(resolve(env, handle)?.to_uint32() as i32)
}

pub fn get_value_bigint(env: &mut dyn GuestEnv, handle: i32) -> Result<i64, BridgeError> {
    Ok(resolve(env, handle)?.to_int64())
}

pub fn get_value_biguint(env: &mut dyn GuestEnv, handle: i32) -> Result<i64, BridgeError> {
    Ok(resolve(env, handle)?.to_uint64() as i64)
}

pub fn get_value_double(env: &mut dyn GuestEnv, handle: i32) -> Result<f64, BridgeError> {
    Ok(resolve(env, handle)?.to_number())
}

fn text_of(value: &HostValue) -> String {
    match value {
        HostValue::String(s) => s.to_string(),
        other => other.to_display_string(),
    }
}

fn alloc(env: &mut dyn GuestEnv, size: u32) -> Result<u32, BridgeError> {
    match env.alloc(size)? {
        0 => Err(BridgeError::AllocationFailure { size }),
        ptr => Ok(ptr),
    }
}

fn alloc_size(len: usize) -> Result<u32, BridgeError> {
    u32::try_from(len).map_err(|_| BridgeError::AllocationFailure { size: u32::MAX })
}

/// Copies `text` into fresh guest memory as NUL-terminated 8-bit text.
pub fn copy_str_to_guest(env: &mut dyn GuestEnv, text: &str) -> Result<u32, BridgeError> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    let ptr = alloc(env, alloc_size(bytes.len())?)?;
    // The allocator may have grown memory; views are checked again here.
    let (memory, bridge) = env.memory_and_bridge()?;
    bridge.views_mut().ensure_fresh_mut(memory).write_bytes(ptr, &bytes)?;
    Ok(ptr)
}

/// Copies `text` into fresh guest memory as 16-bit code units, unterminated.
pub fn copy_str16_to_guest(env: &mut dyn GuestEnv, text: &str) -> Result<u32, BridgeError> {
    let units: Vec<u16> = text.encode_utf16().collect();
    // Never ask for zero bytes: `malloc(0)` may answer null.
    let ptr = alloc(env, alloc_size(units.len() * 2)?.max(1))?;
    let (memory, bridge) = env.memory_and_bridge()?;
    bridge.views_mut().ensure_fresh_mut(memory).write_utf16(ptr, &units)?;
    Ok(ptr)
}

pub fn get_value_string(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    let text = text_of(&resolve(env, handle)?);
    Ok(copy_str_to_guest(env, &text)? as i32)
}

pub fn get_value_string16(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    let text = text_of(&resolve(env, handle)?);
    Ok(copy_str16_to_guest(env, &text)? as i32)
}

/// Byte length of the 8-bit form, without the terminator.
pub fn str_len(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    Ok(text_of(&resolve(env, handle)?).len() as i32)
}

pub fn str_len16(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    Ok(resolve(env, handle)?.utf16_len() as i32)
}

// Predicates

fn compare_with(
    env: &mut dyn GuestEnv,
    a: i32,
    b: i32,
    accept: fn(Ordering) -> bool,
) -> Result<i32, BridgeError> {
    let (a, b) = (resolve(env, a)?, resolve(env, b)?);
    Ok(flag(dispatch::compare(&a, &b).map(accept).unwrap_or(false)))
}

pub fn gt(env: &mut dyn GuestEnv, a: i32, b: i32) -> Result<i32, BridgeError> {
    compare_with(env, a, b, Ordering::is_gt)
}

pub fn gte(env: &mut dyn GuestEnv, a: i32, b: i32) -> Result<i32, BridgeError> {
    compare_with(env, a, b, Ordering::is_ge)
}

pub fn lt(env: &mut dyn GuestEnv, a: i32, b: i32) -> Result<i32, BridgeError> {
    compare_with(env, a, b, Ordering::is_lt)
}

pub fn lte(env: &mut dyn GuestEnv, a: i32, b: i32) -> Result<i32, BridgeError> {
    compare_with(env, a, b, Ordering::is_le)
}

pub fn equals(env: &mut dyn GuestEnv, a: i32, b: i32) -> Result<i32, BridgeError> {
    let (a, b) = (resolve(env, a)?, resolve(env, b)?);
    Ok(flag(a.loose_equals(&b)))
}

pub fn strictly_equals(env: &mut dyn GuestEnv, a: i32, b: i32) -> Result<i32, BridgeError> {
    let (a, b) = (resolve(env, a)?, resolve(env, b)?);
    Ok(flag(a.strict_equals(&b)))
}

/// A right-hand side that is not a function answers false.
pub fn instance_of(env: &mut dyn GuestEnv, value: i32, ctor: i32) -> Result<i32, BridgeError> {
    let (value, ctor) = (resolve(env, value)?, resolve(env, ctor)?);
    let result = dispatch::instance_of(&value, &ctor).unwrap_or_else(|thrown| {
        debug!(
            target: "ark_host_bridge::invoke",
            error = %thrown.value().to_display_string(),
            "instanceof against a non-callable"
        );
        false
    });
    Ok(flag(result))
}

pub fn not(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    Ok(flag(!resolve(env, handle)?.is_truthy()))
}

fn classify(
    env: &mut dyn GuestEnv,
    handle: i32,
    test: fn(&HostValue) -> bool,
) -> Result<i32, BridgeError> {
    Ok(flag(test(&resolve(env, handle)?)))
}

pub fn is_string(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    classify(env, handle, |v| matches!(v, HostValue::String(_)))
}

pub fn is_number(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    classify(env, handle, HostValue::is_number)
}

pub fn is_bool(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    classify(env, handle, |v| matches!(v, HostValue::Bool(_)))
}

pub fn is_null(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    classify(env, handle, |v| matches!(v, HostValue::Null))
}

pub fn is_undefined(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    classify(env, handle, |v| matches!(v, HostValue::Undefined))
}

pub fn is_error(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    classify(env, handle, |v| matches!(v, HostValue::Error(_)))
}

pub fn obj_has_own_prop(
    env: &mut dyn GuestEnv,
    handle: i32,
    ptr: i32,
    len: i32,
) -> Result<i32, BridgeError> {
    let key = PropertyKey::from_name(&read_str(env, ptr, len)?);
    let target = resolve(env, handle)?;
    Ok(flag(dispatch::has_own_property(&target, &key)))
}

/// Returns a handle to the type name string.
pub fn type_of(env: &mut dyn GuestEnv, handle: i32) -> Result<i32, BridgeError> {
    let name = resolve(env, handle)?.type_of();
    Ok(register(env, HostValue::string(name)))
}
