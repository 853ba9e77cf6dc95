/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * Bridge Host Imports for Guest WASM Modules.
 *
 * Links the marshaling ABI into a wasmtime Linker under a single import
 * module (default "ark"). Handles travel as i32. Bridge failures (stale
 * handles, allocator problems, out-of-bounds memory, an explicit `throw`)
 * become traps; host dispatch failures come back as error handles.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

use crate::error::BridgeError;
use crate::invoke;
use crate::marshal;
use crate::wasm_runner::HostState;
use wasmtime::{Caller, IntoFunc, Linker};

type Ctx<'a> = Caller<'a, HostState>;

// =============================================================================
// Catalog
// =============================================================================

/// Every operation a guest may import from the bridge module.
pub const BRIDGE_IMPORTS: &[&str] = &[
    // housekeeping
    "init",
    "reset",
    "dump",
    "memory_grow",
    "inc_ref",
    "dec_ref",
    "throw",
    // construction
    "make_bool",
    "make_int",
    "make_uint",
    "make_bigint",
    "make_biguint",
    "make_double",
    "make_str",
    "make_str16",
    "new_object",
    "new_array",
    "new_error",
    // extraction
    "get_value_bool",
    "get_value_int",
    "get_value_uint",
    "get_value_bigint",
    "get_value_biguint",
    "get_value_double",
    "get_value_string",
    "get_value_string16",
    "str_len",
    "str_len16",
    // predicates
    "gt",
    "gte",
    "lt",
    "lte",
    "equals",
    "strictly_equals",
    "instanceof",
    "not",
    "is_string",
    "is_number",
    "is_bool",
    "is_null",
    "is_undefined",
    "is_error",
    "obj_has_own_prop",
    "typeof",
    // invocation
    "get",
    "has",
    "set",
    "push",
    "get_index",
    "set_index",
    "array_len",
    "call",
    "call_method",
    "construct",
    "global",
    // callbacks
    "make_callback",
    "release_callback",
];

/// Turns a bridge failure into a trap for the calling guest.
pub(crate) fn trap(err: BridgeError) -> wasmtime::Error {
    wasmtime::Error::new(err)
}

fn link<Params, Args>(
    linker: &mut Linker<HostState>,
    module: &str,
    name: &str,
    func: impl IntoFunc<HostState, Params, Args>,
) -> Result<(), BridgeError> {
    linker
        .func_wrap(module, name, func)
        .map(|_| ())
        .map_err(|e| BridgeError::Link {
            name: name.to_string(),
            message: e.to_string(),
        })
}

// =============================================================================
// Linking
// =============================================================================

pub fn link_bridge_imports(linker: &mut Linker<HostState>, module: &str) -> Result<(), BridgeError> {
    link_housekeeping(linker, module)?;
    link_construction(linker, module)?;
    link_extraction(linker, module)?;
    link_predicates(linker, module)?;
    link_invocation(linker, module)?;
    Ok(())
}

fn link_housekeeping(linker: &mut Linker<HostState>, m: &str) -> Result<(), BridgeError> {
    link(linker, m, "init", |mut cx: Ctx<'_>| -> wasmtime::Result<()> {
        invoke::init(&mut cx).map_err(trap)
    })?;
    link(linker, m, "reset", |mut cx: Ctx<'_>| invoke::reset(&mut cx))?;
    link(linker, m, "dump", |mut cx: Ctx<'_>| -> i32 { invoke::dump(&mut cx) })?;
    link(linker, m, "memory_grow", |mut cx: Ctx<'_>, pages: i32| {
        invoke::memory_grow(&mut cx, pages)
    })?;
    link(linker, m, "inc_ref", |mut cx: Ctx<'_>, h: i32| -> wasmtime::Result<()> {
        invoke::inc_ref(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "dec_ref", |mut cx: Ctx<'_>, h: i32| invoke::dec_ref(&mut cx, h))?;
    link(linker, m, "throw", |mut cx: Ctx<'_>, h: i32| -> wasmtime::Result<()> {
        invoke::throw(&mut cx, h).map_err(trap)
    })?;
    Ok(())
}

fn link_construction(linker: &mut Linker<HostState>, m: &str) -> Result<(), BridgeError> {
    link(linker, m, "make_bool", |mut cx: Ctx<'_>, v: i32| -> i32 {
        marshal::make_bool(&mut cx, v)
    })?;
    link(linker, m, "make_int", |mut cx: Ctx<'_>, v: i32| -> i32 {
        marshal::make_int(&mut cx, v)
    })?;
    link(linker, m, "make_uint", |mut cx: Ctx<'_>, v: i32| -> i32 {
        marshal::make_uint(&mut cx, v)
    })?;
    link(linker, m, "make_bigint", |mut cx: Ctx<'_>, v: i64| -> i32 {
        marshal::make_bigint(&mut cx, v)
    })?;
    link(linker, m, "make_biguint", |mut cx: Ctx<'_>, v: i64| -> i32 {
        marshal::make_biguint(&mut cx, v)
    })?;
    link(linker, m, "make_double", |mut cx: Ctx<'_>, v: f64| -> i32 {
        marshal::make_double(&mut cx, v)
    })?;
    link(linker, m, "make_str", |mut cx: Ctx<'_>, ptr: i32, len: i32| {
        marshal::make_str(&mut cx, ptr, len).map_err(trap)
    })?;
    link(linker, m, "make_str16", |mut cx: Ctx<'_>, ptr: i32, len: i32| {
        marshal::make_str16(&mut cx, ptr, len).map_err(trap)
    })?;
    link(linker, m, "new_object", |mut cx: Ctx<'_>| -> i32 {
        marshal::new_object(&mut cx)
    })?;
    link(linker, m, "new_array", |mut cx: Ctx<'_>| -> i32 {
        marshal::new_array(&mut cx)
    })?;
    link(linker, m, "new_error", |mut cx: Ctx<'_>, ptr: i32, len: i32| {
        marshal::new_error(&mut cx, ptr, len).map_err(trap)
    })?;
    Ok(())
}

fn link_extraction(linker: &mut Linker<HostState>, m: &str) -> Result<(), BridgeError> {
    link(linker, m, "get_value_bool", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_bool(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "get_value_int", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_int(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "get_value_uint", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_uint(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "get_value_bigint", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_bigint(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "get_value_biguint", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_biguint(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "get_value_double", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_double(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "get_value_string", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_string(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "get_value_string16", |mut cx: Ctx<'_>, h: i32| {
        marshal::get_value_string16(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "str_len", |mut cx: Ctx<'_>, h: i32| {
        marshal::str_len(&mut cx, h).map_err(trap)
    })?;
    link(linker, m, "str_len16", |mut cx: Ctx<'_>, h: i32| {
        marshal::str_len16(&mut cx, h).map_err(trap)
    })?;
    Ok(())
}

fn link_predicates(linker: &mut Linker<HostState>, m: &str) -> Result<(), BridgeError> {
    type Binary = fn(&mut dyn crate::env::GuestEnv, i32, i32) -> Result<i32, BridgeError>;
    let binary: [(&str, Binary); 7] = [
        ("gt", marshal::gt),
        ("gte", marshal::gte),
        ("lt", marshal::lt),
        ("lte", marshal::lte),
        ("equals", marshal::equals),
        ("strictly_equals", marshal::strictly_equals),
        ("instanceof", marshal::instance_of),
    ];
    for (name, op) in binary {
        link(linker, m, name, move |mut cx: Ctx<'_>, a: i32, b: i32| {
            op(&mut cx, a, b).map_err(trap)
        })?;
    }

    type Unary = fn(&mut dyn crate::env::GuestEnv, i32) -> Result<i32, BridgeError>;
    let unary: [(&str, Unary); 8] = [
        ("not", marshal::not),
        ("is_string", marshal::is_string),
        ("is_number", marshal::is_number),
        ("is_bool", marshal::is_bool),
        ("is_null", marshal::is_null),
        ("is_undefined", marshal::is_undefined),
        ("is_error", marshal::is_error),
        ("typeof", marshal::type_of),
    ];
    for (name, op) in unary {
        link(linker, m, name, move |mut cx: Ctx<'_>, h: i32| {
            op(&mut cx, h).map_err(trap)
        })?;
    }

    link(linker, m, "obj_has_own_prop", |mut cx: Ctx<'_>, h: i32, ptr: i32, len: i32| {
        marshal::obj_has_own_prop(&mut cx, h, ptr, len).map_err(trap)
    })?;
    Ok(())
}

fn link_invocation(linker: &mut Linker<HostState>, m: &str) -> Result<(), BridgeError> {
    link(linker, m, "get", |mut cx: Ctx<'_>, t: i32, k: i32| {
        invoke::get(&mut cx, t, k).map_err(trap)
    })?;
    link(linker, m, "has", |mut cx: Ctx<'_>, t: i32, k: i32| {
        invoke::has(&mut cx, t, k).map_err(trap)
    })?;
    link(linker, m, "set", |mut cx: Ctx<'_>, t: i32, k: i32, v: i32| {
        invoke::set(&mut cx, t, k, v).map_err(trap)
    })?;
    link(linker, m, "push", |mut cx: Ctx<'_>, arr: i32, v: i32| {
        invoke::push(&mut cx, arr, v).map_err(trap)
    })?;
    link(linker, m, "get_index", |mut cx: Ctx<'_>, arr: i32, i: i32| {
        invoke::get_index(&mut cx, arr, i).map_err(trap)
    })?;
    link(linker, m, "set_index", |mut cx: Ctx<'_>, arr: i32, i: i32, v: i32| {
        invoke::set_index(&mut cx, arr, i, v).map_err(trap)
    })?;
    link(linker, m, "array_len", |mut cx: Ctx<'_>, arr: i32| {
        invoke::array_len(&mut cx, arr).map_err(trap)
    })?;
    link(linker, m, "call", |mut cx: Ctx<'_>, f: i32, this: i32, argv: i32| {
        invoke::call(&mut cx, f, this, argv).map_err(trap)
    })?;
    link(linker, m, "call_method", |mut cx: Ctx<'_>, t: i32, name: i32, argv: i32| {
        invoke::call_method(&mut cx, t, name, argv).map_err(trap)
    })?;
    link(linker, m, "construct", |mut cx: Ctx<'_>, ctor: i32, argv: i32| {
        invoke::construct(&mut cx, ctor, argv).map_err(trap)
    })?;
    link(linker, m, "global", |mut cx: Ctx<'_>| -> i32 { invoke::global(&mut cx) })?;
    link(linker, m, "make_callback", |mut cx: Ctx<'_>, index: i32, data: i32| -> i32 {
        invoke::make_callback(&mut cx, index, data)
    })?;
    link(linker, m, "release_callback", |mut cx: Ctx<'_>, h: i32| {
        invoke::release_callback(&mut cx, h).map_err(trap)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use std::collections::HashSet;
    use wasmtime::{Engine, Store};

    #[test]
    fn test_every_catalog_entry_is_linked() {
        let engine = Engine::default();
        let mut linker = Linker::<HostState>::new(&engine);
        link_bridge_imports(&mut linker, "ark").expect("link failed");
        let mut store = Store::new(&engine, HostState::new(BridgeConfig::default()));
        for name in BRIDGE_IMPORTS {
            assert!(
                linker.get(&mut store, "ark", name).is_some(),
                "'{}' is in the catalog but not linked",
                name
            );
        }
    }

    #[test]
    fn test_catalog_has_no_duplicates() {
        let unique: HashSet<_> = BRIDGE_IMPORTS.iter().collect();
        assert_eq!(unique.len(), BRIDGE_IMPORTS.len());
    }

    #[test]
    fn test_custom_module_name() {
        let engine = Engine::default();
        let mut linker = Linker::<HostState>::new(&engine);
        link_bridge_imports(&mut linker, "env").expect("link failed");
        let mut store = Store::new(&engine, HostState::new(BridgeConfig::default()));
        assert!(linker.get(&mut store, "env", "make_int").is_some());
        assert!(linker.get(&mut store, "ark", "make_int").is_none());
    }
}
