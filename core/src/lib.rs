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

//! Host side of the Ark guest bridge: a handle table that lets a wasm guest
//! reach dynamically typed host values through i32 handles, plus the
//! marshaling, invocation and callback ABI built on top of it.

pub mod bridge;
pub mod callback;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod globals;
pub mod handle_table;
pub mod invoke;
pub mod json;
pub mod marshal;
pub mod memory;
pub mod value;
pub mod version;
pub mod wasm_host_imports;
pub mod wasm_interop;
pub mod wasm_runner;

#[cfg(test)]
mod test_guest;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use env::GuestEnv;
pub use error::BridgeError;
pub use handle_table::{Handle, HandleTable};
pub use value::HostValue;
pub use wasm_runner::{run_guest, GuestInstance};
