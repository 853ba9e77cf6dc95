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

use crate::bridge::Bridge;
use crate::error::BridgeError;

/// Everything the bridge needs from the guest side.
///
/// Implemented for wasmtime's `Caller` (inside a host import) and `Store`
/// (for host-initiated calls). All calls are synchronous; `dispatch` may
/// re-enter the bridge through further imports before it returns.
pub trait GuestEnv {
    fn bridge(&mut self) -> &mut Bridge;

    /// The guest's linear memory together with the bridge state.
    fn memory_and_bridge(&mut self) -> Result<(&mut [u8], &mut Bridge), BridgeError>;

    /// Calls the guest allocator. A null result is returned as `Ok(0)`.
    fn alloc(&mut self, size: u32) -> Result<u32, BridgeError>;

    /// Calls the guest dispatcher with `(table_index, argv, closure_data)`.
    fn dispatch(&mut self, table_index: u32, argv: i32, closure_data: i32)
        -> Result<i32, BridgeError>;

    /// The guest's encoded protocol version, if it exports one.
    fn guest_version(&mut self) -> Result<Option<i32>, BridgeError>;
}
