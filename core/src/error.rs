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

use crate::handle_table::Handle;
use thiserror::Error;

/// Failures that leave the bridge itself. Host dispatch failures are not
/// represented here: they are thrown host values, normalized into error
/// handles by the invocation layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("stale handle {0}")]
    StaleHandle(Handle),
    #[error("guest allocator export '{0}' is not available")]
    AllocatorMissing(String),
    #[error("guest allocator returned null for {size} bytes")]
    AllocationFailure { size: u32 },
    #[error("guest memory access out of bounds: {len} bytes at {ptr} (memory is {memory_len} bytes)")]
    OutOfBounds {
        ptr: u32,
        len: u32,
        memory_len: usize,
    },
    #[error("guest memory is not available")]
    MemoryMissing,
    #[error("guest export '{0}' not found")]
    MissingExport(String),
    #[error("guest dispatcher export '{0}' is not available")]
    DispatcherMissing(String),
    #[error("uncaught host exception: {0}")]
    Thrown(String),
    #[error("guest trapped: {0}")]
    GuestTrap(String),
    #[error("failed to compile guest module: {0}")]
    Compile(String),
    #[error("failed to link bridge import '{name}': {message}")]
    Link { name: String, message: String },
    #[error("failed to instantiate guest module: {0}")]
    Instantiate(String),
    #[error("guest imports unknown bridge operation '{module}::{name}'")]
    UnknownImport { module: String, name: String },
    #[error("invalid guest module: {0}")]
    InvalidModule(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Json(err.to_string())
    }
}
