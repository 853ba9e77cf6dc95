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

//! Per-instance bridge state: the handle table, the memory views, the
//! callback registry, the console and the pending exception slot.

use crate::callback::CallbackRegistry;
use crate::config::BridgeConfig;
use crate::console::Console;
use crate::env::GuestEnv;
use crate::error::BridgeError;
use crate::globals;
use crate::handle_table::{Handle, HandleTable};
use crate::memory::MemoryViews;
use crate::value::HostValue;
use crate::version::{self, Handshake, HOST_PROTOCOL_VERSION};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

const PREVIEW_LIMIT: usize = 40;

pub struct Bridge {
    table: HandleTable,
    views: MemoryViews,
    callbacks: CallbackRegistry,
    console: Console,
    config: BridgeConfig,
    pending_exception: Option<HostValue>,
    handshake: Option<Handshake>,
    initialized: bool,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let console = Console::new(config.capture_console, config.echo_console);
        let console_object = console.host_object();
        let global = globals::global_object(console_object.clone());
        Bridge {
            table: HandleTable::with_reserved(global, console_object, HostValue::object()),
            views: MemoryViews::new(),
            callbacks: CallbackRegistry::new(),
            console,
            config,
            pending_exception: None,
            handshake: None,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn table(&self) -> &HandleTable {
        &self.table
    }

    pub fn views(&self) -> &MemoryViews {
        &self.views
    }

    pub fn views_mut(&mut self) -> &mut MemoryViews {
        &mut self.views
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn handshake(&self) -> Option<Handshake> {
        self.handshake
    }

    pub fn register(&mut self, value: HostValue) -> Handle {
        self.table.add(value)
    }

    pub fn value(&self, handle: Handle) -> Result<&HostValue, BridgeError> {
        self.table.get(handle).ok_or(BridgeError::StaleHandle(handle))
    }

    pub fn resolve(&self, handle: Handle) -> Result<HostValue, BridgeError> {
        self.value(handle).cloned()
    }

    /// Drops one reference. Reserved handles are never released.
    pub fn release(&mut self, handle: Handle) -> bool {
        if handle.is_reserved() {
            return false;
        }
        self.table.dec_ref(handle)
    }

    pub fn retain(&mut self, handle: Handle) -> Result<(), BridgeError> {
        if handle.is_reserved() || self.table.inc_ref(handle) {
            Ok(())
        } else {
            Err(BridgeError::StaleHandle(handle))
        }
    }

    /// Evicts every non-reserved entry and forgets any pending exception.
    pub fn reset(&mut self) -> usize {
        self.pending_exception = None;
        let evicted = self.table.reset();
        info!(target: "ark_host_bridge::table", evicted, "reset");
        evicted
    }

    pub fn global(&self) -> HostValue {
        self.table.get(Handle::GLOBAL).cloned().unwrap_or(HostValue::Undefined)
    }

    /// Stores the value a guest `throw` is about to trap with.
    pub fn raise(&mut self, value: HostValue) {
        self.pending_exception = Some(value);
    }

    pub fn take_exception(&mut self) -> Option<HostValue> {
        self.pending_exception.take()
    }

    pub fn pending_exception(&self) -> Option<&HostValue> {
        self.pending_exception.as_ref()
    }

    pub fn dump(&self) -> Vec<DumpEntry> {
        self.table
            .iter()
            .map(|(handle, value, refcount)| DumpEntry::new(handle, value, refcount))
            .collect()
    }

    pub fn dump_report(&self) -> String {
        self.dump()
            .iter()
            .map(DumpEntry::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

/// Marks the bridge initialized and runs the version handshake once.
pub fn initialize(env: &mut dyn GuestEnv) -> Result<Handshake, BridgeError> {
    if let Some(handshake) = env.bridge().handshake {
        env.bridge().initialized = true;
        return Ok(handshake);
    }
    let guest = env.guest_version()?;
    let bridge = env.bridge();
    let handshake = version::handshake(HOST_PROTOCOL_VERSION, guest);
    bridge.handshake = Some(handshake);
    bridge.initialized = true;
    debug!(target: "ark_host_bridge::version", ?handshake, "bridge initialized");
    Ok(handshake)
}

/// One row of the diagnostic table dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpEntry {
    pub handle: u32,
    pub refcount: u32,
    pub kind: &'static str,
    pub preview: String,
}

impl DumpEntry {
    fn new(handle: Handle, value: &HostValue, refcount: u32) -> Self {
        let preview = match value {
            HostValue::Null | HostValue::Undefined => String::new(),
            HostValue::String(s) => format!("{:?}", truncate(s)),
            other => truncate(&other.to_display_string()),
        };
        DumpEntry {
            handle: handle.raw(),
            refcount,
            kind: value.kind_name(),
            preview,
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= PREVIEW_LIMIT {
        return text.to_string();
    }
    let mut short: String = text.chars().take(PREVIEW_LIMIT).collect();
    short.push_str("...");
    short
}

impl fmt::Display for DumpEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} rc={} {}", self.handle, self.refcount, self.kind)?;
        if !self.preview.is_empty() {
            write!(f, " {}", self.preview)?;
        }
        Ok(())
    }
}
