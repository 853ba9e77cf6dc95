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

use crate::value::{HostValue, ValueKey};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{error, trace};

/// Opaque guest-visible identifier for one host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const NULL: Handle = Handle(0);
    pub const UNDEFINED: Handle = Handle(1);
    pub const FALSE: Handle = Handle(2);
    pub const TRUE: Handle = Handle(3);
    pub const GLOBAL: Handle = Handle(4);
    pub const CONSOLE: Handle = Handle(5);
    pub const MARKER: Handle = Handle(6);

    /// Highest reserved handle.
    pub const LAST_RESERVED: u32 = 6;

    pub const fn new(raw: u32) -> Self {
        Handle(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn from_wire(wire: i32) -> Self {
        Handle(wire as u32)
    }

    pub const fn to_wire(self) -> i32 {
        self.0 as i32
    }

    pub const fn is_reserved(self) -> bool {
        self.0 <= Self::LAST_RESERVED
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    value: HostValue,
    refcount: u32,
}

/// Reference-counted bidirectional registry between handles and host values.
///
/// Handles are allocated from a counter that never goes backwards, so an
/// evicted number is never handed out again, not even after `reset`.
/// `dec_ref` does not know about the reserved range; callers guard it.
///
/// Once the counter reaches `u32::MAX` (which would be -1 on the wire) the
/// table is exhausted: `add` logs and answers `Handle::UNDEFINED` for new
/// values. Reference counts saturate, and an entry pinned at `u32::MAX`
/// stays bound until `reset`.
pub struct HandleTable {
    entries: BTreeMap<Handle, Entry>,
    reverse: HashMap<ValueKey, Handle>,
    next: u32,
}

impl HandleTable {
    /// Builds a table with the seven reserved singletons bound.
    pub fn with_reserved(global: HostValue, console: HostValue, marker: HostValue) -> Self {
        let mut table = HandleTable {
            entries: BTreeMap::new(),
            reverse: HashMap::new(),
            next: Handle::LAST_RESERVED + 1,
        };
        let reserved = [
            (Handle::NULL, HostValue::Null),
            (Handle::UNDEFINED, HostValue::Undefined),
            (Handle::FALSE, HostValue::Bool(false)),
            (Handle::TRUE, HostValue::Bool(true)),
            (Handle::GLOBAL, global),
            (Handle::CONSOLE, console),
            (Handle::MARKER, marker),
        ];
        for (handle, value) in reserved {
            table.reverse.insert(value.key(), handle);
            table.entries.insert(handle, Entry { value, refcount: 1 });
        }
        table
    }

    /// Returns the existing handle for `value` (bumping its count) or binds a new one.
    pub fn add(&mut self, value: HostValue) -> Handle {
        let key = value.key();
        if let Some(&handle) = self.reverse.get(&key) {
            if !handle.is_reserved() {
                if let Some(entry) = self.entries.get_mut(&handle) {
                    entry.refcount = entry.refcount.saturating_add(1);
                }
            }
            return handle;
        }
        let Some(following) = self.next.checked_add(1) else {
            error!(target: "ark_host_bridge::table", kind = value.kind_name(), "handle space exhausted");
            return Handle::UNDEFINED;
        };
        let handle = Handle(self.next);
        self.next = following;
        trace!(target: "ark_host_bridge::table", handle = handle.raw(), kind = value.kind_name(), "bind");
        self.reverse.insert(key, handle);
        self.entries.insert(handle, Entry { value, refcount: 1 });
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&HostValue> {
        self.entries.get(&handle).map(|entry| &entry.value)
    }

    pub fn refcount(&self, handle: Handle) -> Option<u32> {
        self.entries.get(&handle).map(|entry| entry.refcount)
    }

    /// Returns false when the handle is not live.
    pub fn inc_ref(&mut self, handle: Handle) -> bool {
        match self.entries.get_mut(&handle) {
            Some(entry) => {
                entry.refcount = entry.refcount.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Drops one reference; returns true when this evicted the entry.
    pub fn dec_ref(&mut self, handle: Handle) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount > 0 {
            return false;
        }
        if let Some(entry) = self.entries.remove(&handle) {
            self.reverse.remove(&entry.value.key());
            trace!(target: "ark_host_bridge::table", handle = handle.raw(), "evict");
        }
        true
    }

    /// Evicts every entry above the reserved range. Returns how many were evicted.
    pub fn reset(&mut self) -> usize {
        let evicted = self.entries.split_off(&Handle(Handle::LAST_RESERVED + 1));
        self.reverse.retain(|_, handle| handle.is_reserved());
        evicted.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The handle the next genuinely new value will receive.
    pub fn next_handle(&self) -> Handle {
        Handle(self.next)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &HostValue, u32)> + '_ {
        self.entries
            .iter()
            .map(|(handle, entry)| (*handle, &entry.value, entry.refcount))
    }
}
