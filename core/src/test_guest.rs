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

//! An in-process guest for unit tests: a `Vec<u8>` linear memory, a bump
//! allocator and a function table of Rust closures.

use crate::bridge::Bridge;
use crate::callback::FREE_SENTINEL;
use crate::env::GuestEnv;
use crate::error::BridgeError;
use crate::handle_table::Handle;
use crate::memory::WASM_PAGE_SIZE;
use crate::value::HostValue;
use std::rc::Rc;

type GuestFn = Rc<dyn Fn(&mut TestGuest, i32) -> Result<Handle, BridgeError>>;

const HEAP_BASE: u32 = 1024;

pub struct TestGuest {
    bridge: Bridge,
    memory: Vec<u8>,
    heap: u32,
    version: Option<i32>,
    null_allocator: bool,
    null_on_empty: bool,
    functions: Vec<GuestFn>,
    freed: Vec<(u32, i32)>,
    seen: Vec<i32>,
}

impl TestGuest {
    pub fn new() -> Self {
        TestGuest {
            bridge: Bridge::default(),
            memory: vec![0; WASM_PAGE_SIZE],
            heap: HEAP_BASE,
            version: None,
            null_allocator: false,
            null_on_empty: false,
            functions: Vec::new(),
            freed: Vec::new(),
            seen: Vec::new(),
        }
    }

    pub fn with_version(mut self, encoded: i32) -> Self {
        self.version = Some(encoded);
        self
    }

    pub fn with_null_allocator(mut self) -> Self {
        self.null_allocator = true;
        self
    }

    /// `alloc(0)` returns null, as a C `malloc(0)` may.
    pub fn with_null_on_empty(mut self) -> Self {
        self.null_on_empty = true;
        self
    }

    /// Adds a guest function and returns its table index. The closure gets
    /// the unpacked argument array and returns the result handle.
    pub fn define<F>(&mut self, f: F) -> u32
    where
        F: Fn(&mut TestGuest, &[HostValue]) -> Result<Handle, BridgeError> + 'static,
    {
        self.define_raw(move |guest, argv| {
            let args = match guest.bridge.resolve(Handle::from_wire(argv))? {
                HostValue::Array(elements) => elements.borrow().clone(),
                _ => Vec::new(),
            };
            f(guest, &args)
        })
    }

    /// Like `define`, but the closure sees the argv handle itself.
    pub fn define_raw<F>(&mut self, f: F) -> u32
    where
        F: Fn(&mut TestGuest, i32) -> Result<Handle, BridgeError> + 'static,
    {
        self.functions.push(Rc::new(f));
        (self.functions.len() - 1) as u32
    }

    pub fn freed(&self) -> Vec<(u32, i32)> {
        self.freed.clone()
    }

    pub fn seen_closure_data(&self) -> Vec<i32> {
        self.seen.clone()
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn write(&mut self, ptr: u32, data: &[u8]) {
        let start = ptr as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    /// Grows memory by `pages`, moving it to a new buffer, and sends the
    /// growth notification the way a compiled guest would.
    pub fn grow(&mut self, pages: u32) {
        let mut grown = vec![0; self.memory.len() + pages as usize * WASM_PAGE_SIZE];
        grown[..self.memory.len()].copy_from_slice(&self.memory);
        self.memory = grown;
        let total = (self.memory.len() / WASM_PAGE_SIZE) as u32;
        self.bridge.views_mut().notify_growth(total);
    }
}

impl GuestEnv for TestGuest {
    fn bridge(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    fn memory_and_bridge(&mut self) -> Result<(&mut [u8], &mut Bridge), BridgeError> {
        Ok((self.memory.as_mut_slice(), &mut self.bridge))
    }

    fn alloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        if self.null_allocator || (self.null_on_empty && size == 0) {
            return Ok(0);
        }
        let ptr = (self.heap + 7) & !7;
        let end = ptr as usize + size as usize;
        if end > self.memory.len() {
            let missing = end - self.memory.len();
            self.grow(missing.div_ceil(WASM_PAGE_SIZE) as u32);
        }
        self.heap = end as u32;
        Ok(ptr)
    }

    fn dispatch(&mut self, table_index: u32, argv: i32, closure_data: i32) -> Result<i32, BridgeError> {
        if argv == FREE_SENTINEL {
            self.freed.push((table_index, closure_data));
            return Ok(0);
        }
        self.seen.push(closure_data);
        let function = self
            .functions
            .get(table_index as usize)
            .cloned()
            .ok_or_else(|| BridgeError::GuestTrap(format!("no function at {}", table_index)))?;
        function(self, argv).map(Handle::to_wire)
    }

    fn guest_version(&mut self) -> Result<Option<i32>, BridgeError> {
        Ok(self.version)
    }
}
