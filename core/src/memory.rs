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

//! Typed views over the guest's linear memory.
//!
//! The guest may grow its memory at any point, including in the middle of a
//! host call chain, and growth can move the backing buffer. `MemoryViews`
//! remembers the identity (base address and length) of the buffer its views
//! were built for and rebuilds them whenever the buffer it is handed differs.
//! The guest's growth notification only forces the next check to rebuild; it
//! is never trusted on its own.

use crate::error::BridgeError;
use tracing::debug;

pub const WASM_PAGE_SIZE: usize = 65_536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferIdentity {
    base: usize,
    len: usize,
}

impl BufferIdentity {
    fn of(memory: &[u8]) -> Self {
        BufferIdentity {
            base: memory.as_ptr() as usize,
            len: memory.len(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryViews {
    identity: Option<BufferIdentity>,
    rebuilds: u64,
    growth_notices: u64,
}

impl MemoryViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read views over `memory`, rebuilt first if the buffer changed.
    pub fn ensure_fresh<'m>(&mut self, memory: &'m [u8]) -> GuestView<'m> {
        self.revalidate(BufferIdentity::of(memory));
        GuestView { bytes: memory }
    }

    /// Write views over `memory`, rebuilt first if the buffer changed.
    pub fn ensure_fresh_mut<'m>(&mut self, memory: &'m mut [u8]) -> GuestViewMut<'m> {
        self.revalidate(BufferIdentity::of(memory));
        GuestViewMut { bytes: memory }
    }

    /// Growth notification from the guest. The page count is only logged.
    pub fn notify_growth(&mut self, pages: u32) {
        self.growth_notices += 1;
        self.identity = None;
        debug!(target: "ark_host_bridge::memory", pages, "guest memory grew");
    }

    /// Number of times the views were (re)built.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn growth_notices(&self) -> u64 {
        self.growth_notices
    }

    /// Byte length of the buffer the current views cover.
    pub fn byte_len(&self) -> Option<usize> {
        self.identity.map(|identity| identity.len)
    }

    fn revalidate(&mut self, current: BufferIdentity) {
        if self.identity == Some(current) {
            return;
        }
        if let Some(previous) = self.identity {
            debug!(
                target: "ark_host_bridge::memory",
                old_len = previous.len,
                new_len = current.len,
                "guest buffer changed, rebuilding views"
            );
        }
        self.identity = Some(current);
        self.rebuilds += 1;
    }
}

fn span(memory_len: usize, ptr: u32, len: u32) -> Result<std::ops::Range<usize>, BridgeError> {
    let start = ptr as usize;
    start
        .checked_add(len as usize)
        .filter(|end| *end <= memory_len)
        .map(|end| start..end)
        .ok_or(BridgeError::OutOfBounds {
            ptr,
            len,
            memory_len,
        })
}

/// `span` for a host-side length, which may not fit the 32-bit address space.
fn byte_span(memory_len: usize, ptr: u32, len: usize) -> Result<std::ops::Range<usize>, BridgeError> {
    let len = u32::try_from(len).map_err(|_| BridgeError::OutOfBounds {
        ptr,
        len: u32::MAX,
        memory_len,
    })?;
    span(memory_len, ptr, len)
}

macro_rules! typed_reads {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&self, ptr: u32) -> Result<$ty, BridgeError> {
                let raw = self.bytes(ptr, std::mem::size_of::<$ty>() as u32)?;
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(raw);
                Ok(<$ty>::from_le_bytes(buf))
            }
        )*
    };
}

macro_rules! typed_writes {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, ptr: u32, value: $ty) -> Result<(), BridgeError> {
                self.write_bytes(ptr, &value.to_le_bytes())
            }
        )*
    };
}

/// Bounds-checked read access to guest memory. Little-endian, like the guest.
pub struct GuestView<'m> {
    bytes: &'m [u8],
}

impl<'m> GuestView<'m> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self, ptr: u32, len: u32) -> Result<&'m [u8], BridgeError> {
        let bytes: &'m [u8] = self.bytes;
        let range = span(bytes.len(), ptr, len)?;
        Ok(&bytes[range])
    }

    typed_reads! {
        i8_at => i8,
        u8_at => u8,
        i16_at => i16,
        u16_at => u16,
        i32_at => i32,
        u32_at => u32,
        f32_at => f32,
        f64_at => f64,
    }

    /// `len` bytes of 8-bit text. Invalid sequences decode to U+FFFD.
    pub fn utf8(&self, ptr: u32, len: u32) -> Result<String, BridgeError> {
        Ok(String::from_utf8_lossy(self.bytes(ptr, len)?).into_owned())
    }

    /// `len` 16-bit code units. Unpaired surrogates decode to U+FFFD.
    pub fn utf16(&self, ptr: u32, len: u32) -> Result<String, BridgeError> {
        let byte_len = len.checked_mul(2).ok_or(BridgeError::OutOfBounds {
            ptr,
            len,
            memory_len: self.bytes.len(),
        })?;
        let units: Vec<u16> = self
            .bytes(ptr, byte_len)?
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    /// NUL-terminated 8-bit text starting at `ptr`.
    pub fn c_str(&self, ptr: u32) -> Result<String, BridgeError> {
        let bytes: &'m [u8] = self.bytes;
        let tail = bytes.get(ptr as usize..).ok_or(BridgeError::OutOfBounds {
            ptr,
            len: 0,
            memory_len: bytes.len(),
        })?;
        let end = tail
            .iter()
            .position(|b| *b == 0)
            .ok_or(BridgeError::OutOfBounds {
                ptr,
                len: tail.len() as u32,
                memory_len: self.bytes.len(),
            })?;
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }
}

/// Bounds-checked write access to guest memory.
pub struct GuestViewMut<'m> {
    bytes: &'m mut [u8],
}

impl<'m> GuestViewMut<'m> {
    pub fn write_bytes(&mut self, ptr: u32, data: &[u8]) -> Result<(), BridgeError> {
        let range = byte_span(self.bytes.len(), ptr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn write_utf16(&mut self, ptr: u32, units: &[u16]) -> Result<(), BridgeError> {
        let data: Vec<u8> = units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
        self.write_bytes(ptr, &data)
    }

    typed_writes! {
        set_i8 => i8,
        set_u8 => u8,
        set_i16 => i16,
        set_u16 => u16,
        set_i32 => i32,
        set_u32 => u32,
        set_f32 => f32,
        set_f64 => f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_rebuild_only_on_buffer_change() {
        let mut views = MemoryViews::new();
        let memory = vec![0u8; WASM_PAGE_SIZE];
        views.ensure_fresh(&memory);
        views.ensure_fresh(&memory);
        assert_eq!(views.rebuilds(), 1);

        let grown = vec![0u8; 2 * WASM_PAGE_SIZE];
        views.ensure_fresh(&grown);
        assert_eq!(views.rebuilds(), 2);
        assert_eq!(views.byte_len(), Some(2 * WASM_PAGE_SIZE));
    }

    #[test]
    fn test_growth_notice_forces_rebuild() {
        let mut views = MemoryViews::new();
        let memory = vec![0u8; 64];
        views.ensure_fresh(&memory);
        views.notify_growth(2);
        views.ensure_fresh(&memory);
        assert_eq!(views.rebuilds(), 2);
        assert_eq!(views.growth_notices(), 1);
    }

    #[test]
    fn test_typed_round_trip() {
        let mut views = MemoryViews::new();
        let mut memory = vec![0u8; 64];
        {
            let mut view = views.ensure_fresh_mut(&mut memory);
            view.set_i32(0, -2).unwrap();
            view.set_u16(4, 0xBEEF).unwrap();
            view.set_f64(8, 2.5).unwrap();
            view.set_i8(16, -1).unwrap();
        }
        let view = views.ensure_fresh(&memory);
        assert_eq!(view.i32_at(0).unwrap(), -2);
        assert_eq!(view.u32_at(0).unwrap(), u32::MAX - 1);
        assert_eq!(view.u16_at(4).unwrap(), 0xBEEF);
        assert_eq!(view.f64_at(8).unwrap(), 2.5);
        assert_eq!(view.u8_at(16).unwrap(), 0xFF);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut views = MemoryViews::new();
        let memory = vec![1u8; 8];
        let view = views.ensure_fresh(&memory);
        assert!(matches!(
            view.bytes(6, 4),
            Err(BridgeError::OutOfBounds { ptr: 6, len: 4, .. })
        ));
        assert!(view.u32_at(u32::MAX).is_err());
        assert!(view.c_str(0).is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_write_length_beyond_u32_is_out_of_bounds() {
        let too_long = u32::MAX as usize + 1;
        assert!(matches!(
            byte_span(64, 0, too_long),
            Err(BridgeError::OutOfBounds { ptr: 0, len: u32::MAX, memory_len: 64 })
        ));
        assert_eq!(byte_span(64, 8, 4).unwrap(), 8..12);
    }

    #[test]
    fn test_text_decoding() {
        let mut views = MemoryViews::new();
        let mut memory = vec![0u8; 32];
        {
            let mut view = views.ensure_fresh_mut(&mut memory);
            view.write_bytes(0, b"hi\0").unwrap();
            let units: Vec<u16> = "é𝄞".encode_utf16().collect();
            view.write_utf16(8, &units).unwrap();
        }
        let view = views.ensure_fresh(&memory);
        assert_eq!(view.c_str(0).unwrap(), "hi");
        assert_eq!(view.utf8(0, 2).unwrap(), "hi");
        assert_eq!(view.utf16(8, 3).unwrap(), "é𝄞");
    }
}
