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

//! Host-callable proxies for guest functions, and their reclamation.
//!
//! A proxy is released either explicitly (`release_callback`) or when the
//! last host reference to it goes away. Explicit release notifies the guest
//! at once. Dropped proxies are queued and the queue is drained at fixed
//! points: after `dec_ref`, after `reset` and after every invocation. A proxy
//! kept alive by a host reference cycle is never dropped and never notified.

use crate::dispatch::Throw;
use crate::env::GuestEnv;
use crate::error::BridgeError;
use crate::handle_table::Handle;
use crate::value::{Function, FunctionKind, HostValue, Properties};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Value passed in the argv slot of the dispatcher to ask the guest to free
/// the closure data.
pub const FREE_SENTINEL: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRelease {
    pub table_index: u32,
    pub closure_data: i32,
}

type ReleaseQueue = Rc<RefCell<Vec<PendingRelease>>>;

#[derive(Debug)]
pub struct GuestCallback {
    table_index: u32,
    closure_data: i32,
    released: Cell<bool>,
    queue: Weak<RefCell<Vec<PendingRelease>>>,
}

impl GuestCallback {
    pub fn table_index(&self) -> u32 {
        self.table_index
    }

    pub fn closure_data(&self) -> i32 {
        self.closure_data
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Re-enters the guest dispatcher with the arguments packed into a fresh
    /// array handle. The handle the guest returns is consumed.
    pub fn invoke(&self, env: &mut dyn GuestEnv, args: &[HostValue]) -> Result<HostValue, Throw> {
        if self.released.get() {
            return Err(Throw::type_error(format!(
                "callback {} was released",
                self.table_index
            )));
        }
        trace!(
            target: "ark_host_bridge::callback",
            table_index = self.table_index,
            argc = args.len(),
            "enter guest"
        );
        let argv = env.bridge().register(HostValue::array(args.to_vec()));
        let outcome = env.dispatch(self.table_index, argv.to_wire(), self.closure_data);

        // The result is taken before argv goes: the guest may hand argv back.
        let result = match outcome {
            Ok(raw) => {
                let bridge = env.bridge();
                let handle = Handle::from_wire(raw);
                let value = bridge
                    .resolve(handle)
                    .map_err(|err| Throw::type_error(err.to_string()));
                if value.is_ok() {
                    bridge.release(handle);
                }
                value
            }
            Err(err) => {
                let raised = env.bridge().take_exception();
                Err(Throw(raised.unwrap_or_else(|| {
                    HostValue::error("Error", format!("callback {}: {}", self.table_index, err))
                })))
            }
        };
        env.bridge().release(argv);
        result
    }
}

impl Drop for GuestCallback {
    fn drop(&mut self) {
        if self.released.get() {
            return;
        }
        if let Some(queue) = self.queue.upgrade() {
            queue.borrow_mut().push(PendingRelease {
                table_index: self.table_index,
                closure_data: self.closure_data,
            });
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallbackStats {
    pub created: u64,
    pub released: u64,
    pub swept: u64,
}

/// Owns the release queue shared by every proxy this bridge created.
#[derive(Default)]
pub struct CallbackRegistry {
    queue: ReleaseQueue,
    stats: CallbackStats,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make(&mut self, table_index: u32, closure_data: i32) -> HostValue {
        self.stats.created += 1;
        debug!(target: "ark_host_bridge::callback", table_index, closure_data, "created");
        HostValue::Function(Rc::new(Function {
            name: format!("callback{}", table_index),
            kind: FunctionKind::Guest(GuestCallback {
                table_index,
                closure_data,
                released: Cell::new(false),
                queue: Rc::downgrade(&self.queue),
            }),
            intrinsic: None,
            properties: RefCell::new(Properties::new()),
        }))
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn stats(&self) -> CallbackStats {
        self.stats
    }

    fn take_pending(&mut self) -> Vec<PendingRelease> {
        let pending = std::mem::take(&mut *self.queue.borrow_mut());
        self.stats.swept += pending.len() as u64;
        pending
    }
}

/// Explicitly releases a proxy and notifies the guest. Returns false when the
/// value is not a live proxy.
pub fn release_callback(env: &mut dyn GuestEnv, value: &HostValue) -> Result<bool, BridgeError> {
    let HostValue::Function(function) = value else {
        return Ok(false);
    };
    let Some(callback) = function.as_callback() else {
        return Ok(false);
    };
    if callback.released.replace(true) {
        return Ok(false);
    }
    env.bridge().callbacks_mut().stats.released += 1;
    debug!(
        target: "ark_host_bridge::callback",
        table_index = callback.table_index,
        "released"
    );
    env.dispatch(callback.table_index, FREE_SENTINEL, callback.closure_data)?;
    Ok(true)
}

/// Notifies the guest about every queued proxy. Notifications may drop further
/// proxies; the loop runs until the queue stays empty. Guest failures are
/// logged and do not stop the sweep.
pub fn drain_releases(env: &mut dyn GuestEnv) {
    loop {
        let pending = env.bridge().callbacks_mut().take_pending();
        if pending.is_empty() {
            return;
        }
        for release in pending {
            trace!(
                target: "ark_host_bridge::callback",
                table_index = release.table_index,
                closure_data = release.closure_data,
                "sweep"
            );
            if let Err(err) = env.dispatch(release.table_index, FREE_SENTINEL, release.closure_data) {
                warn!(
                    target: "ark_host_bridge::callback",
                    table_index = release.table_index,
                    error = %err,
                    "guest failed to free closure"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch;
    use crate::test_guest::TestGuest;

    #[test]
    fn test_invoke_reenters_guest_with_argv() {
        let mut guest = TestGuest::new();
        let index = guest.define(|env, args| {
            let sum = args.iter().map(HostValue::to_number).sum::<f64>();
            Ok(env.bridge().register(HostValue::Double(sum)))
        });
        let proxy = guest.bridge().callbacks_mut().make(index, 7);
        let result = dispatch::call(
            &mut guest,
            &proxy,
            &HostValue::Undefined,
            &[HostValue::Int32(2), HostValue::Double(0.5)],
        )
        .unwrap();
        assert!(matches!(result, HostValue::Double(v) if v == 2.5));
        assert_eq!(guest.seen_closure_data(), vec![7]);
    }

    #[test]
    fn test_invoke_consumes_returned_handle() {
        let mut guest = TestGuest::new();
        let index = guest.define(|env, _args| Ok(env.bridge().register(HostValue::object())));
        let proxy = guest.bridge().callbacks_mut().make(index, 0);
        let before = guest.bridge().table().len();
        dispatch::call(&mut guest, &proxy, &HostValue::Undefined, &[]).unwrap();
        assert_eq!(guest.bridge().table().len(), before);
    }

    #[test]
    fn test_explicit_release_notifies_once() {
        let mut guest = TestGuest::new();
        let index = guest.define(|_env, _args| Ok(Handle::UNDEFINED));
        let proxy = guest.bridge().callbacks_mut().make(index, 11);
        assert!(release_callback(&mut guest, &proxy).unwrap());
        assert!(!release_callback(&mut guest, &proxy).unwrap());
        assert_eq!(guest.freed(), vec![(index, 11)]);

        let err = dispatch::call(&mut guest, &proxy, &HostValue::Undefined, &[]).unwrap_err();
        assert_eq!(
            err.value().to_display_string(),
            format!("TypeError: callback {} was released", index)
        );

        drop(proxy);
        drain_releases(&mut guest);
        assert_eq!(guest.freed().len(), 1);
    }

    #[test]
    fn test_dropped_proxy_is_swept() {
        let mut guest = TestGuest::new();
        let index = guest.define(|_env, _args| Ok(Handle::UNDEFINED));
        let proxy = guest.bridge().callbacks_mut().make(index, 3);
        drop(proxy);
        assert_eq!(guest.bridge().callbacks().pending(), 1);
        drain_releases(&mut guest);
        assert_eq!(guest.freed(), vec![(index, 3)]);
        assert_eq!(guest.bridge().callbacks().stats().swept, 1);
        assert_eq!(guest.bridge().callbacks().pending(), 0);
    }

    #[test]
    fn test_cycle_is_never_swept() {
        let mut guest = TestGuest::new();
        let index = guest.define(|_env, _args| Ok(Handle::UNDEFINED));
        let proxy = guest.bridge().callbacks_mut().make(index, 3);
        let holder = HostValue::object();
        dispatch::set_property(&holder, &dispatch::PropertyKey::from_name("f"), proxy.clone()).unwrap();
        if let HostValue::Function(f) = &proxy {
            f.properties.borrow_mut().insert("owner".to_string(), holder.clone());
        }
        drop(proxy);
        drop(holder);
        drain_releases(&mut guest);
        assert!(guest.freed().is_empty());
    }

    #[test]
    fn test_guest_trap_surfaces_raised_value() {
        let mut guest = TestGuest::new();
        let index = guest.define(|env, _args| {
            env.bridge().raise(HostValue::error("RangeError", "nope"));
            Err(BridgeError::Thrown("RangeError: nope".to_string()))
        });
        let proxy = guest.bridge().callbacks_mut().make(index, 0);
        let err = dispatch::call(&mut guest, &proxy, &HostValue::Undefined, &[]).unwrap_err();
        assert_eq!(err.value().to_display_string(), "RangeError: nope");
    }
}
