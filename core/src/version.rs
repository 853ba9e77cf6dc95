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

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Version of the bridge ABI this host implements.
pub const HOST_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        ProtocolVersion {
            major,
            minor,
            patch,
        }
    }

    /// `major * 1_000_000 + minor * 1_000 + patch`
    pub fn encode(self) -> i32 {
        (self.major * 1_000_000 + self.minor * 1_000 + self.patch) as i32
    }

    pub fn decode(encoded: i32) -> Self {
        let encoded = encoded.max(0) as u32;
        ProtocolVersion {
            major: encoded / 1_000_000,
            minor: encoded / 1_000 % 1_000,
            patch: encoded % 1_000,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Outcome of comparing the guest's reported version with ours. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Match(ProtocolVersion),
    Mismatch {
        host: ProtocolVersion,
        guest: ProtocolVersion,
    },
    Missing {
        host: ProtocolVersion,
    },
}

impl Handshake {
    pub fn is_match(&self) -> bool {
        matches!(self, Handshake::Match(_))
    }
}

pub fn handshake(host: ProtocolVersion, guest: Option<i32>) -> Handshake {
    match guest.map(ProtocolVersion::decode) {
        Some(guest) if guest == host => {
            debug!(target: "ark_host_bridge::version", version = %host, "protocol versions match");
            Handshake::Match(host)
        }
        Some(guest) => {
            warn!(
                target: "ark_host_bridge::version",
                host = %host,
                guest = %guest,
                "protocol version mismatch, continuing"
            );
            Handshake::Mismatch { host, guest }
        }
        None => {
            warn!(
                target: "ark_host_bridge::version",
                host = %host,
                "guest does not report a protocol version"
            );
            Handshake::Missing { host }
        }
    }
}
