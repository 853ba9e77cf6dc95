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

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Names and switches an embedder can override. Every field has a default,
/// so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Module name the guest imports bridge operations from.
    pub import_module: String,
    pub memory_export: String,
    pub alloc_export: String,
    pub dispatch_export: String,
    pub version_export: String,
    pub start_export: String,
    /// Keep console output in memory for `console_output()`.
    pub capture_console: bool,
    /// Also print console output to stdout/stderr.
    pub echo_console: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            import_module: "ark".to_string(),
            memory_export: "memory".to_string(),
            alloc_export: "ark_alloc".to_string(),
            dispatch_export: "ark_dispatch".to_string(),
            version_export: "ark_bridge_version".to_string(),
            start_export: "_start".to_string(),
            capture_console: true,
            echo_console: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig =
            serde_json::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))?;
        if config.import_module.is_empty() {
            return Err(BridgeError::Config("import_module must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}
