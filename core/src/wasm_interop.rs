/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * Guest Module Inspection for the Bridge.
 *
 * Reads a guest .wasm binary before instantiation (via wasmparser) and
 * reports which bridge operations it imports, whether each is one the host
 * provides, and which of the exports the bridge relies on are present.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::wasm_host_imports::BRIDGE_IMPORTS;
use serde::Serialize;
use std::collections::HashSet;
use wasmparser::{ExternalKind, Parser, Payload};

lazy_static::lazy_static! {
    /// Fast membership test over the import catalog.
    static ref CATALOG: HashSet<&'static str> = BRIDGE_IMPORTS.iter().copied().collect();
}

pub fn is_bridge_operation(name: &str) -> bool {
    CATALOG.contains(name)
}

// =============================================================================
// Manifest
// =============================================================================

/// What a guest module needs from the bridge and what it offers back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuestManifest {
    /// Names imported from the bridge module, in import order.
    pub bridge_imports: Vec<String>,
    /// `module::name` of every import from any other module.
    pub foreign_imports: Vec<String>,
    /// Exported function names.
    pub functions: Vec<String>,
    pub exports_memory: bool,
    pub exports_alloc: bool,
    pub exports_dispatch: bool,
    pub exports_version: bool,
    pub exports_start: bool,
}

impl GuestManifest {
    /// Bridge imports the host does not provide.
    pub fn unknown_imports(&self) -> Vec<&str> {
        self.bridge_imports
            .iter()
            .map(String::as_str)
            .filter(|name| !is_bridge_operation(name))
            .collect()
    }

    /// Fails on the first bridge import the host cannot satisfy.
    pub fn check(&self, config: &BridgeConfig) -> Result<(), BridgeError> {
        match self.unknown_imports().first() {
            Some(name) => Err(BridgeError::UnknownImport {
                module: config.import_module.clone(),
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }
}

pub fn inspect(bytes: &[u8], config: &BridgeConfig) -> Result<GuestManifest, BridgeError> {
    let mut manifest = GuestManifest::default();
    let invalid = |e: wasmparser::BinaryReaderError| BridgeError::InvalidModule(e.to_string());

    for payload in Parser::new(0).parse_all(bytes) {
        match payload.map_err(invalid)? {
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.map_err(invalid)?;
                    if import.module == config.import_module {
                        manifest.bridge_imports.push(import.name.to_string());
                    } else {
                        manifest
                            .foreign_imports
                            .push(format!("{}::{}", import.module, import.name));
                    }
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(invalid)?;
                    match export.kind {
                        ExternalKind::Memory if export.name == config.memory_export => {
                            manifest.exports_memory = true;
                        }
                        ExternalKind::Func => {
                            let name = export.name;
                            manifest.exports_alloc |= name == config.alloc_export;
                            manifest.exports_dispatch |= name == config.dispatch_export;
                            manifest.exports_version |= name == config.version_export;
                            manifest.exports_start |= name == config.start_export;
                            manifest.functions.push(name.to_string());
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(manifest)
}
