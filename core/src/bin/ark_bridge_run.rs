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

use ark_host_bridge::config::BridgeConfig;
use ark_host_bridge::error::BridgeError;
use ark_host_bridge::wasm_interop;
use ark_host_bridge::wasm_runner::GuestInstance;
use std::env;
use std::fs;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env("ARK_BRIDGE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &[String]) -> Result<(), BridgeError> {
    let manifest_only = args.iter().any(|a| a == "--manifest");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let path = positional[0];
    let bytes = fs::read(path)
        .map_err(|e| BridgeError::InvalidModule(format!("{}: {}", path, e)))?;
    let mut config = match positional.get(1) {
        Some(config_path) => BridgeConfig::load(config_path)?,
        None => BridgeConfig::default(),
    };

    if manifest_only {
        let manifest = wasm_interop::inspect(&bytes, &config)?;
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    // The console is printed below; echoing it as well would print it twice.
    config.echo_console = false;
    let mut guest = GuestInstance::new(&bytes, config)?;
    let outcome = guest.run_start();
    print!("{}", guest.console_output());
    if let Err(err) = outcome {
        if let Some(raised) = guest.take_exception() {
            eprintln!("Uncaught: {}", raised.to_display_string());
        }
        return Err(err);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().all(|a| a.starts_with("--")) {
        eprintln!("Usage: ark_bridge_run <guest.wasm> [config.json] [--manifest]");
        return ExitCode::from(2);
    }
    init_logging();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Bridge Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
