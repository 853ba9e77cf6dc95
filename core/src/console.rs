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

use crate::value::{HostValue, Properties};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    pub const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
        ConsoleLevel::Debug,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub text: String,
}

/// The default log sink bound at handle 5.
#[derive(Clone)]
pub struct Console {
    lines: Rc<RefCell<Vec<ConsoleLine>>>,
    capture: bool,
    echo: bool,
}

impl Console {
    pub fn new(capture: bool, echo: bool) -> Self {
        Console {
            lines: Rc::new(RefCell::new(Vec::new())),
            capture,
            echo,
        }
    }

    pub fn write(&self, level: ConsoleLevel, args: &[HostValue]) {
        let text = args
            .iter()
            .map(HostValue::to_display_string)
            .collect::<Vec<_>>()
            .join(" ");
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => {
                info!(target: "ark_host_bridge::console", level = %level, "{}", text)
            }
            ConsoleLevel::Warn => warn!(target: "ark_host_bridge::console", "{}", text),
            ConsoleLevel::Error => error!(target: "ark_host_bridge::console", "{}", text),
            ConsoleLevel::Debug => debug!(target: "ark_host_bridge::console", "{}", text),
        }
        if self.echo {
            match level {
                ConsoleLevel::Warn | ConsoleLevel::Error => eprintln!("{}", text),
                _ => println!("{}", text),
            }
        }
        if self.capture {
            self.lines.borrow_mut().push(ConsoleLine { level, text });
        }
    }

    pub fn lines(&self) -> Vec<ConsoleLine> {
        self.lines.borrow().clone()
    }

    /// Captured output, one line per call, without level prefixes.
    pub fn output(&self) -> String {
        self.lines
            .borrow()
            .iter()
            .map(|line| format!("{}\n", line.text))
            .collect()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }

    /// Builds the host object whose methods write to this console.
    pub fn host_object(&self) -> HostValue {
        let mut methods = Properties::new();
        for level in ConsoleLevel::ALL {
            let sink = self.clone();
            methods.insert(
                level.method_name().to_string(),
                HostValue::native_function(level.method_name(), move |_env, _this, args| {
                    sink.write(level, args);
                    Ok(HostValue::Undefined)
                }),
            );
        }
        HostValue::object_from(methods)
    }
}
