// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware config file resolution.

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// Default location of the harness config file.
///
/// On desktop this follows XDG. On mobile the host shell passes an explicit
/// path from its own sandbox instead.
pub fn default_config_path() -> PathBuf {
    config_base().join("reviewkit").join(CONFIG_FILE)
}

fn config_base() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    PathBuf::from(".")
}
