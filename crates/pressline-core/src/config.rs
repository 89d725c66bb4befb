// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatcher configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PresslineError, Result};

/// Tunables for a dispatcher instance.
///
/// Stored as JSON. Fields missing from the file take their default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How long a blocking query waits for the ledger before giving up.
    pub ask_timeout_ms: u64,
    /// Worker threads of the dispatcher's async runtime.
    pub runtime_threads: usize,
    /// Consecutive print faults before the worker stops starting jobs.
    pub fault_threshold: u32,
    /// Base pause after the fault threshold is reached.
    pub fault_cooldown_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            ask_timeout_ms: 1_000,
            runtime_threads: 2,
            fault_threshold: 3,
            fault_cooldown_ms: 30_000,
        }
    }
}

impl DispatchConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config = Self::from_json(&data)?;
        info!(path = %path.display(), "dispatch config loaded");
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        debug!(?config, "dispatch config parsed");
        Ok(config)
    }

    /// Write this config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.ask_timeout_ms == 0 {
            return Err(PresslineError::Config("ask_timeout_ms must be > 0".into()));
        }
        if self.runtime_threads == 0 {
            return Err(PresslineError::Config("runtime_threads must be > 0".into()));
        }
        if self.fault_threshold == 0 {
            return Err(PresslineError::Config("fault_threshold must be >= 1".into()));
        }
        Ok(())
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }

    pub fn fault_cooldown(&self) -> Duration {
        Duration::from_millis(self.fault_cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DispatchConfig::default();
        config.validate().expect("default config validates");
        assert_eq!(config.ask_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = DispatchConfig::from_json(r#"{ "fault_threshold": 5 }"#).expect("parse");
        assert_eq!(config.fault_threshold, 5);
        assert_eq!(config.ask_timeout_ms, 1_000);
        assert_eq!(config.runtime_threads, 2);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = DispatchConfig::from_json(r#"{ "ask_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, PresslineError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = DispatchConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, PresslineError::Serialization(_)));
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("dispatch.json");
        let config = DispatchConfig {
            fault_cooldown_ms: 250,
            ..Default::default()
        };
        config.save(&path).expect("save");

        let loaded = DispatchConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = DispatchConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PresslineError::Io(_)));
    }
}
