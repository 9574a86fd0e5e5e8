// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Review orchestration settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, Result};
use crate::StoreTarget;

/// Persistent orchestrator settings, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Store used for `openStoreListing`. `None` means "whatever the platform
    /// bridge reports".
    pub store_target: Option<StoreTarget>,
    /// Store identifier used when `openStoreListing` arrives without one.
    pub default_app_id: Option<String>,
    /// Internal retries for token fetch and flow invocation.
    pub max_retries: u32,
    /// Pause before a retry, in milliseconds.
    pub retry_delay_ms: u64,
    /// Warm the token cache whenever an availability check succeeds.
    pub prefetch_on_availability: bool,
    /// Method channel the orchestrator answers on. Calls addressed to any
    /// other channel are answered `notImplemented`.
    pub channel_name: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            store_target: None,
            default_app_id: None,
            max_retries: 1,
            retry_delay_ms: 250,
            prefetch_on_availability: false,
            channel_name: "dev.britannio.in_app_review".into(),
        }
    }
}

impl ReviewConfig {
    /// Load settings from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings back as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.channel_name.trim().is_empty() {
            return Err(ReviewError::Config("channel_name must not be empty".into()));
        }
        if let Some(app_id) = &self.default_app_id {
            if app_id.trim().is_empty() {
                return Err(ReviewError::Config(
                    "default_app_id must not be blank when set".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReviewConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.max_retries, 1);
        assert!(config.store_target.is_none());
        assert_eq!(config.channel_name, "dev.britannio.in_app_review");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");
        std::fs::write(
            &path,
            r#"{"store_target":"play_store","default_app_id":"com.example.app"}"#,
        )
        .unwrap();

        let config = ReviewConfig::load(&path).unwrap();
        assert_eq!(config.store_target, Some(StoreTarget::PlayStore));
        assert_eq!(config.default_app_id.as_deref(), Some("com.example.app"));
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn blank_channel_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");
        std::fs::write(&path, r#"{"channel_name":"  "}"#).unwrap();
        assert!(matches!(
            ReviewConfig::load(&path),
            Err(ReviewError::Config(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");
        let config = ReviewConfig {
            prefetch_on_availability: true,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert!(ReviewConfig::load(&path).unwrap().prefetch_on_availability);
    }
}
