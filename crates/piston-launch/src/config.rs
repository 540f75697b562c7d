//! Launcher settings
//!
//! Global launch defaults, stored as a JSON file. Every field has a default so
//! files written by older versions keep loading after new fields are added.

use crate::game::launcher::traits::Settings;
use crate::game::launcher::types::MemoryBounds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct LauncherSettings {
    pub default_min_memory_mb: u32,
    pub default_max_memory_mb: u32,
    /// `None` resolves `java` from PATH at launch time
    pub default_java_path: Option<PathBuf>,
    pub enable_automated_diagnostics: bool,
    pub error_detection_window_secs: u64,
    pub stop_grace_period_secs: u64,
    pub launcher_name: String,
    pub launcher_version: String,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            default_min_memory_mb: 2048,
            default_max_memory_mb: 4096,
            default_java_path: None,
            enable_automated_diagnostics: true,
            error_detection_window_secs: 600,
            stop_grace_period_secs: 5,
            launcher_name: "VestaLauncher".to_string(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LauncherSettings {
    /// Load settings from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("[config] {:?} not found; using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read settings {:?}", path))
            }
        };

        serde_json::from_str(&raw).with_context(|| format!("Invalid settings file {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings {:?}", path))
    }
}

impl Settings for LauncherSettings {
    fn default_memory(&self) -> MemoryBounds {
        MemoryBounds::new(self.default_min_memory_mb, self.default_max_memory_mb)
    }

    fn default_java_path(&self) -> Option<PathBuf> {
        self.default_java_path.clone()
    }

    fn automated_diagnostics_enabled(&self) -> bool {
        self.enable_automated_diagnostics
    }

    fn error_detection_window(&self) -> Duration {
        Duration::from_secs(self.error_detection_window_secs)
    }

    fn stop_grace_period(&self) -> Duration {
        Duration::from_secs(self.stop_grace_period_secs)
    }

    fn launcher_name(&self) -> String {
        self.launcher_name.clone()
    }

    fn launcher_version(&self) -> String {
        self.launcher_version.clone()
    }
}
