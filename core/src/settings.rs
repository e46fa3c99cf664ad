//! Debug settings loaded from a TOML file.
//!
//! ```toml
//! force_linear_images = true
//! command_buffer_size = 65536
//! max_poll_timeout_us = 2000
//! ```
//!
//! Every key is optional; missing keys keep the driver defaults.

use std::path::Path;

use serde::Deserialize;

use crate::error::SettingsError;

/// Driver knobs that tests and tools override.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugSettings {
    /// Never tile images.
    pub force_linear_images: bool,
    /// Allow virtual padding of images placed over small buffers.
    pub virtual_padding: bool,
    /// Usable bytes of each queue command buffer. `None` keeps the default.
    pub command_buffer_size: Option<usize>,
    /// Poll window used by infinite waits before logging a warning.
    pub max_poll_timeout_us: u64,
    /// Trace memory object transfers.
    pub log_memory_objects: bool,
    /// Cap on device memory handed out by the memory manager.
    pub device_memory_budget: Option<usize>,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            force_linear_images: false,
            virtual_padding: true,
            command_buffer_size: None,
            max_poll_timeout_us: 2_000_000,
            log_memory_objects: false,
            device_memory_budget: None,
        }
    }
}

impl DebugSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load settings, falling back to defaults if the file is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                log::info!("Loaded debug settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("No debug settings ({e}), using defaults");
                Self::default()
            }
        }
    }
}
