//! User settings
//!
//! Persisted as JSON next to the plugin. Missing files and missing fields
//! fall back to defaults so older settings files keep loading.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Groups of hooks that can be switched on and off together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookCategory {
    /// Hooks on the resource loading path
    ResourceHooks,
    /// Hooks on game object creation and destruction
    ObjectHooks,
    /// Hooks on metadata (equipment parameters, racial deformers, ...)
    MetaHooks,
}

/// Per-category hook switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSettings {
    /// Enable [`HookCategory::ResourceHooks`]
    pub resource_hooks: bool,
    /// Enable [`HookCategory::ObjectHooks`]
    pub object_hooks: bool,
    /// Enable [`HookCategory::MetaHooks`]
    pub meta_hooks: bool,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            resource_hooks: true,
            object_hooks: true,
            meta_hooks: true,
        }
    }
}

impl HookSettings {
    /// Whether hooks of `category` should be active
    pub fn is_enabled(&self, category: HookCategory) -> bool {
        match category {
            HookCategory::ResourceHooks => self.resource_hooks,
            HookCategory::ObjectHooks => self.object_hooks,
            HookCategory::MetaHooks => self.meta_hooks,
        }
    }

    /// Switch a category on or off
    pub fn set_enabled(&mut self, category: HookCategory, enabled: bool) {
        match category {
            HookCategory::ResourceHooks => self.resource_hooks = enabled,
            HookCategory::ObjectHooks => self.object_hooks = enabled,
            HookCategory::MetaHooks => self.meta_hooks = enabled,
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Show internal resources and native addresses
    pub debug_mode: bool,
    /// Which hook categories are installed enabled
    pub hooks: HookSettings,
}

impl Settings {
    /// Load settings from `path`, using defaults if the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write settings to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
