//! On-disk configuration for fabric_sync tools

use crate::codec::{ResourceDescriptor, TypeRegistry};
use crate::model::TenantId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name used under the user config directory
pub const CONFIG_FILE: &str = "fabric_sync.json";

/// Configuration shared by the CLI and embedders
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Resource types registered on top of the builtin catalog
    #[serde(default)]
    pub types: Vec<ResourceDescriptor>,
    /// Snapshot used when a command is not given one explicitly
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Tenants served by default; empty means every tenant
    #[serde(default)]
    pub served_tenants: Vec<TenantId>,
    /// Log filter used when `RUST_LOG` is unset (e.g. "fabric_sync=debug")
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl FabricConfig {
    /// Load config from `path`, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config location (~/.config/fabric_sync/fabric_sync.json)
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        Ok(dir.join("fabric_sync").join(CONFIG_FILE))
    }

    /// Builtin catalog plus the configured extra types
    pub fn registry(&self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::builtin();
        for descriptor in &self.types {
            registry.register(descriptor.clone())?;
        }
        Ok(registry)
    }
}
