//! Runtime configuration.
//!
//! [`WorkbenchConfig`] gathers the tunables of the runtime and can be loaded
//! from TOML or JSON at startup. Missing fields take their defaults.
//!
//! ```toml
//! [history]
//! max_depth = 50
//!
//! [storage]
//! perspective_key = "scion.workbench.perspective"
//!
//! [microfrontend]
//! warn_on_missing_capability = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use wb_core::WorkbenchError;

/// Default number of history entries kept behind the current one.
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Storage key of the active perspective id.
pub const PERSPECTIVE_KEY: &str = "scion.workbench.perspective";

/// Storage key prefix of per-perspective layouts.
pub const PERSPECTIVE_LAYOUT_PREFIX: &str = "scion.workbench.perspectives.";

/// Storage key of the committed layout document.
pub const LAYOUT_KEY: &str = "scion.workbench.layout";

// ---------------------------------------------------------------------------
// Top-level WorkbenchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    pub history: HistoryConfig,
    pub storage: StorageConfig,
    pub microfrontend: MicrofrontendConfig,
}

impl WorkbenchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(ConfigError::TomlSerialize)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of problems. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.history.max_depth == 0 {
            errors.push("history.max_depth must be at least 1".to_string());
        }

        for (name, key) in [
            ("storage.layout_key", &self.storage.layout_key),
            ("storage.perspective_key", &self.storage.perspective_key),
            ("storage.perspective_prefix", &self.storage.perspective_prefix),
        ] {
            if key.trim().is_empty() {
                errors.push(format!("{name} must not be empty"));
            }
        }
        if self.storage.perspective_prefix == self.storage.perspective_key {
            errors.push("storage.perspective_prefix must differ from storage.perspective_key".into());
        }

        for (name, hint) in [
            ("microfrontend.view_hint", &self.microfrontend.view_hint),
            ("microfrontend.part_hint", &self.microfrontend.part_hint),
        ] {
            if hint.trim().is_empty() {
                errors.push(format!("{name} must not be empty"));
            }
        }

        errors
    }

    /// Consume the config if it validates.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries kept on the back stack; older ones are evicted.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub layout_key: String,
    pub perspective_key: String,
    pub perspective_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            layout_key: LAYOUT_KEY.to_string(),
            perspective_key: PERSPECTIVE_KEY.to_string(),
            perspective_prefix: PERSPECTIVE_LAYOUT_PREFIX.to_string(),
        }
    }
}

impl StorageConfig {
    /// Storage key of the layout of perspective `id`.
    #[must_use]
    pub fn perspective_layout_key(&self, id: &str) -> String {
        format!("{}{id}", self.perspective_prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrofrontendConfig {
    /// Empty-path hint of views backed by a capability.
    pub view_hint: String,
    /// Empty-path hint of parts backed by a capability.
    pub part_hint: String,
    /// Log a warning when an element's capability cannot be found.
    pub warn_on_missing_capability: bool,
}

impl Default for MicrofrontendConfig {
    fn default() -> Self {
        Self {
            view_hint: "workbench.microfrontend.view".to_string(),
            part_hint: "workbench.microfrontend.part".to_string(),
            warn_on_missing_capability: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    TomlSerialize(toml::ser::Error),
    Json(serde_json::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::TomlSerialize(e) => write!(f, "TOML serialize error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::TomlSerialize(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

impl From<ConfigError> for WorkbenchError {
    fn from(error: ConfigError) -> Self {
        WorkbenchError::config(error.to_string())
    }
}
