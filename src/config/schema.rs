//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the admin engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Where the embedded admin store keeps its layers.
    pub store: StoreConfig,

    /// Propagation applied after a successful mutation.
    pub propagation: PropagationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Locations of the layer files. Unset paths stay in memory.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// MEMORY layer database file.
    pub memory_path: Option<PathBuf>,

    /// DISK layer database file.
    pub disk_path: Option<PathBuf>,

    /// TOML file read by `LOAD ... FROM CONFIG`.
    pub config_path: Option<PathBuf>,
}

/// Default toggles for post-mutation propagation; requests may override.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PropagationConfig {
    /// Issue `SAVE <settings> TO DISK` after a change.
    pub save_to_disk: bool,

    /// Issue `LOAD <settings> TO RUNTIME` after a change.
    pub load_to_runtime: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            save_to_disk: true,
            load_to_runtime: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Record metrics through the facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: AdminConfig = toml::from_str("").unwrap();
        assert!(config.propagation.save_to_disk);
        assert!(config.propagation.load_to_runtime);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.store.memory_path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: AdminConfig = toml::from_str(
            r#"
            [store]
            disk_path = "/var/lib/proxysql/proxysql.db"

            [propagation]
            load_to_runtime = false
            "#,
        )
        .unwrap();
        assert_eq!(
            config.store.disk_path.as_deref(),
            Some(std::path::Path::new("/var/lib/proxysql/proxysql.db"))
        );
        assert!(config.propagation.save_to_disk);
        assert!(!config.propagation.load_to_runtime);
    }
}
