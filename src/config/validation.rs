//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Keep the layer files apart so a LOAD never reads what it writes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdminConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::AdminConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown log level \"{0}\" (expected one of trace, debug, info, warn, error)")]
    UnknownLogLevel(String),

    #[error("store.{first} and store.{second} point at the same file")]
    SharedLayerFile {
        first: &'static str,
        second: &'static str,
    },
}

pub fn validate_config(config: &AdminConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    let store = &config.store;
    let paths = [
        ("memory_path", store.memory_path.as_ref()),
        ("disk_path", store.disk_path.as_ref()),
        ("config_path", store.config_path.as_ref()),
    ];
    for (i, (first, a)) in paths.iter().enumerate() {
        for (second, b) in &paths[i + 1..] {
            if let (Some(a), Some(b)) = (a, b) {
                if a == b {
                    errors.push(ValidationError::SharedLayerFile {
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
