//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AdminConfig (validated, immutable)
//!     → store paths to SqliteAdmin, propagation defaults to Engine
//! ```
//!
//! # Design Decisions
//! - Config is read once per invocation
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AdminConfig, ObservabilityConfig, PropagationConfig, StoreConfig};
pub use validation::ValidationError;
