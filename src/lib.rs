//! Declarative configuration management for a ProxySQL admin interface.

pub mod channel;
pub mod config;
pub mod error;
pub mod observability;
pub mod propagation;
pub mod reconcile;
pub mod schema;

pub use channel::{AdminChannel, SqliteAdmin};
pub use config::AdminConfig;
pub use error::{Error, Result};
pub use reconcile::{Engine, ReconcileRequest, State, VariableRequest};
