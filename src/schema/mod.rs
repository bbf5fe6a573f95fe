//! Object Schema Registry.
//!
//! # Data Flow
//! ```text
//! class name
//!     → registry.rs (catalogue lookup, unknown → SchemaError)
//!     → ClassSchema (identity policy, attributes, defaults, hooks)
//!     → resolver / planner / applier
//! ```
//!
//! # Design Decisions
//! - One generic engine, parameterized per class by static schema data
//! - Values are normalized to the text form the admin interface returns,
//!   so diffing is plain string equality
//! - The catalogue is fixed at compile time and never mutated

pub mod registry;
pub mod types;

pub use registry::Registry;
pub use types::{
    AttrDef, AttrKind, Attributes, ClassSchema, IdentityPolicy, ObjectClass, ObjectRecord, SettingsGroup,
};
