//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! ReconcileRequest / VariableRequest
//!     → schema normalization (unknown attribute → SchemaError, no channel call)
//!     → resolver.rs (SELECT matching records from MEMORY)
//!     → planner.rs (NoOp | Create | Update | Delete, pure)
//!     → applier.rs (one transaction, rollback on any failure)
//!     → propagation toggles (SAVE TO DISK / LOAD TO RUNTIME, after commit)
//!     → report.rs (result document)
//! ```
//!
//! # Design Decisions
//! - One generic engine; per-class behavior comes from the schema registry
//! - The outcome is a returned value, never shared mutable state
//! - Propagation only follows a committed change

pub mod applier;
pub mod engine;
pub mod planner;
pub mod report;
pub mod request;
pub mod resolver;

pub use applier::AppliedResult;
pub use engine::{Engine, ReconcileOutcome};
pub use planner::MutationPlan;
pub use request::{ReconcileRequest, State, VariableRequest};
