//! Layer propagation subsystem.
//!
//! # Data Flow
//! ```text
//! (action, settings, direction, layer)
//!     → controller.rs (resolve source/target, reject CONFIG writes)
//!     → `LOAD|SAVE <settings> FROM|TO <layer>` on the channel
//!
//!   CONFIG ─┐
//!           ├─ LOAD ─▶ MEMORY ─ LOAD ─▶ RUNTIME
//!   DISK ◀──┘◀─ SAVE ─┘      ◀─ SAVE ──┘
//! ```
//!
//! # Design Decisions
//! - A propagation is a whole-group copy, opaque to individual records
//! - Every propagation reports `changed`; there is no cheap no-op detection
//! - Validation happens before any statement is issued

pub mod controller;
pub mod layer;

pub use controller::{Controller, PropagationOutcome, PropagationRequest, Transition};
pub use layer::{Action, ConfigSettings, Direction, Layer};
