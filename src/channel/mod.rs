//! Admin Control Channel.
//!
//! # Data Flow
//! ```text
//! engine
//!     → Transaction (begin, statements, commit | rollback on drop)
//!     → AdminChannel::query / execute
//!     → SqliteAdmin (embedded store) or any other admin session
//! ```
//!
//! # Design Decisions
//! - The channel is a trait so the engine never sees connection details
//! - Every value crosses the boundary as text or NULL
//! - `LOAD`/`SAVE` statements travel through `execute` like any other write

pub mod client;
pub mod sqlite;
pub mod transaction;

pub use client::{AdminChannel, ChannelError, ChannelResult, ExecOutcome, Row, Statement};
pub use sqlite::SqliteAdmin;
pub use transaction::Transaction;
