//! # Session Module
//!
//! Per-user isolation for temporary audio artifacts. Every user gets an opaque session id;
//! every file the service writes is named `<session_id>_<artifact>` inside one shared
//! storage directory, and idle sessions (plus any stale files) are swept periodically.
//!
//! ## Key Components:
//! - **SessionRegistry**: id → last-access table, path resolution, eviction, sweep
//! - **SessionSweeper**: cancellable background task running the sweep on an interval

pub mod registry;   // Session table and artifact naming
pub mod sweeper;    // Periodic background cleanup

pub use registry::{SessionId, SessionRegistry, SweepReport};
pub use sweeper::SessionSweeper;
