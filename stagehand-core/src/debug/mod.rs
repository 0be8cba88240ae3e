//! Debug and inspection utilities
//!
//! - **Fire log**: ring buffer of bus fires with glob-based channel filtering
//! - **State inspection**: [`DebugState`] sections for the session and ledger
//!
//! # State Inspection
//!
//! ```ignore
//! use stagehand::debug::DebugState;
//!
//! let dump = (session.state(), session.ledger()).debug_text();
//! tracing::debug!("{dump}");
//! ```

pub mod fire_log;
pub mod state;

pub use fire_log::{glob_match, FireLog, FireLogConfig, FireRecord};
pub use state::{DebugEntry, DebugSection, DebugState};
