// src/engine/mod.rs

//! Reload engine.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell that
//! owns the watcher receiver, the debouncer and the finish channel is
//! implemented in [`runtime`]. The shell's `select!` loop is the only reader
//! of those four event sources, which is what keeps kill/restart cycles
//! serialized.

use crate::watch::ChangeEvent;

/// Events flowing into the core.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// The notification source reported a change.
    Changed(ChangeEvent),
    /// The debounce quiet window elapsed.
    DebounceFired,
    /// The reload kill requested by the core has completed.
    KillFinished { ok: bool },
    /// The notification source failed after setup.
    WatcherFailed(String),
    /// The step was asked to finish (interrupt).
    Finished,
}

/// Loop state. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Watching,
    Stopped,
}

/// Why processes are being killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillPurpose {
    /// Before restarting the command; the result is fed back to the core.
    Reload,
    /// On the way out; best effort, the result is ignored.
    Shutdown,
}

/// Signal sent to processes on reload and shutdown.
pub const KILL_SIGNAL: &str = "INT";

pub mod core;
pub mod runtime;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use runtime::{LoopReport, PortSettings, RestartOutcome, Runtime};
pub use crate::types::KillFailurePolicy;
