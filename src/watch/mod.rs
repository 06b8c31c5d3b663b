// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Building the exclusion pattern list (`exclude`).
//! - Registering every non-excluded directory with a notification source
//!   (`tree`, `source`).
//! - Collapsing bursts of changes into single reload fires (`debounce`).
//!
//! It does **not** kill or restart anything; it only produces events for the
//! reload engine.

pub mod debounce;
pub mod exclude;
pub mod source;
pub mod tree;

pub use debounce::{DebounceTrigger, Debouncer, DEFAULT_QUIET_WINDOW};
pub use exclude::{
    builtin_patterns, parse_ignore_file, ExclusionFilter, Pattern, PatternScope, StepDirs,
    DEFAULT_IGNORE_FILE,
};
pub use source::{
    ChangeEvent, NotificationSource, NotifySource, NotifyWatcherFactory, WatchMessage,
    WatcherFactory, watch_messages,
};
pub use tree::build_watch_tree;
