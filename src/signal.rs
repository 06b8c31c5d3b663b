// src/signal.rs

//! Interrupt handler registry.
//!
//! Handlers are keyed by id; adding a handler with an id that is already
//! registered replaces the old one. On an interrupt, handlers run newest
//! first until one returns `false` ("handled, stop here").

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Callback run on interrupt. Returns whether later handlers should still run.
pub type HandlerFn = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub struct SignalHandler {
    pub id: String,
    pub f: HandlerFn,
}

impl SignalHandler {
    pub fn new(id: impl Into<String>, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            id: id.into(),
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for SignalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHandler").field("id", &self.id).finish()
    }
}

/// Registry steps hook their cancellation into.
pub trait SignalRegistry: Send + Sync {
    fn add(&self, handler: SignalHandler);
    fn remove(&self, id: &str);
}

/// In-process registry, usually fed by [`listen_for_ctrl_c`].
#[derive(Debug, Default)]
pub struct InterruptRegistry {
    handlers: Mutex<Vec<SignalHandler>>,
}

impl InterruptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run handlers newest first. Returns `true` if every handler asked for
    /// the next one to run (i.e. nobody fully handled the interrupt).
    pub fn dispatch(&self) -> bool {
        // Snapshot so handlers may add/remove without deadlocking.
        let handlers: Vec<SignalHandler> = self.handlers.lock().unwrap().clone();
        for handler in handlers.iter().rev() {
            debug!(id = %handler.id, "running interrupt handler");
            if !(handler.f)() {
                return false;
            }
        }
        true
    }

    pub fn ids(&self) -> Vec<String> {
        self.handlers
            .lock()
            .unwrap()
            .iter()
            .map(|h| h.id.clone())
            .collect()
    }
}

impl SignalRegistry for InterruptRegistry {
    fn add(&self, handler: SignalHandler) {
        let mut handlers = self.handlers.lock().unwrap();
        handlers.retain(|h| h.id != handler.id);
        handlers.push(handler);
    }

    fn remove(&self, id: &str) {
        self.handlers.lock().unwrap().retain(|h| h.id != id);
    }
}

/// Removes its handler from the registry when dropped.
pub struct Registration<'a> {
    registry: &'a dyn SignalRegistry,
    id: String,
}

impl<'a> Registration<'a> {
    pub fn new(registry: &'a dyn SignalRegistry, handler: SignalHandler) -> Self {
        let id = handler.id.clone();
        registry.add(handler);
        Self { registry, id }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

/// Route Ctrl-C into `registry` for the rest of the process lifetime.
///
/// When no handler claims an interrupt the process exits with status 130.
pub fn listen_for_ctrl_c(registry: Arc<InterruptRegistry>) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            if registry.dispatch() {
                std::process::exit(130);
            }
        }
    });
}
